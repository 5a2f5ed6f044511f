/// Get environment variable with OTP_ prefix, falling back to unprefixed version
///
/// Checks `OTP_{key}` first, then `{key}`.
///
/// # Examples
///
/// ```rust
/// use otp_admin::utils::get_env_with_prefix;
///
/// // Checks OTP_ADMIN_HIDE_SENSITIVE_DATA first, then ADMIN_HIDE_SENSITIVE_DATA
/// let hide = get_env_with_prefix("ADMIN_HIDE_SENSITIVE_DATA");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("OTP_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse a boolean environment flag.
///
/// Accepts `true`/`false`, `1`/`0`, `yes`/`no` and `on`/`off` (case-insensitive).
pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        unsafe {
            std::env::set_var("OTP_TEST_ENV_VAR", "prefixed_value");
        }
        assert_eq!(
            get_env_with_prefix("TEST_ENV_VAR"),
            Some("prefixed_value".to_string())
        );
        unsafe {
            std::env::remove_var("OTP_TEST_ENV_VAR");
        }

        unsafe {
            std::env::set_var("FALLBACK_ONLY_VAR", "unprefixed_value");
        }
        assert_eq!(
            get_env_with_prefix("FALLBACK_ONLY_VAR"),
            Some("unprefixed_value".to_string())
        );
        unsafe {
            std::env::remove_var("FALLBACK_ONLY_VAR");
        }

        assert_eq!(get_env_with_prefix("NON_EXISTENT_OTP_VAR"), None);
    }

    #[test]
    fn test_parse_bool_flag() {
        assert_eq!(parse_bool_flag("TRUE"), Some(true));
        assert_eq!(parse_bool_flag(" 1 "), Some(true));
        assert_eq!(parse_bool_flag("off"), Some(false));
        assert_eq!(parse_bool_flag("maybe"), None);
    }
}
