//! QR code rendering for device provisioning.
//!
//! Rendering is optional: without the `qr` feature the default renderer
//! reports [`QrError::Unavailable`] and the QR code endpoint answers 503.

use std::sync::Arc;

/// Errors from a [`QrRenderer`].
#[derive(Debug, thiserror::Error)]
pub enum QrError {
    /// No QR backend is compiled in or configured.
    #[error("QR code rendering is not available")]
    Unavailable,
    /// The data could not be encoded, e.g. it is too long.
    #[error("QR code encoding failed: {0}")]
    Encode(String),
}

/// Renders data into an SVG QR code.
pub trait QrRenderer: Send + Sync {
    /// Append the SVG document for `data` to `out`.
    fn write_svg(&self, data: &str, out: &mut Vec<u8>) -> Result<(), QrError>;
}

/// SVG renderer backed by the `qrcode` crate.
#[cfg(feature = "qr")]
#[derive(Debug, Clone)]
pub struct SvgQrRenderer {
    min_size: u32,
}

#[cfg(feature = "qr")]
impl SvgQrRenderer {
    pub fn new() -> Self {
        Self { min_size: 200 }
    }

    /// Minimum width and height of the image, in pixels.
    pub fn min_size(mut self, min_size: u32) -> Self {
        self.min_size = min_size;
        self
    }
}

#[cfg(feature = "qr")]
impl Default for SvgQrRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "qr")]
impl QrRenderer for SvgQrRenderer {
    fn write_svg(&self, data: &str, out: &mut Vec<u8>) -> Result<(), QrError> {
        use qrcode::QrCode;
        use qrcode::render::svg;

        let code = QrCode::new(data.as_bytes()).map_err(|e| QrError::Encode(e.to_string()))?;
        let image = code
            .render::<svg::Color>()
            .min_dimensions(self.min_size, self.min_size)
            .build();

        out.extend_from_slice(image.as_bytes());
        Ok(())
    }
}

/// Renderer that never renders.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableQrRenderer;

impl QrRenderer for UnavailableQrRenderer {
    fn write_svg(&self, _data: &str, _out: &mut Vec<u8>) -> Result<(), QrError> {
        Err(QrError::Unavailable)
    }
}

/// The best renderer compiled into this build.
pub fn default_renderer() -> Arc<dyn QrRenderer> {
    #[cfg(feature = "qr")]
    {
        Arc::new(SvgQrRenderer::new())
    }
    #[cfg(not(feature = "qr"))]
    {
        Arc::new(UnavailableQrRenderer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_renderer() {
        let mut out = Vec::new();
        let result = UnavailableQrRenderer.write_svg("otpauth://totp/x", &mut out);
        assert!(matches!(result, Err(QrError::Unavailable)));
        assert!(out.is_empty());
    }

    #[cfg(feature = "qr")]
    #[test]
    fn test_svg_renderer() {
        let mut out = Vec::new();
        SvgQrRenderer::new()
            .write_svg("otpauth://totp/alice?secret=GEZDGNBVGY3TQOJQ", &mut out)
            .unwrap();

        let svg = String::from_utf8(out).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("</svg>"));
    }

    #[cfg(feature = "qr")]
    #[test]
    fn test_svg_renderer_rejects_oversized_data() {
        let mut out = Vec::new();
        let data = "x".repeat(8000);
        let result = SvgQrRenderer::new().write_svg(&data, &mut out);
        assert!(matches!(result, Err(QrError::Encode(_))));
    }
}
