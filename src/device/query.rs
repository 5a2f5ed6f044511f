//! List queries: search, filters and pagination.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::types::TotpDevice;

/// Date-range choices offered for timestamp columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFilter {
    #[default]
    Any,
    Today,
    PastSevenDays,
    ThisMonth,
    ThisYear,
    HasDate,
    NoDate,
}

impl DateFilter {
    pub const CHOICES: [DateFilter; 7] = [
        DateFilter::Any,
        DateFilter::Today,
        DateFilter::PastSevenDays,
        DateFilter::ThisMonth,
        DateFilter::ThisYear,
        DateFilter::HasDate,
        DateFilter::NoDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Today => "today",
            Self::PastSevenDays => "past_seven_days",
            Self::ThisMonth => "this_month",
            Self::ThisYear => "this_year",
            Self::HasDate => "has_date",
            Self::NoDate => "no_date",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Any => "Any date",
            Self::Today => "Today",
            Self::PastSevenDays => "Past 7 days",
            Self::ThisMonth => "This month",
            Self::ThisYear => "This year",
            Self::HasDate => "Has date",
            Self::NoDate => "No date",
        }
    }

    /// Half-open `[start, end)` window for the range choices, relative to `now`.
    ///
    /// `Any`, `HasDate` and `NoDate` have no window.
    pub fn bounds(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let today = Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
            .single()?;
        let tomorrow = today + Duration::days(1);

        match self {
            Self::Today => Some((today, tomorrow)),
            Self::PastSevenDays => Some((today - Duration::days(7), tomorrow)),
            Self::ThisMonth => {
                let start = Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0).single()?;
                let (year, month) = if now.month() == 12 {
                    (now.year() + 1, 1)
                } else {
                    (now.year(), now.month() + 1)
                };
                let end = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;
                Some((start, end))
            }
            Self::ThisYear => {
                let start = Utc.with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0).single()?;
                let end = Utc.with_ymd_and_hms(now.year() + 1, 1, 1, 0, 0, 0).single()?;
                Some((start, end))
            }
            Self::Any | Self::HasDate | Self::NoDate => None,
        }
    }

    pub fn matches(&self, value: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match self {
            Self::Any => true,
            Self::HasDate => value.is_some(),
            Self::NoDate => value.is_none(),
            _ => match (value, self.bounds(now)) {
                (Some(v), Some((start, end))) => v >= start && v < end,
                _ => false,
            },
        }
    }
}

impl std::str::FromStr for DateFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        DateFilter::CHOICES
            .into_iter()
            .find(|choice| choice.as_str() == s)
            .ok_or_else(|| format!("unknown date filter: {}", s))
    }
}

/// Parameters for listing devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceQuery {
    /// Case-insensitive substring matched against the search fields.
    pub search: Option<String>,
    /// User fields searched, e.g. `["username", "email"]`.
    #[serde(default)]
    pub search_fields: Vec<String>,
    #[serde(default)]
    pub created_at: DateFilter,
    #[serde(default)]
    pub last_used_at: DateFilter,
    pub confirmed: Option<bool>,
    /// Page number (1-indexed).
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    100
}

impl Default for DeviceQuery {
    fn default() -> Self {
        Self {
            search: None,
            search_fields: Vec::new(),
            created_at: DateFilter::Any,
            last_used_at: DateFilter::Any,
            confirmed: None,
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl DeviceQuery {
    /// The trimmed search term, if any.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Whether `device` passes every filter and the search term.
    pub fn matches(&self, device: &TotpDevice, now: DateTime<Utc>) -> bool {
        if let Some(confirmed) = self.confirmed {
            if device.confirmed != confirmed {
                return false;
            }
        }
        if !self.created_at.matches(device.created_at, now)
            || !self.last_used_at.matches(device.last_used_at, now)
        {
            return false;
        }

        match self.search_term() {
            None => true,
            Some(term) => {
                let needle = term.to_lowercase();
                self.search_fields.iter().any(|field| {
                    device
                        .user
                        .field(field)
                        .is_some_and(|value| value.to_lowercase().contains(&needle))
                })
            }
        }
    }

    /// Zero-based offset of the first row on the requested page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.per_page)
    }
}

/// Paginated result wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    /// Items for the current page.
    pub items: Vec<T>,
    /// Total number of items across all pages.
    pub total: u64,
    /// Current page number (1-indexed).
    pub page: u32,
    /// Number of items per page.
    pub per_page: u32,
    /// Total number of pages.
    pub total_pages: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, per_page: u32) -> Self {
        let total_pages = if per_page > 0 {
            total.div_ceil(u64::from(per_page)) as u32
        } else {
            0
        };

        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}
