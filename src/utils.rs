use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

/// Half-open `[start, end)` reporting period covering one calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportPeriod {
    /// The calendar month containing `year`/`month`
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self {
            start: Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0)?),
            end: Utc.from_utc_datetime(&next.and_hms_opt(0, 0, 0)?),
        })
    }

    /// The month before the one containing `now`
    pub fn previous_month(now: DateTime<Utc>) -> Self {
        let (year, month) = if now.month() == 1 {
            (now.year() - 1, 12)
        } else {
            (now.year(), now.month() - 1)
        };
        // Any valid year/month pair yields a period.
        Self::month(year, month).unwrap_or(Self { start: now, end: now })
    }

    /// Parse a `YYYY-MM` month selector
    pub fn parse_month(value: &str) -> Option<Self> {
        let (year, month) = value.trim().split_once('-')?;
        Self::month(year.parse().ok()?, month.parse().ok()?)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Human label such as `September 2026`
    pub fn label(&self) -> String {
        self.start.format("%B %Y").to_string()
    }

    /// Filesystem-friendly key such as `2026_09`
    pub fn file_key(&self) -> String {
        self.start.format("%Y_%m").to_string()
    }
}

/// Round `value` to `decimals` places, mapping non-finite input to zero
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// `part / whole` as a percentage, zero when `whole` is zero
pub fn percentage(part: u64, whole: u64, decimals: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to(part as f64 / whole as f64 * 100.0, decimals)
}

/// Format an integer with `,` thousands separators
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Escape text for interpolation into HTML element content or attributes
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
