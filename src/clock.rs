// src/clock.rs
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, Utc};

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Captures timestamps and renders them in the display zone used for entries.
#[derive(Debug, Clone)]
pub struct Clock {
    offset: Option<FixedOffset>,
    format: String,
}

impl Clock {
    /// `utc_offset_minutes` of `None` means the system's local zone.
    pub fn new(utc_offset_minutes: Option<i32>, format: &str) -> Self {
        let offset = utc_offset_minutes.and_then(|minutes| {
            let offset = minutes.checked_mul(60).and_then(FixedOffset::east_opt);
            if offset.is_none() {
                log::warn!("Ignoring out-of-range UTC offset of {} minutes; using local time", minutes);
            }
            offset
        });
        let format = if is_valid_date_format(format) {
            format.to_string()
        } else {
            log::warn!("Ignoring invalid date format {:?}; using {:?}", format, DEFAULT_DATE_FORMAT);
            DEFAULT_DATE_FORMAT.to_string()
        };
        Self { offset, format }
    }

    pub fn now(&self) -> String {
        self.render(Utc::now())
    }

    pub fn render(&self, instant: DateTime<Utc>) -> String {
        match self.offset {
            Some(offset) => instant.with_timezone(&offset).format(&self.format).to_string(),
            None => instant.with_timezone(&Local).format(&self.format).to_string(),
        }
    }

    /// Converts an RFC 3339 timestamp from the remote table into the display format.
    pub fn render_remote(&self, raw: &str) -> String {
        match parse_remote_timestamp(raw) {
            Some(instant) => self.render(instant),
            None => {
                log::debug!("Unparsable remote timestamp {:?}; using raw text", raw);
                raw.replace('T', " ").replace('Z', "").chars().take(16).collect()
            }
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(None, DEFAULT_DATE_FORMAT)
    }
}

/// Whether chrono can render `format`. Unknown specifiers would make rendering panic.
pub fn is_valid_date_format(format: &str) -> bool {
    !format.is_empty() && StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}

pub fn parse_remote_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Utc))
}
