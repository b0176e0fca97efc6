//! Live clock widget for Iran time.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::calendar::{CalendarError, PersianDate, to_persian_date};

pub const CLOCK_TIMEZONE: Tz = chrono_tz::Asia::Tehran;
pub const CLOCK_LABEL: &str = "ایران";

const CONTAINER_PADDING: u32 = 16;

/// Face and frame size in pixels for a viewport width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSize {
    pub clock: u32,
    pub container: u32,
}

pub fn clock_size_for_width(viewport_width: u32) -> ClockSize {
    let clock = match viewport_width {
        0..=480 => 80,
        481..=768 => 100,
        769..=1800 => 120,
        _ => 140,
    };
    ClockSize {
        clock,
        container: clock + CONTAINER_PADDING,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    local: DateTime<Tz>,
}

impl ClockReading {
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            local: instant.with_timezone(&CLOCK_TIMEZONE),
        }
    }

    pub fn local(&self) -> DateTime<Tz> {
        self.local
    }

    pub fn time_label(&self) -> String {
        self.local.format("%H:%M:%S").to_string()
    }

    pub fn persian_date(&self) -> Result<PersianDate, CalendarError> {
        to_persian_date(self.local.date_naive())
    }
}
