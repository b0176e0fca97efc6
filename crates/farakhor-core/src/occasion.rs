use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::calendar::{CalendarError, PersianMonth, month_length};
use crate::format::{FormatError, format_gregorian, parse_gregorian_day_month};

pub const DEFAULT_LOGO_URL: &str =
    "https://gahshomar.com/wp-content/uploads/2024/08/gahshomar-dark.svg";
pub const TODAY_LOGO_PATH: &str = "/assets/LogoMobMain.png";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error("{field}: {source}")]
    Date {
        field: &'static str,
        #[source]
        source: FormatError,
    },

    #[error("{field} {day} is outside 1..={max} for {month}")]
    DayOutOfRange {
        field: &'static str,
        day: u32,
        max: u32,
        month: PersianMonth,
    },
}

/// Occasion as it arrives on the wire, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OccasionRecord {
    pub short_title: Option<String>,
    pub event_title: Option<String>,
    pub georgian: Option<String>,
    pub georgian_k: Option<String>,
    pub modal_image_link: Option<String>,
    pub modal_status: Option<bool>,
    pub persian_day_number: Option<u32>,
    pub persian_day_number_k: Option<u32>,
    pub ref_link: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "importantDay")]
    pub important_day: Option<bool>,
    pub month: Option<String>,
    pub logo_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Occasion {
    pub short_title: String,
    pub event_title: String,
    pub georgian: String,
    pub georgian_k: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modal_image_link: Option<String>,
    pub modal_status: bool,
    pub persian_day_number: u32,
    pub persian_day_number_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_link: Option<String>,
    pub text: String,
    #[serde(rename = "importantDay")]
    pub important_day: bool,
    pub month: PersianMonth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_link: Option<String>,
}

impl Occasion {
    pub fn display_day(&self, is_leap: bool) -> u32 {
        if is_leap {
            self.persian_day_number_k
        } else {
            self.persian_day_number
        }
    }

    pub fn gregorian(&self, is_leap: bool) -> &str {
        if is_leap {
            &self.georgian_k
        } else {
            &self.georgian
        }
    }

    pub fn gregorian_label(&self, is_leap: bool) -> Result<String, FormatError> {
        format_gregorian(self.gregorian(is_leap))
    }

    pub fn logo(&self, is_today: bool) -> &str {
        match self.logo_link.as_deref() {
            Some(link) => link,
            None if is_today => TODAY_LOGO_PATH,
            None => DEFAULT_LOGO_URL,
        }
    }

    pub fn modal_image(&self) -> &str {
        self.modal_image_link.as_deref().unwrap_or(DEFAULT_LOGO_URL)
    }
}

impl TryFrom<OccasionRecord> for Occasion {
    type Error = RecordError;

    fn try_from(record: OccasionRecord) -> Result<Self, Self::Error> {
        let month_name = record.month.ok_or(RecordError::MissingField("Month"))?;
        let month = PersianMonth::from_name(&month_name)?;

        let persian_day_number = checked_day(
            "PersianDayNumber",
            record.persian_day_number,
            month,
        )?;
        let persian_day_number_k = checked_day(
            "PersianDayNumberK",
            record.persian_day_number_k,
            month,
        )?;

        let georgian = checked_gregorian("Georgian", record.georgian)?;
        let georgian_k = checked_gregorian("GeorgianK", record.georgian_k)?;

        Ok(Self {
            short_title: record
                .short_title
                .ok_or(RecordError::MissingField("ShortTitle"))?,
            event_title: record
                .event_title
                .ok_or(RecordError::MissingField("EventTitle"))?,
            georgian,
            georgian_k,
            modal_image_link: normalize_link("ModalImageLink", record.modal_image_link),
            modal_status: record.modal_status.unwrap_or(false),
            persian_day_number,
            persian_day_number_k,
            ref_link: normalize_link("RefLink", record.ref_link),
            text: record.text.unwrap_or_default(),
            important_day: record.important_day.unwrap_or(false),
            month,
            logo_link: normalize_link("LogoLink", record.logo_link),
        })
    }
}

fn checked_day(
    field: &'static str,
    value: Option<u32>,
    month: PersianMonth,
) -> Result<u32, RecordError> {
    let day = value.ok_or(RecordError::MissingField(field))?;
    let max = month_length(month, true);
    if day == 0 || day > max {
        return Err(RecordError::DayOutOfRange {
            field,
            day,
            max,
            month,
        });
    }
    Ok(day)
}

fn checked_gregorian(field: &'static str, value: Option<String>) -> Result<String, RecordError> {
    let raw = value.ok_or(RecordError::MissingField(field))?;
    parse_gregorian_day_month(&raw).map_err(|source| RecordError::Date { field, source })?;
    Ok(raw)
}

/// Empty links are absent; links that are neither absolute URLs nor
/// root-relative paths are dropped.
fn normalize_link(field: &'static str, value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('/') || Url::parse(&trimmed).is_ok() {
        return Some(trimmed);
    }
    warn!(field, link = %trimmed, "ignoring invalid link on occasion record");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> OccasionRecord {
        OccasionRecord {
            short_title: Some("نوروز".to_string()),
            event_title: Some("جشن نوروز".to_string()),
            georgian: Some("21,3".to_string()),
            georgian_k: Some("20,3".to_string()),
            modal_status: Some(true),
            persian_day_number: Some(1),
            persian_day_number_k: Some(1),
            month: Some("فروردین".to_string()),
            ..OccasionRecord::default()
        }
    }

    #[test]
    fn validates_complete_record() {
        let occasion = Occasion::try_from(record()).expect("valid record");
        assert_eq!(occasion.month, PersianMonth::Farvardin);
        assert_eq!(occasion.text, "");
        assert!(!occasion.important_day);
        assert_eq!(occasion.gregorian_label(false).as_deref(), Ok("21 Mar"));
        assert_eq!(occasion.gregorian_label(true).as_deref(), Ok("20 Mar"));
    }

    #[test]
    fn missing_day_number_is_reported() {
        let mut raw = record();
        raw.persian_day_number_k = None;
        assert_eq!(
            Occasion::try_from(raw),
            Err(RecordError::MissingField("PersianDayNumberK"))
        );
    }

    #[test]
    fn unknown_month_is_reported() {
        let mut raw = record();
        raw.month = Some("Farvardin".to_string());
        assert!(matches!(
            Occasion::try_from(raw),
            Err(RecordError::Calendar(CalendarError::UnknownMonth(_)))
        ));
    }

    #[test]
    fn day_must_fit_month() {
        let mut raw = record();
        raw.month = Some("مهر".to_string());
        raw.persian_day_number = Some(31);
        assert!(matches!(
            Occasion::try_from(raw),
            Err(RecordError::DayOutOfRange { max: 30, .. })
        ));
    }

    #[test]
    fn esfand_allows_its_leap_day() {
        let mut raw = record();
        raw.month = Some("اسفند".to_string());
        raw.persian_day_number = Some(30);
        raw.persian_day_number_k = Some(30);
        assert!(Occasion::try_from(raw.clone()).is_ok());

        raw.persian_day_number_k = Some(31);
        assert!(matches!(
            Occasion::try_from(raw),
            Err(RecordError::DayOutOfRange { max: 30, .. })
        ));
    }

    #[test]
    fn malformed_gregorian_is_reported() {
        let mut raw = record();
        raw.georgian = Some("21-3".to_string());
        assert!(matches!(
            Occasion::try_from(raw),
            Err(RecordError::Date {
                field: "Georgian",
                ..
            })
        ));
    }

    #[test]
    fn links_fall_back_to_defaults() {
        let mut raw = record();
        raw.logo_link = Some("   ".to_string());
        raw.modal_image_link = Some("not a url".to_string());
        raw.ref_link = Some("https://example.org/nowruz".to_string());
        let occasion = Occasion::try_from(raw).expect("valid record");

        assert_eq!(occasion.logo(false), DEFAULT_LOGO_URL);
        assert_eq!(occasion.logo(true), TODAY_LOGO_PATH);
        assert_eq!(occasion.modal_image(), DEFAULT_LOGO_URL);
        assert_eq!(
            occasion.ref_link.as_deref(),
            Some("https://example.org/nowruz")
        );
    }

    #[test]
    fn explicit_logo_wins_over_today_asset() {
        let mut raw = record();
        raw.logo_link = Some("/assets/nowruz.png".to_string());
        let occasion = Occasion::try_from(raw).expect("valid record");
        assert_eq!(occasion.logo(true), "/assets/nowruz.png");
    }
}
