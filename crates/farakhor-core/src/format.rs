use std::fmt::Display;

use thiserror::Error;

use crate::calendar::PersianDate;

const PERSIAN_DIGITS: [char; 10] = ['۰', '۱', '۲', '۳', '۴', '۵', '۶', '۷', '۸', '۹'];

pub const GREGORIAN_MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("malformed Gregorian date {input:?}: {reason}")]
    MalformedDate { input: String, reason: String },
}

/// A `"day,monthIndex"` pair as stored on occasion records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GregorianDayMonth {
    pub day: u32,
    pub month: u32,
}

pub fn to_persian_digits(value: impl AsRef<str>) -> String {
    value
        .as_ref()
        .chars()
        .map(|ch| {
            if ch.is_ascii_digit() {
                PERSIAN_DIGITS[usize::from(ch as u8 - b'0')]
            } else {
                ch
            }
        })
        .collect()
}

/// Inverse of [`to_persian_digits`], used for user input.
pub fn to_ascii_digits(value: impl AsRef<str>) -> String {
    value
        .as_ref()
        .chars()
        .map(|ch| match PERSIAN_DIGITS.iter().position(|digit| *digit == ch) {
            Some(slot) => char::from(b'0' + slot as u8),
            None => ch,
        })
        .collect()
}

pub fn safe_to_string<T: Display>(value: Option<T>) -> String {
    value.map(|inner| inner.to_string()).unwrap_or_default()
}

pub fn parse_gregorian_day_month(input: &str) -> Result<GregorianDayMonth, FormatError> {
    let malformed = |reason: &str| FormatError::MalformedDate {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let (day, month) = input
        .split_once(',')
        .ok_or_else(|| malformed("expected \"day,monthIndex\""))?;
    let day: u32 = day
        .trim()
        .parse()
        .map_err(|_| malformed("day is not a number"))?;
    let month: u32 = month
        .trim()
        .parse()
        .map_err(|_| malformed("month index is not a number"))?;

    if !(1..=31).contains(&day) {
        return Err(malformed("day is outside 1..=31"));
    }
    if !(1..=12).contains(&month) {
        return Err(malformed("month index is outside 1..=12"));
    }

    Ok(GregorianDayMonth { day, month })
}

/// `"5,3"` becomes `"5 Mar"`.
pub fn format_gregorian(date: &str) -> Result<String, FormatError> {
    let parsed = parse_gregorian_day_month(date)?;
    let abbrev = GREGORIAN_MONTH_ABBREVIATIONS[parsed.month as usize - 1];
    Ok(format!("{} {abbrev}", parsed.day))
}

/// `(۱۲ شهریور)`
pub fn persian_date_label(date: &PersianDate) -> String {
    format!(
        "({} {})",
        to_persian_digits(date.day.to_string()),
        date.month.name()
    )
}

pub fn persian_year_label(year: i32) -> String {
    format!("سال {}", to_persian_digits(year.to_string()))
}
