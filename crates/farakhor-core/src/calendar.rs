//! Jalaali (Persian) calendar arithmetic.
//!
//! Conversion uses the break-table algorithm (the same one `jalaali-js`
//! ships), which is exact for Jalaali years -61..3177. Leap years for the
//! occasion catalog come from a fixed table; the arithmetic 33-year rule is
//! available as [`is_leap_jalaali_year`] and is what [`LeapRule`] falls back
//! to outside the table.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("unknown Persian month name: {0:?}")]
    UnknownMonth(String),

    #[error("month index {0} is outside 1..=12")]
    MonthIndexOutOfRange(u32),

    #[error("year {year} is outside the leap table range {min}..={max}")]
    YearOutOfRange { year: i32, min: i32, max: i32 },

    #[error("Jalaali year {0} is outside the convertible range")]
    JalaaliYearOutOfRange(i64),

    #[error("invalid Persian date {year}/{month}/{day}")]
    InvalidPersianDate { year: i32, month: u32, day: u32 },
}

/// Canonical month names, in calendar order.
pub const MONTH_NAMES: [&str; 12] = [
    "فروردین",
    "اردیبهشت",
    "خرداد",
    "تیر",
    "اَمُرداد",
    "شهریور",
    "مهر",
    "آبان",
    "آذر",
    "دی",
    "بهمن",
    "اسفند",
];

/// Kabise years used by the occasion catalog.
pub const LEAP_YEARS: [i32; 50] = [
    1403, 1407, 1411, 1415, 1419, 1423, 1427, 1431, 1435, 1439, 1443, 1447, 1451, 1455, 1459,
    1463, 1467, 1471, 1475, 1479, 1483, 1487, 1491, 1495, 1499, 1503, 1507, 1511, 1515, 1519,
    1523, 1527, 1531, 1535, 1539, 1543, 1547, 1551, 1555, 1559, 1563, 1567, 1571, 1575, 1579,
    1583, 1587, 1591, 1595, 1599,
];

/// First year of the four-year cycles covered by [`LEAP_YEARS`].
pub const LEAP_TABLE_FIRST_YEAR: i32 = 1400;
/// Last year of the four-year cycles covered by [`LEAP_YEARS`].
pub const LEAP_TABLE_LAST_YEAR: i32 = 1602;

const BREAKS: [i64; 20] = [
    -61, 9, 38, 199, 426, 686, 756, 818, 1111, 1181, 1210, 1635, 2060, 2097, 2192, 2262, 2324,
    2394, 2456, 3178,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PersianMonth {
    Farvardin = 1,
    Ordibehesht,
    Khordad,
    Tir,
    Amordad,
    Shahrivar,
    Mehr,
    Aban,
    Azar,
    Dey,
    Bahman,
    Esfand,
}

impl PersianMonth {
    pub const ALL: [PersianMonth; 12] = [
        PersianMonth::Farvardin,
        PersianMonth::Ordibehesht,
        PersianMonth::Khordad,
        PersianMonth::Tir,
        PersianMonth::Amordad,
        PersianMonth::Shahrivar,
        PersianMonth::Mehr,
        PersianMonth::Aban,
        PersianMonth::Azar,
        PersianMonth::Dey,
        PersianMonth::Bahman,
        PersianMonth::Esfand,
    ];

    pub fn from_index(index: u32) -> Result<Self, CalendarError> {
        index
            .checked_sub(1)
            .and_then(|slot| Self::ALL.get(slot as usize))
            .copied()
            .ok_or(CalendarError::MonthIndexOutOfRange(index))
    }

    /// Exact match against [`MONTH_NAMES`]; no trimming or aliasing.
    pub fn from_name(name: &str) -> Result<Self, CalendarError> {
        MONTH_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .map(|slot| Self::ALL[slot])
            .ok_or_else(|| CalendarError::UnknownMonth(name.to_string()))
    }

    pub const fn index(self) -> u32 {
        self as u32
    }

    pub const fn name(self) -> &'static str {
        MONTH_NAMES[self as usize - 1]
    }

    /// Moves `delta` months from this month in `year`, carrying into the year.
    pub fn shifted(self, year: i32, delta: i32) -> (i32, Self) {
        let total = year * 12 + (self.index() as i32 - 1) + delta;
        let slot = total.rem_euclid(12) as usize;
        (total.div_euclid(12), Self::ALL[slot])
    }
}

impl fmt::Display for PersianMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PersianMonth {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl Serialize for PersianMonth {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PersianDate {
    pub year: i32,
    pub month: PersianMonth,
    pub day: u32,
}

impl fmt::Display for PersianDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:02}/{:02}", self.year, self.month.index(), self.day)
    }
}

pub fn month_name_to_index(name: &str) -> Result<u32, CalendarError> {
    PersianMonth::from_name(name).map(PersianMonth::index)
}

pub fn index_to_month_name(index: u32) -> Result<&'static str, CalendarError> {
    PersianMonth::from_index(index).map(PersianMonth::name)
}

/// Table lookup. Years outside the covered cycles are an error, not `false`.
pub fn is_leap_year(persian_year: i32) -> Result<bool, CalendarError> {
    if !(LEAP_TABLE_FIRST_YEAR..=LEAP_TABLE_LAST_YEAR).contains(&persian_year) {
        return Err(CalendarError::YearOutOfRange {
            year: persian_year,
            min: LEAP_TABLE_FIRST_YEAR,
            max: LEAP_TABLE_LAST_YEAR,
        });
    }
    Ok(LEAP_YEARS.binary_search(&persian_year).is_ok())
}

pub fn is_leap_jalaali_year(persian_year: i32) -> Result<bool, CalendarError> {
    jal_cal(i64::from(persian_year)).map(|cal| cal.leap == 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeapRule {
    #[default]
    Table,
    Arithmetic,
}

impl LeapRule {
    pub fn resolve(self, persian_year: i32) -> bool {
        match self {
            LeapRule::Table => is_leap_year(persian_year).unwrap_or_else(|err| {
                warn!(
                    year = persian_year,
                    error = %err,
                    "year outside kabise table; using arithmetic leap rule"
                );
                arithmetic_or_common(persian_year)
            }),
            LeapRule::Arithmetic => arithmetic_or_common(persian_year),
        }
    }
}

impl FromStr for LeapRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(LeapRule::Table),
            "arithmetic" | "33-year" => Ok(LeapRule::Arithmetic),
            other => Err(format!("unknown leap rule: {other}")),
        }
    }
}

fn arithmetic_or_common(persian_year: i32) -> bool {
    is_leap_jalaali_year(persian_year).unwrap_or_else(|err| {
        warn!(
            year = persian_year,
            error = %err,
            "year outside Jalaali algorithm range; treating as common year"
        );
        false
    })
}

pub const fn month_length(month: PersianMonth, is_leap: bool) -> u32 {
    match month.index() {
        1..=6 => 31,
        7..=11 => 30,
        _ if is_leap => 30,
        _ => 29,
    }
}

pub fn to_persian_date(date: NaiveDate) -> Result<PersianDate, CalendarError> {
    let gy = i64::from(date.year());
    let mut jy = gy - 621;
    let cal = jal_cal(jy)?;
    let farvardin_first = march_day(cal.gy, cal.march, jy)?;

    let mut offset = date.signed_duration_since(farvardin_first).num_days();
    if offset >= 0 {
        if offset <= 185 {
            return build_date(jy, 1 + offset / 31, offset % 31 + 1);
        }
        offset -= 186;
    } else {
        jy -= 1;
        offset += 179;
        if cal.leap == 1 {
            offset += 1;
        }
    }

    build_date(jy, 7 + offset / 30, offset % 30 + 1)
}

pub fn to_gregorian_date(date: PersianDate) -> Result<NaiveDate, CalendarError> {
    let invalid = CalendarError::InvalidPersianDate {
        year: date.year,
        month: date.month.index(),
        day: date.day,
    };
    let jy = i64::from(date.year);
    let cal = jal_cal(jy)?;
    let max_day = month_length(date.month, cal.leap == 0);
    if date.day == 0 || date.day > max_day {
        return Err(invalid);
    }

    let jm = i64::from(date.month.index());
    let offset = (jm - 1) * 31 - jm / 7 * (jm - 7) + i64::from(date.day) - 1;
    let farvardin_first = march_day(cal.gy, cal.march, jy)?;
    u64::try_from(offset)
        .ok()
        .and_then(|days| farvardin_first.checked_add_days(Days::new(days)))
        .ok_or(invalid)
}

struct JalCal {
    /// Years since the last leap year; 0 means `jy` itself is leap.
    leap: i64,
    gy: i64,
    /// Day of March (Gregorian year `gy`) that is 1 Farvardin.
    march: i64,
}

fn jal_cal(jy: i64) -> Result<JalCal, CalendarError> {
    let first = BREAKS[0];
    let last = BREAKS[BREAKS.len() - 1];
    if jy < first || jy >= last {
        return Err(CalendarError::JalaaliYearOutOfRange(jy));
    }

    let gy = jy + 621;
    let mut leap_j = -14;
    let mut jp = first;
    let mut jump = 0;
    for &jm in &BREAKS[1..] {
        jump = jm - jp;
        if jy < jm {
            break;
        }
        leap_j += jump / 33 * 8 + (jump % 33) / 4;
        jp = jm;
    }

    let mut n = jy - jp;
    leap_j += n / 33 * 8 + (n % 33 + 3) / 4;
    if jump % 33 == 4 && jump - n == 4 {
        leap_j += 1;
    }

    let leap_g = gy / 4 - (gy / 100 + 1) * 3 / 4 - 150;
    let march = 20 + leap_j - leap_g;

    if jump - n < 6 {
        n = n - jump + (jump + 4) / 33 * 33;
    }
    let mut leap = ((n + 1) % 33 - 1) % 4;
    if leap == -1 {
        leap = 4;
    }

    Ok(JalCal { leap, gy, march })
}

fn march_day(gy: i64, march: i64, jy: i64) -> Result<NaiveDate, CalendarError> {
    i32::try_from(gy)
        .ok()
        .zip(u32::try_from(march).ok())
        .and_then(|(year, day)| NaiveDate::from_ymd_opt(year, 3, day))
        .ok_or(CalendarError::JalaaliYearOutOfRange(jy))
}

fn build_date(jy: i64, jm: i64, jd: i64) -> Result<PersianDate, CalendarError> {
    let year = i32::try_from(jy).map_err(|_| CalendarError::JalaaliYearOutOfRange(jy))?;
    let month = u32::try_from(jm)
        .map_err(|_| CalendarError::MonthIndexOutOfRange(0))
        .and_then(PersianMonth::from_index)?;
    let day = u32::try_from(jd).map_err(|_| CalendarError::InvalidPersianDate {
        year,
        month: month.index(),
        day: 0,
    })?;
    Ok(PersianDate { year, month, day })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid gregorian date")
    }

    #[test]
    fn every_table_year_is_leap() {
        for year in LEAP_YEARS {
            assert_eq!(is_leap_year(year), Ok(true), "year {year}");
        }
    }

    #[test]
    fn neighbours_of_table_years_are_common() {
        for year in LEAP_YEARS {
            for neighbour in [year - 1, year + 1] {
                if LEAP_YEARS.contains(&neighbour) {
                    continue;
                }
                assert_eq!(is_leap_year(neighbour), Ok(false), "year {neighbour}");
            }
        }
    }

    #[test]
    fn years_outside_table_are_flagged() {
        assert!(matches!(
            is_leap_year(1399),
            Err(CalendarError::YearOutOfRange { year: 1399, .. })
        ));
        assert!(matches!(
            is_leap_year(1603),
            Err(CalendarError::YearOutOfRange { year: 1603, .. })
        ));
    }

    #[test]
    fn arithmetic_rule_follows_33_year_cycle() {
        assert_eq!(is_leap_jalaali_year(1399), Ok(true));
        assert_eq!(is_leap_jalaali_year(1403), Ok(true));
        assert_eq!(is_leap_jalaali_year(1404), Ok(false));
        assert_eq!(is_leap_jalaali_year(1407), Ok(false));
        assert_eq!(is_leap_jalaali_year(1408), Ok(true));
        assert!(is_leap_jalaali_year(3178).is_err());
    }

    #[test]
    fn table_rule_falls_back_outside_range() {
        assert!(LeapRule::Table.resolve(1403));
        assert!(!LeapRule::Table.resolve(1404));
        assert!(LeapRule::Table.resolve(1399));
        assert!(!LeapRule::Arithmetic.resolve(1407));
    }

    #[test]
    fn month_names_round_trip_through_indices() {
        for (slot, name) in MONTH_NAMES.iter().enumerate() {
            let index = month_name_to_index(name).expect("canonical name");
            assert_eq!(index as usize, slot + 1);
            assert_eq!(index_to_month_name(index), Ok(*name));
        }
    }

    #[test]
    fn unknown_month_lookups_fail_loudly() {
        assert_eq!(
            month_name_to_index("مرداد"),
            Err(CalendarError::UnknownMonth("مرداد".to_string()))
        );
        assert_eq!(
            index_to_month_name(0),
            Err(CalendarError::MonthIndexOutOfRange(0))
        );
        assert_eq!(
            index_to_month_name(13),
            Err(CalendarError::MonthIndexOutOfRange(13))
        );
    }

    #[test]
    fn shifting_wraps_across_years() {
        assert_eq!(
            PersianMonth::Esfand.shifted(1403, 1),
            (1404, PersianMonth::Farvardin)
        );
        assert_eq!(
            PersianMonth::Farvardin.shifted(1404, -1),
            (1403, PersianMonth::Esfand)
        );
        assert_eq!(
            PersianMonth::Mehr.shifted(1405, 14),
            (1406, PersianMonth::Azar)
        );
    }

    #[test]
    fn converts_nowruz_1403() {
        let date = to_persian_date(ymd(2024, 3, 20)).expect("convert");
        assert_eq!(
            date,
            PersianDate {
                year: 1403,
                month: PersianMonth::Farvardin,
                day: 1
            }
        );
    }

    #[test]
    fn converts_last_day_of_1402() {
        let date = to_persian_date(ymd(2024, 3, 19)).expect("convert");
        assert_eq!(date.year, 1402);
        assert_eq!(date.month, PersianMonth::Esfand);
        assert_eq!(date.day, 29);
    }

    #[test]
    fn converts_second_half_of_year() {
        let date = to_persian_date(ymd(2026, 10, 19)).expect("convert");
        assert_eq!(date.to_string(), "1405/07/27");
    }

    #[test]
    fn gregorian_conversion_inverts_persian() {
        for day in [ymd(2024, 3, 19), ymd(2024, 9, 2), ymd(2025, 3, 20), ymd(1990, 1, 1)] {
            let persian = to_persian_date(day).expect("to persian");
            assert_eq!(to_gregorian_date(persian), Ok(day));
        }
    }

    #[test]
    fn rejects_esfand_30_in_common_year() {
        let date = PersianDate {
            year: 1404,
            month: PersianMonth::Esfand,
            day: 30,
        };
        assert!(matches!(
            to_gregorian_date(date),
            Err(CalendarError::InvalidPersianDate { .. })
        ));
    }

    #[test]
    fn month_lengths() {
        assert_eq!(month_length(PersianMonth::Shahrivar, false), 31);
        assert_eq!(month_length(PersianMonth::Mehr, false), 30);
        assert_eq!(month_length(PersianMonth::Esfand, false), 29);
        assert_eq!(month_length(PersianMonth::Esfand, true), 30);
    }
}
