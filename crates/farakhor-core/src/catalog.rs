//! Occasion catalog access.
//!
//! The backing endpoint returns the whole catalog as `{ "occasions": [...] }`
//! with no month or year scoping; narrowing to the displayed month happens
//! here with [`filter_by_month`] and [`sort_by_display_day`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::occasion::{Occasion, OccasionRecord, RecordError};

pub const OCCASIONS_PATH: &str = "/api/occasions";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid occasions endpoint {url:?}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("occasions request failed with status {status}")]
    Status { status: u16 },

    #[error("occasions request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to read occasion catalog {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("occasions payload is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("occasion #{index} is invalid: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: RecordError,
    },
}

pub trait OccasionSource {
    fn fetch_occasions(&self) -> impl Future<Output = Result<Vec<Occasion>, FetchError>> + Send;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    occasions: Option<Vec<OccasionRecord>>,
}

/// Decodes the catalog envelope. A missing or null `occasions` field is an
/// empty catalog; any record failing validation fails the whole payload.
pub fn decode_envelope(body: &str) -> Result<Vec<Occasion>, FetchError> {
    let envelope: Envelope = serde_json::from_str(body)?;
    envelope
        .occasions
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            Occasion::try_from(record).map_err(|source| FetchError::InvalidRecord { index, source })
        })
        .collect()
}

pub fn filter_by_month(occasions: &[Occasion], month_name: &str) -> Vec<Occasion> {
    occasions
        .iter()
        .filter(|occasion| occasion.month.name() == month_name)
        .cloned()
        .collect()
}

/// Stable: occasions on the same day keep their catalog order.
pub fn sort_by_display_day(mut occasions: Vec<Occasion>, is_leap: bool) -> Vec<Occasion> {
    occasions.sort_by_key(|occasion| occasion.display_day(is_leap));
    occasions
}

pub fn occasions_url(base_url: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidEndpoint {
        url: base_url.to_string(),
        reason,
    };

    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(invalid("base URL is empty".to_string()));
    }
    let base = Url::parse(trimmed).map_err(|err| invalid(err.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", base.scheme())));
    }
    base.join(OCCASIONS_PATH)
        .map_err(|err| invalid(err.to_string()))
}

#[derive(Debug, Clone)]
pub struct HttpOccasionSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpOccasionSource {
    /// No timeout unless one is given; a hung request keeps the month loading.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let url = occasions_url(base_url)?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        debug!(url = %url, ?timeout, "configured occasions endpoint");
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl OccasionSource for HttpOccasionSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_occasions(&self) -> Result<Vec<Occasion>, FetchError> {
        let response = self
            .client
            .get(self.url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "occasions endpoint returned failure status");
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let occasions = decode_envelope(&body)?;
        debug!(count = occasions.len(), "fetched occasions");
        Ok(occasions)
    }
}

/// Reads the same envelope from a local JSON file.
#[derive(Debug, Clone)]
pub struct FileOccasionSource {
    path: PathBuf,
}

impl FileOccasionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OccasionSource for FileOccasionSource {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch_occasions(&self) -> Result<Vec<Occasion>, FetchError> {
        let body = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| FetchError::Io {
                path: self.path.clone(),
                source,
            })?;
        let occasions = decode_envelope(&body)?;
        debug!(count = occasions.len(), "read occasions from file");
        Ok(occasions)
    }
}

#[derive(Debug, Clone)]
pub enum CatalogSource {
    Http(HttpOccasionSource),
    File(FileOccasionSource),
}

impl CatalogSource {
    pub fn describe(&self) -> String {
        match self {
            CatalogSource::Http(source) => source.url().to_string(),
            CatalogSource::File(source) => source.path().display().to_string(),
        }
    }
}

impl OccasionSource for CatalogSource {
    async fn fetch_occasions(&self) -> Result<Vec<Occasion>, FetchError> {
        match self {
            CatalogSource::Http(source) => source.fetch_occasions().await,
            CatalogSource::File(source) => source.fetch_occasions().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::PersianMonth;

    const CATALOG: &str = r#"{
        "occasions": [
            {"ShortTitle": "سیزده بدر", "EventTitle": "روز طبیعت", "Georgian": "2,4", "GeorgianK": "1,4",
             "PersianDayNumber": 13, "PersianDayNumberK": 13, "Month": "فروردین", "ModalStatus": true},
            {"ShortTitle": "نوروز", "EventTitle": "جشن نوروز", "Georgian": "21,3", "GeorgianK": "20,3",
             "PersianDayNumber": 1, "PersianDayNumberK": 1, "Month": "فروردین", "LogoLink": ""},
            {"ShortTitle": "اردیبهشتگان", "EventTitle": "جشن اردیبهشتگان", "Georgian": "22,4", "GeorgianK": "21,4",
             "PersianDayNumber": 2, "PersianDayNumberK": 2, "Month": "اردیبهشت", "importantDay": true}
        ]
    }"#;

    fn titles(occasions: &[Occasion]) -> Vec<&str> {
        occasions
            .iter()
            .map(|occasion| occasion.short_title.as_str())
            .collect()
    }

    #[test]
    fn decodes_catalog_envelope() {
        let occasions = decode_envelope(CATALOG).expect("decode");
        assert_eq!(occasions.len(), 3);
        assert_eq!(occasions[1].logo_link, None);
        assert!(occasions[2].important_day);
        assert_eq!(occasions[2].month, PersianMonth::Ordibehesht);
    }

    #[test]
    fn missing_or_null_occasions_is_empty() {
        assert!(decode_envelope("{}").expect("decode").is_empty());
        assert!(
            decode_envelope(r#"{"occasions": null}"#)
                .expect("decode")
                .is_empty()
        );
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        assert!(matches!(
            decode_envelope("<html>"),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn invalid_record_reports_its_index() {
        let body = r#"{"occasions": [{"ShortTitle": "x", "Month": "فروردین"}]}"#;
        assert!(matches!(
            decode_envelope(body),
            Err(FetchError::InvalidRecord { index: 0, .. })
        ));
    }

    #[test]
    fn filters_by_exact_month_name() {
        let occasions = decode_envelope(CATALOG).expect("decode");
        let farvardin = filter_by_month(&occasions, "فروردین");
        assert_eq!(titles(&farvardin), vec!["سیزده بدر", "نوروز"]);
        assert!(filter_by_month(&occasions, "Farvardin").is_empty());
        assert!(filter_by_month(&[], "فروردین").is_empty());
    }

    #[test]
    fn sorts_by_leap_adjusted_day() {
        let occasions = decode_envelope(CATALOG).expect("decode");
        let sorted = sort_by_display_day(filter_by_month(&occasions, "فروردین"), false);
        assert_eq!(titles(&sorted), vec!["نوروز", "سیزده بدر"]);
    }

    #[test]
    fn sort_uses_kabise_day_numbers_in_leap_years() {
        let body = r#"{"occasions": [
            {"ShortTitle": "a", "EventTitle": "a", "Georgian": "1,1", "GeorgianK": "1,1",
             "PersianDayNumber": 1, "PersianDayNumberK": 9, "Month": "دی"},
            {"ShortTitle": "b", "EventTitle": "b", "Georgian": "1,1", "GeorgianK": "1,1",
             "PersianDayNumber": 5, "PersianDayNumberK": 2, "Month": "دی"}
        ]}"#;
        let occasions = decode_envelope(body).expect("decode");
        assert_eq!(
            titles(&sort_by_display_day(occasions.clone(), false)),
            vec!["a", "b"]
        );
        assert_eq!(titles(&sort_by_display_day(occasions, true)), vec!["b", "a"]);
    }

    #[test]
    fn sort_is_stable_for_equal_days() {
        let body = r#"{"occasions": [
            {"ShortTitle": "first", "EventTitle": "x", "Georgian": "1,1", "GeorgianK": "1,1",
             "PersianDayNumber": 4, "PersianDayNumberK": 4, "Month": "تیر"},
            {"ShortTitle": "early", "EventTitle": "x", "Georgian": "1,1", "GeorgianK": "1,1",
             "PersianDayNumber": 1, "PersianDayNumberK": 1, "Month": "تیر"},
            {"ShortTitle": "second", "EventTitle": "x", "Georgian": "1,1", "GeorgianK": "1,1",
             "PersianDayNumber": 4, "PersianDayNumberK": 4, "Month": "تیر"},
            {"ShortTitle": "third", "EventTitle": "x", "Georgian": "1,1", "GeorgianK": "1,1",
             "PersianDayNumber": 4, "PersianDayNumberK": 4, "Month": "تیر"}
        ]}"#;
        let sorted = sort_by_display_day(decode_envelope(body).expect("decode"), false);
        assert_eq!(titles(&sorted), vec!["early", "first", "second", "third"]);
    }

    #[test]
    fn builds_endpoint_from_base_url() {
        let url = occasions_url("https://gahshomar.example/").expect("url");
        assert_eq!(url.as_str(), "https://gahshomar.example/api/occasions");
        assert!(matches!(
            occasions_url(""),
            Err(FetchError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            occasions_url("ftp://gahshomar.example"),
            Err(FetchError::InvalidEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn file_source_reads_envelope() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("occasions.json");
        std::fs::write(&path, CATALOG).expect("write catalog");

        let occasions = FileOccasionSource::new(&path)
            .fetch_occasions()
            .await
            .expect("fetch");
        assert_eq!(occasions.len(), 3);
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = FileOccasionSource::new(dir.path().join("absent.json"))
            .fetch_occasions()
            .await;
        assert!(matches!(result, Err(FetchError::Io { .. })));
    }
}
