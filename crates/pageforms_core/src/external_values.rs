use std::collections::BTreeMap;
use std::thread::sleep;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::config::{env_parse, env_string};
use crate::error::{AutocompleteError, Result};
use crate::request::{LookupQuery, ValueSource};

const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_RETRIES: usize = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;
const DEFAULT_USER_AGENT: &str = "pageforms/0.2 (autocomplete)";
const SUBSTRING_PLACEHOLDER: &str = "<substr>";

pub trait ExternalFetcher: Send + Sync {
    /// Body of a GET request to `url`.
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Blocking HTTP fetcher with bounded retries.
pub struct HttpFetcher {
    client: Client,
    user_agent: String,
    retries: usize,
    retry_delay_ms: u64,
}

impl HttpFetcher {
    /// Reads `PAGEFORMS_HTTP_TIMEOUT_MS`, `PAGEFORMS_HTTP_RETRIES`,
    /// `PAGEFORMS_HTTP_RETRY_DELAY_MS` and `PAGEFORMS_USER_AGENT`.
    pub fn from_env() -> Result<Self> {
        let timeout_ms = env_parse::<u64>("PAGEFORMS_HTTP_TIMEOUT_MS").unwrap_or(DEFAULT_TIMEOUT_MS);
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self {
            client,
            user_agent: env_string("PAGEFORMS_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            retries: env_parse("PAGEFORMS_HTTP_RETRIES").unwrap_or(DEFAULT_RETRIES),
            retry_delay_ms: env_parse("PAGEFORMS_HTTP_RETRY_DELAY_MS")
                .unwrap_or(DEFAULT_RETRY_DELAY_MS),
        })
    }
}

impl ExternalFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        let mut last_error = None::<String>;
        for attempt in 0..=self.retries {
            if attempt > 0 {
                sleep(Duration::from_millis(
                    self.retry_delay_ms.saturating_mul(attempt as u64),
                ));
            }
            let response = self
                .client
                .get(url)
                .header("User-Agent", self.user_agent.clone())
                .send();
            match response {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.text()?);
                }
                Ok(response) => {
                    last_error = Some(format!("HTTP {}", response.status()));
                }
                Err(error) => {
                    last_error = Some(error.to_string());
                }
            }
            warn!(url, attempt, error = last_error.as_deref(), "external autocomplete request failed");
        }
        let message = last_error.unwrap_or_else(|| "external request failed".to_string());
        Err(AutocompleteError::query_failed("http_error", message))
    }
}

/// Records from a configured remote endpoint, passed through unchanged.
pub struct ExternalUrlLookup<'a> {
    pub fetcher: &'a dyn ExternalFetcher,
    pub urls: &'a BTreeMap<String, String>,
    pub alias: &'a str,
}

impl ExternalUrlLookup<'_> {
    fn request_url(&self, substring: &str) -> Result<Url> {
        let template = self.urls.get(self.alias).ok_or_else(|| {
            AutocompleteError::InvalidSelector(format!("unknown external URL alias: {}", self.alias))
        })?;
        let encoded = url::form_urlencoded::byte_serialize(substring.as_bytes()).collect::<String>();
        let url = template.replace(SUBSTRING_PLACEHOLDER, &encoded);
        Url::parse(&url).map_err(|error| {
            AutocompleteError::InvalidSelector(format!("bad URL for {}: {error}", self.alias))
        })
    }
}

impl ValueSource for ExternalUrlLookup<'_> {
    type Item = Map<String, Value>;

    fn lookup(&self, query: &LookupQuery<'_>) -> Result<Vec<Map<String, Value>>> {
        let url = self.request_url(query.substring.unwrap_or_default())?;
        debug!(url = url.as_str(), "fetching external autocomplete values");
        let body = self.fetcher.fetch(url.as_str())?;
        let mut records = parse_records(&body)?;
        records.truncate(query.limit);
        Ok(records)
    }
}

fn parse_records(body: &str) -> Result<Vec<Map<String, Value>>> {
    if body.trim().is_empty() {
        return Err(AutocompleteError::query_failed(
            "pf_autocomplete_noreturn",
            "the external URL returned no data",
        ));
    }
    let bad_json = |detail: String| {
        AutocompleteError::query_failed(
            "pf_autocomplete_badjson",
            format!("the external URL returned malformed JSON: {detail}"),
        )
    };
    let payload: Value = serde_json::from_str(body).map_err(|error| bad_json(error.to_string()))?;
    let entries = match payload.get("pfautocomplete") {
        None => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(bad_json("pfautocomplete is not an array".to_string())),
    };
    entries
        .iter()
        .map(|entry| match entry {
            Value::Object(record) => Ok(record.clone()),
            _ => Err(bad_json("pfautocomplete entry is not an object".to_string())),
        })
        .collect()
}
