// src/remote.rs
use crate::clock::{parse_remote_timestamp, Clock};
use crate::config::RemoteConfig;
use crate::error::{GuestbookError, GuestbookResult, StoreError, StoreResult};
use crate::models::GuestbookEntry;
use crate::store::{BackendStatus, GuestbookBackend, Mutation};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_RANGE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const SELECT_COLUMNS: &str = "id,name,message,created_at";

/// Guestbook rows kept in a hosted PostgREST table (Supabase).
///
/// The table only has `id, name, message, created_at`, so this backend can
/// append and list but not edit or delete.
pub struct RemoteBackend {
    client: Client,
    base_url: String,
    api_key: String,
    table: String,
    clock: Clock,
}

#[derive(Deserialize, Debug)]
struct RemoteRow {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    created_at: String,
}

#[derive(Serialize)]
struct InsertRow<'a> {
    name: &'a str,
    message: &'a str,
}

impl RemoteBackend {
    pub fn new(config: &RemoteConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let backend = Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            table: config.table.clone(),
            clock: Clock::default(),
        };
        log::info!(
            "Remote backend host={} key={} table={}",
            host_of(&backend.base_url),
            mask_key(&backend.api_key),
            backend.table
        );
        Ok(backend)
    }

    /// Display zone and format for converted `created_at` values.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn table_url(&self) -> String {
        table_url(&self.base_url, &self.table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn count_rows(&self) -> StoreResult<Option<usize>> {
        let response = self
            .authorized(self.client.get(self.table_url()))
            .query(&[("select", "id"), ("limit", "1")])
            .header("Prefer", "count=exact")
            .send()?
            .error_for_status()?;

        Ok(response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total))
    }
}

impl GuestbookBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn fetch(&self, limit: Option<usize>) -> StoreResult<Vec<GuestbookEntry>> {
        log::debug!("SELECT table={} limit={:?} order=created_at desc", self.table, limit);
        let response = self
            .authorized(self.client.get(self.table_url()))
            .query(&select_query(limit))
            .send()?
            .error_for_status()?;

        let rows: Vec<RemoteRow> = response.json()?;
        log::debug!("SELECT returned {} rows", rows.len());
        Ok(rows_to_entries(rows, &self.clock))
    }

    fn insert(&self, entry: GuestbookEntry) -> StoreResult<GuestbookEntry> {
        if entry.is_protected() {
            log::warn!("Remote table has no password column; entry will be stored unprotected");
        }
        log::debug!("INSERT table={} name={:?} message_len={}", self.table, entry.name, entry.message.len());

        let response = self
            .authorized(self.client.post(self.table_url()))
            .header("Prefer", "return=representation")
            .json(&[InsertRow {
                name: &entry.name,
                message: &entry.message,
            }])
            .send()?
            .error_for_status()?;

        let rows: Vec<RemoteRow> = response.json()?;
        rows_to_entries(rows, &self.clock)
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Protocol("insert returned no row".to_string()))
    }

    fn transact(&self, _mutation: &mut Mutation<'_>) -> GuestbookResult<()> {
        Err(GuestbookError::Unsupported {
            backend: self.name(),
            operation: "editing or deleting entries",
        })
    }

    fn status(&self) -> BackendStatus {
        let location = format!("{} (table {})", host_of(&self.base_url), self.table);
        match self.count_rows() {
            Ok(entries) => BackendStatus {
                backend: self.name(),
                location,
                reachable: true,
                entries,
                error: None,
            },
            Err(e) => {
                log::warn!("Remote status check failed: {}", e);
                BackendStatus {
                    backend: self.name(),
                    location,
                    reachable: false,
                    entries: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

fn table_url(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table)
}

fn select_query(limit: Option<usize>) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("select", SELECT_COLUMNS.to_string()),
        ("order", "created_at.desc".to_string()),
    ];
    if let Some(limit) = limit {
        query.push(("limit", limit.to_string()));
    }
    query
}

/// Converts rows into entries, newest first by `created_at`.
fn rows_to_entries(rows: Vec<RemoteRow>, clock: &Clock) -> Vec<GuestbookEntry> {
    let mut rows: Vec<_> = rows
        .into_iter()
        .map(|row| (parse_remote_timestamp(&row.created_at), row))
        .collect();
    // Server order stands unless every timestamp parses.
    if rows.iter().all(|(created_at, _)| created_at.is_some()) {
        rows.sort_by(|(a, _), (b, _)| b.cmp(a));
    }

    rows.into_iter()
        .map(|(_, row)| GuestbookEntry {
            id: id_to_string(&row.id),
            date: clock.render_remote(&row.created_at),
            name: row.name,
            message: row.message,
            password_hash: None,
        })
        .collect()
}

fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Total from a PostgREST `Content-Range` header such as `0-0/42`.
fn parse_content_range_total(value: &str) -> Option<usize> {
    value.rsplit_once('/').and_then(|(_, total)| total.trim().parse().ok())
}

fn host_of(url: &str) -> String {
    match url.split_once("//") {
        Some((_, rest)) => rest.split('/').next().unwrap_or(rest).to_string(),
        None if url.is_empty() => "(no-url)".to_string(),
        None => url.to_string(),
    }
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.is_empty() {
        return "(no-key)".to_string();
    }
    if chars.len() <= 10 {
        return "***".to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::DEFAULT_DATE_FORMAT;
    use serde_json::json;

    fn kst() -> Clock {
        Clock::new(Some(540), DEFAULT_DATE_FORMAT)
    }

    fn rows(value: Value) -> Vec<RemoteRow> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_table_url_and_query() {
        assert_eq!(
            table_url("https://abc.supabase.co/", "guestbook"),
            "https://abc.supabase.co/rest/v1/guestbook"
        );
        let query = select_query(Some(5));
        assert!(query.contains(&("order", "created_at.desc".to_string())));
        assert!(query.contains(&("limit", "5".to_string())));
        assert!(!select_query(None).iter().any(|(key, _)| *key == "limit"));
    }

    #[test]
    fn test_rows_are_converted_and_sorted_newest_first() {
        let entries = rows_to_entries(
            rows(json!([
                {"id": 1, "name": "Alice", "message": "Hello", "created_at": "2024-03-01T03:00:00+00:00"},
                {"id": "b-2", "name": "Bob", "message": "Hi", "created_at": "2024-03-02T03:00:00+00:00"}
            ])),
            &kst(),
        );

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "b-2");
        assert_eq!(entries[0].name, "Bob");
        assert_eq!(entries[0].date, "2024-03-02 12:00");
        assert_eq!(entries[1].id, "1");
        assert!(entries.iter().all(|e| e.password_hash.is_none()));
    }

    #[test]
    fn test_unparsable_timestamps_keep_server_order() {
        let entries = rows_to_entries(
            rows(json!([
                {"id": 1, "name": "A", "message": "m", "created_at": "yesterday"},
                {"id": 2, "name": "B", "message": "m", "created_at": "earlier"}
            ])),
            &kst(),
        );
        assert_eq!(entries[0].id, "1");
        assert_eq!(entries[1].id, "2");
    }

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("0-0/42"), Some(42));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-0/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_host_and_key_masking() {
        assert_eq!(host_of("https://abc.supabase.co/rest"), "abc.supabase.co");
        assert_eq!(host_of(""), "(no-url)");
        assert_eq!(mask_key("eyJhbGciOiJIUzI1NiJ9.payload.sig0"), "eyJhbG...sig0");
        assert_eq!(mask_key(""), "(no-key)");
        assert_eq!(mask_key("short"), "***");
    }

    #[test]
    fn test_edits_are_unsupported() {
        let backend = RemoteBackend::new(&RemoteConfig {
            url: "https://abc.supabase.co".to_string(),
            api_key: "key".to_string(),
            ..RemoteConfig::default()
        })
        .unwrap();
        let result = backend.transact(&mut |_entries: &mut Vec<GuestbookEntry>| -> GuestbookResult<()> { Ok(()) });
        assert!(matches!(result, Err(GuestbookError::Unsupported { backend: "remote", .. })));
    }
}
