// MIT License
// Copyright (c) 2024 Graham King

use tracing::warn;

use super::db::ARTICLE_COLUMNS;
use super::{ArticleStore, StoreError};
use crate::article::Article;
use crate::config::SupabaseCredentials;

// PostgREST caps responses, Supabase defaults to 1000 rows
const PAGE_SIZE: usize = 1000;

/// Read-only client for the `articles` table behind Supabase's REST API
pub struct SupabaseStore {
    client: reqwest::blocking::Client,
    endpoint: String,
    key: String,
}

impl SupabaseStore {
    pub fn new(creds: SupabaseCredentials) -> SupabaseStore {
        SupabaseStore {
            client: reqwest::blocking::Client::new(),
            endpoint: format!("{}/rest/v1/articles", creds.url.trim_end_matches('/')),
            key: creds.service_key,
        }
    }

    fn fetch(
        &self,
        filters: &[(&str, String)],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        let res = self
            .client
            .get(&self.endpoint)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .query(&[
                ("select", ARTICLE_COLUMNS.replace(' ', "")),
                ("order", "created_at.asc,id.asc".to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ])
            .query(filters)
            .send()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if res.status() != http::StatusCode::OK {
            return Err(StoreError::Unavailable(format!(
                "HTTP error {} {:?}",
                res.status(),
                res.text()
            )));
        }
        res.json().map_err(|e| StoreError::Decode(e.to_string()))
    }

    fn fetch_one(&self, filters: &[(&str, String)]) -> Result<Option<Article>, StoreError> {
        Ok(decode_rows(self.fetch(filters, 1, 0)?).into_iter().next())
    }

    fn fetch_all(&self, filters: &[(&str, String)]) -> Result<Vec<Article>, StoreError> {
        let mut out = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.fetch(filters, PAGE_SIZE, offset)?;
            offset += page.len();
            let done = page.len() < PAGE_SIZE;
            out.extend(decode_rows(page));
            if done {
                break;
            }
        }
        Ok(out)
    }
}

/// Rows that don't decode (null title, unknown status) are logged and dropped
fn decode_rows(rows: Vec<serde_json::Value>) -> Vec<Article> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.get("id").cloned().unwrap_or_default();
            serde_json::from_value(row)
                .map_err(|e| warn!("Skipping unreadable article {id}: {e}"))
                .ok()
        })
        .collect()
}

/// PostgREST `like` filter matching `needle` literally anywhere in the column
fn contains_filter(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_' | '*') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("like.*{escaped}*")
}

impl ArticleStore for SupabaseStore {
    fn with_license(&self) -> Result<Vec<Article>, StoreError> {
        self.fetch_all(&[("license", "not.is.null".to_string())])
    }

    fn license_containing(&self, needle: &str) -> Result<Option<Article>, StoreError> {
        self.fetch_one(&[("license", contains_filter(needle))])
    }

    fn by_slug(&self, slug: &str) -> Result<Option<Article>, StoreError> {
        self.fetch_one(&[("slug", format!("eq.{slug}"))])
    }

    fn all(&self) -> Result<Vec<Article>, StoreError> {
        self.fetch_all(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_filter_escapes_wildcards() {
        assert_eq!(
            contains_filter("https://a.org/x_y"),
            r"like.*https://a.org/x\_y*"
        );
        assert_eq!(
            contains_filter(r"https://a.org/100%*\"),
            r"like.*https://a.org/100\%\*\\*"
        );
        assert_eq!(
            contains_filter("https://cdc.gov/a"),
            "like.*https://cdc.gov/a*"
        );
    }

    #[test]
    fn bad_rows_dropped() {
        let rows: Vec<serde_json::Value> = serde_json::from_str(
            r#"[
                {"id": "1", "title": "Sleep Tips", "slug": "sleep-tips", "status": "published"},
                {"id": "2", "title": null, "slug": "no-title", "status": "published"},
                {"id": "3", "title": "Odd", "slug": "odd", "status": "review"},
                {"id": 4, "title": "Colic", "slug": "colic", "license": null, "body_md": null}
            ]"#,
        )
        .unwrap();
        let ids: Vec<String> = decode_rows(rows).into_iter().map(|a| a.id).collect();
        assert_eq!(ids, ["1", "4"]);
    }
}
