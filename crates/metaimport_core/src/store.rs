use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::ImportConfig;

/// Outcome of a metadata write as the store reports it. `NotWritten` is
/// ambiguous: the store answers the same way for a genuine write failure
/// and for a no-op write where the value was already equal. Callers must
/// disambiguate by comparing the current value against the attempted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteSignal {
    Written,
    NotWritten,
}

/// Seam over the content-management store: URL resolution plus metadata
/// get/set on a resolved post.
pub trait MetaStore {
    fn resolve_url(&mut self, url: &str) -> Result<Option<u64>>;
    fn get_meta(&mut self, post_id: u64, key: &str) -> Result<String>;
    fn set_meta(&mut self, post_id: u64, key: &str, value: &str) -> Result<WriteSignal>;
}

#[derive(Debug, Deserialize)]
struct PostRow {
    id: u64,
}

/// Blocking client for the WordPress REST API. One request per call, no
/// retries or rate limiting: a failed call marks the row or field failed
/// and the run moves on.
pub struct WordPressClient {
    client: Client,
    api_url: String,
    user_agent: String,
    credentials: Option<(String, String)>,
}

impl WordPressClient {
    pub fn from_config(config: &ImportConfig) -> Result<Self> {
        let api_url = config
            .api_url()
            .ok_or_else(|| anyhow!("WP_API_URL is not set (or [store] api_url in the config file)"))?;
        Url::parse(&api_url).with_context(|| format!("invalid WP_API_URL: {api_url}"))?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms()))
            .build()
            .context("failed to build WordPress HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent(),
            credentials: config.credentials(),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", self.user_agent.clone())
            .query(query)
            .send()
            .context("failed to call WordPress REST API")?;
        let status = response.status();
        if !status.is_success() {
            bail!("WordPress REST API request failed with HTTP {status}");
        }
        response
            .json()
            .context("failed to decode WordPress REST API JSON response")
    }

    fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let mut request = self
            .client
            .post(url)
            .header("User-Agent", self.user_agent.clone())
            .json(body);
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }
        let response = request.send().context("failed to call WordPress REST API")?;
        let status = response.status();
        if !status.is_success() {
            bail!("WordPress REST API request failed with HTTP {status}");
        }
        response
            .json()
            .context("failed to decode WordPress REST API JSON response")
    }
}

impl MetaStore for WordPressClient {
    fn resolve_url(&mut self, url: &str) -> Result<Option<u64>> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return Ok(None),
        };

        // Plain permalinks carry the post id directly (?p=123).
        if let Some(id) = parsed
            .query_pairs()
            .find(|(key, _)| key == "p")
            .and_then(|(_, value)| value.parse().ok())
        {
            return Ok(Some(id));
        }

        let Some(slug) = last_path_segment(&parsed) else {
            return Ok(None);
        };
        let response = self.get_json(
            &format!("{}/wp/v2/posts", self.api_url),
            &[("slug", slug.as_str()), ("_fields", "id")],
        )?;
        let rows: Vec<PostRow> =
            serde_json::from_value(response).context("failed to decode post lookup response")?;
        Ok(rows.first().map(|row| row.id))
    }

    fn get_meta(&mut self, post_id: u64, key: &str) -> Result<String> {
        let response = self.get_json(
            &format!("{}/wp/v2/posts/{post_id}", self.api_url),
            &[("_fields", "meta")],
        )?;
        Ok(meta_value(&response, key))
    }

    fn set_meta(&mut self, post_id: u64, key: &str, value: &str) -> Result<WriteSignal> {
        // A write of the value the post already holds is a no-op: the store
        // reports it as not written, and nothing is posted. Without this
        // short-circuit the echoed meta below would equal the new value and
        // a no-op would masquerade as a successful update.
        if self.get_meta(post_id, key)? == value {
            return Ok(WriteSignal::NotWritten);
        }

        let payload = json!({ "meta": { key: value } });
        let response = self.post_json(
            &format!("{}/wp/v2/posts/{post_id}", self.api_url),
            &payload,
        )?;
        // WordPress silently drops writes to unregistered meta keys, so the
        // echoed value is the only reliable signal that the write took.
        if meta_value(&response, key) == value {
            Ok(WriteSignal::Written)
        } else {
            Ok(WriteSignal::NotWritten)
        }
    }
}

fn last_path_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .rev()
        .find(|segment| !segment.is_empty())
        .map(ToString::to_string)
}

fn meta_value(response: &Value, key: &str) -> String {
    match response.get("meta").and_then(|meta| meta.get(key)) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(other) => other.to_string(),
    }
}
