// src/ingest/reddit.rs
//! Reddit source: password-grant OAuth exchange followed by one GET of the hot
//! listing. Both calls share a client with a fixed user agent and timeout.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;
use serde_json::{Number, Value};
use tokio::sync::Mutex;

use crate::ingest::types::{SourceError, TrendingSource};
use crate::model::TrendingItem;

pub const DEFAULT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const DEFAULT_API_URL: &str = "https://oauth.reddit.com";
pub const DEFAULT_USER_AGENT: &str = "TrendlensBot/0.1";
pub const HOT_LISTING_PATH: &str = "/r/all/hot";
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

// refresh a cached token this long before it expires
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub auth_url: String,
    pub api_url: String,
    pub user_agent: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    /// Reuse the bearer token until shortly before `expires_in` runs out.
    pub cache_token: bool,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            username: String::new(),
            password: String::new(),
            cache_token: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct RedditClient {
    cfg: RedditConfig,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl RedditClient {
    pub fn new(cfg: RedditConfig) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(Duration::from_secs(4))
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Transport(format!("building http client: {e}")))?;
        Ok(Self {
            cfg,
            http,
            token: Mutex::new(None),
        })
    }

    pub fn listing_url(&self) -> String {
        format!("{}{}", self.cfg.api_url.trim_end_matches('/'), HOT_LISTING_PATH)
    }

    async fn request_token(&self) -> Result<TokenResponse, SourceError> {
        let form = [
            ("grant_type", "password"),
            ("username", self.cfg.username.as_str()),
            ("password", self.cfg.password.as_str()),
        ];
        let resp = self
            .http
            .post(&self.cfg.auth_url)
            .basic_auth(&self.cfg.client_id, Some(&self.cfg.client_secret))
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        match status.as_u16() {
            400 | 401 | 403 => {
                return Err(SourceError::Authentication(format!(
                    "token endpoint returned HTTP {}",
                    status.as_u16()
                )))
            }
            _ if !status.is_success() => return Err(SourceError::Status(status.as_u16())),
            _ => {}
        }

        let body = resp.text().await?;
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| SourceError::Authentication(format!("unreadable token response: {e}")))?;

        // Reddit answers bad credentials with 200 + {"error": "..."}
        if let Some(err) = token.error.as_deref() {
            return Err(SourceError::Authentication(err.to_string()));
        }
        if token.access_token.is_empty() {
            return Err(SourceError::Authentication(
                "token response has no access_token".to_string(),
            ));
        }
        tracing::debug!(
            token_type = token.token_type.as_str(),
            expires_in = ?token.expires_in,
            "obtained reddit access token"
        );
        Ok(token)
    }

    async fn bearer_token(&self) -> Result<String, SourceError> {
        if !self.cfg.cache_token {
            return Ok(self.request_token().await?.access_token);
        }

        let mut slot = self.token.lock().await;
        if let Some(cached) = slot.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        let fresh = self.request_token().await?;
        let ttl = Duration::from_secs(fresh.expires_in.unwrap_or(0));
        *slot = Some(CachedToken {
            value: fresh.access_token.clone(),
            expires_at: Instant::now() + ttl,
        });
        Ok(fresh.access_token)
    }

    async fn forget_token(&self) {
        *self.token.lock().await = None;
    }
}

#[async_trait]
impl TrendingSource for RedditClient {
    async fn fetch_trending(&self) -> Result<Vec<TrendingItem>, SourceError> {
        let token = self.bearer_token().await?;

        let resp = self
            .http
            .get(self.listing_url())
            .bearer_auth(&token)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            self.forget_token().await;
            return Err(SourceError::Authentication(format!(
                "listing rejected token with HTTP {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = resp.text().await?;
        parse_listing(&body)
    }

    fn name(&self) -> &'static str {
        "reddit"
    }
}

#[derive(Debug, Deserialize)]
struct RawChild {
    data: Option<RawPost>,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: Option<String>,
    title: Option<String>,
    ups: Option<Number>,
    downs: Option<Number>,
}

/// Decode `data.children[*].data` into items. A missing `data` object or
/// `children` array is an error; a malformed child is skipped.
pub fn parse_listing(body: &str) -> Result<Vec<TrendingItem>, SourceError> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| SourceError::ResponseShape(format!("body is not JSON: {e}")))?;
    let data = root
        .get("data")
        .filter(|d| d.is_object())
        .ok_or_else(|| SourceError::ResponseShape("missing `data` object".to_string()))?;
    let children = data
        .get("children")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::ResponseShape("missing `data.children` array".to_string()))?;

    let mut out = Vec::with_capacity(children.len());
    let mut skipped = 0u64;
    for child in children {
        match parse_child(child) {
            Some(item) => out.push(item),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!(target: "ingest", skipped, "skipped malformed listing entries");
        counter!("ingest_items_skipped_total").increment(skipped);
    }
    Ok(out)
}

fn parse_child(child: &Value) -> Option<TrendingItem> {
    let post = RawChild::deserialize(child).ok()?.data?;
    let external_id = post.id.filter(|id| !id.trim().is_empty())?;
    let title = crate::ingest::normalize_title(&post.title?);
    Some(TrendingItem {
        external_id,
        title,
        upvote_count: count(&post.ups?)?,
        downvote_count: count(&post.downs?)?,
    })
}

/// Non-negative whole number; floats such as `12.0` are accepted.
fn count(n: &Number) -> Option<u64> {
    n.as_u64().or_else(|| {
        n.as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_children() {
        let body = r#"{"kind":"Listing","data":{"children":[
            {"kind":"t3","data":{"id":"a1","title":"First &amp; best","ups":10,"downs":2}},
            {"kind":"t3","data":{"id":"b2","title":"Second","ups":3.0,"downs":0}}
        ]}}"#;
        let items = parse_listing(body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].external_id, "a1");
        assert_eq!(items[0].title, "First & best");
        assert_eq!(items[0].upvote_count, 10);
        assert_eq!(items[0].downvote_count, 2);
        assert_eq!(items[1].upvote_count, 3);
    }

    #[test]
    fn malformed_children_are_skipped() {
        let body = r#"{"data":{"children":[
            {"data":{"id":"ok","title":"kept","ups":1,"downs":0}},
            {"data":{"id":"no-title","ups":1,"downs":0}},
            {"data":{"id":"neg","title":"x","ups":-4,"downs":0}},
            {"data":{"id":"str","title":"x","ups":"many","downs":0}},
            {"nodata":true},
            42
        ]}}"#;
        let items = parse_listing(body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].external_id, "ok");
    }

    #[test]
    fn top_level_shape_errors() {
        assert!(matches!(
            parse_listing(r#"{"kind":"Listing"}"#),
            Err(SourceError::ResponseShape(_))
        ));
        assert!(matches!(
            parse_listing(r#"{"data":{"children":{}}}"#),
            Err(SourceError::ResponseShape(_))
        ));
        assert!(matches!(
            parse_listing(r#"{"data":[]}"#),
            Err(SourceError::ResponseShape(_))
        ));
        assert!(matches!(
            parse_listing("<html>busy</html>"),
            Err(SourceError::ResponseShape(_))
        ));
    }

    #[test]
    fn empty_children_is_an_empty_batch() {
        let items = parse_listing(r#"{"data":{"children":[]}}"#).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn listing_url_joins_without_double_slash() {
        let client = RedditClient::new(RedditConfig {
            api_url: "http://127.0.0.1:9/".into(),
            ..RedditConfig::default()
        })
        .unwrap();
        assert_eq!(client.listing_url(), "http://127.0.0.1:9/r/all/hot");
    }
}
