// src/config.rs
//! Environment-driven configuration. Every unset key falls back to a stated
//! default and the fallback is logged.

use anyhow::{bail, Result};

use crate::ingest::reddit::{RedditConfig, DEFAULT_API_URL, DEFAULT_AUTH_URL, DEFAULT_USER_AGENT};

pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_MONGO_DB: &str = "trendlens";
pub const DEFAULT_MONGO_COLLECTION: &str = "reddit_posts";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub reddit: RedditConfig,
    pub store_backend: StoreBackend,
    pub mongo_uri: String,
    pub mongo_db: String,
    pub mongo_collection: String,
    pub bind_addr: String,
    pub cors_origin: String,
}

/// Read `key`, or log and return `default` when unset or blank.
pub fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => {
            tracing::info!(key, default, "using default value");
            default.to_string()
        }
    }
}

/// Like [`env_or`] but never logs the value itself.
fn secret_env_or_empty(key: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => {
            tracing::warn!(key, "unset, using empty value");
            String::new()
        }
    }
}

fn flag(key: &str, default: bool) -> bool {
    let raw = env_or(key, if default { "1" } else { "0" });
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

impl AppConfig {
    pub fn from_env() -> Self {
        let reddit = RedditConfig {
            auth_url: env_or("REDDIT_AUTH_URL", DEFAULT_AUTH_URL),
            api_url: env_or("REDDIT_API_URL", DEFAULT_API_URL),
            user_agent: env_or("REDDIT_USER_AGENT", DEFAULT_USER_AGENT),
            client_id: secret_env_or_empty("REDDIT_CLIENT_ID"),
            client_secret: secret_env_or_empty("REDDIT_CLIENT_SECRET"),
            username: secret_env_or_empty("REDDIT_USERNAME"),
            password: secret_env_or_empty("REDDIT_PASSWORD"),
            cache_token: flag("REDDIT_CACHE_TOKEN", true),
        };

        let store_backend = match env_or("STORE_BACKEND", "mongo").to_ascii_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "mongo" => StoreBackend::Mongo,
            other => {
                tracing::warn!(value = other, "unknown STORE_BACKEND, using mongo");
                StoreBackend::Mongo
            }
        };

        Self {
            reddit,
            store_backend,
            mongo_uri: env_or("MONGO_URI", DEFAULT_MONGO_URI),
            mongo_db: env_or("MONGO_DB", DEFAULT_MONGO_DB),
            mongo_collection: env_or("MONGO_COLLECTION", DEFAULT_MONGO_COLLECTION),
            bind_addr: env_or("BIND_ADDR", DEFAULT_BIND_ADDR),
            cors_origin: env_or("CORS_ORIGIN", DEFAULT_CORS_ORIGIN),
        }
    }

    /// Startup check: the password grant needs all four credentials.
    pub fn validate(&self) -> Result<()> {
        let r = &self.reddit;
        let missing: Vec<&str> = [
            ("REDDIT_CLIENT_ID", &r.client_id),
            ("REDDIT_CLIENT_SECRET", &r.client_secret),
            ("REDDIT_USERNAME", &r.username),
            ("REDDIT_PASSWORD", &r.password),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_empty())
        .map(|(k, _)| k)
        .collect();
        if !missing.is_empty() {
            bail!("missing reddit credentials: {}", missing.join(", "));
        }
        Ok(())
    }
}
