use std::{collections::HashMap, fs, path::Path};

use anyhow::{anyhow, Context, Result};
use url::Url;

pub const SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub http_url: String,
    /// Derived from `http_url` when unset.
    pub ws_url: Option<String>,
    pub database_url: String,
    pub log_filter: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            http_url: "http://127.0.0.1:4000/graphql".into(),
            ws_url: None,
            database_url: "sqlite://./data/client.db".into(),
            log_filter: "info".into(),
        }
    }
}

impl ClientSettings {
    pub fn http_endpoint(&self) -> Result<Url> {
        let url = Url::parse(&self.http_url)
            .with_context(|| format!("invalid http url '{}'", self.http_url))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(anyhow!("http url must use http or https, got '{other}'")),
        }
    }

    pub fn socket_endpoint(&self) -> Result<Url> {
        let raw = match &self.ws_url {
            Some(ws_url) => ws_url.clone(),
            None => derive_socket_url(&self.http_url)?,
        };
        let url = Url::parse(&raw).with_context(|| format!("invalid websocket url '{raw}'"))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(anyhow!("websocket url must use ws or wss, got '{other}'")),
        }
    }

    fn apply_file(&mut self, raw: &str) -> Result<()> {
        let file_cfg = toml::from_str::<HashMap<String, String>>(raw)
            .context("failed to parse client settings file")?;
        if let Some(v) = file_cfg.get("http_url") {
            self.http_url = v.clone();
        }
        if let Some(v) = file_cfg.get("ws_url") {
            self.ws_url = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("database_url") {
            self.database_url = v.clone();
        }
        if let Some(v) = file_cfg.get("log_filter") {
            self.log_filter = v.clone();
        }
        Ok(())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("GRAPHQL_HTTP_URL") {
            self.http_url = v;
        }
        if let Some(v) = var("APP__HTTP_URL") {
            self.http_url = v;
        }

        if let Some(v) = var("GRAPHQL_WS_URL") {
            self.ws_url = Some(v);
        }
        if let Some(v) = var("APP__WS_URL") {
            self.ws_url = Some(v);
        }

        if let Some(v) = var("DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = var("APP__DATABASE_URL") {
            self.database_url = v;
        }

        if let Some(v) = var("APP__LOG_FILTER") {
            self.log_filter = v;
        }
    }
}

/// Defaults, then `client.toml` in the working directory, then environment.
pub fn load_settings() -> Result<ClientSettings> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    var: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        settings
            .apply_file(&raw)
            .with_context(|| format!("in settings file '{}'", path.display()))?;
    }
    settings.apply_env(var);

    Ok(settings)
}

fn derive_socket_url(http_url: &str) -> Result<String> {
    if http_url.starts_with("https://") {
        Ok(http_url.replacen("https://", "wss://", 1))
    } else if http_url.starts_with("http://") {
        Ok(http_url.replacen("http://", "ws://", 1))
    } else {
        Err(anyhow!("http_url must start with http:// or https://"))
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
