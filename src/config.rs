use crate::errors::Result;
use crate::types::Document;
use serde::Deserialize;
use std::path::Path;

/// Settings shared by every query built from a [`crate::Context`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Seeds the `safe` option of new queries.
    pub safe_writes: bool,
    /// Merged into the options of new queries after `safe`.
    pub default_options: Document,
    /// Channel capacity when a stream is piped to a push consumer.
    pub stream_buffer: usize,
    /// Log each dispatch at `info` instead of `debug`.
    pub verbose: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { safe_writes: true, default_options: Document::new(), stream_buffer: 16, verbose: false }
    }
}

impl QueryConfig {
    /// # Errors
    /// Returns a configuration error when `text` is not valid TOML for this shape.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// # Errors
    /// I/O failures reading `path`, or an invalid TOML body.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Defaults overlaid with `DOCQUERY_SAFE_WRITES`, `DOCQUERY_STREAM_BUFFER`
    /// and `DOCQUERY_VERBOSE`. Unparseable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(b) = env_flag("DOCQUERY_SAFE_WRITES") {
            cfg.safe_writes = b;
        }
        if let Some(n) = std::env::var("DOCQUERY_STREAM_BUFFER").ok().and_then(|s| s.parse::<usize>().ok()) {
            cfg.stream_buffer = n;
        }
        if let Some(b) = env_flag("DOCQUERY_VERBOSE") {
            cfg.verbose = b;
        }
        cfg
    }

    /// Options every new query starts with.
    #[must_use]
    pub fn base_options(&self) -> Document {
        let mut out = Document::new();
        out.insert("safe", self.safe_writes);
        for (k, v) in &self.default_options {
            out.insert(k.clone(), v.clone());
        }
        out
    }

    pub(crate) const fn dispatch_level(&self) -> log::Level {
        if self.verbose { log::Level::Info } else { log::Level::Debug }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let v = std::env::var(name).ok()?;
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn base_options_seed_safe_first() {
        let cfg = QueryConfig { default_options: doc! { "w": 1 }, ..QueryConfig::default() };
        assert_eq!(cfg.base_options(), doc! { "safe": true, "w": 1 });
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = QueryConfig::from_toml_str("verbose = true").unwrap();
        assert!(cfg.verbose);
        assert!(cfg.safe_writes);
        assert_eq!(cfg.stream_buffer, 16);
    }
}
