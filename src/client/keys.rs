use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};

// ─── Configuration ───────────────────────────────────────────────

/// How logical keys are turned into physical ones.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Prepended to every built key, e.g. the environment name
    pub prefix: String,
    /// Joins the prefix and the key segments, e.g. `":"`
    pub delimiter: String,
    /// Token in a template replaced by a variable, e.g. `"?"`
    pub placeholder: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            delimiter: ":".into(),
            placeholder: "?".into(),
        }
    }
}

// ─── KeyCodec ────────────────────────────────────────────────────

/// Builds and takes apart physical keys. Pure string work, no I/O.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    config: KeyConfig,
    /// `prefix + delimiter`, computed once
    env_prefix: String,
}

impl KeyCodec {
    pub fn new(config: KeyConfig) -> Result<Self> {
        if config.delimiter.is_empty() {
            return Err(Error::InvalidKeyConfig("delimiter must not be empty".into()));
        }
        if config.placeholder.is_empty() {
            return Err(Error::InvalidKeyConfig(
                "placeholder must not be empty".into(),
            ));
        }

        let env_prefix = format!("{}{}", config.prefix, config.delimiter);
        Ok(Self { config, env_prefix })
    }

    pub fn config(&self) -> &KeyConfig {
        &self.config
    }

    /// Expands `template` with `vars` in order and prefixes the result.
    ///
    /// The template split on the placeholder must give exactly
    /// `vars.len() + 1` segments, otherwise nothing is built.
    pub fn build<S: AsRef<str>>(&self, template: &str, vars: &[S]) -> Result<String> {
        let placeholder = self.config.placeholder.as_str();
        let segments: Vec<&str> = template.split(placeholder).collect();

        if segments.len() != vars.len() + 1 {
            return Err(Error::InsufficientArguments {
                expected: segments.len() - 1,
                got: vars.len(),
            });
        }

        let mut key = String::with_capacity(self.env_prefix.len() + template.len());
        key.push_str(&self.env_prefix);
        key.push_str(segments[0]);

        for (var, segment) in vars.iter().zip(&segments[1..]) {
            let var = var.as_ref();
            if var.contains(placeholder) {
                warn!(template, var, "key variable contains the placeholder token");
            }
            key.push_str(var);
            key.push_str(segment);
        }

        Ok(key)
    }

    /// Removes a literal `prefix + delimiter` from the front of `key`.
    /// Keys without it are returned unchanged.
    pub fn strip_prefix<'k>(&self, key: &'k str) -> &'k str {
        key.strip_prefix(self.env_prefix.as_str()).unwrap_or(key)
    }

    /// Legacy strip: trims every leading character that appears anywhere
    /// in `prefix + delimiter`. Over-strips keys whose content starts with
    /// one of those characters; prefer [`KeyCodec::strip_prefix`].
    pub fn trim_prefix_chars<'k>(&self, key: &'k str) -> &'k str {
        key.trim_start_matches(|c: char| self.env_prefix.contains(c))
    }

    /// Splits `key` on the configured delimiter.
    pub fn split<'k>(&self, key: &'k str) -> Vec<&'k str> {
        key.split(self.config.delimiter.as_str()).collect()
    }
}
