#![forbid(unsafe_code)]

//! Compiler configuration.
//!
//! Defaults match the usual template vocabulary: `v-` attributes and `{{ }}`
//! interpolation. The environment can force touch-device event mapping or
//! change the attribute prefix without touching code:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `WEFT_TOUCH` | `1`/`true`/`yes`/`on` maps `click` handlers to `touchstart` |
//! | `WEFT_DIRECTIVE_PREFIX` | Attribute prefix (default `v-`) |

/// Default directive attribute prefix.
pub const DEFAULT_PREFIX: &str = "v-";
/// Default interpolation delimiters.
pub const DEFAULT_DELIMITERS: (&str, &str) = ("{{", "}}");

/// Template compiler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeftConfig {
    prefix: String,
    open: String,
    close: String,
    touch: bool,
}

impl Default for WeftConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            open: DEFAULT_DELIMITERS.0.to_string(),
            close: DEFAULT_DELIMITERS.1.to_string(),
            touch: false,
        }
    }
}

fn env_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl WeftConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through a custom environment lookup.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = get_env("WEFT_TOUCH") {
            config.touch = env_flag(&value);
        }
        if let Some(prefix) = get_env("WEFT_DIRECTIVE_PREFIX") {
            let prefix = prefix.trim();
            if !prefix.is_empty() {
                config.prefix = prefix.to_string();
            }
        }
        config
    }

    /// Attribute prefix marking directives.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Interpolation delimiters for text nodes.
    #[must_use]
    pub fn with_delimiters(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.open = open.into();
        self.close = close.into();
        self
    }

    /// Treat the host as a touch device.
    #[must_use]
    pub fn with_touch(mut self, touch: bool) -> Self {
        self.touch = touch;
        self
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn delimiters(&self) -> (&str, &str) {
        (&self.open, &self.close)
    }

    #[must_use]
    pub fn touch(&self) -> bool {
        self.touch
    }

    /// Event type actually listened for when a handler asks for `event_type`.
    #[must_use]
    pub fn resolve_event_type<'a>(&self, event_type: &'a str) -> &'a str {
        if self.touch && event_type == "click" {
            "touchstart"
        } else {
            event_type
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WeftConfig::default();
        assert_eq!(config.prefix(), "v-");
        assert_eq!(config.delimiters(), ("{{", "}}"));
        assert!(!config.touch());
    }

    #[test]
    fn env_overrides() {
        let config = WeftConfig::from_env_with(|key| match key {
            "WEFT_TOUCH" => Some("Yes".to_string()),
            "WEFT_DIRECTIVE_PREFIX" => Some(" x- ".to_string()),
            _ => None,
        });
        assert!(config.touch());
        assert_eq!(config.prefix(), "x-");
    }

    #[test]
    fn blank_prefix_is_ignored() {
        let config = WeftConfig::from_env_with(|key| {
            (key == "WEFT_DIRECTIVE_PREFIX").then(|| "  ".to_string())
        });
        assert_eq!(config.prefix(), DEFAULT_PREFIX);
    }

    #[test]
    fn touch_remaps_click_only() {
        let config = WeftConfig::new().with_touch(true);
        assert_eq!(config.resolve_event_type("click"), "touchstart");
        assert_eq!(config.resolve_event_type("input"), "input");
        assert_eq!(WeftConfig::new().resolve_event_type("click"), "click");
    }
}
