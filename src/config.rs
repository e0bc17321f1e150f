use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Quiet window before the badge fold recomputes, so near-simultaneous
    /// subscription updates collapse into one published count.
    /// Set via INBOX_BADGE_DEBOUNCE_MS. Default: 25.
    pub badge_debounce_ms: u64,
}

impl Config {
    pub fn badge_debounce(&self) -> Duration {
        Duration::from_millis(self.badge_debounce_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            badge_debounce_ms: 25,
        }
    }
}

/// Load configuration from the environment. Unset or unparsable values
/// fall back to defaults.
pub fn load() -> Config {
    dotenvy::dotenv().ok();

    Config {
        badge_debounce_ms: std::env::var("INBOX_BADGE_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(25),
    }
}
