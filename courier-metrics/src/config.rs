//! Metrics configuration

use serde::Deserialize;

/// Configuration for the metrics exposition endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Serve `/metrics` for scraping
    ///
    /// Counters are still collected when this is off; they are just not exposed.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Address the exposition server binds to
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

const fn default_enabled() -> bool {
    true
}

fn default_listen_address() -> String {
    "[::]:2501".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            listen_address: default_listen_address(),
        }
    }
}
