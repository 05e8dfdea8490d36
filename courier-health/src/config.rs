use serde::Deserialize;

/// Where, and whether, to serve the health probes
///
/// Off by default. A typical container setup enables it on `[::]:3000` and
/// points its liveness probe at `/health/live` and its readiness probe at
/// `/health/ready`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

fn default_listen_address() -> String {
    "[::]:3000".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: default_listen_address(),
        }
    }
}
