//! Liveness and readiness probes for the courier relay
//!
//! # Usage
//!
//! ```rust,no_run
//! use courier_health::{HealthChecker, HealthConfig, HealthServer};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HealthConfig {
//!     enabled: true,
//!     listen_address: "[::]:3000".to_string(),
//! };
//!
//! let checker = Arc::new(HealthChecker::new("courier", env!("CARGO_PKG_VERSION")));
//! let server = HealthServer::new(&config, checker).await?;
//!
//! // server.serve(shutdown_receiver).await?;
//! # Ok(())
//! # }
//! ```

mod checker;
mod config;
mod error;
mod server;

pub use checker::{HealthChecker, HealthStatus, ReadinessStatus};
pub use config::HealthConfig;
pub use error::HealthError;
pub use server::HealthServer;
