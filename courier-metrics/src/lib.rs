//! Prometheus metrics for the courier relay
//!
//! Counters are owned by a [`Metrics`] registry that the supervisor creates
//! once and hands to the send pipeline and the credential supply chain as an
//! `Arc<dyn MetricsSink>`. Nothing here is global.
//!
//! # Exposed counters
//!
//! - `smtpd_email_send_success_total`
//! - `smtpd_email_send_fail_total{type}`
//! - `smtpd_ses_error_total`
//! - `smtpd_credential_renewal_success_total`
//! - `smtpd_credential_renewal_error_total`
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use courier_metrics::{Counter, Metrics, MetricsConfig, MetricsServer, MetricsSink};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = Arc::new(Metrics::new()?);
//! metrics.increment(Counter::SendSuccess);
//!
//! let server = MetricsServer::new(&MetricsConfig::default(), Arc::clone(&metrics)).await?;
//! // server.serve(shutdown_receiver).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod registry;
mod server;

pub use config::MetricsConfig;
pub use error::MetricsError;
pub use registry::{Counter, Metrics, MetricsSink};
pub use server::MetricsServer;
