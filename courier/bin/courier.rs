#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::path::PathBuf;

use clap::Parser;

/// An SMTP relay that forwards mail through Amazon SES
#[derive(Parser, Debug)]
#[command(name = "courier", disable_version_flag = true)]
struct Cli {
    /// Configuration file, instead of searching the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the version and exit
    #[arg(short = 'V', long)]
    version: bool,

    /// SMTP listen address, overriding the configuration file
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("courier version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    courier_common::logging::init();

    let mut courier = courier::config::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        courier.listen = listen;
    }

    courier.run().await
}
