// ABOUTME: Server binary for the Hojaega marketplace backend
// ABOUTME: Loads configuration, opens the database, builds resources and serves HTTP and WebSocket traffic
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

#![recursion_limit = "256"]

//! # Hojaega Server Binary
//!
//! Starts the REST API, the `/ws` real-time endpoint and the housekeeping
//! tasks on a single port.

use anyhow::Result;
use clap::Parser;
use hojaega_server::{
    config::{DatabaseUrl, ServerConfig},
    database::Database,
    logging,
    resources::ServerResources,
    server::HojaegaServer,
};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "hojaega-server")]
#[command(about = "Hojaega marketplace backend - accounts, OTP, subscriptions and negotiation")]
pub struct Args {
    /// Override HTTP port
    #[arg(long, env = "HTTP_PORT")]
    http_port: Option<u16>,

    /// Override database URL (`sqlite:<path>` or `sqlite::memory:`)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(url) = args.database_url.as_deref() {
        config.database.url = DatabaseUrl::parse_url(url)?;
    }
    config.validate()?;

    logging::init_from_env()?;

    info!("Starting Hojaega server");
    info!("{}", config.summary());

    let database = Database::new(&config.database.url).await?;

    let resources = ServerResources::builder()
        .with_database(database)
        .with_config(Arc::new(config))
        .build_arc()?;

    let server = HojaegaServer::new(resources);
    if let Err(e) = server.run().await {
        error!("Server error: {e:#}");
        return Err(e);
    }

    Ok(())
}
