//! Main entry point for the dispatch service.
//!
//! This binary wires the engine together from configuration: a storage
//! backend, a payment gateway provider and the notification fan-out, then
//! exposes the engine over the HTTP API until interrupted.

use clap::Parser;
use dispatch_config::Config;
use dispatch_core::DispatchEngine;
use dispatch_gateway::GatewayService;
use dispatch_notify::FanoutService;
use dispatch_storage::StorageService;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

mod server;

/// Command-line arguments for the dispatch service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error); RUST_LOG overrides,
	/// the config's service.log_level is the fallback
	#[arg(short, long)]
	log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;

	// Initialize tracing with env filter: RUST_LOG wins, then --log-level,
	// then the configured default.
	use tracing_subscriber::{fmt, EnvFilter};
	let default_directive = args
		.log_level
		.clone()
		.unwrap_or_else(|| config.service.log_level.clone());
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
	fmt().with_env_filter(env_filter).with_target(true).init();

	tracing::info!(
		storage = %config.storage.backend,
		gateway = %config.gateway.provider,
		currency = %config.gateway.currency,
		"Loaded configuration"
	);

	let engine = Arc::new(build_engine(&config)?);

	// Drain the broadcast stream into structured logs so every committed
	// mutation is visible even with no dashboard attached.
	let mut events = engine.fanout().subscribe_broadcast();
	tokio::spawn(async move {
		while let Some(event) = events.next().await {
			tracing::info!(
				order_id = %event.order_id,
				kind = ?event.kind,
				status = %event.status,
				payment_status = %event.payment_status,
				"Order event"
			);
		}
	});

	if config.api.enabled {
		server::start_server(config, engine).await?;
	} else {
		tracing::warn!("API server disabled; waiting for shutdown signal");
		tokio::signal::ctrl_c().await?;
	}

	tracing::info!("Stopped dispatch service");
	Ok(())
}

/// Builds the engine from configuration.
///
/// The configured storage backend and gateway provider are looked up in the
/// registries each crate publishes, and their free-form config tables are
/// passed to the matching factory.
fn build_engine(config: &Config) -> Result<DispatchEngine, Box<dyn std::error::Error>> {
	let storage_factories: HashMap<&'static str, dispatch_storage::StorageFactory> =
		dispatch_storage::get_all_implementations().into_iter().collect();
	let storage_factory = storage_factories
		.get(config.storage.backend.as_str())
		.ok_or_else(|| format!("Unknown storage backend '{}'", config.storage.backend))?;
	let backend_config = config
		.storage
		.backends
		.get(&config.storage.backend)
		.ok_or_else(|| format!("Storage backend '{}' is not configured", config.storage.backend))?;
	let storage = Arc::new(StorageService::new(storage_factory(backend_config)?));

	let gateway_factories: HashMap<&'static str, dispatch_gateway::GatewayFactory> =
		dispatch_gateway::get_all_implementations().into_iter().collect();
	let gateway_factory = gateway_factories
		.get(config.gateway.provider.as_str())
		.ok_or_else(|| format!("Unknown gateway provider '{}'", config.gateway.provider))?;
	let provider_config = config
		.gateway
		.providers
		.get(&config.gateway.provider)
		.ok_or_else(|| format!("Gateway provider '{}' is not configured", config.gateway.provider))?;
	let gateway = Arc::new(GatewayService::new(
		gateway_factory(provider_config)?,
		config.gateway.currency.clone(),
		config.gateway.callback_url.clone(),
	));

	let fanout = Arc::new(FanoutService::new(
		config.notify.broadcast_capacity,
		config.notify.scope_capacity,
	));

	Ok(DispatchEngine::new(storage, gateway, fanout))
}
