//! Configuration module for the dispatch system.
//!
//! This module provides structures and utilities for managing the service
//! configuration. Configuration is loaded from a single TOML file; `${VAR}`
//! and `${VAR:-default}` references are resolved against the process
//! environment before parsing, and the result is validated so that every
//! component can be constructed without further checks.

pub mod builders;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the dispatch service.
///
/// Contains every section the service needs: instance settings, the HTTP
/// API server, the storage backend, the payment gateway provider, and the
/// notification fan-out.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Settings for this service instance.
	#[serde(default)]
	pub service: ServiceConfig,
	/// Configuration for the HTTP API server.
	#[serde(default)]
	pub api: ApiConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for the payment gateway.
	pub gateway: GatewayConfig,
	/// Configuration for notification fan-out channels.
	#[serde(default)]
	pub notify: NotifyConfig,
}

/// Settings for this service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Default log filter, used when RUST_LOG and --log-level are absent.
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

impl Default for ServiceConfig {
	fn default() -> Self {
		Self {
			log_level: default_log_level(),
		}
	}
}

fn default_log_level() -> String {
	"info".to_string()
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default = "default_api_enabled")]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: default_api_enabled(),
			host: default_api_host(),
			port: default_api_port(),
			timeout_seconds: default_api_timeout(),
		}
	}
}

fn default_api_enabled() -> bool {
	true
}

/// Returns the default API host of 127.0.0.1 (localhost).
fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

/// Returns the default API port.
fn default_api_port() -> u16 {
	4000
}

/// Returns the default request timeout of 30 seconds.
fn default_api_timeout() -> u64 {
	30
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which backend to use.
	pub backend: String,
	/// Map of backend names to their configurations.
	/// Each backend has its own configuration format stored as raw TOML values.
	pub backends: HashMap<String, toml::Value>,
}

/// Configuration for the payment gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
	/// Which provider to use.
	pub provider: String,
	/// Currency code for checkout sessions.
	#[serde(default = "default_currency")]
	pub currency: String,
	/// Public URL the gateway calls back with the transaction reference.
	#[serde(default = "default_callback_url")]
	pub callback_url: String,
	/// Map of provider names to their configurations.
	/// Each provider has its own configuration format stored as raw TOML values.
	pub providers: HashMap<String, toml::Value>,
}

/// Returns the default checkout currency.
fn default_currency() -> String {
	"ETB".to_string()
}

/// Returns the default verification callback URL.
fn default_callback_url() -> String {
	"http://localhost:4000/api/payments/verify".to_string()
}

/// Configuration for notification fan-out channels.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifyConfig {
	/// Ring-buffer capacity of the broadcast channel.
	#[serde(default = "default_broadcast_capacity")]
	pub broadcast_capacity: usize,
	/// Ring-buffer capacity of each per-order scope channel.
	#[serde(default = "default_scope_capacity")]
	pub scope_capacity: usize,
}

impl Default for NotifyConfig {
	fn default() -> Self {
		Self {
			broadcast_capacity: default_broadcast_capacity(),
			scope_capacity: default_scope_capacity(),
		}
	}
}

fn default_broadcast_capacity() -> usize {
	256
}

fn default_scope_capacity() -> usize {
	64
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	// Limit input size to prevent ReDoS attacks
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let full_match = cap.get(0).unwrap();
		let var_name = cap.get(1).unwrap().as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => {
				if let Some(default) = default_value {
					default.to_string()
				} else {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				}
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file with environment variable resolution.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let contents = tokio::fs::read_to_string(path).await?;
		contents.parse()
	}

	/// Validates the configuration to ensure all required fields are properly set.
	///
	/// - The selected storage backend must be configured in `storage.backends`
	/// - The selected gateway provider must be configured in `gateway.providers`
	/// - The checkout currency must be a 3-letter code
	/// - Channel capacities must be within sane bounds
	/// - The API section must carry a usable bind address when enabled
	fn validate(&self) -> Result<(), ConfigError> {
		// Validate storage config
		if self.storage.backend.is_empty() {
			return Err(ConfigError::Validation(
				"Storage backend cannot be empty".into(),
			));
		}
		if self.storage.backends.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage backend must be configured".into(),
			));
		}
		if !self.storage.backends.contains_key(&self.storage.backend) {
			return Err(ConfigError::Validation(format!(
				"Storage backend '{}' not found in backends",
				self.storage.backend
			)));
		}

		// Validate gateway config
		if self.gateway.provider.is_empty() {
			return Err(ConfigError::Validation(
				"Gateway provider cannot be empty".into(),
			));
		}
		if self.gateway.providers.is_empty() {
			return Err(ConfigError::Validation(
				"At least one gateway provider must be configured".into(),
			));
		}
		if !self.gateway.providers.contains_key(&self.gateway.provider) {
			return Err(ConfigError::Validation(format!(
				"Gateway provider '{}' not found in providers",
				self.gateway.provider
			)));
		}
		if self.gateway.currency.len() != 3
			|| !self.gateway.currency.chars().all(|c| c.is_ascii_uppercase())
		{
			return Err(ConfigError::Validation(format!(
				"Currency '{}' must be a 3-letter uppercase code",
				self.gateway.currency
			)));
		}
		if !self.gateway.callback_url.starts_with("http://")
			&& !self.gateway.callback_url.starts_with("https://")
		{
			return Err(ConfigError::Validation(format!(
				"Callback URL '{}' must be an http(s) URL",
				self.gateway.callback_url
			)));
		}

		// Validate notify config
		if self.notify.broadcast_capacity == 0 || self.notify.scope_capacity == 0 {
			return Err(ConfigError::Validation(
				"Notify channel capacities must be greater than 0".into(),
			));
		}
		if self.notify.broadcast_capacity > 65536 || self.notify.scope_capacity > 65536 {
			return Err(ConfigError::Validation(
				"Notify channel capacities cannot exceed 65536".into(),
			));
		}

		// Validate API config if enabled
		if self.api.enabled {
			if self.api.host.is_empty() {
				return Err(ConfigError::Validation("API host cannot be empty".into()));
			}
			if self.api.port == 0 {
				return Err(ConfigError::Validation("API port cannot be 0".into()));
			}
			if self.api.timeout_seconds == 0 || self.api.timeout_seconds > 300 {
				return Err(ConfigError::Validation(
					"API timeout_seconds must be between 1 and 300".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
