//! Configuration builder for creating test and development configurations.
//!
//! This module provides utilities for constructing Config instances with
//! sensible defaults, particularly useful for testing scenarios.

use crate::{ApiConfig, Config, GatewayConfig, NotifyConfig, ServiceConfig, StorageConfig};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Provides an easy way to create test configurations with sensible
/// defaults: in-memory storage and the mock gateway, both with empty
/// implementation tables.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	storage_backend: String,
	gateway_provider: String,
	currency: String,
	callback_url: String,
	api: ApiConfig,
	notify: NotifyConfig,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		Self {
			storage_backend: "memory".to_string(),
			gateway_provider: "mock".to_string(),
			currency: "ETB".to_string(),
			callback_url: "http://localhost:4000/api/payments/verify".to_string(),
			api: ApiConfig::default(),
			notify: NotifyConfig::default(),
		}
	}

	/// Sets the storage backend.
	pub fn storage_backend(mut self, backend: impl Into<String>) -> Self {
		self.storage_backend = backend.into();
		self
	}

	/// Sets the gateway provider.
	pub fn gateway_provider(mut self, provider: impl Into<String>) -> Self {
		self.gateway_provider = provider.into();
		self
	}

	/// Sets the checkout currency.
	pub fn currency(mut self, currency: impl Into<String>) -> Self {
		self.currency = currency.into();
		self
	}

	/// Sets the verification callback URL.
	pub fn callback_url(mut self, url: impl Into<String>) -> Self {
		self.callback_url = url.into();
		self
	}

	/// Sets the API configuration.
	pub fn api(mut self, api: ApiConfig) -> Self {
		self.api = api;
		self
	}

	/// Sets the notification fan-out configuration.
	pub fn notify(mut self, notify: NotifyConfig) -> Self {
		self.notify = notify;
		self
	}

	/// Builds the `Config` with the configured values.
	///
	/// The selected backend and provider each get an empty configuration
	/// table so the built config passes validation.
	pub fn build(self) -> Config {
		let empty = toml::Value::Table(toml::map::Map::new());

		let mut backends = HashMap::new();
		backends.insert(self.storage_backend.clone(), empty.clone());

		let mut providers = HashMap::new();
		providers.insert(self.gateway_provider.clone(), empty);

		Config {
			service: ServiceConfig::default(),
			api: self.api,
			storage: StorageConfig {
				backend: self.storage_backend,
				backends,
			},
			gateway: GatewayConfig {
				provider: self.gateway_provider,
				currency: self.currency,
				callback_url: self.callback_url,
				providers,
			},
			notify: self.notify,
		}
	}
}
