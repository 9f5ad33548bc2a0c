//! Mock payment gateway implementation for testing and development.
//!
//! Records every initialized charge in memory and reports it back on verify,
//! so reconciliation can be exercised without a live gateway. The reported
//! status and paid amount can be overridden through configuration to drive
//! failure and amount-mismatch paths in tests.

use crate::{GatewayError, GatewayInterface};
use async_trait::async_trait;
use dispatch_types::{
	ChargeRequest, CheckoutSession, ConfigSchema, GatewayTransaction, GatewayTxStatus,
	ValidationError,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

fn default_checkout_base_url() -> String {
	"https://checkout.mock.local/pay".to_string()
}

fn default_status() -> String {
	"success".to_string()
}

/// Configuration for the mock gateway provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockGatewayConfig {
	/// Base URL returned in checkout sessions.
	#[serde(default = "default_checkout_base_url")]
	pub checkout_base_url: String,
	/// Status reported on verify: "success", "pending" or "failed".
	#[serde(default = "default_status")]
	pub status: String,
	/// Overrides the paid amount reported on verify. When unset, verify
	/// reports the amount the charge was initialized with.
	#[serde(default)]
	pub paid_amount_override: Option<Decimal>,
}

impl Default for MockGatewayConfig {
	fn default() -> Self {
		Self {
			checkout_base_url: default_checkout_base_url(),
			status: default_status(),
			paid_amount_override: None,
		}
	}
}

impl ConfigSchema for MockGatewayConfig {
	fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
		match self.status.as_str() {
			"success" | "pending" | "failed" => Ok(()),
			other => Err(ValidationError::InvalidValue {
				field: "status".to_string(),
				message: format!("unknown status '{}'", other),
			}),
		}
	}
}

/// Mock gateway implementation backed by an in-memory charge log.
pub struct MockGateway {
	config: MockGatewayConfig,
	/// Charges initialized through this instance, keyed by reference.
	charges: RwLock<HashMap<String, ChargeRequest>>,
}

impl MockGateway {
	/// Creates a new mock gateway with the given configuration.
	pub fn new(config: MockGatewayConfig) -> Self {
		Self {
			config,
			charges: RwLock::new(HashMap::new()),
		}
	}

	/// A mock that verifies every initialized charge as successfully paid
	/// for the initialized amount.
	pub fn succeeding() -> Self {
		Self::new(MockGatewayConfig::default())
	}

	/// A mock that reports the given paid amount regardless of what the
	/// charge was initialized with. Used to drive amount-mismatch paths.
	pub fn paying(paid_amount: Decimal) -> Self {
		Self::new(MockGatewayConfig {
			paid_amount_override: Some(paid_amount),
			..MockGatewayConfig::default()
		})
	}

	/// A mock whose transactions verify as failed.
	pub fn failing() -> Self {
		Self::new(MockGatewayConfig {
			status: "failed".to_string(),
			..MockGatewayConfig::default()
		})
	}
}

impl Default for MockGateway {
	fn default() -> Self {
		Self::succeeding()
	}
}

#[async_trait]
impl GatewayInterface for MockGateway {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(self.config.clone())
	}

	async fn initialize(&self, request: &ChargeRequest) -> Result<CheckoutSession, GatewayError> {
		let mut charges = self.charges.write().await;
		charges.insert(request.reference.clone(), request.clone());

		Ok(CheckoutSession {
			checkout_url: format!("{}/{}", self.config.checkout_base_url, request.reference),
			reference: request.reference.clone(),
		})
	}

	async fn verify(&self, reference: &str) -> Result<GatewayTransaction, GatewayError> {
		let charges = self.charges.read().await;
		let charge = charges
			.get(reference)
			.ok_or_else(|| GatewayError::Rejected(format!("Unknown reference '{}'", reference)))?;

		let status = match self.config.status.as_str() {
			"success" => GatewayTxStatus::Success,
			"pending" => GatewayTxStatus::Pending,
			_ => GatewayTxStatus::Failed,
		};

		Ok(GatewayTransaction {
			reference: reference.to_string(),
			status,
			amount: self.config.paid_amount_override.unwrap_or(charge.amount),
			currency: charge.currency.clone(),
		})
	}
}

/// Registry for the mock gateway implementation.
pub struct Registry;

impl dispatch_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "mock";
	type Factory = crate::GatewayFactory;

	fn factory() -> Self::Factory {
		create_gateway
	}
}

impl crate::GatewayRegistry for Registry {}

/// Factory function to create a mock gateway from configuration.
///
/// Configuration parameters:
/// - `checkout_base_url`: URL prefix for checkout sessions (optional)
/// - `status`: verify status to report (default: "success")
/// - `paid_amount_override`: fixed paid amount to report (optional)
pub fn create_gateway(config: &toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError> {
	let mock_config: MockGatewayConfig = config
		.clone()
		.try_into()
		.map_err(|e| GatewayError::Configuration(format!("Invalid mock config: {}", e)))?;

	mock_config
		.validate(config)
		.map_err(|e| GatewayError::Configuration(e.to_string()))?;

	Ok(Box::new(MockGateway::new(mock_config)))
}
