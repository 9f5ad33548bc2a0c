//! Chapa payment gateway implementation.
//!
//! Speaks the Chapa HTTP API: `POST /transaction/initialize` to open a
//! checkout session and `GET /transaction/verify/{reference}` to fetch the
//! authoritative transaction state. Authentication is a bearer secret key;
//! every request is bounded by the configured timeout.

use crate::{GatewayError, GatewayInterface};
use async_trait::async_trait;
use dispatch_types::{
	ChargeRequest, CheckoutSession, ConfigSchema, Field, FieldType, GatewayTransaction,
	GatewayTxStatus, Schema, SecretString, ValidationError,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

fn default_timeout_seconds() -> u64 {
	15
}

/// Configuration for the Chapa gateway provider.
#[derive(Debug, Clone, serde::Serialize, Deserialize)]
pub struct ChapaConfig {
	/// Base URL of the Chapa API, e.g. `https://api.chapa.co/v1`.
	pub api_url: String,
	/// Secret key presented as a bearer token.
	pub secret_key: SecretString,
	/// Request timeout in seconds.
	#[serde(default = "default_timeout_seconds")]
	pub timeout_seconds: u64,
}

/// Envelope wrapping every Chapa response.
#[derive(Debug, Deserialize)]
struct ChapaEnvelope<T> {
	status: String,
	#[serde(default)]
	message: Option<String>,
	data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ChapaCheckoutData {
	checkout_url: String,
}

#[derive(Debug, Deserialize)]
struct ChapaTransactionData {
	amount: Decimal,
	currency: String,
	tx_ref: String,
	status: String,
}

/// Chapa gateway provider.
pub struct ChapaGateway {
	config: ChapaConfig,
	client: reqwest::Client,
}

impl ChapaGateway {
	/// Creates a new ChapaGateway with a timeout-bounded HTTP client.
	pub fn new(config: ChapaConfig) -> Result<Self, GatewayError> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(config.timeout_seconds))
			.build()
			.map_err(|e| GatewayError::Configuration(e.to_string()))?;

		Ok(Self { config, client })
	}

	fn bearer(&self) -> &str {
		self.config.secret_key.expose_secret()
	}
}

#[async_trait]
impl GatewayInterface for ChapaGateway {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(ChapaGatewaySchema)
	}

	async fn initialize(&self, request: &ChargeRequest) -> Result<CheckoutSession, GatewayError> {
		let url = format!("{}/transaction/initialize", self.config.api_url);
		let body = serde_json::json!({
			"amount": request.amount.to_string(),
			"currency": request.currency,
			"tx_ref": request.reference,
			"callback_url": request.callback_url,
		});

		let response = self
			.client
			.post(&url)
			.bearer_auth(self.bearer())
			.json(&body)
			.send()
			.await
			.map_err(|e| GatewayError::Network(e.to_string()))?;

		let status = response.status();
		let envelope: ChapaEnvelope<ChapaCheckoutData> = response
			.json()
			.await
			.map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

		if !status.is_success() || envelope.status != "success" {
			return Err(GatewayError::Rejected(
				envelope
					.message
					.unwrap_or_else(|| format!("HTTP {}", status)),
			));
		}

		let data = envelope
			.data
			.ok_or_else(|| GatewayError::InvalidResponse("Missing checkout data".to_string()))?;

		Ok(CheckoutSession {
			checkout_url: data.checkout_url,
			reference: request.reference.clone(),
		})
	}

	async fn verify(&self, reference: &str) -> Result<GatewayTransaction, GatewayError> {
		let url = format!("{}/transaction/verify/{}", self.config.api_url, reference);

		let response = self
			.client
			.get(&url)
			.bearer_auth(self.bearer())
			.send()
			.await
			.map_err(|e| GatewayError::Network(e.to_string()))?;

		let status = response.status();
		let envelope: ChapaEnvelope<ChapaTransactionData> = response
			.json()
			.await
			.map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

		if !status.is_success() {
			return Err(GatewayError::Rejected(
				envelope
					.message
					.unwrap_or_else(|| format!("HTTP {}", status)),
			));
		}

		let data = envelope
			.data
			.ok_or_else(|| GatewayError::InvalidResponse("Missing transaction data".to_string()))?;

		let tx_status = match data.status.as_str() {
			"success" => GatewayTxStatus::Success,
			"pending" => GatewayTxStatus::Pending,
			_ => GatewayTxStatus::Failed,
		};

		Ok(GatewayTransaction {
			reference: data.tx_ref,
			status: tx_status,
			amount: data.amount,
			currency: data.currency,
		})
	}
}

/// Configuration schema for ChapaGateway.
pub struct ChapaGatewaySchema;

impl ConfigSchema for ChapaGatewaySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("api_url", FieldType::String).with_validator(|v| {
					match v.as_str() {
						Some(s) if s.starts_with("http://") || s.starts_with("https://") => Ok(()),
						_ => Err("must be an http(s) URL".to_string()),
					}
				}),
				Field::new("secret_key", FieldType::String),
			],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(300),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Registry for the Chapa gateway implementation.
pub struct Registry;

impl dispatch_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "chapa";
	type Factory = crate::GatewayFactory;

	fn factory() -> Self::Factory {
		create_gateway
	}
}

impl crate::GatewayRegistry for Registry {}

/// Factory function to create a Chapa gateway from configuration.
///
/// Configuration parameters:
/// - `api_url`: Base URL of the Chapa API (required)
/// - `secret_key`: Bearer secret key (required)
/// - `timeout_seconds`: Request timeout (default: 15)
pub fn create_gateway(config: &toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError> {
	ChapaGatewaySchema
		.validate(config)
		.map_err(|e| GatewayError::Configuration(e.to_string()))?;

	let chapa_config: ChapaConfig = config
		.clone()
		.try_into()
		.map_err(|e| GatewayError::Configuration(format!("Invalid chapa config: {}", e)))?;

	Ok(Box::new(ChapaGateway::new(chapa_config)?))
}
