//! Payment gateway module for the dispatch system.
//!
//! This module handles communication with the external payment gateway:
//! opening checkout sessions for orders and querying the authoritative
//! transaction status during reconciliation. It supports different provider
//! implementations behind a common interface; the engine never speaks HTTP
//! itself.

use async_trait::async_trait;
use dispatch_types::{
	ChargeRequest, CheckoutSession, ConfigSchema, GatewayTransaction, ImplementationRegistry,
};
use rust_decimal::Decimal;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod chapa;
	pub mod mock;
}

/// Errors that can occur during gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
	/// Error that occurs during network communication, including timeouts.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs when the gateway rejects a request.
	#[error("Rejected by gateway: {0}")]
	Rejected(String),
	/// Error that occurs when a gateway response cannot be interpreted.
	#[error("Invalid gateway response: {0}")]
	InvalidResponse(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for payment gateway providers.
///
/// This trait must be implemented by any gateway provider that wants to
/// integrate with the dispatch system. Both calls must be bounded by the
/// provider's configured timeout; a timeout surfaces as
/// [`GatewayError::Network`].
#[async_trait]
pub trait GatewayInterface: Send + Sync {
	/// Returns the configuration schema for this gateway implementation.
	///
	/// This allows each implementation to define its own configuration
	/// requirements with specific validation rules. The schema is used to
	/// validate TOML configuration before initializing the provider.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Opens a checkout session with the gateway for the given charge.
	///
	/// Returns the URL the customer is redirected to for payment.
	async fn initialize(&self, request: &ChargeRequest) -> Result<CheckoutSession, GatewayError>;

	/// Queries the gateway for the authoritative state of a transaction.
	async fn verify(&self, reference: &str) -> Result<GatewayTransaction, GatewayError>;
}

/// Type alias for gateway factory functions.
///
/// This is the function signature that all gateway implementations must
/// provide to create instances of their gateway interface.
pub type GatewayFactory = fn(&toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError>;

/// Registry trait for gateway implementations.
///
/// This trait extends the base ImplementationRegistry to specify that
/// gateway implementations must provide a GatewayFactory.
pub trait GatewayRegistry: ImplementationRegistry<Factory = GatewayFactory> {}

/// Get all registered gateway implementations.
///
/// Returns a vector of (name, factory) tuples for all available gateway
/// implementations. This is used by the service layer to automatically
/// register all implementations.
pub fn get_all_implementations() -> Vec<(&'static str, GatewayFactory)> {
	use implementations::{chapa, mock};

	vec![
		(chapa::Registry::NAME, chapa::Registry::factory()),
		(mock::Registry::NAME, mock::Registry::factory()),
	]
}

/// Service managing checkout sessions and verification through a provider.
///
/// The GatewayService wraps the configured provider and owns the request
/// construction: the charge currency and the callback URL come from service
/// configuration, the amount and reference from the caller. Verification
/// re-validates the reference the gateway echoes back; a response for a
/// different reference is never trusted.
pub struct GatewayService {
	/// The underlying gateway provider implementation.
	provider: Box<dyn GatewayInterface>,
	/// Currency code attached to every checkout session.
	currency: String,
	/// Base callback URL; the transaction reference is appended per session.
	callback_url: String,
}

impl GatewayService {
	/// Creates a new GatewayService with the specified provider.
	pub fn new(provider: Box<dyn GatewayInterface>, currency: String, callback_url: String) -> Self {
		Self {
			provider,
			currency,
			callback_url,
		}
	}

	/// The currency code used for checkout sessions.
	pub fn currency(&self) -> &str {
		&self.currency
	}

	/// Opens a checkout session for the given amount under the given
	/// engine-generated reference.
	pub async fn open_session(
		&self,
		amount: Decimal,
		reference: &str,
	) -> Result<CheckoutSession, GatewayError> {
		let request = ChargeRequest {
			amount,
			currency: self.currency.clone(),
			reference: reference.to_string(),
			callback_url: format!("{}?reference={}", self.callback_url, reference),
		};

		tracing::debug!(reference, %amount, "Opening checkout session");
		self.provider.initialize(&request).await
	}

	/// Queries the authoritative transaction state for a reference.
	///
	/// Fails with [`GatewayError::InvalidResponse`] if the gateway reports a
	/// different reference than the one requested.
	pub async fn verify_transaction(
		&self,
		reference: &str,
	) -> Result<GatewayTransaction, GatewayError> {
		let tx = self.provider.verify(reference).await?;
		if tx.reference != reference {
			return Err(GatewayError::InvalidResponse(format!(
				"Gateway reported reference '{}' for lookup of '{}'",
				tx.reference, reference
			)));
		}
		Ok(tx)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::mock::MockGateway;
	use rust_decimal_macros::dec;

	fn service(provider: MockGateway) -> GatewayService {
		GatewayService::new(
			Box::new(provider),
			"ETB".to_string(),
			"http://localhost:4000/api/payments/verify".to_string(),
		)
	}

	#[tokio::test]
	async fn open_session_builds_callback_with_reference() {
		let gateway = service(MockGateway::default());
		let session = gateway.open_session(dec!(410), "txn-abc").await.unwrap();
		assert_eq!(session.reference, "txn-abc");
		assert!(session.checkout_url.contains("txn-abc"));
	}

	#[tokio::test]
	async fn verify_reports_initialized_amount() {
		let gateway = service(MockGateway::default());
		gateway.open_session(dec!(410), "txn-abc").await.unwrap();

		let tx = gateway.verify_transaction("txn-abc").await.unwrap();
		assert_eq!(tx.amount, dec!(410));
		assert_eq!(tx.currency, "ETB");
	}

	#[tokio::test]
	async fn verify_unknown_reference_fails() {
		let gateway = service(MockGateway::default());
		let result = gateway.verify_transaction("txn-never-issued").await;
		assert!(matches!(result, Err(GatewayError::Rejected(_))));
	}
}
