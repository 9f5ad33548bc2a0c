//! Payment reconciliation types.
//!
//! Shared between the gateway client (which speaks HTTP to the payment
//! provider) and the engine's reconciler (which decides what a gateway
//! callback means for an order). Money values are `rust_decimal::Decimal`
//! end to end; floats never touch an amount.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Charge details submitted to the gateway when opening a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
	pub amount: Decimal,
	pub currency: String,
	/// Engine-generated transaction reference; the callback's only evidence.
	pub reference: String,
	/// Where the gateway sends the verification callback.
	pub callback_url: String,
}

/// Result of opening a checkout session with the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
	pub checkout_url: String,
	pub reference: String,
}

/// Authoritative transaction state reported by the gateway on verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayTxStatus {
	Success,
	Pending,
	Failed,
}

/// Gateway's view of a transaction, fetched during verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayTransaction {
	pub reference: String,
	pub status: GatewayTxStatus,
	/// Amount the gateway reports as actually paid.
	pub amount: Decimal,
	pub currency: String,
}

/// Binding from a transaction reference to the order it charges.
///
/// Written when a checkout session is opened, before the gateway is called,
/// so a later callback can resolve its order with an explicit lookup rather
/// than by parsing the reference string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
	pub reference: String,
	pub order_id: String,
	pub amount: Decimal,
	pub currency: String,
	pub created_at: u64,
}

/// Idempotency marker for gateway callbacks, keyed by transaction reference.
///
/// Created atomically the first time a callback arrives for a reference and
/// never removed. `processed` flips to true only after the order mutation
/// commits, so a crash or timeout mid-pipeline leaves the record retryable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRecord {
	pub reference: String,
	pub order_id: String,
	pub processed: bool,
	pub created_at: u64,
}

/// Outcome of reconciling one verification callback.
///
/// These are outcomes, not endpoint failures: the callback endpoint reports
/// success to the gateway for all of them so its retry loop stops, while the
/// engine logs the anomalous ones for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationOutcome {
	/// Payment applied: order marked paid (and confirmed if still pending).
	Completed,
	/// A callback for this reference already ran to completion.
	AlreadyProcessed,
	/// The order was already paid through a different reference.
	AlreadyPaid,
	/// Gateway-reported amount disagrees with the order total. Fail closed.
	AmountMismatch,
	/// Gateway reports the transaction unsuccessful, or could not be reached.
	Failed,
}

impl ReconciliationOutcome {
	pub fn as_str(&self) -> &'static str {
		match self {
			ReconciliationOutcome::Completed => "completed",
			ReconciliationOutcome::AlreadyProcessed => "already_processed",
			ReconciliationOutcome::AlreadyPaid => "already_paid",
			ReconciliationOutcome::AmountMismatch => "amount_mismatch",
			ReconciliationOutcome::Failed => "failed",
		}
	}
}

impl fmt::Display for ReconciliationOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

/// Absolute tolerance when comparing two money amounts.
pub fn amount_tolerance() -> Decimal {
	Decimal::new(1, 2)
}

/// True when two amounts agree within [`amount_tolerance`].
pub fn amounts_match(a: Decimal, b: Decimal) -> bool {
	(a - b).abs() <= amount_tolerance()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	#[test]
	fn amounts_match_within_a_cent() {
		assert!(amounts_match(dec!(410.00), dec!(410.00)));
		assert!(amounts_match(dec!(410.00), dec!(410.01)));
		assert!(amounts_match(dec!(410.01), dec!(410.00)));
	}

	#[test]
	fn amounts_beyond_tolerance_do_not_match() {
		assert!(!amounts_match(dec!(410.00), dec!(410.011)));
		assert!(!amounts_match(dec!(410.00), dec!(399.99)));
		assert!(!amounts_match(dec!(0.00), dec!(0.02)));
	}

	#[test]
	fn outcome_wire_names() {
		let json = serde_json::to_string(&ReconciliationOutcome::AlreadyProcessed).unwrap();
		assert_eq!(json, "\"already_processed\"");
		assert_eq!(ReconciliationOutcome::AmountMismatch.to_string(), "amount_mismatch");
	}
}
