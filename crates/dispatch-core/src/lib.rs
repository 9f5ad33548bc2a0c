//! Core engine logic for the dispatch system.
//!
//! The engine owns the order lifecycle end to end: placing and reading
//! orders, driving status transitions through the state machine with role
//! gates, and reconciling payment callbacks against the external gateway.
//! Storage, gateway and fan-out are injected as services; the engine holds
//! the only write path to an order and serializes it per order id.

use dispatch_gateway::{GatewayError, GatewayService};
use dispatch_notify::FanoutService;
use dispatch_storage::{StorageError, StorageService};
use dispatch_types::{APIError, Order, OrderStatus, StorageKey};
use std::sync::Arc;
use thiserror::Error;

use crate::locks::OrderLocks;

mod lifecycle;
mod locks;
mod payments;
mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use lifecycle::TransitionOutcome;

/// Errors produced by engine operations.
///
/// This is the taxonomy the service layer maps onto HTTP statuses.
/// Reconciliation outcomes are deliberately not here; they are reported as
/// values so the callback endpoint can acknowledge them all.
#[derive(Debug, Error)]
pub enum EngineError {
	/// Input failed validation before any mutation.
	#[error("Validation error: {0}")]
	Validation(String),
	/// The resource does not exist, or is not visible to the caller.
	#[error("Not found: {0}")]
	NotFound(String),
	/// A role or ownership gate rejected the caller.
	#[error("Forbidden: {0}")]
	Forbidden(String),
	/// The requested status change is not in the transition table.
	#[error("Invalid transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	/// A concurrent writer changed the order first.
	#[error("Conflict: {0}")]
	Conflict(String),
	/// The payment gateway failed or could not be reached.
	#[error("Payment gateway error: {0}")]
	PaymentGateway(String),
	/// The storage backend failed.
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StorageError> for EngineError {
	fn from(err: StorageError) -> Self {
		EngineError::Storage(err.to_string())
	}
}

impl From<GatewayError> for EngineError {
	fn from(err: GatewayError) -> Self {
		EngineError::PaymentGateway(err.to_string())
	}
}

impl From<EngineError> for APIError {
	fn from(err: EngineError) -> Self {
		match err {
			EngineError::Validation(message) => APIError::BadRequest {
				error_type: "validation_error".to_string(),
				message,
				details: None,
			},
			EngineError::NotFound(message) => APIError::NotFound {
				error_type: "not_found".to_string(),
				message,
			},
			EngineError::Forbidden(message) => APIError::Forbidden {
				error_type: "forbidden".to_string(),
				message,
			},
			EngineError::InvalidTransition { from, to } => APIError::Conflict {
				error_type: "invalid_transition".to_string(),
				message: format!("Invalid transition from {} to {}", from, to),
				details: Some(serde_json::json!({ "from": from, "to": to })),
			},
			EngineError::Conflict(message) => APIError::Conflict {
				error_type: "conflict".to_string(),
				message,
				details: None,
			},
			EngineError::PaymentGateway(message) => APIError::BadGateway {
				error_type: "payment_gateway_error".to_string(),
				message,
			},
			EngineError::Storage(message) => APIError::InternalServerError {
				error_type: "storage_error".to_string(),
				message,
			},
		}
	}
}

/// The order lifecycle and payment reconciliation engine.
///
/// All mutations of one order are serialized through a per-order lock; the
/// engine never holds a lock across a gateway call. Operations are grouped
/// by concern: order store (create/read/list), lifecycle (transitions) and
/// payments (checkout and reconciliation).
pub struct DispatchEngine {
	pub(crate) storage: Arc<StorageService>,
	pub(crate) gateway: Arc<GatewayService>,
	pub(crate) fanout: Arc<FanoutService>,
	pub(crate) locks: OrderLocks,
}

impl DispatchEngine {
	/// Creates an engine over the given storage, gateway and fan-out services.
	pub fn new(
		storage: Arc<StorageService>,
		gateway: Arc<GatewayService>,
		fanout: Arc<FanoutService>,
	) -> Self {
		Self {
			storage,
			gateway,
			fanout,
			locks: OrderLocks::new(),
		}
	}

	/// The fan-out service events are published through; the service layer
	/// subscribes here.
	pub fn fanout(&self) -> &Arc<FanoutService> {
		&self.fanout
	}

	/// Loads an order without any visibility filtering.
	pub(crate) async fn load_order(&self, order_id: &str) -> Result<Order, EngineError> {
		match self.storage.retrieve(StorageKey::Orders.as_str(), order_id).await {
			Ok(order) => Ok(order),
			Err(StorageError::NotFound) => {
				Err(EngineError::NotFound(format!("Order '{}' not found", order_id)))
			},
			Err(e) => Err(EngineError::Storage(e.to_string())),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn engine_errors_map_to_api_statuses() {
		let cases = [
			(EngineError::Validation("bad".into()), 400),
			(EngineError::NotFound("missing".into()), 404),
			(EngineError::Forbidden("nope".into()), 403),
			(
				EngineError::InvalidTransition {
					from: OrderStatus::Delivered,
					to: OrderStatus::Pending,
				},
				409,
			),
			(EngineError::Conflict("raced".into()), 409),
			(EngineError::PaymentGateway("down".into()), 502),
			(EngineError::Storage("disk".into()), 500),
		];

		for (err, status) in cases {
			let api: APIError = err.into();
			assert_eq!(api.status_code(), status);
		}
	}

	#[test]
	fn invalid_transition_carries_structured_details() {
		let api: APIError = EngineError::InvalidTransition {
			from: OrderStatus::Ready,
			to: OrderStatus::Preparing,
		}
		.into();

		let body = serde_json::to_value(api.to_error_response()).unwrap();
		assert_eq!(body["error"], "invalid_transition");
		assert_eq!(body["details"]["from"], "ready");
		assert_eq!(body["details"]["to"], "preparing");
	}
}
