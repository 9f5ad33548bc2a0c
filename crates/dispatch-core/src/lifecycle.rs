//! The order status state machine and its role gates.
//!
//! A transition is validated in three steps, in order: role/ownership gates
//! (a forbidden caller learns nothing further), idempotence (target equals
//! current status is a no-op success), then the static transition table.
//! The winning mutation commits under the order's lock; a caller whose
//! pre-check ran against a stale status loses with `Conflict`.

use crate::{DispatchEngine, EngineError};
use dispatch_types::{
	current_timestamp, truncate_id, Actor, Order, OrderEvent, OrderStatus, PaymentStatus, Role,
};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Allowed targets per source status.
///
/// Forward jumps are legal (a vendor may take confirmed straight to ready);
/// backward moves are not, and the only exit besides the forward path is
/// cancellation from any non-terminal status.
static TRANSITIONS: Lazy<HashMap<OrderStatus, Vec<OrderStatus>>> = Lazy::new(|| {
	use OrderStatus::*;
	HashMap::from([
		(Pending, vec![Confirmed, Preparing, Ready, PickedUp, Cancelled]),
		(Confirmed, vec![Preparing, Ready, PickedUp, Cancelled]),
		(Preparing, vec![Ready, PickedUp, Cancelled]),
		(Ready, vec![PickedUp, Cancelled]),
		(PickedUp, vec![InTransit, Delivered, Cancelled]),
		(InTransit, vec![Delivered, Cancelled]),
		(Delivered, vec![]),
		(Cancelled, vec![]),
	])
});

/// True when the table admits `from -> to`.
pub fn is_transition_allowed(from: OrderStatus, to: OrderStatus) -> bool {
	TRANSITIONS
		.get(&from)
		.is_some_and(|targets| targets.contains(&to))
}

/// Result of a transition request.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
	/// The order after the request was applied.
	pub order: Order,
	/// False when the request was an idempotent no-op.
	pub changed: bool,
}

/// Checks the role gate for a target status.
///
/// Returns whether the transition self-assigns the acting driver. Admins
/// pass every gate without self-assignment.
fn authorize(order: &Order, target: OrderStatus, actor: &Actor) -> Result<bool, EngineError> {
	if actor.is_admin() {
		return Ok(false);
	}

	use OrderStatus::*;
	match target {
		PickedUp | InTransit | Delivered => {
			if actor.role != Role::Driver {
				return Err(EngineError::Forbidden(format!(
					"Role '{}' cannot move an order to {}",
					actor.role, target
				)));
			}
			match &order.driver_id {
				Some(driver) if driver == &actor.id => Ok(false),
				Some(_) => Err(EngineError::Forbidden(
					"Another driver is assigned to this order".into(),
				)),
				None if matches!(order.status, Pending | Preparing | Ready) => Ok(true),
				None => Err(EngineError::Forbidden(
					"Order is not available for driver assignment".into(),
				)),
			}
		},
		Confirmed | Preparing | Ready => {
			if actor.role == Role::Vendor && order.vendor_id.as_deref() == Some(actor.id.as_str()) {
				Ok(false)
			} else {
				Err(EngineError::Forbidden(format!(
					"Only the order's vendor may move it to {}",
					target
				)))
			}
		},
		Cancelled => {
			let is_customer = actor.role == Role::Customer && order.customer_id == actor.id;
			let is_vendor =
				actor.role == Role::Vendor && order.vendor_id.as_deref() == Some(actor.id.as_str());
			if is_customer || is_vendor {
				Ok(false)
			} else {
				Err(EngineError::Forbidden(
					"Only the order's customer, its vendor or an admin may cancel".into(),
				))
			}
		},
		Pending => Err(EngineError::Forbidden(
			"Orders cannot be moved back to pending".into(),
		)),
	}
}

/// The payment override gate: the order's vendor or an admin.
fn authorize_override(order: &Order, actor: &Actor) -> Result<(), EngineError> {
	let is_vendor =
		actor.role == Role::Vendor && order.vendor_id.as_deref() == Some(actor.id.as_str());
	if actor.is_admin() || is_vendor {
		Ok(())
	} else {
		Err(EngineError::Forbidden(
			"Only the order's vendor or an admin may edit payment status".into(),
		))
	}
}

/// Applies a manual payment-status edit; completion is normally the
/// reconciler's job. Completed and failed are final.
fn apply_payment_override(order: &mut Order, desired: PaymentStatus) -> Result<bool, EngineError> {
	if order.payment_status == desired {
		return Ok(false);
	}
	if order.payment_status != PaymentStatus::Pending {
		return Err(EngineError::Conflict(format!(
			"Payment status {} is final and cannot become {}",
			order.payment_status, desired
		)));
	}
	order.payment_status = desired;
	Ok(true)
}

impl DispatchEngine {
	/// Moves an order to `target` on behalf of `actor`.
	///
	/// An optional `payment_override` edits the payment status alongside the
	/// change; it is gated separately (vendor-of-order or admin). On success
	/// the committed order is persisted and an `update` event is published
	/// to the broadcast channel and the order's scope, in commit order.
	pub async fn transition(
		&self,
		order_id: &str,
		target: OrderStatus,
		actor: &Actor,
		payment_override: Option<PaymentStatus>,
	) -> Result<TransitionOutcome, EngineError> {
		let snapshot = self.load_order(order_id).await?;

		let self_assign = authorize(&snapshot, target, actor)?;
		if payment_override.is_some() {
			authorize_override(&snapshot, actor)?;
		}

		let status_noop = target == snapshot.status;
		if status_noop && payment_override.is_none() {
			tracing::debug!(
				order_id = %truncate_id(order_id),
				status = %target,
				"Transition is a no-op"
			);
			return Ok(TransitionOutcome {
				order: snapshot,
				changed: false,
			});
		}
		if !status_noop && !is_transition_allowed(snapshot.status, target) {
			return Err(EngineError::InvalidTransition {
				from: snapshot.status,
				to: target,
			});
		}

		let lock = self.locks.lock_for(order_id);
		let _guard = lock.lock().await;

		let mut order = self.load_order(order_id).await?;
		if order.status != snapshot.status {
			return Err(EngineError::Conflict(format!(
				"Order status moved from {} to {} during the transition",
				snapshot.status, order.status
			)));
		}

		let mut changed = false;
		if order.status != target {
			if self_assign {
				order.driver_id = Some(actor.id.clone());
			}
			order.status = target;
			changed = true;
		}
		if let Some(desired) = payment_override {
			changed |= apply_payment_override(&mut order, desired)?;
		}
		if !changed {
			return Ok(TransitionOutcome {
				order,
				changed: false,
			});
		}

		order.updated_at = current_timestamp().max(order.updated_at);
		self.storage
			.update(dispatch_types::StorageKey::Orders.as_str(), order_id, &order)
			.await?;

		tracing::info!(
			order_id = %truncate_id(order_id),
			from = %snapshot.status,
			to = %order.status,
			actor_role = %actor.role,
			"Order transition committed"
		);
		let event = OrderEvent::update(&order);
		self.fanout.publish_broadcast(event.clone());
		self.fanout.publish_scoped(order_id, event);

		Ok(TransitionOutcome {
			order,
			changed: true,
		})
	}
}
