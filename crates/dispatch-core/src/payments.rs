//! Checkout initiation and payment reconciliation.
//!
//! `start_payment` opens a gateway checkout session and records the
//! reference -> order binding. `handle_payment_callback` is the defensive
//! side: the callback's only evidence is a reference, so every claim it
//! implies is re-verified against the gateway and the stored order before
//! anything is marked paid. Settlement records give exactly-once semantics;
//! a record flips to processed only after the order mutation commits, so an
//! attempt that dies mid-pipeline stays retryable.

use crate::{DispatchEngine, EngineError};
use dispatch_storage::StorageError;
use dispatch_types::{
	amounts_match, current_timestamp, truncate_id, Actor, CheckoutSession, GatewayTxStatus,
	OrderEvent, OrderStatus, PaymentSession, PaymentStatus, ReconciliationOutcome, Role,
	SettlementRecord, StorageKey,
};
use uuid::Uuid;

impl DispatchEngine {
	/// Opens a checkout session for an order on behalf of its customer.
	///
	/// The payment session is written before the gateway call; if the
	/// gateway then fails, no order state has changed and the orphaned
	/// session is inert (no callback will ever name it successfully).
	pub async fn start_payment(
		&self,
		order_id: &str,
		actor: &Actor,
	) -> Result<CheckoutSession, EngineError> {
		let order = self.get_order(order_id, actor).await?;
		if !(actor.role == Role::Customer && actor.id == order.customer_id) {
			return Err(EngineError::Forbidden(
				"Only the order's customer may pay for it".into(),
			));
		}
		if order.payment_status.is_completed() {
			return Err(EngineError::Validation(format!(
				"Order '{}' is already paid",
				order_id
			)));
		}

		let reference = format!("txn-{}", Uuid::new_v4().simple());
		let session = PaymentSession {
			reference: reference.clone(),
			order_id: order.id.clone(),
			amount: order.total_amount,
			currency: self.gateway.currency().to_string(),
			created_at: current_timestamp(),
		};
		self.storage
			.store(StorageKey::PaymentSessions.as_str(), &reference, &session)
			.await?;

		let checkout = self.gateway.open_session(order.total_amount, &reference).await?;

		tracing::info!(
			order_id = %truncate_id(order_id),
			reference = %reference,
			amount = %order.total_amount,
			"Checkout session opened"
		);
		Ok(checkout)
	}

	/// Reconciles one gateway verification callback.
	///
	/// Returns an outcome for every recognized reference; only a reference
	/// this engine never issued is an error. The order mutation happens at
	/// most once per reference, whatever the gateway's retry behavior.
	pub async fn handle_payment_callback(
		&self,
		reference: &str,
	) -> Result<ReconciliationOutcome, EngineError> {
		let session: PaymentSession = match self
			.storage
			.retrieve(StorageKey::PaymentSessions.as_str(), reference)
			.await
		{
			Ok(session) => session,
			Err(StorageError::NotFound) => {
				tracing::warn!(reference, "Callback for a reference this engine never issued");
				return Err(EngineError::NotFound(format!(
					"Unknown payment reference '{}'",
					reference
				)));
			},
			Err(e) => return Err(e.into()),
		};

		let mut record = SettlementRecord {
			reference: reference.to_string(),
			order_id: session.order_id.clone(),
			processed: false,
			created_at: current_timestamp(),
		};
		let created = self
			.storage
			.insert_if_absent(StorageKey::Settlements.as_str(), reference, &record)
			.await?;
		if !created {
			let existing: SettlementRecord = self
				.storage
				.retrieve(StorageKey::Settlements.as_str(), reference)
				.await?;
			if existing.processed {
				tracing::warn!(reference, "Duplicate callback for a settled reference");
				return Ok(ReconciliationOutcome::AlreadyProcessed);
			}
			// Unprocessed record left by an attempt that died mid-pipeline.
			record = existing;
		}

		let tx = match self.gateway.verify_transaction(reference).await {
			Ok(tx) => tx,
			Err(e) => {
				tracing::warn!(reference, error = %e, "Gateway verification failed");
				return Ok(ReconciliationOutcome::Failed);
			},
		};
		if tx.status != GatewayTxStatus::Success {
			tracing::warn!(reference, status = ?tx.status, "Gateway reports the transaction unsuccessful");
			return Ok(ReconciliationOutcome::Failed);
		}

		let order = self.load_order(&session.order_id).await?;
		if !amounts_match(tx.amount, order.total_amount) {
			tracing::error!(
				reference,
				order_id = %truncate_id(&order.id),
				paid = %tx.amount,
				expected = %order.total_amount,
				"Paid amount disagrees with the order total"
			);
			return Ok(ReconciliationOutcome::AmountMismatch);
		}

		let lock = self.locks.lock_for(&session.order_id);
		let _guard = lock.lock().await;

		let mut order = self.load_order(&session.order_id).await?;
		if order.payment_status.is_completed() {
			// Order-level idempotence: a different reference already paid
			// this order. Mark this record processed so retries stop.
			record.processed = true;
			self.storage
				.store(StorageKey::Settlements.as_str(), reference, &record)
				.await?;
			tracing::warn!(
				reference,
				order_id = %truncate_id(&order.id),
				"Order already paid through another reference"
			);
			return Ok(ReconciliationOutcome::AlreadyPaid);
		}

		order.payment_status = PaymentStatus::Completed;
		if order.status == OrderStatus::Pending {
			order.status = OrderStatus::Confirmed;
		}
		order.updated_at = current_timestamp().max(order.updated_at);
		self.storage
			.update(StorageKey::Orders.as_str(), &order.id, &order)
			.await?;

		// Only after the order commit; a crash before this line leaves the
		// record retryable.
		record.processed = true;
		self.storage
			.store(StorageKey::Settlements.as_str(), reference, &record)
			.await?;

		tracing::info!(
			reference,
			order_id = %truncate_id(&order.id),
			amount = %tx.amount,
			"Payment settled"
		);
		let event = OrderEvent::payment_success(&order);
		self.fanout.publish_broadcast(event.clone());
		self.fanout.publish_scoped(&order.id, event);

		Ok(ReconciliationOutcome::Completed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil::{actor, draft, engine, engine_with_gateway};
	use dispatch_gateway::implementations::mock::MockGateway;
	use dispatch_types::{Order, OrderEventKind};
	use futures::StreamExt;
	use rust_decimal_macros::dec;
	use std::sync::Arc;

	async fn placed(engine: &DispatchEngine) -> Order {
		engine
			.place_order(draft(Some("ven-1"), dec!(410)), &actor("cus-1", Role::Customer))
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn paid_order_completes_and_confirms() {
		let engine = engine();
		let order = placed(&engine).await;
		let mut tracker = engine.fanout().subscribe_order(&order.id);

		let checkout = engine
			.start_payment(&order.id, &actor("cus-1", Role::Customer))
			.await
			.unwrap();
		assert!(checkout.checkout_url.contains(&checkout.reference));

		let outcome = engine
			.handle_payment_callback(&checkout.reference)
			.await
			.unwrap();
		assert_eq!(outcome, ReconciliationOutcome::Completed);

		let order = engine
			.get_order(&order.id, &actor("cus-1", Role::Customer))
			.await
			.unwrap();
		assert_eq!(order.payment_status, PaymentStatus::Completed);
		assert_eq!(order.status, OrderStatus::Confirmed);

		let event = tracker.next().await.unwrap();
		assert_eq!(event.kind, OrderEventKind::PaymentSuccess);
		assert_eq!(event.payment_status, PaymentStatus::Completed);
	}

	#[tokio::test]
	async fn settlement_does_not_regress_later_statuses() {
		let engine = engine();
		let order = placed(&engine).await;
		engine
			.transition(&order.id, OrderStatus::Preparing, &actor("ven-1", Role::Vendor), None)
			.await
			.unwrap();

		let checkout = engine
			.start_payment(&order.id, &actor("cus-1", Role::Customer))
			.await
			.unwrap();
		engine
			.handle_payment_callback(&checkout.reference)
			.await
			.unwrap();

		let order = engine
			.get_order(&order.id, &actor("adm-1", Role::Admin))
			.await
			.unwrap();
		// Past pending: settlement touches payment status only.
		assert_eq!(order.status, OrderStatus::Preparing);
		assert_eq!(order.payment_status, PaymentStatus::Completed);
	}

	#[tokio::test]
	async fn duplicate_callback_is_already_processed() {
		let engine = engine();
		let order = placed(&engine).await;
		let checkout = engine
			.start_payment(&order.id, &actor("cus-1", Role::Customer))
			.await
			.unwrap();

		let first = engine
			.handle_payment_callback(&checkout.reference)
			.await
			.unwrap();
		assert_eq!(first, ReconciliationOutcome::Completed);

		let paid = engine
			.get_order(&order.id, &actor("adm-1", Role::Admin))
			.await
			.unwrap();

		let second = engine
			.handle_payment_callback(&checkout.reference)
			.await
			.unwrap();
		assert_eq!(second, ReconciliationOutcome::AlreadyProcessed);

		// The second callback mutated nothing.
		let after = engine
			.get_order(&order.id, &actor("adm-1", Role::Admin))
			.await
			.unwrap();
		assert_eq!(after.updated_at, paid.updated_at);
	}

	#[tokio::test]
	async fn short_payment_never_marks_paid() {
		// Gateway claims 399.99 was paid against a 410 order.
		let engine = engine_with_gateway(MockGateway::paying(dec!(399.99)));
		let order = placed(&engine).await;
		let checkout = engine
			.start_payment(&order.id, &actor("cus-1", Role::Customer))
			.await
			.unwrap();

		let outcome = engine
			.handle_payment_callback(&checkout.reference)
			.await
			.unwrap();
		assert_eq!(outcome, ReconciliationOutcome::AmountMismatch);

		let order = engine
			.get_order(&order.id, &actor("adm-1", Role::Admin))
			.await
			.unwrap();
		assert_eq!(order.payment_status, PaymentStatus::Pending);
		assert_eq!(order.status, OrderStatus::Pending);

		// The record stays unprocessed: a replay reconciles again instead
		// of reporting already-processed.
		let again = engine
			.handle_payment_callback(&checkout.reference)
			.await
			.unwrap();
		assert_eq!(again, ReconciliationOutcome::AmountMismatch);
	}

	#[tokio::test]
	async fn failed_transaction_stays_retryable() {
		let engine = engine_with_gateway(MockGateway::failing());
		let order = placed(&engine).await;
		let checkout = engine
			.start_payment(&order.id, &actor("cus-1", Role::Customer))
			.await
			.unwrap();

		let outcome = engine
			.handle_payment_callback(&checkout.reference)
			.await
			.unwrap();
		assert_eq!(outcome, ReconciliationOutcome::Failed);

		let again = engine
			.handle_payment_callback(&checkout.reference)
			.await
			.unwrap();
		assert_eq!(again, ReconciliationOutcome::Failed);

		let order = engine
			.get_order(&order.id, &actor("adm-1", Role::Admin))
			.await
			.unwrap();
		assert_eq!(order.payment_status, PaymentStatus::Pending);
	}

	#[tokio::test]
	async fn unknown_reference_is_rejected() {
		let engine = engine();
		let result = engine.handle_payment_callback("txn-never-issued").await;
		assert!(matches!(result, Err(EngineError::NotFound(_))));
	}

	#[tokio::test]
	async fn second_reference_for_a_paid_order_is_already_paid() {
		let engine = engine();
		let order = placed(&engine).await;
		let customer = actor("cus-1", Role::Customer);

		let first = engine.start_payment(&order.id, &customer).await.unwrap();
		let second = engine.start_payment(&order.id, &customer).await.unwrap();
		assert_ne!(first.reference, second.reference);

		assert_eq!(
			engine.handle_payment_callback(&first.reference).await.unwrap(),
			ReconciliationOutcome::Completed
		);
		assert_eq!(
			engine.handle_payment_callback(&second.reference).await.unwrap(),
			ReconciliationOutcome::AlreadyPaid
		);
		// The already-paid record is marked processed, so its retries stop.
		assert_eq!(
			engine.handle_payment_callback(&second.reference).await.unwrap(),
			ReconciliationOutcome::AlreadyProcessed
		);
	}

	#[tokio::test]
	async fn start_payment_gates_and_rechecks() {
		let engine = engine();
		let order = placed(&engine).await;

		// Visible to the vendor, but only the customer may pay.
		let result = engine
			.start_payment(&order.id, &actor("ven-1", Role::Vendor))
			.await;
		assert!(matches!(result, Err(EngineError::Forbidden(_))));

		// Invisible to strangers: not found, not forbidden.
		let result = engine
			.start_payment(&order.id, &actor("cus-2", Role::Customer))
			.await;
		assert!(matches!(result, Err(EngineError::NotFound(_))));

		// Paying an already-paid order is rejected up front.
		let checkout = engine
			.start_payment(&order.id, &actor("cus-1", Role::Customer))
			.await
			.unwrap();
		engine
			.handle_payment_callback(&checkout.reference)
			.await
			.unwrap();
		let result = engine
			.start_payment(&order.id, &actor("cus-1", Role::Customer))
			.await;
		assert!(matches!(result, Err(EngineError::Validation(_))));
	}

	#[tokio::test]
	async fn concurrent_callbacks_settle_exactly_once() {
		let engine = Arc::new(engine());
		let order = placed(&engine).await;
		let checkout = engine
			.start_payment(&order.id, &actor("cus-1", Role::Customer))
			.await
			.unwrap();

		let mut handles = Vec::new();
		for _ in 0..8 {
			let engine = engine.clone();
			let reference = checkout.reference.clone();
			handles.push(tokio::spawn(async move {
				engine.handle_payment_callback(&reference).await
			}));
		}

		let mut completed = 0;
		for handle in handles {
			match handle.await.unwrap().unwrap() {
				ReconciliationOutcome::Completed => completed += 1,
				ReconciliationOutcome::AlreadyProcessed | ReconciliationOutcome::AlreadyPaid => {},
				other => panic!("unexpected outcome: {}", other),
			}
		}
		assert_eq!(completed, 1);

		let order = engine
			.get_order(&order.id, &actor("adm-1", Role::Admin))
			.await
			.unwrap();
		assert_eq!(order.payment_status, PaymentStatus::Completed);
		assert_eq!(order.status, OrderStatus::Confirmed);
	}
}
