//! Event types for order change fan-out.
//!
//! Every committed order mutation produces an [`OrderEvent`] that flows to a
//! broadcast stream (dashboard list refresh) and to the per-order scope of
//! any live tracker. Events are snapshots, not deltas: consumers can render
//! them without a follow-up read.

use crate::{Order, OrderStatus, PaymentStatus};
use serde::{Deserialize, Serialize};

/// Discriminant for order events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventKind {
	/// A new order was placed.
	NewOrder,
	/// An order's status (and possibly driver/payment fields) changed.
	Update,
	/// A payment was reconciled against the order.
	PaymentSuccess,
}

/// Snapshot published after a committed order mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
	#[serde(rename = "type")]
	pub kind: OrderEventKind,
	pub order_id: String,
	pub status: OrderStatus,
	pub payment_status: PaymentStatus,
	pub updated_at: u64,
}

impl OrderEvent {
	fn from_order(kind: OrderEventKind, order: &Order) -> Self {
		Self {
			kind,
			order_id: order.id.clone(),
			status: order.status,
			payment_status: order.payment_status,
			updated_at: order.updated_at,
		}
	}

	pub fn new_order(order: &Order) -> Self {
		Self::from_order(OrderEventKind::NewOrder, order)
	}

	pub fn update(order: &Order) -> Self {
		Self::from_order(OrderEventKind::Update, order)
	}

	pub fn payment_success(order: &Order) -> Self {
		Self::from_order(OrderEventKind::PaymentSuccess, order)
	}
}
