//! Order processing types for the dispatch system.
//!
//! This module defines the order aggregate and its component parts: the
//! parties attached to an order, the pickup/dropoff itinerary, line items,
//! and the status enums the lifecycle state machine operates on.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of delivery work an order represents.
///
/// Purely informational; no lifecycle logic branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
	#[default]
	FoodDelivery,
	PackageDelivery,
	Pickup,
}

/// Geographic coordinates attached to a location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
	pub lat: f64,
	pub lng: f64,
}

/// A pickup or dropoff point: a display address plus optional coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
	pub address: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub coordinates: Option<GeoPoint>,
}

/// A single purchasable line on an order. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
	pub name: String,
	pub quantity: u32,
	pub unit_price: Decimal,
}

impl LineItem {
	/// Line total: unit price times quantity.
	pub fn subtotal(&self) -> Decimal {
		self.unit_price * Decimal::from(self.quantity)
	}
}

/// Represents a placed order moving through the delivery lifecycle.
///
/// An order links a customer to an optional vendor and driver, carries the
/// itinerary and priced line items, and tracks both delivery status and
/// payment status. The record is never hard-deleted; a terminal status
/// closes it but it persists for history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: String,
	/// Customer who placed the order. Required, immutable.
	pub customer_id: String,
	/// Vendor fulfilling the order, when one is attached.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub vendor_id: Option<String>,
	/// Driver assigned to the order. Set at most once by self-assignment;
	/// never cleared by a status transition.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub driver_id: Option<String>,
	#[serde(default)]
	pub kind: OrderKind,
	pub pickup: Location,
	pub dropoff: Location,
	/// Priced lines, immutable after creation.
	pub items: Vec<LineItem>,
	/// Fixed at creation; only read and compared during reconciliation.
	pub total_amount: Decimal,
	/// Current lifecycle status.
	pub status: OrderStatus,
	/// Current payment status, advanced by the reconciler.
	pub payment_status: PaymentStatus,
	/// Free-form delivery instructions.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
	/// Timestamp when this order was created.
	pub created_at: u64,
	/// Timestamp when this order was last updated.
	pub updated_at: u64,
}

impl Order {
	/// Sum of the line subtotals.
	pub fn items_total(&self) -> Decimal {
		self.items.iter().map(LineItem::subtotal).sum()
	}

	/// True once the order has reached a status no transition may leave.
	pub fn is_closed(&self) -> bool {
		self.status.is_terminal()
	}
}

/// Input supplied by the order-placement caller.
///
/// The acting customer becomes the order's customer; `customer_id` is only
/// honored when an admin places an order on a customer's behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub customer_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub vendor_id: Option<String>,
	#[serde(default)]
	pub kind: OrderKind,
	pub pickup: Location,
	pub dropoff: Location,
	pub items: Vec<LineItem>,
	pub total_amount: Decimal,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
}

/// Lifecycle status of an order in the dispatch system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	/// Placed, awaiting vendor confirmation.
	Pending,
	/// Accepted by the vendor.
	Confirmed,
	/// Being prepared by the vendor.
	Preparing,
	/// Ready for driver pickup.
	Ready,
	/// In the driver's possession.
	PickedUp,
	/// En route to the dropoff.
	InTransit,
	/// Handed over at the dropoff. Terminal.
	Delivered,
	/// Cancelled before completion. Terminal.
	Cancelled,
}

impl OrderStatus {
	/// Wire/storage spelling of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Confirmed => "confirmed",
			OrderStatus::Preparing => "preparing",
			OrderStatus::Ready => "ready",
			OrderStatus::PickedUp => "picked_up",
			OrderStatus::InTransit => "in_transit",
			OrderStatus::Delivered => "delivered",
			OrderStatus::Cancelled => "cancelled",
		}
	}

	/// Terminal statuses admit no further transitions.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

/// Payment state of an order.
///
/// Moves only pending -> completed or pending -> failed; completed is
/// terminal and repeated settlement attempts are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
	Pending,
	Completed,
	Failed,
}

impl PaymentStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			PaymentStatus::Pending => "pending",
			PaymentStatus::Completed => "completed",
			PaymentStatus::Failed => "failed",
		}
	}

	pub fn is_completed(&self) -> bool {
		matches!(self, PaymentStatus::Completed)
	}
}

impl fmt::Display for PaymentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	fn item(name: &str, quantity: u32, unit_price: Decimal) -> LineItem {
		LineItem {
			name: name.to_string(),
			quantity,
			unit_price,
		}
	}

	#[test]
	fn items_total_sums_line_subtotals() {
		let order = Order {
			id: "ord-1".to_string(),
			customer_id: "cus-1".to_string(),
			vendor_id: None,
			driver_id: None,
			kind: OrderKind::FoodDelivery,
			pickup: Location {
				address: "1 Vendor St".to_string(),
				coordinates: None,
			},
			dropoff: Location {
				address: "2 Customer Ave".to_string(),
				coordinates: Some(GeoPoint { lat: 9.01, lng: 38.76 }),
			},
			items: vec![
				item("injera", 3, dec!(45.50)),
				item("water", 2, dec!(12.00)),
			],
			total_amount: dec!(160.50),
			status: OrderStatus::Pending,
			payment_status: PaymentStatus::Pending,
			notes: None,
			created_at: 0,
			updated_at: 0,
		};

		assert_eq!(order.items_total(), dec!(160.50));
		assert_eq!(order.items_total(), order.total_amount);
	}

	#[test]
	fn status_wire_names_are_snake_case() {
		let json = serde_json::to_string(&OrderStatus::PickedUp).unwrap();
		assert_eq!(json, "\"picked_up\"");
		let json = serde_json::to_string(&OrderStatus::InTransit).unwrap();
		assert_eq!(json, "\"in_transit\"");

		let parsed: OrderStatus = serde_json::from_str("\"ready\"").unwrap();
		assert_eq!(parsed, OrderStatus::Ready);
	}

	#[test]
	fn only_delivered_and_cancelled_are_terminal() {
		let terminal: Vec<OrderStatus> = [
			OrderStatus::Pending,
			OrderStatus::Confirmed,
			OrderStatus::Preparing,
			OrderStatus::Ready,
			OrderStatus::PickedUp,
			OrderStatus::InTransit,
			OrderStatus::Delivered,
			OrderStatus::Cancelled,
		]
		.into_iter()
		.filter(OrderStatus::is_terminal)
		.collect();

		assert_eq!(terminal, vec![OrderStatus::Delivered, OrderStatus::Cancelled]);
	}
}
