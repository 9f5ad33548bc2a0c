//! Order creation, lookup and role-scoped listing.
//!
//! Visibility is one predicate shared by lookup and listing: a lookup of an
//! order the caller may not see reports `NotFound`, so absence and denial
//! are indistinguishable from the outside.

use crate::{DispatchEngine, EngineError};
use dispatch_types::{
	amounts_match, current_timestamp, truncate_id, Actor, LineItem, Order, OrderDraft, OrderEvent,
	OrderStatus, PaymentStatus, Role, StorageKey,
};
use rust_decimal::Decimal;
use uuid::Uuid;

/// True when the order is visible to the actor.
///
/// Drivers additionally see unassigned orders still in a stage a driver
/// could claim, which is what makes self-assignment discoverable.
pub(crate) fn can_view(order: &Order, actor: &Actor) -> bool {
	match actor.role {
		Role::Admin => true,
		Role::Customer => order.customer_id == actor.id,
		Role::Vendor => order.vendor_id.as_deref() == Some(actor.id.as_str()),
		Role::Driver => {
			order.driver_id.as_deref() == Some(actor.id.as_str())
				|| (order.driver_id.is_none()
					&& matches!(
						order.status,
						OrderStatus::Pending | OrderStatus::Preparing | OrderStatus::Ready
					))
		},
	}
}

fn validate_draft(draft: &OrderDraft) -> Result<(), EngineError> {
	if draft.items.is_empty() {
		return Err(EngineError::Validation("Order must contain at least one item".into()));
	}
	for item in &draft.items {
		if item.quantity < 1 {
			return Err(EngineError::Validation(format!(
				"Item '{}' must have a quantity of at least 1",
				item.name
			)));
		}
		if item.unit_price < Decimal::ZERO {
			return Err(EngineError::Validation(format!(
				"Item '{}' has a negative unit price",
				item.name
			)));
		}
	}
	if draft.total_amount < Decimal::ZERO {
		return Err(EngineError::Validation("Total amount cannot be negative".into()));
	}
	let computed: Decimal = draft.items.iter().map(LineItem::subtotal).sum();
	if !amounts_match(draft.total_amount, computed) {
		return Err(EngineError::Validation(format!(
			"Declared total {} does not match the item sum {}",
			draft.total_amount, computed
		)));
	}
	Ok(())
}

impl DispatchEngine {
	/// Places a new order for the acting customer.
	///
	/// The customer party is always the caller; an admin may place an order
	/// on a customer's behalf by naming that customer in the draft. The
	/// declared total must agree with the item sum, client-submitted totals
	/// are never trusted.
	pub async fn place_order(&self, draft: OrderDraft, actor: &Actor) -> Result<Order, EngineError> {
		let customer_id = match actor.role {
			Role::Customer => {
				if let Some(id) = &draft.customer_id {
					if id != &actor.id {
						return Err(EngineError::Validation(
							"customer_id must match the calling customer".into(),
						));
					}
				}
				actor.id.clone()
			},
			Role::Admin => draft.customer_id.clone().ok_or_else(|| {
				EngineError::Validation(
					"customer_id is required when an admin places an order".into(),
				)
			})?,
			_ => {
				return Err(EngineError::Forbidden(format!(
					"Role '{}' cannot place orders",
					actor.role
				)))
			},
		};

		validate_draft(&draft)?;

		let now = current_timestamp();
		let order = Order {
			id: Uuid::new_v4().simple().to_string(),
			customer_id,
			vendor_id: draft.vendor_id,
			driver_id: None,
			kind: draft.kind,
			pickup: draft.pickup,
			dropoff: draft.dropoff,
			items: draft.items,
			total_amount: draft.total_amount,
			status: OrderStatus::Pending,
			payment_status: PaymentStatus::Pending,
			notes: draft.notes,
			created_at: now,
			updated_at: now,
		};

		self.storage
			.store(StorageKey::Orders.as_str(), &order.id, &order)
			.await?;

		tracing::info!(
			order_id = %truncate_id(&order.id),
			customer_id = %order.customer_id,
			total = %order.total_amount,
			"Order placed"
		);
		self.fanout.publish_broadcast(OrderEvent::new_order(&order));

		Ok(order)
	}

	/// Fetches one order, subject to the caller's visibility.
	pub async fn get_order(&self, order_id: &str, actor: &Actor) -> Result<Order, EngineError> {
		let order = self.load_order(order_id).await?;
		if !can_view(&order, actor) {
			return Err(EngineError::NotFound(format!("Order '{}' not found", order_id)));
		}
		Ok(order)
	}

	/// Lists the orders visible to the actor, most recent first.
	///
	/// Ties on the creation timestamp are broken by id so repeated listings
	/// are deterministic.
	pub async fn list_orders(&self, actor: &Actor) -> Result<Vec<Order>, EngineError> {
		let mut orders: Vec<Order> = self
			.storage
			.retrieve_all(StorageKey::Orders.as_str())
			.await?
			.into_iter()
			.filter(|order| can_view(order, actor))
			.collect();

		orders.sort_by(|a, b| {
			b.created_at
				.cmp(&a.created_at)
				.then_with(|| a.id.cmp(&b.id))
		});
		Ok(orders)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil::{actor, draft, engine};
	use rust_decimal_macros::dec;

	#[tokio::test]
	async fn placed_order_starts_pending_and_unpaid() {
		let engine = engine();
		let customer = actor("cus-1", Role::Customer);

		let order = engine
			.place_order(draft(Some("ven-1"), dec!(410)), &customer)
			.await
			.unwrap();

		assert_eq!(order.customer_id, "cus-1");
		assert_eq!(order.vendor_id.as_deref(), Some("ven-1"));
		assert_eq!(order.status, OrderStatus::Pending);
		assert_eq!(order.payment_status, PaymentStatus::Pending);
		assert!(order.driver_id.is_none());

		let loaded = engine.get_order(&order.id, &customer).await.unwrap();
		assert_eq!(loaded.total_amount, dec!(410));
	}

	#[tokio::test]
	async fn admin_places_on_a_customers_behalf() {
		let engine = engine();
		let mut behalf = draft(None, dec!(50));
		behalf.customer_id = Some("cus-9".to_string());

		let order = engine
			.place_order(behalf, &actor("adm-1", Role::Admin))
			.await
			.unwrap();
		assert_eq!(order.customer_id, "cus-9");

		// Without a named customer the admin draft is rejected.
		let result = engine
			.place_order(draft(None, dec!(50)), &actor("adm-1", Role::Admin))
			.await;
		assert!(matches!(result, Err(EngineError::Validation(_))));
	}

	#[tokio::test]
	async fn only_customers_and_admins_place_orders() {
		let engine = engine();
		for role in [Role::Vendor, Role::Driver] {
			let result = engine
				.place_order(draft(None, dec!(50)), &actor("x-1", role))
				.await;
			assert!(matches!(result, Err(EngineError::Forbidden(_))));
		}
	}

	#[tokio::test]
	async fn drafts_are_validated_before_any_write() {
		let engine = engine();
		let customer = actor("cus-1", Role::Customer);

		let mut empty = draft(None, dec!(0));
		empty.items.clear();
		assert!(matches!(
			engine.place_order(empty, &customer).await,
			Err(EngineError::Validation(_))
		));

		let mut zero_quantity = draft(None, dec!(50));
		zero_quantity.items[0].quantity = 0;
		assert!(matches!(
			engine.place_order(zero_quantity, &customer).await,
			Err(EngineError::Validation(_))
		));

		let mut negative_price = draft(None, dec!(50));
		negative_price.items[0].unit_price = dec!(-1);
		assert!(matches!(
			engine.place_order(negative_price, &customer).await,
			Err(EngineError::Validation(_))
		));

		assert!(engine.list_orders(&customer).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn declared_total_must_match_item_sum() {
		let engine = engine();
		let customer = actor("cus-1", Role::Customer);

		let mut padded = draft(None, dec!(410));
		padded.total_amount = dec!(500);
		let result = engine.place_order(padded, &customer).await;
		assert!(matches!(result, Err(EngineError::Validation(_))));

		// Within a cent is accepted.
		let mut rounded = draft(None, dec!(410));
		rounded.total_amount = dec!(410.01);
		engine.place_order(rounded, &customer).await.unwrap();
	}

	#[tokio::test]
	async fn invisible_orders_read_as_not_found() {
		let engine = engine();
		let order = engine
			.place_order(draft(Some("ven-1"), dec!(50)), &actor("cus-1", Role::Customer))
			.await
			.unwrap();

		let result = engine
			.get_order(&order.id, &actor("cus-2", Role::Customer))
			.await;
		assert!(matches!(result, Err(EngineError::NotFound(_))));

		let result = engine
			.get_order(&order.id, &actor("ven-2", Role::Vendor))
			.await;
		assert!(matches!(result, Err(EngineError::NotFound(_))));

		engine
			.get_order(&order.id, &actor("ven-1", Role::Vendor))
			.await
			.unwrap();
		engine
			.get_order(&order.id, &actor("adm-1", Role::Admin))
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn drivers_see_claimable_and_assigned_orders() {
		let engine = engine();
		let customer = actor("cus-1", Role::Customer);
		let driver = actor("drv-1", Role::Driver);

		let unassigned = engine
			.place_order(draft(None, dec!(50)), &customer)
			.await
			.unwrap();
		// Unassigned and pending: claimable, hence visible.
		engine.get_order(&unassigned.id, &driver).await.unwrap();

		// Once another driver claims it, it disappears for this driver.
		engine
			.transition(&unassigned.id, OrderStatus::PickedUp, &actor("drv-2", Role::Driver), None)
			.await
			.unwrap();
		let result = engine.get_order(&unassigned.id, &driver).await;
		assert!(matches!(result, Err(EngineError::NotFound(_))));

		let listed = engine.list_orders(&actor("drv-2", Role::Driver)).await.unwrap();
		assert_eq!(listed.len(), 1);
	}

	#[tokio::test]
	async fn listing_is_scoped_and_newest_first() {
		let engine = engine();
		let first = engine
			.place_order(draft(Some("ven-1"), dec!(10)), &actor("cus-1", Role::Customer))
			.await
			.unwrap();
		let second = engine
			.place_order(draft(Some("ven-1"), dec!(20)), &actor("cus-2", Role::Customer))
			.await
			.unwrap();

		let mine = engine.list_orders(&actor("cus-1", Role::Customer)).await.unwrap();
		assert_eq!(mine.len(), 1);
		assert_eq!(mine[0].id, first.id);

		let vendors = engine.list_orders(&actor("ven-1", Role::Vendor)).await.unwrap();
		assert_eq!(vendors.len(), 2);

		let all = engine.list_orders(&actor("adm-1", Role::Admin)).await.unwrap();
		assert_eq!(all.len(), 2);
		// Same creation second: the id tie-break keeps the output stable.
		let expected_first = std::cmp::min(&first.id, &second.id);
		if first.created_at == second.created_at {
			assert_eq!(&all[0].id, expected_first);
		}
	}
}
