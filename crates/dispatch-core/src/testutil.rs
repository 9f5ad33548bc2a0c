//! Shared fixtures for engine tests: an engine over in-memory storage and
//! the mock gateway, plus draft and actor builders.

use crate::DispatchEngine;
use dispatch_gateway::implementations::mock::MockGateway;
use dispatch_gateway::GatewayService;
use dispatch_notify::FanoutService;
use dispatch_storage::implementations::memory::MemoryStorage;
use dispatch_storage::StorageService;
use dispatch_types::{Actor, LineItem, Location, OrderDraft, OrderKind, Role};
use rust_decimal::Decimal;
use std::sync::Arc;

pub(crate) fn engine() -> DispatchEngine {
	engine_with_gateway(MockGateway::succeeding())
}

pub(crate) fn engine_with_gateway(gateway: MockGateway) -> DispatchEngine {
	let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
	let gateway = Arc::new(GatewayService::new(
		Box::new(gateway),
		"ETB".to_string(),
		"http://localhost:4000/api/payments/verify".to_string(),
	));
	let fanout = Arc::new(FanoutService::new(64, 16));
	DispatchEngine::new(storage, gateway, fanout)
}

pub(crate) fn actor(id: &str, role: Role) -> Actor {
	Actor::new(id, role)
}

/// A draft with a single line item priced to the given total.
pub(crate) fn draft(vendor_id: Option<&str>, total: Decimal) -> OrderDraft {
	OrderDraft {
		customer_id: None,
		vendor_id: vendor_id.map(str::to_string),
		kind: OrderKind::FoodDelivery,
		pickup: Location {
			address: "1 Vendor St".to_string(),
			coordinates: None,
		},
		dropoff: Location {
			address: "2 Customer Ave".to_string(),
			coordinates: None,
		},
		items: vec![LineItem {
			name: "combo".to_string(),
			quantity: 1,
			unit_price: total,
		}],
		total_amount: total,
		notes: None,
	}
}
