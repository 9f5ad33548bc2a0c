//! HTTP server for the dispatch API.
//!
//! A thin layer over the engine: handlers extract the acting identity from
//! headers, deserialize the body, call one engine operation and map
//! `EngineError` onto the API error envelope. The payment verification
//! callback is the one unauthenticated route; it acknowledges every
//! reconciliation outcome with 200 so the gateway's retry loop stops.

use axum::{
	extract::{Path, Query, State},
	http::{HeaderMap, StatusCode},
	response::Json,
	routing::{get, post, put},
	Router,
};
use dispatch_config::Config;
use dispatch_core::DispatchEngine;
use dispatch_types::{
	APIError, Actor, CheckoutSession, Order, OrderDraft, OrderStatus, PaymentStatus,
	ReconciliationOutcome, Role,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the engine for processing requests.
	pub engine: Arc<DispatchEngine>,
}

/// Body of a status transition request.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransitionRequest {
	pub status: OrderStatus,
	/// Optional manual payment-status edit, gated to the order's vendor or
	/// an admin.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payment_status: Option<PaymentStatus>,
}

/// Response of a status transition request.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransitionResponse {
	pub changed: bool,
	pub order: Order,
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
	pub reference: String,
}

/// Response of the payment verification callback.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
	pub reference: String,
	pub outcome: ReconciliationOutcome,
}

/// Starts the HTTP server and serves until a shutdown signal arrives.
pub async fn start_server(
	config: Config,
	engine: Arc<DispatchEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(engine);

	let bind_address = format!("{}:{}", config.api.host, config.api.port);
	let listener = TcpListener::bind(&bind_address).await?;
	tracing::info!("Dispatch API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "Failed to listen for shutdown signal");
	}
	tracing::info!("Shutdown signal received");
}

/// Builds the router with the /api base path.
pub fn router(engine: Arc<DispatchEngine>) -> Router {
	let state = AppState { engine };

	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(handle_place_order).get(handle_list_orders))
				.route("/orders/{id}", get(handle_get_order))
				.route("/orders/{id}/status", put(handle_transition))
				.route("/payments/initialize/{id}", post(handle_start_payment))
				.route("/payments/verify", get(handle_verify))
				.route("/health", get(handle_health)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(state)
}

/// Extracts the acting identity from the `X-Actor-Id` / `X-Actor-Role`
/// headers. Authentication terminates upstream; these headers are trusted.
fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, APIError> {
	let id = headers
		.get("x-actor-id")
		.and_then(|value| value.to_str().ok())
		.filter(|value| !value.is_empty())
		.ok_or_else(|| bad_actor("Missing or invalid X-Actor-Id header"))?;
	let role = headers
		.get("x-actor-role")
		.and_then(|value| value.to_str().ok())
		.ok_or_else(|| bad_actor("Missing or invalid X-Actor-Role header"))?;
	let role: Role = role
		.parse()
		.map_err(|_| bad_actor(&format!("Unknown actor role '{}'", role)))?;

	Ok(Actor::new(id, role))
}

fn bad_actor(message: &str) -> APIError {
	APIError::BadRequest {
		error_type: "invalid_actor".to_string(),
		message: message.to_string(),
		details: None,
	}
}

/// Handles POST /api/orders.
async fn handle_place_order(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(draft): Json<OrderDraft>,
) -> Result<(StatusCode, Json<Order>), APIError> {
	let actor = actor_from_headers(&headers)?;
	let order = state.engine.place_order(draft, &actor).await?;
	Ok((StatusCode::CREATED, Json(order)))
}

/// Handles GET /api/orders.
async fn handle_list_orders(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<Vec<Order>>, APIError> {
	let actor = actor_from_headers(&headers)?;
	let orders = state.engine.list_orders(&actor).await?;
	Ok(Json(orders))
}

/// Handles GET /api/orders/{id}.
async fn handle_get_order(
	State(state): State<AppState>,
	Path(id): Path<String>,
	headers: HeaderMap,
) -> Result<Json<Order>, APIError> {
	let actor = actor_from_headers(&headers)?;
	let order = state.engine.get_order(&id, &actor).await?;
	Ok(Json(order))
}

/// Handles PUT /api/orders/{id}/status.
async fn handle_transition(
	State(state): State<AppState>,
	Path(id): Path<String>,
	headers: HeaderMap,
	Json(request): Json<TransitionRequest>,
) -> Result<Json<TransitionResponse>, APIError> {
	let actor = actor_from_headers(&headers)?;
	let outcome = state
		.engine
		.transition(&id, request.status, &actor, request.payment_status)
		.await?;
	Ok(Json(TransitionResponse {
		changed: outcome.changed,
		order: outcome.order,
	}))
}

/// Handles POST /api/payments/initialize/{id}.
async fn handle_start_payment(
	State(state): State<AppState>,
	Path(id): Path<String>,
	headers: HeaderMap,
) -> Result<Json<CheckoutSession>, APIError> {
	let actor = actor_from_headers(&headers)?;
	let checkout = state.engine.start_payment(&id, &actor).await?;
	Ok(Json(checkout))
}

/// Handles GET /api/payments/verify?reference=.
///
/// Takes no actor. Every reconciliation outcome is a 200; only a reference
/// the engine never issued is a 404.
async fn handle_verify(
	State(state): State<AppState>,
	Query(params): Query<VerifyParams>,
) -> Result<Json<VerifyResponse>, APIError> {
	let outcome = state.engine.handle_payment_callback(&params.reference).await?;
	Ok(Json(VerifyResponse {
		reference: params.reference,
		outcome,
	}))
}

/// Handles GET /api/health.
async fn handle_health() -> Json<serde_json::Value> {
	Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::HeaderValue;
	use dispatch_gateway::implementations::mock::MockGateway;
	use dispatch_gateway::GatewayService;
	use dispatch_notify::FanoutService;
	use dispatch_storage::implementations::memory::MemoryStorage;
	use dispatch_storage::StorageService;
	use dispatch_types::{LineItem, Location, OrderKind};
	use rust_decimal_macros::dec;

	fn state() -> AppState {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let gateway = Arc::new(GatewayService::new(
			Box::new(MockGateway::succeeding()),
			"ETB".to_string(),
			"http://localhost:4000/api/payments/verify".to_string(),
		));
		let fanout = Arc::new(FanoutService::new(64, 16));
		AppState {
			engine: Arc::new(DispatchEngine::new(storage, gateway, fanout)),
		}
	}

	fn headers(id: &str, role: &str) -> HeaderMap {
		let mut headers = HeaderMap::new();
		headers.insert("x-actor-id", HeaderValue::from_str(id).unwrap());
		headers.insert("x-actor-role", HeaderValue::from_str(role).unwrap());
		headers
	}

	fn draft() -> OrderDraft {
		OrderDraft {
			customer_id: None,
			vendor_id: Some("ven-1".to_string()),
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
				unit_price: dec!(410),
			}],
			total_amount: dec!(410),
			notes: None,
		}
	}

	#[test]
	fn actor_headers_parse_or_reject() {
		let actor = actor_from_headers(&headers("cus-1", "customer")).unwrap();
		assert_eq!(actor.id, "cus-1");
		assert_eq!(actor.role, Role::Customer);

		let mut missing_id = HeaderMap::new();
		missing_id.insert("x-actor-role", HeaderValue::from_static("customer"));
		let err = actor_from_headers(&missing_id).unwrap_err();
		assert_eq!(err.status_code(), 400);

		let err = actor_from_headers(&headers("cus-1", "superuser")).unwrap_err();
		assert_eq!(err.status_code(), 400);

		let err = actor_from_headers(&headers("", "customer")).unwrap_err();
		assert_eq!(err.status_code(), 400);
	}

	#[tokio::test]
	async fn place_order_returns_created() {
		let state = state();
		let (status, Json(order)) = handle_place_order(
			State(state.clone()),
			headers("cus-1", "customer"),
			Json(draft()),
		)
		.await
		.unwrap();

		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(order.customer_id, "cus-1");

		let Json(orders) = handle_list_orders(State(state), headers("cus-1", "customer"))
			.await
			.unwrap();
		assert_eq!(orders.len(), 1);
	}

	#[tokio::test]
	async fn engine_errors_surface_with_mapped_statuses() {
		let state = state();
		let (_, Json(order)) = handle_place_order(
			State(state.clone()),
			headers("cus-1", "customer"),
			Json(draft()),
		)
		.await
		.unwrap();

		// Stranger lookup: 404, not 403.
		let err = handle_get_order(
			State(state.clone()),
			Path(order.id.clone()),
			headers("cus-2", "customer"),
		)
		.await
		.unwrap_err();
		assert_eq!(err.status_code(), 404);

		// Foreign vendor transition: 403.
		let err = handle_transition(
			State(state.clone()),
			Path(order.id.clone()),
			headers("ven-2", "vendor"),
			Json(TransitionRequest {
				status: OrderStatus::Confirmed,
				payment_status: None,
			}),
		)
		.await
		.unwrap_err();
		assert_eq!(err.status_code(), 403);

		// Backward move: 409.
		handle_transition(
			State(state.clone()),
			Path(order.id.clone()),
			headers("ven-1", "vendor"),
			Json(TransitionRequest {
				status: OrderStatus::Ready,
				payment_status: None,
			}),
		)
		.await
		.unwrap();
		let err = handle_transition(
			State(state),
			Path(order.id),
			headers("ven-1", "vendor"),
			Json(TransitionRequest {
				status: OrderStatus::Preparing,
				payment_status: None,
			}),
		)
		.await
		.unwrap_err();
		assert_eq!(err.status_code(), 409);
	}

	#[tokio::test]
	async fn verify_acknowledges_every_outcome() {
		let state = state();
		let (_, Json(order)) = handle_place_order(
			State(state.clone()),
			headers("cus-1", "customer"),
			Json(draft()),
		)
		.await
		.unwrap();
		let Json(checkout) = handle_start_payment(
			State(state.clone()),
			Path(order.id.clone()),
			headers("cus-1", "customer"),
		)
		.await
		.unwrap();

		let Json(first) = handle_verify(
			State(state.clone()),
			Query(VerifyParams {
				reference: checkout.reference.clone(),
			}),
		)
		.await
		.unwrap();
		assert_eq!(first.outcome, ReconciliationOutcome::Completed);

		// The duplicate is still a 200, with the outcome in the body.
		let Json(second) = handle_verify(
			State(state.clone()),
			Query(VerifyParams {
				reference: checkout.reference.clone(),
			}),
		)
		.await
		.unwrap();
		assert_eq!(second.outcome, ReconciliationOutcome::AlreadyProcessed);

		// Only a reference the engine never issued is a 404.
		let err = handle_verify(
			State(state),
			Query(VerifyParams {
				reference: "txn-never-issued".to_string(),
			}),
		)
		.await
		.unwrap_err();
		assert_eq!(err.status_code(), 404);
	}

	#[tokio::test]
	async fn health_reports_ok() {
		let Json(body) = handle_health().await;
		assert_eq!(body["status"], "ok");
	}
}
