//! Notification fan-out module for the dispatch system.
//!
//! Every committed order mutation is published twice: onto a broadcast
//! channel consumed by dashboard list views, and onto a channel scoped to
//! the mutated order consumed by live trackers. Both channels are bounded
//! ring buffers; a slow subscriber lags and loses the oldest events rather
//! than ever stalling the publishing side.
//!
//! Per-order ordering holds because publishers call from inside the order's
//! critical section: two commits to the same order publish in commit order,
//! and a broadcast channel preserves send order per receiver.

use dashmap::DashMap;
use dispatch_types::OrderEvent;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

/// Fan-out service owning the broadcast channel and the per-order scopes.
///
/// Join, leave and publish all run concurrently; the scope registry is a
/// lock-free map and publishing never blocks on a subscriber.
pub struct FanoutService {
	/// The general "orders changed" stream.
	broadcast: broadcast::Sender<OrderEvent>,
	/// Per-order scopes, created on first subscribe and pruned once empty.
	scopes: DashMap<String, broadcast::Sender<OrderEvent>>,
	/// Ring-buffer capacity for each scope channel.
	scope_capacity: usize,
}

impl FanoutService {
	/// Creates a fan-out service with the given ring-buffer capacities.
	pub fn new(broadcast_capacity: usize, scope_capacity: usize) -> Self {
		let (broadcast, _) = broadcast::channel(broadcast_capacity);
		Self {
			broadcast,
			scopes: DashMap::new(),
			scope_capacity,
		}
	}

	/// Publishes an event to every broadcast subscriber.
	///
	/// Best-effort: an event published while nobody is subscribed is
	/// dropped, which is fine for list-refresh consumers.
	pub fn publish_broadcast(&self, event: OrderEvent) {
		self.broadcast.send(event).ok();
	}

	/// Publishes an event to the subscribers of one order's scope.
	///
	/// A scope nobody joined is a silent no-op. A scope whose last
	/// subscriber disconnected is pruned here.
	pub fn publish_scoped(&self, order_id: &str, event: OrderEvent) {
		let Some(scope) = self.scopes.get(order_id) else {
			return;
		};
		if scope.send(event).is_err() {
			// All receivers are gone; drop the guard before removing.
			drop(scope);
			self.scopes
				.remove_if(order_id, |_, sender| sender.receiver_count() == 0);
		}
	}

	/// Subscribes to the general "orders changed" stream.
	pub fn subscribe_broadcast(&self) -> EventStream {
		EventStream::new(self.broadcast.subscribe())
	}

	/// Joins the notification scope of one order.
	///
	/// The scope is created on first join. Dropping the returned stream
	/// leaves the scope; the registry entry is pruned on the next publish.
	pub fn subscribe_order(&self, order_id: &str) -> EventStream {
		let receiver = self
			.scopes
			.entry(order_id.to_string())
			.or_insert_with(|| broadcast::channel(self.scope_capacity).0)
			.subscribe();
		EventStream::new(receiver)
	}

	/// Number of live per-order scopes, for observability.
	pub fn scope_count(&self) -> usize {
		self.scopes.len()
	}
}

/// Stream of [`OrderEvent`]s for one subscriber.
///
/// Wraps a broadcast receiver; when the subscriber lags behind the ring
/// buffer the skipped (oldest) events are dropped and the stream continues
/// with the newest, logging how many were lost.
pub struct EventStream {
	inner: BroadcastStream<OrderEvent>,
}

impl EventStream {
	fn new(receiver: broadcast::Receiver<OrderEvent>) -> Self {
		Self {
			inner: BroadcastStream::new(receiver),
		}
	}
}

impl Stream for EventStream {
	type Item = OrderEvent;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		loop {
			match Pin::new(&mut self.inner).poll_next(cx) {
				Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
				Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
					tracing::warn!(skipped, "Subscriber lagged; oldest events dropped");
					continue;
				},
				Poll::Ready(None) => return Poll::Ready(None),
				Poll::Pending => return Poll::Pending,
			}
		}
	}
}
