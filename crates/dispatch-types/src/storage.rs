//! Storage-related types for the dispatch system.

use std::str::FromStr;

/// Storage namespaces for the persistent collections the engine owns.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Order aggregates keyed by order id.
	Orders,
	/// Checkout sessions keyed by transaction reference.
	PaymentSessions,
	/// Settlement idempotency records keyed by transaction reference.
	Settlements,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::PaymentSessions => "payment_sessions",
			StorageKey::Settlements => "settlements",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Orders, Self::PaymentSessions, Self::Settlements].into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"payment_sessions" => Ok(Self::PaymentSessions),
			"settlements" => Ok(Self::Settlements),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
