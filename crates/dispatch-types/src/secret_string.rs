//! Secure string type for sensitive configuration values.
//!
//! Gateway API keys arrive through configuration and must never leak into
//! logs, debug output or serialized config dumps. `SecretString` wraps them
//! in memory that is zeroed on drop and redacts every display path.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

/// A string whose contents are zeroed on drop and redacted in output.
///
/// Use for API tokens and any other credential material carried in config.
#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	/// Wraps an owned string.
	pub fn new(s: String) -> Self {
		Self(Zeroizing::new(s))
	}

	/// Exposes the secret value.
	///
	/// Call sites should keep the exposed slice short-lived and must not log
	/// or store it.
	pub fn expose_secret(&self) -> &str {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SecretString(<redacted>)")
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<redacted>")
	}
}

impl From<String> for SecretString {
	fn from(s: String) -> Self {
		Self::new(s)
	}
}

impl From<&str> for SecretString {
	fn from(s: &str) -> Self {
		Self::new(s.to_string())
	}
}

impl PartialEq for SecretString {
	fn eq(&self, other: &Self) -> bool {
		self.0.as_str() == other.0.as_str()
	}
}

impl Eq for SecretString {}

// Serializing a secret always redacts; secrets only ever flow in.
impl Serialize for SecretString {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str("<redacted>")
	}
}

impl<'de> Deserialize<'de> for SecretString {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		Ok(SecretString::new(s))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn debug_and_display_are_redacted() {
		let secret = SecretString::from("CHASECK_TEST-abc123");
		assert_eq!(format!("{:?}", secret), "SecretString(<redacted>)");
		assert_eq!(format!("{}", secret), "<redacted>");
	}

	#[test]
	fn expose_returns_the_inner_value() {
		let secret = SecretString::from("CHASECK_TEST-abc123");
		assert_eq!(secret.expose_secret(), "CHASECK_TEST-abc123");
		assert!(!secret.is_empty());
	}

	#[test]
	fn serialization_never_contains_the_value() {
		let secret = SecretString::from("CHASECK_TEST-abc123");
		let json = serde_json::to_string(&secret).unwrap();
		assert_eq!(json, "\"<redacted>\"");
	}

	#[test]
	fn equality_compares_contents() {
		assert_eq!(SecretString::from("k1"), SecretString::from("k1"));
		assert_ne!(SecretString::from("k1"), SecretString::from("k2"));
	}
}
