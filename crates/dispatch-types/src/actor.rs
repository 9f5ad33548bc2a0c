//! Caller identity types.
//!
//! Every engine operation receives an [`Actor`] describing who is calling.
//! Identity is established by an upstream session layer; the engine trusts
//! the id and role as given and only applies role/ownership gates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role attached to an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	Customer,
	Vendor,
	Driver,
	Admin,
}

impl Role {
	pub fn as_str(&self) -> &'static str {
		match self {
			Role::Customer => "customer",
			Role::Vendor => "vendor",
			Role::Driver => "driver",
			Role::Admin => "admin",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl FromStr for Role {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"customer" => Ok(Role::Customer),
			"vendor" => Ok(Role::Vendor),
			"driver" => Ok(Role::Driver),
			"admin" => Ok(Role::Admin),
			_ => Err(()),
		}
	}
}

/// An authenticated caller: opaque id plus role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
	pub id: String,
	pub role: Role,
}

impl Actor {
	pub fn new(id: impl Into<String>, role: Role) -> Self {
		Self {
			id: id.into(),
			role,
		}
	}

	pub fn is_admin(&self) -> bool {
		self.role == Role::Admin
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn role_parses_wire_names() {
		assert_eq!("driver".parse::<Role>(), Ok(Role::Driver));
		assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
		assert!("superuser".parse::<Role>().is_err());
		// Header values are matched exactly; no case folding.
		assert!("Driver".parse::<Role>().is_err());
	}
}
