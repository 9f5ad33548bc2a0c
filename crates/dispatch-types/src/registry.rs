//! Registry trait for self-registering implementations.
//!
//! Pluggable components (storage backends, payment gateway providers) each
//! provide a Registry struct implementing this trait, tying the name used in
//! configuration files to a factory function.

/// Base trait for implementation registries.
///
/// Each pluggable module must provide a Registry struct that implements this
/// trait, declaring its configuration name and factory function.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// This should match the key used in the TOML configuration, for example:
	/// - "memory" for storage.backends.memory
	/// - "chapa" for gateway.providers.chapa
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	///
	/// Each module defines its own factory type, for example StorageFactory
	/// for storage backends or GatewayFactory for gateway providers.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
