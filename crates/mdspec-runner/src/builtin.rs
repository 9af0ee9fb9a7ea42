use std::sync::{Arc, LazyLock};

use mdspec_core::FixtureTypeRegistry;

use crate::exec::ExecFixtureType;

static DEFAULT_REGISTRY: LazyLock<Arc<FixtureTypeRegistry>> = LazyLock::new(|| {
    let registry = FixtureTypeRegistry::new();
    if let Err(err) = register_builtin(&registry) {
        panic!("built-in fixture types failed to register: {err}");
    }
    Arc::new(registry)
});

/// Register every built-in fixture type into `registry`.
///
/// # Errors
///
/// Returns `DuplicateFixtureType` if a built-in name is already taken.
pub fn register_builtin(registry: &FixtureTypeRegistry) -> mdspec_core::Result<()> {
    registry.register(Arc::new(ExecFixtureType))
}

/// The process-wide registry, populated with the built-in types on first use.
///
/// # Panics
///
/// Panics on first use if two built-in types share a name.
#[must_use]
pub fn default_registry() -> Arc<FixtureTypeRegistry> {
    Arc::clone(&DEFAULT_REGISTRY)
}
