use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{FixtureError, Result};
use crate::fixture::FixtureTest;
use crate::fixture_type::FixtureType;

/// Name fixtures with a query are routed to.
pub const QUERY_TYPE: &str = "query";
/// Name fixtures with an exec command are routed to.
pub const EXEC_TYPE: &str = "exec";

/// Registry of fixture types, keyed by name.
#[derive(Default)]
pub struct FixtureTypeRegistry {
    types: RwLock<BTreeMap<String, Arc<dyn FixtureType>>>,
}

impl FixtureTypeRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fixture type under its own name.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateFixtureType` if the name is taken.
    pub fn register(&self, fixture_type: Arc<dyn FixtureType>) -> Result<()> {
        let name = fixture_type.name();
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        if types.contains_key(name) {
            return Err(FixtureError::DuplicateFixtureType(name.to_owned()));
        }
        tracing::debug!(fixture_type = name, "registered fixture type");
        types.insert(name.to_owned(), fixture_type);
        Ok(())
    }

    /// Look up a fixture type by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn FixtureType>> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Pick the fixture type for `test` from its shape.
    ///
    /// A query routes to `query`, which must be registered; otherwise a program
    /// routes to `exec`.
    ///
    /// # Errors
    ///
    /// Returns `UnregisteredFixtureType` when the chosen type is missing, or
    /// `UnknownFixtureShape` when the fixture has neither a query nor an exec.
    pub fn get_for_fixture(&self, test: &FixtureTest) -> Result<Arc<dyn FixtureType>> {
        let type_name = if test.has_query() {
            QUERY_TYPE
        } else if test.has_exec() {
            EXEC_TYPE
        } else {
            return Err(FixtureError::UnknownFixtureShape(test.name.clone()));
        };

        self.get(type_name)
            .ok_or_else(|| FixtureError::UnregisteredFixtureType {
                type_name: type_name.to_owned(),
                fixture: test.name.clone(),
            })
    }

    /// Registered names in sorted order
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Number of registered types
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::fixture_type::RunOptions;
    use crate::result::FixtureResult;

    struct NamedType(&'static str);

    #[async_trait]
    impl FixtureType for NamedType {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn run(&self, test: &FixtureTest, _options: &RunOptions) -> FixtureResult {
            FixtureResult::pass(&test.name)
        }

        fn validate_fixture(&self, _test: &FixtureTest) -> Result<()> {
            Ok(())
        }
    }

    fn fixture(exec: &str, query: &str) -> FixtureTest {
        FixtureTest {
            name: "row".to_owned(),
            exec: exec.to_owned(),
            query: query.to_owned(),
            ..FixtureTest::default()
        }
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = FixtureTypeRegistry::new();
        assert!(registry.register(Arc::new(NamedType("exec"))).is_ok());
        let result = registry.register(Arc::new(NamedType("exec")));
        assert!(matches!(result, Err(FixtureError::DuplicateFixtureType(name)) if name == "exec"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list_sorted() {
        let registry = FixtureTypeRegistry::new();
        assert!(registry.register(Arc::new(NamedType("query"))).is_ok());
        assert!(registry.register(Arc::new(NamedType("exec"))).is_ok());
        assert_eq!(registry.list(), vec!["exec", "query"]);
    }

    #[test]
    fn test_dispatch_by_shape() {
        let registry = FixtureTypeRegistry::new();
        assert!(registry.register(Arc::new(NamedType("exec"))).is_ok());

        let chosen = registry.get_for_fixture(&fixture("echo", "")).map(|found| found.name());
        assert!(matches!(chosen, Ok("exec")));

        let missing = registry.get_for_fixture(&fixture("echo", "kind:fn"));
        assert!(matches!(
            missing,
            Err(FixtureError::UnregisteredFixtureType { type_name, .. }) if type_name == "query"
        ));

        let shapeless = registry.get_for_fixture(&fixture("", ""));
        assert!(matches!(shapeless, Err(FixtureError::UnknownFixtureShape(_))));
    }

    #[test]
    fn test_query_wins_when_registered() {
        let registry = FixtureTypeRegistry::new();
        assert!(registry.register(Arc::new(NamedType("exec"))).is_ok());
        assert!(registry.register(Arc::new(NamedType("query"))).is_ok());
        let chosen = registry.get_for_fixture(&fixture("echo", "kind:fn")).map(|found| found.name());
        assert!(matches!(chosen, Ok("query")));
    }
}
