use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

static GLOBAL_REGISTRY: LazyLock<Arc<NameRegistry>> = LazyLock::new(|| Arc::new(NameRegistry::new()));

/// Hands out unique schema names.
///
/// The first request for a base name returns it unchanged; later requests append the number
/// of earlier uses (`UserInputSchema`, `UserInputSchema1`, `UserInputSchema2`). A candidate
/// that is itself already registered is skipped.
#[derive(Debug, Default)]
pub struct NameRegistry {
    used: Mutex<HashMap<String, usize>>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used when no other one is injected.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    pub fn register(&self, name: &str) -> String {
        let mut used = self.used.lock().unwrap_or_else(PoisonError::into_inner);
        let mut count = used.get(name).copied().unwrap_or(0);
        let mut unique = name.to_string();
        if count > 0 {
            unique = format!("{name}{count}");
            while used.contains_key(&unique) {
                count += 1;
                unique = format!("{name}{count}");
            }
        }
        *used.entry(name.to_string()).or_insert(0) += 1;
        if unique != name {
            *used.entry(unique.clone()).or_insert(0) += 1;
        }
        unique
    }

    /// How many times `name` has been requested as a base name or handed out.
    pub fn usage(&self, name: &str) -> usize {
        self.used
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffixes_follow_usage_count() {
        let registry = NameRegistry::new();
        assert_eq!(registry.register("UserInputSchema"), "UserInputSchema");
        assert_eq!(registry.register("UserInputSchema"), "UserInputSchema1");
        assert_eq!(registry.register("UserInputSchema"), "UserInputSchema2");
        assert_eq!(registry.usage("UserInputSchema"), 3);
    }

    #[test]
    fn test_taken_candidates_are_skipped() {
        let registry = NameRegistry::new();
        assert_eq!(registry.register("Schema1"), "Schema1");
        assert_eq!(registry.register("Schema"), "Schema");
        assert_eq!(registry.register("Schema"), "Schema2");
        assert_eq!(registry.register("Schema1"), "Schema11");
    }

    #[test]
    fn test_registries_are_independent() {
        let first = NameRegistry::new();
        let second = NameRegistry::new();
        first.register("TeamOutputSchema");
        assert_eq!(second.register("TeamOutputSchema"), "TeamOutputSchema");
    }
}
