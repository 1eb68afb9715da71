//! Canonical prompt-version registry.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::{Error, Result};

use super::PromptKind;

/// In-memory map from prompt kind to its current "major.minor" version.
///
/// Versions change only through [`PromptRegistry::update`], which logs the
/// transition. Pass one instance into each generator; there is no ambient
/// default.
pub struct PromptRegistry {
    versions: RwLock<HashMap<PromptKind, String>>,
}

fn major(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}

impl PromptRegistry {
    /// Registry with no entries. `get`/`update` fail for every kind until
    /// one is added via [`PromptRegistry::with_defaults`]-style seeding.
    pub fn empty() -> Self {
        Self {
            versions: RwLock::new(HashMap::new()),
        }
    }

    /// Registry pre-populated with every kind's default version.
    pub fn with_defaults() -> Self {
        let versions = PromptKind::ALL
            .iter()
            .map(|kind| (*kind, kind.default_version().to_string()))
            .collect();
        Self {
            versions: RwLock::new(versions),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<PromptKind, String>> {
        self.versions.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current version for a kind.
    pub fn get(&self, kind: PromptKind) -> Result<String> {
        self.read()
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::UnknownPromptKind(kind.to_string()))
    }

    /// Exact-match check. Logs a warning on mismatch but never fails.
    pub fn validate(&self, kind: PromptKind, received: &str) -> bool {
        match self.read().get(&kind) {
            Some(current) if current == received => true,
            Some(current) => {
                tracing::warn!(
                    kind = %kind,
                    expected = %current,
                    received = %received,
                    "prompt version mismatch"
                );
                false
            }
            None => {
                tracing::warn!(kind = %kind, received = %received, "prompt kind not registered");
                false
            }
        }
    }

    /// True iff the received version shares the current major version.
    pub fn is_compatible(&self, kind: PromptKind, received: &str) -> bool {
        self.read()
            .get(&kind)
            .map(|current| major(current) == major(received))
            .unwrap_or(false)
    }

    /// Replace a kind's version, logging the transition.
    pub fn update(&self, kind: PromptKind, new_version: impl Into<String>) -> Result<()> {
        let new_version = new_version.into();
        let mut versions = self
            .versions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(current) = versions.get_mut(&kind) else {
            return Err(Error::UnknownPromptKind(kind.to_string()));
        };
        tracing::info!(kind = %kind, from = %current, to = %new_version, "prompt version updated");
        *current = new_version;
        Ok(())
    }

    /// Defensive copy of the full map.
    pub fn all(&self) -> HashMap<PromptKind, String> {
        self.read().clone()
    }
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_defaults_are_seeded() {
        let registry = PromptRegistry::with_defaults();
        assert_eq!(registry.get(PromptKind::FileSummary).unwrap(), "1.1");
        assert_eq!(registry.get(PromptKind::ChunkSummary).unwrap(), "1.0");
        assert_eq!(registry.all().len(), PromptKind::ALL.len());
    }

    #[test]
    fn test_empty_registry_rejects_lookups() {
        let registry = PromptRegistry::empty();
        assert!(matches!(
            registry.get(PromptKind::FileSummary),
            Err(Error::UnknownPromptKind(_))
        ));
        assert!(matches!(
            registry.update(PromptKind::FileSummary, "2.0"),
            Err(Error::UnknownPromptKind(_))
        ));
    }

    #[test]
    fn test_update_changes_validation_but_not_compatibility() {
        let registry = PromptRegistry::with_defaults();
        registry.update(PromptKind::FileSummary, "1.2").unwrap();

        // A 1.1 response no longer validates exactly...
        assert!(!registry.validate(PromptKind::FileSummary, "1.1"));
        assert!(registry.validate(PromptKind::FileSummary, "1.2"));
        // ...but stays compatible within the same major version.
        assert!(registry.is_compatible(PromptKind::FileSummary, "1.0"));
        assert!(!registry.is_compatible(PromptKind::FileSummary, "2.0"));
    }

    #[test]
    fn test_all_returns_a_defensive_copy() {
        let registry = PromptRegistry::with_defaults();
        let mut copy = registry.all();
        copy.insert(PromptKind::FileSummary, "9.9".to_string());
        assert_eq!(registry.get(PromptKind::FileSummary).unwrap(), "1.1");
    }

    proptest! {
        /// Major-version equality is reflexive and symmetric.
        #[test]
        fn prop_compatibility_is_reflexive_and_symmetric(
            major_a in 0u32..10,
            minor_a in 0u32..10,
            major_b in 0u32..10,
            minor_b in 0u32..10,
        ) {
            let a = format!("{major_a}.{minor_a}");
            let b = format!("{major_b}.{minor_b}");

            let registry = PromptRegistry::with_defaults();
            registry.update(PromptKind::ChunkSummary, a.clone()).unwrap();
            prop_assert!(registry.is_compatible(PromptKind::ChunkSummary, &a));
            let a_sees_b = registry.is_compatible(PromptKind::ChunkSummary, &b);

            registry.update(PromptKind::ChunkSummary, b).unwrap();
            let b_sees_a = registry.is_compatible(PromptKind::ChunkSummary, &a);
            prop_assert_eq!(a_sees_b, b_sees_a);
            prop_assert_eq!(a_sees_b, major_a == major_b);
        }
    }
}
