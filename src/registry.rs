//! Definition registry
//!
//! Name-keyed store for parsed definitions, with alias support. The
//! registry is mutable while a loader populates it and treated as
//! read-only by the resolution layer afterwards; re-registering a name or
//! alias is an error rather than a silent override.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::definition::ComponentDefinition;
use crate::error::RegistryError;

/// Registry of component definitions keyed by name.
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    /// Registration order is preserved for deterministic iteration.
    definitions: IndexMap<String, ComponentDefinition>,
    /// alias -> canonical-or-alias name; chains are resolved on lookup.
    aliases: FxHashMap<String, String>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under its primary name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        definition: ComponentDefinition,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.definitions.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        self.definitions.insert(name, definition);
        Ok(())
    }

    /// Register `alias` as another name for `name`.
    pub fn register_alias(
        &mut self,
        name: impl Into<String>,
        alias: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let alias = alias.into();
        if name.is_empty() || alias.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if alias == name {
            return Err(RegistryError::AliasCycle(alias));
        }
        if self.definitions.contains_key(&alias) {
            return Err(RegistryError::DuplicateName(alias));
        }
        if let Some(target) = self.aliases.get(&alias) {
            return Err(RegistryError::DuplicateAlias {
                alias,
                target: target.clone(),
            });
        }
        // Adding alias -> name must not close a loop through existing
        // aliases (a -> b registered, then b -> a requested).
        if self.canonical_name(&name) == alias {
            return Err(RegistryError::AliasCycle(alias));
        }
        self.aliases.insert(alias, name);
        Ok(())
    }

    /// Look up a definition by name or alias.
    pub fn get(&self, name: &str) -> Option<&ComponentDefinition> {
        self.definitions.get(&self.canonical_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All aliases that (transitively) point at the given name.
    pub fn aliases_of(&self, name: &str) -> Vec<&str> {
        let canonical = self.canonical_name(name);
        self.aliases
            .keys()
            .filter(|alias| self.canonical_name(alias) == canonical && **alias != name)
            .map(String::as_str)
            .collect()
    }

    /// Primary names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Follow alias links to the primary name. Bounded by the alias count,
    /// so a registration bug cannot loop forever.
    fn canonical_name(&self, name: &str) -> String {
        let mut current = name;
        for _ in 0..=self.aliases.len() {
            match self.aliases.get(current) {
                Some(next) => current = next,
                None => break,
            }
        }
        current.to_string()
    }
}
