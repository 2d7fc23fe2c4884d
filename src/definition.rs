//! Component definition model
//!
//! A [`ComponentDefinition`] is the declarative description of one
//! configurable component, prior to any instantiation. Definitions are
//! produced by the parser, registered by name, and consumed by a merging /
//! instantiation layer outside this crate.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;

use crate::element::Location;
use crate::value::Value;

/// Lifecycle policy for a definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Scope {
    /// One shared instance per container
    #[default]
    Singleton,
    /// A fresh instance per request
    Prototype,
    /// A custom scope resolved by name at runtime
    Custom(String),
}

impl Scope {
    pub const SINGLETON: &'static str = "singleton";
    pub const PROTOTYPE: &'static str = "prototype";

    /// Map a declared scope name; anything unrecognized is a custom scope.
    pub fn parse(value: &str) -> Scope {
        match value {
            Self::SINGLETON => Scope::Singleton,
            Self::PROTOTYPE => Scope::Prototype,
            other => Scope::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Singleton => f.write_str(Self::SINGLETON),
            Scope::Prototype => f.write_str(Self::PROTOTYPE),
            Scope::Custom(name) => f.write_str(name),
        }
    }
}

/// Autowiring strategy for a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutowireMode {
    #[default]
    No,
    ByName,
    ByType,
    Constructor,
    /// Retained for compatibility with old documents; superseded by
    /// `Constructor` / `ByType`.
    AutoDetect,
}

impl AutowireMode {
    /// Map a declared autowire value; anything unrecognized means `No`.
    pub fn parse(value: &str) -> AutowireMode {
        match value {
            "byName" => AutowireMode::ByName,
            "byType" => AutowireMode::ByType,
            "constructor" => AutowireMode::Constructor,
            "autodetect" => AutowireMode::AutoDetect,
            _ => AutowireMode::No,
        }
    }
}

/// Dependency validation level for a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyCheck {
    #[default]
    None,
    Simple,
    Objects,
    All,
}

impl DependencyCheck {
    /// Map a declared dependency-check value; anything unrecognized means
    /// `None`.
    pub fn parse(value: &str) -> DependencyCheck {
        match value {
            "simple" => DependencyCheck::Simple,
            "objects" => DependencyCheck::Objects,
            "all" => DependencyCheck::All,
            _ => DependencyCheck::None,
        }
    }
}

/// One constructor-argument value with its optional declared type and
/// parameter name.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueHolder {
    pub value: Value,
    pub type_name: Option<String>,
    pub name: Option<String>,
    pub location: Option<Location>,
}

impl ValueHolder {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            type_name: None,
            name: None,
            location: None,
        }
    }
}

/// Indexed and unindexed constructor arguments of one definition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstructorArguments {
    indexed: BTreeMap<usize, ValueHolder>,
    generic: Vec<ValueHolder>,
}

impl ConstructorArguments {
    pub fn has_indexed(&self, index: usize) -> bool {
        self.indexed.contains_key(&index)
    }

    /// Callers must reject index reuse before inserting; the parser reports
    /// reuse as an ambiguity error.
    pub fn add_indexed(&mut self, index: usize, holder: ValueHolder) {
        self.indexed.insert(index, holder);
    }

    pub fn add_generic(&mut self, holder: ValueHolder) {
        self.generic.push(holder);
    }

    pub fn indexed(&self) -> impl Iterator<Item = (usize, &ValueHolder)> {
        self.indexed.iter().map(|(i, h)| (*i, h))
    }

    pub fn generic(&self) -> &[ValueHolder] {
        &self.generic
    }

    pub fn len(&self) -> usize {
        self.indexed.len() + self.generic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.generic.is_empty()
    }
}

/// One named property binding.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue {
    pub name: String,
    pub value: Value,
    pub metadata: Vec<MetadataAttribute>,
    pub location: Option<Location>,
}

/// Ordered, name-unique property bindings of one definition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyValues {
    values: Vec<PropertyValue>,
}

impl PropertyValues {
    pub fn contains(&self, name: &str) -> bool {
        self.values.iter().any(|pv| pv.name == name)
    }

    /// Callers must reject duplicate names before inserting; the parser
    /// reports duplicates as structural errors.
    pub fn add(&mut self, value: PropertyValue) {
        self.values.push(value);
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.iter().find(|pv| pv.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyValue> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Arbitrary key/value metadata attached to a definition, property or
/// qualifier. Duplicate keys are retained in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataAttribute {
    pub key: String,
    pub value: String,
    pub location: Option<Location>,
}

/// An attribute-bearing tag narrowing autowire-by-type candidate selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Qualifier {
    pub type_name: String,
    pub attributes: IndexMap<String, String>,
    pub location: Option<Location>,
}

impl Qualifier {
    /// Key under which the shorthand `value` attribute is stored.
    pub const VALUE_KEY: &'static str = "value";

    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: IndexMap::new(),
            location: None,
        }
    }
}

/// Method-level overrides applied by the instantiation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodOverride {
    /// Replace a method's return value with a container lookup.
    Lookup {
        method_name: String,
        target_name: String,
        location: Option<Location>,
    },
    /// Replace a method's implementation with a named replacer component.
    Replace {
        method_name: String,
        replacer_name: String,
        /// Type name fragments disambiguating overloaded methods.
        arg_type_matchers: Vec<String>,
        location: Option<Location>,
    },
}

/// Declarative description of one configurable component.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComponentDefinition {
    /// Implementation type identifier, resolved externally.
    pub type_name: Option<String>,
    /// Template definition this one extends. Unresolved parents are legal
    /// at parse time; merging happens in a later pass.
    pub parent_name: Option<String>,
    pub scope: Scope,
    pub lazy_init: bool,
    pub abstract_flag: bool,
    pub primary: bool,
    pub autowire_candidate: bool,
    pub autowire: AutowireMode,
    pub dependency_check: DependencyCheck,
    /// Explicit ordering hints; duplicates allowed, order significant.
    pub depends_on: Vec<String>,
    pub init_method: Option<String>,
    /// False when the init method was inherited from defaults: a missing
    /// method is then skipped silently instead of failing.
    pub enforce_init: bool,
    pub destroy_method: Option<String>,
    pub enforce_destroy: bool,
    pub factory_method: Option<String>,
    pub factory_component: Option<String>,
    pub constructor_args: ConstructorArguments,
    pub properties: PropertyValues,
    pub qualifiers: Vec<Qualifier>,
    pub method_overrides: Vec<MethodOverride>,
    pub metadata: Vec<MetadataAttribute>,
    pub description: Option<String>,
    pub location: Option<Location>,
    /// Description of the resource the definition came from.
    pub resource: Option<String>,
}

impl ComponentDefinition {
    pub fn new(type_name: Option<String>, parent_name: Option<String>) -> Self {
        Self {
            type_name,
            parent_name,
            autowire_candidate: true,
            enforce_init: true,
            enforce_destroy: true,
            ..Self::default()
        }
    }

    pub fn is_singleton(&self) -> bool {
        self.scope == Scope::Singleton
    }

    pub fn is_prototype(&self) -> bool {
        self.scope == Scope::Prototype
    }
}

/// A definition together with its primary name and aliases.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionHolder {
    pub definition: ComponentDefinition,
    pub name: String,
    pub aliases: Vec<String>,
}

impl DefinitionHolder {
    pub fn new(definition: ComponentDefinition, name: impl Into<String>) -> Self {
        Self {
            definition,
            name: name.into(),
            aliases: Vec::new(),
        }
    }
}
