//! Bound value model
//!
//! Every constructor argument, property, collection entry and map key/value
//! resolves to one [`Value`]. The set of kinds is closed on purpose:
//! value-kind-specific logic downstream matches exhaustively instead of
//! dispatching through a trait object.
//!
//! Nothing in this model is resolved. References record the *intent* to
//! reference a name; literals keep their raw text plus an optional target
//! type name for a later conversion step.

use crate::definition::DefinitionHolder;
use crate::element::Location;

/// A bound argument or property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A literal scalar, possibly typed. A `None` payload is the
    /// distinguished null literal, not an absent value.
    Literal(TypedStringValue),
    /// Reference to another component by name, resolved at instantiation
    /// time, optionally against the enclosing context.
    Ref(ComponentRef),
    /// A component *name* captured as a string value (validated to exist,
    /// but never resolved to an instance).
    NameRef(NameReference),
    /// Ordered collection literal.
    List(CollectionValue),
    /// Unordered collection literal (order of declaration is preserved for
    /// provenance, uniqueness is enforced at conversion time).
    Set(CollectionValue),
    /// Fixed-size array literal.
    Array(CollectionValue),
    /// Mapping literal; keys and values are themselves values.
    Map(MapValue),
    /// String-to-string property bag.
    Props(PropsValue),
    /// Nested anonymous definition with its generated name.
    Definition(Box<DefinitionHolder>),
}

impl Value {
    /// The source location the value was declared at, when known.
    pub fn location(&self) -> Option<Location> {
        match self {
            Value::Literal(v) => v.location,
            Value::Ref(v) => v.location,
            Value::NameRef(v) => v.location,
            Value::List(v) | Value::Set(v) | Value::Array(v) => v.location,
            Value::Map(v) => v.location,
            Value::Props(v) => v.location,
            Value::Definition(holder) => holder.definition.location,
        }
    }

    /// True for a collection literal whose merge flag is set.
    pub fn merge_enabled(&self) -> bool {
        match self {
            Value::List(v) | Value::Set(v) | Value::Array(v) => v.merge,
            Value::Map(v) => v.merge,
            Value::Props(v) => v.merge,
            _ => false,
        }
    }
}

/// A raw string literal with an optional target type name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypedStringValue {
    /// Raw text; `None` is the distinguished null literal.
    pub value: Option<String>,
    /// Effective target type name (explicit or inherited from the
    /// enclosing collection's declared element/key/value type).
    pub type_name: Option<String>,
    /// Type name as literally written on this node, if any.
    pub specified_type_name: Option<String>,
    pub location: Option<Location>,
}

impl TypedStringValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// The distinguished null literal.
    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

/// Deferred reference to another component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRef {
    pub name: String,
    /// Resolve against the enclosing context rather than this one.
    pub to_parent: bool,
    pub location: Option<Location>,
}

impl ComponentRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            to_parent: false,
            location: None,
        }
    }
}

/// A component name captured as a plain string value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameReference {
    pub name: String,
    pub location: Option<Location>,
}

/// Shared shape of list, set and array literals.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionValue {
    /// Declared element type, propagated to children as their default.
    pub element_type: Option<String>,
    /// Append to an inherited parent collection instead of replacing it.
    pub merge: bool,
    pub values: Vec<Value>,
    pub location: Option<Location>,
}

/// Mapping literal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapValue {
    pub key_type: Option<String>,
    pub value_type: Option<String>,
    pub merge: bool,
    /// Declaration-ordered entries; keys are full values (literals or refs).
    pub entries: Vec<(Value, Value)>,
    pub location: Option<Location>,
}

/// String-to-string property bag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PropsValue {
    pub merge: bool,
    pub entries: Vec<(String, String)>,
    pub location: Option<Location>,
}
