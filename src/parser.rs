//! Definition parser
//!
//! [`DefinitionParser`] walks `<component>` elements and their children and
//! produces [`ComponentDefinition`] values. One parser instance serves one
//! nesting level of a document: it owns that level's resolved defaults and
//! the set of names already used there.
//!
//! Parsing is best-effort. Problems are reported to the shared collector
//! and the offending node's value is treated as absent; a whole definition
//! is only abandoned for compatibility errors (the legacy `singleton`
//! attribute).

use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::debug;

use crate::defaults::{ResolvedDefaults, DEFAULT_VALUE};
use crate::definition::{
    AutowireMode, ComponentDefinition, DefinitionHolder, DependencyCheck, MetadataAttribute,
    MethodOverride, PropertyValue, Qualifier, Scope, ValueHolder,
};
use crate::diagnostics::{ParseEntry, ParseState, Problem, ProblemCollector, ProblemKind};
use crate::element::{Element, Location};
use crate::reader::{DecorationSource, NamespaceHandlerResolver};
use crate::value::{
    CollectionValue, ComponentRef, MapValue, NameReference, PropsValue, TypedStringValue, Value,
};

/// Namespace URI of the core definition vocabulary. Elements without any
/// namespace are treated as belonging to it as well.
pub const DEFAULT_NAMESPACE: &str = "https://bindery.dev/schema/components";

/// URI prefix under which a missing namespace handler is an error rather
/// than somebody else's extension.
pub(crate) const SCHEMA_PREFIX: &str = "https://bindery.dev/";

pub const COMPONENT_ELEMENT: &str = "component";
const DESCRIPTION_ELEMENT: &str = "description";
const META_ELEMENT: &str = "meta";
const LOOKUP_METHOD_ELEMENT: &str = "lookup-method";
const REPLACED_METHOD_ELEMENT: &str = "replaced-method";
const ARG_TYPE_ELEMENT: &str = "arg-type";
const CONSTRUCTOR_ARG_ELEMENT: &str = "constructor-arg";
const PROPERTY_ELEMENT: &str = "property";
const QUALIFIER_ELEMENT: &str = "qualifier";
const QUALIFIER_ATTRIBUTE_ELEMENT: &str = "attribute";
const REF_ELEMENT: &str = "ref";
const IDREF_ELEMENT: &str = "idref";
const VALUE_ELEMENT: &str = "value";
const NULL_ELEMENT: &str = "null";
const ARRAY_ELEMENT: &str = "array";
const LIST_ELEMENT: &str = "list";
const SET_ELEMENT: &str = "set";
const MAP_ELEMENT: &str = "map";
const ENTRY_ELEMENT: &str = "entry";
const KEY_ELEMENT: &str = "key";
const PROPS_ELEMENT: &str = "props";
const PROP_ELEMENT: &str = "prop";

const ID_ATTRIBUTE: &str = "id";
const NAME_ATTRIBUTE: &str = "name";
const CLASS_ATTRIBUTE: &str = "class";
const PARENT_ATTRIBUTE: &str = "parent";
const SCOPE_ATTRIBUTE: &str = "scope";
const SINGLETON_ATTRIBUTE: &str = "singleton";
const ABSTRACT_ATTRIBUTE: &str = "abstract";
const LAZY_INIT_ATTRIBUTE: &str = "lazy-init";
const AUTOWIRE_ATTRIBUTE: &str = "autowire";
const AUTOWIRE_CANDIDATE_ATTRIBUTE: &str = "autowire-candidate";
const PRIMARY_ATTRIBUTE: &str = "primary";
const DEPENDENCY_CHECK_ATTRIBUTE: &str = "dependency-check";
const DEPENDS_ON_ATTRIBUTE: &str = "depends-on";
const INIT_METHOD_ATTRIBUTE: &str = "init-method";
const DESTROY_METHOD_ATTRIBUTE: &str = "destroy-method";
const FACTORY_METHOD_ATTRIBUTE: &str = "factory-method";
const FACTORY_COMPONENT_ATTRIBUTE: &str = "factory-component";
const INDEX_ATTRIBUTE: &str = "index";
const TYPE_ATTRIBUTE: &str = "type";
const REF_ATTRIBUTE: &str = "ref";
const VALUE_ATTRIBUTE: &str = "value";
const KEY_ATTRIBUTE: &str = "key";
const KEY_REF_ATTRIBUTE: &str = "key-ref";
const KEY_TYPE_ATTRIBUTE: &str = "key-type";
const VALUE_REF_ATTRIBUTE: &str = "value-ref";
const VALUE_TYPE_ATTRIBUTE: &str = "value-type";
const MERGE_ATTRIBUTE: &str = "merge";
const COMPONENT_REF_ATTRIBUTE: &str = "component";
const LOCAL_REF_ATTRIBUTE: &str = "local";
const PARENT_REF_ATTRIBUTE: &str = "parent";
const REPLACER_ATTRIBUTE: &str = "replacer";
const MATCH_ATTRIBUTE: &str = "match";

const TRUE_VALUE: &str = "true";

/// The closed attribute vocabulary of a `<component>` element. Anything
/// else without a namespace is a structural error; namespaced attributes
/// go to decoration instead.
const COMPONENT_ATTRIBUTES: &[&str] = &[
    ID_ATTRIBUTE,
    NAME_ATTRIBUTE,
    CLASS_ATTRIBUTE,
    PARENT_ATTRIBUTE,
    SCOPE_ATTRIBUTE,
    ABSTRACT_ATTRIBUTE,
    LAZY_INIT_ATTRIBUTE,
    AUTOWIRE_ATTRIBUTE,
    AUTOWIRE_CANDIDATE_ATTRIBUTE,
    PRIMARY_ATTRIBUTE,
    DEPENDENCY_CHECK_ATTRIBUTE,
    DEPENDS_ON_ATTRIBUTE,
    INIT_METHOD_ATTRIBUTE,
    DESTROY_METHOD_ATTRIBUTE,
    FACTORY_METHOD_ATTRIBUTE,
    FACTORY_COMPONENT_ATTRIBUTE,
];

const PROPERTY_ATTRIBUTES: &[&str] = &[NAME_ATTRIBUTE, REF_ATTRIBUTE, VALUE_ATTRIBUTE];

const CONSTRUCTOR_ARG_ATTRIBUTES: &[&str] = &[
    INDEX_ATTRIBUTE,
    TYPE_ATTRIBUTE,
    NAME_ATTRIBUTE,
    REF_ATTRIBUTE,
    VALUE_ATTRIBUTE,
];

/// Delimiters splitting multi-valued attributes (`name`, `depends-on`).
const MULTI_VALUE_DELIMITERS: &[char] = &[',', ';', ' '];

/// Resolves declared type names to external type identifiers.
///
/// This core never instantiates anything; the resolver only validates that
/// a name is known so typed literals can be checked at parse time.
pub trait TypeResolver: Send + Sync {
    fn resolve(&self, type_name: &str) -> Result<(), TypeNotFound>;
}

/// Raised by a [`TypeResolver`] for an unknown type name.
#[derive(Error, Debug)]
#[error("unknown type '{0}'")]
pub struct TypeNotFound(pub String);

/// A resolver that accepts every type name, deferring all validation to
/// the instantiation layer.
#[derive(Debug, Default)]
pub struct AcceptAllTypes;

impl TypeResolver for AcceptAllTypes {
    fn resolve(&self, _type_name: &str) -> Result<(), TypeNotFound> {
        Ok(())
    }
}

/// Naming strategy for definitions declared without an id or name.
pub trait NameGenerator: Send + Sync {
    fn generate(&self, definition: &ComponentDefinition) -> String;
}

/// Default naming strategy: the type name (or parent name, or a generic
/// stem) plus a process-wide counter.
#[derive(Debug, Default)]
pub struct CountingNameGenerator {
    counter: AtomicU64,
}

impl CountingNameGenerator {
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }
}

impl NameGenerator for CountingNameGenerator {
    fn generate(&self, definition: &ComponentDefinition) -> String {
        let stem = definition
            .type_name
            .as_deref()
            .or(definition.parent_name.as_deref())
            .unwrap_or("component");
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{stem}#{n}")
    }
}

/// Collaborators shared by every parser of one document load.
#[derive(Clone, Copy)]
pub struct ParserConfig<'a> {
    pub problems: &'a ProblemCollector,
    pub types: &'a dyn TypeResolver,
    pub names: &'a dyn NameGenerator,
    pub namespaces: &'a dyn NamespaceHandlerResolver,
    /// Description of the resource being parsed, for provenance.
    pub resource: Option<&'a str>,
}

/// Parses `<component>` elements at one nesting level of a document.
pub struct DefinitionParser<'a> {
    defaults: ResolvedDefaults,
    config: ParserConfig<'a>,
    /// Names and aliases already claimed at this nesting level. Duplicates
    /// across levels are legal.
    used_names: FxHashSet<String>,
    state: ParseState,
}

impl<'a> DefinitionParser<'a> {
    pub fn new(defaults: ResolvedDefaults, config: ParserConfig<'a>) -> Self {
        Self {
            defaults,
            config,
            used_names: FxHashSet::default(),
            state: ParseState::new(),
        }
    }

    pub fn defaults(&self) -> &ResolvedDefaults {
        &self.defaults
    }

    /// Description of the resource being parsed, if known.
    pub fn resource(&self) -> Option<&str> {
        self.config.resource
    }

    /// Parse a top-level `<component>` element.
    pub fn parse_definition(&mut self, element: &Element) -> Option<DefinitionHolder> {
        self.parse_definition_in(element, None)
    }

    /// Parse a `<component>` element, possibly nested inside another
    /// definition. May return `None` after reporting problems.
    pub fn parse_definition_in(
        &mut self,
        element: &Element,
        containing: Option<&ComponentDefinition>,
    ) -> Option<DefinitionHolder> {
        let id = element.attribute_or_empty(ID_ATTRIBUTE);
        let mut aliases: Vec<String> = tokenize(element.attribute_or_empty(NAME_ATTRIBUTE));

        let mut name = id.to_string();
        if name.is_empty() && !aliases.is_empty() {
            name = aliases.remove(0);
            debug!(%name, "no 'id' specified, promoting first name to primary");
        }

        if containing.is_none() {
            self.check_name_uniqueness(&name, &aliases, element.location());
        }

        let display_name = (!name.is_empty()).then(|| name.clone());
        self.state.push(ParseEntry::Component(display_name));
        let definition = self.parse_definition_body(element, containing);
        self.state.pop();

        let mut definition = definition?;
        definition.location = Some(element.location());
        definition.resource = self.config.resource.map(str::to_string);

        if name.is_empty() {
            name = self.config.names.generate(&definition);
            debug!(%name, "generated name for anonymous definition");
        }

        Some(DefinitionHolder {
            definition,
            name,
            aliases,
        })
    }

    /// Decorate a parsed definition through namespace handlers registered
    /// for any foreign attributes or child elements on its node.
    pub fn decorate_if_required(
        &mut self,
        element: &Element,
        holder: DefinitionHolder,
    ) -> DefinitionHolder {
        let mut holder = holder;
        for attribute in element.attributes() {
            if attribute
                .namespace
                .as_deref()
                .is_some_and(|ns| ns != DEFAULT_NAMESPACE)
            {
                holder = self.decorate_node(
                    DecorationSource::Attribute(attribute),
                    holder,
                    element.location(),
                );
            }
        }
        for child in element.children() {
            if !is_default_namespace(child) {
                holder = self.decorate_node(
                    DecorationSource::Element(child),
                    holder,
                    child.location(),
                );
            }
        }
        holder
    }

    /// Parse an element in a foreign namespace through its registered
    /// handler. A missing handler is a hard error.
    pub fn parse_custom_element(
        &mut self,
        element: &Element,
        containing: Option<&ComponentDefinition>,
    ) -> Option<ComponentDefinition> {
        let uri = element.namespace().unwrap_or_default();
        match self.config.namespaces.resolve(uri) {
            Some(handler) => handler.parse(element, self, containing),
            None => {
                self.problem(
                    ProblemKind::Structure,
                    format!("no namespace handler found for namespace [{uri}]"),
                    Some(element.location()),
                );
                None
            }
        }
    }

    fn decorate_node(
        &mut self,
        source: DecorationSource<'_>,
        holder: DefinitionHolder,
        location: Location,
    ) -> DefinitionHolder {
        let uri = source.namespace().unwrap_or_default().to_string();
        match self.config.namespaces.resolve(&uri) {
            Some(handler) => handler.decorate(source, holder, self),
            None if uri.starts_with(SCHEMA_PREFIX) => {
                self.problem(
                    ProblemKind::Structure,
                    format!("no namespace handler found for namespace [{uri}]"),
                    Some(location),
                );
                holder
            }
            None => {
                // A foreign namespace not managed here, e.g. xml:* attributes.
                debug!(namespace = %uri, "no handler for foreign namespace, ignoring");
                holder
            }
        }
    }

    fn check_name_uniqueness(&mut self, name: &str, aliases: &[String], location: Location) {
        let mut found: Option<&str> = None;
        if !name.is_empty() && self.used_names.contains(name) {
            found = Some(name);
        }
        if found.is_none() {
            found = aliases
                .iter()
                .find(|alias| self.used_names.contains(*alias))
                .map(String::as_str);
        }
        if let Some(found) = found {
            self.problem(
                ProblemKind::NameCollision,
                format!("name '{found}' is already used at this nesting level"),
                Some(location),
            );
        }
        // Claim the names regardless, so one collision does not cascade.
        if !name.is_empty() {
            self.used_names.insert(name.to_string());
        }
        self.used_names
            .extend(aliases.iter().cloned().filter(|a| !a.is_empty()));
    }

    fn parse_definition_body(
        &mut self,
        element: &Element,
        containing: Option<&ComponentDefinition>,
    ) -> Option<ComponentDefinition> {
        if element.has_attribute(SINGLETON_ATTRIBUTE) {
            self.problem(
                ProblemKind::Compatibility,
                "legacy boolean 'singleton' attribute in use - upgrade to a 'scope' declaration",
                Some(element.location()),
            );
            return None;
        }

        self.check_known_attributes(element, COMPONENT_ATTRIBUTES);

        let type_name = element
            .attribute(CLASS_ATTRIBUTE)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let parent_name = element
            .attribute(PARENT_ATTRIBUTE)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let mut definition = ComponentDefinition::new(type_name, parent_name);
        self.parse_definition_attributes(element, containing, &mut definition);

        definition.description = element
            .child_named(DESCRIPTION_ELEMENT)
            .map(|d| d.text().to_string());
        definition.metadata = self.parse_meta_elements(element);
        self.parse_lookup_overrides(element, &mut definition);
        self.parse_replaced_methods(element, &mut definition);
        self.parse_constructor_args(element, &mut definition);
        self.parse_property_elements(element, &mut definition);
        self.parse_qualifier_elements(element, &mut definition);

        self.check_merge_has_parent(&definition);
        Some(definition)
    }

    fn parse_definition_attributes(
        &mut self,
        element: &Element,
        containing: Option<&ComponentDefinition>,
        definition: &mut ComponentDefinition,
    ) {
        if let Some(scope) = element.attribute(SCOPE_ATTRIBUTE).filter(|s| !s.is_empty()) {
            definition.scope = Scope::parse(scope);
        } else if let Some(containing) = containing {
            // Inner definitions take the scope of their container.
            definition.scope = containing.scope.clone();
        }

        if let Some(value) = element.attribute(ABSTRACT_ATTRIBUTE) {
            definition.abstract_flag = value == TRUE_VALUE;
        }

        definition.lazy_init = match element.attribute(LAZY_INIT_ATTRIBUTE) {
            None | Some(DEFAULT_VALUE) => self.defaults.lazy_init,
            Some(value) => value == TRUE_VALUE,
        };

        definition.autowire = match element.attribute(AUTOWIRE_ATTRIBUTE) {
            None | Some(DEFAULT_VALUE) => self.defaults.autowire,
            Some(value) => AutowireMode::parse(value),
        };

        definition.dependency_check = match element.attribute(DEPENDENCY_CHECK_ATTRIBUTE) {
            None | Some(DEFAULT_VALUE) => self.defaults.dependency_check,
            Some(value) => DependencyCheck::parse(value),
        };

        if let Some(value) = element.attribute(DEPENDS_ON_ATTRIBUTE) {
            definition.depends_on = tokenize(value);
        }

        definition.autowire_candidate = match element.attribute(AUTOWIRE_CANDIDATE_ATTRIBUTE) {
            None | Some("") | Some(DEFAULT_VALUE) => {
                match (&self.defaults.autowire_candidates, self.state_component_name()) {
                    (Some(patterns), Some(name)) => patterns
                        .split(',')
                        .map(str::trim)
                        .any(|pattern| simple_match(pattern, name)),
                    _ => true,
                }
            }
            Some(value) => value == TRUE_VALUE,
        };

        if let Some(value) = element.attribute(PRIMARY_ATTRIBUTE) {
            definition.primary = value == TRUE_VALUE;
        }

        match element.attribute(INIT_METHOD_ATTRIBUTE) {
            Some(value) if !value.is_empty() => {
                definition.init_method = Some(value.to_string());
            }
            Some(_) => {}
            None => {
                if let Some(default) = &self.defaults.init_method {
                    definition.init_method = Some(default.clone());
                    // Inherited: skip silently if the method is absent.
                    definition.enforce_init = false;
                }
            }
        }

        match element.attribute(DESTROY_METHOD_ATTRIBUTE) {
            Some(value) if !value.is_empty() => {
                definition.destroy_method = Some(value.to_string());
            }
            Some(_) => {}
            None => {
                if let Some(default) = &self.defaults.destroy_method {
                    definition.destroy_method = Some(default.clone());
                    definition.enforce_destroy = false;
                }
            }
        }

        if let Some(value) = element.attribute(FACTORY_METHOD_ATTRIBUTE) {
            definition.factory_method = Some(value.to_string());
        }
        if let Some(value) = element.attribute(FACTORY_COMPONENT_ATTRIBUTE) {
            definition.factory_component = Some(value.to_string());
        }
    }

    fn parse_meta_elements(&mut self, element: &Element) -> Vec<MetadataAttribute> {
        default_children(element, META_ELEMENT)
            .map(|meta| MetadataAttribute {
                key: meta.attribute_or_empty(KEY_ATTRIBUTE).to_string(),
                value: meta.attribute_or_empty(VALUE_ATTRIBUTE).to_string(),
                location: Some(meta.location()),
            })
            .collect()
    }

    fn parse_lookup_overrides(&mut self, element: &Element, definition: &mut ComponentDefinition) {
        for lookup in default_children(element, LOOKUP_METHOD_ELEMENT) {
            definition.method_overrides.push(MethodOverride::Lookup {
                method_name: lookup.attribute_or_empty(NAME_ATTRIBUTE).to_string(),
                target_name: lookup.attribute_or_empty(COMPONENT_REF_ATTRIBUTE).to_string(),
                location: Some(lookup.location()),
            });
        }
    }

    fn parse_replaced_methods(&mut self, element: &Element, definition: &mut ComponentDefinition) {
        for replaced in default_children(element, REPLACED_METHOD_ELEMENT) {
            let mut arg_type_matchers = Vec::new();
            for arg_type in replaced.children_named(ARG_TYPE_ELEMENT) {
                let matcher = match arg_type.attribute(MATCH_ATTRIBUTE) {
                    Some(m) if !m.is_empty() => m.to_string(),
                    _ => arg_type.text().to_string(),
                };
                if !matcher.is_empty() {
                    arg_type_matchers.push(matcher);
                }
            }
            definition.method_overrides.push(MethodOverride::Replace {
                method_name: replaced.attribute_or_empty(NAME_ATTRIBUTE).to_string(),
                replacer_name: replaced.attribute_or_empty(REPLACER_ATTRIBUTE).to_string(),
                arg_type_matchers,
                location: Some(replaced.location()),
            });
        }
    }

    fn parse_constructor_args(&mut self, element: &Element, definition: &mut ComponentDefinition) {
        let children: Vec<&Element> =
            default_children(element, CONSTRUCTOR_ARG_ELEMENT).collect();
        for child in children {
            self.parse_constructor_arg(child, definition);
        }
    }

    fn parse_constructor_arg(&mut self, element: &Element, definition: &mut ComponentDefinition) {
        self.check_known_attributes(element, CONSTRUCTOR_ARG_ATTRIBUTES);
        let type_attr = element.attribute(TYPE_ATTRIBUTE).filter(|s| !s.is_empty());
        let name_attr = element.attribute(NAME_ATTRIBUTE).filter(|s| !s.is_empty());
        let type_name = type_attr.map(str::to_string);
        let param_name = name_attr.map(str::to_string);

        let index_attr = element.attribute(INDEX_ATTRIBUTE).filter(|s| !s.is_empty());
        let index = match index_attr {
            Some(raw) => match raw.parse::<i64>() {
                Ok(index) if index < 0 => {
                    self.problem(
                        ProblemKind::Structure,
                        "'index' cannot be lower than 0",
                        Some(element.location()),
                    );
                    return;
                }
                Ok(index) => Some(index as usize),
                Err(_) => {
                    self.problem(
                        ProblemKind::Structure,
                        "attribute 'index' of 'constructor-arg' must be an integer",
                        Some(element.location()),
                    );
                    return;
                }
            },
            None => None,
        };

        self.state.push(ParseEntry::ConstructorArg(index));
        let value = self.parse_value_position(element, definition, "constructor-arg element");
        self.state.pop();

        let Some(value) = value else { return };
        let holder = ValueHolder {
            value,
            type_name,
            name: param_name,
            location: Some(element.location()),
        };

        match index {
            Some(index) => {
                if definition.constructor_args.has_indexed(index) {
                    self.problem(
                        ProblemKind::Structure,
                        format!("ambiguous constructor-arg entries for index {index}"),
                        Some(element.location()),
                    );
                } else {
                    definition.constructor_args.add_indexed(index, holder);
                }
            }
            None => definition.constructor_args.add_generic(holder),
        }
    }

    fn parse_property_elements(&mut self, element: &Element, definition: &mut ComponentDefinition) {
        let children: Vec<&Element> = default_children(element, PROPERTY_ELEMENT).collect();
        for child in children {
            self.parse_property_element(child, definition);
        }
    }

    fn parse_property_element(&mut self, element: &Element, definition: &mut ComponentDefinition) {
        self.check_known_attributes(element, PROPERTY_ATTRIBUTES);
        let Some(name) = element
            .attribute(NAME_ATTRIBUTE)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
        else {
            self.problem(
                ProblemKind::Structure,
                "'property' element must have a 'name' attribute",
                Some(element.location()),
            );
            return;
        };

        self.state.push(ParseEntry::Property(name.clone()));
        if definition.properties.contains(&name) {
            self.problem(
                ProblemKind::Structure,
                format!("multiple 'property' definitions for property '{name}'"),
                Some(element.location()),
            );
            self.state.pop();
            return;
        }

        let description = format!("property '{name}'");
        if let Some(value) = self.parse_value_position(element, definition, &description) {
            let metadata = self.parse_meta_elements(element);
            definition.properties.add(PropertyValue {
                name,
                value,
                metadata,
                location: Some(element.location()),
            });
        }
        self.state.pop();
    }

    fn parse_qualifier_elements(&mut self, element: &Element, definition: &mut ComponentDefinition) {
        for qualifier in default_children(element, QUALIFIER_ELEMENT) {
            let Some(type_name) = qualifier
                .attribute(TYPE_ATTRIBUTE)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
            else {
                self.problem(
                    ProblemKind::Structure,
                    "'qualifier' element must have a 'type' attribute",
                    Some(qualifier.location()),
                );
                continue;
            };

            self.state.push(ParseEntry::Qualifier(type_name.clone()));
            let parsed = self.parse_qualifier_body(qualifier, type_name);
            self.state.pop();
            if let Some(parsed) = parsed {
                definition.qualifiers.push(parsed);
            }
        }
    }

    fn parse_qualifier_body(&mut self, element: &Element, type_name: String) -> Option<Qualifier> {
        let mut qualifier = Qualifier::new(type_name);
        qualifier.location = Some(element.location());

        if let Some(value) = element.attribute(VALUE_ATTRIBUTE).filter(|s| !s.is_empty()) {
            qualifier
                .attributes
                .insert(Qualifier::VALUE_KEY.to_string(), value.to_string());
        }

        for attribute in default_children(element, QUALIFIER_ATTRIBUTE_ELEMENT) {
            let key = attribute.attribute(KEY_ATTRIBUTE).filter(|s| !s.is_empty());
            let value = attribute
                .attribute(VALUE_ATTRIBUTE)
                .filter(|s| !s.is_empty());
            match (key, value) {
                (Some(key), Some(value)) => {
                    qualifier
                        .attributes
                        .insert(key.to_string(), value.to_string());
                }
                _ => {
                    self.problem(
                        ProblemKind::Structure,
                        "qualifier 'attribute' element must have a 'key' and a 'value'",
                        Some(attribute.location()),
                    );
                    return None;
                }
            }
        }
        Some(qualifier)
    }

    /// Resolve the single value of a property or constructor-arg element.
    ///
    /// Exactly one of the `ref` attribute, the `value` attribute or one
    /// nested value element must be present.
    fn parse_value_position(
        &mut self,
        element: &Element,
        containing: &ComponentDefinition,
        description: &str,
    ) -> Option<Value> {
        let mut sub_element: Option<&Element> = None;
        for child in element.children() {
            if child.name() == DESCRIPTION_ELEMENT || child.name() == META_ELEMENT {
                continue;
            }
            if sub_element.is_some() {
                self.problem(
                    ProblemKind::Structure,
                    format!("{description} must not contain more than one sub-element"),
                    Some(element.location()),
                );
                return None;
            }
            sub_element = Some(child);
        }

        let has_ref = element.has_attribute(REF_ATTRIBUTE);
        let has_value = element.has_attribute(VALUE_ATTRIBUTE);
        if (has_ref && has_value) || ((has_ref || has_value) && sub_element.is_some()) {
            self.problem(
                ProblemKind::Structure,
                format!(
                    "{description} is only allowed to contain either a 'ref' attribute \
                     or a 'value' attribute or one sub-element"
                ),
                Some(element.location()),
            );
            return None;
        }

        if has_ref {
            let name = element.attribute_or_empty(REF_ATTRIBUTE);
            if name.trim().is_empty() {
                self.problem(
                    ProblemKind::Structure,
                    format!("{description} contains an empty 'ref' attribute"),
                    Some(element.location()),
                );
                return None;
            }
            return Some(Value::Ref(ComponentRef {
                name: name.to_string(),
                to_parent: false,
                location: Some(element.location()),
            }));
        }

        if has_value {
            return Some(Value::Literal(TypedStringValue {
                value: Some(element.attribute_or_empty(VALUE_ATTRIBUTE).to_string()),
                type_name: None,
                specified_type_name: None,
                location: Some(element.location()),
            }));
        }

        if let Some(sub_element) = sub_element {
            return self.parse_value_element(sub_element, containing, None);
        }

        self.problem(
            ProblemKind::Structure,
            format!("{description} must specify a ref or value"),
            Some(element.location()),
        );
        None
    }

    /// Parse one element in value position: references, literals,
    /// collections or a nested anonymous definition.
    pub fn parse_value_element(
        &mut self,
        element: &Element,
        containing: &ComponentDefinition,
        default_type: Option<&str>,
    ) -> Option<Value> {
        if !is_default_namespace(element) {
            return self.parse_nested_custom_element(element, containing);
        }
        match element.name() {
            COMPONENT_ELEMENT => {
                let holder = self.parse_definition_in(element, Some(containing))?;
                let holder = self.decorate_if_required(element, holder);
                Some(Value::Definition(Box::new(holder)))
            }
            REF_ELEMENT => self.parse_ref_element(element),
            IDREF_ELEMENT => self.parse_idref_element(element),
            VALUE_ELEMENT => Some(self.parse_value_literal(element, default_type)),
            NULL_ELEMENT => Some(Value::Literal(TypedStringValue {
                location: Some(element.location()),
                ..TypedStringValue::null()
            })),
            LIST_ELEMENT => Some(Value::List(self.parse_collection(element, containing))),
            SET_ELEMENT => Some(Value::Set(self.parse_collection(element, containing))),
            ARRAY_ELEMENT => Some(Value::Array(self.parse_collection(element, containing))),
            MAP_ELEMENT => Some(Value::Map(self.parse_map(element, containing))),
            PROPS_ELEMENT => Some(Value::Props(self.parse_props(element))),
            other => {
                self.problem(
                    ProblemKind::Structure,
                    format!("unknown element in value position: '{other}'"),
                    Some(element.location()),
                );
                None
            }
        }
    }

    fn parse_nested_custom_element(
        &mut self,
        element: &Element,
        containing: &ComponentDefinition,
    ) -> Option<Value> {
        let Some(definition) = self.parse_custom_element(element, Some(containing)) else {
            self.problem(
                ProblemKind::Structure,
                format!(
                    "element '{}' cannot be used in a nested value position",
                    element.name()
                ),
                Some(element.location()),
            );
            return None;
        };
        let name = self.config.names.generate(&definition);
        debug!(%name, element = element.name(), "generated name for nested custom element");
        Some(Value::Definition(Box::new(DefinitionHolder::new(
            definition, name,
        ))))
    }

    fn parse_ref_element(&mut self, element: &Element) -> Option<Value> {
        let mut to_parent = false;
        let mut name = element.attribute_or_empty(COMPONENT_REF_ATTRIBUTE);
        if name.is_empty() {
            name = element.attribute_or_empty(LOCAL_REF_ATTRIBUTE);
            if name.is_empty() {
                name = element.attribute_or_empty(PARENT_REF_ATTRIBUTE);
                to_parent = true;
                if name.is_empty() {
                    self.problem(
                        ProblemKind::Structure,
                        "'component', 'local' or 'parent' is required for a 'ref' element",
                        Some(element.location()),
                    );
                    return None;
                }
            }
        }
        if name.trim().is_empty() {
            self.problem(
                ProblemKind::Structure,
                "'ref' element contains an empty target name",
                Some(element.location()),
            );
            return None;
        }
        Some(Value::Ref(ComponentRef {
            name: name.to_string(),
            to_parent,
            location: Some(element.location()),
        }))
    }

    fn parse_idref_element(&mut self, element: &Element) -> Option<Value> {
        let mut name = element.attribute_or_empty(COMPONENT_REF_ATTRIBUTE);
        if name.is_empty() {
            name = element.attribute_or_empty(LOCAL_REF_ATTRIBUTE);
            if name.is_empty() {
                self.problem(
                    ProblemKind::Structure,
                    "either 'component' or 'local' is required for an 'idref' element",
                    Some(element.location()),
                );
                return None;
            }
        }
        if name.trim().is_empty() {
            self.problem(
                ProblemKind::Structure,
                "'idref' element contains an empty target name",
                Some(element.location()),
            );
            return None;
        }
        Some(Value::NameRef(NameReference {
            name: name.to_string(),
            location: Some(element.location()),
        }))
    }

    fn parse_value_literal(&mut self, element: &Element, default_type: Option<&str>) -> Value {
        let specified = element
            .attribute(TYPE_ATTRIBUTE)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let type_name = specified.clone().or_else(|| default_type.map(str::to_string));
        Value::Literal(self.build_typed_value(
            Some(element.text().to_string()),
            type_name,
            specified,
            element.location(),
        ))
    }

    /// Build a typed literal, degrading to an untyped one (with a recorded
    /// problem) when the target type is unknown.
    fn build_typed_value(
        &mut self,
        value: Option<String>,
        type_name: Option<String>,
        specified_type_name: Option<String>,
        location: Location,
    ) -> TypedStringValue {
        let type_name = match type_name {
            Some(type_name) => match self.config.types.resolve(&type_name) {
                Ok(()) => Some(type_name),
                Err(err) => {
                    self.problem(
                        ProblemKind::Structure,
                        format!("{err} for literal value"),
                        Some(location),
                    );
                    None
                }
            },
            None => None,
        };
        TypedStringValue {
            value,
            type_name,
            specified_type_name,
            location: Some(location),
        }
    }

    fn parse_collection(
        &mut self,
        element: &Element,
        containing: &ComponentDefinition,
    ) -> CollectionValue {
        let element_type = element
            .attribute(VALUE_TYPE_ATTRIBUTE)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let merge = self.parse_merge_attribute(element);

        let mut values = Vec::new();
        for child in element.children() {
            if child.name() == DESCRIPTION_ELEMENT {
                continue;
            }
            if let Some(value) =
                self.parse_value_element(child, containing, element_type.as_deref())
            {
                values.push(value);
            }
        }
        CollectionValue {
            element_type,
            merge,
            values,
            location: Some(element.location()),
        }
    }

    fn parse_map(&mut self, element: &Element, containing: &ComponentDefinition) -> MapValue {
        let key_type = element
            .attribute(KEY_TYPE_ATTRIBUTE)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let value_type = element
            .attribute(VALUE_TYPE_ATTRIBUTE)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let merge = self.parse_merge_attribute(element);

        let mut entries = Vec::new();
        for entry in element.children_named(ENTRY_ELEMENT) {
            if let Some(parsed) =
                self.parse_map_entry(entry, containing, key_type.as_deref(), value_type.as_deref())
            {
                entries.push(parsed);
            }
        }
        MapValue {
            key_type,
            value_type,
            merge,
            entries,
            location: Some(element.location()),
        }
    }

    fn parse_map_entry(
        &mut self,
        entry: &Element,
        containing: &ComponentDefinition,
        default_key_type: Option<&str>,
        default_value_type: Option<&str>,
    ) -> Option<(Value, Value)> {
        // At most one <key> child and one value child; <description> is
        // allowed and ignored.
        let mut key_element: Option<&Element> = None;
        let mut value_element: Option<&Element> = None;
        for child in entry.children() {
            if child.name() == KEY_ELEMENT && is_default_namespace(child) {
                if key_element.is_some() {
                    self.problem(
                        ProblemKind::Structure,
                        "'entry' element is only allowed to contain one 'key' sub-element",
                        Some(entry.location()),
                    );
                    return None;
                }
                key_element = Some(child);
            } else if child.name() == DESCRIPTION_ELEMENT {
                continue;
            } else {
                if value_element.is_some() {
                    self.problem(
                        ProblemKind::Structure,
                        "'entry' element must not contain more than one value sub-element",
                        Some(entry.location()),
                    );
                    return None;
                }
                value_element = Some(child);
            }
        }

        let has_key = entry.has_attribute(KEY_ATTRIBUTE);
        let has_key_ref = entry.has_attribute(KEY_REF_ATTRIBUTE);
        if (has_key && has_key_ref) || ((has_key || has_key_ref) && key_element.is_some()) {
            self.problem(
                ProblemKind::Structure,
                "'entry' element is only allowed to contain either a 'key' attribute \
                 or a 'key-ref' attribute or a 'key' sub-element",
                Some(entry.location()),
            );
            return None;
        }

        let key = if has_key {
            Some(Value::Literal(self.build_typed_value(
                Some(entry.attribute_or_empty(KEY_ATTRIBUTE).to_string()),
                default_key_type.map(str::to_string),
                None,
                entry.location(),
            )))
        } else if has_key_ref {
            let name = entry.attribute_or_empty(KEY_REF_ATTRIBUTE);
            if name.trim().is_empty() {
                self.problem(
                    ProblemKind::Structure,
                    "'entry' element contains an empty 'key-ref' attribute",
                    Some(entry.location()),
                );
                None
            } else {
                Some(Value::Ref(ComponentRef {
                    name: name.to_string(),
                    to_parent: false,
                    location: Some(entry.location()),
                }))
            }
        } else if let Some(key_element) = key_element {
            self.parse_key_element(key_element, containing, default_key_type)
        } else {
            self.problem(
                ProblemKind::Structure,
                "'entry' element must specify a key",
                Some(entry.location()),
            );
            None
        };

        let has_value = entry.has_attribute(VALUE_ATTRIBUTE);
        let has_value_ref = entry.has_attribute(VALUE_REF_ATTRIBUTE);
        let has_value_type = entry.has_attribute(VALUE_TYPE_ATTRIBUTE);
        if (has_value && has_value_ref) || ((has_value || has_value_ref) && value_element.is_some())
        {
            self.problem(
                ProblemKind::Structure,
                "'entry' element is only allowed to contain either a 'value' attribute \
                 or a 'value-ref' attribute or one value sub-element",
                Some(entry.location()),
            );
            return None;
        }
        if has_value_type && (has_value_ref || !has_value || value_element.is_some()) {
            self.problem(
                ProblemKind::Structure,
                "'entry' element is only allowed to contain a 'value-type' attribute \
                 when it has a 'value' attribute",
                Some(entry.location()),
            );
            return None;
        }

        let value = if has_value {
            let value_type = entry
                .attribute(VALUE_TYPE_ATTRIBUTE)
                .filter(|s| !s.is_empty())
                .or(default_value_type);
            Some(Value::Literal(self.build_typed_value(
                Some(entry.attribute_or_empty(VALUE_ATTRIBUTE).to_string()),
                value_type.map(str::to_string),
                None,
                entry.location(),
            )))
        } else if has_value_ref {
            let name = entry.attribute_or_empty(VALUE_REF_ATTRIBUTE);
            if name.trim().is_empty() {
                self.problem(
                    ProblemKind::Structure,
                    "'entry' element contains an empty 'value-ref' attribute",
                    Some(entry.location()),
                );
                None
            } else {
                Some(Value::Ref(ComponentRef {
                    name: name.to_string(),
                    to_parent: false,
                    location: Some(entry.location()),
                }))
            }
        } else if let Some(value_element) = value_element {
            self.parse_value_element(value_element, containing, default_value_type)
        } else {
            self.problem(
                ProblemKind::Structure,
                "'entry' element must specify a value",
                Some(entry.location()),
            );
            None
        };

        Some((key?, value?))
    }

    fn parse_key_element(
        &mut self,
        key: &Element,
        containing: &ComponentDefinition,
        default_key_type: Option<&str>,
    ) -> Option<Value> {
        let mut sub_element: Option<&Element> = None;
        for child in key.children() {
            if sub_element.is_some() {
                self.problem(
                    ProblemKind::Structure,
                    "'key' element must not contain more than one value sub-element",
                    Some(key.location()),
                );
                return None;
            }
            sub_element = Some(child);
        }
        let sub_element = sub_element.or_else(|| {
            self.problem(
                ProblemKind::Structure,
                "'key' element must contain a value sub-element",
                Some(key.location()),
            );
            None
        })?;
        self.parse_value_element(sub_element, containing, default_key_type)
    }

    fn parse_props(&mut self, element: &Element) -> PropsValue {
        let merge = self.parse_merge_attribute(element);
        let mut entries = Vec::new();
        for prop in default_children(element, PROP_ELEMENT) {
            let key = prop.attribute_or_empty(KEY_ATTRIBUTE);
            if key.is_empty() {
                self.problem(
                    ProblemKind::Structure,
                    "'prop' element must have a 'key' attribute",
                    Some(prop.location()),
                );
                continue;
            }
            entries.push((key.to_string(), prop.text().to_string()));
        }
        PropsValue {
            merge,
            entries,
            location: Some(element.location()),
        }
    }

    /// Resolve a collection's merge flag, honoring the `"default"`
    /// sentinel against this level's defaults.
    pub fn parse_merge_attribute(&self, element: &Element) -> bool {
        match element.attribute(MERGE_ATTRIBUTE) {
            Some(DEFAULT_VALUE) => self.defaults.merge,
            Some(value) => value == TRUE_VALUE,
            None => self.defaults.merge,
        }
    }

    /// Collection merge only means something when there is a parent
    /// definition to merge into.
    fn check_merge_has_parent(&mut self, definition: &ComponentDefinition) {
        if definition.parent_name.is_some() {
            return;
        }
        let merged_location = definition
            .properties
            .iter()
            .map(|pv| &pv.value)
            .chain(definition.constructor_args.indexed().map(|(_, h)| &h.value))
            .chain(definition.constructor_args.generic().iter().map(|h| &h.value))
            .find(|value| value.merge_enabled())
            .and_then(|value| value.location());
        if let Some(location) = merged_location {
            self.problem(
                ProblemKind::Structure,
                "collection declares merge=\"true\" but the definition has no parent to merge from",
                Some(location),
            );
        }
    }

    fn state_component_name(&self) -> Option<&str> {
        self.state.current_component()
    }

    /// Core-vocabulary elements take a fixed attribute set. Namespaced
    /// attributes are left alone for decoration to pick up.
    fn check_known_attributes(&self, element: &Element, allowed: &[&str]) {
        for attribute in element.attributes() {
            if attribute.namespace.is_none() && !allowed.contains(&attribute.name.as_str()) {
                self.problem(
                    ProblemKind::Structure,
                    format!(
                        "unknown attribute '{}' on '{}' element",
                        attribute.name,
                        element.name()
                    ),
                    Some(element.location()),
                );
            }
        }
    }

    fn problem(&self, kind: ProblemKind, message: impl Into<String>, location: Option<Location>) {
        self.config.problems.report(Problem {
            kind,
            message: message.into(),
            resource: self.config.resource.map(str::to_string),
            location,
            context: self.state.describe(),
        });
    }
}

/// True when the element belongs to the core vocabulary (explicitly or by
/// having no namespace at all).
pub fn is_default_namespace(element: &Element) -> bool {
    element.namespace().map_or(true, |ns| ns == DEFAULT_NAMESPACE)
}

fn default_children<'e>(
    element: &'e Element,
    name: &'e str,
) -> impl Iterator<Item = &'e Element> + 'e {
    element
        .children()
        .iter()
        .filter(move |child| child.name() == name && is_default_namespace(child))
}

fn tokenize(value: &str) -> Vec<String> {
    value
        .split(MULTI_VALUE_DELIMITERS)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `*`-style matching for autowire-candidate patterns: `*x`, `x*`, `*x*`
/// or an exact name.
fn simple_match(pattern: &str, value: &str) -> bool {
    if let Some(rest) = pattern.strip_prefix('*') {
        if let Some(middle) = rest.strip_suffix('*') {
            return value.contains(middle);
        }
        return value.ends_with(rest);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return value.starts_with(prefix);
    }
    pattern == value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::NamespaceHandlerRegistry;

    struct Fixture {
        problems: ProblemCollector,
        types: AcceptAllTypes,
        names: CountingNameGenerator,
        handlers: NamespaceHandlerRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                problems: ProblemCollector::new(),
                types: AcceptAllTypes,
                names: CountingNameGenerator::new(),
                handlers: NamespaceHandlerRegistry::new(),
            }
        }

        fn parser(&self, defaults: ResolvedDefaults) -> DefinitionParser<'_> {
            DefinitionParser::new(
                defaults,
                ParserConfig {
                    problems: &self.problems,
                    types: &self.types,
                    names: &self.names,
                    namespaces: &self.handlers,
                    resource: None,
                },
            )
        }

        fn kind_count(&self, kind: ProblemKind) -> usize {
            self.problems
                .snapshot()
                .iter()
                .filter(|p| p.kind == kind)
                .count()
        }
    }

    fn element(doc: &str) -> Element {
        Element::parse(doc).unwrap()
    }

    #[test]
    fn parses_plain_attributes() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let holder = parser
            .parse_definition(&element(
                r#"<component id="orders" name="shop, store" class=" app.Orders "
                      scope="prototype" lazy-init="true" abstract="true" primary="true"
                      depends-on="db, cache; log" autowire="byType"
                      init-method="start" destroy-method="stop"
                      factory-method="build" factory-component="builder">
                     <description>order service</description>
                     <meta key="owner" value="shop-team"/>
                   </component>"#,
            ))
            .unwrap();
        assert!(f.problems.is_empty(), "{:?}", f.problems.snapshot());

        assert_eq!(holder.name, "orders");
        assert_eq!(holder.aliases, vec!["shop", "store"]);
        let d = &holder.definition;
        assert_eq!(d.type_name.as_deref(), Some("app.Orders"));
        assert!(d.is_prototype());
        assert!(d.lazy_init && d.abstract_flag && d.primary);
        assert_eq!(d.depends_on, vec!["db", "cache", "log"]);
        assert_eq!(d.autowire, AutowireMode::ByType);
        assert_eq!(d.init_method.as_deref(), Some("start"));
        assert!(d.enforce_init);
        assert_eq!(d.destroy_method.as_deref(), Some("stop"));
        assert_eq!(d.factory_method.as_deref(), Some("build"));
        assert_eq!(d.factory_component.as_deref(), Some("builder"));
        assert_eq!(d.description.as_deref(), Some("order service"));
        assert_eq!(d.metadata[0].key, "owner");
    }

    #[test]
    fn sentinel_and_missing_attributes_take_document_defaults() {
        let f = Fixture::new();
        let defaults = ResolvedDefaults {
            lazy_init: true,
            autowire: AutowireMode::ByName,
            init_method: Some("setup".into()),
            ..ResolvedDefaults::default()
        };
        let mut parser = f.parser(defaults);

        let missing = parser
            .parse_definition(&element(r#"<component id="a" class="app.A"/>"#))
            .unwrap();
        assert!(missing.definition.lazy_init);
        assert_eq!(missing.definition.autowire, AutowireMode::ByName);
        // inherited init methods are not enforced
        assert_eq!(missing.definition.init_method.as_deref(), Some("setup"));
        assert!(!missing.definition.enforce_init);

        let sentinel = parser
            .parse_definition(&element(
                r#"<component id="b" class="app.B" lazy-init="default"/>"#,
            ))
            .unwrap();
        assert!(sentinel.definition.lazy_init);

        let explicit = parser
            .parse_definition(&element(
                r#"<component id="c" class="app.C" lazy-init="false" init-method="boot"/>"#,
            ))
            .unwrap();
        assert!(!explicit.definition.lazy_init);
        assert!(explicit.definition.enforce_init);
    }

    #[test]
    fn legacy_singleton_attribute_abandons_the_definition() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let parsed = parser.parse_definition(&element(
            r#"<component id="old" class="app.Old" singleton="true"/>"#,
        ));
        assert!(parsed.is_none());
        assert_eq!(f.kind_count(ProblemKind::Compatibility), 1);
    }

    #[test]
    fn unknown_core_attributes_are_reported_but_do_not_drop_the_definition() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let parsed = parser.parse_definition(&element(
            r#"<component id="typo" class="app.Typo" lazzy-init="true">
                 <property name="limit" vallue="3" value="5"/>
               </component>"#,
        ));
        assert!(parsed.is_some());
        // one per misspelled attribute
        assert_eq!(f.kind_count(ProblemKind::Structure), 2);
    }

    #[test]
    fn name_collisions_within_one_level_are_reported() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let first = parser.parse_definition(&element(
            r#"<component id="dup" name="extra" class="app.A"/>"#,
        ));
        let second = parser.parse_definition(&element(r#"<component id="dup" class="app.B"/>"#));
        let third = parser.parse_definition(&element(r#"<component name="extra" class="app.C"/>"#));
        // the parse still yields every definition
        assert!(first.is_some() && second.is_some() && third.is_some());
        assert_eq!(f.kind_count(ProblemKind::NameCollision), 2);
    }

    #[test]
    fn anonymous_definitions_get_generated_names() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let a = parser
            .parse_definition(&element(r#"<component class="app.Widget"/>"#))
            .unwrap();
        let b = parser
            .parse_definition(&element(r#"<component class="app.Widget"/>"#))
            .unwrap();
        assert!(a.name.starts_with("app.Widget#"));
        assert_ne!(a.name, b.name);
        assert!(f.problems.is_empty());
    }

    #[test]
    fn nested_definitions_inherit_the_containing_scope() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let holder = parser
            .parse_definition(&element(
                r#"<component id="outer" class="app.Outer" scope="prototype">
                     <property name="inner">
                       <component class="app.Inner"/>
                     </property>
                   </component>"#,
            ))
            .unwrap();
        assert!(f.problems.is_empty(), "{:?}", f.problems.snapshot());

        let inner = holder.definition.properties.get("inner").unwrap();
        let Value::Definition(inner) = &inner.value else {
            panic!("expected a nested definition");
        };
        assert!(inner.definition.is_prototype());
        assert!(inner.name.starts_with("app.Inner#"));
    }

    #[test]
    fn value_position_requires_exactly_one_source() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let holder = parser
            .parse_definition(&element(
                r#"<component id="v" class="app.V">
                     <property name="both" ref="x" value="y"/>
                     <property name="none"/>
                     <property name="emptyref" ref=" "/>
                     <property name="crowded"><value>1</value><value>2</value></property>
                     <property name="ok" value="fine"/>
                   </component>"#,
            ))
            .unwrap();
        assert_eq!(holder.definition.properties.len(), 1);
        assert!(holder.definition.properties.contains("ok"));
        assert_eq!(f.kind_count(ProblemKind::Structure), 4);
    }

    #[test]
    fn duplicate_properties_are_rejected() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let holder = parser
            .parse_definition(&element(
                r#"<component id="p" class="app.P">
                     <property name="size" value="1"/>
                     <property name="size" value="2"/>
                     <property value="unnamed"/>
                   </component>"#,
            ))
            .unwrap();
        assert_eq!(holder.definition.properties.len(), 1);
        let size = holder.definition.properties.get("size").unwrap();
        assert_eq!(
            size.value,
            Value::Literal(TypedStringValue {
                value: Some("1".into()),
                location: size.value.location(),
                ..TypedStringValue::default()
            })
        );
        assert_eq!(f.kind_count(ProblemKind::Structure), 2);
    }

    #[test]
    fn constructor_arg_indexing() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let holder = parser
            .parse_definition(&element(
                r#"<component id="c" class="app.C">
                     <constructor-arg index="0" value="first" type="str"/>
                     <constructor-arg index="0" value="again"/>
                     <constructor-arg name="port" value="8080"/>
                     <constructor-arg index="two" value="x"/>
                     <constructor-arg index="-1" value="x"/>
                   </component>"#,
            ))
            .unwrap();
        let args = &holder.definition.constructor_args;
        assert_eq!(args.len(), 2);
        let (index, first) = args.indexed().next().unwrap();
        assert_eq!(index, 0);
        assert_eq!(first.type_name.as_deref(), Some("str"));
        assert_eq!(args.generic()[0].name.as_deref(), Some("port"));
        // ambiguous reuse, non-integer, negative
        assert_eq!(f.kind_count(ProblemKind::Structure), 3);
    }

    #[test]
    fn reference_and_null_sub_elements() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let holder = parser
            .parse_definition(&element(
                r#"<component id="r" class="app.R">
                     <property name="up"><ref parent="shared"/></property>
                     <property name="byname"><idref component="other"/></property>
                     <property name="nothing"><null/></property>
                   </component>"#,
            ))
            .unwrap();
        assert!(f.problems.is_empty(), "{:?}", f.problems.snapshot());

        let props = &holder.definition.properties;
        match &props.get("up").unwrap().value {
            Value::Ref(r) => {
                assert_eq!(r.name, "shared");
                assert!(r.to_parent);
            }
            other => panic!("unexpected value {other:?}"),
        }
        assert!(matches!(
            &props.get("byname").unwrap().value,
            Value::NameRef(NameReference { name, .. }) if name == "other"
        ));
        assert!(matches!(
            &props.get("nothing").unwrap().value,
            Value::Literal(v) if v.is_null()
        ));
    }

    #[test]
    fn collection_literals_propagate_the_declared_element_type() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let holder = parser
            .parse_definition(&element(
                r#"<component id="c" class="app.C">
                     <property name="ports">
                       <list value-type="u16">
                         <value>80</value>
                         <value type="u32">8080</value>
                         <ref component="extra"/>
                       </list>
                     </property>
                   </component>"#,
            ))
            .unwrap();
        assert!(f.problems.is_empty(), "{:?}", f.problems.snapshot());

        let Value::List(list) = &holder.definition.properties.get("ports").unwrap().value else {
            panic!("expected a list");
        };
        assert_eq!(list.element_type.as_deref(), Some("u16"));
        match &list.values[0] {
            Value::Literal(v) => {
                assert_eq!(v.value.as_deref(), Some("80"));
                // inherited, not written on the node
                assert_eq!(v.type_name.as_deref(), Some("u16"));
                assert_eq!(v.specified_type_name, None);
            }
            other => panic!("unexpected value {other:?}"),
        }
        match &list.values[1] {
            Value::Literal(v) => {
                assert_eq!(v.type_name.as_deref(), Some("u32"));
                assert_eq!(v.specified_type_name.as_deref(), Some("u32"));
            }
            other => panic!("unexpected value {other:?}"),
        }
        assert!(matches!(&list.values[2], Value::Ref(_)));
    }

    #[test]
    fn map_entries_accept_each_key_and_value_form() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let holder = parser
            .parse_definition(&element(
                r#"<component id="m" class="app.M">
                     <property name="routes">
                       <map key-type="str">
                         <entry key="home" value="/"/>
                         <entry key-ref="k" value-ref="v"/>
                         <entry><key><value>nested</value></key><list/></entry>
                       </map>
                     </property>
                   </component>"#,
            ))
            .unwrap();
        assert!(f.problems.is_empty(), "{:?}", f.problems.snapshot());

        let Value::Map(map) = &holder.definition.properties.get("routes").unwrap().value else {
            panic!("expected a map");
        };
        assert_eq!(map.key_type.as_deref(), Some("str"));
        assert_eq!(map.entries.len(), 3);
        match &map.entries[0].0 {
            Value::Literal(k) => {
                assert_eq!(k.value.as_deref(), Some("home"));
                assert_eq!(k.type_name.as_deref(), Some("str"));
            }
            other => panic!("unexpected key {other:?}"),
        }
        assert!(matches!(&map.entries[1].0, Value::Ref(_)));
        assert!(matches!(&map.entries[1].1, Value::Ref(_)));
        assert!(matches!(&map.entries[2].1, Value::List(_)));
    }

    #[test]
    fn map_entry_rejects_conflicting_sources() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let holder = parser
            .parse_definition(&element(
                r#"<component id="m" class="app.M">
                     <property name="bad">
                       <map>
                         <entry key="a" key-ref="b" value="x"/>
                         <entry key="a" value-ref="r" value-type="str"/>
                         <entry value="orphan"/>
                       </map>
                     </property>
                   </component>"#,
            ))
            .unwrap();
        let Value::Map(map) = &holder.definition.properties.get("bad").unwrap().value else {
            panic!("expected a map");
        };
        assert!(map.entries.is_empty());
        // conflicting key sources, value-type without value attribute, no key
        assert_eq!(f.kind_count(ProblemKind::Structure), 3);
    }

    #[test]
    fn props_literals() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let holder = parser
            .parse_definition(&element(
                r#"<component id="p" class="app.P">
                     <property name="env">
                       <props>
                         <prop key="region">eu-west</prop>
                         <prop>keyless</prop>
                       </props>
                     </property>
                   </component>"#,
            ))
            .unwrap();
        let Value::Props(props) = &holder.definition.properties.get("env").unwrap().value else {
            panic!("expected props");
        };
        assert_eq!(props.entries, vec![("region".into(), "eu-west".into())]);
        assert_eq!(f.kind_count(ProblemKind::Structure), 1);
    }

    #[test]
    fn merge_sentinel_resolves_against_document_defaults() {
        let f = Fixture::new();
        let defaults = ResolvedDefaults {
            merge: true,
            ..ResolvedDefaults::default()
        };
        let mut parser = f.parser(defaults);
        let holder = parser
            .parse_definition(&element(
                r#"<component id="child" parent="base">
                     <property name="inherited"><list merge="default"/></property>
                     <property name="replaced"><list merge="false"/></property>
                   </component>"#,
            ))
            .unwrap();
        assert!(f.problems.is_empty(), "{:?}", f.problems.snapshot());

        let props = &holder.definition.properties;
        assert!(props.get("inherited").unwrap().value.merge_enabled());
        assert!(!props.get("replaced").unwrap().value.merge_enabled());
    }

    #[test]
    fn merge_without_a_parent_definition_is_an_error() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        parser
            .parse_definition(&element(
                r#"<component id="orphan" class="app.O">
                     <property name="list"><list merge="true"/></property>
                   </component>"#,
            ))
            .unwrap();
        assert_eq!(f.kind_count(ProblemKind::Structure), 1);
    }

    #[test]
    fn qualifiers_with_shorthand_value_and_attributes() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let holder = parser
            .parse_definition(&element(
                r#"<component id="q" class="app.Q">
                     <qualifier type="Color" value="blue">
                       <attribute key="shade" value="dark"/>
                     </qualifier>
                     <qualifier value="missing-type"/>
                     <qualifier type="Broken"><attribute key="only-key"/></qualifier>
                   </component>"#,
            ))
            .unwrap();
        let qualifiers = &holder.definition.qualifiers;
        assert_eq!(qualifiers.len(), 1);
        assert_eq!(qualifiers[0].type_name, "Color");
        assert_eq!(
            qualifiers[0].attributes.get(Qualifier::VALUE_KEY),
            Some(&"blue".to_string())
        );
        assert_eq!(
            qualifiers[0].attributes.get("shade"),
            Some(&"dark".to_string())
        );
        assert_eq!(f.kind_count(ProblemKind::Structure), 2);
    }

    #[test]
    fn method_overrides() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let holder = parser
            .parse_definition(&element(
                r#"<component id="o" class="app.O">
                     <lookup-method name="create" component="proto"/>
                     <replaced-method name="compute" replacer="calc">
                       <arg-type match="str"/>
                       <arg-type>i64</arg-type>
                     </replaced-method>
                   </component>"#,
            ))
            .unwrap();
        assert!(f.problems.is_empty(), "{:?}", f.problems.snapshot());

        let overrides = &holder.definition.method_overrides;
        assert_eq!(overrides.len(), 2);
        assert!(matches!(
            &overrides[0],
            MethodOverride::Lookup { method_name, target_name, .. }
                if method_name == "create" && target_name == "proto"
        ));
        match &overrides[1] {
            MethodOverride::Replace {
                replacer_name,
                arg_type_matchers,
                ..
            } => {
                assert_eq!(replacer_name, "calc");
                assert_eq!(arg_type_matchers, &vec!["str".to_string(), "i64".to_string()]);
            }
            other => panic!("unexpected override {other:?}"),
        }
    }

    #[test]
    fn autowire_candidate_falls_back_to_default_patterns() {
        let f = Fixture::new();
        let defaults = ResolvedDefaults {
            autowire_candidates: Some("svc*, *Dao".into()),
            ..ResolvedDefaults::default()
        };
        let mut parser = f.parser(defaults);

        let matching = parser
            .parse_definition(&element(r#"<component id="svcOrders" class="x"/>"#))
            .unwrap();
        assert!(matching.definition.autowire_candidate);

        let suffix = parser
            .parse_definition(&element(r#"<component id="orderDao" class="x"/>"#))
            .unwrap();
        assert!(suffix.definition.autowire_candidate);

        let outside = parser
            .parse_definition(&element(r#"<component id="helper" class="x"/>"#))
            .unwrap();
        assert!(!outside.definition.autowire_candidate);

        let explicit = parser
            .parse_definition(&element(
                r#"<component id="forced" class="x" autowire-candidate="true"/>"#,
            ))
            .unwrap();
        assert!(explicit.definition.autowire_candidate);
    }

    #[test]
    fn unknown_value_elements_are_reported() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        let holder = parser
            .parse_definition(&element(
                r#"<component id="u" class="app.U">
                     <property name="bad"><banana/></property>
                   </component>"#,
            ))
            .unwrap();
        assert!(holder.definition.properties.is_empty());
        assert_eq!(f.kind_count(ProblemKind::Structure), 1);
    }

    #[test]
    fn problems_carry_the_parse_context() {
        let f = Fixture::new();
        let mut parser = f.parser(ResolvedDefaults::default());
        parser.parse_definition(&element(
            r#"<component id="ctx" class="app.C">
                 <property name="broken" ref="x" value="y"/>
               </component>"#,
        ));
        let problems = f.problems.snapshot();
        assert_eq!(problems.len(), 1);
        assert_eq!(
            problems[0].context.as_deref(),
            Some("component 'ctx' > property 'broken'")
        );
        assert!(problems[0].location.is_some());
    }

    #[test]
    fn token_and_pattern_helpers() {
        assert_eq!(tokenize("a, b; c  d"), vec!["a", "b", "c", "d"]);
        assert!(tokenize("  ").is_empty());

        assert!(simple_match("*", "anything"));
        assert!(simple_match("svc*", "svcOrders"));
        assert!(simple_match("*Dao", "orderDao"));
        assert!(simple_match("*rde*", "orders"));
        assert!(simple_match("exact", "exact"));
        assert!(!simple_match("svc*", "orders"));
    }
}
