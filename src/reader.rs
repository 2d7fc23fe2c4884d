//! Document reader
//!
//! [`DocumentReader`] drives a whole document: it gates on profiles,
//! resolves document-level defaults, walks the top-level elements and
//! registers every parsed definition. Element-level work is delegated to
//! [`DefinitionParser`]; each nesting level gets its own parser so names
//! and defaults stay scoped to their level.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::{debug, info};

use crate::defaults::{resolve_defaults, ResolvedDefaults};
use crate::definition::{ComponentDefinition, DefinitionHolder};
use crate::diagnostics::{Problem, ProblemCollector, ProblemKind};
use crate::element::{Attribute, Element, Location, XmlError};
use crate::parser::{
    is_default_namespace, AcceptAllTypes, CountingNameGenerator, DefinitionParser, NameGenerator,
    ParserConfig, TypeResolver, COMPONENT_ELEMENT,
};
use crate::registry::DefinitionRegistry;

const NESTED_ROOT_ELEMENT: &str = "components";
const IMPORT_ELEMENT: &str = "import";
const ALIAS_ELEMENT: &str = "alias";
const DESCRIPTION_ELEMENT: &str = "description";

const PROFILE_ATTRIBUTE: &str = "profile";
const RESOURCE_ATTRIBUTE: &str = "resource";
const NAME_ATTRIBUTE: &str = "name";
const ALIAS_ATTRIBUTE: &str = "alias";

const PROFILE_DELIMITERS: &[char] = &[',', ';', ' '];

/// The set of profiles active for a load.
///
/// A document (or nested level) declaring a `profile` attribute is only
/// processed when the expression matches: any listed profile being active
/// accepts, and a `!`-prefixed entry accepts when that profile is
/// *inactive*.
#[derive(Debug, Clone, Default)]
pub struct ActiveProfiles {
    profiles: FxHashSet<String>,
}

impl ActiveProfiles {
    pub fn new<I, S>(profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            profiles: profiles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_active(&self, profile: &str) -> bool {
        self.profiles.contains(profile)
    }

    /// Evaluate a `profile` attribute expression. A blank expression
    /// accepts unconditionally.
    pub fn accepts(&self, expression: &str) -> bool {
        let mut any_token = false;
        for token in expression
            .split(PROFILE_DELIMITERS)
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            any_token = true;
            match token.strip_prefix('!') {
                Some(negated) => {
                    if !self.is_active(negated) {
                        return true;
                    }
                }
                None => {
                    if self.is_active(token) {
                        return true;
                    }
                }
            }
        }
        !any_token
    }
}

/// Raised by a [`DocumentLoader`] that cannot produce a resource.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct LoadFailure(String);

impl LoadFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Fetches the textual content of an imported resource location.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, location: &str) -> Result<String, LoadFailure>;
}

/// Loader used when no other is configured: every import fails.
#[derive(Debug, Default)]
pub struct NoImports;

impl DocumentLoader for NoImports {
    fn load(&self, location: &str) -> Result<String, LoadFailure> {
        Err(LoadFailure::new(format!(
            "no document loader configured to read '{location}'"
        )))
    }
}

/// Loader reading resource locations as filesystem paths.
#[derive(Debug, Default)]
pub struct FileSystemLoader;

impl DocumentLoader for FileSystemLoader {
    fn load(&self, location: &str) -> Result<String, LoadFailure> {
        std::fs::read_to_string(location).map_err(|err| LoadFailure::new(err.to_string()))
    }
}

/// The node a decoration was triggered by: a foreign-namespace attribute
/// or child element on a `<component>`.
#[derive(Clone, Copy)]
pub enum DecorationSource<'a> {
    Attribute(&'a Attribute),
    Element(&'a Element),
}

impl DecorationSource<'_> {
    pub fn namespace(&self) -> Option<&str> {
        match self {
            DecorationSource::Attribute(attribute) => attribute.namespace.as_deref(),
            DecorationSource::Element(element) => element.namespace(),
        }
    }
}

/// Extension point for elements and attributes outside the core
/// vocabulary.
pub trait NamespaceHandler: Send + Sync {
    /// Parse a custom element into a definition. `None` means the handler
    /// produced nothing to register.
    fn parse(
        &self,
        element: &Element,
        parser: &mut DefinitionParser<'_>,
        containing: Option<&ComponentDefinition>,
    ) -> Option<ComponentDefinition>;

    /// Wrap or augment an already-parsed definition. The default leaves it
    /// untouched.
    fn decorate(
        &self,
        source: DecorationSource<'_>,
        holder: DefinitionHolder,
        parser: &mut DefinitionParser<'_>,
    ) -> DefinitionHolder {
        let _ = (source, parser);
        holder
    }
}

/// Maps namespace URIs to their handlers.
pub trait NamespaceHandlerResolver: Send + Sync {
    fn resolve(&self, uri: &str) -> Option<Arc<dyn NamespaceHandler>>;
}

/// Plain table-backed resolver.
#[derive(Default)]
pub struct NamespaceHandlerRegistry {
    handlers: FxHashMap<String, Arc<dyn NamespaceHandler>>,
}

impl NamespaceHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, uri: impl Into<String>, handler: Arc<dyn NamespaceHandler>) {
        self.handlers.insert(uri.into(), handler);
    }
}

impl NamespaceHandlerResolver for NamespaceHandlerRegistry {
    fn resolve(&self, uri: &str) -> Option<Arc<dyn NamespaceHandler>> {
        self.handlers.get(uri).cloned()
    }
}

/// Resolver used when no registry is configured.
#[derive(Debug, Default)]
struct NoHandlers;

impl NamespaceHandlerResolver for NoHandlers {
    fn resolve(&self, _uri: &str) -> Option<Arc<dyn NamespaceHandler>> {
        None
    }
}

/// Outcome of one document load: how many definitions were registered and
/// every problem recorded along the way.
#[derive(Debug)]
pub struct LoadResult {
    pub registered: usize,
    pub problems: Vec<Problem>,
}

impl LoadResult {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn has_kind(&self, kind: ProblemKind) -> bool {
        self.problems.iter().any(|p| p.kind == kind)
    }
}

static DEFAULT_LOADER: NoImports = NoImports;
static DEFAULT_TYPES: AcceptAllTypes = AcceptAllTypes;
static DEFAULT_NAMES: CountingNameGenerator = CountingNameGenerator::new();
static DEFAULT_HANDLERS: NoHandlers = NoHandlers;

/// Reads component-definition documents into a [`DefinitionRegistry`].
pub struct DocumentReader<'a> {
    profiles: ActiveProfiles,
    loader: &'a dyn DocumentLoader,
    namespaces: &'a dyn NamespaceHandlerResolver,
    types: &'a dyn TypeResolver,
    names: &'a dyn NameGenerator,
}

impl Default for DocumentReader<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> DocumentReader<'a> {
    pub fn new() -> DocumentReader<'static> {
        DocumentReader {
            profiles: ActiveProfiles::default(),
            loader: &DEFAULT_LOADER,
            namespaces: &DEFAULT_HANDLERS,
            types: &DEFAULT_TYPES,
            names: &DEFAULT_NAMES,
        }
    }

    pub fn with_profiles(mut self, profiles: ActiveProfiles) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_loader(mut self, loader: &'a dyn DocumentLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_namespace_handlers(mut self, resolver: &'a dyn NamespaceHandlerResolver) -> Self {
        self.namespaces = resolver;
        self
    }

    pub fn with_type_resolver(mut self, types: &'a dyn TypeResolver) -> Self {
        self.types = types;
        self
    }

    pub fn with_name_generator(mut self, names: &'a dyn NameGenerator) -> Self {
        self.names = names;
        self
    }

    /// Read a document and register everything it declares.
    ///
    /// A malformed document is the only hard failure; everything else is
    /// collected into the returned [`LoadResult`].
    pub fn read(
        &self,
        source: &str,
        resource: Option<&str>,
        registry: &mut DefinitionRegistry,
    ) -> Result<LoadResult, XmlError> {
        let problems = ProblemCollector::new();
        let mut registered = 0usize;
        let root = Element::parse(source)?;
        self.read_root(&root, resource, None, registry, &problems, &mut registered);
        info!(
            registered,
            problems = problems.len(),
            resource = resource.unwrap_or("<inline>"),
            "finished reading component definitions"
        );
        Ok(LoadResult {
            registered,
            problems: problems.into_problems(),
        })
    }

    fn read_root(
        &self,
        root: &Element,
        resource: Option<&str>,
        parent_defaults: Option<&ResolvedDefaults>,
        registry: &mut DefinitionRegistry,
        problems: &ProblemCollector,
        registered: &mut usize,
    ) {
        let profile_expr = root.attribute_or_empty(PROFILE_ATTRIBUTE);
        if !profile_expr.trim().is_empty() && !self.profiles.accepts(profile_expr) {
            debug!(
                profile = profile_expr,
                "skipping definitions for inactive profiles"
            );
            return;
        }

        let defaults = resolve_defaults(root, parent_defaults);
        let mut parser = DefinitionParser::new(
            defaults.clone(),
            ParserConfig {
                problems,
                types: self.types,
                names: self.names,
                namespaces: self.namespaces,
                resource,
            },
        );

        for child in root.children() {
            if !is_default_namespace(child) {
                self.read_custom_element(child, &mut parser, registry, problems, registered);
                continue;
            }
            match child.name() {
                COMPONENT_ELEMENT => {
                    self.read_component(child, &mut parser, registry, problems, registered);
                }
                IMPORT_ELEMENT => {
                    self.read_import(child, resource, registry, problems, registered);
                }
                ALIAS_ELEMENT => {
                    self.read_alias(child, resource, registry, problems);
                }
                NESTED_ROOT_ELEMENT => {
                    self.read_root(child, resource, Some(&defaults), registry, problems, registered);
                }
                DESCRIPTION_ELEMENT => {}
                other => {
                    report(
                        problems,
                        ProblemKind::Structure,
                        format!("unexpected element '{other}' at document level"),
                        resource,
                        Some(child.location()),
                    );
                }
            }
        }
    }

    fn read_component(
        &self,
        element: &Element,
        parser: &mut DefinitionParser<'_>,
        registry: &mut DefinitionRegistry,
        problems: &ProblemCollector,
        registered: &mut usize,
    ) {
        let Some(holder) = parser.parse_definition(element) else {
            return;
        };
        let holder = parser.decorate_if_required(element, holder);
        self.register(holder, parser.resource(), registry, problems, registered);
    }

    fn read_custom_element(
        &self,
        element: &Element,
        parser: &mut DefinitionParser<'_>,
        registry: &mut DefinitionRegistry,
        problems: &ProblemCollector,
        registered: &mut usize,
    ) {
        let Some(definition) = parser.parse_custom_element(element, None) else {
            return;
        };
        let name = self.names.generate(&definition);
        self.register(
            DefinitionHolder::new(definition, name),
            parser.resource(),
            registry,
            problems,
            registered,
        );
    }

    fn register(
        &self,
        holder: DefinitionHolder,
        resource: Option<&str>,
        registry: &mut DefinitionRegistry,
        problems: &ProblemCollector,
        registered: &mut usize,
    ) {
        let location = holder.definition.location;
        let DefinitionHolder {
            definition,
            name,
            aliases,
        } = holder;
        if let Err(err) = registry.register(name.clone(), definition) {
            report(
                problems,
                ProblemKind::Registration,
                err.to_string(),
                resource,
                location,
            );
            return;
        }
        *registered += 1;
        debug!(%name, "registered component definition");
        for alias in aliases {
            if let Err(err) = registry.register_alias(name.clone(), alias) {
                report(
                    problems,
                    ProblemKind::Registration,
                    err.to_string(),
                    resource,
                    location,
                );
            }
        }
    }

    fn read_import(
        &self,
        element: &Element,
        resource: Option<&str>,
        registry: &mut DefinitionRegistry,
        problems: &ProblemCollector,
        registered: &mut usize,
    ) {
        let location = element.attribute_or_empty(RESOURCE_ATTRIBUTE);
        if location.trim().is_empty() {
            report(
                problems,
                ProblemKind::Structure,
                "'import' element must have a non-empty 'resource' attribute",
                resource,
                Some(element.location()),
            );
            return;
        }

        let resolved = resolve_location(resource, location);
        debug!(from = location, to = %resolved, "importing definitions");
        let source = match self.loader.load(&resolved) {
            Ok(source) => source,
            Err(err) => {
                report(
                    problems,
                    ProblemKind::Structure,
                    format!("cannot read imported resource '{resolved}': {err}"),
                    resource,
                    Some(element.location()),
                );
                return;
            }
        };

        // An imported document is independent: fresh defaults, fresh names.
        let root = match Element::parse(&source) {
            Ok(root) => root,
            Err(err) => {
                report(
                    problems,
                    ProblemKind::Structure,
                    format!("imported resource '{resolved}' is malformed: {err}"),
                    resource,
                    Some(element.location()),
                );
                return;
            }
        };
        self.read_root(&root, Some(&resolved), None, registry, problems, registered);
    }

    fn read_alias(
        &self,
        element: &Element,
        resource: Option<&str>,
        registry: &mut DefinitionRegistry,
        problems: &ProblemCollector,
    ) {
        let name = element.attribute_or_empty(NAME_ATTRIBUTE);
        let alias = element.attribute_or_empty(ALIAS_ATTRIBUTE);
        if name.trim().is_empty() || alias.trim().is_empty() {
            report(
                problems,
                ProblemKind::Structure,
                "'alias' element must have non-empty 'name' and 'alias' attributes",
                resource,
                Some(element.location()),
            );
            return;
        }
        if let Err(err) = registry.register_alias(name, alias) {
            report(
                problems,
                ProblemKind::Registration,
                err.to_string(),
                resource,
                Some(element.location()),
            );
        }
    }
}

fn report(
    problems: &ProblemCollector,
    kind: ProblemKind,
    message: impl Into<String>,
    resource: Option<&str>,
    location: Option<Location>,
) {
    problems.report(Problem {
        kind,
        message: message.into(),
        resource: resource.map(str::to_string),
        location,
        context: None,
    });
}

/// Resolve an import location against the importing document's resource.
/// Locations with a scheme or a leading `/` are taken as-is.
fn resolve_location(base: Option<&str>, location: &str) -> String {
    if location.contains("://") || location.starts_with('/') {
        return location.to_string();
    }
    match base.and_then(|b| b.rfind('/')) {
        Some(slash) => format!("{}/{}", &base.unwrap()[..slash], location),
        None => location.to_string(),
    }
}
