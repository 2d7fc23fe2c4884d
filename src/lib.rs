//! Declarative component configuration
//!
//! This crate covers the two ends of a component container that stay
//! useful without the container itself:
//!
//! - **Definition loading**: XML documents describing components, their
//!   wiring values, lifecycle attributes and nesting are parsed into a
//!   [`DefinitionRegistry`](registry::DefinitionRegistry) of
//!   [`ComponentDefinition`](definition::ComponentDefinition)s. Parsing is
//!   best-effort: structural problems accumulate as diagnostics while the
//!   rest of the document is still processed.
//! - **Scoped resolution**: a
//!   [`ScopedResourceFactory`](factory::ScopedResourceFactory) fronts an
//!   external locator with singleton/prototype scope semantics and a
//!   thread-safe single-flight cache.
//!
//! ```
//! use bindery::prelude::*;
//!
//! let mut registry = DefinitionRegistry::new();
//! let result = DocumentReader::new()
//!     .read(
//!         r#"<components>
//!              <component id="orders" class="app.Orders" scope="prototype">
//!                <property name="retries" value="3"/>
//!              </component>
//!            </components>"#,
//!         None,
//!         &mut registry,
//!     )
//!     .unwrap();
//! assert!(result.is_clean());
//! assert!(registry.get("orders").unwrap().is_prototype());
//! ```

pub mod defaults;
pub mod definition;
pub mod diagnostics;
pub mod element;
pub mod error;
pub mod factory;
pub mod parser;
pub mod reader;
pub mod registry;
pub mod value;

pub use definition::{ComponentDefinition, DefinitionHolder, Scope};
pub use diagnostics::{Problem, ProblemKind};
pub use error::{LookupError, RegistryError, ResolveError, ResolveResult};
pub use factory::{ResourceHandle, ResourceLocator, ScopedResourceFactory};
pub use reader::{ActiveProfiles, DocumentReader, LoadResult};
pub use registry::DefinitionRegistry;

/// Common imports for working with the crate.
pub mod prelude {
    pub use crate::defaults::ResolvedDefaults;
    pub use crate::definition::{
        AutowireMode, ComponentDefinition, DefinitionHolder, DependencyCheck, PropertyValue,
        Qualifier, Scope,
    };
    pub use crate::diagnostics::{Problem, ProblemKind};
    pub use crate::element::Element;
    pub use crate::error::{LookupError, RegistryError, ResolveError, ResolveResult};
    pub use crate::factory::{ResourceHandle, ResourceLocator, ScopedResourceFactory};
    pub use crate::parser::{DefinitionParser, NameGenerator, TypeResolver};
    pub use crate::reader::{
        ActiveProfiles, DocumentLoader, DocumentReader, LoadResult, NamespaceHandler,
        NamespaceHandlerRegistry,
    };
    pub use crate::registry::DefinitionRegistry;
    pub use crate::value::{TypedStringValue, Value};
}
