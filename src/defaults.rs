//! Document-level default settings
//!
//! A `<components>` element may declare defaults that apply to every
//! definition below it. Nested `<components>` levels resolve their own
//! defaults against the enclosing level, using the sentinel value
//! `"default"` (or an absent attribute) to mean "inherit".

use crate::definition::{AutowireMode, DependencyCheck};
use crate::element::Element;

pub const DEFAULT_LAZY_INIT_ATTRIBUTE: &str = "default-lazy-init";
pub const DEFAULT_MERGE_ATTRIBUTE: &str = "default-merge";
pub const DEFAULT_AUTOWIRE_ATTRIBUTE: &str = "default-autowire";
pub const DEFAULT_DEPENDENCY_CHECK_ATTRIBUTE: &str = "default-dependency-check";
pub const DEFAULT_AUTOWIRE_CANDIDATES_ATTRIBUTE: &str = "default-autowire-candidates";
pub const DEFAULT_INIT_METHOD_ATTRIBUTE: &str = "default-init-method";
pub const DEFAULT_DESTROY_METHOD_ATTRIBUTE: &str = "default-destroy-method";

/// Sentinel attribute value meaning "inherit from the enclosing level".
pub const DEFAULT_VALUE: &str = "default";

const TRUE_VALUE: &str = "true";

/// Fully resolved defaults for one nesting level.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedDefaults {
    pub lazy_init: bool,
    pub merge: bool,
    pub autowire: AutowireMode,
    /// Never inherited across levels; see [`resolve_defaults`].
    pub dependency_check: DependencyCheck,
    /// Comma-separated name patterns for autowire-candidate resolution.
    pub autowire_candidates: Option<String>,
    pub init_method: Option<String>,
    pub destroy_method: Option<String>,
}

/// Compute the effective defaults for a nesting level.
///
/// For each of lazy-init, merge and autowire: a local declaration that is
/// not the `"default"` sentinel wins; otherwise the parent level's resolved
/// value applies; otherwise the hardcoded baseline (`false` / `false` /
/// `No`). Autowire-candidate patterns and the default init/destroy methods
/// inherit whenever the attribute is absent.
///
/// `dependency-check` is the one exception: it never falls back to the
/// parent level. Each level either declares it or gets `None`; the setting
/// was frozen at a fixed scope boundary when it was deprecated.
pub fn resolve_defaults(root: &Element, parent: Option<&ResolvedDefaults>) -> ResolvedDefaults {
    let lazy_init = match declared(root, DEFAULT_LAZY_INIT_ATTRIBUTE) {
        Some(value) => value == TRUE_VALUE,
        None => parent.map(|p| p.lazy_init).unwrap_or(false),
    };

    let merge = match declared(root, DEFAULT_MERGE_ATTRIBUTE) {
        Some(value) => value == TRUE_VALUE,
        None => parent.map(|p| p.merge).unwrap_or(false),
    };

    let autowire = match declared(root, DEFAULT_AUTOWIRE_ATTRIBUTE) {
        Some(value) => AutowireMode::parse(value),
        None => parent.map(|p| p.autowire).unwrap_or_default(),
    };

    let dependency_check = root
        .attribute(DEFAULT_DEPENDENCY_CHECK_ATTRIBUTE)
        .map(DependencyCheck::parse)
        .unwrap_or_default();

    let autowire_candidates = root
        .attribute(DEFAULT_AUTOWIRE_CANDIDATES_ATTRIBUTE)
        .map(str::to_string)
        .or_else(|| parent.and_then(|p| p.autowire_candidates.clone()));

    let init_method = root
        .attribute(DEFAULT_INIT_METHOD_ATTRIBUTE)
        .map(str::to_string)
        .or_else(|| parent.and_then(|p| p.init_method.clone()));

    let destroy_method = root
        .attribute(DEFAULT_DESTROY_METHOD_ATTRIBUTE)
        .map(str::to_string)
        .or_else(|| parent.and_then(|p| p.destroy_method.clone()));

    ResolvedDefaults {
        lazy_init,
        merge,
        autowire,
        dependency_check,
        autowire_candidates,
        init_method,
        destroy_method,
    }
}

/// A declared, non-sentinel attribute value.
fn declared<'a>(root: &'a Element, name: &str) -> Option<&'a str> {
    match root.attribute(name) {
        Some(DEFAULT_VALUE) | None => None,
        Some(value) => Some(value),
    }
}
