//! Parse-time diagnostics
//!
//! Document parsing is best-effort: problems accumulate in a
//! [`ProblemCollector`] and the parse continues with the offending node
//! treated as absent, so one pass reports as many problems as possible.

use std::cell::RefCell;
use std::fmt;

use crate::element::Location;

/// Classification of a recorded parse problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    /// Malformed value position, unknown element kind, bad index, etc.
    Structure,
    /// A definition name or alias already used at this nesting level
    NameCollision,
    /// A legacy construct that must be upgraded (fatal for its definition)
    Compatibility,
    /// Registration into the registry failed
    Registration,
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemKind::Structure => f.write_str("structure"),
            ProblemKind::NameCollision => f.write_str("name collision"),
            ProblemKind::Compatibility => f.write_str("compatibility"),
            ProblemKind::Registration => f.write_str("registration"),
        }
    }
}

/// One recorded parse problem with its source context.
#[derive(Debug, Clone)]
pub struct Problem {
    pub kind: ProblemKind,
    pub message: String,
    /// Description of the resource the document came from, if known
    pub resource: Option<String>,
    pub location: Option<Location>,
    /// Snapshot of the parse-state stack, e.g. `component 'a' > property 'x'`
    pub context: Option<String>,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(ctx) = &self.context {
            write!(f, " (in {ctx})")?;
        }
        if let Some(loc) = self.location {
            write!(f, " at line {}, column {}", loc.line, loc.column)?;
        }
        if let Some(res) = &self.resource {
            write!(f, " [{res}]")?;
        }
        Ok(())
    }
}

/// Accumulates problems across one document load.
///
/// Interior mutability keeps reporting ergonomic across the recursive
/// parser; the parse phase is single-threaded by contract.
#[derive(Debug, Default)]
pub struct ProblemCollector {
    problems: RefCell<Vec<Problem>>,
}

impl ProblemCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, problem: Problem) {
        self.problems.borrow_mut().push(problem);
    }

    pub fn is_empty(&self) -> bool {
        self.problems.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.problems.borrow().len()
    }

    /// True if any problem of the given kind was recorded.
    pub fn has_kind(&self, kind: ProblemKind) -> bool {
        self.problems.borrow().iter().any(|p| p.kind == kind)
    }

    pub fn into_problems(self) -> Vec<Problem> {
        self.problems.into_inner()
    }

    pub fn snapshot(&self) -> Vec<Problem> {
        self.problems.borrow().clone()
    }
}

/// One entry on the diagnostic context stack.
#[derive(Debug, Clone)]
pub enum ParseEntry {
    Component(Option<String>),
    ConstructorArg(Option<usize>),
    Property(String),
    Qualifier(String),
}

impl fmt::Display for ParseEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseEntry::Component(Some(name)) => write!(f, "component '{name}'"),
            ParseEntry::Component(None) => f.write_str("anonymous component"),
            ParseEntry::ConstructorArg(Some(index)) => {
                write!(f, "constructor-arg #{index}")
            }
            ParseEntry::ConstructorArg(None) => f.write_str("constructor-arg"),
            ParseEntry::Property(name) => write!(f, "property '{name}'"),
            ParseEntry::Qualifier(ty) => write!(f, "qualifier '{ty}'"),
        }
    }
}

/// Push/pop stack tracking what the parser is currently inside of.
///
/// Used only to build problem messages, never for control flow.
#[derive(Debug, Default)]
pub struct ParseState {
    entries: Vec<ParseEntry>,
}

impl ParseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ParseEntry) {
        self.entries.push(entry);
    }

    pub fn pop(&mut self) {
        self.entries.pop();
    }

    /// Name of the innermost component entry, when it has one.
    pub fn current_component(&self) -> Option<&str> {
        self.entries.iter().rev().find_map(|entry| match entry {
            ParseEntry::Component(name) => name.as_deref(),
            _ => None,
        })
    }

    /// Render the current stack, outermost first, or `None` when empty.
    pub fn describe(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let parts: Vec<String> = self.entries.iter().map(ToString::to_string).collect();
        Some(parts.join(" > "))
    }
}
