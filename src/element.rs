//! Owned XML element tree
//!
//! The definition parser walks a fully materialized tree rather than a
//! stream of events, so documents are first loaded into [`Element`] values
//! here. This is the only module that knows about markup syntax; everything
//! downstream sees elements, attributes and text.
//!
//! Namespace prefixes are resolved while loading: every element and every
//! prefixed attribute carries its resolved namespace URI. Unprefixed
//! attributes carry no namespace, per the XML namespaces rules.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Line/column position inside the source document, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// A single attribute with its resolved namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

/// One element of the loaded document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    namespace: Option<String>,
    attributes: Vec<Attribute>,
    children: Vec<Element>,
    text: String,
    location: Location,
}

/// Errors raised while loading a document into an element tree.
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("malformed document: {0}")]
    Syntax(#[from] quick_xml::Error),

    #[error("document has no root element")]
    NoRoot,

    #[error("unexpected content after the root element")]
    TrailingContent,

    #[error("unbalanced closing tag")]
    Unbalanced,

    #[error("undeclared namespace prefix '{0}'")]
    UndeclaredPrefix(String),
}

impl Element {
    /// Load a document from its textual form.
    pub fn parse(source: &str) -> Result<Element, XmlError> {
        let lines = LineIndex::new(source);
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text(true);

        let mut ns_scopes: Vec<Vec<(Option<String>, String)>> = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let offset = reader.buffer_position() as usize;
            match reader.read_event()? {
                Event::Start(start) => {
                    let element = open_element(&start, offset, &lines, &mut ns_scopes)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = open_element(&start, offset, &lines, &mut ns_scopes)?;
                    ns_scopes.pop();
                    attach(element, &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or(XmlError::Unbalanced)?;
                    ns_scopes.pop();
                    attach(element, &mut stack, &mut root)?;
                }
                Event::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(data.as_ref()));
                    }
                }
                Event::Eof => break,
                // declarations, comments, processing instructions
                _ => {}
            }
        }

        root.ok_or(XmlError::NoRoot)
    }

    /// Local (unprefixed) element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved namespace URI, if the element is in a namespace.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Value of an un-namespaced attribute with the given local name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Attribute value, treating an absent attribute as the empty string.
    pub fn attribute_or_empty(&self, name: &str) -> &str {
        self.attribute(name).unwrap_or("")
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Direct children with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First direct child with the given local name.
    pub fn child_named(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Concatenated character data, surrounding whitespace trimmed.
    pub fn text(&self) -> &str {
        self.text.trim()
    }
}

fn attach(
    element: Element,
    stack: &mut Vec<Element>,
    root: &mut Option<Element>,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(XmlError::TrailingContent)
    }
}

fn open_element(
    start: &BytesStart<'_>,
    offset: usize,
    lines: &LineIndex,
    ns_scopes: &mut Vec<Vec<(Option<String>, String)>>,
) -> Result<Element, XmlError> {
    // Raw (prefix, name, value) triples; namespace declarations go into the
    // new scope before anything is resolved against it.
    let mut scope: Vec<(Option<String>, String)> = Vec::new();
    let mut raw_attrs: Vec<(Option<String>, String, String)> = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = attr.key;
        let local = String::from_utf8_lossy(key.local_name().as_ref()).into_owned();
        let prefix = key
            .prefix()
            .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());
        let value = attr.unescape_value()?.into_owned();

        match prefix.as_deref() {
            None if local == "xmlns" => scope.push((None, value)),
            Some("xmlns") => scope.push((Some(local), value)),
            _ => raw_attrs.push((prefix, local, value)),
        }
    }
    ns_scopes.push(scope);

    let name = start.name();
    let local = String::from_utf8_lossy(name.local_name().as_ref()).into_owned();
    let prefix = name
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());
    let namespace = resolve_namespace(prefix.as_deref(), ns_scopes)?;

    let mut attributes = Vec::with_capacity(raw_attrs.len());
    for (prefix, name, value) in raw_attrs {
        // Unprefixed attributes are never in the default namespace.
        let namespace = match prefix.as_deref() {
            None => None,
            some => resolve_namespace(some, ns_scopes)?,
        };
        attributes.push(Attribute {
            namespace,
            name,
            value,
        });
    }

    Ok(Element {
        name: local,
        namespace,
        attributes,
        children: Vec::new(),
        text: String::new(),
        location: lines.locate(offset),
    })
}

fn resolve_namespace(
    prefix: Option<&str>,
    ns_scopes: &[Vec<(Option<String>, String)>],
) -> Result<Option<String>, XmlError> {
    for scope in ns_scopes.iter().rev() {
        for (declared, uri) in scope {
            if declared.as_deref() == prefix {
                if uri.is_empty() {
                    // xmlns="" undeclares the default namespace
                    return Ok(None);
                }
                return Ok(Some(uri.clone()));
            }
        }
    }
    match prefix {
        None => Ok(None),
        Some(p) => Err(XmlError::UndeclaredPrefix(p.to_string())),
    }
}

/// Precomputed offsets of line starts, for cheap offset-to-location lookup.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { starts }
    }

    fn locate(&self, offset: usize) -> Location {
        let line = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Location {
            line: line + 1,
            column: offset - self.starts[line] + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let doc = r#"<components default-lazy-init="true">
  <component id="a" class="app.Widget">
    <property name="size" value="10"/>
  </component>
</components>"#;
        let root = Element::parse(doc).unwrap();
        assert_eq!(root.name(), "components");
        assert_eq!(root.attribute("default-lazy-init"), Some("true"));
        assert_eq!(root.children().len(), 1);

        let component = &root.children()[0];
        assert_eq!(component.attribute("id"), Some("a"));
        let property = component.child_named("property").unwrap();
        assert_eq!(property.attribute("name"), Some("size"));
        assert_eq!(property.attribute("missing"), None);
        assert!(property.location().line >= 3);
    }

    #[test]
    fn resolves_namespaces() {
        let doc = r#"<root xmlns="urn:default" xmlns:tx="urn:tx">
  <plain/>
  <tx:advice tx:mode="strict" local="x"/>
</root>"#;
        let root = Element::parse(doc).unwrap();
        assert_eq!(root.namespace(), Some("urn:default"));

        let plain = &root.children()[0];
        assert_eq!(plain.namespace(), Some("urn:default"));

        let advice = &root.children()[1];
        assert_eq!(advice.namespace(), Some("urn:tx"));
        assert_eq!(advice.name(), "advice");
        // prefixed attribute carries its namespace, unprefixed does not
        let attrs = advice.attributes();
        assert_eq!(attrs[0].namespace.as_deref(), Some("urn:tx"));
        assert_eq!(attrs[1].namespace, None);
        // namespaced attributes are invisible to the plain lookup
        assert_eq!(advice.attribute("mode"), None);
        assert_eq!(advice.attribute("local"), Some("x"));
    }

    #[test]
    fn collects_text() {
        let root = Element::parse("<value type=\"i64\">  42  </value>").unwrap();
        assert_eq!(root.text(), "42");
        assert_eq!(root.attribute("type"), Some("i64"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Element::parse("<a><b></a></b>").is_err());
        assert!(Element::parse("").is_err());
    }
}
