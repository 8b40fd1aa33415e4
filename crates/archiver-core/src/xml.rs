//! XML tree adapter
//!
//! A small owned element tree on top of `quick-xml`. The archive never works
//! with XML events directly; it builds and walks [`Element`] values, and this
//! module converts them to and from text.
//!
//! Text is only kept for leaf elements. Whitespace between child elements is
//! formatting and is dropped on parse, so an indented document round-trips.

use std::borrow::Cow;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

/// Errors raised while parsing or writing XML
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    #[error("Malformed XML at byte {position}: {details}")]
    Malformed { position: u64, details: String },

    #[error("Unexpected end tag </{found}>, expected </{expected}>")]
    MismatchedEnd { expected: String, found: String },

    #[error("Document has no root element")]
    NoRoot,

    #[error("Unexpected end of document inside <{0}>")]
    UnexpectedEof(String),

    #[error("Failed to write XML: {0}")]
    Write(String),
}

/// An XML element with ordered attributes, child elements and leaf text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Set an attribute, replacing any existing value for the key
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Iterate over direct children with the given element name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Parse a document and return its root element
    pub fn parse(input: &str) -> Result<Element, XmlError> {
        let mut reader = Reader::from_str(input);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let position = reader.buffer_position();
            let malformed = |details: String| XmlError::Malformed { position, details };

            let event = reader.read_event().map_err(|e| malformed(e.to_string()))?;
            match event {
                Event::Start(start) => {
                    let element = element_from_start(&start).map_err(malformed)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&start).map_err(malformed)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(end) => {
                    let found = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    let mut element = stack.pop().ok_or_else(|| XmlError::MismatchedEnd {
                        expected: String::new(),
                        found: found.clone(),
                    })?;
                    if element.name != found {
                        return Err(XmlError::MismatchedEnd {
                            expected: element.name,
                            found,
                        });
                    }
                    if !element.children.is_empty() {
                        element.text.clear();
                    }
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let unescaped = text.unescape().map_err(|e| malformed(e.to_string()))?;
                        current.text.push_str(&unescaped);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(XmlError::UnexpectedEof(open.name));
        }
        root.ok_or(XmlError::NoRoot)
    }

    /// Serialise as an indented document with an XML declaration
    pub fn to_document(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_err)?;
        write_element(&mut writer, self)?;

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|e| XmlError::Write(e.to_string()))
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, String> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value: Cow<'_, str> = attr.unescape_value().map_err(|e| e.to_string())?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(XmlError::Malformed {
                position: 0,
                details: format!("second root element <{}>", element.name),
            })
        }
    }
    Ok(())
}

fn write_err(e: impl std::fmt::Display) -> XmlError {
    XmlError::Write(e.to_string())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() && element.text.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_err);
    }

    writer.write_event(Event::Start(start)).map_err(write_err)?;
    if element.children.is_empty() {
        writer
            .write_event(Event::Text(BytesText::new(&element.text)))
            .map_err(write_err)?;
    } else {
        for child in &element.children {
            write_element(writer, child)?;
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_err)
}
