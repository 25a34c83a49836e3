//! A small element tree over quick-xml, enough for event documents.

use crate::error::{EventError, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// One XML element with its attributes, text and child elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: &str) -> Element {
        Element {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_text(name: &str, text: impl Into<String>) -> Element {
        Element {
            name: name.to_string(),
            text: text.into(),
            ..Default::default()
        }
    }

    /// Text element when `value` is present, empty element otherwise.
    pub fn optional<T: ToString>(name: &str, value: Option<T>) -> Element {
        match value {
            Some(v) => Element::with_text(name, v.to_string()),
            None => Element::new(name),
        }
    }

    /// `<name><value>..</value></name>`
    pub fn value<T: ToString>(name: &str, value: Option<T>) -> Element {
        let mut element = Element::new(name);
        element.push(Element::optional("value", value));
        element
    }

    pub fn attribute(mut self, key: &str, value: &str) -> Element {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    /// Append a child and return it for further nesting.
    pub fn push(&mut self, child: Element) -> &mut Element {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First element along a path of child names.
    pub fn find(&self, path: &[&str]) -> Option<&Element> {
        path.iter().try_fold(self, |node, name| node.child(name))
    }

    /// Trimmed text at `path`; blank text counts as absent.
    pub fn text_at(&self, path: &[&str]) -> Option<&str> {
        let text = self.find(path)?.text.trim();
        (!text.is_empty()).then_some(text)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> Result<Element> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| EventError::XmlParse(format!("at {}: {}", reader.buffer_position(), e)))?;
            match event {
                Event::Start(start) => stack.push(open(&start)?),
                Event::Empty(start) => {
                    let element = open(&start)?;
                    close(element, &mut stack, &mut root);
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| EventError::XmlParse("unbalanced end tag".to_string()))?;
                    close(element, &mut stack, &mut root);
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let text = text
                            .unescape()
                            .map_err(|e| EventError::XmlParse(e.to_string()))?;
                        current.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        if !stack.is_empty() {
            return Err(EventError::XmlParse("unexpected end of document".to_string()));
        }
        root.ok_or_else(|| EventError::XmlParse("document has no root element".to_string()))
    }

    /// Serialize with an XML declaration and two-space indentation.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_err)?;
        self.write(&mut writer)?;
        let mut xml = String::from_utf8(writer.into_inner())
            .map_err(|e| EventError::XmlWrite(e.to_string()))?;
        xml.push('\n');
        Ok(xml)
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        if self.children.is_empty() && self.text.is_empty() {
            writer.write_event(Event::Empty(start)).map_err(write_err)?;
            return Ok(());
        }
        writer.write_event(Event::Start(start)).map_err(write_err)?;
        if !self.text.is_empty() {
            writer
                .write_event(Event::Text(BytesText::new(&self.text)))
                .map_err(write_err)?;
        }
        for child in &self.children {
            child.write(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(write_err)?;
        Ok(())
    }
}

fn write_err<E: std::fmt::Display>(e: E) -> EventError {
    EventError::XmlWrite(e.to_string())
}

fn open(start: &BytesStart) -> Result<Element> {
    let mut element = Element::new(&String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| EventError::XmlParse(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| EventError::XmlParse(e.to_string()))?;
        element.attributes.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value.into_owned(),
        ));
    }
    Ok(element)
}

fn close(element: Element, stack: &mut [Element], root: &mut Option<Element>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_with_attributes() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<event>
  <pick>
    <waveform networkCode="BW" stationCode="RJOB" channelCode="EHZ" locationCode=""/>
    <time><value>2009-12-27T10:52:59.425000</value><uncertainty/></time>
  </pick>
  <pick><phaseHint>S</phaseHint></pick>
</event>"#;
        let root = Element::parse(xml).unwrap();
        assert_eq!(root.name, "event");
        assert_eq!(root.children("pick").count(), 2);
        let pick = root.child("pick").unwrap();
        assert_eq!(pick.find(&["waveform"]).unwrap().attr("stationCode"), Some("RJOB"));
        assert_eq!(pick.find(&["waveform"]).unwrap().attr("locationCode"), Some(""));
        assert_eq!(
            pick.text_at(&["time", "value"]),
            Some("2009-12-27T10:52:59.425000")
        );
        assert_eq!(pick.text_at(&["time", "uncertainty"]), None);
        assert_eq!(pick.text_at(&["onset"]), None);
    }

    #[test]
    fn test_write_then_parse() {
        let mut root = Element::new("event");
        root.push(Element::value("event_id", Some("1265906465")));
        root.push(Element::new("pick"))
            .push(Element::new("waveform").attribute("stationCode", "R&B"));
        root.push(Element::optional::<f64>("weight", None));
        let xml = root.to_xml().unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<value>1265906465</value>"));
        assert!(xml.contains("<weight/>"));
        assert_eq!(Element::parse(&xml).unwrap(), root);
    }

    #[test]
    fn test_malformed_document() {
        assert!(Element::parse("<event><pick></event>").is_err());
        assert!(Element::parse("").is_err());
    }
}
