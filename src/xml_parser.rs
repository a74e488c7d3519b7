//! XML Parser Module
//!
//! This module parses a decompressed DMARC report into a small element tree and
//! strips namespace prefixes from every tag, so that path lookups such as
//! `report_metadata/org_name` work whether or not the sending provider wrapped its
//! elements in a namespace.
//!
//! It enforces a nesting depth limit and completely disables the processing of
//! DOCTYPE declarations (and hence external/internal entities) by removing any
//! DOCTYPE block from the input. If a DOCTYPE block contains two or more entity
//! definitions, the XML is rejected.

use crate::error::{DmarcError, Result};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

const MAX_DEPTH: usize = 20;

/// An element of a parsed report.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub text: Option<String>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn new(name: String) -> Self {
        XmlElement {
            name,
            ..Default::default()
        }
    }

    /// All elements reached by following a `/`-separated path of child names.
    ///
    /// The path is relative to `self`; results are in document order.
    pub fn find_all<'a>(&'a self, path: &str) -> Vec<&'a XmlElement> {
        let mut current = vec![self];
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current
                .into_iter()
                .flat_map(|e| e.children.iter().filter(move |c| c.name == segment))
                .collect();
        }
        current
    }

    /// The first element at `path`, if any.
    pub fn find(&self, path: &str) -> Option<&XmlElement> {
        self.find_all(path).into_iter().next()
    }

    /// Text of the first element at `path`. An element without text yields `None`.
    pub fn find_text(&self, path: &str) -> Option<&str> {
        self.find(path).and_then(|e| e.text.as_deref())
    }

    /// Text of every element at `path`; elements without text yield `""`.
    pub fn find_all_text(&self, path: &str) -> Vec<String> {
        self.find_all(path)
            .into_iter()
            .map(|e| e.text.clone().unwrap_or_default())
            .collect()
    }
}

/// Parses report bytes into a tree whose tags have had their namespaces stripped.
///
/// # Errors
///
/// Returns [`DmarcError::MalformedXml`] (or [`DmarcError::Xml`] for errors raised
/// by the reader) if the payload is not UTF-8, is not well formed, nests deeper
/// than the depth limit, or declares recursive entities.
pub fn parse_report_xml(bytes: &[u8]) -> Result<XmlElement> {
    let content = std::str::from_utf8(bytes)
        .map_err(|e| DmarcError::MalformedXml(format!("payload is not valid UTF-8: {}", e)))?;
    let content = content.trim_start_matches('\u{feff}');
    let cleaned = remove_doctype(content)?;
    let mut root = build_tree(&cleaned)?;
    strip_namespaces(&mut root);
    Ok(root)
}

/// Rewrites every tag in the tree to its local name, in place.
///
/// Handles both `prefix:local` and Clark-style `{uri}local` names.
pub fn strip_namespaces(element: &mut XmlElement) {
    if let Some(pos) = element.name.rfind(|c: char| c == ':' || c == '}') {
        element.name = element.name[pos + 1..].to_string();
    }
    for child in &mut element.children {
        strip_namespaces(child);
    }
}

fn remove_doctype(xml_content: &str) -> Result<String> {
    let Some(start) = xml_content.find("<!DOCTYPE") else {
        return Ok(xml_content.to_string());
    };
    let Some(end) = xml_content[start..].find("]>") else {
        // No internal subset to inspect; the reader skips a plain DOCTYPE.
        return Ok(xml_content.to_string());
    };
    let doctype = &xml_content[start..start + end + 2];
    if doctype.matches("<!ENTITY").count() >= 2 {
        return Err(DmarcError::MalformedXml("Recursive entities detected".into()));
    }
    Ok(format!("{}{}", &xml_content[..start], &xml_content[start + end + 2..]))
}

fn build_tree(xml: &str) -> Result<XmlElement> {
    // Text is kept verbatim: a padded `<result> pass </result>` is not `pass`.
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if root.is_some() {
                    return Err(DmarcError::MalformedXml("multiple root elements".into()));
                }
                if stack.len() >= MAX_DEPTH {
                    return Err(DmarcError::MalformedXml("XML nesting depth limit exceeded".into()));
                }
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                stack.push(XmlElement::new(name));
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                attach(&mut stack, &mut root, XmlElement::new(name))?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| DmarcError::MalformedXml("unexpected closing tag".into()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                // Indentation between elements.
                if !text.trim().is_empty() {
                    append_text(&mut stack, &text);
                }
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                append_text(&mut stack, &text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(DmarcError::MalformedXml(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| DmarcError::MalformedXml("document has no root element".into()))
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(DmarcError::MalformedXml("multiple root elements".into())),
    }
    Ok(())
}

fn append_text(stack: &mut [XmlElement], text: &str) {
    // Text outside the root element is ignored.
    if let Some(current) = stack.last_mut() {
        current.text.get_or_insert_with(String::new).push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <feedback>
            <report_metadata>
                <org_name>ProviderX</org_name>
                <report_id>abc-123</report_id>
            </report_metadata>
            <record><row><source_ip>192.0.2.1</source_ip></row></record>
            <record><row><source_ip>192.0.2.2</source_ip></row></record>
        </feedback>"#;

    const PREFIXED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <dmarc:feedback xmlns:dmarc="urn:ietf:params:xml:ns:dmarc-2.0">
            <dmarc:report_metadata>
                <dmarc:org_name>ProviderX</dmarc:org_name>
                <dmarc:report_id>abc-123</dmarc:report_id>
            </dmarc:report_metadata>
            <dmarc:record><dmarc:row><dmarc:source_ip>192.0.2.1</dmarc:source_ip></dmarc:row></dmarc:record>
            <dmarc:record><dmarc:row><dmarc:source_ip>192.0.2.2</dmarc:source_ip></dmarc:row></dmarc:record>
        </dmarc:feedback>"#;

    #[test]
    fn test_namespace_stripping_is_transparent() {
        let plain = parse_report_xml(PLAIN.as_bytes()).unwrap();
        let prefixed = parse_report_xml(PREFIXED.as_bytes()).unwrap();
        assert_eq!(plain, prefixed);
        assert_eq!(prefixed.find_text("report_metadata/org_name"), Some("ProviderX"));
        assert_eq!(prefixed.find_all("record").len(), 2);
    }

    #[test]
    fn test_default_namespace() {
        let xml = r#"<feedback xmlns="urn:ietf:params:xml:ns:dmarc-2.0"><report_metadata><report_id>1</report_id></report_metadata></feedback>"#;
        let tree = parse_report_xml(xml.as_bytes()).unwrap();
        assert_eq!(tree.find_text("report_metadata/report_id"), Some("1"));
    }

    #[test]
    fn test_clark_notation_is_stripped() {
        let mut tree = XmlElement {
            name: "{urn:x}feedback".into(),
            text: None,
            children: vec![XmlElement::new("{urn:x}record".into())],
        };
        strip_namespaces(&mut tree);
        assert_eq!(tree.name, "feedback");
        assert_eq!(tree.children[0].name, "record");
    }

    #[test]
    fn test_find_all_preserves_document_order() {
        let tree = parse_report_xml(PLAIN.as_bytes()).unwrap();
        let ips: Vec<String> = tree.find_all_text("record/row/source_ip");
        assert_eq!(ips, vec!["192.0.2.1", "192.0.2.2"]);
    }

    #[test]
    fn test_empty_element_has_no_text() {
        let tree = parse_report_xml(b"<feedback><org_name/><report_id></report_id></feedback>").unwrap();
        assert!(tree.find("org_name").is_some());
        assert_eq!(tree.find_text("org_name"), None);
        assert_eq!(tree.find_text("report_id"), None);
        assert_eq!(tree.find_all_text("report_id"), vec![String::new()]);
    }

    #[test]
    fn test_entities_and_cdata() {
        let tree = parse_report_xml(b"<a><b>AT&amp;T</b><c><![CDATA[x<y]]></c></a>").unwrap();
        assert_eq!(tree.find_text("b"), Some("AT&T"));
        assert_eq!(tree.find_text("c"), Some("x<y"));
    }

    #[test]
    fn test_malformed_xml() {
        assert!(parse_report_xml(b"<feedback><record></feedback>").is_err());
        assert!(parse_report_xml(b"<feedback><record>").is_err());
        assert!(matches!(parse_report_xml(b""), Err(DmarcError::MalformedXml(_))));
        assert!(matches!(parse_report_xml(b"<a/><b/>"), Err(DmarcError::MalformedXml(_))));
        assert!(matches!(parse_report_xml(&[0xff, 0xfe, 0x00]), Err(DmarcError::MalformedXml(_))));
    }

    #[test]
    fn test_text_is_not_trimmed() {
        let tree = parse_report_xml(b"<a>\n  <b>\n   pass\n  </b>\n  <c>   </c>\n</a>").unwrap();
        assert_eq!(tree.text, None);
        assert_eq!(tree.find_text("b"), Some("\n   pass\n  "));
        assert_eq!(tree.find_text("c"), None);
    }

    #[test]
    fn test_bom_is_ignored() {
        let mut bytes = "\u{feff}".as_bytes().to_vec();
        bytes.extend_from_slice(b"<feedback/>");
        assert_eq!(parse_report_xml(&bytes).unwrap().name, "feedback");
    }

    #[test]
    fn test_depth_limit() {
        let xml = format!("{}{}", "<a>".repeat(MAX_DEPTH + 1), "</a>".repeat(MAX_DEPTH + 1));
        assert!(matches!(parse_report_xml(xml.as_bytes()), Err(DmarcError::MalformedXml(_))));
        let xml = format!("{}{}", "<a>".repeat(MAX_DEPTH), "</a>".repeat(MAX_DEPTH));
        assert!(parse_report_xml(xml.as_bytes()).is_ok());
    }
}
