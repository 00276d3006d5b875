//! XML encoding of retrieved documents
//!
//! Each document becomes a `<doc>` fragment suitable for a Solr `<add>` call:
//!
//! ```text
//! <doc><field name="id">node/1</field>
//! <field name="title">Hello &amp; welcome</field>
//! </doc>
//! ```
//!
//! Field names are escaped for attribute values (quotes included), field values
//! only for element content. Control bytes the Solr XML parser rejects are
//! replaced with a space after escaping.

use std::collections::HashSet;

use quick_xml::escape::{escape, partial_escape};

use super::document::Document;

/// Fields dropped from every export unless configured otherwise
pub const DEFAULT_DISCARD_FIELDS: &[&str] = &["spell"];

/// Encoder turning documents into `<doc>` fragments
#[derive(Debug, Clone)]
pub struct XmlEncoder {
    discard: HashSet<String>,
}

impl Default for XmlEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_DISCARD_FIELDS.iter().copied())
    }
}

impl XmlEncoder {
    /// Create an encoder with the given discard set
    pub fn new<I, S>(discard: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            discard: discard.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a field is dropped
    pub fn discards(&self, field: &str) -> bool {
        self.discard.contains(field)
    }

    /// Encode one document
    pub fn encode(&self, document: &Document) -> String {
        let mut xml = String::from("<doc>");

        for (name, value) in document.fields() {
            if self.discards(name) {
                continue;
            }
            let name = escape(name);
            for v in value.values() {
                xml.push_str("<field name=\"");
                xml.push_str(&name);
                xml.push_str("\">");
                xml.push_str(&partial_escape(v));
                xml.push_str("</field>\n");
            }
        }

        xml.push_str("</doc>");
        strip_ctrl_chars(&xml)
    }
}

/// Replace control characters invalid in XML 1.0 with a space.
///
/// Tab, line feed and carriage return are kept.
pub fn strip_ctrl_chars(input: &str) -> String {
    input
        .chars()
        .map(|c| if is_invalid_ctrl(c) { ' ' } else { c })
        .collect()
}

fn is_invalid_ctrl(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;

    /// Parse a fragment back into (name, value) pairs
    fn parse_fields(xml: &str) -> Vec<(String, String)> {
        let mut reader = Reader::from_str(xml);
        let mut fields = Vec::new();
        let mut current: Option<String> = None;
        let mut text = String::new();

        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) if e.name().as_ref() == b"field" => {
                    let attr = e.try_get_attribute("name").unwrap().unwrap();
                    current = Some(attr.unescape_value().unwrap().into_owned());
                    text.clear();
                }
                Event::Text(e) => {
                    if current.is_some() {
                        text.push_str(&e.unescape().unwrap());
                    }
                }
                Event::End(e) if e.name().as_ref() == b"field" => {
                    if let Some(name) = current.take() {
                        fields.push((name, std::mem::take(&mut text)));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        fields
    }

    #[test]
    fn test_basic_document() {
        let doc = Document::new()
            .with_field("id", "node/1")
            .with_field("title", "Hello");
        let xml = XmlEncoder::default().encode(&doc);
        assert_eq!(
            xml,
            "<doc><field name=\"id\">node/1</field>\n<field name=\"title\">Hello</field>\n</doc>"
        );
    }

    #[test]
    fn test_value_escaping_round_trip() {
        let raw = r#"a < b > c & "quoted" 'single'"#;
        let doc = Document::new().with_field("body", raw);
        let xml = XmlEncoder::default().encode(&doc);

        // content escaping only, quotes stay literal
        assert!(xml.contains(r#"a &lt; b &gt; c &amp; "quoted" 'single'"#));
        assert_eq!(parse_fields(&xml), vec![("body".to_string(), raw.to_string())]);
    }

    #[test]
    fn test_name_escaping_is_quote_safe() {
        let doc = Document::new().with_field(r#"we"ird&<name>"#, "v");
        let xml = XmlEncoder::default().encode(&doc);

        assert!(xml.contains("name=\"we&quot;ird&amp;&lt;name&gt;\""));
        assert_eq!(parse_fields(&xml)[0].0, r#"we"ird&<name>"#);
    }

    #[test]
    fn test_multi_valued_field_order() {
        let doc = Document::new()
            .with_field("id", "x")
            .with_field("tags", vec!["v1", "v2", "v3"]);
        let fields = parse_fields(&XmlEncoder::default().encode(&doc));

        let tags: Vec<&str> = fields
            .iter()
            .filter(|(n, _)| n == "tags")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(tags, vec!["v1", "v2", "v3"]);
    }

    #[test]
    fn test_discarded_field_never_appears() {
        let doc = Document::new()
            .with_field("id", "x")
            .with_field("spell", vec!["one", "two"])
            .with_field("secret", "s");
        let encoder = XmlEncoder::new(["spell", "secret"]);
        let xml = encoder.encode(&doc);

        assert!(!xml.contains("spell"));
        assert!(!xml.contains("secret"));
        assert_eq!(parse_fields(&xml).len(), 1);
    }

    #[test]
    fn test_default_discards_spell() {
        let doc = Document::new().with_field("spell", "foo");
        assert_eq!(XmlEncoder::default().encode(&doc), "<doc></doc>");
    }

    #[test]
    fn test_field_order_preserved() {
        let doc = Document::new()
            .with_field("z", "1")
            .with_field("a", "2")
            .with_field("m", "3");
        let names: Vec<String> = parse_fields(&XmlEncoder::default().encode(&doc))
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_control_bytes_become_spaces() {
        let mut value = String::new();
        for b in (0x00u8..=0x08).chain([0x0B, 0x0C]).chain(0x0E..=0x1F) {
            value.push(b as char);
        }
        let invalid_count = value.len();
        value.push_str("\t\n\r ok");

        let doc = Document::new().with_field("body", value.as_str());
        let xml = XmlEncoder::default().encode(&doc);

        let expected = format!("{}\t\n\r ok", " ".repeat(invalid_count));
        assert!(xml.contains(&format!(">{expected}</field>")));
        assert!(!xml.chars().any(is_invalid_ctrl));
    }

    #[test]
    fn test_strip_leaves_other_text_untouched() {
        let input = "plain ünïcode\u{7F} text";
        assert_eq!(strip_ctrl_chars(input), input);
    }

    #[test]
    fn test_empty_multi_value_emits_nothing() {
        let doc = Document::new().with_field("tags", Vec::<&str>::new());
        assert_eq!(XmlEncoder::default().encode(&doc), "<doc></doc>");
    }
}
