//! Parser for the `<tool>` wire format (spec §4.5 / §6.4).
//!
//! ```text
//! <tool>
//!   <server_name>local</server_name>     (optional, defaults to "local")
//!   <tool_name>NAME</tool_name>           (required, non-empty)
//!   <arguments>
//!     <!-- tool-specific inner XML -->
//!   </arguments>
//! </tool>
//! ```
//!
//! Text nodes may use entity escaping (`&amp;`, `&lt;`, ...) or a `CDATA`
//! section, picking one or the other per element. `<arguments>` is never
//! interpreted here: its inner XML is captured verbatim and handed to the
//! tool, which parses it against its own schema.

pub mod partial;

use quick_xml::Reader;
use quick_xml::events::Event;
use std::fmt;

pub use partial::partial_tool_name;

/// Hard cap on tool-call body size (spec §4.5: DoS guard).
pub const MAX_TOOL_CALL_BYTES: usize = 10 * 1024 * 1024;

const DEFAULT_SERVER_NAME: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedToolCall {
    pub server_name: String,
    pub tool_name: String,
    /// Raw inner XML of `<arguments>`, unparsed.
    pub arguments_xml: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlErrorKind {
    TooLarge,
    MalformedXml,
    MissingToolName,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct XmlParseError {
    pub kind: XmlErrorKind,
    detail: String,
}

impl fmt::Display for XmlParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}. Prefer entity-escaping (&amp; &lt; &gt;) for tool-call text; \
             fall back to a CDATA section only for unescaped leaf text, never to nest \
             structure inside it.",
            match self.kind {
                XmlErrorKind::TooLarge => "tool-call body exceeds the 10 MB limit",
                XmlErrorKind::MalformedXml => "malformed tool-call xml",
                XmlErrorKind::MissingToolName => "missing or empty <tool_name>",
            },
            self.detail
        )
    }
}

impl XmlParseError {
    fn new(kind: XmlErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Parse a `<tool>...</tool>` body (or a bare fragment missing the
/// enclosing root) into its three fields.
pub fn parse_tool_call(raw: &str) -> Result<ParsedToolCall, XmlParseError> {
    if raw.len() > MAX_TOOL_CALL_BYTES {
        return Err(XmlParseError::new(
            XmlErrorKind::TooLarge,
            format!("body is {} bytes", raw.len()),
        ));
    }

    let tool_body = locate_tool_element(raw)?;

    let server_name = match extract_simple_text(tool_body, "server_name")? {
        ElementText::Missing => DEFAULT_SERVER_NAME.to_string(),
        ElementText::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                DEFAULT_SERVER_NAME.to_string()
            } else {
                trimmed.to_string()
            }
        }
        ElementText::Nested => {
            return Err(XmlParseError::new(
                XmlErrorKind::MalformedXml,
                "<server_name> must be a single text node",
            ));
        }
    };

    let tool_name = match extract_simple_text(tool_body, "tool_name")? {
        ElementText::Missing => {
            return Err(XmlParseError::new(
                XmlErrorKind::MissingToolName,
                "<tool_name> element was not found",
            ));
        }
        ElementText::Nested => {
            return Err(XmlParseError::new(
                XmlErrorKind::MissingToolName,
                "<tool_name> must be a single text node, not nested elements",
            ));
        }
        ElementText::Text(text) => {
            let trimmed = text.trim().to_string();
            if trimmed.is_empty() {
                return Err(XmlParseError::new(
                    XmlErrorKind::MissingToolName,
                    "<tool_name> was empty",
                ));
            }
            trimmed
        }
    };

    let arguments_xml = extract_inner_xml(tool_body, "arguments")?.unwrap_or_default();

    Ok(ParsedToolCall {
        server_name,
        tool_name,
        arguments_xml,
    })
}

impl ParsedToolCall {
    /// Serializes back to the normalized wire format: entity-escaped
    /// `server_name`/`tool_name`, `arguments_xml` embedded verbatim (it is
    /// already well-formed XML, captured unparsed by [`parse_tool_call`]).
    /// Round-tripping the result through [`parse_tool_call`] reproduces the
    /// same `(server_name, tool_name, arguments_xml)` tuple.
    #[must_use]
    pub fn to_xml(&self) -> String {
        format!(
            "<tool><server_name>{}</server_name><tool_name>{}</tool_name><arguments>{}</arguments></tool>",
            quick_xml::escape::escape(&self.server_name),
            quick_xml::escape::escape(&self.tool_name),
            self.arguments_xml,
        )
    }
}

/// Find the span of the top-level `<tool>...</tool>` element, wrapping the
/// body in a synthetic root first so a parser never sees more than one
/// top-level node (spec §4.5: "wrap body in a synthetic root if needed").
fn locate_tool_element(raw: &str) -> Result<&str, XmlParseError> {
    // Validate the document end to end first (catches unclosed tags, bad
    // entities, stray `]]>` left behind by an early CDATA close) by wrapping
    // it in a synthetic root, per spec §4.5.
    let wrapped = format!("<stoke-root>{raw}</stoke-root>");
    validate_well_formed(&wrapped)?;

    match find_element_span(raw, "tool") {
        Some(span) => Ok(span),
        None => Err(XmlParseError::new(
            XmlErrorKind::MalformedXml,
            "no top-level <tool> element found",
        )),
    }
}

fn validate_well_formed(xml: &str) -> Result<(), XmlParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut buf_depth = 0i64;
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(_)) => buf_depth += 1,
            Ok(Event::End(_)) => {
                buf_depth -= 1;
                if buf_depth < 0 {
                    return Err(XmlParseError::new(
                        XmlErrorKind::MalformedXml,
                        "unmatched closing tag",
                    ));
                }
            }
            Ok(_) => {}
            Err(e) => {
                return Err(XmlParseError::new(XmlErrorKind::MalformedXml, e.to_string()));
            }
        }
    }
    if buf_depth != 0 {
        return Err(XmlParseError::new(
            XmlErrorKind::MalformedXml,
            "unclosed element",
        ));
    }
    Ok(())
}

enum ElementText {
    Missing,
    Text(String),
    Nested,
}

/// Extract the text of a top-level child element, distinguishing CDATA
/// (preserved verbatim) from entity-escaped text (unescaped), and flagging
/// nested child elements so callers can reject "must be a single text node"
/// elements like `<tool_name>`.
fn extract_simple_text(xml: &str, name: &str) -> Result<ElementText, XmlParseError> {
    let Some(span) = find_element_span(xml, name) else {
        return Ok(ElementText::Missing);
    };

    let mut reader = Reader::from_str(span);
    reader.config_mut().trim_text(false);
    let mut text = String::new();
    let mut saw_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Text(t)) => {
                let unescaped = t
                    .unescape()
                    .map_err(|e| XmlParseError::new(XmlErrorKind::MalformedXml, e.to_string()))?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(t)) => {
                text.push_str(&String::from_utf8_lossy(&t.into_inner()));
            }
            Ok(Event::Start(_)) | Ok(Event::Empty(_)) => {
                saw_element = true;
            }
            Ok(_) => {}
            Err(e) => {
                return Err(XmlParseError::new(XmlErrorKind::MalformedXml, e.to_string()));
            }
        }
    }

    if saw_element {
        Ok(ElementText::Nested)
    } else {
        Ok(ElementText::Text(text))
    }
}

/// Extract the raw inner XML (unparsed) of a top-level child element.
fn extract_inner_xml(xml: &str, name: &str) -> Result<Option<String>, XmlParseError> {
    Ok(find_element_span(xml, name).map(str::to_string))
}

/// Extract the text of a single top-level leaf element from an
/// `<arguments>` blob, e.g. the `<command>` child of `execute_command`'s
/// arguments. Returns `None` if the element is absent, nested, or its text
/// fails to unescape — callers that need this for an approval decision
/// should treat `None` as "does not match the whitelist" rather than panic.
pub fn extract_arg_text(arguments_xml: &str, name: &str) -> Option<String> {
    match extract_simple_text(arguments_xml, name) {
        Ok(ElementText::Text(text)) => Some(text),
        _ => None,
    }
}

/// Locate the byte span of `<name>...</name>` (or `<name/>` → empty span)
/// among the direct children of the document, tracking nesting depth so an
/// inner element sharing the same tag name doesn't confuse the search.
fn find_element_span<'a>(xml: &'a str, name: &str) -> Option<&'a str> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut depth: i64 = 0;
    let target = name.as_bytes();

    loop {
        let before = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Eof) => return None,
            Ok(Event::Empty(e)) if depth == 0 && e.local_name().as_ref() == target => {
                return Some("");
            }
            Ok(Event::Start(e)) if depth == 0 && e.local_name().as_ref() == target => {
                let content_start = reader.buffer_position();
                let mut inner_depth = 1i64;
                loop {
                    let inner_before = reader.buffer_position();
                    match reader.read_event() {
                        Ok(Event::Eof) => return None,
                        Ok(Event::Start(s)) if s.local_name().as_ref() == target => {
                            inner_depth += 1;
                        }
                        Ok(Event::End(en)) if en.local_name().as_ref() == target => {
                            inner_depth -= 1;
                            if inner_depth == 0 {
                                let content_end = inner_before;
                                return xml.get(content_start..content_end);
                            }
                        }
                        Ok(_) => {}
                        Err(_) => return None,
                    }
                }
            }
            Ok(Event::Start(_)) => {
                depth += 1;
            }
            Ok(Event::End(_)) => {
                depth -= 1;
            }
            Ok(_) => {}
            Err(_) => return None,
        }
        let _ = before;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_well_formed_call() {
        let xml = r#"<tool><tool_name>list_files</tool_name><arguments><path>.</path></arguments></tool>"#;
        let parsed = parse_tool_call(xml).unwrap();
        assert_eq!(parsed.server_name, "local");
        assert_eq!(parsed.tool_name, "list_files");
        assert_eq!(parsed.arguments_xml, "<path>.</path>");
    }

    #[test]
    fn honors_explicit_server_name() {
        let xml = r#"<tool><server_name>remote</server_name><tool_name>x</tool_name><arguments/></tool>"#;
        let parsed = parse_tool_call(xml).unwrap();
        assert_eq!(parsed.server_name, "remote");
        assert_eq!(parsed.arguments_xml, "");
    }

    #[test]
    fn supports_cdata_arguments() {
        let xml = r#"<tool><tool_name>bash</tool_name><arguments><command><![CDATA[echo "a" && echo "b"]]></command></arguments></tool>"#;
        let parsed = parse_tool_call(xml).unwrap();
        assert_eq!(parsed.arguments_xml, r#"<command><![CDATA[echo "a" && echo "b"]]></command>"#);
    }

    #[test]
    fn entity_escaped_tool_name_is_unescaped_when_checked_alone() {
        let xml = "<tool><tool_name>edit&amp;save</tool_name><arguments/></tool>";
        let parsed = parse_tool_call(xml).unwrap();
        assert_eq!(parsed.tool_name, "edit&save");
    }

    #[test]
    fn empty_tool_name_is_missing_tool_name() {
        let xml = "<tool><tool_name></tool_name><arguments/></tool>";
        let err = parse_tool_call(xml).unwrap_err();
        assert_eq!(err.kind, XmlErrorKind::MissingToolName);
    }

    #[test]
    fn absent_tool_name_is_missing_tool_name() {
        let xml = "<tool><arguments/></tool>";
        let err = parse_tool_call(xml).unwrap_err();
        assert_eq!(err.kind, XmlErrorKind::MissingToolName);
    }

    #[test]
    fn nested_element_inside_tool_name_is_rejected() {
        let xml = "<tool><tool_name><inner>x</inner></tool_name><arguments/></tool>";
        let err = parse_tool_call(xml).unwrap_err();
        assert_eq!(err.kind, XmlErrorKind::MissingToolName);
    }

    #[test]
    fn unclosed_tag_is_malformed() {
        let xml = "<tool><tool_name>x</tool_name><arguments><bad></arguments></tool>";
        let err = parse_tool_call(xml).unwrap_err();
        assert_eq!(err.kind, XmlErrorKind::MalformedXml);
    }

    #[test]
    fn oversized_body_is_too_large() {
        let body = "a".repeat(MAX_TOOL_CALL_BYTES + 1);
        let err = parse_tool_call(&body).unwrap_err();
        assert_eq!(err.kind, XmlErrorKind::TooLarge);
    }

    #[test]
    fn arrays_are_repeated_sibling_elements() {
        let xml = r#"<tool><tool_name>grep</tool_name><arguments><pattern>a</pattern><path>x</path><path>y</path></arguments></tool>"#;
        let parsed = parse_tool_call(xml).unwrap();
        assert_eq!(parsed.arguments_xml, "<pattern>a</pattern><path>x</path><path>y</path>");
    }

    #[test]
    fn extracts_command_argument_for_whitelist_checks() {
        let xml = r#"<command>npm install express</command>"#;
        assert_eq!(extract_arg_text(xml, "command").as_deref(), Some("npm install express"));
        assert_eq!(extract_arg_text(xml, "missing"), None);
    }

    #[rstest]
    #[case("local", "list_files", "<path>.</path>")]
    #[case("remote", "edit&save", "")]
    #[case("local", "grep", "<pattern>a</pattern><path>x</path><path>y</path>")]
    fn parse_then_reserialize_then_reparse_preserves_the_tuple(
        #[case] server_name: &str,
        #[case] tool_name: &str,
        #[case] arguments_xml: &str,
    ) {
        let original = ParsedToolCall {
            server_name: server_name.to_string(),
            tool_name: tool_name.to_string(),
            arguments_xml: arguments_xml.to_string(),
        };
        let reparsed = parse_tool_call(&original.to_xml()).expect("normalized form must parse");
        assert_eq!(reparsed, original);
    }

    #[test]
    fn missing_root_tool_element_is_malformed() {
        let xml = "<tool_name>x</tool_name>";
        let err = parse_tool_call(xml).unwrap_err();
        assert_eq!(err.kind, XmlErrorKind::MalformedXml);
    }

    /// Spec §6.4(b): "CDATA may not contain `]]>`". There is no escaping
    /// mechanism for it, so a CDATA section that tries to embed `]]>`
    /// simply ends at the first occurrence — demonstrated here rather than
    /// asserted as an error, since the XML itself makes the violation
    /// structurally impossible to represent.
    #[test]
    fn cdata_cannot_carry_its_own_terminator() {
        let xml = "<tool><tool_name>x</tool_name><arguments><data><![CDATA[a]]>leftover</data></arguments></tool>";
        let parsed = parse_tool_call(xml).unwrap();
        assert_eq!(parsed.arguments_xml, "<data><![CDATA[a]]>leftover</data>");
    }
}
