//! Partial `<tool_name>` extraction used while a tool-call is still
//! streaming in (spec §4.5: "partial name extractor").
//!
//! Returns `Some(name)` only once a *complete*, single-text-node
//! `<tool_name>...</tool_name>` element has arrived in the prefix; `None`
//! otherwise, including when the element is still open or contains nested
//! elements (ambiguous — left to the full parser to report precisely).

use quick_xml::Reader;
use quick_xml::events::Event;

pub fn partial_tool_name(prefix: &str) -> Option<String> {
    let mut reader = Reader::from_str(prefix);
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = false;

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => return None,
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"tool_name" => {
                return read_single_text_node(&mut reader);
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"tool_name" => {
                return Some(String::new());
            }
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

fn read_single_text_node(reader: &mut Reader<&[u8]>) -> Option<String> {
    let mut text = String::new();
    let mut saw_nested = false;

    loop {
        match reader.read_event() {
            Ok(Event::End(e)) if e.local_name().as_ref() == b"tool_name" => {
                return if saw_nested {
                    None
                } else {
                    Some(text.trim().to_string())
                };
            }
            Ok(Event::Text(t)) => {
                if let Ok(unescaped) = t.unescape() {
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(t)) => {
                text.push_str(&String::from_utf8_lossy(&t.into_inner()));
            }
            Ok(Event::Start(_)) | Ok(Event::Empty(_)) => {
                saw_nested = true;
            }
            // Ran out of input (or hit EOF) before </tool_name> arrived —
            // the element is still being streamed.
            Ok(Event::Eof) => return None,
            Ok(_) => {}
            Err(_) => return None,
        }
    }
}
