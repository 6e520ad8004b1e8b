//! Output serialization for assembled context.
//!
//! Assembly produces an ordered list of rendered sections; serialization is
//! a pure transform over that list. Content and ordering are identical
//! across all three formats.

use serde::{Deserialize, Serialize};

use crate::budget::SectionKey;

/// Serialization format for assembled context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextFormat {
    /// Markdown with one `##` heading per section.
    #[default]
    Markdown,
    /// JSON array of `{key, lines}` objects.
    Json,
    /// XML with one `<section id="…">` element per section.
    Xml,
}

/// One section's rendered content, in assembly order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedSection {
    /// Section key.
    pub key: SectionKey,
    /// Rendered content lines.
    pub lines: Vec<String>,
}

/// Serialize rendered sections into the requested format.
#[must_use]
pub fn serialize_sections(sections: &[RenderedSection], format: ContextFormat) -> String {
    match format {
        ContextFormat::Markdown => to_markdown(sections),
        ContextFormat::Json => to_json(sections),
        ContextFormat::Xml => to_xml(sections),
    }
}

fn to_markdown(sections: &[RenderedSection]) -> String {
    sections
        .iter()
        .map(|section| format!("## {}\n{}", section.key, section.lines.join("\n")))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn to_json(sections: &[RenderedSection]) -> String {
    // RenderedSection serializes to exactly {key, lines}.
    serde_json::to_string(sections).unwrap_or_else(|_| "[]".to_owned())
}

fn to_xml(sections: &[RenderedSection]) -> String {
    let mut out = String::from("<context>\n");
    for section in sections {
        out.push_str(&format!("  <section id=\"{}\">\n", section.key));
        for line in &section.lines {
            out.push_str("    ");
            out.push_str(&escape_xml(line));
            out.push('\n');
        }
        out.push_str("  </section>\n");
    }
    out.push_str("</context>");
    out
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
