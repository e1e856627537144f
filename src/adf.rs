//! Atlassian Document Format conversion.
//!
//! JIRA Cloud (REST v3) takes and returns rich text such as comment bodies and
//! issue descriptions as ADF JSON rather than plain strings. Only the subset
//! needed for plain text is produced here; reading is tolerant of any node.

use serde_json::{json, Value};

/// Convert plain text into an ADF document.
///
/// Blank-line separated blocks become paragraphs and single newlines inside a
/// block become `hardBreak` nodes.
pub fn text_to_adf(text: &str) -> Value {
    let normalized = text.replace("\r\n", "\n");
    let content: Vec<Value> = normalized
        .split("\n\n")
        .map(|block| block.trim_matches('\n'))
        .filter(|block| !block.trim().is_empty())
        .map(paragraph)
        .collect();

    json!({
        "type": "doc",
        "version": 1,
        "content": content,
    })
}

fn paragraph(block: &str) -> Value {
    let mut nodes = Vec::new();
    for (i, line) in block.split('\n').enumerate() {
        if i > 0 {
            nodes.push(json!({ "type": "hardBreak" }));
        }
        if !line.is_empty() {
            nodes.push(json!({ "type": "text", "text": line }));
        }
    }
    json!({ "type": "paragraph", "content": nodes })
}

/// Flatten an ADF document (or any ADF node) into plain text.
///
/// Plain JSON strings are returned unchanged, which covers JIRA Server
/// instances that still answer with wiki-markup strings.
pub fn adf_to_text(node: &Value) -> String {
    if let Some(s) = node.as_str() {
        return s.to_string();
    }
    let mut out = String::new();
    render(node, &mut out);
    out.trim_end().to_string()
}

fn render(node: &Value, out: &mut String) {
    let kind = node.get("type").and_then(Value::as_str).unwrap_or("");
    match kind {
        "text" => {
            if let Some(t) = node.get("text").and_then(Value::as_str) {
                out.push_str(t);
            }
        }
        "hardBreak" => out.push('\n'),
        "mention" => {
            let name = node
                .pointer("/attrs/text")
                .and_then(Value::as_str)
                .unwrap_or("");
            if name.starts_with('@') {
                out.push_str(name);
            } else {
                out.push('@');
                out.push_str(name);
            }
        }
        "emoji" => {
            if let Some(t) = node.pointer("/attrs/text").and_then(Value::as_str) {
                out.push_str(t);
            }
        }
        "paragraph" | "heading" | "codeBlock" | "blockquote" => {
            render_children(node, out);
            out.push_str("\n\n");
        }
        "listItem" => {
            out.push_str("- ");
            let mut item = String::new();
            render_children(node, &mut item);
            out.push_str(item.trim_end());
            out.push('\n');
        }
        "bulletList" | "orderedList" => {
            render_children(node, out);
            out.push('\n');
        }
        "rule" => out.push_str("---\n\n"),
        _ => render_children(node, out),
    }
}

fn render_children(node: &Value, out: &mut String) {
    if let Some(children) = node.get("content").and_then(Value::as_array) {
        for child in children {
            render(child, out);
        }
    }
}
