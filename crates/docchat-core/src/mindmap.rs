//! Mind maps of the loaded documents.
//!
//! A mind map is a small tree: a title, a handful of themes, each with
//! subtopics and optionally details beneath them. The model is asked for
//! JSON in this shape (see [`AnalysisKind::MindMap`](crate::prompt::AnalysisKind::MindMap)):
//!
//! ```json
//! {"title": "...", "themes": [{"name": "...", "summary": "...", "sub_themes": [...]}]}
//! ```
//!
//! Replies are rarely clean. [`parse_mind_map`] recovers a tree in three
//! steps, stopping at the first that succeeds:
//!
//! | Step | Handles |
//! |------|---------|
//! | Strict JSON | The object as written, with surrounding prose or code fences cut away |
//! | Repaired JSON | Trailing commas, unquoted keys, single quotes, truncated output |
//! | Outline | Markdown headings, numbered lines, and bullets in the reply text |
//!
//! When none of them yields a theme, the map holds a single placeholder
//! theme, so callers always get something to render.
//!
//! [`MindMap::to_mermaid`] and [`MindMap::to_markdown`] export the tree.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const MAX_NAME_CHARS: usize = 100;
const MAX_SUMMARY_CHARS: usize = 200;
/// Themes, subtopics, details.
const MAX_DEPTH: usize = 3;
const MAX_OUTLINE_THEMES: usize = 6;
const MAX_OUTLINE_SUBTOPICS: usize = 4;
const MERMAID_TITLE_CHARS: usize = 35;
const MERMAID_NODE_CHARS: usize = 25;
const PLACEHOLDER_THEME: &str = "Document Analysis";
const PLACEHOLDER_SUMMARY: &str = "Key insights from the document";

/// Keys accepted for a node's children, in order of preference.
const CHILD_KEYS: [&str; 4] = ["sub_themes", "subtopics", "children", "details"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindMapNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_themes: Vec<MindMapNode>,
}

impl MindMapNode {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: String::new(),
            sub_themes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindMap {
    pub title: String,
    pub themes: Vec<MindMapNode>,
}

/// Which recovery step produced a [`MindMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MindMapSource {
    Json,
    RepairedJson,
    Outline,
    Placeholder,
}

/// Default title for a map over `filenames`.
pub fn mind_map_title(filenames: &[&str]) -> String {
    match filenames {
        [] => "Document Mind Map".to_string(),
        [one] => format!("Mind Map: {}", one),
        many => format!("Mind Map: {} Documents", many.len()),
    }
}

/// Recover a mind map from a model reply. `title` is used when the reply
/// does not carry one.
pub fn parse_mind_map(reply: &str, title: &str) -> (MindMap, MindMapSource) {
    if let Some(body) = json_body(reply) {
        if let Some(map) = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| tree_from_value(&v, title))
        {
            return (map, MindMapSource::Json);
        }
        let repaired = repair_json(body);
        match serde_json::from_str::<Value>(&repaired) {
            Ok(v) => {
                if let Some(map) = tree_from_value(&v, title) {
                    return (map, MindMapSource::RepairedJson);
                }
            }
            Err(e) => debug!(error = %e, "mind map JSON unrecoverable"),
        }
    }

    if let Some(map) = tree_from_outline(reply, title) {
        return (map, MindMapSource::Outline);
    }

    let mut theme = MindMapNode::leaf(PLACEHOLDER_THEME);
    let flat = reply.split_whitespace().collect::<Vec<_>>().join(" ");
    theme.summary = if flat.is_empty() {
        PLACEHOLDER_SUMMARY.to_string()
    } else {
        truncate(&flat, MAX_SUMMARY_CHARS)
    };
    (
        MindMap {
            title: title.to_string(),
            themes: vec![theme],
        },
        MindMapSource::Placeholder,
    )
}

/// The span from the first `{` to the last `}`, or to the end of the reply
/// when the closing brace never arrived.
fn json_body(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let rest = &reply[start..];
    Some(match rest.rfind('}') {
        Some(end) => &rest[..=end],
        None => rest.trim_end().trim_end_matches('`').trim_end(),
    })
}

/// Best-effort rewrite of almost-JSON into JSON.
///
/// Works in one pass outside string literals: drops commas before a
/// closer, quotes bare keys, converts single-quoted strings, discards
/// stray closers, and finally closes any open string, object, or array.
fn repair_json(body: &str) -> String {
    let chars: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(body.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            match c {
                '\\' if i + 1 < chars.len() => {
                    if q == '\'' && chars[i + 1] == '\'' {
                        out.push('\'');
                    } else {
                        out.push(c);
                        out.push(chars[i + 1]);
                    }
                    i += 2;
                    continue;
                }
                '"' if q == '\'' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                _ if c == q => {
                    out.push('"');
                    quote = None;
                }
                _ => out.push(c),
            }
            i += 1;
            continue;
        }

        match c {
            '"' | '\'' => {
                out.push('"');
                quote = Some(c);
            }
            '{' => {
                out.push(c);
                closers.push('}');
            }
            '[' => {
                out.push(c);
                closers.push(']');
            }
            '}' | ']' => {
                if closers.contains(&c) {
                    // Close anything left open inside this container first.
                    while let Some(expected) = closers.pop() {
                        drop_trailing_comma(&mut out);
                        out.push(expected);
                        if expected == c {
                            break;
                        }
                    }
                }
            }
            c if (c.is_ascii_alphabetic() || c == '_') && expects_key(&out) => {
                let end = chars[i..]
                    .iter()
                    .position(|ch| !(ch.is_ascii_alphanumeric() || *ch == '_'))
                    .map_or(chars.len(), |p| i + p);
                let word: String = chars[i..end].iter().collect();
                let next = chars[end..].iter().find(|ch| !ch.is_whitespace());
                if next == Some(&':') {
                    out.push('"');
                    out.push_str(&word);
                    out.push('"');
                } else {
                    out.push_str(&word);
                }
                i = end;
                continue;
            }
            _ => out.push(c),
        }
        i += 1;
    }

    if quote.is_some() {
        out.push('"');
    }
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    if out.ends_with(':') {
        out.push_str(" null");
    }
    while let Some(closer) = closers.pop() {
        drop_trailing_comma(&mut out);
        out.push(closer);
    }
    out
}

fn drop_trailing_comma(out: &mut String) {
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    if out.ends_with(',') {
        out.pop();
    }
}

/// True when the next token in an object would be a key.
fn expects_key(out: &str) -> bool {
    matches!(out.trim_end().chars().last(), Some('{') | Some(','))
}

fn tree_from_value(value: &Value, title: &str) -> Option<MindMap> {
    let (title, themes) = match value {
        Value::Object(obj) => {
            let themes = obj.get("themes").and_then(Value::as_array)?;
            let title = obj
                .get("title")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(title);
            (title, themes)
        }
        Value::Array(items) => (title, items),
        _ => return None,
    };

    let mut themes: Vec<MindMapNode> = themes
        .iter()
        .enumerate()
        .filter_map(|(i, v)| node_from_value(v, &format!("Theme {}", i + 1), 1))
        .collect();
    if themes.is_empty() {
        let mut theme = MindMapNode::leaf(PLACEHOLDER_THEME);
        theme.summary = PLACEHOLDER_SUMMARY.to_string();
        themes.push(theme);
    }

    Some(MindMap {
        title: truncate(title, MAX_NAME_CHARS),
        themes,
    })
}

fn node_from_value(value: &Value, default_name: &str, depth: usize) -> Option<MindMapNode> {
    let obj = match value {
        Value::String(s) if !s.trim().is_empty() => {
            return Some(MindMapNode::leaf(truncate(s.trim(), MAX_NAME_CHARS)));
        }
        Value::Object(obj) => obj,
        _ => return None,
    };

    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    let name = text("name")
        .or_else(|| text("title"))
        .unwrap_or(default_name);
    let summary = text("summary").or_else(|| text("description")).unwrap_or("");

    let sub_themes = if depth < MAX_DEPTH {
        CHILD_KEYS
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_array))
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| node_from_value(v, &format!("Subtopic {}", i + 1), depth + 1))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    Some(MindMapNode {
        name: truncate(name, MAX_NAME_CHARS),
        summary: truncate(summary, MAX_SUMMARY_CHARS),
        sub_themes,
    })
}

enum OutlineLine<'a> {
    Heading(&'a str),
    Bullet(&'a str),
    Text(&'a str),
}

fn classify(line: &str) -> OutlineLine<'_> {
    if line.starts_with('#') {
        return OutlineLine::Heading(line.trim_start_matches('#'));
    }
    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return OutlineLine::Bullet(rest);
        }
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return OutlineLine::Heading(rest);
        }
    }
    if line.len() > 4 && line.starts_with("**") && line.trim_end_matches(':').ends_with("**") {
        return OutlineLine::Heading(line);
    }
    OutlineLine::Text(line)
}

/// Strip emphasis and a trailing colon from an outline label.
fn clean_label(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(':')
        .trim_matches('*')
        .trim()
        .trim_end_matches(':')
        .trim()
        .to_string()
}

/// Build a tree from headings and bullets: headings and numbered lines
/// become themes, bullets become subtopics of the theme above them, and
/// the first plain line under a theme becomes its summary.
fn tree_from_outline(reply: &str, title: &str) -> Option<MindMap> {
    let mut themes: Vec<MindMapNode> = Vec::new();
    // Set after a theme is dropped so its bullets are dropped too.
    let mut skipping = false;

    for line in reply.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match classify(line) {
            OutlineLine::Heading(raw) => {
                let label = clean_label(raw);
                if label.chars().count() < 3 {
                    continue;
                }
                skipping = themes.len() >= MAX_OUTLINE_THEMES;
                if !skipping {
                    themes.push(MindMapNode::leaf(truncate(&label, MAX_NAME_CHARS)));
                }
            }
            OutlineLine::Bullet(raw) => {
                let label = clean_label(raw);
                if label.is_empty() || skipping {
                    continue;
                }
                match themes.last_mut() {
                    Some(theme) => {
                        if theme.sub_themes.len() < MAX_OUTLINE_SUBTOPICS {
                            theme.sub_themes.push(MindMapNode::leaf(truncate(&label, MAX_NAME_CHARS)));
                        }
                    }
                    None => themes.push(MindMapNode::leaf(truncate(&label, MAX_NAME_CHARS))),
                }
            }
            OutlineLine::Text(text) => {
                if let Some(theme) = themes.last_mut() {
                    if !skipping && theme.summary.is_empty() && theme.sub_themes.is_empty() {
                        theme.summary = truncate(text, MAX_SUMMARY_CHARS);
                    }
                }
            }
        }
    }

    (!themes.is_empty()).then(|| MindMap {
        title: title.to_string(),
        themes,
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}

fn mermaid_label(text: &str, max_chars: usize) -> String {
    truncate(&text.split_whitespace().collect::<Vec<_>>().join(" "), max_chars).replace('"', "'")
}

impl MindMap {
    /// Mermaid `graph TD` flowchart. Node ids follow the tree path
    /// (`N2_1` is the first subtopic of the second theme), so they never
    /// collide.
    pub fn to_mermaid(&self) -> String {
        let mut lines = vec![
            "graph TD".to_string(),
            format!("    Root[\"{}\"]", mermaid_label(&self.title, MERMAID_TITLE_CHARS)),
        ];
        for (i, theme) in self.themes.iter().enumerate() {
            push_mermaid(&mut lines, theme, "Root", &format!("N{}", i + 1));
        }
        lines.join("\n")
    }

    /// Markdown outline: the title as `#`, themes as `##`, one level deeper
    /// per generation, summaries as paragraphs.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n", self.title);
        for theme in &self.themes {
            push_markdown(&mut out, theme, 2);
        }
        out.trim_end().to_string()
    }
}

fn push_mermaid(lines: &mut Vec<String>, node: &MindMapNode, parent: &str, id: &str) {
    lines.push(format!("    {}[\"{}\"]", id, mermaid_label(&node.name, MERMAID_NODE_CHARS)));
    lines.push(format!("    {} --> {}", parent, id));
    for (i, child) in node.sub_themes.iter().enumerate() {
        push_mermaid(lines, child, id, &format!("{}_{}", id, i + 1));
    }
}

fn push_markdown(out: &mut String, node: &MindMapNode, level: usize) {
    out.push('\n');
    out.push_str(&"#".repeat(level.min(6)));
    out.push(' ');
    out.push_str(&node.name);
    out.push('\n');
    if !node.summary.is_empty() {
        out.push('\n');
        out.push_str(&node.summary);
        out.push('\n');
    }
    for child in &node.sub_themes {
        push_markdown(out, child, level + 1);
    }
}
