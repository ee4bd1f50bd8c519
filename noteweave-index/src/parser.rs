//! Front matter and title extraction for markdown documents.
//!
//! Front matter is an optional YAML block delimited by `---` lines. Parsing
//! never fails: a malformed block is treated as absent.

use serde::Deserialize;

use crate::links::extract_wiki_links;
use crate::normalize::compose;

/// Typed view of the front matter fields the index cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFrontMatter {
    #[serde(default)]
    title: Option<serde_yaml::Value>,
    #[serde(default)]
    tags: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub front: FrontMatter,
    pub title: String,
    pub tags: Vec<String>,
    pub links: Vec<String>,
}

/// Parse a document. `fallback_title` is used when neither front matter nor
/// a heading declares a title (normally the filename stem).
pub fn parse_document(raw: &str, fallback_title: &str) -> ParsedDocument {
    let (front, body) = match split_front_matter(raw) {
        Some((yaml, body)) => (parse_front_matter(yaml), body),
        None => (FrontMatter::default(), raw),
    };
    let title = front
        .title
        .clone()
        .or_else(|| first_heading(body))
        .unwrap_or_else(|| compose(fallback_title.trim()));
    let tags = front.tags.clone();
    let links = extract_wiki_links(body);

    ParsedDocument {
        front,
        title,
        tags,
        links,
    }
}

/// Title declared by the content itself (front matter, then first heading).
pub fn declared_title(raw: &str) -> Option<String> {
    match split_front_matter(raw) {
        Some((yaml, body)) => parse_front_matter(yaml).title.or_else(|| first_heading(body)),
        None => first_heading(raw),
    }
}

/// Tags declared in front matter.
pub fn parse_tags(raw: &str) -> Vec<String> {
    split_front_matter(raw)
        .map(|(yaml, _)| parse_front_matter(yaml).tags)
        .unwrap_or_default()
}

/// Split `raw` into (front matter YAML, body). Returns `None` when there is no
/// well-formed block.
pub fn split_front_matter(raw: &str) -> Option<(&str, &str)> {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let first_end = text.find('\n')?;
    if text[..first_end].trim_end() != "---" {
        return None;
    }

    let yaml_start = first_end + 1;
    let mut offset = yaml_start;
    for line in text[yaml_start..].split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            let yaml = &text[yaml_start..offset];
            let body = &text[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

fn parse_front_matter(yaml: &str) -> FrontMatter {
    if yaml.trim().is_empty() {
        return FrontMatter::default();
    }
    let raw: RawFrontMatter = match serde_yaml::from_str(yaml) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::debug!("ignoring malformed front matter: {err}");
            return FrontMatter::default();
        }
    };

    let title = raw
        .title
        .as_ref()
        .and_then(scalar_to_string)
        .map(|title| compose(title.trim()))
        .filter(|title| !title.is_empty());

    let mut tags: Vec<String> = Vec::new();
    let candidates: Vec<String> = match raw.tags {
        Some(serde_yaml::Value::Sequence(items)) => {
            items.iter().filter_map(scalar_to_string).collect()
        }
        Some(serde_yaml::Value::String(text)) => {
            text.split([',', ' ']).map(str::to_string).collect()
        }
        Some(other) => scalar_to_string(&other).into_iter().collect(),
        None => Vec::new(),
    };
    for candidate in candidates {
        let tag = compose(candidate.trim().trim_start_matches('#').trim());
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    FrontMatter { title, tags }
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn first_heading(body: &str) -> Option<String> {
    let mut in_fence = false;
    for line in body.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("# ") {
            let heading = compose(rest.trim().trim_end_matches('#').trim());
            if !heading.is_empty() {
                return Some(heading);
            }
        }
    }
    None
}

/// Make the content declare `title`, rewriting or inserting the front matter
/// `title:` line. Content that already declares exactly `title` is returned
/// unchanged.
pub fn upsert_title(raw: &str, title: &str) -> String {
    if declared_title(raw).as_deref() == Some(title) {
        return raw.to_string();
    }
    let title_line = format!("title: {}", quote_yaml(title));

    let Some((yaml, body)) = split_front_matter(raw) else {
        return format!("---\n{title_line}\n---\n\n{raw}");
    };

    let mut replaced = false;
    let mut lines: Vec<String> = Vec::new();
    for line in yaml.lines() {
        if !replaced && is_title_key(line) {
            lines.push(title_line.clone());
            replaced = true;
        } else {
            lines.push(line.to_string());
        }
    }
    if !replaced {
        lines.insert(0, title_line);
    }
    format!("---\n{}\n---\n{}", lines.join("\n"), body)
}

fn is_title_key(line: &str) -> bool {
    line.strip_prefix("title")
        .map(|rest| rest.trim_start().starts_with(':'))
        .unwrap_or(false)
}

fn quote_yaml(value: &str) -> String {
    // JSON strings are valid YAML double-quoted scalars.
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value.replace('"', "'")))
}
