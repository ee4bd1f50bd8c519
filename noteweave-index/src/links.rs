use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::normalize::{compose, normalize};

static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\[\]\n]+)\]\]").expect("wikilink regex"));

static FENCED_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[^\n]*\n.*?```|~~~[^\n]*\n.*?~~~").expect("fenced code regex")
});

static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`\n]*`").expect("inline code regex"));

/// A wikilink occurrence with the byte span of its target.
///
/// `target_start`/`target_len` cover the text between `[[` and the first `#`,
/// `|` or `]]`, which is the part replaced during a rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLinkOccurrence {
    pub target: String,
    pub target_start: usize,
    pub target_len: usize,
}

/// A text edit: replace `remove_len` bytes at `offset` with `insert_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub offset: usize,
    pub remove_len: usize,
    pub insert_text: String,
}

fn excluded_ranges(markdown: &str) -> Vec<(usize, usize)> {
    FENCED_CODE_RE
        .find_iter(markdown)
        .chain(INLINE_CODE_RE.find_iter(markdown))
        .map(|m| (m.start(), m.end()))
        .collect()
}

/// Every `[[...]]` outside code, with the byte span of its target.
pub fn wiki_link_occurrences(markdown: &str) -> Vec<WikiLinkOccurrence> {
    let excluded = excluded_ranges(markdown);
    let mut occurrences = Vec::new();

    for cap in WIKILINK_RE.captures_iter(markdown) {
        let (Some(whole), Some(inner)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        if excluded
            .iter()
            .any(|&(start, end)| whole.start() >= start && whole.start() < end)
        {
            continue;
        }

        let content = inner.as_str();
        let target_len = content.find(['#', '|']).unwrap_or(content.len());
        let raw_target = &content[..target_len];
        let target = raw_target.trim();
        if target.is_empty() {
            continue;
        }

        // Span of the trimmed target inside the brackets.
        let leading = raw_target.len() - raw_target.trim_start().len();
        occurrences.push(WikiLinkOccurrence {
            target: compose(target),
            target_start: inner.start() + leading,
            target_len: target.len(),
        });
    }

    occurrences
}

/// Link targets referenced by `markdown`, NFC-composed, de-duplicated by
/// identity, in first-occurrence order. Aliases and heading anchors are
/// stripped; links inside code are ignored.
pub fn extract_wiki_links(markdown: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    wiki_link_occurrences(markdown)
        .into_iter()
        .filter(|occ| seen.insert(normalize(&occ.target)))
        .map(|occ| occ.target)
        .collect()
}

/// Edits retargeting every link to `old_title` at `new_title`, keeping alias
/// and heading suffixes. Returned in reverse offset order so they can be
/// applied sequentially.
pub fn compute_rename_edits(markdown: &str, old_title: &str, new_title: &str) -> Vec<TextEdit> {
    let old_key = normalize(old_title);
    let mut edits: Vec<TextEdit> = wiki_link_occurrences(markdown)
        .into_iter()
        .filter(|occ| normalize(&occ.target) == old_key)
        .map(|occ| TextEdit {
            offset: occ.target_start,
            remove_len: occ.target_len,
            insert_text: new_title.to_string(),
        })
        .collect();

    edits.sort_by(|a, b| b.offset.cmp(&a.offset));
    edits
}

pub fn apply_edits(markdown: &str, edits: &[TextEdit]) -> String {
    let mut text = markdown.to_string();
    for edit in edits {
        text.replace_range(edit.offset..edit.offset + edit.remove_len, &edit.insert_text);
    }
    text
}

/// Rewrite links to `old_title`. Returns `None` when nothing references it.
pub fn rewrite_links(markdown: &str, old_title: &str, new_title: &str) -> Option<String> {
    let edits = compute_rename_edits(markdown, old_title, new_title);
    if edits.is_empty() {
        None
    } else {
        Some(apply_edits(markdown, &edits))
    }
}

/// Backlink map over a set of documents: normalized title -> display titles
/// of the documents linking to it.
///
/// Every input document gets an entry (possibly empty). Scope is decided by
/// the caller through the document subset it passes in.
pub fn calculate_backlinks<'a, I>(documents: I) -> HashMap<String, Vec<String>>
where
    I: IntoIterator<Item = (&'a str, &'a [String])>,
{
    let documents: Vec<(&str, &[String])> = documents.into_iter().collect();
    let mut backlinks: HashMap<String, Vec<String>> = documents
        .iter()
        .map(|(title, _)| (normalize(title), Vec::new()))
        .collect();

    for (source, links) in &documents {
        for link in links.iter() {
            let sources = backlinks.entry(normalize(link)).or_default();
            if !sources.iter().any(|existing| existing == source) {
                sources.push(source.to_string());
            }
        }
    }

    backlinks
}
