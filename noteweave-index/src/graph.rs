//! In-memory link graph, patched one document at a time.
//!
//! Nodes are keyed by [`DocKey`] and links only resolve inside their own
//! folder. For any two nodes X and Y in a folder the following holds after
//! every public mutation:
//!
//! - `Y.back_links` contains X iff X's outgoing links contain Y;
//! - `X.neighbors` contains Y iff either links to the other.
//!
//! Outgoing links are never rewritten by another node's removal, so a link
//! to a missing title stays dangling until a document with that title shows up.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{DocKey, GraphEdge, GraphNodeView, GraphSnapshot};
use crate::normalize::normalize;
use crate::parser::parse_document;
use crate::paths::file_stem;

const MAX_SIZED_NEIGHBORS: usize = 16;
const TAG_PALETTE: [&str; 8] = [
    "#e11d48", "#7c3aed", "#2563eb", "#0891b2", "#059669", "#ca8a04", "#ea580c", "#db2777",
];
const BACKLINK_PALETTE: [&str; 4] = ["#9ca3af", "#60a5fa", "#34d399", "#f59e0b"];

#[derive(Debug, Clone)]
struct GraphNode {
    id: u64,
    title: String,
    filename: String,
    tags: Vec<String>,
    /// Link targets as written, first-occurrence order.
    links: Vec<String>,
    /// Normalized link targets.
    outgoing: BTreeSet<String>,
    /// Normalized titles of same-folder documents linking here.
    back_links: BTreeSet<String>,
    neighbors: BTreeSet<String>,
}

impl GraphNode {
    fn new(id: u64, title: &str, filename: &str, content: &str) -> Self {
        let parsed = parse_document(content, file_stem(filename));
        let outgoing = parsed.links.iter().map(|link| normalize(link)).collect();
        Self {
            id,
            title: title.to_string(),
            filename: filename.to_string(),
            tags: parsed.tags,
            links: parsed.links,
            outgoing,
            back_links: BTreeSet::new(),
            neighbors: BTreeSet::new(),
        }
    }
}

/// A document as read from disk, used for full rebuilds.
#[derive(Debug, Clone)]
pub struct GraphSource {
    pub folder: String,
    pub title: String,
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Default)]
pub struct LinkGraph {
    nodes: HashMap<DocKey, GraphNode>,
    next_id: u64,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything and rebuild from `sources`. Ids restart at zero.
    pub fn rebuild<I>(&mut self, sources: I)
    where
        I: IntoIterator<Item = GraphSource>,
    {
        self.nodes.clear();
        self.next_id = 0;

        for source in sources {
            let key = DocKey::new(&source.folder, &source.title);
            if self.nodes.contains_key(&key) {
                continue;
            }
            let id = self.allocate_id();
            self.nodes.insert(
                key,
                GraphNode::new(id, &source.title, &source.filename, &source.content),
            );
        }

        let edges: Vec<(DocKey, DocKey)> = self
            .nodes
            .iter()
            .flat_map(|(key, node)| {
                node.outgoing
                    .iter()
                    .map(|target| (key.clone(), DocKey {
                        folder: key.folder.clone(),
                        title: target.clone(),
                    }))
                    .collect::<Vec<_>>()
            })
            .filter(|(_, target)| self.nodes.contains_key(target))
            .collect();
        for (source, target) in edges {
            if let Some(node) = self.nodes.get_mut(&source) {
                node.neighbors.insert(target.title.clone());
            }
            if let Some(node) = self.nodes.get_mut(&target) {
                node.back_links.insert(source.title.clone());
                node.neighbors.insert(source.title);
            }
        }
    }

    /// Insert a document. Existing nodes whose links already point at this
    /// title gain their backlink edge now.
    pub fn add_document(&mut self, folder: &str, title: &str, filename: &str, content: &str) {
        let id = self.allocate_id();
        self.insert_node(folder, GraphNode::new(id, title, filename, content));
    }

    /// Re-read links from `content` and patch only the edges that changed.
    pub fn update_document(&mut self, folder: &str, title: &str, filename: &str, content: &str) {
        let key = DocKey::new(folder, title);
        let Some(node) = self.nodes.get_mut(&key) else {
            self.add_document(folder, title, filename, content);
            return;
        };

        let fresh = GraphNode::new(node.id, title, filename, content);
        let changed: Vec<String> = node
            .outgoing
            .symmetric_difference(&fresh.outgoing)
            .cloned()
            .collect();
        node.title = fresh.title;
        node.filename = fresh.filename;
        node.tags = fresh.tags;
        node.links = fresh.links;
        node.outgoing = fresh.outgoing;

        tracing::debug!(folder, title, changed = changed.len(), "graph node updated");
        for target in changed {
            self.sync_pair(folder, &key.title, &target);
        }
    }

    /// Remove a node and every edge pointing at it. Other nodes keep their
    /// outgoing links.
    pub fn remove_document(&mut self, folder: &str, title: &str) -> bool {
        let key = DocKey::new(folder, title);
        let removed = self.nodes.remove(&key).is_some();
        if removed {
            self.detach(&key);
        }
        removed
    }

    /// Move a node to a new title, retargeting every same-folder link to the
    /// old title instead of dropping it.
    pub fn rename_document(
        &mut self,
        folder: &str,
        old_title: &str,
        new_title: &str,
        filename: &str,
        content: &str,
    ) {
        let old_key = DocKey::new(folder, old_title);
        let new_key = DocKey::new(folder, new_title);
        if old_key == new_key {
            self.update_document(folder, new_title, filename, content);
            return;
        }

        let id = match self.nodes.remove(&old_key) {
            Some(node) => {
                self.detach(&old_key);
                node.id
            }
            None => self.allocate_id(),
        };

        for (key, node) in self.nodes.iter_mut() {
            if key.folder != folder || !node.outgoing.remove(&old_key.title) {
                continue;
            }
            node.outgoing.insert(new_key.title.clone());
            let mut seen = BTreeSet::new();
            node.links = node
                .links
                .iter()
                .map(|link| {
                    if normalize(link) == old_key.title {
                        new_title.to_string()
                    } else {
                        link.clone()
                    }
                })
                .filter(|link| seen.insert(normalize(link)))
                .collect();
        }

        self.insert_node(folder, GraphNode::new(id, new_title, filename, content));
        tracing::debug!(folder, old_title, new_title, "graph node renamed");
    }

    pub fn contains(&self, folder: &str, title: &str) -> bool {
        self.nodes.contains_key(&DocKey::new(folder, title))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Link targets of a document as written.
    pub fn links(&self, folder: &str, title: &str) -> Vec<String> {
        self.nodes
            .get(&DocKey::new(folder, title))
            .map(|node| node.links.clone())
            .unwrap_or_default()
    }

    /// Display titles of the same-folder documents linking to `title`.
    pub fn backlinks(&self, folder: &str, title: &str) -> Vec<String> {
        self.nodes
            .get(&DocKey::new(folder, title))
            .map(|node| self.display_titles(folder, &node.back_links))
            .unwrap_or_default()
    }

    pub fn neighbors(&self, folder: &str, title: &str) -> Vec<String> {
        self.nodes
            .get(&DocKey::new(folder, title))
            .map(|node| self.display_titles(folder, &node.neighbors))
            .unwrap_or_default()
    }

    /// `(title, links)` pairs for backlink calculation, limited to `folder`
    /// when given, ordered by folder then title.
    pub fn link_lists(&self, folder: Option<&str>) -> Vec<(String, Vec<String>)> {
        let mut entries: Vec<(&DocKey, &GraphNode)> = self
            .nodes
            .iter()
            .filter(|(key, _)| folder.is_none_or(|f| key.folder == f))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
            .into_iter()
            .map(|(_, node)| (node.title.clone(), node.links.clone()))
            .collect()
    }

    /// Render-ready snapshot. Presentation attributes are computed here and
    /// never stored.
    pub fn get_graph(&self) -> GraphSnapshot {
        let mut nodes = BTreeMap::new();
        let mut edges = BTreeSet::new();

        for (key, node) in &self.nodes {
            for target in &node.outgoing {
                if *target == key.title {
                    continue;
                }
                let target_key = DocKey {
                    folder: key.folder.clone(),
                    title: target.clone(),
                };
                if let Some(target_node) = self.nodes.get(&target_key) {
                    edges.insert(GraphEdge {
                        source: node.id,
                        target: target_node.id,
                    });
                }
            }

            nodes.insert(
                format!("{}/{}", key.folder, node.filename),
                GraphNodeView {
                    id: node.id,
                    title: node.title.clone(),
                    folder: key.folder.clone(),
                    filename: node.filename.clone(),
                    tags: node.tags.clone(),
                    neighbors: self.display_titles(&key.folder, &node.neighbors),
                    back_links: self.display_titles(&key.folder, &node.back_links),
                    size: node_size(node.neighbors.len()),
                    color: node_color(&node.tags, node.back_links.len()).to_string(),
                },
            );
        }

        GraphSnapshot {
            nodes,
            edges: edges.into_iter().collect(),
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert_node(&mut self, folder: &str, node: GraphNode) {
        let key = DocKey::new(folder, &node.title);
        let outgoing: Vec<String> = node.outgoing.iter().cloned().collect();
        if self.nodes.insert(key.clone(), node).is_some() {
            self.detach(&key);
        }

        let incoming: Vec<String> = self
            .nodes
            .iter()
            .filter(|(other, n)| other.folder == folder && n.outgoing.contains(&key.title))
            .map(|(other, _)| other.title.clone())
            .collect();

        for other in outgoing.iter().chain(incoming.iter()) {
            self.sync_pair(folder, &key.title, other);
        }
    }

    /// Remove `key` from the edge sets of its folder's nodes.
    fn detach(&mut self, key: &DocKey) {
        for (other, node) in self.nodes.iter_mut() {
            if other.folder == key.folder {
                node.back_links.remove(&key.title);
                node.neighbors.remove(&key.title);
            }
        }
    }

    /// Recompute the edge sets between two normalized titles in `folder` from
    /// their outgoing links.
    fn sync_pair(&mut self, folder: &str, a: &str, b: &str) {
        let key_a = DocKey {
            folder: folder.to_string(),
            title: a.to_string(),
        };
        let key_b = DocKey {
            folder: folder.to_string(),
            title: b.to_string(),
        };

        let a_links_b = self.nodes.get(&key_a).map(|n| n.outgoing.contains(b));
        let b_links_a = self.nodes.get(&key_b).map(|n| n.outgoing.contains(a));
        let (Some(a_links_b), Some(b_links_a)) = (a_links_b, b_links_a) else {
            // One side is missing: nothing resolves between them.
            for (key, other) in [(&key_a, b), (&key_b, a)] {
                if let Some(node) = self.nodes.get_mut(key) {
                    node.back_links.remove(other);
                    node.neighbors.remove(other);
                }
            }
            return;
        };

        let adjacent = a_links_b || b_links_a;
        if let Some(node) = self.nodes.get_mut(&key_a) {
            set_membership(&mut node.back_links, b, b_links_a);
            set_membership(&mut node.neighbors, b, adjacent);
        }
        if let Some(node) = self.nodes.get_mut(&key_b) {
            set_membership(&mut node.back_links, a, a_links_b);
            set_membership(&mut node.neighbors, a, adjacent);
        }
    }

    fn display_titles(&self, folder: &str, keys: &BTreeSet<String>) -> Vec<String> {
        keys.iter()
            .filter_map(|title| {
                self.nodes.get(&DocKey {
                    folder: folder.to_string(),
                    title: title.clone(),
                })
            })
            .map(|node| node.title.clone())
            .collect()
    }
}

fn set_membership(set: &mut BTreeSet<String>, value: &str, present: bool) {
    if present {
        set.insert(value.to_string());
    } else {
        set.remove(value);
    }
}

fn node_size(neighbors: usize) -> u32 {
    4 + 2 * neighbors.min(MAX_SIZED_NEIGHBORS) as u32
}

fn node_color(tags: &[String], backlinks: usize) -> &'static str {
    if let Some(tag) = tags.first() {
        return TAG_PALETTE[(fnv1a(tag.as_bytes()) % TAG_PALETTE.len() as u64) as usize];
    }
    match backlinks {
        0 => BACKLINK_PALETTE[0],
        1..=2 => BACKLINK_PALETTE[1],
        3..=5 => BACKLINK_PALETTE[2],
        _ => BACKLINK_PALETTE[3],
    }
}

/// FNV-1a, stable across runs and platforms.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
