use std::collections::BTreeSet;

/// Union of every document's front matter tags.
///
/// Grows incrementally on create/update. Deletes cannot subtract safely, so
/// callers replace the whole set from a rescan instead.
#[derive(Debug, Default)]
pub struct TagUniverse {
    tags: BTreeSet<String>,
}

impl TagUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            let tag = tag.as_ref().trim();
            if !tag.is_empty() {
                self.tags.insert(tag.to_string());
            }
        }
    }

    pub fn replace<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags.clear();
        self.add_tags(tags);
    }

    pub fn get_tags(&self) -> Vec<String> {
        self.tags.iter().cloned().collect()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}
