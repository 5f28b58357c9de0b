/// One node of the navigation tree reported by the rendering engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEntry {
    pub id: String,
    pub label: String,
    pub target_locator: String,
    pub depth: usize,
    pub children: Vec<NavigationEntry>,
}

impl NavigationEntry {
    pub fn new(id: impl Into<String>, label: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            target_locator: target.into(),
            depth: 0,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<NavigationEntry>) -> Self {
        self.children = children;
        self
    }
}

/// A navigation entry projected into the flat chapter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedTocEntry {
    pub id: String,
    pub label: String,
    pub target_locator: String,
    pub depth: usize,
}

/// Flattens the navigation tree in pre-order.
///
/// Depth is derived from nesting (top level is 0) rather than taken from the
/// entries themselves, so engines that leave `depth` unset still produce a
/// correctly indented list.
pub fn flatten(tree: &[NavigationEntry]) -> Vec<FlattenedTocEntry> {
    let mut out = Vec::with_capacity(count_nodes(tree));
    flatten_into(tree, 0, &mut out);
    out
}

fn flatten_into(entries: &[NavigationEntry], depth: usize, out: &mut Vec<FlattenedTocEntry>) {
    for entry in entries {
        out.push(FlattenedTocEntry {
            id: entry.id.clone(),
            label: entry.label.clone(),
            target_locator: entry.target_locator.clone(),
            depth,
        });
        flatten_into(&entry.children, depth + 1, out);
    }
}

pub fn count_nodes(tree: &[NavigationEntry]) -> usize {
    tree.iter().map(|e| 1 + count_nodes(&e.children)).sum()
}

/// Drops the intra-document fragment: everything from the first `#` on.
pub fn normalize_locator(locator: &str) -> &str {
    match locator.split_once('#') {
        Some((document, _)) => document,
        None => locator,
    }
}

/// Title of the chapter whose normalized locator equals the normalized
/// `locator`, or an empty string when nothing matches exactly.
pub fn resolve_chapter_title(locator: &str, entries: &[FlattenedTocEntry]) -> String {
    let target = normalize_locator(locator);
    if target.is_empty() {
        return String::new();
    }

    entries
        .iter()
        .find(|entry| normalize_locator(&entry.target_locator) == target)
        .map(|entry| entry.label.trim().to_string())
        .unwrap_or_default()
}

/// Index of the entry a locator belongs to, used to highlight the active row.
pub fn find_entry_index(locator: &str, entries: &[FlattenedTocEntry]) -> Option<usize> {
    let target = normalize_locator(locator);
    if target.is_empty() {
        return None;
    }
    entries
        .iter()
        .position(|entry| normalize_locator(&entry.target_locator) == target)
}
