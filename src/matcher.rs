// Tree search over the foreground UI tree. All searches are synchronous,
// in-memory walks; nothing here touches the platform.

use crate::ui_tree::UiNode;
use regex::Regex;

/// Pure predicate over a single node. Kept as tagged values so each variant
/// can be unit-tested apart from the traversal.
#[derive(Debug, Clone)]
pub enum MatchPredicate {
    /// Case-insensitive containment against the node's text or description.
    TextOrDescContains { needle: String },
    /// Regex over the node's description (preferred) or text. The node must
    /// also be clickable, since the matched node is the one that gets the
    /// click. Neither field populated is matched as the empty string.
    LinkPattern { pattern: Regex },
    /// Clickable container row: class in the allowed set, enough children,
    /// visible to the user. `depth_limit` bounds the ancestor walk that
    /// resolves a text hit into its enclosing row.
    StructuralRow {
        min_children: usize,
        allowed_classes: Vec<String>,
        depth_limit: usize,
    },
}

impl MatchPredicate {
    pub fn text_or_desc(needle: &str) -> Self {
        Self::TextOrDescContains {
            needle: needle.to_string(),
        }
    }

    pub fn matches(&self, node: &UiNode) -> bool {
        match self {
            Self::TextOrDescContains { needle } => {
                let needle = needle.to_lowercase();
                let text_hit = node
                    .text()
                    .map(|t| t.to_lowercase().contains(&needle))
                    .unwrap_or(false);
                let desc_hit = node
                    .description()
                    .map(|d| d.to_lowercase().contains(&needle))
                    .unwrap_or(false);
                text_hit || desc_hit
            }
            Self::LinkPattern { pattern } => {
                let content = node.description().or_else(|| node.text()).unwrap_or("");
                pattern.is_match(content) && node.is_clickable()
            }
            Self::StructuralRow {
                min_children,
                allowed_classes,
                ..
            } => {
                let class_ok = node
                    .class_name()
                    .map(|c| allowed_classes.iter().any(|allowed| c.contains(allowed)))
                    .unwrap_or(false);
                node.is_clickable()
                    && class_ok
                    && node.child_count() >= *min_children
                    && node.is_visible_to_user()
            }
        }
    }
}

/// Pre-order depth-first search; returns the first node satisfying the
/// closure and evaluates nothing after the hit.
pub fn find_first_where<F>(root: &UiNode, predicate: &F) -> Option<UiNode>
where
    F: Fn(&UiNode) -> bool,
{
    if predicate(root) {
        return Some(root.clone());
    }
    for child in root.children() {
        if let Some(hit) = find_first_where(&child, predicate) {
            return Some(hit);
        }
    }
    None
}

pub fn find_first(root: &UiNode, predicate: &MatchPredicate) -> Option<UiNode> {
    find_first_where(root, &|node| predicate.matches(node))
}

/// Walk upward through parent links, testing `start` itself first. Returns
/// the nearest qualifying ancestor; gives up after `depth_limit` hops or
/// when the parent chain runs out.
pub fn find_ancestor_where<F>(start: &UiNode, depth_limit: usize, predicate: &F) -> Option<UiNode>
where
    F: Fn(&UiNode) -> bool,
{
    let mut current = Some(start.clone());
    let mut depth = 0;
    while let Some(node) = current {
        if depth >= depth_limit {
            return None;
        }
        if predicate(&node) {
            return Some(node);
        }
        current = node.parent();
        depth += 1;
    }
    None
}

/// Every node whose visible text contains `text`, case-insensitively, in
/// traversal order. Mirrors the host platform's text lookup primitive.
pub fn find_all_by_text(root: &UiNode, text: &str) -> Vec<UiNode> {
    let needle = text.to_lowercase();
    let mut hits = Vec::new();
    collect_by_text(root, &needle, &mut hits);
    hits
}

fn collect_by_text(node: &UiNode, needle: &str, hits: &mut Vec<UiNode>) {
    if let Some(text) = node.text() {
        if text.to_lowercase().contains(needle) {
            hits.push(node.clone());
        }
    }
    for child in node.children() {
        collect_by_text(&child, needle, hits);
    }
}
