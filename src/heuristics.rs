// Structural rules that separate a genuine chat row from a decoy cluster
// (e.g. an avatar region that is also clickable and sits next to the matched
// text). Calibrated against the messaging app's current layout; callers must
// tolerate misclassification and fall through to the next candidate.

use crate::matcher::MatchPredicate;
use crate::ui_tree::UiNode;

/// Layout containers that can host a tappable conversation row.
pub const ROW_CONTAINER_CLASSES: [&str; 2] = ["RelativeLayout", "FrameLayout"];

const IMAGE_LIKE_CLASSES: [&str; 1] = ["android.widget.ImageView"];
const TEXT_LIKE_CLASSES: [&str; 1] = ["android.widget.TextView"];

/// How many hops upward a text hit may be from its enclosing row.
pub const ROW_ANCESTOR_DEPTH: usize = 6;

/// Tuning bounds for the decoy classifier. Best-effort disambiguation, not
/// a proof.
#[derive(Debug, Clone)]
pub struct DecoyThresholds {
    /// At least this many image-like children to look like an avatar cluster.
    pub min_image_children: usize,
    /// Fewer text-like children than this to look like an avatar cluster.
    pub min_text_children: usize,
    /// Avatar clusters stay small; more children than this is a real row.
    pub max_children: usize,
}

impl Default for DecoyThresholds {
    fn default() -> Self {
        Self {
            min_image_children: 1,
            min_text_children: 2,
            max_children: 3,
        }
    }
}

fn class_in(node: &UiNode, classes: &[&str]) -> bool {
    node.class_name()
        .map(|c| classes.iter().any(|k| c == *k))
        .unwrap_or(false)
}

/// True when the node's immediate children look like a profile-picture
/// cluster rather than a conversation row.
pub fn is_decoy_cluster(node: &UiNode, thresholds: &DecoyThresholds) -> bool {
    let mut image_like = 0;
    let mut text_like = 0;

    for child in node.children() {
        if class_in(&child, &IMAGE_LIKE_CLASSES) {
            image_like += 1;
        } else if class_in(&child, &TEXT_LIKE_CLASSES) {
            text_like += 1;
        }
    }

    image_like >= thresholds.min_image_children
        && text_like < thresholds.min_text_children
        && node.child_count() <= thresholds.max_children
}

pub fn row_predicate() -> MatchPredicate {
    MatchPredicate::StructuralRow {
        min_children: 2,
        allowed_classes: ROW_CONTAINER_CLASSES.iter().map(|c| c.to_string()).collect(),
        depth_limit: ROW_ANCESTOR_DEPTH,
    }
}

/// A genuine tappable conversation row: structurally a row container, and
/// not a decoy cluster.
pub fn is_chat_row(node: &UiNode) -> bool {
    row_predicate().matches(node) && !is_decoy_cluster(node, &DecoyThresholds::default())
}
