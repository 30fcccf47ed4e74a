// Click dispatch. Exactly one platform action request per call; the
// dispatcher never waits for or verifies the downstream effect. If anything
// changed on screen, the next UI event says so.

use crate::error::{AutomationError, Result};
use crate::platform::GestureSink;
use crate::ui_tree::UiNode;
use std::sync::Arc;

pub struct ActionDispatcher {
    sink: Arc<dyn GestureSink>,
}

impl ActionDispatcher {
    pub fn new(sink: Arc<dyn GestureSink>) -> Self {
        Self { sink }
    }

    /// Request a single click. `None` means resolution already failed;
    /// rejection means the node went stale between resolution and dispatch.
    /// Both outcomes are recoverable by a later event or scheduled retry.
    pub fn click(&self, node: Option<&UiNode>) -> Result<()> {
        let node = node.ok_or_else(|| AutomationError::NotFound("no node to click".to_string()))?;
        if self.sink.request_click(node) {
            Ok(())
        } else {
            Err(AutomationError::StaleReference(describe(node)))
        }
    }
}

fn describe(node: &UiNode) -> String {
    node.text()
        .or_else(|| node.description())
        .or_else(|| node.class_name())
        .unwrap_or("<anonymous node>")
        .to_string()
}
