// Platform boundary. The engine only ever talks to the host through these
// traits: one window/tree reader, one click primitive, and a handful of
// fire-and-forget user-facing effects whose results are never consulted.

use crate::ui_tree::UiNode;
use std::sync::Mutex;

/// Re-reads the live window state. Scheduled retries go through here rather
/// than through cached node handles, which may have gone stale.
pub trait WindowSource: Send + Sync {
    fn active_root(&self) -> Option<UiNode>;
    fn foreground_package(&self) -> Option<String>;
}

/// The single platform gesture primitive: request a click, get accept or
/// reject back. Rejection usually means the node vanished from the live tree.
pub trait GestureSink: Send + Sync {
    fn request_click(&self, node: &UiNode) -> bool;
}

/// Outbound side effects. All fire-and-forget.
pub trait PlatformBridge: Send + Sync {
    fn toast(&self, message: &str);
    fn speak(&self, phrase: &str);
    fn launch_app(&self, package: &str);
    fn open_accessibility_settings(&self);
    fn automation_service_enabled(&self) -> bool {
        true
    }
}

/// Console-backed bridge for the demo driver.
pub struct ConsoleBridge;

impl PlatformBridge for ConsoleBridge {
    fn toast(&self, message: &str) {
        println!("💬 [Toast] {}", message);
    }

    fn speak(&self, phrase: &str) {
        println!("🔊 [TTS] {}", phrase);
    }

    fn launch_app(&self, package: &str) {
        println!("🚀 [Launch] {}", package);
    }

    fn open_accessibility_settings(&self) {
        println!("⚙️ [Settings] Opening accessibility settings");
    }
}

/// Console-backed gesture sink: accepts any click on a live node, rejects
/// stale ones the way the real primitive does.
pub struct ConsoleGestures;

impl GestureSink for ConsoleGestures {
    fn request_click(&self, node: &UiNode) -> bool {
        if node.is_stale() {
            return false;
        }
        println!("🖱️ [Click] {:?}", node);
        true
    }
}

/// Window source fed by scripted trees (REPL demos and tests). Stands where
/// a real accessibility adapter would; the engine cannot tell the difference.
#[derive(Default)]
pub struct ScriptedWindowSource {
    state: Mutex<ScriptedState>,
}

#[derive(Default)]
struct ScriptedState {
    package: Option<String>,
    root: Option<UiNode>,
}

impl ScriptedWindowSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_window(&self, package: &str, root: UiNode) {
        let mut state = self.state.lock().expect("window source lock poisoned");
        state.package = Some(package.to_string());
        state.root = Some(root);
    }

    pub fn set_tree(&self, root: UiNode) {
        let mut state = self.state.lock().expect("window source lock poisoned");
        state.root = Some(root);
    }

    pub fn set_package(&self, package: &str) {
        let mut state = self.state.lock().expect("window source lock poisoned");
        state.package = Some(package.to_string());
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().expect("window source lock poisoned");
        state.package = None;
        state.root = None;
    }
}

impl WindowSource for ScriptedWindowSource {
    fn active_root(&self) -> Option<UiNode> {
        self.state
            .lock()
            .expect("window source lock poisoned")
            .root
            .clone()
    }

    fn foreground_package(&self) -> Option<String> {
        self.state
            .lock()
            .expect("window source lock poisoned")
            .package
            .clone()
    }
}
