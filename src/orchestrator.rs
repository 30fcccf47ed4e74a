// Top-level state machine. Every UI-changed event is driven to completion
// synchronously on one engine task: context reset check, then workflow
// dispatch by foreground package. Freshly foregrounded trees populate
// asynchronously, so the chat search runs after a settle delay via a
// scheduled re-entry rather than immediately; stale re-entries cancel
// themselves by re-checking context identity and flags.

use crate::config::AutomationConfig;
use crate::context::{AutomationContext, ContextTracker};
use crate::dispatcher::ActionDispatcher;
use crate::error::{AutomationError, Result};
use crate::heuristics;
use crate::matcher::{self, MatchPredicate};
use crate::platform::{GestureSink, PlatformBridge, WindowSource};
use crate::scheduler::{RetryScheduler, ScheduledCheck, WorkflowStep};
use crate::ui_tree::UiNode;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;

/// Foreground package fragments, matched by containment (the platform can
/// report composed package names).
pub const MESSAGING_PACKAGE: &str = "com.whatsapp";
pub const MEETING_PACKAGE: &str = "com.google.android.apps.meetings";

/// Settle delay before searching a freshly foregrounded messaging tree.
pub const CHAT_SETTLE_DELAY_MS: u64 = 1000;
/// Delay between opening a chat and scanning it for a meeting link.
pub const LINK_SEARCH_DELAY_MS: u64 = 2000;

static MEET_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"https?://(www\.)?meet\.google\.com/[a-zA-Z0-9\-]+|meet\.google\.com/[a-zA-Z0-9\-]+",
    )
    .expect("meet link pattern is valid")
});

const MIC_LABELS: [&str; 2] = ["Turn off microphone", "Microphone"];
const CAM_LABELS: [&str; 2] = ["Turn off camera", "Camera"];
// Priority order; the first label that resolves wins.
const JOIN_LABELS: [&str; 3] = ["Join", "Ask to join", "Join now"];

/// Inbound UI-changed notification. An absent root drops the whole event.
#[derive(Debug)]
pub struct UiEvent {
    pub package: Option<String>,
    pub root: Option<UiNode>,
}

/// Everything the engine task consumes, on one serial queue.
#[derive(Debug)]
pub enum EngineMsg {
    Ui(UiEvent),
    Retry(ScheduledCheck),
}

pub struct AutomationOrchestrator {
    tracker: ContextTracker,
    config: AutomationConfig,
    dispatcher: ActionDispatcher,
    bridge: Arc<dyn PlatformBridge>,
    windows: Arc<dyn WindowSource>,
    scheduler: RetryScheduler,
    settle_delay: Duration,
    link_delay: Duration,
}

impl AutomationOrchestrator {
    pub fn new(
        config: AutomationConfig,
        sink: Arc<dyn GestureSink>,
        bridge: Arc<dyn PlatformBridge>,
        windows: Arc<dyn WindowSource>,
        engine_tx: mpsc::Sender<EngineMsg>,
    ) -> Self {
        Self {
            tracker: ContextTracker::new(),
            config,
            dispatcher: ActionDispatcher::new(sink),
            bridge,
            windows,
            scheduler: RetryScheduler::new(engine_tx),
            settle_delay: Duration::from_millis(CHAT_SETTLE_DELAY_MS),
            link_delay: Duration::from_millis(LINK_SEARCH_DELAY_MS),
        }
    }

    /// Shrink the settle delays (tests, demos).
    pub fn with_delays(mut self, settle: Duration, link: Duration) -> Self {
        self.settle_delay = settle;
        self.link_delay = link;
        self
    }

    pub fn context(&self) -> Option<&AutomationContext> {
        self.tracker.current()
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<EngineMsg>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                EngineMsg::Ui(event) => self.handle_event(event),
                EngineMsg::Retry(check) => self.handle_retry(check),
            }
        }
    }

    /// One UI-changed event, driven to completion. The context reset check
    /// always runs before any workflow consults flags, even when the root
    /// is unavailable and the event is then dropped.
    pub fn handle_event(&mut self, event: UiEvent) {
        let Some(package) = event.package else {
            return;
        };
        let (generation, opened_chat, clicked_link, joined_meeting) = {
            let ctx = self.tracker.on_foreground_changed(&package);
            (
                ctx.generation,
                ctx.has_opened_chat,
                ctx.has_clicked_link,
                ctx.has_joined_meeting,
            )
        };
        let Some(root) = event.root else {
            // Platform gave us no tree; drop the event, run nothing partial.
            return;
        };

        if package.contains(MESSAGING_PACKAGE) {
            if !opened_chat {
                // Nothing to search for until the voice layer sets a target.
                if self.config.target_contact().is_none() {
                    return;
                }
                self.scheduler
                    .schedule(self.settle_delay, &package, generation, WorkflowStep::ChatSearch);
            } else if !clicked_link {
                // Event-driven retry; this step is not time-gated.
                log_recoverable(self.run_link_search(&root));
            }
        } else if package.contains(MEETING_PACKAGE) && !joined_meeting {
            log_recoverable(self.run_meeting_join(&root));
        }
    }

    /// A scheduled check resumed. Validate the captured snapshot against the
    /// current context before doing anything; a mismatch means the world
    /// moved on and the record is a guaranteed no-op.
    pub fn handle_retry(&mut self, check: ScheduledCheck) {
        let Some(ctx) = self.tracker.current() else {
            return;
        };
        if ctx.package != check.package || ctx.generation != check.generation {
            println!("🧹 Dropping stale scheduled check ({:?})", check.step);
            return;
        }
        match check.step {
            WorkflowStep::ChatSearch if ctx.has_opened_chat => return,
            WorkflowStep::LinkSearch if !ctx.has_opened_chat || ctx.has_clicked_link => return,
            _ => {}
        }

        // Never a cached handle: re-read the live tree.
        let Some(root) = self.windows.active_root() else {
            println!("⚠️ {}", AutomationError::PlatformUnavailable);
            return;
        };
        let outcome = match check.step {
            WorkflowStep::ChatSearch => self.run_chat_search(&root),
            WorkflowStep::LinkSearch => self.run_link_search(&root),
        };
        log_recoverable(outcome);
    }

    fn run_chat_search(&mut self, root: &UiNode) -> Result<()> {
        let target = self
            .config
            .target_contact()
            .ok_or_else(|| AutomationError::ConfigMissing("target contact".to_string()))?;

        let mut row = None;
        for candidate in matcher::find_all_by_text(root, &target) {
            if let Some(hit) = matcher::find_ancestor_where(
                &candidate,
                heuristics::ROW_ANCESTOR_DEPTH,
                &heuristics::is_chat_row,
            ) {
                row = Some(hit);
                break;
            }
        }

        let Some(row) = row else {
            println!("🤷 Contact '{}' not found or clickable row missing", target);
            self.bridge
                .toast(&format!("Couldn't open chat for {}", target));
            return Err(AutomationError::NotFound(format!("chat row for {}", target)));
        };

        // Propagates StaleReference; a later event retries the whole search.
        self.dispatcher.click(Some(&row))?;

        // Flag at dispatch time: a second event in quick succession must not
        // click again.
        let Some(ctx) = self.tracker.current_mut() else {
            return Ok(());
        };
        ctx.has_opened_chat = true;
        let (package, generation) = (ctx.package.clone(), ctx.generation);
        println!("💬 Opened chat with {}", target);
        self.bridge.toast(&format!("Chat opened with {}", target));
        self.scheduler
            .schedule(self.link_delay, &package, generation, WorkflowStep::LinkSearch);
        Ok(())
    }

    fn run_link_search(&mut self, root: &UiNode) -> Result<()> {
        let pred = MatchPredicate::LinkPattern {
            pattern: MEET_LINK_RE.clone(),
        };
        let node = matcher::find_first(root, &pred)
            .filter(|n| n.is_visible_to_user())
            .ok_or_else(|| AutomationError::NotFound("visible meeting link".to_string()))?;

        self.dispatcher.click(Some(&node))?;
        if let Some(ctx) = self.tracker.current_mut() {
            ctx.has_clicked_link = true;
        }
        println!("📎 Clicked meeting link");
        self.bridge.toast("Joining Meet...");
        Ok(())
    }

    fn run_meeting_join(&mut self, root: &UiNode) -> Result<()> {
        // Mic and camera are best-effort: missing toggles never block the join.
        for labels in [&MIC_LABELS, &CAM_LABELS] {
            let toggle = labels
                .iter()
                .find_map(|label| matcher::find_first(root, &MatchPredicate::text_or_desc(label)));
            if let Some(toggle) = toggle {
                if let Err(e) = self.dispatcher.click(Some(&toggle)) {
                    println!("⚠️ Toggle click rejected: {}", e);
                }
            }
        }

        let join = JOIN_LABELS
            .iter()
            .find_map(|label| matcher::find_first(root, &MatchPredicate::text_or_desc(label)))
            .ok_or_else(|| AutomationError::NotFound("join control".to_string()))?;

        self.dispatcher.click(Some(&join))?;
        if let Some(ctx) = self.tracker.current_mut() {
            ctx.has_joined_meeting = true;
        }
        println!("✅ Mic off, Cam off, Joined Meet");
        self.bridge.toast("🎥 Auto-joined Meet");
        Ok(())
    }
}

// Every workflow failure in this engine is recoverable: log it and hand
// control back to the event queue.
fn log_recoverable(outcome: Result<()>) {
    if let Err(e) = outcome {
        println!("⚠️ Step incomplete ({}); waiting for a later trigger", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ScriptedWindowSource;
    use crate::ui_tree::NodeBuilder;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct RecordingSink {
        clicked: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                clicked: Mutex::new(Vec::new()),
            })
        }

        fn clicks(&self) -> Vec<String> {
            self.clicked.lock().unwrap().clone()
        }
    }

    impl GestureSink for RecordingSink {
        fn request_click(&self, node: &UiNode) -> bool {
            if node.is_stale() {
                return false;
            }
            let label = node
                .class_name()
                .or_else(|| node.text())
                .or_else(|| node.description())
                .unwrap_or("<node>")
                .to_string();
            self.clicked.lock().unwrap().push(label);
            true
        }
    }

    struct SilentBridge;

    impl PlatformBridge for SilentBridge {
        fn toast(&self, _message: &str) {}
        fn speak(&self, _phrase: &str) {}
        fn launch_app(&self, _package: &str) {}
        fn open_accessibility_settings(&self) {}
    }

    struct Harness {
        orch: AutomationOrchestrator,
        rx: mpsc::Receiver<EngineMsg>,
        sink: Arc<RecordingSink>,
        windows: Arc<ScriptedWindowSource>,
        config: AutomationConfig,
    }

    fn harness() -> Harness {
        let (tx, rx) = mpsc::channel(16);
        let sink = RecordingSink::new();
        let windows = Arc::new(ScriptedWindowSource::new());
        let config_path = std::env::temp_dir()
            .join(format!("meet_autopilot_orch_{}", Uuid::new_v4()))
            .join("config");
        let config = AutomationConfig::with_path(config_path.clone());
        let orch = AutomationOrchestrator::new(
            AutomationConfig::with_path(config_path),
            sink.clone(),
            Arc::new(SilentBridge),
            windows.clone(),
            tx,
        )
        .with_delays(Duration::ZERO, Duration::ZERO);
        Harness {
            orch,
            rx,
            sink,
            windows,
            config,
        }
    }

    fn whatsapp_tree() -> UiNode {
        // A bare text hit plus the genuine clickable row containing it.
        NodeBuilder::new()
            .child(NodeBuilder::new().text("Alice"))
            .child(
                NodeBuilder::new()
                    .class("RelativeLayout")
                    .clickable(true)
                    .child(NodeBuilder::new().text("Alice"))
                    .child(NodeBuilder::new().class("TextView")),
            )
            .build()
    }

    fn chat_tree_with_link() -> UiNode {
        NodeBuilder::new()
            .child(NodeBuilder::new().text("see you there"))
            .child(
                NodeBuilder::new()
                    .desc("meet.google.com/abc-defg-hij")
                    .clickable(true),
            )
            .build()
    }

    fn meeting_tree() -> UiNode {
        NodeBuilder::new()
            .child(NodeBuilder::new().desc("Turn off microphone").clickable(true))
            .child(NodeBuilder::new().desc("Turn off camera").clickable(true))
            .child(NodeBuilder::new().text("Ask to join").clickable(true))
            .build()
    }

    async fn next_retry(rx: &mut mpsc::Receiver<EngineMsg>) -> ScheduledCheck {
        match rx.recv().await.expect("engine queue open") {
            EngineMsg::Retry(check) => check,
            other => panic!("expected retry, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn chat_search_resolves_row_not_bare_text() {
        let mut h = harness();
        h.config.set_target_contact("Alice").unwrap();
        h.windows.set_window(MESSAGING_PACKAGE, whatsapp_tree());

        h.orch.handle_event(UiEvent {
            package: Some(MESSAGING_PACKAGE.to_string()),
            root: Some(whatsapp_tree()),
        });

        let check = next_retry(&mut h.rx).await;
        assert_eq!(check.step, WorkflowStep::ChatSearch);
        h.orch.handle_retry(check);

        assert_eq!(h.sink.clicks(), vec!["RelativeLayout".to_string()]);
        assert!(h.orch.context().unwrap().has_opened_chat);
    }

    #[tokio::test]
    async fn chat_click_is_idempotent_per_context() {
        let mut h = harness();
        h.config.set_target_contact("Alice").unwrap();
        h.windows.set_window(MESSAGING_PACKAGE, whatsapp_tree());

        h.orch.handle_event(UiEvent {
            package: Some(MESSAGING_PACKAGE.to_string()),
            root: Some(whatsapp_tree()),
        });
        let check = next_retry(&mut h.rx).await;
        h.orch.handle_retry(check.clone());
        assert_eq!(h.sink.clicks().len(), 1);

        // A second event for the same context must not schedule another chat
        // search, and a duplicate scheduled check must observe the flag and
        // do nothing.
        h.orch.handle_event(UiEvent {
            package: Some(MESSAGING_PACKAGE.to_string()),
            root: Some(whatsapp_tree()),
        });
        h.orch.handle_retry(check);
        assert_eq!(h.sink.clicks().len(), 1);
    }

    #[tokio::test]
    async fn link_search_runs_after_chat_opens() {
        let mut h = harness();
        h.config.set_target_contact("Alice").unwrap();
        h.windows.set_window(MESSAGING_PACKAGE, whatsapp_tree());

        h.orch.handle_event(UiEvent {
            package: Some(MESSAGING_PACKAGE.to_string()),
            root: Some(whatsapp_tree()),
        });
        let chat = next_retry(&mut h.rx).await;
        h.orch.handle_retry(chat);

        // Chat opened; the conversation tree replaces the list tree.
        h.windows.set_window(MESSAGING_PACKAGE, chat_tree_with_link());
        let link = next_retry(&mut h.rx).await;
        assert_eq!(link.step, WorkflowStep::LinkSearch);
        h.orch.handle_retry(link);

        let clicks = h.sink.clicks();
        assert_eq!(clicks.len(), 2);
        assert_eq!(clicks[1], "meet.google.com/abc-defg-hij");
        assert!(h.orch.context().unwrap().has_clicked_link);
    }

    #[tokio::test]
    async fn link_search_retries_on_later_events() {
        let mut h = harness();
        h.config.set_target_contact("Alice").unwrap();
        h.windows.set_window(MESSAGING_PACKAGE, whatsapp_tree());

        h.orch.handle_event(UiEvent {
            package: Some(MESSAGING_PACKAGE.to_string()),
            root: Some(whatsapp_tree()),
        });
        let chat = next_retry(&mut h.rx).await;
        h.orch.handle_retry(chat);

        // Scheduled link search fires while the link is still invisible.
        let invisible = NodeBuilder::new()
            .child(
                NodeBuilder::new()
                    .desc("meet.google.com/abc-defg-hij")
                    .clickable(true)
                    .visible(false),
            )
            .build();
        h.windows.set_window(MESSAGING_PACKAGE, invisible);
        let link = next_retry(&mut h.rx).await;
        h.orch.handle_retry(link);
        assert_eq!(h.sink.clicks().len(), 1);
        assert!(!h.orch.context().unwrap().has_clicked_link);

        // A later event with the link visible succeeds without a new timer.
        h.orch.handle_event(UiEvent {
            package: Some(MESSAGING_PACKAGE.to_string()),
            root: Some(chat_tree_with_link()),
        });
        assert_eq!(h.sink.clicks().len(), 2);
        assert!(h.orch.context().unwrap().has_clicked_link);
    }

    #[tokio::test]
    async fn meeting_flow_clicks_toggles_and_join_once() {
        let mut h = harness();
        h.orch.handle_event(UiEvent {
            package: Some(MEETING_PACKAGE.to_string()),
            root: Some(meeting_tree()),
        });

        let clicks = h.sink.clicks();
        assert_eq!(
            clicks,
            vec![
                "Turn off microphone".to_string(),
                "Turn off camera".to_string(),
                "Ask to join".to_string(),
            ]
        );
        assert!(h.orch.context().unwrap().has_joined_meeting);

        h.orch.handle_event(UiEvent {
            package: Some(MEETING_PACKAGE.to_string()),
            root: Some(meeting_tree()),
        });
        assert_eq!(h.sink.clicks().len(), 3);
    }

    #[tokio::test]
    async fn meeting_join_proceeds_without_toggles() {
        let mut h = harness();
        let join_only = NodeBuilder::new()
            .child(NodeBuilder::new().text("Ask to join").clickable(true))
            .build();
        h.orch.handle_event(UiEvent {
            package: Some(MEETING_PACKAGE.to_string()),
            root: Some(join_only),
        });

        assert_eq!(h.sink.clicks(), vec!["Ask to join".to_string()]);
        assert!(h.orch.context().unwrap().has_joined_meeting);
    }

    #[tokio::test]
    async fn stale_scheduled_check_is_a_noop_after_package_change() {
        let mut h = harness();
        h.config.set_target_contact("Alice").unwrap();
        h.windows.set_window(MESSAGING_PACKAGE, whatsapp_tree());

        h.orch.handle_event(UiEvent {
            package: Some(MESSAGING_PACKAGE.to_string()),
            root: Some(whatsapp_tree()),
        });
        let check = next_retry(&mut h.rx).await;

        // The foreground moved on before the settle delay elapsed.
        h.orch.handle_event(UiEvent {
            package: Some("com.android.launcher".to_string()),
            root: Some(NodeBuilder::new().build()),
        });
        h.orch.handle_retry(check);
        assert!(h.sink.clicks().is_empty());
    }

    #[tokio::test]
    async fn event_without_root_still_resets_context() {
        let mut h = harness();
        h.orch.handle_event(UiEvent {
            package: Some(MEETING_PACKAGE.to_string()),
            root: Some(meeting_tree()),
        });
        assert!(h.orch.context().unwrap().has_joined_meeting);

        // Rootless event from another package: dropped, but the context
        // reset check still runs first.
        h.orch.handle_event(UiEvent {
            package: Some("com.android.launcher".to_string()),
            root: None,
        });
        h.orch.handle_event(UiEvent {
            package: Some(MEETING_PACKAGE.to_string()),
            root: Some(meeting_tree()),
        });
        // Fresh context, so the join ran again.
        assert_eq!(h.sink.clicks().len(), 6);
    }

    #[tokio::test]
    async fn missing_target_skips_chat_workflow() {
        let mut h = harness();
        h.windows.set_window(MESSAGING_PACKAGE, whatsapp_tree());
        h.orch.handle_event(UiEvent {
            package: Some(MESSAGING_PACKAGE.to_string()),
            root: Some(whatsapp_tree()),
        });

        assert!(h.rx.try_recv().is_err());
        assert!(h.sink.clicks().is_empty());
    }

    #[tokio::test]
    async fn decoy_candidate_falls_through_to_real_row() {
        let mut h = harness();
        h.config.set_target_contact("Alice").unwrap();
        // First candidate resolves into an avatar cluster; second candidate
        // sits in a genuine row.
        let tree = NodeBuilder::new()
            .child(
                NodeBuilder::new()
                    .class("android.widget.FrameLayout")
                    .clickable(true)
                    .child(NodeBuilder::new().class("android.widget.ImageView"))
                    .child(
                        NodeBuilder::new()
                            .class("android.widget.TextView")
                            .text("Alice"),
                    ),
            )
            .child(
                NodeBuilder::new()
                    .class("android.widget.RelativeLayout")
                    .clickable(true)
                    .child(
                        NodeBuilder::new()
                            .class("android.widget.TextView")
                            .text("Alice"),
                    )
                    .child(
                        NodeBuilder::new()
                            .class("android.widget.TextView")
                            .text("last message"),
                    ),
            )
            .build();
        h.windows.set_window(MESSAGING_PACKAGE, tree.clone());

        h.orch.handle_event(UiEvent {
            package: Some(MESSAGING_PACKAGE.to_string()),
            root: Some(tree),
        });
        let check = next_retry(&mut h.rx).await;
        h.orch.handle_retry(check);

        assert_eq!(
            h.sink.clicks(),
            vec!["android.widget.RelativeLayout".to_string()]
        );
    }
}
