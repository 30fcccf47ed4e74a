// Per-foreground-application automation state. One context is current at a
// time; a package change discards it and starts fresh. Nothing persists
// across a round trip through another application.

/// Progress flags for the application currently owning the UI tree. Flags
/// are terminal for the life of the context: once set they stay set until
/// the foreground package changes.
#[derive(Debug, Clone)]
pub struct AutomationContext {
    pub package: String,
    pub has_opened_chat: bool,
    pub has_clicked_link: bool,
    pub has_joined_meeting: bool,
    /// Bumped on every replacement. Scheduled work captures this and must
    /// find it unchanged on resumption, otherwise it self-cancels.
    pub generation: u64,
}

impl AutomationContext {
    fn fresh(package: &str, generation: u64) -> Self {
        Self {
            package: package.to_string(),
            has_opened_chat: false,
            has_clicked_link: false,
            has_joined_meeting: false,
            generation,
        }
    }
}

#[derive(Debug, Default)]
pub struct ContextTracker {
    current: Option<AutomationContext>,
    next_generation: u64,
}

impl ContextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must run before any workflow logic consults flags. Same package:
    /// hand back the existing context. New package: replace it with a fresh
    /// one, all flags false.
    pub fn on_foreground_changed(&mut self, new_package: &str) -> &mut AutomationContext {
        let replace = match &self.current {
            Some(ctx) => ctx.package != new_package,
            None => true,
        };
        if replace {
            self.next_generation += 1;
            self.current = Some(AutomationContext::fresh(new_package, self.next_generation));
        }
        self.current.as_mut().expect("context set above")
    }

    pub fn current(&self) -> Option<&AutomationContext> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut AutomationContext> {
        self.current.as_mut()
    }
}
