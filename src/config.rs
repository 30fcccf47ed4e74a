// Persisted automation settings. A single line-oriented KEY=VALUE file; the
// voice layer writes the target contact, the orchestrator only reads it.
// Absence of a value is a valid state, not an error.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

const TARGET_CONTACT_KEY: &str = "TARGET_CONTACT";

pub struct AutomationConfig {
    path: PathBuf,
}

impl AutomationConfig {
    pub fn new() -> Self {
        let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: base.join(".meet_autopilot").join("config"),
        }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let content = fs::read_to_string(&self.path).ok()?;
        for line in content.lines() {
            if let Some((k, v)) = line.split_once('=') {
                if k.trim() == key {
                    let value = v.trim();
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
        None
    }

    pub fn update(&self, key: &str, value: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir {:?}", parent))?;
        }

        let content = fs::read_to_string(&self.path).unwrap_or_default();
        let mut lines = Vec::new();
        let mut found = false;

        for line in content.lines() {
            if line.starts_with(key) && line.contains('=') {
                lines.push(format!("{}={}", key, value));
                found = true;
            } else {
                lines.push(line.to_string());
            }
        }
        if !found {
            lines.push(format!("{}={}", key, value));
        }

        fs::write(&self.path, lines.join("\n"))
            .with_context(|| format!("Failed to write config {:?}", self.path))
    }

    pub fn target_contact(&self) -> Option<String> {
        self.get(TARGET_CONTACT_KEY)
    }

    pub fn set_target_contact(&self, name: &str) -> Result<()> {
        self.update(TARGET_CONTACT_KEY, name)
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self::new()
    }
}
