use thiserror::Error;

/// Failure taxonomy for the automation engine. Nothing here is fatal to the
/// process: every variant resolves to "wait for the next event or a retry".
#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Target not found: {0}")]
    NotFound(String),

    #[error("Stale element reference: {0}")]
    StaleReference(String),

    #[error("Missing configuration: {0}")]
    ConfigMissing(String),

    #[error("Platform unavailable: no active window tree")]
    PlatformUnavailable,
}

pub type Result<T> = std::result::Result<T, AutomationError>;
