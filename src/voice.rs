// Spoken-command parsing. Thin by design: extract the target identifier
// from a transcript and hand it off; everything conversational stays with
// the caller.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceCommand {
    JoinClassWith { contact: String },
}

/// Recognized phrase: "join class with <name>". Case-insensitive keyword
/// scan, trimmed remainder is the contact.
pub fn parse_command(transcript: &str) -> Option<VoiceCommand> {
    let lower = transcript.to_lowercase();
    let key = "join class with";
    let idx = lower.find(key)?;
    let contact = transcript[idx + key.len()..].trim();
    if contact.is_empty() {
        return None;
    }
    Some(VoiceCommand::JoinClassWith {
        contact: contact.to_string(),
    })
}
