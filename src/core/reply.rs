//! Rendering replies and sending them back to the conversation.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Where replies go. Sends are best-effort: failures are never surfaced.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, text: String);
}

/// Render a command outcome as chat text.
pub fn format(result: &Result<String>) -> String {
    match result {
        Ok(payload) => payload.clone(),
        Err(e) => format!("Error: {}", e),
    }
}

/// Format a duration for chat (e.g. "45s", "12m 3s", "2h 15m", "3d 4h").
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveError;
    use crate::error::Error;

    #[test]
    fn test_format_payload_verbatim() {
        assert_eq!(format(&Ok("Adding abc".to_string())), "Adding abc");
    }

    #[test]
    fn test_format_error() {
        let err: Result<String> = Err(Error::Archive(ArchiveError::failed("disk full")));
        assert_eq!(format(&err), "Error: disk full");

        let err: Result<String> = Err(Error::NotImplemented);
        assert_eq!(
            format(&err),
            "Error: TODO: Not implemented in the archiver yet. PR please =)."
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(723)), "12m 3s");
        assert_eq!(format_duration(Duration::from_secs(8100)), "2h 15m");
        assert_eq!(format_duration(Duration::from_secs(3 * 86400 + 4 * 3600)), "3d 4h");
    }
}
