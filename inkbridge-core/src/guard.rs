//! Version and publish guard for write-back

use serde::{Deserialize, Serialize};

use crate::entry::Entry;

/// Body sent instead of an empty string, which the host reads as "never set"
pub const EMPTY_BODY: &str = " ";

/// Session lifecycle; the only legal transition is `Loading -> Ready`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Lifecycle {
    /// The loaded document has not settled yet; its echo must not be written
    #[default]
    Loading,
    /// Every settled change is written back
    Ready,
}

/// What the guard decided for a settled change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// The load echo; nothing is written
    Suppress,
    /// Write this Markdown
    Commit(String),
}

/// Per-session guard in front of every commit
#[derive(Debug, Default)]
pub struct VersionGuard {
    lifecycle: Lifecycle,
    /// Markdown of the loaded document; `None` suppresses the first settle unconditionally
    loaded: Option<String>,
}

impl VersionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guard for a freshly loaded document whose own conversion is `markdown`
    pub fn expecting_echo(markdown: String) -> Self {
        Self {
            lifecycle: Lifecycle::Loading,
            loaded: Some(markdown),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Decide whether a settled change is written.
    ///
    /// The first settle after load moves the session to `Ready`. It is the
    /// load echo, and suppressed, unless the document already differs from
    /// what was loaded: edits made inside the first quiet window are written.
    pub fn on_settle(&mut self, markdown: String) -> GuardDecision {
        match self.lifecycle {
            Lifecycle::Loading => {
                self.lifecycle = Lifecycle::Ready;
                match self.loaded.take() {
                    Some(loaded) if loaded != markdown => {
                        tracing::debug!("Document edited before load settled, session ready");
                        GuardDecision::Commit(coerce_empty(markdown))
                    }
                    _ => {
                        tracing::debug!("Suppressing load echo, session ready");
                        GuardDecision::Suppress
                    }
                }
            }
            Lifecycle::Ready => GuardDecision::Commit(coerce_empty(markdown)),
        }
    }
}

/// Replace an empty conversion result with a single space
pub fn coerce_empty(markdown: String) -> String {
    if markdown.is_empty() {
        EMPTY_BODY.to_string()
    } else {
        markdown
    }
}

/// Whether the entry counts as "recently published".
///
/// Informational only: nothing branches on it yet.
pub fn recently_published(entry: &Entry, slack: u64) -> bool {
    entry.is_recently_published(slack)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_settle_is_suppressed_once() {
        let mut guard = VersionGuard::new();
        assert_eq!(guard.lifecycle(), Lifecycle::Loading);

        assert_eq!(guard.on_settle("# Hello".to_string()), GuardDecision::Suppress);
        assert_eq!(guard.lifecycle(), Lifecycle::Ready);

        assert_eq!(
            guard.on_settle("# Hello".to_string()),
            GuardDecision::Commit("# Hello".to_string())
        );
    }

    #[test]
    fn test_unchanged_echo_is_suppressed() {
        let mut guard = VersionGuard::expecting_echo("# Hello".to_string());
        assert_eq!(guard.on_settle("# Hello".to_string()), GuardDecision::Suppress);
        assert_eq!(guard.lifecycle(), Lifecycle::Ready);
    }

    #[test]
    fn test_edit_before_first_settle_commits() {
        let mut guard = VersionGuard::expecting_echo("# Hello".to_string());
        assert_eq!(
            guard.on_settle("# Hello, world".to_string()),
            GuardDecision::Commit("# Hello, world".to_string())
        );
        assert_eq!(guard.lifecycle(), Lifecycle::Ready);

        let mut guard = VersionGuard::expecting_echo("Draft".to_string());
        assert_eq!(
            guard.on_settle(String::new()),
            GuardDecision::Commit(" ".to_string())
        );
    }

    #[test]
    fn test_empty_markdown_becomes_space() {
        let mut guard = VersionGuard::new();
        guard.on_settle(String::new());
        assert_eq!(
            guard.on_settle(String::new()),
            GuardDecision::Commit(" ".to_string())
        );
    }

    #[test]
    fn test_recently_published_slack() {
        let mut entry = Entry::new("a", 7);
        entry.sys.published_version = Some(6);
        assert!(recently_published(&entry, 2));
        assert!(!recently_published(&entry, 1));
    }
}
