//! Undo/redo history for the editor document

use std::time::Duration;
use tokio::time::Instant;

use crate::config::HistoryConfig;

/// One undoable change of the document
#[derive(Debug, Clone)]
struct HistoryEntry {
    before: String,
    after: String,
    edited_at: Instant,
}

/// Bounded undo/redo stack.
///
/// Changes recorded within the coalesce window of the previous one extend
/// that entry instead of starting a new step.
#[derive(Debug)]
pub struct EditHistory {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    max_depth: usize,
    coalesce_window: Duration,
    /// Set after undo/redo so the next change starts a fresh entry
    sealed: bool,
}

impl EditHistory {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_depth: config.max_depth.max(1),
            coalesce_window: Duration::from_millis(config.coalesce_window_ms),
            sealed: false,
        }
    }

    /// Record a change from `before` to `after`
    pub fn record(&mut self, before: &str, after: &str) {
        if before == after {
            return;
        }

        let now = Instant::now();
        self.redo_stack.clear();

        if !self.sealed {
            if let Some(entry) = self.undo_stack.last_mut() {
                if entry.after == before
                    && now.saturating_duration_since(entry.edited_at) <= self.coalesce_window
                {
                    entry.after = after.to_string();
                    entry.edited_at = now;
                    return;
                }
            }
        }

        self.sealed = false;
        self.undo_stack.push(HistoryEntry {
            before: before.to_string(),
            after: after.to_string(),
            edited_at: now,
        });
        trim(&mut self.undo_stack, self.max_depth);
    }

    /// Step back; returns the document to restore
    pub fn undo(&mut self) -> Option<String> {
        let entry = self.undo_stack.pop()?;
        let before = entry.before.clone();
        self.redo_stack.push(entry);
        trim(&mut self.redo_stack, self.max_depth);
        self.sealed = true;
        Some(before)
    }

    /// Step forward again; returns the document to restore
    pub fn redo(&mut self) -> Option<String> {
        let entry = self.redo_stack.pop()?;
        let after = entry.after.clone();
        self.undo_stack.push(entry);
        trim(&mut self.undo_stack, self.max_depth);
        self.sealed = true;
        Some(after)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
}

fn trim(entries: &mut Vec<HistoryEntry>, max_depth: usize) {
    if entries.len() > max_depth {
        let drop_count = entries.len() - max_depth;
        entries.drain(0..drop_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn history(max_depth: usize) -> EditHistory {
        EditHistory::new(&HistoryConfig {
            max_depth,
            coalesce_window_ms: 1000,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_quick_changes_coalesce() {
        let mut history = history(100);
        history.record("", "a");
        advance(Duration::from_millis(200)).await;
        history.record("a", "ab");
        advance(Duration::from_millis(200)).await;
        history.record("ab", "abc");

        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.undo().as_deref(), Some(""));
        assert!(!history.can_undo());
        assert_eq!(history.redo().as_deref(), Some("abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_starts_new_step() {
        let mut history = history(100);
        history.record("", "a");
        advance(Duration::from_millis(1500)).await;
        history.record("a", "ab");

        assert_eq!(history.undo_depth(), 2);
        assert_eq!(history.undo().as_deref(), Some("a"));
        assert_eq!(history.undo().as_deref(), Some(""));
        assert_eq!(history.undo(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_change_clears_redo() {
        let mut history = history(100);
        history.record("", "a");
        history.undo();
        assert!(history.can_redo());

        history.record("", "b");
        assert!(!history.can_redo());
        assert_eq!(history.undo_depth(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_after_undo_is_separate_step() {
        let mut history = history(100);
        history.record("", "a");
        advance(Duration::from_millis(1500)).await;
        history.record("a", "ab");
        history.undo();
        history.record("a", "ax");

        assert_eq!(history.undo_depth(), 2);
        assert_eq!(history.undo().as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_depth_is_bounded() {
        let mut history = history(2);
        for (before, after) in [("", "1"), ("1", "2"), ("2", "3")] {
            history.record(before, after);
            advance(Duration::from_secs(2)).await;
        }

        assert_eq!(history.undo_depth(), 2);
        assert_eq!(history.undo().as_deref(), Some("2"));
        assert_eq!(history.undo().as_deref(), Some("1"));
        assert_eq!(history.undo(), None);
    }

    #[test]
    fn test_noop_change_is_ignored() {
        let mut history = history(10);
        history.record("same", "same");
        assert!(!history.can_undo());
    }
}
