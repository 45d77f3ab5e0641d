//! Content bridge between the host entry and the editor document

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::convert::RoundTripConverter;
use crate::entry::Entry;
use crate::error::Result;
use crate::guard;
use crate::host::EntryHost;

/// Result of a commit against the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitReceipt {
    /// The host accepted the update
    Committed {
        version: u64,
        /// Entry was published within the version slack before this write
        recently_published: bool,
    },
    /// The stored body already matched; nothing was sent
    Unchanged { version: u64 },
}

/// Reads and writes the localized body field of one host entry
pub struct ContentBridge<H: EntryHost> {
    host: Arc<H>,
    field_id: String,
    locale: String,
    publish_slack: u64,
}

impl<H: EntryHost> ContentBridge<H> {
    pub fn new<F: Into<String>, L: Into<String>>(
        host: Arc<H>,
        field_id: F,
        locale: L,
        publish_slack: u64,
    ) -> Self {
        Self {
            host,
            field_id: field_id.into(),
            locale: locale.into(),
            publish_slack,
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Fetch the entry and convert its body into editor HTML.
    ///
    /// A missing body field is defaulted to an empty body on the returned
    /// copy; the shape reaches the host with the next commit.
    pub async fn load(&self, entry_id: &str, converter: &RoundTripConverter) -> Result<(Entry, String)> {
        let mut entry = self.host.get_entry(entry_id).await?;

        if entry.ensure_body(&self.field_id, &self.locale) {
            tracing::debug!(
                "Entry {} has no {}/{} body, defaulting to empty",
                entry_id,
                self.field_id,
                self.locale
            );
        }

        let markdown = entry
            .body(&self.field_id, &self.locale)?
            .unwrap_or_default()
            .to_string();
        let html = converter.to_html(&markdown)?;

        tracing::info!(
            "Loaded entry {} at version {} ({} bytes of markdown)",
            entry_id,
            entry.sys.version,
            markdown.len()
        );
        Ok((entry, html))
    }

    /// Write Markdown into the entry body.
    ///
    /// Re-fetches the entry first so out-of-band edits to other fields are not
    /// clobbered. Host failures propagate unchanged and are not retried.
    pub async fn commit(&self, entry_id: &str, markdown: &str) -> Result<CommitReceipt> {
        let mut entry = self.host.get_entry(entry_id).await?;
        let recently_published = guard::recently_published(&entry, self.publish_slack);

        if entry.body(&self.field_id, &self.locale)? == Some(markdown) {
            tracing::debug!(
                "Entry {} body unchanged at version {}, skipping update",
                entry_id,
                entry.sys.version
            );
            return Ok(CommitReceipt::Unchanged {
                version: entry.sys.version,
            });
        }

        entry.set_body(&self.field_id, &self.locale, markdown);
        let updated = self.host.update_entry(entry).await?;

        tracing::info!(
            "Committed entry {} at version {} (recently published: {})",
            entry_id,
            updated.sys.version,
            recently_published
        );
        Ok(CommitReceipt::Committed {
            version: updated.sys.version,
            recently_published,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use serde_json::json;

    fn bridge(host: Arc<MemoryHost>) -> ContentBridge<MemoryHost> {
        ContentBridge::new(host, "body", "en-US", 2)
    }

    #[tokio::test]
    async fn test_load_converts_body() {
        let host = Arc::new(MemoryHost::with_entries([
            Entry::new("a", 1).with_field("body", "en-US", "# Hello"),
        ]));
        let (entry, html) = bridge(host)
            .load("a", &RoundTripConverter::new())
            .await
            .unwrap();

        assert_eq!(entry.sys.version, 1);
        assert_eq!(html.trim(), "<h1>Hello</h1>");
    }

    #[tokio::test]
    async fn test_load_defaults_missing_body() {
        let host = Arc::new(MemoryHost::with_entries([Entry::new("a", 1)]));
        let (entry, html) = bridge(host.clone())
            .load("a", &RoundTripConverter::new())
            .await
            .unwrap();

        assert_eq!(entry.body("body", "en-US").unwrap(), Some(""));
        assert_eq!(html, "");
        // Nothing is written on load
        assert_eq!(host.write_count(), 0);
    }

    #[tokio::test]
    async fn test_load_rejects_unexpected_shape() {
        let mut entry = Entry::new("a", 1);
        entry
            .fields
            .entry("body".to_string())
            .or_default()
            .insert("en-US".to_string(), json!(42));
        let host = Arc::new(MemoryHost::with_entries([entry]));

        assert!(bridge(host)
            .load("a", &RoundTripConverter::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_commit_creates_field_and_keeps_others() {
        let host = Arc::new(MemoryHost::with_entries([
            Entry::new("a", 3).with_field("title", "en-US", "Title"),
        ]));
        let receipt = bridge(host.clone()).commit("a", "Body").await.unwrap();

        assert_eq!(
            receipt,
            CommitReceipt::Committed {
                version: 4,
                recently_published: false
            }
        );
        let stored = host.entry("a").unwrap();
        assert_eq!(stored.body("body", "en-US").unwrap(), Some("Body"));
        assert_eq!(stored.body("title", "en-US").unwrap(), Some("Title"));
    }

    #[tokio::test]
    async fn test_commit_skips_identical_body() {
        let host = Arc::new(MemoryHost::with_entries([
            Entry::new("a", 3).with_field("body", "en-US", "Same"),
        ]));
        let receipt = bridge(host.clone()).commit("a", "Same").await.unwrap();

        assert_eq!(receipt, CommitReceipt::Unchanged { version: 3 });
        assert_eq!(host.write_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_reports_recent_publish() {
        let host = Arc::new(MemoryHost::with_entries([
            Entry::new("a", 3).with_field("body", "en-US", "Old"),
        ]));
        host.publish("a").unwrap();

        let receipt = bridge(host).commit("a", "New").await.unwrap();
        assert_eq!(
            receipt,
            CommitReceipt::Committed {
                version: 5,
                recently_published: true
            }
        );
    }
}
