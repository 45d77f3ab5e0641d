//! Inkbridge Core - Markdown round-trip editing for hosted content entries
//!
//! This crate keeps a rich-text editor document in sync with the Markdown
//! body of a host entry: load converts the stored Markdown to editor HTML,
//! edits are debounced and written back as Markdown through a single writer
//! per session.

pub mod assets;
pub mod bridge;
pub mod config;
pub mod convert;
pub mod entry;
pub mod error;
pub mod guard;
pub mod history;
pub mod host;
pub mod scheduler;
pub mod session;

// Re-export commonly used types
pub use assets::{insert_assets, Asset};
pub use bridge::{CommitReceipt, ContentBridge};
pub use config::{AdPlaceholderConfig, EditorConfig, HistoryConfig};
pub use convert::extensions::{AdPlaceholder, LinkPolicy, MarkupExtension, Stage};
pub use convert::RoundTripConverter;
pub use entry::{Entry, EntrySys};
pub use error::{ErrorSeverity, InkbridgeError, Result};
pub use guard::{GuardDecision, Lifecycle, VersionGuard};
pub use history::EditHistory;
pub use host::{AssetPicker, AssetRecord, EntryHost, MemoryHost, StaticAssetPicker};
pub use scheduler::{SchedulerState, WriteBackScheduler};
pub use session::{EditorSession, SessionEvent};
