//! Editor session: one mounted editor bound to one host entry
//!
//! The session owns the editor document, the debounce scheduler and a single
//! writer task. Settled changes flow from the scheduler to the writer, which
//! converts the document, consults the version guard and commits through the
//! content bridge. Only the writer talks to the host after load, so two
//! debounce cycles never overlap at the host.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::assets::{self, Asset};
use crate::bridge::{CommitReceipt, ContentBridge};
use crate::config::EditorConfig;
use crate::convert::RoundTripConverter;
use crate::error::{InkbridgeError, Result};
use crate::guard::{GuardDecision, Lifecycle, VersionGuard};
use crate::history::EditHistory;
use crate::host::{AssetPicker, EntryHost};
use crate::scheduler::{SchedulerState, SettleReceiver, WriteBackScheduler};

const EVENT_CAPACITY: usize = 64;

/// Outcome of a settled debounce cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// The load echo settled unchanged; nothing was written
    Suppressed,
    /// The body was written to the host
    Committed { version: u64, recently_published: bool },
    /// The host already held this body
    Unchanged { version: u64 },
    /// The commit failed; the document keeps the unsaved change
    WriteFailed { message: String },
}

/// Editor document: the HTML the widget shows plus its undo history
#[derive(Debug)]
struct Document {
    html: String,
    history: EditHistory,
}

/// State shared between the session handle and its writer task
struct SessionShared<H: EntryHost> {
    session_id: Uuid,
    entry_id: String,
    bridge: ContentBridge<H>,
    converter: RoundTripConverter,
    verify_round_trip: bool,
    document: Mutex<Document>,
    guard: Mutex<VersionGuard>,
    events: broadcast::Sender<SessionEvent>,
}

impl<H: EntryHost> SessionShared<H> {
    fn document(&self) -> Result<MutexGuard<'_, Document>> {
        self.document
            .lock()
            .map_err(|_| InkbridgeError::session("document lock poisoned"))
    }

    fn guard(&self) -> Result<MutexGuard<'_, VersionGuard>> {
        self.guard
            .lock()
            .map_err(|_| InkbridgeError::session("guard lock poisoned"))
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    /// Handle one settled debounce cycle
    async fn flush(&self, epoch: u64) {
        let event = match self.write_back(epoch).await {
            Ok(Some(CommitReceipt::Committed {
                version,
                recently_published,
            })) => SessionEvent::Committed {
                version,
                recently_published,
            },
            Ok(Some(CommitReceipt::Unchanged { version })) => SessionEvent::Unchanged { version },
            Ok(None) => SessionEvent::Suppressed,
            Err(e) => {
                tracing::error!(
                    "Session {} failed to write entry {}: {}",
                    self.session_id,
                    self.entry_id,
                    e
                );
                SessionEvent::WriteFailed {
                    message: e.to_string(),
                }
            }
        };
        self.emit(event);
    }

    async fn write_back(&self, epoch: u64) -> Result<Option<CommitReceipt>> {
        let html = self.document()?.html.clone();
        let markdown = self.converter.to_markdown(&html);

        let decision = self.guard()?.on_settle(markdown);
        let markdown = match decision {
            GuardDecision::Suppress => {
                tracing::debug!("Session {} suppressed load echo (epoch {})", self.session_id, epoch);
                return Ok(None);
            }
            GuardDecision::Commit(markdown) => markdown,
        };

        if self.verify_round_trip {
            if let Err(e) = self.converter.verify_markdown(&markdown) {
                tracing::warn!("Entry {} body does not round-trip cleanly: {}", self.entry_id, e);
            }
        }

        tracing::debug!("Session {} committing epoch {}", self.session_id, epoch);
        self.bridge.commit(&self.entry_id, &markdown).await.map(Some)
    }
}

/// Writer task: executes every flush of a session in order
async fn write_back_loop<H: EntryHost>(shared: Arc<SessionShared<H>>, mut settled: SettleReceiver) {
    while let Some(epoch) = settled.next().await {
        shared.flush(epoch).await;
    }
    tracing::debug!("Writer for session {} stopped", shared.session_id);
}

/// A mounted editor bound to one host entry
pub struct EditorSession<H: EntryHost + 'static> {
    /// Unique session identifier
    pub id: Uuid,
    /// When the session was mounted
    pub created_at: SystemTime,
    config: EditorConfig,
    shared: Arc<SessionShared<H>>,
    scheduler: WriteBackScheduler,
    writer: JoinHandle<()>,
}

impl<H: EntryHost + 'static> EditorSession<H> {
    /// Load the entry and start editing it.
    ///
    /// Installing the loaded document arms the scheduler once. If nothing
    /// changed by the time it settles, that load echo is suppressed by the
    /// guard and never reaches the host.
    pub async fn mount(host: Arc<H>, entry_id: &str, config: EditorConfig) -> Result<Self> {
        config.validate()?;

        let session_id = Uuid::new_v4();
        let converter = RoundTripConverter::from_config(&config);
        let bridge = ContentBridge::new(
            host,
            config.field_id.clone(),
            config.locale.clone(),
            config.publish_slack,
        );

        let (_entry, html) = bridge.load(entry_id, &converter).await?;
        let echo = converter.to_markdown(&html);

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(SessionShared {
            session_id,
            entry_id: entry_id.to_string(),
            bridge,
            converter,
            verify_round_trip: config.verify_round_trip,
            document: Mutex::new(Document {
                html,
                history: EditHistory::new(&config.history),
            }),
            guard: Mutex::new(VersionGuard::expecting_echo(echo)),
            events,
        });

        let (mut scheduler, settled) = WriteBackScheduler::new(config.quiet_window());
        let writer = tokio::spawn(write_back_loop(shared.clone(), settled));
        scheduler.arm();

        tracing::info!("Mounted session {} on entry {}", session_id, entry_id);
        Ok(Self {
            id: session_id,
            created_at: SystemTime::now(),
            config,
            shared,
            scheduler,
            writer,
        })
    }

    pub fn entry_id(&self) -> &str {
        &self.shared.entry_id
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Current editor HTML
    pub fn html(&self) -> Result<String> {
        Ok(self.shared.document()?.html.clone())
    }

    pub fn lifecycle(&self) -> Result<Lifecycle> {
        Ok(self.shared.guard()?.lifecycle())
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Receive the outcome of every settled debounce cycle
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Editor change event carrying the widget's current HTML
    pub fn on_change<S: Into<String>>(&mut self, html: S) -> Result<()> {
        let html = html.into();
        {
            let mut document = self.shared.document()?;
            let previous = std::mem::replace(&mut document.html, html);
            let Document { html, history } = &mut *document;
            history.record(&previous, html.as_str());
        }
        self.scheduler.arm();
        Ok(())
    }

    /// Ask the picker for assets and insert them at the caret.
    ///
    /// Returns the number of inserted assets; a cancelled picker inserts
    /// nothing and leaves the scheduler alone.
    pub async fn insert_assets<P: AssetPicker + ?Sized>(
        &mut self,
        picker: &P,
        caret: usize,
    ) -> Result<usize> {
        let Some(records) = picker.select_assets().await? else {
            tracing::debug!("Asset selection cancelled");
            return Ok(0);
        };

        let locale = &self.config.locale;
        let assets: Vec<Asset> = records
            .iter()
            .filter_map(|record| {
                let asset = Asset::from_record(record, locale);
                if asset.is_none() {
                    tracing::warn!("Skipping asset without a {} file", locale);
                }
                asset
            })
            .collect();

        self.insert_assets_at(caret, &assets)
    }

    /// Insert already resolved assets at the caret
    pub fn insert_assets_at(&mut self, caret: usize, assets: &[Asset]) -> Result<usize> {
        if assets.is_empty() {
            return Ok(0);
        }

        let html = assets::insert_assets(&self.html()?, caret, assets)?;
        self.on_change(html)?;
        tracing::debug!("Inserted {} assets at caret {}", assets.len(), caret);
        Ok(assets.len())
    }

    /// Undo the last change; returns false when there is nothing to undo
    pub fn undo(&mut self) -> Result<bool> {
        let restored = {
            let mut document = self.shared.document()?;
            match document.history.undo() {
                Some(html) => {
                    document.html = html;
                    true
                }
                None => false,
            }
        };
        if restored {
            self.scheduler.arm();
        }
        Ok(restored)
    }

    /// Redo the last undone change; returns false when there is nothing to redo
    pub fn redo(&mut self) -> Result<bool> {
        let restored = {
            let mut document = self.shared.document()?;
            match document.history.redo() {
                Some(html) => {
                    document.html = html;
                    true
                }
                None => false,
            }
        };
        if restored {
            self.scheduler.arm();
        }
        Ok(restored)
    }

    /// Tear the session down.
    ///
    /// A pending debounce is cancelled without writing; a commit already in
    /// flight is allowed to finish.
    pub async fn unmount(self) -> Result<()> {
        let Self {
            id,
            mut scheduler,
            writer,
            ..
        } = self;

        if scheduler.cancel() {
            tracing::debug!("Session {} dropped an unflushed change on unmount", id);
        }
        drop(scheduler);

        writer
            .await
            .map_err(|e| InkbridgeError::session(format!("writer task failed: {}", e)))?;
        tracing::info!("Unmounted session {}", id);
        Ok(())
    }
}
