//! Debounced hydration of the notes visible in a list viewport.
//!
//! The owner reports which note ids are on screen and calls [`poll`] from
//! its event loop. Bursts of viewport changes collapse into one
//! `get_by_ids` query; the results land in a bounded FIFO cache that the UI
//! reads from.
//!
//! [`poll`]: ViewportDataLoader::poll

use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use crate::cache::{self, EvictingMap};
use crate::events::WorkspaceEvent;
use crate::{Note, NoteId, NoteRepository, Result};

/// Default quiet period before a scheduled hydration runs.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(120);

pub struct ViewportDataLoader<R> {
    notes: R,
    cache: EvictingMap<NoteId, Note>,
    visible: Vec<NoteId>,
    debounce: Duration,
    /// When the most recent request was made, if a hydration is scheduled.
    pending_since: Option<Instant>,
    hydrated_once: bool,
}

impl<R: NoteRepository> ViewportDataLoader<R> {
    /// Creates a loader with the default cache capacity and debounce window.
    pub fn new(notes: R) -> Self {
        Self::with_settings(notes, cache::DEFAULT_CAPACITY, DEFAULT_DEBOUNCE)
    }

    pub fn with_settings(notes: R, capacity: usize, debounce: Duration) -> Self {
        Self {
            notes,
            cache: EvictingMap::new(capacity),
            visible: Vec::new(),
            debounce,
            pending_since: None,
            hydrated_once: false,
        }
    }

    pub fn cache(&self) -> &EvictingMap<NoteId, Note> {
        &self.cache
    }

    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.cache.get(id)
    }

    pub fn visible(&self) -> &[NoteId] {
        &self.visible
    }

    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Records the ids currently on screen and schedules a hydration.
    ///
    /// An unchanged list is ignored. An empty list cancels any pending
    /// hydration instead of running it. The very first request hydrates
    /// immediately; later ones wait for the debounce window to pass.
    pub fn set_visible(&mut self, ids: Vec<NoteId>) -> Result<()> {
        if ids == self.visible {
            return Ok(());
        }
        self.visible = ids;

        if self.visible.is_empty() {
            self.cancel();
            return Ok(());
        }

        if !self.hydrated_once {
            return self.hydrate();
        }
        self.schedule();
        Ok(())
    }

    /// Drops a scheduled hydration without running it.
    pub fn cancel(&mut self) {
        if self.pending_since.take().is_some() {
            tracing::trace!("pending hydration cancelled");
        }
    }

    /// Runs the scheduled hydration if its debounce window has passed.
    ///
    /// Returns whether a hydration ran.
    pub fn poll(&mut self) -> Result<bool> {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> Result<bool> {
        match self.pending_since {
            Some(since) if now.saturating_duration_since(since) >= self.debounce => {
                self.hydrate()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Invalidates a cached note after a change notification.
    ///
    /// Notes that are not cached are ignored. Returns whether the cache
    /// entry was dropped.
    pub fn handle_event(&mut self, event: &WorkspaceEvent) -> bool {
        let id = event.note_id();
        if !self.cache.has(id) {
            return false;
        }

        self.cache.delete([id]);
        tracing::trace!(note_id = %id, "cached note invalidated");
        self.schedule();
        true
    }

    /// Handles every event queued on a bus subscription.
    ///
    /// Returns how many cache entries were invalidated.
    pub fn drain_events(&mut self, events: &Receiver<WorkspaceEvent>) -> usize {
        events
            .try_iter()
            .filter(|event| self.handle_event(event))
            .count()
    }

    fn schedule(&mut self) {
        if self.visible.is_empty() {
            return;
        }
        self.pending_since = Some(Instant::now());
    }

    /// Loads the visible notes into the cache.
    ///
    /// On failure the hydration stays scheduled, so the next due `poll`
    /// retries it even if the visible set never changes.
    fn hydrate(&mut self) -> Result<()> {
        let loaded = match self.notes.get_by_ids(&self.visible) {
            Ok(loaded) => loaded,
            Err(err) => {
                tracing::warn!(error = %err, requested = self.visible.len(), "viewport hydration failed");
                self.pending_since = Some(Instant::now());
                return Err(err);
            }
        };
        self.pending_since = None;
        self.hydrated_once = true;

        tracing::debug!(requested = self.visible.len(), loaded = loaded.len(), "viewport hydrated");
        if !loaded.is_empty() {
            self.cache
                .add(loaded.into_iter().map(|note| (note.id().clone(), note)));
        }
        Ok(())
    }
}
