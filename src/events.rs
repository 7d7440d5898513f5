//! In-process change notifications.
//!
//! Publishers announce note changes after the mutation has committed. Every
//! subscriber gets its own channel and sees every event published after it
//! subscribed.

use std::cell::RefCell;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::NoteId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
    /// Note metadata or content was written through the store.
    NoteUpdated(NoteId),
    /// Note content was edited in an open editor.
    NoteEdited(NoteId),
}

impl WorkspaceEvent {
    pub fn note_id(&self) -> &NoteId {
        match self {
            WorkspaceEvent::NoteUpdated(id) | WorkspaceEvent::NoteEdited(id) => id,
        }
    }
}

/// Fan-out publisher for [`WorkspaceEvent`]s.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: RefCell<Vec<Sender<WorkspaceEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber. Dropping the receiver unsubscribes it.
    pub fn subscribe(&self) -> Receiver<WorkspaceEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.borrow_mut().push(tx);
        rx
    }

    /// Delivers `event` to every live subscriber.
    pub fn publish(&self, event: WorkspaceEvent) {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        tracing::trace!(?event, subscribers = subscribers.len(), "event published");
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}
