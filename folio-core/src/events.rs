use std::sync::mpsc::Sender;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReaderEvent {
    #[serde(rename_all = "camelCase")]
    Initialized {
        total_pages: usize,
        total_chapters: usize,
    },
    #[serde(rename_all = "camelCase")]
    PageChanged {
        /// 1-based.
        current_page: usize,
        total_pages: usize,
        chapter_title: String,
    },
    SettingsChanged { settings: Settings },
    CriticalError { message: String },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: ReaderEvent);
}

impl<F> EventSink for F
where
    F: Fn(ReaderEvent) + Send + Sync,
{
    fn emit(&self, event: ReaderEvent) {
        self(event)
    }
}

/// Sink that drops everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: ReaderEvent) {}
}

/// Shared, append-only event buffer that hosts drain between frames.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ReaderEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<ReaderEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn snapshot(&self) -> Vec<ReaderEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: ReaderEvent) {
        self.events.lock().push(event);
    }
}

/// Forwards events over a channel; a closed receiver is ignored.
pub struct ChannelSink {
    sender: Mutex<Sender<ReaderEvent>>,
}

impl ChannelSink {
    pub fn new(sender: Sender<ReaderEvent>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ReaderEvent) {
        let _ = self.sender.lock().send(event);
    }
}
