//! Publishing sinks for session messages.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::PublishError;

/// Handle to a published message that can be edited later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub String);

impl std::fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Destination for session messages.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Post a new message. Sinks that cannot edit return `None`.
    async fn create(&self, content: &str) -> Result<Option<MessageHandle>, PublishError>;

    /// Replace the content of a previously posted message.
    async fn update(&self, handle: &MessageHandle, content: &str) -> Result<(), PublishError>;
}

/// Writes messages to stdout, one block per message.
#[derive(Debug, Default)]
pub struct StdoutPublisher {
    next_id: AtomicU64,
}

impl StdoutPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_block(&self, header: &str, content: &str) -> Result<(), PublishError> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "--- {} ---", header)?;
        writeln!(out, "{}", content)?;
        out.flush()?;
        Ok(())
    }
}

#[async_trait]
impl Publisher for StdoutPublisher {
    async fn create(&self, content: &str) -> Result<Option<MessageHandle>, PublishError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = MessageHandle(format!("msg-{}", id));
        self.write_block(&handle.0, content)?;
        Ok(Some(handle))
    }

    async fn update(&self, handle: &MessageHandle, content: &str) -> Result<(), PublishError> {
        self.write_block(&format!("{} (edited)", handle), content)
    }
}

/// Keeps messages in memory, in posting order.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<(MessageHandle, String)>>,
    edits: Mutex<HashMap<MessageHandle, usize>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current content of every message.
    pub fn messages(&self) -> Vec<String> {
        self.lock_messages().iter().map(|(_, c)| c.clone()).collect()
    }

    /// Number of times a message was edited.
    pub fn edit_count(&self, handle: &MessageHandle) -> usize {
        self.edits
            .lock()
            .map(|e| e.get(handle).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn lock_messages(&self) -> std::sync::MutexGuard<'_, Vec<(MessageHandle, String)>> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn create(&self, content: &str) -> Result<Option<MessageHandle>, PublishError> {
        let mut messages = self.lock_messages();
        let handle = MessageHandle(format!("msg-{}", messages.len() + 1));
        messages.push((handle.clone(), content.to_string()));
        Ok(Some(handle))
    }

    async fn update(&self, handle: &MessageHandle, content: &str) -> Result<(), PublishError> {
        let mut messages = self.lock_messages();
        let entry = messages
            .iter_mut()
            .find(|(h, _)| h == handle)
            .ok_or_else(|| PublishError::UnknownHandle(handle.to_string()))?;
        entry.1 = content.to_string();
        drop(messages);

        let mut edits = self.edits.lock().unwrap_or_else(|e| e.into_inner());
        *edits.entry(handle.clone()).or_insert(0) += 1;
        Ok(())
    }
}
