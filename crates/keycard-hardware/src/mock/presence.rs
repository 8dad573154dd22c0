//! Mock presence sources for testing and development.
//!
//! [`MockPresence`] is event driven: the handle pushes arrivals and
//! departures through a channel. [`MockTagPoller`] models a polled reader:
//! the handle places tags into and removes them from a simulated field.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use keycard_core::Identifier;
use tokio::sync::mpsc;

use crate::error::{HardwareError, Result};
use crate::traits::{PresenceSource, TagPoller};
use crate::types::{PresenceEvent, TagData};

#[derive(Debug)]
enum MockEvent {
    Event(PresenceEvent),
    Failure(String),
}

fn parse(id: &str) -> Result<Identifier> {
    Identifier::parse(id).map_err(|err| HardwareError::invalid_data(err.to_string()))
}

/// Event-driven mock presence source.
///
/// # Examples
///
/// ```
/// use keycard_hardware::mock::MockPresence;
/// use keycard_hardware::traits::PresenceSource;
/// use keycard_hardware::PresenceEvent;
///
/// #[tokio::main]
/// async fn main() -> keycard_hardware::Result<()> {
///     let (mut source, handle) = MockPresence::new();
///
///     handle.arrive("aa bb cc dd").await?;
///     match source.next_event().await? {
///         PresenceEvent::Arrived(tag) => assert_eq!(tag.id.as_str(), "AABBCCDD"),
///         other => panic!("unexpected event {other:?}"),
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockPresence {
    event_rx: mpsc::Receiver<MockEvent>,
}

impl MockPresence {
    /// Create a new mock source and the handle that feeds it.
    pub fn new() -> (Self, MockPresenceHandle) {
        let (event_tx, event_rx) = mpsc::channel(32);
        (Self { event_rx }, MockPresenceHandle { event_tx })
    }
}

impl PresenceSource for MockPresence {
    async fn next_event(&mut self) -> Result<PresenceEvent> {
        let event = self
            .event_rx
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected("presence event channel closed"))?;

        match event {
            MockEvent::Event(event) => Ok(event),
            MockEvent::Failure(message) => Err(HardwareError::tag_read(message)),
        }
    }
}

/// Handle for driving a [`MockPresence`].
///
/// Dropping every handle ends the source.
#[derive(Debug, Clone)]
pub struct MockPresenceHandle {
    event_tx: mpsc::Sender<MockEvent>,
}

impl MockPresenceHandle {
    async fn send(&self, event: MockEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| HardwareError::disconnected("presence event channel closed"))
    }

    /// Report a tag entering the field.
    pub async fn arrive(&self, id: &str) -> Result<()> {
        let tag = TagData::new(parse(id)?);
        self.send(MockEvent::Event(PresenceEvent::Arrived(tag))).await
    }

    /// Report the tag leaving the field.
    pub async fn depart(&self) -> Result<()> {
        self.send(MockEvent::Event(PresenceEvent::Departed)).await
    }

    /// Report the tags visible at one polling instant.
    pub async fn snapshot(&self, ids: &[&str]) -> Result<()> {
        let tags = ids
            .iter()
            .map(|id| parse(id).map(TagData::new))
            .collect::<Result<Vec<_>>>()?;
        self.send(MockEvent::Event(PresenceEvent::Snapshot(tags))).await
    }

    /// Make the next read fail with a transient error.
    pub async fn fail(&self, message: impl Into<String>) -> Result<()> {
        self.send(MockEvent::Failure(message.into())).await
    }
}

#[derive(Debug, Default)]
struct Field {
    tags: Vec<Vec<u8>>,
    failures: VecDeque<String>,
    polls: usize,
}

fn lock(field: &Mutex<Field>) -> MutexGuard<'_, Field> {
    field.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock polled reader exposing a simulated RF field.
#[derive(Debug)]
pub struct MockTagPoller {
    field: Arc<Mutex<Field>>,
}

impl MockTagPoller {
    pub fn new() -> (Self, MockTagPollerHandle) {
        let field = Arc::new(Mutex::new(Field::default()));
        (
            Self {
                field: Arc::clone(&field),
            },
            MockTagPollerHandle { field },
        )
    }
}

impl TagPoller for MockTagPoller {
    async fn visible_tags(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut field = lock(&self.field);
        field.polls += 1;
        if let Some(message) = field.failures.pop_front() {
            return Err(HardwareError::tag_read(message));
        }
        Ok(field.tags.clone())
    }
}

/// Handle for controlling a [`MockTagPoller`]'s field.
#[derive(Debug, Clone)]
pub struct MockTagPollerHandle {
    field: Arc<Mutex<Field>>,
}

impl MockTagPollerHandle {
    /// Put a tag into the field.
    pub fn place(&self, uid: impl Into<Vec<u8>>) {
        let uid = uid.into();
        let mut field = lock(&self.field);
        if !field.tags.contains(&uid) {
            field.tags.push(uid);
        }
    }

    /// Take a tag out of the field.
    pub fn remove(&self, uid: &[u8]) {
        lock(&self.field).tags.retain(|tag| tag != uid);
    }

    /// Empty the field.
    pub fn clear(&self) {
        lock(&self.field).tags.clear();
    }

    /// Make the next poll fail.
    pub fn fail_next(&self, message: impl Into<String>) {
        lock(&self.field).failures.push_back(message.into());
    }

    /// Number of polls performed so far.
    pub fn polls(&self) -> usize {
        lock(&self.field).polls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_in_order() {
        let (mut source, handle) = MockPresence::new();
        handle.arrive("AABBCCDD").await.unwrap();
        handle.depart().await.unwrap();
        handle.snapshot(&["11223344"]).await.unwrap();

        assert!(matches!(
            source.next_event().await.unwrap(),
            PresenceEvent::Arrived(_)
        ));
        assert_eq!(source.next_event().await.unwrap(), PresenceEvent::Departed);
        match source.next_event().await.unwrap() {
            PresenceEvent::Snapshot(tags) => {
                assert_eq!(tags.len(), 1);
                assert_eq!(tags[0].id.as_str(), "11223344");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_is_transient() {
        let (mut source, handle) = MockPresence::new();
        handle.fail("CRC error").await.unwrap();
        handle.depart().await.unwrap();

        let err = source.next_event().await.unwrap_err();
        assert!(!err.is_disconnected());
        assert_eq!(source.next_event().await.unwrap(), PresenceEvent::Departed);
    }

    #[tokio::test]
    async fn test_dropped_handle_disconnects() {
        let (mut source, handle) = MockPresence::new();
        drop(handle);
        assert!(source.next_event().await.unwrap_err().is_disconnected());
    }

    #[tokio::test]
    async fn test_invalid_identifier_rejected() {
        let (_source, handle) = MockPresence::new();
        assert!(handle.arrive("not-a-card!").await.is_err());
    }

    #[tokio::test]
    async fn test_poller_field() {
        let (mut poller, handle) = MockTagPoller::new();
        assert!(poller.visible_tags().await.unwrap().is_empty());

        handle.place(vec![0xAA, 0xBB, 0xCC, 0xDD]);
        handle.place(vec![0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(poller.visible_tags().await.unwrap().len(), 1);

        handle.fail_next("collision");
        assert!(poller.visible_tags().await.is_err());

        handle.remove(&[0xAA, 0xBB, 0xCC, 0xDD]);
        assert!(poller.visible_tags().await.unwrap().is_empty());
        assert_eq!(handle.polls(), 4);
    }
}
