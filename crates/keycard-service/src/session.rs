//! Card presence session tracking.
//!
//! Readers report the same seated card over and over: an event-driven
//! reader may repeat its arrival, a polled reader sees it on every poll.
//! [`SessionTracker`] collapses those reports into one logical arrival per
//! card and one departure when it leaves, so a card resting on the reader
//! is only ever authenticated once.

use keycard_core::Identifier;
use keycard_hardware::{PresenceEvent, TagData};
use tracing::{debug, info};

/// A change in which card is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    /// A new card arrived. Any previous card is implicitly gone.
    Arrived(Identifier),

    /// The card left the field.
    Departed(Identifier),
}

/// Deduplicates presence reports into arrivals and departures.
///
/// # Examples
///
/// ```
/// use keycard_core::Identifier;
/// use keycard_hardware::{PresenceEvent, TagData};
/// use keycard_service::session::{SessionChange, SessionTracker};
///
/// let mut tracker = SessionTracker::new(1);
/// let card = Identifier::parse("AABBCCDD").unwrap();
///
/// let seen = || PresenceEvent::Arrived(TagData::new(card.clone()));
/// assert_eq!(tracker.observe(seen()), Some(SessionChange::Arrived(card.clone())));
/// assert_eq!(tracker.observe(seen()), None);
/// assert_eq!(tracker.observe(PresenceEvent::Departed), Some(SessionChange::Departed(card)));
/// ```
#[derive(Debug)]
pub struct SessionTracker {
    current: Option<Identifier>,
    empty_polls: u32,
    departure_threshold: u32,
}

impl SessionTracker {
    /// Create a tracker that infers departure after `departure_threshold`
    /// consecutive empty snapshots (at least 1).
    pub fn new(departure_threshold: u32) -> Self {
        Self {
            current: None,
            empty_polls: 0,
            departure_threshold: departure_threshold.max(1),
        }
    }

    /// Card currently on the reader.
    pub fn current(&self) -> Option<&Identifier> {
        self.current.as_ref()
    }

    /// Feed one presence report. Returns the session change it causes, if
    /// any.
    pub fn observe(&mut self, event: PresenceEvent) -> Option<SessionChange> {
        match event {
            PresenceEvent::Arrived(tag) => self.seen(tag.id),
            PresenceEvent::Departed => self.depart(),
            PresenceEvent::Snapshot(tags) => self.snapshot(tags),
        }
    }

    fn seen(&mut self, id: Identifier) -> Option<SessionChange> {
        self.empty_polls = 0;

        if self.current.as_ref() == Some(&id) {
            debug!(uid = %id, "Tag still present");
            return None;
        }

        info!(uid = %id, "Tag arrived");
        self.current = Some(id.clone());
        Some(SessionChange::Arrived(id))
    }

    fn depart(&mut self) -> Option<SessionChange> {
        self.empty_polls = 0;
        let id = self.current.take()?;
        info!(uid = %id, "Tag departed");
        Some(SessionChange::Departed(id))
    }

    fn snapshot(&mut self, tags: Vec<TagData>) -> Option<SessionChange> {
        if tags.is_empty() {
            self.current.as_ref()?;
            self.empty_polls += 1;
            if self.empty_polls >= self.departure_threshold {
                return self.depart();
            }
            return None;
        }

        let current_visible = self
            .current
            .as_ref()
            .is_some_and(|current| tags.iter().any(|tag| &tag.id == current));
        if current_visible {
            self.empty_polls = 0;
            return None;
        }

        let first = tags.into_iter().next()?;
        self.seen(first.id)
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new(keycard_core::constants::DEFAULT_DEPARTURE_THRESHOLD)
    }
}
