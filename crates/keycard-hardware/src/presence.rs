//! Presence sources built on top of simpler inputs.
//!
//! - [`PollingPresence`] turns a [`TagPoller`] into a stream of field
//!   snapshots, one per poll interval.
//! - [`LinePresence`] reads a line protocol, used by the emulated reader on
//!   stdin:
//!
//! ```text
//! arrive <id>        a tag entered the field
//! depart             the tag left
//! snapshot [<id>..]  tags visible right now (empty means none)
//! ```

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::time::Instant;
use tracing::{trace, warn};

use keycard_core::Identifier;

use crate::error::{HardwareError, Result};
use crate::traits::{PresenceSource, TagPoller};
use crate::types::{PresenceEvent, TagData};

/// Minimum poll interval in milliseconds.
///
/// Keeps a misconfigured interval from saturating the reader bus.
pub const MIN_POLL_INTERVAL_MS: u64 = 10;

/// Polls a [`TagPoller`] at a fixed interval and reports each result as a
/// [`PresenceEvent::Snapshot`].
#[derive(Debug)]
pub struct PollingPresence<P> {
    poller: P,
    interval: Duration,
    next_poll: Option<Instant>,
}

impl<P: TagPoller> PollingPresence<P> {
    /// Wrap `poller`. Intervals below [`MIN_POLL_INTERVAL_MS`] are raised
    /// to the minimum.
    pub fn new(poller: P, interval: Duration) -> Self {
        let min = Duration::from_millis(MIN_POLL_INTERVAL_MS);
        if interval < min {
            warn!(
                requested_ms = interval.as_millis() as u64,
                min_ms = MIN_POLL_INTERVAL_MS,
                "Poll interval too short, using minimum"
            );
        }
        Self {
            poller,
            interval: interval.max(min),
            next_poll: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn poller_mut(&mut self) -> &mut P {
        &mut self.poller
    }
}

impl<P: TagPoller> PresenceSource for PollingPresence<P> {
    async fn next_event(&mut self) -> Result<PresenceEvent> {
        if let Some(deadline) = self.next_poll {
            tokio::time::sleep_until(deadline).await;
        }
        self.next_poll = Some(Instant::now() + self.interval);

        let uids = self.poller.visible_tags().await?;
        let mut tags = Vec::with_capacity(uids.len());
        for uid in uids {
            match TagData::from_uid(&uid) {
                Ok(tag) => tags.push(tag),
                Err(err) => warn!(uid_len = uid.len(), error = %err, "Ignoring unreadable tag UID"),
            }
        }
        trace!(count = tags.len(), "Field polled");
        Ok(PresenceEvent::Snapshot(tags))
    }
}

/// Presence source reading the line protocol from any buffered reader.
pub struct LinePresence {
    lines: Lines<Box<dyn AsyncBufRead + Unpin + Send>>,
}

impl LinePresence {
    pub fn new(reader: impl AsyncBufRead + Unpin + Send + 'static) -> Self {
        let reader: Box<dyn AsyncBufRead + Unpin + Send> = Box::new(reader);
        Self {
            lines: reader.lines(),
        }
    }

    /// Read events from the process's standard input.
    pub fn stdin() -> Self {
        Self::new(tokio::io::BufReader::new(tokio::io::stdin()))
    }
}

impl std::fmt::Debug for LinePresence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinePresence").finish_non_exhaustive()
    }
}

impl PresenceSource for LinePresence {
    async fn next_event(&mut self) -> Result<PresenceEvent> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Err(HardwareError::disconnected("presence input closed"));
            };
            if let Some(event) = parse_line(&line)? {
                return Ok(event);
            }
        }
    }
}

fn parse_id(text: &str) -> Result<TagData> {
    Identifier::parse(text)
        .map(TagData::new)
        .map_err(|err| HardwareError::invalid_data(err.to_string()))
}

/// Parse one protocol line. Blank lines and `#` comments yield `None`.
fn parse_line(line: &str) -> Result<Option<PresenceEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (command, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(command, rest)| (command, rest.trim()));

    let event = match command.to_ascii_lowercase().as_str() {
        "arrive" if !rest.is_empty() => PresenceEvent::Arrived(parse_id(rest)?),
        "depart" if rest.is_empty() => PresenceEvent::Departed,
        "snapshot" => PresenceEvent::Snapshot(
            rest.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(parse_id)
                .collect::<Result<Vec<_>>>()?,
        ),
        _ => {
            return Err(HardwareError::invalid_data(format!(
                "unrecognized presence command: {line:?}"
            )));
        }
    };
    Ok(Some(event))
}
