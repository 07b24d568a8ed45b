//! Network quiescence detection.
//!
//! A page counts as settled once no request has been in flight for a full
//! quiet window. Requests are tracked by id so that a late `Settled` for an
//! unknown id is ignored.

use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    Started(String),
    /// Finished or failed.
    Settled(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdleError {
    #[error("page event stream closed with {inflight} request(s) still in flight")]
    StreamClosed { inflight: usize },
}

#[derive(Debug, Default)]
pub struct InflightRequests {
    ids: HashSet<String>,
}

impl InflightRequests {
    pub fn apply(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Started(id) => {
                self.ids.insert(id);
            }
            NetworkEvent::Settled(id) => {
                self.ids.remove(&id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Resolve once `quiet_window` passes with no request in flight.
///
/// Never times out on its own; callers bound it with the navigation timeout.
pub async fn wait_for_quiescence<S>(events: S, quiet_window: Duration) -> Result<(), IdleError>
where
    S: Stream<Item = NetworkEvent>,
{
    let mut events = Box::pin(events);
    let mut inflight = InflightRequests::default();

    loop {
        if inflight.is_empty() {
            tokio::select! {
                next = events.next() => match next {
                    Some(event) => inflight.apply(event),
                    // Nothing else can start.
                    None => return Ok(()),
                },
                _ = sleep(quiet_window) => return Ok(()),
            }
        } else {
            match events.next().await {
                Some(event) => inflight.apply(event),
                None => {
                    return Err(IdleError::StreamClosed {
                        inflight: inflight.len(),
                    })
                }
            }
        }
    }
}
