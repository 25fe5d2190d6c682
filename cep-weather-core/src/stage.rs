//! Per-request cancellation scopes and the stage deadlines derived from them.
//!
//! Every inbound request owns a [`RequestScope`]. Each upstream call runs inside a
//! [`StageScope`] carved out of that request scope with its own budget; stages never
//! chain off one another, so the weather stage gets its full budget no matter how long
//! the location stage took. Cancelling the request cancels whichever stage is in flight.

use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::error::UpstreamError;

#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    token: CancellationToken,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the request and every stage derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Guard that cancels the request when dropped, e.g. with an abandoned handler future.
    pub fn cancel_on_drop(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    /// Derive a stage that ends after `budget` or when the request is cancelled.
    pub fn stage(&self, name: &'static str, budget: Duration) -> StageScope {
        let started = Instant::now();
        StageScope {
            name,
            request: self.token.clone(),
            token: self.token.child_token(),
            abandoned: AtomicBool::new(false),
            started,
            deadline: started + budget,
        }
    }
}

/// Why a stage ended before its upstream call settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneCause {
    DeadlineExceeded,
    /// The owning request or the stage itself was cancelled.
    Cancelled,
    /// The stage was abandoned without a stated cause.
    Unknown,
}

impl fmt::Display for DoneCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DoneCause::DeadlineExceeded => "deadline exceeded",
            DoneCause::Cancelled => "cancelled",
            DoneCause::Unknown => "unknown reason",
        })
    }
}

#[derive(Debug)]
pub struct StageScope {
    name: &'static str,
    request: CancellationToken,
    token: CancellationToken,
    abandoned: AtomicBool,
    started: Instant,
    deadline: Instant,
}

impl StageScope {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Cancel this stage only; the request and sibling stages are unaffected.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// End this stage without a cause. Reads as [`DoneCause::Unknown`] unless the
    /// deadline or a request cancel got there first.
    pub fn abandon(&self) {
        self.abandoned.store(true, Ordering::Release);
        self.token.cancel();
    }

    /// Resolves once the deadline passes or the stage is cancelled.
    pub async fn ended(&self) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = tokio::time::sleep_until(self.deadline) => {}
        }
    }

    /// `None` while the stage is still live.
    pub fn done(&self) -> Option<DoneCause> {
        if Instant::now() >= self.deadline {
            Some(DoneCause::DeadlineExceeded)
        } else if self.request.is_cancelled() {
            Some(DoneCause::Cancelled)
        } else if self.abandoned.load(Ordering::Acquire) {
            Some(DoneCause::Unknown)
        } else if self.token.is_cancelled() {
            Some(DoneCause::Cancelled)
        } else {
            None
        }
    }

    /// Classify a finished upstream call against the state of the stage.
    ///
    /// The stage is re-checked after the call returns: if it has ended, the outcome is a
    /// timeout whatever the transport reported, successful body included. A stage that
    /// ended for an unknown reason yields an empty payload instead of an error.
    pub fn settle<T>(
        &self,
        result: Result<Vec<u8>, UpstreamError>,
    ) -> Result<Vec<u8>, StageOutcome<T>> {
        let elapsed = self.elapsed();

        match (self.done(), result) {
            (Some(DoneCause::Unknown), result) => {
                warn!(
                    stage = self.name,
                    ?elapsed,
                    error = ?result.err(),
                    "query abandoned for unknown reason"
                );
                Err(StageOutcome::Empty(EmptyReason::Abandoned))
            }
            (Some(cause), _) => {
                match cause {
                    DoneCause::Cancelled => info!(stage = self.name, ?elapsed, "query cancelled"),
                    _ => warn!(stage = self.name, ?elapsed, "time exceeded to consult supplier"),
                }
                Err(StageOutcome::Failed(StageFailure::TimedOut(cause)))
            }
            (None, Err(err)) => {
                warn!(stage = self.name, ?elapsed, error = %err, "upstream query failed");
                Err(StageOutcome::Failed(StageFailure::Upstream(err)))
            }
            (None, Ok(body)) => {
                debug!(stage = self.name, ?elapsed, bytes = body.len(), "upstream data captured");
                Ok(body)
            }
        }
    }
}

/// Tagged result of one pipeline stage.
#[derive(Debug)]
pub enum StageOutcome<T> {
    Found(T),
    Empty(EmptyReason),
    Failed(StageFailure),
}

impl<T> StageOutcome<T> {
    pub fn found(self) -> Option<T> {
        match self {
            StageOutcome::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// Why a stage produced no usable payload without failing outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// The upstream answered, but without the field that identifies a match.
    NotFound,
    /// The upstream body was not valid for the expected shape.
    Unparseable,
    /// The stage was cancelled for a reason other than deadline or request cancellation.
    Abandoned,
}

#[derive(Debug, thiserror::Error)]
pub enum StageFailure {
    #[error("stage ended ({0}) before the upstream answered")]
    TimedOut(DoneCause),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}
