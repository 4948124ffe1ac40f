//! Admission control for hub peers.
//!
//! The hub admits one producer and up to `max_subscribers` subscribers.
//! A peer holds its `Seat` for the lifetime of its socket; dropping the seat
//! frees it for the next upgrade.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Which side of the hub a peer connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    Producer,
    Subscriber,
}

impl PeerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Producer => "producer",
            Self::Subscriber => "subscriber",
        }
    }

    /// A second producer conflicts with the current one; extra subscribers
    /// are a capacity problem.
    pub fn rejection_status(&self) -> StatusCode {
        match self {
            Self::Producer => StatusCode::CONFLICT,
            Self::Subscriber => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seats for one peer role.
#[derive(Debug)]
pub struct Admission {
    role: PeerRole,
    seats: usize,
    taken: AtomicUsize,
}

impl Admission {
    pub fn new(role: PeerRole, seats: usize) -> Arc<Self> {
        Arc::new(Self {
            role,
            seats,
            taken: AtomicUsize::new(0),
        })
    }

    /// Exactly one producer at a time.
    pub fn producer() -> Arc<Self> {
        Self::new(PeerRole::Producer, 1)
    }

    pub fn subscribers(max: usize) -> Arc<Self> {
        Self::new(PeerRole::Subscriber, max)
    }

    /// Take a seat, or report why the peer is turned away.
    pub fn admit(self: &Arc<Self>) -> Result<Seat, Rejected> {
        let seats = self.seats;
        self.taken
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |taken| {
                (taken < seats).then_some(taken + 1)
            })
            .map(|_| Seat {
                admission: Arc::clone(self),
            })
            .map_err(|taken| Rejected {
                role: self.role,
                taken,
                seats,
            })
    }

    pub fn taken(&self) -> usize {
        self.taken.load(Ordering::Relaxed)
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }
}

/// An admitted peer. Frees its seat on drop.
#[derive(Debug)]
pub struct Seat {
    admission: Arc<Admission>,
}

impl Drop for Seat {
    fn drop(&mut self) {
        self.admission.taken.fetch_sub(1, Ordering::Release);
    }
}

/// Upgrade refused because every seat for the role is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected {
    pub role: PeerRole,
    pub taken: usize,
    pub seats: usize,
}

impl IntoResponse for Rejected {
    fn into_response(self) -> Response {
        warn!(
            role = self.role.as_str(),
            taken = self.taken,
            seats = self.seats,
            "Rejecting connection, no free seat"
        );
        let body = match self.role {
            PeerRole::Producer => "Producer already connected",
            PeerRole::Subscriber => "Too many connections",
        };
        (self.role.rejection_status(), body).into_response()
    }
}
