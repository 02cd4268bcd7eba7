use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

/// Default age after which an unfinished operation no longer blocks a new
/// attempt of the same kind.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    RenderWindow,
    Annotate,
    Rollup,
    WeeklyDesk,
    Migration,
    IcsRefresh,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::RenderWindow => "render-window",
            OperationKind::Annotate => "annotate",
            OperationKind::Rollup => "rollup",
            OperationKind::WeeklyDesk => "weekly-desk",
            OperationKind::Migration => "migration",
            OperationKind::IcsRefresh => "ics-refresh",
        };
        f.write_str(name)
    }
}

/// Re-entrancy guard: at most one operation of each kind runs at a time.
///
/// A second attempt while one is in flight is refused, unless the running
/// one started more than `stale_after` ago.
#[derive(Debug, Clone)]
pub struct Coordinator {
    in_flight: Arc<Mutex<Claims>>,
    stale_after: Duration,
}

#[derive(Debug, Default)]
struct Claims {
    next_generation: u64,
    running: HashMap<OperationKind, Claim>,
}

#[derive(Debug, Clone, Copy)]
struct Claim {
    started: Instant,
    generation: u64,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER)
    }
}

impl Coordinator {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(Claims::default())),
            stale_after,
        }
    }

    /// Claims `kind`; `None` when another operation of that kind is running.
    pub fn try_begin(&self, kind: OperationKind) -> Option<OperationTicket> {
        let mut claims = self.in_flight.lock();
        let now = Instant::now();
        if let Some(claim) = claims.running.get(&kind) {
            let age = now.saturating_duration_since(claim.started);
            if age < self.stale_after {
                debug!(%kind, ?age, "operation already running; skipping");
                return None;
            }
            debug!(%kind, ?age, generation = claim.generation, "replacing stale operation");
        }
        let generation = claims.next_generation;
        claims.next_generation = generation.wrapping_add(1);
        claims.running.insert(
            kind,
            Claim {
                started: now,
                generation,
            },
        );
        Some(OperationTicket {
            kind,
            generation,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_busy(&self, kind: OperationKind) -> bool {
        self.in_flight
            .lock()
            .running
            .get(&kind)
            .is_some_and(|claim| claim.started.elapsed() < self.stale_after)
    }
}

/// Releases its operation kind when dropped.
#[derive(Debug)]
pub struct OperationTicket {
    kind: OperationKind,
    generation: u64,
    in_flight: Arc<Mutex<Claims>>,
}

impl OperationTicket {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }
}

impl Drop for OperationTicket {
    fn drop(&mut self) {
        let mut claims = self.in_flight.lock();
        // A stale ticket must not release the operation that replaced it.
        if claims
            .running
            .get(&self.kind)
            .is_some_and(|claim| claim.generation == self.generation)
        {
            claims.running.remove(&self.kind);
        }
    }
}
