//! Tick scheduler: buffers actions per effective tick and feeds them to the
//! engine in total order.
//!
//! # Ordering
//!
//! Pending actions are keyed by effective tick in a `BTreeMap`, so draining
//! always yields ticks in ascending order. Inside one tick, actions are sorted
//! by `(priority descriptor, arrival sequence)`. The arrival sequence is a
//! per-scheduler counter, which makes fully equal descriptors resolve in
//! submission order instead of whatever order a hash or thread happened to
//! produce.
//!
//! # Sequential resolution
//!
//! Actions inside a batch are resolved one at a time against the same
//! session, since each outcome depends on everything applied before it.
//! Only parsing of raw input runs in parallel ([`TickScheduler::submit_raw`]).
//!
//! Actions whose tick is behind the session tick are still queued and handed
//! over; staleness is judged by the engine.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::action::{parse_with_tag_limit, Action, ActionParseError};
use crate::config::SchedulerConfig;
use crate::engine::ResolutionEngine;
use crate::priority::describe;
use crate::resolution::Resolution;
use crate::session::SessionState;

#[derive(Debug, Clone)]
struct Queued {
    arrival: u64,
    action: Action,
}

/// Every action scheduled for one tick, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Effective tick shared by every action.
    pub tick: u64,
    /// Actions in the order they must be resolved.
    pub actions: Vec<Action>,
}

impl Batch {
    /// Number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if the batch holds no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Per-tick action buffer.
#[derive(Debug, Default)]
pub struct TickScheduler {
    config: SchedulerConfig,
    pending: BTreeMap<u64, Vec<Queued>>,
    next_arrival: u64,
}

impl TickScheduler {
    /// A scheduler with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A scheduler with explicit configuration.
    #[must_use]
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Queue a parsed action. Returns its effective tick.
    pub fn submit(&mut self, action: Action) -> u64 {
        let tick = action.effective_tick();
        let arrival = self.next_arrival;
        self.next_arrival += 1;
        self.pending
            .entry(tick)
            .or_default()
            .push(Queued { arrival, action });
        tick
    }

    /// Parse and queue a slice of raw inputs.
    ///
    /// Returns one result per input, in input order: the effective tick of a
    /// queued action, or why the input was discarded. Valid actions are queued
    /// in input order regardless of whether parsing ran in parallel.
    pub fn submit_raw(&mut self, raw: &[Value]) -> Vec<Result<u64, ActionParseError>> {
        let max_tags = self.config.max_metadata_tags;
        let parsed: Vec<Result<Action, ActionParseError>> =
            if raw.len() >= self.config.parallel_ingest_threshold {
                raw.par_iter()
                    .map(|value| parse_with_tag_limit(value, max_tags))
                    .collect()
            } else {
                raw.iter()
                    .map(|value| parse_with_tag_limit(value, max_tags))
                    .collect()
            };

        parsed
            .into_iter()
            .enumerate()
            .map(|(index, result)| match result {
                Ok(action) => Ok(self.submit(action)),
                Err(error) => {
                    warn!(index, %error, "discarded malformed action");
                    Err(error)
                }
            })
            .collect()
    }

    /// Number of queued actions across all ticks.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Ticks with queued actions, ascending.
    #[must_use]
    pub fn pending_ticks(&self) -> Vec<u64> {
        self.pending.keys().copied().collect()
    }

    /// Earliest tick with queued actions.
    #[must_use]
    pub fn next_tick(&self) -> Option<u64> {
        self.pending.keys().next().copied()
    }

    /// Remove every batch with tick `<= tick`, ascending, each in execution
    /// order.
    pub fn drain_through(&mut self, tick: u64) -> Vec<Batch> {
        let drained = match tick.checked_add(1) {
            Some(bound) => {
                let later = self.pending.split_off(&bound);
                std::mem::replace(&mut self.pending, later)
            }
            None => std::mem::take(&mut self.pending),
        };
        drained.into_iter().map(|(t, q)| order_batch(t, q)).collect()
    }

    /// Remove every pending batch.
    pub fn drain_all(&mut self) -> Vec<Batch> {
        self.drain_through(u64::MAX)
    }

    /// Drain every batch with tick `<= tick` and resolve it against `session`.
    ///
    /// Returns one resolution per action, in the order they were resolved.
    #[instrument(level = "debug", skip(self, engine, session), fields(pending = self.pending_len()))]
    pub fn run_through(
        &mut self,
        tick: u64,
        engine: &ResolutionEngine,
        session: &mut SessionState,
    ) -> Vec<Resolution> {
        resolve_batches(self.drain_through(tick), engine, session)
    }

    /// Resolve everything pending.
    pub fn run_all(
        &mut self,
        engine: &ResolutionEngine,
        session: &mut SessionState,
    ) -> Vec<Resolution> {
        self.run_through(u64::MAX, engine, session)
    }
}

fn order_batch(tick: u64, mut queued: Vec<Queued>) -> Batch {
    queued.sort_by_cached_key(|q| (describe(&q.action), q.arrival));
    Batch {
        tick,
        actions: queued.into_iter().map(|q| q.action).collect(),
    }
}

/// Resolve batches in order, one action at a time.
pub fn resolve_batches(
    batches: Vec<Batch>,
    engine: &ResolutionEngine,
    session: &mut SessionState,
) -> Vec<Resolution> {
    batches
        .into_iter()
        .flat_map(|batch| batch.actions)
        .map(|action| engine.handle(&action, session))
        .collect()
}
