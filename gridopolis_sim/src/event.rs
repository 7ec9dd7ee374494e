// Discrete-event scheduler: the engine that drives the simulation clock.
//
// Actions are queued at absolute step numbers (measured from the scheduler's
// start time) in a priority queue ordered by `(target_step, sequence)`. The
// sequence is a monotonic counter assigned on every insertion, including
// reinsertion after an action reschedules itself, so ties within a step
// resolve in insertion order.
//
// One call to `step` drains every entry whose target is at or before the
// current step, runs each, re-queues those that return a positive interval
// at `target_step + interval`, and then advances the current step by exactly
// one. Every ready entry targets the current step, so a re-queued action
// always lands in a later step and runs at most once per call. Empty steps
// are free.
//
// The scheduler is generic over the action type. `CityModel` queues the
// small `ScheduledAction` enum and dispatches it itself, which lets an
// action mutate the rest of the model without the scheduler holding a
// reference to it. External callers plug in through the `SimAction` trait.
//
// See also: `time.rs` for `SimTime`, `city.rs` for the dispatch loop and the
// standing period actions.
//
// **Critical constraint: determinism.** The `(target_step, sequence)` key
// is a total order, so execution order never depends on heap internals.

use crate::error::ContractViolation;
use crate::time::SimTime;
use crate::types::{ActionId, ZoneId};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// An externally supplied action. Returns the number of steps until it
/// should run again; zero or negative drops it from the queue.
pub trait SimAction {
    fn do_action(&mut self, now: SimTime) -> i64;
}

impl<F> SimAction for F
where
    F: FnMut(SimTime) -> i64,
{
    fn do_action(&mut self, now: SimTime) -> i64 {
        self(now)
    }
}

/// What the city model keeps in its queue. Equality is identity: two
/// `ZoneUpdate`s are the same action only if they name the same zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScheduledAction {
    /// Start of a period: reset the census accumulators.
    PeriodInit,
    /// Last step of a period: publish the accumulated census.
    PeriodEnd,
    /// Weekly population update for one zone.
    ZoneUpdate { zone: ZoneId },
    /// A caller-registered `SimAction`.
    External(ActionId),
}

// ---------------------------------------------------------------------------
// Queue entries
// ---------------------------------------------------------------------------

/// An action waiting in the queue.
#[derive(Clone, Debug)]
pub struct ScheduledEntry<A> {
    /// Absolute step at which this entry fires.
    pub target_step: i64,
    /// Insertion order; breaks ties within a step. Lower runs first.
    pub sequence: u64,
    pub action: A,
}

// We want a min-heap: lowest (target_step, sequence) fires first.
// Rust's BinaryHeap is a max-heap, so we reverse the ordering.
impl<A> PartialEq for ScheduledEntry<A> {
    fn eq(&self, other: &Self) -> bool {
        self.target_step == other.target_step && self.sequence == other.sequence
    }
}

impl<A> Eq for ScheduledEntry<A> {}

impl<A> PartialOrd for ScheduledEntry<A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<A> Ord for ScheduledEntry<A> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse: smallest (target_step, sequence) is "greatest" for the max-heap.
        other
            .target_step
            .cmp(&self.target_step)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Scheduler<A> {
    start: SimTime,
    /// Step currently being (or about to be) processed. Starts at 0.
    current_step: i64,
    heap: BinaryHeap<ScheduledEntry<A>>,
    /// Monotonic counter for deterministic ordering within a step.
    next_sequence: u64,
}

impl<A> Scheduler<A> {
    /// A scheduler whose step 0 is `start`.
    pub fn new(start: SimTime) -> Self {
        Self {
            start,
            current_step: 0,
            heap: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    pub fn start_time(&self) -> SimTime {
        self.start
    }

    pub fn current_step(&self) -> i64 {
        self.current_step
    }

    pub fn current_time(&self) -> SimTime {
        self.start.plus_steps(self.current_step)
    }

    /// Queue `action` to run at `time`. Scheduling before the current step
    /// is a contract violation.
    pub fn add_action(&mut self, time: &SimTime, action: A) -> Result<(), ContractViolation> {
        let target = time.diff(&self.start);
        self.add_at_step(target, action)
    }

    /// Queue `action` at an absolute step number.
    pub fn add_at_step(&mut self, target_step: i64, action: A) -> Result<(), ContractViolation> {
        if target_step < self.current_step {
            let err = ContractViolation::ScheduledInPast {
                target: target_step,
                current: self.current_step,
            };
            tracing::error!(%err, "rejected scheduling request");
            return Err(err);
        }
        self.push(target_step, action);
        Ok(())
    }

    fn push(&mut self, target_step: i64, action: A) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(ScheduledEntry {
            target_step,
            sequence,
            action,
        });
    }

    /// Remove the earliest queued entry whose action matches `pred`. At most
    /// one entry is removed. Returns whether anything was.
    pub fn remove_first(&mut self, mut pred: impl FnMut(&A) -> bool) -> bool {
        let mut entries = std::mem::take(&mut self.heap).into_vec();
        // The heap is reversed, so the earliest entry compares greatest.
        let found = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| pred(&e.action))
            .max_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(i, _)| i);
        if let Some(i) = found {
            entries.swap_remove(i);
        }
        self.heap = BinaryHeap::from(entries);
        found.is_some()
    }

    /// Pop the next entry if its target step has been reached.
    pub fn pop_ready(&mut self) -> Option<ScheduledEntry<A>> {
        if self
            .heap
            .peek()
            .is_some_and(|e| e.target_step <= self.current_step)
        {
            self.heap.pop()
        } else {
            None
        }
    }

    /// Re-queue an entry that just ran, `interval` steps after its target.
    /// A non-positive interval drops it. Returns whether it was re-queued.
    pub fn reschedule(&mut self, entry: ScheduledEntry<A>, interval: i64) -> bool {
        if interval > 0 {
            self.push(entry.target_step + interval, entry.action);
            true
        } else {
            false
        }
    }

    /// Close out the current step. Call once after `pop_ready` runs dry.
    pub fn finish_step(&mut self) {
        tracing::trace!(step = self.current_step, pending = self.heap.len(), "step complete");
        self.current_step += 1;
    }

    /// Run one full step, handing each ready action to `run` along with the
    /// current time. Returns how many actions ran.
    pub fn step(&mut self, mut run: impl FnMut(&mut A, SimTime) -> i64) -> usize {
        let now = self.current_time();
        let mut ran = 0;
        while let Some(mut entry) = self.pop_ready() {
            let interval = run(&mut entry.action, now);
            self.reschedule(entry, interval);
            ran += 1;
        }
        self.finish_step();
        ran
    }

    /// Step of the earliest pending entry.
    pub fn peek_step(&self) -> Option<i64> {
        self.heap.peek().map(|e| e.target_step)
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pending entries in no particular order.
    pub fn pending(&self) -> impl Iterator<Item = &ScheduledEntry<A>> {
        self.heap.iter()
    }
}

impl<A: PartialEq> Scheduler<A> {
    /// Remove the earliest queued occurrence of `action`, if any.
    pub fn remove_action(&mut self, action: &A) -> bool {
        self.remove_first(|a| a == action)
    }

    /// How many queued entries hold `action`.
    pub fn count(&self, action: &A) -> usize {
        self.heap.iter().filter(|e| e.action == *action).count()
    }
}

impl Scheduler<Box<dyn SimAction>> {
    /// Run one step for a queue of boxed trait objects.
    pub fn step_actions(&mut self) -> usize {
        self.step(|action, now| action.do_action(now))
    }
}
