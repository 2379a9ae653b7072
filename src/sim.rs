//! Virtual clock and event scheduler.
//!
//! The simulation is a single-threaded discrete-event loop: actions are
//! registered at a virtual timestamp and executed in non-decreasing
//! timestamp order. Actions scheduled for the same timestamp fire in the
//! order they were registered (FIFO by scheduling sequence). An action runs
//! to completion before the next one starts, and may schedule further
//! actions while it runs. There is no cancellation primitive.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

/// A point in virtual time, counted in nanoseconds from simulation start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    pub const fn from_nanos(nanos: u64) -> SimTime {
        SimTime(nanos)
    }

    pub const fn from_micros(micros: u64) -> SimTime {
        SimTime(micros * 1_000)
    }

    pub const fn from_millis(millis: u64) -> SimTime {
        SimTime(millis * 1_000_000)
    }

    pub const fn from_secs(secs: u64) -> SimTime {
        SimTime(secs * 1_000_000_000)
    }

    /// Non-finite and negative inputs map to zero.
    pub fn from_secs_f64(secs: f64) -> SimTime {
        if !secs.is_finite() || secs <= 0.0 {
            return SimTime::ZERO;
        }
        SimTime((secs * 1_000_000_000.0) as u64)
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

}

impl std::ops::Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.9}s", self.as_secs_f64())
    }
}

struct Event {
    at: SimTime,
    seq: u64,
    action: Box<dyn FnOnce()>,
}

impl PartialEq for Event {
    fn eq(&self, other: &Event) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Event) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    // Reversed so the earliest (time, seq) pair sits at the root of the
    // max-heap.
    fn cmp(&self, other: &Event) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct SchedulerState {
    now: SimTime,
    next_seq: u64,
    queue: BinaryHeap<Event>,
}

/// Deterministic event queue driving the simulation.
///
/// Shared as `Rc<Scheduler>`; interior mutability lets an executing action
/// schedule follow-up actions through the same handle.
pub struct Scheduler {
    state: RefCell<SchedulerState>,
}

impl Scheduler {
    pub fn new() -> Scheduler {
        Scheduler {
            state: RefCell::new(SchedulerState::default()),
        }
    }

    /// Current virtual time. While an action executes this is the timestamp
    /// it was scheduled for.
    pub fn now(&self) -> SimTime {
        self.state.borrow().now
    }

    /// Number of actions still waiting in the queue.
    pub fn pending(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Register `action` to run at `now + delay`.
    pub fn schedule(&self, delay: SimTime, action: impl FnOnce() + 'static) {
        let at = self.now() + delay;
        self.schedule_at(at, action);
    }

    /// Register `action` at an absolute timestamp. Timestamps already in the
    /// past are treated as due now.
    pub fn schedule_at(&self, at: SimTime, action: impl FnOnce() + 'static) {
        let mut state = self.state.borrow_mut();
        let at = at.max(state.now);
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(Event {
            at,
            seq,
            action: Box::new(action),
        });
    }

    /// Run every action with a timestamp at or before `limit`, then advance
    /// the clock to `limit`. Later actions stay queued and never fire unless
    /// a further run is requested. Returns the number of actions executed.
    pub fn run_until(&self, limit: SimTime) -> usize {
        let mut executed = 0;
        loop {
            // Pop under a short borrow so the action itself can schedule.
            let event = {
                let mut state = self.state.borrow_mut();
                match state.queue.peek() {
                    Some(head) if head.at <= limit => {
                        let event = state.queue.pop().unwrap();
                        state.now = event.at;
                        event
                    }
                    _ => break,
                }
            };
            (event.action)();
            executed += 1;
        }
        self.state.borrow_mut().now = limit;
        executed
    }

    /// Drain the queue completely. The clock ends at the last event.
    pub fn run(&self) -> usize {
        let mut executed = 0;
        loop {
            let event = {
                let mut state = self.state.borrow_mut();
                match state.queue.pop() {
                    Some(event) => {
                        state.now = event.at;
                        event
                    }
                    None => break,
                }
            };
            (event.action)();
            executed += 1;
        }
        executed
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}
