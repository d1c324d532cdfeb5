use super::{install_rng, EventLog, Observer, Runtime, RuntimeLimit};
use crate::net::message::MessageId;
use crate::net::Sim;
use crate::time::{Duration, SimTime};
use std::fmt::Debug;
use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// A builder for a runtime instance.
///
/// # Examples
///
/// ```
/// # use simcore::prelude::*;
/// let sim = Sim::new();
/// let rt = Builder::seeded(42)
///     .max_time(SimTime::from(100.0))
///     .quiet()
///     .build(sim);
/// let _ = rt.run();
/// ```
#[must_use]
pub struct Builder {
    seeds: Vec<u64>,
    limit: RuntimeLimit,
    start_time: SimTime,
    quiet: bool,
    observers: Vec<Box<dyn Observer>>,
    interrupt: Option<Arc<AtomicBool>>,
}

impl Builder {
    /// Creates a new unconfigured builder. All random number streams
    /// are seeded from entropy.
    pub fn new() -> Builder {
        Builder {
            seeds: Vec::new(),
            limit: RuntimeLimit::None,
            start_time: SimTime::MIN,
            quiet: false,
            observers: Vec::new(),
            interrupt: None,
        }
    }

    /// Creates a builder whose default random number stream is seeded
    /// with the given value.
    pub fn seeded(seed: u64) -> Builder {
        let mut this = Builder::new();
        this.seeds = vec![seed];
        this
    }

    /// Seeds the numbered random number streams, stream `n` from
    /// `seeds[n]`.
    pub fn seeds(mut self, seeds: impl Into<Vec<u64>>) -> Self {
        self.seeds = seeds.into();
        self
    }

    /// Suppresses runtime banners from the simulation framework.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Sets the simulation time at which the run begins.
    pub fn start_time(mut self, time: SimTime) -> Self {
        self.start_time = time;
        self
    }

    /// Bounds the number of dispatched events.
    pub fn max_itr(mut self, max_itr: usize) -> Self {
        self.limit.add(RuntimeLimit::EventCount(max_itr));
        self
    }

    /// Bounds the simulation time: the run stops before the first event
    /// beyond the given time.
    pub fn max_time(mut self, max_time: SimTime) -> Self {
        self.limit.add(RuntimeLimit::SimTime(max_time));
        self
    }

    /// Bounds the consumed wall-clock time, checked at dispatch
    /// boundaries.
    pub fn cpu_time_limit(mut self, limit: Duration) -> Self {
        self.limit.add(RuntimeLimit::CpuTime(limit));
        self
    }

    /// Adds a custom limit.
    pub fn limit(mut self, limit: RuntimeLimit) -> Self {
        self.limit.add(limit);
        self
    }

    /// Registers an observer over the kernel events of the run.
    pub fn observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Attaches an event log writing the append-only record stream to
    /// the given sink.
    pub fn event_log(self, out: impl Write + 'static) -> Self {
        self.observer(EventLog::new(out))
    }

    /// Attaches a flag that, once set, stops the run at the next
    /// dispatch boundary with an interrupted result.
    pub fn interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    ///
    /// Builds a runnable [`Runtime`] over the given network.
    ///
    /// This installs the clock, the random number streams and the
    /// message identifier sequence for the coming run.
    ///
    pub fn build(self, sim: Sim) -> Runtime {
        SimTime::set_now(self.start_time);
        MessageId::reset();
        install_rng(&self.seeds);

        Runtime::new(sim, self.limit, self.quiet, self.observers, self.interrupt)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

impl Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("limit", &self.limit)
            .field("start_time", &self.start_time)
            .finish()
    }
}
