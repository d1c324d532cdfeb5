//!
//! Central primitives for running a discrete event simulation.
//!

use crate::net::gate::GateRef;
use crate::net::message::Message;
use crate::net::module::ModuleRef;
use crate::net::sim::ctx::{ScopeGuard, SimFlags, SimScope};
use crate::net::sim::{events, Sim};
use crate::time::SimTime;
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

mod builder;
pub use self::builder::*;

mod error;
pub use self::error::{SchedulingError, SimError};
pub(crate) use self::error::{raise, unwind_to_error};

mod fes;
pub(crate) use self::fes::FutureEventSet;

mod limit;
pub use self::limit::*;

pub(crate) mod observer;
pub use self::observer::{EventLog, Observer};

mod rng;
pub use self::rng::{random, rng, rng_stream, sample};
pub(crate) use self::rng::install as install_rng;

///
/// The executable form of a simulation: the network, the future event
/// set and the dispatch loop.
///
/// Created through a [`Builder`]; consumed by [`run`](Runtime::run).
///
pub struct Runtime {
    pub(crate) sim: Sim,
    pub(crate) fes: Rc<RefCell<FutureEventSet>>,
    pub(crate) observers: Rc<RefCell<Vec<Box<dyn Observer>>>>,
    pub(crate) flags: Rc<SimFlags>,

    pub(crate) limit: RuntimeLimit,
    pub(crate) quiet: bool,
    pub(crate) interrupt: Option<Arc<AtomicBool>>,

    itr: usize,
}

// How the dispatch loop came to an end.
enum LoopEnd {
    Exhausted,
    LimitReached,
    Terminated,
    Interrupted,
    Failed(SimError),
}

impl Runtime {
    pub(crate) fn new(
        sim: Sim,
        limit: RuntimeLimit,
        quiet: bool,
        observers: Vec<Box<dyn Observer>>,
        interrupt: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            sim,
            fes: Rc::new(RefCell::new(FutureEventSet::new())),
            observers: Rc::new(RefCell::new(observers)),
            flags: Rc::new(SimFlags::default()),
            limit,
            quiet,
            interrupt,
            itr: 0,
        }
    }

    /// The current simulation time.
    #[allow(clippy::unused_self)]
    #[must_use]
    pub fn sim_time(&self) -> SimTime {
        SimTime::now()
    }

    /// The number of events dispatched so far.
    #[must_use]
    pub fn num_events_dispatched(&self) -> usize {
        self.itr
    }

    /// The network driven by this runtime.
    #[must_use]
    pub fn sim(&self) -> &Sim {
        &self.sim
    }

    ///
    /// Injects a message onto a gate from outside the simulation, to be
    /// routed and delivered at the given base time.
    ///
    /// # Panics
    ///
    /// Panics if the gate chain is invalid or the time lies in the past.
    ///
    pub fn send_onto(&mut self, gate: GateRef, msg: impl Into<Message>, at: SimTime) {
        let mut msg = msg.into();
        msg.header_mut().send_time = at;
        let at = crate::net::sim::resolve_route(&mut msg, gate, at);
        self.schedule_external(msg, at);
    }

    ///
    /// Injects a message addressed directly to a module, bypassing all
    /// gates, arriving at the given time.
    ///
    /// # Panics
    ///
    /// Panics if the time lies in the past.
    ///
    pub fn schedule_on(&mut self, module: &ModuleRef, msg: impl Into<Message>, at: SimTime) {
        let mut msg = msg.into();
        msg.header_mut().send_time = at;
        msg.header_mut().arrival_module = module.id();
        self.schedule_external(msg, at);
    }

    fn schedule_external(&mut self, mut msg: Message, at: SimTime) {
        msg.header_mut().arrival_time = at;
        for observer in self.observers.borrow_mut().iter_mut() {
            observer.message_scheduled(&msg);
        }
        self.fes
            .borrow_mut()
            .schedule(msg, at)
            .unwrap_or_else(|e| panic!("cannot inject message: {e}"));
    }

    ///
    /// Runs the simulation to completion: staged initialization, the
    /// dispatch loop until a stop condition, then finalization.
    ///
    #[must_use]
    pub fn run(mut self) -> RuntimeResult {
        let started = Instant::now();
        let _scope = ScopeGuard::install(SimScope {
            fes: self.fes.clone(),
            table: self.sim.table.clone(),
            globals: self.sim.globals.clone(),
            observers: self.observers.clone(),
            flags: self.flags.clone(),
        });

        if !self.quiet {
            println!("\u{23A1}");
            println!("\u{23A2} simulation starting");
            println!(
                "\u{23A2}  modules := {}  limit := {}",
                self.sim.table.borrow().len(),
                self.limit
            );
            println!("\u{23A3}");
        }

        for module in self.sim.table.borrow().iter() {
            for observer in self.observers.borrow_mut().iter_mut() {
                observer.module_created(module);
            }
        }

        if let Err(error) = events::sim_start() {
            return self.conclude_failed(error, started);
        }

        if self.fes.borrow().is_empty() {
            tracing::warn!(
                "running a simulation without any initial events, think about scheduling some"
            );
            return RuntimeResult::EmptySimulation { sim: self.sim };
        }

        let end = self.dispatch_loop(started);

        let result = match end {
            LoopEnd::Failed(error) => return self.conclude_failed(error, started),
            LoopEnd::Exhausted | LoopEnd::Terminated => {
                if let Err(error) = events::sim_end() {
                    return self.conclude_failed(error, started);
                }
                RuntimeResult::Finished {
                    time: SimTime::now(),
                    profile: self.profile(started),
                    sim: self.sim,
                }
            }
            LoopEnd::LimitReached => {
                if let Err(error) = events::sim_end() {
                    return self.conclude_failed(error, started);
                }
                RuntimeResult::PrematureAbort {
                    time: SimTime::now(),
                    profile: self.profile(started),
                    active_events: self.fes.borrow().len(),
                    sim: self.sim,
                }
            }
            LoopEnd::Interrupted => RuntimeResult::Interrupted {
                time: SimTime::now(),
                profile: self.profile(started),
                sim: self.sim,
            },
        };

        result.conclude(!self.quiet)
    }

    fn dispatch_loop(&mut self, started: Instant) -> LoopEnd {
        loop {
            if self
                .interrupt
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Relaxed))
            {
                break LoopEnd::Interrupted;
            }

            let Some(time) = self.fes.borrow().peek_time() else {
                break LoopEnd::Exhausted;
            };
            if self.limit.applies(self.itr + 1, time, started) {
                break LoopEnd::LimitReached;
            }

            let msg = self
                .fes
                .borrow_mut()
                .pop()
                .expect("peeked event set is non-empty");
            self.itr += 1;

            // the only place where the clock moves
            if time > SimTime::now() {
                SimTime::set_now(time);
                for observer in self.observers.borrow_mut().iter_mut() {
                    observer.clock_advanced(time);
                }
            }

            let module = self
                .sim
                .table
                .borrow()
                .by_id(msg.header().arrival_module);
            match module {
                Some(module) if module.is_active() => {
                    for observer in self.observers.borrow_mut().iter_mut() {
                        observer.message_delivered(&msg, &module);
                    }
                    if let Err(error) = events::deliver(&module, msg) {
                        break LoopEnd::Failed(error);
                    }
                }
                Some(module) => {
                    if self.sim.globals.warnings_enabled(&module.ctx.path) {
                        tracing::warn!(
                            "dropping message [{}], module '{}' has ended",
                            msg.str(),
                            module.path()
                        );
                    }
                }
                None => {
                    tracing::debug!(
                        "dropping message [{}], arrival module no longer exists",
                        msg.str()
                    );
                }
            }

            // deferred teardown of modules that deleted themselves
            let pending = self.flags.pending_delete.borrow_mut().drain(..).collect::<Vec<_>>();
            for module in pending {
                crate::net::sim::ctx::with_scope(|scope| {
                    crate::net::sim::teardown(&module, scope);
                });
            }

            if self.flags.terminated.get() {
                break LoopEnd::Terminated;
            }
        }
    }

    fn profile(&self, started: Instant) -> Profile {
        Profile {
            event_count: self.itr,
            wall: started.elapsed(),
        }
    }

    fn conclude_failed(self, error: SimError, started: Instant) -> RuntimeResult {
        if !self.quiet {
            println!("\u{23A1}");
            println!("\u{23A2} simulation failed after {}", SimTime::now());
            println!("\u{23A2}  {error}");
            println!("\u{23A3}");
        }
        let time = SimTime::now();
        crate::net::sim::ctx::with_scope(|scope| scope.notify(|o| o.sim_finished(time)));
        RuntimeResult::Failed {
            time,
            profile: self.profile(started),
            error,
            sim: self.sim,
        }
    }
}

impl Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Runtime {{ sim_time: {} itr: {} enqueued: {} limit: {} }}",
            self.sim_time(),
            self.itr,
            self.fes.borrow().len(),
            self.limit
        )
    }
}

///
/// The runtime profile of a finished run.
///
#[derive(Debug, Clone)]
pub struct Profile {
    /// The number of dispatched events.
    pub event_count: usize,
    /// The consumed wall-clock time.
    pub wall: std::time::Duration,
}

///
/// The result of a full execution of a runtime.
///
#[derive(Debug)]
#[must_use]
pub enum RuntimeResult {
    /// The simulation had no initial events after startup.
    EmptySimulation {
        /// The network in its initialized state.
        sim: Sim,
    },
    /// The simulation depleted its event set, or termination was
    /// requested. Finalization has run.
    Finished {
        /// The network in its final state.
        sim: Sim,
        /// The time of the final event.
        time: SimTime,
        /// The runtime profile of the run.
        profile: Profile,
    },
    /// A runtime limit stopped the run while events were still queued.
    /// Finalization has run.
    PrematureAbort {
        /// The network in its final state.
        sim: Sim,
        /// The time of the last dispatched event.
        time: SimTime,
        /// The runtime profile of the run.
        profile: Profile,
        /// The number of events still queued.
        active_events: usize,
    },
    /// The user interrupted the run. Finalization was skipped.
    Interrupted {
        /// The network at the point of interruption.
        sim: Sim,
        /// The time of the last dispatched event.
        time: SimTime,
        /// The runtime profile of the run.
        profile: Profile,
    },
    /// A module failed. Finalization was skipped.
    Failed {
        /// The network at the point of failure.
        sim: Sim,
        /// The time of the failing event.
        time: SimTime,
        /// The runtime profile of the run.
        profile: Profile,
        /// The failure.
        error: SimError,
    },
}

impl RuntimeResult {
    ///
    /// Returns the contained [`Finished`](Self::Finished) variant,
    /// consuming `self`.
    ///
    /// # Panics
    ///
    /// Panics if the run did not finish cleanly.
    ///
    pub fn unwrap(self) -> (Sim, SimTime, Profile) {
        match self {
            Self::Finished { sim, time, profile } => (sim, time, profile),
            other => panic!(
                "called `RuntimeResult::unwrap` on a run that did not finish: {other:?}"
            ),
        }
    }

    /// The failure of the run, if any.
    #[must_use]
    pub fn error(&self) -> Option<&SimError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The process exit code corresponding to this outcome.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted { .. } => 3,
            Self::Failed { error, .. } => error.exit_code(),
            _ => 0,
        }
    }

    fn conclude(self, banner: bool) -> Self {
        let time = SimTime::now();
        crate::net::sim::ctx::with_scope(|scope| scope.notify(|o| o.sim_finished(time)));

        if banner {
            match &self {
                Self::Finished { profile, .. } => {
                    println!("\u{23A1}");
                    println!("\u{23A2} simulation ended");
                    println!(
                        "\u{23A2}  ended at event #{} after {}",
                        profile.event_count, time
                    );
                    println!("\u{23A3}");
                }
                Self::PrematureAbort {
                    profile,
                    active_events,
                    ..
                } => {
                    println!("\u{23A1}");
                    println!("\u{23A2} simulation ended prematurely");
                    println!(
                        "\u{23A2}  ended at event #{} with {} active events after {}",
                        profile.event_count, active_events, time
                    );
                    println!("\u{23A3}");
                }
                _ => {}
            }
        }
        self
    }
}
