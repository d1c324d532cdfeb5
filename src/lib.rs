//!
//! A discrete event simulator for module/gate networks.
//!
//! A model is a tree of modules connected through gates. The kernel drives
//! the tree from staged startup, through a totally ordered stream of
//! message events, to bottom-up finalization. Module behaviour is written
//! in one of two styles:
//!
//! - **handler style** — implement [`Module`](net::module::Module) and
//!   process one message per invocation of `handle_message`;
//! - **activity style** — implement
//!   [`ActivityModule`](net::module::ActivityModule) and write straight-line
//!   code that suspends at [`receive`](net::module::receive) and
//!   [`wait`](net::module::wait) points. The kernel owns the coroutine and
//!   resumes it whenever an event is delivered to the module.
//!
//! Both styles share one thread and one clock; determinism is guaranteed
//! for identical seeds and inputs.
//!
//! # Example
//!
//! ```
//! use simcore::prelude::*;
//!
//! let mut sim = Sim::new();
//! sim.node("echo", HandlerFn::new(|msg: Message| {
//!     println!("t={} kind={}", SimTime::now(), msg.header().kind);
//! }));
//! let gate = sim.gate("echo", "in", GateKind::Input);
//!
//! let mut rt = Builder::seeded(42).build(sim);
//! rt.send_onto(gate, Message::new().kind(7).build(), SimTime::from(1.0));
//! let _ = rt.run();
//! ```

pub mod config;
pub mod net;
pub mod prelude;
pub mod runtime;
pub mod time;
