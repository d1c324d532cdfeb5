//! Network nodes with custom state.

use crate::net::message::Message;
use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::future::Future;

mod ctx;
pub use self::ctx::*;

mod activity;
pub use self::activity::*;

/// A runtime-unique identifier for a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ModuleId(pub u16);

thread_local! {
    static MODULE_ID: Cell<u16> = const { Cell::new(1) };
}

impl ModuleId {
    /// A general purpose ID indicating None.
    pub const NULL: ModuleId = ModuleId(0);

    /// Generates a unique module ID.
    pub fn gen() -> Self {
        MODULE_ID.with(|c| {
            let next = c.get();
            c.set(next + 1);
            Self(next)
        })
    }

    pub(crate) fn reset() {
        MODULE_ID.with(|c| c.set(1));
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

///
/// A set of user-defined functions customizing the behaviour of an
/// event-driven module.
///
/// Handler modules are invoked once per incoming message and never
/// suspend. For straight-line model code that blocks at receive points,
/// see [`ActivityModule`].
///
/// # Example
///
/// ```
/// use simcore::prelude::*;
///
/// struct Counter {
///     seen: usize,
/// }
///
/// impl Module for Counter {
///     fn handle_message(&mut self, msg: Message) {
///         self.seen += 1;
///         println!("[{}] {} messages", current().path(), self.seen);
///     }
/// }
/// ```
///
pub trait Module: Any {
    ///
    /// The message handler, invoked once for every event delivered to
    /// this module.
    ///
    fn handle_message(&mut self, _msg: Message) {}

    ///
    /// A function run once per initialization stage at the start of the
    /// simulation. All stage-`i` calls across the whole module tree
    /// finish before the first stage-`i+1` call; within one stage,
    /// parents are initialized before their children.
    ///
    fn at_sim_start(&mut self, _stage: usize) {}

    ///
    /// The number of initialization stages this module requires.
    ///
    fn num_sim_start_stages(&self) -> usize {
        1
    }

    ///
    /// A callback invoked after the simulation has terminated cleanly,
    /// children before parents. Results may be recorded here, but no
    /// messages may be sent.
    ///
    fn at_sim_end(&mut self) {}
}

///
/// A module whose behaviour is written as a straight-line coroutine.
///
/// The kernel owns the returned future and resumes it whenever an event
/// is delivered to the module. Inside the coroutine, [`receive`],
/// [`receive_timeout`], [`receive_on`] and [`wait`] suspend until a
/// matching event arrives; no other operation yields. Returning from the
/// future ends the module: further events addressed to it are discarded.
///
/// Register activity modules by wrapping them in [`Activity`]:
///
/// ```
/// use simcore::prelude::*;
///
/// struct Src;
///
/// impl ActivityModule for Src {
///     async fn activity(self) {
///         wait(Duration::from_secs(2)).await;
///         send(Message::new().kind(1).build(), "out");
///     }
/// }
///
/// let mut sim = Sim::new();
/// sim.node("src", Activity(Src));
/// ```
///
pub trait ActivityModule: 'static {
    ///
    /// The behaviour of the module, from startup to module end.
    ///
    fn activity(self) -> impl Future<Output = ()> + 'static;
}

///
/// A wrapper marking a value as an activity-style module when
/// registering it in a simulation.
///
#[derive(Debug)]
pub struct Activity<T>(pub T);

///
/// A wrapper treating a closure as an activity-style module.
///
/// # Example
///
/// ```
/// use simcore::prelude::*;
///
/// let mut sim = Sim::new();
/// sim.node("burst", ActivityFn::new(|| async {
///     for _ in 0..3 {
///         wait(Duration::from_secs(1)).await;
///         send(Message::new().build(), "out");
///     }
/// }));
/// ```
///
pub struct ActivityFn<F> {
    f: F,
}

impl<F, Fut> ActivityFn<F>
where
    F: FnOnce() -> Fut + 'static,
    Fut: Future<Output = ()> + 'static,
{
    /// Creates a new activity module from the given closure.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(f: F) -> Activity<ActivityFn<F>> {
        Activity(ActivityFn { f })
    }
}

impl<F, Fut> ActivityModule for ActivityFn<F>
where
    F: FnOnce() -> Fut + 'static,
    Fut: Future<Output = ()> + 'static,
{
    fn activity(self) -> impl Future<Output = ()> + 'static {
        (self.f)()
    }
}

impl<F> fmt::Debug for ActivityFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActivityFn")
    }
}

///
/// A wrapper treating a stateless handler function as a module.
///
/// # Example
///
/// ```
/// use simcore::prelude::*;
///
/// let mut sim = Sim::new();
/// sim.node("sink", HandlerFn::new(|msg: Message| {
///     println!("swallowed {}", msg.str());
/// }));
/// ```
///
#[derive(Debug)]
pub struct HandlerFn<Handler> {
    inner: Handler,
}

impl<Handler> HandlerFn<Handler>
where
    Handler: FnMut(Message),
{
    /// Creates a new wrapper over a handler function.
    pub fn new(handler: Handler) -> Self {
        Self { inner: handler }
    }
}

impl<Handler> Module for HandlerFn<Handler>
where
    Handler: FnMut(Message) + 'static,
{
    fn handle_message(&mut self, msg: Message) {
        (self.inner)(msg);
    }
}

///
/// A wrapper treating a state generator and a handler function as a
/// module. The generator runs at simulation start, within module scope.
///
#[derive(Debug)]
pub struct ModuleFn<Gen, State, Handler> {
    gen: Gen,
    current: Option<State>,
    handler: Handler,
}

impl<Gen, State, Handler> ModuleFn<Gen, State, Handler>
where
    Gen: FnMut() -> State,
    Handler: FnMut(&mut State, Message),
{
    /// Creates a new wrapper over a generator and a handler function.
    pub fn new(gen: Gen, handler: Handler) -> Self {
        Self {
            gen,
            current: None,
            handler,
        }
    }
}

impl<Gen, State, Handler> Module for ModuleFn<Gen, State, Handler>
where
    Gen: FnMut() -> State + 'static,
    State: 'static,
    Handler: FnMut(&mut State, Message) + 'static,
{
    fn at_sim_start(&mut self, _stage: usize) {
        self.current = Some((self.gen)());
    }

    fn handle_message(&mut self, msg: Message) {
        let Some(state) = &mut self.current else {
            unreachable!("handle_message cannot be called before at_sim_start")
        };
        (self.handler)(state, msg);
    }
}
