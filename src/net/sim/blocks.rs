use super::ScopedSim;
use crate::net::module::{Activity, ActivityModule, ActivitySlot, Execution, Module};

///
/// A trait describing that an object can be built into a block of
/// modules at a given scope within the simulation.
///
/// Implementors act as builders for the actual modules of the block: a
/// block may consist of a single module at the scope position, or a
/// whole subtree of modules and connections. Every [`Module`] and every
/// [`Activity`]-wrapped [`ActivityModule`] is a block of size one.
///
/// # Examples
///
/// ```
/// # use simcore::prelude::*;
/// struct Lan {
///     hosts: usize,
/// }
///
/// impl ModuleBlock for Lan {
///     fn build(self, mut sim: ScopedSim<'_>) {
///         sim.root(HandlerFn::new(|_| {}));
///         sim.node("switch", HandlerFn::new(|_| {}));
///         for i in 0..self.hosts {
///             sim.node(format!("switch.host{i}"), HandlerFn::new(|_| {}));
///         }
///     }
/// }
///
/// let mut sim = Sim::new();
/// sim.node("lan", Lan { hosts: 4 });
/// assert!(sim.get("lan.switch.host3").is_some());
/// ```
///
pub trait ModuleBlock {
    /// Builds the described modules within the scoped part of the
    /// simulation.
    fn build(self, sim: ScopedSim<'_>);
}

impl<M: Module> ModuleBlock for M {
    fn build(self, sim: ScopedSim<'_>) {
        sim.base
            .raw(sim.scope, Execution::Handler(Box::new(self)));
    }
}

impl<T: ActivityModule> ModuleBlock for Activity<T> {
    fn build(self, sim: ScopedSim<'_>) {
        sim.base
            .raw(sim.scope, Execution::Activity(ActivitySlot::new(self.0)));
    }
}
