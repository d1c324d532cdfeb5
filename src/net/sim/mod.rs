use crate::net::gate::{GateKind, GateRef};
use crate::net::module::{ModuleId, ModuleRef};
use crate::net::par::Parameters;
use crate::net::path::ObjectPath;
use fxhash::FxHashMap;
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

mod api;
pub use self::api::*;

mod blocks;
pub use self::blocks::*;

pub(crate) mod ctx;
pub(crate) use self::ctx::{cancel_self_message, schedule_self_message};

pub(crate) mod events;

///
/// A module/gate network: the builder for a simulation, and the
/// structure the runtime executes.
///
/// Modules are registered under dotted paths; parents must exist before
/// their children. Gates are created per module and connected pairwise,
/// optionally with channel parameters.
///
/// # Examples
///
/// ```
/// # use simcore::prelude::*;
/// let mut sim = Sim::new();
/// sim.node("alice", HandlerFn::new(|_msg| {}));
/// sim.node("bob", HandlerFn::new(|_msg| {}));
///
/// let a = sim.gate("alice", "out", GateKind::Output);
/// let b = sim.gate("bob", "in", GateKind::Input);
/// a.connect(b, Some(ChannelMetrics::delay(Duration::from_secs(1))));
///
/// let _ = Builder::seeded(1).build(sim).run();
/// ```
///
pub struct Sim {
    pub(crate) table: Rc<RefCell<ModuleTable>>,
    pub(crate) globals: Rc<Globals>,
}

impl Sim {
    /// Creates a new, empty network.
    #[must_use]
    pub fn new() -> Self {
        ModuleId::reset();
        Self {
            table: Rc::new(RefCell::new(ModuleTable::default())),
            globals: Rc::new(Globals::default()),
        }
    }

    /// Returns a handle to the simulation globals.
    #[must_use]
    pub fn globals(&self) -> Rc<Globals> {
        self.globals.clone()
    }

    ///
    /// Creates a module block at the given path.
    ///
    /// The block may be a plain [`Module`](crate::net::module::Module)
    /// value, an [`Activity`](crate::net::module::Activity)-wrapped
    /// coroutine module, or a custom [`ModuleBlock`] that builds a whole
    /// subtree.
    ///
    /// # Panics
    ///
    /// Panics if a module already exists at `path`, or its parent path
    /// has no module.
    ///
    pub fn node(&mut self, path: impl Into<ObjectPath>, block: impl ModuleBlock) {
        let scoped = ScopedSim::new(self, path.into());
        block.build(scoped);
    }

    /// Retrieves a module by path.
    #[must_use]
    pub fn get(&self, path: impl Into<ObjectPath>) -> Option<ModuleRef> {
        self.table.borrow().by_path(&path.into())
    }

    ///
    /// Creates (or retrieves) a gate on an already created module.
    ///
    /// # Panics
    ///
    /// Panics if no module exists at `path`.
    ///
    pub fn gate(&mut self, path: impl Into<ObjectPath>, name: &str, kind: GateKind) -> GateRef {
        let path = path.into();
        let Some(module) = self.get(path.clone()) else {
            panic!("cannot create gate '{path}.{name}', node '{path}' does not exist")
        };
        if let Some(gate) = module.gate(name, 0) {
            gate
        } else {
            module.create_gate(name, kind)
        }
    }

    ///
    /// Creates (or retrieves) a gate cluster on an already created
    /// module.
    ///
    /// # Panics
    ///
    /// Panics if no module exists at `path`, or parts of the cluster
    /// exist while others do not.
    ///
    pub fn gates(
        &mut self,
        path: impl Into<ObjectPath>,
        name: &str,
        size: usize,
        kind: GateKind,
    ) -> Vec<GateRef> {
        let path = path.into();
        let Some(module) = self.get(path.clone()) else {
            panic!("cannot create gate '{path}.{name}', node '{path}' does not exist")
        };
        let existing = (0..size)
            .map_while(|pos| module.gate(name, pos))
            .collect::<Vec<_>>();
        if existing.len() == size {
            existing
        } else {
            assert!(
                existing.is_empty(),
                "cannot complete a partially created gate cluster"
            );
            module.create_gate_cluster(name, size, kind)
        }
    }

    ///
    /// Includes raw parameter definitions, one `path.key: value` binding
    /// per line.
    ///
    /// # Examples
    ///
    /// ```
    /// # use simcore::prelude::*;
    /// let mut sim = Sim::new();
    /// sim.include_par("alice.addr: 192.168.2.45\nalice.role: host");
    /// sim.node("alice", HandlerFn::new(|_| {
    ///     assert_eq!(par("role").as_deref(), Some("host"));
    /// }));
    /// ```
    ///
    pub fn include_par(&mut self, raw: &str) {
        self.globals.parameters.build(raw);
    }

    pub(crate) fn raw(&mut self, path: ObjectPath, exec: crate::net::module::Execution) -> ModuleRef {
        assert!(
            self.get(path.clone()).is_none(),
            "cannot create node '{path}', node already exists"
        );

        let module = if let Some(parent) = path.parent() {
            let Some(parent) = self.get(parent.clone()) else {
                panic!("cannot create node '{path}', parent '{parent}' does not exist")
            };
            ModuleRef::child_of(path.name(), &parent, exec)
        } else {
            ModuleRef::standalone(path, exec)
        };

        self.table.borrow_mut().add(module.clone());
        module
    }
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Sim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sim")
            .field("modules", &self.table.borrow().len())
            .finish()
    }
}

///
/// A builder over a scoped part of the network, used by [`ModuleBlock`]
/// implementations to create reusable blocks of modules under a path
/// prefix.
///
pub struct ScopedSim<'a> {
    pub(crate) base: &'a mut Sim,
    pub(crate) scope: ObjectPath,
}

impl<'a> ScopedSim<'a> {
    pub(crate) fn new(base: &'a mut Sim, scope: ObjectPath) -> Self {
        Self { base, scope }
    }

    /// The current scope, from an absolute perspective.
    #[must_use]
    pub fn scope(&self) -> &ObjectPath {
        &self.scope
    }

    /// Creates the module at the scope position itself.
    pub fn root(&mut self, block: impl ModuleBlock) {
        let scope = self.scope.clone();
        let scoped = ScopedSim::new(self.base, scope);
        block.build(scoped);
    }

    /// Creates a module block within the current scope.
    pub fn node(&mut self, path: impl Into<ObjectPath>, block: impl ModuleBlock) {
        self.base.node(self.scope.appended(path.into().as_str()), block);
    }

    /// Creates or retrieves a gate within the current scope.
    pub fn gate(&mut self, path: impl Into<ObjectPath>, name: &str, kind: GateKind) -> GateRef {
        self.base
            .gate(self.scope.appended(path.into().as_str()), name, kind)
    }
}

///
/// The global state attached to a network.
///
#[derive(Debug, Default)]
pub struct Globals {
    /// The parameter tree, derived from configuration and
    /// [`Sim::include_par`].
    pub parameters: Parameters,

    warnings: RefCell<FxHashMap<String, bool>>,
}

impl Globals {
    /// Toggles non-fatal diagnostics for a module path and everything
    /// below it.
    pub fn set_warnings(&self, path: impl Into<String>, enabled: bool) {
        self.warnings.borrow_mut().insert(path.into(), enabled);
    }

    /// Whether non-fatal diagnostics are enabled for the given path.
    #[must_use]
    pub fn warnings_enabled(&self, path: &ObjectPath) -> bool {
        let warnings = self.warnings.borrow();
        if let Some(&enabled) = warnings.get(path.as_str()) {
            return enabled;
        }
        for ancestor in path.ancestors() {
            if let Some(&enabled) = warnings.get(ancestor.as_str()) {
                return enabled;
            }
        }
        true
    }
}

// The module table: every live module, in pre-order (parents before
// children, siblings in creation order), plus an id lookup map.
#[derive(Default)]
pub(crate) struct ModuleTable {
    tree: Vec<ModuleRef>,
    by_id: FxHashMap<ModuleId, ModuleRef>,
}

impl ModuleTable {
    pub(crate) fn len(&self) -> usize {
        self.tree.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ModuleRef> {
        self.tree.iter()
    }

    pub(crate) fn by_id(&self, id: ModuleId) -> Option<ModuleRef> {
        self.by_id.get(&id).cloned()
    }

    pub(crate) fn by_path(&self, path: &ObjectPath) -> Option<ModuleRef> {
        self.tree
            .iter()
            .find(|module| module.ctx.path == *path)
            .cloned()
    }

    pub(crate) fn add(&mut self, module: ModuleRef) {
        self.by_id.insert(module.id(), module.clone());

        let Some(parent) = module.ctx.path.parent() else {
            self.tree.push(module);
            return;
        };
        let parent_depth = parent.len();

        // insert at the last position still within the parent's subtree
        let Some(mut pos) = self.tree.iter().rposition(|m| m.ctx.path == parent) else {
            panic!(
                "cannot register node '{}', parent '{parent}' does not exist",
                module.ctx.path
            )
        };
        pos += 1;
        while pos < self.tree.len() && self.tree[pos].ctx.path.len() > parent_depth {
            pos += 1;
        }
        self.tree.insert(pos, module);
    }

    pub(crate) fn remove(&mut self, id: ModuleId) {
        self.by_id.remove(&id);
        self.tree.retain(|module| module.id() != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::module::{Execution, Module};

    struct Nop;
    impl Module for Nop {}

    fn module(path: &str) -> ModuleRef {
        ModuleRef::standalone(path.into(), Execution::Handler(Box::new(Nop)))
    }

    #[test]
    fn module_table_keeps_preorder() {
        let mut table = ModuleTable::default();

        // paths registered out of sibling order still nest correctly
        for path in [
            "alice",
            "alice.alicent",
            "alice.john",
            "alice.john.previous",
            "bob",
            "eve",
            "eve.trevor",
            "eve.trevor.list",
            "eve.mark",
        ] {
            table.add(module(path));
        }

        assert_eq!(
            table
                .iter()
                .map(|v| v.ctx.path.as_str().to_string())
                .collect::<Vec<_>>(),
            [
                "alice",
                "alice.alicent",
                "alice.john",
                "alice.john.previous",
                "bob",
                "eve",
                "eve.trevor",
                "eve.trevor.list",
                "eve.mark"
            ]
        );
    }
}
