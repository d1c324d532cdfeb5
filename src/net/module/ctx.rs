use super::{ActivitySlot, ActivityState, Module, ModuleId};
use crate::net::gate::{Gate, GateKind, GateRef};
use crate::net::path::ObjectPath;
use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::ops::Deref;
use std::sync::{Arc, Weak};

thread_local! {
    static MOD_CTX: RefCell<Option<Arc<ModuleContext>>> = const { RefCell::new(None) };
}

/// Returns a handle to the context of the currently executing module.
///
/// The handle is only fully valid during the execution of the current
/// event, so it should never be stored.
///
/// # Example
///
/// ```
/// use simcore::prelude::*;
///
/// struct MyModule;
/// impl Module for MyModule {
///     fn handle_message(&mut self, msg: Message) {
///         if current().id() == msg.header().sender_module {
///             println!("self message received");
///         }
///     }
/// }
/// ```
///
/// # Panics
///
/// Panics if not called within a module's scope.
#[must_use]
pub fn current() -> Arc<ModuleContext> {
    try_current().expect("cannot retrieve current module context, no module currently in scope")
}

/// Returns a handle to the context of the current module, if one exists.
///
/// See [`current`].
#[must_use]
pub fn try_current() -> Option<Arc<ModuleContext>> {
    MOD_CTX.with(|ctx| ctx.borrow().clone())
}

// Establishes `ctx` as the current module for the lifetime of the guard,
// restoring the previous cursor on drop.
pub(crate) struct CtxGuard {
    previous: Option<Arc<ModuleContext>>,
}

impl CtxGuard {
    pub(crate) fn enter(ctx: Arc<ModuleContext>) -> Self {
        let previous = MOD_CTX.with(|cell| cell.borrow_mut().replace(ctx));
        CtxGuard { previous }
    }
}

impl Drop for CtxGuard {
    fn drop(&mut self) {
        MOD_CTX.with(|cell| *cell.borrow_mut() = self.previous.take());
    }
}

///
/// The topological properties of a module, independent of the attached
/// module software.
///
pub struct ModuleContext {
    pub(crate) id: ModuleId,
    pub(crate) path: ObjectPath,
    pub(crate) active: Cell<bool>,

    pub(crate) gates: RefCell<Vec<GateRef>>,
    pub(crate) display: RefCell<String>,

    pub(crate) parent: Option<ModuleRefWeak>,
    pub(crate) children: RefCell<Vec<ModuleRef>>,

    pub(crate) activity: RefCell<ActivityState>,
}

impl ModuleContext {
    fn new(path: ObjectPath, parent: Option<ModuleRefWeak>) -> Arc<Self> {
        Arc::new(Self {
            id: ModuleId::gen(),
            path,
            active: Cell::new(true),
            gates: RefCell::new(Vec::new()),
            display: RefCell::new(String::new()),
            parent,
            children: RefCell::new(Vec::new()),
            activity: RefCell::new(ActivityState::default()),
        })
    }

    /// Returns a runtime-unique identifier for this module.
    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Returns the path of this module within the module tree.
    #[must_use]
    pub fn path(&self) -> ObjectPath {
        self.path.clone()
    }

    /// Returns the name of this module, the last component of its path.
    #[must_use]
    pub fn name(&self) -> String {
        self.path.name().to_string()
    }

    /// Whether this module still takes part in the simulation. A module
    /// becomes inactive when it ends or is deleted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Returns an unstructured list of all gates of this module.
    #[must_use]
    pub fn gates(&self) -> Vec<GateRef> {
        self.gates.borrow().clone()
    }

    /// Returns the gate with the given name and cluster position, if any.
    #[must_use]
    pub fn gate(&self, name: &str, pos: usize) -> Option<GateRef> {
        self.gates
            .borrow()
            .iter()
            .find(|g| g.name() == name && g.pos() == pos)
            .cloned()
    }

    /// The display string of this module. Opaque to the kernel; carried
    /// for inspection tooling.
    #[must_use]
    pub fn display(&self) -> String {
        self.display.borrow().clone()
    }

    /// Replaces the display string of this module.
    pub fn set_display(&self, display: impl Into<String>) {
        *self.display.borrow_mut() = display.into();
    }
}

///
/// A reference to a module: its context plus the attached module
/// software.
///
#[derive(Clone)]
pub struct ModuleRef {
    pub(crate) ctx: Arc<ModuleContext>,
    pub(crate) exec: Arc<RefCell<Execution>>,
}

pub(crate) struct ModuleRefWeak {
    ctx: Weak<ModuleContext>,
    exec: Weak<RefCell<Execution>>,
}

// The software attached to a module, tagged by execution style.
pub(crate) enum Execution {
    Handler(Box<dyn Module>),
    Activity(ActivitySlot),
}

impl ModuleRef {
    pub(crate) fn standalone(path: ObjectPath, exec: Execution) -> ModuleRef {
        ModuleRef {
            ctx: ModuleContext::new(path, None),
            exec: Arc::new(RefCell::new(exec)),
        }
    }

    pub(crate) fn child_of(name: &str, parent: &ModuleRef, exec: Execution) -> ModuleRef {
        let path = parent.ctx.path.appended(name);
        let this = ModuleRef {
            ctx: ModuleContext::new(path, Some(ModuleRefWeak::new(parent))),
            exec: Arc::new(RefCell::new(exec)),
        };
        parent.ctx.children.borrow_mut().push(this.clone());
        this
    }

    /// The parent of this module, if any.
    #[must_use]
    pub fn parent(&self) -> Option<ModuleRef> {
        self.ctx.parent.as_ref()?.upgrade()
    }

    /// The direct children of this module, in creation order.
    #[must_use]
    pub fn children(&self) -> Vec<ModuleRef> {
        self.ctx.children.borrow().clone()
    }

    /// The direct child with the given name, if any. Vectorized
    /// submodules follow the `name[index]` naming convention.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<ModuleRef> {
        self.ctx
            .children
            .borrow()
            .iter()
            .find(|child| child.name() == name)
            .cloned()
    }

    ///
    /// Creates a single gate of the given direction on this module.
    ///
    /// # Panics
    ///
    /// Panics if a gate of the same name already exists.
    ///
    pub fn create_gate(&self, name: &str, kind: GateKind) -> GateRef {
        self.create_gate_cluster(name, 1, kind)
            .pop()
            .expect("gate cluster of size 1 yields one gate")
    }

    ///
    /// Creates a cluster of `size` gates sharing a base name.
    ///
    /// # Panics
    ///
    /// Panics if a gate of the same name already exists.
    ///
    pub fn create_gate_cluster(&self, name: &str, size: usize, kind: GateKind) -> Vec<GateRef> {
        assert!(
            self.ctx.gate(name, 0).is_none(),
            "module '{}' already owns a gate '{}'",
            self.ctx.path,
            name
        );
        let gates = (0..size)
            .map(|pos| Gate::new(self, name, kind, size, pos))
            .collect::<Vec<_>>();
        self.ctx.gates.borrow_mut().extend(gates.iter().cloned());
        gates
    }

    ///
    /// Resizes an existing gate cluster, creating or severing gates at
    /// its tail. Returns the cluster in position order.
    ///
    /// # Panics
    ///
    /// Panics if no cluster with the given name exists, or the new size
    /// is zero.
    ///
    pub fn resize_gate_cluster(&self, name: &str, size: usize) -> Vec<GateRef> {
        assert!(size >= 1, "cannot resize a gate cluster to size 0");
        let mut cluster = self
            .ctx
            .gates
            .borrow()
            .iter()
            .filter(|g| g.name() == name)
            .cloned()
            .collect::<Vec<_>>();
        assert!(
            !cluster.is_empty(),
            "module '{}' owns no gate cluster '{}'",
            self.ctx.path,
            name
        );
        cluster.sort_by_key(|g| g.pos());

        if size < cluster.len() {
            for gate in cluster.drain(size..) {
                gate.unlink();
                self.ctx
                    .gates
                    .borrow_mut()
                    .retain(|g| !GateRef::ptr_eq(g, &gate));
            }
        } else {
            let kind = cluster[0].kind();
            for pos in cluster.len()..size {
                let gate = Gate::new(self, name, kind, size, pos);
                self.ctx.gates.borrow_mut().push(gate.clone());
                cluster.push(gate);
            }
        }

        for gate in &cluster {
            gate.set_size(size);
        }
        cluster
    }

    pub(crate) fn is_activity(&self) -> bool {
        matches!(&*self.exec.borrow(), Execution::Activity(_))
    }

    pub(crate) fn num_sim_start_stages(&self) -> usize {
        match &*self.exec.borrow() {
            Execution::Handler(module) => module.num_sim_start_stages(),
            Execution::Activity(_) => 0,
        }
    }
}

impl Deref for ModuleRef {
    type Target = ModuleContext;
    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl PartialEq for ModuleRef {
    fn eq(&self, other: &Self) -> bool {
        self.ctx.id == other.ctx.id
    }
}
impl Eq for ModuleRef {}

impl Debug for ModuleRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRef")
            .field("id", &self.ctx.id)
            .field("path", &self.ctx.path)
            .field("active", &self.ctx.active.get())
            .finish()
    }
}

impl Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish()
    }
}

impl ModuleRefWeak {
    pub(crate) fn new(strong: &ModuleRef) -> Self {
        Self {
            ctx: Arc::downgrade(&strong.ctx),
            exec: Arc::downgrade(&strong.exec),
        }
    }

    pub(crate) fn upgrade(&self) -> Option<ModuleRef> {
        Some(ModuleRef {
            ctx: self.ctx.upgrade()?,
            exec: self.exec.upgrade()?,
        })
    }
}

impl Debug for ModuleRefWeak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ModuleRefWeak")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;
    impl Module for Nop {}

    #[test]
    fn gate_cluster_resizing() {
        let m = ModuleRef::standalone("node".into(), Execution::Handler(Box::new(Nop)));
        let cluster = m.create_gate_cluster("port", 2, GateKind::Output);
        assert_eq!(cluster.len(), 2);

        let grown = m.resize_gate_cluster("port", 4);
        assert_eq!(grown.len(), 4);
        assert!(grown.iter().all(|g| g.size() == 4));
        assert_eq!(m.gate("port", 3).unwrap().pos(), 3);

        let shrunk = m.resize_gate_cluster("port", 1);
        assert_eq!(shrunk.len(), 1);
        assert!(m.gate("port", 1).is_none());
        assert_eq!(m.gate("port", 0).unwrap().size(), 1);
    }

    #[test]
    fn display_strings_are_opaque() {
        let m = ModuleRef::standalone("node".into(), Execution::Handler(Box::new(Nop)));
        assert_eq!(m.display(), "");
        m.set_display("i=block/router;is=l");
        assert_eq!(m.display(), "i=block/router;is=l");
    }
}
