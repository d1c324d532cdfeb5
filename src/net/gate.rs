//! Module-specific connection endpoints.

use crate::net::channel::{Channel, ChannelMetrics, ChannelRef};
use crate::net::module::{ModuleContext, ModuleRef, ModuleRefWeak};
use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::sync::{Arc, Weak};

///
/// A reference to a gate.
///
pub type GateRef = Arc<Gate>;

pub(crate) type GateWeak = Weak<Gate>;

///
/// The direction of a gate.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateKind {
    /// A gate that accepts incoming messages for its owner.
    Input,
    /// A gate that emits messages produced by its owner.
    Output,
}

///
/// A message insertion or extraction point of a module.
///
/// Gates form chains: an output gate points forward to the next gate of
/// the connection, which may be a passthrough gate of a compound module
/// or the terminal input gate of the destination. A connection may carry
/// a [`Channel`] that delays and corrupts traversing messages.
///
pub struct Gate {
    owner: ModuleRefWeak,
    name: String,
    kind: GateKind,
    size: Cell<usize>,
    pos: usize,

    channel: RefCell<Option<ChannelRef>>,

    next_gate: RefCell<Option<GateRef>>,
    previous_gate: RefCell<Option<GateWeak>>,
}

impl Gate {
    ///
    /// Creates a new gate on the given owner.
    ///
    /// # Panics
    ///
    /// Panics if the provided size is zero.
    ///
    #[must_use]
    pub(crate) fn new(
        owner: &ModuleRef,
        name: impl AsRef<str>,
        kind: GateKind,
        size: usize,
        pos: usize,
    ) -> GateRef {
        assert!(size >= 1, "cannot create a gate cluster with size 0");
        GateRef::new(Self {
            owner: ModuleRefWeak::new(owner),
            name: name.as_ref().to_string(),
            kind,
            size: Cell::new(size),
            pos,
            channel: RefCell::new(None),
            next_gate: RefCell::new(None),
            previous_gate: RefCell::new(None),
        })
    }

    /// The name of the gate, without its cluster position.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The position index of the gate within its cluster.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The size of the gate cluster this gate belongs to.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size.get()
    }

    pub(crate) fn set_size(&self, size: usize) {
        self.size.set(size);
    }

    /// Indicates whether this gate is part of a multi-gate cluster.
    #[must_use]
    pub fn is_cluster(&self) -> bool {
        self.size.get() != 1
    }

    /// The direction of the gate.
    #[must_use]
    pub fn kind(&self) -> GateKind {
        self.kind
    }

    fn name_with_pos(&self) -> String {
        if self.is_cluster() {
            format!("{}[{}]", self.name, self.pos)
        } else {
            self.name.clone()
        }
    }

    /// A short identifier that holds all necessary information.
    #[must_use]
    pub fn str(&self) -> String {
        match self.kind {
            GateKind::Input => format!("{} (input)", self.name_with_pos()),
            GateKind::Output => format!("{} (output)", self.name_with_pos()),
        }
    }

    /// The full tree path of the gate.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}:{}", self.owner().path(), self.name_with_pos())
    }

    ///
    /// The owner module of this gate.
    ///
    /// # Panics
    ///
    /// May panic when called during teardown, since the owner may
    /// already be dropped.
    ///
    #[must_use]
    pub fn owner(&self) -> ModuleRef {
        self.owner
            .upgrade()
            .expect("gate owner was dropped while the gate was still referenced")
    }

    /// The next gate in the gate chain.
    #[must_use]
    pub fn next_gate(&self) -> Option<GateRef> {
        self.next_gate.borrow().clone()
    }

    /// The previous gate in the gate chain.
    #[must_use]
    pub fn previous_gate(&self) -> Option<GateRef> {
        self.previous_gate.borrow().clone()?.upgrade()
    }

    /// The channel attached to the connection leaving this gate.
    #[must_use]
    pub fn channel(&self) -> Option<ChannelRef> {
        self.channel.borrow().clone()
    }

    ///
    /// Connects this gate to a peer, optionally attaching channel
    /// parameters to the connection.
    ///
    /// # Panics
    ///
    /// Panics if either endpoint already carries a connection in the
    /// relevant direction. A gate has at most one peer per direction.
    ///
    pub fn connect(self: Arc<Gate>, peer: GateRef, channel: Option<ChannelMetrics>) {
        assert!(
            self.next_gate.borrow().is_none(),
            "gate '{}' is already connected",
            self.path()
        );
        assert!(
            peer.previous_gate.borrow().is_none(),
            "gate '{}' already has an incoming connection",
            peer.path()
        );

        *peer.previous_gate.borrow_mut() = Some(Arc::downgrade(&self));
        *self.next_gate.borrow_mut() = Some(peer);

        if let Some(metrics) = channel {
            *self.channel.borrow_mut() = Some(Channel::new(self.path().into(), metrics));
        }
    }

    ///
    /// Follows the next-gate references until a gate without a successor
    /// is found.
    ///
    #[must_use]
    pub fn path_end(&self) -> Option<GateRef> {
        let mut current = self.next_gate()?;
        while let Some(next_gate) = current.next_gate() {
            current = next_gate;
        }
        Some(current)
    }

    // Severs all connections of this gate. Called during module teardown
    // to break the reference cycles of the gate chain.
    pub(crate) fn unlink(&self) {
        if let Some(prev) = self.previous_gate() {
            *prev.next_gate.borrow_mut() = None;
        }
        if let Some(next) = self.next_gate.borrow_mut().take() {
            *next.previous_gate.borrow_mut() = None;
        }
        *self.previous_gate.borrow_mut() = None;
        *self.channel.borrow_mut() = None;
    }
}

impl Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("path", &self.path())
            .field("kind", &self.kind)
            .finish()
    }
}

// Custom impl since the next/previous references are circular.
impl PartialEq for Gate {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.owner().id() == other.owner().id()
            && self.pos == other.pos
            && self.size.get() == other.size.get()
    }
}
impl Eq for Gate {}

mod private {
    pub trait Sealed {}
}

///
/// A trait for a type to reference a module-specific gate.
///
pub trait IntoModuleGate: private::Sealed {
    ///
    /// Extracts a gate from a module using the given value as an
    /// implicit reference.
    ///
    fn as_gate(&self, _module: &ModuleContext) -> Option<GateRef> {
        None
    }
}

impl IntoModuleGate for GateRef {
    fn as_gate(&self, _module: &ModuleContext) -> Option<GateRef> {
        Some(self.clone())
    }
}
impl private::Sealed for GateRef {}

impl IntoModuleGate for &GateRef {
    fn as_gate(&self, _module: &ModuleContext) -> Option<GateRef> {
        Some(GateRef::clone(self))
    }
}
impl private::Sealed for &GateRef {}

impl IntoModuleGate for (&str, usize) {
    fn as_gate(&self, module: &ModuleContext) -> Option<GateRef> {
        module
            .gates
            .borrow()
            .iter()
            .find(|g| g.name() == self.0 && g.pos() == self.1)
            .cloned()
    }
}
impl private::Sealed for (&str, usize) {}

impl IntoModuleGate for &str {
    fn as_gate(&self, module: &ModuleContext) -> Option<GateRef> {
        module
            .gates
            .borrow()
            .iter()
            .find(|g| g.name() == *self && g.size() == 1)
            .cloned()
    }
}
impl private::Sealed for &str {}
