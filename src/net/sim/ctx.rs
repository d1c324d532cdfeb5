use crate::net::message::{Message, MessageId};
use crate::net::module::{ModuleId, ModuleRef};
use crate::net::sim::Globals;
use crate::runtime::observer::Observer;
use crate::runtime::{raise, FutureEventSet};
use crate::time::SimTime;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::ModuleTable;

thread_local! {
    static SIM_SCOPE: RefCell<Option<SimScope>> = const { RefCell::new(None) };
}

// The simulation scope: handles to the kernel state of the currently
// running simulation, installed for the duration of `Runtime::run`. The
// module-scope API (send, schedule_at, ...) resolves through this.
pub(crate) struct SimScope {
    pub(crate) fes: Rc<RefCell<FutureEventSet>>,
    pub(crate) table: Rc<RefCell<ModuleTable>>,
    pub(crate) globals: Rc<Globals>,
    pub(crate) observers: Rc<RefCell<Vec<Box<dyn Observer>>>>,
    pub(crate) flags: Rc<SimFlags>,
}

// Requests raised from within a dispatch that the main loop applies at
// the next dispatch boundary.
#[derive(Default)]
pub(crate) struct SimFlags {
    pub(crate) terminated: Cell<bool>,
    pub(crate) finalizing: Cell<bool>,
    pub(crate) pending_delete: RefCell<Vec<ModuleRef>>,
}

impl SimScope {
    pub(crate) fn notify(&self, f: impl Fn(&mut dyn Observer)) {
        for observer in self.observers.borrow_mut().iter_mut() {
            f(&mut **observer);
        }
    }
}

// Installs the scope for the lifetime of the guard.
pub(crate) struct ScopeGuard(());

impl ScopeGuard {
    pub(crate) fn install(scope: SimScope) -> Self {
        SIM_SCOPE.with(|cell| {
            let mut cell = cell.borrow_mut();
            assert!(
                cell.is_none(),
                "a simulation is already running on this thread"
            );
            *cell = Some(scope);
        });
        ScopeGuard(())
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SIM_SCOPE.with(|cell| cell.borrow_mut().take());
    }
}

pub(crate) fn with_scope<R>(f: impl FnOnce(&SimScope) -> R) -> R {
    SIM_SCOPE.with(|cell| {
        let scope = cell.borrow();
        let scope = scope
            .as_ref()
            .expect("operation requires an active simulation on this thread");
        f(scope)
    })
}

pub(crate) fn try_with_scope<R>(f: impl FnOnce(&SimScope) -> R) -> Option<R> {
    SIM_SCOPE.with(|cell| {
        let scope = cell.borrow();
        scope.as_ref().map(f)
    })
}

// Queues a kernel self-message (startup / wakeup / timeout) for the
// given module. Not surfaced to observers: these are kernel-internal.
pub(crate) fn schedule_self_message(typ: u8, module: ModuleId, at: SimTime) -> MessageId {
    with_scope(|scope| {
        let mut msg = Message::internal(typ, module);
        msg.header_mut().send_time = SimTime::now();
        match scope.fes.borrow_mut().schedule(msg, at) {
            Ok(id) => id,
            Err(e) => raise(e.into()),
        }
    })
}

// Removes a kernel self-message, e.g. a timeout whose receive succeeded.
pub(crate) fn cancel_self_message(id: MessageId) {
    with_scope(|scope| {
        let _ = scope.fes.borrow_mut().cancel(id);
    });
}
