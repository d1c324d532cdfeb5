//! The module-scope API: free functions valid while a module executes.

use crate::net::gate::{GateKind, GateRef, IntoModuleGate};
use crate::net::message::{Message, MessageId, TYP_STARTUP};
use crate::net::module::{current, try_current, ActivityModule, ActivitySlot, Execution, Module, ModuleRef};
use crate::net::sim::ctx::{schedule_self_message, with_scope};
use crate::runtime::{raise, SimError};
use crate::time::{Duration, SimTime};

///
/// Sends a message over a gate of the current module.
///
/// The destination and arrival time are resolved immediately: the gate
/// chain is walked to its terminal input gate, accumulating the delay,
/// transmission time and bit error probability of every channel along
/// the way. The message is then owned by the kernel until delivery.
///
/// > *This function requires a module scope.*
///
/// # Panics
///
/// Panics (failing the current module) if the gate does not exist, is
/// not an output gate of the current module, or is not connected.
///
pub fn send(msg: impl Into<Message>, gate: impl IntoModuleGate) {
    send_in(msg, Duration::ZERO, gate)
}

///
/// Sends a message over a gate of the current module, delayed by
/// `delay` on top of any channel delays.
///
/// See [`send`].
///
pub fn send_in(msg: impl Into<Message>, delay: Duration, gate: impl IntoModuleGate) {
    let ctx = current();
    let Some(gate) = gate.as_gate(&ctx) else {
        raise(SimError::Build(format!(
            "cannot send: no such gate on module '{}'",
            ctx.path()
        )))
    };
    if gate.owner().id() != ctx.id() {
        raise(SimError::Ownership(format!(
            "cannot send on gate '{}': not a gate of the sending module '{}'",
            gate.path(),
            ctx.path()
        )))
    }
    if gate.kind() != GateKind::Output {
        raise(SimError::State(format!(
            "cannot send on gate '{}': not an output gate",
            gate.path()
        )))
    }

    let mut msg = msg.into();
    msg.header_mut().send_time = SimTime::now();
    msg.header_mut().sender_module = ctx.id();
    msg.header_mut().sender_gate = Some(gate.clone());

    if gate.next_gate().is_none() {
        raise(SimError::Build(format!(
            "cannot send on gate '{}': gate is not connected",
            gate.path()
        )))
    }

    let at = resolve_route(&mut msg, gate, SimTime::now() + delay);
    schedule(msg, at);
}

///
/// Sends a message directly onto an input gate of another module,
/// bypassing any connections, with an explicit propagation delay.
///
/// > *This function requires a module scope.*
///
pub fn send_direct(
    msg: impl Into<Message>,
    delay: Duration,
    module: &ModuleRef,
    gate: impl IntoModuleGate,
) {
    let ctx = current();
    let Some(gate) = gate.as_gate(module) else {
        raise(SimError::Build(format!(
            "cannot send: no such gate on module '{}'",
            module.path()
        )))
    };
    if gate.kind() != GateKind::Input {
        raise(SimError::State(format!(
            "cannot send directly onto gate '{}': not an input gate",
            gate.path()
        )))
    }

    let mut msg = msg.into();
    msg.header_mut().send_time = SimTime::now();
    msg.header_mut().sender_module = ctx.id();
    msg.header_mut().arrival_module = gate.owner().id();
    msg.header_mut().arrival_gate = Some(gate);

    schedule(msg, SimTime::now() + delay);
}

///
/// Schedules a message onto the current module itself, to arrive at the
/// given point in time. Self-messages are the timers of the simulation.
///
/// Returns the message id, which can be passed to [`cancel_event`].
///
/// > *This function requires a module scope.*
///
pub fn schedule_at(msg: impl Into<Message>, at: SimTime) -> MessageId {
    let ctx = current();
    let mut msg = msg.into();
    msg.header_mut().send_time = SimTime::now();
    msg.header_mut().sender_module = ctx.id();
    msg.header_mut().sender_gate = None;
    msg.header_mut().arrival_module = ctx.id();
    msg.header_mut().arrival_gate = None;

    let id = msg.header().id;
    schedule(msg, at);
    id
}

///
/// Schedules a self-message to arrive after the given delay.
///
/// See [`schedule_at`].
///
pub fn schedule_in(msg: impl Into<Message>, delay: Duration) -> MessageId {
    schedule_at(msg, SimTime::now() + delay)
}

///
/// Removes a scheduled message from the future event set, returning
/// ownership of it to the caller, or `None` if no message with the
/// given id is scheduled.
///
/// > *This function requires an active simulation.*
///
pub fn cancel_event(id: MessageId) -> Option<Message> {
    with_scope(|scope| {
        let cancelled = scope.fes.borrow_mut().cancel(id).ok()?;
        scope.notify(|o| o.message_cancelled(&cancelled));
        Some(cancelled)
    })
}

///
/// Ends the current module. Events still addressed to it are discarded
/// at dispatch. For activity modules this is equivalent to returning
/// from `activity()`.
///
/// > *This function requires a module scope.*
///
pub fn shutdown() {
    current().active.set(false);
}

///
/// Requests termination of the whole simulation at the next dispatch
/// boundary. The run counts as a clean termination: finalization still
/// runs.
///
/// > *This function requires an active simulation.*
///
pub fn end_simulation() {
    with_scope(|scope| scope.flags.terminated.set(true));
}

///
/// Fails the simulation with a model-level error, unwinding the current
/// module. Finalization is skipped and the run reports a failure.
///
/// > *This function requires a module scope.*
///
pub fn error(reason: impl Into<String>) -> ! {
    raise(SimError::User(reason.into()))
}

///
/// Resolves a parameter for the current module, walking ancestor paths
/// up to the root if the module itself has no binding.
///
/// > *This function requires a module scope.*
///
#[must_use]
pub fn par(key: &str) -> Option<String> {
    let ctx = current();
    with_scope(|scope| scope.globals.parameters.resolve(&ctx.path, key))
}

///
/// Looks up a module by its dotted path in the module tree.
///
/// > *This function requires an active simulation.*
///
#[must_use]
pub fn module_at(path: impl Into<crate::net::path::ObjectPath>) -> Option<ModuleRef> {
    with_scope(|scope| scope.table.borrow().by_path(&path.into()))
}

///
/// Creates a handler-style child module of the current module at
/// runtime. The new module is initialized immediately, within the
/// current dispatch.
///
/// > *This function requires a module scope.*
///
pub fn create_child(name: &str, module: impl Module) -> ModuleRef {
    let child = attach_child(name, Execution::Handler(Box::new(module)));
    super::events::startup_handler(&child);
    child
}

///
/// Creates an activity-style child module of the current module at
/// runtime. Its coroutine starts at the current instant, once the
/// startup event is dispatched.
///
/// > *This function requires a module scope.*
///
pub fn create_activity_child(name: &str, module: impl ActivityModule) -> ModuleRef {
    let child = attach_child(name, Execution::Activity(ActivitySlot::new(module)));
    schedule_self_message(TYP_STARTUP, child.id(), SimTime::now());
    child
}

fn attach_child(name: &str, exec: Execution) -> ModuleRef {
    let ctx = current();
    with_scope(|scope| {
        let parent = scope
            .table
            .borrow()
            .by_id(ctx.id())
            .expect("current module is not part of the simulation");
        let child = ModuleRef::child_of(name, &parent, exec);
        scope.table.borrow_mut().add(child.clone());
        scope.notify(|o| o.module_created(&child));
        child
    })
}

///
/// Removes a module and all of its descendants from the simulation:
/// scheduled events addressed to them are dropped, their gates are
/// severed and their state is released.
///
/// Deleting the currently executing module is legal; the teardown is
/// deferred until the current delivery has returned to the kernel.
///
/// > *This function requires an active simulation.*
///
pub fn delete_module(module: ModuleRef) {
    with_scope(|scope| {
        let is_self = try_current().is_some_and(|ctx| ctx.id() == module.id());
        if is_self {
            module.active.set(false);
            scope.flags.pending_delete.borrow_mut().push(module);
        } else {
            teardown(&module, scope);
        }
    });
}

pub(crate) fn teardown(module: &ModuleRef, scope: &crate::net::sim::ctx::SimScope) {
    for child in module.children() {
        teardown(&child, scope);
    }

    module.active.set(false);

    let dropped = scope.fes.borrow_mut().purge_module(module.id());
    if dropped > 0 {
        tracing::debug!(
            "dropped {dropped} scheduled events addressed to deleted module '{}'",
            module.path()
        );
    }

    for gate in module.gates() {
        gate.unlink();
    }
    module.ctx.gates.borrow_mut().clear();
    module.ctx.activity.borrow_mut().put_aside.clear();

    // release the module software, including any coroutine
    *module.exec.borrow_mut() = Execution::Handler(Box::new(DeletedModule));

    if let Some(parent) = module.parent() {
        parent
            .ctx
            .children
            .borrow_mut()
            .retain(|child| child.id() != module.id());
    }
    scope.table.borrow_mut().remove(module.id());
    scope.notify(|o| o.module_deleted(&module.path(), module.id()));
}

// The placeholder software of a deleted module; never invoked since the
// module is inactive.
struct DeletedModule;
impl Module for DeletedModule {}

// Walks the gate chain, accumulating channel delays, transmission
// times and bit errors, and stamps the arrival fields of the message.
// Returns the arrival time.
pub(crate) fn resolve_route(msg: &mut Message, gate: GateRef, mut at: SimTime) -> SimTime {
    let mut cur = gate;
    loop {
        let Some(next) = cur.next_gate() else { break };
        if let Some(channel) = cur.channel() {
            let metrics = channel.metrics();
            at += metrics.transit_duration(msg.bit_len());
            if !msg.header().bit_error && metrics.sample_bit_error(msg.bit_len()) {
                msg.header_mut().bit_error = true;
            }
        }
        tracing::trace!(
            "gate '{}' forwarding message [{}] to '{}'",
            cur.path(),
            msg.str(),
            next.path()
        );
        cur = next;
    }

    if cur.kind() == GateKind::Output {
        raise(SimError::Build(format!(
            "message [{}] cannot be delivered: gate chain ends on output gate '{}'",
            msg.str(),
            cur.path()
        )))
    }

    msg.header_mut().arrival_module = cur.owner().id();
    msg.header_mut().arrival_gate = Some(cur);
    at
}

// Hands a fully addressed message to the future event set.
fn schedule(mut msg: Message, at: SimTime) {
    with_scope(|scope| {
        if scope.flags.finalizing.get() {
            raise(SimError::State(
                "cannot send or schedule messages during finalization".to_string(),
            ))
        }
        msg.header_mut().arrival_time = at;
        scope.notify(|o| o.message_scheduled(&msg));
        if let Err(e) = scope.fes.borrow_mut().schedule(msg, at) {
            raise(e.into())
        }
    });
}
