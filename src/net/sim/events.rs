//! Event delivery and lifecycle traversal.

use crate::net::message::{Message, TYP_STARTUP};
use crate::net::module::{CtxGuard, Execution, ModuleRef};
use crate::net::sim::ctx::with_scope;
use crate::runtime::{unwind_to_error, SimError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

///
/// Delivers a message to its arrival module, dispatching by execution
/// style. User code runs inside an unwind harness: a panic or a raised
/// kernel error deactivates the module and surfaces as a `SimError`,
/// failing the run.
///
pub(crate) fn deliver(module: &ModuleRef, msg: Message) -> Result<(), SimError> {
    let span = tracing::info_span!("module", path = %module.path());
    let _span = span.enter();
    let _ctx = CtxGuard::enter(Arc::clone(&module.ctx));

    let result = catch_unwind(AssertUnwindSafe(|| dispatch(module, msg)));
    match result {
        Ok(()) => Ok(()),
        Err(unwind) => {
            module.active.set(false);
            Err(unwind_to_error(unwind))
        }
    }
}

fn dispatch(module: &ModuleRef, mut msg: Message) {
    if module.is_activity() {
        dispatch_activity(module, msg);
    } else {
        tracing::trace!("handling message [{}]", msg.str());
        msg.header_mut().arrival_module = module.id();
        let mut exec = module.exec.borrow_mut();
        let Execution::Handler(handler) = &mut *exec else {
            unreachable!("execution style is fixed at module creation")
        };
        handler.handle_message(msg);
    }
}

// Resumes the coroutine of an activity module. The delivered message is
// placed into the module's mailbox, from which the pending blocking
// primitive consumes or parks it during the poll.
fn dispatch_activity(module: &ModuleRef, msg: Message) {
    let is_startup = msg.header().typ == TYP_STARTUP;

    let fut = {
        let mut exec = module.exec.borrow_mut();
        let Execution::Activity(slot) = &mut *exec else {
            unreachable!("execution style is fixed at module creation")
        };
        if is_startup {
            tracing::trace!("starting activity");
            if let Some(launch) = slot.launch.take() {
                slot.fut = Some(launch());
            }
        } else {
            module.ctx.activity.borrow_mut().delivery = Some(msg);
        }
        slot.fut.take()
    };

    let Some(mut fut) = fut else {
        // not yet started: keep the message for the first receive
        let mut state = module.ctx.activity.borrow_mut();
        if let Some(msg) = state.delivery.take() {
            if msg.header().is_user() {
                state.put_aside.push_back(msg);
            }
        }
        return;
    };

    let mut cx = Context::from_waker(Waker::noop());
    match fut.as_mut().poll(&mut cx) {
        Poll::Ready(()) => {
            tracing::trace!("activity ended");
            module.active.set(false);
        }
        Poll::Pending => {
            if module.is_active() {
                let mut exec = module.exec.borrow_mut();
                if let Execution::Activity(slot) = &mut *exec {
                    slot.fut = Some(fut);
                }
            }
            // an inactive module shut itself down mid-poll; the
            // coroutine is released here
        }
    }

    module.ctx.activity.borrow_mut().delivery = None;
}

// Runs the staged initialization of a freshly created handler module,
// within its own scope.
pub(crate) fn startup_handler(module: &ModuleRef) {
    let span = tracing::info_span!("module", path = %module.path());
    let _span = span.enter();
    let _ctx = CtxGuard::enter(Arc::clone(&module.ctx));

    let stages = module.num_sim_start_stages();
    for stage in 0..stages {
        let mut exec = module.exec.borrow_mut();
        if let Execution::Handler(handler) = &mut *exec {
            handler.at_sim_start(stage);
        }
    }
}

///
/// Staged initialization over the whole module tree: all stage-`i`
/// calls complete before the first stage-`i+1` call, and within a
/// stage parents strictly precede their children (the module table
/// keeps pre-order). Activity modules take no stages; their startup
/// event is queued at the current instant instead.
///
pub(crate) fn sim_start() -> Result<(), SimError> {
    let modules = with_scope(|scope| scope.table.borrow().iter().cloned().collect::<Vec<_>>());

    for module in &modules {
        if module.is_activity() {
            crate::net::sim::ctx::schedule_self_message(
                TYP_STARTUP,
                module.id(),
                crate::time::SimTime::now(),
            );
        }
    }

    let max_stage = modules
        .iter()
        .fold(0, |acc, module| acc.max(module.num_sim_start_stages()));

    for stage in 0..max_stage {
        with_scope(|scope| scope.notify(|o| o.stage_started(stage)));
        for module in &modules {
            if stage >= module.num_sim_start_stages() {
                continue;
            }
            let span = tracing::info_span!("module", path = %module.path());
            let _span = span.enter();
            let _ctx = CtxGuard::enter(Arc::clone(&module.ctx));
            tracing::trace!("initialization stage {stage}");

            let result = catch_unwind(AssertUnwindSafe(|| {
                let mut exec = module.exec.borrow_mut();
                if let Execution::Handler(handler) = &mut *exec {
                    handler.at_sim_start(stage);
                }
            }));
            if let Err(unwind) = result {
                module.active.set(false);
                return Err(unwind_to_error(unwind));
            }
        }
    }
    Ok(())
}

///
/// Finalization over the whole module tree: strict bottom-up
/// post-order, children before parents, siblings in creation order.
/// Only invoked after a termination without error; finalizers must not
/// send messages.
///
pub(crate) fn sim_end() -> Result<(), SimError> {
    with_scope(|scope| scope.flags.finalizing.set(true));

    let roots = with_scope(|scope| {
        scope
            .table
            .borrow()
            .iter()
            .filter(|module| module.parent().is_none())
            .cloned()
            .collect::<Vec<_>>()
    });

    for root in &roots {
        finish_recursive(root)?;
    }
    Ok(())
}

fn finish_recursive(module: &ModuleRef) -> Result<(), SimError> {
    for child in module.children() {
        finish_recursive(&child)?;
    }

    let span = tracing::info_span!("module", path = %module.path());
    let _span = span.enter();
    let _ctx = CtxGuard::enter(Arc::clone(&module.ctx));
    tracing::trace!("finalizing");

    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut exec = module.exec.borrow_mut();
        if let Execution::Handler(handler) = &mut *exec {
            handler.at_sim_end();
        }
    }));
    result.map_err(unwind_to_error)
}
