//! Blocking primitives for coroutine-style modules.
//!
//! These futures are the only suspension points of an activity module.
//! Each one is resumed by the dispatch loop when an event is delivered
//! to the owning module; there is no other wake source and no
//! preemption.

use super::{ActivityModule, ModuleContext};
use crate::net::gate::{GateRef, IntoModuleGate};
use crate::net::message::{Message, MessageId, TYP_TIMEOUT, TYP_WAKEUP};
use crate::net::sim::{cancel_self_message, schedule_self_message};
use crate::time::{Duration, SimTime};
use pin_project_lite::pin_project;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

// The coroutine attached to an activity module. `launch` builds the
// future on delivery of the startup event; `fut` holds it until the
// module ends.
pub(crate) struct ActivitySlot {
    pub(crate) launch: Option<Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()>>>>>,
    pub(crate) fut: Option<Pin<Box<dyn Future<Output = ()>>>>,
}

impl ActivitySlot {
    pub(crate) fn new<T: ActivityModule>(module: T) -> Self {
        Self {
            launch: Some(Box::new(move || Box::pin(module.activity()))),
            fut: None,
        }
    }
}

// Per-module mailbox shared between the dispatch loop and the primitive
// futures: the event currently being delivered, plus the put-aside queue
// of messages that arrived while the module was waiting for something
// else.
#[derive(Debug, Default)]
pub(crate) struct ActivityState {
    pub(crate) delivery: Option<Message>,
    pub(crate) put_aside: VecDeque<Message>,
}

impl ActivityState {
    fn pop_put_aside(&mut self) -> Option<Message> {
        self.put_aside.pop_front()
    }

    fn pop_put_aside_on(&mut self, gate: &GateRef) -> Option<Message> {
        let pos = self.put_aside.iter().position(|msg| {
            msg.header
                .arrival_gate
                .as_ref()
                .is_some_and(|g| Arc::ptr_eq(g, gate))
        })?;
        self.put_aside.remove(pos)
    }
}

fn resolve_gate(gate: impl IntoModuleGate) -> GateRef {
    let ctx = super::current();
    gate.as_gate(&ctx)
        .expect("cannot resolve gate on the current module")
}

///
/// Suspends until the next message for this module is available.
///
/// Messages parked in the put-aside queue are re-offered first, oldest
/// first, before any newly arriving event.
///
/// *This function must be called from within an activity module.*
#[must_use]
pub fn receive() -> Receive {
    Receive {
        ctx: super::current(),
    }
}

///
/// Suspends until the next message for this module is available, or the
/// timeout elapses. Returns `None` on timeout.
///
/// *This function must be called from within an activity module.*
#[must_use]
pub fn receive_timeout(timeout: Duration) -> ReceiveTimeout {
    ReceiveTimeout {
        ctx: super::current(),
        timeout,
        token: None,
    }
}

///
/// Suspends until a message arrives on the given gate of this module.
///
/// The put-aside queue is scanned first; messages arriving on other
/// gates in the meantime are parked there in arrival order.
///
/// *This function must be called from within an activity module.*
#[must_use]
pub fn receive_on(gate: impl IntoModuleGate) -> ReceiveOn {
    ReceiveOn {
        ctx: super::current(),
        gate: resolve_gate(gate),
    }
}

///
/// Like [`receive_on`], but resolves with `None` once the timeout
/// elapses without a matching arrival.
///
/// *This function must be called from within an activity module.*
#[must_use]
pub fn receive_on_timeout(gate: impl IntoModuleGate, timeout: Duration) -> ReceiveOnTimeout {
    ReceiveOnTimeout {
        ctx: super::current(),
        gate: resolve_gate(gate),
        timeout,
        token: None,
    }
}

///
/// Suspends for the given span of simulation time.
///
/// Internally this schedules a private wakeup self-message; messages
/// arriving for this module in the meantime are parked in the put-aside
/// queue.
///
/// *This function must be called from within an activity module.*
#[must_use]
pub fn wait(duration: Duration) -> Wait {
    Wait {
        ctx: super::current(),
        duration,
        token: None,
    }
}

pin_project! {
    /// Future returned by [`receive`].
    #[project(!Unpin)]
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    #[derive(Debug)]
    pub struct Receive {
        ctx: Arc<ModuleContext>,
    }
}

impl Future for Receive {
    type Output = Message;
    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let mut state = this.ctx.activity.borrow_mut();
        if let Some(msg) = state.pop_put_aside() {
            return Poll::Ready(msg);
        }
        match state.delivery.take() {
            Some(msg) if msg.header.is_user() => Poll::Ready(msg),
            // stale kernel self-message, e.g. a wakeup of an abandoned wait
            Some(_) | None => Poll::Pending,
        }
    }
}

pin_project! {
    /// Future returned by [`receive_timeout`].
    #[project(!Unpin)]
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    #[derive(Debug)]
    pub struct ReceiveTimeout {
        ctx: Arc<ModuleContext>,
        timeout: Duration,
        token: Option<MessageId>,
    }
}

impl Future for ReceiveTimeout {
    type Output = Option<Message>;
    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let mut state = this.ctx.activity.borrow_mut();

        if let Some(msg) = state.pop_put_aside() {
            drop(state);
            if let Some(token) = this.token.take() {
                cancel_self_message(token);
            }
            return Poll::Ready(Some(msg));
        }

        let Some(token) = *this.token else {
            drop(state);
            let at = SimTime::now() + *this.timeout;
            *this.token = Some(schedule_self_message(TYP_TIMEOUT, this.ctx.id, at));
            return Poll::Pending;
        };

        match state.delivery.take() {
            Some(msg) if msg.header.typ == TYP_TIMEOUT && msg.header.id == token => {
                Poll::Ready(None)
            }
            Some(msg) if msg.header.is_user() => {
                drop(state);
                cancel_self_message(token);
                Poll::Ready(Some(msg))
            }
            Some(_) | None => Poll::Pending,
        }
    }
}

pin_project! {
    /// Future returned by [`receive_on`].
    #[project(!Unpin)]
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    #[derive(Debug)]
    pub struct ReceiveOn {
        ctx: Arc<ModuleContext>,
        gate: GateRef,
    }
}

impl Future for ReceiveOn {
    type Output = Message;
    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let mut state = this.ctx.activity.borrow_mut();

        if let Some(msg) = state.pop_put_aside_on(this.gate) {
            return Poll::Ready(msg);
        }
        match state.delivery.take() {
            Some(msg)
                if msg.header.is_user()
                    && msg
                        .header
                        .arrival_gate
                        .as_ref()
                        .is_some_and(|g| Arc::ptr_eq(g, this.gate)) =>
            {
                Poll::Ready(msg)
            }
            Some(msg) if msg.header.is_user() => {
                state.put_aside.push_back(msg);
                Poll::Pending
            }
            Some(_) | None => Poll::Pending,
        }
    }
}

pin_project! {
    /// Future returned by [`receive_on_timeout`].
    #[project(!Unpin)]
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    #[derive(Debug)]
    pub struct ReceiveOnTimeout {
        ctx: Arc<ModuleContext>,
        gate: GateRef,
        timeout: Duration,
        token: Option<MessageId>,
    }
}

impl Future for ReceiveOnTimeout {
    type Output = Option<Message>;
    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let mut state = this.ctx.activity.borrow_mut();

        if let Some(msg) = state.pop_put_aside_on(this.gate) {
            drop(state);
            if let Some(token) = this.token.take() {
                cancel_self_message(token);
            }
            return Poll::Ready(Some(msg));
        }

        let Some(token) = *this.token else {
            drop(state);
            let at = SimTime::now() + *this.timeout;
            *this.token = Some(schedule_self_message(TYP_TIMEOUT, this.ctx.id, at));
            return Poll::Pending;
        };

        match state.delivery.take() {
            Some(msg) if msg.header.typ == TYP_TIMEOUT && msg.header.id == token => {
                Poll::Ready(None)
            }
            Some(msg)
                if msg.header.is_user()
                    && msg
                        .header
                        .arrival_gate
                        .as_ref()
                        .is_some_and(|g| Arc::ptr_eq(g, this.gate)) =>
            {
                drop(state);
                cancel_self_message(token);
                Poll::Ready(Some(msg))
            }
            Some(msg) if msg.header.is_user() => {
                state.put_aside.push_back(msg);
                Poll::Pending
            }
            Some(_) | None => Poll::Pending,
        }
    }
}

pin_project! {
    /// Future returned by [`wait`].
    #[project(!Unpin)]
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    #[derive(Debug)]
    pub struct Wait {
        ctx: Arc<ModuleContext>,
        duration: Duration,
        token: Option<MessageId>,
    }
}

impl Future for Wait {
    type Output = ();
    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        let Some(token) = *this.token else {
            let at = SimTime::now() + *this.duration;
            *this.token = Some(schedule_self_message(TYP_WAKEUP, this.ctx.id, at));
            return Poll::Pending;
        };

        let mut state = this.ctx.activity.borrow_mut();
        match state.delivery.take() {
            Some(msg) if msg.header.typ == TYP_WAKEUP && msg.header.id == token => {
                Poll::Ready(())
            }
            Some(msg) if msg.header.is_user() => {
                state.put_aside.push_back(msg);
                Poll::Pending
            }
            Some(_) | None => Poll::Pending,
        }
    }
}
