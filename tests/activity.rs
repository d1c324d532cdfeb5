//! Coroutine-style modules: wait, receive and the put-aside queue.

use simcore::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

mod common;
use common::Recorder;

#[test]
fn wait_resumes_at_exact_instants() {
    let mut sim = Sim::new();
    sim.node("src", ActivityFn::new(|| async {
        wait(Duration::from_secs(2)).await;
        send(Message::new().kind(7), "out");
        wait(Duration::from_secs(3)).await;
    }));
    sim.node("sink", HandlerFn::new(|msg: Message| {
        assert_eq!(SimTime::now(), SimTime::from(2.0));
        assert_eq!(msg.header().kind, 7);
    }));

    let out = sim.gate("src", "out", GateKind::Output);
    let input = sim.gate("sink", "in", GateKind::Input);
    out.connect(input, None);

    let (recorder, trace) = Recorder::new();
    let (sim, time, _) = Builder::seeded(1)
        .quiet()
        .observer(recorder)
        .build(sim)
        .run()
        .unwrap();

    // the module ended after the second wait, leaving the event set dry
    assert_eq!(time, SimTime::from(5.0));
    assert!(!sim.get("src").unwrap().is_active());
    assert_eq!(trace.borrow().len(), 1);
    assert_eq!(trace.borrow()[0].time, SimTime::from(2.0));
}

#[test]
fn receive_loops_over_incoming_messages() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_handle = seen.clone();

    let mut sim = Sim::new();
    sim.node("echo", ActivityFn::new(move || {
        let seen = seen_handle.clone();
        async move {
            loop {
                let msg = receive().await;
                seen.borrow_mut().push((SimTime::now(), msg.header().kind));
                if msg.header().kind == 0 {
                    break;
                }
            }
        }
    }));
    let input = sim.gate("echo", "in", GateKind::Input);

    let mut rt = Builder::seeded(1).quiet().build(sim);
    rt.send_onto(input.clone(), Message::new().kind(3), SimTime::from(1.0));
    rt.send_onto(input.clone(), Message::new().kind(5), SimTime::from(2.0));
    rt.send_onto(input, Message::new().kind(0), SimTime::from(3.0));

    let (sim, time, _) = rt.run().unwrap();
    assert_eq!(time, SimTime::from(3.0));
    assert!(!sim.get("echo").unwrap().is_active());
    assert_eq!(
        *seen.borrow(),
        [
            (SimTime::from(1.0), 3),
            (SimTime::from(2.0), 5),
            (SimTime::from(3.0), 0)
        ]
    );
}

#[test]
fn receive_on_parks_other_gates_in_arrival_order() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_handle = seen.clone();

    let mut sim = Sim::new();
    sim.node("rx", ActivityFn::new(move || {
        let seen = seen_handle.clone();
        async move {
            // wait for data specifically, control traffic is parked
            let msg = receive_on(("data", 0)).await;
            seen.borrow_mut().push(("data", msg.header().kind));

            // the parked control messages come back first, in arrival
            // order, ahead of anything arriving later
            let msg = receive().await;
            seen.borrow_mut().push(("ctrl", msg.header().kind));
            let msg = receive().await;
            seen.borrow_mut().push(("ctrl", msg.header().kind));

            let msg = receive().await;
            seen.borrow_mut().push(("late", msg.header().kind));
        }
    }));
    let data = sim.gate("rx", "data", GateKind::Input);
    let ctrl = sim.gate("rx", "ctrl", GateKind::Input);

    let mut rt = Builder::seeded(1).quiet().build(sim);
    rt.send_onto(ctrl.clone(), Message::new().kind(10), SimTime::from(1.0));
    rt.send_onto(ctrl, Message::new().kind(11), SimTime::from(2.0));
    rt.send_onto(data.clone(), Message::new().kind(20), SimTime::from(3.0));
    rt.send_onto(data, Message::new().kind(21), SimTime::from(4.0));

    let _ = rt.run().unwrap();
    assert_eq!(
        *seen.borrow(),
        [("data", 20), ("ctrl", 10), ("ctrl", 11), ("late", 21)]
    );
}

#[test]
fn receive_timeout_resolves_without_traffic() {
    let outcome = Rc::new(RefCell::new(None));
    let outcome_handle = outcome.clone();

    let mut sim = Sim::new();
    sim.node("rx", ActivityFn::new(move || {
        let outcome = outcome_handle.clone();
        async move {
            let got = receive_timeout(Duration::from_secs(4)).await;
            *outcome.borrow_mut() = Some((SimTime::now(), got.is_some()));
        }
    }));

    let (_, time, _) = Builder::seeded(1).quiet().build(sim).run().unwrap();
    assert_eq!(time, SimTime::from(4.0));
    assert_eq!(*outcome.borrow(), Some((SimTime::from(4.0), false)));
}

#[test]
fn receive_timeout_cancels_timer_on_success() {
    let outcome = Rc::new(RefCell::new(None));
    let outcome_handle = outcome.clone();

    let mut sim = Sim::new();
    sim.node("rx", ActivityFn::new(move || {
        let outcome = outcome_handle.clone();
        async move {
            let got = receive_timeout(Duration::from_secs(60)).await;
            *outcome.borrow_mut() = Some((SimTime::now(), got.map(|m| m.header().kind)));
        }
    }));
    let input = sim.gate("rx", "in", GateKind::Input);

    let mut rt = Builder::seeded(1).quiet().build(sim);
    rt.send_onto(input, Message::new().kind(5), SimTime::from(2.0));

    // the timeout self-message is cancelled, so the run ends at t=2
    let (_, time, _) = rt.run().unwrap();
    assert_eq!(time, SimTime::from(2.0));
    assert_eq!(*outcome.borrow(), Some((SimTime::from(2.0), Some(5))));
}

#[test]
fn activity_modules_can_drive_each_other() {
    let mut sim = Sim::new();
    sim.node("alice", ActivityFn::new(|| async {
        wait(Duration::from_secs(1)).await;
        send(Message::new().kind(1), "out");
        let reply = receive().await;
        assert_eq!(reply.header().kind, 2);
        assert_eq!(SimTime::now(), SimTime::from(3.0));
    }));
    sim.node("bob", ActivityFn::new(|| async {
        let msg = receive().await;
        assert_eq!(msg.header().kind, 1);
        wait(Duration::from_secs(1)).await;
        send(Message::new().kind(2), "out");
    }));

    let link = Some(ChannelMetrics::delay(Duration::from_millis(500)));
    let a_out = sim.gate("alice", "out", GateKind::Output);
    let b_in = sim.gate("bob", "in", GateKind::Input);
    a_out.connect(b_in, link);
    let b_out = sim.gate("bob", "out", GateKind::Output);
    let a_in = sim.gate("alice", "in", GateKind::Input);
    b_out.connect(a_in, link);

    let (sim, time, _) = Builder::seeded(1).quiet().build(sim).run().unwrap();
    assert_eq!(time, SimTime::from(3.0));
    assert!(!sim.get("alice").unwrap().is_active());
    assert!(!sim.get("bob").unwrap().is_active());
}
