//! Event ordering and cancellation semantics of the dispatch loop.

use simcore::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

mod common;
use common::Recorder;

#[test]
fn priority_breaks_ties_before_insertion_order() {
    let mut sim = Sim::new();
    sim.node(
        "root",
        ModuleFn::new(
            || {
                // equal arrival time, priorities (1, 2, 1), scheduled in
                // kind order 1, 2, 3
                schedule_at(Message::new().kind(1).priority(1), SimTime::from(7.0));
                schedule_at(Message::new().kind(2).priority(2), SimTime::from(7.0));
                schedule_at(Message::new().kind(3).priority(1), SimTime::from(7.0));
            },
            |_, _msg| {},
        ),
    );

    let (recorder, trace) = Recorder::new();
    let rt = Builder::seeded(1).quiet().observer(recorder).build(sim);
    let (_, time, profile) = rt.run().unwrap();

    assert_eq!(time, SimTime::from(7.0));
    assert_eq!(profile.event_count, 3);
    assert_eq!(
        trace.borrow().iter().map(|d| d.kind).collect::<Vec<_>>(),
        [1, 3, 2]
    );
}

#[test]
fn cancelled_timer_is_never_dispatched() {
    let mut sim = Sim::new();
    sim.node(
        "root",
        ModuleFn::new(
            || {
                let timer = schedule_at(Message::new().kind(1), SimTime::from(10.0));
                schedule_at(Message::new().kind(2), SimTime::from(3.0));
                timer
            },
            |timer, msg| {
                assert_eq!(msg.header().kind, 2);
                let cancelled = cancel_event(*timer).expect("timer is still scheduled");
                assert_eq!(cancelled.header().kind, 1);
                assert_eq!(cancelled.header().id, *timer);
                // a second cancellation finds nothing
                assert!(cancel_event(*timer).is_none());
            },
        ),
    );

    let (recorder, trace) = Recorder::new();
    let rt = Builder::seeded(1).quiet().observer(recorder).build(sim);
    let (_, time, profile) = rt.run().unwrap();

    // the event set ran dry at t=3, nothing was dispatched afterwards
    assert_eq!(time, SimTime::from(3.0));
    assert_eq!(profile.event_count, 1);
    assert_eq!(trace.borrow().len(), 1);
}

#[test]
fn dispatch_times_are_monotonic() {
    let mut sim = Sim::new();
    sim.node(
        "root",
        ModuleFn::new(
            || {
                for _ in 0..100 {
                    let at = SimTime::from(sample(rand::distributions::Uniform::new(0.0, 50.0)));
                    schedule_at(Message::new(), at);
                }
            },
            |_, _msg| {},
        ),
    );

    let (recorder, trace) = Recorder::new();
    let rt = Builder::seeded(42).quiet().observer(recorder).build(sim);
    let (_, _, profile) = rt.run().unwrap();

    assert_eq!(profile.event_count, 100);
    let trace = trace.borrow();
    assert!(trace.windows(2).all(|w| w[0].time <= w[1].time));
}

#[test]
fn event_count_limit_stops_the_run() {
    let mut sim = Sim::new();
    sim.node(
        "root",
        ModuleFn::new(
            || {
                schedule_at(Message::new(), SimTime::from(1.0));
            },
            |_, _msg| {
                // perpetual self-rescheduling
                schedule_in(Message::new(), Duration::from_secs(1));
            },
        ),
    );

    let result = Builder::seeded(1).quiet().max_itr(10).build(sim).run();
    let RuntimeResult::PrematureAbort {
        profile,
        active_events,
        ..
    } = result
    else {
        panic!("expected premature abort, got {result:?}")
    };
    assert_eq!(profile.event_count, 10);
    assert_eq!(active_events, 1);
}

#[test]
fn termination_request_ends_the_run_cleanly() {
    let finished = Rc::new(RefCell::new(false));
    let finished_handle = finished.clone();

    let mut sim = Sim::new();
    sim.node(
        "root",
        ModuleFn::new(
            move || {
                let finished = finished_handle.clone();
                schedule_at(Message::new(), SimTime::from(1.0));
                schedule_at(Message::new(), SimTime::from(100.0));
                finished
            },
            |_, _msg| {
                end_simulation();
            },
        ),
    );
    // a sibling recording that finalization ran
    struct Fin(Rc<RefCell<bool>>);
    impl Module for Fin {
        fn at_sim_end(&mut self) {
            *self.0.borrow_mut() = true;
        }
    }
    sim.node("probe", Fin(finished.clone()));

    let (_, time, profile) = Builder::seeded(1).quiet().build(sim).run().unwrap();
    assert_eq!(time, SimTime::from(1.0));
    assert_eq!(profile.event_count, 1);
    assert!(*finished.borrow());
}
