//! The classic two-node ping scenario, end to end.

use simcore::prelude::*;

mod common;
use common::{Dispatch, Recorder};

const PING: MessageKind = 1;
const PONG: MessageKind = 2;

struct PingNode {
    serve_at_start: bool,
}

impl Module for PingNode {
    fn at_sim_start(&mut self, _stage: usize) {
        if self.serve_at_start {
            schedule_at(Message::new().kind(9), SimTime::ZERO);
        }
    }

    fn handle_message(&mut self, msg: Message) {
        if msg.header().is_self_message() || msg.header().kind == PONG {
            send(Message::new().kind(PING), "out");
        } else {
            send(Message::new().kind(PONG), "out");
        }
    }
}

fn ping_net() -> Sim {
    let mut sim = Sim::new();
    sim.node("a", PingNode { serve_at_start: true });
    sim.node("b", PingNode { serve_at_start: false });

    let link = Some(ChannelMetrics::delay(Duration::from_secs(1)));
    let a_out = sim.gate("a", "out", GateKind::Output);
    let b_in = sim.gate("b", "in", GateKind::Input);
    a_out.connect(b_in, link);

    let b_out = sim.gate("b", "out", GateKind::Output);
    let a_in = sim.gate("a", "in", GateKind::Input);
    b_out.connect(a_in, link);

    sim
}

#[test]
fn ping_trace_is_exact() {
    let (recorder, trace) = Recorder::new();
    let result = Builder::seeded(1)
        .quiet()
        .max_time(SimTime::from(5.0))
        .observer(recorder)
        .build(ping_net())
        .run();

    // the pong scheduled for t=6 stays in the event set
    assert!(matches!(
        result,
        RuntimeResult::PrematureAbort {
            active_events: 1,
            ..
        }
    ));

    let expected = [
        (0.0, 9, "a"),
        (1.0, PING, "b"),
        (2.0, PONG, "a"),
        (3.0, PING, "b"),
        (4.0, PONG, "a"),
        (5.0, PING, "b"),
    ];
    let trace = trace.borrow();
    assert_eq!(trace.len(), expected.len());
    for (dispatch, (time, kind, dst)) in trace.iter().zip(expected) {
        assert_eq!(
            (dispatch.time, dispatch.kind, dispatch.dst.as_str()),
            (SimTime::from(time), kind, dst),
            "unexpected dispatch {dispatch:?}"
        );
    }
}

#[test]
fn message_identity_survives_the_link() {
    struct Echo;
    impl Module for Echo {
        fn handle_message(&mut self, msg: Message) {
            assert_eq!(msg.header().arrival_time, SimTime::from(1.5));
            assert_eq!(msg.content::<String>(), "payload travels untouched");
        }
    }

    let mut sim = Sim::new();
    sim.node("src", HandlerFn::new(|_| {}));
    sim.node("dst", Echo);
    let out = sim.gate("src", "out", GateKind::Output);
    let input = sim.gate("dst", "in", GateKind::Input);
    out.connect(
        input,
        Some(ChannelMetrics::delay(Duration::from_millis(500))),
    );

    let mut rt = Builder::seeded(1).quiet().build(sim);
    rt.send_onto(
        rt.sim().get("src").unwrap().gate("out", 0).unwrap(),
        Message::new().content(String::from("payload travels untouched")),
        SimTime::from(1.0),
    );
    let (_, time, profile) = rt.run().unwrap();
    assert_eq!(time, SimTime::from(1.5));
    assert_eq!(profile.event_count, 1);
}

#[test]
fn identically_seeded_runs_produce_identical_traces() {
    let run = || -> Vec<Dispatch> {
        let (recorder, trace) = Recorder::new();
        let _ = Builder::seeded(123)
            .quiet()
            .max_time(SimTime::from(5.0))
            .observer(recorder)
            .build(ping_net())
            .run();
        let trace = trace.borrow().clone();
        trace
    };

    assert_eq!(run(), run());
}
