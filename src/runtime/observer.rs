use crate::net::message::Message;
use crate::net::module::{ModuleId, ModuleRef};
use crate::net::path::ObjectPath;
use crate::time::SimTime;
use std::io::Write;

///
/// Registerable callbacks over the significant kernel events of a run.
///
/// Observers are registered on the [`Builder`](crate::runtime::Builder)
/// and are invoked synchronously from within the kernel. They receive
/// shared references only: an observer must not (and cannot) mutate the
/// future event set or the module tree.
///
#[allow(unused_variables)]
pub trait Observer {
    /// A module was created, during network build or at runtime.
    fn module_created(&mut self, module: &ModuleRef) {}

    /// A module was removed from the simulation.
    fn module_deleted(&mut self, path: &ObjectPath, id: ModuleId) {}

    /// A message entered the future event set.
    fn message_scheduled(&mut self, msg: &Message) {}

    /// A scheduled message was cancelled and returned to its caller.
    fn message_cancelled(&mut self, msg: &Message) {}

    /// A message is being delivered to its arrival module.
    fn message_delivered(&mut self, msg: &Message, module: &ModuleRef) {}

    /// The simulation clock advanced to a new instant.
    fn clock_advanced(&mut self, time: SimTime) {}

    /// An initialization stage is about to run across the module tree.
    fn stage_started(&mut self, stage: usize) {}

    /// The run ended, after finalization.
    fn sim_finished(&mut self, time: SimTime) {}
}

///
/// An [`Observer`] that emits the append-only event log, one record per
/// line.
///
/// Delivery records have the form
/// `E#n t=T src=(module,gate) dst=(module,gate) msg=id kind=K`; module
/// creation and deletion emit `M+`/`M-` records. Times are printed with
/// full round-trip precision, so two identically seeded runs produce
/// byte-identical logs.
///
pub struct EventLog<W: Write> {
    out: W,
    dispatched: usize,
}

impl<W: Write> EventLog<W> {
    /// Creates an event log writing to the given sink.
    pub fn new(out: W) -> Self {
        Self { out, dispatched: 0 }
    }
}

fn endpoint(module: Option<String>, gate: Option<String>) -> String {
    format!(
        "({},{})",
        module.unwrap_or_else(|| "-".to_string()),
        gate.unwrap_or_else(|| "-".to_string())
    )
}

impl<W: Write> Observer for EventLog<W> {
    fn module_created(&mut self, module: &ModuleRef) {
        let _ = writeln!(self.out, "M+ id={} path={}", module.id(), module.path());
    }

    fn module_deleted(&mut self, path: &ObjectPath, id: ModuleId) {
        let _ = writeln!(self.out, "M- id={id} path={path}");
    }

    fn message_delivered(&mut self, msg: &Message, module: &ModuleRef) {
        self.dispatched += 1;

        let header = msg.header();
        let src = endpoint(
            header
                .sender_gate
                .as_ref()
                .map(|g| g.owner().path().to_string())
                .or_else(|| {
                    (header.sender_module == module.id()).then(|| module.path().to_string())
                }),
            header.sender_gate.as_ref().map(|g| g.name().to_string()),
        );
        let dst = endpoint(
            Some(module.path().to_string()),
            header.arrival_gate.as_ref().map(|g| g.name().to_string()),
        );

        let _ = writeln!(
            self.out,
            "E#{} t={} src={} dst={} msg={} kind={}",
            self.dispatched,
            header.arrival_time.as_secs_f64(),
            src,
            dst,
            header.id,
            header.kind,
        );
    }

    fn sim_finished(&mut self, _time: SimTime) {
        let _ = self.out.flush();
    }
}
