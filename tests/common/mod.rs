#![allow(dead_code)]

use simcore::prelude::*;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// One recorded dispatch of a user message.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub time: SimTime,
    pub kind: MessageKind,
    pub dst: String,
    pub gate: Option<String>,
    pub bit_error: bool,
}

/// An observer collecting the dispatch trace of user messages.
pub struct Recorder {
    trace: Rc<RefCell<Vec<Dispatch>>>,
}

impl Recorder {
    pub fn new() -> (Recorder, Rc<RefCell<Vec<Dispatch>>>) {
        let trace = Rc::new(RefCell::new(Vec::new()));
        (
            Recorder {
                trace: trace.clone(),
            },
            trace,
        )
    }
}

impl Observer for Recorder {
    fn message_delivered(&mut self, msg: &Message, module: &ModuleRef) {
        if msg.header().is_internal() {
            return;
        }
        self.trace.borrow_mut().push(Dispatch {
            time: msg.header().arrival_time,
            kind: msg.header().kind,
            dst: module.path().to_string(),
            gate: msg
                .header()
                .arrival_gate
                .as_ref()
                .map(|g| g.name().to_string()),
            bit_error: msg.header().bit_error,
        });
    }
}

/// A `Write` sink with a shared read handle, for capturing event logs.
#[derive(Clone)]
pub struct SharedBuf {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl SharedBuf {
    pub fn new() -> (SharedBuf, Rc<RefCell<Vec<u8>>>) {
        let buf = Rc::new(RefCell::new(Vec::new()));
        (SharedBuf { buf: buf.clone() }, buf)
    }
}

impl Write for SharedBuf {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
