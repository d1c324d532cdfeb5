use crate::net::gate::GateRef;
use crate::net::module::ModuleId;
use crate::time::SimTime;
use std::cell::Cell;
use std::fmt;

///
/// A runtime-unique identifier of a message.
///
/// Identifiers are assigned at message creation and are never reused
/// within a run. They identify scheduled events for cancellation.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct MessageId(pub u64);

thread_local! {
    static MESSAGE_ID: Cell<u64> = const { Cell::new(1) };
}

impl MessageId {
    /// A general purpose ID indicating None.
    pub const NULL: MessageId = MessageId(0);

    /// Generates a unique message ID.
    pub fn gen() -> Self {
        MESSAGE_ID.with(|c| {
            let next = c.get();
            c.set(next + 1);
            Self(next)
        })
    }

    // Restarts the counter, so that consecutive runs on the same thread
    // produce identical identifier streams.
    pub(crate) fn reset() {
        MESSAGE_ID.with(|c| c.set(1));
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

///
/// The type of a message, a user-defined tag comparable to the TOS field
/// in IP packets.
///
pub type MessageKind = u16;

// Internal message class tags. User created messages are `TYP_USER`,
// everything else is a kernel self-message.
pub(crate) const TYP_USER: u8 = 0;
pub(crate) const TYP_STARTUP: u8 = 1;
pub(crate) const TYP_WAKEUP: u8 = 2;
pub(crate) const TYP_TIMEOUT: u8 = 3;

///
/// The metadata attached to a message, independent of its contents.
///
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct Header {
    pub(crate) typ: u8,

    pub id: MessageId,
    pub kind: MessageKind,
    /// The scheduling priority. Messages with a *lower* value are
    /// dispatched first when arriving at the same instant.
    pub priority: i16,
    /// The length of the message in bytes, used for transmission timing
    /// and the bit error model.
    pub length: usize,

    pub creation_time: SimTime,
    pub send_time: SimTime,
    pub arrival_time: SimTime,

    pub sender_module: ModuleId,
    pub arrival_module: ModuleId,
    pub sender_gate: Option<GateRef>,
    pub arrival_gate: Option<GateRef>,

    /// Whether the message was corrupted by a lossy channel. Corrupted
    /// messages are still delivered.
    pub bit_error: bool,
}

impl Header {
    /// The length of the message in bits.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.length * 8
    }

    /// Whether this is a message scheduled by a module onto itself.
    #[must_use]
    pub fn is_self_message(&self) -> bool {
        self.sender_gate.is_none() && self.sender_module == self.arrival_module
    }

    /// Whether this is a kernel self-message (a coroutine startup,
    /// wakeup or timeout) rather than a user message.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.typ != TYP_USER
    }

    pub(crate) fn is_user(&self) -> bool {
        self.typ == TYP_USER
    }
}

impl Default for Header {
    fn default() -> Self {
        Self {
            typ: TYP_USER,

            id: MessageId::gen(),
            kind: 0,
            priority: 0,
            length: 0,

            creation_time: SimTime::now(),
            send_time: SimTime::MAX,
            arrival_time: SimTime::MAX,

            sender_module: ModuleId::NULL,
            arrival_module: ModuleId::NULL,
            sender_gate: None,
            arrival_gate: None,

            bit_error: false,
        }
    }
}

// # DUP

impl Header {
    pub(super) fn dup(&self) -> Self {
        Self {
            typ: self.typ,

            id: MessageId::gen(),
            kind: self.kind,
            priority: self.priority,
            length: self.length,

            creation_time: SimTime::now(),
            send_time: SimTime::MAX,
            arrival_time: SimTime::MAX,

            sender_module: self.sender_module,
            arrival_module: self.arrival_module,
            sender_gate: self.sender_gate.clone(),
            arrival_gate: self.arrival_gate.clone(),

            bit_error: self.bit_error,
        }
    }
}
