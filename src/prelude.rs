//! A collection of the most commonly used types and functions.

pub use crate::time::{Duration, SimTime};

pub use crate::runtime::{
    random, rng, rng_stream, sample, Builder, EventLog, Observer, Profile, Runtime, RuntimeLimit,
    RuntimeResult, SchedulingError, SimError,
};

pub use crate::net::channel::{Channel, ChannelMetrics, ChannelRef};
pub use crate::net::gate::{Gate, GateKind, GateRef, IntoModuleGate};
pub use crate::net::message::{
    Body, CustomSizeBody, Header, Message, MessageBody, MessageBuilder, MessageId, MessageKind,
};
pub use crate::net::module::{
    current, receive, receive_on, receive_on_timeout, receive_timeout, try_current, wait, Activity,
    ActivityFn, ActivityModule, HandlerFn, Module, ModuleFn, ModuleId, ModuleRef,
};
pub use crate::net::{
    cancel_event, create_activity_child, create_child, delete_module, end_simulation, error,
    module_at, par, schedule_at, schedule_in, send, send_direct, send_in, shutdown, ModuleBlock,
    ObjectPath, Parameters, ScopedSim, Sim,
};

pub use crate::config::{Config, ConfigFile, Registry};
