use crate::time::SimTime;
use std::fmt::Display;
use std::mem;
use std::time::{Duration, Instant};

///
/// A composed limit that terminates the event execution of a runtime.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeLimit {
    /// An unbounded runtime. A runtime with this limit only finishes
    /// once all events are handled and no new events were created.
    None,

    /// A bound on the number of dispatched events.
    EventCount(usize),

    /// A bound on the simulation time. A runtime with this limit stops
    /// once no events scheduled at or before the given time are left.
    SimTime(SimTime),

    /// A bound on the consumed wall-clock time, checked at dispatch
    /// boundaries.
    CpuTime(Duration),

    /// Combines two limits with a logical AND.
    CombinedAnd(Box<RuntimeLimit>, Box<RuntimeLimit>),

    /// Combines two limits with a logical OR.
    CombinedOr(Box<RuntimeLimit>, Box<RuntimeLimit>),
}

impl RuntimeLimit {
    // Checked before every dispatch; `time` is the arrival time of the
    // event about to be dispatched. The simulation-time bound is
    // evaluated before the wall-clock bound, so a run exceeding both
    // reports the deterministic one.
    pub(crate) fn applies(&self, itr_count: usize, time: SimTime, started: Instant) -> bool {
        match self {
            Self::None => false,

            Self::EventCount(e) => itr_count > *e,
            Self::SimTime(t) => time > *t,
            Self::CpuTime(d) => started.elapsed() > *d,

            Self::CombinedAnd(lhs, rhs) => {
                lhs.applies(itr_count, time, started) && rhs.applies(itr_count, time, started)
            }
            Self::CombinedOr(lhs, rhs) => {
                lhs.applies(itr_count, time, started) || rhs.applies(itr_count, time, started)
            }
        }
    }

    pub(crate) fn add(&mut self, limit: RuntimeLimit) {
        if matches!(self, Self::None) {
            *self = limit;
        } else {
            let mut other = Self::None;
            mem::swap(&mut other, self);
            *self = Self::CombinedOr(Box::new(other), Box::new(limit));
        }
    }
}

impl Display for RuntimeLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),

            Self::EventCount(e) => write!(f, "MaxEventCount({e})"),
            Self::SimTime(t) => write!(f, "MaxSimTime({t})"),
            Self::CpuTime(d) => write!(f, "MaxCpuTime({d:?})"),

            Self::CombinedAnd(lhs, rhs) => write!(f, "{lhs} and {rhs}"),
            Self::CombinedOr(lhs, rhs) => write!(f, "{lhs} or {rhs}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_limits() {
        let started = Instant::now();

        let limit = RuntimeLimit::None;
        assert_eq!(limit.to_string(), "None");
        assert!(!limit.applies(123, 100.0.into(), started));
        assert!(!limit.applies(usize::MAX, SimTime::MAX, started));

        let limit = RuntimeLimit::EventCount(100);
        assert_eq!(limit.to_string(), "MaxEventCount(100)");
        assert!(!limit.applies(23, 100.0.into(), started));
        assert!(limit.applies(101, 0.0.into(), started));

        let limit = RuntimeLimit::SimTime(100.0.into());
        assert!(!limit.applies(0, 100.0.into(), started));
        assert!(limit.applies(0, 100.000001.into(), started));

        let limit = RuntimeLimit::CpuTime(Duration::from_secs(3600));
        assert!(!limit.applies(0, SimTime::MAX, started));
        let limit = RuntimeLimit::CpuTime(Duration::from_millis(1));
        assert!(limit.applies(0, SimTime::ZERO, Instant::now() - Duration::from_secs(1)));
    }

    #[test]
    fn combined_limits() {
        use RuntimeLimit::{CombinedOr, EventCount, SimTime};
        let started = Instant::now();

        let limit = CombinedOr(Box::new(EventCount(100)), Box::new(SimTime(100.0.into())));
        assert!(!limit.applies(20, 10.0.into(), started));
        assert!(limit.applies(0, 200.0.into(), started));
        assert!(limit.applies(101, 10.0.into(), started));

        let mut other = RuntimeLimit::EventCount(100);
        other.add(SimTime(100.0.into()));
        assert_eq!(limit, other);
    }
}
