use crate::net::message::{Message, MessageId};
use crate::net::module::ModuleId;
use crate::runtime::SchedulingError;
use crate::time::SimTime;
use fxhash::FxHashMap;

///
/// The future event set: all scheduled messages, ordered by
/// `(arrival_time, priority, insertion_seq)`.
///
/// The structure is a binary min-heap over a vector, with a side map
/// from message id to heap slot that is kept consistent through every
/// sift. The map is what makes [`cancel`](FutureEventSet::cancel)
/// `O(log n)`: the victim is located in `O(1)`, swapped against the
/// last slot and re-sifted from there.
///
/// The insertion sequence number makes the ordering total: messages
/// with an identical `(arrival_time, priority)` pop in the order they
/// were scheduled, which keeps runs deterministic for identical seeds
/// and inputs.
///
pub(crate) struct FutureEventSet {
    heap: Vec<Entry>,
    index: FxHashMap<MessageId, usize>,
    seq: u64,
}

struct Entry {
    time: SimTime,
    priority: i16,
    seq: u64,
    msg: Message,
}

impl Entry {
    fn key(&self) -> (SimTime, i16, u64) {
        (self.time, self.priority, self.seq)
    }
}

impl FutureEventSet {
    pub(crate) fn new() -> Self {
        Self {
            heap: Vec::with_capacity(64),
            index: FxHashMap::default(),
            seq: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    ///
    /// Queues a message for arrival at the given time, stamping its
    /// arrival time and assigning the next insertion sequence number.
    ///
    pub(crate) fn schedule(
        &mut self,
        mut msg: Message,
        time: SimTime,
    ) -> Result<MessageId, SchedulingError> {
        let id = msg.header().id;
        if self.index.contains_key(&id) {
            return Err(SchedulingError::AlreadyScheduled(id));
        }
        if time < SimTime::now() {
            return Err(SchedulingError::TimeInPast {
                time,
                now: SimTime::now(),
            });
        }

        msg.header_mut().arrival_time = time;
        self.seq += 1;
        let entry = Entry {
            time,
            priority: msg.header().priority,
            seq: self.seq,
            msg,
        };

        let slot = self.heap.len();
        self.heap.push(entry);
        self.index.insert(id, slot);
        self.sift_up(slot);
        Ok(id)
    }

    /// The arrival time of the earliest queued message.
    pub(crate) fn peek_time(&self) -> Option<SimTime> {
        self.heap.first().map(|entry| entry.time)
    }

    /// Removes and returns the earliest queued message.
    pub(crate) fn pop(&mut self) -> Option<Message> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let entry = self.heap.pop().expect("heap is non-empty");
        self.index.remove(&entry.msg.header().id);
        if !self.heap.is_empty() {
            self.index.insert(self.heap[0].msg.header().id, 0);
            self.sift_down(0);
        }
        Some(entry.msg)
    }

    ///
    /// Removes a queued message by id, returning ownership of it to the
    /// caller.
    ///
    pub(crate) fn cancel(&mut self, id: MessageId) -> Result<Message, SchedulingError> {
        let Some(slot) = self.index.remove(&id) else {
            return Err(SchedulingError::NotScheduled(id));
        };

        let last = self.heap.len() - 1;
        self.heap.swap(slot, last);
        let entry = self.heap.pop().expect("indexed slot implies non-empty heap");
        if slot < self.heap.len() {
            self.index.insert(self.heap[slot].msg.header().id, slot);
            if slot > 0 && self.heap[slot].key() < self.heap[(slot - 1) / 2].key() {
                self.sift_up(slot);
            } else {
                self.sift_down(slot);
            }
        }
        Ok(entry.msg)
    }

    ///
    /// Drops every queued message addressed to the given module,
    /// returning how many were removed. Used on module deletion.
    ///
    pub(crate) fn purge_module(&mut self, module: ModuleId) -> usize {
        let before = self.heap.len();
        self.heap
            .retain(|entry| entry.msg.header().arrival_module != module);
        self.rebuild();
        before - self.heap.len()
    }

    // Re-heapifies after a bulk retain and rebuilds the index map.
    fn rebuild(&mut self) {
        self.index.clear();
        for slot in 0..self.heap.len() {
            self.index.insert(self.heap[slot].msg.header().id, slot);
        }
        for slot in (0..self.heap.len() / 2).rev() {
            self.sift_down(slot);
        }
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.heap[slot].key() < self.heap[parent].key() {
                self.swap(slot, parent);
                slot = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        loop {
            let left = 2 * slot + 1;
            let right = 2 * slot + 2;
            let mut smallest = slot;
            if left < self.heap.len() && self.heap[left].key() < self.heap[smallest].key() {
                smallest = left;
            }
            if right < self.heap.len() && self.heap[right].key() < self.heap[smallest].key() {
                smallest = right;
            }
            if smallest == slot {
                break;
            }
            self.swap(slot, smallest);
            slot = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.index.insert(self.heap[a].msg.header().id, a);
        self.index.insert(self.heap[b].msg.header().id, b);
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        assert_eq!(self.index.len(), self.heap.len());
        for (slot, entry) in self.heap.iter().enumerate() {
            assert_eq!(self.index[&entry.msg.header().id], slot);
            if slot > 0 {
                let parent = (slot - 1) / 2;
                assert!(self.heap[parent].key() <= entry.key());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::message::Message;

    fn msg(priority: i16) -> Message {
        Message::new().priority(priority).build()
    }

    #[test]
    fn pops_in_time_order() {
        let mut fes = FutureEventSet::new();
        fes.schedule(msg(0), SimTime::from(3.0)).unwrap();
        fes.schedule(msg(0), SimTime::from(1.0)).unwrap();
        fes.schedule(msg(0), SimTime::from(2.0)).unwrap();
        fes.assert_consistent();

        let times = std::iter::from_fn(|| fes.pop())
            .map(|m| m.header().arrival_time)
            .collect::<Vec<_>>();
        assert_eq!(
            times,
            [SimTime::from(1.0), SimTime::from(2.0), SimTime::from(3.0)]
        );
    }

    #[test]
    fn equal_keys_pop_in_insertion_order() {
        let mut fes = FutureEventSet::new();
        let t = SimTime::from(7.0);
        let a = fes.schedule(msg(1), t).unwrap();
        let b = fes.schedule(msg(2), t).unwrap();
        let c = fes.schedule(msg(1), t).unwrap();

        let order = std::iter::from_fn(|| fes.pop())
            .map(|m| m.header().id)
            .collect::<Vec<_>>();
        // priority breaks the tie first, insertion order second
        assert_eq!(order, [a, c, b]);
    }

    #[test]
    fn cancel_of_unscheduled_message_fails() {
        let mut fes = FutureEventSet::new();
        let m = msg(0);
        let id = m.header().id;
        fes.schedule(m, SimTime::from(1.0)).unwrap();

        let returned = fes.cancel(id).unwrap();
        assert!(matches!(
            fes.cancel(id),
            Err(SchedulingError::NotScheduled(_))
        ));
        // a cancelled message may be rescheduled
        fes.schedule(returned, SimTime::from(2.0)).unwrap();
        assert_eq!(fes.len(), 1);
    }

    #[test]
    fn schedule_rejects_arrival_in_the_past() {
        SimTime::set_now(SimTime::from(5.0));
        let mut fes = FutureEventSet::new();
        assert!(matches!(
            fes.schedule(msg(0), SimTime::from(1.0)),
            Err(SchedulingError::TimeInPast { .. })
        ));
        SimTime::set_now(SimTime::ZERO);
    }

    #[test]
    fn cancel_removes_by_id() {
        let mut fes = FutureEventSet::new();
        let ids = (0..10)
            .map(|i| fes.schedule(msg(0), SimTime::from(f64::from(i))).unwrap())
            .collect::<Vec<_>>();

        let victim = ids[4];
        let cancelled = fes.cancel(victim).unwrap();
        assert_eq!(cancelled.header().id, victim);
        fes.assert_consistent();

        let rest = std::iter::from_fn(|| fes.pop())
            .map(|m| m.header().id)
            .collect::<Vec<_>>();
        assert_eq!(rest.len(), 9);
        assert!(!rest.contains(&victim));
    }

    #[test]
    fn purge_drops_only_matching_arrivals() {
        use crate::net::module::ModuleId;

        let mut fes = FutureEventSet::new();
        for i in 0..6 {
            let mut m = msg(0);
            m.header_mut().arrival_module = ModuleId(u16::from(i % 2 == 0));
            fes.schedule(m, SimTime::from(f64::from(i))).unwrap();
        }

        assert_eq!(fes.purge_module(ModuleId(1)), 3);
        fes.assert_consistent();
        assert_eq!(fes.len(), 3);
        assert!(std::iter::from_fn(|| fes.pop())
            .all(|m| m.header().arrival_module == ModuleId(0)));
    }
}
