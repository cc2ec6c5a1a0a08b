//! Time-ordered execution queue
//!
//! Instructions carry a delay; the queue turns them into items with an
//! absolute timestamp. Items due at the same instant are popped together.

use crate::instruction::{Action, Instruction, ScheduleKind};
use crate::{Error, Result};
use chrono::NaiveDateTime;
use indexmap::IndexSet;
use qnet_core::ObjectType;
use std::collections::BTreeMap;
use tracing::trace;

/// A scheduled action
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub time: NaiveDateTime,
    /// Insertion order, used to keep batches deterministic
    pub seq: u64,
    pub action: Action,
}

/// The logical clock together with all pending work
#[derive(Debug, Clone)]
pub struct ExecutionQueue {
    current_time: NaiveDateTime,
    items: BTreeMap<NaiveDateTime, Vec<QueueItem>>,
    seq: u64,
    /// Recurring sources, by object type and schedule kind, with a pending creation
    recurring: IndexSet<(ObjectType, ScheduleKind)>,
}

impl ExecutionQueue {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            current_time: start,
            items: BTreeMap::new(),
            seq: 0,
            recurring: IndexSet::new(),
        }
    }

    pub fn current_time(&self) -> NaiveDateTime {
        self.current_time
    }

    /// Insert an instruction relative to `base_time`
    ///
    /// Returns the absolute execution time. A recurring creation is refused
    /// while another occurrence of the same source (object type and schedule
    /// kind) is pending.
    pub fn add(&mut self, instruction: Instruction, base_time: NaiveDateTime) -> Result<NaiveDateTime> {
        let time = base_time + instruction.delay;
        if time < self.current_time {
            return Err(Error::ScheduledInPast(time));
        }
        if let Action::CreateObject(creation) = &instruction.action {
            if let Some(schedule) = creation.schedule {
                if !self.recurring.insert((creation.object_type.clone(), schedule.kind())) {
                    return Err(Error::DuplicateRecurringSource(creation.object_type.clone()));
                }
            }
        }
        trace!(time = %time, kind = instruction.action.kind(), "queued");
        let seq = self.seq;
        self.seq += 1;
        self.items.entry(time).or_default().push(QueueItem {
            time,
            seq,
            action: instruction.action,
        });
        Ok(time)
    }

    /// Insert an instruction relative to the current time
    pub fn schedule(&mut self, instruction: Instruction) -> Result<NaiveDateTime> {
        self.add(instruction, self.current_time)
    }

    /// Remove and return every item due at the current time
    pub fn pop_due(&mut self) -> Vec<QueueItem> {
        let due = self.items.remove(&self.current_time).unwrap_or_default();
        for item in &due {
            if let Action::CreateObject(creation) = &item.action {
                if let Some(schedule) = creation.schedule {
                    self.recurring.shift_remove(&(creation.object_type.clone(), schedule.kind()));
                }
            }
        }
        due
    }

    /// Move the clock to the earliest pending item; no-op when empty
    pub fn advance(&mut self) -> NaiveDateTime {
        if let Some(next) = self.peek_next_time() {
            self.current_time = next;
        }
        self.current_time
    }

    pub fn peek_next_time(&self) -> Option<NaiveDateTime> {
        self.items.keys().next().copied()
    }

    /// Whether something is due right now
    pub fn has_due(&self) -> bool {
        self.items.contains_key(&self.current_time)
    }

    pub fn has_pending_recurring(&self, object_type: &ObjectType, kind: ScheduleKind) -> bool {
        self.recurring.contains(&(object_type.clone(), kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{ObjectCreation, Schedule, ScheduleKind};
    use chrono::{Duration, NaiveDate};
    use qnet_core::{ObjectId, ObjectStatus};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 10, 12)
            .and_then(|d| d.and_hms_opt(12, 21, 0))
            .unwrap()
    }

    fn status_change(raw: u64) -> Instruction {
        Instruction::update_status(Duration::zero(), ObjectId::new(raw), ObjectStatus::Inactive)
    }

    #[test]
    fn test_pop_due_returns_batch() {
        let start = t0();
        let mut queue = ExecutionQueue::new(start);
        let ten = start + Duration::minutes(10);
        queue.add(status_change(1), ten).unwrap();
        queue.add(status_change(2), ten).unwrap();
        queue.add(status_change(3), start + Duration::minutes(15)).unwrap();

        assert!(queue.pop_due().is_empty());
        assert_eq!(queue.advance(), ten);

        let due = queue.pop_due();
        assert_eq!(due.len(), 2);
        assert!(due.iter().all(|item| item.time == ten));
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.advance(), start + Duration::minutes(15));
        assert_eq!(queue.current_time(), start + Duration::minutes(15));
    }

    #[test]
    fn test_advance_on_empty_queue() {
        let mut queue = ExecutionQueue::new(t0());
        assert_eq!(queue.advance(), t0());
        assert!(queue.is_empty());
        assert_eq!(queue.peek_next_time(), None);
    }

    #[test]
    fn test_batch_keeps_insertion_order() {
        let mut queue = ExecutionQueue::new(t0());
        for raw in 0..5 {
            queue.schedule(status_change(raw)).unwrap();
        }
        let seqs: Vec<u64> = queue.pop_due().iter().map(|i| i.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_reject_past() {
        let mut queue = ExecutionQueue::new(t0());
        let early = t0() - Duration::hours(1);
        assert_eq!(queue.add(status_change(1), early), Err(Error::ScheduledInPast(early)));
    }

    #[test]
    fn test_single_pending_recurring_creation() {
        let mut queue = ExecutionQueue::new(t0());
        let creation = ObjectCreation::new("order").with_schedule(Schedule::Fixed { hours: 2.0 });
        let instruction = Instruction::create_object(Duration::hours(2), creation);

        queue.schedule(instruction.clone()).unwrap();
        assert!(queue.has_pending_recurring(&"order".into(), ScheduleKind::Fixed));
        assert_eq!(
            queue.schedule(instruction.clone()),
            Err(Error::DuplicateRecurringSource("order".into()))
        );

        queue.advance();
        assert_eq!(queue.pop_due().len(), 1);
        assert!(!queue.has_pending_recurring(&"order".into(), ScheduleKind::Fixed));
        assert!(queue.schedule(instruction).is_ok());
    }

    #[test]
    fn test_recurring_sources_differ_by_schedule_kind() {
        let mut queue = ExecutionQueue::new(t0());
        let fixed = ObjectCreation::new("order").with_schedule(Schedule::Fixed { hours: 2.0 });
        let arrivals = ObjectCreation::new("order").with_schedule(Schedule::ArrivalRate { per_day: 5.0 });

        queue.schedule(Instruction::create_object(Duration::hours(2), fixed)).unwrap();
        queue.schedule(Instruction::create_object(Duration::hours(1), arrivals.clone())).unwrap();
        assert!(queue.has_pending_recurring(&"order".into(), ScheduleKind::Fixed));
        assert!(queue.has_pending_recurring(&"order".into(), ScheduleKind::ArrivalRate));
        assert_eq!(
            queue.schedule(Instruction::create_object(Duration::hours(3), arrivals)),
            Err(Error::DuplicateRecurringSource("order".into()))
        );
    }

    #[test]
    fn test_zero_delay_lands_in_current_batch() {
        let mut queue = ExecutionQueue::new(t0());
        queue.schedule(status_change(1)).unwrap();
        assert!(queue.has_due());
        queue.pop_due();
        assert!(!queue.has_due());
    }
}
