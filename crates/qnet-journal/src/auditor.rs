//! Auditing and analytics for event log data

use chrono::{Duration, NaiveDateTime};
use indexmap::IndexMap;
use qnet_core::{ItemCounter, ObjectId, ObjectStatus, ObjectType};
use qnet_sim::{Event, EventLog, ObjectChange};

/// Auditor for querying and analyzing an event log
pub struct Auditor<'a> {
    log: &'a EventLog,
}

impl<'a> Auditor<'a> {
    /// Create a new auditor for a log
    pub fn new(log: &'a EventLog) -> Self {
        Self { log }
    }

    /// Generate a summary report of the run
    pub fn generate_report(&self) -> LogReport {
        let mut events_per_activity: IndexMap<String, usize> = IndexMap::new();
        let mut total_duration: IndexMap<String, i64> = IndexMap::new();
        for event in self.log.events() {
            *events_per_activity.entry(event.activity.clone()).or_insert(0) += 1;
            *total_duration.entry(event.activity.clone()).or_insert(0) += event.duration_ms;
        }
        let mean_duration_minutes = total_duration
            .iter()
            .map(|(activity, total)| {
                let count = events_per_activity.get(activity).copied().unwrap_or(1).max(1);
                (activity.clone(), *total as f64 / count as f64 / 60_000.0)
            })
            .collect();

        let mut objects_per_type: IndexMap<ObjectType, usize> = IndexMap::new();
        let mut objects_per_status: IndexMap<String, usize> = IndexMap::new();
        for object in self.log.objects() {
            *objects_per_type.entry(object.object_type.clone()).or_insert(0) += 1;
            *objects_per_status.entry(format!("{:?}", object.status)).or_insert(0) += 1;
        }

        let mut quantity_change: IndexMap<String, ItemCounter> = IndexMap::new();
        for record in self.log.quantity_operations() {
            quantity_change
                .entry(record.collection_point.clone())
                .or_default()
                .update(&record.operation);
        }

        LogReport {
            total_events: self.log.events().len(),
            total_objects: self.log.objects().count(),
            total_changes: self.log.changes().len(),
            first_event: self.log.events().iter().map(|e| e.timestamp).min(),
            last_event: self.log.events().iter().filter_map(|e| e.end_timestamp).max(),
            events_per_activity,
            mean_duration_minutes,
            objects_per_type,
            objects_per_status,
            quantity_change,
        }
    }

    /// Events matching specific criteria
    pub fn query(&self, query: &LogQuery) -> Vec<&'a Event> {
        self.log.events().iter().filter(|e| query.matches(e)).collect()
    }

    /// Everything the log knows about one object
    pub fn object_trace(&self, object: ObjectId) -> ObjectTrace<'a> {
        ObjectTrace {
            object,
            events: self.log.events().iter().filter(|e| e.objects.contains(&object)).collect(),
            changes: self.log.changes().iter().filter(|c| c.object() == object).collect(),
        }
    }

    /// Count executions of an activity
    pub fn count_activity(&self, activity: &str) -> usize {
        self.log.events_of_activity(activity).count()
    }

    /// All activities that occur in the log, sorted
    pub fn unique_activities(&self) -> Vec<&'a str> {
        let mut activities: Vec<&str> = self.log.events().iter().map(|e| e.activity.as_str()).collect();
        activities.sort();
        activities.dedup();
        activities
    }

    /// Stock of a collection point after each logged operation
    ///
    /// Starts from zero, so a log with initial stock reproduces the levels.
    pub fn stock_levels(&self, collection_point: &str) -> Vec<(NaiveDateTime, ItemCounter)> {
        let mut level = ItemCounter::new();
        let mut records: Vec<_> = self
            .log
            .quantity_operations()
            .iter()
            .filter(|r| r.collection_point == collection_point)
            .collect();
        records.sort_by_key(|r| r.time);
        records
            .into_iter()
            .map(|record| {
                level.update(&record.operation);
                (record.time, level.clone())
            })
            .collect()
    }

    /// Objects that reached `Terminated`, with the time it happened
    pub fn terminations(&self) -> Vec<(ObjectId, NaiveDateTime)> {
        self.log
            .changes()
            .iter()
            .filter_map(|change| match change {
                ObjectChange::Status {
                    object,
                    time,
                    status: ObjectStatus::Terminated,
                } => Some((*object, *time)),
                _ => None,
            })
            .collect()
    }

    /// Time from creation to termination per terminated object
    pub fn throughput_times(&self) -> Vec<(ObjectId, Duration)> {
        self.terminations()
            .into_iter()
            .filter_map(|(id, end)| self.log.object(id).map(|o| (id, end - o.created_at)))
            .collect()
    }
}

/// A summary report of a simulated log
#[derive(Debug, Clone)]
pub struct LogReport {
    /// Total number of logged events
    pub total_events: usize,
    /// Total number of logged objects
    pub total_objects: usize,
    /// Total number of object changes
    pub total_changes: usize,
    /// Start of the first event
    pub first_event: Option<NaiveDateTime>,
    /// End of the last event
    pub last_event: Option<NaiveDateTime>,
    /// Count of events per activity
    pub events_per_activity: IndexMap<String, usize>,
    /// Mean planned duration per activity
    pub mean_duration_minutes: IndexMap<String, f64>,
    /// Count of objects per type
    pub objects_per_type: IndexMap<ObjectType, usize>,
    /// Count of objects per final status
    pub objects_per_status: IndexMap<String, usize>,
    /// Net stock change per collection point, initial stock included
    pub quantity_change: IndexMap<String, ItemCounter>,
}

impl LogReport {
    /// Simulated time covered by the events
    pub fn time_span(&self) -> Option<Duration> {
        match (self.first_event, self.last_event) {
            (Some(first), Some(last)) => Some(last - first),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Log Report ===")?;
        writeln!(f, "Total events: {}", self.total_events)?;
        writeln!(f, "Total objects: {}", self.total_objects)?;
        writeln!(f, "Object changes: {}", self.total_changes)?;

        if let (Some(first), Some(last)) = (self.first_event, self.last_event) {
            writeln!(f, "Time range: {} - {}", first, last)?;
        }

        if !self.events_per_activity.is_empty() {
            writeln!(f, "\nEvents by activity:")?;
            let mut sorted: Vec<_> = self.events_per_activity.iter().collect();
            sorted.sort_by_key(|(_, count)| std::cmp::Reverse(**count));
            for (activity, count) in sorted {
                let mean = self.mean_duration_minutes.get(activity).copied().unwrap_or_default();
                writeln!(f, "  {}: {} (mean {:.1} min)", activity, count, mean)?;
            }
        }

        if !self.objects_per_type.is_empty() {
            writeln!(f, "\nObjects by type:")?;
            for (object_type, count) in &self.objects_per_type {
                writeln!(f, "  {}: {}", object_type, count)?;
            }
        }

        if !self.objects_per_status.is_empty() {
            writeln!(f, "\nObjects by status:")?;
            for (status, count) in &self.objects_per_status {
                writeln!(f, "  {}: {}", status, count)?;
            }
        }

        if !self.quantity_change.is_empty() {
            writeln!(f, "\nStock change by collection point:")?;
            for (cp, change) in &self.quantity_change {
                writeln!(f, "  {}: {}", cp, change)?;
            }
        }

        Ok(())
    }
}

/// Query criteria for filtering events
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Start time (inclusive)
    pub start: Option<NaiveDateTime>,
    /// End time (inclusive)
    pub end: Option<NaiveDateTime>,
    /// Filter by activity
    pub activity: Option<String>,
    /// Filter by involved object
    pub object: Option<ObjectId>,
    /// Only events that moved stock
    pub with_quantities: bool,
}

impl LogQuery {
    /// Create a new empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by time range
    pub fn in_range(mut self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Filter by activity
    pub fn by_activity(mut self, activity: impl Into<String>) -> Self {
        self.activity = Some(activity.into());
        self
    }

    /// Filter by object
    pub fn by_object(mut self, object: ObjectId) -> Self {
        self.object = Some(object);
        self
    }

    /// Only events with quantity operations
    pub fn with_quantities(mut self) -> Self {
        self.with_quantities = true;
        self
    }

    fn matches(&self, event: &Event) -> bool {
        if self.start.is_some_and(|start| event.timestamp < start) {
            return false;
        }
        if self.end.is_some_and(|end| event.timestamp > end) {
            return false;
        }
        if self.activity.as_ref().is_some_and(|a| *a != event.activity) {
            return false;
        }
        if self.object.is_some_and(|o| !event.objects.contains(&o)) {
            return false;
        }
        !(self.with_quantities && event.quantity_operations.is_zero())
    }
}

/// Events and changes of one object
#[derive(Debug, Clone)]
pub struct ObjectTrace<'a> {
    pub object: ObjectId,
    pub events: Vec<&'a Event>,
    pub changes: Vec<&'a ObjectChange>,
}
