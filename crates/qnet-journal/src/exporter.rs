//! Export event log data to various formats

use crate::{Error, Result};
use chrono::NaiveDateTime;
use qnet_core::Object;
use qnet_sim::{Event, EventLog, ObjectChange, QuantityRecord};
use serde::Serialize;
use std::io::Write;

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// RON format (Rust Object Notation)
    Ron,
    /// JSON format (requires serde_json feature)
    Json,
    /// CSV format (events only)
    Csv,
    /// Human-readable text format
    Text,
}

/// Exporter for event log data
pub struct Exporter<'a> {
    log: &'a EventLog,
}

impl<'a> Exporter<'a> {
    /// Create a new exporter
    pub fn new(log: &'a EventLog) -> Self {
        Self { log }
    }

    /// Export to a string in the specified format
    pub fn export(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Ron => self.to_ron(),
            ExportFormat::Json => self.to_json(),
            ExportFormat::Csv => Ok(self.to_csv()),
            ExportFormat::Text => Ok(self.to_text()),
        }
    }

    /// Export to a writer
    pub fn export_to<W: Write>(&self, writer: &mut W, format: ExportFormat) -> Result<()> {
        let content = self.export(format)?;
        writer
            .write_all(content.as_bytes())
            .map_err(|e| Error::ExportError(e.to_string()))?;
        Ok(())
    }

    /// Export to RON format
    pub fn to_ron(&self) -> Result<String> {
        let export = ExportData::from_log(self.log);
        ron::ser::to_string_pretty(&export, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Export to JSON format
    #[cfg(feature = "serde_json")]
    pub fn to_json(&self) -> Result<String> {
        let export = ExportData::from_log(self.log);
        serde_json::to_string_pretty(&export).map_err(|e| Error::Serialization(e.to_string()))
    }

    #[cfg(not(feature = "serde_json"))]
    pub fn to_json(&self) -> Result<String> {
        Err(Error::ExportError(
            "JSON export requires the 'serde_json' feature".to_string(),
        ))
    }

    /// Export events to CSV, one row per event
    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("event_id,activity,timestamp,end_timestamp,duration_ms,objects,attributes\n");

        for event in self.log.events() {
            let end = event.end_timestamp.map(|t| t.to_string()).unwrap_or_default();
            let objects = event
                .objects
                .iter()
                .map(|o| o.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            let attributes = event
                .attributes
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(";");

            output.push_str(&format!(
                "{},{},{},{},{},{},\"{}\"\n",
                event.id,
                escape(&event.activity),
                event.timestamp,
                end,
                event.duration_ms,
                objects,
                attributes.replace('"', "\"\"")
            ));
        }

        output
    }

    /// Export objects to CSV, one row per object in its latest state
    pub fn objects_to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("object_id,object_type,status,created_at,quantities,attributes\n");

        for object in self.log.objects() {
            let attributes = object
                .attributes
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(";");
            output.push_str(&format!(
                "{},{},{:?},{},\"{}\",\"{}\"\n",
                object.id,
                escape(object.object_type.as_str()),
                object.status,
                object.created_at,
                object.quantities,
                attributes.replace('"', "\"\"")
            ));
        }

        output
    }

    /// Export quantity operations to CSV, one row per item type
    ///
    /// Initial stock rows have an empty event id.
    pub fn quantities_to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("event_id,collection_point,time,item_type,quantity\n");

        for record in self.log.quantity_operations() {
            let event = record.event.map(|e| e.to_string()).unwrap_or_default();
            for (item, quantity) in record.operation.iter() {
                output.push_str(&format!(
                    "{},{},{},{},{}\n",
                    event,
                    escape(&record.collection_point),
                    record.time,
                    escape(item),
                    quantity
                ));
            }
        }

        output
    }

    /// Export to human-readable text format
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str("=== Event Log Export ===\n\n");
        output.push_str(&format!("Events: {}\n", self.log.events().len()));
        output.push_str(&format!("Objects: {}\n", self.log.objects().count()));
        output.push_str(&format!("Object changes: {}\n", self.log.changes().len()));
        output.push_str(&format!(
            "Quantity operations: {}\n",
            self.log.quantity_operations().len()
        ));

        let starts = self.log.events().iter().map(|e| e.timestamp);
        if let (Some(first), Some(last)) = (starts.clone().min(), starts.max()) {
            output.push_str(&format!("Time range: {} - {}\n", first, last));
        }

        output.push_str("\n=== Events ===\n");

        let mut current_day = None;
        for event in self.log.events() {
            let day = event.timestamp.date();
            if current_day != Some(day) {
                output.push_str(&format!("\n--- {} ---\n", day));
                current_day = Some(day);
            }
            let objects = event
                .objects
                .iter()
                .map(|o| o.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            output.push_str(&format!(
                "  #{} {} {} [{}]\n",
                event.id,
                event.timestamp.time(),
                event.activity,
                objects
            ));
            for (cp, operation) in event.quantity_operations.iter() {
                output.push_str(&format!("      {}: {}\n", cp, operation));
            }
        }

        output
    }

    /// Export only events starting in `start..=end`
    pub fn export_range(&self, start: NaiveDateTime, end: NaiveDateTime, format: ExportFormat) -> Result<String> {
        if start > end {
            return Err(Error::InvalidTimeRange(start, end));
        }
        let events: Vec<&Event> = self
            .log
            .events()
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .collect();
        let filtered = FilteredExport { start, end, events };

        match format {
            ExportFormat::Ron => ron::ser::to_string_pretty(&filtered, ron::ser::PrettyConfig::default())
                .map_err(|e| Error::Serialization(e.to_string())),
            #[cfg(feature = "serde_json")]
            ExportFormat::Json => {
                serde_json::to_string_pretty(&filtered).map_err(|e| Error::Serialization(e.to_string()))
            }
            #[cfg(not(feature = "serde_json"))]
            ExportFormat::Json => Err(Error::ExportError(
                "JSON export requires the 'serde_json' feature".to_string(),
            )),
            _ => Err(Error::ExportError(
                "Range export only supports RON and JSON".to_string(),
            )),
        }
    }
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Data structure for full log export
#[derive(Debug, Clone, Serialize)]
struct ExportData<'a> {
    version: u32,
    stats: ExportStats,
    events: &'a [Event],
    objects: Vec<&'a Object>,
    changes: &'a [ObjectChange],
    quantity_operations: &'a [QuantityRecord],
}

impl<'a> ExportData<'a> {
    fn from_log(log: &'a EventLog) -> Self {
        Self {
            version: 1,
            stats: ExportStats {
                event_count: log.events().len(),
                object_count: log.objects().count(),
                change_count: log.changes().len(),
                quantity_operation_count: log.quantity_operations().len(),
                first_event: log.events().iter().map(|e| e.timestamp).min(),
                last_event: log.events().iter().map(|e| e.timestamp).max(),
            },
            events: log.events(),
            objects: log.objects().collect(),
            changes: log.changes(),
            quantity_operations: log.quantity_operations(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ExportStats {
    event_count: usize,
    object_count: usize,
    change_count: usize,
    quantity_operation_count: usize,
    first_event: Option<NaiveDateTime>,
    last_event: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
struct FilteredExport<'a> {
    start: NaiveDateTime,
    end: NaiveDateTime,
    events: Vec<&'a Event>,
}
