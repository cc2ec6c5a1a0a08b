//! Simulation configuration
//!
//! All values have defaults; `with_*` builders adjust a copy. The whole
//! configuration is serde-compatible so it can be read from RON.

use crate::instruction::Schedule;
use crate::rng::{SimRng, DEFAULT_SEED};
use crate::trigger::TriggeredCreation;
use crate::{Error, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use qnet_core::ObjectType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Draws per duration before giving up on negative samples
pub const DURATION_TRIES: u32 = 50;

/// Distribution of an activity duration, in minutes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DurationSpec {
    Fixed { minutes: f64 },
    Uniform { min: f64, max: f64 },
    Normal { mean: f64, std: f64 },
    Beta { alpha: f64, beta: f64 },
    Gamma { shape: f64, scale: f64 },
    Exponential { mean: f64 },
}

impl DurationSpec {
    /// One sample in minutes (may be negative for normal distributions)
    pub fn sample_minutes(&self, rng: &mut SimRng) -> f64 {
        match *self {
            DurationSpec::Fixed { minutes } => minutes,
            DurationSpec::Uniform { min, max } => rng.range_f64(min, max),
            DurationSpec::Normal { mean, std } => rng.normal(mean, std),
            DurationSpec::Beta { alpha, beta } => rng.beta(alpha, beta),
            DurationSpec::Gamma { shape, scale } => rng.gamma(shape, scale),
            DurationSpec::Exponential { mean } => rng.exponential(mean),
        }
    }
}

impl Default for DurationSpec {
    fn default() -> Self {
        DurationSpec::Normal { mean: 12.0, std: 3.0 }
    }
}

/// Ceilings ending a run; the first one reached stops it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_steps: u64,
    /// Simulated time after the start
    pub max_days: i64,
    pub max_terminated_objects: usize,
    pub max_events: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 50_000,
            max_days: 365,
            max_terminated_objects: 50_000,
            max_events: 10_000,
        }
    }
}

/// Default start of the logical clock
pub fn default_start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 10, 12)
        .and_then(|d| d.and_hms_opt(12, 21, 0))
        .unwrap_or_default()
}

/// Configuration of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub start_time: NaiveDateTime,
    /// Duration per activity name
    pub durations: IndexMap<String, DurationSpec>,
    pub default_duration: DurationSpec,
    /// Recurring object creations per object type
    pub schedules: IndexMap<ObjectType, Schedule>,
    /// First occurrence of a recurring creation, when not computed
    pub initial_scheduled: IndexMap<ObjectType, NaiveDateTime>,
    pub triggered_creations: Vec<TriggeredCreation>,
    /// Activities to prefer, highest priority first
    pub activity_priority: Vec<String>,
    /// Probability of consulting the priority list in a step
    pub priority_probability: f64,
    /// Per object type, the place sets in which an object is done
    pub final_markings: IndexMap<ObjectType, Vec<BTreeSet<String>>>,
    pub limits: Limits,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            start_time: default_start_time(),
            durations: IndexMap::new(),
            default_duration: DurationSpec::default(),
            schedules: IndexMap::new(),
            initial_scheduled: IndexMap::new(),
            triggered_creations: Vec::new(),
            activity_priority: Vec::new(),
            priority_probability: 0.5,
            final_markings: IndexMap::new(),
            limits: Limits::default(),
        }
    }
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_start_time(mut self, start_time: NaiveDateTime) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn with_duration(mut self, activity: impl Into<String>, spec: DurationSpec) -> Self {
        self.durations.insert(activity.into(), spec);
        self
    }

    pub fn with_default_duration(mut self, spec: DurationSpec) -> Self {
        self.default_duration = spec;
        self
    }

    pub fn with_schedule(mut self, object_type: impl Into<ObjectType>, schedule: Schedule) -> Self {
        self.schedules.insert(object_type.into(), schedule);
        self
    }

    pub fn with_initial_scheduled(mut self, object_type: impl Into<ObjectType>, time: NaiveDateTime) -> Self {
        self.initial_scheduled.insert(object_type.into(), time);
        self
    }

    pub fn with_triggered_creation(mut self, creation: TriggeredCreation) -> Self {
        self.triggered_creations.push(creation);
        self
    }

    pub fn with_activity_priority<S: Into<String>>(mut self, activities: impl IntoIterator<Item = S>) -> Self {
        self.activity_priority = activities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority_probability(mut self, probability: f64) -> Self {
        self.priority_probability = probability;
        self
    }

    pub fn with_final_marking<S: Into<String>>(
        mut self,
        object_type: impl Into<ObjectType>,
        places: impl IntoIterator<Item = S>,
    ) -> Self {
        self.final_markings
            .entry(object_type.into())
            .or_default()
            .push(places.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Check values that would only fail later during a run
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.priority_probability) {
            return Err(Error::InvalidConfig(format!(
                "priority probability {} is not in [0, 1]",
                self.priority_probability
            )));
        }
        for (object_type, schedule) in &self.schedules {
            let valid = match schedule {
                Schedule::Fixed { hours } => {
                    hours.is_finite() && minutes_to_duration(hours * 60.0) > Duration::zero()
                }
                Schedule::ArrivalRate { per_day } => per_day.is_finite() && *per_day >= 0.0,
            };
            if !valid {
                return Err(Error::InvalidConfig(format!(
                    "schedule of {object_type} has a non-positive interval"
                )));
            }
        }
        for object_type in self.initial_scheduled.keys() {
            if !self.schedules.contains_key(object_type) {
                return Err(Error::InvalidConfig(format!(
                    "initial execution for {object_type} which has no schedule"
                )));
            }
        }
        Ok(())
    }

    /// Draw the duration of one execution of `activity`
    ///
    /// Negative samples are redrawn a bounded number of times.
    pub fn draw_duration(&self, activity: &str, rng: &mut SimRng) -> Result<Duration> {
        let spec = self.durations.get(activity).unwrap_or(&self.default_duration);
        for _ in 0..DURATION_TRIES {
            let minutes = spec.sample_minutes(rng);
            if minutes >= 0.0 {
                return Ok(minutes_to_duration(minutes));
            }
        }
        Err(Error::InvalidDuration {
            activity: activity.to_string(),
            tries: DURATION_TRIES,
        })
    }
}

pub(crate) fn minutes_to_duration(minutes: f64) -> Duration {
    Duration::milliseconds((minutes * 60_000.0).round() as i64)
}
