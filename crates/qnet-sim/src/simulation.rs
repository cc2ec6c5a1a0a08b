//! Step-driven simulation loop
//!
//! A step evaluates triggers, picks one enabled binding to start, processes
//! everything due at the current time and advances the clock to the next
//! pending item.

use crate::activity::{ActivityBehavior, ActivityDescriptor};
use crate::config::SimulationConfig;
use crate::instruction::{Action, Instruction, ObjectCreation, Schedule};
use crate::log::EventLog;
use crate::model::SimulationModel;
use crate::queue::ExecutionQueue;
use crate::rng::SimRng;
use crate::{Error, Result};
use chrono::{Duration, NaiveDateTime};
use indexmap::IndexMap;
use qnet_core::{BindingFunction, CollectionCounter, ObjectId, ObjectType, ObjectTypeDescriptor, QuantityNet};
use tracing::{debug, info, trace, warn};

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxSteps,
    MaxTime,
    MaxTerminatedObjects,
    MaxEvents,
    /// Nothing queued and nothing enabled
    Idle,
}

/// Outcome of one step
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Clock at the start of the step
    pub time: NaiveDateTime,
    /// Transition whose binding was scheduled, if any
    pub selected: Option<String>,
    /// Queue items handled
    pub processed: usize,
}

impl StepResult {
    fn new(time: NaiveDateTime) -> Self {
        Self {
            time,
            selected: None,
            processed: 0,
        }
    }
}

/// A quantity net together with its clock, queue and random source
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    model: SimulationModel,
    queue: ExecutionQueue,
    rng: SimRng,
    steps: u64,
}

impl Simulation {
    /// Build a simulation and schedule the first recurring creations
    pub fn new(net: QuantityNet, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let mut model = SimulationModel::new(net);
        model.set_final_markings(&config.final_markings);
        let mut sim = Self {
            queue: ExecutionQueue::new(config.start_time),
            rng: SimRng::new(config.seed),
            model,
            config,
            steps: 0,
        };
        let schedules: Vec<(ObjectType, Schedule)> =
            sim.config.schedules.iter().map(|(ot, s)| (ot.clone(), *s)).collect();
        for (object_type, schedule) in schedules {
            if sim.model.object_types.get(&object_type).is_none() {
                return Err(Error::UnknownObjectType(object_type));
            }
            let first = sim.config.initial_scheduled.get(&object_type).copied();
            sim.schedule_recurring(object_type, schedule, first)?;
        }
        info!(seed = sim.config.seed, start = %sim.config.start_time, "simulation created");
        Ok(sim)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn model(&self) -> &SimulationModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut SimulationModel {
        &mut self.model
    }

    pub fn net(&self) -> &QuantityNet {
        &self.model.net
    }

    /// Mutable net access, for attaching guards and qalculators
    pub fn net_mut(&mut self) -> &mut QuantityNet {
        &mut self.model.net
    }

    pub fn log(&self) -> &EventLog {
        &self.model.log
    }

    pub fn queue(&self) -> &ExecutionQueue {
        &self.queue
    }

    pub fn current_time(&self) -> NaiveDateTime {
        self.queue.current_time()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn register_object_type(&mut self, descriptor: ObjectTypeDescriptor) {
        self.model.register_object_type(descriptor);
    }

    pub fn register_activity(&mut self, descriptor: ActivityDescriptor) {
        self.model.register_activity(descriptor);
    }

    pub fn set_activity_behavior(&mut self, activity: &str, behavior: Box<dyn ActivityBehavior>) -> Result<()> {
        self.model.set_activity_behavior(activity, behavior)
    }

    // ---- initial marking ----

    pub fn add_initial_objects(&mut self, object_type: &ObjectType, count: usize) -> Result<Vec<ObjectId>> {
        let now = self.current_time();
        self.model.add_initial_objects(object_type, count, now)
    }

    pub fn add_objects_to_place(&mut self, place: &str, count: usize) -> Result<Vec<ObjectId>> {
        let now = self.current_time();
        self.model.add_objects_to_place(place, count, now)
    }

    pub fn set_initial_stock(&mut self, stock: &CollectionCounter) -> Result<()> {
        let now = self.current_time();
        self.model.set_initial_stock(stock, now)
    }

    /// Queue an instruction relative to the current time
    pub fn schedule(&mut self, instruction: Instruction) -> Result<NaiveDateTime> {
        self.queue.schedule(instruction)
    }

    // ---- running ----

    /// First limit reached, if any
    pub fn stop_reason(&self) -> Option<StopReason> {
        let limits = &self.config.limits;
        if self.steps >= limits.max_steps {
            Some(StopReason::MaxSteps)
        } else if self.current_time() > self.config.start_time + Duration::days(limits.max_days) {
            Some(StopReason::MaxTime)
        } else if self.model.terminated_objects() >= limits.max_terminated_objects {
            Some(StopReason::MaxTerminatedObjects)
        } else if self.model.log.events().len() >= limits.max_events {
            Some(StopReason::MaxEvents)
        } else {
            None
        }
    }

    /// Run until a limit is reached or nothing is left to do
    pub fn run(&mut self) -> Result<StopReason> {
        loop {
            if let Some(reason) = self.stop_reason() {
                info!(?reason, steps = self.steps, time = %self.current_time(), "simulation stopped");
                return Ok(reason);
            }
            let result = self.step()?;
            if result.selected.is_none() && result.processed == 0 && self.queue.is_empty() {
                info!(steps = self.steps, time = %self.current_time(), "simulation idle");
                return Ok(StopReason::Idle);
            }
        }
    }

    /// Run at most `steps` steps; `Some` when the run stopped before that
    pub fn run_steps(&mut self, steps: u64) -> Result<Option<StopReason>> {
        for _ in 0..steps {
            if let Some(reason) = self.stop_reason() {
                return Ok(Some(reason));
            }
            let result = self.step()?;
            if result.selected.is_none() && result.processed == 0 && self.queue.is_empty() {
                return Ok(Some(StopReason::Idle));
            }
        }
        Ok(None)
    }

    /// Execute one simulation step
    pub fn step(&mut self) -> Result<StepResult> {
        let mut result = StepResult::new(self.current_time());

        for creation in &self.config.triggered_creations {
            if creation.trigger.check(&self.model.net)? {
                trace!(object_type = %creation.object_type, "trigger fired");
                self.queue.schedule(Instruction::create_object(
                    Duration::zero(),
                    ObjectCreation::new(creation.object_type.clone()),
                ))?;
            }
        }

        let enabled = self.model.enabled_bindings();
        if let Some((transition, binding)) = self.select_binding(enabled)? {
            self.queue
                .schedule(Instruction::execute_event(Duration::zero(), transition.clone(), binding))?;
            result.selected = Some(transition);
        }

        while self.queue.has_due() {
            for item in self.queue.pop_due() {
                self.dispatch(item.action)?;
                result.processed += 1;
            }
        }

        let next = self.queue.advance();
        self.steps += 1;
        trace!(step = self.steps, time = %next, processed = result.processed, "step done");
        Ok(result)
    }

    /// Pick the binding to start this step
    ///
    /// With probability `priority_probability` the highest-priority enabled
    /// activity wins; otherwise an enabled transition and then one of its
    /// bindings are drawn uniformly.
    fn select_binding(
        &mut self,
        enabled: IndexMap<String, Vec<BindingFunction>>,
    ) -> Result<Option<(String, BindingFunction)>> {
        let mut candidates: Vec<(String, Vec<BindingFunction>)> =
            enabled.into_iter().filter(|(_, b)| !b.is_empty()).collect();
        if candidates.is_empty() {
            return Ok(None);
        }

        let mut activities = Vec::with_capacity(candidates.len());
        for (transition, _) in &candidates {
            activities.push(self.model.activity_of(transition)?.to_string());
        }
        let prioritized = self
            .config
            .activity_priority
            .iter()
            .find_map(|wanted| activities.iter().position(|a| a == wanted));

        let index = match prioritized {
            Some(index) if self.rng.chance(self.config.priority_probability) => index,
            _ => self.rng.index(candidates.len()).unwrap_or(0),
        };
        let (transition, mut bindings) = candidates.swap_remove(index);
        let pick = self.rng.index(bindings.len()).unwrap_or(0);
        let binding = bindings.swap_remove(pick);
        debug!(transition = %transition, binding = %binding, "selected binding");
        Ok(Some((transition, binding)))
    }

    fn dispatch(&mut self, action: Action) -> Result<()> {
        let now = self.current_time();
        trace!(action = action.kind(), time = %now, "processing");
        match action {
            Action::CreateObject(creation) => {
                if creation.add_to_binding {
                    return Err(Error::InvalidCreation {
                        activity: String::new(),
                        reason: "queued creations cannot join a binding".into(),
                    });
                }
                let id = self.model.create_object(&creation, now)?;
                self.model.place_object(id, &creation.places)?;
                if let Some(schedule) = creation.schedule {
                    self.schedule_recurring(creation.object_type, schedule, None)?;
                }
            }
            Action::ExecuteEvent(start) => {
                if !self.model.binding_available(&start.transition, &start.binding)? {
                    warn!(transition = %start.transition, binding = %start.binding, "binding no longer enabled, skipped");
                    return Ok(());
                }
                let duration = match start.duration {
                    Some(duration) => duration,
                    None => {
                        let activity = self.model.activity_of(&start.transition)?.to_string();
                        self.config.draw_duration(&activity, &mut self.rng)?
                    }
                };
                for instruction in self.model.start_event(start, now, duration)? {
                    self.queue.schedule(instruction)?;
                }
            }
            Action::TerminateEvent(end) => {
                for instruction in self.model.end_event(end, now)? {
                    self.queue.schedule(instruction)?;
                }
            }
            Action::UpdateStatus { object, status } => self.model.update_status(object, status, now)?,
            Action::UpdateAttributes { object, attributes } => self.model.update_attributes(object, &attributes, now)?,
            Action::UpdateQuantities { object, quantities } => self.model.update_quantities(object, &quantities, now)?,
        }
        Ok(())
    }

    /// Queue the next occurrence of a recurring creation
    fn schedule_recurring(
        &mut self,
        object_type: ObjectType,
        schedule: Schedule,
        first: Option<NaiveDateTime>,
    ) -> Result<NaiveDateTime> {
        let delay = match first {
            Some(time) => time - self.current_time(),
            None => schedule.next_delay(&mut self.rng),
        };
        let creation = ObjectCreation::new(object_type).with_schedule(schedule);
        self.queue.schedule(Instruction::create_object(delay, creation))
    }
}
