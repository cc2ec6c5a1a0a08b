//! Binding selection strategies
//!
//! How a transition answers "which bindings are enabled right now" is a
//! strategy owned by the transition. The enumeration itself lives in
//! [`BindingContext`]; strategies decide when to recompute and which
//! bindings to hand out.

use crate::{BindingContext, BindingFunction, ObjectId, ObjectType};
use std::collections::{BTreeSet, VecDeque};
use tracing::trace;

/// Strategy answering enabled-binding requests for one transition
pub trait BindingSelection {
    /// Enabled bindings; with `single` at most one is returned
    fn select(&mut self, ctx: &BindingContext<'_>, single: bool) -> Option<Vec<BindingFunction>>;

    /// Drop any state derived from earlier markings
    fn reset(&mut self) {}
}

/// Recompute the full enumeration on every request
#[derive(Debug, Clone, Copy, Default)]
pub struct Exhaustive;

impl BindingSelection for Exhaustive {
    fn select(&mut self, ctx: &BindingContext<'_>, single: bool) -> Option<Vec<BindingFunction>> {
        let mut bindings = ctx.enumerate()?;
        if single {
            bindings.truncate(1);
        }
        Some(bindings)
    }
}

/// Serve bindings from a cache, re-validating each against the current state
///
/// Cached bindings can go stale when another transition consumes their
/// objects, so every cached binding is checked before it is returned. The
/// full enumeration only runs again once the cache is exhausted.
#[derive(Debug, Clone, Default)]
pub struct Cached {
    cache: VecDeque<BindingFunction>,
}

impl Cached {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn still_enabled(ctx: &BindingContext<'_>, binding: &BindingFunction) -> bool {
        matches!(ctx.binding_valid(binding, true), Ok(true)) && ctx.guard_holds(binding)
    }
}

impl BindingSelection for Cached {
    fn select(&mut self, ctx: &BindingContext<'_>, single: bool) -> Option<Vec<BindingFunction>> {
        if single {
            while let Some(binding) = self.cache.pop_front() {
                if Self::still_enabled(ctx, &binding) {
                    trace!(transition = ctx.transition, remaining = self.cache.len(), "cached binding");
                    return Some(vec![binding]);
                }
            }
            let mut fresh: VecDeque<BindingFunction> = ctx.enumerate()?.into();
            let first = fresh.pop_front();
            self.cache = fresh;
            return first.map(|b| vec![b]);
        }

        self.cache.retain(|b| Self::still_enabled(ctx, b));
        if self.cache.is_empty() {
            self.cache = ctx.enumerate()?.into();
        }
        Some(self.cache.iter().cloned().collect())
    }

    fn reset(&mut self) {
        self.cache.clear();
    }
}

/// First in, first out: bind the oldest eligible objects of each input type
///
/// Objects are ordered by creation time, then id. Exactly one binding is
/// proposed and standard enumeration is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

impl BindingSelection for Fifo {
    fn select(&mut self, ctx: &BindingContext<'_>, _single: bool) -> Option<Vec<BindingFunction>> {
        let mut binding = BindingFunction::new();
        for object_type in ctx.connections.input_object_types() {
            let mut eligible: Vec<ObjectId> = ctx.eligible_objects(object_type);
            eligible.sort_by_key(|id| (ctx.objects.get(*id).map(|o| o.created_at), *id));

            let cardinality = ctx.specification.cardinality(object_type);
            let take = match (cardinality.required, cardinality.maximum()) {
                (0, 0) => eligible.len(),
                (0, max) => max.min(eligible.len()),
                (required, _) => required,
            };
            if eligible.len() < take.max(cardinality.needed()) {
                return None;
            }
            let chosen: BTreeSet<ObjectId> = eligible.into_iter().take(take).collect();
            binding.insert(ObjectType::clone(object_type), chosen);
        }
        ctx.guard_holds(&binding).then(|| vec![binding])
    }
}
