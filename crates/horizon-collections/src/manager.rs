//! The decorator manager.
//!
//! One manager exists per [`ObservableList`](crate::ObservableList) while it
//! has decorators or decorated listeners. It owns the stages in priority
//! order, keeps every stage's output materialized, and routes each raw change
//! through the chain.
//!
//! # Propagation
//!
//! ```text
//! raw change ──> stage 0 ──> stage 1 ──> … ──> stage n ──> decorated events
//!                  │            │                 │
//!                output       output            output = decorated view
//! ```
//!
//! A stage may pass, transform, suppress or expand each change. Every event a
//! stage emits is applied to that stage's output and sent downstream before
//! the next one, so the next stage always sees an upstream view that matches
//! the event it is handed. Resets are handled uniformly: the stage is rebuilt
//! with [`CollectionDecorator::decorate`] and a reset carrying the new output
//! continues downstream.

use std::any::Any;
use std::fmt;

use horizon_collections_core::logging::{targets, StageInfo};

use crate::change::CollectionChange;
use crate::decorator::{
    scan, ChangeSink, CollectionDecorator, DecoratorHost, DecoratorId, IndexQuery, Item,
};
use crate::error::{CollectionError, Result};

/// One attached decorator and its materialized output.
pub(crate) struct Stage<T: Item> {
    pub(crate) id: DecoratorId,
    pub(crate) decorator: Box<dyn CollectionDecorator<T>>,
    pub(crate) priority: i32,
    pub(crate) output: Vec<T>,
}

/// Owns the ordered decorator chain of one collection.
pub struct DecoratorManager<T: Item> {
    stages: Vec<Stage<T>>,
}

impl<T: Item> Default for DecoratorManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Item> DecoratorManager<T> {
    /// Create a manager with no stages.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Number of attached decorators.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// IDs of the attached decorators, in chain order.
    pub fn ids(&self) -> Vec<DecoratorId> {
        self.stages.iter().map(|stage| stage.id).collect()
    }

    /// The decorated view for the given raw items.
    pub fn decorated<'a>(&'a self, raw: &'a [T]) -> &'a [T] {
        self.stages.last().map_or(raw, |stage| stage.output.as_slice())
    }

    fn position(&self, id: DecoratorId) -> Result<usize> {
        self.stages
            .iter()
            .position(|stage| stage.id == id)
            .ok_or(CollectionError::UnknownDecorator(id))
    }

    fn upstream_of<'a>(stages: &'a [Stage<T>], raw: &'a [T]) -> &'a [T] {
        stages.last().map_or(raw, |stage| stage.output.as_slice())
    }

    /// Insert a decorator into the chain.
    ///
    /// The stage is placed after every stage with a lower or equal priority,
    /// backfilled from its upstream, and everything after it is rebuilt.
    /// Returns the resulting decorated events (a single reset).
    pub fn attach(
        &mut self,
        id: DecoratorId,
        mut decorator: Box<dyn CollectionDecorator<T>>,
        host: &DecoratorHost<T>,
        raw: &[T],
    ) -> Vec<CollectionChange<T>> {
        let priority = decorator.priority();
        let pos = self.stages.partition_point(|stage| stage.priority <= priority);

        decorator.on_attached(host);
        let output = decorator.decorate(Self::upstream_of(&self.stages[..pos], raw));

        tracing::debug!(
            target: targets::MANAGER,
            %id,
            name = decorator.name(),
            priority,
            position = pos,
            "decorator attached"
        );

        self.stages.insert(
            pos,
            Stage {
                id,
                decorator,
                priority,
                output,
            },
        );
        self.rebuild_from(pos + 1, raw)
    }

    /// Remove a decorator from the chain.
    pub fn detach(
        &mut self,
        id: DecoratorId,
        raw: &[T],
    ) -> Result<(Box<dyn CollectionDecorator<T>>, Vec<CollectionChange<T>>)> {
        let pos = self.position(id)?;
        let mut stage = self.stages.remove(pos);
        stage.decorator.on_detached();

        tracing::debug!(
            target: targets::MANAGER,
            %id,
            name = stage.decorator.name(),
            "decorator detached"
        );

        let events = self.rebuild_from(pos, raw);
        Ok((stage.decorator, events))
    }

    /// Run `f` against a typed decorator, then rebuild it and everything after it.
    pub fn update<D, R>(
        &mut self,
        id: DecoratorId,
        raw: &[T],
        f: impl FnOnce(&mut D) -> R,
    ) -> Result<(R, Vec<CollectionChange<T>>)>
    where
        D: CollectionDecorator<T>,
    {
        let pos = self.position(id)?;
        let decorator = self.stages[pos]
            .decorator
            .downcast_mut::<D>()
            .ok_or(CollectionError::DecoratorTypeMismatch {
                id,
                expected: std::any::type_name::<D>(),
            })?;
        let result = f(decorator);

        let priority = self.stages[pos].decorator.priority();
        if priority != self.stages[pos].priority {
            // Re-seat the stage; its upstream may change.
            let stage = self.stages.remove(pos);
            let target = self.stages.partition_point(|s| s.priority <= priority);
            self.stages.insert(target, Stage { priority, ..stage });
            let events = self.rebuild_from(pos.min(target), raw);
            return Ok((result, events));
        }

        Ok((result, self.rebuild_from(pos, raw)))
    }

    /// Run `f` against a typed decorator without touching the chain.
    pub fn with<D, R>(&self, id: DecoratorId, f: impl FnOnce(&D) -> R) -> Result<R>
    where
        D: CollectionDecorator<T>,
    {
        let pos = self.position(id)?;
        self.stages[pos]
            .decorator
            .downcast_ref::<D>()
            .map(f)
            .ok_or(CollectionError::DecoratorTypeMismatch {
                id,
                expected: std::any::type_name::<D>(),
            })
    }

    /// Rebuild every stage from `from` onwards and report a reset of the
    /// decorated view.
    fn rebuild_from(&mut self, from: usize, raw: &[T]) -> Vec<CollectionChange<T>> {
        for pos in from..self.stages.len() {
            let (before, rest) = self.stages.split_at_mut(pos);
            let upstream = Self::upstream_of(before, raw);
            rest[0].output = rest[0].decorator.decorate(upstream);
        }
        vec![CollectionChange::Reset {
            items: self.decorated(raw).to_vec(),
        }]
    }

    /// Route one raw change through the chain.
    ///
    /// `raw` must already reflect `change`. Returns the events observed on the
    /// decorated view, in order.
    #[tracing::instrument(
        skip_all,
        target = "horizon_collections::manager",
        level = "trace",
        fields(kind = change.kind())
    )]
    pub fn on_changed(
        &mut self,
        raw: &[T],
        change: CollectionChange<T>,
    ) -> Result<Vec<CollectionChange<T>>> {
        let mut out = Vec::new();
        self.process(0, raw, change, &mut out)?;
        Ok(out)
    }

    /// Deliver an out-of-band payload to one decorator.
    ///
    /// A payload for a decorator that has since been detached is dropped.
    pub fn on_notification(
        &mut self,
        raw: &[T],
        id: DecoratorId,
        payload: &(dyn Any + Send),
    ) -> Result<Vec<CollectionChange<T>>> {
        let Ok(pos) = self.position(id) else {
            tracing::trace!(
                target: targets::MANAGER,
                %id,
                "notification for detached decorator dropped"
            );
            return Ok(Vec::new());
        };

        let events = {
            let (before, rest) = self.stages.split_at_mut(pos);
            let upstream = Self::upstream_of(before, raw);
            let mut sink = ChangeSink::new();
            rest[0].decorator.on_notification(upstream, payload, &mut sink);
            sink.into_events()
        };

        let mut out = Vec::new();
        self.emit(pos, raw, events, &mut out)?;
        Ok(out)
    }

    fn process(
        &mut self,
        pos: usize,
        raw: &[T],
        change: CollectionChange<T>,
        out: &mut Vec<CollectionChange<T>>,
    ) -> Result<()> {
        if pos == self.stages.len() {
            out.push(change);
            return Ok(());
        }

        let events = {
            let (before, rest) = self.stages.split_at_mut(pos);
            let upstream = Self::upstream_of(before, raw);
            let stage = &mut rest[0];
            if change.is_reset() {
                stage.output = stage.decorator.decorate(upstream);
                let items = stage.output.clone();
                return self.process(pos + 1, raw, CollectionChange::Reset { items }, out);
            }
            let mut sink = ChangeSink::new();
            stage.decorator.on_changed(upstream, &change, &mut sink);
            sink.into_events()
        };

        tracing::trace!(
            target: targets::MANAGER,
            stage = pos,
            kind = change.kind(),
            emitted = events.len(),
            "stage translated change"
        );

        self.emit(pos, raw, events, out)
    }

    /// Apply each event to the stage's output and send it downstream.
    fn emit(
        &mut self,
        pos: usize,
        raw: &[T],
        events: Vec<CollectionChange<T>>,
        out: &mut Vec<CollectionChange<T>>,
    ) -> Result<()> {
        for event in events {
            let stage = &mut self.stages[pos];
            event
                .apply_to(&mut stage.output)
                .map_err(|err| CollectionError::InvalidDecoratorChange {
                    decorator: stage.decorator.name(),
                    source: Box::new(err),
                })?;
            self.process(pos + 1, raw, event, out)?;
        }
        Ok(())
    }

    /// Decorated indices of `item`; empty when the item is not present.
    pub fn try_get_indexes(&self, raw: &[T], item: &T, ignore_duplicates: bool) -> Vec<usize> {
        let mut indexes = Vec::new();
        match self.stages.last() {
            Some(last) => {
                let query = IndexQuery::new(item, ignore_duplicates, raw, &self.stages);
                last.decorator.try_get_indexes(&query, &mut indexes);
            }
            None => scan(raw, item, ignore_duplicates, &mut indexes),
        }
        indexes
    }

    /// A snapshot of every stage, in chain order.
    pub fn describe(&self) -> Vec<StageInfo> {
        self.stages
            .iter()
            .map(|stage| {
                StageInfo::new(
                    stage.id.as_u64(),
                    stage.decorator.name(),
                    stage.priority,
                    stage.output.len(),
                )
            })
            .collect()
    }

    /// Detach every decorator, running their cleanup.
    pub(crate) fn detach_all(&mut self) {
        for stage in self.stages.iter_mut().rev() {
            stage.decorator.on_detached();
        }
        self.stages.clear();
    }
}

impl<T: Item> fmt::Debug for DecoratorManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorManager")
            .field("stages", &self.describe())
            .finish()
    }
}
