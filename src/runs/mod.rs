//! Run-Hierarchy Registry
//!
//! Generic bookkeeping for every [`TimedEntity`] kind. Each entity is one
//! document keyed by its id; children reference their parent by id.
//!
//! Rules enforced on insert:
//! - ids are unique per kind
//! - `start <= end`
//! - a child's parent exists and the child's interval nests inside it
//!
//! Removing an entity never touches its children. Cleaning up runs of a
//! removed fill (or files of a removed run) is left to the caller.

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{CdbError, CdbResult};
use crate::model::{AttributeSet, EntityKind, Interval, TimeWindow, TimedEntity};
use crate::store::{self, Collection, DocumentStore, Filter, StoreError, Versioned};
use crate::time::{self, timestamp_format, TimeArg};
use crate::validation::require_non_empty;

/// Attempts before an attribute write gives up with `Conflict`
const MAX_ATTEMPTS: usize = 32;

/// Store collection holding entities of `kind`
pub fn collection(kind: EntityKind) -> Collection {
    match kind {
        EntityKind::Fill => Collection::Fills,
        EntityKind::Run => Collection::Runs,
        EntityKind::File => Collection::Files,
        EntityKind::Emulsion => Collection::Emulsions,
        EntityKind::Brick => Collection::Bricks,
    }
}

/// Interval fields shared by every entity document
#[derive(Deserialize)]
struct IntervalFields {
    #[serde(with = "timestamp_format")]
    start_time: NaiveDateTime,
    #[serde(with = "timestamp_format")]
    end_time: NaiveDateTime,
}

/// Time-bounded entity operations over a document store
#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn DocumentStore>,
}

impl Registry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create an entity, then attach `attributes`.
    ///
    /// An attribute failure is reported as `InvalidAttribute` but the entity
    /// itself stays stored.
    pub fn add<E: TimedEntity>(
        &self,
        id: &str,
        parent_id: Option<&str>,
        start: &TimeArg,
        end: &TimeArg,
        attributes: Option<E::Attributes>,
    ) -> CdbResult<E> {
        let kind = E::KIND;
        let id = require_non_empty(kind.id_field(), id)?;

        if self.store.get(collection(kind), &id)?.is_some() {
            return Err(CdbError::already_exists(kind.label(), id));
        }

        let interval = Interval::new(start.resolve()?, end.resolve()?)?;

        let parent_id = match kind.parent() {
            Some(parent_kind) => {
                let parent_id =
                    require_non_empty(parent_kind.id_field(), parent_id.unwrap_or_default())?;
                let parent_interval = self.interval_of(parent_kind, &parent_id)?;
                if !interval.nests_within(&parent_interval) {
                    return Err(CdbError::IntervalViolation {
                        kind: kind.label(),
                        id,
                        parent: format!("{} '{}'", parent_kind.label(), parent_id),
                    });
                }
                Some(parent_id)
            }
            None => None,
        };

        let entity = E::create(id.clone(), parent_id, interval);
        match store::insert_doc(self.store.as_ref(), collection(kind), &id, &entity) {
            Ok(()) => {}
            Err(StoreError::DuplicateKey { .. }) => {
                return Err(CdbError::already_exists(kind.label(), id))
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            kind = %kind,
            id = %id,
            parent = entity.parent_id().unwrap_or(""),
            start = %time::format_timestamp(&interval.start),
            end = %time::format_timestamp(&interval.end),
            "Created entity"
        );

        match attributes {
            Some(attributes) => self.add_attributes::<E>(&id, attributes),
            None => Ok(entity),
        }
    }

    fn interval_of(&self, kind: EntityKind, id: &str) -> CdbResult<Interval> {
        let doc = store::get_doc::<IntervalFields>(self.store.as_ref(), collection(kind), id)?
            .ok_or_else(|| CdbError::not_found(kind.label(), id))?;
        Ok(Interval {
            start: doc.document.start_time,
            end: doc.document.end_time,
        })
    }

    fn load<E: TimedEntity>(&self, id: &str) -> CdbResult<Versioned<E>> {
        store::get_doc(self.store.as_ref(), collection(E::KIND), id.trim())?
            .ok_or_else(|| CdbError::not_found(E::KIND.label(), id.trim()))
    }

    pub fn get<E: TimedEntity>(&self, id: &str) -> CdbResult<E> {
        Ok(self.load::<E>(id)?.document)
    }

    /// Remove a single entity; its children are left in place
    pub fn remove<E: TimedEntity>(&self, id: &str) -> CdbResult<()> {
        let kind = E::KIND;
        let id = id.trim();
        if !self.store.remove(collection(kind), id)? {
            return Err(CdbError::not_found(kind.label(), id));
        }
        tracing::info!(kind = %kind, id = %id, "Removed entity");
        Ok(())
    }

    /// Ids of entities under `parent_id` (if given) lying within the window
    pub fn list<E: TimedEntity>(
        &self,
        parent_id: Option<&str>,
        start: Option<&TimeArg>,
        end: Option<&TimeArg>,
    ) -> CdbResult<Vec<String>> {
        let kind = E::KIND;
        let window = TimeWindow::new(time::resolve_opt(start)?, time::resolve_opt(end)?)?;

        let mut filter = Filter::new();
        if let (Some(parent_kind), Some(parent_id)) = (kind.parent(), parent_id) {
            filter = filter.eq(parent_kind.id_field(), parent_id.trim());
        }
        if let Some(start) = window.start {
            filter = filter.gte("start_time", time::format_timestamp(&start));
        }
        if let Some(end) = window.end {
            filter = filter.lte("end_time", time::format_timestamp(&end));
        }

        let entities: Vec<E> = store::find_docs(self.store.as_ref(), collection(kind), &filter)?;
        Ok(entities
            .iter()
            .filter(|e| window.admits(&e.interval()))
            .map(|e| e.id().to_string())
            .collect())
    }

    /// Attach attributes that are not present yet.
    ///
    /// A name that already exists is skipped with a warning; existing values
    /// are never overwritten.
    pub fn add_attributes<E: TimedEntity>(
        &self,
        id: &str,
        attributes: E::Attributes,
    ) -> CdbResult<E> {
        let kind = E::KIND;
        let new = attributes.into_attributes()?;

        for _ in 0..MAX_ATTEMPTS {
            let Versioned {
                revision,
                document: mut entity,
            } = self.load::<E>(id)?;

            let mut added = 0;
            for attribute in &new {
                if entity.attribute(&attribute.name).is_some() {
                    tracing::warn!(
                        kind = %kind,
                        id = %entity.id(),
                        attribute = %attribute.name,
                        "Attribute already exists, not updating"
                    );
                    continue;
                }
                entity.attributes_mut().push(attribute.clone());
                added += 1;
            }

            if added == 0 {
                return Ok(entity);
            }

            if store::replace_doc(
                self.store.as_ref(),
                collection(kind),
                entity.id(),
                revision,
                &entity,
            )? {
                tracing::debug!(kind = %kind, id = %entity.id(), added, "Added attributes");
                return Ok(entity);
            }
        }

        Err(CdbError::Conflict {
            kind: kind.label(),
            id: id.trim().to_string(),
        })
    }
}
