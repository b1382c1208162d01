//! Time-bounded bookkeeping entities
//!
//! Two parallel hierarchies share the same rules:
//!
//! ```text
//! Fill ──< Run ──< File
//! Emulsion ──< Brick
//! ```
//!
//! A child references its parent by id and its interval must nest inside
//! the parent's interval. Children are not deleted with their parent.

use chrono::NaiveDateTime;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

use crate::model::attribute::{
    Attribute, AttributeSet, BrickAttributes, EmulsionAttributes, FileAttributes,
    FillAttributes, RunAttributes,
};
use crate::model::Interval;
use crate::time::timestamp_format;

/// Kinds of time-bounded entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Fill,
    Run,
    File,
    Emulsion,
    Brick,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Fill,
        EntityKind::Run,
        EntityKind::File,
        EntityKind::Emulsion,
        EntityKind::Brick,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Fill => "Fill",
            EntityKind::Run => "Run",
            EntityKind::File => "File",
            EntityKind::Emulsion => "Emulsion",
            EntityKind::Brick => "Brick",
        }
    }

    /// Name of the id field in the JSON projection
    pub fn id_field(self) -> &'static str {
        match self {
            EntityKind::Fill => "fill_id",
            EntityKind::Run => "run_id",
            EntityKind::File => "file_id",
            EntityKind::Emulsion => "emulsion_id",
            EntityKind::Brick => "brick_id",
        }
    }

    /// The kind this kind must nest inside, if any
    pub fn parent(self) -> Option<EntityKind> {
        match self {
            EntityKind::Fill | EntityKind::Emulsion => None,
            EntityKind::Run => Some(EntityKind::Fill),
            EntityKind::File => Some(EntityKind::Run),
            EntityKind::Brick => Some(EntityKind::Emulsion),
        }
    }

    /// Parse a plural or singular lowercase name (`fills`, `run`, ...)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().trim_end_matches('s') {
            "fill" => Some(EntityKind::Fill),
            "run" => Some(EntityKind::Run),
            "file" => Some(EntityKind::File),
            "emulsion" => Some(EntityKind::Emulsion),
            "brick" => Some(EntityKind::Brick),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Common shape of every time-bounded entity
pub trait TimedEntity: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync {
    const KIND: EntityKind;

    /// Recognized attributes for this kind
    type Attributes: AttributeSet;

    /// Build a fresh entity with no attributes.
    ///
    /// `parent_id` is ignored by root kinds.
    fn create(id: String, parent_id: Option<String>, interval: Interval) -> Self;

    fn id(&self) -> &str;

    fn parent_id(&self) -> Option<&str>;

    fn interval(&self) -> Interval;

    fn attributes(&self) -> &[Attribute];

    fn attributes_mut(&mut self) -> &mut Vec<Attribute>;

    fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes().iter().find(|a| a.name == name)
    }
}

macro_rules! timed_entity {
    (@parent $self:ident) => {
        None
    };
    (@parent $self:ident, $parent:ident) => {
        Some($self.$parent.as_str())
    };
    (
        $(#[$meta:meta])*
        $name:ident, $kind:ident, $attrs:ty, id: $id:ident $(, parent: $parent:ident)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            pub $id: String,
            $(pub $parent: String,)?
            #[serde(with = "timestamp_format")]
            pub start_time: NaiveDateTime,
            #[serde(with = "timestamp_format")]
            pub end_time: NaiveDateTime,
            #[serde(default)]
            pub attributes: Vec<Attribute>,
        }

        impl TimedEntity for $name {
            const KIND: EntityKind = EntityKind::$kind;
            type Attributes = $attrs;

            #[allow(unused_variables)]
            fn create(id: String, parent_id: Option<String>, interval: Interval) -> Self {
                Self {
                    $id: id,
                    $($parent: parent_id.unwrap_or_default(),)?
                    start_time: interval.start,
                    end_time: interval.end,
                    attributes: Vec::new(),
                }
            }

            fn id(&self) -> &str {
                &self.$id
            }

            fn parent_id(&self) -> Option<&str> {
                timed_entity!(@parent self $(, $parent)?)
            }

            fn interval(&self) -> Interval {
                Interval {
                    start: self.start_time,
                    end: self.end_time,
                }
            }

            fn attributes(&self) -> &[Attribute] {
                &self.attributes
            }

            fn attributes_mut(&mut self) -> &mut Vec<Attribute> {
                &mut self.attributes
            }
        }
    };
}

timed_entity! {
    /// An accelerator beam-fill period
    Fill, Fill, FillAttributes, id: fill_id
}

timed_entity! {
    /// A data-taking period inside a fill
    Run, Run, RunAttributes, id: run_id, parent: fill_id
}

timed_entity! {
    /// A data file written during a run
    File, File, FileAttributes, id: file_id, parent: run_id
}

timed_entity! {
    /// An emulsion target configuration period
    Emulsion, Emulsion, EmulsionAttributes, id: emulsion_id
}

timed_entity! {
    /// An emulsion brick exposed during an emulsion period
    Brick, Brick, BrickAttributes, id: brick_id, parent: emulsion_id
}
