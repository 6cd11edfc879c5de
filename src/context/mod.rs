//! Shared extraction context
//!
//! The accumulated, mutable record that phases read from and write into,
//! split into independent groups (study facts, design, schedule,
//! interventions, narrative). List fields are [`RecordSet`]s whose lookup
//! indexes are always derived from the list.

mod field;
mod record;
mod record_set;
mod shared;


pub use field::{ContextField, FieldKind, UnknownField};
pub use record::{Properties, PropertyValue, Record};
pub use record_set::RecordSet;
pub use shared::{
    DesignGroup, FieldRef, InterventionGroup, NarrativeGroup, ScheduleGroup, SharedContext,
    StudyFacts,
};
