//! Relational layer over the identity store.
//!
//! - [`Models`]: resolved relationship graph (targets, foreign keys, inverses)
//! - [`Associations`]: foreign-key bookkeeping behind relationship getters and setters
//! - [`Schema`]: facade handed to route handlers, producing [`Record`] wrappers

pub mod association;
pub mod model;
pub mod record;
pub mod schema;

pub use association::Associations;
pub use model::{
    ModelDefinition, Models, Relationship, RelationshipKind, ResolvedModel, ResolvedRelationship,
};
pub use record::{Attributes, Record, RecordRef, RecordSet, Related, RelatedInput};
pub use schema::{ModelAccessor, Schema};
