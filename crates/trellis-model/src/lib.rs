//! Trellis document model
//!
//! This crate provides the object model for the two document kinds trellis
//! operates on:
//!
//! - **Catalog**: a hierarchy of identifier-addressable controls (grouped or
//!   flat) plus shared metadata (roles, parties, locations) and back-matter
//!   resources
//! - **Profile**: a layered overlay describing how to derive a catalog from
//!   imported catalogs/profiles via selection, structuring, and modification
//!   instructions
//!
//! The model is plain data: serde-bound types with small inherent helpers and
//! no resolution logic. Resolution lives in `trellis-core`.

pub mod back_matter;
pub mod catalog;
pub mod document;
pub mod metadata;
pub mod parameter;
pub mod profile;

pub use back_matter::{BackMatter, Base64Content, Resource, ResourceLink};
pub use catalog::{Catalog, Control, Group, Part};
pub use document::Document;
pub use metadata::{
    Address, Link, Location, Metadata, Party, Property, ResponsibleParty, Role, TRELLIS_NS,
};
pub use parameter::{
    ConstraintTest, Parameter, ParameterConstraint, ParameterGuideline, ParameterSelection,
};
pub use profile::{
    Add, Alter, ControlSelection, IncludeAll, ItemName, Merge, Modify, Position, Profile,
    ProfileImport, Remove, SetParameter,
};
