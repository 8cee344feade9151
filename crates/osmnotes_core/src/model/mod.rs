//! Domain model for georeferenced map notes.
//!
//! # Responsibility
//! - Define the canonical note shape shared by storage and query paths.
//! - Reject malformed note input at the construction boundary.
//!
//! # Invariants
//! - Every note carries a `Coordinates` value; a note the viewport query
//!   cannot evaluate does not exist in this model.

pub mod note;
