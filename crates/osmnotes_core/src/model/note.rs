//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical note record persisted under the local-notes key.
//! - Carry caller-supplied extra fields verbatim through round-trips.
//! - Validate drafts and patches before they reach the collection.
//!
//! # Invariants
//! - `id` is stable and never reused for another note.
//! - `updated_at` moves strictly forward on every mutation, even when the
//!   wall clock does not.
//! - Extra fields never shadow the reserved serialized field names.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every note.
///
/// Kept as an opaque string: locally minted ids are UUIDs, server-assigned
/// ids arrive in whatever shape the sync collaborator uses.
pub type NoteId = String;

/// Serialized field names owned by the note schema itself.
///
/// Caller-supplied extra fields may not collide with these; the flattened
/// representation would otherwise emit duplicate JSON keys.
pub const RESERVED_FIELDS: &[&str] = &["id", "type", "coordinates", "createdAt", "updatedAt"];

/// Provenance of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// Authored on this device and owned by the local store.
    Local,
    /// Supplied by the external sync collaborator; read-only here.
    Server,
}

/// WGS84 position of a note, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Returns whether both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Axis-aligned latitude/longitude rectangle used to filter notes for the
/// current map viewport. Edges are inclusive; no antimeridian wraparound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

impl Bounds {
    pub fn contains(&self, coordinates: &Coordinates) -> bool {
        coordinates.lat >= self.south
            && coordinates.lat <= self.north
            && coordinates.lng >= self.west
            && coordinates.lng <= self.east
    }
}

/// Validation failure for note drafts and patches.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteValidationError {
    /// A coordinate component is NaN or infinite and could never answer a
    /// bounds query.
    NonFiniteCoordinate { axis: &'static str, value: f64 },
    /// An extra field collides with a schema-owned serialized field name.
    ReservedField(String),
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFiniteCoordinate { axis, value } => {
                write!(f, "coordinate `{axis}` is not a finite number: {value}")
            }
            Self::ReservedField(name) => {
                write!(f, "extra field `{name}` collides with a reserved note field")
            }
        }
    }
}

impl Error for NoteValidationError {}

/// Canonical note record.
///
/// Serialized with camelCase names to match the persisted wire format; any
/// fields beyond the schema-owned ones live in `extra` and survive
/// persistence round-trips untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Stable opaque id, minted at creation for local notes.
    pub id: NoteId,
    /// Serialized as `type` to match the persisted schema naming.
    #[serde(rename = "type")]
    pub kind: NoteKind,
    /// Position of the annotation. Required by the schema, not by
    /// convention.
    pub coordinates: Coordinates,
    /// Set once at creation.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every mutation.
    pub updated_at: DateTime<Utc>,
    /// Caller-supplied free-form fields (text, tags, ...), flattened into
    /// the serialized object.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Note {
    /// Creates a locally-authored note from a validated draft.
    ///
    /// # Invariants
    /// - `kind` is always `NoteKind::Local`; callers cannot override it.
    /// - Both timestamps start equal.
    /// - This constructor does not re-validate the draft.
    pub fn new_local(draft: NoteDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            kind: NoteKind::Local,
            coordinates: draft.coordinates,
            created_at: now,
            updated_at: now,
            extra: draft.extra,
        }
    }

    /// Bumps `updated_at` strictly forward.
    pub(crate) fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            // Clock resolution or a step backwards; the invariant still holds.
            self.updated_at + Duration::nanoseconds(1)
        };
    }
}

/// Caller input for creating a local note.
///
/// Coordinates are part of the type, so a draft without a position cannot be
/// expressed. Everything else is free-form.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteDraft {
    pub coordinates: Coordinates,
    pub extra: Map<String, Value>,
}

impl NoteDraft {
    pub fn new(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            extra: Map::new(),
        }
    }

    /// Adds one extra field, builder-style.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Validates coordinate finiteness and reserved-field collisions.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        validate_coordinates(&self.coordinates)?;
        validate_extra(&self.extra)
    }
}

/// Partial update for an existing local note.
///
/// `coordinates` replaces the position when supplied; `extra` keys are
/// merged in individually, overwriting same-named fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotePatch {
    pub coordinates: Option<Coordinates>,
    pub extra: Map<String, Value>,
}

impl NotePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    /// Adds one extra field, builder-style.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Validates coordinate finiteness and reserved-field collisions.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if let Some(coordinates) = &self.coordinates {
            validate_coordinates(coordinates)?;
        }
        validate_extra(&self.extra)
    }
}

fn validate_coordinates(coordinates: &Coordinates) -> Result<(), NoteValidationError> {
    if !coordinates.lat.is_finite() {
        return Err(NoteValidationError::NonFiniteCoordinate {
            axis: "lat",
            value: coordinates.lat,
        });
    }
    if !coordinates.lng.is_finite() {
        return Err(NoteValidationError::NonFiniteCoordinate {
            axis: "lng",
            value: coordinates.lng,
        });
    }
    Ok(())
}

fn validate_extra(extra: &Map<String, Value>) -> Result<(), NoteValidationError> {
    for key in extra.keys() {
        if RESERVED_FIELDS.contains(&key.as_str()) {
            return Err(NoteValidationError::ReservedField(key.clone()));
        }
    }
    Ok(())
}
