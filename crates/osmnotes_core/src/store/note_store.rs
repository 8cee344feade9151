//! Local note collection with durable mirroring and viewport queries.
//!
//! # Responsibility
//! - Maintain the ordered collection of locally-authored notes.
//! - Mirror every mutation to durable storage under one fixed key.
//! - Answer bounding-box queries over local plus server notes.
//!
//! # Invariants
//! - Local notes always carry `NoteKind::Local` and a freshly minted id.
//! - The persisted payload is always a complete serialization of the local
//!   collection in insertion order; no partial write is observable.
//! - Persistence failures never roll back or poison in-memory state; they
//!   are logged and surfaced as typed outcomes for the caller to judge.

use crate::model::note::{Bounds, Note, NoteDraft, NotePatch, NoteValidationError};
use crate::storage::{KvStore, StorageError};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Fixed storage key holding the serialized local-note array.
pub const LOCAL_NOTES_KEY: &str = "osm-notes-local";

/// Why a persist attempt did not reach durable storage.
#[derive(Debug)]
pub enum PersistError {
    Serialize(serde_json::Error),
    Write(StorageError),
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialize(err) => write!(f, "failed to serialize local notes: {err}"),
            Self::Write(err) => write!(f, "failed to write local notes: {err}"),
        }
    }
}

impl Error for PersistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialize(err) => Some(err),
            Self::Write(err) => Some(err),
        }
    }
}

/// Result of mirroring the local collection to durable storage.
///
/// A `Failed` outcome is non-fatal: the in-memory collection stays
/// authoritative and the triggering mutation still succeeded.
#[derive(Debug)]
pub enum PersistOutcome {
    Persisted,
    Failed(PersistError),
}

impl PersistOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted)
    }
}

/// Why a hydration attempt left the collection unchanged.
#[derive(Debug)]
pub enum LoadError {
    Read(StorageError),
    Parse(serde_json::Error),
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(err) => write!(f, "failed to read local notes: {err}"),
            Self::Parse(err) => write!(f, "failed to parse stored local notes: {err}"),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read(err) => Some(err),
            Self::Parse(err) => Some(err),
        }
    }
}

/// Result of hydrating the local collection from durable storage.
#[derive(Debug)]
pub enum LoadOutcome {
    /// Stored payload replaced the collection; carries the note count.
    Loaded(usize),
    /// No payload under the key (first run); collection left unchanged.
    Missing,
    /// Storage unreadable or payload unparseable; collection left
    /// unchanged.
    Failed(LoadError),
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

/// A freshly created local note plus the fate of its durable mirror.
#[derive(Debug)]
pub struct SavedNote {
    pub note: Note,
    pub persistence: PersistOutcome,
}

/// Outcome of updating a local note by id.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// Unknown id: nothing mutated, nothing persisted. Not an error.
    NotFound,
    Updated {
        note: Note,
        persistence: PersistOutcome,
    },
}

/// Outcome of deleting a local note by id.
#[derive(Debug)]
pub enum DeleteOutcome {
    /// Unknown id: nothing removed, nothing persisted. Not an error.
    NotFound,
    Deleted { persistence: PersistOutcome },
}

/// Canonical store for map notes.
///
/// Owns the locally-authored collection, mirrors it through the injected
/// [`KvStore`] backend, and merges externally supplied server notes into
/// read queries. Construction is explicit; hydration from storage is an
/// explicit step (see [`NoteStore::load_from_storage`]), not an import-time
/// side effect.
pub struct NoteStore<S: KvStore> {
    storage: S,
    local_notes: Vec<Note>,
    server_notes: Vec<Note>,
}

impl<S: KvStore> NoteStore<S> {
    /// Creates an empty store over the given backend.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            local_notes: Vec::new(),
            server_notes: Vec::new(),
        }
    }

    /// Creates a store and immediately hydrates it from durable storage.
    ///
    /// Hydration failure is non-fatal and already logged; callers that need
    /// the outcome should use [`NoteStore::new`] plus
    /// [`NoteStore::load_from_storage`] instead.
    pub fn hydrated(storage: S) -> Self {
        let mut store = Self::new(storage);
        store.load_from_storage();
        store
    }

    /// Creates a new local note from `draft` and mirrors the collection.
    ///
    /// The note gets a fresh id, `local` provenance, and equal
    /// created/updated timestamps; draft extra fields are carried verbatim.
    /// Appends at the end of the collection.
    ///
    /// # Errors
    /// - Validation failures (non-finite coordinates, reserved extra
    ///   fields) leave all state untouched.
    pub fn save_local_note(&mut self, draft: NoteDraft) -> Result<SavedNote, NoteValidationError> {
        draft.validate()?;

        let note = Note::new_local(draft);
        self.local_notes.push(note.clone());
        let persistence = self.persist();
        info!(
            "event=note_save module=store status=ok id={} persisted={}",
            note.id,
            persistence.is_persisted()
        );

        Ok(SavedNote { note, persistence })
    }

    /// Shallow-merges `patch` into the first note with `id` and mirrors the
    /// collection. `updated_at` moves strictly forward.
    ///
    /// Unknown ids are a silent no-op reported as
    /// [`UpdateOutcome::NotFound`].
    ///
    /// # Errors
    /// - Patch validation failures leave all state untouched, even when the
    ///   id is unknown.
    pub fn update_local_note(
        &mut self,
        id: &str,
        patch: NotePatch,
    ) -> Result<UpdateOutcome, NoteValidationError> {
        patch.validate()?;

        let Some(index) = self.local_notes.iter().position(|note| note.id == id) else {
            return Ok(UpdateOutcome::NotFound);
        };

        {
            let note = &mut self.local_notes[index];
            if let Some(coordinates) = patch.coordinates {
                note.coordinates = coordinates;
            }
            for (key, value) in patch.extra {
                note.extra.insert(key, value);
            }
            note.touch();
        }

        let persistence = self.persist();
        Ok(UpdateOutcome::Updated {
            note: self.local_notes[index].clone(),
            persistence,
        })
    }

    /// Removes the first note with `id`, preserving the relative order of
    /// the rest, and mirrors the collection. Deletion is immediate and
    /// permanent.
    ///
    /// Unknown ids are a silent no-op reported as
    /// [`DeleteOutcome::NotFound`].
    pub fn delete_local_note(&mut self, id: &str) -> DeleteOutcome {
        let Some(index) = self.local_notes.iter().position(|note| note.id == id) else {
            return DeleteOutcome::NotFound;
        };

        self.local_notes.remove(index);
        let persistence = self.persist();
        DeleteOutcome::Deleted { persistence }
    }

    /// Returns the notes inside `bounds`: matching local notes first, in
    /// stored order, followed by matching server notes in stored order.
    pub fn notes_in_bounds(&self, bounds: &Bounds) -> Vec<&Note> {
        self.local_notes
            .iter()
            .chain(self.server_notes.iter())
            .filter(|note| bounds.contains(&note.coordinates))
            .collect()
    }

    /// Replaces the local collection from durable storage.
    ///
    /// An absent key and an unreadable/unparseable payload both leave the
    /// in-memory collection unchanged; the latter is logged. Never returns
    /// `Err` — the outcome is the caller's to judge.
    pub fn load_from_storage(&mut self) -> LoadOutcome {
        match self.storage.get(LOCAL_NOTES_KEY) {
            Ok(Some(payload)) => match serde_json::from_str::<Vec<Note>>(&payload) {
                Ok(notes) => {
                    let count = notes.len();
                    self.local_notes = notes;
                    info!("event=notes_load module=store status=ok count={count}");
                    LoadOutcome::Loaded(count)
                }
                Err(err) => {
                    error!(
                        "event=notes_load module=store status=error error_code=parse_failed error={err}"
                    );
                    LoadOutcome::Failed(LoadError::Parse(err))
                }
            },
            Ok(None) => LoadOutcome::Missing,
            Err(err) => {
                error!(
                    "event=notes_load module=store status=error error_code=read_failed error={err}"
                );
                LoadOutcome::Failed(LoadError::Read(err))
            }
        }
    }

    /// Serializes the local collection and writes it under the fixed key,
    /// overwriting any prior payload.
    ///
    /// Failures are logged and reported as a typed outcome; the in-memory
    /// collection is unaffected either way. Never returns `Err`.
    pub fn persist(&mut self) -> PersistOutcome {
        let payload = match serde_json::to_string(&self.local_notes) {
            Ok(payload) => payload,
            Err(err) => {
                error!(
                    "event=notes_persist module=store status=error error_code=serialize_failed error={err}"
                );
                return PersistOutcome::Failed(PersistError::Serialize(err));
            }
        };

        match self.storage.put(LOCAL_NOTES_KEY, &payload) {
            Ok(()) => PersistOutcome::Persisted,
            Err(err) => {
                error!(
                    "event=notes_persist module=store status=error error_code=write_failed error={err}"
                );
                PersistOutcome::Failed(PersistError::Write(err))
            }
        }
    }

    /// Locally-authored notes in insertion order.
    pub fn local_notes(&self) -> &[Note] {
        &self.local_notes
    }

    /// Externally supplied server notes in their published order.
    pub fn server_notes(&self) -> &[Note] {
        &self.server_notes
    }

    /// Wholesale replacement hook for the external sync collaborator.
    ///
    /// This core never mutates individual server notes and never mirrors
    /// them to local storage.
    pub fn replace_server_notes(&mut self, notes: Vec<Note>) {
        self.server_notes = notes;
    }
}
