use osmnotes_core::{
    Coordinates, DeleteOutcome, KvStore, NoteDraft, NoteKind, NotePatch, NoteStore,
    NoteValidationError, SqliteKvStore, StorageResult, UpdateOutcome,
};
use serde_json::json;
use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::HashSet;
use std::rc::Rc;

#[derive(Default)]
struct MemoryKvInner {
    entries: HashMap<String, String>,
    put_payloads: Vec<String>,
}

/// Cloneable in-memory backend; the test keeps one handle to observe what
/// the store wrote.
#[derive(Clone, Default)]
struct MemoryKvStore(Rc<RefCell<MemoryKvInner>>);

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.0.borrow().entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> StorageResult<()> {
        let mut inner = self.0.borrow_mut();
        inner.entries.insert(key.to_string(), value.to_string());
        inner.put_payloads.push(value.to_string());
        Ok(())
    }
}

fn put_count(backend: &MemoryKvStore) -> usize {
    backend.0.borrow().put_payloads.len()
}

#[test]
fn save_stamps_local_provenance_and_fresh_unique_ids() {
    let mut store = NoteStore::new(SqliteKvStore::open_in_memory().unwrap());

    let mut ids = HashSet::new();
    for index in 0..20 {
        let saved = store
            .save_local_note(
                NoteDraft::new(Coordinates::new(10.0, 20.0))
                    .with_field("text", json!(format!("note {index}"))),
            )
            .unwrap();
        assert_eq!(saved.note.kind, NoteKind::Local);
        assert_eq!(saved.note.created_at, saved.note.updated_at);
        assert!(saved.persistence.is_persisted());
        assert!(ids.insert(saved.note.id.clone()), "id minted twice");
    }

    assert_eq!(store.local_notes().len(), 20);
}

#[test]
fn save_appends_in_insertion_order() {
    let mut store = NoteStore::new(SqliteKvStore::open_in_memory().unwrap());

    let first = store
        .save_local_note(NoteDraft::new(Coordinates::new(1.0, 1.0)))
        .unwrap();
    let second = store
        .save_local_note(NoteDraft::new(Coordinates::new(2.0, 2.0)))
        .unwrap();

    let ids: Vec<_> = store.local_notes().iter().map(|note| &note.id).collect();
    assert_eq!(ids, vec![&first.note.id, &second.note.id]);
}

#[test]
fn update_merges_patch_and_leaves_other_fields_untouched() {
    let mut store = NoteStore::new(SqliteKvStore::open_in_memory().unwrap());
    let saved = store
        .save_local_note(
            NoteDraft::new(Coordinates::new(10.0, 20.0))
                .with_field("text", json!("original"))
                .with_field("tags", json!(["bench", "viewpoint"])),
        )
        .unwrap();

    let outcome = store
        .update_local_note(
            &saved.note.id,
            NotePatch::new().with_field("text", json!("edited")),
        )
        .unwrap();

    let UpdateOutcome::Updated { note, persistence } = outcome else {
        panic!("expected an update");
    };
    assert!(persistence.is_persisted());
    assert_eq!(note.id, saved.note.id);
    assert_eq!(note.coordinates, saved.note.coordinates);
    assert_eq!(note.created_at, saved.note.created_at);
    assert_eq!(note.extra["text"], json!("edited"));
    assert_eq!(note.extra["tags"], json!(["bench", "viewpoint"]));
    assert!(note.updated_at > saved.note.updated_at);
}

#[test]
fn updated_at_strictly_increases_across_back_to_back_updates() {
    let mut store = NoteStore::new(SqliteKvStore::open_in_memory().unwrap());
    let saved = store
        .save_local_note(NoteDraft::new(Coordinates::new(0.0, 0.0)))
        .unwrap();

    let mut previous = saved.note.updated_at;
    for index in 0..5 {
        let outcome = store
            .update_local_note(
                &saved.note.id,
                NotePatch::new().with_field("revision", json!(index)),
            )
            .unwrap();
        let UpdateOutcome::Updated { note, .. } = outcome else {
            panic!("expected an update");
        };
        assert!(note.updated_at > previous);
        previous = note.updated_at;
    }
}

#[test]
fn update_can_move_a_note() {
    let mut store = NoteStore::new(SqliteKvStore::open_in_memory().unwrap());
    let saved = store
        .save_local_note(NoteDraft::new(Coordinates::new(10.0, 20.0)))
        .unwrap();

    let outcome = store
        .update_local_note(
            &saved.note.id,
            NotePatch::new().move_to(Coordinates::new(-33.9, 151.2)),
        )
        .unwrap();

    let UpdateOutcome::Updated { note, .. } = outcome else {
        panic!("expected an update");
    };
    assert_eq!(note.coordinates, Coordinates::new(-33.9, 151.2));
}

#[test]
fn update_of_unknown_id_is_a_silent_noop_without_persist() {
    let backend = MemoryKvStore::default();
    let mut store = NoteStore::new(backend.clone());
    store
        .save_local_note(NoteDraft::new(Coordinates::new(1.0, 2.0)))
        .unwrap();
    let puts_before = put_count(&backend);
    let snapshot = store.local_notes().to_vec();

    let outcome = store
        .update_local_note("no-such-id", NotePatch::new().with_field("text", json!("x")))
        .unwrap();

    assert!(matches!(outcome, UpdateOutcome::NotFound));
    assert_eq!(store.local_notes(), snapshot.as_slice());
    assert_eq!(put_count(&backend), puts_before);
}

#[test]
fn delete_removes_exactly_the_first_match_and_preserves_order() {
    let mut store = NoteStore::new(SqliteKvStore::open_in_memory().unwrap());
    let first = store
        .save_local_note(NoteDraft::new(Coordinates::new(1.0, 1.0)))
        .unwrap();
    let second = store
        .save_local_note(NoteDraft::new(Coordinates::new(2.0, 2.0)))
        .unwrap();
    let third = store
        .save_local_note(NoteDraft::new(Coordinates::new(3.0, 3.0)))
        .unwrap();

    let outcome = store.delete_local_note(&second.note.id);
    let DeleteOutcome::Deleted { persistence } = outcome else {
        panic!("expected a deletion");
    };
    assert!(persistence.is_persisted());

    let ids: Vec<_> = store.local_notes().iter().map(|note| &note.id).collect();
    assert_eq!(ids, vec![&first.note.id, &third.note.id]);
}

#[test]
fn delete_of_unknown_id_is_a_silent_noop_without_persist() {
    let backend = MemoryKvStore::default();
    let mut store = NoteStore::new(backend.clone());
    store
        .save_local_note(NoteDraft::new(Coordinates::new(1.0, 2.0)))
        .unwrap();
    let puts_before = put_count(&backend);

    let outcome = store.delete_local_note("no-such-id");

    assert!(matches!(outcome, DeleteOutcome::NotFound));
    assert_eq!(store.local_notes().len(), 1);
    assert_eq!(put_count(&backend), puts_before);
}

#[test]
fn save_rejects_reserved_extra_fields_without_mutating() {
    let backend = MemoryKvStore::default();
    let mut store = NoteStore::new(backend.clone());

    let err = store
        .save_local_note(
            NoteDraft::new(Coordinates::new(1.0, 2.0)).with_field("type", json!("server")),
        )
        .unwrap_err();

    assert_eq!(err, NoteValidationError::ReservedField("type".into()));
    assert!(store.local_notes().is_empty());
    assert_eq!(put_count(&backend), 0);
}

#[test]
fn save_rejects_non_finite_coordinates() {
    let mut store = NoteStore::new(SqliteKvStore::open_in_memory().unwrap());

    let err = store
        .save_local_note(NoteDraft::new(Coordinates::new(1.0, f64::INFINITY)))
        .unwrap_err();

    assert!(matches!(
        err,
        NoteValidationError::NonFiniteCoordinate { axis: "lng", .. }
    ));
    assert!(store.local_notes().is_empty());
}

#[test]
fn invalid_patch_is_rejected_before_the_id_lookup() {
    let mut store = NoteStore::new(SqliteKvStore::open_in_memory().unwrap());

    let err = store
        .update_local_note(
            "no-such-id",
            NotePatch::new().with_field("updatedAt", json!("tampered")),
        )
        .unwrap_err();

    assert_eq!(err, NoteValidationError::ReservedField("updatedAt".into()));
}
