//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `osmnotes_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use osmnotes_core::{Bounds, Coordinates, NoteDraft, NoteStore, SqliteKvStore};
use serde_json::json;

fn main() {
    println!("osmnotes_core version={}", osmnotes_core::core_version());

    let storage = match SqliteKvStore::open_in_memory() {
        Ok(storage) => storage,
        Err(err) => {
            eprintln!("storage open failed: {err}");
            std::process::exit(1);
        }
    };

    let mut store = NoteStore::new(storage);
    let draft =
        NoteDraft::new(Coordinates::new(48.8584, 2.2945)).with_field("text", json!("smoke probe"));
    let saved = match store.save_local_note(draft) {
        Ok(saved) => saved,
        Err(err) => {
            eprintln!("note save failed: {err}");
            std::process::exit(1);
        }
    };

    let viewport = Bounds {
        south: 48.0,
        north: 49.0,
        west: 2.0,
        east: 3.0,
    };
    println!("note_persisted={}", saved.persistence.is_persisted());
    println!("notes_in_viewport={}", store.notes_in_bounds(&viewport).len());
}
