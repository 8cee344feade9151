//! Note collection orchestration over the storage boundary.
//!
//! # Responsibility
//! - Own the canonical local-note collection and its durable mirror.
//! - Keep viewport query shaping inside core.

pub mod note_store;
