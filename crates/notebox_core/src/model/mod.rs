//! Domain model for grouped notes.
//!
//! # Responsibility
//! - Define the two persisted entity shapes (`Group`, `Message`).
//! - Keep field naming aligned with the persisted JSON layout.
//!
//! # Invariants
//! - Identifiers are opaque strings; new ones are random UUID v4 values.
//! - A message keeps its `id` and `created_at` across edits.

pub mod group;
pub mod message;
pub mod validation;
