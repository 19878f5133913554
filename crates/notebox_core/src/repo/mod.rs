//! Repository layer over the key-value store.
//!
//! # Responsibility
//! - Map the two entity collections to their fixed storage keys.
//! - Own JSON encoding/decoding of whole-collection blobs.
//!
//! # Invariants
//! - An absent key decodes to an empty collection.
//! - A present but undecodable blob is an error, never an empty collection.

pub mod collection_repo;
