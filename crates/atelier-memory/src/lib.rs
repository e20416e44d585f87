//! Reflection memory: an embedding-indexed record store.
//!
//! [`ReflectionStore`] persists structured self-critiques to a JSON
//! snapshot and retrieves them by semantic similarity through a flat
//! exact nearest-neighbor index ([`FlatIndex`]). The index is rebuilt
//! wholesale on load and extended by one incremental insert per save.

pub mod index;
pub mod store;

pub use index::FlatIndex;
pub use store::ReflectionStore;
