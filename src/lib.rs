// Codec and reconciliation engine for compressed tilemap/tileset graphics
// in ROM images: cell packing, pixel compositing and decomposition,
// flip-aware tile matching, deduplication, and conflict-free merging of an
// edited tile set into a tileset shared with sibling tilemaps.

pub mod catalog;
pub mod codec;
pub mod common;
pub mod compose;
pub mod edit;
pub mod format;
pub mod gfx;
pub mod locate;
pub mod matching;
pub mod merge;
pub mod model;
pub mod persist;
pub mod tilize;
