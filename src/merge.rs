use hashbrown::HashSet;
use log::warn;

use crate::catalog::TileCatalog;
use crate::common::TileBlock;
use crate::matching::find_match;

// Reconciles a freshly deduplicated tile list against a shared tileset's
// current contents. `tiles_to_keep` holds the indices of `previous` that
// sibling tilemaps still reference; those slots are copied through at the
// same position, so sibling references stay valid by positional identity.
// Every other slot is filled with the next new tile that is not already
// covered by something placed earlier. The result is never shorter than
// `previous`.
pub fn merge_tilesets(
    previous: &[TileBlock],
    tiles_to_keep: &HashSet<usize>,
    new_tiles: &[TileBlock],
    flips_allowed: bool,
) -> Vec<TileBlock> {
    let mut merged: Vec<TileBlock> = Vec::with_capacity(previous.len());
    let mut next_new = 0;
    for (i, prev) in previous.iter().enumerate() {
        if tiles_to_keep.contains(&i) {
            merged.push(*prev);
        } else {
            // New tiles already covered by the merged list need no slot.
            while next_new < new_tiles.len()
                && find_match(&new_tiles[next_new], &merged, flips_allowed).is_some()
            {
                next_new += 1;
            }
            if next_new == new_tiles.len() {
                break;
            }
            merged.push(new_tiles[next_new]);
            next_new += 1;
        }
    }

    // New tiles ran out: carry the rest of the previous tileset through
    // unchanged, keeping the catalog length stable.
    for i in merged.len()..previous.len() {
        merged.push(previous[i]);
    }

    // New tiles left over once every previous slot is walked go at the end.
    for tile in &new_tiles[next_new..] {
        if find_match(tile, &merged, flips_allowed).is_some() {
            continue;
        }
        merged.push(*tile);
    }

    let limit = TileCatalog::capacity(flips_allowed);
    if merged.len() > limit {
        // Tiles past the encodable index range cannot be referenced by any
        // cell; the writer will fall back to tile 0 for them.
        warn!(
            "merged tileset holds {} tiles, beyond the addressable {}",
            merged.len(),
            limit
        );
    }
    merged
}
