use log::warn;

use crate::common::{PaletteIdx, TileBlock, EMPTY_TILE};
use crate::matching::find_match;

// Ordered catalog of unique tiles. Entry 0 is always the reserved all-zero
// tile and is never deduplicated away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileCatalog {
    tiles: Vec<TileBlock>,
    dropped: usize,
}

impl TileCatalog {
    pub fn capacity(flips_allowed: bool) -> usize {
        if flips_allowed {
            0x400
        } else {
            0x100
        }
    }

    pub fn tiles(&self) -> &[TileBlock] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    // Distinct tiles that did not fit under the capacity. Cells whose tile
    // was dropped will fall back to the empty tile when re-encoded.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

// Builds the minimal catalog covering a tilized grid, scanning row-major and
// appending only tiles no earlier entry can stand in for. Once the capacity
// is reached the scan keeps matching but stops appending: excess distinct
// tiles are lost, which is a defined (lossy) behavior of the cell format's
// addressing width, not an error.
pub fn unique_tiles(tiles: &[(TileBlock, PaletteIdx)], flips_allowed: bool) -> TileCatalog {
    let limit = TileCatalog::capacity(flips_allowed);
    let mut result = vec![EMPTY_TILE];
    let mut dropped = 0;
    for (tile, _) in tiles {
        if find_match(tile, &result, flips_allowed).is_some() {
            continue;
        }
        if result.len() == limit {
            dropped += 1;
            continue;
        }
        result.push(*tile);
    }
    if dropped > 0 {
        warn!(
            "tile capacity {} reached, {} distinct tiles dropped",
            limit, dropped
        );
    }
    TileCatalog {
        tiles: result,
        dropped,
    }
}
