use anyhow::{bail, ensure, Context, Result};
use hashbrown::HashSet;
use log::info;

use crate::catalog::unique_tiles;
use crate::codec::{decode_cell, encode_cell, CellWidth, TileCell};
use crate::common::{Addr, PixelValue, TileIdx};
use crate::compose::composite;
use crate::format::TilemapFormat;
use crate::gfx::{pack_tile, tile_byte_len};
use crate::locate::{find_matching_tileset, TilesetCache};
use crate::matching::{find_match, TileMatch};
use crate::merge::merge_tilesets;
use crate::model::{
    ChangeToken, DataModel, GraphicsResource, StreamCodec, TilemapInfo, TilesetInfo,
};
use crate::tilize::{tilize, tilize_blocks};

// Renders a tilemap's current pixels for display. A tilemap whose tileset
// does not resolve renders as a blank grid sized to its descriptor; a plain
// sprite found in the tileset's place is close enough to composite from.
pub fn get_pixels(
    model: &dyn DataModel,
    codec: &dyn StreamCodec,
    tilemap: &TilemapInfo,
    cache: &mut TilesetCache,
) -> Result<Vec<PixelValue>> {
    let format = &tilemap.format;
    let map_data = codec.decompress(model.read(tilemap.start, tilemap.byte_len)?)?;
    let width = CellWidth::for_format(format, map_data.len());

    let referrers = model.referrers(tilemap.start).to_vec();
    let tiles = match cache.get_or_resolve(model, format, &referrers) {
        Some(addr) => match model.resource_at(addr) {
            Some(GraphicsResource::Tileset(t)) => {
                Some(codec.decompress(model.read(t.start, t.byte_len)?)?)
            }
            Some(GraphicsResource::PlainSprite(s)) => {
                Some(codec.decompress(model.read(s.start, s.byte_len)?)?)
            }
            _ => None,
        },
        None => None,
    };
    match tiles {
        Some(tiles) => Ok(composite(&map_data, &tiles, format, width)),
        None => Ok(vec![0; format.pixel_width() * format.pixel_height()]),
    }
}

// Editing is only possible when the sibling resource really is a tileset;
// compositing alone can make do with less.
pub fn supports_edit(
    model: &dyn DataModel,
    tilemap: &TilemapInfo,
    cache: &mut TilesetCache,
) -> bool {
    let referrers = model.referrers(tilemap.start).to_vec();
    match cache.get_or_resolve(model, &tilemap.format, &referrers) {
        Some(addr) => matches!(
            model.resource_at(addr),
            Some(GraphicsResource::Tileset(_))
        ),
        None => false,
    }
}

// Every tile index referenced by a tilemap's cells.
pub fn used_tiles(map_data: &[u8], format: &TilemapFormat) -> HashSet<usize> {
    let width = CellWidth::for_format(format, map_data.len());
    (0..format.cell_count())
        .map(|i| decode_cell(map_data, i, width).tile as usize)
        .collect()
}

// Tilemaps whose own resolution lands on the tileset at `tileset_addr`.
pub fn dependent_tilemaps(model: &dyn DataModel, tileset_addr: Addr) -> Vec<(Addr, TilemapInfo)> {
    let mut dependents = vec![];
    for (addr, resource) in model.resources() {
        if let GraphicsResource::Tilemap(tilemap) = resource {
            let referrers = model.referrers(addr).to_vec();
            if find_matching_tileset(model, &tilemap.format, &referrers) == Some(tileset_addr) {
                dependents.push((addr, tilemap));
            }
        }
    }
    dependents
}

// Slots the merge must leave in place: every slot of the tileset, minus the
// references of the tilemap being edited, plus the references of every
// sibling. A slot shared between the editor and a sibling stays kept.
pub fn tiles_to_keep(
    model: &dyn DataModel,
    codec: &dyn StreamCodec,
    tileset_addr: Addr,
    editing: Addr,
) -> Result<HashSet<usize>> {
    let Some(GraphicsResource::Tileset(tileset)) = model.resource_at(tileset_addr) else {
        bail!("no tileset at {tileset_addr:#x}");
    };
    let tile_bytes = codec.decompress(model.read(tileset.start, tileset.byte_len)?)?;
    let slots = tile_bytes.len() / tile_byte_len(tileset.format.bits_per_pixel);
    let mut keep: HashSet<usize> = (0..slots).collect();

    let mut own = HashSet::new();
    let mut sibling_used = HashSet::new();
    for (addr, tilemap) in dependent_tilemaps(model, tileset_addr) {
        let map_data = codec.decompress(model.read(tilemap.start, tilemap.byte_len)?)?;
        let used = used_tiles(&map_data, &tilemap.format);
        if addr == editing {
            own = used;
        } else {
            sibling_used.extend(used);
        }
    }
    for tile in own {
        keep.remove(&tile);
    }
    keep.extend(sibling_used);
    Ok(keep)
}

// Compresses and rewrites a resource, relocating it when the new bytes
// outgrow the old footprint. The stale remainder of the footprint is padded
// with 0xFF. Returns the new start and stored length.
pub fn replace_data(
    model: &mut dyn DataModel,
    codec: &dyn StreamCodec,
    token: ChangeToken,
    start: Addr,
    old_len: usize,
    raw: &[u8],
) -> Result<(Addr, usize)> {
    let stored = codec.compress(raw);
    let new_start = if stored.len() > old_len {
        model.relocate(token, start, stored.len())?
    } else {
        start
    };
    model.write(token, new_start, &stored)?;
    if stored.len() < old_len {
        model.write(
            token,
            new_start + stored.len(),
            &vec![0xFF; old_len - stored.len()],
        )?;
    }
    Ok((new_start, stored.len()))
}

// Applies an edited pixel grid to a tilemap whose tileset may be shared:
// tilize, deduplicate, merge into the tileset without disturbing slots that
// siblings still reference, then re-encode every cell against the merged
// tile list and commit both resources.
pub fn set_pixels(
    model: &mut dyn DataModel,
    codec: &dyn StreamCodec,
    token: ChangeToken,
    tilemap_addr: Addr,
    pixels: &[PixelValue],
    cache: &mut TilesetCache,
) -> Result<TilemapInfo> {
    let Some(GraphicsResource::Tilemap(tilemap)) = model.resource_at(tilemap_addr) else {
        bail!("no tilemap at {tilemap_addr:#x}");
    };
    let format = tilemap.format.clone();
    ensure!(
        pixels.len() == format.pixel_width() * format.pixel_height(),
        "pixel grid does not match the {}x{} descriptor",
        format.pixel_width(),
        format.pixel_height()
    );

    let mut map_data = codec.decompress(model.read(tilemap.start, tilemap.byte_len)?)?;
    let cell_width = CellWidth::for_format(&format, map_data.len());
    ensure!(
        map_data.len() >= format.cell_count() * cell_width.bytes(),
        "tilemap data shorter than its descriptor"
    );
    let flips_allowed = cell_width.flips_allowed();

    let tile_grid = tilize(
        pixels,
        format.pixel_width(),
        format.pixel_height(),
        format.bits_per_pixel,
    );
    let catalog = unique_tiles(&tile_grid, flips_allowed);

    // Editing requires a real tileset: cells encoded against a placeholder
    // would corrupt tile indices for every sibling.
    let referrers = model.referrers(tilemap.start).to_vec();
    let tileset_addr = cache
        .get_or_resolve(model, &format, &referrers)
        .context("no tileset resolves for this tilemap")?;
    let Some(GraphicsResource::Tileset(tileset)) = model.resource_at(tileset_addr) else {
        bail!("resource at {tileset_addr:#x} is not a tileset, refusing to edit");
    };

    let old_tile_bytes = codec.decompress(model.read(tileset.start, tileset.byte_len)?)?;
    let previous = tilize_blocks(&old_tile_bytes, tileset.format.bits_per_pixel);
    let keep = tiles_to_keep(model, codec, tileset_addr, tilemap_addr)?;
    let merged = merge_tilesets(&previous, &keep, catalog.tiles(), flips_allowed);

    // The tileset is committed first; cells are then encoded against it.
    let mut tile_bytes = Vec::with_capacity(merged.len() * tile_byte_len(format.bits_per_pixel));
    for tile in &merged {
        tile_bytes.extend(pack_tile(tile, tileset.format.bits_per_pixel));
    }
    let (ts_start, ts_len) =
        replace_data(model, codec, token, tileset.start, tileset.byte_len, &tile_bytes)?;
    model.observe_resource(
        token,
        tileset.start,
        GraphicsResource::Tileset(TilesetInfo {
            start: ts_start,
            byte_len: ts_len,
            format: tileset.format.clone(),
        }),
    );

    for (i, (tile, palette)) in tile_grid.iter().enumerate() {
        // Tiles the merge pushed past the encodable range get the same
        // fallback as unmatched tiles: the reserved empty tile.
        let (index, matched) = match find_match(tile, &merged, flips_allowed) {
            Some((index, matched)) if index < cell_width.tile_limit() => (index, matched),
            _ => (0, TileMatch::Normal),
        };
        let cell = TileCell {
            tile: index as TileIdx,
            palette: *palette,
            h_flip: matched.h_flip(),
            v_flip: matched.v_flip(),
        };
        encode_cell(&mut map_data, i, cell, cell_width);
    }

    let (new_start, new_len) =
        replace_data(model, codec, token, tilemap.start, tilemap.byte_len, &map_data)?;
    let rewritten = TilemapInfo {
        start: new_start,
        byte_len: new_len,
        format,
    };
    model.observe_resource(token, tilemap.start, GraphicsResource::Tilemap(rewritten.clone()));
    // Committing may have moved the tileset; any memoized address is stale.
    cache.invalidate();
    info!(
        "tilemap rewritten at {:#x}, shared tileset now holds {} tiles",
        new_start,
        merged.len()
    );
    Ok(rewritten)
}
