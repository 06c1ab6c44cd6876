use crate::codec::{decode_cell, CellWidth};
use crate::common::PixelValue;
use crate::format::TilemapFormat;
use crate::gfx::{tile_byte_len, unpack_tile};

// Renders the full pixel grid for a tilemap: each cell's tile block is
// pulled out of the flat tileset buffer, mirrored per the cell's flip bits,
// and offset by `palette << bits_per_pixel`. Pure function of its inputs;
// missing-tileset policy belongs to the caller.
pub fn composite(
    map_data: &[u8],
    tiles: &[u8],
    format: &TilemapFormat,
    width: CellWidth,
) -> Vec<PixelValue> {
    let pixel_width = format.pixel_width();
    let tile_len = tile_byte_len(format.bits_per_pixel);
    let mut result = vec![0; pixel_width * format.pixel_height()];
    for ty in 0..format.tile_height as usize {
        for tx in 0..format.tile_width as usize {
            let cell = decode_cell(map_data, ty * format.tile_width as usize + tx, width);
            let block = unpack_tile(tiles, cell.tile as usize * tile_len, format.bits_per_pixel);
            let palette_offset = (cell.palette as PixelValue) << format.bits_per_pixel;
            for y in 0..8 {
                for x in 0..8 {
                    let sx = if cell.h_flip { 7 - x } else { x };
                    let sy = if cell.v_flip { 7 - y } else { y };
                    result[(ty * 8 + y) * pixel_width + tx * 8 + x] =
                        block[sy][sx] as PixelValue + palette_offset;
                }
            }
        }
    }
    result
}
