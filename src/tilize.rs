use crate::common::{PaletteIdx, PixelValue, TileBlock};
use crate::gfx::{tile_byte_len, unpack_tile};

// Cuts a composited pixel grid back into 8x8 blocks, row-major, recovering
// for each block the palette it was drawn with. Every pixel of one block
// must resolve to the same palette; a mix is a data-integrity bug in the
// caller, caught here in debug builds.
pub fn tilize(
    pixels: &[PixelValue],
    width: usize,
    height: usize,
    bits_per_pixel: u8,
) -> Vec<(TileBlock, PaletteIdx)> {
    let divisor: PixelValue = 1 << bits_per_pixel;
    let tile_width = width / 8;
    let tile_height = height / 8;
    let mut result = Vec::with_capacity(tile_width * tile_height);
    for ty in 0..tile_height {
        for tx in 0..tile_width {
            let palette = (pixels[ty * 8 * width + tx * 8] / divisor) as PaletteIdx;
            let mut tile: TileBlock = [[0; 8]; 8];
            for y in 0..8 {
                for x in 0..8 {
                    let p = pixels[(ty * 8 + y) * width + tx * 8 + x];
                    debug_assert!(
                        (p / divisor) as PaletteIdx == palette,
                        "every pixel in an 8x8 block must share one palette"
                    );
                    tile[y][x] = (p % divisor) as u8;
                }
            }
            result.push((tile, palette));
        }
    }
    result
}

// Cuts a raw decompressed tileset buffer into its sequence of tiles. A
// trailing partial tile is included, padded with zero pixels.
pub fn tilize_blocks(data: &[u8], bits_per_pixel: u8) -> Vec<TileBlock> {
    let step = tile_byte_len(bits_per_pixel);
    (0..data.len().div_ceil(step))
        .map(|i| unpack_tile(data, i * step, bits_per_pixel))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_palette_and_local_values() {
        // A 16x8 grid: left block drawn with palette 2, right with palette 0.
        let mut pixels = vec![0; 16 * 8];
        for y in 0..8 {
            for x in 0..8 {
                pixels[y * 16 + x] = 2 * 16 + ((x + y) % 16) as PixelValue;
                pixels[y * 16 + 8 + x] = (x * y % 16) as PixelValue;
            }
        }
        let tiles = tilize(&pixels, 16, 8, 4);
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0].1, 2);
        assert_eq!(tiles[0].0[1][2], 3);
        assert_eq!(tiles[1].1, 0);
        assert_eq!(tiles[1].0[3][5], 15);
    }

    #[test]
    fn blocks_are_row_major() {
        let mut pixels = vec![0; 16 * 16];
        // Mark the top-left pixel of each block with a distinct value.
        pixels[0] = 1;
        pixels[8] = 2;
        pixels[8 * 16] = 3;
        pixels[8 * 16 + 8] = 4;
        let tiles = tilize(&pixels, 16, 16, 4);
        let marks: Vec<u8> = tiles.iter().map(|(t, _)| t[0][0]).collect();
        assert_eq!(marks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn tilize_blocks_includes_partial_tail() {
        let data = vec![0x11; 48];
        let tiles = tilize_blocks(&data, 4);
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[1][3][7], 1);
        assert_eq!(tiles[1][4][0], 0);
    }
}
