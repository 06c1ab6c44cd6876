use crate::common::{PaletteIdx, TileIdx};
use crate::format::TilemapFormat;

// On-disk width of one tilemap cell, decided once per resource from the
// decompressed capacity. 1-byte cells carry a bare tile index; 2-byte cells
// add flips and a palette, and raise the addressable tile count to 1024.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CellWidth {
    One,
    Two,
}

impl CellWidth {
    pub fn for_format(format: &TilemapFormat, decompressed_len: usize) -> CellWidth {
        if format.cell_count() * 2 > decompressed_len {
            CellWidth::One
        } else {
            CellWidth::Two
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            CellWidth::One => 1,
            CellWidth::Two => 2,
        }
    }

    pub fn tile_limit(self) -> usize {
        match self {
            CellWidth::One => 0x100,
            CellWidth::Two => 0x400,
        }
    }

    // Mirrored tile reuse is only expressible when cells have flip bits.
    pub fn flips_allowed(self) -> bool {
        self == CellWidth::Two
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TileCell {
    pub tile: TileIdx,
    pub palette: PaletteIdx,
    pub h_flip: bool,
    pub v_flip: bool,
}

// 2-byte cells are little-endian: bits 0-9 tile index, bit 10 hflip,
// bit 11 vflip, bits 12-15 palette. Missing bytes read as zero.
pub fn decode_cell(map_data: &[u8], index: usize, width: CellWidth) -> TileCell {
    match width {
        CellWidth::One => TileCell {
            tile: map_data.get(index).copied().unwrap_or(0) as TileIdx,
            palette: 0,
            h_flip: false,
            v_flip: false,
        },
        CellWidth::Two => {
            let b0 = map_data.get(index * 2).copied().unwrap_or(0);
            let b1 = map_data.get(index * 2 + 1).copied().unwrap_or(0);
            let w = u16::from_le_bytes([b0, b1]);
            TileCell {
                tile: w & 0x3FF,
                palette: (w >> 12) as PaletteIdx,
                h_flip: (w >> 10) & 1 == 1,
                v_flip: (w >> 11) & 1 == 1,
            }
        }
    }
}

// Inverse packing. 1-byte cells have no room for palette/flips, so those
// fields are dropped; callers must have resolved them to zero already.
pub fn encode_cell(map_data: &mut [u8], index: usize, cell: TileCell, width: CellWidth) {
    match width {
        CellWidth::One => {
            map_data[index] = cell.tile as u8;
        }
        CellWidth::Two => {
            let mut w = cell.tile & 0x3FF;
            if cell.h_flip {
                w |= 1 << 10;
            }
            if cell.v_flip {
                w |= 1 << 11;
            }
            w |= ((cell.palette & 0xF) as u16) << 12;
            map_data[index * 2..index * 2 + 2].copy_from_slice(&w.to_le_bytes());
        }
    }
}
