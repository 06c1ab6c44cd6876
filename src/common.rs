pub type ColorIdx = u8; // Palette-local pixel value (0-15 at 4bpp, 0-255 at 8bpp)
pub type PaletteIdx = u8; // Index into the 16-palette bank (0-15)
pub type TileIdx = u16; // Index into a tileset's tile list (0-1023)
pub type PixelValue = u16; // Composited pixel: palette-local value plus palette offset
pub type Addr = usize; // Byte offset into the data model's backing store

// One 8x8 block of palette-local pixels, indexed [y][x].
pub type TileBlock = [[ColorIdx; 8]; 8];

// Tile 0 of every tileset is reserved as the all-zero tile, so transparency
// and layering keep working across edits.
pub const EMPTY_TILE: TileBlock = [[0; 8]; 8];
