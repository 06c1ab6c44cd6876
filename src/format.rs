use crate::common::PixelValue;

// Textual shape tag for a compressed tilemap, e.g. `lzm4x32x32|data.tileset|gfx`.
// The trailing pipe-separated segments (tileset hint, table member) are
// independently optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilemapFormat {
    pub bits_per_pixel: u8,
    pub tile_width: u32,
    pub tile_height: u32,
    pub matching_tileset: Option<String>,
    pub tileset_table_member: Option<String>,
}

impl TilemapFormat {
    // Returns None when the tag is some other format, letting the caller try
    // another interpretation.
    pub fn parse(tag: &str) -> Option<TilemapFormat> {
        let body = tag.strip_prefix("`lzm")?.strip_suffix('`')?;
        let (dims, rest) = match body.split_once('|') {
            Some((dims, rest)) => (dims, Some(rest)),
            None => (body, None),
        };
        let (hint, member) = match rest {
            Some(rest) => match rest.split_once('|') {
                Some((hint, member)) => (Some(hint), Some(member)),
                None => (Some(rest), None),
            },
            None => (None, None),
        };

        let parts: Vec<&str> = dims.split('x').collect();
        if parts.len() != 3 {
            return None;
        }
        let bits_per_pixel: u8 = parts[0].parse().ok()?;
        let tile_width: u32 = parts[1].parse().ok()?;
        let tile_height: u32 = parts[2].parse().ok()?;
        if bits_per_pixel != 4 && bits_per_pixel != 8 {
            return None;
        }
        if tile_width == 0 || tile_height == 0 {
            return None;
        }

        Some(TilemapFormat {
            bits_per_pixel,
            tile_width,
            tile_height,
            matching_tileset: hint.map(str::to_string),
            tileset_table_member: member.map(str::to_string),
        })
    }

    pub fn tag(&self) -> String {
        let mut tag = format!(
            "`lzm{}x{}x{}",
            self.bits_per_pixel, self.tile_width, self.tile_height
        );
        if let Some(hint) = &self.matching_tileset {
            tag.push('|');
            tag.push_str(hint);
            if let Some(member) = &self.tileset_table_member {
                tag.push('|');
                tag.push_str(member);
            }
        }
        tag.push('`');
        tag
    }

    pub fn pixel_width(&self) -> usize {
        self.tile_width as usize * 8
    }

    pub fn pixel_height(&self) -> usize {
        self.tile_height as usize * 8
    }

    pub fn cell_count(&self) -> usize {
        self.tile_width as usize * self.tile_height as usize
    }

    // 16 at 4bpp, 256 at 8bpp. Pixels below the divisor are palette-local;
    // dividing by it recovers the palette a pixel was drawn with.
    pub fn palette_divisor(&self) -> PixelValue {
        1 << self.bits_per_pixel
    }
}

// Shape tag for a compressed tileset, e.g. `lzt4` or `lzt4|palette.hint`.
// The locator uses this to recognize tileset-shaped pointer segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilesetFormat {
    pub bits_per_pixel: u8,
    pub palette_hint: Option<String>,
}

impl TilesetFormat {
    pub fn parse(tag: &str) -> Option<TilesetFormat> {
        let body = tag.strip_prefix("`lzt")?.strip_suffix('`')?;
        let (bits, hint) = match body.split_once('|') {
            Some((bits, hint)) => (bits, Some(hint)),
            None => (body, None),
        };
        let bits_per_pixel: u8 = bits.parse().ok()?;
        if bits_per_pixel != 4 && bits_per_pixel != 8 {
            return None;
        }
        Some(TilesetFormat {
            bits_per_pixel,
            palette_hint: hint.map(str::to_string),
        })
    }

    pub fn tag(&self) -> String {
        match &self.palette_hint {
            Some(hint) => format!("`lzt{}|{}`", self.bits_per_pixel, hint),
            None => format!("`lzt{}`", self.bits_per_pixel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_tag() {
        let format = TilemapFormat::parse("`lzm4x32x32|data.tileset|gfx`").unwrap();
        assert_eq!(format.bits_per_pixel, 4);
        assert_eq!(format.tile_width, 32);
        assert_eq!(format.tile_height, 32);
        assert_eq!(format.matching_tileset.as_deref(), Some("data.tileset"));
        assert_eq!(format.tileset_table_member.as_deref(), Some("gfx"));
    }

    #[test]
    fn parse_tag_with_hint_only() {
        let format = TilemapFormat::parse("`lzm8x4x4|data.tileset`").unwrap();
        assert_eq!(format.bits_per_pixel, 8);
        assert_eq!(format.tile_width, 4);
        assert_eq!(format.tile_height, 4);
        assert_eq!(format.matching_tileset.as_deref(), Some("data.tileset"));
        assert_eq!(format.tileset_table_member, None);
        assert_eq!(format.tag(), "`lzm8x4x4|data.tileset`");
    }

    #[test]
    fn parse_rejects_other_formats() {
        assert_eq!(TilemapFormat::parse("`lzs4x8x8`"), None);
        assert_eq!(TilemapFormat::parse("lzm4x8x8"), None);
        assert_eq!(TilemapFormat::parse("`lzm4x8`"), None);
        assert_eq!(TilemapFormat::parse("`lzm4xax8`"), None);
        assert_eq!(TilemapFormat::parse("`lzm3x8x8`"), None);
        assert_eq!(TilemapFormat::parse("`lzm4x0x8`"), None);
    }

    #[test]
    fn tag_round_trips() {
        for tag in [
            "`lzm4x8x8`",
            "`lzm4x8x8|graphics.title.tiles`",
            "`lzm8x30x20|maps|tileset`",
        ] {
            let format = TilemapFormat::parse(tag).unwrap();
            assert_eq!(format.tag(), tag);
            assert_eq!(TilemapFormat::parse(&format.tag()), Some(format));
        }
    }

    #[test]
    fn tileset_tag_round_trips() {
        let format = TilesetFormat::parse("`lzt4|graphics.title.palette`").unwrap();
        assert_eq!(format.bits_per_pixel, 4);
        assert_eq!(format.palette_hint.as_deref(), Some("graphics.title.palette"));
        assert_eq!(format.tag(), "`lzt4|graphics.title.palette`");
        assert_eq!(TilesetFormat::parse("`lzm4`"), None);
    }
}
