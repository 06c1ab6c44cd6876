use crate::common::Addr;
use crate::format::{TilemapFormat, TilesetFormat};
use crate::model::{DataModel, GraphicsResource};

// Capability for resolving which tileset a tilemap's hints point to,
// injected into the compositing/merge call path. The default implementation
// walks the data model; tests can substitute a fixed answer.
pub trait TilesetResolver {
    fn resolve(
        &self,
        model: &dyn DataModel,
        format: &TilemapFormat,
        referrers: &[Addr],
    ) -> Option<Addr>;
}

pub struct ModelTilesetResolver;

impl TilesetResolver for ModelTilesetResolver {
    fn resolve(
        &self,
        model: &dyn DataModel,
        format: &TilemapFormat,
        referrers: &[Addr],
    ) -> Option<Addr> {
        find_matching_tileset(model, format, referrers)
    }
}

// Best-effort heuristic walk over the data model:
//   (a) the hint names a tileset directly;
//   (b) the hint names a table: find the row this tilemap belongs to via its
//       own referring pointer, then follow the row's tileset pointer segment;
//   (c) fall back to whatever the tilemap's first referrer leads to.
pub fn find_matching_tileset(
    model: &dyn DataModel,
    format: &TilemapFormat,
    referrers: &[Addr],
) -> Option<Addr> {
    let hint_addr = match &format.matching_tileset {
        Some(hint) => model.resolve_anchor(hint)?,
        // No hint: start from wherever the tilemap's own first referrer
        // sits, which is usually a row of the table that owns it.
        None => *referrers.first()?,
    };

    // Easy case: the hint is the address of a tileset.
    if let Some(GraphicsResource::Tileset(_)) = model.resource_at(hint_addr) {
        return Some(hint_addr);
    }

    // Harder case: the hint is a table.
    let Some(hint_table) = model.table_containing(hint_addr) else {
        return Some(hint_addr);
    };
    let (tilemap_pointer, row_table) = referrers
        .iter()
        .find_map(|&r| model.table_containing(r).map(|t| (r, t)))?;
    let row = (tilemap_pointer - row_table.start) / row_table.element_len;

    // Find which segment of the row leads to the tileset.
    let mut segment_offset = 0;
    for segment in &hint_table.segments {
        if segment.pointer
            && (format.tileset_table_member.is_none()
                || format.tileset_table_member.as_deref() == Some(segment.name.as_str()))
        {
            let tileset_shaped = segment
                .inner_format
                .as_deref()
                .and_then(TilesetFormat::parse)
                .is_some();
            if tileset_shaped {
                let source = hint_table.start + hint_table.element_len * row + segment_offset;
                if let Ok(dest) = model.read_pointer(source) {
                    if let Some(GraphicsResource::Tileset(_)) = model.resource_at(dest) {
                        return Some(dest);
                    }
                }
            }
        }
        segment_offset += segment.byte_len;
    }

    Some(hint_addr)
}

// Memoized resolution of "which address is my sibling tileset". Owned by the
// caller, invalidated explicitly after any edit that may move resources;
// never a source of truth.
#[derive(Default)]
pub struct TilesetCache {
    resolved: Option<Addr>,
}

impl TilesetCache {
    pub fn get_or_resolve(
        &mut self,
        model: &dyn DataModel,
        format: &TilemapFormat,
        referrers: &[Addr],
    ) -> Option<Addr> {
        if self.resolved.is_none() {
            self.resolved = find_matching_tileset(model, format, referrers);
        }
        self.resolved
    }

    pub fn invalidate(&mut self) {
        self.resolved = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ChangeToken, MemoryModel, TableSchema, TableSegment, TilesetInfo, TilemapInfo,
    };

    fn tileset_resource(start: Addr) -> GraphicsResource {
        GraphicsResource::Tileset(TilesetInfo {
            start,
            byte_len: 32,
            format: TilesetFormat::parse("`lzt4`").unwrap(),
        })
    }

    fn tilemap_resource(start: Addr, tag: &str) -> GraphicsResource {
        GraphicsResource::Tilemap(TilemapInfo {
            start,
            byte_len: 8,
            format: TilemapFormat::parse(tag).unwrap(),
        })
    }

    #[test]
    fn direct_hint_resolves() {
        let mut model = MemoryModel::new(vec![0; 64]);
        model.add_anchor("graphics.tiles", 32);
        model.add_resource(32, tileset_resource(32));
        let format = TilemapFormat::parse("`lzm4x2x2|graphics.tiles`").unwrap();
        assert_eq!(find_matching_tileset(&model, &format, &[]), Some(32));

        let resolver: &dyn TilesetResolver = &ModelTilesetResolver;
        assert_eq!(resolver.resolve(&model, &format, &[]), Some(32));

        let dangling = TilemapFormat::parse("`lzm4x2x2|no.such.anchor`").unwrap();
        assert_eq!(find_matching_tileset(&model, &dangling, &[]), None);
    }

    #[test]
    fn table_hint_follows_row_pointer() {
        // Layout: a 2-row table at 0 with segments [map ptr, gfx ptr].
        // Row 1's map pointer (addr 8) points at our tilemap (addr 100);
        // its gfx pointer (addr 12) points at the tileset (addr 200).
        let mut model = MemoryModel::new(vec![0; 256]);
        let token = ChangeToken(0);
        model.write(token, 8, &100u32.to_le_bytes()).unwrap();
        model.write(token, 12, &200u32.to_le_bytes()).unwrap();
        model.add_anchor("maps", 0);
        model.add_table(TableSchema {
            start: 0,
            element_len: 8,
            element_count: 2,
            segments: vec![
                TableSegment {
                    name: "map".to_string(),
                    byte_len: 4,
                    pointer: true,
                    inner_format: Some("`lzm4x2x2|maps|gfx`".to_string()),
                },
                TableSegment {
                    name: "gfx".to_string(),
                    byte_len: 4,
                    pointer: true,
                    inner_format: Some("`lzt4`".to_string()),
                },
            ],
        });
        model.add_resource(100, tilemap_resource(100, "`lzm4x2x2|maps|gfx`"));
        model.add_resource(200, tileset_resource(200));
        model.add_referrer(100, 8);

        let format = TilemapFormat::parse("`lzm4x2x2|maps|gfx`").unwrap();
        assert_eq!(find_matching_tileset(&model, &format, &[8]), Some(200));

        // Without a member name, the first tileset-shaped segment wins.
        let format = TilemapFormat::parse("`lzm4x2x2|maps`").unwrap();
        assert_eq!(find_matching_tileset(&model, &format, &[8]), Some(200));
    }

    #[test]
    fn hintless_tilemap_resolves_through_its_own_table() {
        // Same table layout as above, but the tilemap format carries no
        // hint: resolution starts from the referrer's surrounding table.
        let mut model = MemoryModel::new(vec![0; 256]);
        let token = ChangeToken(0);
        model.write(token, 8, &100u32.to_le_bytes()).unwrap();
        model.write(token, 12, &200u32.to_le_bytes()).unwrap();
        model.add_table(TableSchema {
            start: 0,
            element_len: 8,
            element_count: 2,
            segments: vec![
                TableSegment {
                    name: "map".to_string(),
                    byte_len: 4,
                    pointer: true,
                    inner_format: Some("`lzm4x2x2`".to_string()),
                },
                TableSegment {
                    name: "gfx".to_string(),
                    byte_len: 4,
                    pointer: true,
                    inner_format: Some("`lzt4`".to_string()),
                },
            ],
        });
        model.add_resource(200, tileset_resource(200));

        let format = TilemapFormat::parse("`lzm4x2x2`").unwrap();
        assert_eq!(find_matching_tileset(&model, &format, &[8]), Some(200));
        // No hint and no referrers leaves nothing to resolve from.
        assert_eq!(find_matching_tileset(&model, &format, &[]), None);
    }

    #[test]
    fn cache_memoizes_until_invalidated() {
        let mut model = MemoryModel::new(vec![0; 64]);
        model.add_anchor("gfx", 8);
        model.add_resource(8, tileset_resource(8));
        let format = TilemapFormat::parse("`lzm4x2x2|gfx`").unwrap();

        let mut cache = TilesetCache::default();
        assert_eq!(cache.get_or_resolve(&model, &format, &[]), Some(8));

        // A stale cache keeps answering until told otherwise.
        model.add_anchor("gfx", 16);
        model.add_resource(16, tileset_resource(16));
        assert_eq!(cache.get_or_resolve(&model, &format, &[]), Some(8));
        cache.invalidate();
        assert_eq!(cache.get_or_resolve(&model, &format, &[]), Some(16));
    }
}
