use anyhow::{ensure, Result};
use hashbrown::HashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::common::Addr;
use crate::format::{TilemapFormat, TilesetFormat};

// The compressed byte stream is opaque to this crate: the codec is supplied
// by the embedding tool and only needs to be lossless.
pub trait StreamCodec {
    fn compress(&self, raw: &[u8]) -> Vec<u8>;
    fn decompress(&self, stored: &[u8]) -> Result<Vec<u8>>;
}

// Identity codec for images whose resources are stored uncompressed, such as
// pre-expanded dumps. Real LZ codecs plug in from the embedding tool.
pub struct RawCodec;

impl StreamCodec for RawCodec {
    fn compress(&self, raw: &[u8]) -> Vec<u8> {
        raw.to_vec()
    }

    fn decompress(&self, stored: &[u8]) -> Result<Vec<u8>> {
        Ok(stored.to_vec())
    }
}

// Opaque handle for one edit operation. The journal that interprets it lives
// in the embedding tool; the model only requires that all writes belonging
// to one edit share a token.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChangeToken(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilesetInfo {
    pub start: Addr,
    pub byte_len: usize, // stored (compressed) footprint
    pub format: TilesetFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilemapInfo {
    pub start: Addr,
    pub byte_len: usize,
    pub format: TilemapFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteInfo {
    pub start: Addr,
    pub byte_len: usize,
    pub bits_per_pixel: u8,
    pub tile_width: u32,
    pub tile_height: u32,
}

// Every graphics-bearing resource the model can hand out. Distinguished by
// pattern matching; `pixel_query` is the capability they all share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsResource {
    Tileset(TilesetInfo),
    Tilemap(TilemapInfo),
    PlainSprite(SpriteInfo),
}

pub struct PixelQuery {
    pub bits_per_pixel: u8,
    // None for tilesets, whose tile count is only known once decompressed.
    pub tile_dims: Option<(u32, u32)>,
}

impl GraphicsResource {
    pub fn start(&self) -> Addr {
        match self {
            GraphicsResource::Tileset(t) => t.start,
            GraphicsResource::Tilemap(m) => m.start,
            GraphicsResource::PlainSprite(s) => s.start,
        }
    }

    pub fn pixel_query(&self) -> PixelQuery {
        match self {
            GraphicsResource::Tileset(t) => PixelQuery {
                bits_per_pixel: t.format.bits_per_pixel,
                tile_dims: None,
            },
            GraphicsResource::Tilemap(m) => PixelQuery {
                bits_per_pixel: m.format.bits_per_pixel,
                tile_dims: Some((m.format.tile_width, m.format.tile_height)),
            },
            GraphicsResource::PlainSprite(s) => PixelQuery {
                bits_per_pixel: s.bits_per_pixel,
                tile_dims: Some((s.tile_width, s.tile_height)),
            },
        }
    }
}

// Pointer-typed (and plain) field segments of one table row, with the
// declared format tag of what the pointer leads to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSegment {
    pub name: String,
    pub byte_len: usize,
    pub pointer: bool,
    #[serde(default)]
    pub inner_format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub start: Addr,
    pub element_len: usize,
    pub element_count: usize,
    pub segments: Vec<TableSegment>,
}

impl TableSchema {
    pub fn end(&self) -> Addr {
        self.start + self.element_len * self.element_count
    }
}

// The addressable binary data model this engine edits through. Pointer
// resolution, anchor naming, and relocation all belong to the embedding
// tool; this is the slice of it the tile engine needs.
pub trait DataModel {
    fn resolve_anchor(&self, name: &str) -> Option<Addr>;
    fn resource_at(&self, addr: Addr) -> Option<GraphicsResource>;
    fn resources(&self) -> Vec<(Addr, GraphicsResource)>;
    // The table whose rows span `addr`, if any.
    fn table_containing(&self, addr: Addr) -> Option<TableSchema>;
    // Addresses of pointers into the resource at `addr`.
    fn referrers(&self, addr: Addr) -> &[Addr];
    fn read(&self, addr: Addr, len: usize) -> Result<&[u8]>;
    fn read_pointer(&self, addr: Addr) -> Result<Addr>;
    fn write(&mut self, token: ChangeToken, addr: Addr, bytes: &[u8]) -> Result<()>;
    // Moves the resource at `start` somewhere its grown footprint fits,
    // repointing referrers, and returns the new start.
    fn relocate(&mut self, token: ChangeToken, start: Addr, new_len: usize) -> Result<Addr>;
    // Records that a freshly written resource now lives at `addr`, replacing
    // whatever was known about its old location.
    fn observe_resource(&mut self, token: ChangeToken, old: Addr, resource: GraphicsResource);
}

// In-memory model over a flat byte image: enough for tests and for tools
// that work on pre-expanded dumps. Pointers are stored as 4-byte
// little-endian offsets into the image.
#[derive(Default)]
pub struct MemoryModel {
    pub data: Vec<u8>,
    anchors: HashMap<String, Addr>,
    resources: HashMap<Addr, GraphicsResource>,
    tables: Vec<TableSchema>,
    referrers: HashMap<Addr, Vec<Addr>>,
}

impl MemoryModel {
    pub fn new(data: Vec<u8>) -> Self {
        MemoryModel {
            data,
            ..Default::default()
        }
    }

    pub fn add_anchor(&mut self, name: &str, addr: Addr) {
        self.anchors.insert(name.to_string(), addr);
    }

    pub fn add_resource(&mut self, addr: Addr, resource: GraphicsResource) {
        self.resources.insert(addr, resource);
    }

    pub fn add_table(&mut self, table: TableSchema) {
        self.tables.push(table);
    }

    pub fn add_referrer(&mut self, target: Addr, source: Addr) {
        self.referrers.entry(target).or_default().push(source);
    }
}

impl DataModel for MemoryModel {
    fn resolve_anchor(&self, name: &str) -> Option<Addr> {
        self.anchors.get(name).copied()
    }

    fn resource_at(&self, addr: Addr) -> Option<GraphicsResource> {
        self.resources.get(&addr).cloned()
    }

    fn resources(&self) -> Vec<(Addr, GraphicsResource)> {
        self.resources
            .iter()
            .map(|(&addr, resource)| (addr, resource.clone()))
            .sorted_by_key(|&(addr, _)| addr)
            .collect()
    }

    fn table_containing(&self, addr: Addr) -> Option<TableSchema> {
        self.tables
            .iter()
            .find(|t| addr >= t.start && addr < t.end())
            .cloned()
    }

    fn referrers(&self, addr: Addr) -> &[Addr] {
        self.referrers.get(&addr).map(Vec::as_slice).unwrap_or(&[])
    }

    fn read(&self, addr: Addr, len: usize) -> Result<&[u8]> {
        ensure!(addr + len <= self.data.len(), "read out of bounds");
        Ok(&self.data[addr..addr + len])
    }

    fn read_pointer(&self, addr: Addr) -> Result<Addr> {
        let bytes = self.read(addr, 4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()) as Addr)
    }

    fn write(&mut self, _token: ChangeToken, addr: Addr, bytes: &[u8]) -> Result<()> {
        ensure!(addr + bytes.len() <= self.data.len(), "write out of bounds");
        self.data[addr..addr + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn relocate(&mut self, token: ChangeToken, start: Addr, new_len: usize) -> Result<Addr> {
        let new_start = self.data.len();
        self.data.resize(new_start + new_len, 0xFF);

        // Repoint every referrer at the new location.
        if let Some(sources) = self.referrers.remove(&start) {
            for &source in &sources {
                self.write(token, source, &(new_start as u32).to_le_bytes())?;
            }
            self.referrers.insert(new_start, sources);
        }
        let moved_anchor = self
            .anchors
            .iter()
            .find(|(_, &addr)| addr == start)
            .map(|(name, _)| name.clone());
        if let Some(name) = moved_anchor {
            self.anchors.insert(name, new_start);
        }
        self.resources.remove(&start);
        Ok(new_start)
    }

    fn observe_resource(&mut self, _token: ChangeToken, old: Addr, resource: GraphicsResource) {
        self.resources.remove(&old);
        self.resources.insert(resource.start(), resource);
    }
}
