use std::{fs, path::Path};

use anyhow::{bail, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::common::Addr;
use crate::format::{TilemapFormat, TilesetFormat};
use crate::model::{
    GraphicsResource, MemoryModel, TableSchema, TableSegment, TilemapInfo, TilesetInfo,
};

// JSON description of the resources inside a flat image dump: which anchors
// exist, what format tag each carries, and where pointers into them live.
// This stands in for the full data model's own bookkeeping when working on
// pre-expanded images.
#[derive(Serialize, Deserialize)]
pub struct Manifest {
    pub resources: Vec<ResourceEntry>,
    #[serde(default)]
    pub tables: Vec<TableEntry>,
}

#[derive(Serialize, Deserialize)]
pub struct ResourceEntry {
    pub name: String,
    pub addr: Addr,
    pub len: usize,
    pub format: String,
    #[serde(default)]
    pub sources: Vec<Addr>,
}

#[derive(Serialize, Deserialize)]
pub struct TableEntry {
    pub addr: Addr,
    pub element_len: usize,
    pub element_count: usize,
    pub segments: Vec<TableSegment>,
}

pub fn load_manifest(path: &Path) -> Result<Manifest> {
    info!("Loading {}", path.display());
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

pub fn save_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    info!("Saving {}", path.display());
    fs::write(path, serde_json::to_vec_pretty(manifest)?)?;
    Ok(())
}

pub fn build_model(image: Vec<u8>, manifest: &Manifest) -> Result<MemoryModel> {
    let mut model = MemoryModel::new(image);
    for entry in &manifest.resources {
        let resource = if let Some(format) = TilemapFormat::parse(&entry.format) {
            GraphicsResource::Tilemap(TilemapInfo {
                start: entry.addr,
                byte_len: entry.len,
                format,
            })
        } else if let Some(format) = TilesetFormat::parse(&entry.format) {
            GraphicsResource::Tileset(TilesetInfo {
                start: entry.addr,
                byte_len: entry.len,
                format,
            })
        } else {
            bail!("{}: unrecognized format tag {}", entry.name, entry.format);
        };
        model.add_anchor(&entry.name, entry.addr);
        model.add_resource(entry.addr, resource);
        for &source in &entry.sources {
            model.add_referrer(entry.addr, source);
        }
    }
    for table in &manifest.tables {
        model.add_table(TableSchema {
            start: table.addr,
            element_len: table.element_len,
            element_count: table.element_count,
            segments: table.segments.clone(),
        });
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataModel;

    #[test]
    fn manifest_builds_a_model() {
        let manifest: Manifest = serde_json::from_str(
            r#"{
                "resources": [
                    {"name": "maps.title", "addr": 0, "len": 8,
                     "format": "`lzm4x2x2|graphics.title`", "sources": [40]},
                    {"name": "graphics.title", "addr": 64, "len": 32,
                     "format": "`lzt4`"}
                ]
            }"#,
        )
        .unwrap();
        let model = build_model(vec![0; 96], &manifest).unwrap();
        assert_eq!(model.resolve_anchor("maps.title"), Some(0));
        assert!(matches!(
            model.resource_at(0),
            Some(GraphicsResource::Tilemap(_))
        ));
        assert!(matches!(
            model.resource_at(64),
            Some(GraphicsResource::Tileset(_))
        ));
        assert_eq!(model.referrers(0), &[40]);
    }

    #[test]
    fn unknown_format_tags_are_rejected() {
        let manifest = Manifest {
            resources: vec![ResourceEntry {
                name: "bad".to_string(),
                addr: 0,
                len: 4,
                format: "`asc`".to_string(),
                sources: vec![],
            }],
            tables: vec![],
        };
        assert!(build_model(vec![0; 16], &manifest).is_err());
    }
}
