use std::{fs::File, io::BufWriter, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::info;

use gba_tilegfx::{
    common::PixelValue,
    edit,
    locate::TilesetCache,
    model::{DataModel, GraphicsResource, RawCodec},
    persist,
};

// Composites one tilemap out of an uncompressed image dump and writes it as
// a grayscale PNG. Compressed images must be expanded first; the engine's
// byte codec is supplied by the embedding tool.
#[derive(Parser, Debug)]
struct Args {
    /// Image file containing the uncompressed resources
    #[arg(long)]
    image: PathBuf,
    /// Resource manifest (JSON) describing the image
    #[arg(long)]
    manifest: PathBuf,
    /// Anchor name of the tilemap to export
    #[arg(long)]
    tilemap: String,
    /// Output PNG path
    #[arg(long)]
    out: PathBuf,
}

pub fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let manifest = persist::load_manifest(&args.manifest)?;
    let image = std::fs::read(&args.image)
        .with_context(|| format!("unable to read {}", args.image.display()))?;
    let model = persist::build_model(image, &manifest)?;

    let addr = model
        .resolve_anchor(&args.tilemap)
        .with_context(|| format!("no anchor named {}", args.tilemap))?;
    let Some(GraphicsResource::Tilemap(tilemap)) = model.resource_at(addr) else {
        bail!("{} is not a tilemap", args.tilemap);
    };

    let mut cache = TilesetCache::default();
    let pixels = edit::get_pixels(&model, &RawCodec, &tilemap, &mut cache)?;
    let width = tilemap.format.pixel_width();
    let height = tilemap.format.pixel_height();
    write_png(&args.out, &pixels, width, height)?;
    info!(
        "Exported {} ({}x{}) to {}",
        args.tilemap,
        width,
        height,
        args.out.display()
    );
    Ok(())
}

// Palette lookup belongs to the embedding editor; the export scales raw
// composited values into visible grays instead.
fn write_png(path: &PathBuf, pixels: &[PixelValue], width: usize, height: usize) -> Result<()> {
    let max = pixels.iter().copied().max().unwrap_or(0).max(1);
    let gray = pixels
        .iter()
        .map(|&p| (p as u32 * 255 / max as u32) as u8)
        .collect_vec();

    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width as u32, height as u32);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&gray)?;
    Ok(())
}
