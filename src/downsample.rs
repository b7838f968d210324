use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{GenericImageView, ImageReader};

/// Width of every scaled image, in pixels.
pub const TARGET_WIDTH: u32 = 1024;
const SCALED_SUFFIX: &str = "_scaled";
const SCALED_EXTENSION: &str = "jpeg";
const JPEG_QUALITY: u8 = 75;
/// Tallest scaled image we will allocate; anything beyond is a bad image.
pub const MAX_SCALED_HEIGHT: u32 = u16::MAX as u32 * 16;

/// Height that keeps the aspect ratio of a `width` x `height` source at
/// `TARGET_WIDTH` pixels wide. Never less than one pixel.
pub fn scaled_height(width: u32, height: u32) -> u32 {
    let h = (TARGET_WIDTH as f64 * height as f64 / width as f64).round();
    (h as u32).max(1)
}

/// `IMG_0001.jpg` -> `IMG_0001_scaled.jpeg`. The base name ends at the first dot.
pub fn scaled_file_name(source: &Path) -> String {
    let name = source
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image");
    let base = name.split('.').next().unwrap_or(name);
    format!("{}{}.{}", base, SCALED_SUFFIX, SCALED_EXTENSION)
}

pub fn scaled_path(source: &Path, output_dir: &Path) -> PathBuf {
    output_dir.join(scaled_file_name(source))
}

/// Decode `source`, resample it to `TARGET_WIDTH` wide and write it into
/// `output_dir`. Returns the written path and its dimensions.
pub fn downsample(source: &Path, output_dir: &Path) -> anyhow::Result<(PathBuf, u32, u32)> {
    let img = ImageReader::open(source)?
        .with_guessed_format()?
        .decode()?;

    let (width, height) = img.dimensions();
    anyhow::ensure!(width > 0 && height > 0, "image has no pixels");

    let new_height = scaled_height(width, height);
    anyhow::ensure!(
        new_height <= MAX_SCALED_HEIGHT,
        "{}x{} image would scale to {}x{} (height limit {})",
        width,
        height,
        TARGET_WIDTH,
        new_height,
        MAX_SCALED_HEIGHT
    );
    let scaled = img.resize_exact(TARGET_WIDTH, new_height, FilterType::Lanczos3);
    drop(img);

    let dest = scaled_path(source, output_dir);
    let mut out = BufWriter::new(File::create(&dest).with_context(|| dest.display().to_string())?);
    scaled
        .to_rgb8()
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))
        .with_context(|| dest.display().to_string())?;
    out.flush().with_context(|| dest.display().to_string())?;

    Ok((dest, TARGET_WIDTH, new_height))
}
