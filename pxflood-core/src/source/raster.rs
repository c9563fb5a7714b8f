//! Image files as color sources.
//!
//! Decoders are looked up by file extension in a [`DecoderRegistry`].
//! The default registry knows PNG, BMP, WebP and JPEG; more formats can be
//! added with [`DecoderRegistry::register`] without touching the lookup.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use image::{ImageFormat, RgbaImage};

use crate::error::DecodeError;
use crate::source::ColorSource;
use crate::types::{Rgb, Sample};

// ── PixelDecoder ─────────────────────────────────────────────────

/// Turns the raw bytes of an image file into RGBA pixels.
pub trait PixelDecoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<RgbaImage, DecodeError>;
}

/// Decoder backed by one of the `image` crate's built-in formats.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinDecoder(pub ImageFormat);

impl PixelDecoder for BuiltinDecoder {
    fn decode(&self, data: &[u8]) -> Result<RgbaImage, DecodeError> {
        let img = image::load_from_memory_with_format(data, self.0)?;
        Ok(img.to_rgba8())
    }
}

// ── DecoderRegistry ──────────────────────────────────────────────

/// Extension → decoder table. Extensions are matched case-insensitively.
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn PixelDecoder>>,
}

impl DecoderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registry with `png`, `bmp`, `webp`, `jpg` and `jpeg`.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register("png", BuiltinDecoder(ImageFormat::Png));
        reg.register("bmp", BuiltinDecoder(ImageFormat::Bmp));
        reg.register("webp", BuiltinDecoder(ImageFormat::WebP));
        reg.register("jpg", BuiltinDecoder(ImageFormat::Jpeg));
        reg.register("jpeg", BuiltinDecoder(ImageFormat::Jpeg));
        reg
    }

    /// Add or replace the decoder for `extension`.
    pub fn register(&mut self, extension: &str, decoder: impl PixelDecoder + 'static) {
        self.decoders
            .insert(extension.to_ascii_lowercase(), Arc::new(decoder));
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }

    /// The decoder responsible for `path`, chosen by its extension.
    pub fn decoder_for(&self, path: &Path) -> Result<&dyn PixelDecoder, DecodeError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        self.decoders
            .get(&ext)
            .map(|d| d.as_ref())
            .ok_or(DecodeError::UnsupportedFormat(ext))
    }

    /// Decode in-memory file contents; `path` only selects the decoder.
    pub fn decode(&self, path: &Path, data: &[u8]) -> Result<RgbaImage, DecodeError> {
        self.decoder_for(path)?.decode(data)
    }

    /// Read and decode `path`, then wrap it as a source placed at
    /// `(offset_x, offset_y)` on the canvas.
    ///
    /// The extension is checked before the file is read, so an
    /// unsupported format fails without touching the filesystem.
    pub fn open(
        &self,
        path: &Path,
        offset_x: i64,
        offset_y: i64,
    ) -> Result<ImageSource, DecodeError> {
        let decoder = self.decoder_for(path)?;
        let data = std::fs::read(path).map_err(|source| DecodeError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let image = decoder.decode(&data)?;
        tracing::info!(
            "decoded {} ({}x{}) at offset {offset_x},{offset_y}",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(ImageSource::new(image, offset_x, offset_y))
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

// ── ImageSource ──────────────────────────────────────────────────

/// A decoded image positioned on the canvas.
///
/// Canvas `(x, y)` maps to image pixel `(x - offset_x, y - offset_y)`.
/// Pixels outside the image are invisible; inside, a pixel is visible
/// unless its alpha is zero.
#[derive(Debug, Clone)]
pub struct ImageSource {
    image: RgbaImage,
    offset_x: i64,
    offset_y: i64,
}

impl ImageSource {
    pub fn new(image: RgbaImage, offset_x: i64, offset_y: i64) -> Self {
        Self {
            image,
            offset_x,
            offset_y,
        }
    }

    /// Image dimensions in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

impl ColorSource for ImageSource {
    fn sample(&self, x: u32, y: u32) -> Sample {
        let ix = x as i64 - self.offset_x;
        let iy = y as i64 - self.offset_y;
        if ix < 0 || iy < 0 || ix >= self.image.width() as i64 || iy >= self.image.height() as i64
        {
            return Sample::hidden();
        }

        let [r, g, b, a] = self.image.get_pixel(ix as u32, iy as u32).0;
        Sample {
            color: Rgb::new(r, g, b),
            visible: a != 0,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgba};
    use std::io::Cursor;

    /// 2×2 image: opaque red, opaque green / transparent blue, opaque white.
    fn sample_image() -> RgbaImage {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        img.put_pixel(0, 1, Rgba([0, 0, 255, 0]));
        img.put_pixel(1, 1, Rgba([255, 255, 255, 128]));
        img
    }

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img.clone())
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn offsets_and_alpha() {
        let src = ImageSource::new(sample_image(), 10, 20);

        assert!(!src.sample(9, 20).visible);
        assert!(!src.sample(10, 19).visible);
        assert!(!src.sample(12, 20).visible);

        assert_eq!(src.sample(10, 20), Sample::visible(Rgb::new(255, 0, 0)));
        assert_eq!(src.sample(11, 20), Sample::visible(Rgb::new(0, 255, 0)));
        assert!(!src.sample(10, 21).visible);
        assert_eq!(src.sample(11, 21), Sample::visible(Rgb::new(255, 255, 255)));
    }

    #[test]
    fn negative_offsets_crop_the_image() {
        let src = ImageSource::new(sample_image(), -1, 0);
        assert_eq!(src.sample(0, 0).color, Rgb::new(0, 255, 0));
        assert!(!src.sample(1, 0).visible);
    }

    #[test]
    fn registry_selects_by_extension_case_insensitively() {
        let reg = DecoderRegistry::with_defaults();
        assert_eq!(reg.extensions(), vec!["bmp", "jpeg", "jpg", "png", "webp"]);

        let data = png_bytes(&sample_image());
        let img = reg.decode(Path::new("picture.PNG"), &data).unwrap();
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(1, 0).0, [0, 255, 0, 255]);
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let reg = DecoderRegistry::with_defaults();
        let err = reg.decode(Path::new("anim.gif"), b"GIF89a").unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat(ref e) if e == "gif"));

        let err = reg.open(Path::new("no_extension"), 0, 0).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat(_)));
    }

    #[test]
    fn corrupt_data_is_a_decode_error() {
        let reg = DecoderRegistry::with_defaults();
        let err = reg.decode(Path::new("broken.png"), b"not a png").unwrap_err();
        assert!(matches!(err, DecodeError::Corrupt(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let reg = DecoderRegistry::with_defaults();
        let err = reg
            .open(Path::new("/nonexistent/pxflood/missing.png"), 0, 0)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Io { .. }));
    }

    #[test]
    fn open_reads_from_disk() {
        let path = std::env::temp_dir().join(format!("pxflood-{}.png", std::process::id()));
        std::fs::write(&path, png_bytes(&sample_image())).unwrap();

        let src = DecoderRegistry::with_defaults().open(&path, 0, 0).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(src.dimensions(), (2, 2));
        assert_eq!(src.sample(0, 0), Sample::visible(Rgb::new(255, 0, 0)));
    }

    #[test]
    fn custom_decoder_registration() {
        struct Solid;
        impl PixelDecoder for Solid {
            fn decode(&self, _data: &[u8]) -> Result<RgbaImage, DecodeError> {
                Ok(RgbaImage::from_pixel(3, 1, Rgba([1, 2, 3, 255])))
            }
        }

        let mut reg = DecoderRegistry::new();
        reg.register("RAW", Solid);
        let img = reg.decode(Path::new("x.raw"), &[]).unwrap();
        assert_eq!(img.dimensions(), (3, 1));
    }
}
