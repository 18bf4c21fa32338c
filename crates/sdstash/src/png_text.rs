//! PNG text chunks.
//!
//! Generation parameters travel with the image inside a PNG text chunk under the
//! keyword `parameters`, the same place WebUI puts them. Three chunk kinds can carry
//! text:
//!
//! | Chunk  | Encoding                         |
//! |--------|----------------------------------|
//! | `tEXt` | Latin-1, uncompressed            |
//! | `zTXt` | Latin-1, zlib                    |
//! | `iTXt` | UTF-8, optionally zlib           |
//!
//! Reading accepts all three, before or after the image data. Writing emits `tEXt`
//! when the text fits Latin-1 and `iTXt` otherwise.

use std::borrow::Cow;
use std::io::Cursor;

use image::DynamicImage;
use png::{BitDepth, ColorType, Decoder, Encoder};

use crate::error::{Result, StashError};

fn malformed(e: png::DecodingError) -> StashError {
    StashError::MalformedPng(e.to_string())
}

fn encoding(e: png::EncodingError) -> StashError {
    StashError::PngEncoding(e.to_string())
}

/// Returns the first text value stored under `keyword`, if any.
pub fn read_text(png: &[u8], keyword: &str) -> Result<Option<String>> {
    let mut reader = Decoder::new(Cursor::new(png)).read_info().map_err(malformed)?;
    // text chunks after IDAT only show up once the stream is read to IEND
    reader.finish().map_err(malformed)?;
    let info = reader.info();

    if let Some(chunk) = info
        .uncompressed_latin1_text
        .iter()
        .find(|c| c.keyword == keyword)
    {
        return Ok(Some(chunk.text.clone()));
    }
    if let Some(chunk) = info
        .compressed_latin1_text
        .iter()
        .find(|c| c.keyword == keyword)
    {
        return chunk.get_text().map(Some).map_err(malformed);
    }
    match info.utf8_text.iter().find(|c| c.keyword == keyword) {
        Some(chunk) => chunk.get_text().map(Some).map_err(malformed),
        None => Ok(None),
    }
}

/// 8-bit layouts go out as-is; everything else is widened or narrowed to RGBA8.
fn raw_pixels(pixels: &DynamicImage) -> (ColorType, Cow<'_, [u8]>) {
    let (color, raw) = match pixels {
        DynamicImage::ImageLuma8(img) => (ColorType::Grayscale, img.as_raw()),
        DynamicImage::ImageLumaA8(img) => (ColorType::GrayscaleAlpha, img.as_raw()),
        DynamicImage::ImageRgb8(img) => (ColorType::Rgb, img.as_raw()),
        DynamicImage::ImageRgba8(img) => (ColorType::Rgba, img.as_raw()),
        other => return (ColorType::Rgba, Cow::Owned(other.to_rgba8().into_raw())),
    };
    (color, Cow::Borrowed(raw.as_slice()))
}

/// Encodes `pixels` as PNG with an optional text chunk under `keyword`.
pub fn encode(pixels: &DynamicImage, keyword: &str, text: Option<&str>) -> Result<Vec<u8>> {
    let (color, data) = raw_pixels(pixels);
    let mut buf = Vec::new();
    {
        let mut encoder = Encoder::new(&mut buf, pixels.width(), pixels.height());
        encoder.set_color(color);
        encoder.set_depth(BitDepth::Eight);
        if let Some(text) = text {
            let added = if text.chars().all(|c| (c as u32) <= 0xFF) {
                encoder.add_text_chunk(keyword.to_string(), text.to_string())
            } else {
                encoder.add_itxt_chunk(keyword.to_string(), text.to_string())
            };
            added.map_err(encoding)?;
        }
        let mut writer = encoder.write_header().map_err(encoding)?;
        writer.write_image_data(&data).map_err(encoding)?;
        writer.finish().map_err(encoding)?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat};

    fn blank() -> DynamicImage {
        DynamicImage::new_rgb8(3, 2)
    }

    fn text_chunk_kinds(png: &[u8]) -> (usize, usize, usize) {
        let mut reader = Decoder::new(Cursor::new(png)).read_info().unwrap();
        reader.finish().unwrap();
        let info = reader.info();
        (
            info.uncompressed_latin1_text.len(),
            info.compressed_latin1_text.len(),
            info.utf8_text.len(),
        )
    }

    #[test]
    fn test_encode_and_read_latin1_text() {
        let png = encode(&blank(), "parameters", Some("1girl, solo\nSteps: 20")).unwrap();
        assert_eq!(text_chunk_kinds(&png), (1, 0, 0));
        let text = read_text(&png, "parameters").unwrap();
        assert_eq!(text.as_deref(), Some("1girl, solo\nSteps: 20"));
    }

    #[test]
    fn test_unicode_text_uses_itxt() {
        let png = encode(&blank(), "parameters", Some("猫耳, café")).unwrap();
        assert_eq!(text_chunk_kinds(&png), (0, 0, 1));
        assert_eq!(
            read_text(&png, "parameters").unwrap().as_deref(),
            Some("猫耳, café")
        );
    }

    #[test]
    fn test_image_decodes_with_text() {
        let png = encode(&blank(), "parameters", Some("prompt")).unwrap();
        let img = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
    }

    #[test]
    fn test_pixels_survive_encoding() {
        let mut rgba = image::RgbaImage::new(2, 2);
        rgba.put_pixel(1, 0, image::Rgba([10, 20, 30, 40]));
        let png = encode(&DynamicImage::ImageRgba8(rgba.clone()), "parameters", None).unwrap();
        let back = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert_eq!(back.to_rgba8(), rgba);
    }

    #[test]
    fn test_wide_formats_fall_back_to_rgba8() {
        let png = encode(&DynamicImage::new_rgb16(4, 1), "parameters", Some("x")).unwrap();
        let back = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert_eq!(back.color(), image::ColorType::Rgba8);
        assert_eq!(back.dimensions(), (4, 1));
    }

    #[test]
    fn test_reads_ztxt_chunk() {
        let mut buf = Vec::new();
        {
            let mut encoder = Encoder::new(&mut buf, 1, 1);
            encoder.set_color(ColorType::Grayscale);
            encoder.set_depth(BitDepth::Eight);
            encoder
                .add_ztxt_chunk("parameters".to_string(), "compressed prompt".to_string())
                .unwrap();
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[0]).unwrap();
            writer.finish().unwrap();
        }
        assert_eq!(text_chunk_kinds(&buf), (0, 1, 0));
        assert_eq!(
            read_text(&buf, "parameters").unwrap().as_deref(),
            Some("compressed prompt")
        );
    }

    #[test]
    fn test_missing_keyword_returns_none() {
        let png = encode(&blank(), "Software", Some("sdstash")).unwrap();
        assert_eq!(read_text(&png, "parameters").unwrap(), None);
        let plain = encode(&blank(), "parameters", None).unwrap();
        assert_eq!(read_text(&plain, "parameters").unwrap(), None);
    }

    #[test]
    fn test_rejects_non_png() {
        assert!(matches!(
            read_text(b"GIF89a......", "parameters"),
            Err(StashError::MalformedPng(_))
        ));
        assert!(read_text(b"", "parameters").is_err());
    }

    #[test]
    fn test_rejects_truncated_png() {
        let png = encode(&blank(), "parameters", Some("x")).unwrap();
        assert!(read_text(&png[..png.len() - 6], "parameters").is_err());
    }

    #[test]
    fn test_zero_sized_image_fails_to_encode() {
        let err = encode(&DynamicImage::new_rgb8(0, 0), "parameters", None).unwrap_err();
        assert!(matches!(err, StashError::PngEncoding(_)));
    }
}
