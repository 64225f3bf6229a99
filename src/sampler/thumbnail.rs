use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

/// Downscale a frame to at most `max_width` (preserving aspect ratio),
/// encode it as JPEG and wrap it in a data URL.
pub fn encode_thumbnail(frame: &RgbImage, max_width: u32, quality: u8) -> Result<String> {
    let (width, height) = frame.dimensions();

    let scaled = if width > max_width {
        let scaled_height =
            ((max_width as u64 * height as u64) / width as u64).max(1) as u32;
        image::imageops::resize(
            frame,
            max_width,
            scaled_height,
            image::imageops::FilterType::Triangle,
        )
    } else {
        frame.clone()
    };

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(&scaled)
        .context("JPEG encoding failed")?;

    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn wide_frame_is_downscaled_preserving_aspect() {
        let frame = RgbImage::from_pixel(1920, 1080, image::Rgb([200, 100, 50]));
        let url = encode_thumbnail(&frame, 320, 70).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));

        let bytes = STANDARD
            .decode(url.trim_start_matches("data:image/jpeg;base64,"))
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 320);
        assert_eq!(decoded.height(), 180);
    }

    #[test]
    fn small_frame_is_kept_at_native_size() {
        let frame = RgbImage::from_pixel(160, 90, image::Rgb([0, 0, 0]));
        let url = encode_thumbnail(&frame, 320, 70).unwrap();
        let bytes = STANDARD
            .decode(url.trim_start_matches("data:image/jpeg;base64,"))
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (160, 90));
    }

    #[test]
    fn extreme_aspect_ratio_never_collapses_to_zero_height() {
        let frame = RgbImage::from_pixel(4000, 2, image::Rgb([0, 0, 0]));
        let url = encode_thumbnail(&frame, 320, 70).unwrap();
        assert!(url.len() > "data:image/jpeg;base64,".len());
    }
}
