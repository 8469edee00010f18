use super::mime::detect_image_format;
use crate::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

/// JPEG quality used when re-encoding non-JPEG input.
pub const JPEG_QUALITY: u8 = 100;

fn encode_jpeg_sync(image: DynamicImage) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(bytes)
}

/// Make sure image bytes are JPEG before they are uploaded under a `.jpeg` key.
///
/// JPEG input is passed through untouched. Other decodable formats are
/// re-encoded; anything else is rejected as invalid input.
pub async fn normalize_image(data: Vec<u8>) -> Result<Vec<u8>> {
    match detect_image_format(&data) {
        Some(ImageFormat::Jpeg) => return Ok(data),
        Some(_) => {}
        None => return Err(Error::InvalidInput("invalid image".to_string())),
    }

    tokio::task::spawn_blocking(move || {
        let decoded = image::load_from_memory(&data)
            .map_err(|e| Error::InvalidInput(format!("invalid image: {}", e)))?;
        tracing::debug!(
            "Re-encoding {}x{} image as JPEG",
            decoded.width(),
            decoded.height()
        );
        encode_jpeg_sync(decoded)
    })
    .await
    .map_err(|e| Error::Invariant(format!("Image encoding task join error: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_image(format: ImageFormat) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(10, 10, image::Rgba([255, 0, 0, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), format)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_png_is_reencoded_as_jpeg() {
        let png = create_test_image(ImageFormat::Png);

        let jpeg = normalize_image(png).await.unwrap();

        assert_eq!(detect_image_format(&jpeg), Some(ImageFormat::Jpeg));
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 10);
        assert_eq!(decoded.height(), 10);
    }

    #[tokio::test]
    async fn test_jpeg_passes_through() {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([0, 128, 255]));
        let mut jpeg = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();

        let normalized = normalize_image(jpeg.clone()).await.unwrap();
        assert_eq!(normalized, jpeg);
    }

    #[tokio::test]
    async fn test_garbage_is_invalid_input() {
        let err = normalize_image(b"definitely not an image".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_truncated_png_is_invalid_input() {
        let mut png = create_test_image(ImageFormat::Png);
        png.truncate(12);

        let err = normalize_image(png).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
