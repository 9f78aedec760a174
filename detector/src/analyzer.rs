//! Single-image analysis shared by the image and video paths

use image::{DynamicImage, ImageReader, ImageResult};
use std::io::Cursor;

use crate::backend::ScoringBackend;
use crate::prediction::PredictionRecord;

/// Decode uploaded bytes in any supported format into an RGB image.
pub fn load_image_from_bytes(bytes: &[u8]) -> ImageResult<DynamicImage> {
    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;
    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// Score one image. Inference failures come back as a degraded record
/// instead of an error. No caching: every call runs the model.
pub fn analyze(image: &DynamicImage, backend: &dyn ScoringBackend) -> PredictionRecord {
    match backend.predict(image) {
        Ok(dist) => PredictionRecord::from_distribution(dist),
        Err(e) => {
            log::warn!(
                "Inference failed on {}x{} image: {}",
                image.width(),
                image.height(),
                e
            );
            PredictionRecord::degraded(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FixedBackend, PixelBackend, solid};
    use std::sync::atomic::Ordering;

    #[test]
    fn successful_prediction_is_normalized() {
        let backend = FixedBackend::new(0.25, 0.75);
        let record = analyze(&solid(100, 100, [200, 0, 0]), &backend);

        assert!(record.is_fake);
        assert_eq!(record.confidence, 0.75);
        assert!((0.0..=1.0).contains(&record.real_score));
        assert!((0.0..=1.0).contains(&record.fake_score));
        assert!(record.error.is_none());
    }

    #[test]
    fn failure_becomes_degraded_record() {
        let record = analyze(&solid(10, 10, [0, 0, 0]), &PixelBackend::new());
        assert!(record.is_degraded());
        assert_eq!(record.confidence, 0.0);
        assert!(!record.is_fake);
        assert!(record.error.unwrap().contains("black frame"));
    }

    #[test]
    fn every_call_runs_inference() {
        let backend = FixedBackend::new(0.5, 0.5);
        let image = solid(4, 4, [1, 2, 3]);
        analyze(&image, &backend);
        analyze(&image, &backend);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn decodes_encoded_png() {
        let mut buf = Cursor::new(Vec::new());
        solid(12, 7, [9, 8, 7])
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();

        let image = load_image_from_bytes(buf.get_ref()).unwrap();
        assert_eq!((image.width(), image.height()), (12, 7));
        assert_eq!(image.to_rgb8().get_pixel(0, 0).0, [9, 8, 7]);
    }

    #[test]
    fn garbage_bytes_do_not_decode() {
        assert!(load_image_from_bytes(b"definitely not an image").is_err());
    }
}
