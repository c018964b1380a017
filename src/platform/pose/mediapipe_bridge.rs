// MediaPipe BlazePose integration bridge
// Abstracts over single-image pose landmark backends. The ONNX Runtime backend
// is compiled in with the `ml-onnx` feature.

use crate::models::image::DecodedImage;
use crate::models::pose::{BodyLandmark, Landmark, PoseConfig, PoseError, PoseOutcome, PoseResult};

/// Single-image pose landmark model.
///
/// One instance serves many sequential calls; `close` releases the model and
/// must be safe to call more than once. Instances are not shared between
/// threads, each owner gets its own.
pub trait PoseEstimator: Send {
    /// Run inference on one image. Visibility values are passed through
    /// untouched; thresholding is left to the caller.
    fn estimate(&mut self, image: &DecodedImage) -> PoseResult<PoseOutcome>;

    /// Human-readable backend description for logs
    fn model_info(&self) -> String;

    /// Release model resources
    fn close(&mut self) {}
}

/// Build `count` independent estimator instances from the configured backend
pub fn create_estimators(config: &PoseConfig, count: usize) -> PoseResult<Vec<Box<dyn PoseEstimator>>> {
    #[cfg(feature = "ml-onnx")]
    {
        (0..count)
            .map(|_| {
                onnx_backend::OnnxPoseEstimator::new(config)
                    .map(|estimator| Box::new(estimator) as Box<dyn PoseEstimator>)
            })
            .collect()
    }

    #[cfg(not(feature = "ml-onnx"))]
    {
        let _ = (config, count);
        Err(PoseError::NotSupported("ml-onnx"))
    }
}

// ==============================================================================
// Pre/post-processing shared by backends
// ==============================================================================

/// Values per landmark row in BlazePose output: x, y, z, visibility, presence
pub const VALUES_PER_LANDMARK: usize = 5;

/// Aspect-preserving fit of an image into the square model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub resized_width: u32,
    pub resized_height: u32,
    pub source_width: u32,
    pub source_height: u32,
}

impl Letterbox {
    pub fn fit(width: u32, height: u32, size: u32) -> Self {
        let longest = width.max(height).max(1);
        let scale = size as f32 / longest as f32;
        let resized_width = ((width as f32 * scale).round() as u32).clamp(1, size);
        let resized_height = ((height as f32 * scale).round() as u32).clamp(1, size);

        Self {
            scale,
            pad_x: (size - resized_width) / 2,
            pad_y: (size - resized_height) / 2,
            resized_width,
            resized_height,
            source_width: width.max(1),
            source_height: height.max(1),
        }
    }

    /// Map a point in model input pixels back to normalized source coordinates
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        let source_x = (x - self.pad_x as f32) / self.scale;
        let source_y = (y - self.pad_y as f32) / self.scale;
        (
            source_x / self.source_width as f32,
            source_y / self.source_height as f32,
        )
    }
}

fn sigmoid(logit: f32) -> f32 {
    1.0 / (1.0 + (-logit).exp())
}

/// Turn raw landmark rows into body landmarks in source image space.
/// Auxiliary rows past the 33 body points are ignored; a short tensor yields
/// fewer landmarks rather than an error.
pub fn decode_landmarks(raw: &[f32], letterbox: &Letterbox) -> Vec<Landmark> {
    raw.chunks_exact(VALUES_PER_LANDMARK)
        .take(BodyLandmark::COUNT)
        .map(|row| {
            let (x, y) = letterbox.to_source(row[0], row[1]);
            let z = row[2] / (letterbox.scale * letterbox.source_width as f32);
            Landmark::new(x, y, z, sigmoid(row[3]))
        })
        .collect()
}

// ==============================================================================
// ONNX Runtime Implementation (Pure Rust)
// ==============================================================================

#[cfg(feature = "ml-onnx")]
pub mod onnx_backend {
    use super::*;
    use image::imageops::{self, FilterType};
    use image::RgbImage;
    use ndarray::Array4;
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::Tensor;
    use std::time::Instant;

    /// BlazePose landmark model run on the whole letterboxed image.
    ///
    /// There is no person-detector crop stage in front of the landmark model,
    /// so small or off-centre subjects get lower presence and visibility
    /// scores than a detector-cropped pipeline would give them.
    pub struct OnnxPoseEstimator {
        session: Option<Session>,
        config: PoseConfig,
    }

    impl OnnxPoseEstimator {
        pub fn new(config: &PoseConfig) -> PoseResult<Self> {
            if !config.model_path.exists() {
                return Err(PoseError::ModelLoadFailed(format!(
                    "model file not found: {}",
                    config.model_path.display()
                )));
            }

            let session = load_session(config)
                .map_err(|e| PoseError::ModelLoadFailed(e.to_string()))?;

            tracing::debug!(
                model = %config.model_path.display(),
                complexity = ?config.model_complexity,
                "ONNX pose model loaded"
            );

            Ok(Self {
                session: Some(session),
                config: config.clone(),
            })
        }

        /// NHWC float tensor in [0, 1] with the image centred on black padding
        fn input_tensor(pixels: &RgbImage, letterbox: &Letterbox, size: u32) -> Array4<f32> {
            let resized = imageops::resize(
                pixels,
                letterbox.resized_width,
                letterbox.resized_height,
                FilterType::Triangle,
            );

            let size = size as usize;
            let mut input = Array4::<f32>::zeros((1, size, size, 3));
            for (x, y, pixel) in resized.enumerate_pixels() {
                let row = (y + letterbox.pad_y) as usize;
                let col = (x + letterbox.pad_x) as usize;
                for channel in 0..3 {
                    input[[0, row, col, channel]] = pixel[channel] as f32 / 255.0;
                }
            }
            input
        }
    }

    fn load_session(config: &PoseConfig) -> ort::Result<Session> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads)?
            .commit_from_file(&config.model_path)?;
        Ok(session)
    }

    fn inference_failed(err: ort::Error) -> PoseError {
        PoseError::InferenceFailed(err.to_string())
    }

    impl PoseEstimator for OnnxPoseEstimator {
        fn estimate(&mut self, image: &DecodedImage) -> PoseResult<PoseOutcome> {
            let start_time = Instant::now();
            let session = self
                .session
                .as_mut()
                .ok_or_else(|| PoseError::InferenceFailed("estimator already closed".to_string()))?;

            let size = self.config.input_size;
            let letterbox = Letterbox::fit(image.width(), image.height(), size);
            let input = Self::input_tensor(&image.pixels, &letterbox, size);
            let tensor = Tensor::from_array(input).map_err(inference_failed)?;

            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(inference_failed)?;

            let flag = outputs[self.config.pose_flag_output.as_str()]
                .try_extract_array::<f32>()
                .map_err(inference_failed)?;
            let presence = flag.iter().next().copied().unwrap_or(0.0);

            if presence < self.config.min_detection_confidence {
                tracing::debug!(url = %image.url, presence, "no pose above detection floor");
                return Ok(PoseOutcome::NoPoseFound);
            }

            let raw = outputs[self.config.landmarks_output.as_str()]
                .try_extract_array::<f32>()
                .map_err(inference_failed)?;
            let values: Vec<f32> = raw.iter().copied().collect();
            let landmarks = decode_landmarks(&values, &letterbox);

            tracing::debug!(
                url = %image.url,
                presence,
                landmarks = landmarks.len(),
                elapsed_ms = start_time.elapsed().as_millis() as u64,
                "pose inference done"
            );

            Ok(PoseOutcome::Landmarks(landmarks))
        }

        fn model_info(&self) -> String {
            format!(
                "ONNX Runtime BlazePose ({:?}) from {}",
                self.config.model_complexity,
                self.config.model_path.display()
            )
        }

        fn close(&mut self) {
            // Dropping the session frees the runtime allocations
            self.session.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letterbox_portrait() {
        let letterbox = Letterbox::fit(100, 200, 256);
        assert_eq!(letterbox.resized_height, 256);
        assert_eq!(letterbox.resized_width, 128);
        assert_eq!((letterbox.pad_x, letterbox.pad_y), (64, 0));

        let (x, y) = letterbox.to_source(64.0, 0.0);
        assert!(x.abs() < 1e-6 && y.abs() < 1e-6);
        let (x, y) = letterbox.to_source(192.0, 256.0);
        assert!((x - 1.0).abs() < 1e-6 && (y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_letterbox_degenerate_size() {
        let letterbox = Letterbox::fit(0, 0, 256);
        assert!(letterbox.resized_width >= 1);
        assert!(letterbox.resized_height >= 1);
    }

    #[test]
    fn test_decode_landmarks() {
        let letterbox = Letterbox::fit(256, 256, 256);
        let mut raw = vec![0.0f32; 39 * VALUES_PER_LANDMARK];
        // Left shoulder at the centre, strongly visible
        let row = BodyLandmark::LeftShoulder.index() * VALUES_PER_LANDMARK;
        raw[row] = 128.0;
        raw[row + 1] = 128.0;
        raw[row + 3] = 10.0;

        let landmarks = decode_landmarks(&raw, &letterbox);
        assert_eq!(landmarks.len(), BodyLandmark::COUNT);

        let shoulder = landmarks[BodyLandmark::LeftShoulder.index()];
        assert!((shoulder.x - 0.5).abs() < 1e-6);
        assert!(shoulder.visibility > 0.99);
        // Logit 0 maps to an even chance
        assert!((landmarks[0].visibility - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_short_tensor() {
        let letterbox = Letterbox::fit(10, 10, 256);
        let raw = vec![0.0f32; 12 * VALUES_PER_LANDMARK + 3];
        assert_eq!(decode_landmarks(&raw, &letterbox).len(), 12);
    }

    #[cfg(not(feature = "ml-onnx"))]
    #[test]
    fn test_no_backend_without_feature() {
        let result = create_estimators(&PoseConfig::default(), 1);
        assert!(matches!(result, Err(PoseError::NotSupported("ml-onnx"))));
    }
}
