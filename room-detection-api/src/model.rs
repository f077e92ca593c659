//! Mask R-CNN inference through ONNX Runtime.
//!
//! The HTTP layer only sees the [`SegmentationModel`] trait, so any backend
//! producing [`Detection`]s can be plugged in.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use image::{ImageBuffer, RgbImage};
use ndarray::Array3;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::TensorRef;
use room_postprocess::{BoundingBox, Detection};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::DevicePreference;

/// Output positions in a torchvision Mask R-CNN export
const BOXES_OUTPUT: usize = 0;
const SCORES_OUTPUT: usize = 2;
const MASKS_OUTPUT: usize = 3;

/// Compute device the model runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instance segmentation backend
pub trait SegmentationModel: Send + Sync {
    /// Run a forward pass and return every candidate region, unfiltered
    fn predict(&self, image: &RgbImage) -> Result<Vec<Detection>>;

    fn device(&self) -> Device;

    /// Human-readable model description for logs
    fn model_info(&self) -> String;
}

#[cfg(feature = "cuda")]
fn cuda_available() -> bool {
    use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};

    CUDAExecutionProvider::default().is_available().unwrap_or(false)
}

#[cfg(not(feature = "cuda"))]
fn cuda_available() -> bool {
    false
}

/// Resolve the requested device against what this build and machine support
pub fn select_device(preference: DevicePreference) -> Device {
    match preference {
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Auto => {
            if cuda_available() {
                Device::Cuda
            } else {
                Device::Cpu
            }
        }
        DevicePreference::Cuda => {
            if cuda_available() {
                Device::Cuda
            } else {
                warn!("CUDA requested but not available in this build or on this machine, falling back to CPU");
                Device::Cpu
            }
        }
    }
}

#[cfg(feature = "cuda")]
fn register_device(builder: SessionBuilder, device: Device) -> Result<SessionBuilder> {
    use ort::execution_providers::CUDAExecutionProvider;

    match device {
        Device::Cuda => Ok(builder.with_execution_providers([CUDAExecutionProvider::default().build()])?),
        Device::Cpu => Ok(builder),
    }
}

#[cfg(not(feature = "cuda"))]
fn register_device(builder: SessionBuilder, _device: Device) -> Result<SessionBuilder> {
    Ok(builder)
}

/// Convert an RGB image into a `[3, H, W]` float tensor scaled to 0..1
pub fn image_to_tensor(image: &RgbImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    Array3::from_shape_fn((3, height as usize, width as usize), |(c, y, x)| {
        image.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
}

/// Turn flat Mask R-CNN output buffers into detections.
///
/// `boxes` is `[N, 4]` in pixel space, `scores` is `[N]` and `masks` is
/// `[N, 1, H, W]` with `mask_dims` giving its shape.
pub fn decode_outputs(
    boxes: &[f32],
    scores: &[f32],
    masks: &[f32],
    mask_dims: &[i64],
    width: u32,
    height: u32,
) -> Result<Vec<Detection>> {
    let count = scores.len();

    if boxes.len() != count * 4 {
        bail!(
            "Expected {} box coordinates for {} detections, got {}",
            count * 4,
            count,
            boxes.len()
        );
    }

    if count == 0 {
        return Ok(Vec::new());
    }

    let [n, _, mask_h, mask_w] = mask_dims else {
        bail!("Expected 4-dimensional mask output, got shape {:?}", mask_dims);
    };
    if *n as usize != count || *mask_h as u32 != height || *mask_w as u32 != width {
        bail!(
            "Mask output shape {:?} does not match {} detections on a {}x{} image",
            mask_dims,
            count,
            width,
            height
        );
    }

    let plane = (width as usize) * (height as usize);
    if masks.len() != count * plane {
        bail!("Expected {} mask values, got {}", count * plane, masks.len());
    }

    let mut detections = Vec::with_capacity(count);
    for i in 0..count {
        let b = &boxes[i * 4..i * 4 + 4];
        let mask = ImageBuffer::from_raw(width, height, masks[i * plane..(i + 1) * plane].to_vec())
            .ok_or_else(|| anyhow!("Mask buffer for detection {} has the wrong size", i))?;

        detections.push(Detection {
            bbox: BoundingBox::new(b[0] as f64, b[1] as f64, b[2] as f64, b[3] as f64),
            score: scores[i],
            mask,
        });
    }

    Ok(detections)
}

/// Mask R-CNN exported from torchvision, executed with ONNX Runtime
pub struct OnnxMaskRcnn {
    // Running a session needs exclusive access
    session: Mutex<Session>,
    device: Device,
    path: PathBuf,
}

impl OnnxMaskRcnn {
    pub fn load(path: &Path, device: Device, intra_threads: Option<usize>) -> Result<Self> {
        let mut builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
        if let Some(threads) = intra_threads {
            builder = builder.with_intra_threads(threads)?;
        }
        builder = register_device(builder, device)?;

        let session = builder
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        Ok(Self {
            session: Mutex::new(session),
            device,
            path: path.to_path_buf(),
        })
    }
}

impl SegmentationModel for OnnxMaskRcnn {
    fn predict(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let (width, height) = image.dimensions();
        let input = image_to_tensor(image);

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("Model session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![TensorRef::from_array_view(&input)?])
            .context("Mask R-CNN forward pass failed")?;

        let (_, boxes) = outputs[BOXES_OUTPUT].try_extract_tensor::<f32>()?;
        let (_, scores) = outputs[SCORES_OUTPUT].try_extract_tensor::<f32>()?;
        let (mask_shape, masks) = outputs[MASKS_OUTPUT].try_extract_tensor::<f32>()?;
        let mask_dims: Vec<i64> = mask_shape.iter().copied().collect();

        decode_outputs(boxes, scores, masks, &mask_dims, width, height)
    }

    fn device(&self) -> Device {
        self.device
    }

    fn model_info(&self) -> String {
        format!("Mask R-CNN (ONNX Runtime, {}, model path: {})", self.device, self.path.display())
    }
}

/// Load the model if its file exists.
///
/// A missing file is not an error: the service runs without a model and
/// reports it through `/health`.
pub fn load_model(path: &Path, device: Device, intra_threads: Option<usize>) -> Result<Option<OnnxMaskRcnn>> {
    if !path.exists() {
        warn!("Model not found at {}", path.display());
        warn!("Export the Mask R-CNN weights to ONNX and place them at that path (or set MODEL_PATH)");
        return Ok(None);
    }

    let model = OnnxMaskRcnn::load(path, device, intra_threads)?;
    info!("Model loaded successfully: {}", model.model_info());
    Ok(Some(model))
}
