//! Type definitions for patch-based detection inference

use crate::error::{PipelineError, Result};
use boxmerge::Bbox;
use image::{ImageBuffer, Rgb, RgbImage};
use ndarray::Array2;
use std::path::Path;

/// Pixel format of raw image data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Rgb,
    Grayscale,
}

/// Raw pixel data plus dimensions, the unit handed to the detector adapter
#[derive(Debug, Clone)]
pub struct ImageData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

impl ImageData {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: ImageFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
        }
    }

    /// Load image from file path, converting to RGB
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let img = image::open(path)?;
        Ok(Self::from_rgb_image(img.to_rgb8()))
    }

    /// Decode image from an in-memory byte buffer, converting to RGB
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_rgb_image(img.to_rgb8()))
    }

    pub fn from_rgb_image(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height, ImageFormat::Rgb)
    }

    /// Number of channels for the pixel format
    pub fn channels(&self) -> u32 {
        match self.format {
            ImageFormat::Rgb => 3,
            ImageFormat::Grayscale => 1,
        }
    }

    /// Check that the buffer length matches the declared dimensions
    pub fn validate(&self) -> bool {
        let expected = (self.width * self.height * self.channels()) as usize;
        self.data.len() == expected
    }

    /// Convert into an `RgbImage` buffer, expanding grayscale if needed
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        if !self.validate() {
            return Err(PipelineError::preprocessing(format!(
                "image buffer length {} does not match {}x{}x{}",
                self.data.len(),
                self.width,
                self.height,
                self.channels()
            )));
        }

        let rgb = match self.format {
            ImageFormat::Rgb => self.data.clone(),
            ImageFormat::Grayscale => {
                let mut rgb = Vec::with_capacity(self.data.len() * 3);
                for &pixel in &self.data {
                    rgb.extend_from_slice(&[pixel, pixel, pixel]);
                }
                rgb
            }
        };

        ImageBuffer::<Rgb<u8>, _>::from_raw(self.width, self.height, rgb)
            .ok_or_else(|| PipelineError::preprocessing("failed to create image buffer"))
    }
}

/// Per-object detection in patch-local coordinates, as returned by the
/// detector adapter
#[derive(Debug, Clone)]
pub struct RawDetection {
    pub bbox: Bbox,
    pub score: f32,
    pub class_id: u32,
    /// Patch-sized boolean raster, rows = y, cols = x
    pub mask: Option<Array2<bool>>,
}

impl RawDetection {
    pub fn new(bbox: Bbox, score: f32, class_id: u32) -> Self {
        Self {
            bbox,
            score,
            class_id,
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: Array2<bool>) -> Self {
        self.mask = Some(mask);
        self
    }
}

/// Detection remapped into full-image coordinates
#[derive(Debug, Clone)]
pub struct GlobalDetection {
    pub bbox: Bbox,
    pub score: f32,
    pub class_id: u32,
    /// Full-canvas boolean raster
    pub mask: Option<Array2<bool>>,
    /// Row-major index of the originating patch window
    pub patch_index: usize,
}

/// Final deduplicated detection set, parallel arrays ordered by descending
/// confidence
///
/// Carries the image the coordinates are reported against so a renderer can
/// consume the artifact read-only.
#[derive(Debug, Clone)]
pub struct CombinedResult {
    pub image: ImageData,
    pub boxes: Vec<Bbox>,
    pub scores: Vec<f32>,
    pub class_ids: Vec<u32>,
    pub class_names: Vec<String>,
    pub masks: Vec<Option<Array2<bool>>>,
}

impl CombinedResult {
    pub fn empty(image: ImageData) -> Self {
        Self {
            image,
            boxes: Vec::new(),
            scores: Vec::new(),
            class_ids: Vec::new(),
            class_names: Vec::new(),
            masks: Vec::new(),
        }
    }

    /// Width of the coordinate frame the boxes are reported in
    pub fn width(&self) -> u32 {
        self.image.width
    }

    /// Height of the coordinate frame the boxes are reported in
    pub fn height(&self) -> u32 {
        self.image.height
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

/// Maps a detector class id to a display name
pub trait ClassNameResolver: Send + Sync {
    fn name_for(&self, class_id: u32) -> Option<&str>;

    /// Resolve to a label, falling back to a placeholder for unknown ids
    fn label(&self, class_id: u32) -> String {
        self.name_for(class_id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("class_{}", class_id))
    }
}

/// COCO class-name table (80 classes), the default resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct CocoClasses;

impl CocoClasses {
    const NAMES: &'static [&'static str] = &[
        "person",
        "bicycle",
        "car",
        "motorcycle",
        "airplane",
        "bus",
        "train",
        "truck",
        "boat",
        "traffic light",
        "fire hydrant",
        "stop sign",
        "parking meter",
        "bench",
        "bird",
        "cat",
        "dog",
        "horse",
        "sheep",
        "cow",
        "elephant",
        "bear",
        "zebra",
        "giraffe",
        "backpack",
        "umbrella",
        "handbag",
        "tie",
        "suitcase",
        "frisbee",
        "skis",
        "snowboard",
        "sports ball",
        "kite",
        "baseball bat",
        "baseball glove",
        "skateboard",
        "surfboard",
        "tennis racket",
        "bottle",
        "wine glass",
        "cup",
        "fork",
        "knife",
        "spoon",
        "bowl",
        "banana",
        "apple",
        "sandwich",
        "orange",
        "broccoli",
        "carrot",
        "hot dog",
        "pizza",
        "donut",
        "cake",
        "chair",
        "couch",
        "potted plant",
        "bed",
        "dining table",
        "toilet",
        "tv",
        "laptop",
        "mouse",
        "remote",
        "keyboard",
        "cell phone",
        "microwave",
        "oven",
        "toaster",
        "sink",
        "refrigerator",
        "book",
        "clock",
        "vase",
        "scissors",
        "teddy bear",
        "hair drier",
        "toothbrush",
    ];
}

impl ClassNameResolver for CocoClasses {
    fn name_for(&self, class_id: u32) -> Option<&str> {
        Self::NAMES.get(class_id as usize).copied()
    }
}
