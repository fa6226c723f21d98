// src/vision/signature.rs

use image::imageops::{self, FilterType};
use image::DynamicImage;

pub const SIGNATURE_WIDTH: u32 = 64;
pub const SIGNATURE_HEIGHT: u32 = 36;

/// Downscaled grayscale fingerprint of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSignature(Vec<i16>);

impl SceneSignature {
    pub fn of(image: &DynamicImage) -> Self {
        let gray = image.to_luma8();
        let small = imageops::resize(&gray, SIGNATURE_WIDTH, SIGNATURE_HEIGHT, FilterType::Triangle);
        Self(small.pixels().map(|p| i16::from(p.0[0])).collect())
    }

    pub fn mean_abs_diff(&self, other: &SceneSignature) -> f64 {
        if self.0.is_empty() {
            return 0.0;
        }
        let total: u64 = self
            .0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| u64::from((a - b).unsigned_abs()))
            .sum();
        total as f64 / self.0.len() as f64
    }
}

/// Remembers the last signature that counted as a change. Frames below the
/// threshold are compared against it but never replace it.
#[derive(Debug)]
pub struct SceneChangeDetector {
    threshold: f64,
    last: Option<SceneSignature>,
}

impl SceneChangeDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold, last: None }
    }

    pub fn observe(&mut self, signature: SceneSignature) -> bool {
        let changed = match &self.last {
            None => true,
            Some(last) => signature.mean_abs_diff(last) > self.threshold,
        };
        if changed {
            self.last = Some(signature);
        }
        changed
    }
}
