// src/vision/frame.rs

use std::io::Read;
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageFormat};
use reqwest::blocking::Client;
use tracing::debug;

use crate::config::VisionConfig;
use crate::error::VisionError;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const CHUNK_SIZE: usize = 4096;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// A decoded camera frame together with the JPEG it came from.
#[derive(Debug, Clone)]
pub struct Frame {
    pub jpeg: Vec<u8>,
    pub image: DynamicImage,
}

impl Frame {
    pub fn decode(jpeg: Vec<u8>) -> Result<Self, VisionError> {
        let image = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)?;
        Ok(Self { jpeg, image })
    }
}

/// Produces the most recent complete frame, or `None` when nothing
/// decodable arrived in time.
pub trait FrameSource: Send {
    fn latest_frame(&mut self) -> Result<Option<Frame>, VisionError>;
}

/// Splits a byte stream into JPEG images by their start/end markers,
/// ignoring whatever multipart framing surrounds them.
#[derive(Debug, Default)]
pub struct JpegScanner {
    buf: Vec<u8>,
}

impl JpegScanner {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    pub fn next_jpeg(&mut self) -> Option<Vec<u8>> {
        let Some(start) = find(&self.buf, &SOI, 0) else {
            // Keep a trailing 0xFF in case the marker straddles two chunks.
            let keep = usize::from(self.buf.last() == Some(&0xFF));
            self.buf.drain(..self.buf.len() - keep);
            return None;
        };
        let end = find(&self.buf, &EOI, start + SOI.len())? + EOI.len();
        let jpeg = self.buf[start..end].to_vec();
        self.buf.drain(..end);
        Some(jpeg)
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

fn find(haystack: &[u8], marker: &[u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(marker.len())
        .position(|w| w == marker)
        .map(|i| i + from)
}

/// Reads until the stream ends or the deadline passes and keeps the last
/// frame that decoded. Undecodable images are skipped.
pub fn read_latest(stream: &mut impl Read, deadline: Instant) -> Result<Option<Frame>, VisionError> {
    let mut scanner = JpegScanner::default();
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut latest = None;

    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        scanner.push(&chunk[..n]);
        while let Some(jpeg) = scanner.next_jpeg() {
            match Frame::decode(jpeg) {
                Ok(frame) => latest = Some(frame),
                Err(e) => debug!(error = %e, "skipping undecodable frame"),
            }
        }
        if Instant::now() > deadline {
            break;
        }
    }
    Ok(latest)
}

/// MJPEG over HTTP. Each poll opens a fresh request and reads for at most
/// the frame budget.
pub struct MjpegSource {
    client: Client,
    url: String,
    budget: Duration,
}

impl MjpegSource {
    pub fn new(config: &VisionConfig) -> Result<Self, VisionError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_millis(config.frame_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            url: config.video_source.clone(),
            budget: Duration::from_millis(config.frame_budget_ms),
        })
    }
}

impl FrameSource for MjpegSource {
    fn latest_frame(&mut self) -> Result<Option<Frame>, VisionError> {
        let deadline = Instant::now() + self.budget;
        let mut response = self.client.get(&self.url).send()?.error_for_status()?;
        read_latest(&mut response, deadline)
    }
}
