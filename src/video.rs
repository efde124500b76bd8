// src/video.rs
//
// Decode/encode glue around opencv. The frame source reads from the
// remote store's streaming URL; the sink writes the annotated output
// video, opening the writer lazily on the first classified frame so a
// video with no gated frames leaves no file behind.

use crate::annotate;
use crate::types::{Detection, Frame};
use anyhow::Result;
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTraitConst, VideoWriter},
};
use std::path::PathBuf;
use tracing::info;

/// Output videos are encoded at a fixed frame rate.
pub const OUTPUT_FPS: f64 = 30.0;

/// Sequential frame supply for one video.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Destination for annotated frames.
pub trait FrameSink {
    fn write(&mut self, frame: &Frame, detections: &[Detection], violation: bool) -> Result<()>;
    fn frames_written(&self) -> usize;
}

pub struct OpenCvFrameSource {
    cap: VideoCapture,
    pub fps: f64,
    pub width: i32,
    pub height: i32,
    current_frame: u64,
}

impl OpenCvFrameSource {
    pub fn open(url: &str) -> Result<Self> {
        let cap = VideoCapture::from_file(url, videoio::CAP_ANY)?;

        if !cap.is_opened()? {
            anyhow::bail!("Failed to open video stream");
        }

        let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
        let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)? as i32;

        info!("Video stream: {}x{} @ {:.1} FPS", width, height, fps);

        Ok(Self {
            cap,
            fps,
            width,
            height,
            current_frame: 0,
        })
    }
}

impl FrameSource for OpenCvFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        use opencv::videoio::VideoCaptureTrait;

        let mut mat = Mat::default();

        if !VideoCaptureTrait::read(&mut self.cap, &mut mat)? || mat.empty() {
            return Ok(None);
        }

        self.current_frame += 1;

        let mut rgb_mat = Mat::default();
        imgproc::cvt_color(&mat, &mut rgb_mat, imgproc::COLOR_BGR2RGB, 0)?;

        let data = rgb_mat.data_bytes()?.to_vec();

        Ok(Some(Frame {
            data,
            width: self.width as usize,
            height: self.height as usize,
            index: self.current_frame,
        }))
    }
}

pub struct OpenCvVideoSink {
    output_path: PathBuf,
    writer: Option<VideoWriter>,
    frames_written: usize,
}

impl OpenCvVideoSink {
    /// No file is created until the first write.
    pub fn new(output_dir: &str, base_name: &str) -> Self {
        Self {
            output_path: PathBuf::from(output_dir).join(base_name),
            writer: None,
            frames_written: 0,
        }
    }

    fn open_writer(&mut self, width: i32, height: i32) -> Result<&mut VideoWriter> {
        if self.writer.is_none() {
            if let Some(parent) = self.output_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            info!("Output video: {}", self.output_path.display());

            let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
            let writer = VideoWriter::new(
                self.output_path.to_str().unwrap_or_default(),
                fourcc,
                OUTPUT_FPS,
                core::Size::new(width, height),
                true,
            )?;
            self.writer = Some(writer);
        }

        Ok(self.writer.as_mut().unwrap())
    }
}

impl FrameSink for OpenCvVideoSink {
    fn write(&mut self, frame: &Frame, detections: &[Detection], violation: bool) -> Result<()> {
        use opencv::videoio::VideoWriterTrait;

        let annotated = annotate::annotate_frame(frame, detections, violation)?;
        let writer = self.open_writer(frame.width as i32, frame.height as i32)?;
        VideoWriterTrait::write(writer, &annotated)?;
        self.frames_written += 1;
        Ok(())
    }

    fn frames_written(&self) -> usize {
        self.frames_written
    }
}
