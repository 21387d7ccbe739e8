/// 视频输入系统 (Video Input System)
///
/// - FrameSource: 帧源接口, 严格递增的 (时间戳, RGB 图像) 序列
/// - VideoSource: FFmpeg 解码线程 + 有界通道
/// - FrameSequence: 内存中的帧序列
/// - yuv: YUV420P ⇄ RGB 转换
use std::collections::VecDeque;

use image::RgbImage;

use crate::error::FaceResult;

pub mod decode_filter;
pub mod decoder;
pub mod yuv;

pub use decode_filter::DecodeFilter;
pub use decoder::{probe, VideoInfo, VideoSource, FRAME_QUEUE_CAPACITY};

/// 解码后的一帧
#[derive(Clone, Debug)]
pub struct VideoFrame {
    /// 时间戳 (秒)
    pub time: f64,
    pub image: RgbImage,
}

/// 帧源
pub trait FrameSource: Iterator<Item = FaceResult<VideoFrame>> {
    /// (宽, 高)
    fn frame_size(&self) -> (u32, u32);
}

/// 内存帧序列
pub struct FrameSequence {
    width: u32,
    height: u32,
    frames: VecDeque<VideoFrame>,
}

impl FrameSequence {
    /// 以帧率生成时间戳: 第 i 帧为 `i / fps`
    pub fn new(images: Vec<RgbImage>, fps: f64) -> Self {
        let (width, height) = images.first().map(|i| i.dimensions()).unwrap_or((0, 0));
        let frames = images
            .into_iter()
            .enumerate()
            .map(|(i, image)| VideoFrame {
                time: i as f64 / fps,
                image,
            })
            .collect();
        Self {
            width,
            height,
            frames,
        }
    }

    /// `count` 帧纯色图像
    pub fn blank(width: u32, height: u32, fps: f64, count: usize) -> Self {
        let mut sequence = Self::new(vec![RgbImage::new(width, height); count], fps);
        sequence.width = width;
        sequence.height = height;
        sequence
    }
}

impl Iterator for FrameSequence {
    type Item = FaceResult<VideoFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.frames.pop_front().map(Ok)
    }
}

impl FrameSource for FrameSequence {
    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
