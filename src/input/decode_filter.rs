/// FFmpeg解码过滤器: 视频文件 → RGB帧
/// FFmpeg decode filter: YUV420P frames are converted to RGB and handed to the consumer
use std::time::Instant;

use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;
use tracing::{debug, info, warn};

use super::yuv::{plane_lengths, yuv420p_to_rgb, Planes};
use super::VideoFrame;
use crate::error::{FaceError, FaceResult};

pub struct DecodeFilter {
    sender: Sender<FaceResult<VideoFrame>>,
    /// 帧率 (时间戳 = start + index / fps)
    fps: f64,
    start: f64,
    index: u64,
    dropped_frames: usize,
    count: usize,
    last: Instant,
}

impl DecodeFilter {
    pub fn new(sender: Sender<FaceResult<VideoFrame>>, fps: f64, start: f64) -> Self {
        Self {
            sender,
            fps,
            start,
            index: 0,
            dropped_frames: 0,
            count: 0,
            last: Instant::now(),
        }
    }

    fn timestamp(&self) -> f64 {
        self.start + self.index as f64 / self.fps
    }
}

/// 读取一帧 YUV420P 并转换为 RGB; 帧不可用时返回 None
///
/// # Safety
/// `frame` 必须是有效的 YUV420P 视频帧.
pub(crate) unsafe fn frame_to_rgb(frame: &Frame) -> Option<RgbImage> {
    if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
        return None;
    }

    let raw = &*frame.as_ptr();
    let (w, h) = (raw.width, raw.height);
    if w <= 0 || h <= 0 {
        return None;
    }
    let (w, h) = (w as usize, h as usize);

    let (y_plane, u_plane, v_plane) = (raw.data[0], raw.data[1], raw.data[2]);
    if y_plane.is_null() || u_plane.is_null() || v_plane.is_null() {
        return None;
    }
    let (y_stride, uv_stride) = (raw.linesize[0], raw.linesize[1]);
    if y_stride < w as i32 || uv_stride < w.div_ceil(2) as i32 {
        return None;
    }
    let (y_stride, uv_stride) = (y_stride as usize, uv_stride as usize);
    let (y_len, uv_len) = plane_lengths(w, h, y_stride, uv_stride);

    let planes = Planes {
        y: std::slice::from_raw_parts(y_plane, y_len),
        u: std::slice::from_raw_parts(u_plane, uv_len),
        v: std::slice::from_raw_parts(v_plane, uv_len),
        y_stride,
        uv_stride,
    };

    let mut image = RgbImage::new(w as u32, h as u32);
    yuv420p_to_rgb(&planes, &mut image);
    Some(image)
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        debug!("解码线程启动");
        self.last = Instant::now();
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        let time = self.timestamp();
        self.index += 1;

        let image = match unsafe { frame_to_rgb(&frame) } {
            Some(image) => image,
            None => {
                self.dropped_frames += 1;
                warn!("丢弃帧 #{}: 空帧/损坏帧 ({:.3}s)", self.index, time);
                return Ok(None);
            }
        };

        // 消费端关闭后停止解码
        if self.sender.send(Ok(VideoFrame { time, image })).is_err() {
            return Err("frame consumer closed".to_string());
        }

        self.count += 1;
        let elapsed = self.last.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            info!(
                "解码统计: {:.3}s | 实际{:.1}fps | 总帧{} | 丢弃{}",
                time,
                self.count as f64 / elapsed,
                self.index,
                self.dropped_frames
            );
            self.last = Instant::now();
            self.count = 0;
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        debug!("解码线程退出 ({} 帧)", self.index);
    }
}

/// 将错误转交给消费端 (解码线程内部)
pub(crate) fn forward_error(sender: &Sender<FaceResult<VideoFrame>>, message: String) {
    let _ = sender.send(Err(FaceError::video(message)));
}
