/// FFmpeg 叠加过滤器: 在编码前的每一帧上绘制标注
/// FFmpeg overlay filter: annotations are drawn in RGB and written back into the YUV420P frame
use std::time::Instant;

use ab_glyph::FontVec;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;
use tracing::{debug, info, warn};

use super::draw_overlay;
use crate::annotation::Labels;
use crate::detection::types::{Face, Landmarks};
use crate::input::decode_filter::frame_to_rgb;
use crate::input::yuv::{plane_lengths, write_changed_rgb, PlanesMut};
use crate::replay::Replay;

/// 叠加状态: 人脸/关键点回放 + 标签 + 字体
pub struct Overlay {
    faces: Replay<Face<f32>>,
    landmarks: Option<Replay<Landmarks>>,
    labels: Labels,
    font: Option<FontVec>,
    /// 标注时间 = 帧时间 - shift
    shift: f64,
}

impl Overlay {
    pub fn new(
        faces: Replay<Face<f32>>,
        landmarks: Option<Replay<Landmarks>>,
        labels: Labels,
        font: Option<FontVec>,
        shift: f64,
    ) -> Self {
        Self {
            faces,
            landmarks,
            labels,
            font,
            shift,
        }
    }

    /// 从 `start` 秒开始渲染: 丢弃其之前的标注组
    pub fn seek(&mut self, start: f64) {
        let t = start - self.shift;
        let mut dropped = self.faces.discard_before(t);
        if let Some(landmarks) = self.landmarks.as_mut() {
            dropped += landmarks.discard_before(t);
        }
        debug!("跳过 {:.3}s 之前的 {} 条标注", t, dropped);
    }

    /// 在 `image` 上绘制 `time` 时刻的标注, 返回绘制的人脸数
    pub fn annotate(&mut self, image: &mut RgbImage, time: f64) -> usize {
        let t = time - self.shift;
        let faces = self.faces.query(t);
        let landmarks = self.landmarks.as_mut().map(|replay| replay.query(t));
        draw_overlay(
            image,
            time,
            &faces.items,
            landmarks.as_ref().map(|reply| reply.items.as_slice()),
            &self.labels,
            self.font.as_ref(),
        );
        faces.items.len()
    }
}

/// 可写的 YUV420P 平面
///
/// # Safety
/// `frame` 必须是有效且可写 (独占缓冲区) 的 YUV420P 视频帧.
unsafe fn frame_planes_mut(frame: &mut Frame) -> Option<PlanesMut<'_>> {
    if frame.as_ptr().is_null() {
        return None;
    }
    let raw = &mut *frame.as_mut_ptr();
    if raw.width <= 0 || raw.height <= 0 {
        return None;
    }
    let (w, h) = (raw.width as usize, raw.height as usize);
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

    Some(PlanesMut {
        y: std::slice::from_raw_parts_mut(y_plane, y_len),
        u: std::slice::from_raw_parts_mut(u_plane, uv_len),
        v: std::slice::from_raw_parts_mut(v_plane, uv_len),
        y_stride,
        uv_stride,
    })
}

/// 帧时间比较时容许的浮点误差 (帧)
const FRAME_GRID_EPSILON: f64 = 1e-6;

/// 不早于 `from` 秒的第一帧序号; 输入从该帧开始解码
pub fn first_frame_index(from: f64, fps: f64) -> u64 {
    if !(from > 0.0 && fps > 0.0) {
        return 0;
    }
    (from * fps - FRAME_GRID_EPSILON).ceil().max(0.0) as u64
}

pub struct OverlayFilter {
    overlay: Overlay,
    /// 帧时间 = (first + index) / fps (源视频时间轴)
    fps: f64,
    first: u64,
    index: u64,
    faces_drawn: usize,
    count: usize,
    last: Instant,
}

impl OverlayFilter {
    /// 从 `from` 秒之后的第一帧开始叠加
    pub fn new(mut overlay: Overlay, fps: f64, from: f64) -> Self {
        let first = first_frame_index(from, fps);
        if first > 0 {
            overlay.seek(first as f64 / fps);
        }
        Self {
            overlay,
            fps,
            first,
            index: 0,
            faces_drawn: 0,
            count: 0,
            last: Instant::now(),
        }
    }

    fn timestamp(&self) -> f64 {
        (self.first + self.index) as f64 / self.fps
    }
}

impl FrameFilter for OverlayFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        debug!("叠加过滤器启动 @ {:.3}s", self.timestamp());
        self.last = Instant::now();
        Ok(())
    }

    fn filter_frame(
        &mut self,
        mut frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        let time = self.timestamp();
        self.index += 1;

        let Some(original) = (unsafe { frame_to_rgb(&frame) }) else {
            warn!("跳过帧 #{}: 空帧/损坏帧 ({:.3}s)", self.index, time);
            return Ok(Some(frame));
        };
        let mut drawn = original.clone();
        self.faces_drawn += self.overlay.annotate(&mut drawn, time);

        match unsafe { frame_planes_mut(&mut frame) } {
            Some(mut planes) => {
                write_changed_rgb(&mut planes, &original, &drawn);
            }
            None => warn!("帧 #{} 不可写, 未绘制标注", self.index),
        }

        self.count += 1;
        let elapsed = self.last.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            info!(
                "渲染统计: {:.3}s | 实际{:.1}fps | 总帧{} | 人脸{}",
                time,
                self.count as f64 / elapsed,
                self.index,
                self.faces_drawn
            );
            self.last = Instant::now();
            self.count = 0;
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        debug!("叠加过滤器退出 ({} 帧, {} 张人脸)", self.index, self.faces_drawn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::Rect;
    use crate::track_color;
    use image::Rgb;

    fn face_replay(groups: &[(f64, u32)]) -> Replay<Face<f32>> {
        Replay::new(groups.iter().map(|&(time, track)| {
            (
                time,
                Face {
                    track,
                    rect: Rect::new(2.0, 2.0, 12.0, 12.0),
                    status: String::new(),
                },
            )
        }))
    }

    #[test]
    fn test_annotate_applies_shift() {
        let mut overlay = Overlay::new(face_replay(&[(1.0, 5)]), None, Labels::new(), None, 0.5);
        let mut image = RgbImage::new(20, 20);
        assert_eq!(overlay.annotate(&mut image, 1.4), 0);
        assert_eq!(*image.get_pixel(2, 2), Rgb([0, 0, 0]));

        assert_eq!(overlay.annotate(&mut image, 1.5), 1);
        assert_eq!(*image.get_pixel(2, 2), Rgb(track_color(5)));
    }

    #[test]
    fn test_seek_skips_earlier_groups() {
        let mut overlay = Overlay::new(
            face_replay(&[(0.0, 0), (0.04, 0), (2.0, 1)]),
            None,
            Labels::new(),
            None,
            0.0,
        );
        overlay.seek(2.0);
        let mut image = RgbImage::new(20, 20);
        assert_eq!(overlay.annotate(&mut image, 2.0), 1);
        assert_eq!(*image.get_pixel(2, 2), Rgb(track_color(1)));
    }

    #[test]
    fn test_first_frame_index() {
        assert_eq!(first_frame_index(0.0, 25.0), 0);
        assert_eq!(first_frame_index(1.01, 25.0), 26);
        // 已在帧网格上的起点不前移
        assert_eq!(first_frame_index(1.04, 25.0), 26);
        assert_eq!(first_frame_index(0.1, 29.97), 3);
    }

    #[test]
    fn test_off_grid_start_draws_group_on_its_frame() {
        // 25fps, 从 1.01s 开始: 第一帧实际位于 1.04s
        let overlay = Overlay::new(
            face_replay(&[(1.0, 0), (1.04, 1), (1.08, 2)]),
            None,
            Labels::new(),
            None,
            0.0,
        );
        let mut filter = OverlayFilter::new(overlay, 25.0, 1.01);
        assert_eq!(filter.timestamp(), 1.04);

        for track in [1, 2] {
            let mut image = RgbImage::new(20, 20);
            let time = filter.timestamp();
            assert_eq!(filter.overlay.annotate(&mut image, time), 1, "@ {time}");
            assert_eq!(*image.get_pixel(2, 2), Rgb(track_color(track)));
            filter.index += 1;
        }
    }
}
