//! 基于检测的人脸跟踪 (Tracking by detection)
//!
//! 每条轨迹由一个视觉跟踪器逐帧跟随; 检测帧上检测框按重叠率贪心关联到
//! 活动或休眠轨迹. 跟踪置信度过低的轨迹进入休眠, 在 `max_gap` 秒内被
//! 重新检测到则沿用原轨迹, 否则关闭. 镜头结束时全部轨迹关闭.

use image::RgbImage;
use tracing::{debug, trace};

use super::detector::FaceDetector;
use super::tracker::VisualTracker;
use super::types::{Detection, Rect};
use crate::config::TrackingConfig;
use crate::error::FaceResult;
use crate::input::VideoFrame;

/// 来自检测器的框
pub const STATUS_DETECTION: &str = "detection";
/// 来自跟踪器的框
pub const STATUS_TRACKING: &str = "tracking";

/// 轨迹上的一个点
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub time: f64,
    pub rect: Rect<f32>,
    pub status: &'static str,
}

/// 一条已关闭的人脸轨迹
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceTrack {
    pub points: Vec<TrackPoint>,
}

impl FaceTrack {
    pub fn start(&self) -> Option<f64> {
        self.points.first().map(|p| p.time)
    }

    pub fn end(&self) -> Option<f64> {
        self.points.last().map(|p| p.time)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 同一时刻只保留一个点: 检测结果覆盖跟踪结果
    fn record(&mut self, time: f64, rect: Rect<f32>, status: &'static str) {
        match self.points.last_mut() {
            Some(last) if last.time == time => {
                last.rect = rect;
                last.status = status;
            }
            _ => self.points.push(TrackPoint { time, rect, status }),
        }
    }

    fn last_rect(&self) -> Option<Rect<f32>> {
        self.points.last().map(|p| p.rect)
    }
}

struct ActiveTrack<T> {
    tracker: T,
    track: FaceTrack,
    dormant: bool,
}

pub struct FaceTracking<D, T> {
    detector: D,
    config: TrackingConfig,
    tracks: Vec<ActiveTrack<T>>,
    finished: Vec<FaceTrack>,
    last_detection: Option<f64>,
}

impl<D: FaceDetector, T: VisualTracker + Default> FaceTracking<D, T> {
    pub fn new(detector: D, config: TrackingConfig) -> Self {
        Self {
            detector,
            config,
            tracks: Vec::new(),
            finished: Vec::new(),
            last_detection: None,
        }
    }

    /// 活动与休眠轨迹数
    pub fn open_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// 处理镜头内的一帧 (时间戳递增)
    pub fn process(&mut self, frame: &VideoFrame) -> FaceResult<()> {
        let (width, height) = frame.image.dimensions();
        let t = frame.time;

        // 1. 跟踪
        for active in self.tracks.iter_mut().filter(|a| !a.dormant) {
            let confidence = active.tracker.update(&frame.image);
            if confidence < self.config.min_confidence {
                trace!("轨迹休眠 @ {:.3}s (置信度 {:.2})", t, confidence);
                active.dormant = true;
            } else {
                let rect = active.tracker.position().clamp(width, height);
                active.track.record(t, rect, STATUS_TRACKING);
            }
        }

        // 2. 检测
        let due = self
            .last_detection
            .map_or(true, |last| t - last >= self.config.every);
        if due {
            self.last_detection = Some(t);
            let min_height = self.config.min_size * height as f32;
            let detections: Vec<Detection> = self
                .detector
                .detect(&frame.image)?
                .into_iter()
                .filter(|d| d.rect.height() >= min_height)
                .collect();
            self.associate(&frame.image, t, detections);
        }

        // 3. 关闭超时的休眠轨迹
        let max_gap = self.config.max_gap;
        let (expired, open): (Vec<_>, Vec<_>) = self.tracks.drain(..).partition(|a| {
            a.dormant && a.track.end().is_some_and(|end| t - end > max_gap)
        });
        self.tracks = open;
        self.finished.extend(expired.into_iter().map(|a| a.track));
        Ok(())
    }

    /// 贪心关联: 重叠率高者优先
    fn associate(&mut self, image: &RgbImage, t: f64, detections: Vec<Detection>) {
        let max_gap = self.config.max_gap;
        let mut candidates = Vec::new();
        for (det_idx, detection) in detections.iter().enumerate() {
            for (track_idx, active) in self.tracks.iter().enumerate() {
                let Some(last) = active.track.last_rect() else {
                    continue;
                };
                if active.dormant && active.track.end().is_some_and(|end| t - end > max_gap) {
                    continue;
                }
                let iou = detection.rect.iou(&last);
                if iou >= self.config.min_overlap {
                    candidates.push((1.0 - iou, det_idx, track_idx));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut used_det = vec![false; detections.len()];
        let mut used_track = vec![false; self.tracks.len()];
        for (_, det_idx, track_idx) in candidates {
            if used_det[det_idx] || used_track[track_idx] {
                continue;
            }
            used_det[det_idx] = true;
            used_track[track_idx] = true;

            let rect = detections[det_idx].rect;
            let active = &mut self.tracks[track_idx];
            active.tracker.start(image, &rect);
            active.dormant = false;
            active.track.record(t, rect, STATUS_DETECTION);
        }

        for (detection, _) in detections.iter().zip(&used_det).filter(|(_, used)| !**used) {
            let mut tracker = T::default();
            tracker.start(image, &detection.rect);
            let mut track = FaceTrack::default();
            track.record(t, detection.rect, STATUS_DETECTION);
            self.tracks.push(ActiveTrack {
                tracker,
                track,
                dormant: false,
            });
        }
    }

    /// 镜头结束: 关闭全部轨迹, 按开始时间排序返回
    pub fn close_shot(&mut self) -> Vec<FaceTrack> {
        let mut closed = std::mem::take(&mut self.finished);
        closed.extend(self.tracks.drain(..).map(|a| a.track));
        closed.retain(|track| !track.is_empty());
        closed.sort_by(|a, b| {
            let (sa, sb) = (a.start().unwrap_or(0.0), b.start().unwrap_or(0.0));
            sa.total_cmp(&sb)
        });
        self.last_detection = None;
        debug!("镜头结束, 关闭 {} 条轨迹", closed.len());
        closed
    }
}
