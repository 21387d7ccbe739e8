//! 人脸跟踪驱动: 视频 + 镜头边界 → 人脸框文件
//!
//! 只处理落在镜头内的帧. 每个镜头结束时关闭其全部轨迹, 轨迹按
//! (镜头, 开始时间) 全局编号, 逐条写出并刷新. 文件因此按轨迹而非按时间
//! 排列, 读取端负责排序.

use std::io::Write;

use tracing::{debug, info};

use super::Progress;
use crate::annotation::AnnotationWriter;
use crate::config::TrackArgs;
use crate::detection::{
    CorrelationTracker, FaceDetector, FaceTrack, FaceTracking, TrackId, UltraFaceDetector,
    VisualTracker,
};
use crate::error::FaceResult;
use crate::input::{FrameSource, VideoSource};
use crate::shot::{read_shots, Segment};

/// 写出一批已关闭的轨迹, 编号从 `next_id` 开始
fn write_tracks<W: Write>(
    tracks: Vec<FaceTrack>,
    frame_size: (u32, u32),
    next_id: &mut TrackId,
    writer: &mut AnnotationWriter<W>,
) -> FaceResult<()> {
    let (width, height) = frame_size;
    for track in tracks {
        for point in &track.points {
            writer.write_face(
                point.time,
                *next_id,
                &point.rect.normalize(width, height),
                point.status,
            )?;
        }
        writer.flush()?;
        debug!("轨迹 #{}: {} 帧", next_id, track.len());
        *next_id += 1;
    }
    Ok(())
}

/// 在 `shots` (按起点排序) 内逐帧检测跟踪, 返回写出的轨迹数
pub fn track_faces<S, D, T, W>(
    source: &mut S,
    shots: &[Segment],
    tracking: &mut FaceTracking<D, T>,
    writer: &mut AnnotationWriter<W>,
) -> FaceResult<TrackId>
where
    S: FrameSource,
    D: FaceDetector,
    T: VisualTracker + Default,
    W: Write,
{
    let frame_size = source.frame_size();
    let mut progress = Progress::new("跟踪");
    let mut next_id: TrackId = 0;
    let mut shot_index = 0;

    for frame in source.by_ref() {
        let frame = frame?;

        // 越过已结束的镜头
        while shots.get(shot_index).is_some_and(|shot| shot.end < frame.time) {
            write_tracks(tracking.close_shot(), frame_size, &mut next_id, writer)?;
            shot_index += 1;
        }
        let Some(shot) = shots.get(shot_index) else {
            break;
        };
        if !shot.contains(frame.time) {
            continue;
        }

        tracking.process(&frame)?;
        progress.tick(frame.time);
    }
    write_tracks(tracking.close_shot(), frame_size, &mut next_id, writer)?;

    info!("跟踪完成: {} 帧, {} 条轨迹", progress.frames(), next_id);
    Ok(next_id)
}

/// `vidface track`
pub fn run_track(args: &TrackArgs) -> FaceResult<TrackId> {
    let shots = read_shots(&args.shot)?;
    let detector = UltraFaceDetector::load(&args.detector)?;
    let mut source = VideoSource::open(&args.video)?;
    let mut writer = AnnotationWriter::create(&args.output)?;

    let mut tracking: FaceTracking<_, CorrelationTracker> =
        FaceTracking::new(detector, args.tracking_config());
    track_faces(&mut source, &shots, &mut tracking, &mut writer)
}
