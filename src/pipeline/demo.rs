//! 演示驱动: 视频 + 标注 → 带标注的视频
//!
//! 解码, 叠加与编码都在同一个 FFmpeg 调度中完成; 叠加过滤器按
//! `frameTime - shift` 查询人脸框与关键点回放.

use std::path::Path;

use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input, Output};
use tracing::info;

use crate::annotation::{read_faces, read_labels, read_landmarks, Labels};
use crate::config::DemoArgs;
use crate::detection::Face;
use crate::error::{FaceError, FaceResult};
use crate::input::probe;
use crate::renderer::overlay_filter::Overlay;
use crate::renderer::{load_font, OverlayFilter};
use crate::replay::Replay;

/// "copy" 让每帧拥有独立可写的缓冲区
const DEMO_FILTER: &str = "format=yuv420p,copy";

/// 编码窗口 [from, until) (秒), 换算为 FFmpeg 的 (起点, 时长) 微秒
pub fn encode_window(from: f64, until: Option<f64>) -> FaceResult<(i64, Option<i64>)> {
    if !(from.is_finite() && from >= 0.0) {
        return Err(FaceError::video(format!("invalid --from {from}")));
    }
    let start_us = (from * 1e6).round() as i64;
    let duration_us = match until {
        None => None,
        Some(until) if until.is_finite() && until > from => {
            Some(((until - from) * 1e6).round() as i64)
        }
        Some(until) => {
            return Err(FaceError::video(format!(
                "--until {until} must be after --from {from}"
            )))
        }
    };
    Ok((start_us, duration_us))
}

/// `vidface demo`
pub fn run_demo(args: &DemoArgs) -> FaceResult<()> {
    let (start_us, duration_us) = encode_window(args.from, args.until)?;
    let info = probe(&args.video)?;
    let (width, height) = (info.width, info.height);

    let faces = Replay::<Face<f32>>::faces(read_faces(&args.tracking)?, width, height);
    let landmarks = match &args.shape {
        Some(path) => Some(Replay::landmarks(read_landmarks(path)?, width, height)),
        None => None,
    };
    let labels = match &args.label {
        Some(path) => read_labels(path)?,
        None => Labels::new(),
    };
    let font = load_font(args.font.as_deref())?;

    let overlay = Overlay::new(faces, landmarks, labels, font, args.shift);
    let filter = OverlayFilter::new(overlay, info.fps, args.from);

    info!(
        "渲染: {} → {} ({:.3}s ~ {})",
        args.video.display(),
        args.output.display(),
        args.from,
        args.until.map_or("结束".to_string(), |t| format!("{t:.3}s"))
    );
    encode(&args.video, &args.output, start_us, duration_us, filter)
}

fn encode(
    video: &Path,
    output: &Path,
    start_us: i64,
    duration_us: Option<i64>,
    filter: OverlayFilter,
) -> FaceResult<()> {
    let mut input = Input::new(video.to_string_lossy().to_string());
    if start_us > 0 {
        input = input.set_start_time_us(start_us);
    }
    if let Some(duration_us) = duration_us {
        input = input.set_recording_time_us(duration_us);
    }

    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("overlay", Box::new(filter));
    let out = Output::from(output.to_string_lossy().to_string()).add_frame_pipeline(pipe);

    let ctx = FfmpegContext::builder()
        .input(input)
        .filter_descs([DEMO_FILTER].into())
        .output(out)
        .build()
        .map_err(|e| FaceError::video(format!("构建失败: {}", e)))?;

    let sch = ctx
        .start()
        .map_err(|e| FaceError::video(format!("启动失败: {}", e)))?;
    sch.wait()
        .map_err(|e| FaceError::video(format!("编码失败: {}", e)))?;

    info!("输出完成: {}", output.display());
    Ok(())
}
