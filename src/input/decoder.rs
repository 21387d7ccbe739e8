/// 视频文件解码器 (FFmpeg 解码线程 + 有界通道)
use std::path::Path;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::stream_info::{find_video_stream_info, StreamInfo};
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use tracing::{debug, info};

use super::decode_filter::{forward_error, DecodeFilter};
use super::{FrameSource, VideoFrame};
use crate::error::{FaceError, FaceResult};

/// 解码线程与消费端之间的缓冲帧数
pub const FRAME_QUEUE_CAPACITY: usize = 8;

/// 视频流基本信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// 探测视频流 (分辨率, 帧率)
pub fn probe(path: &Path) -> FaceResult<VideoInfo> {
    if !path.exists() {
        return Err(FaceError::FileNotFound(path.to_path_buf()));
    }
    let url = path.to_string_lossy().to_string();

    let info = find_video_stream_info(url.as_str())
        .map_err(|e| FaceError::video(format!("{}: {}", path.display(), e)))?;

    match info {
        Some(StreamInfo::Video {
            width, height, fps, ..
        }) => {
            let info = VideoInfo {
                width: width as u32,
                height: height as u32,
                fps: fps as f64,
            };
            if info.width == 0 || info.height == 0 {
                return Err(FaceError::video(format!("{}: empty frame size", path.display())));
            }
            if !(info.fps.is_finite() && info.fps > 0.0) {
                return Err(FaceError::video(format!("{}: unknown frame rate", path.display())));
            }
            Ok(info)
        }
        _ => Err(FaceError::video(format!("{}: no video stream", path.display()))),
    }
}

/// 视频文件帧源
///
/// 解码在独立线程中进行, 帧经有界通道逐个交给消费端.
/// 丢弃 `VideoSource` 即关闭通道, 解码线程随之退出.
pub struct VideoSource {
    info: VideoInfo,
    receiver: Receiver<FaceResult<VideoFrame>>,
    _worker: JoinHandle<()>,
}

impl VideoSource {
    pub fn open(path: &Path) -> FaceResult<Self> {
        let info = probe(path)?;
        info!(
            "视频: {} ({}x{}, {:.3}fps)",
            path.display(),
            info.width,
            info.height,
            info.fps
        );

        let (sender, receiver) = bounded(FRAME_QUEUE_CAPACITY);
        let url = path.to_string_lossy().to_string();
        let fps = info.fps;

        let worker = thread::Builder::new()
            .name("vidface-decode".to_string())
            .spawn(move || {
                let filter = DecodeFilter::new(sender.clone(), fps, 0.0);
                if let Err(message) = decode(&url, filter) {
                    forward_error(&sender, message);
                }
                debug!("解码线程结束: {}", url);
            })?;

        Ok(Self {
            info,
            receiver,
            _worker: worker,
        })
    }
}

/// 运行 FFmpeg 解码直至文件结束
fn decode(url: &str, filter: DecodeFilter) -> Result<(), String> {
    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("decode", Box::new(filter));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = FfmpegContext::builder()
        .input(Input::new(url))
        .filter_descs(["format=yuv420p"].into())
        .output(out)
        .build()
        .map_err(|e| format!("构建失败: {}", e))?;

    let sch = ctx.start().map_err(|e| format!("启动失败: {}", e))?;
    sch.wait().map_err(|e| format!("解码失败: {}", e))
}

impl Iterator for VideoSource {
    type Item = FaceResult<VideoFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        // 所有发送端释放 (解码结束) 时返回 None
        self.receiver.recv().ok()
    }
}

impl FrameSource for VideoSource {
    fn frame_size(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }
}
