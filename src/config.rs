/// 命令行与运行参数 (CLI and run configuration)
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// 检测框与已有轨迹关联所需的最小重叠率
pub const MIN_OVERLAP_RATIO: f32 = 0.5;
/// 跟踪置信度 (PSR) 低于此值时重置跟踪器
pub const MIN_CONFIDENCE: f32 = 10.0;
/// 可桥接的最大检测间隔 (秒)
pub const MAX_GAP: f64 = 1.0;

pub const DEFAULT_DETECTOR_MODEL: &str = "models/version-RFB-320.onnx";

/// 视频人脸分析流水线
///
/// face detection => (face tracking =>) landmarks detection => feature extraction
#[derive(Parser, Debug)]
#[command(author, version, about = "视频人脸检测/跟踪/关键点/特征流水线", long_about = None)]
pub struct Args {
    /// 输出处理进度
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 按镜头进行人脸检测与跟踪
    Track(TrackArgs),
    /// 在已跟踪的人脸框上定位关键点
    Landmarks(LandmarksArgs),
    /// 由关键点对齐人脸并提取特征向量
    Features(FeaturesArgs),
    /// 渲染带标注的预览视频
    Demo(DemoArgs),
}

#[derive(ClapArgs, Debug)]
pub struct TrackArgs {
    pub video: PathBuf,
    /// 镜头边界 (JSON)
    pub shot: PathBuf,
    pub output: PathBuf,

    /// 最小人脸尺寸 (相对视频高度), 默认检测任意尺寸
    #[arg(long, default_value_t = 0.0)]
    pub min_size: f32,

    /// 每隔 <seconds> 秒检测一次, 默认逐帧
    #[arg(long, default_value_t = 0.0)]
    pub every: f64,

    /// 重叠率大于该值时将检测关联到轨迹
    #[arg(long, default_value_t = MIN_OVERLAP_RATIO)]
    pub min_overlap: f32,

    /// 跟踪置信度低于该值时重置跟踪器
    #[arg(long, default_value_t = MIN_CONFIDENCE)]
    pub min_confidence: f32,

    /// 桥接短于该时长 (秒) 的间隔
    #[arg(long, default_value_t = MAX_GAP)]
    pub max_gap: f64,

    /// 人脸检测模型 (UltraFace ONNX)
    #[arg(long, default_value = DEFAULT_DETECTOR_MODEL)]
    pub detector: PathBuf,
}

impl TrackArgs {
    pub fn tracking_config(&self) -> TrackingConfig {
        TrackingConfig {
            min_size: self.min_size,
            every: self.every,
            min_overlap: self.min_overlap,
            min_confidence: self.min_confidence,
            max_gap: self.max_gap,
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct LandmarksArgs {
    pub video: PathBuf,
    /// 关键点模型 (ONNX)
    pub model: PathBuf,
    /// 人脸框文件 (track 的输出)
    pub tracking: PathBuf,
    pub output: PathBuf,
}

#[derive(ClapArgs, Debug)]
pub struct FeaturesArgs {
    pub video: PathBuf,
    /// 特征模型 (ONNX)
    pub model: PathBuf,
    /// 关键点文件 (landmarks 的输出)
    pub landmark: PathBuf,
    pub output: PathBuf,
}

#[derive(ClapArgs, Debug)]
pub struct DemoArgs {
    pub video: PathBuf,
    pub tracking: PathBuf,
    pub output: PathBuf,

    /// 从 <sec> 秒开始编码
    #[arg(long = "from", default_value_t = 0.0)]
    pub from: f64,

    /// 编码到 <sec> 秒为止
    #[arg(long)]
    pub until: Option<f64>,

    /// 标注整体平移 <sec> 秒
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub shift: f64,

    /// 轨迹标签文件
    #[arg(long)]
    pub label: Option<PathBuf>,

    /// 关键点文件
    #[arg(long)]
    pub shape: Option<PathBuf>,

    /// TrueType 字体 (缺省时在常见系统路径中查找)
    #[arg(long)]
    pub font: Option<PathBuf>,
}

/// 跟踪参数 (tracking-by-detection)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingConfig {
    /// 最小人脸尺寸 (相对帧高)
    pub min_size: f32,
    /// 检测间隔 (秒), 0 表示逐帧
    pub every: f64,
    pub min_overlap: f32,
    pub min_confidence: f32,
    pub max_gap: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            min_size: 0.0,
            every: 0.0,
            min_overlap: MIN_OVERLAP_RATIO,
            min_confidence: MIN_CONFIDENCE,
            max_gap: MAX_GAP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_defaults() {
        let args = Args::parse_from(["vidface", "track", "v.mp4", "shot.json", "out.txt"]);
        match args.command {
            Command::Track(track) => {
                assert_eq!(track.tracking_config(), TrackingConfig::default());
                assert_eq!(track.detector, PathBuf::from(DEFAULT_DETECTOR_MODEL));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(!args.verbose);
    }

    #[test]
    fn test_track_options() {
        let args = Args::parse_from([
            "vidface",
            "track",
            "--min-size",
            "0.1",
            "--every",
            "0.5",
            "--max-gap",
            "2",
            "v.mp4",
            "shot.json",
            "out.txt",
            "--verbose",
        ]);
        assert!(args.verbose);
        let Command::Track(track) = args.command else {
            panic!("expected track");
        };
        let config = track.tracking_config();
        assert_eq!(config.min_size, 0.1);
        assert_eq!(config.every, 0.5);
        assert_eq!(config.max_gap, 2.0);
        assert_eq!(config.min_overlap, MIN_OVERLAP_RATIO);
    }

    #[test]
    fn test_demo_options() {
        let args = Args::parse_from([
            "vidface", "demo", "--from", "10", "--until", "20.5", "--shift", "-0.04", "--label",
            "labels.txt", "v.mp4", "faces.txt", "out.mp4",
        ]);
        let Command::Demo(demo) = args.command else {
            panic!("expected demo");
        };
        assert_eq!(demo.from, 10.0);
        assert_eq!(demo.until, Some(20.5));
        assert_eq!(demo.shift, -0.04);
        assert_eq!(demo.label, Some(PathBuf::from("labels.txt")));
        assert!(demo.shape.is_none());
    }

    #[test]
    fn test_positional_arguments_required() {
        assert!(Args::try_parse_from(["vidface", "landmarks", "v.mp4", "model.onnx"]).is_err());
        assert!(Args::try_parse_from(["vidface"]).is_err());
    }
}
