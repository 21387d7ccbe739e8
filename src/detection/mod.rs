/// 检测与跟踪 (Detection and tracking)
///
/// - types:    矩形/点/人脸等共享数据结构
/// - detector: 逐帧人脸检测
/// - tracker:  单目标相关跟踪
/// - tracking: 基于检测的多人脸跟踪, 输出按镜头关闭的轨迹
pub mod detector;
pub mod tracker;
pub mod tracking;
pub mod types;

pub use detector::{FaceDetector, UltraFaceDetector};
pub use tracker::{CorrelationTracker, VisualTracker};
pub use tracking::{FaceTrack, FaceTracking, TrackPoint, STATUS_DETECTION, STATUS_TRACKING};
pub use types::{Coord, Detection, Face, Landmarks, NormalizedBox, Point2, Rect, TrackId};
