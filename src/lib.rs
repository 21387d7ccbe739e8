pub mod annotation; // 标注文件读写
pub mod config; // 命令行与运行参数
pub mod detection; // 检测与跟踪
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod logging; // 日志初始化
pub mod models; // 关键点与特征模型
pub mod pipeline; // 流水线驱动
pub mod renderer; // 标注叠加渲染
pub mod replay; // 标注回放状态机
pub mod shot; // 镜头边界

pub use crate::config::{Args, TrackingConfig};
pub use crate::detection::{Detection, Face, Landmarks, NormalizedBox, Point2, Rect, TrackId};
pub use crate::error::{FaceError, FaceResult};
pub use crate::replay::{Reply, Replay};

/// 按置信度降序的非极大值抑制
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].rect.iou(&xs[index].rect);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// 轨迹颜色表 (RGB), 按轨迹号取模
pub const PALETTE: [[u8; 3]; 26] = [
    [240, 163, 255],
    [0, 117, 220],
    [153, 63, 0],
    [76, 0, 92],
    [25, 25, 25],
    [0, 92, 49],
    [43, 206, 72],
    [255, 204, 153],
    [128, 128, 128],
    [148, 255, 181],
    [143, 124, 0],
    [157, 204, 0],
    [194, 0, 136],
    [0, 51, 128],
    [255, 164, 5],
    [255, 168, 187],
    [66, 102, 0],
    [255, 0, 16],
    [94, 241, 242],
    [0, 153, 143],
    [224, 255, 102],
    [116, 10, 255],
    [153, 0, 0],
    [255, 255, 128],
    [255, 255, 0],
    [255, 80, 5],
];

pub fn track_color(track: TrackId) -> [u8; 3] {
    PALETTE[track as usize % PALETTE.len()]
}

/// 鼻梁: 68 点方案中的关键点 27 → 33
pub const NOSE_BRIDGE: (usize, usize) = (27, 33);

#[cfg(test)]
mod tests {
    use super::*;

    fn det(left: f32, confidence: f32) -> Detection {
        Detection {
            rect: Rect::new(left, 0., left + 10., 10.),
            confidence,
        }
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping() {
        let mut xs = vec![det(0., 0.6), det(1., 0.9), det(50., 0.7)];
        non_max_suppression(&mut xs, 0.3);
        assert_eq!(xs.len(), 2);
        assert_eq!(xs[0], det(1., 0.9));
        assert_eq!(xs[1], det(50., 0.7));
    }

    #[test]
    fn test_track_color_wraps() {
        assert_eq!(track_color(0), [240, 163, 255]);
        assert_eq!(track_color(25), [255, 80, 5]);
        assert_eq!(track_color(26), track_color(0));
        assert_eq!(track_color(27), [0, 117, 220]);
    }
}
