/// 模型接口与 ONNX Runtime 实现
///
/// ## 架构说明
/// - `LandmarkPredictor`: 图像 + 人脸框 → 有序关键点 (像素坐标)
/// - `FaceEmbedder`: 对齐人脸 → 定长特征向量
/// - `OrtBackend`: 会话加载与单输入推理
/// - `alignment`: 三点仿射对齐
///
/// 流水线只依赖 trait, 测试中以桩实现替换.
use image::RgbImage;

use crate::detection::types::{Point2, Rect};
use crate::error::FaceResult;

pub mod alignment;
pub mod embedding;
pub mod landmarks;
pub mod ort_backend;

pub use embedding::OrtFaceEmbedder;
pub use landmarks::OrtLandmarkPredictor;
pub use ort_backend::{OrtBackend, OutputTensor};

/// 关键点定位
pub trait LandmarkPredictor {
    /// 在 `face` 区域内定位关键点, 返回帧像素坐标
    fn predict(&mut self, image: &RgbImage, face: &Rect<i32>) -> FaceResult<Vec<Point2>>;
}

/// 人脸特征
pub trait FaceEmbedder {
    /// 对齐人脸的边长
    fn input_size(&self) -> u32;

    fn embed(&mut self, aligned: &RgbImage) -> FaceResult<Vec<f32>>;
}
