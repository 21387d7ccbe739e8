//! 人脸检测器 (Face detector)
//! UltraFace (version-RFB-320): 输入 320x240 RGB, 输出 scores [1,N,2] 与 boxes [1,N,4]

use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;
use tracing::debug;

use super::types::{Detection, Rect};
use crate::error::{FaceError, FaceResult};
use crate::models::ort_backend::{image_tensor, Normalization, OrtBackend, OutputTensor};
use crate::non_max_suppression;

/// 逐帧人脸检测
pub trait FaceDetector {
    /// 返回帧像素坐标下的检测框
    fn detect(&mut self, image: &RgbImage) -> FaceResult<Vec<Detection>>;
}

pub struct UltraFaceDetector {
    backend: OrtBackend,
    width: u32,
    height: u32,
    conf_threshold: f32,
    iou_threshold: f32,
}

impl UltraFaceDetector {
    pub const INPUT_WIDTH: u32 = 320;
    pub const INPUT_HEIGHT: u32 = 240;

    pub fn load(path: &Path) -> FaceResult<Self> {
        Ok(Self {
            backend: OrtBackend::load(path)?,
            width: Self::INPUT_WIDTH,
            height: Self::INPUT_HEIGHT,
            conf_threshold: 0.7,
            iou_threshold: 0.3,
        })
    }

    /// 按名称找到 scores / boxes, 否则按声明顺序
    fn split_outputs<'a>(
        &self,
        outputs: &'a [OutputTensor],
    ) -> FaceResult<(&'a OutputTensor, &'a OutputTensor)> {
        let names = self.backend.output_names();
        let find = |wanted: &str, fallback: usize| {
            names
                .iter()
                .position(|n| n == wanted)
                .or(Some(fallback))
                .and_then(|i| outputs.get(i))
        };
        match (find("scores", 0), find("boxes", 1)) {
            (Some(scores), Some(boxes)) => Ok((scores, boxes)),
            _ => Err(FaceError::model("face detector needs scores and boxes outputs")),
        }
    }
}

/// 解码 UltraFace 输出: 人脸类别得分 > 阈值的归一化框 → 帧像素坐标
pub fn decode_ultraface(
    scores: &[f32],
    boxes: &[f32],
    frame_width: u32,
    frame_height: u32,
    conf_threshold: f32,
) -> Vec<Detection> {
    let (w, h) = (frame_width as f32, frame_height as f32);
    scores
        .chunks_exact(2)
        .zip(boxes.chunks_exact(4))
        .filter(|(score, _)| score[1] > conf_threshold)
        .map(|(score, b)| Detection {
            rect: Rect::new(b[0] * w, b[1] * h, b[2] * w, b[3] * h).clamp(frame_width, frame_height),
            confidence: score[1],
        })
        .collect()
}

impl FaceDetector for UltraFaceDetector {
    fn detect(&mut self, image: &RgbImage) -> FaceResult<Vec<Detection>> {
        let resized = image::imageops::resize(image, self.width, self.height, FilterType::Triangle);
        let input = image_tensor(
            &resized,
            Normalization {
                mean: 127.0,
                scale: 1.0 / 128.0,
            },
        )?;
        let outputs = self.backend.run(input)?;
        let (scores, boxes) = self.split_outputs(&outputs)?;

        let mut detections = decode_ultraface(
            &scores.data,
            &boxes.data,
            image.width(),
            image.height(),
            self.conf_threshold,
        );
        non_max_suppression(&mut detections, self.iou_threshold);
        debug!("检测到 {} 张人脸", detections.len());
        Ok(detections)
    }
}
