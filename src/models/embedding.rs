/// 人脸特征提取 (ONNX), 输入为对齐后的人脸
use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;

use super::ort_backend::{image_tensor, Normalization, OrtBackend};
use super::FaceEmbedder;
use crate::error::{FaceError, FaceResult};

/// 对齐人脸边长 (OpenFace nn4.small2)
pub const DEFAULT_EMBEDDING_INPUT: u32 = 96;

pub struct OrtFaceEmbedder {
    backend: OrtBackend,
    input_size: u32,
}

impl OrtFaceEmbedder {
    pub fn load(path: &Path) -> FaceResult<Self> {
        Ok(Self {
            backend: OrtBackend::load(path)?,
            input_size: DEFAULT_EMBEDDING_INPUT,
        })
    }
}

impl FaceEmbedder for OrtFaceEmbedder {
    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn embed(&mut self, aligned: &RgbImage) -> FaceResult<Vec<f32>> {
        let resized;
        let input = if aligned.dimensions() == (self.input_size, self.input_size) {
            aligned
        } else {
            resized = image::imageops::resize(
                aligned,
                self.input_size,
                self.input_size,
                FilterType::Triangle,
            );
            &resized
        };

        let outputs = self.backend.run(image_tensor(input, Normalization::UNIT)?)?;
        outputs
            .into_iter()
            .next()
            .map(|output| output.data)
            .ok_or_else(|| FaceError::model("embedding model returned no outputs"))
    }
}
