/// ONNX Runtime 推理后端
use std::path::{Path, PathBuf};

use image::RgbImage;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::info;

use crate::error::{FaceError, FaceResult};

/// 模型输出张量 (拷贝出会话)
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// 像素归一化: `(p - mean) * scale`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: f32,
    pub scale: f32,
}

impl Normalization {
    /// [0, 1]
    pub const UNIT: Self = Self {
        mean: 0.0,
        scale: 1.0 / 255.0,
    };
}

pub struct OrtBackend {
    session: Session,
    path: PathBuf,
    output_names: Vec<String>,
}

impl OrtBackend {
    pub fn load(path: &Path) -> FaceResult<Self> {
        if !path.exists() {
            return Err(FaceError::ModelNotFound(path.to_path_buf()));
        }
        let model_bytes = std::fs::read(path)?;

        let session = Session::builder()
            .map_err(|e| FaceError::model(format!("ORT session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| FaceError::model(format!("ORT opt level: {e}")))?
            .commit_from_memory(model_bytes.as_slice())
            .map_err(|e| FaceError::model(format!("ORT load {}: {e}", path.display())))?;

        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        info!("模型加载成功: {} (输出 {:?})", path.display(), output_names);

        Ok(Self {
            session,
            path: path.to_path_buf(),
            output_names,
        })
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// 单输入推理, 按声明顺序返回全部输出
    pub fn run(&mut self, input: Value) -> FaceResult<Vec<OutputTensor>> {
        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| FaceError::model(format!("ORT run {}: {e}", self.path.display())))?;

        let mut tensors = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let value = outputs
                .get(name.as_str())
                .ok_or_else(|| FaceError::model(format!("missing output {name}")))?;
            let (shape, data) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| FaceError::model(format!("ORT extract {name}: {e}")))?;
            tensors.push(OutputTensor {
                shape: shape.iter().map(|&d| d.max(0) as usize).collect(),
                data: data.to_vec(),
            });
        }
        Ok(tensors)
    }
}

/// RGB 图像 → NCHW 张量 `[1, 3, H, W]`
pub fn image_to_nchw(image: &RgbImage, norm: Normalization) -> Array4<f32> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut ys = Array4::zeros((1, 3, h, w));
    for (x, y, pixel) in image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            ys[[0, c, y, x]] = (pixel[c] as f32 - norm.mean) * norm.scale;
        }
    }
    ys
}

pub fn image_tensor(image: &RgbImage, norm: Normalization) -> FaceResult<Value> {
    let ys = image_to_nchw(image, norm);
    let shape = ys.shape().to_vec();
    let (data, _) = ys.into_raw_vec_and_offset();
    Tensor::from_array((shape, data.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| FaceError::model(format!("ORT tensor: {e}")))
}
