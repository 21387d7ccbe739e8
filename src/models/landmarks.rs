/// 人脸关键点回归 (ONNX)
///
/// 输入: 人脸框裁剪并缩放到 `input_size × input_size`, 像素归一化到 [0, 1].
/// 输出: `[1, 2N]` 或 `[1, N, 2]`, 坐标为裁剪区域内的归一化值.
use std::path::Path;

use image::RgbImage;

use super::alignment::{warp_affine, AffineMatrix};
use super::ort_backend::{image_tensor, Normalization, OrtBackend};
use super::LandmarkPredictor;
use crate::detection::types::{Point2, Rect};
use crate::error::{FaceError, FaceResult};

pub const DEFAULT_LANDMARK_INPUT: u32 = 112;

/// 裁剪区域相对人脸框的放大倍数
const CROP_SCALE: f32 = 1.0;

pub struct OrtLandmarkPredictor {
    backend: OrtBackend,
    input_size: u32,
}

impl OrtLandmarkPredictor {
    pub fn load(path: &Path) -> FaceResult<Self> {
        Ok(Self {
            backend: OrtBackend::load(path)?,
            input_size: DEFAULT_LANDMARK_INPUT,
        })
    }
}

/// 以人脸框中心取正方形裁剪区域
pub fn square_crop(face: &Rect<i32>, scale: f32) -> Rect<f32> {
    let rect = face.to_f32();
    let side = rect.width().max(rect.height()).max(1.0) * scale;
    Rect::new(0.0, 0.0, side, side).centered_at(rect.center())
}

/// 裁剪区域 → 模型输入的变换
pub fn crop_transform(crop: &Rect<f32>, input_size: u32) -> AffineMatrix {
    let s = input_size as f32 / crop.width();
    AffineMatrix {
        b1: -crop.left * s,
        b2: -crop.top * s,
        ..AffineMatrix::scale(s, s)
    }
}

/// 归一化输出坐标 → 帧像素坐标
pub fn decode_points(values: &[f32], crop: &Rect<f32>) -> FaceResult<Vec<Point2>> {
    if values.len() % 2 != 0 {
        return Err(FaceError::model(format!(
            "landmark output has odd length {}",
            values.len()
        )));
    }
    Ok(values
        .chunks_exact(2)
        .map(|xy| {
            Point2::new(
                crop.left + xy[0] * crop.width(),
                crop.top + xy[1] * crop.height(),
            )
        })
        .collect())
}

impl LandmarkPredictor for OrtLandmarkPredictor {
    fn predict(&mut self, image: &RgbImage, face: &Rect<i32>) -> FaceResult<Vec<Point2>> {
        let crop = square_crop(face, CROP_SCALE);
        let matrix = crop_transform(&crop, self.input_size);
        let input = warp_affine(image, &matrix, (self.input_size, self.input_size))?;

        let outputs = self.backend.run(image_tensor(&input, Normalization::UNIT)?)?;
        let output = outputs
            .first()
            .ok_or_else(|| FaceError::model("landmark model returned no outputs"))?;
        decode_points(&output.data, &crop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_crop_centred_on_face() {
        let crop = square_crop(&Rect::new(10, 20, 30, 60), 1.0);
        assert_eq!(crop, Rect::new(0.0, 20.0, 40.0, 60.0));

        let crop = square_crop(&Rect::new(0, 0, 10, 10), 2.0);
        assert_eq!(crop, Rect::new(-5.0, -5.0, 15.0, 15.0));
    }

    #[test]
    fn test_crop_transform_maps_corners() {
        let crop = Rect::new(10.0, 20.0, 66.0, 76.0);
        let m = crop_transform(&crop, 112);
        assert_eq!(m.transform_point(10.0, 20.0), (0.0, 0.0));
        assert_eq!(m.transform_point(66.0, 76.0), (112.0, 112.0));
    }

    #[test]
    fn test_decode_points() {
        let crop = Rect::new(10.0, 20.0, 110.0, 120.0);
        let points = decode_points(&[0.0, 0.0, 0.5, 0.25], &crop).unwrap();
        assert_eq!(points, vec![Point2::new(10.0, 20.0), Point2::new(60.0, 45.0)]);
        assert!(decode_points(&[0.1, 0.2, 0.3], &crop).is_err());
    }
}
