/// 人脸对齐 (Face alignment)
///
/// 以 68 点方案中的两个外眼角与鼻尖为锚点, 求三点仿射变换,
/// 将人脸映射到固定模板 (类似 cv2::getAffineTransform + cv2::warpAffine).
use image::{Rgb, RgbImage};

use crate::detection::types::Point2;
use crate::error::{FaceError, FaceResult};

/// 左外眼角, 右外眼角, 鼻尖
pub const OUTER_EYES_AND_NOSE: [usize; 3] = [36, 45, 33];

/// 锚点在对齐图像中的归一化位置 (乘以输出边长)
pub const OUTER_EYES_AND_NOSE_TEMPLATE: [(f32, f32); 3] =
    [(0.1885, 0.1727), (0.8115, 0.1727), (0.5000, 0.5307)];

/// 仿射变换矩阵 (2x3)
/// | a11 a12 b1 |
/// | a21 a22 b2 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMatrix {
    pub a11: f32,
    pub a12: f32,
    pub b1: f32,
    pub a21: f32,
    pub a22: f32,
    pub b2: f32,
}

impl AffineMatrix {
    pub fn identity() -> Self {
        Self::scale(1.0, 1.0)
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            a11: sx,
            a12: 0.0,
            b1: 0.0,
            a21: 0.0,
            a22: sy,
            b2: 0.0,
        }
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a11 * x + self.a12 * y + self.b1,
            self.a21 * x + self.a22 * y + self.b2,
        )
    }

    /// 逆矩阵 (反向映射用); 退化时返回 None
    pub fn inverse(&self) -> Option<Self> {
        let det = self.a11 * self.a22 - self.a12 * self.a21;
        if det.abs() < 1e-10 {
            return None;
        }

        let inv_det = 1.0 / det;
        Some(Self {
            a11: self.a22 * inv_det,
            a12: -self.a12 * inv_det,
            b1: (self.a12 * self.b2 - self.a22 * self.b1) * inv_det,
            a21: -self.a21 * inv_det,
            a22: self.a11 * inv_det,
            b2: (self.a21 * self.b1 - self.a11 * self.b2) * inv_det,
        })
    }

    /// 由三组对应点求仿射矩阵 (src → dst); 三点共线时返回 None
    pub fn from_triangles(src: [(f32, f32); 3], dst: [(f32, f32); 3]) -> Option<Self> {
        // x' = a11 x + a12 y + b1 与 y' = a21 x + a22 y + b2 共用同一个 3x3 系数矩阵
        let [(x0, y0), (x1, y1), (x2, y2)] = src;
        let det = x0 * (y1 - y2) - y0 * (x1 - x2) + (x1 * y2 - x2 * y1);
        if det.abs() < 1e-6 {
            return None;
        }

        // Cramer 法则求解 [x y 1] · [a b c]^T = t
        let solve = |t0: f32, t1: f32, t2: f32| -> (f32, f32, f32) {
            let a = (t0 * (y1 - y2) - y0 * (t1 - t2) + (t1 * y2 - t2 * y1)) / det;
            let b = (x0 * (t1 - t2) - t0 * (x1 - x2) + (x1 * t2 - x2 * t1)) / det;
            let c = (x0 * (y1 * t2 - y2 * t1) - y0 * (x1 * t2 - x2 * t1)
                + t0 * (x1 * y2 - x2 * y1))
                / det;
            (a, b, c)
        };

        let (a11, a12, b1) = solve(dst[0].0, dst[1].0, dst[2].0);
        let (a21, a22, b2) = solve(dst[0].1, dst[1].1, dst[2].1);
        Some(Self {
            a11,
            a12,
            b1,
            a21,
            a22,
            b2,
        })
    }
}

/// 仿射变换 (RGB, 双线性插值, 越界填充黑色)
pub fn warp_affine(src: &RgbImage, matrix: &AffineMatrix, size: (u32, u32)) -> FaceResult<RgbImage> {
    let inverse = matrix
        .inverse()
        .ok_or_else(|| FaceError::model("degenerate alignment transform"))?;

    let mut dst = RgbImage::new(size.0, size.1);
    for (x, y, pixel) in dst.enumerate_pixels_mut() {
        let (sx, sy) = inverse.transform_point(x as f32, y as f32);
        *pixel = sample_bilinear(src, sx, sy);
    }
    Ok(dst)
}

fn sample_bilinear(src: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);

    let fetch = |px: i64, py: i64| -> [f32; 3] {
        if px < 0 || py < 0 || px >= src.width() as i64 || py >= src.height() as i64 {
            return [0.0; 3];
        }
        src.get_pixel(px as u32, py as u32).0.map(f32::from)
    };

    let (p00, p10) = (fetch(x0, y0), fetch(x0 + 1, y0));
    let (p01, p11) = (fetch(x0, y0 + 1), fetch(x0 + 1, y0 + 1));

    let mut out = [0u8; 3];
    for c in 0..3 {
        let v0 = p00[c] * (1.0 - fx) + p10[c] * fx;
        let v1 = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = (v0 * (1.0 - fy) + v1 * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// 将人脸对齐到 `size × size` 的模板
pub fn align_face(image: &RgbImage, landmarks: &[Point2], size: u32) -> FaceResult<RgbImage> {
    let max_index = OUTER_EYES_AND_NOSE.iter().copied().max().unwrap_or(0);
    if landmarks.len() <= max_index {
        return Err(FaceError::model(format!(
            "alignment needs {} landmarks, got {}",
            max_index + 1,
            landmarks.len()
        )));
    }

    let src = OUTER_EYES_AND_NOSE.map(|i| (landmarks[i].x, landmarks[i].y));
    let dst = OUTER_EYES_AND_NOSE_TEMPLATE.map(|(x, y)| (x * size as f32, y * size as f32));
    let matrix = AffineMatrix::from_triangles(src, dst)
        .ok_or_else(|| FaceError::model("collinear alignment landmarks"))?;

    warp_affine(image, &matrix, (size, size))
}

/// RGB → BGR (就地交换通道)
pub fn swap_red_blue(image: &mut RgbImage) {
    for pixel in image.pixels_mut() {
        pixel.0.swap(0, 2);
    }
}
