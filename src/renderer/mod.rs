/// 标注叠加渲染 (Overlay renderer)
///
/// 在帧上绘制: 时间戳, 每张人脸的框/编号/标签, 以及可选的鼻梁线.
/// 颜色按轨迹号取自 `PALETTE`, 文字统一为红色.
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect as PixelRect;
use tracing::{info, warn};

use crate::annotation::Labels;
use crate::detection::types::{Face, Landmarks};
use crate::error::{FaceError, FaceResult};
use crate::{track_color, NOSE_BRIDGE};

pub mod overlay_filter;

pub use overlay_filter::OverlayFilter;

/// 文字颜色
pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// 文字高度 (像素)
pub const TEXT_SCALE: f32 = 14.0;

/// 未指定字体时依次尝试
const FONT_CANDIDATES: [&str; 5] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
];

fn read_font(path: &Path) -> FaceResult<FontVec> {
    if !path.exists() {
        return Err(FaceError::FileNotFound(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    FontVec::try_from_vec(bytes).map_err(|_| FaceError::malformed(path, 0, "not a TrueType/OpenType font"))
}

/// 加载字体
///
/// 显式指定的字体必须可用; 否则在常见系统路径中查找, 找不到时返回 None
/// (只画框与线, 不画文字).
pub fn load_font(path: Option<&Path>) -> FaceResult<Option<FontVec>> {
    if let Some(path) = path {
        return read_font(path).map(Some);
    }
    for candidate in FONT_CANDIDATES.iter().map(PathBuf::from) {
        if let Ok(font) = read_font(&candidate) {
            info!("字体: {}", candidate.display());
            return Ok(Some(font));
        }
    }
    warn!("未找到可用字体, 跳过文字绘制 (可用 --font 指定)");
    Ok(None)
}

/// 以基线左端为锚点绘制文字
fn draw_label(image: &mut RgbImage, font: Option<&FontVec>, x: i32, baseline: i32, text: &str) {
    let Some(font) = font else {
        return;
    };
    if text.is_empty() {
        return;
    }
    let top = baseline - TEXT_SCALE as i32;
    draw_text_mut(image, TEXT_COLOR, x, top, PxScale::from(TEXT_SCALE), font, text);
}

/// 2 像素宽的矩形框 (外沿为 left..=right)
fn draw_box(image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32, color: Rgb<u8>) {
    for inset in 0..2 {
        let (w, h) = (right - left + 1 - 2 * inset, bottom - top + 1 - 2 * inset);
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = PixelRect::at(left + inset, top + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// 在 `image` 上绘制一帧的标注
///
/// `landmarks` 按轨迹号与人脸对应; 少于 34 个点时不画鼻梁线.
pub fn draw_overlay(
    image: &mut RgbImage,
    time: f64,
    faces: &[Face<f32>],
    landmarks: Option<&[Landmarks]>,
    labels: &Labels,
    font: Option<&FontVec>,
) {
    let height = image.height() as i32;
    draw_label(image, font, 10, height - 10, &format!("{:.3}", time));

    for face in faces {
        let color = Rgb(track_color(face.track));
        let (left, top) = (face.rect.left as i32, face.rect.top as i32);
        let (right, bottom) = (face.rect.right as i32, face.rect.bottom as i32);

        draw_box(image, left, top, right, bottom, color);
        draw_label(image, font, left, bottom + 15, &format!("#{}", face.track));
        let label = labels.get(&face.track).map(String::as_str).unwrap_or("");
        draw_label(image, font, left, top - 7, label);

        let Some(shape) = landmarks.and_then(|sets| sets.iter().find(|l| l.track == face.track))
        else {
            continue;
        };
        let (a, b) = NOSE_BRIDGE;
        if let (Some(p), Some(q)) = (shape.points.get(a), shape.points.get(b)) {
            draw_line_segment_mut(
                image,
                (p.x.trunc(), p.y.trunc()),
                (q.x.trunc(), q.y.trunc()),
                color,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::{Point2, Rect};

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn face(track: u32, rect: Rect<f32>) -> Face<f32> {
        Face {
            track,
            rect,
            status: String::new(),
        }
    }

    fn nose(track: u32, count: usize) -> Landmarks {
        let mut points = vec![Point2::default(); count];
        if count > 33 {
            points[27] = Point2::new(50.0, 40.0);
            points[33] = Point2::new(50.0, 60.0);
        }
        Landmarks { track, points }
    }

    #[test]
    fn test_box_is_two_pixels_wide() {
        let mut image = RgbImage::new(100, 100);
        let faces = [face(1, Rect::new(10.0, 10.0, 30.7, 30.2))];
        draw_overlay(&mut image, 1.0, &faces, None, &Labels::new(), None);

        let color = Rgb(track_color(1));
        assert_eq!(*image.get_pixel(10, 10), color);
        assert_eq!(*image.get_pixel(11, 11), color);
        assert_eq!(*image.get_pixel(12, 12), BLACK);
        assert_eq!(*image.get_pixel(20, 10), color);
        assert_eq!(*image.get_pixel(30, 30), color);
        assert_eq!(*image.get_pixel(29, 20), color);
        assert_eq!(*image.get_pixel(31, 31), BLACK);
        assert_eq!(*image.get_pixel(20, 20), BLACK);
    }

    #[test]
    fn test_nose_line_matched_by_track() {
        let mut image = RgbImage::new(100, 100);
        let faces = [
            face(3, Rect::new(30.0, 30.0, 70.0, 70.0)),
            face(4, Rect::new(80.0, 80.0, 90.0, 90.0)),
        ];
        // 关键点组顺序与人脸顺序不同
        let shapes = [nose(4, 10), nose(3, 68)];
        draw_overlay(&mut image, 0.0, &faces, Some(&shapes), &Labels::new(), None);

        assert_eq!(*image.get_pixel(50, 50), Rgb(track_color(3)));
        assert_eq!(*image.get_pixel(50, 45), Rgb(track_color(3)));
    }

    #[test]
    fn test_short_landmark_set_draws_no_line() {
        let mut image = RgbImage::new(100, 100);
        let faces = [face(0, Rect::new(30.0, 30.0, 70.0, 70.0))];
        let shapes = [nose(0, 20)];
        draw_overlay(&mut image, 0.0, &faces, Some(&shapes), &Labels::new(), None);
        assert_eq!(*image.get_pixel(50, 50), BLACK);
    }

    #[test]
    fn test_small_and_offscreen_faces() {
        let mut image = RgbImage::new(20, 20);
        let faces = [
            face(0, Rect::new(5.0, 5.0, 8.0, 8.0)),
            face(1, Rect::new(-10.0, -10.0, 40.0, 40.0)),
        ];
        draw_overlay(&mut image, 0.0, &faces, None, &Labels::new(), None);
        assert_eq!(*image.get_pixel(5, 5), Rgb(track_color(0)));
        assert_eq!(*image.get_pixel(10, 10), BLACK);
    }

    #[test]
    fn test_explicit_font_must_exist() {
        assert!(matches!(
            load_font(Some(Path::new("/no/such/font.ttf"))),
            Err(FaceError::FileNotFound(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(matches!(
            load_font(Some(&path)),
            Err(FaceError::Malformed { .. })
        ));
    }
}
