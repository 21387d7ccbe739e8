//! 相关跟踪器 (Correlation tracker)
//!
//! 灰度模板 + 归一化互相关匹配, 置信度为响应图的峰值旁瓣比 (PSR).
//! 大脸先缩小到 `TEMPLATE_SIZE` 再匹配, 控制每帧开销.

use image::imageops::{self, FilterType};
use image::{GenericImageView, GrayImage, Luma, RgbImage};
use imageproc::definitions::Image;
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};

use super::types::Rect;

/// 单目标视觉跟踪
pub trait VisualTracker {
    /// 以 `rect` 处的外观初始化
    fn start(&mut self, image: &RgbImage, rect: &Rect<f32>);

    /// 在新帧中定位目标, 返回置信度
    fn update(&mut self, image: &RgbImage) -> f32;

    fn position(&self) -> Rect<f32>;
}

/// 模板最长边 (像素)
const TEMPLATE_SIZE: f32 = 32.0;
/// 搜索窗口相对目标的放大倍数
const SEARCH_PADDING: f32 = 2.0;
/// 峰值周围排除窗口半径 (响应图像素)
const PEAK_EXCLUSION: u32 = 2;
const LEARNING_RATE: f32 = 0.125;

#[derive(Debug, Clone, Default)]
pub struct CorrelationTracker {
    template: Option<GrayImage>,
    /// 模板像素 / 帧像素
    scale: f32,
    position: Rect<f32>,
}

/// 整数像素区域 (x, y, w, h), 限制在图像内
fn pixel_region(rect: &Rect<f32>, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let r = rect.clamp(width, height);
    let (x0, y0) = (r.left.floor() as u32, r.top.floor() as u32);
    let (x1, y1) = (r.right.ceil() as u32, r.bottom.ceil() as u32);
    (x1 > x0 + 1 && y1 > y0 + 1).then_some((x0, y0, x1 - x0, y1 - y0))
}

/// 裁剪并按 `scale` 缩放
fn crop_scaled(gray: &GrayImage, region: (u32, u32, u32, u32), scale: f32) -> GrayImage {
    let (x, y, w, h) = region;
    let patch = imageops::crop_imm(gray, x, y, w, h).to_image();
    let (sw, sh) = (
        ((w as f32 * scale).round() as u32).max(1),
        ((h as f32 * scale).round() as u32).max(1),
    );
    if (sw, sh) == (w, h) {
        patch
    } else {
        imageops::resize(&patch, sw, sh, FilterType::Triangle)
    }
}

/// 峰值旁瓣比: (峰值 - 旁瓣均值) / 旁瓣标准差
pub fn peak_to_sidelobe(response: &Image<Luma<f32>>, peak: (u32, u32), exclusion: u32) -> f32 {
    let peak_value = response.get_pixel(peak.0, peak.1)[0] as f64;
    let (mut sum, mut sum_sq, mut n) = (0.0f64, 0.0f64, 0usize);
    for (x, y, p) in response.enumerate_pixels() {
        if x.abs_diff(peak.0) <= exclusion && y.abs_diff(peak.1) <= exclusion {
            continue;
        }
        let v = p[0] as f64;
        sum += v;
        sum_sq += v * v;
        n += 1;
    }
    if n == 0 {
        return 0.0;
    }
    let mean = sum / n as f64;
    let std = (sum_sq / n as f64 - mean * mean).max(0.0).sqrt();
    ((peak_value - mean) / std.max(1e-6)) as f32
}

impl VisualTracker for CorrelationTracker {
    fn start(&mut self, image: &RgbImage, rect: &Rect<f32>) {
        let gray = imageops::grayscale(image);
        let Some(region) = pixel_region(rect, image.width(), image.height()) else {
            self.template = None;
            self.position = *rect;
            return;
        };
        let (x, y, w, h) = region;
        self.scale = (TEMPLATE_SIZE / w.max(h) as f32).min(1.0);
        self.template = Some(crop_scaled(&gray, region, self.scale));
        // 对齐到整数像素, 与模板原点一致
        self.position = Rect::new(
            x as f32,
            y as f32,
            x as f32 + rect.width(),
            y as f32 + rect.height(),
        );
    }

    fn update(&mut self, image: &RgbImage) -> f32 {
        let Some(template) = self.template.as_mut() else {
            return 0.0;
        };
        let search_rect = self.position.scaled(SEARCH_PADDING);
        let Some(region) = pixel_region(&search_rect, image.width(), image.height()) else {
            return 0.0;
        };
        let gray = imageops::grayscale(image);
        let search = crop_scaled(&gray, region, self.scale);
        if search.width() < template.width() || search.height() < template.height() {
            return 0.0;
        }

        let response = match_template(&search, template, MatchTemplateMethod::CrossCorrelationNormalized);
        let extremes = find_extremes(&response);
        let (px, py) = extremes.max_value_location;
        let confidence = peak_to_sidelobe(&response, (px, py), PEAK_EXCLUSION);

        let (w, h) = (self.position.width(), self.position.height());
        let left = region.0 as f32 + px as f32 / self.scale;
        let top = region.1 as f32 + py as f32 / self.scale;
        self.position = Rect::new(left, top, left + w, top + h);

        // 模板缓慢适应外观变化
        let observed = imageops::crop_imm(&search, px, py, template.width(), template.height());
        for (t, (_, _, o)) in template.pixels_mut().zip(observed.pixels()) {
            let blended = t[0] as f32 * (1.0 - LEARNING_RATE) + o[0] as f32 * LEARNING_RATE;
            t[0] = blended.round() as u8;
        }

        // 全平坦图像上的响应无定义
        if confidence.is_finite() {
            confidence
        } else {
            0.0
        }
    }

    fn position(&self) -> Rect<f32> {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn background(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = ((x * 7 + y * 13) % 50 + 20) as u8;
            Rgb([v, v, v])
        })
    }

    fn paint_face(image: &mut RgbImage, left: u32, top: u32) {
        for dy in 0..20u32 {
            for dx in 0..20u32 {
                let v = ((dx * dx + 3 * dy + dx * dy) % 180 + 60) as u8;
                image.put_pixel(left + dx, top + dy, Rgb([v, v, v]));
            }
        }
    }

    #[test]
    fn test_follows_moving_patch() {
        let mut first = background(120, 120);
        paint_face(&mut first, 30, 30);
        let mut second = background(120, 120);
        paint_face(&mut second, 36, 33);

        let mut tracker = CorrelationTracker::default();
        tracker.start(&first, &Rect::new(30.0, 30.0, 50.0, 50.0));
        let confidence = tracker.update(&second);

        assert_eq!(tracker.position(), Rect::new(36.0, 33.0, 56.0, 53.0));
        assert!(confidence.is_finite() && confidence > 0.0, "psr {confidence}");
    }

    #[test]
    fn test_degenerate_start_reports_lost() {
        let image = background(40, 40);
        let mut tracker = CorrelationTracker::default();
        tracker.start(&image, &Rect::new(50.0, 50.0, 60.0, 60.0));
        assert_eq!(tracker.update(&image), 0.0);
        assert_eq!(tracker.update(&background(40, 40)), 0.0);
    }

    #[test]
    fn test_peak_to_sidelobe() {
        let mut response: Image<Luma<f32>> = Image::from_fn(9, 9, |x, y| {
            Luma([if (x + y) % 2 == 0 { 0.2 } else { 0.0 }])
        });
        response.put_pixel(4, 4, Luma([1.0]));
        // 排除 3x3 后旁瓣 36 个 0.2 与 36 个 0.0: 均值 0.1, 标准差 0.1
        let psr = peak_to_sidelobe(&response, (4, 4), 1);
        assert!((psr - 9.0).abs() < 1e-3, "psr {psr}");
    }
}
