/// 人脸流水线数据结构定义
/// Data structures shared by the face pipeline
use std::fmt;

/// 轨迹标识 (Track identifier)
pub type TrackId = u32;

// ========== 坐标类型 ==========

/// 矩形坐标的数值表示
///
/// `i32` 为整数像素 (截断取整, 与关键点裁剪一致),
/// `f32` 为亚像素精度 (用于绘制与跟踪).
pub trait Coord: Copy + PartialOrd + Default + fmt::Debug {
    fn from_pixel(value: f32) -> Self;
    fn to_f32(self) -> f32;
}

impl Coord for i32 {
    #[inline]
    fn from_pixel(value: f32) -> Self {
        // 向零截断
        value as i32
    }

    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }
}

impl Coord for f32 {
    #[inline]
    fn from_pixel(value: f32) -> Self {
        value
    }

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }
}

// ========== 数据结构 ==========

/// 像素坐标矩形 (left, top, right, bottom)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect<T> {
    pub left: T,
    pub top: T,
    pub right: T,
    pub bottom: T,
}

impl<T: Coord> Rect<T> {
    pub fn new(left: T, top: T, right: T, bottom: T) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right.to_f32() - self.left.to_f32()
    }

    pub fn height(&self) -> f32 {
        self.bottom.to_f32() - self.top.to_f32()
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.) * self.height().max(0.)
    }

    pub fn center(&self) -> Point2 {
        Point2::new(
            (self.left.to_f32() + self.right.to_f32()) / 2.,
            (self.top.to_f32() + self.bottom.to_f32()) / 2.,
        )
    }

    pub fn to_f32(&self) -> Rect<f32> {
        Rect::new(
            self.left.to_f32(),
            self.top.to_f32(),
            self.right.to_f32(),
            self.bottom.to_f32(),
        )
    }

    pub fn intersection_area(&self, another: &Rect<T>) -> f32 {
        let l = self.left.to_f32().max(another.left.to_f32());
        let r = self.right.to_f32().min(another.right.to_f32());
        let t = self.top.to_f32().max(another.top.to_f32());
        let b = self.bottom.to_f32().min(another.bottom.to_f32());
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &Rect<T>) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Rect<T>) -> f32 {
        let union = self.union(another);
        if union <= 0. {
            return 0.;
        }
        self.intersection_area(another) / union
    }

    /// 归一化到 [0,1] (除以帧宽/帧高)
    pub fn normalize(&self, frame_width: u32, frame_height: u32) -> NormalizedBox {
        let (w, h) = (frame_width as f32, frame_height as f32);
        NormalizedBox {
            left: self.left.to_f32() / w,
            top: self.top.to_f32() / h,
            right: self.right.to_f32() / w,
            bottom: self.bottom.to_f32() / h,
        }
    }
}

impl Rect<f32> {
    /// 转换到另一种坐标精度
    pub fn cast<C: Coord>(&self) -> Rect<C> {
        Rect::new(
            C::from_pixel(self.left),
            C::from_pixel(self.top),
            C::from_pixel(self.right),
            C::from_pixel(self.bottom),
        )
    }

    /// 以中心为基准缩放
    pub fn scaled(&self, factor: f32) -> Self {
        let c = self.center();
        let (hw, hh) = (self.width() * factor / 2., self.height() * factor / 2.);
        Rect::new(c.x - hw, c.y - hh, c.x + hw, c.y + hh)
    }

    /// 平移到新的中心点 (尺寸不变)
    pub fn centered_at(&self, center: Point2) -> Self {
        let (hw, hh) = (self.width() / 2., self.height() / 2.);
        Rect::new(center.x - hw, center.y - hh, center.x + hw, center.y + hh)
    }

    /// 限制在帧范围内
    pub fn clamp(&self, frame_width: u32, frame_height: u32) -> Self {
        let (w, h) = (frame_width as f32, frame_height as f32);
        Rect::new(
            self.left.clamp(0., w),
            self.top.clamp(0., h),
            self.right.clamp(0., w),
            self.bottom.clamp(0., h),
        )
    }
}

/// 归一化坐标框 (文件中的原始数值)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl NormalizedBox {
    /// 乘以帧宽/帧高还原为像素矩形
    pub fn denormalize<C: Coord>(&self, frame_width: u32, frame_height: u32) -> Rect<C> {
        let (w, h) = (frame_width as f32, frame_height as f32);
        Rect::new(
            C::from_pixel(self.left * w),
            C::from_pixel(self.top * h),
            C::from_pixel(self.right * w),
            C::from_pixel(self.bottom * h),
        )
    }
}

/// 二维点
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// 归一化坐标 → 最近的整数像素 (与 numpy.round 一致, 四舍六入五成双)
    pub fn denormalize(x: f32, y: f32, frame_width: u32, frame_height: u32) -> Self {
        Self {
            x: (x * frame_width as f32).round_ties_even(),
            y: (y * frame_height as f32).round_ties_even(),
        }
    }
}

/// 检测框 (Detection bounding box)
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub rect: Rect<f32>,
    pub confidence: f32,
}

/// 某一时刻的人脸 (轨迹标识 + 矩形 + 状态)
#[derive(Clone, Debug, PartialEq)]
pub struct Face<C> {
    pub track: TrackId,
    pub rect: Rect<C>,
    pub status: String,
}

/// 某一时刻的关键点集合
#[derive(Clone, Debug, PartialEq)]
pub struct Landmarks {
    pub track: TrackId,
    pub points: Vec<Point2>,
}
