/// YUV420P ⇄ RGB 转换 (BT.601, 全范围, 定点运算)
///
/// 平面以切片 + 步长传入; 色度平面为亮度的 1/2 × 1/2.
use image::RgbImage;

/// 一帧 YUV420P 的三个平面
pub struct Planes<'a> {
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub y_stride: usize,
    pub uv_stride: usize,
}

/// 可写的 YUV420P 平面
pub struct PlanesMut<'a> {
    pub y: &'a mut [u8],
    pub u: &'a mut [u8],
    pub v: &'a mut [u8],
    pub y_stride: usize,
    pub uv_stride: usize,
}

/// 所需最小平面长度 (亮度, 色度)
pub fn plane_lengths(width: usize, height: usize, y_stride: usize, uv_stride: usize) -> (usize, usize) {
    let chroma_rows = height.div_ceil(2);
    let y_len = if height == 0 { 0 } else { y_stride * (height - 1) + width };
    let uv_len = if chroma_rows == 0 {
        0
    } else {
        uv_stride * (chroma_rows - 1) + width.div_ceil(2)
    };
    (y_len, uv_len)
}

#[inline]
fn to_rgb(y: i32, u: i32, v: i32) -> [u8; 3] {
    let (u, v) = (u - 128, v - 128);
    [
        (y + ((v * 179) >> 7)).clamp(0, 255) as u8,
        (y - ((u * 44) >> 7) - ((v * 91) >> 7)).clamp(0, 255) as u8,
        (y + ((u * 227) >> 7)).clamp(0, 255) as u8,
    ]
}

#[inline]
fn luma(rgb: &[u8; 3]) -> u8 {
    let [r, g, b] = rgb.map(i32::from);
    ((77 * r + 150 * g + 29 * b + 128) >> 8).clamp(0, 255) as u8
}

#[inline]
fn chroma(rgb: &[u8; 3]) -> (i32, i32) {
    let [r, g, b] = rgb.map(i32::from);
    (
        ((-43 * r - 85 * g + 128 * b + 128) >> 8) + 128,
        ((128 * r - 107 * g - 21 * b + 128) >> 8) + 128,
    )
}

/// YUV420P → RGB
pub fn yuv420p_to_rgb(planes: &Planes, image: &mut RgbImage) {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let buffer: &mut [u8] = &mut **image;

    let mut out_idx = 0;
    for row in 0..height {
        let y_row = row * planes.y_stride;
        let uv_row = (row >> 1) * planes.uv_stride;

        for x in 0..width {
            let rgb = to_rgb(
                planes.y[y_row + x] as i32,
                planes.u[uv_row + (x >> 1)] as i32,
                planes.v[uv_row + (x >> 1)] as i32,
            );
            buffer[out_idx..out_idx + 3].copy_from_slice(&rgb);
            out_idx += 3;
        }
    }
}

/// 将 `drawn` 相对 `original` 改变的像素写回 YUV420P 平面
///
/// 只改写变化的亮度像素, 以及包含变化像素的 2×2 色度块,
/// 其余区域保持原始编码数据. 返回改变的像素数.
pub fn write_changed_rgb(planes: &mut PlanesMut, original: &RgbImage, drawn: &RgbImage) -> usize {
    let (width, height) = (drawn.width() as usize, drawn.height() as usize);
    let mut changed = 0;

    for by in (0..height).step_by(2) {
        for bx in (0..width).step_by(2) {
            let mut block_dirty = false;
            let (mut u_sum, mut v_sum, mut n) = (0, 0, 0);

            for y in by..(by + 2).min(height) {
                for x in bx..(bx + 2).min(width) {
                    let after = drawn.get_pixel(x as u32, y as u32).0;
                    if original.get_pixel(x as u32, y as u32).0 != after {
                        planes.y[y * planes.y_stride + x] = luma(&after);
                        block_dirty = true;
                        changed += 1;
                    }
                    let (u, v) = chroma(&after);
                    u_sum += u;
                    v_sum += v;
                    n += 1;
                }
            }

            if block_dirty {
                let idx = (by >> 1) * planes.uv_stride + (bx >> 1);
                planes.u[idx] = ((u_sum + n / 2) / n).clamp(0, 255) as u8;
                planes.v[idx] = ((v_sum + n / 2) / n).clamp(0, 255) as u8;
            }
        }
    }
    changed
}
