//! 标注文件写出 (Annotation writers)
//!
//! 固定精度的行格式:
//! - 人脸框 `%.3f %d %.3f %.3f %.3f %.3f %s`
//! - 关键点 `%.3f %d` + 每点 ` %.5f %.5f`
//! - 特征   `%.3f %d` + 每维 ` %.5f`

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::detection::types::{NormalizedBox, TrackId};
use crate::error::FaceResult;

pub struct AnnotationWriter<W: Write> {
    inner: W,
    lines: u64,
}

impl AnnotationWriter<BufWriter<File>> {
    /// 创建 (覆盖) 输出文件
    pub fn create(path: &Path) -> FaceResult<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> AnnotationWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, lines: 0 }
    }

    pub fn write_face(
        &mut self,
        time: f64,
        track: TrackId,
        bbox: &NormalizedBox,
        status: &str,
    ) -> io::Result<()> {
        write!(
            self.inner,
            "{:.3} {} {:.3} {:.3} {:.3} {:.3}",
            time, track, bbox.left, bbox.top, bbox.right, bbox.bottom
        )?;
        if !status.is_empty() {
            write!(self.inner, " {}", status)?;
        }
        self.end_line()
    }

    pub fn write_landmarks<I>(&mut self, time: f64, track: TrackId, points: I) -> io::Result<()>
    where
        I: IntoIterator<Item = (f32, f32)>,
    {
        write!(self.inner, "{:.3} {}", time, track)?;
        for (x, y) in points {
            write!(self.inner, " {:.5} {:.5}", x, y)?;
        }
        self.end_line()
    }

    pub fn write_embedding(&mut self, time: f64, track: TrackId, values: &[f32]) -> io::Result<()> {
        write!(self.inner, "{:.3} {}", time, track)?;
        for x in values {
            write!(self.inner, " {:.5}", x)?;
        }
        self.end_line()
    }

    /// 每帧/每组结束后调用, 异常退出时最多丢失当前帧
    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    /// 已写出的行数
    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn end_line(&mut self) -> io::Result<()> {
        self.lines += 1;
        self.inner.write_all(b"\n")
    }
}
