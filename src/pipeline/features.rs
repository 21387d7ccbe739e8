//! 特征驱动: 视频 + 关键点文件 → 特征文件
//!
//! 关键点 → 三点仿射对齐 → RGB 转 BGR → 特征模型.

use std::io::Write;

use tracing::info;

use super::Progress;
use crate::annotation::{read_landmarks, AnnotationWriter};
use crate::config::FeaturesArgs;
use crate::detection::Landmarks;
use crate::error::FaceResult;
use crate::input::{FrameSource, VideoSource};
use crate::models::alignment::{align_face, swap_red_blue};
use crate::models::{FaceEmbedder, OrtFaceEmbedder};
use crate::replay::Replay;

/// 逐帧提取特征, 返回写出的行数
pub fn extract_features<S, E, W>(
    source: &mut S,
    shapes: &mut Replay<Landmarks>,
    embedder: &mut E,
    writer: &mut AnnotationWriter<W>,
) -> FaceResult<u64>
where
    S: FrameSource,
    E: FaceEmbedder,
    W: Write,
{
    let size = embedder.input_size();
    let mut progress = Progress::new("特征");

    for frame in source.by_ref() {
        let frame = frame?;
        let reply = shapes.query(frame.time);
        for shape in &reply.items {
            let mut aligned = align_face(&frame.image, &shape.points, size)?;
            swap_red_blue(&mut aligned);
            let embedding = embedder.embed(&aligned)?;
            writer.write_embedding(reply.time, shape.track, &embedding)?;
        }
        writer.flush()?;
        progress.tick(frame.time);

        if shapes.is_exhausted() {
            break;
        }
    }

    info!("特征完成: {} 帧, {} 行", progress.frames(), writer.lines());
    Ok(writer.lines())
}

/// `vidface features`
pub fn run_features(args: &FeaturesArgs) -> FaceResult<u64> {
    let records = read_landmarks(&args.landmark)?;
    let mut embedder = OrtFaceEmbedder::load(&args.model)?;
    let mut source = VideoSource::open(&args.video)?;
    let (width, height) = source.frame_size();
    let mut shapes = Replay::landmarks(records, width, height);
    let mut writer = AnnotationWriter::create(&args.output)?;

    extract_features(&mut source, &mut shapes, &mut embedder, &mut writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Point2;
    use crate::input::FrameSequence;
    use crate::pipeline::testing::FlushLog;
    use image::{Rgb, RgbImage};

    /// 特征 = 对齐图像中心像素的三个通道
    struct CentrePixel {
        size: u32,
    }

    impl FaceEmbedder for CentrePixel {
        fn input_size(&self) -> u32 {
            self.size
        }

        fn embed(&mut self, aligned: &RgbImage) -> FaceResult<Vec<f32>> {
            assert_eq!(aligned.dimensions(), (self.size, self.size));
            let p = aligned.get_pixel(self.size / 2, self.size / 2);
            Ok(p.0.iter().map(|&c| c as f32 / 255.0).collect())
        }
    }

    /// 68 点中的外眼角与鼻尖落在图像上的合理位置
    fn shape(track: u32) -> Landmarks {
        let mut points = vec![Point2::default(); 68];
        points[36] = Point2::new(20.0, 20.0);
        points[45] = Point2::new(60.0, 20.0);
        points[33] = Point2::new(40.0, 45.0);
        Landmarks { track, points }
    }

    #[test]
    fn test_embeds_bgr_aligned_faces() {
        let image = RgbImage::from_pixel(80, 80, Rgb([255, 0, 51]));
        let mut source = FrameSequence::new(vec![image.clone(), image], 25.0);
        let mut shapes = Replay::new(vec![(0.0, shape(3)), (0.04, shape(3)), (0.04, shape(7))]);
        let mut embedder = CentrePixel { size: 16 };
        let mut writer = AnnotationWriter::new(Vec::new());

        let lines = extract_features(&mut source, &mut shapes, &mut embedder, &mut writer).unwrap();
        assert_eq!(lines, 3);

        let text = String::from_utf8(writer.into_inner()).unwrap();
        let out: Vec<&str> = text.lines().collect();
        // 通道已交换为 BGR
        assert_eq!(out[0], "0.000 3 0.20000 0.00000 1.00000");
        assert!(out[1].starts_with("0.040 3 "));
        assert!(out[2].starts_with("0.040 7 "));
    }

    #[test]
    fn test_flushes_after_every_frame() {
        let image = RgbImage::from_pixel(80, 80, Rgb([10, 20, 30]));
        let mut source = FrameSequence::new(vec![image; 4], 25.0);
        let mut shapes = Replay::new(vec![(0.0, shape(3)), (0.08, shape(7))]);
        let mut embedder = CentrePixel { size: 16 };
        let mut writer = AnnotationWriter::new(FlushLog::default());

        let lines = extract_features(&mut source, &mut shapes, &mut embedder, &mut writer).unwrap();
        assert_eq!(lines, 2);
        // 0.04s 的帧没有关键点, 仍然刷新一次
        assert_eq!(writer.into_inner().flushed_lines, vec![1, 1, 2]);
        assert_eq!(source.count(), 1);
    }

    #[test]
    fn test_too_few_landmarks_is_an_error() {
        let mut source = FrameSequence::blank(32, 32, 25.0, 1);
        let short = Landmarks {
            track: 0,
            points: vec![Point2::default(); 10],
        };
        let mut shapes = Replay::new(vec![(0.0, short)]);
        let mut embedder = CentrePixel { size: 8 };
        let mut writer = AnnotationWriter::new(Vec::new());
        assert!(extract_features(&mut source, &mut shapes, &mut embedder, &mut writer).is_err());
    }
}
