//! 关键点驱动: 视频 + 人脸框文件 → 关键点文件
//!
//! 帧时间戳驱动人脸框回放 (整数像素框); 写出的时间为标注组的原始时间,
//! 以便与人脸框文件逐行对应.

use std::io::Write;

use tracing::info;

use super::Progress;
use crate::annotation::{read_faces, AnnotationWriter};
use crate::config::LandmarksArgs;
use crate::detection::Face;
use crate::error::FaceResult;
use crate::input::{FrameSource, VideoSource};
use crate::models::{LandmarkPredictor, OrtLandmarkPredictor};
use crate::replay::Replay;

/// 逐帧定位关键点, 返回写出的行数
pub fn detect_landmarks<S, P, W>(
    source: &mut S,
    faces: &mut Replay<Face<i32>>,
    predictor: &mut P,
    writer: &mut AnnotationWriter<W>,
) -> FaceResult<u64>
where
    S: FrameSource,
    P: LandmarkPredictor,
    W: Write,
{
    let (width, height) = source.frame_size();
    let (w, h) = (width as f32, height as f32);
    let mut progress = Progress::new("关键点");

    for frame in source.by_ref() {
        let frame = frame?;
        let reply = faces.query(frame.time);
        for face in &reply.items {
            let points = predictor.predict(&frame.image, &face.rect)?;
            writer.write_landmarks(
                reply.time,
                face.track,
                points.iter().map(|p| (p.x / w, p.y / h)),
            )?;
        }
        writer.flush()?;
        progress.tick(frame.time);

        // 标注已全部交付, 无需继续解码
        if faces.is_exhausted() {
            break;
        }
    }

    info!("关键点完成: {} 帧, {} 行", progress.frames(), writer.lines());
    Ok(writer.lines())
}

/// `vidface landmarks`
pub fn run_landmarks(args: &LandmarksArgs) -> FaceResult<u64> {
    let records = read_faces(&args.tracking)?;
    let mut predictor = OrtLandmarkPredictor::load(&args.model)?;
    let mut source = VideoSource::open(&args.video)?;
    let (width, height) = source.frame_size();
    let mut faces = Replay::<Face<i32>>::faces(records, width, height);
    let mut writer = AnnotationWriter::create(&args.output)?;

    detect_landmarks(&mut source, &mut faces, &mut predictor, &mut writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{parse_faces, parse_landmarks};
    use crate::detection::{Point2, Rect};
    use crate::input::FrameSequence;
    use crate::pipeline::testing::FlushLog;
    use image::RgbImage;
    use std::io::Cursor;
    use std::path::Path;

    /// 返回人脸框的左上与右下角
    #[derive(Default)]
    struct CornerPredictor {
        seen: Vec<Rect<i32>>,
    }

    impl LandmarkPredictor for CornerPredictor {
        fn predict(&mut self, _image: &RgbImage, face: &Rect<i32>) -> FaceResult<Vec<Point2>> {
            self.seen.push(*face);
            Ok(vec![
                Point2::new(face.left as f32, face.top as f32),
                Point2::new(face.right as f32, face.bottom as f32),
            ])
        }
    }

    fn faces(text: &str) -> Replay<Face<i32>> {
        let records = parse_faces(Cursor::new(text), Path::new("faces.txt")).unwrap();
        Replay::faces(records, 100, 50)
    }

    #[test]
    fn test_landmarks_use_annotation_time() {
        // 0.2 的组有两张脸, 按文件顺序交付
        let mut replay = faces(
            "0.100 0 0.1 0.2 0.3 0.4\n\
             0.200 1 0.5 0.5 0.7 0.9 detection\n\
             0.200 0 0.1 0.2 0.3 0.4 tracking\n",
        );
        let mut source = FrameSequence::blank(100, 50, 10.0, 5);
        let mut predictor = CornerPredictor::default();
        let mut writer = AnnotationWriter::new(Vec::new());

        let lines =
            detect_landmarks(&mut source, &mut replay, &mut predictor, &mut writer).unwrap();
        assert_eq!(lines, 3);
        assert_eq!(predictor.seen[0], Rect::new(10, 10, 30, 20));
        assert_eq!(predictor.seen[1], Rect::new(50, 25, 70, 45));

        let text = String::from_utf8(writer.into_inner()).unwrap();
        let out: Vec<&str> = text.lines().collect();
        assert_eq!(out[0], "0.100 0 0.10000 0.20000 0.30000 0.40000");
        assert_eq!(out[1], "0.200 1 0.50000 0.50000 0.70000 0.90000");
        assert!(out[2].starts_with("0.200 0 "));

        let records = parse_landmarks(Cursor::new(text), Path::new("out")).unwrap();
        assert!(records.iter().all(|r| r.payload.len() == 2));
    }

    #[test]
    fn test_flushes_after_every_frame() {
        // 0.1s 的帧没有人脸也要刷新; 0.2s 交付最后一组后停止解码
        let mut replay = faces(
            "0.000 0 0.1 0.2 0.3 0.4\n\
             0.200 0 0.1 0.2 0.3 0.4\n",
        );
        let mut source = FrameSequence::blank(100, 50, 10.0, 5);
        let mut predictor = CornerPredictor::default();
        let mut writer = AnnotationWriter::new(FlushLog::default());

        let lines =
            detect_landmarks(&mut source, &mut replay, &mut predictor, &mut writer).unwrap();
        assert_eq!(lines, 2);
        assert_eq!(writer.into_inner().flushed_lines, vec![1, 1, 2]);
        assert_eq!(source.count(), 2);
    }

    #[test]
    fn test_no_faces_writes_nothing() {
        let mut replay = Replay::<Face<i32>>::new(Vec::new());
        let mut source = FrameSequence::blank(10, 10, 25.0, 3);
        let mut predictor = CornerPredictor::default();
        let mut writer = AnnotationWriter::new(Vec::new());
        let lines =
            detect_landmarks(&mut source, &mut replay, &mut predictor, &mut writer).unwrap();
        assert_eq!(lines, 0);
        assert!(predictor.seen.is_empty());
    }
}
