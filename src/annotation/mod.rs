/// 标注文件系统 (Annotation files)
///
/// - Parser: 人脸框 / 关键点文件 → 按时间排序的记录
/// - Writer: 固定精度的行格式输出
/// - Labels: 轨迹标签映射
pub mod labels;
pub mod parser;
pub mod writer;

pub use labels::{parse_labels, read_labels, Labels};
pub use parser::{
    parse_faces, parse_landmarks, read_faces, read_landmarks, FaceEntry, FaceRecord,
    LandmarkRecord, TimedRecord,
};
pub use writer::AnnotationWriter;
