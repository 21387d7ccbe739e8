//! 时间戳记录解析器 (Timestamped record parser)
//!
//! 人脸框文件与关键点文件共用同一结构: `time track payload...`,
//! 以空白分隔. 解析后按时间升序 (稳定) 排序, 同一时刻的记录保持文件顺序.
//! 坐标保持归一化原值, 由回放器结合帧尺寸还原.

use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::detection::types::{NormalizedBox, TrackId};
use crate::error::{open_input, FaceError, FaceResult};

/// 带时间戳的一行记录
#[derive(Debug, Clone, PartialEq)]
pub struct TimedRecord<P> {
    pub time: f64,
    pub track: TrackId,
    pub payload: P,
}

/// 人脸框文件的一行: 归一化矩形 + 状态
#[derive(Debug, Clone, PartialEq)]
pub struct FaceEntry {
    pub bbox: NormalizedBox,
    pub status: String,
}

pub type FaceRecord = TimedRecord<FaceEntry>;

/// 关键点文件的一行: 归一化 (x, y) 序列
pub type LandmarkRecord = TimedRecord<Vec<(f32, f32)>>;

/// 读取人脸框文件
pub fn read_faces(path: &Path) -> FaceResult<Vec<FaceRecord>> {
    let file = open_input(path)?;
    parse_faces(BufReader::new(file), path)
}

/// 读取关键点文件
pub fn read_landmarks(path: &Path) -> FaceResult<Vec<LandmarkRecord>> {
    let file = open_input(path)?;
    parse_landmarks(BufReader::new(file), path)
}

/// 解析人脸框: `time track left top right bottom [status]`
pub fn parse_faces<R: BufRead>(reader: R, path: &Path) -> FaceResult<Vec<FaceRecord>> {
    parse_records(reader, path, |fields, line| {
        if fields.len() != 4 && fields.len() != 5 {
            return Err(FaceError::malformed(
                path,
                line,
                format!("expected 6 or 7 fields, found {}", fields.len() + 2),
            ));
        }
        let coord = |i: usize| parse_coordinate(fields[i], path, line);
        let bbox = NormalizedBox {
            left: coord(0)?,
            top: coord(1)?,
            right: coord(2)?,
            bottom: coord(3)?,
        };
        let status = fields.get(4).map(|s| s.to_string()).unwrap_or_default();
        Ok(FaceEntry { bbox, status })
    })
}

/// 解析关键点: `time track x0 y0 x1 y1 ...`
///
/// 点数由字段数推断 `(fields - 2) / 2`, 字段数为奇数视为格式错误;
/// 同一文件所有行的点数必须一致.
pub fn parse_landmarks<R: BufRead>(reader: R, path: &Path) -> FaceResult<Vec<LandmarkRecord>> {
    let mut expected: Option<usize> = None;
    parse_records(reader, path, |fields, line| {
        if fields.len() % 2 != 0 {
            return Err(FaceError::malformed(
                path,
                line,
                format!(
                    "{} fields cannot hold (x, y) pairs after time and track",
                    fields.len() + 2
                ),
            ));
        }
        let n_points = fields.len() / 2;
        match expected {
            None => expected = Some(n_points),
            Some(n) if n != n_points => {
                return Err(FaceError::InconsistentLandmarks {
                    path: path.to_path_buf(),
                    line,
                    expected: n,
                    found: n_points,
                })
            }
            Some(_) => {}
        }

        fields
            .chunks_exact(2)
            .map(|pair| {
                Ok((
                    parse_coordinate(pair[0], path, line)?,
                    parse_coordinate(pair[1], path, line)?,
                ))
            })
            .collect()
    })
}

/// 通用行解析: 跳过空行, 解析时间与轨迹, 交由 `payload` 解析剩余字段
fn parse_records<R, P, F>(reader: R, path: &Path, mut payload: F) -> FaceResult<Vec<TimedRecord<P>>>
where
    R: BufRead,
    F: FnMut(&[&str], usize) -> FaceResult<P>,
{
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let number = index + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 2 {
            return Err(FaceError::malformed(
                path,
                number,
                "missing track identifier",
            ));
        }

        let time = fields[0]
            .parse::<f64>()
            .ok()
            .filter(|t| t.is_finite())
            .ok_or_else(|| {
                FaceError::malformed(path, number, format!("invalid time {:?}", fields[0]))
            })?;
        let track = fields[1].parse::<TrackId>().map_err(|_| {
            FaceError::malformed(path, number, format!("invalid track {:?}", fields[1]))
        })?;

        records.push(TimedRecord {
            time,
            track,
            payload: payload(&fields[2..], number)?,
        });
    }

    // 稳定排序: 同一时刻保持文件顺序
    records.sort_by(|a, b| a.time.total_cmp(&b.time));
    Ok(records)
}

fn parse_coordinate(field: &str, path: &Path, line: usize) -> FaceResult<f32> {
    field
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FaceError::malformed(path, line, format!("invalid coordinate {:?}", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn faces(text: &str) -> FaceResult<Vec<FaceRecord>> {
        parse_faces(Cursor::new(text), Path::new("faces.txt"))
    }

    fn landmarks(text: &str) -> FaceResult<Vec<LandmarkRecord>> {
        parse_landmarks(Cursor::new(text), Path::new("shape.txt"))
    }

    #[test]
    fn test_parse_faces_basic() {
        let records = faces("1.000 0 0.1 0.1 0.3 0.3 ok\n1.000 1 0.5 0.5 0.7 0.7 ok\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].time, 1.0);
        assert_eq!(records[0].track, 0);
        assert_eq!(records[1].track, 1);
        assert_eq!(records[1].payload.bbox.left, 0.5);
        assert_eq!(records[1].payload.status, "ok");
    }

    #[test]
    fn test_parse_faces_sorts_by_time_stably() {
        // 跟踪输出按轨迹分组写出, 时间并不有序
        let text = "\
2.0 0 0.1 0.1 0.2 0.2 detection
3.0 0 0.1 0.1 0.2 0.2 tracking
1.0 1 0.5 0.5 0.6 0.6 detection
2.0 1 0.5 0.5 0.6 0.6 tracking
";
        let records = faces(text).unwrap();
        let order: Vec<(f64, TrackId)> = records.iter().map(|r| (r.time, r.track)).collect();
        assert_eq!(order, vec![(1.0, 1), (2.0, 0), (2.0, 1), (3.0, 0)]);
    }

    #[test]
    fn test_parse_faces_optional_status_and_blank_lines() {
        let records = faces("\n0.5 3 0 0 1 1\n\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload.status, "");
    }

    #[test]
    fn test_parse_faces_rejects_wrong_field_count() {
        let err = faces("1.0 0 0.1 0.1 0.3 ok\n").unwrap_err();
        match err {
            FaceError::Malformed { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(faces("1.0 0 0.1 0.1 0.3 0.3 ok extra\n").is_err());
        assert!(faces("1.0\n").is_err());
    }

    #[test]
    fn test_parse_faces_rejects_non_numeric() {
        let err = faces("1.0 0 0.1 0.1 0.3 0.3 ok\n1.0 x 0.1 0.1 0.3 0.3 ok\n").unwrap_err();
        match err {
            FaceError::Malformed { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(faces("abc 0 0.1 0.1 0.3 0.3 ok\n").is_err());
        assert!(faces("1.0 0 0.1 nan 0.3 0.3 ok\n").is_err());
        assert!(faces("1.0 -1 0.1 0.1 0.3 0.3 ok\n").is_err());
    }

    #[test]
    fn test_parse_empty_file() {
        assert!(faces("").unwrap().is_empty());
        assert!(landmarks("").unwrap().is_empty());
    }

    #[test]
    fn test_landmark_count_inference() {
        // 2 + 2N 个字段 → N 个点
        let records = landmarks("0.040 2 0.1 0.2 0.3 0.4 0.5 0.6\n").unwrap();
        assert_eq!(records[0].payload.len(), 3);
        assert_eq!(records[0].payload[2], (0.5, 0.6));

        // 2 + 2N + 1 个字段 → 格式错误
        let err = landmarks("0.040 2 0.1 0.2 0.3 0.4 0.5\n").unwrap_err();
        assert!(matches!(err, FaceError::Malformed { line: 1, .. }));

        // N = 0 合法
        let records = landmarks("0.040 2\n").unwrap();
        assert!(records[0].payload.is_empty());
    }

    #[test]
    fn test_landmark_count_must_be_consistent() {
        let err = landmarks("0.0 0 0.1 0.2 0.3 0.4\n0.0 1 0.1 0.2\n").unwrap_err();
        match err {
            FaceError::InconsistentLandmarks {
                line,
                expected,
                found,
                ..
            } => {
                assert_eq!((line, expected, found), (2, 2, 1));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_read_faces_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0.040 0 0.100 0.200 0.300 0.400 detection").unwrap();
        let records = read_faces(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload.bbox.bottom, 0.4);
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_landmarks(Path::new("/no/such/shape.txt")).unwrap_err();
        assert!(matches!(err, FaceError::FileNotFound(_)));
    }
}
