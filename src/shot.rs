//! 镜头边界文件 (Shot boundaries)
//!
//! 兼容两种 JSON 文档:
//! - Timeline: `{"pyannote": "Timeline", "content": [{"start": 0.0, "end": 1.5}, ...]}`
//! - Annotation: `{"pyannote": "Annotation", "content": [{"segment": {...}, "track": .., "label": ..}]}`
//!
//! Annotation 只取其时间轴 (去重后的片段).

use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;

use crate::error::{open_input, FaceError, FaceResult};

/// 时间片段 [start, end] (秒)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Entry {
    Annotated { segment: Segment },
    Plain(Segment),
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    pyannote: Option<String>,
    content: Vec<Entry>,
}

pub fn read_shots(path: &Path) -> FaceResult<Vec<Segment>> {
    let file = open_input(path)?;
    parse_shots(BufReader::new(file), path)
}

/// 解析镜头文件并返回按起点排序的片段
pub fn parse_shots<R: Read>(reader: R, path: &Path) -> FaceResult<Vec<Segment>> {
    let document: Document = serde_json::from_reader(reader)?;

    match document.pyannote.as_deref() {
        None | Some("Timeline") | Some("Annotation") => {}
        Some(other) => {
            return Err(FaceError::InvalidShots {
                path: path.to_path_buf(),
                reason: format!("unsupported document type {other:?}"),
            })
        }
    }

    let mut segments = Vec::with_capacity(document.content.len());
    for entry in document.content {
        let segment = match entry {
            Entry::Annotated { segment } => segment,
            Entry::Plain(segment) => segment,
        };
        if !(segment.start.is_finite() && segment.end.is_finite()) || segment.end < segment.start {
            return Err(FaceError::InvalidShots {
                path: path.to_path_buf(),
                reason: format!("invalid segment [{}, {}]", segment.start, segment.end),
            });
        }
        segments.push(segment);
    }

    segments.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.end.total_cmp(&b.end)));
    segments.dedup();
    Ok(segments)
}
