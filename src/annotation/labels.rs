//! 轨迹标签文件: 每行 `track label`

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::detection::types::TrackId;
use crate::error::{open_input, FaceError, FaceResult};

pub type Labels = HashMap<TrackId, String>;

pub fn read_labels(path: &Path) -> FaceResult<Labels> {
    let file = open_input(path)?;
    parse_labels(BufReader::new(file), path)
}

pub fn parse_labels<R: BufRead>(reader: R, path: &Path) -> FaceResult<Labels> {
    let mut labels = Labels::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => continue,
            [track, label] => {
                let track = track.parse::<TrackId>().map_err(|_| {
                    FaceError::malformed(path, index + 1, format!("invalid track {:?}", track))
                })?;
                labels.insert(track, label.to_string());
            }
            _ => {
                return Err(FaceError::malformed(
                    path,
                    index + 1,
                    format!("expected `track label`, found {} fields", fields.len()),
                ))
            }
        }
    }
    Ok(labels)
}
