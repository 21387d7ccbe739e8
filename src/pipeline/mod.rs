/// 流水线驱动 (Pipeline drivers)
///
/// - track:     按镜头检测并跟踪人脸 → 人脸框文件
/// - landmarks: 人脸框回放 + 关键点模型 → 关键点文件
/// - features:  关键点回放 + 对齐 + 特征模型 → 特征文件
/// - demo:      人脸框/关键点回放 → 带标注的视频
///
/// 每个驱动都以单一消费者顺序处理帧: 一帧处理完毕后再拉取下一帧.
use std::time::Instant;

use tracing::info;

pub mod demo;
pub mod features;
pub mod landmarks;
pub mod track;

pub use demo::run_demo;
pub use features::{extract_features, run_features};
pub use landmarks::{detect_landmarks, run_landmarks};
pub use track::{run_track, track_faces};

/// 处理进度, 约每秒输出一次
pub(crate) struct Progress {
    stage: &'static str,
    frames: usize,
    count: usize,
    last: Instant,
}

impl Progress {
    pub(crate) fn new(stage: &'static str) -> Self {
        Self {
            stage,
            frames: 0,
            count: 0,
            last: Instant::now(),
        }
    }

    pub(crate) fn tick(&mut self, time: f64) {
        self.frames += 1;
        self.count += 1;
        let elapsed = self.last.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            info!(
                "{}: {:.3}s | 实际{:.1}fps | 总帧{}",
                self.stage,
                time,
                self.count as f64 / elapsed,
                self.frames
            );
            self.last = Instant::now();
            self.count = 0;
        }
    }

    pub(crate) fn frames(&self) -> usize {
        self.frames
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{self, Write};

    /// 记录每次 flush 时已写完的行数
    #[derive(Default)]
    pub(crate) struct FlushLog {
        data: Vec<u8>,
        pub(crate) flushed_lines: Vec<usize>,
    }

    impl Write for FlushLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            let lines = self.data.iter().filter(|&&b| b == b'\n').count();
            self.flushed_lines.push(lines);
            Ok(())
        }
    }
}
