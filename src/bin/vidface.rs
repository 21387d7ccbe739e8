use anyhow::{Context, Result};
use clap::Parser;
/// 视频人脸分析流水线
///
/// 直接运行: cargo run --release --bin vidface -- track video.mp4 shots.json faces.txt
use vidface::config::{Args, Command};
use vidface::logging::init_tracing;
use vidface::pipeline::{run_demo, run_features, run_landmarks, run_track};

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match &args.command {
        Command::Track(track) => {
            let tracks = run_track(track).with_context(|| {
                format!(
                    "人脸跟踪失败: {} (镜头 {})",
                    track.video.display(),
                    track.shot.display()
                )
            })?;
            tracing::info!("写出 {} 条轨迹 → {}", tracks, track.output.display());
        }
        Command::Landmarks(landmarks) => {
            let lines = run_landmarks(landmarks).with_context(|| {
                format!(
                    "关键点定位失败: {} (人脸框 {})",
                    landmarks.video.display(),
                    landmarks.tracking.display()
                )
            })?;
            tracing::info!("写出 {} 行 → {}", lines, landmarks.output.display());
        }
        Command::Features(features) => {
            let lines = run_features(features).with_context(|| {
                format!(
                    "特征提取失败: {} (关键点 {})",
                    features.video.display(),
                    features.landmark.display()
                )
            })?;
            tracing::info!("写出 {} 行 → {}", lines, features.output.display());
        }
        Command::Demo(demo) => {
            run_demo(demo).with_context(|| {
                format!(
                    "渲染失败: {} → {}",
                    demo.video.display(),
                    demo.output.display()
                )
            })?;
        }
    }

    Ok(())
}
