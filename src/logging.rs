//! 日志初始化 (tracing subscriber)

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 默认过滤规则: `--verbose` 时本 crate 输出进度 (info), 否则只输出警告.
/// onnxruntime 的日志始终限制在 warn.
pub fn default_directives(verbose: bool) -> String {
    let level = if verbose { "info" } else { "warn" };
    format!("warn,vidface={level},ort=warn")
}

/// 初始化全局 subscriber; `RUST_LOG` 优先于默认规则.
/// 重复调用时静默忽略.
pub fn init_tracing(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .with(env_filter)
        .try_init();
}
