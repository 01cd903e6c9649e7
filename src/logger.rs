//! 日志初始化
//!
//! `RUST_LOG` 控制过滤级别，未设置时为 `info`。

use tracing_subscriber::EnvFilter;

/// 安装全局 tracing 订阅者，重复调用时静默忽略
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
