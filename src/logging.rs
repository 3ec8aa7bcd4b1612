// ==========================================
// 电机工厂流水线推演系统 - 日志初始化
// ==========================================
// 职责: 进程级 tracing 订阅器装配,支持文本/JSON 两种输出
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info,rusqlite=warn）
///   例如: RUST_LOG=debug 或 RUST_LOG=motor_factory_sim=trace
/// - MOTOR_FACTORY_SIM_LOG_JSON: 设为 1 时输出 JSON 行日志,便于采集
///
/// # 示例
/// ```no_run
/// use motor_factory_sim::logging;
/// logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rusqlite=warn"));

    let json_output = std::env::var("MOTOR_FACTORY_SIM_LOG_JSON")
        .map(|v| v == "1")
        .unwrap_or(false);

    if json_output {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_line_number(true)
            .init();
    }
}

/// 初始化测试环境的日志系统
///
/// 固定 debug 级别并写入测试捕获器,重复初始化静默忽略
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
