// ==========================================
// 电机工厂流水线推演系统 - 应用层
// ==========================================
// 职责: 进程级装配,向宿主程序暴露 AppState
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
