// ==========================================
// 电机工厂流水线推演系统 - 主入口
// ==========================================
// 技术栈: Rust + Tokio + SQLite
// 运行方式: 无界面演示进程,Ctrl+C 退出
// ==========================================

use tokio::sync::broadcast::error::RecvError;

use motor_factory_sim::app::{get_default_db_path, AppState};
use motor_factory_sim::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("电机工厂流水线推演系统");
    tracing::info!("系统版本: {}", motor_factory_sim::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    // 创建AppState
    let app_state = AppState::new(db_path)?;

    // 订阅事件广播并打印,演示各部门视角收到的推送
    let mut event_rx = app_state.event_publisher.subscribe();
    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    tracing::info!(
                        event_type = event.event_type.as_str(),
                        audience = event.audience.as_str(),
                        payload = %event.payload,
                        "推演事件"
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "事件订阅滞后,丢弃部分事件");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // 建一个演示推演并启动
    let simulation = app_state
        .simulation_api
        .create_simulation("演示推演", "system")?;
    let round = app_state
        .simulation_api
        .start_simulation(&simulation.simulation_id, "system")
        .await?;
    tracing::info!(
        simulation_id = %simulation.simulation_id,
        round_no = round.round_no,
        "演示推演已启动,Ctrl+C 停止"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("收到退出信号,正在停止推演...");
    app_state
        .simulation_api
        .stop_simulation(&simulation.simulation_id, "system")?;
    tracing::info!("推演已停止,进程退出");

    Ok(())
}
