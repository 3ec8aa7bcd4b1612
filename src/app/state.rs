// ==========================================
// 电机工厂流水线推演系统 - 应用状态
// ==========================================
// 职责: 组装共享连接、仓储、引擎与 API 实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{MaintenanceApi, MissingBlocksApi, OrderApi, SimulationApi};
use crate::config::config_manager::ConfigManager;
use crate::config::RoundConfigReader;
use crate::db;
use crate::engine::events::{BroadcastEventPublisher, SimulationEventPublisher};
use crate::engine::maintenance::MaintenanceRegistry;
use crate::engine::scheduler::RoundScheduler;
use crate::engine::{Clock, TokioClock};
use crate::repository::{
    ActionLogRepository, MaintenanceRepository, MissingBlocksRepository, OrderRepository,
    RoundRepository, SimulationRepository,
};

/// 事件广播通道容量
///
/// 满了以后慢订阅者丢旧事件 (Lagged),不阻塞推演节拍。
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// 应用状态
///
/// 包含所有API实例和共享资源,进程内作为全局状态持有。
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 模拟生命周期API
    pub simulation_api: Arc<SimulationApi>,

    /// 订单API
    pub order_api: Arc<OrderApi>,

    /// 缺件处理API
    pub missing_blocks_api: Arc<MissingBlocksApi>,

    /// 检修API
    pub maintenance_api: Arc<MaintenanceApi>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,

    /// 事件发布器（订阅端从这里拿广播接收器）
    pub event_publisher: Arc<BroadcastEventPublisher>,

    /// 回合调度器
    pub scheduler: Arc<RoundScheduler>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享数据库连接并幂等建表
    /// 2. 初始化所有Repository
    /// 3. 初始化调度器与检修登记簿
    /// 4. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let conn = db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        db::ensure_schema(&conn).map_err(|e| format!("初始化数据库表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================

        let simulation_repo = Arc::new(SimulationRepository::new(conn.clone()));
        let round_repo = Arc::new(RoundRepository::new(conn.clone()));
        let order_repo = Arc::new(OrderRepository::new(conn.clone()));
        let missing_blocks_repo = Arc::new(MissingBlocksRepository::new(conn.clone()));
        let maintenance_repo = Arc::new(MaintenanceRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        // ==========================================
        // 初始化Engine层
        // ==========================================

        // 配置管理器
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // 事件发布器
        let event_publisher = Arc::new(BroadcastEventPublisher::new(EVENT_CHANNEL_CAPACITY));

        // 检修登记簿
        let maintenance_registry = Arc::new(MaintenanceRegistry::new(
            maintenance_repo,
            round_repo.clone(),
        ));

        // 回合调度器（真实时钟）
        let scheduler = Arc::new(RoundScheduler::new(
            simulation_repo.clone(),
            round_repo.clone(),
            Arc::clone(&config_manager) as Arc<dyn RoundConfigReader>,
            Arc::clone(&event_publisher) as Arc<dyn SimulationEventPublisher>,
            Arc::new(TokioClock) as Arc<dyn Clock>,
        ));

        // ==========================================
        // 初始化API层
        // ==========================================

        let simulation_api = Arc::new(SimulationApi::new(
            simulation_repo.clone(),
            round_repo.clone(),
            order_repo.clone(),
            missing_blocks_repo.clone(),
            action_log_repo.clone(),
            config_manager.clone(),
            scheduler.clone(),
        ));

        let order_api = Arc::new(OrderApi::new(
            order_repo.clone(),
            round_repo,
            simulation_repo,
            maintenance_registry.clone(),
            action_log_repo.clone(),
            Arc::clone(&event_publisher) as Arc<dyn SimulationEventPublisher>,
        ));

        let missing_blocks_api = Arc::new(MissingBlocksApi::new(
            missing_blocks_repo,
            order_repo,
            action_log_repo.clone(),
            Arc::clone(&event_publisher) as Arc<dyn SimulationEventPublisher>,
        ));

        let maintenance_api = Arc::new(MaintenanceApi::new(
            maintenance_registry,
            config_manager,
            action_log_repo.clone(),
            Arc::clone(&event_publisher) as Arc<dyn SimulationEventPublisher>,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            simulation_api,
            order_api,
            missing_blocks_api,
            maintenance_api,
            action_log_repo,
            event_publisher,
            scheduler,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 开发环境: 用户数据目录/motor-factory-sim-dev/motor_factory_sim.db
/// - 生产环境: 用户数据目录/motor-factory-sim/motor_factory_sim.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("MOTOR_FACTORY_SIM_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    // 先给一个默认回退值,拿不到用户数据目录时落在当前目录
    let mut path = PathBuf::from("./motor_factory_sim.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("motor-factory-sim-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("motor-factory-sim");
        }

        // 确保目录存在
        std::fs::create_dir_all(&path).ok();
        path = path.join("motor_factory_sim.db");
    }

    path.to_string_lossy().to_string()
}
