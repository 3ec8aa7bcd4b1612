// ==========================================
// 电机工厂流水线推演系统 - 检修登记台
// ==========================================
// 职责: 管理 (回合,产线) 检修占用,为开工动作提供门控
// 红线: 同一 (回合,产线) 最多一条未完成工单,冲突判定在事务内完成
// ==========================================

use crate::domain::maintenance::MaintenanceOrder;
use crate::domain::types::ProductionLine;
use crate::repository::{
    MaintenanceRepository, RepositoryResult, RoundRepository,
};
use std::sync::Arc;
use tracing::info;

/// 检修登记台
///
/// 对外暴露登记、完工与门控查询,排它约束由 Repository 的事务保证。
/// `is_blocked_now` 按"最近一条已落库回合"判定,推演未开跑时不拦任何产线。
pub struct MaintenanceRegistry {
    maintenance_repo: Arc<MaintenanceRepository>,
    round_repo: Arc<RoundRepository>,
}

impl MaintenanceRegistry {
    pub fn new(
        maintenance_repo: Arc<MaintenanceRepository>,
        round_repo: Arc<RoundRepository>,
    ) -> Self {
        Self {
            maintenance_repo,
            round_repo,
        }
    }

    /// 登记一条检修工单
    ///
    /// # 参数
    /// - `round_no`: 占用的回合号
    /// - `line`: 占用的产线
    /// - `description`: 检修说明
    ///
    /// # 返回
    /// 新建的工单；该 (回合,产线) 已有未完成工单时返回 `Conflict`
    pub fn schedule(
        &self,
        round_no: i64,
        line: ProductionLine,
        description: &str,
    ) -> RepositoryResult<MaintenanceOrder> {
        let order = self.maintenance_repo.schedule(round_no, line, description)?;
        info!(
            maintenance_id = order.maintenance_id,
            round_no,
            line = %line,
            "检修工单已登记"
        );
        Ok(order)
    }

    /// 完成一条检修工单,释放 (回合,产线) 占用
    ///
    /// # 返回
    /// - `Ok(true)`: 本次由 PLANNED 置为 COMPLETED
    /// - `Ok(false)`: 工单此前已完成,幂等不变
    pub fn complete(&self, maintenance_id: i64) -> RepositoryResult<bool> {
        let changed = self.maintenance_repo.complete(maintenance_id)?;
        if changed {
            info!(maintenance_id, "检修工单已完成");
        }
        Ok(changed)
    }

    /// 查询指定 (回合,产线) 是否被检修占用
    pub fn is_blocked(&self, round_no: i64, line: ProductionLine) -> RepositoryResult<bool> {
        self.maintenance_repo.has_active(round_no, line)
    }

    /// 查询某推演当前回合下指定产线是否被检修占用
    ///
    /// 以最近一条已落库回合为准；推演尚无回合时视为不占用
    pub fn is_blocked_now(
        &self,
        simulation_id: &str,
        line: ProductionLine,
    ) -> RepositoryResult<bool> {
        match self.round_repo.find_latest(simulation_id)? {
            Some(round) => self.maintenance_repo.has_active(round.round_no, line),
            None => Ok(false),
        }
    }

    /// 按工单ID查询
    pub fn find_by_id(&self, maintenance_id: i64) -> RepositoryResult<Option<MaintenanceOrder>> {
        self.maintenance_repo.find_by_id(maintenance_id)
    }

    /// 查询全部工单（按回合与产线排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<MaintenanceOrder>> {
        self.maintenance_repo.list_all()
    }

    /// 查询指定回合的工单
    pub fn list_by_round(&self, round_no: i64) -> RepositoryResult<Vec<MaintenanceOrder>> {
        self.maintenance_repo.list_by_round(round_no)
    }
}

// ==========================================
// 单元测试
// ==========================================
