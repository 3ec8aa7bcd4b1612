// ==========================================
// 电机工厂流水线推演系统 - 积木需求计算器
// ==========================================
// 规则: 每种电机型号的单台积木配方固定,按数量线性放大
// ==========================================

use crate::domain::types::{BlockCounts, MotorType};

/// 单台电机的积木配方（蓝/红/灰）
pub fn unit_blocks(motor_type: MotorType) -> BlockCounts {
    match motor_type {
        MotorType::A => BlockCounts::new(3, 4, 2),
        MotorType::B => BlockCounts::new(2, 2, 4),
        MotorType::C => BlockCounts::new(3, 3, 2),
    }
}

/// 计算一张订单的积木总需求
///
/// # 参数
/// - `motor_type`: 电机型号
/// - `quantity`: 台数（调用方保证为正,下单接口已校验）
pub fn requirement(motor_type: MotorType, quantity: i32) -> BlockCounts {
    let unit = unit_blocks(motor_type);
    BlockCounts::new(
        unit.blue * quantity,
        unit.red * quantity,
        unit.gray * quantity,
    )
}
