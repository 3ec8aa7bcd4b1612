// ==========================================
// 端到端全场景测试
// ==========================================
// 用途：按真实玩法跑一局完整推演,覆盖各部门交接
// 运行：cargo test --test e2e_full_scenario_test -- --nocapture
// ==========================================


#[cfg(test)]
mod e2e_full_scenario_test {
    use std::time::Duration;

    use motor_factory_sim::domain::types::{BlockCounts, MotorType, OrderStatus, ProductionLine};
    use motor_factory_sim::engine::{Audience, OrderAction, SimulationEvent, SimulationEventType};
    use tokio::sync::broadcast::error::TryRecvError;

    use crate::test_helpers::TestEnv;

    /// 把广播通道里已经到达的事件全部取出
    fn drain_events(
        rx: &mut tokio::sync::broadcast::Receiver<SimulationEvent>,
    ) -> Vec<SimulationEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        events
    }

    async fn wait_for_round(env: &TestEnv, simulation_id: &str, target: i64) {
        for _ in 0..200 {
            let status = env
                .simulation_api
                .get_simulation_status(simulation_id)
                .unwrap();
            if status.current_round >= target {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("等待回合{}超时", target);
    }

    #[tokio::test]
    async fn test_full_factory_scenario() {
        let env = TestEnv::new().unwrap();
        let mut rx = env.event_publisher.subscribe();

        // ==========================================
        // 阶段1: 开局 - 建模拟,调参数,启动推演
        // ==========================================
        let simulation = env
            .simulation_api
            .create_simulation("周五下午场", "主持人")
            .unwrap();
        let simulation_id = simulation.simulation_id.clone();

        env.simulation_api
            .update_config(Some(1), Some(10), "主持人")
            .await
            .unwrap();
        let round = env
            .simulation_api
            .start_simulation(&simulation_id, "主持人")
            .await
            .unwrap();
        assert_eq!(round.round_no, 1);

        // ==========================================
        // 阶段2: 客户下单,库存部分拣
        // ==========================================
        let order_a = env
            .order_api
            .place_order(&simulation_id, MotorType::A, 2, "客户甲")
            .unwrap();
        let order_b = env
            .order_api
            .place_order(&simulation_id, MotorType::B, 1, "客户乙")
            .unwrap();

        // A型订单要蓝6红8灰4
        let requirement = env.order_api.block_requirements(order_a.order_id).unwrap();
        assert_eq!(requirement, BlockCounts::new(6, 8, 4));

        // 库存部: 甲单通过,乙单缺料拒绝
        env.order_api
            .transition_order(order_a.order_id, OrderAction::ApproveInventory, "库存部")
            .unwrap();
        let order_b = env
            .order_api
            .transition_order(order_b.order_id, OrderAction::RejectInventory, "库存部")
            .unwrap();
        assert_eq!(order_b.status, OrderStatus::RejectedByVoorraadbeheer);

        // ==========================================
        // 阶段3: 计划部派线,生产部开工
        // ==========================================
        env.order_api
            .transition_order(
                order_a.order_id,
                OrderAction::AssignLine(ProductionLine::Line1),
                "计划部",
            )
            .unwrap();
        env.order_api
            .transition_order(order_a.order_id, OrderAction::StartProduction, "产线工人")
            .unwrap();

        // 时间在流动: 推一拍进第2回合
        env.clock.tick();
        wait_for_round(&env, &simulation_id, 2).await;

        // ==========================================
        // 阶段4: 产线缺件,跑单员取件失败,供应商补齐
        // ==========================================
        let request = env
            .missing_blocks_api
            .report_missing_blocks(order_a.order_id, BlockCounts::new(0, 2, 0), "产线工人")
            .unwrap();
        assert_eq!(
            env.order_api.get_order(order_a.order_id).unwrap().status,
            OrderStatus::ProductionError
        );

        let first_attempt = env
            .missing_blocks_api
            .mark_runner_attempted(request.request_id, "跑单员")
            .unwrap();
        assert!(first_attempt);
        assert_eq!(env.missing_blocks_api.supplier_queue().unwrap().len(), 1);

        let order_a_back = env
            .missing_blocks_api
            .resolve_missing_blocks(request.request_id, "供应商")
            .unwrap();
        assert_eq!(order_a_back.status, OrderStatus::Pending);
        assert!(order_a_back.returned_from_missing_blocks);

        // ==========================================
        // 阶段5: 回流插队复工,完工交付
        // ==========================================
        for (action, expected) in [
            (OrderAction::StartProduction, OrderStatus::InProduction),
            (
                OrderAction::CompleteProduction,
                OrderStatus::AwaitingAccountManagerApproval,
            ),
            (
                OrderAction::ManagerApprove,
                OrderStatus::ApprovedByAccountManager,
            ),
            (OrderAction::ConfirmDelivery, OrderStatus::Delivered),
            (OrderAction::Finalize, OrderStatus::Completed),
        ] {
            let updated = env
                .order_api
                .transition_order(order_a.order_id, action, "各部门")
                .unwrap();
            assert_eq!(updated.status, expected);
        }

        // ==========================================
        // 阶段6: 收官 - 停推演,核对事件与审计痕迹
        // ==========================================
        env.simulation_api
            .stop_simulation(&simulation_id, "主持人")
            .unwrap();

        // 留给停止事件一点发布时间
        tokio::time::sleep(Duration::from_millis(50)).await;
        let events = drain_events(&mut rx);

        let has =
            |event_type: SimulationEventType| events.iter().any(|e| e.event_type == event_type);
        assert!(has(SimulationEventType::RoundStarted));
        assert!(has(SimulationEventType::NewRound));
        assert!(has(SimulationEventType::OrderPlaced));
        assert!(has(SimulationEventType::MissingBlocksReported));
        assert!(has(SimulationEventType::MissingBlocksResolved));
        assert!(has(SimulationEventType::SimulationStopped));

        // 下单推给库存部看板,缺件接力推给跑单员和供应商
        let placed = events
            .iter()
            .find(|e| e.event_type == SimulationEventType::OrderPlaced)
            .unwrap();
        assert_eq!(placed.audience, Audience::Inventory);
        let reported = events
            .iter()
            .find(|e| e.event_type == SimulationEventType::MissingBlocksReported)
            .unwrap();
        assert_eq!(reported.audience, Audience::Runners);
        let resolved = events
            .iter()
            .find(|e| e.event_type == SimulationEventType::MissingBlocksResolved)
            .unwrap();
        assert_eq!(resolved.audience, Audience::Suppliers);

        // 审计日志覆盖全程动作
        let logs = env
            .action_log_repo
            .find_by_simulation(&simulation_id, 100)
            .unwrap();
        let action_types: Vec<&str> = logs.iter().map(|l| l.action_type.as_str()).collect();
        for expected in [
            "CREATE_SIMULATION",
            "START_SIMULATION",
            "PLACE_ORDER",
            "TRANSITION_ORDER",
            "REPORT_MISSING_BLOCKS",
            "RUNNER_ATTEMPT",
            "RESOLVE_MISSING_BLOCKS",
            "STOP_SIMULATION",
        ] {
            assert!(
                action_types.contains(&expected),
                "审计日志缺少动作 {}",
                expected
            );
        }

        println!("✅ 全链路业务场景测试通过");
    }
}
