/// Wi-Fi 室内实时定位
///
/// 支持的功能：
/// - 单次扫描 + 定位
/// - 定位失败时保留上一次结果
/// - 基于 tokio 定时器的周期扫描，可随时取消

use crate::algorithms::{AccessPointMap, Observation, PositionEstimator, UserEstimate};
use crate::error::{LocatorError, Result};
use crate::scanner::NetworkScanner;
use crate::storage::LocationNames;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// 一个扫描周期的输出
#[derive(Clone, Debug)]
pub enum PositionUpdate {
    /// 成功定位
    Located(UserEstimate),
    /// 无法确定位置，附带上一次的结果（如果有）
    Unavailable {
        reason: String,
        previous: Option<UserEstimate>,
    },
}

impl PositionUpdate {
    /// 当前应显示的位置
    pub fn estimate(&self) -> Option<&UserEstimate> {
        match self {
            PositionUpdate::Located(estimate) => Some(estimate),
            PositionUpdate::Unavailable { previous, .. } => previous.as_ref(),
        }
    }

    pub fn is_located(&self) -> bool {
        matches!(self, PositionUpdate::Located(_))
    }
}

/// 定位会话
///
/// 持有只读的接入点地图和扫描器；每个周期相互独立。
pub struct PositioningSession {
    map: Arc<AccessPointMap>,
    names: Arc<LocationNames>,
    estimator: PositionEstimator,
    scanner: Arc<dyn NetworkScanner>,
    last_estimate: Option<UserEstimate>,
}

impl PositioningSession {
    pub fn new(
        map: Arc<AccessPointMap>,
        estimator: PositionEstimator,
        scanner: Arc<dyn NetworkScanner>,
    ) -> Self {
        PositioningSession {
            map,
            names: Arc::new(LocationNames::new()),
            estimator,
            scanner,
            last_estimate: None,
        }
    }

    /// 设置位置名称表
    pub fn with_location_names(mut self, names: Arc<LocationNames>) -> Self {
        self.names = names;
        self
    }

    pub fn last_estimate(&self) -> Option<&UserEstimate> {
        self.last_estimate.as_ref()
    }

    pub fn estimator(&self) -> &PositionEstimator {
        &self.estimator
    }

    /// 对给定观测定位，并附加最近接入点的位置名称
    pub fn locate(&self, observations: &[Observation]) -> Result<UserEstimate> {
        let estimate = self.estimator.estimate(&self.map, observations)?;
        let label = estimate
            .nearest_access_point
            .as_deref()
            .and_then(|id| self.names.get(id))
            .map(str::to_string);

        Ok(match label {
            Some(label) => estimate.with_label(label),
            None => estimate,
        })
    }

    /// 处理一次扫描结果
    pub fn process_scan(&mut self, scan: Result<Vec<Observation>>) -> PositionUpdate {
        match scan.and_then(|observations| self.locate(&observations)) {
            Ok(estimate) => {
                info!("📍 {}", estimate.detailed_description());
                self.last_estimate = Some(estimate.clone());
                PositionUpdate::Located(estimate)
            }
            Err(e) => {
                warn!("无法确定位置: {}", e);
                PositionUpdate::Unavailable {
                    reason: e.to_string(),
                    previous: self.last_estimate.clone(),
                }
            }
        }
    }

    /// 同步执行一个扫描 + 定位周期
    pub fn run_cycle(&mut self) -> PositionUpdate {
        let scan = self.scanner.scan();
        self.process_scan(scan)
    }
}

/// 周期性扫描并定位
///
/// 每个周期的结果发送到 `tx`。以下情况结束循环：
/// - 接收端被关闭
/// - 达到 `max_cycles`
/// - 任务被 abort
///
/// 返回会话，便于调用方读取最后一次结果。
pub async fn run_periodic(
    mut session: PositioningSession,
    interval: Duration,
    tx: mpsc::Sender<PositionUpdate>,
    max_cycles: Option<usize>,
) -> PositioningSession {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut cycles = 0;
    info!("🎯 启动周期定位，间隔 {} ms", interval.as_millis());

    loop {
        if max_cycles.is_some_and(|max| cycles >= max) {
            break;
        }
        ticker.tick().await;

        // 扫描会调用外部命令，放到阻塞线程池
        let scanner = Arc::clone(&session.scanner);
        let scan = tokio::task::spawn_blocking(move || scanner.scan())
            .await
            .unwrap_or_else(|e| Err(LocatorError::Scan(format!("扫描任务失败: {}", e))));

        let update = session.process_scan(scan);
        cycles += 1;

        if tx.send(update).await.is_err() {
            info!("定位结果接收端已关闭");
            break;
        }
    }

    info!("✓ 周期定位已停止，共 {} 个周期", cycles);
    session
}
