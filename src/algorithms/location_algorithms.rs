/// 定位算法实现
///
/// 支持：
/// - 加权质心
/// - 三边定位（闭式解，自动跳过重合/共线的参考点）
/// - 楼层众数投票
/// - 不确定半径计算与限幅

use crate::algorithms::{AccessPointMap, MapFrame, PathLossModel, UserEstimate, normalize_identity};
use crate::config::LocatorConfig;
use crate::error::{LocatorError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 最小残差（像素），保证不确定圆可见
const MIN_RESIDUAL: f64 = 1.0;
/// 距离下限，避免权重除零
const MIN_WEIGHT_DISTANCE: f64 = 1e-6;
/// 参考点重合判定阈值（像素）
const COINCIDENT_EPSILON: f64 = 1e-9;
/// 共线判定的相对阈值
const COLLINEAR_EPSILON: f64 = 1e-9;

// ============================================================================
// 观测数据结构
// ============================================================================

/// 单次扫描得到的接入点观测
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    /// 硬件标识
    pub id: String,
    /// 信号强度 (dBm)，越负越弱
    pub rssi: f64,
    /// 网络名称 (SSID)
    pub network_name: String,
}

impl Observation {
    pub fn new(id: &str, rssi: f64, network_name: impl Into<String>) -> Self {
        Observation {
            id: normalize_identity(id),
            rssi,
            network_name: network_name.into(),
        }
    }
}

/// 附加了楼层、坐标和估计距离的观测
///
/// 只能通过 [`AnnotatedObservation::annotate`] 从地图中已知的接入点构造。
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedObservation {
    id: String,
    rssi: f64,
    network_name: String,
    /// 接入点 X 坐标（像素）
    x: f64,
    /// 接入点 Y 坐标（像素）
    y: f64,
    floor: i32,
    /// 估计距离（像素）
    distance: f64,
}

impl AnnotatedObservation {
    /// 用地图中的接入点信息标注观测
    pub fn annotate(
        observation: &Observation,
        map: &AccessPointMap,
        model: &PathLossModel,
    ) -> Result<Self> {
        let ap = map.lookup(&observation.id)?;
        Ok(AnnotatedObservation {
            id: ap.id.clone(),
            rssi: observation.rssi,
            network_name: observation.network_name.clone(),
            x: ap.x,
            y: ap.y,
            floor: ap.floor,
            distance: model.estimate_distance(observation.rssi),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rssi(&self) -> f64 {
        self.rssi
    }

    pub fn network_name(&self) -> &str {
        &self.network_name
    }

    /// 接入点坐标（像素）
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn floor(&self) -> i32 {
        self.floor
    }

    /// 估计距离（像素）
    pub fn distance(&self) -> f64 {
        self.distance
    }

    fn circle(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.distance)
    }
}

/// 标注结果：已知接入点的观测以及被丢弃的未知观测数量
#[derive(Clone, Debug, Default)]
pub struct Annotation {
    pub observations: Vec<AnnotatedObservation>,
    pub dropped_unknown: usize,
}

// ============================================================================
// 算法选择
// ============================================================================

/// 坐标估计策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// 加权质心
    #[default]
    WeightedCentroid,
    /// 三边定位
    Trilateration,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::WeightedCentroid => "weighted_centroid",
            Strategy::Trilateration => "trilateration",
        }
    }

    /// 策略所需的最少可用观测数
    pub fn min_observations(&self) -> usize {
        match self {
            Strategy::WeightedCentroid => 1,
            Strategy::Trilateration => 3,
        }
    }
}

/// 加权质心的权重函数，权重恒为正且随距离增大而减小
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    /// w = 1 / d
    #[default]
    InverseDistance,
    /// w = 1 / d²
    InverseDistanceSquared,
    /// w = 1 / max(-RSSI, 1)，-1 dBm 以上的读数取最大权重
    InverseSignalMagnitude,
}

impl Weighting {
    pub fn weight(&self, observation: &AnnotatedObservation) -> f64 {
        match self {
            Weighting::InverseDistance => 1.0 / observation.distance.max(MIN_WEIGHT_DISTANCE),
            Weighting::InverseDistanceSquared => {
                1.0 / observation.distance.max(MIN_WEIGHT_DISTANCE).powi(2)
            }
            Weighting::InverseSignalMagnitude => 1.0 / (-observation.rssi).max(1.0),
        }
    }
}

// ============================================================================
// 定位算法集合
// ============================================================================

/// 定位算法集合
pub struct LocationAlgorithm;

impl LocationAlgorithm {
    /// 楼层众数
    ///
    /// 出现次数最多的楼层胜出；次数相同时取最先出现的楼层。
    pub fn mode_floor(floors: &[i32]) -> Option<i32> {
        let mut counts: HashMap<i32, usize> = HashMap::new();
        for floor in floors {
            *counts.entry(*floor).or_insert(0) += 1;
        }

        let mut best: Option<(i32, usize)> = None;
        for floor in floors {
            let count = counts[floor];
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((*floor, count)),
            }
        }
        best.map(|(floor, _)| floor)
    }

    /// 加权质心
    ///
    /// # 参数
    /// - `points`: [(x, y, weight), ...]
    ///
    /// # 返回
    /// - 质心坐标，或 None 如果权重和不是正有限数
    pub fn weighted_centroid(points: &[(f64, f64, f64)]) -> Option<(f64, f64)> {
        let total_weight: f64 = points.iter().map(|(_, _, w)| w).sum();
        if !(total_weight > 0.0 && total_weight.is_finite()) {
            return None;
        }

        let x = points.iter().map(|(x, _, w)| x * w).sum::<f64>() / total_weight;
        let y = points.iter().map(|(_, y, w)| y * w).sum::<f64>() / total_weight;
        Some((x, y))
    }

    /// 三边定位闭式解
    ///
    /// 以第一个圆心为原点，两两圆方程相减得到 2x2 线性方程组。
    ///
    /// # 参数
    /// - `circles`: [(x, y, distance); 3]
    pub fn trilaterate(circles: &[(f64, f64, f64); 3]) -> Result<(f64, f64)> {
        let (x1, y1, r1) = circles[0];
        let (x2, y2, r2) = circles[1];
        let (x3, y3, r3) = circles[2];

        // 平移到第一个参考点
        let (ux, uy) = (x2 - x1, y2 - y1);
        let (vx, vy) = (x3 - x1, y3 - y1);

        let u_len = (ux * ux + uy * uy).sqrt();
        let v_len = (vx * vx + vy * vy).sqrt();
        if u_len < COINCIDENT_EPSILON || v_len < COINCIDENT_EPSILON {
            return Err(LocatorError::GeometricDegeneracy("参考点重合".to_string()));
        }

        let a11 = 2.0 * ux;
        let a12 = 2.0 * uy;
        let a21 = 2.0 * vx;
        let a22 = 2.0 * vy;

        let det = a11 * a22 - a12 * a21;
        if det.abs() <= 4.0 * COLLINEAR_EPSILON * u_len * v_len {
            return Err(LocatorError::GeometricDegeneracy("参考点共线".to_string()));
        }

        let b1 = r1 * r1 - r2 * r2 + ux * ux + uy * uy;
        let b2 = r1 * r1 - r3 * r3 + vx * vx + vy * vy;

        let x = (b1 * a22 - b2 * a12) / det;
        let y = (a11 * b2 - a21 * b1) / det;

        if !(x.is_finite() && y.is_finite()) {
            return Err(LocatorError::GeometricDegeneracy(
                "距离估计超出数值范围".to_string(),
            ));
        }

        Ok((x + x1, y + y1))
    }

    /// 选出三个位置互不相同且不共线的观测
    ///
    /// 按距离从近到远搜索，返回第一组合格的组合。
    pub fn select_triangle(
        observations: &[AnnotatedObservation],
    ) -> Result<[&AnnotatedObservation; 3]> {
        let mut candidates: Vec<&AnnotatedObservation> = observations.iter().collect();
        candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        // 同一位置只保留最近的一个（同一路由器广播多个网络）
        let mut distinct: Vec<&AnnotatedObservation> = Vec::new();
        for candidate in candidates {
            let coincident = distinct.iter().any(|other| {
                (other.x - candidate.x).abs() < COINCIDENT_EPSILON
                    && (other.y - candidate.y).abs() < COINCIDENT_EPSILON
            });
            if !coincident {
                distinct.push(candidate);
            }
        }

        if distinct.len() < 3 {
            return Err(LocatorError::GeometricDegeneracy(format!(
                "只有 {} 个不同的接入点位置",
                distinct.len()
            )));
        }

        for i in 0..distinct.len() {
            for j in (i + 1)..distinct.len() {
                for k in (j + 1)..distinct.len() {
                    if !Self::is_collinear(distinct[i], distinct[j], distinct[k]) {
                        return Ok([distinct[i], distinct[j], distinct[k]]);
                    }
                }
            }
        }

        Err(LocatorError::GeometricDegeneracy(
            "所有可用接入点共线".to_string(),
        ))
    }

    fn is_collinear(
        a: &AnnotatedObservation,
        b: &AnnotatedObservation,
        c: &AnnotatedObservation,
    ) -> bool {
        let (ux, uy) = (b.x - a.x, b.y - a.y);
        let (vx, vy) = (c.x - a.x, c.y - a.y);
        let cross = ux * vy - uy * vx;
        let scale = (ux * ux + uy * uy).sqrt() * (vx * vx + vy * vy).sqrt();
        cross.abs() <= COLLINEAR_EPSILON * scale
    }

    /// 均方根残差：估计位置到各圆心距离与估计距离之差
    pub fn rms_residual(circles: &[(f64, f64, f64)], x: f64, y: f64) -> f64 {
        if circles.is_empty() {
            return 0.0;
        }

        let mut sum_error = 0.0;
        for (cx, cy, distance) in circles {
            let dx = x - cx;
            let dy = y - cy;
            let error = ((dx * dx + dy * dy).sqrt() - distance).abs();
            sum_error += error * error;
        }

        (sum_error / circles.len() as f64).sqrt()
    }

    /// 最大残差：各参考点到估计位置的最大距离
    pub fn max_residual(points: &[(f64, f64)], x: f64, y: f64) -> f64 {
        points
            .iter()
            .map(|(px, py)| ((px - x).powi(2) + (py - y).powi(2)).sqrt())
            .fold(0.0, f64::max)
    }

    /// 半径系数
    ///
    /// 每多 10 个接入点系数减小 0.01，至少减 0.01，结果不小于 0。
    pub fn radius_coefficient(radius_norm: f64, access_point_count: usize) -> f64 {
        let steps = (access_point_count / 10).max(1) as f64;
        (radius_norm - steps / 100.0).max(0.0)
    }
}

// ============================================================================
// 位置估计器
// ============================================================================

/// 位置估计器
///
/// 无状态，同一个估计器和地图可在多个调用方之间共享。
#[derive(Clone, Debug)]
pub struct PositionEstimator {
    model: PathLossModel,
    strategy: Strategy,
    weighting: Weighting,
    max_plausible_distance: f64,
    max_plausible_radius: f64,
    radius_norm: f64,
    frame: MapFrame,
}

impl PositionEstimator {
    /// 根据配置创建估计器
    ///
    /// # 错误
    /// - `Config`: 配置未通过校验
    pub fn new(config: &LocatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(PositionEstimator {
            model: config.path_loss_model(),
            strategy: config.strategy,
            weighting: config.weighting,
            max_plausible_distance: config.max_plausible_distance,
            max_plausible_radius: config.max_plausible_radius,
            radius_norm: config.radius_norm,
            frame: MapFrame::new(config.image_width, config.image_height),
        })
    }

    /// 替换估计策略
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn model(&self) -> &PathLossModel {
        &self.model
    }

    pub fn frame(&self) -> MapFrame {
        self.frame
    }

    /// 过滤未知接入点并标注距离和楼层
    ///
    /// 同一标识出现多次时保留信号最强的一次，位置保持首次出现的顺序。
    pub fn annotate(&self, map: &AccessPointMap, observations: &[Observation]) -> Annotation {
        let mut annotation = Annotation::default();
        let mut index_by_id: HashMap<String, usize> = HashMap::new();

        for observation in observations {
            let annotated = match AnnotatedObservation::annotate(observation, map, &self.model) {
                Ok(annotated) => annotated,
                Err(_) => {
                    annotation.dropped_unknown += 1;
                    continue;
                }
            };

            match index_by_id.get(&annotated.id).copied() {
                Some(idx) => {
                    if annotated.rssi > annotation.observations[idx].rssi {
                        annotation.observations[idx] = annotated;
                    }
                }
                None => {
                    index_by_id.insert(annotated.id.clone(), annotation.observations.len());
                    annotation.observations.push(annotated);
                }
            }
        }

        if annotation.dropped_unknown > 0 {
            debug!("丢弃 {} 个未知接入点的观测", annotation.dropped_unknown);
        }
        annotation
    }

    /// 估计用户位置
    ///
    /// # 错误
    /// - `InsufficientObservations`: 可用观测少于策略要求
    /// - `GeometricDegeneracy`: 三边定位找不到三个不同且不共线的参考点
    pub fn estimate(
        &self,
        map: &AccessPointMap,
        observations: &[Observation],
    ) -> Result<UserEstimate> {
        let annotation = self.annotate(map, observations);

        // 楼层使用全部已知观测投票
        let floors: Vec<i32> = annotation.observations.iter().map(|o| o.floor).collect();
        let floor = LocationAlgorithm::mode_floor(&floors).ok_or_else(|| {
            LocatorError::InsufficientObservations {
                strategy: self.strategy.name(),
                required: self.strategy.min_observations(),
                available: 0,
            }
        })?;

        let usable: Vec<AnnotatedObservation> = annotation
            .observations
            .iter()
            .filter(|o| o.distance.is_finite() && o.distance <= self.max_plausible_distance)
            .cloned()
            .collect();

        let discarded = annotation.observations.len() - usable.len();
        if discarded > 0 {
            debug!(
                "丢弃 {} 个超过最大可信距离 {:.1} 的观测",
                discarded, self.max_plausible_distance
            );
        }

        if usable.len() < self.strategy.min_observations() {
            return Err(LocatorError::InsufficientObservations {
                strategy: self.strategy.name(),
                required: self.strategy.min_observations(),
                available: usable.len(),
            });
        }

        let (x, y, residual) = match self.strategy {
            Strategy::WeightedCentroid => self.centroid(&usable),
            Strategy::Trilateration => self.trilateration(&usable)?,
        };

        let coef = LocationAlgorithm::radius_coefficient(self.radius_norm, usable.len());
        let raw_radius = residual.max(MIN_RESIDUAL) * coef;
        let radius = if raw_radius.is_finite() {
            raw_radius.min(self.max_plausible_radius).max(0.0)
        } else {
            self.max_plausible_radius
        };

        let (x, y) = self.frame.clamp(x, y);

        let mut estimate = UserEstimate::new(
            x,
            y,
            floor,
            self.model.to_physical(radius),
            radius,
            self.strategy.name(),
            usable.len(),
        );
        estimate.dropped_unknown = annotation.dropped_unknown;
        estimate.nearest_access_point = usable
            .iter()
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
            .map(|o| o.id.clone());

        debug!("定位结果: {}", estimate.detailed_description());
        Ok(estimate)
    }

    fn centroid(&self, usable: &[AnnotatedObservation]) -> (f64, f64, f64) {
        let weighted: Vec<(f64, f64, f64)> = usable
            .iter()
            .map(|o| (o.x, o.y, self.weighting.weight(o)))
            .collect();

        // 权重退化时使用等权平均
        let (x, y) = LocationAlgorithm::weighted_centroid(&weighted).unwrap_or_else(|| {
            let equal: Vec<(f64, f64, f64)> = usable.iter().map(|o| (o.x, o.y, 1.0)).collect();
            LocationAlgorithm::weighted_centroid(&equal).unwrap_or((usable[0].x, usable[0].y))
        });

        let points: Vec<(f64, f64)> = usable.iter().map(|o| (o.x, o.y)).collect();
        let residual = LocationAlgorithm::max_residual(&points, x, y);
        (x, y, residual)
    }

    fn trilateration(&self, usable: &[AnnotatedObservation]) -> Result<(f64, f64, f64)> {
        let [a, b, c] = LocationAlgorithm::select_triangle(usable)?;
        let circles = [a.circle(), b.circle(), c.circle()];
        let (x, y) = LocationAlgorithm::trilaterate(&circles)?;
        let residual = LocationAlgorithm::rms_residual(&circles, x, y);
        Ok((x, y, residual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mode_floor() {
        assert_eq!(LocationAlgorithm::mode_floor(&[2, 2, 3]), Some(2));
        assert_eq!(LocationAlgorithm::mode_floor(&[3, 2, 2]), Some(2));
        assert_eq!(LocationAlgorithm::mode_floor(&[1, 2, 3]), Some(1));
        assert_eq!(LocationAlgorithm::mode_floor(&[3, 1, 1, 3]), Some(3));
        assert_eq!(LocationAlgorithm::mode_floor(&[4]), Some(4));
        assert_eq!(LocationAlgorithm::mode_floor(&[]), None);
    }

    #[test]
    fn test_weighted_centroid_equal_weights() {
        let centroid =
            LocationAlgorithm::weighted_centroid(&[(0.0, 0.0, 0.5), (100.0, 100.0, 0.5)]).unwrap();
        assert_eq!(centroid, (50.0, 50.0));
        assert!(LocationAlgorithm::weighted_centroid(&[(1.0, 1.0, 0.0)]).is_none());
        assert!(LocationAlgorithm::weighted_centroid(&[]).is_none());
    }

    #[test]
    fn test_trilaterate_recovers_point() {
        let (x0, y0) = (30.0_f64, 40.0_f64);
        let d = |x: f64, y: f64| ((x0 - x).powi(2) + (y0 - y).powi(2)).sqrt();
        let circles = [
            (0.0, 0.0, d(0.0, 0.0)),
            (100.0, 0.0, d(100.0, 0.0)),
            (0.0, 100.0, d(0.0, 100.0)),
        ];
        let (x, y) = LocationAlgorithm::trilaterate(&circles).unwrap();
        assert_relative_eq!(x, x0, epsilon = 1e-9);
        assert_relative_eq!(y, y0, epsilon = 1e-9);
        assert!(LocationAlgorithm::rms_residual(&circles, x, y) < 1e-9);
    }

    #[test]
    fn test_trilaterate_with_offset_origin() {
        let (x0, y0) = (512.0_f64, 377.0_f64);
        let centers = [(400.0, 300.0), (700.0, 320.0), (450.0, 650.0)];
        let circles = centers.map(|(x, y)| (x, y, ((x0 - x).powi(2) + (y0 - y).powi(2)).sqrt()));
        let (x, y) = LocationAlgorithm::trilaterate(&circles).unwrap();
        assert_relative_eq!(x, x0, epsilon = 1e-6);
        assert_relative_eq!(y, y0, epsilon = 1e-6);
    }

    #[test]
    fn test_trilaterate_collinear_fails() {
        let circles = [(0.0, 0.0, 10.0), (50.0, 50.0, 20.0), (100.0, 100.0, 30.0)];
        assert!(matches!(
            LocationAlgorithm::trilaterate(&circles),
            Err(LocatorError::GeometricDegeneracy(_))
        ));

        let coincident = [(0.0, 0.0, 10.0), (0.0, 0.0, 20.0), (100.0, 0.0, 30.0)];
        assert!(matches!(
            LocationAlgorithm::trilaterate(&coincident),
            Err(LocatorError::GeometricDegeneracy(_))
        ));
    }

    #[test]
    fn test_radius_coefficient() {
        assert_relative_eq!(LocationAlgorithm::radius_coefficient(1.0, 1), 0.99);
        assert_relative_eq!(LocationAlgorithm::radius_coefficient(1.0, 9), 0.99);
        assert_relative_eq!(LocationAlgorithm::radius_coefficient(1.0, 25), 0.98);
        assert_eq!(LocationAlgorithm::radius_coefficient(0.005, 3), 0.0);
    }

    #[test]
    fn test_weighting_is_positive_and_decreasing() {
        let near = AnnotatedObservation {
            id: "a".to_string(),
            rssi: -45.0,
            network_name: String::new(),
            x: 0.0,
            y: 0.0,
            floor: 1,
            distance: 10.0,
        };
        let far = AnnotatedObservation {
            rssi: -80.0,
            distance: 200.0,
            ..near.clone()
        };
        for weighting in [
            Weighting::InverseDistance,
            Weighting::InverseDistanceSquared,
            Weighting::InverseSignalMagnitude,
        ] {
            assert!(weighting.weight(&far) > 0.0);
            assert!(weighting.weight(&near) > weighting.weight(&far));
        }
    }

    #[test]
    fn test_signal_weight_saturates_for_positive_rssi() {
        let model = PathLossModel::default();
        let reading = |rssi: f64| AnnotatedObservation {
            id: "a".to_string(),
            rssi,
            network_name: String::new(),
            x: 0.0,
            y: 0.0,
            floor: 1,
            distance: model.estimate_distance(rssi),
        };

        let weighting = Weighting::InverseSignalMagnitude;
        let readings = [-90.0, -40.0, -5.0, -1.0, 0.0, 10.0, 30.0];
        for pair in readings.windows(2) {
            let (weaker, stronger) = (reading(pair[0]), reading(pair[1]));
            assert!(stronger.distance() <= weaker.distance());
            assert!(weighting.weight(&stronger) >= weighting.weight(&weaker));
        }
        assert_eq!(weighting.weight(&reading(30.0)), 1.0);
    }

    #[test]
    fn test_invalid_config_rejected_instead_of_panicking() {
        for max_plausible_radius in [f64::NAN, -1.0] {
            let config = LocatorConfig {
                max_plausible_radius,
                ..LocatorConfig::default()
            };
            assert!(matches!(
                PositionEstimator::new(&config),
                Err(LocatorError::Config(_))
            ));
        }
    }
}
