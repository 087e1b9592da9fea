/// 定位配置
///
/// 所有站点标定常数都通过配置传入估计器，不使用进程级全局状态。
/// 兼容旧版 config.json 的大写键名（POWER、PATH_LOSS 等）。

use crate::algorithms::{PathLossModel, Strategy, Weighting};
use crate::error::{LocatorError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 定位配置
#[derive(Clone, Debug, Deserialize)]
pub struct LocatorConfig {
    /// 1 米处参考功率 (dBm)
    #[serde(default = "default_reference_power", alias = "POWER")]
    pub reference_power: f64,

    /// 路径损耗指数
    #[serde(default = "default_path_loss_exponent", alias = "PATH_LOSS")]
    pub path_loss_exponent: f64,

    /// 像素比例：物理距离除以该值得到地图像素距离
    #[serde(default = "default_pixel_scale", alias = "PX_SCALE")]
    pub pixel_scale: f64,

    /// 超过该距离（像素）的观测不参与几何计算
    #[serde(default = "default_max_plausible_distance", alias = "DIST_THRESHOLD")]
    pub max_plausible_distance: f64,

    /// 不确定半径上限（像素）
    #[serde(default = "default_max_plausible_radius", alias = "RAD_THRESHOLD")]
    pub max_plausible_radius: f64,

    /// 半径归一化系数 (0, 1]
    #[serde(default = "default_radius_norm", alias = "RAD_NORM")]
    pub radius_norm: f64,

    /// 地图图像宽度（像素）
    #[serde(default = "default_image_width", alias = "IMG_W")]
    pub image_width: u32,

    /// 地图图像高度（像素）
    #[serde(default = "default_image_height", alias = "IMG_H")]
    pub image_height: u32,

    #[serde(default)]
    pub strategy: Strategy,

    /// 加权质心的权重函数
    #[serde(default)]
    pub weighting: Weighting,

    /// 周期扫描间隔（秒）
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// 接入点数据文件
    #[serde(default = "default_access_points_path")]
    pub access_points_path: String,

    /// 位置名称数据文件
    #[serde(default = "default_locations_path")]
    pub locations_path: String,

    /// Linux 下的无线网卡名称
    #[serde(default)]
    pub adapter: Option<String>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            reference_power: default_reference_power(),
            path_loss_exponent: default_path_loss_exponent(),
            pixel_scale: default_pixel_scale(),
            max_plausible_distance: default_max_plausible_distance(),
            max_plausible_radius: default_max_plausible_radius(),
            radius_norm: default_radius_norm(),
            image_width: default_image_width(),
            image_height: default_image_height(),
            strategy: Strategy::default(),
            weighting: Weighting::default(),
            scan_interval_secs: default_scan_interval_secs(),
            access_points_path: default_access_points_path(),
            locations_path: default_locations_path(),
            adapter: None,
        }
    }
}

impl LocatorConfig {
    /// 从 JSON 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// 从 JSON 字符串解析并校验配置
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: LocatorConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置的合理性
    pub fn validate(&self) -> Result<()> {
        self.path_loss_model().validate().map_err(LocatorError::Config)?;
        if !(self.max_plausible_distance > 0.0) {
            return Err(LocatorError::Config("最大可信距离必须为正".to_string()));
        }
        if !(self.max_plausible_radius > 0.0) {
            return Err(LocatorError::Config("最大可信半径必须为正".to_string()));
        }
        if !(self.radius_norm > 0.0 && self.radius_norm <= 1.0) {
            return Err(LocatorError::Config(format!(
                "半径归一化系数应在 (0, 1] 之间，实际为 {}",
                self.radius_norm
            )));
        }
        Ok(())
    }

    /// 根据配置构造路径损耗模型
    pub fn path_loss_model(&self) -> PathLossModel {
        PathLossModel::new(self.reference_power, self.path_loss_exponent, self.pixel_scale)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs.max(1))
    }
}

// 默认值
fn default_reference_power() -> f64 {
    -40.0
}
fn default_path_loss_exponent() -> f64 {
    3.0
}
fn default_pixel_scale() -> f64 {
    0.05
} // 每像素 5 厘米
fn default_max_plausible_distance() -> f64 {
    600.0
}
fn default_max_plausible_radius() -> f64 {
    400.0
}
fn default_radius_norm() -> f64 {
    1.0
}
fn default_image_width() -> u32 {
    5300
}
fn default_image_height() -> u32 {
    5553
}
fn default_scan_interval_secs() -> u64 {
    5
}
fn default_access_points_path() -> String {
    "data/routers.csv".to_string()
}
fn default_locations_path() -> String {
    "data/locations.csv".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = LocatorConfig::from_json_str("{}").unwrap();
        assert_eq!(config.reference_power, -40.0);
        assert_eq!(config.image_width, 5300);
        assert_eq!(config.strategy, Strategy::WeightedCentroid);
        assert_eq!(config.weighting, Weighting::InverseDistance);
    }

    #[test]
    fn test_legacy_keys() {
        let json = r#"{"POWER": -45.5, "PATH_LOSS": 2.7, "PX_SCALE": 0.1,
                       "DIST_THRESHOLD": 300, "RAD_NORM": 0.9, "RAD_THRESHOLD": 150,
                       "IMG_W": 800, "IMG_H": 600}"#;
        let config = LocatorConfig::from_json_str(json).unwrap();
        assert_eq!(config.reference_power, -45.5);
        assert_eq!(config.path_loss_exponent, 2.7);
        assert_eq!(config.max_plausible_distance, 300.0);
        assert_eq!(config.max_plausible_radius, 150.0);
        assert_eq!(config.image_height, 600);
    }

    #[test]
    fn test_strategy_selection() {
        let json = r#"{"strategy": "trilateration", "weighting": "inverse_distance_squared"}"#;
        let config = LocatorConfig::from_json_str(json).unwrap();
        assert_eq!(config.strategy, Strategy::Trilateration);
        assert_eq!(config.weighting, Weighting::InverseDistanceSquared);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            LocatorConfig::from_json_str(r#"{"path_loss_exponent": 0}"#),
            Err(LocatorError::Config(_))
        ));
        assert!(matches!(
            LocatorConfig::from_json_str(r#"{"radius_norm": 1.5}"#),
            Err(LocatorError::Config(_))
        ));
        assert!(matches!(
            LocatorConfig::from_json_str(r#"{"pixel_scale": -0.05}"#),
            Err(LocatorError::Config(_))
        ));
        assert!(LocatorConfig::from_json_str("not json").is_err());
    }
}
