/// RSSI 到距离转换模型
///
/// 对数距离路径损耗模型：
///
/// d = 10 ^ ((P - RSSI) / (10 * n)) / scale
///
/// 其中 P 为 1 米处参考功率，n 为路径损耗指数，scale 为像素比例。
/// 结果以地图像素为单位。信号强度噪声大、多径干扰严重，精度本身有限，
/// 下游的不确定半径用于表达这一点。

use std::fmt;

/// 路径损耗模型（站点标定参数）
#[derive(Clone, Debug, PartialEq)]
pub struct PathLossModel {
    /// 1 米处参考功率 (dBm)
    pub reference_power: f64,
    /// 路径损耗指数
    pub path_loss_exponent: f64,
    /// 物理距离除以该值得到像素距离
    pub pixel_scale: f64,
}

impl PathLossModel {
    /// 创建模型
    ///
    /// # 参数
    /// - `reference_power`: 参考功率 (dBm)
    /// - `path_loss_exponent`: 路径损耗指数，自由空间为 2，室内通常 2.5 ~ 4
    /// - `pixel_scale`: 像素比例
    pub fn new(reference_power: f64, path_loss_exponent: f64, pixel_scale: f64) -> Self {
        PathLossModel {
            reference_power,
            path_loss_exponent,
            pixel_scale,
        }
    }

    /// 根据 RSSI 估计到接入点的物理距离（米），不做像素换算
    pub fn estimate_physical_distance(&self, rssi: f64) -> f64 {
        let exponent = (self.reference_power - rssi) / (10.0 * self.path_loss_exponent);
        let distance = 10_f64.powf(exponent);
        if distance.is_nan() { f64::INFINITY } else { distance }
    }

    /// 根据 RSSI 估计到接入点的距离（地图像素）
    ///
    /// 信号越强距离越小；极端输入产生 0 或无穷大而不会出错。
    pub fn estimate_distance(&self, rssi: f64) -> f64 {
        self.estimate_physical_distance(rssi) / self.pixel_scale
    }

    /// 反解：由像素距离计算期望的 RSSI
    pub fn distance_to_rssi(&self, distance: f64) -> f64 {
        let physical = distance * self.pixel_scale;
        if physical <= 0.0 {
            return f64::INFINITY;
        }
        self.reference_power - 10.0 * self.path_loss_exponent * physical.log10()
    }

    /// 像素距离换算为物理距离
    pub fn to_physical(&self, pixels: f64) -> f64 {
        pixels * self.pixel_scale
    }

    /// 验证模型的合理性
    pub fn validate(&self) -> Result<(), String> {
        if !self.reference_power.is_finite() {
            return Err(format!("参考功率必须为有限值，实际为 {}", self.reference_power));
        }
        if !(self.path_loss_exponent > 0.0 && self.path_loss_exponent.is_finite()) {
            return Err("路径损耗指数应为正数（RSSI 随距离增加而减小）".to_string());
        }
        if !(self.pixel_scale > 0.0 && self.pixel_scale.is_finite()) {
            return Err("像素比例应为正数".to_string());
        }
        Ok(())
    }

    /// 获取模型描述
    pub fn description(&self) -> String {
        format!(
            "路径损耗模型 - P={:.2} dBm, n={:.2}, 像素比例={:.4}",
            self.reference_power, self.path_loss_exponent, self.pixel_scale
        )
    }
}

impl Default for PathLossModel {
    fn default() -> Self {
        // 室内 Wi-Fi 常用参数
        PathLossModel::new(-40.0, 3.0, 0.05)
    }
}

impl fmt::Display for PathLossModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
