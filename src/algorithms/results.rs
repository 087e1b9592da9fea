/// 定位结果数据结构
///
/// 包含定位输出以及地图坐标系换算

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// 用户位置估计
#[derive(Clone, Debug, Serialize)]
pub struct UserEstimate {
    /// X 坐标（地图像素）
    pub x: f64,
    /// Y 坐标（地图像素）
    pub y: f64,
    /// 楼层（众数）
    pub floor: i32,
    /// 估计误差（物理单位）
    pub precision: f64,
    /// 不确定圆半径（地图像素）
    pub radius: f64,
    /// 位置名称
    pub label: Option<String>,
    /// 使用的算法名称
    pub method: String,
    /// 参与几何计算的接入点数量
    pub access_point_count: usize,
    /// 因标识未知而丢弃的观测数量
    pub dropped_unknown: usize,
    /// 信号最强的可用接入点
    pub nearest_access_point: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl UserEstimate {
    /// 创建新的定位结果，半径取非负值
    pub fn new(
        x: f64,
        y: f64,
        floor: i32,
        precision: f64,
        radius: f64,
        method: impl Into<String>,
        access_point_count: usize,
    ) -> Self {
        UserEstimate {
            x,
            y,
            floor,
            precision: precision.max(0.0),
            radius: radius.max(0.0),
            label: None,
            method: method.into(),
            access_point_count,
            dropped_unknown: 0,
            nearest_access_point: None,
            timestamp: Utc::now(),
        }
    }

    /// 附加位置名称
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// 获取 2D 坐标
    pub fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// 获取详细描述
    pub fn detailed_description(&self) -> String {
        format!(
            "位置: ({:.1}, {:.1}), 楼层: {}, 精度: {:.2} m, 半径: {:.1} px, 地点: {}, 方法: {}, 接入点数: {}",
            self.x,
            self.y,
            self.floor,
            self.precision,
            self.radius,
            self.label.as_deref().unwrap_or("---"),
            self.method,
            self.access_point_count
        )
    }
}

impl fmt::Display for UserEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.1}, {:.1}) F{} [r={:.1}]",
            self.x, self.y, self.floor, self.radius
        )
    }
}

/// 地图图像坐标系
///
/// 屏幕坐标原点在左上角、Y 轴向下；笛卡尔坐标原点在图像中心、Y 轴向上。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapFrame {
    pub width: u32,
    pub height: u32,
}

impl MapFrame {
    pub fn new(width: u32, height: u32) -> Self {
        MapFrame { width, height }
    }

    /// 屏幕坐标转笛卡尔坐标
    pub fn to_cartesian(&self, x: f64, y: f64) -> (f64, f64) {
        let half_w = (self.width / 2) as f64;
        let half_h = (self.height / 2) as f64;
        (x - half_w, -y + half_h)
    }

    /// 笛卡尔坐标转屏幕坐标
    pub fn to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        let half_w = (self.width / 2) as f64;
        let half_h = (self.height / 2) as f64;
        (x + half_w, -y + half_h)
    }

    /// 点是否在图像范围内
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (0.0..=self.width as f64).contains(&x) && (0.0..=self.height as f64).contains(&y)
    }

    /// 将点限制在图像范围内；宽高为 0 时不限制
    pub fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        if self.width == 0 || self.height == 0 {
            return (x, y);
        }
        (
            x.clamp(0.0, self.width as f64),
            y.clamp(0.0, self.height as f64),
        )
    }
}
