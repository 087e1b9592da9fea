/// 定位算法模块
///
/// 该模块提供 Wi-Fi 室内定位核心算法，支持：
/// - 对数距离路径损耗模型（RSSI 转距离）
/// - 两种可替换的坐标估计策略（加权质心、三边定位）
/// - 楼层众数投票和不确定半径计算
/// - 可配置的站点标定参数

pub mod location_algorithms;
pub mod rssi_model;
pub mod access_point;
pub mod results;

pub use location_algorithms::*;
pub use rssi_model::*;
pub use access_point::*;
pub use results::*;
