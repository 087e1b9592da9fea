/// Wi-Fi 室内定位库
///
/// 根据附近接入点的信号强度估计用户在多层建筑中的位置 (x, y, 楼层)，
/// 并给出用于绘制的不确定半径。

pub mod algorithms;
pub mod config;
pub mod error;
pub mod positioning;
pub mod scanner;
pub mod storage;

pub use config::LocatorConfig;
pub use error::{LocatorError, Result};
