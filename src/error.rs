/// 定位库错误类型

use thiserror::Error;

/// 定位过程中可能出现的错误
#[derive(Error, Debug)]
pub enum LocatorError {
    /// 观测到的接入点不在地图中
    #[error("未知接入点: {0}")]
    UnknownAccessPoint(String),

    /// 可用观测数量不足以运行所选算法
    #[error("观测不足: {strategy} 需要至少 {required} 个可用接入点，实际 {available} 个")]
    InsufficientObservations {
        strategy: &'static str,
        required: usize,
        available: usize,
    },

    /// 三边定位的参考点共线或重合
    #[error("几何退化: {0}")]
    GeometricDegeneracy(String),

    /// 持久化记录格式错误
    #[error("第 {line} 行记录格式错误: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// 注册了重复的接入点
    #[error("接入点已存在: {0}")]
    DuplicateAccessPoint(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 网络扫描失败
    #[error("扫描失败: {0}")]
    Scan(String),
}

impl From<serde_json::Error> for LocatorError {
    fn from(e: serde_json::Error) -> Self {
        LocatorError::Config(e.to_string())
    }
}

impl LocatorError {
    /// 是否为"无法确定位置"类错误（调用方应保留上一次结果）
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            LocatorError::InsufficientObservations { .. } | LocatorError::GeometricDegeneracy(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LocatorError>;
