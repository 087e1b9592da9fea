/// Wi-Fi 接入点定义和地图数据结构

use crate::error::{LocatorError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// 频段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrequencyBand {
    /// 2.4 GHz
    Ghz2,
    /// 5 GHz
    Ghz5,
}

impl FrequencyBand {
    /// 从数据文件中的数值解析（2 / 2.4 / 5）
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "2" | "2.4" | "2G" | "2g" => Some(FrequencyBand::Ghz2),
            "5" | "5G" | "5g" => Some(FrequencyBand::Ghz5),
            _ => None,
        }
    }

    /// 写回数据文件时使用的数值
    pub fn as_record(&self) -> &'static str {
        match self {
            FrequencyBand::Ghz2 => "2",
            FrequencyBand::Ghz5 => "5",
        }
    }
}

impl fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrequencyBand::Ghz2 => write!(f, "2.4 GHz"),
            FrequencyBand::Ghz5 => write!(f, "5 GHz"),
        }
    }
}

/// 将硬件标识统一为小写冒号分隔形式
///
/// 接受 `AABBCCDDEEFF`、`aa:bb:cc:dd:ee:ff`、`AA-BB-CC-DD-EE-FF` 等写法；
/// 不是 MAC 地址的标识仅做去空白和小写处理。
pub fn normalize_identity(raw: &str) -> String {
    static BARE_MAC: OnceLock<Regex> = OnceLock::new();
    static DELIMITED_MAC: OnceLock<Regex> = OnceLock::new();

    let trimmed = raw.trim().to_lowercase();
    let bare = BARE_MAC.get_or_init(|| Regex::new(r"^[0-9a-f]{12}$").unwrap());
    let delimited = DELIMITED_MAC
        .get_or_init(|| Regex::new(r"^([0-9a-f]{2}[:\-]){5}[0-9a-f]{2}$").unwrap());

    if bare.is_match(&trimmed) {
        let pairs: Vec<&str> = (0..12).step_by(2).map(|i| &trimmed[i..i + 2]).collect();
        pairs.join(":")
    } else if delimited.is_match(&trimmed) {
        trimmed.replace('-', ":")
    } else {
        trimmed
    }
}

/// 预先测绘的单个接入点
#[derive(Clone, Debug, PartialEq)]
pub struct AccessPoint {
    /// 硬件标识（完整 MAC 地址）
    pub id: String,
    /// X 坐标（地图像素）
    pub x: f64,
    /// Y 坐标（地图像素）
    pub y: f64,
    /// 楼层（>= 1）
    pub floor: i32,
    /// 网络名称 (SSID)
    pub network_name: String,
    pub band: FrequencyBand,
}

impl AccessPoint {
    /// 创建新的接入点，标识会被规范化
    pub fn new(
        id: &str,
        x: f64,
        y: f64,
        floor: i32,
        network_name: impl Into<String>,
        band: FrequencyBand,
    ) -> Self {
        AccessPoint {
            id: normalize_identity(id),
            x,
            y,
            floor,
            network_name: network_name.into(),
            band,
        }
    }

    /// 获取 2D 坐标
    pub fn coordinates(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// 接入点地图：标识 -> AccessPoint
///
/// 加载后只读，可在多个估计调用间共享；仅允许追加注册。
#[derive(Clone, Debug, Default)]
pub struct AccessPointMap {
    access_points: HashMap<String, AccessPoint>,
}

impl AccessPointMap {
    pub fn new() -> Self {
        AccessPointMap {
            access_points: HashMap::new(),
        }
    }

    /// 从接入点向量创建地图，重复标识报错
    pub fn from_vec(access_points: Vec<AccessPoint>) -> Result<Self> {
        let mut map = AccessPointMap::new();
        for ap in access_points {
            map.register(ap)?;
        }
        Ok(map)
    }

    /// 注册新的接入点（只追加，不覆盖）
    pub fn register(&mut self, access_point: AccessPoint) -> Result<()> {
        if self.access_points.contains_key(&access_point.id) {
            return Err(LocatorError::DuplicateAccessPoint(access_point.id));
        }
        self.access_points.insert(access_point.id.clone(), access_point);
        Ok(())
    }

    /// 按标识查找；查找前会规范化标识
    pub fn get(&self, id: &str) -> Option<&AccessPoint> {
        self.access_points
            .get(id)
            .or_else(|| self.access_points.get(&normalize_identity(id)))
    }

    /// 查找接入点，不存在时返回 UnknownAccessPoint
    pub fn lookup(&self, id: &str) -> Result<&AccessPoint> {
        self.get(id)
            .ok_or_else(|| LocatorError::UnknownAccessPoint(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// 所有楼层（升序、去重）
    pub fn floors(&self) -> Vec<i32> {
        let mut floors: Vec<i32> = self.access_points.values().map(|ap| ap.floor).collect();
        floors.sort_unstable();
        floors.dedup();
        floors
    }

    pub fn len(&self) -> usize {
        self.access_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.access_points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AccessPoint)> {
        self.access_points.iter()
    }
}
