/// 接入点与位置名称的持久化存储
///
/// 文本格式，逗号分隔：
/// - 接入点：`x, y, identity, network_name, floor, frequency_band`
/// - 位置名称：`identity, name`
///
/// 首行的第一个字段不是数字（或是标识列名）时视为表头跳过。
/// 格式错误在加载时立即报错，不会把脏数据带入几何计算。

use crate::algorithms::{AccessPoint, AccessPointMap, FrequencyBand, normalize_identity};
use crate::error::{LocatorError, Result};
use log::info;
use regex::Regex;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;

const ACCESS_POINT_FIELDS: usize = 6;

/// 同一路由器广播的四个网络：(名称, 频段, MAC 末位)
const ROUTER_VARIANTS: [(&str, FrequencyBand, char); 4] = [
    ("eduroam", FrequencyBand::Ghz2, '0'),
    ("eduroam", FrequencyBand::Ghz5, 'f'),
    ("ut-public", FrequencyBand::Ghz2, '1'),
    ("ut-public", FrequencyBand::Ghz5, 'e'),
];

fn malformed(line: usize, reason: impl Into<String>) -> LocatorError {
    LocatorError::MalformedRecord {
        line,
        reason: reason.into(),
    }
}

/// 非空行及其行号（从 1 开始）
fn records(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

// ============================================================================
// 接入点
// ============================================================================

/// 从文件加载接入点地图
pub fn load_access_points<P: AsRef<Path>>(path: P) -> Result<AccessPointMap> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let map = parse_access_points(&content)?;
    info!(
        "从 {} 加载了 {} 个接入点",
        path.as_ref().display(),
        map.len()
    );
    Ok(map)
}

/// 解析接入点数据
pub fn parse_access_points(content: &str) -> Result<AccessPointMap> {
    let mut map = AccessPointMap::new();

    for (position, (line_no, line)) in records(content).enumerate() {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();

        if position == 0 && fields[0].parse::<f64>().is_err() {
            continue;
        }

        let access_point = parse_access_point_fields(line_no, &fields)?;
        map.register(access_point).map_err(|e| match e {
            LocatorError::DuplicateAccessPoint(id) => {
                malformed(line_no, format!("重复的接入点标识 {}", id))
            }
            other => other,
        })?;
    }

    Ok(map)
}

fn parse_access_point_fields(line_no: usize, fields: &[&str]) -> Result<AccessPoint> {
    if fields.len() != ACCESS_POINT_FIELDS {
        return Err(malformed(
            line_no,
            format!("应有 {} 个字段，实际 {} 个", ACCESS_POINT_FIELDS, fields.len()),
        ));
    }

    let x: f64 = fields[0]
        .parse()
        .map_err(|_| malformed(line_no, format!("X 坐标不是数字: {}", fields[0])))?;
    let y: f64 = fields[1]
        .parse()
        .map_err(|_| malformed(line_no, format!("Y 坐标不是数字: {}", fields[1])))?;
    if !(x.is_finite() && y.is_finite()) {
        return Err(malformed(line_no, "坐标不是有限数"));
    }

    let id = fields[2];
    if id.is_empty() {
        return Err(malformed(line_no, "接入点标识为空"));
    }

    let floor: i32 = fields[4]
        .parse()
        .map_err(|_| malformed(line_no, format!("楼层不是整数: {}", fields[4])))?;
    if floor < 1 {
        return Err(malformed(line_no, format!("楼层应 >= 1，实际为 {}", floor)));
    }

    let band = FrequencyBand::parse(fields[5])
        .ok_or_else(|| malformed(line_no, format!("未知频段: {}", fields[5])))?;

    Ok(AccessPoint::new(id, x, y, floor, fields[3], band))
}

/// 格式化为一行数据记录
pub fn format_record(access_point: &AccessPoint) -> String {
    format!(
        "{},{},{},{},{},{}",
        access_point.x,
        access_point.y,
        access_point.id,
        access_point.network_name,
        access_point.floor,
        access_point.band.as_record()
    )
}

/// 追加一条接入点记录到数据文件（文件不存在时创建）
pub fn append_access_point<P: AsRef<Path>>(path: P, access_point: &AccessPoint) -> Result<()> {
    let path = path.as_ref();
    let needs_newline = match std::fs::read_to_string(path) {
        Ok(existing) => !existing.is_empty() && !existing.ends_with('\n'),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(e.into()),
    };

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if needs_newline {
        writeln!(file)?;
    }
    writeln!(file, "{}", format_record(access_point))?;

    info!("已注册接入点 {} -> {}", access_point.id, path.display());
    Ok(())
}

/// 是否为规范化后的 MAC 地址
pub fn is_mac_address(id: &str) -> bool {
    static MAC: OnceLock<Regex> = OnceLock::new();
    MAC.get_or_init(|| Regex::new(r"^([0-9a-f]{2}:){5}[0-9a-f]{2}$").unwrap())
        .is_match(&normalize_identity(id))
}

/// 为一个物理路由器生成四个网络的接入点记录
///
/// 这些网络的 MAC 地址只有最后一位十六进制数字不同。
pub fn expand_router_variants(mac: &str, x: f64, y: f64, floor: i32) -> Result<Vec<AccessPoint>> {
    if !is_mac_address(mac) {
        return Err(LocatorError::MalformedRecord {
            line: 0,
            reason: format!("MAC 地址格式错误: {}", mac),
        });
    }
    if floor < 1 {
        return Err(LocatorError::MalformedRecord {
            line: 0,
            reason: format!("楼层应 >= 1，实际为 {}", floor),
        });
    }

    let normalized = normalize_identity(mac);
    let prefix = &normalized[..normalized.len() - 1];

    Ok(ROUTER_VARIANTS
        .iter()
        .map(|(name, band, ending)| {
            AccessPoint::new(&format!("{}{}", prefix, ending), x, y, floor, *name, *band)
        })
        .collect())
}

// ============================================================================
// 位置名称
// ============================================================================

/// 接入点标识 -> 人类可读的位置名称
#[derive(Clone, Debug, Default)]
pub struct LocationNames {
    names: HashMap<String, String>,
}

impl LocationNames {
    pub fn new() -> Self {
        LocationNames {
            names: HashMap::new(),
        }
    }

    pub fn insert(&mut self, id: &str, name: impl Into<String>) {
        self.names.insert(normalize_identity(id), name.into());
    }

    /// 查找位置名称
    pub fn get(&self, id: &str) -> Option<&str> {
        self.names
            .get(&normalize_identity(id))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// 从文件加载位置名称
pub fn load_locations<P: AsRef<Path>>(path: P) -> Result<LocationNames> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let names = parse_locations(&content)?;
    info!(
        "从 {} 加载了 {} 个位置名称",
        path.as_ref().display(),
        names.len()
    );
    Ok(names)
}

/// 解析位置名称数据，名称中允许出现逗号
pub fn parse_locations(content: &str) -> Result<LocationNames> {
    let mut names = LocationNames::new();

    for (position, (line_no, line)) in records(content).enumerate() {
        let mut parts = line.splitn(2, ',').map(str::trim);
        let id = parts.next().unwrap_or_default();

        if position == 0 && is_header_field(id) {
            continue;
        }

        let name = match parts.next() {
            Some(name) if !name.is_empty() => name,
            _ => return Err(malformed(line_no, "缺少位置名称")),
        };
        if id.is_empty() {
            return Err(malformed(line_no, "接入点标识为空"));
        }

        names.insert(id, name);
    }

    Ok(names)
}

fn is_header_field(field: &str) -> bool {
    matches!(
        field.to_lowercase().as_str(),
        "mac" | "bssid" | "id" | "identity"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_header() {
        let content = "x,y,mac,ssid,floor,freq\n\
                       120,340,AA:BB:CC:DD:EE:F0,eduroam,2,2\n\
                       \n\
                       500.5,80,aa:bb:cc:dd:ee:ff,eduroam,2,5\n";
        let map = parse_access_points(content).unwrap();
        assert_eq!(map.len(), 2);
        let ap = map.get("aa:bb:cc:dd:ee:f0").unwrap();
        assert_eq!(ap.coordinates(), (120.0, 340.0));
        assert_eq!(ap.floor, 2);
        assert_eq!(map.get("AA:BB:CC:DD:EE:FF").unwrap().band, FrequencyBand::Ghz5);
    }

    #[test]
    fn test_parse_without_header() {
        let map = parse_access_points("1,2,ap-1,lab,1,2").unwrap();
        assert!(map.contains("ap-1"));
    }

    #[test]
    fn test_malformed_records_fail_fast() {
        let wrong_count = parse_access_points("1,2,ap-1,lab,1");
        assert!(matches!(
            wrong_count,
            Err(LocatorError::MalformedRecord { line: 1, .. })
        ));

        let non_numeric = parse_access_points("x,y,id,ssid,floor,freq\n1,abc,ap-1,lab,1,2");
        assert!(matches!(
            non_numeric,
            Err(LocatorError::MalformedRecord { line: 2, .. })
        ));

        let bad_floor = parse_access_points("1,2,ap-1,lab,0,2");
        assert!(bad_floor.is_err());

        let duplicate = parse_access_points("1,2,ap-1,lab,1,2\n3,4,AP-1,lab,1,5");
        assert!(matches!(
            duplicate,
            Err(LocatorError::MalformedRecord { line: 2, .. })
        ));
    }

    #[test]
    fn test_format_record_matches_parser() {
        let ap = AccessPoint::new("aa:bb:cc:dd:ee:f0", 12.5, 40.0, 3, "eduroam", FrequencyBand::Ghz5);
        let record = format_record(&ap);
        assert_eq!(record, "12.5,40,aa:bb:cc:dd:ee:f0,eduroam,3,5");
        let map = parse_access_points(&record).unwrap();
        assert_eq!(map.get(&ap.id), Some(&ap));
    }

    #[test]
    fn test_expand_router_variants() {
        let variants = expand_router_variants("AABBCCDDEE10", 10.0, 20.0, 2).unwrap();
        let ids: Vec<&str> = variants.iter().map(|ap| ap.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "aa:bb:cc:dd:ee:10",
                "aa:bb:cc:dd:ee:1f",
                "aa:bb:cc:dd:ee:11",
                "aa:bb:cc:dd:ee:1e"
            ]
        );
        assert_eq!(variants[3].network_name, "ut-public");
        assert!(expand_router_variants("not-a-mac", 0.0, 0.0, 1).is_err());
    }

    #[test]
    fn test_parse_locations() {
        let content = "mac,name\naa:bb:cc:dd:ee:f0,Delta 2002, seminar room\nap-2,Lobby";
        let names = parse_locations(content).unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names.get("AA:BB:CC:DD:EE:F0"), Some("Delta 2002, seminar room"));
        assert_eq!(names.get("ap-2"), Some("Lobby"));
        assert!(parse_locations("ap-3").is_err());
    }
}
