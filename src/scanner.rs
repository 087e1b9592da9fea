/// 附近 Wi-Fi 网络扫描
///
/// 各平台的扫描方式都实现 [`NetworkScanner`]，输出相同形状的观测序列，
/// 定位核心不需要关心运行在哪个操作系统上。
///
/// - Linux: `iw <adapter> scan`
/// - Windows: `netsh wlan show all`（信号百分比线性换算为 dBm）
/// - macOS: `airport -s`

use crate::algorithms::Observation;
use crate::error::{LocatorError, Result};
use log::{debug, warn};
use regex::Regex;
use std::process::Command;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 网络扫描能力
pub trait NetworkScanner: Send + Sync {
    /// 执行一次扫描，结果按信号强度从强到弱排序
    fn scan(&self) -> Result<Vec<Observation>>;
}

/// 按信号强度从强到弱排序
pub fn sort_strongest_first(observations: &mut [Observation]) {
    observations.sort_by(|a, b| b.rssi.total_cmp(&a.rssi));
}

/// Windows 信号百分比换算为 dBm：0% -> -100 dBm，100% -> -50 dBm
pub fn percent_to_dbm(percent: f64) -> f64 {
    -100.0 + percent.clamp(0.0, 100.0) * 0.5
}

// ============================================================================
// 平台输出解析
// ============================================================================

/// 解析 `iw <adapter> scan` 输出
pub fn parse_iw_output(output: &str, adapter: &str) -> Vec<Observation> {
    static BSS: OnceLock<Regex> = OnceLock::new();
    static SIGNAL: OnceLock<Regex> = OnceLock::new();

    let bss = BSS.get_or_init(|| {
        Regex::new(r"^bss ([0-9a-f]{2}(?::[0-9a-f]{2}){5})\s*\(on ([^)]+)\)").unwrap()
    });
    let signal = SIGNAL.get_or_init(|| Regex::new(r"^signal:\s*(-?\d+(?:\.\d+)?)").unwrap());

    let adapter = adapter.to_lowercase();
    let mut observations = Vec::new();
    // (mac, ssid, rssi)
    let mut current: Option<(String, String, Option<f64>)> = None;

    let mut flush = |entry: Option<(String, String, Option<f64>)>| {
        if let Some((mac, ssid, rssi)) = entry {
            match rssi {
                Some(rssi) => observations.push(Observation::new(&mac, rssi, ssid)),
                None => debug!("跳过缺少信号强度的网络 {}", mac),
            }
        }
    };

    for raw in output.lines() {
        let row = raw.trim();
        let lower = row.to_lowercase();

        if let Some(caps) = bss.captures(&lower) {
            flush(current.take());
            if caps[2].trim() == adapter {
                current = Some((caps[1].to_string(), String::new(), None));
            }
            continue;
        }

        let Some(entry) = current.as_mut() else {
            continue;
        };

        if lower.starts_with("ssid:") {
            entry.1 = row[5..].trim().to_string();
        } else if let Some(caps) = signal.captures(&lower) {
            entry.2 = caps[1].parse().ok();
        }
    }
    flush(current.take());

    observations
}

/// 解析 `netsh wlan show all` 输出
///
/// 只读取 "SHOW NETWORKS MODE=BSSID" 段；一个 SSID 下可有多个 BSSID。
pub fn parse_netsh_output(output: &str) -> Vec<Observation> {
    let mut observations = Vec::new();
    let mut in_networks = false;
    let mut ssid = String::new();
    let mut bssid: Option<String> = None;

    for raw in output.lines() {
        if raw.contains("SHOW NETWORKS MODE=BSSID") {
            in_networks = true;
            continue;
        }
        if raw.contains("SHOW INTERFACE CAPABILITIES") {
            in_networks = false;
            continue;
        }
        if !in_networks {
            continue;
        }

        let row = raw.trim();
        let lower = row.to_lowercase();
        let value = row.split_once(':').map(|(_, v)| v.trim()).unwrap_or_default();

        if lower.starts_with("ssid ") {
            ssid = value.to_string();
            bssid = None;
        } else if lower.starts_with("bssid") {
            bssid = Some(value.to_string());
        } else if lower.starts_with("signal") {
            let Some(mac) = bssid.take() else {
                continue;
            };
            match value.trim_end_matches('%').trim().parse::<f64>() {
                Ok(percent) => {
                    observations.push(Observation::new(&mac, percent_to_dbm(percent), ssid.clone()))
                }
                Err(_) => warn!("无法解析信号强度: {}", value),
            }
        }
    }

    observations
}

/// 解析 `airport -s` 输出
pub fn parse_airport_output(output: &str) -> Vec<Observation> {
    static ROW: OnceLock<Regex> = OnceLock::new();
    let row_re = ROW.get_or_init(|| {
        Regex::new(r"^\s*(.*?)\s+([0-9a-fA-F]{2}(?::[0-9a-fA-F]{2}){5})\s+(-\d+)\b").unwrap()
    });

    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let caps = row_re.captures(line)?;
            let rssi: f64 = caps[3].parse().ok()?;
            Some(Observation::new(&caps[2], rssi, caps[1].trim()))
        })
        .collect()
}

// ============================================================================
// 平台扫描器
// ============================================================================

/// 扫描平台
#[derive(Clone, Debug, PartialEq)]
pub enum ScanPlatform {
    Linux { adapter: String },
    Windows,
    MacOs,
}

impl ScanPlatform {
    /// 检测当前操作系统
    pub fn detect(adapter: Option<&str>) -> Result<Self> {
        if cfg!(target_os = "linux") {
            Ok(ScanPlatform::Linux {
                adapter: adapter.unwrap_or("wlan0").to_string(),
            })
        } else if cfg!(target_os = "windows") {
            Ok(ScanPlatform::Windows)
        } else if cfg!(target_os = "macos") {
            Ok(ScanPlatform::MacOs)
        } else {
            Err(LocatorError::Scan("当前操作系统不支持实时扫描".to_string()))
        }
    }

    /// 扫描命令及参数
    pub fn command(&self) -> (&str, Vec<&str>) {
        match self {
            ScanPlatform::Linux { adapter } => ("iw", vec![adapter.as_str(), "scan"]),
            ScanPlatform::Windows => ("netsh", vec!["wlan", "show", "all"]),
            ScanPlatform::MacOs => ("airport", vec!["-s"]),
        }
    }

    /// 解析命令输出
    pub fn parse(&self, output: &str) -> Vec<Observation> {
        match self {
            ScanPlatform::Linux { adapter } => parse_iw_output(output, adapter),
            ScanPlatform::Windows => parse_netsh_output(output),
            ScanPlatform::MacOs => parse_airport_output(output),
        }
    }
}

/// 调用系统命令的扫描器
pub struct CommandScanner {
    platform: ScanPlatform,
}

impl CommandScanner {
    pub fn new(platform: ScanPlatform) -> Self {
        CommandScanner { platform }
    }

    /// 为当前操作系统创建扫描器
    pub fn for_current_platform(adapter: Option<&str>) -> Result<Self> {
        Ok(Self::new(ScanPlatform::detect(adapter)?))
    }

    pub fn platform(&self) -> &ScanPlatform {
        &self.platform
    }
}

impl NetworkScanner for CommandScanner {
    fn scan(&self) -> Result<Vec<Observation>> {
        let (program, args) = self.platform.command();
        let output = Command::new(program)
            .args(&args)
            .output()
            .map_err(|e| LocatorError::Scan(format!("无法执行 {}: {}", program, e)))?;

        if !output.status.success() {
            return Err(LocatorError::Scan(format!(
                "{} 退出状态 {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut observations = self.platform.parse(&String::from_utf8_lossy(&output.stdout));
        sort_strongest_first(&mut observations);
        debug!("{} 扫描到 {} 个网络", program, observations.len());
        Ok(observations)
    }
}

/// 循环回放预先录制的扫描结果，用于演示和测试
pub struct ReplayScanner {
    scans: Vec<Vec<Observation>>,
    cursor: AtomicUsize,
}

impl ReplayScanner {
    pub fn new(scans: Vec<Vec<Observation>>) -> Self {
        ReplayScanner {
            scans,
            cursor: AtomicUsize::new(0),
        }
    }

    /// 已回放的扫描次数
    pub fn scans_served(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl NetworkScanner for ReplayScanner {
    fn scan(&self) -> Result<Vec<Observation>> {
        if self.scans.is_empty() {
            return Ok(Vec::new());
        }
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst) % self.scans.len();
        let mut observations = self.scans[idx].clone();
        sort_strongest_first(&mut observations);
        Ok(observations)
    }
}
