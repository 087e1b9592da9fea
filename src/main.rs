use log::{error, info};
use std::sync::Arc;
use tokio::sync::mpsc;
use wifinav::LocatorConfig;
use wifinav::algorithms::PositionEstimator;
use wifinav::positioning::{PositionUpdate, PositioningSession, run_periodic};
use wifinav::scanner::CommandScanner;
use wifinav::storage::{load_access_points, load_locations};

const DEFAULT_CONFIG_PATH: &str = "config.json";

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        error!("✗ {}", e);
        std::process::exit(1);
    }
}

async fn run() -> wifinav::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = LocatorConfig::from_file(&config_path)?;
    info!("📋 配置: {}", config.path_loss_model());

    let map = Arc::new(load_access_points(&config.access_points_path)?);
    let names = match load_locations(&config.locations_path) {
        Ok(names) => names,
        Err(wifinav::LocatorError::Io(e)) => {
            info!("未加载位置名称 ({}): {}", config.locations_path, e);
            Default::default()
        }
        Err(e) => return Err(e),
    };

    let scanner = CommandScanner::for_current_platform(config.adapter.as_deref())?;
    info!("📡 扫描平台: {:?}", scanner.platform());

    let estimator = PositionEstimator::new(&config)?;
    let session = PositioningSession::new(map, estimator, Arc::new(scanner))
        .with_location_names(Arc::new(names));

    let (tx, mut rx) = mpsc::channel(16);
    let task = tokio::spawn(run_periodic(session, config.scan_interval(), tx, None));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Some(PositionUpdate::Located(estimate)) => {
                    println!("{}", estimate.detailed_description());
                }
                Some(PositionUpdate::Unavailable { reason, previous }) => {
                    println!("无法确定位置: {}", reason);
                    if let Some(previous) = previous {
                        println!("  上一次位置: {}", previous);
                    }
                }
                None => break,
            },
            _ = &mut ctrl_c => {
                info!("收到中断信号，停止定位");
                task.abort();
                break;
            }
        }
    }

    Ok(())
}
