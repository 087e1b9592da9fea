/// 周期定位测试
///
/// 使用回放扫描器模拟三次扫描：
/// - 两次正常扫描
/// - 一次只包含未知接入点的扫描（应保留上一次位置）

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use wifinav::LocatorConfig;
use wifinav::algorithms::*;
use wifinav::positioning::{PositionUpdate, PositioningSession, run_periodic};
use wifinav::scanner::ReplayScanner;
use wifinav::storage::LocationNames;

fn access_point_map() -> AccessPointMap {
    AccessPointMap::from_vec(vec![
        AccessPoint::new("20:a7:16:5e:c5:d0", 764.0, 216.0, 1, "eduroam", FrequencyBand::Ghz2),
        AccessPoint::new("20:a7:16:61:0c:f0", 100.0, 152.0, 1, "eduroam", FrequencyBand::Ghz2),
        AccessPoint::new("20:a7:16:60:fb:f0", 309.0, 748.0, 1, "eduroam", FrequencyBand::Ghz2),
    ])
    .unwrap()
}

fn scans() -> Vec<Vec<Observation>> {
    vec![
        vec![
            Observation::new("20:A7:16:5E:C5:D0", -52.0, "eduroam"),
            Observation::new("20:A7:16:61:0C:F0", -57.0, "eduroam"),
            Observation::new("20:A7:16:60:FB:F0", -56.0, "eduroam"),
        ],
        vec![Observation::new("de:ad:be:ef:00:01", -40.0, "rogue")],
        vec![
            Observation::new("20:A7:16:5E:C5:D0", -60.0, "eduroam"),
            Observation::new("20:A7:16:61:0C:F0", -50.0, "eduroam"),
            Observation::new("20:A7:16:60:FB:F0", -58.0, "eduroam"),
        ],
    ]
}

fn session(scanner: Arc<ReplayScanner>) -> PositioningSession {
    let mut names = LocationNames::new();
    names.insert("20:a7:16:61:0c:f0", "West wing");

    PositioningSession::new(
        Arc::new(access_point_map()),
        PositionEstimator::new(&LocatorConfig::default()).unwrap(),
        scanner,
    )
    .with_location_names(Arc::new(names))
}

#[tokio::test]
async fn test_periodic_positioning() {
    let _ = env_logger::builder().is_test(true).try_init();

    let scanner = Arc::new(ReplayScanner::new(scans()));
    let (tx, mut rx) = mpsc::channel(8);
    let task = tokio::spawn(run_periodic(
        session(Arc::clone(&scanner)),
        Duration::from_millis(10),
        tx,
        Some(3),
    ));

    let mut updates = Vec::new();
    while let Some(update) = rx.recv().await {
        updates.push(update);
    }
    let session = tokio_test::assert_ok!(task.await);

    assert_eq!(updates.len(), 3);
    assert_eq!(scanner.scans_served(), 3);

    let first = match &updates[0] {
        PositionUpdate::Located(estimate) => estimate.clone(),
        other => panic!("第一次扫描应成功定位: {:?}", other),
    };
    assert_eq!(first.floor, 1);
    assert_eq!(first.access_point_count, 3);

    match &updates[1] {
        PositionUpdate::Unavailable { reason, previous } => {
            assert!(!reason.is_empty());
            assert_eq!(previous.as_ref().map(|p| p.xy()), Some(first.xy()));
        }
        other => panic!("第二次扫描应无法定位: {:?}", other),
    }

    let third = updates[2].estimate().unwrap();
    assert!(updates[2].is_located());
    assert_eq!(third.label.as_deref(), Some("West wing"));
    // 第三次扫描离西侧接入点更近
    assert!(third.x < first.x);
    assert_eq!(session.last_estimate().map(|e| e.xy()), Some(third.xy()));
}

#[tokio::test]
async fn test_dropping_receiver_stops_loop() {
    let scanner = Arc::new(ReplayScanner::new(scans()));
    let (tx, mut rx) = mpsc::channel(1);
    let task = tokio::spawn(run_periodic(
        session(Arc::clone(&scanner)),
        Duration::from_millis(5),
        tx,
        None,
    ));

    assert!(rx.recv().await.is_some());
    drop(rx);

    let result = tokio::time::timeout(Duration::from_secs(5), task).await;
    assert!(result.is_ok(), "接收端关闭后循环应结束");
}

#[tokio::test]
async fn test_abort_cancels_loop() {
    let scanner = Arc::new(ReplayScanner::new(scans()));
    let (tx, _rx) = mpsc::channel(64);
    let task = tokio::spawn(run_periodic(
        session(Arc::clone(&scanner)),
        Duration::from_secs(3600),
        tx,
        None,
    ));

    // 第一个 tick 立即触发，之后等待一小时
    tokio::time::sleep(Duration::from_millis(50)).await;
    task.abort();
    match task.await {
        Err(err) => assert!(err.is_cancelled()),
        Ok(_) => panic!("任务应被取消"),
    }
    assert_eq!(scanner.scans_served(), 1);
}
