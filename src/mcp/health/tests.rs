use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::provider::mock::MockMcpClient;

fn config(max_retries: u32) -> HealthCheckConfig {
    HealthCheckConfig {
        timeout: Duration::from_millis(200),
        max_retries,
        retry_delay: Duration::from_millis(5),
        include_system_metrics: true,
        exclude_components: Vec::new(),
        check_authentication: false,
    }
}

#[tokio::test]
async fn healthy_client_reports_capability_summary() {
    let monitor = HealthMonitor::new(config(0));
    monitor.register_client("c1", Arc::new(MockMcpClient::new().with_tool("search"))).await;

    let report = monitor.perform_health_check(None, Some(false)).await;

    let health = &report.components["c1"];
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.capability_summary["tool_count"], 1);
    assert!(health.response_time_ms.is_some());
    assert_eq!(report.overall, HealthStatus::Healthy);
}

#[tokio::test]
async fn failing_client_exhausts_retries_then_reports_unhealthy() {
    let monitor = HealthMonitor::new(config(2));
    monitor.register_client("c1", Arc::new(MockMcpClient::new().failing())).await;

    let report = monitor.perform_health_check(None, Some(false)).await;

    let health = &report.components["c1"];
    assert_eq!(health.status, HealthStatus::Unhealthy);
    assert!(health.error.is_some());
    assert_eq!(report.overall, HealthStatus::Unhealthy);
}

#[tokio::test]
async fn excluded_component_resolves_to_unknown() {
    let mut cfg = config(0);
    cfg.exclude_components = vec!["c1".to_string()];
    let monitor = HealthMonitor::new(cfg);
    monitor.register_client("c1", Arc::new(MockMcpClient::new())).await;

    let report = monitor.perform_health_check(None, Some(false)).await;

    let health = &report.components["c1"];
    assert_eq!(health.status, HealthStatus::Unknown);
    assert!(health.error.is_some());
}

#[tokio::test]
async fn system_component_aggregates_registered_and_healthy_counts() {
    let monitor = HealthMonitor::new(config(0));
    monitor.register_client("healthy", Arc::new(MockMcpClient::new())).await;
    monitor.register_client("sick", Arc::new(MockMcpClient::new().failing())).await;

    let report = monitor.perform_health_check(None, Some(true)).await;

    let system = &report.components[SYSTEM_COMPONENT];
    assert_eq!(system.capability_summary["registered_clients"], 2);
    assert_eq!(system.capability_summary["healthy_clients"], 1);
}

#[tokio::test]
async fn overall_status_is_the_worst_of_its_components() {
    let monitor = HealthMonitor::new(config(0));
    monitor.register_client("healthy", Arc::new(MockMcpClient::new())).await;
    monitor.register_client("sick", Arc::new(MockMcpClient::new().failing())).await;

    let report = monitor.perform_health_check(None, Some(false)).await;
    assert_eq!(report.overall, HealthStatus::Unhealthy);
}

#[tokio::test]
async fn history_is_recorded_and_bounded() {
    let monitor = HealthMonitor::new(config(0));
    monitor.register_client("c1", Arc::new(MockMcpClient::new())).await;

    for _ in 0..3 {
        monitor.perform_health_check(Some(&["c1".to_string()]), Some(false)).await;
    }

    let history = monitor.get_history("c1").await;
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|h| h.status == HealthStatus::Healthy));
}

#[tokio::test]
async fn unregistered_client_id_resolves_to_unknown() {
    let monitor: HealthMonitor<MockMcpClient> = HealthMonitor::new(config(0));
    let report = monitor.perform_health_check(Some(&["ghost".to_string()]), Some(false)).await;
    assert_eq!(report.components["ghost"].status, HealthStatus::Unknown);
}
