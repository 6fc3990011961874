//! Prometheus exporter smoke test

use std::net::SocketAddr;
use std::time::Duration;
use weather_archive_downloader::metrics::{self, record_task_outcome, TaskOutcomeLabel};

async fn fetch_metrics_text(addr: SocketAddr) -> Option<String> {
    let url = format!("http://{addr}/metrics");
    let resp = reqwest::get(&url).await.ok()?;
    resp.text().await.ok()
}

#[tokio::test]
async fn test_exporter_serves_task_counters() {
    let addr: SocketAddr = "127.0.0.1:19391".parse().unwrap();

    metrics::init_metrics(addr).unwrap();
    // Second call is a no-op
    metrics::init_metrics(addr).unwrap();
    assert!(metrics::is_initialized());

    record_task_outcome(TaskOutcomeLabel::Downloaded, Duration::from_millis(20));
    record_task_outcome(TaskOutcomeLabel::Failed("timeout"), Duration::from_millis(30));

    let mut text = None;
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        text = fetch_metrics_text(addr).await;
        if text.is_some() {
            break;
        }
    }

    let text = text.expect("metrics endpoint did not answer");
    assert!(text.contains("tasks_downloaded_total"));
    assert!(text.contains("tasks_failed_total"));
    assert!(text.contains("reason=\"timeout\""));
}
