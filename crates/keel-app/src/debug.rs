//! Debug dump endpoints, exposed behind `adminserver.with.debugurls`.

use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Handler for `GET /debug/dump/memstats`.
///
/// Renders process memory counters from `/proc/self/status` as plain text.
pub async fn dump_memstats() -> impl IntoResponse {
    match read_proc_memstats() {
        Some(stats) => (StatusCode::OK, stats),
        None => (
            StatusCode::NOT_IMPLEMENTED,
            "memstats unavailable on this platform".to_string(),
        ),
    }
}

/// Handler for `GET /debug/dump/tasks`.
///
/// Reports runtime worker and task counts.
pub async fn dump_tasks() -> impl IntoResponse {
    let metrics = tokio::runtime::Handle::current().metrics();
    format!(
        "workers: {}\nalive_tasks: {}\n",
        metrics.num_workers(),
        metrics.num_alive_tasks(),
    )
}

fn read_proc_memstats() -> Option<String> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let wanted = ["VmRSS", "VmHWM", "VmSize", "VmData", "Threads"];
    let lines: Vec<&str> = status
        .lines()
        .filter(|line| wanted.iter().any(|w| line.starts_with(w)))
        .collect();
    if lines.is_empty() {
        return None;
    }
    Some(format!("{}\n", lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tasks_dump_reports_counts() {
        let response = dump_tasks().await;
        let _ = response.into_response();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn memstats_are_readable_on_linux() {
        let stats = read_proc_memstats().expect("proc status");
        assert!(stats.contains("VmRSS"));
    }
}
