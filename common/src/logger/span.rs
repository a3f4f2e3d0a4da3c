use std::time::Duration;

use tracing::{Span, field};

use super::TraceId;

/// Root span for a request / sync run / CLI command.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id.as_str(),
        role = field::Empty
    )
}

/// Span covering one scan attempt, from claim to terminal state.
pub fn attempt_span(attempt: u64, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "attempt",
        attempt,
        trace_id = %trace_id.as_str(),
        session_id = field::Empty,
        class_id = field::Empty
    )
}

pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = std::time::Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn warn_if_slow_flags_slow_futures() {
        let out = warn_if_slow("sleepy", Duration::from_millis(1), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            7
        })
        .await;

        assert_eq!(out, 7);
        assert!(logs_contain("slow operation detected"));
    }

    #[tokio::test]
    #[traced_test]
    async fn warn_if_slow_is_quiet_for_fast_futures() {
        let out = warn_if_slow("quick", Duration::from_secs(5), async { "done" }).await;

        assert_eq!(out, "done");
        assert!(!logs_contain("slow operation detected"));
    }
}
