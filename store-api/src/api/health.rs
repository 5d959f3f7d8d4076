//! Liveness check. Answers any method and touches no dependency.

pub async fn health_check() -> &'static str {
    "OK"
}
