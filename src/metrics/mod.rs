//! System health reporting (spec.md `/api/summarize/health/system`),
//! grounded in the teacher's `metrics::health` module but narrowed to
//! provider/database reachability instead of OS-level CPU/memory/disk
//! sampling (no `sysinfo` dependency in this crate's stack).

pub mod health;

pub use health::{ComponentHealth, HealthChecker, HealthStatus, SystemHealth};
