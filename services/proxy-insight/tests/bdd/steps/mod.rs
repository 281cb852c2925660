//! BDD step definitions for proxy-insight

pub mod history_steps;
pub mod live_steps;
pub mod metrics_steps;
pub mod session_steps;
