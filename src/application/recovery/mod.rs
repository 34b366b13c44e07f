pub mod worker;

pub use worker::{RecoveryDashboard, RecoveryWorker, SweepReport};
