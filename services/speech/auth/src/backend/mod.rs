//! Token authority implementations

pub mod fixed;
pub mod sat;
