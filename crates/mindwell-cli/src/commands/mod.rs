pub mod config;
pub mod indicator;
pub mod rewards;
pub mod stats;
pub mod timer;
