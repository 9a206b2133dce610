pub mod health;
pub mod hosts;
pub mod logs;
pub mod stats;
pub mod tasks;
