pub mod daemon;
pub mod list;
pub mod logs;
pub mod service;
