pub mod backend;
pub mod cli;
pub mod controller;
pub mod history;
pub mod isp;
pub mod model;
pub mod progress;
pub mod quality;
#[cfg(feature = "tui")]
pub mod tui;
