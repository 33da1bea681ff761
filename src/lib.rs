pub mod bot;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod formatter;
pub mod news;
pub mod notifier;
pub mod pipeline;
pub mod report;
pub mod scorer;
pub mod thresholds;
pub mod websocket;
