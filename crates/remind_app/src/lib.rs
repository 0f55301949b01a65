pub mod app;
pub mod bridge;
pub mod desktop;
pub mod document;
pub mod habit;
pub mod source;
