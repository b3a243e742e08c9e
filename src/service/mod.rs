//! Service lifecycle and component wiring

pub mod app;

pub use app::AppState;
