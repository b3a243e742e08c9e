//! Configuration management for the queueing service

pub mod app;

pub use app::{
    validate_config, AppConfig, HttpSettings, QueueSettings, ServiceSettings, StorageSettings,
};
