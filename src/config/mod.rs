mod app_config;

pub use app_config::{
    AppConfig, CheckpointBackend, CheckpointConfig, DatabaseConfig, LlmConfig, LogFormat,
    LoggingConfig, ServerConfig, TranslateConfig,
};
