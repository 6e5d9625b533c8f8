//! Configuration management for CryptoShow sessions.

mod session_config;

pub use session_config::{
    ConfigError, ConfigFile, ConfigResult, SessionConfig, derive_ws_base, ENV_API_URL, ENV_WS_URL,
};
