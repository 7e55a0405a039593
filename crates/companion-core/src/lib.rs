pub mod companion;
pub mod config;
pub mod mood;
pub mod persona;
pub mod session;

pub use companion::Companion;
pub use config::{CompanionConfig, ConfigError, CONFIG_FILE};
pub use mood::MoodAnalyzer;
pub use persona::PersonaConfig;
pub use session::{SendOutcome, SessionManager, CONNECTION_FALLBACK, EMPTY_REPLY_FALLBACK};
