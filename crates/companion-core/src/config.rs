use std::path::{Path, PathBuf};

use companion_provider::{ProviderConfig, ProviderKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE: &str = "config.yaml";

const STARTER_CONFIG: &str = "\
# companion configuration
provider:
  type: gemini
  api_key: ${GEMINI_API_KEY}
model: gemini-2.5-flash
max_tokens: 2048
";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config at {}; wrote a starter file, set the api key and retry", path.display())]
    Starter { path: PathBuf },
    #[error("failed to write starter config {}: {source}", path.display())]
    WriteStarter {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("gemini provider requires an api key; set api_key in {} (placeholders like ${{GEMINI_API_KEY}} are resolved from the environment)", path.display())]
    MissingApiKey { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionConfig {
    pub provider: ProviderConfig,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

impl CompanionConfig {
    /// Load `config.yaml` from the data root. A missing file is replaced with
    /// a starter template and reported as [`ConfigError::Starter`] so the CLI
    /// can point the user at it.
    pub fn load(data_root: &Path) -> Result<CompanionConfig, ConfigError> {
        let path = data_root.join(CONFIG_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                write_starter(data_root, &path)?;
                return Err(ConfigError::Starter { path });
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        let mut config: CompanionConfig =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        config.resolve_env();
        config.validate(&path)?;
        Ok(config)
    }

    fn resolve_env(&mut self) {
        if let Some(key) = &self.provider.api_key {
            self.provider.api_key = Some(resolve_env_var(key));
        }
        if let Some(url) = &self.provider.base_url {
            self.provider.base_url = Some(resolve_env_var(url));
        }
        self.model = resolve_env_var(&self.model);
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let key_missing = self
            .provider
            .api_key
            .as_deref()
            .map_or(true, |k| k.is_empty());
        if self.provider.kind == ProviderKind::Gemini && key_missing {
            return Err(ConfigError::MissingApiKey {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }
}

fn write_starter(data_root: &Path, path: &Path) -> Result<(), ConfigError> {
    let write = std::fs::create_dir_all(data_root)
        .and_then(|()| std::fs::write(path, STARTER_CONFIG));
    write.map_err(|source| ConfigError::WriteStarter {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace `${VAR}` placeholders with their environment values; unset
/// variables resolve to the empty string, an unclosed brace is left as-is.
pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}
