use doorbet_core::GameConfig;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";

/// Where the CLI keeps its database and which game settings it runs with.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub game: GameConfig,
}

impl CliConfig {
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("doorbet")
    }

    /// Resolve the data directory and load `config.json` from it (or from
    /// `config_path`), falling back to defaults when the file is absent.
    pub async fn load(data_dir: Option<PathBuf>, config_path: Option<&Path>) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(Self::default_data_dir);
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_dir.join(CONFIG_FILE));

        let game = GameConfig::load_or_default(&config_path).await?;
        tracing::debug!("Using data directory {}", data_dir.display());

        Ok(Self { data_dir, game })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_config_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("doorbet-cli-{}", uuid::Uuid::new_v4()));
        let config = CliConfig::load(Some(dir.clone()), None).await.unwrap();

        assert_eq!(config.data_dir, dir);
        assert_eq!(config.game.db_file, GameConfig::default().db_file);
    }
}
