use crate::error::{NutriSnapError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// APIキーを上書きする環境変数
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// 保存先ディレクトリ（未指定ならOSのデータディレクトリ）
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default_config())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| NutriSnapError::Config("home directory not found".into()))?;
        Ok(home.join(".config").join("nutrisnap").join("config.json"))
    }

    /// キー・バリュー保存領域のディレクトリ
    pub fn storage_dir(&self) -> Result<PathBuf> {
        let base = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .ok_or_else(|| NutriSnapError::Config("data directory not found".into()))?
                .join("nutrisnap"),
        };
        Ok(base.join("storage"))
    }

    /// チャット補完エンドポイントのURL
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base_url.trim_end_matches('/'))
    }

    fn default_config() -> Self {
        Self {
            api_base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o".into(),
            max_tokens: 2048,
            temperature: 0.3,
            data_dir: None,
        }
    }

    /// 環境変数のAPIキー（空文字は未設定扱い）
    pub fn api_key_override() -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}
