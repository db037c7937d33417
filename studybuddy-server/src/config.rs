use serde::Deserialize;

use std::{env, fs, path::Path, time::Duration};

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// OpenAI-compatible chat-completions endpoint
    pub api_url: String,
    /// Overridden by the OPENAI_API_KEY env variable when set
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Overridden by the PG_DSN env variable when set
    pub database_dsn: String,
    pub storage_root: String,
    pub signing_secret: String,
    #[serde(with = "humantime_serde")]
    pub download_url_ttl: Duration,
    pub ai: AiConfig,
}

pub fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    // Retrieve env variable
    let config_path =
        env::var("STUDYBUDDY_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());

    let mut config: Config = read_config_file(&config_path)?;

    // Env variables take precedence over the file for the two secrets
    // that deployments usually inject directly.
    if let Ok(dsn) = env::var("PG_DSN") {
        config.database_dsn = dsn;
    }
    if let Ok(key) = env::var("OPENAI_API_KEY") {
        config.ai.api_key = Some(key);
    }

    Ok(config)
}

fn read_config_file(config_path: &str) -> Result<Config, Box<dyn std::error::Error>> {
    // Try env path
    if Path::new(config_path).exists() {
        let contents = fs::read_to_string(config_path)?;
        return serde_yaml::from_str(&contents).map_err(Into::into);
    }

    // Fallback to config.yaml
    if Path::new("config.yaml").exists() {
        tracing::warn!(
            "Config file '{}' not found, falling back to 'config.yaml'",
            config_path
        );
        let contents = fs::read_to_string("config.yaml")?;
        return serde_yaml::from_str(&contents).map_err(Into::into);
    }

    // Fallback to config.example.yaml
    if Path::new("config.example.yaml").exists() {
        tracing::warn!(
            "Config file '{}' and 'config.yaml' not found, falling back to 'config.example.yaml'\
             \n This file should not be used and should be replaced with actual data",
            config_path
        );
        let contents = fs::read_to_string("config.example.yaml")?;
        return serde_yaml::from_str(&contents).map_err(Into::into);
    }

    Err(format!(
        "Config file not found. Tried: '{}', 'config.yaml', 'config.example.yaml'",
        config_path
    )
    .into())
}
