use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    /// Deployment environment, from BARCODE_ENV or RUST_ENV.
    pub env: String,
    /// Set via BARCODE_LOG_FORMAT ("text" or "json"). Default: text.
    pub log_format: LogFormat,
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|name| std::env::var(name).ok())
}

/// Build a config from any variable source. `load()` passes the process env.
pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
    let log_format = match var("BARCODE_LOG_FORMAT").as_deref() {
        None | Some("") | Some("text") => LogFormat::Text,
        Some("json") => LogFormat::Json,
        Some(other) => anyhow::bail!(
            "BARCODE_LOG_FORMAT must be 'text' or 'json', got '{}'",
            other
        ),
    };

    Ok(Config {
        port: var("BARCODE_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080),
        redis_url: var("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".into()),
        env: var("BARCODE_ENV")
            .or_else(|| var("RUST_ENV"))
            .unwrap_or_default(),
        log_format,
    })
}
