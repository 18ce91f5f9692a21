use anyhow::Context;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database_url: String,
    pub provider: ProviderConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Transactional email provider settings used by the content-fetch client.
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("SERVER_PORT must be a valid port number")?;

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let api_base_url = std::env::var("EMAIL_PROVIDER_API_URL")
            .unwrap_or_else(|_| "https://api.resend.com".to_string());
        let api_key = std::env::var("EMAIL_PROVIDER_API_KEY").unwrap_or_default();

        Ok(Self {
            server: ServerConfig { host, port },
            database_url,
            provider: ProviderConfig { api_base_url, api_key },
        })
    }
}
