/// Configuration management for the API server
///
/// Loads configuration from environment variables (and a `.env` file in
/// development) into a type-safe struct.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `JWT_SECRET`: Secret key for JWT signing (required, at least 32 characters)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `PRODUCTION`: Enables HSTS (default: false)
/// - `EMAIL_API_URL`, `EMAIL_API_KEY`, `EMAIL_FROM`: Outbound email provider;
///   mail is disabled unless URL and key are both set
/// - `RUN_MIGRATIONS`: Apply migrations at startup (default: true)
///
/// # Example
///
/// ```no_run
/// use sitebook_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sitebook_shared::mailer::MailerConfig;
use std::env;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,

    /// Outbound email; `None` disables sending
    pub email: Option<EmailConfig>,

    /// Apply pending migrations before serving
    pub run_migrations: bool,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins (`*` means any)
    pub cors_origins: Vec<String>,

    /// Production mode turns on HSTS
    pub production: bool,

    /// Concurrent `/v1/changes` streams; each holds its own database connection
    pub max_change_subscribers: usize,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be at least 32 bytes. Generate with: `openssl rand -hex 32`
    pub secret: String,
}

/// Email provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

impl From<&EmailConfig> for MailerConfig {
    fn from(config: &EmailConfig) -> Self {
        MailerConfig {
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Splits a comma-separated origin list, dropping blanks
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a number does not
    /// parse, or `JWT_SECRET` is shorter than 32 characters.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let cors_origins = parse_origins(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let max_change_subscribers = env::var("MAX_CHANGE_SUBSCRIBERS")
            .unwrap_or_else(|_| "100".to_string())
            .parse::<usize>()?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let email = match (env::var("EMAIL_API_URL"), env::var("EMAIL_API_KEY")) {
            (Ok(api_url), Ok(api_key)) if !api_url.is_empty() && !api_key.is_empty() => Some(EmailConfig {
                api_url,
                api_key,
                from: env::var("EMAIL_FROM").unwrap_or_else(|_| "no-reply@sitebook.local".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
                production: env_flag("PRODUCTION", false),
                max_change_subscribers,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            email,
            run_migrations: env_flag("RUN_MIGRATIONS", true),
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Whether any origin is allowed
    pub fn cors_permissive(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_origins: vec!["*".to_string()],
                production: false,
                max_change_subscribers: 100,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/test".to_string(),
                max_connections: 10,
            },
            jwt: JwtConfig {
                secret: "test-secret-key-at-least-32-bytes-long".to_string(),
            },
            email: None,
            run_migrations: false,
        }
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(sample().bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins(" https://app.sitebook.dev, ,https://portal.sitebook.dev "),
            vec!["https://app.sitebook.dev", "https://portal.sitebook.dev"]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn test_cors_permissive() {
        let mut config = sample();
        assert!(config.cors_permissive());

        config.api.cors_origins = vec!["https://app.sitebook.dev".to_string()];
        assert!(!config.cors_permissive());
    }

    #[test]
    fn test_mailer_config_from_email_config() {
        let email = EmailConfig {
            api_url: "https://mail.example.com/send".to_string(),
            api_key: "k".to_string(),
            from: "billing@sitebook.dev".to_string(),
        };
        let mailer = MailerConfig::from(&email);
        assert_eq!(mailer.from, "billing@sitebook.dev");
    }
}
