//! Runtime configuration, populated from environment variables.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

/// Which deployment the process is running as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => bail!("unknown APP_ENV {other:?}, expected development or production"),
        }
    }
}

/// Credentials for the Cloudinary media host.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Where uploaded media ends up.
#[derive(Debug, Clone)]
pub enum MediaConfig {
    Cloudinary(CloudinaryConfig),
    /// Files copied under `root` and served back at `{public_url}/media`.
    Local { root: PathBuf, public_url: String },
}

/// Runtime configuration for the server.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `PORT` | `8000` | TCP port to listen on |
/// | `DATABASE_URL` | required | SQLite connection string |
/// | `ACCESS_TOKEN_SECRET` | required | HS256 secret for access tokens |
/// | `ACCESS_TOKEN_EXPIRY` | `1d` | Access token lifetime |
/// | `REFRESH_TOKEN_SECRET` | required | HS256 secret for refresh tokens |
/// | `REFRESH_TOKEN_EXPIRY` | `10d` | Refresh token lifetime |
/// | `CORS_ORIGIN` | `*` | Allowed origin |
/// | `APP_ENV` | `production` | `development` exposes error detail |
/// | `CLOUDINARY_*` | (absent) | Cloud name, API key and secret |
/// | `MEDIA_ROOT` | `./public/media` | Local media directory |
/// | `PUBLIC_URL` | `http://localhost:$PORT` | Base URL for local media |
/// | `UPLOAD_TMP_DIR` | `./public/temp` | Spool directory for uploads |
/// | `MAX_UPLOAD_BYTES` | `104857600` | Request body cap on upload routes |
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub access_token_secret: String,
    pub access_token_expiry: time::Duration,
    pub refresh_token_secret: String,
    pub refresh_token_expiry: time::Duration,
    pub cors_origin: String,
    pub environment: Environment,
    pub media: MediaConfig,
    pub upload_tmp_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(port) => port.parse().context("PORT must be a valid port number")?,
            Err(_) => 8000,
        };

        let cloudinary = match (
            std::env::var("CLOUDINARY_CLOUD_NAME"),
            std::env::var("CLOUDINARY_API_KEY"),
            std::env::var("CLOUDINARY_API_SECRET"),
        ) {
            (Ok(cloud_name), Ok(api_key), Ok(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };
        let media = match cloudinary {
            Some(cloudinary) => MediaConfig::Cloudinary(cloudinary),
            None => MediaConfig::Local {
                root: env_or("MEDIA_ROOT", "./public/media").into(),
                public_url: std::env::var("PUBLIC_URL")
                    .unwrap_or_else(|_| format!("http://localhost:{port}")),
            },
        };

        Ok(Self {
            port,
            database_url: required("DATABASE_URL")?,
            access_token_secret: required("ACCESS_TOKEN_SECRET")?,
            access_token_expiry: parse_duration(&env_or("ACCESS_TOKEN_EXPIRY", "1d"))
                .context("ACCESS_TOKEN_EXPIRY")?,
            refresh_token_secret: required("REFRESH_TOKEN_SECRET")?,
            refresh_token_expiry: parse_duration(&env_or("REFRESH_TOKEN_EXPIRY", "10d"))
                .context("REFRESH_TOKEN_EXPIRY")?,
            cors_origin: env_or("CORS_ORIGIN", "*"),
            environment: Environment::parse(&env_or("APP_ENV", "production"))?,
            media,
            upload_tmp_dir: env_or("UPLOAD_TMP_DIR", "./public/temp").into(),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", "104857600")
                .parse()
                .context("MAX_UPLOAD_BYTES must be a byte count")?,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set"))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_owned())
}

/// Parses `90`, `90s`, `15m`, `12h`, `1d` or `2w`.
pub fn parse_duration(value: &str) -> Result<time::Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, unit) = value.split_at(split);
    let amount: i64 = amount
        .parse()
        .with_context(|| format!("invalid duration {value:?}"))?;
    let duration = match unit {
        "" | "s" => time::Duration::seconds(amount),
        "m" => time::Duration::minutes(amount),
        "h" => time::Duration::hours(amount),
        "d" => time::Duration::days(amount),
        "w" => time::Duration::weeks(amount),
        other => bail!("invalid duration unit {other:?} in {value:?}"),
    };
    if duration <= time::Duration::ZERO {
        bail!("duration {value:?} must be positive");
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_durations_with_units() {
        assert_eq!(parse_duration("90").unwrap(), time::Duration::seconds(90));
        assert_eq!(parse_duration("15m").unwrap(), time::Duration::minutes(15));
        assert_eq!(parse_duration("1d").unwrap(), time::Duration::days(1));
        assert_eq!(parse_duration(" 2w ").unwrap(), time::Duration::weeks(2));
    }

    #[test]
    fn rejects_bad_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("d").is_err());
        assert!(parse_duration("10y").is_err());
        assert!(parse_duration("0").is_err());
    }

    #[test]
    fn environment_names() {
        assert_eq!(
            Environment::parse("Development").unwrap(),
            Environment::Development
        );
        assert_eq!(Environment::parse("prod").unwrap(), Environment::Production);
        assert!(Environment::parse("staging").is_err());
    }
}
