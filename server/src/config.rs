use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub auth_key: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("SERVER_PORT", "8080"),
            database_url: try_load("DATABASE_URL", "sqlite://fooddb.sqlite"),
            auth_key: read_secret("AUTH_KEY"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

fn read_secret(secret_name: &str) -> String {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .ok()
        .or_else(|| {
            warn!("Failed to read {secret_name} from file, trying environment");
            env::var(secret_name).ok()
        })
        .expect("Secrets misconfigured!")
}
