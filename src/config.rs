use anyhow::{Context, Result};
use std::{net::SocketAddr, path::PathBuf};

pub const DEFAULT_CORS_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://localhost:5173", // vite dev server
    "http://127.0.0.1:3000",
    "http://127.0.0.1:5173",
];

/// Runtime configuration, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub models_dir: PathBuf,
    pub database_url: String,
    pub db_max_connections: u32,
    pub cors_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 5000,
            models_dir: PathBuf::from("trained_models"),
            database_url: "sqlite://predictions.db".to_string(),
            db_max_connections: 5,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl AppConfig {
    /// Optional variables: `BIND_ADDR`, `PORT`, `MODELS_DIR`, `DATABASE_URL`,
    /// `DB_MAX_CONNECTIONS`, `CORS_ORIGINS` (comma separated).
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable is set but does not parse.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("BIND_ADDR") {
            cfg.bind_addr = v;
        }
        if let Some(v) = lookup("PORT") {
            cfg.port = v
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port: {v}"))?;
        }
        if let Some(v) = lookup("MODELS_DIR") {
            cfg.models_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("DATABASE_URL") {
            cfg.database_url = v;
        }
        if let Some(v) = lookup("DB_MAX_CONNECTIONS") {
            cfg.db_max_connections = v
                .trim()
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS is not a number: {v}"))?;
        }
        if let Some(v) = lookup("CORS_ORIGINS") {
            cfg.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(cfg)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.bind_addr, self.port);
        addr.parse()
            .with_context(|| format!("invalid bind address {addr}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let cfg = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.models_dir, PathBuf::from("trained_models"));
        assert_eq!(cfg.database_url, "sqlite://predictions.db");
        assert_eq!(cfg.cors_origins.len(), 4);
        assert_eq!(cfg.socket_addr().unwrap().port(), 5000);
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("PORT", "8081"),
            ("MODELS_DIR", "/srv/models"),
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 8081);
        assert_eq!(cfg.models_dir, PathBuf::from("/srv/models"));
        assert_eq!(cfg.cors_origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = AppConfig::from_lookup(lookup_from(&[("PORT", "abc")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
