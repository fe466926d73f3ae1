//! CORS configuration.
//!
//! - `CORS_ALLOWED_ORIGINS`: comma separated list of origins
//!   (default: `http://localhost:3000,http://localhost:5173`)

use std::env;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self::parse_origins("http://localhost:3000,http://localhost:5173")
    }
}

impl CorsConfig {
    #[must_use]
    pub fn from_env() -> Self {
        env::var("CORS_ALLOWED_ORIGINS")
            .map(|origins| Self::parse_origins(&origins))
            .unwrap_or_default()
    }

    fn parse_origins(raw: &str) -> Self {
        let allowed_origins = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self { allowed_origins }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins_trims_and_skips_empty() {
        let config = CorsConfig::parse_origins(" https://a.school , ,https://b.school");
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.school".to_string(), "https://b.school".to_string()]
        );
    }

    #[test]
    fn test_default_origins() {
        assert_eq!(CorsConfig::default().allowed_origins.len(), 2);
    }
}
