use std::time::Duration;

use clap::Parser;

use crate::cache::CacheConfig;

/// Command-line and environment configuration. API keys are read by the upstream
/// clients themselves (`LAW_API_KEY`, `OPENAI_API_KEY`, `OPENAI_MODEL`).
#[derive(Debug, Parser)]
#[command(name = "lexgate", version)]
#[command(about = "MCP server for Korean legal research over law.go.kr", long_about = None)]
pub struct Config {
    /// Seconds a cached upstream response stays fresh
    #[arg(long, env = "LEXGATE_CACHE_TTL_SECS", default_value_t = 3600, value_name = "SECS")]
    pub cache_ttl_secs: u64,

    /// Maximum cached responses per upstream (0 disables caching)
    #[arg(long, env = "LEXGATE_CACHE_CAPACITY", default_value_t = 256, value_name = "NUM")]
    pub cache_capacity: usize,
}

impl Config {
    pub fn cache(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            capacity: self.cache_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "lexgate",
            "--cache-ttl-secs",
            "60",
            "--cache-capacity",
            "0",
        ])
        .unwrap();

        let cache = config.cache();
        assert_eq!(cache.ttl, Duration::from_secs(60));
        assert_eq!(cache.capacity, 0);
    }

    #[test]
    fn rejects_non_numeric_ttl() {
        assert!(Config::try_parse_from(["lexgate", "--cache-ttl-secs", "soon"]).is_err());
    }

    #[test]
    fn command_is_well_formed() {
        use clap::CommandFactory;
        Config::command().debug_assert();
    }
}
