use std::time::Duration;

use serde::Deserialize;

/// Top-level server configuration, loaded from `shootout.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub limits: LimitsConfig,
    pub timing: TimingConfig,
    pub matches: MatchesConfig,
    /// Fixed RNG seed for reproducible codes, bot delays, and fallback zones.
    pub rng_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:4000".to_string(),
            limits: LimitsConfig::default(),
            timing: TimingConfig::default(),
            matches: MatchesConfig::default(),
            rng_seed: None,
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub ws_rate_limit_per_sec: f64,
    pub player_message_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 500,
            ws_rate_limit_per_sec: 20.0,
            player_message_buffer: 64,
        }
    }
}

/// Round timing, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long a round waits for input before random zones are filled in.
    pub fallback_ms: u64,
    pub bot_min_delay_ms: u64,
    pub bot_max_delay_ms: u64,
    /// Pause between "both chose" and the result.
    pub resolve_delay_ms: u64,
    pub inter_round_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fallback_ms: 10_000,
            bot_min_delay_ms: 1_000,
            bot_max_delay_ms: 3_000,
            resolve_delay_ms: 100,
            inter_round_ms: 3_000,
        }
    }
}

impl TimingConfig {
    pub fn fallback(&self) -> Duration {
        Duration::from_millis(self.fallback_ms)
    }

    pub fn resolve_delay(&self) -> Duration {
        Duration::from_millis(self.resolve_delay_ms)
    }

    pub fn inter_round(&self) -> Duration {
        Duration::from_millis(self.inter_round_ms)
    }
}

/// Match lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchesConfig {
    pub default_rounds_per_player: u32,
    pub max_rounds_per_player: u32,
    /// How long a finished match stays listed before the sweeper drops it.
    pub finished_retention_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for MatchesConfig {
    fn default() -> Self {
        Self {
            default_rounds_per_player: 1,
            max_rounds_per_player: 10,
            finished_retention_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

impl MatchesConfig {
    /// Resolve a requested rounds-per-player into a total (always even)
    /// half-round count.
    pub fn max_rounds_for(&self, requested: u32) -> u32 {
        let per_player = if requested == 0 {
            self.default_rounds_per_player
        } else {
            requested.min(self.max_rounds_per_player)
        };
        per_player.max(1) * 2
    }
}

impl ServerConfig {
    /// Validate configuration. Returns a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "listen_addr {:?} is not a valid socket address",
                self.listen_addr
            ));
        }

        if self.limits.max_ws_connections == 0 {
            return Err("limits.max_ws_connections must be > 0".to_string());
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            return Err("limits.ws_rate_limit_per_sec must be > 0".to_string());
        }
        if self.limits.player_message_buffer == 0 {
            return Err("limits.player_message_buffer must be > 0".to_string());
        }

        if self.timing.fallback_ms == 0 {
            return Err("timing.fallback_ms must be > 0".to_string());
        }
        if self.timing.bot_min_delay_ms > self.timing.bot_max_delay_ms {
            return Err("timing.bot_min_delay_ms must be <= timing.bot_max_delay_ms".to_string());
        }

        if self.matches.default_rounds_per_player == 0 {
            return Err("matches.default_rounds_per_player must be > 0".to_string());
        }
        if self.matches.max_rounds_per_player < self.matches.default_rounds_per_player {
            return Err(
                "matches.max_rounds_per_player must be >= default_rounds_per_player".to_string(),
            );
        }
        if self.matches.sweep_interval_secs == 0 {
            return Err("matches.sweep_interval_secs must be > 0".to_string());
        }

        Ok(())
    }

    /// Load config from `shootout.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("shootout.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from shootout.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse shootout.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No shootout.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("SHOOTOUT_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        } else if let Ok(port) = std::env::var("PORT")
            && let Ok(port) = port.parse::<u16>()
        {
            config.listen_addr = format!("0.0.0.0:{port}");
        }
        if let Ok(val) = std::env::var("SHOOTOUT_FALLBACK_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.timing.fallback_ms = n;
        }
        if let Ok(val) = std::env::var("SHOOTOUT_INTER_ROUND_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.timing.inter_round_ms = n;
        }
        if let Ok(val) = std::env::var("SHOOTOUT_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("SHOOTOUT_RNG_SEED")
            && let Ok(n) = val.parse::<u64>()
        {
            config.rng_seed = Some(n);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:4000");
        assert_eq!(cfg.timing.fallback(), Duration::from_secs(10));
        assert_eq!(cfg.timing.resolve_delay(), Duration::from_millis(100));
        assert_eq!(cfg.timing.inter_round(), Duration::from_secs(3));
        assert!(cfg.rng_seed.is_none());
    }

    #[test]
    fn default_config_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_invalid_addr() {
        let cfg = ServerConfig {
            listen_addr: "not-an-address".to_string(),
            ..ServerConfig::default()
        };
        assert!(cfg.validate().unwrap_err().contains("listen_addr"));
    }

    #[test]
    fn validate_rejects_inverted_bot_delay() {
        let cfg = ServerConfig {
            timing: TimingConfig {
                bot_min_delay_ms: 5_000,
                bot_max_delay_ms: 1_000,
                ..TimingConfig::default()
            },
            ..ServerConfig::default()
        };
        assert!(cfg.validate().unwrap_err().contains("bot_min_delay_ms"));
    }

    #[test]
    fn validate_rejects_zero_fallback() {
        let cfg = ServerConfig {
            timing: TimingConfig {
                fallback_ms: 0,
                ..TimingConfig::default()
            },
            ..ServerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn max_rounds_is_always_even() {
        let m = MatchesConfig::default();
        assert_eq!(m.max_rounds_for(0), 2);
        assert_eq!(m.max_rounds_for(1), 2);
        assert_eq!(m.max_rounds_for(3), 6);
        assert_eq!(m.max_rounds_for(1_000), 20);
        for n in 0..50 {
            assert_eq!(m.max_rounds_for(n) % 2, 0);
        }
    }

    #[test]
    fn parse_timing_toml() {
        let toml_str = r#"
listen_addr = "127.0.0.1:9090"
rng_seed = 7

[timing]
fallback_ms = 5000
inter_round_ms = 1000

[matches]
max_rounds_per_player = 5
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9090");
        assert_eq!(cfg.rng_seed, Some(7));
        assert_eq!(cfg.timing.fallback_ms, 5000);
        assert_eq!(cfg.timing.inter_round_ms, 1000);
        // Unspecified keys keep their defaults
        assert_eq!(cfg.timing.resolve_delay_ms, 100);
        assert_eq!(cfg.matches.max_rounds_per_player, 5);
        assert_eq!(cfg.matches.default_rounds_per_player, 1);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let cfg: ServerConfig = toml::from_str("listen_addr = \"0.0.0.0:8080\"").unwrap();
        assert_eq!(cfg.limits.max_ws_connections, 500);
        assert_eq!(cfg.matches.finished_retention_secs, 300);
    }
}
