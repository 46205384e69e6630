//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::game::player::{HpFloor, HpReplication};
use crate::matchmaking::seats::SeatPolicy;
use crate::util::rate_limit::CHAT_RATE_LIMIT;
use crate::util::time::{
    DEFAULT_FIXED_TPS, MAX_FIXED_TPS, STATUS_POLL_MILLIS, TEARDOWN_POLL_MILLIS,
};

/// Client configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Region reported by the loopback transport
    pub region: String,

    /// Fixed simulation ticks per second
    pub fixed_tps: u32,
    /// Interval of the status line poll
    pub status_poll: Duration,
    /// Interval between checks while tearing the connection down
    pub teardown_poll: Duration,

    /// How seats are handed out on room join
    pub seat_policy: SeatPolicy,
    /// When the owner pushes its hp to the other peers
    pub hp_replication: HpReplication,
    /// Whether hp may drop below zero
    pub hp_floor: HpFloor,
    /// Global animator speed multiplier applied to every action window
    pub animator_speed: f64,

    /// Seed for room name generation (random when unset)
    pub room_seed: Option<u64>,
    /// Outgoing chat messages allowed per second
    pub chat_rate_limit: u32,
    /// Nickname override (generated when unset)
    pub nickname: Option<String>,

    /// How long the demo binary runs before tearing down
    pub demo_duration: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            region: "local".to_string(),
            fixed_tps: DEFAULT_FIXED_TPS,
            status_poll: Duration::from_millis(STATUS_POLL_MILLIS),
            teardown_poll: Duration::from_millis(TEARDOWN_POLL_MILLIS),
            seat_policy: SeatPolicy::default(),
            hp_replication: HpReplication::default(),
            hp_floor: HpFloor::default(),
            animator_speed: 1.5,
            room_seed: None,
            chat_rate_limit: CHAT_RATE_LIMIT,
            nickname: None,
            demo_duration: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let fixed_tps: u32 = parse_or(&lookup, "FIXED_TPS", defaults.fixed_tps)?;
        // The tick interval has microsecond resolution and must not round to zero
        if fixed_tps == 0 || fixed_tps > MAX_FIXED_TPS {
            return Err(ConfigError::Invalid {
                key: "FIXED_TPS",
                value: fixed_tps.to_string(),
            });
        }

        let seat_policy = match lookup("SEAT_POLICY") {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "authoritative" | "master" => SeatPolicy::Authoritative,
                "replicated" | "legacy" => SeatPolicy::Replicated,
                _ => return Err(ConfigError::Invalid { key: "SEAT_POLICY", value }),
            },
            None => defaults.seat_policy,
        };

        let hp_replication = match lookup("HP_REPLICATION") {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "on_change" | "delta" => HpReplication::OnChange,
                "every_tick" | "full" => HpReplication::EveryTick,
                _ => return Err(ConfigError::Invalid { key: "HP_REPLICATION", value }),
            },
            None => defaults.hp_replication,
        };

        let hp_floor = match lookup("HP_FLOOR") {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "clamp" | "clamped" => HpFloor::Clamp,
                "unclamped" | "none" => HpFloor::Unclamped,
                _ => return Err(ConfigError::Invalid { key: "HP_FLOOR", value }),
            },
            None => defaults.hp_floor,
        };

        let animator_speed: f64 = parse_or(&lookup, "ANIMATOR_SPEED", defaults.animator_speed)?;
        if animator_speed.is_nan() || animator_speed <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "ANIMATOR_SPEED",
                value: animator_speed.to_string(),
            });
        }

        let room_seed = match lookup("ROOM_SEED") {
            Some(value) => Some(value.parse().map_err(|_| ConfigError::Invalid {
                key: "ROOM_SEED",
                value,
            })?),
            None => None,
        };

        Ok(Self {
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            region: lookup("REGION").unwrap_or(defaults.region),
            fixed_tps,
            status_poll: parse_interval(&lookup, "STATUS_POLL_MS", STATUS_POLL_MILLIS)?,
            teardown_poll: parse_interval(&lookup, "TEARDOWN_POLL_MS", TEARDOWN_POLL_MILLIS)?,
            seat_policy,
            hp_replication,
            hp_floor,
            animator_speed,
            room_seed,
            chat_rate_limit: parse_or(&lookup, "CHAT_RATE_LIMIT", defaults.chat_rate_limit)?,
            nickname: lookup("NICKNAME").filter(|name| !name.is_empty()),
            demo_duration: Duration::from_secs(parse_or(&lookup, "DEMO_SECONDS", 5u64)?),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

/// A non-zero interval given in milliseconds
fn parse_interval<F>(lookup: &F, key: &'static str, default_ms: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let millis: u64 = parse_or(lookup, key, default_ms)?;
    if millis == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: millis.to_string(),
        });
    }
    Ok(Duration::from_millis(millis))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
