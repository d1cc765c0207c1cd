//! Environment-driven configuration with development defaults.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::orm::DbConfig;

/// Process configuration, read once at startup. Every value has a local
/// development default; `WEBLOG_*` environment variables override.
#[derive(Clone, Debug)]
pub struct Config {
    pub listen: SocketAddr,
    pub db: DbConfig,
    pub session_secret: String,
    pub static_dir: String,
}

impl Config {
    pub fn from_env() -> Config {
        let db = DbConfig {
            host: env_or("WEBLOG_DB_HOST", "localhost"),
            port: env_parse("WEBLOG_DB_PORT", 3306),
            user: env_or("WEBLOG_DB_USER", "root"),
            password: env_or("WEBLOG_DB_PASSWORD", ""),
            database: env_or("WEBLOG_DB_NAME", "weblog"),
            charset: env_or("WEBLOG_DB_CHARSET", "utf8"),
            pool_min: env_parse("WEBLOG_DB_POOL_MIN", 1),
            pool_max: env_parse("WEBLOG_DB_POOL_MAX", 10),
        };
        Config {
            listen: env_parse("WEBLOG_LISTEN", SocketAddr::from(([127, 0, 0, 1], 9000))),
            db,
            session_secret: env_or("WEBLOG_SESSION_SECRET", "Awesome"),
            static_dir: env_or("WEBLOG_STATIC_DIR", "static"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_overrides_fall_back_on_bad_values() {
        env::set_var("WEBLOG_TEST_POOL", "not-a-number");
        assert_eq!(env_parse("WEBLOG_TEST_POOL", 42u32), 42);
        env::set_var("WEBLOG_TEST_POOL", "7");
        assert_eq!(env_parse("WEBLOG_TEST_POOL", 42u32), 7);
        env::remove_var("WEBLOG_TEST_POOL");
    }
}
