use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,

    // Rate limiting
    pub rate_tap_per_min: u32,
    pub rate_admin_per_min: u32,

    pub badge_cache_capacity: u64,
    pub badge_cache_ttl_secs: u64,

    /// Spreadsheet mirrored after every tap; no sync when unset.
    pub sheet_export_path: Option<PathBuf>,

    pub log_dir: String,
    pub api_prefix: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Self {
            server_addr: var_or("SERVER_ADDR", "0.0.0.0:8080"),
            database_url: lookup("DATABASE_URL").expect("DATABASE_URL must be set"),

            rate_tap_per_min: parse_var("RATE_TAP_PER_MIN", var_or("RATE_TAP_PER_MIN", "120")),
            rate_admin_per_min: parse_var("RATE_ADMIN_PER_MIN", var_or("RATE_ADMIN_PER_MIN", "600")),

            badge_cache_capacity: parse_var(
                "BADGE_CACHE_CAPACITY",
                var_or("BADGE_CACHE_CAPACITY", "50000"),
            ),
            badge_cache_ttl_secs: parse_var(
                "BADGE_CACHE_TTL_SECS",
                var_or("BADGE_CACHE_TTL_SECS", "86400"), // 24h
            ),

            sheet_export_path: lookup("SHEET_EXPORT_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),

            log_dir: var_or("LOG_DIR", "logs"),
            api_prefix: var_or("API_PREFIX", "/api"),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: String) -> T {
    raw.trim()
        .parse()
        .unwrap_or_else(|_| panic!("{key} has an invalid value: {raw}"))
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
    fn defaults_apply_when_only_database_is_set() {
        let config = Config::from_lookup(lookup_from(&[("DATABASE_URL", "mysql://localhost/tap")]));

        assert_eq!(config.database_url, "mysql://localhost/tap");
        assert_eq!(config.server_addr, "0.0.0.0:8080");
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.rate_tap_per_min, 120);
        assert_eq!(config.badge_cache_ttl_secs, 86400);
        assert!(config.sheet_export_path.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "mysql://db/tap"),
            ("RATE_TAP_PER_MIN", " 30 "),
            ("SHEET_EXPORT_PATH", "/var/lib/tap/attendance.csv"),
            ("API_PREFIX", "/v1"),
        ]));

        assert_eq!(config.rate_tap_per_min, 30);
        assert_eq!(
            config.sheet_export_path,
            Some(PathBuf::from("/var/lib/tap/attendance.csv"))
        );
        assert_eq!(config.api_prefix, "/v1");
    }

    #[test]
    #[should_panic(expected = "DATABASE_URL must be set")]
    fn database_url_is_required() {
        Config::from_lookup(lookup_from(&[]));
    }

    #[test]
    #[should_panic(expected = "RATE_TAP_PER_MIN has an invalid value")]
    fn bad_numbers_abort() {
        Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "mysql://db/tap"),
            ("RATE_TAP_PER_MIN", "lots"),
        ]));
    }
}
