use std::env;
use std::str::FromStr;

pub fn get_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

pub fn get_env_or(key: &str, default: &str) -> String {
    get_env(key).unwrap_or_else(|| default.to_string())
}

pub fn get_env_parse<T: FromStr>(key: &str) -> Option<T> {
    get_env(key).and_then(|v| v.parse().ok())
}

pub fn get_env_parse_or<T: FromStr>(key: &str, default: T) -> T {
    match get_env(key) {
        Some(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, raw, "failed to parse environment variable, using default");
                default
            }
        },
        None => default,
    }
}

pub fn get_env_bool(key: &str, default: bool) -> bool {
    match get_env(key) {
        Some(raw) => matches!(raw.to_lowercase().as_str(), "true" | "1" | "yes" | "on"),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn get_env_or_returns_default_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("TOOLING_TEST_UNSET");
        assert_eq!(get_env_or("TOOLING_TEST_UNSET", "fallback"), "fallback");
    }

    #[test]
    fn get_env_parse_or_parses_valid_int() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("TOOLING_TEST_INT", "42");
        assert_eq!(get_env_parse_or::<u32>("TOOLING_TEST_INT", 0), 42);
        env::remove_var("TOOLING_TEST_INT");
    }

    #[test]
    fn get_env_parse_or_falls_back_on_invalid_value() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("TOOLING_TEST_BAD_INT", "not-a-number");
        assert_eq!(get_env_parse_or::<u32>("TOOLING_TEST_BAD_INT", 7), 7);
        env::remove_var("TOOLING_TEST_BAD_INT");
    }

    #[test]
    fn get_env_bool_recognizes_common_truthy_values() {
        let _guard = ENV_LOCK.lock().unwrap();
        for truthy in ["true", "TRUE", "1", "yes", "on"] {
            env::set_var("TOOLING_TEST_BOOL", truthy);
            assert!(get_env_bool("TOOLING_TEST_BOOL", false), "{truthy} should be truthy");
        }
        env::remove_var("TOOLING_TEST_BOOL");
    }

    #[test]
    fn get_env_bool_defaults_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("TOOLING_TEST_BOOL_UNSET");
        assert!(!get_env_bool("TOOLING_TEST_BOOL_UNSET", false));
    }
}
