use std::env;
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Hex token of `bytes` random bytes drawn from the OS CSPRNG.
pub fn random_id(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Cuts `value` to at most `max` characters, marking the cut with "...".
pub fn truncate(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}

pub fn env_or(key: &str, fallback: &str) -> String {
    env_opt(key).unwrap_or_else(|| fallback.to_string())
}

pub fn env_opt(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

pub fn env_parse<T: FromStr>(key: &str, fallback: T) -> T {
    env_opt(key)
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(fallback)
}

pub fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn random_ids_are_short_unique_hex() {
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let id = random_id(4);
            assert_eq!(id.len(), 8);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
            assert!(seen.insert(id), "duplicate id");
        }
    }

    #[test]
    fn truncate_marks_cut_strings() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hello...");
        assert_eq!(truncate("", 5), "");
        assert_eq!(truncate("exactly", 7), "exactly");
        assert_eq!(truncate("exactly8", 7), "exactly...");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 4), "héll...");
    }
}
