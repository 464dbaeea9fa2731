use anyhow::{Context, Result};
use url::Url;

/// Extracts the host/port pair to probe from a Redis connection URL.
/// A URL that parses but omits host or port falls back to the local default;
/// a URL that does not parse at all is the caller's problem.
pub fn parse_redis_target(redis_url: &str) -> Result<(String, u16)> {
    let url = Url::parse(redis_url.trim())
        .with_context(|| format!("Invalid Redis URL: {}", redis_url.trim()))?;
    let host = url.host_str().unwrap_or("127.0.0.1").to_string();
    let port = url.port().unwrap_or(6379);
    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_redis_url() {
        let (host, port) = parse_redis_target("redis://192.168.20.7:6380/0").unwrap();
        assert_eq!(host, "192.168.20.7");
        assert_eq!(port, 6380);
    }

    #[test]
    fn missing_port_defaults_to_redis_default() {
        let (host, port) = parse_redis_target("redis://cache.internal/1").unwrap();
        assert_eq!(host, "cache.internal");
        assert_eq!(port, 6379);
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        let (host, port) = parse_redis_target("  redis://127.0.0.1:6379/0  ").unwrap();
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 6379);
    }

    #[test]
    fn non_url_input_is_an_error() {
        assert!(parse_redis_target("not a url at all").is_err());
        assert!(parse_redis_target("").is_err());
    }
}
