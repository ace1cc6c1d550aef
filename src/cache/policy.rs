use std::time::Duration;

use tracing::warn;

/// Resolve the effective TTL for a route.
///
/// A non-empty per-route value overrides the global default. `None` means
/// caching is disabled for the route: nothing configured, a zero duration, or
/// a value that does not parse (logged at warn).
pub fn resolve_ttl(route_ttl: Option<&str>, default_ttl: Option<&str>) -> Option<Duration> {
    let raw = route_ttl
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| default_ttl.map(str::trim).filter(|value| !value.is_empty()))?;

    match humantime::parse_duration(raw) {
        Ok(ttl) if ttl.is_zero() => None,
        Ok(ttl) => Some(ttl),
        Err(err) => {
            warn!(
                cache_ttl = raw,
                error = %err,
                "invalid cache_ttl duration; caching will be disabled"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_ttl_overrides_default() {
        assert_eq!(
            resolve_ttl(Some("10m"), Some("1h")),
            Some(Duration::from_secs(600))
        );
    }

    #[test]
    fn blank_route_ttl_falls_back_to_default() {
        assert_eq!(
            resolve_ttl(Some("  "), Some("1h")),
            Some(Duration::from_secs(3600))
        );
    }

    #[test]
    fn compound_durations_are_accepted() {
        assert_eq!(
            resolve_ttl(Some("1h 30m"), None),
            Some(Duration::from_secs(5400))
        );
    }

    #[test]
    fn missing_ttl_disables_caching() {
        assert_eq!(resolve_ttl(None, None), None);
    }

    #[test]
    fn invalid_ttl_disables_caching() {
        assert_eq!(resolve_ttl(Some("soon"), Some("1h")), None);
    }

    #[test]
    fn zero_ttl_disables_caching() {
        assert_eq!(resolve_ttl(Some("0s"), None), None);
    }
}
