//! SDK version parsing and comparison.
//!
//! The telemetry block list delivered in the tenant configuration is keyed by
//! SDK version strings, so versions coming off the wire need tolerant parsing
//! and a total order.

/// Parsed semantic version components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ParsedVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// Upper bound on version components, to reject garbage wire values.
const MAX_VERSION_COMPONENT: u32 = 999_999_999;

/// Parse a version string into numeric components. Tolerates a leading
/// 'v'/'V', surrounding whitespace, and pre-release or build suffixes on the
/// patch component. Returns None for anything that is not `major.minor.patch`.
///
/// # Examples
///
/// ```
/// use convokit::utils::version::parse_version;
///
/// let v = parse_version("1.2.3").unwrap();
/// assert_eq!((v.major, v.minor, v.patch), (1, 2, 3));
///
/// assert!(parse_version("v2.0.0").is_some());
/// assert!(parse_version(" 1.0.0 ").is_some());
/// assert!(parse_version("not-a-version").is_none());
/// ```
pub fn parse_version(version: &str) -> Option<ParsedVersion> {
    let trimmed = version.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    let mut parts = normalized.split('.');
    let major = parse_component(parts.next()?)?;
    let minor = parse_component(parts.next()?)?;
    // Patch may carry a pre-release or build suffix, "3-beta.1" or "3+build".
    let patch_part = parts.next()?;
    let patch_str = patch_part
        .split('-')
        .next()
        .and_then(|s| s.split('+').next())
        .unwrap_or(patch_part);
    let patch = parse_component(patch_str)?;

    Some(ParsedVersion {
        major,
        minor,
        patch,
    })
}

fn parse_component(raw: &str) -> Option<u32> {
    let value = raw.parse::<u32>().ok()?;
    if value > MAX_VERSION_COMPONENT {
        return None;
    }
    Some(value)
}

/// Compare two version strings. Either side failing to parse compares as
/// `Equal`, so malformed server data never flips a block decision on its own.
pub fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    match (parse_version(a), parse_version(b)) {
        (Some(parsed_a), Some(parsed_b)) => parsed_a.cmp(&parsed_b),
        _ => std::cmp::Ordering::Equal,
    }
}

/// Whether version `a` is greater than or equal to version `b`.
///
/// # Examples
///
/// ```
/// use convokit::utils::version::is_version_at_least;
///
/// assert!(is_version_at_least("1.1.0", "1.0.0"));
/// assert!(is_version_at_least("1.0.0", "1.0.0"));
/// assert!(!is_version_at_least("1.0.0", "1.1.0"));
/// ```
pub fn is_version_at_least(a: &str, b: &str) -> bool {
    compare_versions(a, b) != std::cmp::Ordering::Less
}

/// Whether version `a` is strictly less than version `b`.
pub fn is_version_less_than(a: &str, b: &str) -> bool {
    compare_versions(a, b) == std::cmp::Ordering::Less
}
