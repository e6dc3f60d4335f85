//! Semantic version comparison for `semver_*` audience conditions.
//!
//! The target's precision bounds the comparison: a target of `"2.1"` equals every
//! `2.1.x` release, and `"2"` equals every `2.x.y`.

use std::cmp::Ordering;

/// Parsed semantic version: one to three numeric components plus an optional pre-release tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVersion {
    pub components: Vec<u32>,
    pub pre_release: Option<String>,
}

/// Maximum allowed value for a version component.
const MAX_VERSION_COMPONENT: u32 = 999_999_999;

/// Parse a semantic version string.
/// Returns None if the version is not a valid semver.
///
/// # Examples
///
/// ```
/// use flagkit_engine::utils::version::parse_version;
///
/// let v = parse_version("1.2.3").unwrap();
/// assert_eq!(v.components, vec![1, 2, 3]);
///
/// let v = parse_version("v2.1-beta").unwrap();
/// assert_eq!(v.components, vec![2, 1]);
/// assert_eq!(v.pre_release.as_deref(), Some("beta"));
///
/// assert!(parse_version("invalid").is_none());
/// ```
pub fn parse_version(version: &str) -> Option<ParsedVersion> {
    let trimmed = version.trim();
    if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
        return None;
    }

    let normalized = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    // Build metadata never takes part in precedence.
    let without_build = normalized.split('+').next().unwrap_or(normalized);

    let (core, pre_release) = match without_build.split_once('-') {
        Some((_, "")) => return None,
        Some((core, pre)) => (core, Some(pre.to_string())),
        None => (without_build, None),
    };

    let components = core
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            part.parse::<u32>().ok().filter(|n| *n <= MAX_VERSION_COMPONENT)
        })
        .collect::<Option<Vec<u32>>>()?;

    if components.is_empty() || components.len() > 3 {
        return None;
    }

    Some(ParsedVersion {
        components,
        pre_release,
    })
}

/// Compare `version` against `target`, honouring the target's precision.
///
/// Returns None if either side is not a valid version.
pub fn compare_versions(version: &str, target: &str) -> Option<Ordering> {
    let version = parse_version(version)?;
    let target = parse_version(target)?;

    for (index, target_part) in target.components.iter().enumerate() {
        match version.components.get(index) {
            Some(part) => match part.cmp(target_part) {
                Ordering::Equal => {}
                other => return Some(other),
            },
            None => return Some(Ordering::Less),
        }
    }

    let ordering = match (&version.pre_release, &target.pre_release) {
        (Some(a), Some(b)) => a.cmp(b),
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) if target.components.len() == 3 => Ordering::Less,
        _ => Ordering::Equal,
    };
    Some(ordering)
}

/// Check if `version` is less than `target`.
///
/// # Examples
///
/// ```
/// use flagkit_engine::utils::version::is_version_less_than;
///
/// assert!(is_version_less_than("1.0.0", "1.1"));
/// assert!(!is_version_less_than("1.1.5", "1.1"));
/// ```
pub fn is_version_less_than(version: &str, target: &str) -> bool {
    compare_versions(version, target) == Some(Ordering::Less)
}

/// Check if `version` is greater than or equal to `target`.
pub fn is_version_at_least(version: &str, target: &str) -> bool {
    matches!(
        compare_versions(version, target),
        Some(Ordering::Greater | Ordering::Equal)
    )
}
