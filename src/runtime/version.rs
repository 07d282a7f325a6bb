//! Version string parsing for kernel, OS release and cluster versions
//!
//! None of these formats come with a schema. Kernel versions follow
//! `W.XX.Y-ZZZ.<rest>` (e.g. `4.18.0-305.19.1.el8_4.x86_64`), OS releases
//! come from NFD as separate id/major/minor labels, and cluster versions are
//! plain dotted strings (`4.10.23`).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Rendered operating system identifiers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsRelease {
    /// Normalized release id, e.g. `rhel`
    pub id: String,
    /// Id with major version, e.g. `rhel8`
    pub major: String,
    /// Id with major.minor version, e.g. `rhel8.4`
    pub major_minor: String,
    /// Bare decimal version, e.g. `8.4`
    pub decimal: String,
}

/// Derive the kernel patch identifier from a full kernel version.
///
/// `4.18.0-305.19.1.el8_4.x86_64` yields `4-305`. Without a patch suffix the
/// first three dot components are returned, so `5.4.17` stays `5.4.17`.
pub fn parse_kernel_patch(full: &str) -> Result<String> {
    let full = full.trim();
    if full.is_empty() {
        return Err(Error::missing_fact("kernel full version"));
    }

    if let Some((base, suffix)) = full.split_once('-') {
        let patch = suffix.split('.').next().unwrap_or_default();
        if !patch.is_empty() {
            let kernel = base.split('.').next().unwrap_or(base);
            return Ok(format!("{kernel}-{patch}"));
        }
    }

    let base = full.split('-').next().unwrap_or(full);
    Ok(base.split('.').take(3).collect::<Vec<_>>().join("."))
}

/// Render the OS identifiers from the NFD `os_release` label values.
///
/// `id` and `major` are required; an empty `minor` yields major-only forms.
pub fn parse_os_release(id: &str, major: &str, minor: &str) -> Result<OsRelease> {
    let id = id.trim().to_lowercase();
    let major = major.trim();
    let minor = minor.trim();

    if id.is_empty() {
        return Err(Error::missing_label("os_release.ID"));
    }
    if major.is_empty() {
        return Err(Error::missing_label("os_release.VERSION_ID.major"));
    }

    let (major_minor, decimal) = if minor.is_empty() {
        (format!("{id}{major}"), major.to_string())
    } else {
        (format!("{id}{major}.{minor}"), format!("{major}.{minor}"))
    };

    Ok(OsRelease {
        major: format!("{id}{major}"),
        id,
        major_minor,
        decimal,
    })
}

/// First two dot components of a cluster version, or the whole string
pub fn parse_cluster_major_minor(version: &str) -> String {
    let mut parts = version.split('.');
    match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) => format!("{major}.{minor}"),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_patch_from_rhel_kernel() {
        assert_eq!(
            parse_kernel_patch("4.18.0-305.19.1.el8_4.x86_64").unwrap(),
            "4-305"
        );
        assert_eq!(parse_kernel_patch("5.14.0-70.el9.x86_64").unwrap(), "5-70");
    }

    #[test]
    fn test_kernel_patch_without_suffix() {
        assert_eq!(parse_kernel_patch("5.4.17").unwrap(), "5.4.17");
        assert_eq!(parse_kernel_patch("5.4.17.2").unwrap(), "5.4.17");
        assert_eq!(parse_kernel_patch("6.1").unwrap(), "6.1");
    }

    #[test]
    fn test_kernel_patch_with_empty_suffix_falls_back() {
        assert_eq!(parse_kernel_patch("5.4.17-").unwrap(), "5.4.17");
    }

    #[test]
    fn test_kernel_patch_rejects_empty() {
        let err = parse_kernel_patch("  ").unwrap_err();
        assert!(matches!(err, Error::MissingFact { .. }));
    }

    #[test]
    fn test_os_release_with_minor() {
        let os = parse_os_release("RHEL", "8", "4").unwrap();
        assert_eq!(os.id, "rhel");
        assert_eq!(os.major, "rhel8");
        assert_eq!(os.major_minor, "rhel8.4");
        assert_eq!(os.decimal, "8.4");
    }

    #[test]
    fn test_os_release_without_minor() {
        let os = parse_os_release("rhcos", "4", "").unwrap();
        assert_eq!(os.major, "rhcos4");
        assert_eq!(os.major_minor, "rhcos4");
        assert_eq!(os.decimal, "4");
    }

    #[test]
    fn test_os_release_requires_id_and_major() {
        assert!(matches!(
            parse_os_release("", "8", "4"),
            Err(Error::MissingFact { key, .. }) if key.contains("ID")
        ));
        assert!(matches!(
            parse_os_release("rhel", "", "4"),
            Err(Error::MissingFact { key, .. }) if key.contains("major")
        ));
    }

    #[test]
    fn test_cluster_major_minor() {
        assert_eq!(parse_cluster_major_minor("4.10.23"), "4.10");
        assert_eq!(parse_cluster_major_minor("4.10"), "4.10");
        assert_eq!(parse_cluster_major_minor("4"), "4");
    }
}
