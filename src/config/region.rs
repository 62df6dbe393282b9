//! PingOne region resolution.
//!
//! Every PingOne tenant lives in one geography. The region code selects the
//! top-level domain suffix used by the `auth`, `api` and `agreementmgmt` hosts,
//! for example `auth.pingone.eu` for an `EU` tenant.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Suffix used when the region code is not recognised.
pub const FALLBACK_SUFFIX: &str = "com";

/// A PingOne region code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegionCode {
    /// Asia-Pacific `.asia` tenants.
    Ap,
    /// Asia-Pacific `.com.au` tenants.
    Au,
    /// Canada `.ca` tenants.
    Ca,
    /// Europe `.eu` tenants.
    Eu,
    /// North America `.com` tenants.
    Na,
    /// Singapore `.sg` tenants.
    Sg,
}

impl RegionCode {
    pub const ALL: [RegionCode; 6] = [
        RegionCode::Ap,
        RegionCode::Au,
        RegionCode::Ca,
        RegionCode::Eu,
        RegionCode::Na,
        RegionCode::Sg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegionCode::Ap => "AP",
            RegionCode::Au => "AU",
            RegionCode::Ca => "CA",
            RegionCode::Eu => "EU",
            RegionCode::Na => "NA",
            RegionCode::Sg => "SG",
        }
    }

    /// Hostname suffix for this region, without a leading dot.
    pub fn url_suffix(&self) -> &'static str {
        match self {
            RegionCode::Ap => "asia",
            RegionCode::Au => "com.au",
            RegionCode::Ca => "ca",
            RegionCode::Eu => "eu",
            RegionCode::Na => "com",
            RegionCode::Sg => "sg",
        }
    }

    /// Maps a value of the deprecated `region` option onto a region code.
    pub fn from_legacy_region(region: &str) -> Option<Self> {
        match region.trim() {
            "AsiaPacific" => Some(RegionCode::Ap),
            "Canada" => Some(RegionCode::Ca),
            "Europe" => Some(RegionCode::Eu),
            "NorthAmerica" => Some(RegionCode::Na),
            _ => None,
        }
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegionCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        RegionCode::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(code))
            .ok_or_else(|| format!("unknown region code '{}'", code))
    }
}

/// Outcome of resolving a configured region code into a hostname suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRegion {
    /// The recognised region, if any.
    pub code: Option<RegionCode>,
    /// Hostname suffix, `com` when the code was not recognised.
    pub suffix: &'static str,
    /// Advisory warning to surface at configure time.
    pub warning: Option<String>,
}

/// Resolve a region code into its hostname suffix.
///
/// Unknown codes fall through to `com` and carry an advisory warning.
pub fn resolve_region(code: &str) -> ResolvedRegion {
    match code.parse::<RegionCode>() {
        Ok(region) => ResolvedRegion {
            code: Some(region),
            suffix: region.url_suffix(),
            warning: None,
        },
        Err(_) => ResolvedRegion {
            code: None,
            suffix: FALLBACK_SUFFIX,
            warning: Some(format!(
                "The region code '{}' is not recognised; valid options are: {}. Falling back to the `.{}` service endpoints.",
                code.trim(),
                RegionCode::ALL
                    .iter()
                    .map(RegionCode::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                FALLBACK_SUFFIX,
            )),
        },
    }
}

/// Deprecation notice emitted when the legacy `region` option is used.
pub const LEGACY_REGION_DEPRECATION: &str = "The `region` option and PINGONE_REGION environment variable are now deprecated and should be replaced with `region_code` (PINGONE_REGION_CODE).\n\nOptions for `region_code` are `AP` (`.asia` tenants), `AU` (`.com.au` tenants), `CA` (`.ca` tenants), `EU` (`.eu` tenants), `NA` (`.com` tenants) and `SG` (`.sg` tenants).";

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::asia("AP", "asia")]
    #[case::australia("AU", "com.au")]
    #[case::canada("CA", "ca")]
    #[case::europe("EU", "eu")]
    #[case::north_america("NA", "com")]
    #[case::singapore("SG", "sg")]
    #[case::lowercase("eu", "eu")]
    #[case::padded(" CA ", "ca")]
    fn test_known_region_suffix(#[case] code: &str, #[case] suffix: &str) {
        let resolved = resolve_region(code);
        assert_eq!(resolved.suffix, suffix);
        assert!(resolved.code.is_some());
        assert!(resolved.warning.is_none());
    }

    #[rstest]
    #[case::empty("")]
    #[case::typo("NAA")]
    #[case::legacy_name("Europe")]
    fn test_unknown_region_falls_back_to_com(#[case] code: &str) {
        let resolved = resolve_region(code);
        assert_eq!(resolved.suffix, "com");
        assert_eq!(resolved.code, None);
        let warning = resolved.warning.unwrap();
        assert!(warning.contains("not recognised"));
    }

    #[rstest]
    #[case::asia_pacific("AsiaPacific", Some(RegionCode::Ap))]
    #[case::canada("Canada", Some(RegionCode::Ca))]
    #[case::europe("Europe", Some(RegionCode::Eu))]
    #[case::north_america("NorthAmerica", Some(RegionCode::Na))]
    #[case::unknown("Antarctica", None)]
    fn test_legacy_region_mapping(#[case] legacy: &str, #[case] expected: Option<RegionCode>) {
        assert_eq!(RegionCode::from_legacy_region(legacy), expected);
    }

    #[test]
    fn test_region_code_serde_uppercase() {
        let code: RegionCode = serde_json::from_str("\"AU\"").unwrap();
        assert_eq!(code, RegionCode::Au);
        assert_eq!(serde_json::to_string(&RegionCode::Sg).unwrap(), "\"SG\"");
    }
}
