//! Naming and CIDR rules applied before a record enters either payload

use crate::config::ClusterPolicy;
use crate::{CoreError, Result};
use ipnetwork::IpNetwork;
use std::net::IpAddr;

const MIN_NAME_LEN: usize = 3;
const MAX_NAME_LEN: usize = 100;
const MAX_SITE_LEN: usize = 50;

/// Trim and lowercase a cluster name
fn normalize_cluster_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalize a cluster name and check it against the naming policy
///
/// Returns the normalized name.
pub fn validate_cluster_name(name: &str, policy: &ClusterPolicy) -> Result<String> {
    let normalized = normalize_cluster_name(name);
    let invalid = |reason: String| CoreError::InvalidClusterName {
        name: name.to_string(),
        reason,
    };

    if normalized.len() < MIN_NAME_LEN || normalized.len() > MAX_NAME_LEN {
        return Err(invalid(format!(
            "length must be between {} and {} characters",
            MIN_NAME_LEN, MAX_NAME_LEN
        )));
    }
    if !normalized
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            "only lowercase alphanumeric characters and hyphens are allowed".to_string(),
        ));
    }
    if normalized.starts_with('-') || normalized.ends_with('-') {
        return Err(invalid("cannot start or end with a hyphen".to_string()));
    }
    if !normalized.starts_with(&policy.name_prefix) {
        return Err(invalid(format!("must start with '{}' prefix", policy.name_prefix)));
    }

    Ok(normalized)
}

pub fn is_valid_cluster_name(name: &str, policy: &ClusterPolicy) -> bool {
    validate_cluster_name(name, policy).is_ok()
}

/// Parse a segment in CIDR notation
///
/// The address must be complete (`192.168.1` is rejected). Host bits may be set.
/// A bare address is treated as a single-host network.
pub fn validate_cidr(segment: &str) -> Result<IpNetwork> {
    let trimmed = segment.trim();
    let invalid = |reason: &str| CoreError::InvalidCidr {
        segment: segment.to_string(),
        reason: reason.to_string(),
    };

    let (addr_part, prefix_part) = match trimmed.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (trimmed, None),
    };

    let addr: IpAddr = addr_part
        .parse()
        .map_err(|_| invalid("address is not a valid IPv4 or IPv6 address"))?;
    let max_prefix = if addr.is_ipv4() { 32 } else { 128 };
    let prefix = match prefix_part {
        Some(p) => p
            .parse::<u8>()
            .map_err(|_| invalid("prefix length is not a number"))?,
        None => max_prefix,
    };

    IpNetwork::new(addr, prefix).map_err(|_| invalid("prefix length out of range"))
}

pub fn validate_site(site: &str) -> Result<String> {
    let trimmed = site.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_SITE_LEN {
        return Err(CoreError::InvalidSite {
            site: site.to_string(),
            reason: format!("must be between 1 and {} characters", MAX_SITE_LEN),
        });
    }
    Ok(trimmed.to_string())
}

/// Validate a non-empty list of segments, returning them trimmed and de-duplicated
pub fn validate_segments(segments: &[String]) -> Result<Vec<String>> {
    if segments.is_empty() {
        return Err(CoreError::InvalidCidr {
            segment: String::new(),
            reason: "at least one segment is required".to_string(),
        });
    }
    let mut validated: Vec<String> = Vec::with_capacity(segments.len());
    for segment in segments {
        validate_cidr(segment)?;
        let segment = segment.trim().to_string();
        if !validated.contains(&segment) {
            validated.push(segment);
        }
    }
    Ok(validated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ClusterPolicy {
        ClusterPolicy::default()
    }

    #[test]
    fn test_valid_names_are_normalized() {
        assert_eq!(validate_cluster_name("  OCP4-Roi ", &policy()).unwrap(), "ocp4-roi");
        assert_eq!(validate_cluster_name("ocp4-a1-b2", &policy()).unwrap(), "ocp4-a1-b2");
    }

    #[test]
    fn test_name_without_prefix_is_rejected() {
        let err = validate_cluster_name("openshift-prod", &policy()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidClusterName { .. }));
        assert!(err.to_string().contains("ocp4-"));
    }

    #[test]
    fn test_name_character_rules() {
        assert!(!is_valid_cluster_name("ocp4_roi", &policy()));
        assert!(!is_valid_cluster_name("ocp4-roi-", &policy()));
        assert!(!is_valid_cluster_name("ocp4-r.oi", &policy()));
        assert!(!is_valid_cluster_name("oc", &policy()));
        assert!(!is_valid_cluster_name(&format!("ocp4-{}", "a".repeat(100)), &policy()));
    }

    #[test]
    fn test_custom_prefix() {
        let policy = ClusterPolicy {
            name_prefix: "k8s-".to_string(),
            default_domain: "example.com".to_string(),
        };
        assert!(is_valid_cluster_name("k8s-edge", &policy));
        assert!(!is_valid_cluster_name("ocp4-edge", &policy));
    }

    #[test]
    fn test_valid_cidrs() {
        assert_eq!(validate_cidr("192.168.1.0/24").unwrap().prefix(), 24);
        assert_eq!(validate_cidr(" 10.0.0.5/8 ").unwrap().prefix(), 8);
        assert_eq!(validate_cidr("10.0.0.1").unwrap().prefix(), 32);
        assert_eq!(validate_cidr("2001:db8::/32").unwrap().prefix(), 32);
    }

    #[test]
    fn test_invalid_cidrs() {
        for segment in ["192.168.1", "192.168.1/24", "192.168.1.0/33", "300.1.1.1/24", "10.0.0.0/abc", ""] {
            let err = validate_cidr(segment).unwrap_err();
            assert!(matches!(err, CoreError::InvalidCidr { .. }), "{} should be rejected", segment);
        }
    }

    #[test]
    fn test_validate_segments() {
        let segments = vec!["10.0.0.0/24".to_string(), " 10.0.0.0/24".to_string(), "10.0.1.0/24".to_string()];
        assert_eq!(validate_segments(&segments).unwrap(), vec!["10.0.0.0/24", "10.0.1.0/24"]);
        assert!(validate_segments(&[]).is_err());
        assert!(validate_segments(&["10.0.0".to_string()]).is_err());
    }

    #[test]
    fn test_validate_site() {
        assert_eq!(validate_site(" site1 ").unwrap(), "site1");
        assert!(validate_site("  ").is_err());
        assert!(validate_site(&"s".repeat(51)).is_err());
    }
}
