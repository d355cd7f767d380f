//! Security context binding.
//!
//! A code is bound to the `{ip, user-agent, fingerprint}` triple of the request
//! that obtained it. Verification compares the presented triple against the
//! stored one factor by factor; the policy decides which factors block.

use crate::config::IpNet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use utoipa::ToSchema;

/// The `{ip, user-agent, fingerprint}` triple presented with every call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SecurityContext {
    pub ip_address: String,
    pub user_agent: String,
    pub browser_fingerprint: String,
}

impl SecurityContext {
    pub fn new(
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
        browser_fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
            browser_fingerprint: browser_fingerprint.into(),
        }
    }
}

/// How two IP addresses are compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpMatchMode {
    /// Addresses must be identical.
    #[default]
    Exact,
    /// Identical, or inside the same network of the configured prefix length.
    SameSubnet,
}

/// Whether an IP mismatch blocks the verification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpEnforcement {
    /// Recorded in the audit log but never blocks.
    #[default]
    Advisory,
    Mandatory,
}

/// Matching policy applied by the verifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPolicy {
    #[serde(default)]
    pub ip_mode: IpMatchMode,
    #[serde(default)]
    pub ip_enforcement: IpEnforcement,
    #[serde(default = "default_ipv4_prefix")]
    pub ipv4_subnet_prefix: u8,
    #[serde(default = "default_ipv6_prefix")]
    pub ipv6_subnet_prefix: u8,
}

fn default_ipv4_prefix() -> u8 {
    24
}

fn default_ipv6_prefix() -> u8 {
    64
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            ip_mode: IpMatchMode::default(),
            ip_enforcement: IpEnforcement::default(),
            ipv4_subnet_prefix: default_ipv4_prefix(),
            ipv6_subnet_prefix: default_ipv6_prefix(),
        }
    }
}

impl MatchPolicy {
    pub fn strict() -> Self {
        Self {
            ip_mode: IpMatchMode::Exact,
            ip_enforcement: IpEnforcement::Mandatory,
            ..Self::default()
        }
    }

    /// Compare the stored context with the presented one.
    pub fn evaluate(&self, stored: &SecurityContext, presented: &SecurityContext) -> MatchReport {
        MatchReport {
            fingerprint_matched: stored.browser_fingerprint == presented.browser_fingerprint,
            user_agent_matched: stored.user_agent == presented.user_agent,
            ip_matched: self.ip_matches(&stored.ip_address, &presented.ip_address),
            ip_enforced: self.ip_enforcement == IpEnforcement::Mandatory,
        }
    }

    fn ip_matches(&self, stored: &str, presented: &str) -> bool {
        if stored == presented {
            return true;
        }
        let (Ok(stored), Ok(presented)) = (stored.parse::<IpAddr>(), presented.parse::<IpAddr>())
        else {
            return false;
        };
        // Normalises textual variants such as "::ffff:a.b.c.d" vs "a.b.c.d".
        let stored = canonical(stored);
        let presented = canonical(presented);
        if stored == presented {
            return true;
        }
        match self.ip_mode {
            IpMatchMode::Exact => false,
            IpMatchMode::SameSubnet => {
                let prefix = match stored {
                    IpAddr::V4(_) => self.ipv4_subnet_prefix.min(32),
                    IpAddr::V6(_) => self.ipv6_subnet_prefix.min(128),
                };
                IpNet {
                    addr: stored,
                    prefix,
                }
                .contains(&presented)
            }
        }
    }
}

fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

/// Per-factor outcome of a context comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    pub fingerprint_matched: bool,
    pub user_agent_matched: bool,
    pub ip_matched: bool,
    /// Whether `ip_matched` took part in the decision.
    pub ip_enforced: bool,
}

impl MatchReport {
    /// Fingerprint and user-agent must match; IP only when enforced.
    pub fn is_match(&self) -> bool {
        self.fingerprint_matched && self.user_agent_matched && (self.ip_matched || !self.ip_enforced)
    }

    /// Names of the factors that did not match, for log fields.
    pub fn mismatched_factors(&self) -> Vec<&'static str> {
        let mut factors = Vec::new();
        if !self.fingerprint_matched {
            factors.push("fingerprint");
        }
        if !self.user_agent_matched {
            factors.push("user_agent");
        }
        if !self.ip_matched {
            factors.push("ip");
        }
        factors
    }
}

impl std::fmt::Display for MatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let factors = self.mismatched_factors();
        if factors.is_empty() {
            write!(f, "all factors matched")
        } else {
            write!(f, "mismatched: {}", factors.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(ip: &str) -> SecurityContext {
        SecurityContext::new(ip, "Mozilla/5.0 (X11; Linux x86_64)", "fp-0a1b2c")
    }

    #[test]
    fn identical_context_matches_under_strict_policy() {
        let report = MatchPolicy::strict().evaluate(&ctx("203.0.113.7"), &ctx("203.0.113.7"));
        assert!(report.is_match());
        assert!(report.mismatched_factors().is_empty());
    }

    #[test]
    fn fingerprint_mismatch_always_blocks() {
        let mut presented = ctx("203.0.113.7");
        presented.browser_fingerprint = "fp-other".into();
        let report = MatchPolicy::default().evaluate(&ctx("203.0.113.7"), &presented);
        assert!(!report.fingerprint_matched);
        assert!(report.user_agent_matched);
        assert!(report.ip_matched);
        assert!(!report.is_match());
        assert_eq!(report.to_string(), "mismatched: fingerprint");
    }

    #[test]
    fn user_agent_mismatch_always_blocks() {
        let mut presented = ctx("203.0.113.7");
        presented.user_agent = "curl/8.5.0".into();
        let report = MatchPolicy::default().evaluate(&ctx("203.0.113.7"), &presented);
        assert!(!report.is_match());
        assert_eq!(report.mismatched_factors(), vec!["user_agent"]);
    }

    #[test]
    fn advisory_ip_mismatch_is_recorded_but_passes() {
        let report = MatchPolicy::default().evaluate(&ctx("203.0.113.7"), &ctx("198.51.100.1"));
        assert!(!report.ip_matched);
        assert!(!report.ip_enforced);
        assert!(report.is_match());
    }

    #[test]
    fn mandatory_ip_mismatch_blocks() {
        let report = MatchPolicy::strict().evaluate(&ctx("203.0.113.7"), &ctx("203.0.113.8"));
        assert!(!report.ip_matched);
        assert!(!report.is_match());
    }

    #[test]
    fn same_subnet_mode_tolerates_carrier_churn() {
        let policy = MatchPolicy {
            ip_mode: IpMatchMode::SameSubnet,
            ip_enforcement: IpEnforcement::Mandatory,
            ..MatchPolicy::default()
        };
        assert!(policy
            .evaluate(&ctx("203.0.113.7"), &ctx("203.0.113.200"))
            .is_match());
        assert!(!policy
            .evaluate(&ctx("203.0.113.7"), &ctx("203.0.114.7"))
            .is_match());
        assert!(policy
            .evaluate(&ctx("2001:db8:1:2::10"), &ctx("2001:db8:1:2:ffff::1"))
            .is_match());
        assert!(!policy
            .evaluate(&ctx("2001:db8:1:2::10"), &ctx("2001:db8:1:3::10"))
            .is_match());
    }

    #[test]
    fn mapped_ipv4_equals_plain_ipv4() {
        let report = MatchPolicy::strict().evaluate(&ctx("192.0.2.1"), &ctx("::ffff:192.0.2.1"));
        assert!(report.ip_matched);
    }

    #[test]
    fn unparsable_addresses_only_match_verbatim() {
        let policy = MatchPolicy {
            ip_mode: IpMatchMode::SameSubnet,
            ..MatchPolicy::strict()
        };
        assert!(policy.evaluate(&ctx("unknown"), &ctx("unknown")).ip_matched);
        assert!(!policy.evaluate(&ctx("unknown"), &ctx("192.0.2.1")).ip_matched);
    }
}
