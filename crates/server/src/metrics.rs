//! In-process counters exposed in Prometheus text exposition format.

use crate::error::PublicReason;
use std::sync::atomic::{AtomicU64, Ordering};

const FAILURE_REASONS: [PublicReason; 7] = [
    PublicReason::NotFound,
    PublicReason::CodeExpired,
    PublicReason::CodeRevoked,
    PublicReason::ContextMismatch,
    PublicReason::InvalidToken,
    PublicReason::InvalidRequest,
    PublicReason::ServerError,
];

#[derive(Debug, Default)]
pub struct Metrics {
    codes_issued: AtomicU64,
    verifications_succeeded: AtomicU64,
    verifications_failed: [AtomicU64; FAILURE_REASONS.len()],
    audit_write_failures: AtomicU64,
    tokens_issued: AtomicU64,
    tokens_refreshed: AtomicU64,
}

fn reason_index(reason: PublicReason) -> usize {
    FAILURE_REASONS
        .iter()
        .position(|r| *r == reason)
        .unwrap_or(FAILURE_REASONS.len() - 1)
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code_issued(&self) {
        self.codes_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn verification_succeeded(&self) {
        self.verifications_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn verification_failed(&self, reason: PublicReason) {
        self.verifications_failed[reason_index(reason)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn audit_write_failed(&self) {
        self.audit_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn token_issued(&self) {
        self.tokens_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn token_refreshed(&self) {
        self.tokens_refreshed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn codes_issued(&self) -> u64 {
        self.codes_issued.load(Ordering::Relaxed)
    }

    pub fn verifications_succeeded(&self) -> u64 {
        self.verifications_succeeded.load(Ordering::Relaxed)
    }

    pub fn verifications_failed(&self, reason: PublicReason) -> u64 {
        self.verifications_failed[reason_index(reason)].load(Ordering::Relaxed)
    }

    pub fn audit_write_failures(&self) -> u64 {
        self.audit_write_failures.load(Ordering::Relaxed)
    }

    pub fn tokens_issued(&self) -> u64 {
        self.tokens_issued.load(Ordering::Relaxed)
    }

    pub fn tokens_refreshed(&self) -> u64 {
        self.tokens_refreshed.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let mut buf = String::new();
        push_counter(
            &mut buf,
            "sso_codes_issued_total",
            "Authorization codes issued.",
            self.codes_issued(),
        );
        push_counter(
            &mut buf,
            "sso_verifications_succeeded_total",
            "Successful authorization code verifications.",
            self.verifications_succeeded(),
        );
        buf.push_str("# HELP sso_verifications_failed_total Failed authorization code verifications by reason.\n");
        buf.push_str("# TYPE sso_verifications_failed_total counter\n");
        for reason in FAILURE_REASONS {
            buf.push_str(&format!(
                "sso_verifications_failed_total{{reason=\"{}\"}} {}\n",
                reason.as_str(),
                self.verifications_failed(reason)
            ));
        }
        push_counter(
            &mut buf,
            "sso_audit_write_failures_total",
            "Verification attempts whose audit row could not be written.",
            self.audit_write_failures(),
        );
        push_counter(
            &mut buf,
            "sso_tokens_issued_total",
            "Token pairs minted from verified codes.",
            self.tokens_issued(),
        );
        push_counter(
            &mut buf,
            "sso_tokens_refreshed_total",
            "Token pairs rotated through a refresh token.",
            self.tokens_refreshed(),
        );
        buf
    }
}

fn push_counter(buf: &mut String, name: &str, help: &str, value: u64) {
    buf.push_str(&format!("# HELP {name} {help}\n"));
    buf.push_str(&format!("# TYPE {name} counter\n"));
    buf.push_str(&format!("{name} {value}\n"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_are_counted_per_reason() {
        let metrics = Metrics::new();
        metrics.verification_failed(PublicReason::ContextMismatch);
        metrics.verification_failed(PublicReason::ContextMismatch);
        metrics.verification_failed(PublicReason::CodeExpired);
        assert_eq!(metrics.verifications_failed(PublicReason::ContextMismatch), 2);
        assert_eq!(metrics.verifications_failed(PublicReason::CodeExpired), 1);
        assert_eq!(metrics.verifications_failed(PublicReason::NotFound), 0);
    }

    #[test]
    fn exposition_contains_every_series() {
        let metrics = Metrics::new();
        metrics.code_issued();
        metrics.audit_write_failed();
        let text = metrics.render_prometheus();
        assert!(text.contains("# TYPE sso_codes_issued_total counter\n"));
        assert!(text.contains("sso_codes_issued_total 1\n"));
        assert!(text.contains("sso_audit_write_failures_total 1\n"));
        assert!(text.contains("sso_verifications_failed_total{reason=\"code_revoked\"} 0\n"));
        assert_eq!(text.matches("# HELP").count(), 6);
    }
}
