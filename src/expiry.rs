//! CA certificate expiry inspection.

use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;

use crate::cert::{load_certificates, CertSource};

/// Default warning window, in days.
pub const DEFAULT_THRESHOLD_DAYS: u32 = 60;

const SECONDS_PER_DAY: i64 = 86_400;

/// Expiry classification. Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStatus {
    Valid,
    ExpiringSoon,
    Expired,
    Unreadable,
}

impl ExpiryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExpiryStatus::Valid => "valid",
            ExpiryStatus::ExpiringSoon => "expiring_soon",
            ExpiryStatus::Expired => "expired",
            ExpiryStatus::Unreadable => "unreadable",
        }
    }

    /// Classify whole days left against the warning window.
    pub fn classify(days_remaining: i64, threshold_days: u32) -> Self {
        if days_remaining < 0 {
            ExpiryStatus::Expired
        } else if days_remaining <= i64::from(threshold_days) {
            ExpiryStatus::ExpiringSoon
        } else {
            ExpiryStatus::Valid
        }
    }
}

impl fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole days from `now` until `deadline`, rounded toward negative infinity.
pub fn days_until(deadline: OffsetDateTime, now: OffsetDateTime) -> i64 {
    (deadline - now).whole_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Expiry verdict for one certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiryReport {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    pub status: ExpiryStatus,
    pub days_remaining: Option<i64>,
    pub threshold_days: u32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub not_after: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ExpiryReport {
    /// Short `id: status, detail` form used when listing problem certificates.
    pub fn detail(&self) -> String {
        match (self.days_remaining, &self.reason) {
            (Some(days), _) => format!("{}: {}, days_remaining={days}", self.id, self.status),
            (None, Some(reason)) => format!("{}: {}, {reason}", self.id, self.status),
            (None, None) => format!("{}: {}", self.id, self.status),
        }
    }
}

/// Inspects CA certificates for upcoming or past expiry.
#[derive(Debug, Clone)]
pub struct CaExpiryChecker {
    pub sources: Vec<CertSource>,
    pub threshold_days: u32,
}

impl CaExpiryChecker {
    pub fn new(sources: Vec<CertSource>, threshold_days: u32) -> Self {
        Self {
            sources,
            threshold_days,
        }
    }

    /// One report per certificate. Sources are inspected concurrently;
    /// report order follows source order.
    pub fn check(&self, now: OffsetDateTime) -> Vec<ExpiryReport> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .sources
                .iter()
                .map(|src| scope.spawn(move || check_source(src, self.threshold_days, now)))
                .collect();
            handles
                .into_iter()
                .zip(&self.sources)
                .flat_map(|(h, src)| {
                    h.join().unwrap_or_else(|_| {
                        vec![unreadable(src.to_string(), self.threshold_days, "check panicked".into())]
                    })
                })
                .collect()
        })
    }
}

fn unreadable(id: String, threshold_days: u32, reason: String) -> ExpiryReport {
    ExpiryReport {
        id,
        subject: None,
        serial: None,
        status: ExpiryStatus::Unreadable,
        days_remaining: None,
        threshold_days,
        not_after: None,
        reason: Some(reason),
    }
}

/// Reports for every certificate in one source.
pub fn check_source(src: &CertSource, threshold_days: u32, now: OffsetDateTime) -> Vec<ExpiryReport> {
    let certs = match load_certificates(src) {
        Ok(certs) => certs,
        Err(e) => {
            tracing::warn!(source = %src, error = %e, "CA certificate unreadable");
            return vec![unreadable(src.to_string(), threshold_days, e.reason())];
        }
    };
    let bundle = certs.len() > 1;
    certs
        .into_iter()
        .enumerate()
        .map(|(i, cert)| {
            let id = if bundle {
                format!("{src}[{i}]")
            } else {
                src.to_string()
            };
            let days = days_until(cert.not_after, now);
            let status = ExpiryStatus::classify(days, threshold_days);
            tracing::debug!(%id, subject = %cert.subject, days, %status, "classified CA certificate");
            ExpiryReport {
                id,
                subject: Some(cert.subject),
                serial: Some(cert.serial),
                status,
                days_remaining: Some(days),
                threshold_days,
                not_after: Some(cert.not_after),
                reason: None,
            }
        })
        .collect()
}

/// Worst status across reports; `None` when there are none.
pub fn overall_status(reports: &[ExpiryReport]) -> Option<ExpiryStatus> {
    reports.iter().map(|r| r.status).max()
}
