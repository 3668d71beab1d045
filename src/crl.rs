//! Certificate revocation list freshness.

use serde::Serialize;
use time::OffsetDateTime;
use x509_parser::prelude::FromDer;
use x509_parser::revocation_list::CertificateRevocationList;

use crate::cert::{is_pem, CertError, CertSource};
use crate::expiry::{days_until, ExpiryStatus};

/// Freshness verdict for one CRL, classified on its nextUpdate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrlReport {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    pub status: ExpiryStatus,
    pub days_remaining: Option<i64>,
    pub threshold_days: u32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub next_update: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CrlReport {
    pub fn detail(&self) -> String {
        match (self.days_remaining, &self.reason) {
            (Some(days), _) => format!("{}: {}, days_remaining={days}", self.id, self.status),
            (None, Some(reason)) => format!("{}: {}, {reason}", self.id, self.status),
            (None, None) => format!("{}: {}, no nextUpdate", self.id, self.status),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrlExpiryChecker {
    pub source: CertSource,
    pub threshold_days: u32,
}

impl CrlExpiryChecker {
    pub fn new(source: CertSource, threshold_days: u32) -> Self {
        Self {
            source,
            threshold_days,
        }
    }

    pub fn check(&self, now: OffsetDateTime) -> Vec<CrlReport> {
        match load_crl_ders(&self.source) {
            Ok(ders) => {
                let bundle = ders.len() > 1;
                ders.iter()
                    .enumerate()
                    .map(|(i, der)| {
                        let id = if bundle {
                            format!("{}[{i}]", self.source)
                        } else {
                            self.source.to_string()
                        };
                        self.check_one(id, der, now)
                    })
                    .collect()
            }
            Err(e) => {
                tracing::warn!(source = %self.source, error = %e, "CRL unreadable");
                vec![self.unreadable(self.source.to_string(), e.reason())]
            }
        }
    }

    fn check_one(&self, id: String, der: &[u8], now: OffsetDateTime) -> CrlReport {
        let crl = match CertificateRevocationList::from_der(der) {
            Ok((_, crl)) => crl,
            Err(e) => {
                tracing::warn!(%id, error = ?e, "CRL parse failed");
                return self.unreadable(id, "parse error".to_string());
            }
        };
        let issuer = crl.issuer().to_string();
        let next_update = crl.next_update().map(|t| t.to_datetime());
        let (status, days_remaining) = match next_update {
            Some(next) => {
                let days = days_until(next, now);
                (ExpiryStatus::classify(days, self.threshold_days), Some(days))
            }
            None => (ExpiryStatus::Valid, None),
        };
        tracing::debug!(%id, %issuer, ?days_remaining, %status, "classified CRL");
        CrlReport {
            id,
            issuer: Some(issuer),
            status,
            days_remaining,
            threshold_days: self.threshold_days,
            next_update,
            reason: None,
        }
    }

    fn unreadable(&self, id: String, reason: String) -> CrlReport {
        CrlReport {
            id,
            issuer: None,
            status: ExpiryStatus::Unreadable,
            days_remaining: None,
            threshold_days: self.threshold_days,
            next_update: None,
            reason: Some(reason),
        }
    }
}

fn load_crl_ders(source: &CertSource) -> Result<Vec<Vec<u8>>, CertError> {
    let bytes = source.read()?;
    if !is_pem(&bytes) {
        return Ok(vec![bytes]);
    }
    let mut ders = Vec::new();
    for item in rustls_pemfile::crls(&mut bytes.as_slice()) {
        let der = item.map_err(|e| CertError::Parse {
            source_id: source.to_string(),
            detail: e.to_string(),
        })?;
        ders.push(der.as_ref().to_vec());
    }
    if ders.is_empty() {
        return Err(CertError::Empty {
            source_id: source.to_string(),
        });
    }
    Ok(ders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn missing_crl_is_unreadable() {
        let checker = CrlExpiryChecker::new(CertSource::path("/nonexistent/crl.pem"), 30);
        let reports = checker.check(datetime!(2026-01-01 0:00 UTC));
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, ExpiryStatus::Unreadable);
        assert_eq!(reports[0].reason.as_deref(), Some("not found"));
    }

    #[test]
    fn garbage_der_is_parse_error() {
        let checker = CrlExpiryChecker::new(CertSource::pem("inline", "definitely not a crl"), 30);
        let reports = checker.check(datetime!(2026-01-01 0:00 UTC));
        assert_eq!(reports[0].status, ExpiryStatus::Unreadable);
        assert_eq!(reports[0].reason.as_deref(), Some("parse error"));
    }
}
