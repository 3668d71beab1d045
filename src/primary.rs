//! Primary certificate validation against its CA.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::cert::{fmt_time, load_certificate, load_certificates, CertError, CertSource, Certificate};

const UNREADABLE: &str = "certificate unreadable";

/// Default number of issuer hops walked above the primary certificate.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 4;

/// Role the primary certificate is expected to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum KeyRole {
    /// TLS server (id-kp-serverAuth)
    #[default]
    ServerAuth,
    /// TLS client (id-kp-clientAuth)
    ClientAuth,
    /// Only require digitalSignature
    Any,
}

impl KeyRole {
    fn purpose(self) -> &'static str {
        match self {
            KeyRole::ServerAuth => "serverAuth",
            KeyRole::ClientAuth => "clientAuth",
            KeyRole::Any => "any",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryStatus {
    Success,
    Failure,
}

impl fmt::Display for PrimaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrimaryStatus::Success => "success",
            PrimaryStatus::Failure => "failure",
        })
    }
}

/// Verdict for the primary certificate. `status` is derived from the other
/// fields when the report is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryCertReport {
    pub id: String,
    pub chain_valid: bool,
    pub expiry_ok: bool,
    pub status: PrimaryStatus,
    pub failure_reasons: Vec<String>,
    #[serde(skip)]
    pub primary_readable: bool,
    #[serde(skip)]
    pub ca_readable: bool,
}

impl PrimaryCertReport {
    pub fn new(id: String, chain_valid: bool, expiry_ok: bool, failure_reasons: Vec<String>) -> Self {
        let mut report = Self {
            id,
            chain_valid,
            expiry_ok,
            status: PrimaryStatus::Failure,
            failure_reasons,
            primary_readable: true,
            ca_readable: true,
        };
        report.status = report.derived_status();
        report
    }

    /// Status recomputed from `chain_valid`, `expiry_ok` and `failure_reasons`.
    pub fn derived_status(&self) -> PrimaryStatus {
        if self.chain_valid && self.expiry_ok && self.failure_reasons.is_empty() {
            PrimaryStatus::Success
        } else {
            PrimaryStatus::Failure
        }
    }

    /// Record which inputs could be read.
    pub fn with_inputs_read(mut self, primary_readable: bool, ca_readable: bool) -> Self {
        self.primary_readable = primary_readable;
        self.ca_readable = ca_readable;
        self
    }

    /// Single stdout line; `success` appears only when the check passed.
    pub fn summary_line(&self) -> String {
        if self.failure_reasons.is_empty() {
            format!("status: {} ({})", self.status, self.id)
        } else {
            format!(
                "status: {} ({}: {})",
                self.status,
                self.id,
                self.failure_reasons.join("; ")
            )
        }
    }
}

/// Checks that the primary certificate chains to the CA, is inside its
/// validity window, and carries a key usage fit for its role.
#[derive(Debug, Clone)]
pub struct PrimaryCertChecker {
    pub primary: CertSource,
    pub ca: CertSource,
    pub role: KeyRole,
    pub max_chain_depth: usize,
}

impl PrimaryCertChecker {
    pub fn new(primary: CertSource, ca: CertSource) -> Self {
        Self {
            primary,
            ca,
            role: KeyRole::default(),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }

    pub fn with_role(mut self, role: KeyRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    /// Runs every check; failures accumulate instead of short-circuiting.
    pub fn check(&self, now: OffsetDateTime) -> PrimaryCertReport {
        let id = self.primary.to_string();
        let mut reasons = Vec::new();

        let primary = load_certificate(&self.primary)
            .map_err(|e| {
                tracing::warn!(source = %self.primary, error = %e, "primary certificate unreadable");
                reasons.push(format!("primary {UNREADABLE}: {}", e.reason()));
            })
            .ok();
        let cas = load_certificates(&self.ca)
            .map_err(|e| {
                tracing::warn!(source = %self.ca, error = %e, "CA certificate unreadable");
                reasons.push(format!("CA {UNREADABLE}: {}", e.reason()));
            })
            .ok();

        let ca_readable = cas.is_some();
        let Some(primary) = primary else {
            return PrimaryCertReport::new(id, false, false, reasons).with_inputs_read(false, ca_readable);
        };

        let chain_valid = match &cas {
            Some(cas) => match verify_chain(&primary, cas, self.max_chain_depth) {
                Ok(()) => true,
                Err(reason) => {
                    reasons.push(reason);
                    false
                }
            },
            None => false,
        };

        let expiry_ok = if now < primary.not_before {
            reasons.push(format!(
                "primary certificate not yet valid (notBefore {})",
                fmt_time(primary.not_before)
            ));
            false
        } else if now > primary.not_after {
            reasons.push(format!(
                "primary certificate expired (notAfter {})",
                fmt_time(primary.not_after)
            ));
            false
        } else {
            true
        };

        match check_key_usage(&primary, self.role) {
            Ok(mut ku_reasons) => reasons.append(&mut ku_reasons),
            Err(e) => reasons.push(format!("key usage unreadable: {}", e.reason())),
        }

        let report =
            PrimaryCertReport::new(id, chain_valid, expiry_ok, reasons).with_inputs_read(true, ca_readable);
        tracing::debug!(
            id = %report.id,
            chain_valid,
            expiry_ok,
            status = %report.status,
            "checked primary certificate"
        );
        report
    }
}

/// Walk from `leaf` up through `bundle`. Every certificate in `bundle` is
/// trusted, so the walk ends at a self-issued certificate or at the first
/// bundle certificate whose own issuer is not in the bundle. Each hop must
/// match issuer/subject and verify under the issuer's key.
pub fn verify_chain(leaf: &Certificate, bundle: &[Certificate], max_depth: usize) -> Result<(), String> {
    let mut current = leaf;
    for depth in 1..=max_depth {
        let issuer = find_issuer(current, bundle)
            .map_err(|e| format!("chain verification error: {}", e.reason()))?;
        let Some(issuer) = issuer else {
            if depth == 1 {
                return Err(format!("not signed by the given CA (issuer {})", current.issuer));
            }
            return Ok(());
        };
        if !issuer.is_ca {
            return Err(format!("issuer {} is not a CA certificate", issuer.subject));
        }
        if issuer.self_issued {
            return Ok(());
        }
        current = issuer;
    }
    let next = find_issuer(current, bundle)
        .map_err(|e| format!("chain verification error: {}", e.reason()))?;
    match next {
        None => Ok(()),
        Some(_) => Err(format!("chain exceeds maximum depth {max_depth}")),
    }
}

fn find_issuer<'a>(cert: &Certificate, bundle: &'a [Certificate]) -> Result<Option<&'a Certificate>, CertError> {
    for candidate in bundle {
        if candidate.der() == cert.der() && !cert.self_issued {
            continue;
        }
        if cert.is_signed_by(candidate)? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Reasons the certificate's key usage does not fit `role`. Absent
/// extensions impose no restriction.
pub fn check_key_usage(cert: &Certificate, role: KeyRole) -> Result<Vec<String>, CertError> {
    let x509 = cert.x509()?;
    let mut reasons = Vec::new();

    if let Ok(Some(ku)) = x509.key_usage() {
        if !ku.value.digital_signature() {
            reasons.push("key usage lacks digitalSignature".to_string());
        }
    }

    if role != KeyRole::Any {
        if let Ok(Some(eku)) = x509.extended_key_usage() {
            let eku = eku.value;
            let allowed = eku.any
                || match role {
                    KeyRole::ServerAuth => eku.server_auth,
                    KeyRole::ClientAuth => eku.client_auth,
                    KeyRole::Any => true,
                };
            if !allowed {
                reasons.push(format!("extended key usage lacks {}", role.purpose()));
            }
        }
    }

    Ok(reasons)
}
