//! Certificate loading and parsed attributes.

use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use x509_parser::prelude::{FromDer, X509Certificate};

/// Why certificate material could not be turned into certificates.
#[derive(Debug, Error)]
pub enum CertError {
    #[error("{source_id}: not found")]
    NotFound { source_id: String },
    #[error("{source_id}: {err}")]
    Io { source_id: String, err: io::Error },
    #[error("{source_id}: parse error: {detail}")]
    Parse { source_id: String, detail: String },
    #[error("{source_id}: parse error: no certificate in input")]
    Empty { source_id: String },
}

impl CertError {
    /// Short reason carried in reports.
    pub fn reason(&self) -> String {
        match self {
            CertError::NotFound { .. } => "not found".to_string(),
            CertError::Io { err, .. } => err.to_string(),
            CertError::Parse { .. } | CertError::Empty { .. } => "parse error".to_string(),
        }
    }
}

/// Where certificate material comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertSource {
    Path(PathBuf),
    Pem { label: String, pem: String },
}

impl CertSource {
    pub fn path(p: impl Into<PathBuf>) -> Self {
        CertSource::Path(p.into())
    }

    pub fn pem(label: impl Into<String>, pem: impl Into<String>) -> Self {
        CertSource::Pem {
            label: label.into(),
            pem: pem.into(),
        }
    }

    /// Raw bytes of the source. Missing files map to [`CertError::NotFound`].
    pub fn read(&self) -> Result<Vec<u8>, CertError> {
        match self {
            CertSource::Path(p) => fs::read(p).map_err(|err| {
                if err.kind() == io::ErrorKind::NotFound {
                    CertError::NotFound {
                        source_id: self.to_string(),
                    }
                } else {
                    CertError::Io {
                        source_id: self.to_string(),
                        err,
                    }
                }
            }),
            CertSource::Pem { pem, .. } => Ok(pem.as_bytes().to_vec()),
        }
    }
}

impl fmt::Display for CertSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertSource::Path(p) => write!(f, "{}", p.display()),
            CertSource::Pem { label, .. } => write!(f, "{label}"),
        }
    }
}

/// RFC 3339 rendering for messages.
pub fn fmt_time(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| t.to_string())
}

/// True when the bytes look like PEM armour rather than raw DER.
pub(crate) fn is_pem(bytes: &[u8]) -> bool {
    bytes.windows(11).any(|w| w == b"-----BEGIN ")
}

/// Parsed X.509 certificate. Owns its DER; attributes are extracted once.
#[derive(Debug, Clone)]
pub struct Certificate {
    der: Vec<u8>,
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub is_ca: bool,
    pub self_issued: bool,
}

impl Certificate {
    /// Parse a single DER-encoded certificate.
    pub fn from_der(der: Vec<u8>, source_id: &str) -> Result<Self, CertError> {
        let parse_err = |detail: String| CertError::Parse {
            source_id: source_id.to_string(),
            detail,
        };
        let cert = {
            let (rest, x509) =
                X509Certificate::from_der(&der).map_err(|e| parse_err(format!("{e:?}")))?;
            if !rest.is_empty() {
                return Err(parse_err(format!("{} trailing bytes", rest.len())));
            }
            let validity = x509.validity();
            let is_ca = match x509.basic_constraints() {
                Ok(Some(bc)) => bc.value.ca,
                Ok(None) => false,
                Err(e) => return Err(parse_err(format!("basicConstraints: {e}"))),
            };
            Certificate {
                subject: x509.subject().to_string(),
                issuer: x509.issuer().to_string(),
                serial: x509.raw_serial_as_string(),
                not_before: validity.not_before.to_datetime(),
                not_after: validity.not_after.to_datetime(),
                is_ca,
                self_issued: x509.subject().as_raw() == x509.issuer().as_raw(),
                der: Vec::new(),
            }
        };
        Ok(Certificate { der, ..cert })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Borrowed X.509 view, for signature and extension checks.
    pub fn x509(&self) -> Result<X509Certificate<'_>, CertError> {
        X509Certificate::from_der(&self.der)
            .map(|(_, c)| c)
            .map_err(|e| CertError::Parse {
                source_id: self.subject.clone(),
                detail: format!("{e:?}"),
            })
    }

    /// True when `self` names `issuer` as its issuer and `issuer`'s key verifies it.
    pub fn is_signed_by(&self, issuer: &Certificate) -> Result<bool, CertError> {
        let child = self.x509()?;
        let parent = issuer.x509()?;
        if child.issuer().as_raw() != parent.subject().as_raw() {
            return Ok(false);
        }
        Ok(child.verify_signature(Some(parent.public_key())).is_ok())
    }
}

/// Load every certificate from a source. PEM may hold a bundle; anything
/// without PEM armour is treated as a single DER certificate.
pub fn load_certificates(source: &CertSource) -> Result<Vec<Certificate>, CertError> {
    let bytes = source.read()?;
    let source_id = source.to_string();

    if !is_pem(&bytes) {
        let cert = Certificate::from_der(bytes, &source_id)?;
        tracing::debug!(source = %source_id, subject = %cert.subject, "parsed DER certificate");
        return Ok(vec![cert]);
    }

    let mut certs = Vec::new();
    for item in rustls_pemfile::certs(&mut bytes.as_slice()) {
        let der = item.map_err(|e| CertError::Parse {
            source_id: source_id.clone(),
            detail: e.to_string(),
        })?;
        let cert = Certificate::from_der(der.as_ref().to_vec(), &source_id)?;
        tracing::debug!(source = %source_id, subject = %cert.subject, "parsed PEM certificate");
        certs.push(cert);
    }
    if certs.is_empty() {
        return Err(CertError::Empty { source_id });
    }
    Ok(certs)
}

/// Load exactly the first certificate of a source.
pub fn load_certificate(source: &CertSource) -> Result<Certificate, CertError> {
    let mut certs = load_certificates(source)?;
    Ok(certs.swap_remove(0))
}
