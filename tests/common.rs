//! Shared test helpers: temp dirs and generated certificates.

#![allow(dead_code)]

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};

/// Temp directory for fixture files.
pub fn temp_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("ca_inspect_test_")
        .tempdir()
        .expect("temp dir")
}

/// Whole seconds; certificates carry no sub-second precision.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc().replace_nanosecond(0).unwrap()
}

pub fn days(n: i64) -> Duration {
    Duration::days(n)
}

fn dn(cn: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(cn.to_string()));
    dn
}

/// A CA certificate with its signing key.
pub struct Ca {
    pub cert: rcgen::Certificate,
    pub key: KeyPair,
}

impl Ca {
    pub fn pem(&self) -> String {
        self.cert.pem()
    }
}

fn ca_params(cn: &str, not_before: OffsetDateTime, not_after: OffsetDateTime) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.distinguished_name = dn(cn);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params.not_before = not_before;
    params.not_after = not_after;
    params
}

/// Self-signed root CA valid over the given window.
pub fn make_ca(cn: &str, not_before: OffsetDateTime, not_after: OffsetDateTime) -> Ca {
    let key = KeyPair::generate().expect("generate CA key");
    let cert = ca_params(cn, not_before, not_after)
        .self_signed(&key)
        .expect("self-sign CA");
    Ca { cert, key }
}

/// Root CA issued 400 days ago, expiring `days_left` days from now.
pub fn make_ca_expiring_in(cn: &str, days_left: i64) -> Ca {
    let now = now();
    make_ca(cn, now - days(400), now + days(days_left))
}

/// Intermediate CA signed by `issuer`.
pub fn make_intermediate(cn: &str, issuer: &Ca) -> Ca {
    let now = now();
    let key = KeyPair::generate().expect("generate intermediate key");
    let cert = ca_params(cn, now - days(1), now + days(3650))
        .signed_by(&key, &issuer.cert, &issuer.key)
        .expect("sign intermediate");
    Ca { cert, key }
}

/// Leaf certificate options.
pub struct LeafSpec {
    pub cn: String,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub key_usages: Vec<KeyUsagePurpose>,
    pub extended_key_usages: Vec<ExtendedKeyUsagePurpose>,
}

impl LeafSpec {
    /// Server cert valid for a year, with digitalSignature and serverAuth.
    pub fn server(cn: &str) -> Self {
        let now = now();
        Self {
            cn: cn.to_string(),
            not_before: now - days(1),
            not_after: now + days(365),
            key_usages: vec![
                KeyUsagePurpose::DigitalSignature,
                KeyUsagePurpose::KeyEncipherment,
            ],
            extended_key_usages: vec![
                ExtendedKeyUsagePurpose::ServerAuth,
                ExtendedKeyUsagePurpose::ClientAuth,
            ],
        }
    }
}

/// Leaf certificate PEM signed by `issuer`.
pub fn make_leaf(spec: LeafSpec, issuer: &Ca) -> String {
    let key = KeyPair::generate().expect("generate leaf key");
    let mut params = CertificateParams::new(vec![spec.cn.clone()]).expect("leaf params");
    params.distinguished_name = dn(&spec.cn);
    params.is_ca = IsCa::NoCa;
    params.not_before = spec.not_before;
    params.not_after = spec.not_after;
    params.key_usages = spec.key_usages;
    params.extended_key_usages = spec.extended_key_usages;
    params
        .signed_by(&key, &issuer.cert, &issuer.key)
        .expect("sign leaf")
        .pem()
}

/// CRL signed by `issuer` with the given nextUpdate.
pub fn make_crl(issuer: &Ca, next_update: OffsetDateTime) -> String {
    let params = rcgen::CertificateRevocationListParams {
        this_update: std::cmp::min(now() - days(1), next_update - days(7)),
        next_update,
        crl_number: rcgen::SerialNumber::from(1u64),
        issuing_distribution_point: None,
        revoked_certs: vec![],
        key_identifier_method: rcgen::KeyIdMethod::Sha256,
    };
    params
        .signed_by(&issuer.cert, &issuer.key)
        .expect("sign CRL")
        .pem()
        .expect("CRL PEM")
}

/// Write `contents` to `dir/name` and return the path.
pub fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}
