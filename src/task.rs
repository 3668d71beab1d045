//! Checkers as one capability, dispatched through [`Task`].

use serde::Serialize;
use time::OffsetDateTime;

use crate::crl::{CrlExpiryChecker, CrlReport};
use crate::expiry::{overall_status, CaExpiryChecker, ExpiryReport, ExpiryStatus};
use crate::primary::{PrimaryCertChecker, PrimaryCertReport};

/// A single-shot check evaluated at an injected instant.
pub trait Checker {
    type Report;

    fn check(&self, now: OffsetDateTime) -> Self::Report;
}

impl Checker for CaExpiryChecker {
    type Report = Vec<ExpiryReport>;

    fn check(&self, now: OffsetDateTime) -> Self::Report {
        CaExpiryChecker::check(self, now)
    }
}

impl Checker for PrimaryCertChecker {
    type Report = PrimaryCertReport;

    fn check(&self, now: OffsetDateTime) -> Self::Report {
        PrimaryCertChecker::check(self, now)
    }
}

impl Checker for CrlExpiryChecker {
    type Report = Vec<CrlReport>;

    fn check(&self, now: OffsetDateTime) -> Self::Report {
        CrlExpiryChecker::check(self, now)
    }
}

/// Every task the binary can run.
#[derive(Debug, Clone)]
pub enum Task {
    CaExpiry(CaExpiryChecker),
    PrimaryCert(PrimaryCertChecker),
    CrlExpiry(CrlExpiryChecker),
}

impl Task {
    /// Task-catalogue name.
    pub fn name(&self) -> &'static str {
        match self {
            Task::CaExpiry(_) => "check_ca_expiry",
            Task::PrimaryCert(_) => "check_primary_cert",
            Task::CrlExpiry(_) => "check_crl_expiry",
        }
    }

    pub fn run(&self, now: OffsetDateTime) -> TaskOutcome {
        let outcome = match self {
            Task::CaExpiry(c) => TaskOutcome::CaExpiry(c.check(now)),
            Task::PrimaryCert(c) => TaskOutcome::PrimaryCert(c.check(now)),
            Task::CrlExpiry(c) => TaskOutcome::CrlExpiry(c.check(now)),
        };
        tracing::info!(task = self.name(), status = %outcome.status(), "task finished");
        outcome
    }
}

/// Reports produced by one [`Task::run`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TaskOutcome {
    CaExpiry(Vec<ExpiryReport>),
    PrimaryCert(PrimaryCertReport),
    CrlExpiry(Vec<CrlReport>),
}

#[derive(Serialize)]
struct Document<'a> {
    status: String,
    reports: &'a TaskOutcome,
}

impl TaskOutcome {
    /// Aggregate status token.
    pub fn status(&self) -> String {
        match self {
            TaskOutcome::CaExpiry(reports) => overall_status(reports)
                .unwrap_or(ExpiryStatus::Unreadable)
                .to_string(),
            TaskOutcome::PrimaryCert(report) => report.status.to_string(),
            TaskOutcome::CrlExpiry(reports) => reports
                .iter()
                .map(|r| r.status)
                .max()
                .unwrap_or(ExpiryStatus::Unreadable)
                .to_string(),
        }
    }

    /// Reason every input was unreadable, if none could be read at all.
    pub fn operational_failure(&self) -> Option<String> {
        match self {
            TaskOutcome::CaExpiry(reports) => {
                all_unreadable(reports.iter().map(|r| (r.id.as_str(), r.status, r.reason.as_deref())))
            }
            TaskOutcome::CrlExpiry(reports) => {
                all_unreadable(reports.iter().map(|r| (r.id.as_str(), r.status, r.reason.as_deref())))
            }
            TaskOutcome::PrimaryCert(report) => {
                if report.primary_readable || report.ca_readable {
                    return None;
                }
                Some(report.failure_reasons.join("; "))
            }
        }
    }

    /// Human-readable output: a single line carrying only the aggregate
    /// token, followed by the reports that are not `valid`.
    pub fn summary_line(&self) -> String {
        let problems: Vec<String> = match self {
            TaskOutcome::PrimaryCert(report) => return report.summary_line(),
            TaskOutcome::CaExpiry(reports) => reports
                .iter()
                .filter(|r| r.status != ExpiryStatus::Valid)
                .map(ExpiryReport::detail)
                .collect(),
            TaskOutcome::CrlExpiry(reports) => reports
                .iter()
                .filter(|r| r.status != ExpiryStatus::Valid)
                .map(CrlReport::detail)
                .collect(),
        };
        if problems.is_empty() {
            format!("status: {}", self.status())
        } else {
            format!("status: {} ({})", self.status(), problems.join("; "))
        }
    }

    /// Machine-readable document: `{"status": ..., "reports": ...}`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&Document {
            status: self.status(),
            reports: self,
        })
    }
}

fn all_unreadable<'a>(
    reports: impl Iterator<Item = (&'a str, ExpiryStatus, Option<&'a str>)>,
) -> Option<String> {
    let mut lines = Vec::new();
    for (id, status, reason) in reports {
        if status != ExpiryStatus::Unreadable {
            return None;
        }
        lines.push(format!("{id}: {}", reason.unwrap_or("unreadable")));
    }
    if lines.is_empty() {
        return Some("no input given".to_string());
    }
    Some(lines.join("; "))
}
