// src/policy.rs

use crate::validator::ValidationReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum overall confidence for a valid document to skip human review.
pub const AUTO_APPROVE_THRESHOLD: u8 = 85;

/// Where a document sits in the review lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Approved,
    NeedsReview,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Approved => "approved",
            Status::NeedsReview => "needs_review",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown document status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Status::Approved),
            "needs_review" => Ok(Status::NeedsReview),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Routes a validated document to auto-approval or the review queue.
#[derive(Debug, Clone, Copy)]
pub struct StatusPolicy {
    threshold: u8,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self::new(AUTO_APPROVE_THRESHOLD)
    }
}

impl StatusPolicy {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// A failed validation always wins over confidence.
    pub fn decide(&self, overall_confidence: u8, report: &ValidationReport) -> Status {
        if !report.is_valid || overall_confidence < self.threshold {
            Status::NeedsReview
        } else {
            Status::Approved
        }
    }
}

/// Decide with the default threshold.
#[cfg(test)]
pub fn decide(overall_confidence: u8, report: &ValidationReport) -> Status {
    StatusPolicy::default().decide(overall_confidence, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ValidationReport {
        ValidationReport::default()
    }

    fn invalid() -> ValidationReport {
        ValidationReport {
            is_valid: false,
            rules: Vec::new(),
        }
    }

    #[test]
    fn test_threshold_boundary() {
        assert_eq!(decide(84, &valid()), Status::NeedsReview);
        assert_eq!(decide(85, &valid()), Status::Approved);
        assert_eq!(decide(100, &valid()), Status::Approved);
        assert_eq!(decide(0, &valid()), Status::NeedsReview);
    }

    #[test]
    fn test_invalid_report_always_needs_review() {
        assert_eq!(decide(0, &invalid()), Status::NeedsReview);
        assert_eq!(decide(100, &invalid()), Status::NeedsReview);
    }

    #[test]
    fn test_custom_threshold() {
        let policy = StatusPolicy::new(60);
        assert_eq!(policy.decide(60, &valid()), Status::Approved);
        assert_eq!(policy.decide(59, &valid()), Status::NeedsReview);
    }

    #[test]
    fn test_status_text_round_trip() {
        for status in [Status::Approved, Status::NeedsReview] {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!("rejected".parse::<Status>().is_err());
    }
}
