// src/validator.rs

use crate::config::PolicySection;
use crate::document::ExtractedDocument;
use serde::Serialize;
use std::fmt;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

/// Fields that must be filled in for a document to be valid.
pub const REQUIRED_FIELDS: [&str; 3] = ["vendor_name", "date", "total_amount"];

/// Totals above this are flagged for attention but stay valid.
pub const AMOUNT_WARNING_LIMIT: f64 = 10_000.0;

pub const RULE_REQUIRED_FIELDS: &str = "Required Fields";
pub const RULE_DATE_VALIDITY: &str = "Date Validity";
pub const RULE_AMOUNT_CHECK: &str = "Amount Check";

/// Outcome of a single rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Warning,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Pass => "PASS",
            Verdict::Warning => "WARNING",
            Verdict::Fail => "FAIL",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleResult {
    pub rule: &'static str,
    pub status: Verdict,
    pub message: String,
}

/// Rule-by-rule verdict for one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub rules: Vec<RuleResult>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self {
            is_valid: true,
            rules: Vec::new(),
        }
    }
}

impl ValidationReport {
    /// Append a rule outcome. A FAIL clears `is_valid` for good.
    fn record(&mut self, rule: &'static str, status: Verdict, message: impl Into<String>) {
        if status == Verdict::Fail {
            self.is_valid = false;
        }
        self.rules.push(RuleResult {
            rule,
            status,
            message: message.into(),
        });
    }

    #[cfg(test)]
    pub fn rule(&self, name: &str) -> Option<&RuleResult> {
        self.rules.iter().find(|r| r.rule == name)
    }

    pub fn has_warnings(&self) -> bool {
        self.rules.iter().any(|r| r.status == Verdict::Warning)
    }
}

/// Business-rule checks applied to every extracted document.
#[derive(Debug, Clone)]
pub struct Validator {
    required_fields: Vec<String>,
    amount_warning_limit: f64,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(
            REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect(),
            AMOUNT_WARNING_LIMIT,
        )
    }
}

impl Validator {
    pub fn new(required_fields: Vec<String>, amount_warning_limit: f64) -> Self {
        Self {
            required_fields,
            amount_warning_limit,
        }
    }

    pub fn from_policy(policy: &PolicySection) -> Self {
        Self::new(policy.required_fields.clone(), policy.amount_warning_limit)
    }

    pub fn validate(&self, doc: &ExtractedDocument) -> ValidationReport {
        self.validate_as_of(doc, today())
    }

    /// Run all rules, treating `today` as the latest acceptable document date.
    pub fn validate_as_of(&self, doc: &ExtractedDocument, today: Date) -> ValidationReport {
        let mut report = ValidationReport::default();

        let missing: Vec<&str> = self
            .required_fields
            .iter()
            .map(String::as_str)
            .filter(|f| !doc.field_is_present(f))
            .collect();
        if missing.is_empty() {
            report.record(
                RULE_REQUIRED_FIELDS,
                Verdict::Pass,
                "All required fields present.",
            );
        } else {
            report.record(
                RULE_REQUIRED_FIELDS,
                Verdict::Fail,
                format!("Missing: {}", missing.join(", ")),
            );
        }

        if let Some(raw) = doc.date.as_deref().filter(|d| !d.is_empty()) {
            match parse_document_date(raw) {
                Some(date) if date > today => {
                    report.record(RULE_DATE_VALIDITY, Verdict::Fail, "Date is in the future.")
                }
                Some(_) => report.record(RULE_DATE_VALIDITY, Verdict::Pass, "Date is valid."),
                None => report.record(
                    RULE_DATE_VALIDITY,
                    Verdict::Warning,
                    "Could not parse date format.",
                ),
            }
        }

        if let Some(amount) = &doc.total_amount {
            match amount.as_f64() {
                None => report.record(
                    RULE_AMOUNT_CHECK,
                    Verdict::Fail,
                    "Amount is not a valid number.",
                ),
                Some(v) if v < 0.0 => {
                    report.record(RULE_AMOUNT_CHECK, Verdict::Fail, "Amount is negative.")
                }
                Some(v) if v > self.amount_warning_limit => report.record(
                    RULE_AMOUNT_CHECK,
                    Verdict::Warning,
                    format!(
                        "High value document (>${}).",
                        group_thousands(self.amount_warning_limit)
                    ),
                ),
                Some(_) => report.record(
                    RULE_AMOUNT_CHECK,
                    Verdict::Pass,
                    "Amount is within normal range.",
                ),
            }
        }

        report
    }
}

/// Validate with the default rule set.
#[cfg(test)]
pub fn validate(doc: &ExtractedDocument) -> ValidationReport {
    Validator::default().validate(doc)
}

/// Today's date in local time, falling back to UTC when the offset is unknown.
pub fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

/// Parse a `YYYY-MM-DD` document date. Month and day may drop the leading zero.
pub fn parse_document_date(raw: &str) -> Option<Date> {
    Date::parse(
        raw,
        format_description!("[year]-[month padding:none]-[day padding:none]"),
    )
    .ok()
}

/// 10000.0 -> "10,000"
fn group_thousands(value: f64) -> String {
    let digits = format!("{:.0}", value.trunc().abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Amount;
    use serde_json::Value;
    use time::macros::date;

    const TODAY: Date = date!(2026 - 03 - 15);

    fn valid_doc() -> ExtractedDocument {
        ExtractedDocument {
            vendor_name: Some("ACME Solutions Inc.".into()),
            date: Some("2026-02-09".into()),
            total_amount: Some(Amount::Number(1980.0)),
            overall_confidence: 92,
            ..Default::default()
        }
    }

    fn check(doc: &ExtractedDocument) -> ValidationReport {
        Validator::default().validate_as_of(doc, TODAY)
    }

    fn verdict(report: &ValidationReport, rule: &str) -> Option<Verdict> {
        report.rule(rule).map(|r| r.status)
    }

    #[test]
    fn test_valid_document_passes_every_rule() {
        let report = check(&valid_doc());
        assert!(report.is_valid);
        let names: Vec<_> = report.rules.iter().map(|r| r.rule).collect();
        assert_eq!(
            names,
            [RULE_REQUIRED_FIELDS, RULE_DATE_VALIDITY, RULE_AMOUNT_CHECK]
        );
        assert!(report.rules.iter().all(|r| r.status == Verdict::Pass));
    }

    #[test]
    fn test_missing_fields_are_listed_in_order() {
        let doc = ExtractedDocument {
            vendor_name: Some(String::new()),
            total_amount: None,
            ..valid_doc()
        };
        let report = check(&doc);
        assert!(!report.is_valid);
        let rule = report.rule(RULE_REQUIRED_FIELDS).unwrap();
        assert_eq!(rule.status, Verdict::Fail);
        assert_eq!(rule.message, "Missing: vendor_name, total_amount");

        let empty = check(&ExtractedDocument::default());
        assert_eq!(
            empty.rule(RULE_REQUIRED_FIELDS).unwrap().message,
            "Missing: vendor_name, date, total_amount"
        );
    }

    #[test]
    fn test_missing_date_skips_date_rule() {
        let doc = ExtractedDocument {
            date: None,
            ..valid_doc()
        };
        let report = check(&doc);
        assert_eq!(verdict(&report, RULE_DATE_VALIDITY), None);
        assert_eq!(report.rules.len(), 2);
    }

    #[test]
    fn test_missing_amount_skips_amount_rule() {
        let doc = ExtractedDocument {
            total_amount: None,
            ..valid_doc()
        };
        let report = check(&doc);
        assert_eq!(verdict(&report, RULE_AMOUNT_CHECK), None);
    }

    #[test]
    fn test_zero_amount_is_missing_but_in_range() {
        let doc = ExtractedDocument {
            total_amount: Some(Amount::Number(0.0)),
            ..valid_doc()
        };
        let report = check(&doc);
        assert!(!report.is_valid);
        assert_eq!(
            report.rule(RULE_REQUIRED_FIELDS).unwrap().message,
            "Missing: total_amount"
        );
        assert_eq!(verdict(&report, RULE_AMOUNT_CHECK), Some(Verdict::Pass));
    }

    #[test]
    fn test_amount_boundaries() {
        let with_total = |v: f64| ExtractedDocument {
            total_amount: Some(Amount::Number(v)),
            ..valid_doc()
        };

        let at_limit = check(&with_total(10_000.0));
        assert!(at_limit.is_valid);
        assert_eq!(verdict(&at_limit, RULE_AMOUNT_CHECK), Some(Verdict::Pass));

        let above = check(&with_total(10_000.01));
        assert!(above.is_valid);
        assert!(above.has_warnings());
        assert_eq!(
            above.rule(RULE_AMOUNT_CHECK).unwrap().message,
            "High value document (>$10,000)."
        );

        let negative = check(&with_total(-0.01));
        assert!(!negative.is_valid);
        assert_eq!(verdict(&negative, RULE_AMOUNT_CHECK), Some(Verdict::Fail));
    }

    #[test]
    fn test_non_numeric_amount_fails() {
        for amount in [
            Amount::Text("about 200".into()),
            Amount::Other(Value::Array(vec![])),
        ] {
            let doc = ExtractedDocument {
                total_amount: Some(amount),
                ..valid_doc()
            };
            let report = check(&doc);
            assert!(!report.is_valid);
            assert_eq!(
                report.rule(RULE_AMOUNT_CHECK).unwrap().message,
                "Amount is not a valid number."
            );
        }

        let numeric_text = ExtractedDocument {
            total_amount: Some(Amount::Text("1980.00".into())),
            ..valid_doc()
        };
        assert!(check(&numeric_text).is_valid);
    }

    #[test]
    fn test_date_relative_to_today() {
        let with_date = |d: &str| ExtractedDocument {
            date: Some(d.into()),
            ..valid_doc()
        };

        let tomorrow = check(&with_date("2026-03-16"));
        assert!(!tomorrow.is_valid);
        assert_eq!(verdict(&tomorrow, RULE_DATE_VALIDITY), Some(Verdict::Fail));

        let today = check(&with_date("2026-03-15"));
        assert!(today.is_valid);
        assert_eq!(verdict(&today, RULE_DATE_VALIDITY), Some(Verdict::Pass));

        let garbage = check(&with_date("not-a-date"));
        assert!(garbage.is_valid);
        assert_eq!(verdict(&garbage, RULE_DATE_VALIDITY), Some(Verdict::Warning));

        let wrong_order = check(&with_date("09/02/2026"));
        assert_eq!(verdict(&wrong_order, RULE_DATE_VALIDITY), Some(Verdict::Warning));
    }

    #[test]
    fn test_unpadded_dates_are_parsed() {
        let with_date = |d: &str| ExtractedDocument {
            date: Some(d.into()),
            ..valid_doc()
        };

        let far_future = check(&with_date("2099-1-1"));
        assert!(!far_future.is_valid);
        assert_eq!(verdict(&far_future, RULE_DATE_VALIDITY), Some(Verdict::Fail));

        let past = check(&with_date("2025-1-5"));
        assert!(past.is_valid);
        assert_eq!(verdict(&past, RULE_DATE_VALIDITY), Some(Verdict::Pass));

        assert_eq!(parse_document_date("2026-03-05"), Some(date!(2026 - 03 - 05)));
        assert_eq!(parse_document_date("2026-3-5"), Some(date!(2026 - 03 - 05)));
        assert_eq!(parse_document_date("2026-13-01"), None);
    }

    #[test]
    fn test_failure_is_sticky() {
        // Required fields fail first; a later PASS must not restore validity.
        let doc = ExtractedDocument {
            vendor_name: None,
            ..valid_doc()
        };
        let report = check(&doc);
        assert!(!report.is_valid);
        assert_eq!(verdict(&report, RULE_AMOUNT_CHECK), Some(Verdict::Pass));
    }

    #[test]
    fn test_custom_policy() {
        let validator = Validator::new(vec!["invoice_number".into()], 500.0);
        let report = validator.validate_as_of(&valid_doc(), TODAY);
        assert_eq!(
            report.rule(RULE_REQUIRED_FIELDS).unwrap().message,
            "Missing: invoice_number"
        );
        assert_eq!(
            report.rule(RULE_AMOUNT_CHECK).unwrap().message,
            "High value document (>$500)."
        );
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(10_000.0), "10,000");
        assert_eq!(group_thousands(1_250_000.0), "1,250,000");
        assert_eq!(group_thousands(999.0), "999");
    }
}
