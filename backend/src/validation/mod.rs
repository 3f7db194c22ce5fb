//! Advisory format checks on well-known columns.
//!
//! Columns whose name contains `email` or `phone` (any case) are matched
//! against a simple pattern. The result is a list of warnings, one per
//! column with at least one mismatch; the table is never modified and
//! nothing here fails.
//!
//! ```rust,ignore
//! let warnings = validate_table(&table);
//! // ["Column 'Email': 1 invalid email address(es)"]
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Table;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9\s\-()]+$").expect("valid phone regex"));

struct Rule {
    name_fragment: &'static str,
    pattern: &'static Lazy<Regex>,
    label: &'static str,
}

static RULES: [Rule; 2] = [
    Rule {
        name_fragment: "email",
        pattern: &EMAIL_PATTERN,
        label: "email address(es)",
    },
    Rule {
        name_fragment: "phone",
        pattern: &PHONE_PATTERN,
        label: "phone number(s)",
    },
];

/// Check email and phone columns; returns one warning per offending column.
pub fn validate_table(table: &Table) -> Vec<String> {
    let mut warnings = Vec::new();

    for column in table.columns() {
        let lowered = column.name.to_lowercase();
        for rule in RULES.iter().filter(|r| lowered.contains(r.name_fragment)) {
            let invalid = column
                .values
                .iter()
                .filter(|cell| !rule.pattern.is_match(&cell.to_text()))
                .count();
            if invalid > 0 {
                warnings.push(format!(
                    "Column '{}': {} invalid {}",
                    column.name, invalid, rule.label
                ));
            }
        }
    }

    warnings
}
