//! Conformance report rendering.

use serde::{Deserialize, Serialize};

use crate::checks::CheckResult;

/// A named collection of contract check results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceReport {
    /// Report title.
    pub title: String,
    /// Individual check results.
    pub results: Vec<CheckResult>,
}

impl ConformanceReport {
    /// Build a report over the given results.
    #[must_use]
    pub fn new(title: impl Into<String>, results: Vec<CheckResult>) -> Self {
        ConformanceReport {
            title: title.into(),
            results,
        }
    }

    /// Number of passing checks.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// True if every check passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.passed() == self.results.len()
    }

    /// Render the report as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!(
            "- Checks: {}\n- Passed: {}\n- Failed: {}\n\n",
            self.results.len(),
            self.passed(),
            self.results.len() - self.passed()
        ));
        out.push_str("| Check | Guarantee | Status | Detail |\n");
        out.push_str("|-------|-----------|--------|--------|\n");
        for r in &self.results {
            let status = if r.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!(
                "| `{}` | {} | {} | {} |\n",
                r.id, r.description, status, r.detail
            ));
        }
        out
    }

    /// Render the report as pretty-printed JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}
