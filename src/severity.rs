//! Severity levels and the numeric code mapping.
//!
//! Codes are grouped by their remainder modulo 1000: `1..300` are errors,
//! `300..700` warnings, `700..1000` and exact multiples of 1000 (zero
//! included) informational. Negative codes that are not multiples of 1000
//! are errors.

use std::fmt;

/// Default code for an error notice.
pub const CODE_ERROR: i64 = 1;

/// Default code for a warning notice.
pub const CODE_WARNING: i64 = 300;

/// Default code for an informational notice.
pub const CODE_INFO: i64 = 700;

/// Notice severity, ordered by increasing severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Derive a severity from a numeric code. Total over all integers.
    ///
    /// The remainder keeps the sign of the code, so negative codes that are
    /// not multiples of 1000 are errors.
    pub fn from_code(code: i64) -> Self {
        let r = code % 1000;
        if r == 0 || r >= 700 {
            Severity::Info
        } else if r >= 300 {
            Severity::Warning
        } else {
            Severity::Error
        }
    }

    /// Code used when a notice has a severity but no explicit code.
    pub fn default_code(self) -> i64 {
        match self {
            Severity::Error => CODE_ERROR,
            Severity::Warning => CODE_WARNING,
            Severity::Info => CODE_INFO,
        }
    }

    /// Lowercase human title.
    pub fn title(self) -> &'static str {
        match self {
            Severity::Info => "information",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    /// Stable numeric level (1 = info, 2 = warning, 3 = error).
    pub fn level(self) -> u8 {
        match self {
            Severity::Info => 1,
            Severity::Warning => 2,
            Severity::Error => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}
