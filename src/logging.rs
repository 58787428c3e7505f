//! Bounded diagnostic rendering for coded errors.
//!
//! [`DiagnosticLog`] borrows from the [`CodedError`](crate::CodedError) that
//! produced it and cannot outlive it. It carries the full detail regardless of
//! debug mode; the error's own `Display` is the external, filtered view.
//!
//! Every free-text field is capped at 1024 bytes when rendered, so a runaway
//! message cannot flood a log sink.

use crate::codes::HResult;
use std::borrow::Cow;
use std::error::Error;
use std::fmt;

/// Maximum length for any individual field in formatted output.
const MAX_FIELD_OUTPUT_LEN: usize = 1024;

/// Appended to truncated fields.
const TRUNCATION_INDICATOR: &str = "...[TRUNCATED]";

/// Structured view of a coded error, borrowed for the duration of one log call.
///
/// # Example
///
/// ```rust
/// # use facility_overrides::{CodedError, FacilityId, HResult};
/// let err = CodedError::new(HResult::compose(FacilityId::new(7), 3), "lookup failed")
///     .with_detail("key=widgets/42");
///
/// let mut line = String::new();
/// err.diagnostic_log().write_to(&mut line).unwrap();
/// assert!(line.contains("key=widgets/42"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticLog<'a> {
    pub code: HResult,
    pub message: &'a str,
    pub detail: Option<&'a str>,
    pub assembly: Option<&'a str>,
    pub source: Option<&'a (dyn Error + 'static)>,
    pub debug_mode: bool,
}

impl<'a> DiagnosticLog<'a> {
    /// Write the log line without allocating for in-bound fields.
    pub fn write_to(&self, f: &mut impl fmt::Write) -> fmt::Result {
        write!(
            f,
            "[{}] facility={} error={} message='{}'",
            self.code,
            self.code.facility_id(),
            self.code.error_id(),
            truncate_with_indicator(self.message)
        )?;

        if let Some(assembly) = self.assembly {
            write!(f, " assembly='{}'", truncate_with_indicator(assembly))?;
        }

        if let Some(detail) = self.detail {
            write!(f, " detail='{}'", truncate_with_indicator(detail))?;
        }

        if let Some(source) = self.source {
            let rendered = source.to_string();
            write!(f, " source='{}'", truncate_with_indicator(&rendered))?;
        }

        if self.debug_mode {
            f.write_str(" [DEBUG]")?;
        }

        Ok(())
    }

    /// Emit the line through `tracing` at error level.
    pub fn emit(&self) {
        tracing::error!(
            code = %self.code,
            facility = self.code.facility_id().value(),
            error_id = self.code.error_id(),
            debug_mode = self.debug_mode,
            "{}",
            self
        );
    }

    #[inline]
    pub const fn code(&self) -> HResult {
        self.code
    }

    #[inline]
    pub const fn message(&self) -> &str {
        self.message
    }

    #[inline]
    pub const fn detail(&self) -> Option<&str> {
        self.detail
    }

    #[inline]
    pub const fn assembly(&self) -> Option<&str> {
        self.assembly
    }
}

impl fmt::Display for DiagnosticLog<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_to(f)
    }
}

/// Cap a field at [`MAX_FIELD_OUTPUT_LEN`] bytes, marking the cut.
///
/// Borrows when no truncation is needed.
pub(crate) fn truncate_with_indicator(s: &str) -> Cow<'_, str> {
    if s.len() <= MAX_FIELD_OUTPUT_LEN {
        return Cow::Borrowed(s);
    }

    let max_content_len = MAX_FIELD_OUTPUT_LEN.saturating_sub(TRUNCATION_INDICATOR.len());

    // Last char boundary at or before the limit
    let mut idx = max_content_len;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }

    if idx == 0 {
        return Cow::Borrowed(TRUNCATION_INDICATOR);
    }

    let mut result = String::with_capacity(idx + TRUNCATION_INDICATOR.len());
    result.push_str(&s[..idx]);
    result.push_str(TRUNCATION_INDICATOR);
    Cow::Owned(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::FacilityId;
    use std::io;

    fn log_for<'a>(message: &'a str, detail: Option<&'a str>) -> DiagnosticLog<'a> {
        DiagnosticLog {
            code: HResult::compose(FacilityId::new(12), 5),
            message,
            detail,
            assembly: Some("Acme.Widgets"),
            source: None,
            debug_mode: false,
        }
    }

    #[test]
    fn write_to_includes_every_field() {
        let source = io::Error::new(io::ErrorKind::NotFound, "gone");
        let mut log = log_for("lookup failed", Some("key=7"));
        log.source = Some(&source);
        log.debug_mode = true;

        let mut out = String::new();
        log.write_to(&mut out).unwrap();
        assert!(out.starts_with("[0xA00C0005] facility=12 error=5 message='lookup failed'"));
        assert!(out.contains("assembly='Acme.Widgets'"));
        assert!(out.contains("detail='key=7'"));
        assert!(out.contains("source='gone'"));
        assert!(out.ends_with("[DEBUG]"));
    }

    #[test]
    fn absent_fields_are_omitted() {
        let mut log = log_for("plain", None);
        log.assembly = None;
        let out = log.to_string();
        assert!(!out.contains("detail="));
        assert!(!out.contains("assembly="));
        assert!(!out.contains("source="));
    }

    #[test]
    fn long_message_is_capped() {
        let message = "m".repeat(10_000);
        let out = log_for(&message, None).to_string();
        assert!(out.contains(TRUNCATION_INDICATOR));
        assert!(out.len() < 2 * MAX_FIELD_OUTPUT_LEN);
    }

    #[test]
    fn no_truncate_when_under_limit() {
        let truncated = truncate_with_indicator("short string");
        assert!(matches!(truncated, Cow::Borrowed(_)));
        assert_eq!(truncated, "short string");
    }

    #[test]
    fn exactly_at_limit() {
        let s = "a".repeat(MAX_FIELD_OUTPUT_LEN);
        let truncated = truncate_with_indicator(&s);
        assert!(matches!(truncated, Cow::Borrowed(_)));
        assert!(!truncated.ends_with(TRUNCATION_INDICATOR));
    }

    #[test]
    fn one_over_limit() {
        let s = "a".repeat(MAX_FIELD_OUTPUT_LEN + 1);
        let truncated = truncate_with_indicator(&s);
        assert!(matches!(truncated, Cow::Owned(_)));
        assert!(truncated.len() <= MAX_FIELD_OUTPUT_LEN);
        assert!(truncated.ends_with(TRUNCATION_INDICATOR));
    }

    #[test]
    fn truncate_respects_utf8_boundaries() {
        // 2-byte and 4-byte code points
        for s in ["й".repeat(MAX_FIELD_OUTPUT_LEN), "🔥".repeat(MAX_FIELD_OUTPUT_LEN)] {
            let truncated = truncate_with_indicator(&s);
            assert!(truncated.len() <= MAX_FIELD_OUTPUT_LEN);
            assert!(truncated.ends_with(TRUNCATION_INDICATOR));
        }
    }
}
