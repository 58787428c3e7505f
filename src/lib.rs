//! # Facility Overrides
//!
//! Per-assembly overrides for HRESULT-style coded errors.
//!
//! Every crate (an *assembly* here) that raises coded errors owns a facility
//! id, the 11-bit field of its error codes, and may run in debug mode, where
//! errors include diagnostic detail in their external text. Hosts override both
//! per assembly without recompiling: an override table maps partially
//! specified [`AssemblyDescriptor`]s to values, and lookups resolve to the
//! entry that most specifically matches the caller's [`AssemblyIdentity`].
//!
//! ## Components
//!
//! - [`codes`]: bit layout of the 32-bit codes ([`HResult`], [`FacilityId`])
//! - [`identity`]: descriptors, identities and the scoring algorithm
//! - [`store`]: thread-safe [`OverrideStore`] with change notification
//! - [`loader`]: XML/JSON override documents ([`LoadOverrides`])
//! - [`CodedError`]: an error that resolves its facility and debug mode
//!   through the global stores
//!
//! ## Quick Start
//!
//! ```rust
//! use facility_overrides::{
//!     AssemblyDescriptor, AssemblyIdentity, FacilityId, FacilityOverrideStore, Version,
//! };
//!
//! let store = FacilityOverrideStore::new();
//! store.add("Acme.Widgets".parse().unwrap(), FacilityId::new(42)).unwrap();
//! store.add(AssemblyDescriptor::any(), FacilityId::new(1)).unwrap();
//!
//! let widgets = AssemblyIdentity::new("Acme.Widgets", Version::new(3, 0, 0, 0));
//! let other = AssemblyIdentity::new("Other.Lib", Version::new(1, 0, 0, 0));
//!
//! assert_eq!(store.try_get_best_match(&widgets).unwrap(), Some(FacilityId::new(42)));
//! assert_eq!(store.try_get_best_match(&other).unwrap(), Some(FacilityId::new(1)));
//! ```
//!
//! ## Features
//!
//! - `xml` (default): XML override documents via `quick-xml`
//! - `json` (default): JSON override documents via `serde_json`

#![warn(clippy::all)]

use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use zeroize::Zeroize;

pub mod codes;
pub mod error;
pub mod identity;
pub mod loader;
pub mod logging;
pub mod store;

pub use codes::*;
pub use error::{ErrorKind, OverrideError, Result};
pub use identity::{
    AssemblyDescriptor, AssemblyIdentity, MAX_SCORE, MatchOutcome, Mismatch, PublicKeyToken,
    Version,
};
pub use loader::{LoadOverrides, OverrideValue, SourceFormat, parse_overrides};
pub use logging::DiagnosticLog;
pub use store::{
    BatchGuard, DebugModeStore, FacilityOverrideStore, OverrideEntry, OverrideStore,
    SubscriptionId,
};

// ============================================================================
// Coded Error
// ============================================================================

/// An error carrying an HRESULT-style code.
///
/// # Key Properties
///
/// - The facility id can be resolved per assembly through the global
///   [`FacilityOverrideStore`]
/// - External display includes the diagnostic detail only when the owning
///   assembly is in debug mode
/// - Owned message and detail text is zeroized on drop
/// - Full context is available through [`CodedError::diagnostic_log`]
///
/// # Example
///
/// ```rust
/// use facility_overrides::{CodedError, FacilityId, HResult};
///
/// let err = CodedError::new(HResult::compose(FacilityId::new(42), 7), "widget not found")
///     .with_detail("id=19 shelf=B");
///
/// assert_eq!(err.to_string(), "widget not found (0xA02A0007)");
/// assert_eq!(err.with_debug_mode(true).to_string(), "widget not found (0xA02A0007): id=19 shelf=B");
/// ```
#[must_use = "errors should be handled or logged"]
pub struct CodedError {
    code: HResult,
    message: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    assembly: Option<String>,
    debug_mode: bool,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl CodedError {
    /// Create an error with an explicit code and debug mode off.
    #[inline]
    pub fn new(code: HResult, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
            assembly: None,
            debug_mode: false,
            source: None,
        }
    }

    /// Create an error for `identity` using the process-wide override stores.
    ///
    /// The facility comes from [`FacilityOverrideStore::global`] (falling back
    /// to `default_facility`), debug mode from [`DebugModeStore::global`]
    /// (falling back to off).
    pub fn resolve(
        identity: &AssemblyIdentity,
        error_id: u16,
        message: impl Into<Cow<'static, str>>,
        default_facility: FacilityId,
    ) -> Self {
        Self::resolve_with(
            FacilityOverrideStore::global(),
            DebugModeStore::global(),
            identity,
            error_id,
            message,
            default_facility,
        )
    }

    /// Like [`resolve`](Self::resolve) with caller-owned stores.
    ///
    /// A disposed store is treated as empty: the fallback applies and a
    /// warning is logged.
    pub fn resolve_with(
        facilities: &FacilityOverrideStore,
        debug_modes: &DebugModeStore,
        identity: &AssemblyIdentity,
        error_id: u16,
        message: impl Into<Cow<'static, str>>,
        default_facility: FacilityId,
    ) -> Self {
        let facility = facilities
            .resolve_facility(identity, default_facility)
            .unwrap_or_else(|e| {
                tracing::warn!(assembly = identity.name(), error = %e, "facility lookup failed");
                default_facility
            });
        let debug_mode = debug_modes.is_debug_enabled(identity).unwrap_or_else(|e| {
            tracing::warn!(assembly = identity.name(), error = %e, "debug mode lookup failed");
            false
        });

        Self {
            code: HResult::compose(facility, error_id),
            message: message.into(),
            detail: None,
            assembly: Some(identity.name().to_owned()),
            debug_mode,
            source: None,
        }
    }

    /// Attach diagnostic detail, shown externally only in debug mode.
    #[inline]
    pub fn with_detail(mut self, detail: impl Into<Cow<'static, str>>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach the underlying cause.
    #[inline]
    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    #[inline]
    pub fn with_debug_mode(mut self, enabled: bool) -> Self {
        self.debug_mode = enabled;
        self
    }

    #[inline]
    pub const fn code(&self) -> HResult {
        self.code
    }

    #[inline]
    pub const fn facility_id(&self) -> FacilityId {
        self.code.facility_id()
    }

    #[inline]
    pub const fn error_id(&self) -> u16 {
        self.code.error_id()
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Name of the assembly the error was resolved for.
    #[inline]
    pub fn assembly(&self) -> Option<&str> {
        self.assembly.as_deref()
    }

    #[inline]
    pub const fn is_debug_mode(&self) -> bool {
        self.debug_mode
    }

    /// Full structured context for internal logs.
    ///
    /// The returned view borrows from `self` and includes the detail whether
    /// or not debug mode is on.
    pub fn diagnostic_log(&self) -> DiagnosticLog<'_> {
        DiagnosticLog {
            code: self.code,
            message: &self.message,
            detail: self.detail.as_deref(),
            assembly: self.assembly.as_deref(),
            source: self
                .source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn Error + 'static)),
            debug_mode: self.debug_mode,
        }
    }
}

impl Zeroize for CodedError {
    fn zeroize(&mut self) {
        if let Cow::Owned(ref mut s) = self.message {
            s.zeroize();
        }
        if let Some(Cow::Owned(ref mut s)) = self.detail {
            s.zeroize();
        }
        if let Some(ref mut s) = self.assembly {
            s.zeroize();
        }
    }
}

impl Drop for CodedError {
    fn drop(&mut self) {
        // Source may hold sensitive context too
        self.source = None;
        self.zeroize();
    }
}

impl fmt::Debug for CodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodedError")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("assembly", &self.assembly)
            .field("debug_mode", &self.debug_mode)
            .field("detail", &self.detail.as_ref().map(|_| "<REDACTED>"))
            .field("source", &self.source.as_ref().map(|_| "<PRESENT>"))
            .finish()
    }
}

impl fmt::Display for CodedError {
    /// `"{message} ({code})"`, followed by `": {detail}"` in debug mode.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            logging::truncate_with_indicator(&self.message),
            self.code
        )?;
        if self.debug_mode {
            if let Some(detail) = self.detail.as_deref() {
                write!(f, ": {}", logging::truncate_with_indicator(detail))?;
            }
        }
        Ok(())
    }
}

impl Error for CodedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

impl From<&CodedError> for HResult {
    fn from(err: &CodedError) -> Self {
        err.code
    }
}
