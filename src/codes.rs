//! HRESULT-style numeric error codes.
//!
//! Every coded error carries a 32-bit signed integer laid out the way COM
//! failure codes are, with the customer bit set so the value can never be
//! confused with a platform-defined code:
//!
//! ```text
//!  3 3 2 2 2 2 2 2 2 2 2 2 1 1 1 1 1 1 1 1 1 1
//!  1 0 9 8 7 6 5 4 3 2 1 0 9 8 7 6 5 4 3 2 1 0 9 8 7 6 5 4 3 2 1 0
//! +-+-+-+-+-+---------------------+-------------------------------+
//! |S|R|C|N|X|      Facility       |             Code              |
//! +-+-+-+-+-+---------------------+-------------------------------+
//! ```
//!
//! - **S** (severity) and **C** (customer) are always set: `0xA000_0000`
//! - **R**, **N**, **X** are always clear
//! - **Facility** is an 11-bit [`FacilityId`] (0-2047), bits 16-26
//! - **Code** is the 16-bit error id, bits 0-15
//!
//! # Example
//!
//! ```rust
//! use facility_overrides::{FacilityId, HResult};
//!
//! const STORAGE: FacilityId = FacilityId::new(42);
//!
//! let code = HResult::compose(STORAGE, 7);
//! assert!(code.is_custom());
//! assert_eq!(code.facility_id(), STORAGE);
//! assert_eq!(code.error_id(), 7);
//! assert_eq!(code.to_string(), "0xA02A0007");
//! ```
//!
//! All helpers are pure bit arithmetic and never allocate.

use std::fmt;

/// High marker bits identifying a custom code (severity + customer bits).
pub const CUSTOM_CODE_MARKER: u32 = 0xA000_0000;

/// Bits that must equal [`CUSTOM_CODE_MARKER`] for a code to be custom.
const MARKER_MASK: u32 = 0xF800_0000;

const FACILITY_SHIFT: u32 = 16;
const FACILITY_MASK: u32 = 0x07FF;
const ERROR_ID_MASK: u32 = 0xFFFF;

// ============================================================================
// Facility Id (Validated 11-bit Value)
// ============================================================================

/// Validated facility identifier (0-2047).
///
/// A facility names the subsystem (assembly) that owns a range of error
/// codes. Construction validates the 11-bit range once; everything
/// downstream receives a pre-validated value.
///
/// # Example
///
/// ```rust
/// # use facility_overrides::FacilityId;
/// // Compile-time validation
/// const NETWORK: FacilityId = FacilityId::new(310);
///
/// // Runtime validation
/// # let from_config = 12u32;
/// let facility = FacilityId::checked_new(from_config).unwrap();
/// assert!(FacilityId::checked_new(2048).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FacilityId(u16);

impl FacilityId {
    /// Largest representable facility id.
    pub const MAX: u16 = FACILITY_MASK as u16;

    /// Create a facility id with compile-time validation.
    ///
    /// # Panics
    ///
    /// Panics (at compile time in const contexts) if `value > 2047`.
    #[inline]
    pub const fn new(value: u16) -> Self {
        assert!(value <= Self::MAX, "Facility id must be 0-2047");
        Self(value)
    }

    /// Create a facility id with runtime validation.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `value > 2047`.
    #[inline]
    pub fn checked_new(value: u32) -> Result<Self, FacilityIdError> {
        if value > Self::MAX as u32 {
            Err(FacilityIdError::OutOfRange { value })
        } else {
            Ok(Self(value as u16))
        }
    }

    /// Get the raw numeric value.
    #[inline]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for FacilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for facility id validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacilityIdError {
    /// Value exceeds maximum allowed facility id (2047).
    OutOfRange { value: u32 },
}

impl fmt::Display for FacilityIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { value } => {
                write!(f, "Facility id {} exceeds maximum (2047)", value)
            }
        }
    }
}

impl std::error::Error for FacilityIdError {}

// ============================================================================
// Bit Helpers
// ============================================================================

/// Extract the facility id from a raw code.
#[inline]
pub const fn extract_facility_id(code: i32) -> FacilityId {
    FacilityId((((code as u32) >> FACILITY_SHIFT) & FACILITY_MASK) as u16)
}

/// Extract the 16-bit error id from a raw code.
#[inline]
pub const fn extract_error_id(code: i32) -> u16 {
    ((code as u32) & ERROR_ID_MASK) as u16
}

/// Compose the base code (error id 0) for a facility.
#[inline]
pub const fn base_code_for_facility(facility: FacilityId) -> i32 {
    (CUSTOM_CODE_MARKER | ((facility.0 as u32) << FACILITY_SHIFT)) as i32
}

/// Check whether a raw code carries the custom-code marker bits.
#[inline]
pub const fn is_custom_code(code: i32) -> bool {
    (code as u32) & MARKER_MASK == CUSTOM_CODE_MARKER
}

// ============================================================================
// HResult (Composed Code)
// ============================================================================

/// A composed 32-bit code.
///
/// Arbitrary raw values can be wrapped with [`HResult::from_raw`]; only codes
/// built by [`HResult::compose`] are guaranteed to satisfy [`HResult::is_custom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(i32);

impl HResult {
    /// Compose a custom code from a facility and an error id.
    #[inline]
    pub const fn compose(facility: FacilityId, error_id: u16) -> Self {
        Self(base_code_for_facility(facility) | error_id as i32)
    }

    /// Wrap a raw code without validation.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Get the raw signed value.
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    #[inline]
    pub const fn facility_id(self) -> FacilityId {
        extract_facility_id(self.0)
    }

    #[inline]
    pub const fn error_id(self) -> u16 {
        extract_error_id(self.0)
    }

    #[inline]
    pub const fn is_custom(self) -> bool {
        is_custom_code(self.0)
    }

    /// Same error id, different facility.
    ///
    /// Used when an override store reassigns the facility of an assembly.
    #[inline]
    pub const fn with_facility(self, facility: FacilityId) -> Self {
        Self::compose(facility, self.error_id())
    }
}

impl fmt::Display for HResult {
    /// Writes the code as `0x` followed by eight uppercase hex digits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0 as u32)
    }
}

impl From<HResult> for i32 {
    fn from(code: HResult) -> Self {
        code.0
    }
}

// ============================================================================
// Tests
// ============================================================================
