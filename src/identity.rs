//! Assembly identities and the partial-match descriptors that select them.
//!
//! An [`AssemblyIdentity`] is the concrete, fully-specified record of one
//! loaded assembly (in Rust terms: one crate). An [`AssemblyDescriptor`] is a
//! pattern over identities: any of its four attributes may be left
//! unspecified, in which case it matches every value of that attribute.
//!
//! # Scoring
//!
//! [`AssemblyDescriptor::evaluate`] scores a descriptor against an identity:
//!
//! | Attribute        | Weight | Mismatch sentinel |
//! |------------------|--------|-------------------|
//! | name             | 8      | -1                |
//! | version          | 4      | -2                |
//! | culture          | 2      | -3                |
//! | public key token | 1      | -4                |
//!
//! The first specified attribute that disagrees ends the evaluation with its
//! sentinel. A descriptor with nothing specified scores exactly 0; a fully
//! specified descriptor that agrees everywhere scores [`MAX_SCORE`]. Name
//! outweighs the other three combined, so a descriptor pinning the name always
//! outranks one that does not.
//!
//! # String Grammar
//!
//! ```text
//! <name>(, Version=<version>)?(, Culture=<culture>)?(, PublicKeyToken=<hex-token>)?
//! ```
//!
//! A backslash escapes the next character, so names may carry `,`, `=`, `\\`
//! or leading and trailing whitespace (`Acme\\, Inc`). Rendering escapes them.
//!
//! ```rust
//! use facility_overrides::{AssemblyDescriptor, AssemblyIdentity, Version};
//!
//! let descriptor: AssemblyDescriptor = "Acme.Widgets, Culture=neutral".parse().unwrap();
//! let identity = AssemblyIdentity::new("acme.widgets", Version::new(2, 1, 0, 0));
//!
//! assert_eq!(descriptor.match_score(&identity), 8 + 2);
//! assert_eq!(descriptor.to_string(), "Acme.Widgets, Culture=neutral");
//! ```

use crate::error::{OverrideError, Result};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// Textual marker for the neutral (invariant) culture.
pub const NEUTRAL_CULTURE: &str = "neutral";

/// Score contributed by a matching name.
pub const NAME_WEIGHT: u8 = 8;
/// Score contributed by a matching version.
pub const VERSION_WEIGHT: u8 = 4;
/// Score contributed by a matching culture.
pub const CULTURE_WEIGHT: u8 = 2;
/// Score contributed by a matching public key token.
pub const PUBLIC_KEY_TOKEN_WEIGHT: u8 = 1;
/// Highest achievable score.
pub const MAX_SCORE: u8 = NAME_WEIGHT + VERSION_WEIGHT + CULTURE_WEIGHT + PUBLIC_KEY_TOKEN_WEIGHT;

// ============================================================================
// Version
// ============================================================================

/// A 2-to-4 part dotted version (`major.minor[.build[.revision]]`).
///
/// Equality is strict: `1.0` and `1.0.0.0` are different versions. When used
/// inside a descriptor, components that were not given act as wildcards
/// (see [`Version::covers`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    major: u32,
    minor: u32,
    build: Option<u32>,
    revision: Option<u32>,
}

impl Version {
    /// Fully specified four-part version.
    #[inline]
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build: Some(build),
            revision: Some(revision),
        }
    }

    /// Two-part version with build and revision left open.
    #[inline]
    pub const fn major_minor(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            build: None,
            revision: None,
        }
    }

    /// Three-part version with the revision left open.
    #[inline]
    pub const fn with_build(major: u32, minor: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            build: Some(build),
            revision: None,
        }
    }

    #[inline]
    pub const fn major(&self) -> u32 {
        self.major
    }

    #[inline]
    pub const fn minor(&self) -> u32 {
        self.minor
    }

    #[inline]
    pub const fn build(&self) -> Option<u32> {
        self.build
    }

    #[inline]
    pub const fn revision(&self) -> Option<u32> {
        self.revision
    }

    /// Check whether this (pattern) version agrees with a concrete version.
    ///
    /// Major and minor must be equal; build and revision are compared only
    /// when this version specifies them.
    pub fn covers(&self, concrete: &Version) -> bool {
        self.major == concrete.major
            && self.minor == concrete.minor
            && self.build.is_none_or(|b| concrete.build == Some(b))
            && self.revision.is_none_or(|r| concrete.revision == Some(r))
    }
}

impl FromStr for Version {
    type Err = OverrideError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || OverrideError::InvalidVersion {
            input: s.to_owned(),
        };

        let mut parts: SmallVec<[u32; 4]> = SmallVec::new();
        for part in s.trim().split('.') {
            if parts.len() == 4 || part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            parts.push(part.parse().map_err(|_| invalid())?);
        }

        match parts.as_slice() {
            [major, minor] => Ok(Self::major_minor(*major, *minor)),
            [major, minor, build] => Ok(Self::with_build(*major, *minor, *build)),
            [major, minor, build, revision] => Ok(Self::new(*major, *minor, *build, *revision)),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(build) = self.build {
            write!(f, ".{}", build)?;
            if let Some(revision) = self.revision {
                write!(f, ".{}", revision)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Public Key Token
// ============================================================================

/// Public key token bytes (8 bytes for strong-named assemblies).
///
/// An empty token means the assembly is unsigned; it renders as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PublicKeyToken(SmallVec<[u8; 8]>);

impl PublicKeyToken {
    #[inline]
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        Self(SmallVec::from_slice(bytes.as_ref()))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for PublicKeyToken {
    type Err = OverrideError;

    /// Accepts an even-length hex string, optionally prefixed with `0x`,
    /// or the literal `null` for an empty token.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || OverrideError::InvalidPublicKeyToken {
            input: s.to_owned(),
        };

        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("null") {
            return Ok(Self::default());
        }
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if hex.len() % 2 != 0 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut bytes = SmallVec::with_capacity(hex.len() / 2);
        for pair in hex.as_bytes().chunks_exact(2) {
            bytes.push((hex_value(pair[0]) << 4) | hex_value(pair[1]));
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for PublicKeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("null");
        }
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Caller guarantees `digit` is an ASCII hex digit.
#[inline]
const fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

// ============================================================================
// Concrete Identity
// ============================================================================

/// The concrete identity of one loaded assembly.
///
/// Supplied by the host: this crate never discovers identities on its own,
/// apart from the [`assembly_identity!`](crate::assembly_identity) macro which
/// reads the calling crate's Cargo metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyIdentity {
    name: String,
    version: Version,
    culture: String,
    public_key_token: Option<PublicKeyToken>,
}

impl AssemblyIdentity {
    /// Neutral-culture, unsigned identity.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            culture: String::new(),
            public_key_token: None,
        }
    }

    /// Set the culture; empty or `neutral` means the neutral culture.
    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = normalize_culture(culture.into());
        self
    }

    pub fn with_public_key_token(mut self, token: PublicKeyToken) -> Self {
        self.public_key_token = Some(token);
        self
    }

    #[doc(hidden)]
    pub fn from_package(name: &str, major: &str, minor: &str, patch: &str) -> Self {
        let component = |s: &str| s.parse::<u32>().unwrap_or(0);
        Self::new(
            name,
            Version::new(component(major), component(minor), component(patch), 0),
        )
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Culture name; empty for the neutral culture.
    #[inline]
    pub fn culture(&self) -> &str {
        &self.culture
    }

    #[inline]
    pub fn is_neutral_culture(&self) -> bool {
        self.culture.is_empty()
    }

    /// The key token, if the assembly is signed.
    ///
    /// An explicitly supplied empty token is reported as `None`.
    #[inline]
    pub fn public_key_token(&self) -> Option<&PublicKeyToken> {
        self.public_key_token.as_ref().filter(|t| !t.is_empty())
    }
}

impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, Version={}, Culture={}, PublicKeyToken=",
            self.name,
            self.version,
            culture_label(&self.culture)
        )?;
        match self.public_key_token() {
            Some(token) => write!(f, "{}", token),
            None => f.write_str("null"),
        }
    }
}

/// Expands to the [`AssemblyIdentity`] of the crate the macro is invoked in.
///
/// Name and `major.minor.patch.0` version come from Cargo's package metadata;
/// the culture is neutral and no key token is set.
///
/// ```rust
/// let me = facility_overrides::assembly_identity!();
/// assert_eq!(me.name(), "facility_overrides");
/// ```
#[macro_export]
macro_rules! assembly_identity {
    () => {
        $crate::AssemblyIdentity::from_package(
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION_MAJOR"),
            env!("CARGO_PKG_VERSION_MINOR"),
            env!("CARGO_PKG_VERSION_PATCH"),
        )
    };
}

// ============================================================================
// Match Outcome
// ============================================================================

/// Which attribute disagreed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mismatch {
    Name,
    Version,
    Culture,
    PublicKeyToken,
}

impl Mismatch {
    /// Negative sentinel reported by [`AssemblyDescriptor::match_score`].
    #[inline]
    pub const fn sentinel(self) -> i32 {
        match self {
            Self::Name => -1,
            Self::Version => -2,
            Self::Culture => -3,
            Self::PublicKeyToken => -4,
        }
    }
}

/// Result of scoring a descriptor against an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOutcome {
    /// Every specified attribute agreed; score is 0 (pure wildcard) to 15.
    Matched(u8),
    /// An attribute disagreed; evaluation stopped there.
    Mismatch(Mismatch),
}

impl MatchOutcome {
    /// Integer form: the score, or the mismatch sentinel.
    #[inline]
    pub const fn score(self) -> i32 {
        match self {
            Self::Matched(score) => score as i32,
            Self::Mismatch(kind) => kind.sentinel(),
        }
    }

    #[inline]
    pub const fn is_match(self) -> bool {
        matches!(self, Self::Matched(_))
    }
}

// ============================================================================
// Descriptor
// ============================================================================

/// A partially specified assembly name used as a lookup pattern.
///
/// `None` means "any value". For the culture, `Some("")` is the neutral
/// culture, which is not the same as an unspecified culture.
///
/// Equality compares attribute by attribute: both sides must agree on which
/// attributes are specified, names and cultures compare case-insensitively,
/// and key tokens compare byte-wise. Equality is what override stores use to
/// detect duplicates; matching is what they use for lookup.
#[derive(Debug, Clone, Default)]
pub struct AssemblyDescriptor {
    name: Option<String>,
    version: Option<Version>,
    culture: Option<String>,
    public_key_token: Option<PublicKeyToken>,
}

impl AssemblyDescriptor {
    /// Descriptor with nothing specified; matches every assembly with score 0.
    #[inline]
    pub fn any() -> Self {
        Self::default()
    }

    /// Descriptor pinning only the name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Parse the string grammar described in the module docs.
    ///
    /// An empty (or all-whitespace) input yields a descriptor whose name is
    /// specified as the empty string. That descriptor is *not* a wildcard: it
    /// only matches assemblies with an empty name.
    ///
    /// # Errors
    ///
    /// [`OverrideError::InvalidAssemblyName`] for structural problems,
    /// [`OverrideError::InvalidVersion`] and
    /// [`OverrideError::InvalidPublicKeyToken`] for malformed values.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason| OverrideError::InvalidAssemblyName {
            input: input.to_owned(),
            reason,
        };

        if input.trim().is_empty() {
            return Ok(Self::named(String::new()));
        }

        let mut fragments = split_fragments(input).map_err(invalid)?.into_iter();
        let name = fragments.next().unwrap_or_default();
        if name.value.is_some() {
            return Err(invalid("assembly name must come first"));
        }
        if name.key.is_empty() {
            return Err(invalid("assembly name is empty"));
        }

        let mut descriptor = Self::named(name.key);
        let mut seen = [false; 3];

        for fragment in fragments {
            let Some(value) = fragment.value else {
                return Err(invalid("expected `Key=Value` after the assembly name"));
            };
            let key = fragment.key.as_str();

            let attribute = if key.eq_ignore_ascii_case("Version") {
                NamedAttribute::Version
            } else if key.eq_ignore_ascii_case("Culture") {
                NamedAttribute::Culture
            } else if key.eq_ignore_ascii_case("PublicKeyToken") {
                NamedAttribute::PublicKeyToken
            } else {
                tracing::trace!(key, "ignoring unrecognized assembly name attribute");
                continue;
            };

            let slot = &mut seen[attribute as usize];
            if *slot {
                return Err(invalid("attribute specified more than once"));
            }
            *slot = true;

            match attribute {
                NamedAttribute::Version => descriptor.version = Some(value.parse()?),
                NamedAttribute::Culture => descriptor.culture = Some(normalize_culture(value)),
                NamedAttribute::PublicKeyToken => {
                    descriptor.public_key_token = Some(value.parse()?)
                }
            }
        }

        Ok(descriptor)
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Pin the culture; empty or `neutral` pins the neutral culture.
    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = Some(normalize_culture(culture.into()));
        self
    }

    pub fn with_public_key_token(mut self, token: PublicKeyToken) -> Self {
        self.public_key_token = Some(token);
        self
    }

    /// Replace the key token after construction.
    pub fn set_public_key_token(&mut self, token: Option<PublicKeyToken>) {
        self.public_key_token = token;
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// Specified culture; `Some("")` is the neutral culture.
    #[inline]
    pub fn culture(&self) -> Option<&str> {
        self.culture.as_deref()
    }

    #[inline]
    pub fn public_key_token(&self) -> Option<&PublicKeyToken> {
        self.public_key_token.as_ref()
    }

    /// True when no attribute is specified.
    #[inline]
    pub fn is_wildcard(&self) -> bool {
        self.name.is_none()
            && self.version.is_none()
            && self.culture.is_none()
            && self.public_key_token.is_none()
    }

    /// Score this descriptor against a concrete identity.
    ///
    /// Attributes are checked in weight order and the first disagreement
    /// returns immediately, so no partial credit is ever given. A key token
    /// only agrees when the identity is signed with exactly those bytes.
    pub fn evaluate(&self, identity: &AssemblyIdentity) -> MatchOutcome {
        let mut score = 0;

        if let Some(name) = &self.name {
            if !eq_ignore_case(name, identity.name()) {
                return MatchOutcome::Mismatch(Mismatch::Name);
            }
            score += NAME_WEIGHT;
        }

        if let Some(version) = &self.version {
            if !version.covers(identity.version()) {
                return MatchOutcome::Mismatch(Mismatch::Version);
            }
            score += VERSION_WEIGHT;
        }

        if let Some(culture) = &self.culture {
            if !eq_ignore_case(culture, identity.culture()) {
                return MatchOutcome::Mismatch(Mismatch::Culture);
            }
            score += CULTURE_WEIGHT;
        }

        if let Some(token) = &self.public_key_token {
            if identity.public_key_token() != Some(token) {
                return MatchOutcome::Mismatch(Mismatch::PublicKeyToken);
            }
            score += PUBLIC_KEY_TOKEN_WEIGHT;
        }

        MatchOutcome::Matched(score)
    }

    /// Integer form of [`evaluate`](Self::evaluate): 0..=15, or -1..=-4.
    #[inline]
    pub fn match_score(&self, identity: &AssemblyIdentity) -> i32 {
        self.evaluate(identity).score()
    }

    /// True when every specified attribute agrees.
    #[inline]
    pub fn is_match(&self, identity: &AssemblyIdentity) -> bool {
        self.evaluate(identity).is_match()
    }
}

impl FromStr for AssemblyDescriptor {
    type Err = OverrideError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&AssemblyIdentity> for AssemblyDescriptor {
    /// Pins every attribute of the identity. An unsigned identity leaves the
    /// key token unspecified.
    fn from(identity: &AssemblyIdentity) -> Self {
        Self {
            name: Some(identity.name.clone()),
            version: Some(identity.version),
            culture: Some(identity.culture.clone()),
            public_key_token: identity.public_key_token().cloned(),
        }
    }
}

impl PartialEq for AssemblyDescriptor {
    fn eq(&self, other: &Self) -> bool {
        fn same_text(a: &Option<String>, b: &Option<String>) -> bool {
            match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => eq_ignore_case(a, b),
                _ => false,
            }
        }

        same_text(&self.name, &other.name)
            && self.version == other.version
            && same_text(&self.culture, &other.culture)
            && self.public_key_token == other.public_key_token
    }
}

impl Eq for AssemblyDescriptor {}

impl fmt::Display for AssemblyDescriptor {
    /// Renders only the specified attributes, in grammar order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        if let Some(name) = &self.name {
            write_escaped(f, name)?;
            sep = ", ";
        }
        if let Some(version) = &self.version {
            write!(f, "{}Version={}", sep, version)?;
            sep = ", ";
        }
        if let Some(culture) = &self.culture {
            write!(f, "{}Culture=", sep)?;
            write_escaped(f, culture_label(culture))?;
            sep = ", ";
        }
        if let Some(token) = &self.public_key_token {
            write!(f, "{}PublicKeyToken={}", sep, token)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum NamedAttribute {
    Version = 0,
    Culture = 1,
    PublicKeyToken = 2,
}

/// One comma-separated piece of a descriptor string, unescaped.
#[derive(Debug, Default)]
struct Fragment {
    key: String,
    value: Option<String>,
}

/// Text accumulator that trims unescaped whitespace at both ends.
#[derive(Default)]
struct Piece {
    text: String,
    keep: usize,
}

impl Piece {
    fn push(&mut self, c: char) {
        if !(self.text.is_empty() && c.is_whitespace()) {
            self.text.push(c);
        }
    }

    fn push_escaped(&mut self, c: char) {
        self.text.push(c);
        self.keep = self.text.len();
    }

    fn finish(mut self) -> String {
        let end = self.text.trim_end().len().max(self.keep);
        self.text.truncate(end);
        self.text
    }
}

/// Split on unescaped commas; the first unescaped `=` of a piece separates
/// key from value.
fn split_fragments(input: &str) -> std::result::Result<Vec<Fragment>, &'static str> {
    let mut fragments = Vec::new();
    let mut key: Option<String> = None;
    let mut current = Piece::default();
    let mut chars = input.chars();

    let close = |key: Option<String>, piece: Piece| match key {
        Some(key) => Fragment {
            key,
            value: Some(piece.finish()),
        },
        None => Fragment {
            key: piece.finish(),
            value: None,
        },
    };

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next().ok_or("dangling escape at end of input")?;
                current.push_escaped(escaped);
            }
            ',' => fragments.push(close(key.take(), std::mem::take(&mut current))),
            '=' if key.is_none() => key = Some(std::mem::take(&mut current).finish()),
            _ => current.push(c),
        }
    }
    fragments.push(close(key, current));
    Ok(fragments)
}

/// Write `text` so that [`split_fragments`] reads it back unchanged.
fn write_escaped(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    let start = text.len() - text.trim_start().len();
    let end = text.trim_end().len();
    for (index, c) in text.char_indices() {
        let edge_space = c.is_whitespace() && (index < start || index >= end);
        if edge_space || matches!(c, '\\' | ',' | '=') {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}

fn normalize_culture(culture: String) -> String {
    if culture.eq_ignore_ascii_case(NEUTRAL_CULTURE) {
        String::new()
    } else {
        culture
    }
}

#[inline]
fn culture_label(culture: &str) -> &str {
    if culture.is_empty() {
        NEUTRAL_CULTURE
    } else {
        culture
    }
}

/// Case-insensitive ordinal comparison.
fn eq_ignore_case(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    a.chars()
        .flat_map(char::to_uppercase)
        .eq(b.chars().flat_map(char::to_uppercase))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: [u8; 8] = [0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89];

    fn widgets() -> AssemblyIdentity {
        AssemblyIdentity::new("Acme.Widgets", Version::new(1, 2, 3, 4))
            .with_public_key_token(PublicKeyToken::new(TOKEN))
    }

    fn full_descriptor() -> AssemblyDescriptor {
        AssemblyDescriptor::named("Acme.Widgets")
            .with_version(Version::new(1, 2, 3, 4))
            .with_culture("")
            .with_public_key_token(PublicKeyToken::new(TOKEN))
    }

    // ========================================================================
    // Scoring
    // ========================================================================

    #[test]
    fn wildcard_scores_zero() {
        assert_eq!(AssemblyDescriptor::any().match_score(&widgets()), 0);
        assert!(AssemblyDescriptor::any().is_wildcard());
    }

    #[test]
    fn full_match_scores_max() {
        assert_eq!(full_descriptor().match_score(&widgets()), MAX_SCORE as i32);
        assert_eq!(MAX_SCORE, 15);
    }

    #[test]
    fn weights_accumulate_per_attribute() {
        let id = widgets();
        assert_eq!(AssemblyDescriptor::named("Acme.Widgets").match_score(&id), 8);
        assert_eq!(
            AssemblyDescriptor::any()
                .with_version(Version::new(1, 2, 3, 4))
                .match_score(&id),
            4
        );
        assert_eq!(AssemblyDescriptor::any().with_culture("neutral").match_score(&id), 2);
        assert_eq!(
            AssemblyDescriptor::any()
                .with_public_key_token(PublicKeyToken::new(TOKEN))
                .match_score(&id),
            1
        );
    }

    #[test]
    fn name_outranks_everything_else() {
        let id = widgets();
        let by_name = AssemblyDescriptor::named("acme.widgets");
        let by_rest = AssemblyDescriptor::any()
            .with_version(Version::new(1, 2, 3, 4))
            .with_culture("")
            .with_public_key_token(PublicKeyToken::new(TOKEN));
        assert!(by_name.match_score(&id) > by_rest.match_score(&id));
    }

    #[test]
    fn mismatch_sentinels_are_distinct() {
        let id = widgets();
        assert_eq!(AssemblyDescriptor::named("Other").match_score(&id), -1);
        assert_eq!(
            AssemblyDescriptor::any()
                .with_version(Version::new(9, 0, 0, 0))
                .match_score(&id),
            -2
        );
        assert_eq!(AssemblyDescriptor::any().with_culture("fr-FR").match_score(&id), -3);
        assert_eq!(
            AssemblyDescriptor::any()
                .with_public_key_token(PublicKeyToken::new([1, 2, 3, 4, 5, 6, 7, 8]))
                .match_score(&id),
            -4
        );
    }

    #[test]
    fn name_mismatch_short_circuits() {
        // Everything but the name would match
        let descriptor = AssemblyDescriptor::named("Other")
            .with_version(Version::new(1, 2, 3, 4))
            .with_culture("")
            .with_public_key_token(PublicKeyToken::new(TOKEN));
        assert_eq!(
            descriptor.evaluate(&widgets()),
            MatchOutcome::Mismatch(Mismatch::Name)
        );
    }

    #[test]
    fn neutral_culture_matches_neutral_identity_only() {
        let neutral = AssemblyDescriptor::any().with_culture(NEUTRAL_CULTURE);
        assert!(neutral.is_match(&widgets()));
        assert!(!neutral.is_match(&widgets().with_culture("de-DE")));

        let german = AssemblyDescriptor::any().with_culture("DE-de");
        assert!(german.is_match(&widgets().with_culture("de-DE")));
    }

    #[test]
    fn key_token_requires_signed_identity() {
        let unsigned = AssemblyIdentity::new("Acme.Widgets", Version::new(1, 2, 3, 4));
        let descriptor = AssemblyDescriptor::any().with_public_key_token(PublicKeyToken::new(TOKEN));
        assert_eq!(descriptor.match_score(&unsigned), -4);

        let empty = AssemblyDescriptor::any().with_public_key_token(PublicKeyToken::default());
        assert_eq!(empty.match_score(&unsigned), -4);
    }

    #[test]
    fn partial_version_components_are_open() {
        let id = widgets();
        assert!(AssemblyDescriptor::any().with_version(Version::major_minor(1, 2)).is_match(&id));
        assert!(AssemblyDescriptor::any().with_version(Version::with_build(1, 2, 3)).is_match(&id));
        assert!(!AssemblyDescriptor::any().with_version(Version::with_build(1, 2, 9)).is_match(&id));
        assert!(!AssemblyDescriptor::any().with_version(Version::major_minor(1, 3)).is_match(&id));
    }

    #[test]
    fn non_ascii_names_compare_case_insensitively() {
        let id = AssemblyIdentity::new("Über.Lib", Version::new(1, 0, 0, 0));
        assert!(AssemblyDescriptor::named("über.lib").is_match(&id));
    }

    // ========================================================================
    // Parsing & Rendering
    // ========================================================================

    #[test]
    fn parse_partial_name() {
        let d: AssemblyDescriptor = "MyAssembly".parse().unwrap();
        assert_eq!(d.name(), Some("MyAssembly"));
        assert!(d.version().is_none());
        assert!(d.culture().is_none());
        assert!(d.public_key_token().is_none());
    }

    #[test]
    fn parse_full_name() {
        let d = AssemblyDescriptor::parse(
            "Acme.Widgets, Version=1.2.3.4, Culture=neutral, PublicKeyToken=0xB77A5C561934E089",
        )
        .unwrap();
        assert_eq!(d, full_descriptor());
    }

    #[test]
    fn parse_keys_case_insensitive_and_unknown_ignored() {
        let d = AssemblyDescriptor::parse(
            "Acme, version=2.0, processorArchitecture=MSIL, culture=en-US",
        )
        .unwrap();
        assert_eq!(d.version(), Some(&Version::major_minor(2, 0)));
        assert_eq!(d.culture(), Some("en-US"));
    }

    #[test]
    fn parse_rejects_malformed_values() {
        let cases = [
            "Acme, Version=1",
            "Acme, Version=1.2.3.4.5",
            "Acme, Version=1.x",
            "Acme, Version=-1.0",
            "Acme, PublicKeyToken=abc",
            "Acme, PublicKeyToken=zz",
        ];
        for case in cases {
            let err = AssemblyDescriptor::parse(case).unwrap_err();
            assert!(err.is_format(), "{case}: {err}");
        }
    }

    #[test]
    fn parse_rejects_structural_problems() {
        for case in ["Acme, Version", ", Version=1.0", "Version=1.0", "Acme, Culture=a, Culture=b", "Acme,"] {
            assert!(
                matches!(
                    AssemblyDescriptor::parse(case),
                    Err(OverrideError::InvalidAssemblyName { .. })
                ),
                "{case}"
            );
        }
    }

    #[test]
    fn empty_input_pins_empty_name() {
        let d = AssemblyDescriptor::parse("  ").unwrap();
        assert_eq!(d.name(), Some(""));
        assert!(!d.is_wildcard());
        assert_eq!(d.match_score(&widgets()), -1);
    }

    #[test]
    fn display_renders_specified_attributes_in_order() {
        assert_eq!(AssemblyDescriptor::any().to_string(), "");
        assert_eq!(
            full_descriptor().to_string(),
            "Acme.Widgets, Version=1.2.3.4, Culture=neutral, PublicKeyToken=b77a5c561934e089"
        );
        assert_eq!(
            AssemblyDescriptor::named("A").with_culture("fr").to_string(),
            "A, Culture=fr"
        );
    }

    #[test]
    fn display_parse_round_trip() {
        let original = full_descriptor();
        let reparsed: AssemblyDescriptor = original.to_string().parse().unwrap();
        assert_eq!(reparsed, original);
    }

    #[test]
    fn names_with_separators_round_trip() {
        for name in ["Acme, Inc", "a=b", r"C:\lib", " Padded ", "\t", "x,=\\"] {
            let original = AssemblyDescriptor::named(name).with_version(Version::major_minor(1, 0));
            let rendered = original.to_string();
            let reparsed = AssemblyDescriptor::parse(&rendered).unwrap();
            assert_eq!(reparsed.name(), Some(name), "{rendered:?}");
            assert_eq!(reparsed, original);

            let bare = AssemblyDescriptor::named(name);
            assert_eq!(AssemblyDescriptor::parse(&bare.to_string()).unwrap(), bare);
        }
        assert_eq!(
            AssemblyDescriptor::named("Acme, Inc").to_string(),
            r"Acme\, Inc"
        );
    }

    #[test]
    fn escapes_are_honoured_when_parsing() {
        let d = AssemblyDescriptor::parse(r"Acme\=Co\ , Culture=fr").unwrap();
        assert_eq!(d.name(), Some("Acme=Co "));
        assert_eq!(d.culture(), Some("fr"));

        assert!(matches!(
            AssemblyDescriptor::parse(r"Acme\"),
            Err(OverrideError::InvalidAssemblyName { .. })
        ));
    }

    #[test]
    fn null_token_round_trips_as_empty() {
        let d = AssemblyDescriptor::parse("Acme, PublicKeyToken=null").unwrap();
        assert_eq!(d.public_key_token(), Some(&PublicKeyToken::default()));
        assert_eq!(d.to_string(), "Acme, PublicKeyToken=null");
    }

    // ========================================================================
    // Equality
    // ========================================================================

    #[test]
    fn equality_requires_same_specified_attributes() {
        let a = AssemblyDescriptor::named("Acme");
        let b = AssemblyDescriptor::named("ACME");
        let c = AssemblyDescriptor::named("Acme").with_culture("");
        assert_eq!(a, b);
        assert_ne!(a, c);
        // Unspecified culture and neutral culture are different states
        assert_ne!(AssemblyDescriptor::any(), AssemblyDescriptor::any().with_culture(""));
    }

    #[test]
    fn descriptor_from_identity_pins_everything() {
        let id = widgets();
        let d = AssemblyDescriptor::from(&id);
        assert_eq!(d, full_descriptor());
        assert_eq!(d.match_score(&id), MAX_SCORE as i32);

        let unsigned = AssemblyIdentity::new("Lib", Version::new(1, 0, 0, 0));
        assert!(AssemblyDescriptor::from(&unsigned).public_key_token().is_none());
    }

    #[test]
    fn identity_display_is_fully_qualified() {
        assert_eq!(
            widgets().with_culture("en-US").to_string(),
            "Acme.Widgets, Version=1.2.3.4, Culture=en-US, PublicKeyToken=b77a5c561934e089"
        );
    }

    #[test]
    fn macro_reads_package_metadata() {
        let me = crate::assembly_identity!();
        assert_eq!(me.name(), env!("CARGO_PKG_NAME"));
        assert_eq!(me.version().revision(), Some(0));
        assert!(me.is_neutral_culture());
        assert!(me.public_key_token().is_none());
    }
}
