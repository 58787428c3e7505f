//! Loading override tables from XML and JSON documents.
//!
//! Both formats describe the same thing: a list of entries, each with an
//! optional `assemblyName` and a value field (`isEnabled` for debug mode,
//! `identifier` for facility overrides).
//!
//! ```xml
//! <debugModes>
//!   <assembly assemblyName="Acme.Widgets" isEnabled="true" />
//!   <assembly assemblyName="Acme.Legacy, Version=1.0" isEnabled="false" />
//!   <assembly />  <!-- every other assembly: isEnabled defaults to true -->
//! </debugModes>
//! ```
//!
//! ```json
//! { "facilities": [
//!     { "assemblyName": "Acme.Widgets", "identifier": 42 },
//!     { "identifier": 1 }
//! ] }
//! ```
//!
//! A missing or empty `assemblyName` yields the wildcard descriptor, which is
//! how a document sets a default for every assembly.
//!
//! # All-or-Nothing
//!
//! Every load parses and validates the whole document before touching the
//! store, then commits all entries with a single
//! [`add_range`](crate::OverrideStore::add_range). A rejected document leaves
//! the store exactly as it was.

use crate::codes::FacilityId;
use crate::error::{OverrideError, Result};
use crate::identity::AssemblyDescriptor;
use crate::store::{OverrideEntry, OverrideStore};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Attribute/field holding the assembly name.
pub const ASSEMBLY_NAME_FIELD: &str = "assemblyName";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ============================================================================
// Value Parsing
// ============================================================================

/// A value type that override documents can carry.
pub trait OverrideValue: Sized + Send + Sync + 'static {
    /// Attribute/field carrying the value.
    const FIELD: &'static str;

    /// File stem of the default document in the working directory.
    const DEFAULT_FILE_STEM: &'static str;

    /// Value for entries that omit [`FIELD`](Self::FIELD); `None` makes the
    /// field required.
    fn default_value() -> Option<Self>;

    /// Parse the textual form found in entry number `entry`.
    fn parse_value(text: &str, entry: usize) -> Result<Self>;
}

impl OverrideValue for bool {
    const FIELD: &'static str = "isEnabled";
    const DEFAULT_FILE_STEM: &'static str = "DebugModeOverrides";

    #[inline]
    fn default_value() -> Option<Self> {
        Some(true)
    }

    fn parse_value(text: &str, entry: usize) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if trimmed.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(invalid_value::<Self>(text, entry))
        }
    }
}

impl OverrideValue for FacilityId {
    const FIELD: &'static str = "identifier";
    const DEFAULT_FILE_STEM: &'static str = "FacilityOverrides";

    #[inline]
    fn default_value() -> Option<Self> {
        None
    }

    fn parse_value(text: &str, entry: usize) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid_value::<Self>(text, entry));
        }
        let raw: u32 = trimmed
            .parse()
            .map_err(|_| invalid_value::<Self>(text, entry))?;
        Ok(FacilityId::checked_new(raw)?)
    }
}

fn invalid_value<V: OverrideValue>(text: &str, entry: usize) -> OverrideError {
    OverrideError::InvalidValue {
        entry,
        field: V::FIELD,
        value: text.to_owned(),
    }
}

// ============================================================================
// Source Format
// ============================================================================

/// Document syntax of an override source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    #[cfg(feature = "xml")]
    Xml,
    #[cfg(feature = "json")]
    Json,
}

impl SourceFormat {
    /// Every format compiled into this build, in default-file lookup order.
    pub const ALL: &'static [SourceFormat] = &[
        #[cfg(feature = "xml")]
        SourceFormat::Xml,
        #[cfg(feature = "json")]
        SourceFormat::Json,
    ];

    /// File extension without the dot.
    pub const fn extension(self) -> &'static str {
        match self {
            #[cfg(feature = "xml")]
            Self::Xml => "xml",
            #[cfg(feature = "json")]
            Self::Json => "json",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            #[cfg(feature = "xml")]
            Self::Xml => "XML",
            #[cfg(feature = "json")]
            Self::Json => "JSON",
        }
    }

    /// Infer the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        Self::ALL
            .iter()
            .copied()
            .find(|format| extension.eq_ignore_ascii_case(format.extension()))
    }
}

/// Name of the default override document for `V` in `format`.
pub fn default_file_name<V: OverrideValue>(format: SourceFormat) -> String {
    format!("{}.{}", V::DEFAULT_FILE_STEM, format.extension())
}

// ============================================================================
// Document Parsing
// ============================================================================

/// One entry as written in the document, before validation.
#[derive(Debug, Default)]
struct RawEntry {
    assembly_name: Option<String>,
    value: Option<String>,
}

impl RawEntry {
    fn into_entry<V: OverrideValue>(self, index: usize) -> Result<OverrideEntry<V>> {
        let descriptor = match self.assembly_name.as_deref().map(str::trim) {
            None | Some("") => AssemblyDescriptor::any(),
            Some(name) => AssemblyDescriptor::parse(name)?,
        };
        let value = match self.value {
            Some(text) => V::parse_value(&text, index)?,
            None => V::default_value().ok_or(OverrideError::MissingField {
                entry: index,
                field: V::FIELD,
            })?,
        };
        Ok(OverrideEntry::new(descriptor, value))
    }
}

/// Parse and validate a whole document without touching any store.
///
/// # Errors
///
/// Fails on the first malformed entry; no entries are returned in that case.
pub fn parse_overrides<V: OverrideValue>(
    text: &str,
    format: SourceFormat,
) -> Result<Vec<OverrideEntry<V>>> {
    let raw = match format {
        #[cfg(feature = "xml")]
        SourceFormat::Xml => xml::parse(text, V::FIELD)?,
        #[cfg(feature = "json")]
        SourceFormat::Json => json::parse(text, V::FIELD)?,
    };
    raw.into_iter()
        .enumerate()
        .map(|(index, entry)| entry.into_entry(index))
        .collect()
}

fn malformed(format: SourceFormat, message: &'static str) -> OverrideError {
    OverrideError::document(format.label(), io::Error::new(io::ErrorKind::InvalidData, message))
}

#[cfg(feature = "xml")]
mod xml {
    use super::{RawEntry, SourceFormat, malformed, ASSEMBLY_NAME_FIELD};
    use crate::error::{OverrideError, Result};
    use quick_xml::Reader;
    use quick_xml::events::{BytesStart, Event};

    /// Direct children of the root element are entries; deeper nesting is ignored.
    pub(super) fn parse(text: &str, value_field: &str) -> Result<Vec<RawEntry>> {
        let mut reader = Reader::from_str(text);
        reader.trim_text(true);

        let mut entries = Vec::new();
        let mut depth = 0usize;
        let mut saw_root = false;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| OverrideError::document("XML", e))?;
            match event {
                Event::Start(element) => {
                    if depth == 0 && saw_root {
                        return Err(malformed(SourceFormat::Xml, "more than one root element"));
                    }
                    if depth == 1 {
                        entries.push(read_entry(&element, value_field)?);
                    }
                    saw_root = true;
                    depth += 1;
                }
                Event::Empty(element) => {
                    if depth == 0 && saw_root {
                        return Err(malformed(SourceFormat::Xml, "more than one root element"));
                    }
                    if depth == 1 {
                        entries.push(read_entry(&element, value_field)?);
                    }
                    saw_root = true;
                }
                Event::End(_) => depth = depth.saturating_sub(1),
                Event::Text(_) | Event::CData(_) if depth == 0 => {
                    return Err(malformed(SourceFormat::Xml, "text outside the root element"));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_root {
            return Err(malformed(SourceFormat::Xml, "missing root element"));
        }
        if depth != 0 {
            return Err(malformed(SourceFormat::Xml, "unclosed element"));
        }
        Ok(entries)
    }

    fn read_entry(element: &BytesStart<'_>, value_field: &str) -> Result<RawEntry> {
        let mut entry = RawEntry::default();
        for attribute in element.attributes() {
            let attribute = attribute.map_err(|e| OverrideError::document("XML", e))?;
            let key = attribute.key.local_name();
            let key = key.as_ref();

            let slot = if key.eq_ignore_ascii_case(ASSEMBLY_NAME_FIELD.as_bytes()) {
                &mut entry.assembly_name
            } else if key.eq_ignore_ascii_case(value_field.as_bytes()) {
                &mut entry.value
            } else {
                continue;
            };
            let value = attribute
                .unescape_value()
                .map_err(|e| OverrideError::document("XML", e))?;
            *slot = Some(value.into_owned());
        }
        Ok(entry)
    }
}

#[cfg(feature = "json")]
mod json {
    use super::{ASSEMBLY_NAME_FIELD, RawEntry, SourceFormat, malformed};
    use crate::error::{OverrideError, Result};
    use serde::Deserialize;
    use serde_json::{Map, Value};

    /// Entries are plain objects; field names are matched case-insensitively.
    #[derive(Deserialize)]
    #[serde(transparent)]
    struct JsonEntry {
        fields: Map<String, Value>,
    }

    impl JsonEntry {
        fn get(&self, name: &str) -> Option<&Value> {
            self.fields.get(name).or_else(|| {
                self.fields
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value)
            })
        }
    }

    /// Accepts a top-level array of entries, or an object whose array-valued
    /// properties hold entries (taken in document order).
    pub(super) fn parse(text: &str, value_field: &'static str) -> Result<Vec<RawEntry>> {
        let document: Value =
            serde_json::from_str(text).map_err(|e| OverrideError::document("JSON", e))?;

        let lists: Vec<Value> = match document {
            Value::Array(items) => vec![Value::Array(items)],
            Value::Object(sections) => {
                let lists: Vec<Value> = sections
                    .into_iter()
                    .map(|(_, section)| section)
                    .filter(Value::is_array)
                    .collect();
                if lists.is_empty() {
                    return Err(malformed(
                        SourceFormat::Json,
                        "object holds no array of override entries",
                    ));
                }
                lists
            }
            _ => {
                return Err(malformed(
                    SourceFormat::Json,
                    "expected an array or an object of override entries",
                ));
            }
        };

        let mut entries = Vec::new();
        for list in lists {
            let parsed: Vec<JsonEntry> =
                serde_json::from_value(list).map_err(|e| OverrideError::document("JSON", e))?;
            for item in parsed {
                let index = entries.len();
                entries.push(RawEntry {
                    assembly_name: name_text(&item, index)?,
                    value: value_text(&item, value_field, index)?,
                });
            }
        }
        Ok(entries)
    }

    fn name_text(entry: &JsonEntry, index: usize) -> Result<Option<String>> {
        match entry.get(ASSEMBLY_NAME_FIELD) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(other) => Err(OverrideError::InvalidValue {
                entry: index,
                field: ASSEMBLY_NAME_FIELD,
                value: other.to_string(),
            }),
        }
    }

    fn value_text(entry: &JsonEntry, name: &'static str, index: usize) -> Result<Option<String>> {
        match entry.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(flag)) => Ok(Some(flag.to_string())),
            Some(Value::Number(number)) => Ok(Some(number.to_string())),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(other) => Err(OverrideError::InvalidValue {
                entry: index,
                field: name,
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Store Extension
// ============================================================================

/// Load override documents into an [`OverrideStore`].
///
/// Every method returns the number of entries committed.
pub trait LoadOverrides {
    /// Load the default documents from the working directory.
    ///
    /// Looks for `<stem>.xml` and `<stem>.json` (e.g. `DebugModeOverrides.xml`)
    /// and silently skips files that do not exist.
    fn load_default(&self) -> Result<usize>;

    /// Load a file, inferring the format from its extension.
    fn load_file(&self, path: impl AsRef<Path>) -> Result<usize>;

    /// Load a file in an explicit format.
    fn load_file_as(&self, path: impl AsRef<Path>, format: SourceFormat) -> Result<usize>;

    /// Load from a byte stream or text reader, consuming it to the end.
    fn load_reader<R: Read>(&self, reader: R, format: SourceFormat) -> Result<usize>;

    /// Load from an in-memory UTF-8 buffer (a leading BOM is skipped).
    fn load_bytes(&self, bytes: &[u8], format: SourceFormat) -> Result<usize>;

    /// Load from an already-decoded document.
    fn load_str(&self, text: &str, format: SourceFormat) -> Result<usize>;
}

impl<V: OverrideValue> LoadOverrides for OverrideStore<V> {
    fn load_default(&self) -> Result<usize> {
        load_defaults_in(self, Path::new(""))
    }

    fn load_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let format = SourceFormat::from_path(path)
            .ok_or(OverrideError::MissingArgument { name: "format" })?;
        self.load_file_as(path, format)
    }

    fn load_file_as(&self, path: impl AsRef<Path>, format: SourceFormat) -> Result<usize> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(OverrideError::MissingArgument { name: "path" });
        }
        let source = path.display().to_string();
        let bytes = fs::read(path).map_err(|e| OverrideError::io(source.clone(), e))?;
        apply(self, &bytes, format, &source)
    }

    fn load_reader<R: Read>(&self, mut reader: R, format: SourceFormat) -> Result<usize> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| OverrideError::io("<reader>", e))?;
        apply(self, &bytes, format, "<reader>")
    }

    fn load_bytes(&self, bytes: &[u8], format: SourceFormat) -> Result<usize> {
        apply(self, bytes, format, "<bytes>")
    }

    fn load_str(&self, text: &str, format: SourceFormat) -> Result<usize> {
        commit(self, parse_overrides(text, format)?, format, "<string>")
    }
}

/// Every default document present in `dir` is validated before any entry is
/// committed, and all of them land in one `add_range`.
fn load_defaults_in<V: OverrideValue>(store: &OverrideStore<V>, dir: &Path) -> Result<usize> {
    let mut entries = Vec::new();
    for &format in SourceFormat::ALL {
        let path = dir.join(default_file_name::<V>(format));
        let source = path.display().to_string();
        match fs::read(&path) {
            Ok(bytes) => entries.extend(parse_bytes::<V>(&bytes, format, &source)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::trace!(file = %source, "no default override document");
            }
            Err(e) => return Err(OverrideError::io(source, e)),
        }
    }
    let committed = store.add_range(entries)?;
    tracing::debug!(committed, "default override documents loaded");
    Ok(committed)
}

fn parse_bytes<V: OverrideValue>(
    bytes: &[u8],
    format: SourceFormat,
    source: &str,
) -> Result<Vec<OverrideEntry<V>>> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let text = std::str::from_utf8(bytes)
        .map_err(|e| OverrideError::io(source, io::Error::new(io::ErrorKind::InvalidData, e)))?;
    parse_overrides(text, format)
}

fn apply<V: OverrideValue>(
    store: &OverrideStore<V>,
    bytes: &[u8],
    format: SourceFormat,
    source: &str,
) -> Result<usize> {
    let entries = parse_bytes::<V>(bytes, format, source)?;
    commit(store, entries, format, source)
}

fn commit<V: OverrideValue>(
    store: &OverrideStore<V>,
    entries: Vec<OverrideEntry<V>>,
    format: SourceFormat,
    source: &str,
) -> Result<usize> {
    let committed = store.add_range(entries)?;
    tracing::debug!(source, format = format.label(), committed, "override document loaded");
    Ok(committed)
}
