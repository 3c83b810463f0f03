//! Core types for extract-orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::resolver::split_path;
use crate::session::ArchiveReader;

/// Item properties the session reads from the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropId {
    /// Raw item path inside the archive
    Path,
    /// Directory flag
    IsDir,
    /// Byte offset of a split-volume continuation fragment
    Position,
    /// Encrypted flag
    Encrypted,
    /// Declared decoded size
    Size,
    /// Attribute word
    Attrib,
    /// Creation time
    CTime,
    /// Access time
    ATime,
    /// Modification time
    MTime,
    /// Deletion marker flag
    IsAnti,
}

/// A property value as supplied by the engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropValue {
    /// Property not defined for this item
    Empty,
    /// Boolean flag
    Bool(bool),
    /// 32-bit unsigned integer
    U32(u32),
    /// 64-bit unsigned integer
    U64(u64),
    /// String value
    Str(String),
    /// Timestamp
    Time(DateTime<Utc>),
}

impl PropValue {
    fn type_error(index: u32, property: PropId, expected: &'static str) -> Error {
        Error::InvalidPropertyType {
            index,
            property,
            expected,
        }
    }

    /// Interpret as a flag, treating `Empty` as false
    pub fn into_bool(self, index: u32, property: PropId) -> Result<bool> {
        match self {
            PropValue::Empty => Ok(false),
            PropValue::Bool(b) => Ok(b),
            _ => Err(Self::type_error(index, property, "bool")),
        }
    }

    /// Interpret as an optional 64-bit value (32-bit values widen)
    pub fn into_u64(self, index: u32, property: PropId) -> Result<Option<u64>> {
        match self {
            PropValue::Empty => Ok(None),
            PropValue::U32(v) => Ok(Some(u64::from(v))),
            PropValue::U64(v) => Ok(Some(v)),
            _ => Err(Self::type_error(index, property, "u64")),
        }
    }

    /// Interpret as an optional 32-bit value
    pub fn into_u32(self, index: u32, property: PropId) -> Result<Option<u32>> {
        match self {
            PropValue::Empty => Ok(None),
            PropValue::U32(v) => Ok(Some(v)),
            _ => Err(Self::type_error(index, property, "u32")),
        }
    }

    /// Interpret as an optional timestamp
    pub fn into_time(self, index: u32, property: PropId) -> Result<Option<DateTime<Utc>>> {
        match self {
            PropValue::Empty => Ok(None),
            PropValue::Time(t) => Ok(Some(t)),
            _ => Err(Self::type_error(index, property, "time")),
        }
    }

    /// Interpret as a string, treating `Empty` as ""
    pub fn into_string(self, index: u32, property: PropId) -> Result<String> {
        match self {
            PropValue::Empty => Ok(String::new()),
            PropValue::Str(s) => Ok(s),
            _ => Err(Self::type_error(index, property, "string")),
        }
    }
}

/// Item timestamps, each independently optional
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTimes {
    /// Creation time
    pub created: Option<DateTime<Utc>>,
    /// Last access time
    pub accessed: Option<DateTime<Utc>>,
    /// Last modification time
    pub modified: Option<DateTime<Utc>>,
}

impl ItemTimes {
    /// Fill a missing modification time from the archive's own timestamp
    pub fn with_mtime_fallback(mut self, archive_mtime: Option<DateTime<Utc>>) -> Self {
        if self.modified.is_none() {
            self.modified = archive_mtime;
        }
        self
    }
}

/// Per-item state read from the engine when an item is announced
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemDescriptor {
    /// Archive index
    pub index: u32,
    /// Path exactly as the engine reported it
    pub raw_path: String,
    /// Raw path split into non-empty components
    pub components: Vec<String>,
    /// Directory item
    pub is_dir: bool,
    /// Deletion marker
    pub is_anti: bool,
    /// Encrypted item
    pub encrypted: bool,
    /// Split-volume continuation offset
    pub position: Option<u64>,
    /// Declared decoded size
    pub size: Option<u64>,
    /// Declared attribute word
    pub attributes: Option<u32>,
    /// Declared timestamps
    pub times: ItemTimes,
}

impl ItemDescriptor {
    /// Read and type-check every property of item `index`
    pub fn read(reader: &dyn ArchiveReader, index: u32) -> Result<Self> {
        let get = |prop: PropId| reader.property(index, prop);

        let raw_path = get(PropId::Path)?.into_string(index, PropId::Path)?;
        let components = split_path(&raw_path);

        Ok(Self {
            index,
            components,
            is_dir: get(PropId::IsDir)?.into_bool(index, PropId::IsDir)?,
            is_anti: get(PropId::IsAnti)?.into_bool(index, PropId::IsAnti)?,
            encrypted: get(PropId::Encrypted)?.into_bool(index, PropId::Encrypted)?,
            position: get(PropId::Position)?.into_u64(index, PropId::Position)?,
            size: get(PropId::Size)?.into_u64(index, PropId::Size)?,
            attributes: get(PropId::Attrib)?.into_u32(index, PropId::Attrib)?,
            times: ItemTimes {
                created: get(PropId::CTime)?.into_time(index, PropId::CTime)?,
                accessed: get(PropId::ATime)?.into_time(index, PropId::ATime)?,
                modified: get(PropId::MTime)?.into_time(index, PropId::MTime)?,
            },
            raw_path,
        })
    }

    /// Whether this item continues a file an earlier fragment created
    pub fn is_split(&self) -> bool {
        self.position.is_some()
    }
}

/// What the engine intends to do with an item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskMode {
    /// Decode and persist
    Extract,
    /// Decode and verify only
    Test,
    /// Do not decode
    Skip,
}

/// Result the engine reports when an item is done
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationResult {
    /// Decoded without problems
    Ok,
    /// Compression method not supported
    UnsupportedMethod,
    /// Decoded data was corrupt
    DataError,
    /// Checksum mismatch
    CrcError,
    /// Any other engine code; fatal for the run
    Unknown(i32),
}

impl OperationResult {
    /// Map a raw engine code
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => OperationResult::Ok,
            1 => OperationResult::UnsupportedMethod,
            2 => OperationResult::DataError,
            3 => OperationResult::CrcError,
            other => OperationResult::Unknown(other),
        }
    }

    /// Raw engine code
    pub fn code(self) -> i32 {
        match self {
            OperationResult::Ok => 0,
            OperationResult::UnsupportedMethod => 1,
            OperationResult::DataError => 2,
            OperationResult::CrcError => 3,
            OperationResult::Unknown(code) => code,
        }
    }

    /// Soft results are recorded and the run continues
    pub fn is_recoverable(self) -> bool {
        !matches!(self, OperationResult::Unknown(_))
    }
}

/// Answer to an overwrite prompt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteAnswer {
    /// Overwrite this file
    Yes,
    /// Overwrite this and every later conflict
    YesToAll,
    /// Keep the existing file and skip this item
    No,
    /// Skip this and every later conflict
    NoToAll,
    /// Give this and every later conflicting item a free name
    AutoRename,
    /// Abort the run
    Cancel,
}

impl OverwriteAnswer {
    /// Map a raw prompt code, rejecting anything outside the known answers
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(OverwriteAnswer::Yes),
            1 => Ok(OverwriteAnswer::YesToAll),
            2 => Ok(OverwriteAnswer::No),
            3 => Ok(OverwriteAnswer::NoToAll),
            4 => Ok(OverwriteAnswer::AutoRename),
            5 => Ok(OverwriteAnswer::Cancel),
            other => Err(Error::InvalidPromptAnswer(other)),
        }
    }
}

/// Running totals for one extraction run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Regular files recorded
    pub files: u64,
    /// Directories recorded
    pub folders: u64,
    /// Cumulative decoded size of items with a known size
    pub unpacked_size: u64,
    /// Wrapping sum of per-item CRC-32 values
    pub crc_sum: u32,
    /// Items skipped after a conflict or a non-fatal error
    pub skipped: u64,
    /// Non-fatal errors reported
    pub warnings: u64,
    /// Sidecar payloads merged into their target file
    pub sidecars_merged: u64,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} files, {} folders, {} bytes, crc {:08X}",
            self.files, self.folders, self.unpacked_size, self.crc_sum
        )?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        if self.warnings > 0 {
            write!(f, ", {} warnings", self.warnings)?;
        }
        Ok(())
    }
}
