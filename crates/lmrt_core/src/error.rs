//! Error types shared by the packing layer and the accelerator collaborator.

use thiserror::Error;

/// Host and accelerator disagree about how records are laid out.
///
/// Always raised before any buffer is allocated or transferred.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Record width mismatch: host record is {host} bytes, accelerator declares {declared}")]
    RecordWidthMismatch { host: usize, declared: usize },

    #[error("Word of {word_bytes} bytes cannot hold a single {record_size}-byte record")]
    WordNarrowerThanRecord { word_bytes: usize, record_size: usize },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("Word width of {0} bits is not a whole number of bytes")]
    PartialByteWord(usize),

    #[error("Accelerator does not declare constant {0}")]
    MissingConstant(String),

    #[error("{count} records do not fit in a layout holding {capacity}")]
    TooManyRecords { count: usize, capacity: usize },

    #[error("Record index {index} out of range (layout holds {total})")]
    IndexOutOfRange { index: usize, total: usize },

    #[error("Layout size overflows the address space")]
    Overflow,
}

/// Result type for layout operations.
pub type LayoutResult<T> = Result<T, LayoutError>;

/// A named ring stream could not be set up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Accelerator does not expose stream {0}")]
    Unavailable(String),

    #[error("Stream {name} uses {actual}-byte slots, expected {expected}")]
    SlotSizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Stream {0} needs at least one slot")]
    NoSlots(String),

    #[error("Backing buffer for stream {name} holds {actual} bytes, ring needs {needed}")]
    BackingTooSmall {
        name: String,
        needed: usize,
        actual: usize,
    },
}

/// Failures reported by the accelerator collaborator while running actions.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Unknown action mode: {0}")]
    UnknownMode(String),

    #[error("Missing scalar parameter {0}")]
    MissingParameter(String),

    #[error("Missing input stream {0}")]
    MissingInput(String),

    #[error("Memory write of {size} bytes at address {address} exceeds capacity {capacity}")]
    OutOfBounds {
        address: usize,
        size: usize,
        capacity: usize,
    },

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Stream {0} was closed by the host")]
    StreamClosed(String),

    #[error("Slot of {len} bytes does not fit stream {name} ({slot_size}-byte slots)")]
    SlotOverflow {
        name: String,
        len: usize,
        slot_size: usize,
    },

    #[error("Failed to launch accelerator job: {0}")]
    Launch(String),

    #[error("Accelerator job panicked")]
    JobPanicked,
}
