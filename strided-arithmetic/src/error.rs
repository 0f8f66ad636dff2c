use std::alloc::LayoutError;

use displaydoc::Display;

/// Errors reported by a [`MemoryResource`](crate::memory_resource::MemoryResource).
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum AllocError {
    /// out of memory: failed to allocate {requested} bytes
    OutOfMemory { requested: usize },
    /// invalid layout: {0}
    InvalidLayout(String),
    /// arena exhausted: {current} bytes used of {capacity} bytes capacity
    ArenaExhausted { current: usize, capacity: usize },
}

impl std::error::Error for AllocError {}

impl From<LayoutError> for AllocError {
    fn from(e: LayoutError) -> Self {
        AllocError::InvalidLayout(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum VectorError {
    /// allocation failed: {0}
    Alloc(AllocError),
    /// index {index} is out of range for a vector of length {len}
    OutOfRange { index: usize, len: usize },
    /// step must be at least 1
    InvalidStep,
    /// length mismatch: {left} vs {right}
    LengthMismatch { left: usize, right: usize },
    /// p must be greater than or equal to 1
    InvalidNormOrder,
    /// storage is shared with another vector handle
    SharedStorage,
}

impl std::error::Error for VectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VectorError::Alloc(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AllocError> for VectorError {
    fn from(e: AllocError) -> Self {
        VectorError::Alloc(e)
    }
}

impl From<LayoutError> for VectorError {
    fn from(e: LayoutError) -> Self {
        VectorError::Alloc(e.into())
    }
}

pub type Result<T> = std::result::Result<T, VectorError>;
