use serde::{Deserialize, Serialize};

use crate::buffer::MAX_ARRAY_HEADER_SIZE;
use crate::error::{Error, Result};

/// Default buffer size: 1 MiB.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1 << 20;

/// Settings for building a [`Packer`](crate::Packer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackerConfig {
    /// Total buffer size in bytes, including the five bytes reserved for the frame header.
    pub buffer_capacity: usize,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl PackerConfig {
    pub fn with_buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }

    /// The buffer must hold the frame header and at least one byte of payload.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity <= MAX_ARRAY_HEADER_SIZE {
            return Err(Error::InvalidConfig(format!(
                "buffer_capacity must exceed {MAX_ARRAY_HEADER_SIZE} bytes, got {}",
                self.buffer_capacity
            )));
        }
        Ok(())
    }
}
