//! Byte storage backing a loaded index.
//!
//! The index never copies records out of storage on the query path: vectors
//! and child id arrays are handed out as `&[f32]` / `&[i32]` views into
//! either a read-only memory map or an owned buffer.
//!
//! # Alignment
//!
//! Every field in the file is 4 bytes wide and every record size is a
//! multiple of 4, so as long as the base pointer is 4-byte aligned all field
//! views are aligned too. Memory maps are page aligned; owned buffers are
//! backed by `Vec<u32>` to get the same guarantee.
//!
//! The format is little-endian; slice views assume a little-endian host.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read};
use std::ops::Range;

/// How the index bytes are held in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Read-only memory map of the file (default). Pages are faulted in on
    /// demand, so resident memory stays proportional to what queries touch.
    #[default]
    Mmap,
    /// Whole file read into an owned buffer at load time.
    Memory,
}

/// Read-only byte storage with bounds-checked typed views.
pub(crate) enum Storage {
    #[cfg(feature = "mmap")]
    Mapped(memmap2::Mmap),
    Owned {
        words: Vec<u32>,
        len: usize,
    },
}

impl Storage {
    /// Maps `file` read-only.
    #[cfg(feature = "mmap")]
    pub(crate) fn map(file: &File) -> io::Result<Self> {
        // SAFETY: The mapping is read-only and never handed out mutably.
        // Index files are immutable build artifacts; truncating one while it
        // is mapped is outside the supported contract, as for any mmap reader.
        let mmap = unsafe { memmap2::Mmap::map(file)? };
        Ok(Self::Mapped(mmap))
    }

    /// Reads the remainder of `file` into an aligned owned buffer.
    pub(crate) fn read(file: &mut File, len_hint: usize) -> io::Result<Self> {
        let mut bytes = Vec::with_capacity(len_hint);
        file.read_to_end(&mut bytes)?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Copies `bytes` into an aligned owned buffer.
    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        let len = bytes.len();
        let mut words = vec![0u32; len.div_ceil(4)];
        bytemuck::cast_slice_mut::<u32, u8>(&mut words)[..len].copy_from_slice(bytes);
        Self::Owned { words, len }
    }

    /// Storage mode this buffer corresponds to.
    pub(crate) fn mode(&self) -> StorageMode {
        match self {
            #[cfg(feature = "mmap")]
            Self::Mapped(_) => StorageMode::Mmap,
            Self::Owned { .. } => StorageMode::Memory,
        }
    }

    /// All bytes of the index.
    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            #[cfg(feature = "mmap")]
            Self::Mapped(mmap) => &mmap[..],
            Self::Owned { words, len } => &bytemuck::cast_slice::<u32, u8>(words)[..*len],
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.bytes().len()
    }

    #[inline]
    fn field(&self, offset: usize) -> Option<[u8; 4]> {
        let end = offset.checked_add(4)?;
        self.bytes().get(offset..end)?.try_into().ok()
    }

    /// Reads a little-endian `i32` at `offset`.
    #[inline]
    pub(crate) fn read_i32(&self, offset: usize) -> Option<i32> {
        self.field(offset).map(i32::from_le_bytes)
    }

    /// Reads a little-endian `f32` at `offset`.
    #[inline]
    pub(crate) fn read_f32(&self, offset: usize) -> Option<f32> {
        self.field(offset).map(f32::from_le_bytes)
    }

    /// Views `count` consecutive `f32` values starting at `offset`.
    #[inline]
    pub(crate) fn f32_slice(&self, offset: usize, count: usize) -> Option<&[f32]> {
        bytemuck::try_cast_slice(self.bytes().get(field_range(offset, count)?)?).ok()
    }

    /// Views `count` consecutive `i32` values starting at `offset`.
    #[inline]
    pub(crate) fn i32_slice(&self, offset: usize, count: usize) -> Option<&[i32]> {
        bytemuck::try_cast_slice(self.bytes().get(field_range(offset, count)?)?).ok()
    }
}

#[inline]
fn field_range(offset: usize, count: usize) -> Option<Range<usize>> {
    let end = count.checked_mul(4)?.checked_add(offset)?;
    Some(offset..end)
}
