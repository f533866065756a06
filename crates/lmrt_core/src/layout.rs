//! Burst/word packing of record arrays for accelerator memory.
//!
//! The accelerator reads its memory in whole bursts and feeds the kernel one
//! word at a time. A word holds `records_per_word` records back to back; any
//! bytes left over at the top of the word are padding, so consecutive words
//! start `word_stride_bytes` apart no matter how large a record is. The total
//! transfer is always rounded up to a whole number of bursts, which can add
//! extra (zeroed) records beyond the ones requested.

use std::marker::PhantomData;
use std::ops::Range;

use bytemuck::Zeroable;
use serde::{Deserialize, Serialize};

use crate::accelerator::{names, Accelerator};
use crate::error::{LayoutError, LayoutResult};
use crate::records::WireRecord;

/// Layout facts declared by the accelerator for one memory stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFormat {
    /// Record width the accelerator expects, in bytes
    pub record_width_bytes: usize,
    /// Width of one word on the wire, in bits
    pub word_width_bits: usize,
    /// Size of one memory burst, in bytes
    pub burst_size_bytes: usize,
    /// Bursts to transfer even when no records are requested
    pub min_bursts: usize,
}

impl WireFormat {
    /// Read the triangle stream's wire format from the accelerator's constants.
    pub fn query<A: Accelerator + ?Sized, T: WireRecord>(accelerator: &A) -> LayoutResult<Self> {
        let record_width = accelerator
            .constant(T::WIDTH_CONSTANT)
            .ok_or_else(|| LayoutError::MissingConstant(T::WIDTH_CONSTANT.to_string()))?;
        let word_width = accelerator
            .constant(names::TRIANGLES_IN_WIDTH_IN_BITS)
            .ok_or_else(|| LayoutError::MissingConstant(names::TRIANGLES_IN_WIDTH_IN_BITS.to_string()))?;

        Ok(Self {
            record_width_bytes: to_usize(record_width)?,
            word_width_bits: to_usize(word_width)?,
            burst_size_bytes: accelerator.burst_size(),
            min_bursts: 1,
        })
    }
}

fn to_usize(value: u64) -> LayoutResult<usize> {
    usize::try_from(value).map_err(|_| LayoutError::Overflow)
}

/// Computed word/burst parameters for one record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurstLayout {
    record_size: usize,
    records_per_word: usize,
    word_stride_bytes: usize,
    burst_size_bytes: usize,
    requested_count: usize,
    total_bursts: usize,
    total_words: usize,
    total_records: usize,
}

impl BurstLayout {
    /// Compute the layout for `requested_count` records of `record_size` bytes.
    ///
    /// Fails if `record_size` differs from the width the accelerator declares,
    /// or if one word cannot hold a single record.
    pub fn new(record_size: usize, format: &WireFormat, requested_count: usize) -> LayoutResult<Self> {
        if record_size == 0 {
            return Err(LayoutError::Zero("record size"));
        }
        if format.word_width_bits == 0 {
            return Err(LayoutError::Zero("word width"));
        }
        if format.burst_size_bytes == 0 {
            return Err(LayoutError::Zero("burst size"));
        }
        if format.word_width_bits % 8 != 0 {
            return Err(LayoutError::PartialByteWord(format.word_width_bits));
        }
        if record_size != format.record_width_bytes {
            return Err(LayoutError::RecordWidthMismatch {
                host: record_size,
                declared: format.record_width_bytes,
            });
        }

        let word_bytes = format.word_width_bits / 8;
        let burst_bytes = format.burst_size_bytes;

        let records_per_word = word_bytes / record_size;
        if records_per_word == 0 {
            return Err(LayoutError::WordNarrowerThanRecord {
                word_bytes,
                record_size,
            });
        }

        // Minimum words for the request, then whole bursts to carry them.
        // Words per burst may be fractional, so work in bytes.
        let min_words = requested_count.div_ceil(records_per_word);
        let min_bytes = min_words.checked_mul(word_bytes).ok_or(LayoutError::Overflow)?;
        let total_bursts = min_bytes.div_ceil(burst_bytes).max(format.min_bursts);

        // The bursts decide how many words (and records) are actually read
        let byte_size = total_bursts.checked_mul(burst_bytes).ok_or(LayoutError::Overflow)?;
        let total_words = byte_size / word_bytes;
        let total_records = total_words * records_per_word;

        log::debug!(
            "Burst layout: {} requested -> {} records, {} words, {} bursts ({} bytes)",
            requested_count,
            total_records,
            total_words,
            total_bursts,
            byte_size
        );

        Ok(Self {
            record_size,
            records_per_word,
            word_stride_bytes: word_bytes,
            burst_size_bytes: burst_bytes,
            requested_count,
            total_bursts,
            total_words,
            total_records,
        })
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn records_per_word(&self) -> usize {
        self.records_per_word
    }

    pub fn word_stride_bytes(&self) -> usize {
        self.word_stride_bytes
    }

    pub fn burst_size_bytes(&self) -> usize {
        self.burst_size_bytes
    }

    /// Words per burst; fractional when a word is wider than a burst or
    /// does not divide it.
    pub fn words_per_burst(&self) -> f64 {
        self.burst_size_bytes as f64 / self.word_stride_bytes as f64
    }

    pub fn requested_count(&self) -> usize {
        self.requested_count
    }

    pub fn total_bursts(&self) -> usize {
        self.total_bursts
    }

    pub fn total_words(&self) -> usize {
        self.total_words
    }

    /// Records the accelerator will read, padding included.
    pub fn total_records(&self) -> usize {
        self.total_records
    }

    /// Size of the packed transfer in bytes, always a whole number of bursts.
    pub fn byte_size(&self) -> usize {
        self.total_bursts * self.burst_size_bytes
    }

    /// Byte offset of record `index` within the packed buffer.
    ///
    /// This is the only place word/offset addressing is computed; reads and
    /// writes both go through it.
    pub fn record_offset(&self, index: usize) -> Option<usize> {
        if index >= self.total_records {
            return None;
        }
        let word = index / self.records_per_word;
        let offset = index % self.records_per_word;
        Some(word * self.word_stride_bytes + offset * self.record_size)
    }

    /// Byte range occupied by record `index`.
    pub fn record_range(&self, index: usize) -> Option<Range<usize>> {
        self.record_offset(index)
            .map(|start| start..start + self.record_size)
    }

    /// Decode record `index` from a buffer laid out by this layout.
    pub fn read_record<T: WireRecord>(&self, bytes: &[u8], index: usize) -> Option<T> {
        if T::WIRE_SIZE != self.record_size {
            return None;
        }
        let range = self.record_range(index)?;
        bytes.get(range).map(bytemuck::pod_read_unaligned)
    }
}

/// A record set packed into the burst-aligned layout the accelerator expects.
pub struct PackedRecordBuffer<T: WireRecord> {
    layout: BurstLayout,
    bytes: Vec<u8>,
    _marker: PhantomData<T>,
}

impl<T: WireRecord> PackedRecordBuffer<T> {
    /// Allocate a zeroed buffer able to hold `requested_count` records.
    ///
    /// The layout is validated before anything is allocated.
    pub fn new(format: &WireFormat, requested_count: usize) -> LayoutResult<Self> {
        let layout = BurstLayout::new(T::WIRE_SIZE, format, requested_count)?;
        Ok(Self {
            layout,
            bytes: vec![0; layout.byte_size()],
            _marker: PhantomData,
        })
    }

    /// Allocate and pack `records` in one step.
    pub fn from_records(format: &WireFormat, records: &[T]) -> LayoutResult<Self> {
        let mut buffer = Self::new(format, records.len())?;
        buffer.pack(records)?;
        Ok(buffer)
    }

    pub fn layout(&self) -> &BurstLayout {
        &self.layout
    }

    /// Copy `records` into their word-aligned slots.
    ///
    /// Every slot not covered by `records` (including word padding) is reset
    /// to zero.
    pub fn pack(&mut self, records: &[T]) -> LayoutResult<()> {
        if records.len() > self.layout.total_records() {
            return Err(LayoutError::TooManyRecords {
                count: records.len(),
                capacity: self.layout.total_records(),
            });
        }

        self.bytes.fill(0);
        for (index, record) in records.iter().enumerate() {
            self.set(index, record)?;
        }
        Ok(())
    }

    /// Overwrite the record at `index`.
    pub fn set(&mut self, index: usize, record: &T) -> LayoutResult<()> {
        let range = self
            .layout
            .record_range(index)
            .ok_or(LayoutError::IndexOutOfRange {
                index,
                total: self.layout.total_records(),
            })?;
        self.bytes[range].copy_from_slice(bytemuck::bytes_of(record));
        Ok(())
    }

    /// Read back the record at `index`, or `None` past `total_records`.
    pub fn record_at(&self, index: usize) -> Option<T> {
        self.layout.read_record(&self.bytes, index)
    }

    /// Iterate over every record the accelerator will read, padding included.
    pub fn records(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.layout.total_records()).map(|index| self.record_at(index).unwrap_or_else(T::zeroed))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
