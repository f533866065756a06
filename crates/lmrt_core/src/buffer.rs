//! Page-aligned backing storage for ring streams.

use bytemuck::{Pod, Zeroable};

/// Alignment the ring transport requires for its backing buffers.
pub const PAGE_SIZE: usize = 4096;

#[repr(C, align(4096))]
#[derive(Clone, Copy)]
struct Page([u8; PAGE_SIZE]);

// SAFETY: a single byte array with no padding; every bit pattern is valid.
unsafe impl Zeroable for Page {}
unsafe impl Pod for Page {}

/// A zero-initialised byte buffer whose start is aligned to [`PAGE_SIZE`].
pub struct PageBuffer {
    pages: Vec<Page>,
    len: usize,
}

impl PageBuffer {
    /// Allocate `len` zeroed bytes, rounded up to whole pages internally.
    pub fn zeroed(len: usize) -> Self {
        let page_count = len.div_ceil(PAGE_SIZE);
        Self {
            pages: vec![Page::zeroed(); page_count],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<Page, u8>(&self.pages)[..self.len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<Page, u8>(&mut self.pages)[..self.len]
    }
}

impl std::fmt::Debug for PageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageBuffer").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_buffer_alignment() {
        let buffer = PageBuffer::zeroed(512 * 16);
        assert_eq!(buffer.len(), 8192);
        assert_eq!(buffer.as_bytes().as_ptr() as usize % PAGE_SIZE, 0);
    }

    #[test]
    fn test_page_buffer_zeroed_and_writable() {
        let mut buffer = PageBuffer::zeroed(100);
        assert!(buffer.as_bytes().iter().all(|&b| b == 0));

        buffer.as_bytes_mut()[99] = 7;
        assert_eq!(buffer.as_bytes()[99], 7);
        assert_eq!(buffer.as_bytes().len(), 100);
    }

    #[test]
    fn test_empty_page_buffer() {
        let buffer = PageBuffer::zeroed(0);
        assert!(buffer.is_empty());
        assert!(buffer.as_bytes().is_empty());
    }
}
