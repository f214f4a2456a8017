/// Byte-range value type used by every lock and allocation call site.

/// A byte window `[start, start + length)` inside a buffer.
///
/// Pure value type with no ownership semantics. Used by the lock manager
/// to track guarded regions and by buffers to describe touched bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRange {
    /// First byte of the window
    pub start: u64,
    /// Window length in bytes
    pub length: u64,
}

impl BufferRange {
    /// Create a range covering `[start, start + length)`
    pub fn new(start: u64, length: u64) -> Self {
        Self { start, length }
    }

    /// One past the last byte of the window.
    ///
    /// A window reaching past `u64::MAX` is a programmer error and fatal;
    /// a silently wrapped end would make `overlaps` answer wrong.
    pub fn end(&self) -> u64 {
        match self.start.checked_add(self.length) {
            Some(end) => end,
            None => panic!(
                "range end overflows: start {} + length {}",
                self.start, self.length
            ),
        }
    }

    /// Whether the range covers zero bytes
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Whether two ranges share at least one byte.
    ///
    /// Symmetric; an empty range overlaps nothing, including itself.
    pub fn overlaps(&self, other: &BufferRange) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Smallest range covering both inputs (union by min-start/max-end).
    ///
    /// Intended for overlapping or adjacent ranges; for disjoint inputs the
    /// gap between them is included in the result.
    pub fn merge(&self, other: &BufferRange) -> BufferRange {
        let start = self.start.min(other.start);
        let end = self.end().max(other.end());
        BufferRange { start, length: end - start }
    }

    /// Whether `other` lies entirely inside this range
    pub fn contains(&self, other: &BufferRange) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }
}

#[cfg(test)]
#[path = "range_tests.rs"]
mod tests;
