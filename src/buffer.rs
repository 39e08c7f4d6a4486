use crate::error::{Overflow, WriteResult};

/// Bytes reserved at the front of every frame for the outer array header
/// (`0xDD` + u32 count).
pub(crate) const MAX_ARRAY_HEADER_SIZE: usize = 5;

/// A fixed-capacity byte region addressed by `position`, `limit` and `mark`.
///
/// Every `put_*` either writes all of its bytes or fails with [`Overflow`] and
/// leaves the buffer untouched. `mark` is the end of the last complete message;
/// [`rewind`](Self::rewind) drops everything written after it.
pub(crate) struct FrameBuffer {
    data: Box<[u8]>,
    position: usize,
    limit: usize,
    mark: usize,
}

impl FrameBuffer {
    /// Allocate the region once. Capacities smaller than the frame header are raised
    /// to it, leaving no room for any message.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MAX_ARRAY_HEADER_SIZE);
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            position: MAX_ARRAY_HEADER_SIZE,
            limit: capacity,
            mark: MAX_ARRAY_HEADER_SIZE,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub(crate) fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub(crate) fn mark(&self) -> usize {
        self.mark
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.limit - self.position
    }

    /// True when no message has been committed since the last reset.
    #[inline]
    pub(crate) fn is_frame_empty(&self) -> bool {
        self.mark == MAX_ARRAY_HEADER_SIZE
    }

    /// Record the current position as the end of the last good message.
    #[inline]
    pub(crate) fn commit(&mut self) {
        self.mark = self.position;
    }

    /// Discard everything written after the mark.
    #[inline]
    pub(crate) fn rewind(&mut self) {
        self.position = self.mark;
    }

    /// Move the cursor back to an earlier position inside the current message.
    #[inline]
    pub(crate) fn set_position(&mut self, position: usize) {
        debug_assert!(position >= self.mark && position <= self.limit);
        self.position = position;
    }

    /// Start a new frame: keep the header reservation, drop all messages.
    pub(crate) fn reset(&mut self) {
        self.position = MAX_ARRAY_HEADER_SIZE;
        self.mark = MAX_ARRAY_HEADER_SIZE;
        self.limit = self.data.len();
    }

    #[inline]
    fn claim(&mut self, len: usize) -> Result<&mut [u8], Overflow> {
        if len > self.remaining() {
            return Err(Overflow);
        }
        let start = self.position;
        self.position += len;
        Ok(&mut self.data[start..start + len])
    }

    #[inline]
    pub(crate) fn put_u8(&mut self, b: u8) -> WriteResult {
        self.claim(1)?[0] = b;
        Ok(())
    }

    #[inline]
    pub(crate) fn put_u64(&mut self, v: u64) -> WriteResult {
        self.claim(8)?.copy_from_slice(&v.to_be_bytes());
        Ok(())
    }

    #[inline]
    pub(crate) fn put_tagged_u8(&mut self, tag: u8, v: u8) -> WriteResult {
        self.claim(2)?.copy_from_slice(&[tag, v]);
        Ok(())
    }

    #[inline]
    pub(crate) fn put_tagged_u16(&mut self, tag: u8, v: u16) -> WriteResult {
        let dst = self.claim(3)?;
        dst[0] = tag;
        dst[1..].copy_from_slice(&v.to_be_bytes());
        Ok(())
    }

    #[inline]
    pub(crate) fn put_tagged_u32(&mut self, tag: u8, v: u32) -> WriteResult {
        let dst = self.claim(5)?;
        dst[0] = tag;
        dst[1..].copy_from_slice(&v.to_be_bytes());
        Ok(())
    }

    #[inline]
    pub(crate) fn put_tagged_u64(&mut self, tag: u8, v: u64) -> WriteResult {
        let dst = self.claim(9)?;
        dst[0] = tag;
        dst[1..].copy_from_slice(&v.to_be_bytes());
        Ok(())
    }

    #[inline]
    pub(crate) fn put_slice(&mut self, src: &[u8]) -> WriteResult {
        self.claim(src.len())?.copy_from_slice(src);
        Ok(())
    }

    /// Overwrite already-written bytes at `index` without moving the cursor.
    #[inline]
    pub(crate) fn patch(&mut self, index: usize, src: &[u8]) {
        debug_assert!(index + src.len() <= self.position);
        self.data[index..index + src.len()].copy_from_slice(src);
    }

    /// Bytes in `[start, mark)`, i.e. the header written at `start` followed by every
    /// committed message.
    #[inline]
    pub(crate) fn committed_from(&self, start: usize) -> &[u8] {
        &self.data[start..self.mark]
    }

    #[cfg(test)]
    pub(crate) fn written(&self) -> &[u8] {
        &self.data[MAX_ARRAY_HEADER_SIZE..self.position]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_start_after_header_reservation() {
        let buf = FrameBuffer::with_capacity(16);
        assert_eq!(buf.position(), MAX_ARRAY_HEADER_SIZE);
        assert_eq!(buf.remaining(), 11);
        assert!(buf.is_frame_empty());
    }

    #[test]
    fn should_reject_write_past_limit_without_moving() {
        // Arrange
        let mut buf = FrameBuffer::with_capacity(9);
        buf.put_tagged_u8(0xCC, 0x02).unwrap();

        // Act
        let res = buf.put_tagged_u16(0xCD, 0x0304);

        // Assert
        assert_eq!(res, Err(Overflow));
        assert_eq!(buf.position(), 7);
        assert_eq!(buf.written(), &[0xCC, 0x02]);
    }

    #[test]
    fn should_rewind_to_last_commit() {
        let mut buf = FrameBuffer::with_capacity(32);
        buf.put_u8(0xAA).unwrap();
        buf.commit();
        buf.put_u64(u64::MAX).unwrap();
        buf.rewind();
        assert_eq!(buf.written(), &[0xAA]);
        assert!(!buf.is_frame_empty());
    }

    #[test]
    fn should_write_tagged_values_big_endian() {
        let mut buf = FrameBuffer::with_capacity(32);
        buf.put_tagged_u16(0xCD, 0x0100).unwrap();
        buf.put_tagged_u32(0xCE, 0x0001_0000).unwrap();
        assert_eq!(buf.written(), &[0xCD, 0x01, 0x00, 0xCE, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn should_raise_tiny_capacity_to_header_size() {
        let mut buf = FrameBuffer::with_capacity(0);
        assert_eq!(buf.capacity(), MAX_ARRAY_HEADER_SIZE);
        assert_eq!(buf.put_u8(0), Err(Overflow));
    }

    #[test]
    fn should_patch_in_place_and_reset() {
        let mut buf = FrameBuffer::with_capacity(16);
        buf.put_slice(&[1, 2, 3]).unwrap();
        buf.patch(MAX_ARRAY_HEADER_SIZE + 1, &[9]);
        assert_eq!(buf.written(), &[1, 9, 3]);
        buf.reset();
        assert_eq!(buf.written(), &[] as &[u8]);
    }
}
