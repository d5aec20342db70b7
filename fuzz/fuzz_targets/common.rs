// SPDX-License-Identifier: MIT OR Apache-2.0

/// Reads fixed-width values from fuzzer bytes, yielding zeros once exhausted.
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn next_u8(&mut self) -> u8 {
        let value = self.data.get(self.offset).copied().unwrap_or(0);
        self.offset = self.offset.saturating_add(1);
        value
    }

    pub fn next_i16(&mut self) -> i16 {
        i16::from_le_bytes([self.next_u8(), self.next_u8()])
    }

    /// Takes `len` bytes, zero-padded past the end of the input.
    pub fn take_padded(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| self.next_u8()).collect()
    }
}

/// Maps a byte onto `[min, max]`.
pub fn bounded(seed: u8, min: usize, max: usize) -> usize {
    if max <= min {
        return min;
    }
    min + usize::from(seed) % (max - min + 1)
}

/// Decodes little-endian f64 values from 8-byte chunks, at most `max_len`.
pub fn decode_f64_chunks(bytes: &[u8], max_len: usize) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .take(max_len)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect()
}
