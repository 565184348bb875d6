use crate::cursor::InputCursor;
use crate::error::{error_decode, Result};

const SHIFT_BITS: u32 = 8;
const TOP_VALUE: u32 = 0x0100_0000;
pub(crate) const BIT_MODEL_TOTAL_BITS: u32 = 11;
pub(crate) const BIT_MODEL_TOTAL: u32 = 1 << BIT_MODEL_TOTAL_BITS;
pub(crate) const PROB_INIT: u16 = (BIT_MODEL_TOTAL / 2) as u16;
const MOVE_BITS: u32 = 5;

/// The arithmetic (range) coder: an 11-bit probability model driving a
/// half-open 32-bit interval, normalized lazily at every bit.
///
/// `remaining` tracks how many compressed bytes are still owed to this
/// chunk's budget; the LZMA2 framer checks it hit exactly zero once the
/// chunk's dictionary limit is reached, enforcing that a chunk consumes
/// exactly its declared compressed size.
pub(crate) struct RangeDecoder {
    range: u32,
    code: u32,
    remaining: u32,
}

impl RangeDecoder {
    /// Reads the 5-byte range-coder header: a mandatory zero byte followed
    /// by the initial `code` register, big-endian.
    pub(crate) fn init(cursor: &mut InputCursor, compressed_size: u32) -> Result<Self> {
        if compressed_size < 5 {
            return Err(error_decode("LZMA chunk compressed size too small"));
        }
        let first = cursor.read_byte()?;
        if first != 0x00 {
            return Err(error_decode("range coder header byte must be zero"));
        }
        let code = cursor.read_u32_be()?;
        Ok(Self {
            range: 0xFFFF_FFFF,
            code,
            remaining: compressed_size - 5,
        })
    }

    #[inline]
    fn next_byte(&mut self, cursor: &mut InputCursor) -> Result<u8> {
        if self.remaining == 0 {
            return Err(error_decode("range coder exhausted compressed budget"));
        }
        self.remaining -= 1;
        cursor.read_byte()
    }

    #[inline]
    fn normalize(&mut self, cursor: &mut InputCursor) -> Result<()> {
        if self.range < TOP_VALUE {
            let byte = self.next_byte(cursor)? as u32;
            self.code = (self.code << SHIFT_BITS) | byte;
            self.range <<= SHIFT_BITS;
        }
        Ok(())
    }

    /// The probability-adaptive primitive every other decode operation is
    /// built from.
    pub(crate) fn decode_bit(&mut self, cursor: &mut InputCursor, prob: &mut u16) -> Result<u32> {
        self.normalize(cursor)?;
        let bound = (self.range >> BIT_MODEL_TOTAL_BITS) * (*prob as u32);
        if self.code < bound {
            self.range = bound;
            *prob += ((BIT_MODEL_TOTAL as u16) - *prob) >> MOVE_BITS;
            Ok(0)
        } else {
            self.range -= bound;
            self.code -= bound;
            *prob -= *prob >> MOVE_BITS;
            Ok(1)
        }
    }

    /// Balanced binary tree of `2^num_bits` leaves, index starting at 1.
    pub(crate) fn decode_tree(
        &mut self,
        cursor: &mut InputCursor,
        probs: &mut [u16],
        num_bits: u32,
    ) -> Result<u32> {
        let mut symbol: u32 = 1;
        for _ in 0..num_bits {
            let bit = self.decode_bit(cursor, &mut probs[symbol as usize])?;
            symbol = (symbol << 1) | bit;
        }
        Ok(symbol - (1 << num_bits))
    }

    /// Same tree shape as `decode_tree`, but emits bits from the LSB — used
    /// for the distance alignment bits, indexed starting at `probs[1]`.
    pub(crate) fn decode_reverse_tree(
        &mut self,
        cursor: &mut InputCursor,
        probs: &mut [u16],
        num_bits: u32,
    ) -> Result<u32> {
        let mut symbol: u32 = 1;
        let mut result: u32 = 0;
        for i in 0..num_bits {
            let bit = self.decode_bit(cursor, &mut probs[symbol as usize])?;
            symbol = (symbol << 1) | bit;
            result |= bit << i;
        }
        Ok(result)
    }

    /// `count` raw, equal-probability bits — used for the high distance
    /// bits once the slot is too wide for a modeled reverse tree.
    pub(crate) fn decode_direct(&mut self, cursor: &mut InputCursor, count: u32) -> Result<u32> {
        let mut result: u32 = 0;
        for _ in 0..count {
            self.normalize(cursor)?;
            self.range >>= 1;
            let t = (self.code.wrapping_sub(self.range)) >> 31;
            self.code -= self.range & t.wrapping_sub(1);
            result = (result << 1) | (1u32.wrapping_sub(t));
        }
        Ok(result)
    }

    /// An 8-bit tree whose branch selection is XORed against `match_byte`
    /// until the decoded bit disagrees with it, after which it degenerates
    /// into an ordinary 8-bit literal tree.
    pub(crate) fn decode_matched_literal(
        &mut self,
        cursor: &mut InputCursor,
        probs: &mut [u16],
        match_byte: u8,
    ) -> Result<u8> {
        let mut symbol: u32 = 1;
        let mut match_byte = match_byte as u32;
        while symbol < 0x100 {
            match_byte <<= 1;
            let match_bit = match_byte & 0x100;
            let prob_index = (0x100 + match_bit + symbol) as usize;
            let bit = self.decode_bit(cursor, &mut probs[prob_index])?;
            symbol = (symbol << 1) | bit;
            if match_bit != (bit << 8) {
                while symbol < 0x100 {
                    let bit = self.decode_bit(cursor, &mut probs[symbol as usize])?;
                    symbol = (symbol << 1) | bit;
                }
                break;
            }
        }
        Ok((symbol & 0xFF) as u8)
    }

    /// Whether the range coder's `code` register has unwound to zero and its
    /// compressed-byte budget is spent — the "chunk finished cleanly" check.
    #[inline]
    pub(crate) fn is_finished(&self) -> bool {
        self.code == 0 && self.remaining == 0
    }
}
