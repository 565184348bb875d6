use crate::cursor::InputCursor;
use crate::dictionary::Dictionary;
use crate::error::{error_decode, Result};
use crate::model::{
    LzmaModel, ALIGN_BITS, DIST_MODEL_END, DIST_MODEL_START, DIST_SPECIAL_END, DIST_SPECIAL_INDEX,
    LEN_LOW_SYMBOLS, LEN_MID_SYMBOLS, MATCH_LEN_MIN,
};
use crate::range_dec::RangeDecoder;
use crate::state::State;

const LEN_LOW_BITS: u32 = 3;
const LEN_MID_BITS: u32 = 3;
const LEN_HIGH_BITS: u32 = 8;

/// The LZMA engine: probability model, state machine and recent-distance
/// stack, decoupled from both the range coder (which only knows bits) and
/// the dictionary (which only knows bytes). One engine instance lives for
/// the whole LZMA2 stream; its `model`/`state` are wholesale reset on an
/// LZMA2 chunk that declares a state reset, while `rep` survives resets —
/// the recent-distance stack is never reset by LZMA2 chunk framing, only by
/// the start of a new stream.
pub(crate) struct LzmaEngine {
    model: LzmaModel,
    state: State,
    rep: [u32; 4],
}

impl LzmaEngine {
    pub(crate) fn new() -> Self {
        Self {
            model: LzmaModel::new(),
            state: State::new(),
            rep: [0; 4],
        }
    }

    pub(crate) fn reset_state(&mut self) {
        self.model.reset();
        self.state = State::new();
        self.rep = [0; 4];
    }

    /// Decodes symbols until the dictionary's current chunk limit is
    /// reached. The dictionary limit (set by the LZMA2 framer before this is
    /// called) is this engine's only termination condition — LZMA2 chunks
    /// carry explicit sizes and never use the raw-LZMA end-of-stream marker.
    pub(crate) fn decode_chunk(
        &mut self,
        cursor: &mut InputCursor,
        rc: &mut RangeDecoder,
        dict: &mut Dictionary,
    ) -> Result<()> {
        while !dict.is_complete() {
            let pos_state = LzmaModel::pos_state(dict.position());
            let state_idx = self.state.index();

            let is_match = rc.decode_bit(cursor, &mut self.model.is_match[state_idx][pos_state])?;

            if is_match == 0 {
                let prev_byte = dict.byte_at(0);
                let byte = if self.state.is_literal() {
                    self.decode_literal_normal(cursor, rc, prev_byte)?
                } else {
                    let match_byte = dict.byte_at(self.rep[0] as usize);
                    rc.decode_matched_literal(
                        cursor,
                        &mut self.model.literal[LzmaModel::literal_state(prev_byte)],
                        match_byte,
                    )?
                };
                dict.put_literal(byte)?;
                self.state.update_literal();
                continue;
            }

            let is_rep = rc.decode_bit(cursor, &mut self.model.is_rep[state_idx])?;
            let (len, dist) = if is_rep == 0 {
                let len = self.decode_length(cursor, rc, pos_state, false)?;
                let dist = self.decode_distance(cursor, rc, len)?;
                if dist == 0xFFFF_FFFF {
                    return Err(error_decode("unexpected end-of-stream marker in LZMA2 chunk"));
                }
                self.rep[3] = self.rep[2];
                self.rep[2] = self.rep[1];
                self.rep[1] = self.rep[0];
                self.rep[0] = dist;
                self.state.update_match();
                (len, dist)
            } else {
                let is_rep0 = rc.decode_bit(cursor, &mut self.model.is_rep0[state_idx])?;
                if is_rep0 == 0 {
                    let is_rep0_long =
                        rc.decode_bit(cursor, &mut self.model.is_rep0_long[state_idx][pos_state])?;
                    if is_rep0_long == 0 {
                        let byte = dict.byte_at(self.rep[0] as usize);
                        dict.put_literal(byte)?;
                        self.state.update_short_rep();
                        continue;
                    }
                    let len = self.decode_length(cursor, rc, pos_state, true)?;
                    self.state.update_long_rep();
                    (len, self.rep[0])
                } else {
                    let is_rep1 = rc.decode_bit(cursor, &mut self.model.is_rep1[state_idx])?;
                    let dist = if is_rep1 == 0 {
                        self.rep.swap(0, 1);
                        self.rep[0]
                    } else {
                        let is_rep2 = rc.decode_bit(cursor, &mut self.model.is_rep2[state_idx])?;
                        let d = if is_rep2 == 0 {
                            self.rep[2]
                        } else {
                            let d = self.rep[3];
                            self.rep[3] = self.rep[2];
                            d
                        };
                        self.rep[2] = self.rep[1];
                        self.rep[1] = self.rep[0];
                        self.rep[0] = d;
                        d
                    };
                    let len = self.decode_length(cursor, rc, pos_state, true)?;
                    self.state.update_long_rep();
                    (len, dist)
                }
            };

            dict.copy_match(dist as usize, len as usize)?;
        }
        Ok(())
    }

    fn decode_literal_normal(
        &mut self,
        cursor: &mut InputCursor,
        rc: &mut RangeDecoder,
        prev_byte: u8,
    ) -> Result<u8> {
        let lit_state = LzmaModel::literal_state(prev_byte);
        let mut symbol: u32 = 1;
        while symbol < 0x100 {
            let bit = rc.decode_bit(cursor, &mut self.model.literal[lit_state][symbol as usize])?;
            symbol = (symbol << 1) | bit;
        }
        Ok((symbol & 0xFF) as u8)
    }

    fn decode_length(
        &mut self,
        cursor: &mut InputCursor,
        rc: &mut RangeDecoder,
        pos_state: usize,
        is_rep: bool,
    ) -> Result<u32> {
        let len_model = if is_rep {
            &mut self.model.rep_len
        } else {
            &mut self.model.match_len
        };
        if rc.decode_bit(cursor, &mut len_model.choice)? == 0 {
            let len = rc.decode_tree(cursor, &mut len_model.low[pos_state], LEN_LOW_BITS)?;
            return Ok(len + MATCH_LEN_MIN);
        }
        if rc.decode_bit(cursor, &mut len_model.choice2)? == 0 {
            let len = rc.decode_tree(cursor, &mut len_model.mid[pos_state], LEN_MID_BITS)?;
            return Ok(len + MATCH_LEN_MIN + (LEN_LOW_SYMBOLS as u32));
        }
        let len = rc.decode_tree(cursor, &mut len_model.high, LEN_HIGH_BITS)?;
        Ok(len + MATCH_LEN_MIN + (LEN_LOW_SYMBOLS as u32) + (LEN_MID_SYMBOLS as u32))
    }

    fn decode_distance(
        &mut self,
        cursor: &mut InputCursor,
        rc: &mut RangeDecoder,
        len: u32,
    ) -> Result<u32> {
        let len_state = (len - MATCH_LEN_MIN).min(3) as usize;
        let slot = rc.decode_tree(cursor, &mut self.model.dist_slot[len_state], 6)?;

        if slot < DIST_MODEL_START {
            return Ok(slot);
        }

        let num_direct_bits = (slot >> 1) - 1;
        let mut dist = (2 | (slot & 1)) << num_direct_bits;

        if slot < DIST_MODEL_END {
            let i = (slot - DIST_MODEL_START) as usize;
            let special =
                &mut self.model.dist_special[DIST_SPECIAL_INDEX[i]..DIST_SPECIAL_END[i]];
            dist += rc.decode_reverse_tree(cursor, special, num_direct_bits)?;
        } else {
            let direct = rc.decode_direct(cursor, num_direct_bits - ALIGN_BITS)?;
            dist += direct << ALIGN_BITS;
            dist += rc.decode_reverse_tree(cursor, &mut self.model.dist_align, ALIGN_BITS)?;
        }

        Ok(dist)
    }
}
