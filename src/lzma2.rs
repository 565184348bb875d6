use crate::cursor::InputCursor;
use crate::dictionary::Dictionary;
use crate::error::{error_decode, error_structural, Result};
use crate::lzma::LzmaEngine;
use crate::model::LZMA_PROPS_BYTE;
use crate::range_dec::RangeDecoder;

/// The largest compressed or uncompressed size an LZMA2 chunk header can
/// declare: both size fields are encoded as 16 bits biased by one.
const CHUNK_SIZE_MAX: usize = 1 << 16;

/// Decodes an entire LZMA2 stream (a sequence of chunks terminated by the
/// `0x00` end marker) directly into `dict`, starting at `dict`'s current
/// position and ending once the end-of-stream control byte is read.
///
/// ### LZMA2 control byte meaning
///
/// | Control byte | Chunk type      | Reset action               |
/// |---------------|-----------------|-----------------------------|
/// | `0x00`        | end of stream   | —                           |
/// | `0x01`–`0x02` | uncompressed    | not supported by this crate |
/// | `0x03`–`0x7F` | reserved        | always invalid              |
/// | `0x80`–`0x9F` | LZMA            | none                        |
/// | `0xA0`–`0xBF` | LZMA            | reset state                 |
/// | `0xC0`–`0xDF` | LZMA            | reset state + new props     |
/// | `0xE0`–`0xFF` | LZMA            | reset state + props + dict  |
pub(crate) fn decode_stream(cursor: &mut InputCursor, dict: &mut Dictionary) -> Result<()> {
    let mut engine = LzmaEngine::new();
    let mut need_props = true;
    let mut need_dict_reset = true;

    loop {
        let control = cursor.read_byte()?;
        if control == 0x00 {
            if need_dict_reset {
                return Err(error_structural(
                    "LZMA2 stream must contain at least one chunk",
                ));
            }
            return Ok(());
        }

        if control < 0x80 {
            return Err(error_structural(
                "LZMA2 uncompressed and reserved chunk types are not supported",
            ));
        }

        if control >= 0xE0 {
            need_props = true;
            need_dict_reset = false;
        } else if need_dict_reset {
            return Err(error_structural("LZMA2 stream must open with a dictionary reset"));
        }

        let uncompressed_size = (((control & 0x1F) as usize) << 16)
            + cursor.read_u16_be()? as usize
            + 1;
        let compressed_size = cursor.read_u16_be()? as usize + 1;
        if compressed_size > CHUNK_SIZE_MAX || uncompressed_size > CHUNK_SIZE_MAX {
            return Err(error_structural("LZMA2 chunk size exceeds the 16-bit limit"));
        }

        if control >= 0xE0 {
            need_props = false;
            decode_props(cursor)?;
            engine.reset_state();
        } else if control >= 0xC0 {
            return Err(error_structural(
                "LZMA2 property reset without a dictionary reset is not supported",
            ));
        } else if need_props {
            return Err(error_structural("LZMA2 chunk used stale LZMA properties"));
        } else if control >= 0xA0 {
            engine.reset_state();
        }

        dict.set_limit(uncompressed_size)?;
        let mut rc = RangeDecoder::init(cursor, compressed_size as u32)?;
        engine.decode_chunk(cursor, &mut rc, dict)?;
        if !rc.is_finished() {
            return Err(error_decode("LZMA2 chunk did not consume exactly its declared size"));
        }
    }
}

/// This crate supports only the single property byte (`0x5D`, i.e.
/// `lc=3, lp=0, pb=2`) that XZ's reference CLI defaults to.
fn decode_props(cursor: &mut InputCursor) -> Result<()> {
    let props = cursor.read_byte()?;
    if props != LZMA_PROPS_BYTE {
        return Err(error_structural("unsupported LZMA properties byte"));
    }
    Ok(())
}
