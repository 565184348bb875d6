use crate::cursor::InputCursor;
use crate::dictionary::Dictionary;
use crate::error::{error_buffer, error_structural, Result, XzError};
use crate::lzma2;
use crate::model::LZMA_PROPS_BYTE;

#[cfg(feature = "integrity-checks")]
const CRC32: crc::Crc<u32, crc::Table<16>> =
    crc::Crc::<u32, crc::Table<16>>::new(&crc::CRC_32_ISO_HDLC);

const STREAM_MAGIC: [u8; 6] = [0xFD, b'7', b'z', b'X', b'Z', 0x00];
const FOOTER_MAGIC: [u8; 2] = [b'Y', b'Z'];
const FILTER_ID_LZMA2: u64 = 0x21;

/// Stream-level check type, stored in the low nibble of the stream header's
/// second flags byte. Only `None` and `Crc32` are supported; a stream
/// declaring `Crc64` or `Sha256` is rejected rather than decoded
/// unverified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckType {
    None,
    Crc32,
}

impl CheckType {
    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(CheckType::None),
            0x01 => Ok(CheckType::Crc32),
            0x04 => Err(error_structural("CRC-64 stream check is not supported")),
            0x0A => Err(error_structural("SHA-256 stream check is not supported")),
            _ => Err(error_structural("unrecognized XZ stream check type")),
        }
    }

    fn len(self) -> usize {
        match self {
            CheckType::None => 0,
            CheckType::Crc32 => 4,
        }
    }
}

/// Verifies `data`'s CRC-32 against the little-endian 4-byte value at the
/// cursor's current position, consuming those 4 bytes either way. A no-op
/// check (under `integrity-checks = false`) just consumes and trusts them.
fn check_crc32(data: &[u8], cursor: &mut InputCursor) -> Result<()> {
    let stored = cursor.reserve(4)?;
    #[cfg(feature = "integrity-checks")]
    {
        let expected = u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]]);
        if CRC32.checksum(data) != expected {
            return Err(XzError::Integrity);
        }
    }
    #[cfg(not(feature = "integrity-checks"))]
    {
        let _ = stored;
    }
    Ok(())
}

fn parse_stream_header(cursor: &mut InputCursor) -> Result<CheckType> {
    let magic = cursor.reserve(6)?;
    if magic != STREAM_MAGIC {
        return Err(error_structural("bad XZ stream magic"));
    }
    let flags = cursor.reserve(2)?;
    if flags[0] != 0x00 || flags[1] & 0xF0 != 0 {
        return Err(error_structural("reserved XZ stream header flag bits set"));
    }
    let check_type = CheckType::from_byte(flags[1])?;
    let flags = [flags[0], flags[1]];
    check_crc32(&flags, cursor)?;
    Ok(check_type)
}

struct BlockHeader {
    header_len: usize,
    compressed_size: Option<u64>,
    uncompressed_size: Option<u64>,
}

/// Parses everything inside a block header's fixed-size region except its
/// trailing CRC-32, which the caller checks against the whole region.
fn parse_block_header_body(cursor: &mut InputCursor, body_len: usize) -> Result<BlockHeader> {
    let flags = cursor.read_byte()?;
    let has_compressed_size = flags & 0x40 != 0;
    let has_uncompressed_size = flags & 0x80 != 0;
    let num_filters = (flags & 0x03) + 1;
    if flags & 0x3C != 0 {
        return Err(error_structural("reserved XZ block header flag bits set"));
    }
    if num_filters != 1 {
        return Err(error_structural("only a single-filter LZMA2 chain is supported"));
    }

    let compressed_size = has_compressed_size.then(|| cursor.read_vli()).transpose()?;
    let uncompressed_size = has_uncompressed_size.then(|| cursor.read_vli()).transpose()?;

    let filter_id = cursor.read_vli()?;
    if filter_id != FILTER_ID_LZMA2 {
        return Err(error_structural("only the LZMA2 filter is supported"));
    }
    let filter_props_size = cursor.read_vli()?;
    if filter_props_size != 1 {
        return Err(error_structural("LZMA2 filter properties must be exactly one byte"));
    }
    let dict_size_code = cursor.read_byte()?;
    if dict_size_code > 39 {
        return Err(error_structural("invalid LZMA2 dictionary size code"));
    }

    while cursor.offset() < body_len {
        if cursor.read_byte()? != 0x00 {
            return Err(error_structural("non-zero XZ block header padding"));
        }
    }

    Ok(BlockHeader {
        header_len: 0,
        compressed_size,
        uncompressed_size,
    })
}

/// Parses the one block header this crate supports, verifying its CRC-32
/// against the whole header region (size byte through the last padding
/// byte).
fn parse_block_header(input: &[u8], cursor: &mut InputCursor) -> Result<BlockHeader> {
    let start = cursor.offset();
    let size_byte = *input
        .get(start)
        .ok_or_else(|| error_structural("truncated XZ block header"))?;
    if size_byte == 0x00 {
        return Err(error_structural("XZ stream has no blocks"));
    }
    let header_len = (size_byte as usize + 1) * 4;
    let header_bytes = cursor.reserve(header_len)?;

    let mut header_cursor = InputCursor::new(&header_bytes[1..header_len - 4]);
    let mut block_header = parse_block_header_body(&mut header_cursor, header_len - 5)?;
    block_header.header_len = header_len;

    let mut crc_cursor = InputCursor::new(&header_bytes[header_len - 4..]);
    check_crc32(&header_bytes[..header_len - 4], &mut crc_cursor)?;

    Ok(block_header)
}

/// When `meta-checks` is enabled, validates the mandatory index record and
/// stream footer that follow a single-block stream's payload and check
/// bytes. Disabled, this crate trusts the block header's own framing and
/// stops reading right after the check bytes, never looking at the index
/// or footer at all.
#[cfg(feature = "meta-checks")]
fn parse_index_and_footer(
    input: &[u8],
    cursor: &mut InputCursor,
    block_unpadded_size: u64,
    block_uncompressed_size: u64,
) -> Result<()> {
    let index_start = cursor.offset();
    let indicator = cursor.read_byte()?;
    if indicator != 0x00 {
        return Err(error_structural("expected XZ index indicator byte"));
    }
    let record_count = cursor.read_vli()?;
    if record_count != 1 {
        return Err(error_structural("only single-block XZ streams are supported"));
    }
    let unpadded_size = cursor.read_vli()?;
    let uncompressed_size = cursor.read_vli()?;
    if unpadded_size != block_unpadded_size || uncompressed_size != block_uncompressed_size {
        return Err(error_structural("XZ index record does not match the block"));
    }
    cursor.align4()?;
    let index_bytes = input
        .get(index_start..cursor.offset())
        .ok_or_else(|| error_structural("truncated XZ index"))?;
    check_crc32(index_bytes, cursor)?;

    let backward_size_field = cursor.reserve(4)?;
    let backward_size = u32::from_le_bytes([
        backward_size_field[0],
        backward_size_field[1],
        backward_size_field[2],
        backward_size_field[3],
    ]);
    let index_len = cursor.offset() - index_start - 4;
    if (backward_size as usize + 1) * 4 != index_len {
        return Err(error_structural("XZ footer backward_size does not match the index"));
    }

    let footer_flags = cursor.reserve(2)?;
    if footer_flags[0] != 0x00 {
        return Err(error_structural("reserved XZ footer flag bits set"));
    }

    let footer_magic = cursor.reserve(2)?;
    if footer_magic != FOOTER_MAGIC {
        return Err(error_structural("bad XZ stream footer magic"));
    }
    Ok(())
}

/// Decodes a single-block XZ stream from `input` into `output`, returning
/// the number of decompressed bytes written. A zero-length `output` runs a
/// size-query pass: framing is validated but the LZMA2 decoder never runs,
/// and the block header's declared uncompressed size is returned instead.
pub fn decompress(input: &[u8], output: &mut [u8]) -> core::result::Result<usize, XzError> {
    let mut cursor = InputCursor::new(input);
    let check_type = parse_stream_header(&mut cursor)?;
    let block_header = parse_block_header(input, &mut cursor)?;

    if output.is_empty() {
        return match block_header.uncompressed_size {
            Some(n) => Ok(n as usize),
            None => Err(error_structural(
                "size-query mode requires the block header to declare an uncompressed size",
            )),
        };
    }

    let out_len = match block_header.uncompressed_size {
        Some(n) => {
            let n = n as usize;
            if n > output.len() {
                return Err(error_buffer("output buffer too small"));
            }
            n
        }
        None => output.len(),
    };

    let payload_start = cursor.offset();
    let mut dict = Dictionary::new(output);
    dict.set_limit(out_len)?;
    lzma2::decode_stream(&mut cursor, &mut dict)?;
    let produced = dict.position();

    if let Some(declared) = block_header.uncompressed_size {
        if produced as u64 != declared {
            return Err(error_structural(
                "decompressed size did not match the block header's declared size",
            ));
        }
    }

    let consumed = (cursor.offset() - payload_start) as u64;
    if let Some(declared) = block_header.compressed_size {
        if consumed != declared {
            return Err(error_structural(
                "compressed payload did not match the block header's declared size",
            ));
        }
    }
    let unpadded_size = block_header.header_len as u64 + consumed + check_type.len() as u64;
    cursor.align4()?;

    if check_type.len() > 0 {
        let digest_view = output
            .get(..produced)
            .ok_or_else(|| error_buffer("output buffer too small"))?;
        check_crc32(digest_view, &mut cursor)?;
    }

    #[cfg(feature = "meta-checks")]
    parse_index_and_footer(input, &mut cursor, unpadded_size, produced as u64)?;

    Ok(produced)
}
