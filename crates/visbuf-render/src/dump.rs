//! Raw visibility dumps for offline inspection.
//!
//! Layout (little-endian):
//!   - `[0..4]`  magic `VBUF`
//!   - `[4..8]`  width `u32`
//!   - `[8..12]` height `u32`
//!   - then `width * height` records of two `u32` lanes (R, G), row-major

use std::io::{Read, Write};

use visbuf_codec::RawRecord;

use crate::target::VisibilityTarget;

const MAGIC: &[u8; 4] = b"VBUF";

/// Largest width or height a dump may declare (the 2D texture limit of
/// high-end adapters).
pub const MAX_DIMENSION: u32 = 16_384;

const INITIAL_RECORDS: usize = 1 << 16;

/// Errors reading or writing visibility dumps.
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("dump I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a visibility dump (bad magic)")]
    BadMagic,

    #[error("dump dimensions {width}x{height} are too large")]
    TooLarge { width: u32, height: u32 },
}

pub fn write_dump<W: Write>(mut writer: W, target: &VisibilityTarget) -> Result<(), DumpError> {
    writer.write_all(MAGIC)?;
    writer.write_all(&target.width().to_le_bytes())?;
    writer.write_all(&target.height().to_le_bytes())?;
    for record in target.records() {
        writer.write_all(&record.instance.to_le_bytes())?;
        writer.write_all(&record.triangle.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_dump<R: Read>(mut reader: R) -> Result<VisibilityTarget, DumpError> {
    let mut header = [0u8; 12];
    reader.read_exact(&mut header)?;
    if &header[0..4] != MAGIC {
        return Err(DumpError::BadMagic);
    }
    let width = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    let height = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(DumpError::TooLarge { width, height });
    }
    let len = width as usize * height as usize;

    // The header is untrusted: grow with the data actually read.
    let mut records = Vec::with_capacity(len.min(INITIAL_RECORDS));
    let mut lanes = [0u8; 8];
    for _ in 0..len {
        reader.read_exact(&mut lanes)?;
        records.push(RawRecord::new(
            u32::from_le_bytes([lanes[0], lanes[1], lanes[2], lanes[3]]),
            u32::from_le_bytes([lanes[4], lanes[5], lanes[6], lanes[7]]),
        ));
    }

    VisibilityTarget::from_records(width, height, records).ok_or(DumpError::TooLarge { width, height })
}
