//! Binary form of the in-memory container.
//!
//! Layout, all integers little endian:
//!
//! ```text
//! i32       magic (0xffffab01)
//! meta      MetaInfo::save_binary
//! vec<u64>  row offsets (bincode)
//! vec<Entry> entries (bincode)
//! ```

use crate::core::constants::BINARY_MAGIC;
use crate::core::error::{DMatrixError, Result};
use crate::core::types::{DeviceOrd, Entry};
use crate::dataset::meta::MetaInfo;
use crate::dataset::sparse_page::SparsePage;
use std::io::{Read, Write};

/// Write the magic number.
pub fn write_magic<W: Write>(writer: &mut W) -> Result<()> {
    writer.write_all(&BINARY_MAGIC.to_le_bytes())?;
    Ok(())
}

/// Read the magic number and check it.
pub fn read_magic<R: Read>(reader: &mut R) -> Result<()> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    let actual = i32::from_le_bytes(bytes);
    if actual != BINARY_MAGIC {
        return Err(DMatrixError::MagicMismatch {
            expected: BINARY_MAGIC,
            actual,
        });
    }
    Ok(())
}

/// Write a canonical page.
pub fn write_page<W: Write>(writer: &mut W, page: &SparsePage) -> Result<()> {
    bincode::serialize_into(&mut *writer, &page.offset)?;
    bincode::serialize_into(&mut *writer, &page.data)?;
    Ok(())
}

/// Read a canonical page and check its offsets.
pub fn read_page<R: Read>(reader: &mut R) -> Result<SparsePage> {
    let offset: Vec<u64> = bincode::deserialize_from(&mut *reader)?;
    let data: Vec<Entry> = bincode::deserialize_from(&mut *reader)?;
    SparsePage::from_parts(offset, data)
        .map_err(|e| DMatrixError::serialization(format!("Corrupted sparse page: {}", e)))
}

/// Write meta information and page behind the magic number.
pub fn write_dmatrix<W: Write>(writer: &mut W, info: &MetaInfo, page: &SparsePage) -> Result<()> {
    write_magic(writer)?;
    info.save_binary(writer)?;
    write_page(writer, page)?;
    writer.flush()?;
    Ok(())
}

/// Read what [`write_dmatrix`] wrote.
///
/// The page must agree with the meta information on rows, entries and
/// columns, and the meta information must be valid.
pub fn read_dmatrix<R: Read>(reader: &mut R) -> Result<(MetaInfo, SparsePage)> {
    read_magic(reader)?;
    let info = MetaInfo::load_binary(reader)?;
    let page = read_page(reader)?;
    if page.size() as u64 != info.num_row {
        return Err(DMatrixError::serialization(format!(
            "Sparse page has {} rows, meta info declares {}",
            page.size(),
            info.num_row
        )));
    }
    if page.num_nonzero() != info.num_nonzero {
        return Err(DMatrixError::serialization(format!(
            "Sparse page has {} entries, meta info declares {}",
            page.num_nonzero(),
            info.num_nonzero
        )));
    }
    if let Some(bad) = page.data.iter().find(|e| e.index as u64 >= info.num_col) {
        return Err(DMatrixError::serialization(format!(
            "Entry column {} out of range for {} columns",
            bad.index, info.num_col
        )));
    }
    info.validate(DeviceOrd::cpu())?;
    Ok((info, page))
}
