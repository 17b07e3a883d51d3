//! Offsets of folder data inside the unmasked save region.

use crate::{FolderError, Result};

pub const CHIP_FOLDER_OFFSET: usize = 0x2178;
pub const CHIP_SIZE: usize = 2;
pub const CHIPS_PER_FOLDER: usize = 30;
pub const MAX_FOLDERS: usize = 3;

pub const FOLDER_COUNT_OFFSET: usize = 0x1c09;

const NAVI_STATS_OFFSET: usize = 0x47cc;
const NAVI_STATS_SIZE: usize = 0x64;
const EQUIPPED_FOLDER_FIELD: usize = 0x2d;
const REG_CHIP_FIELD: usize = 0x2e;
const TAG_CHIPS_FIELD: usize = 0x56;

/// Byte value written for "no reg" and "no tags".
pub const NO_INDEX: u8 = 0xff;

/// Only navi 0 is edited; any other id maps to the second stats block.
pub fn navi_stats_offset(navi_id: u8) -> usize {
    NAVI_STATS_OFFSET + NAVI_STATS_SIZE * usize::from(navi_id != 0)
}

fn check_folder(folder: usize) -> Result<()> {
    if folder >= MAX_FOLDERS {
        return Err(FolderError::InvalidFolderIndex { folder });
    }
    Ok(())
}

pub fn folder_offset(folder: usize) -> Result<usize> {
    check_folder(folder)?;
    Ok(CHIP_FOLDER_OFFSET + folder * CHIPS_PER_FOLDER * CHIP_SIZE)
}

pub fn slot_offset(folder: usize, slot: usize) -> Result<usize> {
    if slot >= CHIPS_PER_FOLDER {
        return Err(FolderError::FolderSize {
            expected: CHIPS_PER_FOLDER,
            actual: slot + 1,
        });
    }
    Ok(folder_offset(folder)? + slot * CHIP_SIZE)
}

pub fn equipped_folder_offset() -> usize {
    navi_stats_offset(0) + EQUIPPED_FOLDER_FIELD
}

pub fn reg_offset(folder: usize) -> Result<usize> {
    check_folder(folder)?;
    Ok(navi_stats_offset(0) + REG_CHIP_FIELD + folder)
}

/// Offset of the first of the two tag bytes; the second follows it.
pub fn tag_offset(folder: usize) -> Result<usize> {
    check_folder(folder)?;
    Ok(navi_stats_offset(0) + TAG_CHIPS_FIELD + folder * 2)
}

/// Reads a stored reg byte. Anything outside the folder means no reg.
pub fn reg_from_byte(byte: u8) -> Option<usize> {
    let index = usize::from(byte);
    (index < CHIPS_PER_FOLDER).then_some(index)
}

pub fn reg_to_byte(reg: Option<usize>) -> u8 {
    match reg {
        Some(index) if index < CHIPS_PER_FOLDER => index as u8,
        _ => NO_INDEX,
    }
}

/// Reads a stored tag pair. Either byte outside the folder means no tags.
pub fn tags_from_bytes(bytes: [u8; 2]) -> Option<[usize; 2]> {
    match (reg_from_byte(bytes[0]), reg_from_byte(bytes[1])) {
        (Some(a), Some(b)) => Some([a, b]),
        _ => None,
    }
}

pub fn tags_to_bytes(tags: Option<[usize; 2]>) -> [u8; 2] {
    match tags {
        Some([a, b]) => [reg_to_byte(Some(a)), reg_to_byte(Some(b))],
        None => [NO_INDEX, NO_INDEX],
    }
}
