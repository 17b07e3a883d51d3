//! Save image codec: XOR masking, the additive checksum, and typed access
//! to the folder fields of an unmasked save region.

use std::fmt;

use crate::catalog::ChipCatalog;
use crate::chip_codec::{self, RawChipSlot};
use crate::folder::Folder;
use crate::layout::{self, CHIPS_PER_FOLDER, CHIP_SIZE};
use crate::{FolderError, Result};

pub const SAVE_START_OFFSET: usize = 0x0100;
pub const SAVE_SIZE: usize = 0x6710;
pub const MASK_OFFSET: usize = 0x1064;
pub const CHECKSUM_OFFSET: usize = 0x1c6c;
pub const CHECKSUM_SIZE: usize = 4;
pub const GAME_NAME_OFFSET: usize = 0x1c70;
pub const GAME_NAME_SIZE: usize = 20;

const GREGAR_MARKERS: &[&str] = &["REXE6 G", "Gregar"];
const FALZAR_MARKERS: &[&str] = &["REXE6 F", "Falzar"];

fn check_range(buf: &[u8], offset: usize, len: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= buf.len() => Ok(()),
        _ => Err(FolderError::BufferTooShort {
            offset,
            len,
            available: buf.len(),
        }),
    }
}

pub fn read_u32_le(buf: &[u8], offset: usize) -> Result<u32> {
    check_range(buf, offset, 4)?;
    Ok(u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ]))
}

pub fn write_u32_le(buf: &mut [u8], offset: usize, value: u32) -> Result<()> {
    check_range(buf, offset, 4)?;
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// XORs every byte with the low byte of the mask word, then restores the
/// mask word itself. Applying it twice is the identity.
pub fn mask(buf: &mut [u8]) -> Result<()> {
    let mask = read_u32_le(buf, MASK_OFFSET)?;
    let mask_byte = (mask & 0xff) as u8;

    for byte in buf.iter_mut() {
        *byte ^= mask_byte;
    }

    write_u32_le(buf, MASK_OFFSET, mask)
}

/// Wrapping byte sum of `buf`, skipping `width` bytes at `checksum_offset`.
pub fn raw_checksum(buf: &[u8], checksum_offset: usize, width: usize) -> u32 {
    let skip = checksum_offset..checksum_offset.saturating_add(width);
    buf.iter()
        .enumerate()
        .filter(|(i, _)| !skip.contains(i))
        .fold(0u32, |sum, (_, &b)| sum.wrapping_add(u32::from(b)))
}

/// Checksum of an unmasked region, including the variant bonus.
pub fn compute_checksum(buf: &[u8]) -> Result<u32> {
    check_range(buf, CHECKSUM_OFFSET, CHECKSUM_SIZE)?;
    let variant = GameVariant::detect(&game_name(buf)?);
    Ok(raw_checksum(buf, CHECKSUM_OFFSET, CHECKSUM_SIZE).wrapping_add(variant.checksum_bonus()))
}

pub fn stored_checksum(buf: &[u8]) -> Result<u32> {
    read_u32_le(buf, CHECKSUM_OFFSET)
}

pub fn write_checksum(buf: &mut [u8]) -> Result<()> {
    let checksum = compute_checksum(buf)?;
    write_u32_le(buf, CHECKSUM_OFFSET, checksum)
}

/// The embedded game name, cut at the first NUL.
pub fn game_name(buf: &[u8]) -> Result<String> {
    check_range(buf, GAME_NAME_OFFSET, GAME_NAME_SIZE)?;
    let raw = &buf[GAME_NAME_OFFSET..GAME_NAME_OFFSET + GAME_NAME_SIZE];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    Ok(String::from_utf8_lossy(&raw[..end]).trim_end().to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameVariant {
    Gregar,
    Falzar,
    Unknown,
}

impl GameVariant {
    pub fn detect(game_name: &str) -> Self {
        if GREGAR_MARKERS.iter().any(|m| game_name.contains(m)) {
            GameVariant::Gregar
        } else if FALZAR_MARKERS.iter().any(|m| game_name.contains(m)) {
            GameVariant::Falzar
        } else {
            GameVariant::Unknown
        }
    }

    pub fn checksum_bonus(&self) -> u32 {
        match self {
            GameVariant::Gregar => 0x72,
            GameVariant::Falzar => 0x18,
            GameVariant::Unknown => 0,
        }
    }
}

impl fmt::Display for GameVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameVariant::Gregar => "Gregar",
            GameVariant::Falzar => "Falzar",
            GameVariant::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Problems found while loading that do not stop editing. The checksum is
/// rewritten on every export anyway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveWarning {
    ChecksumMismatch { stored: u32, computed: u32 },
}

impl fmt::Display for SaveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveWarning::ChecksumMismatch { stored, computed } => write!(
                f,
                "stored checksum {stored:#010x} does not match computed {computed:#010x}"
            ),
        }
    }
}

/// A whole save file with its save region held unmasked in memory.
///
/// Bytes outside the region are kept verbatim and spliced back on export.
#[derive(Debug, Clone)]
pub struct SaveImage {
    file: Vec<u8>,
    data: Vec<u8>,
    warnings: Vec<SaveWarning>,
}

impl SaveImage {
    pub fn from_file_bytes(file: Vec<u8>) -> Result<Self> {
        check_range(&file, SAVE_START_OFFSET, SAVE_SIZE)?;

        let mut data = file[SAVE_START_OFFSET..SAVE_START_OFFSET + SAVE_SIZE].to_vec();
        mask(&mut data)?;

        let mut warnings = Vec::new();
        let stored = stored_checksum(&data)?;
        let computed = compute_checksum(&data)?;
        if stored != computed {
            log::warn!("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}");
            warnings.push(SaveWarning::ChecksumMismatch { stored, computed });
        }

        let image = Self {
            file,
            data,
            warnings,
        };
        log::debug!(
            "opened save '{}' ({} variant)",
            image.game_name().unwrap_or_default(),
            image.variant()
        );
        Ok(image)
    }

    pub fn warnings(&self) -> &[SaveWarning] {
        &self.warnings
    }

    /// The unmasked save region.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn byte(&self, offset: usize) -> Result<u8> {
        check_range(&self.data, offset, 1)?;
        Ok(self.data[offset])
    }

    pub fn set_byte(&mut self, offset: usize, value: u8) -> Result<()> {
        check_range(&self.data, offset, 1)?;
        self.data[offset] = value;
        Ok(())
    }

    pub fn game_name(&self) -> Result<String> {
        game_name(&self.data)
    }

    pub fn variant(&self) -> GameVariant {
        self.game_name()
            .map(|name| GameVariant::detect(&name))
            .unwrap_or(GameVariant::Unknown)
    }

    pub fn checksum_valid(&self) -> Result<bool> {
        Ok(stored_checksum(&self.data)? == compute_checksum(&self.data)?)
    }

    pub fn folder_count(&self) -> Result<u8> {
        self.byte(layout::FOLDER_COUNT_OFFSET)
    }

    pub fn equipped_folder(&self) -> Result<usize> {
        self.byte(layout::equipped_folder_offset()).map(usize::from)
    }

    pub fn set_equipped_folder(&mut self, folder: usize) -> Result<()> {
        layout::folder_offset(folder)?;
        self.set_byte(layout::equipped_folder_offset(), folder as u8)
    }

    pub fn folder_slots(&self, folder: usize) -> Result<Vec<RawChipSlot>> {
        let base = layout::folder_offset(folder)?;
        check_range(&self.data, base, CHIPS_PER_FOLDER * CHIP_SIZE)?;
        Ok(self.data[base..base + CHIPS_PER_FOLDER * CHIP_SIZE]
            .chunks_exact(CHIP_SIZE)
            .map(|pair| RawChipSlot::from_bytes([pair[0], pair[1]]))
            .collect())
    }

    pub fn write_folder_slots(&mut self, folder: usize, slots: &[RawChipSlot]) -> Result<()> {
        if slots.len() != CHIPS_PER_FOLDER {
            return Err(FolderError::FolderSize {
                expected: CHIPS_PER_FOLDER,
                actual: slots.len(),
            });
        }
        let base = layout::folder_offset(folder)?;
        check_range(&self.data, base, CHIPS_PER_FOLDER * CHIP_SIZE)?;
        for (i, slot) in slots.iter().enumerate() {
            let offset = base + i * CHIP_SIZE;
            self.data[offset..offset + CHIP_SIZE].copy_from_slice(&slot.to_bytes());
        }
        Ok(())
    }

    pub fn reg_index(&self, folder: usize) -> Result<Option<usize>> {
        self.byte(layout::reg_offset(folder)?).map(layout::reg_from_byte)
    }

    pub fn set_reg_index(&mut self, folder: usize, reg: Option<usize>) -> Result<()> {
        self.set_byte(layout::reg_offset(folder)?, layout::reg_to_byte(reg))
    }

    pub fn tag_indices(&self, folder: usize) -> Result<Option<[usize; 2]>> {
        let offset = layout::tag_offset(folder)?;
        Ok(layout::tags_from_bytes([
            self.byte(offset)?,
            self.byte(offset + 1)?,
        ]))
    }

    pub fn set_tag_indices(&mut self, folder: usize, tags: Option<[usize; 2]>) -> Result<()> {
        let offset = layout::tag_offset(folder)?;
        let [first, second] = layout::tags_to_bytes(tags);
        self.set_byte(offset, first)?;
        self.set_byte(offset + 1, second)
    }

    /// Decodes a folder's slots, reg and tags.
    pub fn read_folder(&self, folder: usize, catalog: &ChipCatalog) -> Result<Folder> {
        let entries = self
            .folder_slots(folder)?
            .into_iter()
            .map(|slot| chip_codec::decode(slot, catalog))
            .collect::<Result<Vec<_>>>()?;

        Ok(Folder {
            entries,
            reg: self.reg_index(folder)?,
            tagged: self.tag_indices(folder)?,
        })
    }

    /// Encodes and writes a complete folder. The folder must hold exactly
    /// 30 chips with a valid reg and tag selection.
    pub fn write_folder(&mut self, folder: usize, contents: &Folder) -> Result<()> {
        contents.validate()?;
        let slots = contents
            .entries
            .iter()
            .map(|entry| chip_codec::encode(&entry.chip, entry.code))
            .collect::<Result<Vec<_>>>()?;

        self.write_folder_slots(folder, &slots)?;
        self.set_reg_index(folder, contents.reg)?;
        self.set_tag_indices(folder, contents.tagged)?;
        log::info!("wrote folder {folder}");
        Ok(())
    }

    /// Storage-ready file bytes: checksum recomputed, region masked and
    /// spliced back into the original file.
    pub fn to_file_bytes(&self) -> Result<Vec<u8>> {
        let mut region = self.data.clone();
        write_checksum(&mut region)?;
        mask(&mut region)?;

        let mut file = self.file.clone();
        file[SAVE_START_OFFSET..SAVE_START_OFFSET + SAVE_SIZE].copy_from_slice(&region);
        Ok(file)
    }

    pub fn into_file_bytes(self) -> Result<Vec<u8>> {
        self.to_file_bytes()
    }
}
