//! Packed two-byte chip slots.
//!
//! Byte 0 is the chip id, byte 1 the code byte. The code byte's low bit
//! selects the id space (even: `SId`, odd: `MId`) and the rest is the
//! index into [`CODE_ALPHABET`].

use serde::{Deserialize, Serialize};

use crate::catalog::{Chip, ChipCatalog, ChipIdRef};
use crate::folder::FolderEntry;
use crate::{FolderError, Result};

pub const CODE_ALPHABET: [char; 27] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S',
    'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '*',
];

pub fn code_index(code: char) -> Result<u8> {
    CODE_ALPHABET
        .iter()
        .position(|&c| c == code)
        .map(|i| i as u8)
        .ok_or(FolderError::InvalidCode { code })
}

pub fn code_at(index: u8) -> Result<char> {
    CODE_ALPHABET
        .get(usize::from(index))
        .copied()
        .ok_or(FolderError::InvalidCodeIndex { index })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawChipSlot {
    pub id: u8,
    pub code: u8,
}

impl RawChipSlot {
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self {
            id: bytes[0],
            code: bytes[1],
        }
    }

    pub fn to_bytes(self) -> [u8; 2] {
        [self.id, self.code]
    }

    pub fn id_ref(self) -> ChipIdRef {
        if self.code % 2 == 1 {
            ChipIdRef::Secondary(u16::from(self.id))
        } else {
            ChipIdRef::Primary(u16::from(self.id))
        }
    }

    pub fn code_index(self) -> u8 {
        self.code / 2
    }
}

/// Resolves a slot against the catalog. An id with no catalog entry is an
/// error; no placeholder chip is ever produced.
pub fn decode(slot: RawChipSlot, catalog: &ChipCatalog) -> Result<FolderEntry> {
    let code = code_at(slot.code_index())?;
    let id = slot.id_ref();
    let chip = catalog.find(id).ok_or(FolderError::UnknownChipId { id })?;
    Ok(FolderEntry::new(chip, code))
}

pub fn encode(chip: &Chip, code: char) -> Result<RawChipSlot> {
    let index = code_index(code)?;
    let id_ref = chip.slot_id().ok_or_else(|| FolderError::ChipIdOutOfRange {
        name: chip.name.clone(),
    })?;

    let (id, parity) = match id_ref {
        ChipIdRef::Primary(id) => (id, 0),
        ChipIdRef::Secondary(id) => (id, 1),
    };
    let id = u8::try_from(id).map_err(|_| FolderError::ChipIdOutOfRange {
        name: chip.name.clone(),
    })?;

    Ok(RawChipSlot {
        id,
        code: index * 2 + parity,
    })
}
