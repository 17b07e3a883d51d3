use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::{Chip, ChipCatalog, ChipClass};
use crate::layout::CHIPS_PER_FOLDER;
use crate::{FolderError, Result};

/// Highest MB cost a reg chip may have.
pub const REG_MB_LIMIT: u32 = 50;

/// One folder slot: a shared catalog chip plus the code chosen for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub chip: Arc<Chip>,
    pub code: char,
}

impl FolderEntry {
    pub fn new(chip: Arc<Chip>, code: char) -> Self {
        Self { chip, code }
    }

    pub fn name(&self) -> &str {
        &self.chip.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Folder {
    pub entries: Vec<FolderEntry>,
    pub reg: Option<usize>,
    pub tagged: Option<[usize; 2]>,
}

impl Folder {
    pub fn new(entries: Vec<FolderEntry>) -> Self {
        Self {
            entries,
            reg: None,
            tagged: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks that the folder can be written to a save: 30 chips, a reg
    /// chip within the MB limit, two distinct tags that are not the reg.
    pub fn validate(&self) -> Result<()> {
        if self.entries.len() != CHIPS_PER_FOLDER {
            return Err(FolderError::FolderSize {
                expected: CHIPS_PER_FOLDER,
                actual: self.entries.len(),
            });
        }

        if let Some(reg) = self.reg {
            match self.entries.get(reg) {
                Some(entry) if entry.chip.mb <= REG_MB_LIMIT => {}
                _ => return Err(FolderError::InvalidReg { index: reg }),
            }
        }

        if let Some([a, b]) = self.tagged {
            let in_range = a < self.entries.len() && b < self.entries.len();
            if !in_range || a == b || self.reg == Some(a) || self.reg == Some(b) {
                return Err(FolderError::InvalidTags { tags: vec![a, b] });
            }
        }

        Ok(())
    }

    /// Moves the reg chip to the front and the tagged chips right after it,
    /// keeping every other chip in its relative order.
    pub fn canonicalize(&mut self) {
        let mut leading: Vec<usize> = Vec::with_capacity(3);
        leading.extend(self.reg);
        if let Some(tags) = self.tagged {
            leading.extend(tags);
        }
        if leading.is_empty() || leading.iter().any(|&i| i >= self.entries.len()) {
            return;
        }

        let mut reordered: Vec<FolderEntry> = leading
            .iter()
            .map(|&i| self.entries[i].clone())
            .collect();
        reordered.extend(
            self.entries
                .iter()
                .enumerate()
                .filter(|(i, _)| !leading.contains(i))
                .map(|(_, entry)| entry.clone()),
        );
        self.entries = reordered;

        let tag_start = usize::from(self.reg.is_some());
        if self.reg.is_some() {
            self.reg = Some(0);
        }
        if self.tagged.is_some() {
            self.tagged = Some([tag_start, tag_start + 1]);
        }
    }
}

/// Maximum copies of one chip name, by MB cost.
pub fn copy_limit(mb: u32) -> usize {
    match mb {
        0..=19 => 5,
        20..=29 => 4,
        30..=39 => 3,
        40..=49 => 2,
        _ => 1,
    }
}

/// Folder building rules: per-name copy limits and Mega/Giga caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRules {
    pub enforce: bool,
    pub max_mega: usize,
    pub max_giga: usize,
}

impl Default for FolderRules {
    fn default() -> Self {
        Self {
            enforce: true,
            max_mega: 5,
            max_giga: 1,
        }
    }
}

impl FolderRules {
    pub fn class_cap(&self, class: ChipClass) -> Option<usize> {
        match class {
            ChipClass::Standard => None,
            ChipClass::Mega => Some(self.max_mega),
            ChipClass::Giga => Some(self.max_giga),
        }
    }

    /// Whether `chip` may join a folder already holding `entries`.
    pub fn can_add(&self, entries: &[FolderEntry], chip: &Chip, catalog: &ChipCatalog) -> bool {
        if !self.enforce {
            return true;
        }

        let copies = entries.iter().filter(|e| e.chip.name == chip.name).count();
        if copies >= copy_limit(chip.mb) {
            return false;
        }

        for class in [ChipClass::Mega, ChipClass::Giga] {
            let Some(cap) = self.class_cap(class) else {
                continue;
            };
            if catalog.name_in_class(&chip.name, class)
                && count_in_class(entries, class, catalog) >= cap
            {
                return false;
            }
        }

        true
    }
}

/// Entries whose chip name belongs to the `class` catalog.
pub fn count_in_class(entries: &[FolderEntry], class: ChipClass, catalog: &ChipCatalog) -> usize {
    entries
        .iter()
        .filter(|e| catalog.name_in_class(&e.chip.name, class))
        .count()
}
