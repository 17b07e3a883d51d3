//! Folder presets: a folder stored as raw slots plus reg/tag indices.
//!
//! ```json
//! {"Regged": 0, "Tagged": [1, 2], "RawChips": [{"Id": 1, "Code": 0}, ...]}
//! ```

use serde::{Deserialize, Serialize};

use crate::catalog::ChipCatalog;
use crate::chip_codec::{self, RawChipSlot};
use crate::folder::Folder;
use crate::layout::{self, NO_INDEX};
use crate::{FolderError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FolderPreset {
    /// Reg index; negative or past the folder means none.
    pub regged: i32,
    #[serde(default)]
    pub tagged: Vec<i32>,
    pub raw_chips: Vec<RawChipSlot>,
}

fn stored_index(raw: i32) -> Option<usize> {
    u8::try_from(raw).ok().and_then(layout::reg_from_byte)
}

impl FolderPreset {
    pub fn from_folder(folder: &Folder) -> Result<Self> {
        let raw_chips = folder
            .entries
            .iter()
            .map(|entry| chip_codec::encode(&entry.chip, entry.code))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            regged: i32::from(layout::reg_to_byte(folder.reg)),
            tagged: folder
                .tagged
                .map(|tags| tags.iter().map(|&t| t as i32).collect())
                .unwrap_or_default(),
            raw_chips,
        })
    }

    pub fn to_folder(&self, catalog: &ChipCatalog) -> Result<Folder> {
        let entries = self
            .raw_chips
            .iter()
            .map(|&slot| chip_codec::decode(slot, catalog))
            .collect::<Result<Vec<_>>>()?;

        let tagged = match self.tagged.as_slice() {
            [] => None,
            [a, b] if *a == i32::from(NO_INDEX) || *b == i32::from(NO_INDEX) => None,
            [a, b] => match (stored_index(*a), stored_index(*b)) {
                (Some(a), Some(b)) => Some([a, b]),
                _ => return Err(invalid_tags(&self.tagged)),
            },
            _ => return Err(invalid_tags(&self.tagged)),
        };

        Ok(Folder {
            entries,
            reg: stored_index(self.regged),
            tagged,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn invalid_tags(tags: &[i32]) -> FolderError {
    FolderError::InvalidTags {
        tags: tags.iter().map(|&t| t.max(0) as usize).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::sample_catalog;
    use crate::catalog::ChipIdRef;
    use crate::folder::FolderEntry;
    use crate::layout::CHIPS_PER_FOLDER;

    fn sample_folder(catalog: &ChipCatalog) -> Folder {
        let picks = [
            (ChipIdRef::Primary(1), 'A'),
            (ChipIdRef::Primary(3), '*'),
            (ChipIdRef::Secondary(10), 'H'),
            (ChipIdRef::Primary(8), 'B'),
            (ChipIdRef::Primary(6), 'C'),
        ];
        let entries = (0..CHIPS_PER_FOLDER)
            .map(|i| {
                let (id, code) = picks[i % picks.len()];
                FolderEntry::new(catalog.find(id).unwrap(), code)
            })
            .collect();
        Folder {
            entries,
            reg: Some(0),
            tagged: Some([1, 2]),
        }
    }

    #[test]
    fn preset_survives_json_round_trip() {
        let catalog = sample_catalog();
        let folder = sample_folder(&catalog);

        let json = FolderPreset::from_folder(&folder).unwrap().to_json().unwrap();
        let restored = FolderPreset::from_json(&json).unwrap().to_folder(&catalog).unwrap();

        assert_eq!(restored, folder);
    }

    #[test]
    fn uses_original_field_names() {
        let catalog = sample_catalog();
        let preset = FolderPreset::from_folder(&sample_folder(&catalog)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&preset.to_json().unwrap()).unwrap();
        assert_eq!(value["Regged"], 0);
        assert_eq!(value["Tagged"], serde_json::json!([1, 2]));
        assert_eq!(value["RawChips"][2], serde_json::json!({"Id": 10, "Code": 15}));
    }

    #[test]
    fn missing_reg_and_tags() {
        let json = r#"{"Regged": -1, "RawChips": [{"Id": 1, "Code": 0}]}"#;
        let folder = FolderPreset::from_json(json).unwrap().to_folder(&sample_catalog()).unwrap();
        assert_eq!(folder.reg, None);
        assert_eq!(folder.tagged, None);
        assert_eq!(folder.entries[0].chip.name, "Cannon");

        let preset = FolderPreset::from_folder(&folder).unwrap();
        assert_eq!(preset.regged, 0xff);
        assert!(preset.tagged.is_empty());
    }

    #[test]
    fn malformed_tags_are_rejected() {
        let json = r#"{"Regged": 0, "Tagged": [3], "RawChips": []}"#;
        let err = FolderPreset::from_json(json).unwrap().to_folder(&sample_catalog()).unwrap_err();
        assert!(matches!(err, FolderError::InvalidTags { .. }));
    }

    #[test]
    fn unknown_slot_id_fails_decode() {
        let json = r#"{"Regged": 0, "Tagged": [], "RawChips": [{"Id": 99, "Code": 1}]}"#;
        let err = FolderPreset::from_json(json).unwrap().to_folder(&sample_catalog()).unwrap_err();
        assert!(matches!(err, FolderError::UnknownChipId { .. }));
    }
}
