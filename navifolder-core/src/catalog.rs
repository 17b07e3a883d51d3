//! Chip catalog: the immutable list of chip descriptors for one session.
//!
//! Chips come from three class-partitioned JSON arrays (`Standard.json`,
//! `Mega.json`, `Giga.json`). Each record may carry a primary id (`SId`),
//! a secondary id (`MId`) or both; slots in a save refer to one of the two
//! id spaces, so lookup goes through two separate maps.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::{FolderError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChipClass {
    Standard,
    Mega,
    Giga,
}

impl ChipClass {
    pub const ALL: [ChipClass; 3] = [ChipClass::Standard, ChipClass::Mega, ChipClass::Giga];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChipClass::Standard => "Standard",
            ChipClass::Mega => "Mega",
            ChipClass::Giga => "Giga",
        }
    }

    /// Catalog file holding this class.
    pub fn file_name(&self) -> &'static str {
        match self {
            ChipClass::Standard => "Standard.json",
            ChipClass::Mega => "Mega.json",
            ChipClass::Giga => "Giga.json",
        }
    }
}

impl fmt::Display for ChipClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference into one of the two id spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChipIdRef {
    Primary(u16),
    Secondary(u16),
}

impl fmt::Display for ChipIdRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChipIdRef::Primary(id) => write!(f, "SId {id}"),
            ChipIdRef::Secondary(id) => write!(f, "MId {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chip {
    pub name: String,
    pub class: ChipClass,
    pub codes: Vec<char>,
    pub element: String,
    /// Raw damage text: a number, a range such as `"60-120"`, or anything else.
    pub damage: String,
    pub mb: u32,
    pub sid: Option<u16>,
    pub mid: Option<u16>,
    pub description: String,
    pub image: String,
}

impl Chip {
    /// Damage used for filtering: the upper bound of a range, 0 when not numeric.
    pub fn effective_damage(&self) -> u32 {
        parse_stat(&self.damage)
    }

    pub fn has_code(&self, code: char) -> bool {
        self.codes.contains(&code)
    }

    /// The id a slot uses for this chip. `MId` wins when both exist.
    pub fn slot_id(&self) -> Option<ChipIdRef> {
        match (self.mid, self.sid) {
            (Some(mid), _) => Some(ChipIdRef::Secondary(mid)),
            (None, Some(sid)) => Some(ChipIdRef::Primary(sid)),
            (None, None) => None,
        }
    }
}

/// Parses a numeric stat. Ranges resolve to their largest bound and
/// anything non-numeric becomes 0.
fn parse_stat(raw: &str) -> u32 {
    raw.split('-')
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn as_text(&self) -> String {
        match self {
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }

    fn as_id(&self) -> Option<u16> {
        match self {
            Scalar::Int(n) => u16::try_from(*n).ok(),
            Scalar::Float(f) if f.fract() == 0.0 && *f >= 0.0 => u16::try_from(*f as i64).ok(),
            Scalar::Float(_) => None,
            Scalar::Text(s) => s.trim().parse::<u16>().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ChipRecord {
    #[serde(rename = "SId", default)]
    sid: Option<Scalar>,
    #[serde(rename = "MId", default)]
    mid: Option<Scalar>,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    damage: Option<Scalar>,
    #[serde(default)]
    code: Vec<Option<String>>,
    #[serde(default)]
    element: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(rename = "MB", default)]
    mb: Option<Scalar>,
}

impl ChipRecord {
    fn into_chip(self, class: ChipClass) -> Chip {
        let codes = self
            .code
            .iter()
            .flatten()
            .filter_map(|c| c.trim().chars().next())
            .map(|c| c.to_ascii_uppercase())
            .fold(Vec::new(), |mut acc, c| {
                if !acc.contains(&c) {
                    acc.push(c);
                }
                acc
            });

        Chip {
            name: self.name,
            class,
            codes,
            element: self.element.unwrap_or_default(),
            damage: self.damage.map(|d| d.as_text()).unwrap_or_default(),
            mb: self.mb.map(|m| parse_stat(&m.as_text())).unwrap_or(0),
            sid: self.sid.as_ref().and_then(Scalar::as_id),
            mid: self.mid.as_ref().and_then(Scalar::as_id),
            description: self.description.unwrap_or_default(),
            image: self.image.unwrap_or_default(),
        }
    }
}

/// Parses one class-partitioned catalog array. Rows repeating the same
/// chip (same ids, name, description, element and MB) are merged and
/// their codes unioned in first-seen order.
pub fn parse_class(json: &str, class: ChipClass) -> Result<Vec<Chip>> {
    let records: Vec<ChipRecord> = serde_json::from_str(json)?;

    let mut chips: Vec<Chip> = Vec::with_capacity(records.len());
    let mut seen: HashMap<(Option<u16>, Option<u16>, String, String, String, u32), usize> =
        HashMap::new();

    for record in records {
        let chip = record.into_chip(class);
        let key = (
            chip.sid,
            chip.mid,
            chip.name.clone(),
            chip.description.clone(),
            chip.element.clone(),
            chip.mb,
        );
        match seen.get(&key) {
            Some(&idx) => {
                let existing = &mut chips[idx];
                for code in chip.codes {
                    if !existing.codes.contains(&code) {
                        existing.codes.push(code);
                    }
                }
            }
            None => {
                seen.insert(key, chips.len());
                chips.push(chip);
            }
        }
    }

    Ok(chips)
}

#[derive(Debug, Default, Clone)]
pub struct ChipCatalog {
    chips: Vec<Arc<Chip>>,
    by_primary: HashMap<u16, Arc<Chip>>,
    by_secondary: HashMap<u16, Arc<Chip>>,
    mega_names: HashSet<String>,
    giga_names: HashSet<String>,
}

impl ChipCatalog {
    /// Builds a catalog from already parsed chips. Lookups keep the first
    /// chip seen for each id.
    pub fn from_chips<I>(chips: I) -> Self
    where
        I: IntoIterator<Item = Chip>,
    {
        let mut catalog = ChipCatalog::default();
        for chip in chips {
            let chip = Arc::new(chip);
            if let Some(sid) = chip.sid {
                catalog.by_primary.entry(sid).or_insert_with(|| Arc::clone(&chip));
            }
            if let Some(mid) = chip.mid {
                catalog.by_secondary.entry(mid).or_insert_with(|| Arc::clone(&chip));
            }
            match chip.class {
                ChipClass::Mega => {
                    catalog.mega_names.insert(chip.name.clone());
                }
                ChipClass::Giga => {
                    catalog.giga_names.insert(chip.name.clone());
                }
                ChipClass::Standard => {}
            }
            catalog.chips.push(chip);
        }
        catalog
    }

    pub fn from_json(standard: &str, mega: &str, giga: &str) -> Result<Self> {
        let mut chips = parse_class(standard, ChipClass::Standard)?;
        chips.extend(parse_class(mega, ChipClass::Mega)?);
        chips.extend(parse_class(giga, ChipClass::Giga)?);
        Ok(Self::from_chips(chips))
    }

    /// Loads `Standard.json`, `Mega.json` and `Giga.json` from `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut sources = Vec::with_capacity(ChipClass::ALL.len());
        for class in ChipClass::ALL {
            let path = dir.join(class.file_name());
            if !path.exists() {
                return Err(FolderError::Config(format!(
                    "Could not find {} under {}",
                    class.file_name(),
                    dir.display()
                )));
            }
            sources.push(fs::read_to_string(&path)?);
        }

        let catalog = Self::from_json(&sources[0], &sources[1], &sources[2])?;
        log::info!(
            "loaded {} chips from {} ({} mega, {} giga names)",
            catalog.len(),
            dir.display(),
            catalog.mega_names.len(),
            catalog.giga_names.len()
        );
        Ok(catalog)
    }

    pub fn chips(&self) -> &[Arc<Chip>] {
        &self.chips
    }

    pub fn len(&self) -> usize {
        self.chips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }

    pub fn find(&self, id: ChipIdRef) -> Option<Arc<Chip>> {
        match id {
            ChipIdRef::Primary(sid) => self.by_primary.get(&sid),
            ChipIdRef::Secondary(mid) => self.by_secondary.get(&mid),
        }
        .cloned()
    }

    /// Chips of the given classes, in catalog order.
    pub fn chips_of(&self, classes: &[ChipClass]) -> Vec<Arc<Chip>> {
        self.chips
            .iter()
            .filter(|chip| classes.contains(&chip.class))
            .cloned()
            .collect()
    }

    /// Whether `name` appears in the catalog of `class`. Standard always
    /// answers false: only Mega and Giga names are capped.
    pub fn name_in_class(&self, name: &str, class: ChipClass) -> bool {
        match class {
            ChipClass::Mega => self.mega_names.contains(name),
            ChipClass::Giga => self.giga_names.contains(name),
            ChipClass::Standard => false,
        }
    }

    pub fn is_mega_name(&self, name: &str) -> bool {
        self.name_in_class(name, ChipClass::Mega)
    }

    pub fn is_giga_name(&self, name: &str) -> bool {
        self.name_in_class(name, ChipClass::Giga)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Small catalog shared by the codec, folder and generator tests.
    pub(crate) fn sample_catalog() -> ChipCatalog {
        let standard = r#"[
            {"SId": "1", "MId": "", "Name": "Cannon", "Description": "Cannon to attack 1 enemy", "Damage": "40", "Code": ["A"], "Element": "Null", "Image": "1.png", "MB": "6"},
            {"SId": "1", "MId": "", "Name": "Cannon", "Description": "Cannon to attack 1 enemy", "Damage": "40", "Code": ["B"], "Element": "Null", "Image": "1.png", "MB": "6"},
            {"SId": "2", "MId": null, "Name": "HiCannon", "Description": "", "Damage": "100", "Code": ["C", "D", "E"], "Element": "Null", "Image": "2.png", "MB": "24"},
            {"SId": 3, "Name": "HeatShot", "Damage": "20-40", "Code": ["F", "G", "*"], "Element": "Fire", "MB": 8},
            {"SId": "4", "Name": "Bubbler", "Damage": "50", "Code": ["A", "F"], "Element": "Aqua", "MB": "14"},
            {"SId": "5", "Name": "ElecSword", "Damage": "160", "Code": ["L", "M", "*"], "Element": "Elec", "MB": "42"},
            {"SId": "6", "Name": "Recover10", "Damage": "", "Code": ["A", "C", "*"], "Element": "Null", "MB": "4"},
            {"SId": "7", "Name": "AreaGrab", "Damage": "10", "Code": ["S", "*"], "Element": "Null", "MB": "35"}
        ]"#;
        let mega = r#"[
            {"SId": "", "MId": "10", "Name": "HeatMan", "Damage": "130", "Code": ["H"], "Element": "Fire", "MB": "49"},
            {"SId": "", "MId": "11", "Name": "ElecMan", "Damage": "120", "Code": ["E"], "Element": "Elec", "MB": "51"},
            {"SId": "8", "MId": "12", "Name": "BassAnly", "Damage": "200", "Code": ["B"], "Element": "Null", "MB": "72"}
        ]"#;
        let giga = r#"[
            {"SId": "", "MId": "20", "Name": "BugRSword", "Damage": "?", "Code": ["B"], "Element": "Null", "MB": "80"},
            {"SId": "", "MId": "21", "Name": "DeltaRay", "Damage": "200-300", "Code": ["Z"], "Element": "Null", "MB": "85"}
        ]"#;
        ChipCatalog::from_json(standard, mega, giga).unwrap()
    }

    #[test]
    fn merges_duplicate_rows_by_key() {
        let catalog = sample_catalog();
        let cannons: Vec<_> = catalog.chips().iter().filter(|c| c.name == "Cannon").collect();
        assert_eq!(cannons.len(), 1);
        assert_eq!(cannons[0].codes, vec!['A', 'B']);
    }

    #[test]
    fn parses_string_and_numeric_fields() {
        let catalog = sample_catalog();
        let heat = catalog.find(ChipIdRef::Primary(3)).unwrap();
        assert_eq!(heat.name, "HeatShot");
        assert_eq!(heat.mb, 8);
        assert_eq!(heat.effective_damage(), 40);
        assert_eq!(heat.mid, None);

        let recover = catalog.find(ChipIdRef::Primary(6)).unwrap();
        assert_eq!(recover.effective_damage(), 0);

        let bug = catalog.find(ChipIdRef::Secondary(20)).unwrap();
        assert_eq!(bug.effective_damage(), 0);
        assert_eq!(bug.class, ChipClass::Giga);
    }

    #[test]
    fn id_spaces_are_separate() {
        let catalog = sample_catalog();
        assert_eq!(catalog.find(ChipIdRef::Primary(8)).unwrap().name, "BassAnly");
        assert_eq!(catalog.find(ChipIdRef::Secondary(12)).unwrap().name, "BassAnly");
        assert!(catalog.find(ChipIdRef::Secondary(1)).is_none());
        assert!(catalog.find(ChipIdRef::Primary(10)).is_none());
    }

    #[test]
    fn slot_id_prefers_secondary() {
        let catalog = sample_catalog();
        let bass = catalog.find(ChipIdRef::Primary(8)).unwrap();
        assert_eq!(bass.slot_id(), Some(ChipIdRef::Secondary(12)));
        let cannon = catalog.find(ChipIdRef::Primary(1)).unwrap();
        assert_eq!(cannon.slot_id(), Some(ChipIdRef::Primary(1)));
    }

    #[test]
    fn class_name_membership() {
        let catalog = sample_catalog();
        assert!(catalog.is_mega_name("HeatMan"));
        assert!(!catalog.is_mega_name("Cannon"));
        assert!(catalog.is_giga_name("DeltaRay"));
        assert!(!catalog.name_in_class("Cannon", ChipClass::Standard));
    }

    #[test]
    fn chips_of_keeps_catalog_order() {
        let catalog = sample_catalog();
        let names: Vec<_> = catalog
            .chips_of(&[ChipClass::Mega, ChipClass::Giga])
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, vec!["HeatMan", "ElecMan", "BassAnly", "BugRSword", "DeltaRay"]);
    }

    #[test]
    fn load_dir_reads_three_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Standard.json"), r#"[{"SId": "1", "Name": "Cannon", "Code": ["A"], "MB": "6"}]"#).unwrap();
        fs::write(dir.path().join("Mega.json"), "[]").unwrap();
        fs::write(dir.path().join("Giga.json"), "[]").unwrap();

        let catalog = ChipCatalog::load_dir(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn load_dir_names_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Standard.json"), "[]").unwrap();
        let err = ChipCatalog::load_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Mega.json"));
    }
}
