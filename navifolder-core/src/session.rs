//! One editing session: a loaded save, the selected folder slot and the
//! folder being worked on.

use std::fmt;
use std::sync::Arc;

use crate::catalog::ChipCatalog;
use crate::folder::Folder;
use crate::generator::{FolderGenerator, GenerationWarning, GeneratorSettings};
use crate::layout::MAX_FOLDERS;
use crate::preset::FolderPreset;
use crate::save::{SaveImage, SaveWarning};
use crate::{FolderError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    Save(SaveWarning),
    Generation(GenerationWarning),
    /// The stored folder could not be decoded; the save stays open.
    UnreadableFolder { folder: usize, reason: String },
}

impl From<SaveWarning> for Warning {
    fn from(warning: SaveWarning) -> Self {
        Warning::Save(warning)
    }
}

impl From<GenerationWarning> for Warning {
    fn from(warning: GenerationWarning) -> Self {
        Warning::Generation(warning)
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::Save(w) => w.fmt(f),
            Warning::Generation(w) => w.fmt(f),
            Warning::UnreadableFolder { folder, reason } => {
                write!(f, "folder {folder} could not be read: {reason}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct EditorSession {
    catalog: Arc<ChipCatalog>,
    save: Option<SaveImage>,
    selected_folder: usize,
    folder: Option<Folder>,
    warnings: Vec<Warning>,
}

impl EditorSession {
    pub fn new(catalog: Arc<ChipCatalog>) -> Self {
        Self {
            catalog,
            save: None,
            selected_folder: 0,
            folder: None,
            warnings: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &ChipCatalog {
        &self.catalog
    }

    /// Parses a save file and loads its equipped folder as the working folder.
    pub fn open_save(&mut self, bytes: Vec<u8>) -> Result<()> {
        let image = SaveImage::from_file_bytes(bytes)?;

        let mut equipped = image.equipped_folder()?;
        if equipped >= MAX_FOLDERS {
            log::warn!("equipped folder byte {equipped} is out of range, using folder 0");
            equipped = 0;
        }

        self.warnings = image.warnings().iter().cloned().map(Warning::from).collect();
        self.save = Some(image);
        self.load_folder(equipped)
    }

    /// Selects `folder` and decodes it. A folder that does not decode leaves
    /// no working folder and records a warning.
    fn load_folder(&mut self, folder: usize) -> Result<()> {
        let image = self.save.as_ref().ok_or_else(no_save)?;
        match image.read_folder(folder, &self.catalog) {
            Ok(contents) => self.folder = Some(contents),
            Err(err) => {
                log::warn!("folder {folder} could not be decoded: {err}");
                self.warnings.push(Warning::UnreadableFolder {
                    folder,
                    reason: err.to_string(),
                });
                self.folder = None;
            }
        }
        self.selected_folder = folder;
        Ok(())
    }

    fn loaded(&self) -> Result<&SaveImage> {
        self.save.as_ref().ok_or_else(no_save)
    }

    pub fn save(&self) -> Option<&SaveImage> {
        self.save.as_ref()
    }

    pub fn selected_folder(&self) -> usize {
        self.selected_folder
    }

    /// Switches to another folder of the open save, replacing the working
    /// folder with its stored contents.
    pub fn select_folder(&mut self, folder: usize) -> Result<()> {
        if folder >= MAX_FOLDERS {
            return Err(FolderError::InvalidFolderIndex { folder });
        }
        self.loaded()?;
        self.warnings.clear();
        self.load_folder(folder)
    }

    pub fn folder(&self) -> Option<&Folder> {
        self.folder.as_ref()
    }

    pub fn set_folder(&mut self, folder: Folder) {
        self.folder = Some(folder);
    }

    /// Replaces the working folder with a freshly generated one.
    pub fn generate(&mut self, settings: &GeneratorSettings) -> &Folder {
        let generation = FolderGenerator::new(&self.catalog, settings).generate();
        self.warnings = generation.warnings.into_iter().map(Warning::from).collect();
        self.folder.insert(generation.folder)
    }

    /// Writes the working folder into the selected slot of the open save.
    pub fn commit(&mut self) -> Result<()> {
        let folder = self
            .folder
            .as_ref()
            .ok_or_else(|| FolderError::Config("no folder to commit".to_string()))?;
        let image = self.save.as_mut().ok_or_else(no_save)?;
        image.write_folder(self.selected_folder, folder)
    }

    pub fn export_save(&self) -> Result<Vec<u8>> {
        self.loaded()?.to_file_bytes()
    }

    pub fn export_preset(&self) -> Result<FolderPreset> {
        let folder = self
            .folder
            .as_ref()
            .ok_or_else(|| FolderError::Config("no folder to export".to_string()))?;
        FolderPreset::from_folder(folder)
    }

    pub fn import_preset(&mut self, preset: &FolderPreset) -> Result<()> {
        let folder = preset.to_folder(&self.catalog)?;
        log::info!("imported preset of {} chips", folder.len());
        self.folder = Some(folder);
        Ok(())
    }

    /// Warnings from the last open, select or generate.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}

fn no_save() -> FolderError {
    FolderError::Config("no save file is open".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::sample_catalog;
    use crate::catalog::ChipIdRef;
    use crate::chip_codec;
    use crate::folder::FolderEntry;
    use crate::layout::CHIPS_PER_FOLDER;
    use crate::save::tests::{blank_region, file_from_region};
    use crate::save::{write_u32_le, CHECKSUM_OFFSET};

    fn session() -> EditorSession {
        EditorSession::new(Arc::new(sample_catalog()))
    }

    fn blank_file() -> Vec<u8> {
        file_from_region(blank_region("REXE6 G 20050924a JP", 0x3c), true)
    }

    /// A save whose folder 1 holds alternating Cannon A / HeatShot * and is
    /// equipped.
    fn stocked_file() -> Vec<u8> {
        let catalog = sample_catalog();
        let cannon = catalog.find(ChipIdRef::Primary(1)).unwrap();
        let heat = catalog.find(ChipIdRef::Primary(3)).unwrap();
        let slots: Vec<_> = (0..CHIPS_PER_FOLDER)
            .map(|i| {
                if i % 2 == 0 {
                    chip_codec::encode(&cannon, 'A').unwrap()
                } else {
                    chip_codec::encode(&heat, '*').unwrap()
                }
            })
            .collect();

        let mut image = SaveImage::from_file_bytes(blank_file()).unwrap();
        image.write_folder_slots(1, &slots).unwrap();
        image.set_reg_index(1, Some(0)).unwrap();
        image.set_tag_indices(1, Some([1, 2])).unwrap();
        image.set_equipped_folder(1).unwrap();
        image.into_file_bytes().unwrap()
    }

    fn loose_settings(seed: &str) -> GeneratorSettings {
        GeneratorSettings {
            seed: Some(seed.to_string()),
            allow_folder_rules: false,
            ..GeneratorSettings::default()
        }
    }

    #[test]
    fn open_reads_equipped_folder() {
        let mut session = session();
        session.open_save(stocked_file()).unwrap();

        assert_eq!(session.selected_folder(), 1);
        assert!(session.warnings().is_empty());
        let folder = session.folder().unwrap();
        assert_eq!(folder.len(), CHIPS_PER_FOLDER);
        assert_eq!(folder.entries[0].name(), "Cannon");
        assert_eq!(folder.entries[1].name(), "HeatShot");
        assert_eq!(folder.entries[1].code, '*');
        assert_eq!(folder.reg, Some(0));
        assert_eq!(folder.tagged, Some([1, 2]));
    }

    #[test]
    fn unknown_ids_leave_save_open_without_folder() {
        let mut session = session();
        session.open_save(blank_file()).unwrap();

        assert!(session.save().is_some());
        assert!(session.folder().is_none());
        assert!(matches!(
            session.warnings(),
            [Warning::UnreadableFolder { folder: 0, .. }]
        ));
    }

    #[test]
    fn checksum_warning_is_surfaced() {
        let mut region = blank_region("REXE6 F", 0x10);
        write_u32_le(&mut region, CHECKSUM_OFFSET, 1).unwrap();
        let mut session = session();
        session.open_save(file_from_region(region, false)).unwrap();
        assert!(matches!(
            session.warnings().first(),
            Some(Warning::Save(SaveWarning::ChecksumMismatch { stored: 1, .. }))
        ));
    }

    #[test]
    fn generate_commit_export_reopen() {
        let mut session = session();
        session.open_save(blank_file()).unwrap();
        let generated = session.generate(&loose_settings("commit")).clone();
        assert_eq!(generated.len(), CHIPS_PER_FOLDER);

        session.commit().unwrap();
        let bytes = session.export_save().unwrap();

        let mut reopened = self::session();
        reopened.open_save(bytes).unwrap();
        assert!(reopened.warnings().is_empty());
        assert_eq!(reopened.folder(), Some(&generated));
    }

    #[test]
    fn commit_needs_save_and_folder() {
        let mut session = session();
        assert!(matches!(session.commit(), Err(FolderError::Config(_))));
        session.generate(&loose_settings("no-save"));
        assert!(matches!(session.commit(), Err(FolderError::Config(_))));
        assert!(session.export_save().is_err());
    }

    #[test]
    fn short_folder_cannot_be_committed() {
        let mut session = session();
        session.open_save(blank_file()).unwrap();
        let cannon = session.catalog().find(ChipIdRef::Primary(1)).unwrap();
        session.set_folder(Folder::new(vec![FolderEntry::new(cannon, 'A')]));
        assert!(matches!(
            session.commit(),
            Err(FolderError::FolderSize { actual: 1, .. })
        ));
    }

    #[test]
    fn select_folder_switches_contents() {
        let mut session = session();
        session.open_save(stocked_file()).unwrap();

        session.select_folder(0).unwrap();
        assert_eq!(session.selected_folder(), 0);
        assert!(session.folder().is_none());
        assert!(matches!(
            session.warnings(),
            [Warning::UnreadableFolder { folder: 0, .. }]
        ));

        assert!(matches!(
            session.select_folder(3),
            Err(FolderError::InvalidFolderIndex { folder: 3 })
        ));
        session.select_folder(1).unwrap();
        assert!(session.warnings().is_empty());
        assert_eq!(session.folder().unwrap().entries[0].name(), "Cannon");
    }

    #[test]
    fn select_folder_needs_open_save() {
        let mut session = session();
        assert!(matches!(session.select_folder(1), Err(FolderError::Config(_))));
    }

    #[test]
    fn preset_moves_folder_between_sessions() {
        let mut source = session();
        source.open_save(stocked_file()).unwrap();
        let preset = source.export_preset().unwrap();

        let mut target = session();
        target.open_save(blank_file()).unwrap();
        target.import_preset(&preset).unwrap();
        target.commit().unwrap();

        let mut check = session();
        check.open_save(target.export_save().unwrap()).unwrap();
        assert_eq!(check.folder(), source.folder());
        assert_eq!(check.selected_folder(), 0);
    }
}
