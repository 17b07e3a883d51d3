use thiserror::Error;

pub mod catalog;
pub mod chip_codec;
pub mod folder;
pub mod generator;
pub mod layout;
pub mod preset;
pub mod rng;
pub mod save;
pub mod session;

pub use catalog::{Chip, ChipCatalog, ChipClass, ChipIdRef};
pub use chip_codec::{decode, encode, RawChipSlot, CODE_ALPHABET};
pub use folder::{Folder, FolderEntry, FolderRules};
pub use generator::{generate_folder, FolderGenerator, Generation, GenerationWarning, GeneratorSettings};
pub use preset::FolderPreset;
pub use rng::{Seed, SeededGenerator};
pub use save::{GameVariant, SaveImage, SaveWarning};
pub use session::{EditorSession, Warning};

#[derive(Debug, Error)]
pub enum FolderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no catalog entry for {id}")]
    UnknownChipId { id: ChipIdRef },
    #[error("'{code}' is not a chip code")]
    InvalidCode { code: char },
    #[error("code index {index} is outside the code alphabet")]
    InvalidCodeIndex { index: u8 },
    #[error("chip '{name}' has no id that fits in a slot byte")]
    ChipIdOutOfRange { name: String },
    #[error("access of {len} bytes at {offset:#06x} exceeds buffer of {available} bytes")]
    BufferTooShort {
        offset: usize,
        len: usize,
        available: usize,
    },
    #[error("folder holds {actual} chips, expected {expected}")]
    FolderSize { expected: usize, actual: usize },
    #[error("folder index {folder} is out of range")]
    InvalidFolderIndex { folder: usize },
    #[error("index {index} cannot be the reg chip")]
    InvalidReg { index: usize },
    #[error("invalid tagged indices {tags:?}")]
    InvalidTags { tags: Vec<usize> },
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FolderError>;
