use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use navifolder_core::{
    ChipCatalog, EditorSession, Folder, FolderError, FolderPreset, GeneratorSettings, Result,
    Warning,
};

#[derive(Debug, Parser)]
#[command(name = "navifolder", version, about = "Battle Network 6 chip folder editor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print save details and the chips of one folder
    Inspect {
        #[arg(long)]
        save: PathBuf,
        /// Directory holding Standard.json, Mega.json and Giga.json
        #[arg(long)]
        catalog: PathBuf,
        /// Folder to show; defaults to the equipped folder
        #[arg(long)]
        folder: Option<usize>,
    },

    /// Generate a random folder, optionally writing it into a save
    Generate(GenerateArgs),

    /// Write a folder of a save out as a preset file
    ExportPreset {
        #[arg(long)]
        save: PathBuf,
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        folder: Option<usize>,
    },

    /// Replace a folder of a save with the contents of a preset file
    ApplyPreset {
        #[arg(long)]
        save: PathBuf,
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long)]
        preset: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        folder: Option<usize>,
    },
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long)]
    catalog: PathBuf,

    /// JSON generator settings; the flags below override it
    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long)]
    seed: Option<String>,

    #[arg(long)]
    alphabet_soup: bool,

    #[arg(long)]
    failsafe: bool,

    #[arg(long)]
    no_folder_rules: bool,

    #[arg(long)]
    max_mega: Option<usize>,

    #[arg(long)]
    max_giga: Option<usize>,

    /// Code quotas, e.g. "A(40),B(20),*"
    #[arg(long)]
    codes: Option<String>,

    /// Element quotas, e.g. "Fire(30),Aqua"
    #[arg(long)]
    elements: Option<String>,

    #[arg(long, requires = "output")]
    save: Option<PathBuf>,

    #[arg(long, requires = "save")]
    output: Option<PathBuf>,

    #[arg(long)]
    folder: Option<usize>,

    #[arg(long)]
    preset_out: Option<PathBuf>,
}

impl GenerateArgs {
    fn settings(&self) -> Result<GeneratorSettings> {
        let mut settings: GeneratorSettings = match &self.settings {
            Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
            None => GeneratorSettings::default(),
        };

        if let Some(seed) = &self.seed {
            settings.seed = Some(seed.clone());
        }
        settings.alphabet_soup |= self.alphabet_soup;
        settings.failsafe |= self.failsafe;
        if self.no_folder_rules {
            settings.allow_folder_rules = false;
        }
        if let Some(max) = self.max_mega {
            settings.max_mega = max;
        }
        if let Some(max) = self.max_giga {
            settings.max_giga = max;
        }
        if let Some(codes) = &self.codes {
            settings.code_quotas = codes.clone();
        }
        if let Some(elements) = &self.elements {
            settings.element_quotas = elements.clone();
        }
        Ok(settings)
    }
}

fn new_session(catalog: &Path) -> Result<EditorSession> {
    log::debug!("loading catalog from {}", catalog.display());
    let catalog = ChipCatalog::load_dir(catalog)?;
    Ok(EditorSession::new(Arc::new(catalog)))
}

fn open_session(catalog: &Path, save: &Path, folder: Option<usize>) -> Result<EditorSession> {
    let mut session = new_session(catalog)?;
    session.open_save(fs::read(save)?)?;
    if let Some(folder) = folder {
        session.select_folder(folder)?;
    }
    Ok(session)
}

fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        println!("Warning: {warning}");
    }
}

fn print_folder(folder: &Folder) {
    for (i, entry) in folder.entries.iter().enumerate() {
        let marker = if folder.reg == Some(i) {
            " [REG]"
        } else if folder.tagged.is_some_and(|tags| tags.contains(&i)) {
            " [TAG]"
        } else {
            ""
        };
        println!("{:>3}  {:<16} {}{}", i + 1, entry.name(), entry.code, marker);
    }
}

fn inspect(save: &Path, catalog: &Path, folder: Option<usize>) -> Result<()> {
    let session = open_session(catalog, save, folder)?;

    if let Some(image) = session.save() {
        println!("Game:            {}", image.game_name()?);
        println!("Variant:         {}", image.variant());
        println!("Folders:         {}", image.folder_count()?);
        println!("Equipped folder: {}", image.equipped_folder()?);
        let checksum = if image.checksum_valid()? { "ok" } else { "mismatch" };
        println!("Checksum:        {checksum}");
    }

    println!("Folder {}:", session.selected_folder());
    if let Some(contents) = session.folder() {
        print_folder(contents);
    }
    print_warnings(session.warnings());
    Ok(())
}

fn generate(args: &GenerateArgs) -> Result<()> {
    let settings = args.settings()?;
    if settings.alphabet_soup && args.output.is_some() {
        return Err(FolderError::Config(
            "alphabet soup folders hold fewer than 30 chips and cannot be written to a save"
                .to_string(),
        ));
    }
    log::info!("generating {} chips", settings.num_chips);
    let mut session = new_session(&args.catalog)?;

    if let Some(save) = &args.save {
        session.open_save(fs::read(save)?)?;
        if let Some(folder) = args.folder {
            session.select_folder(folder)?;
        }
        print_warnings(session.warnings());
    }

    print_folder(session.generate(&settings));
    print_warnings(session.warnings());

    if let Some(path) = &args.preset_out {
        log::info!("writing preset to {}", path.display());
        fs::write(path, session.export_preset()?.to_json()?)?;
        println!("Preset written to {}", path.display());
    }

    if let Some(output) = &args.output {
        log::info!("committing folder {}", session.selected_folder());
        session.commit()?;
        fs::write(output, session.export_save()?)?;
        println!(
            "Folder {} written to {}",
            session.selected_folder(),
            output.display()
        );
    }

    Ok(())
}

fn export_preset(save: &Path, catalog: &Path, output: &Path, folder: Option<usize>) -> Result<()> {
    let session = open_session(catalog, save, folder)?;
    print_warnings(session.warnings());
    fs::write(output, session.export_preset()?.to_json()?)?;
    println!("Preset written to {}", output.display());
    Ok(())
}

fn apply_preset(
    save: &Path,
    catalog: &Path,
    preset: &Path,
    output: &Path,
    folder: Option<usize>,
) -> Result<()> {
    let mut session = open_session(catalog, save, folder)?;
    let preset = FolderPreset::from_json(&fs::read_to_string(preset)?)?;
    session.import_preset(&preset)?;
    log::info!("applying preset to folder {}", session.selected_folder());
    session.commit()?;
    fs::write(output, session.export_save()?)?;
    println!(
        "Folder {} written to {}",
        session.selected_folder(),
        output.display()
    );
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Inspect {
            save,
            catalog,
            folder,
        } => inspect(&save, &catalog, folder),
        Command::Generate(args) => generate(&args),
        Command::ExportPreset {
            save,
            catalog,
            output,
            folder,
        } => export_preset(&save, &catalog, &output, folder),
        Command::ApplyPreset {
            save,
            catalog,
            preset,
            output,
            folder,
        } => apply_preset(&save, &catalog, &preset, &output, folder),
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
