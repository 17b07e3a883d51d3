//! Constrained random folder generation.
//!
//! A generation run is one synchronous pass through these stages:
//!
//! 1. parse code and element quotas into chip counts
//! 2. gather the enabled chip classes from the catalog
//! 3. alphabet soup: one chip per code letter (replaces stages 4-7)
//! 4. filter chips by element, damage, MB and code
//! 5. place Giga chips, then Mega chips, up to their caps
//! 6. place chips for each outstanding quota
//! 7. fill the rest, preferring chips that satisfy an unmet quota
//! 8. choose the reg chip and two tagged chips
//! 9. move reg and tags to the front of the folder
//!
//! Every selection loop is capped at [`MAX_ATTEMPTS`] failures. Running out
//! of attempts never fails the run: the folder is returned as built so far
//! together with [`GenerationWarning`]s describing what is missing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::catalog::{Chip, ChipCatalog, ChipClass};
use crate::chip_codec::CODE_ALPHABET;
use crate::folder::{count_in_class, Folder, FolderEntry, FolderRules, REG_MB_LIMIT};
use crate::layout::CHIPS_PER_FOLDER;
use crate::rng::SeededGenerator;

pub const MAX_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub num_chips: usize,
    pub seed: Option<String>,
    pub include_standard: bool,
    pub include_mega: bool,
    pub include_giga: bool,
    pub max_mega: usize,
    pub max_giga: usize,
    pub allow_folder_rules: bool,
    /// Fill missing Mega/Giga slots from unfiltered chips of that class.
    pub failsafe: bool,
    /// One chip per code letter instead of a full folder. The result holds
    /// at most 27 chips, so it cannot be written into a save.
    pub alphabet_soup: bool,
    /// e.g. `"A(40),B(20),*"`
    pub code_quotas: String,
    /// e.g. `"Fire(30),Aqua"`
    pub element_quotas: String,
    pub allowed_elements: Vec<String>,
    pub allowed_codes: Vec<char>,
    pub min_damage: Option<u32>,
    pub max_damage: Option<u32>,
    pub min_mb: Option<u32>,
    pub max_mb: Option<u32>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            num_chips: CHIPS_PER_FOLDER,
            seed: None,
            include_standard: true,
            include_mega: true,
            include_giga: true,
            max_mega: 5,
            max_giga: 1,
            allow_folder_rules: true,
            failsafe: false,
            alphabet_soup: false,
            code_quotas: String::new(),
            element_quotas: String::new(),
            allowed_elements: Vec::new(),
            allowed_codes: Vec::new(),
            min_damage: None,
            max_damage: None,
            min_mb: None,
            max_mb: None,
        }
    }
}

impl GeneratorSettings {
    pub fn rules(&self) -> FolderRules {
        FolderRules {
            enforce: self.allow_folder_rules,
            max_mega: self.max_mega,
            max_giga: self.max_giga,
        }
    }

    pub fn classes(&self) -> Vec<ChipClass> {
        let toggles = [
            (ChipClass::Standard, self.include_standard),
            (ChipClass::Mega, self.include_mega),
            (ChipClass::Giga, self.include_giga),
        ];
        toggles
            .into_iter()
            .filter_map(|(class, enabled)| enabled.then_some(class))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaTarget {
    Code(char),
    Element(String),
}

impl QuotaTarget {
    fn matches_chip(&self, chip: &Chip) -> bool {
        match self {
            QuotaTarget::Code(code) => chip.has_code(*code),
            QuotaTarget::Element(element) => chip.element.eq_ignore_ascii_case(element),
        }
    }

    fn is_met_by(&self, entry: &FolderEntry) -> bool {
        match self {
            QuotaTarget::Code(code) => entry.code == *code,
            QuotaTarget::Element(element) => entry.chip.element.eq_ignore_ascii_case(element),
        }
    }
}

impl fmt::Display for QuotaTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaTarget::Code(code) => write!(f, "code {code}"),
            QuotaTarget::Element(element) => write!(f, "element {element}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub target: QuotaTarget,
    pub count: usize,
}

/// Parsed quota list. `catch_all` is the share left over when explicit
/// percentages do not cover the whole folder; any chip satisfies it, so the
/// fill stage covers it without a dedicated pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Quotas {
    pub requirements: Vec<Requirement>,
    pub catch_all: usize,
}

fn add_requirement(requirements: &mut Vec<Requirement>, target: QuotaTarget, count: usize) {
    match requirements.iter_mut().find(|r| r.target == target) {
        Some(existing) => existing.count = existing.count.saturating_add(count),
        None => requirements.push(Requirement { target, count }),
    }
}

fn parse_quotas<F>(list: &str, num_chips: usize, target_of: F) -> Quotas
where
    F: Fn(&str) -> Option<QuotaTarget>,
{
    let mut requirements: Vec<Requirement> = Vec::new();
    let mut placeholders: Vec<QuotaTarget> = Vec::new();

    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (token, percentage) = match item.split_once('(') {
            Some((token, rest)) => {
                let number = rest.trim_end_matches(')').trim().trim_end_matches('%');
                (token.trim(), number.trim().parse::<f64>().ok())
            }
            None => (item, None),
        };

        let Some(target) = target_of(token) else {
            log::warn!("ignoring quota entry '{item}'");
            continue;
        };

        match percentage {
            Some(pct) => {
                let count = (pct.max(0.0) / 100.0 * num_chips as f64).round() as usize;
                let count = count.min(num_chips);
                add_requirement(&mut requirements, target, count);
            }
            None => {
                if !placeholders.contains(&target) {
                    placeholders.push(target);
                }
            }
        }
    }

    let allocated = requirements
        .iter()
        .fold(0usize, |total, r| total.saturating_add(r.count));
    let remainder = num_chips.saturating_sub(allocated);
    let mut quotas = Quotas {
        requirements,
        catch_all: 0,
    };

    if placeholders.is_empty() {
        if !quotas.requirements.is_empty() {
            quotas.catch_all = remainder;
        }
    } else {
        let share = remainder / placeholders.len();
        let extra = remainder % placeholders.len();
        for (i, target) in placeholders.into_iter().enumerate() {
            let count = (share + usize::from(i < extra)).max(1);
            add_requirement(&mut quotas.requirements, target, count);
        }
    }

    quotas
}

/// Parses `"A(40),B(20),*"` style code quotas.
pub fn parse_code_quotas(list: &str, num_chips: usize) -> Quotas {
    parse_quotas(list, num_chips, |token| {
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                let code = c.to_ascii_uppercase();
                CODE_ALPHABET.contains(&code).then_some(QuotaTarget::Code(code))
            }
            _ => None,
        }
    })
}

/// Parses `"Fire(30),Aqua"` style element quotas.
pub fn parse_element_quotas(list: &str, num_chips: usize) -> Quotas {
    parse_quotas(list, num_chips, |token| {
        (!token.is_empty()).then(|| QuotaTarget::Element(token.to_string()))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationWarning {
    QuotaUnsatisfiable {
        target: QuotaTarget,
        required: usize,
        placed: usize,
    },
    ClassCapShortfall {
        class: ChipClass,
        required: usize,
        placed: usize,
    },
    FailsafeChip {
        class: ChipClass,
        name: String,
    },
    FolderShortfall {
        requested: usize,
        placed: usize,
    },
    NoRegCandidate,
    NoTagCandidates,
}

impl fmt::Display for GenerationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationWarning::QuotaUnsatisfiable {
                target,
                required,
                placed,
            } => write!(f, "quota for {target} not met: {placed} of {required}"),
            GenerationWarning::ClassCapShortfall {
                class,
                required,
                placed,
            } => write!(f, "only {placed} of {required} {class} chips placed"),
            GenerationWarning::FailsafeChip { class, name } => {
                write!(f, "{class} chip {name} added by failsafe, ignoring filters")
            }
            GenerationWarning::FolderShortfall { requested, placed } => {
                write!(f, "folder has {placed} of {requested} chips")
            }
            GenerationWarning::NoRegCandidate => f.write_str("no chip can be the reg chip"),
            GenerationWarning::NoTagCandidates => f.write_str("not enough chips to tag two"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub folder: Folder,
    pub warnings: Vec<GenerationWarning>,
}

pub struct FolderGenerator<'a> {
    catalog: &'a ChipCatalog,
    settings: &'a GeneratorSettings,
    rules: FolderRules,
    allowed_codes: Vec<char>,
    code_quotas: Quotas,
    element_quotas: Quotas,
    rng: SeededGenerator,
    entries: Vec<FolderEntry>,
    warnings: Vec<GenerationWarning>,
}

impl<'a> FolderGenerator<'a> {
    pub fn new(catalog: &'a ChipCatalog, settings: &'a GeneratorSettings) -> Self {
        let rng = SeededGenerator::from_optional(settings.seed.as_deref());
        Self::with_rng(catalog, settings, rng)
    }

    pub fn with_rng(
        catalog: &'a ChipCatalog,
        settings: &'a GeneratorSettings,
        rng: SeededGenerator,
    ) -> Self {
        Self {
            catalog,
            settings,
            rules: settings.rules(),
            allowed_codes: settings
                .allowed_codes
                .iter()
                .map(|c| c.to_ascii_uppercase())
                .collect(),
            code_quotas: parse_code_quotas(&settings.code_quotas, settings.num_chips),
            element_quotas: parse_element_quotas(&settings.element_quotas, settings.num_chips),
            rng,
            entries: Vec::with_capacity(settings.num_chips),
            warnings: Vec::new(),
        }
    }

    pub fn generate(mut self) -> Generation {
        let classes = self.settings.classes();
        let pool = self.catalog.chips_of(&classes);
        log::debug!("generating from {} chips (seed state {})", pool.len(), self.rng.state());
        log::debug!(
            "quotas: {} code, {} element, catch-all {}/{}",
            self.code_quotas.requirements.len(),
            self.element_quotas.requirements.len(),
            self.code_quotas.catch_all,
            self.element_quotas.catch_all
        );

        if self.settings.alphabet_soup {
            self.alphabet_soup(&pool);
        } else {
            let filtered: Vec<Arc<Chip>> = pool
                .iter()
                .filter(|chip| self.passes_filters(chip))
                .cloned()
                .collect();
            log::debug!("{} chips pass filters", filtered.len());

            for class in [ChipClass::Giga, ChipClass::Mega] {
                if classes.contains(&class) {
                    self.allocate_class(class, &filtered, &pool);
                }
            }
            self.allocate_quotas(&filtered);
            self.fill_remainder(&filtered);
            self.report_unmet_quotas();
        }

        let reg = self.pick_reg();
        let tagged = self.pick_tags(reg);

        for warning in &self.warnings {
            log::warn!("{warning}");
        }
        log::info!(
            "generated folder of {} chips with {} warnings",
            self.entries.len(),
            self.warnings.len()
        );

        let mut folder = Folder {
            entries: self.entries,
            reg,
            tagged,
        };
        folder.canonicalize();

        Generation {
            folder,
            warnings: self.warnings,
        }
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= self.settings.num_chips
    }

    fn passes_filters(&self, chip: &Chip) -> bool {
        let s = self.settings;

        if !s.allowed_elements.is_empty()
            && !s
                .allowed_elements
                .iter()
                .any(|e| e.eq_ignore_ascii_case(&chip.element))
        {
            return false;
        }

        let damage = chip.effective_damage();
        if s.min_damage.is_some_and(|min| damage < min) || s.max_damage.is_some_and(|max| damage > max) {
            return false;
        }

        if s.min_mb.is_some_and(|min| chip.mb < min) || s.max_mb.is_some_and(|max| chip.mb > max) {
            return false;
        }

        self.allowed_codes.is_empty() || chip.codes.iter().any(|c| self.allowed_codes.contains(c))
    }

    fn code_allowed(&self, code: char) -> bool {
        self.allowed_codes.is_empty() || self.allowed_codes.contains(&code)
    }

    fn allowed_codes_of(&self, chip: &Chip) -> Vec<char> {
        if self.allowed_codes.is_empty() {
            return chip.codes.clone();
        }
        chip.codes
            .iter()
            .copied()
            .filter(|c| self.allowed_codes.contains(c))
            .collect()
    }

    fn can_add(&self, chip: &Chip) -> bool {
        !self.is_full() && self.rules.can_add(&self.entries, chip, self.catalog)
    }

    fn try_add(&mut self, chip: &Arc<Chip>, code: char) -> bool {
        if !self.can_add(chip) {
            return false;
        }
        self.entries.push(FolderEntry::new(Arc::clone(chip), code));
        true
    }

    fn class_count(&self, class: ChipClass) -> usize {
        count_in_class(&self.entries, class, self.catalog)
    }

    fn placed_for(&self, target: &QuotaTarget) -> usize {
        self.entries.iter().filter(|e| target.is_met_by(e)).count()
    }

    fn requirements(&self) -> Vec<Requirement> {
        self.code_quotas
            .requirements
            .iter()
            .chain(self.element_quotas.requirements.iter())
            .cloned()
            .collect()
    }

    /// Quota targets still short of their count. Code targets outside the
    /// code allow-list are never owed.
    fn unmet_targets(&self) -> Vec<QuotaTarget> {
        self.requirements()
            .into_iter()
            .filter(|r| match r.target {
                QuotaTarget::Code(code) => self.code_allowed(code),
                QuotaTarget::Element(_) => true,
            })
            .filter(|r| self.placed_for(&r.target) < r.count)
            .map(|r| r.target)
            .collect()
    }

    fn alphabet_soup(&mut self, pool: &[Arc<Chip>]) {
        for letter in CODE_ALPHABET {
            let matching: Vec<Arc<Chip>> = pool
                .iter()
                .filter(|chip| chip.has_code(letter))
                .cloned()
                .collect();
            match self.rng.choose(&matching) {
                Some(chip) => self.entries.push(FolderEntry::new(Arc::clone(chip), letter)),
                None => log::debug!("no chip carries code {letter}"),
            }
        }
    }

    fn allocate_class(&mut self, class: ChipClass, filtered: &[Arc<Chip>], pool: &[Arc<Chip>]) {
        let Some(cap) = self.rules.class_cap(class) else {
            return;
        };
        let target = cap.min(self.settings.num_chips);
        if target == 0 {
            return;
        }

        let candidates: Vec<Arc<Chip>> = filtered
            .iter()
            .filter(|chip| chip.class == class)
            .cloned()
            .collect();

        let mut failures = 0;
        while self.class_count(class) < target && !self.is_full() && failures < MAX_ATTEMPTS {
            let Some(chip) = self.rng.choose(&candidates).cloned() else {
                break;
            };
            let codes = self.allowed_codes_of(&chip);
            let Some(&code) = self.rng.choose(&codes) else {
                failures += 1;
                continue;
            };
            if !self.try_add(&chip, code) {
                failures += 1;
            }
        }

        if self.class_count(class) < target && self.settings.failsafe {
            let fallback: Vec<Arc<Chip>> = pool
                .iter()
                .filter(|chip| chip.class == class)
                .cloned()
                .collect();

            let mut failures = 0;
            while self.class_count(class) < target && !self.is_full() && failures < MAX_ATTEMPTS {
                let Some(chip) = self.rng.choose(&fallback).cloned() else {
                    break;
                };
                let Some(&code) = self.rng.choose(&chip.codes) else {
                    failures += 1;
                    continue;
                };
                if self.try_add(&chip, code) {
                    self.warnings.push(GenerationWarning::FailsafeChip {
                        class,
                        name: chip.name.clone(),
                    });
                } else {
                    failures += 1;
                }
            }
        }

        let placed = self.class_count(class);
        log::debug!("{class}: placed {placed} of {target}");
        if placed < target {
            self.warnings.push(GenerationWarning::ClassCapShortfall {
                class,
                required: target,
                placed,
            });
        }
    }

    fn allocate_quotas(&mut self, filtered: &[Arc<Chip>]) {
        for requirement in self.requirements() {
            if let QuotaTarget::Code(code) = requirement.target {
                if !self.code_allowed(code) {
                    log::warn!("quota for code {code} conflicts with the allowed codes, skipping");
                    continue;
                }
            }
            let candidates: Vec<Arc<Chip>> = filtered
                .iter()
                .filter(|chip| requirement.target.matches_chip(chip))
                .cloned()
                .collect();

            let mut failures = 0;
            while self.placed_for(&requirement.target) < requirement.count
                && !self.is_full()
                && failures < MAX_ATTEMPTS
            {
                let Some(chip) = self.rng.choose(&candidates).cloned() else {
                    break;
                };
                let code = match &requirement.target {
                    QuotaTarget::Code(code) => Some(*code),
                    QuotaTarget::Element(_) => {
                        let codes = self.allowed_codes_of(&chip);
                        self.rng.choose(&codes).copied()
                    }
                };
                let Some(code) = code else {
                    failures += 1;
                    continue;
                };
                if !self.try_add(&chip, code) {
                    failures += 1;
                }
            }
        }
    }

    fn fill_remainder(&mut self, filtered: &[Arc<Chip>]) {
        let mut failures = 0;
        while !self.is_full() && failures < MAX_ATTEMPTS {
            let owed = self.unmet_targets();
            let preferred: Vec<Arc<Chip>> = if owed.is_empty() {
                Vec::new()
            } else {
                filtered
                    .iter()
                    .filter(|chip| owed.iter().any(|t| t.matches_chip(chip)) && self.can_add(chip))
                    .cloned()
                    .collect()
            };
            let source: &[Arc<Chip>] = if preferred.is_empty() {
                filtered
            } else {
                &preferred
            };

            let Some(chip) = self.rng.choose(source).cloned() else {
                break;
            };

            let owed_codes: Vec<char> = owed
                .iter()
                .filter_map(|t| match t {
                    QuotaTarget::Code(code) if chip.has_code(*code) => Some(*code),
                    _ => None,
                })
                .collect();
            let code = if owed_codes.is_empty() {
                let codes = self.allowed_codes_of(&chip);
                self.rng.choose(&codes).copied()
            } else {
                self.rng.choose(&owed_codes).copied()
            };

            let Some(code) = code else {
                failures += 1;
                continue;
            };
            if !self.try_add(&chip, code) {
                failures += 1;
            }
        }

        if self.entries.len() < self.settings.num_chips {
            self.warnings.push(GenerationWarning::FolderShortfall {
                requested: self.settings.num_chips,
                placed: self.entries.len(),
            });
        }
    }

    fn report_unmet_quotas(&mut self) {
        for requirement in self.requirements() {
            let placed = self.placed_for(&requirement.target);
            if placed < requirement.count {
                self.warnings.push(GenerationWarning::QuotaUnsatisfiable {
                    target: requirement.target,
                    required: requirement.count,
                    placed,
                });
            }
        }
    }

    fn pick_reg(&mut self) -> Option<usize> {
        if !self.entries.is_empty() {
            for _ in 0..MAX_ATTEMPTS {
                let index = self.rng.below(self.entries.len());
                if self.entries[index].chip.mb <= REG_MB_LIMIT {
                    return Some(index);
                }
            }
        }
        self.warnings.push(GenerationWarning::NoRegCandidate);
        None
    }

    fn pick_tags(&mut self, reg: Option<usize>) -> Option<[usize; 2]> {
        let mut candidates: Vec<usize> = (0..self.entries.len()).filter(|&i| Some(i) != reg).collect();
        if candidates.len() < 2 {
            self.warnings.push(GenerationWarning::NoTagCandidates);
            return None;
        }

        let pick = self.rng.below(candidates.len());
        let first = candidates.remove(pick);
        let pick = self.rng.below(candidates.len());
        let second = candidates.remove(pick);
        Some([first, second])
    }
}

pub fn generate_folder(catalog: &ChipCatalog, settings: &GeneratorSettings) -> Generation {
    FolderGenerator::new(catalog, settings).generate()
}
