//! Knowledge-base dataset: typed records per category
//!
//! The dataset is configuration data, not logic. The built-in German dataset
//! can be replaced by a TOML file of the same shape:
//!
//! ```toml
//! [[categories]]
//! category = "paper"
//! instructions = "Zeitungen, Kartons, Bücher → Blaue Tonne."
//! examples = ["Zeitung", "Karton"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::KnowledgeConfig;
use crate::types::{Category, KnowledgeEntry};

/// Dataset load errors
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Dataset I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),
    #[error("Dataset parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid dataset: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Instructions plus example items for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub category: Category,
    pub instructions: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KnowledgeDataset {
    #[serde(default)]
    pub categories: Vec<CategoryRecord>,
}

impl KnowledgeDataset {
    /// Configured dataset file, or the built-in dataset.
    pub fn load(config: &KnowledgeConfig) -> Result<Self, DatasetError> {
        match config.dataset_file.as_deref() {
            Some(path) => {
                let dataset = Self::load_from_file(path)?;
                info!(path = %path.display(), records = dataset.categories.len(), "Loaded knowledge dataset");
                Ok(dataset)
            }
            None => Ok(Self::builtin()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self, DatasetError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| DatasetError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, DatasetError> {
        let dataset: Self = toml::from_str(contents)?;
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn validate(&self) -> Result<(), DatasetError> {
        let mut errors = Vec::new();
        if self.categories.is_empty() {
            errors.push("dataset has no categories".to_string());
        }
        for (i, record) in self.categories.iter().enumerate() {
            if !record.category.is_disposal() {
                errors.push(format!("categories[{i}]: UNKNOWN cannot be stored"));
            }
            if record.instructions.trim().is_empty() {
                errors.push(format!("categories[{i}] ({}): instructions are empty", record.category));
            }
            if record.examples.iter().all(|e| e.trim().is_empty()) {
                errors.push(format!("categories[{i}] ({}): no examples", record.category));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DatasetError::Invalid(errors))
        }
    }

    /// One entry per example item, in dataset order. Examples that slug to an
    /// id already seen collapse into the first occurrence.
    pub fn entries(&self) -> Vec<KnowledgeEntry> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for record in &self.categories {
            for example in record.examples.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
                let entry = entry_for(record.category, example, &record.instructions);
                if seen.insert(entry.id.clone()) {
                    out.push(entry);
                }
            }
        }
        out
    }

    /// German household-waste rules. Small electronics go to the recycling
    /// centre and are filed under `Hazardous` with their own instructions.
    pub fn builtin() -> Self {
        fn record(category: Category, instructions: &str, examples: &[&str]) -> CategoryRecord {
            CategoryRecord {
                category,
                instructions: instructions.to_string(),
                examples: examples.iter().map(|s| (*s).to_string()).collect(),
            }
        }

        Self {
            categories: vec![
                record(
                    Category::Plastic,
                    "Plastikflaschen, Verpackungen, Folien → Gelber Sack/Gelbe Tonne. Bitte reinigen.",
                    &[
                        "Plastikflasche", "Joghurtbecher", "Shampooflasche", "Plastiktüte", "Alufolie",
                        "Kunststoffdeckel", "Chipstüte", "PET-Flasche", "Plastikbesteck", "Zahnpasta-Tube",
                    ],
                ),
                record(
                    Category::Paper,
                    "Zeitungen, Kartons, Bücher → Blaue Tonne. Sauber und trocken halten.",
                    &[
                        "Zeitung", "Karton", "Bücher", "Briefpapier", "Papierverpackung",
                        "Zeitschrift", "Kartonverpackung", "Schachtel", "Pappe", "Papierhandtuch",
                    ],
                ),
                record(
                    Category::Glass,
                    "Glasflaschen, Konservengläser → Glascontainer (nach Farben sortieren). Deckel entfernen.",
                    &[
                        "Weinflasche", "Marmeladenglas", "Parfümflasche", "Saftflasche", "Glasdeckel",
                        "Einmachglas", "Glasbehälter", "Fläschchen", "Konservenglas", "Sektflasche",
                    ],
                ),
                record(
                    Category::Organic,
                    "Obstreste, Gemüseabfälle, Kaffeesatz → Biotonne. Keine Plastiktüten verwenden.",
                    &[
                        "Bananenschale", "Kaffeesatz", "Eierschalen", "Obstreste", "Gemüsereste",
                        "Teebeutel", "Kochabfälle", "Obstkerne", "Kaffeesatzbeutel", "Blätter",
                    ],
                ),
                record(
                    Category::Hazardous,
                    "Batterien, Farben, Chemikalien → Sondermüll/Wertstoffhof. Nicht in Hausmüll!",
                    &[
                        "Batterie", "Farbeimer", "Medikamente", "Chemikalien", "Spraydose",
                        "Reinigungsmittel", "Lösemittel", "Elektronikbatterie", "Quecksilberthermometer",
                        "Leuchtstoffröhre",
                    ],
                ),
                record(
                    Category::Hazardous,
                    "Handys, Kabel, Kleingeräte → Elektroschrott/Wertstoffhof.",
                    &[
                        "Handy", "Ladekabel", "Taschenlampe", "Fernbedienung", "Kopfhörer",
                        "Kabel", "Stecker", "Maus", "Laptop", "Elektronikgerät",
                    ],
                ),
                record(
                    Category::Residual,
                    "Windeln, Staubsaugerbeutel, Asche → Restmülltonne (Schwarze Tonne).",
                    &[
                        "Windel", "Staubsaugerbeutel", "Zigarettenasche", "Asche", "Taschentuch",
                        "Kaugummi", "Kerzenreste", "Staub", "Lappen",
                    ],
                ),
            ],
        }
    }
}

/// Knowledge entry for a single example item; id is `<category>-<slug>`.
pub fn entry_for(category: Category, example: &str, instructions: &str) -> KnowledgeEntry {
    let example = example.trim();
    KnowledgeEntry {
        id: format!("{}-{}", category.as_str(), slugify(example)),
        text: example.to_string(),
        category,
        instructions: instructions.trim().to_string(),
        example_items: vec![example.to_string()],
    }
}

/// Lowercase ASCII slug; umlauts transliterated, other runs of
/// non-alphanumerics collapse to one `-`.
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars().flat_map(char::to_lowercase) {
        let mapped: &str = match c {
            'ä' => "ae",
            'ö' => "oe",
            'ü' => "ue",
            'ß' => "ss",
            _ => "",
        };
        if !mapped.is_empty() || c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            if mapped.is_empty() {
                out.push(c);
            } else {
                out.push_str(mapped);
            }
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        out.push_str("item");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("PET-Flasche"), "pet-flasche");
        assert_eq!(slugify("Parfümflasche"), "parfuemflasche");
        assert_eq!(slugify("  Lösemittel  (alt) "), "loesemittel-alt");
        assert_eq!(slugify("!!!"), "item");
    }

    #[test]
    fn test_builtin_is_valid_and_closed_set() {
        let dataset = KnowledgeDataset::builtin();
        assert!(dataset.validate().is_ok());
        let entries = dataset.entries();
        assert!(entries.iter().all(|e| e.category.is_disposal()));
        assert!(entries.iter().any(|e| e.id == "hazardous-handy"));
        assert!(entries.iter().any(|e| e.id == "paper-zeitung"));
    }

    #[test]
    fn test_entries_have_unique_ids() {
        let entries = KnowledgeDataset::builtin().entries();
        let ids: HashSet<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), entries.len());
    }

    #[test]
    fn test_duplicate_examples_collapse() {
        let dataset = KnowledgeDataset::from_toml_str(
            r#"
            [[categories]]
            category = "residual"
            instructions = "Restmülltonne"
            examples = ["Staubsaugerbeutel", "staubsaugerbeutel", "Windel"]
            "#,
        )
        .unwrap();
        assert_eq!(dataset.entries().len(), 2);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let err = KnowledgeDataset::from_toml_str(
            r#"
            [[categories]]
            category = "unknown"
            instructions = "?"
            examples = ["Ding"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, DatasetError::Invalid(_)));
    }

    #[test]
    fn test_entry_for_shape() {
        let e = entry_for(Category::Paper, " Zeitung ", "Blaue Tonne");
        assert_eq!(e.id, "paper-zeitung");
        assert_eq!(e.text, "Zeitung");
        assert_eq!(e.example_items, vec!["Zeitung".to_string()]);
    }
}
