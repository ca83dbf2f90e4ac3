//! Waste categories

use serde::{Deserialize, Serialize};

/// Disposal category. `Unknown` is only ever a decision outcome and is never
/// stored in the knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[serde(alias = "PLASTIC")]
    Plastic,
    #[serde(alias = "PAPER")]
    Paper,
    #[serde(alias = "GLASS")]
    Glass,
    #[serde(alias = "ORGANIC")]
    Organic,
    #[serde(alias = "HAZARDOUS")]
    Hazardous,
    #[serde(alias = "RESIDUAL")]
    Residual,
    #[serde(alias = "UNKNOWN")]
    Unknown,
}

impl Category {
    /// Wire name (lowercase, as stored in index payloads).
    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Plastic => "plastic",
            Category::Paper => "paper",
            Category::Glass => "glass",
            Category::Organic => "organic",
            Category::Hazardous => "hazardous",
            Category::Residual => "residual",
            Category::Unknown => "unknown",
        }
    }

    /// German label shown to users.
    pub const fn label_de(self) -> &'static str {
        match self {
            Category::Plastic => "Verpackung / Kunststoff",
            Category::Paper => "Papier / Pappe",
            Category::Glass => "Altglas",
            Category::Organic => "Bioabfall",
            Category::Hazardous => "Sondermüll",
            Category::Residual => "Restmüll",
            Category::Unknown => "Unbekannt",
        }
    }

    /// Whether a knowledge entry may carry this category.
    pub const fn is_disposal(self) -> bool {
        !matches!(self, Category::Unknown)
    }

    /// Counts towards the recycling rate (everything but residual and unknown).
    pub const fn is_recycled(self) -> bool {
        !matches!(self, Category::Residual | Category::Unknown)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// Unrecognised category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown waste category '{0}'")]
pub struct ParseCategoryError(pub String);

impl std::str::FromStr for Category {
    type Err = ParseCategoryError;

    /// Case-insensitive; accepts English and German names. Electronics are
    /// special waste handled at the recycling centre, so they map to
    /// `Hazardous`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plastic" | "plastik" | "kunststoff" | "verpackung" => Ok(Category::Plastic),
            "paper" | "papier" | "pappe" => Ok(Category::Paper),
            "glass" | "glas" | "altglas" => Ok(Category::Glass),
            "organic" | "bio" | "bioabfall" => Ok(Category::Organic),
            "hazardous" | "sondermüll" | "sondermuell" | "electronics" | "elektroschrott" => {
                Ok(Category::Hazardous)
            }
            "residual" | "restmüll" | "restmuell" | "general" => Ok(Category::Residual),
            "unknown" | "unbekannt" => Ok(Category::Unknown),
            _ => Err(ParseCategoryError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_label() {
        assert_eq!(Category::Paper.to_string(), "PAPER");
        assert_eq!(Category::Residual.label_de(), "Restmüll");
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("PAPER".parse::<Category>().unwrap(), Category::Paper);
        assert_eq!("Glas".parse::<Category>().unwrap(), Category::Glass);
        assert_eq!("electronics".parse::<Category>().unwrap(), Category::Hazardous);
        assert!("textiles".parse::<Category>().is_err());
    }

    #[test]
    fn test_serde_lowercase_with_uppercase_alias() {
        assert_eq!(serde_json::to_string(&Category::Organic).unwrap(), "\"organic\"");
        let c: Category = serde_json::from_str("\"RESIDUAL\"").unwrap();
        assert_eq!(c, Category::Residual);
    }

    #[test]
    fn test_recycled_flags() {
        assert!(Category::Plastic.is_recycled());
        assert!(Category::Hazardous.is_recycled());
        assert!(!Category::Residual.is_recycled());
        assert!(!Category::Unknown.is_recycled());
        assert!(!Category::Unknown.is_disposal());
    }
}
