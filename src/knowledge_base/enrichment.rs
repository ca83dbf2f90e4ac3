//! Embedding-text enrichment
//!
//! A bare item name embeds poorly against free-form user descriptions. The
//! enriched text repeats the item alongside synonyms, related examples of its
//! category and a short reason why it belongs there.

use crate::types::{Category, KnowledgeEntry};

fn synonyms(item: &str) -> &'static [&'static str] {
    match item {
        "Obstreste" => &["Obstabfälle", "Fruchtreste", "Apfelschalen", "Bananenschalen", "Bio-Küchenabfälle"],
        "Gemüsereste" => &["Gemüseabfälle", "Küchenabfälle", "Schalenreste"],
        "Kaffeesatz" => &["Kaffeereste", "gemahlener Kaffee"],
        "Teebeutel" => &["Teesäckchen", "Teereste", "Teefilter"],
        "Tee" => &["loser Tee", "Teeblätter"],
        "Staubsaugerbeutel" => &["Filterbeutel", "Staubbeutel"],
        "Lappen" => &["Putztuch", "Reinigungslappen", "Stofftuch"],
        "Papier" => &["Schreibpapier", "Druckpapier"],
        "Eimer" | "Farbeimer" => &["Kübel", "Behälter"],
        "Handy" => &["Smartphone", "Mobiltelefon"],
        "Batterie" => &["Akku", "Knopfzelle"],
        _ => &[],
    }
}

fn related_examples(category: Category) -> &'static [&'static str] {
    match category {
        Category::Organic => &["Obstreste", "Gemüsereste", "Kaffeesatz", "Teebeutel", "Eierschalen"],
        Category::Paper => &["Papier", "Zeitung", "Pappe", "Kartons"],
        Category::Plastic => &["Plastikflasche", "Verpackungen", "Dosen", "Metallverpackungen"],
        Category::Glass => &["Flaschen", "Gläser", "Konservengläser"],
        Category::Hazardous => &["Batterien", "Farben", "Chemikalien", "Elektrogeräte"],
        Category::Residual => &["Restmüll", "Staubsaugerbeutel", "Keramikreste"],
        Category::Unknown => &[],
    }
}

fn reasoning(category: Category) -> &'static str {
    match category {
        Category::Organic => "weil er biologisch abbaubar, kompostierbar und typischer Küchenabfall ist",
        Category::Paper => "weil es sich um einen aus Zellstoff bestehenden Wertstoff handelt",
        Category::Plastic => "weil es ein synthetisches Polymermaterial oder eine Leichtverpackung ist",
        Category::Glass => "weil es aus Behälterglas besteht und eingeschmolzen werden kann",
        Category::Hazardous => "weil es Schadstoffe enthält oder als Elektroschrott gesondert entsorgt wird",
        Category::Residual => "weil er nicht recycelbar und nicht verwertbar ist",
        Category::Unknown => "weil es typisch für diese Kategorie ist",
    }
}

/// Text handed to the embedding provider for `entry`.
pub fn embedding_text(entry: &KnowledgeEntry, enrich: bool) -> String {
    if !enrich {
        return entry.text.clone();
    }

    let item = entry.text.as_str();
    let category = entry.category.as_str();
    let syn = synonyms(item);
    let synonyms_text = if syn.is_empty() {
        "Keine bekannten Synonyme".to_string()
    } else {
        syn.join(", ")
    };
    let extra = related_examples(entry.category).join(", ");

    format!(
        "{item}: {instructions}. Dieser Gegenstand gehört eindeutig zur Kategorie '{category}', \
         {reason}. Synonyme: {synonyms_text}. Verwandte Beispiele: {extra}. \
         Entsorgungsregel: {instructions}. Beschreibung: {item} ist ein typischer Vertreter \
         der Kategorie '{category}'.",
        instructions = entry.instructions,
        reason = reasoning(entry.category),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge_base::entry_for;

    #[test]
    fn test_plain_text_when_disabled() {
        let e = entry_for(Category::Paper, "Zeitung", "Blaue Tonne");
        assert_eq!(embedding_text(&e, false), "Zeitung");
    }

    #[test]
    fn test_enriched_text_contents() {
        let e = entry_for(Category::Organic, "Teebeutel", "Biotonne");
        let text = embedding_text(&e, true);
        assert!(text.starts_with("Teebeutel: Biotonne."));
        assert!(text.contains("Teefilter"));
        assert!(text.contains("Kategorie 'organic'"));
        assert!(text.contains("kompostierbar"));
    }

    #[test]
    fn test_missing_synonyms_placeholder() {
        let e = entry_for(Category::Glass, "Sektflasche", "Glascontainer");
        assert!(embedding_text(&e, true).contains("Keine bekannten Synonyme"));
    }
}
