//! Match aggregation: every keyword against every catalog entry, flattened
//! into one record per (keyword, ranked candidate).
//!
//! Records are not deduplicated. Two keywords that both hit the same
//! catalog row produce two records, so a concept mentioned often weighs
//! more downstream.

use serde::Serialize;
use serde_json::{json, Value};

use crate::catalog::{Catalog, CatalogKind, SearchableTextSource};
use crate::fuzzy;
use crate::table::{Row, Table};

/// Ranking options shared by every keyword in a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MatchOptions {
    /// Keep at most this many candidates per keyword. `None` keeps all.
    pub limit: Option<usize>,
    /// Drop candidates scoring below this. `None` applies no floor; see
    /// [`fuzzy::DEFAULT_SCORE_FLOOR`] for the conventional value.
    pub score_floor: Option<f64>,
}

/// One ranked candidate for one keyword, carrying the full catalog row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub kind: CatalogKind,
    pub keyword: String,
    pub score: f64,
    /// 1-based position within this keyword's ranking.
    pub rank: usize,
    pub matched_text: String,
    /// Position of the entry in the catalog's candidate list.
    pub choice_index: usize,
    pub identifier: Option<String>,
    pub row: Row,
}

impl MatchRecord {
    /// Catalog columns followed by `matched_keyword`, `match_score`,
    /// `match_rank`, the matched-text column for this catalog kind, and
    /// `choice_index`.
    pub fn to_row(&self) -> Row {
        let mut row = self.row.clone();
        row.insert("matched_keyword".to_string(), json!(self.keyword));
        row.insert("match_score".to_string(), json!(self.score));
        row.insert("match_rank".to_string(), json!(self.rank));
        row.insert(
            self.kind.matched_text_column().to_string(),
            Value::String(self.matched_text.clone()),
        );
        row.insert("choice_index".to_string(), json!(self.choice_index));
        row
    }
}

/// Rank every keyword against `catalog` and flatten the results.
///
/// Output order is keyword order, then rank. An empty keyword list or an
/// empty catalog yields no records.
pub fn match_keywords(
    keywords: &[String],
    catalog: &Catalog,
    options: &MatchOptions,
) -> Vec<MatchRecord> {
    if keywords.is_empty() || catalog.is_empty() {
        return Vec::new();
    }

    let choices = catalog.searchable_texts();
    let entries = catalog.entries();
    let mut records = Vec::new();

    for keyword in keywords {
        let ranked = fuzzy::rank(keyword, &choices, options.limit);
        for (position, candidate) in ranked.into_iter().enumerate() {
            if options.score_floor.is_some_and(|floor| candidate.score < floor) {
                continue;
            }
            let entry = &entries[candidate.index];
            records.push(MatchRecord {
                kind: catalog.kind(),
                keyword: keyword.clone(),
                score: candidate.score,
                rank: position + 1,
                matched_text: candidate.text,
                choice_index: candidate.index,
                identifier: entry.identifier(),
                row: entry.row().clone(),
            });
        }
    }

    tracing::debug!(
        catalog = catalog.kind().as_str(),
        keywords = keywords.len(),
        records = records.len(),
        "keywords matched"
    );
    records
}

/// Flattened table of records. No records gives a table with no columns.
pub fn records_to_table(records: &[MatchRecord]) -> Table {
    Table::from_rows(records.iter().map(MatchRecord::to_row).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSchema;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    fn components() -> Catalog {
        Catalog::from_rows(
            CatalogSchema::components(),
            vec![
                row(json!({"item": "9.3", "name": "Gantry", "internal_part_name": null, "material": "Steel"})),
                row(json!({"item": "9.3.4", "name": "Wooden Screw M10", "internal_part_name": "", "material": "Oak"})),
                row(json!({"item": "8.7.1", "name": "Metal Screw S15", "internal_part_name": "MS-15", "material": "Steel"})),
            ],
        )
    }

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_empty_keywords_yield_nothing() {
        let records = match_keywords(&[], &components(), &MatchOptions::default());
        assert!(records.is_empty());
        let table = records_to_table(&records);
        assert!(table.is_empty());
        assert!(table.columns.is_empty());
    }

    #[test]
    fn test_empty_catalog_yields_nothing() {
        let empty = Catalog::from_rows(CatalogSchema::components(), vec![]);
        assert!(match_keywords(&kw(&["screw"]), &empty, &MatchOptions::default()).is_empty());
    }

    #[test]
    fn test_every_candidate_per_keyword() {
        let records = match_keywords(&kw(&["screw", "gantry"]), &components(), &MatchOptions::default());
        assert_eq!(records.len(), 6);
        assert!(records[..3].iter().all(|r| r.keyword == "screw"));
        assert_eq!(
            records[..3].iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        for pair in records[..3].windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_limit_and_floor() {
        let opts = MatchOptions {
            limit: Some(1),
            score_floor: None,
        };
        let records = match_keywords(&kw(&["screw", "gantry"]), &components(), &opts);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].identifier.as_deref(), Some("9.3"));

        let opts = MatchOptions {
            limit: None,
            score_floor: Some(fuzzy::DEFAULT_SCORE_FLOOR),
        };
        let records = match_keywords(&kw(&["gantry"]), &components(), &opts);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].matched_text, "Gantry");
    }

    #[test]
    fn test_duplicate_keywords_not_deduplicated() {
        let opts = MatchOptions {
            limit: Some(1),
            score_floor: None,
        };
        let records = match_keywords(&kw(&["screw", "screw"]), &components(), &opts);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].identifier, records[1].identifier);
    }

    #[test]
    fn test_flattened_row_columns() {
        let records = match_keywords(&kw(&["screw"]), &components(), &MatchOptions::default());
        let r = records[0].to_row();
        let keys: Vec<&str> = r.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "item",
                "name",
                "internal_part_name",
                "material",
                "matched_keyword",
                "match_score",
                "match_rank",
                "matched_component_text",
                "choice_index"
            ]
        );
        assert_eq!(r["matched_keyword"], json!("screw"));
        assert_eq!(r["match_rank"], json!(1));
    }

    #[test]
    fn test_supplier_matched_text_column() {
        let suppliers = Catalog::from_rows(
            CatalogSchema::suppliers(),
            vec![row(json!({"supplier_id": "s1", "supplier_name": "BondBrook Adhesives", "primary_contact_name": "Ana Ruiz"}))],
        );
        let records = match_keywords(&kw(&["BondBrook"]), &suppliers, &MatchOptions::default());
        let r = records[0].to_row();
        assert_eq!(r["matched_supplier_text"], json!("BondBrook Adhesives Ana Ruiz"));
        assert!(r.get("matched_component_text").is_none());
    }

    #[test]
    fn test_catalog_columns_round_trip() {
        let catalog = components();
        let records = match_keywords(
            &kw(&["wooden", "screw", "stress", "test"]),
            &catalog,
            &MatchOptions::default(),
        );
        assert_eq!(records.len(), 12);
        for record in &records {
            let source = catalog
                .entries()
                .iter()
                .find(|e| e.identifier() == record.identifier)
                .unwrap();
            let flat = record.to_row();
            for (column, value) in source.row() {
                assert_eq!(flat.get(column), Some(value), "column {column}");
            }
            assert_eq!(&catalog.entries()[record.choice_index], source);
        }
    }
}
