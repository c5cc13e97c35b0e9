//! Hierarchy expansion over dot-delimited component identifiers.
//!
//! `9.3.4` is a child of `9.3`, which is a child of `9`. Given the matched
//! component ids, [`expand`] fetches each match and every ancestor in one
//! store query and labels them:
//!
//! | Role | `child_item_id` | Rows |
//! |------|-----------------|------|
//! | `child` | its own id | every catalog row whose id was matched |
//! | `parent` | the matched id it is an ancestor of | one per (child, ancestor) pair |
//!
//! An ancestor shared by two matched children appears once per child.
//! Ancestors with no catalog row are hierarchy gaps; [`GapPolicy`] decides
//! whether they are kept as all-null rows or dropped.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregate::MatchRecord;
use crate::catalog::{id_text, CatalogSchema};
use crate::error::Result;
use crate::store::CatalogStore;
use crate::table::{Row, Table};

/// Hierarchy delimiter.
pub const DELIMITER: char = '.';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Child,
    Parent,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Child => "child",
            Role::Parent => "parent",
        }
    }
}

/// What to do with an ancestor id that has no catalog row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapPolicy {
    /// Emit a parent node with no row (all catalog columns null).
    #[default]
    Keep,
    /// Skip the pair entirely.
    Drop,
}

/// A catalog row labelled with its role in the expanded set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyNode {
    pub role: Role,
    /// The matched id that produced this node.
    pub child_item_id: String,
    /// `None` for an unresolved ancestor.
    pub row: Option<Row>,
}

impl HierarchyNode {
    pub fn is_gap(&self) -> bool {
        self.row.is_none()
    }

    /// Catalog columns (null-filled for gaps), then `role` and
    /// `child_item_id`.
    pub fn to_row(&self, columns: &[String]) -> Row {
        let mut out = Row::new();
        match &self.row {
            Some(row) => {
                for column in columns {
                    out.insert(column.clone(), row.get(column).cloned().unwrap_or(Value::Null));
                }
                for (k, v) in row {
                    if !out.contains_key(k) {
                        out.insert(k.clone(), v.clone());
                    }
                }
            }
            None => {
                for column in columns {
                    out.insert(column.clone(), Value::Null);
                }
            }
        }
        out.insert("role".to_string(), Value::String(self.role.as_str().to_string()));
        out.insert(
            "child_item_id".to_string(),
            Value::String(self.child_item_id.clone()),
        );
        out
    }
}

/// Proper ancestors of `id`, shortest first: `9.3.4` → `9`, `9.3`.
///
/// An id without a delimiter, or with an empty segment (`9..4`, `9.`),
/// is a leaf and has none.
pub fn ancestor_ids(id: &str) -> Vec<String> {
    let segments: Vec<&str> = id.split(DELIMITER).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Vec::new();
    }
    (1..segments.len())
        .map(|k| segments[..k].join(&DELIMITER.to_string()))
        .collect()
}

/// Distinct non-missing identifiers of `records`, in first-seen order.
pub fn matched_ids(records: &[MatchRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|r| r.identifier.clone())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Expand matched records; see [`expand`].
pub async fn expand_records(
    store: &dyn CatalogStore,
    schema: &CatalogSchema,
    records: &[MatchRecord],
    policy: GapPolicy,
) -> Result<Vec<HierarchyNode>> {
    expand(store, schema, &matched_ids(records), policy).await
}

/// Fetch `child_ids` and all their ancestors with one store query and
/// label the rows. Children come first, in fetch order; parents follow in
/// (child, ancestor) pair order.
///
/// No child ids means no query and no nodes.
pub async fn expand(
    store: &dyn CatalogStore,
    schema: &CatalogSchema,
    child_ids: &[String],
    policy: GapPolicy,
) -> Result<Vec<HierarchyNode>> {
    schema.validate()?;

    let mut seen: HashSet<&str> = HashSet::new();
    let mut children: Vec<&str> = Vec::new();
    for id in child_ids {
        if seen.insert(id.as_str()) {
            children.push(id.as_str());
        }
    }

    let mut pairs: Vec<(&str, String)> = Vec::new();
    for &cid in &children {
        for pid in ancestor_ids(cid) {
            pairs.push((cid, pid));
        }
    }

    let mut all_ids: Vec<String> = children.iter().map(|id| id.to_string()).collect();
    for (_, pid) in &pairs {
        if seen.insert(pid.as_str()) {
            all_ids.push(pid.clone());
        }
    }
    if all_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = store
        .fetch_by_ids(&schema.table, &schema.id_column, &all_ids)
        .await?;

    let child_set: HashSet<&str> = children.iter().copied().collect();
    let mut nodes: Vec<HierarchyNode> = Vec::new();
    for row in &rows {
        if let Some(id) = row_identifier(row, &schema.id_column) {
            if child_set.contains(id.as_str()) {
                nodes.push(HierarchyNode {
                    role: Role::Child,
                    child_item_id: id,
                    row: Some(row.clone()),
                });
            }
        }
    }

    let mut gaps = 0usize;
    for (cid, pid) in &pairs {
        let mut found = false;
        for row in rows
            .iter()
            .filter(|r| row_identifier(r, &schema.id_column).as_deref() == Some(pid.as_str()))
        {
            found = true;
            nodes.push(HierarchyNode {
                role: Role::Parent,
                child_item_id: cid.to_string(),
                row: Some(row.clone()),
            });
        }
        if !found {
            gaps += 1;
            if policy == GapPolicy::Keep {
                nodes.push(HierarchyNode {
                    role: Role::Parent,
                    child_item_id: cid.to_string(),
                    row: None,
                });
            }
        }
    }

    tracing::debug!(
        children = children.len(),
        pairs = pairs.len(),
        gaps,
        nodes = nodes.len(),
        "hierarchy expanded"
    );
    Ok(nodes)
}

fn row_identifier(row: &Row, column: &str) -> Option<String> {
    row.get(column).and_then(id_text)
}

/// Render nodes as one table. Gap rows get nulls for every catalog column
/// seen on resolved rows, and always for `id_column`.
pub fn nodes_to_table(nodes: &[HierarchyNode], id_column: &str) -> Table {
    if nodes.is_empty() {
        return Table::default();
    }
    let mut columns: Vec<String> = vec![id_column.to_string()];
    for row in nodes.iter().filter_map(|n| n.row.as_ref()) {
        for key in row.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    Table::from_rows(nodes.iter().map(|n| n.to_row(&columns)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryCatalogStore;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn store(items: &[(&str, &str)]) -> InMemoryCatalogStore {
        InMemoryCatalogStore::new().with_table(
            "machine_details",
            items
                .iter()
                .map(|(id, name)| row(json!({"item": id, "name": name})))
                .collect(),
        )
    }

    fn summary(nodes: &[HierarchyNode]) -> Vec<(Role, String, Option<String>)> {
        nodes
            .iter()
            .map(|n| {
                (
                    n.role,
                    n.child_item_id.clone(),
                    n.row.as_ref().map(|r| r["item"].as_str().unwrap().to_string()),
                )
            })
            .collect()
    }

    #[test]
    fn test_ancestor_ids() {
        assert_eq!(ancestor_ids("9.3.4"), vec!["9", "9.3"]);
        assert!(ancestor_ids("9").is_empty());
        assert_eq!(ancestor_ids("9.3"), vec!["9"]);
    }

    #[test]
    fn test_ancestor_ids_malformed_is_leaf() {
        assert!(ancestor_ids("").is_empty());
        assert!(ancestor_ids("9..4").is_empty());
        assert!(ancestor_ids("9.3.").is_empty());
        assert!(ancestor_ids(".9").is_empty());
        assert!(ancestor_ids("e7dc5cc7-cb72-4b70").is_empty());
    }

    #[tokio::test]
    async fn test_expand_child_and_parents() {
        let s = store(&[("9", "Machine"), ("9.3", "Gantry"), ("9.3.4", "Wooden Screw M10")]);
        let nodes = expand(&s, &CatalogSchema::components(), &ids(&["9.3.4"]), GapPolicy::Keep)
            .await
            .unwrap();
        assert_eq!(
            summary(&nodes),
            vec![
                (Role::Child, "9.3.4".to_string(), Some("9.3.4".to_string())),
                (Role::Parent, "9.3.4".to_string(), Some("9".to_string())),
                (Role::Parent, "9.3.4".to_string(), Some("9.3".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_shared_ancestor_once_per_child() {
        let s = store(&[("9", "Machine"), ("9.3", "Gantry"), ("9.4", "Rotator")]);
        let nodes = expand(
            &s,
            &CatalogSchema::components(),
            &ids(&["9.3", "9.4"]),
            GapPolicy::Keep,
        )
        .await
        .unwrap();
        let parents: Vec<_> = summary(&nodes)
            .into_iter()
            .filter(|(role, _, _)| *role == Role::Parent)
            .collect();
        assert_eq!(
            parents,
            vec![
                (Role::Parent, "9.3".to_string(), Some("9".to_string())),
                (Role::Parent, "9.4".to_string(), Some("9".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_leaf_id_has_only_child_row() {
        let s = store(&[("9", "Machine")]);
        let nodes = expand(&s, &CatalogSchema::components(), &ids(&["9"]), GapPolicy::Keep)
            .await
            .unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].role, Role::Child);
    }

    #[tokio::test]
    async fn test_no_ids_no_nodes() {
        let s = store(&[("9", "Machine")]);
        let nodes = expand(&s, &CatalogSchema::components(), &[], GapPolicy::Keep)
            .await
            .unwrap();
        assert!(nodes.is_empty());
        assert!(nodes_to_table(&nodes, "item").columns.is_empty());
    }

    #[tokio::test]
    async fn test_gap_kept_as_null_row() {
        // "9" is missing from the catalog
        let s = store(&[("9.3", "Gantry"), ("9.3.4", "Wooden Screw M10")]);
        let nodes = expand(&s, &CatalogSchema::components(), &ids(&["9.3.4"]), GapPolicy::Keep)
            .await
            .unwrap();
        assert_eq!(nodes.len(), 3);
        assert!(nodes[1].is_gap());
        assert_eq!(nodes[1].child_item_id, "9.3.4");

        let table = nodes_to_table(&nodes, "item");
        assert_eq!(table.columns, vec!["item", "name", "role", "child_item_id"]);
        assert_eq!(table.rows[1]["item"], Value::Null);
        assert_eq!(table.rows[1]["name"], Value::Null);
        assert_eq!(table.rows[1]["role"], json!("parent"));
    }

    #[tokio::test]
    async fn test_gap_dropped() {
        let s = store(&[("9.3", "Gantry"), ("9.3.4", "Wooden Screw M10")]);
        let nodes = expand(&s, &CatalogSchema::components(), &ids(&["9.3.4"]), GapPolicy::Drop)
            .await
            .unwrap();
        assert_eq!(
            summary(&nodes),
            vec![
                (Role::Child, "9.3.4".to_string(), Some("9.3.4".to_string())),
                (Role::Parent, "9.3.4".to_string(), Some("9.3".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_policies_agree_without_gaps() {
        let s = store(&[("9", "Machine"), ("9.3", "Gantry"), ("9.3.4", "Wooden Screw M10")]);
        let schema = CatalogSchema::components();
        let keep = expand(&s, &schema, &ids(&["9.3.4"]), GapPolicy::Keep).await.unwrap();
        let drop = expand(&s, &schema, &ids(&["9.3.4"]), GapPolicy::Drop).await.unwrap();
        assert_eq!(keep, drop);
    }

    #[tokio::test]
    async fn test_expansion_is_idempotent() {
        let s = store(&[
            ("9", "Machine"),
            ("9.3", "Gantry"),
            ("9.3.4", "Wooden Screw M10"),
            ("8.7.1", "Metal Screw S15"),
        ]);
        let schema = CatalogSchema::components();
        let first = expand(&s, &schema, &ids(&["9.3.4", "8.7.1"]), GapPolicy::Keep)
            .await
            .unwrap();

        let first_ids: HashSet<String> = first
            .iter()
            .filter_map(|n| n.row.as_ref().and_then(|r| id_text(&r["item"])))
            .collect();
        let closed: Vec<String> = first_ids.iter().cloned().collect();

        let second = expand(&s, &schema, &closed, GapPolicy::Drop).await.unwrap();
        let second_ids: HashSet<String> = second
            .iter()
            .filter_map(|n| n.row.as_ref().and_then(|r| id_text(&r["item"])))
            .collect();
        assert!(second_ids.is_subset(&first_ids));
    }

    #[tokio::test]
    async fn test_duplicate_child_ids_collapsed() {
        let s = store(&[("9", "Machine"), ("9.3", "Gantry")]);
        let nodes = expand(
            &s,
            &CatalogSchema::components(),
            &ids(&["9.3", "9.3"]),
            GapPolicy::Keep,
        )
        .await
        .unwrap();
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_matched_ids_first_seen_distinct() {
        use crate::catalog::CatalogKind;
        let rec = |id: Option<&str>| MatchRecord {
            kind: CatalogKind::Component,
            keyword: "k".to_string(),
            score: 1.0,
            rank: 1,
            matched_text: String::new(),
            choice_index: 0,
            identifier: id.map(str::to_string),
            row: Row::new(),
        };
        let records = vec![rec(Some("9.3.4")), rec(None), rec(Some("9.3")), rec(Some("9.3.4"))];
        assert_eq!(matched_ids(&records), vec!["9.3.4", "9.3"]);
    }
}
