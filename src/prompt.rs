//! Digest prompts and reply parsing.
//!
//! The model is asked to answer in blank-line separated blocks:
//!
//! ```text
//! Component ID: 9.3.4
//! Supplier ID: e7dc5cc7
//! Summary: Delivery issues with BondBrook for the screws.
//! Latest Update: Checking with CircuitHarbor for delivery
//! ```
//!
//! [`parse_llm_output`] turns each well-formed block into a
//! [`DigestEntry`] and skips the rest.

use serde::{Deserialize, Serialize};

use crate::source::ChatMessage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestEntry {
    pub item_id: Option<String>,
    pub supplier_id: Option<String>,
    pub summary: String,
    pub latest_update: String,
}

/// One `author: text` line per message with text.
pub fn render_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter(|m| !m.text.trim().is_empty())
        .map(|m| format!("{}: {}", m.author, m.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

const COMPONENT_RULES: &str = "\
1. Only consider messages about issues, changes or updates to components. Ignore casual conversation.
2. Components are hierarchical: Item 1 -> Item 1.1 -> Item 1.1.1 (parent -> child -> grandchild).
3. Summarise under the most specific component discussed. If both a parent (e.g. \"Gantry 9.3\") and
   its child (e.g. \"Wooden Screw 9.3.4\") are discussed, write the summary for the child only.
4. If several components share a name and parent name, pick the one you are most confident about.
5. When a component is mentioned without its ID, identify it from the component details by name and context.";

const COMPONENT_EXAMPLE: &str = "\
Example messages:
User A: Hey the stress testing for the wooden screw failed
User B: Try increasing the density
User C: Didn't we have the same problem with the metal screw while testing the rotator?
User A: We might also have to test the belt for the gantry.
User A: I am going out for lunch
User D: Yeah the test is going on

Example component details:
9.3 - Gantry
9.3.4 - Wooden Screw M10
8.7 - Rotator
8.7.1 - Metal Screw S15
10 - Gantry
10.7 - Belt

Example output:
Component ID: 9.3.4
Summary: The stress test for the Wooden Screw M10 failed. The team plans to increase its density.
Latest Update: Planning to increase screw density.

Component ID: 10.7
Summary: A stress test is planned for the belt in the Gantry.
Latest Update: Test ongoing, awaiting results.

Component ID: 8.7.1
Summary: Problems with the Metal Screw S15 in the Rotator during testing.
Latest Update: No data yet";

const SUPPLIER_EXAMPLE: &str = "\
Example messages:
User A: Hey we might not receive the M10 screws from BondBrook
User B: Why? What's the problem?
User C: Didn't we have the same problem with the metal screws with them?
User A: We might also have to check the belt for the gantry.
User D: I am checking with CircuitHarbor if they can deliver

Example component details:
9.3 - Gantry
9.3.4 - Wooden Screw M10
8.7.1 - Metal Screw S15
10.7 - Belt

Example supplier details:
e7dc5cc7 - BondBrook Adhesives
5f5fb9cc - CircuitHarbor Distribution

Example output:
Component ID: 9.3.4
Supplier ID: e7dc5cc7
Summary: Delivery issues with BondBrook Adhesives for the screws. There were past problems with metal screws from them too.
Latest Update: Checking with CircuitHarbor for delivery

Component ID: 10.7
Supplier ID: e7dc5cc7
Summary: The supply of the belt for the Gantry may need checking.
Latest Update: No data yet";

/// Prompt for a component-only digest. `component_table` is the markdown
/// table of matched components and their ancestors.
pub fn manufacturing_prompt(messages: &[ChatMessage], component_table: &str) -> String {
    format!(
        "You are an assistant for a manufacturing dashboard that shows the latest updates on the \
components a company handles. You are given chat messages between the engineering team and a \
list of the components they manage.

Task: identify which components are being discussed and summarise the issues, changes or \
updates for each one.

Instructions:
{rules}
6. Output one block per component, separated by a blank line, and nothing else:
Component ID: [ID]
Summary: [Brief overview of all discussion points about this component]
Latest Update: [Most recent action or status mentioned]

{example}

<text messages>
{messages}

<component details>
{components}
",
        rules = COMPONENT_RULES,
        example = COMPONENT_EXAMPLE,
        messages = render_messages(messages),
        components = component_table,
    )
}

/// Prompt for a component and supplier digest.
pub fn supplier_prompt(
    messages: &[ChatMessage],
    component_table: &str,
    supplier_table: &str,
) -> String {
    format!(
        "You are an assistant for a manufacturing and supply-chain dashboard that shows the latest \
updates on the components a company handles. You are given chat messages between the \
engineering and supply-chain teams, a list of suppliers and a list of components.

Task: identify which suppliers and components are being discussed and summarise the issues, \
changes or updates for each one.

Instructions:
{rules}
6. Identify suppliers from the supplier details by name and context.
7. Output one block per component, separated by a blank line, and nothing else:
Component ID: [ID]
Supplier ID: [ID]
Summary: [Brief overview of all discussion points about this component]
Latest Update: [Most recent action or status mentioned]

{example}

<text messages>
{messages}

<component details>
{components}

<supplier details>
{suppliers}
",
        rules = COMPONENT_RULES,
        example = SUPPLIER_EXAMPLE,
        messages = render_messages(messages),
        components = component_table,
        suppliers = supplier_table,
    )
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Component,
    Supplier,
    Summary,
    LatestUpdate,
}

const LABELS: [(&str, Field); 4] = [
    ("component id:", Field::Component),
    ("supplier id:", Field::Supplier),
    ("summary:", Field::Summary),
    ("latest update:", Field::LatestUpdate),
];

fn split_label(line: &str) -> Option<(Field, &str)> {
    let trimmed = line.trim_start();
    LABELS.iter().find_map(|(label, field)| {
        let head = trimmed.get(..label.len())?;
        head.eq_ignore_ascii_case(label)
            .then(|| (*field, trimmed[label.len()..].trim()))
    })
}

fn parse_block(block: &str) -> Option<DigestEntry> {
    let mut component: Option<String> = None;
    let mut supplier: Option<String> = None;
    let mut summary: Option<String> = None;
    let mut update: Option<String> = None;
    let mut current: Option<Field> = None;

    for line in block.lines() {
        if let Some((field, value)) = split_label(line) {
            let slot = match field {
                Field::Component => &mut component,
                Field::Supplier => &mut supplier,
                Field::Summary => &mut summary,
                Field::LatestUpdate => &mut update,
            };
            // first occurrence wins
            if slot.is_none() {
                *slot = Some(value.to_string());
                current = Some(field);
            } else {
                current = None;
            }
            continue;
        }
        // continuation lines extend a multi-line summary or update
        let slot = match current {
            Some(Field::Summary) => &mut summary,
            Some(Field::LatestUpdate) => &mut update,
            _ => continue,
        };
        if let Some(text) = slot {
            text.push('\n');
            text.push_str(line.trim());
        }
    }

    let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let item_id = non_empty(component);
    let supplier_id = non_empty(supplier);
    let summary = non_empty(summary)?;
    let latest_update = non_empty(update)?;
    if item_id.is_none() && supplier_id.is_none() {
        return None;
    }
    Some(DigestEntry {
        item_id,
        supplier_id,
        summary,
        latest_update,
    })
}

/// Parse the model's reply into digest entries.
///
/// Blocks are separated by blank lines. A block is kept when it has a
/// summary, a latest update, and a component or supplier id. Labels are
/// matched case-insensitively.
pub fn parse_llm_output(text: &str) -> Vec<DigestEntry> {
    let normalized = text.replace("\r\n", "\n");
    normalized
        .trim()
        .split("\n\n")
        .filter_map(parse_block)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(author: &str, text: &str) -> ChatMessage {
        ChatMessage {
            timestamp: String::new(),
            author: author.to_string(),
            text: text.to_string(),
            has_thread: false,
        }
    }

    #[test]
    fn test_render_messages_skips_empty() {
        let rendered = render_messages(&[
            msg("Ana", "the wooden screw failed"),
            msg("Lee", "  "),
            msg("Sam", "try increasing the density "),
        ]);
        assert_eq!(rendered, "Ana: the wooden screw failed\nSam: try increasing the density");
    }

    #[test]
    fn test_manufacturing_prompt_embeds_inputs() {
        let table = "| item | name |\n|:---|:---|\n| 9.3.4 | Wooden Screw M10 |\n";
        let prompt = manufacturing_prompt(&[msg("Ana", "screw test failed")], table);
        assert!(prompt.contains("Ana: screw test failed"));
        assert!(prompt.contains("| 9.3.4 | Wooden Screw M10 |"));
        assert!(prompt.contains("Component ID: [ID]"));
        assert!(!prompt.contains("<supplier details>"));
    }

    #[test]
    fn test_supplier_prompt_embeds_both_tables() {
        let prompt = supplier_prompt(&[msg("Ana", "BondBrook is late")], "COMPONENTS", "SUPPLIERS");
        assert!(prompt.contains("<component details>\nCOMPONENTS"));
        assert!(prompt.contains("<supplier details>\nSUPPLIERS"));
        assert!(prompt.contains("Supplier ID: [ID]"));
    }

    #[test]
    fn test_parse_component_blocks() {
        let reply = "Component ID: 9.3.4\nSummary: The stress test failed.\nLatest Update: Planning to increase density.\n\n\
Component ID: 10.7\nSummary: Belt test planned\nLatest update: Test ongoing";
        let entries = parse_llm_output(reply);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].item_id.as_deref(), Some("9.3.4"));
        assert_eq!(entries[0].supplier_id, None);
        assert_eq!(entries[0].summary, "The stress test failed.");
        assert_eq!(entries[0].latest_update, "Planning to increase density.");
        assert_eq!(entries[1].latest_update, "Test ongoing");
    }

    #[test]
    fn test_parse_skips_incomplete_blocks() {
        let reply = "Here is the digest:\n\n\
Component ID: 8.7.1\nSummary: Problems in the Rotator\nLast Update: No data yet\n\n\
Summary: orphan\nLatest Update: nothing\n\n\
Component ID: 9.3\nSummary: Gantry alignment\nLatest Update: Realigned";
        let entries = parse_llm_output(reply);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].item_id.as_deref(), Some("9.3"));
    }

    #[test]
    fn test_parse_supplier_blocks() {
        let reply = "Component ID: 9.3.4\r\nSupplier ID: e7dc5cc7\r\nSummary: Delivery issues\r\nLatest Update: Checking alternatives\r\n\r\n\
Supplier ID: 5f5fb9cc\r\nSummary: Can deliver belts\r\nLatest Update: Quote requested";
        let entries = parse_llm_output(reply);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].supplier_id.as_deref(), Some("e7dc5cc7"));
        assert_eq!(entries[1].item_id, None);
        assert_eq!(entries[1].supplier_id.as_deref(), Some("5f5fb9cc"));
    }

    #[test]
    fn test_parse_multiline_summary() {
        let reply = "component id: 9.3.4\nsummary: First point.\nSecond point.\nLATEST UPDATE: Retest Friday";
        let entries = parse_llm_output(reply);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].summary, "First point.\nSecond point.");
        assert_eq!(entries[0].latest_update, "Retest Friday");
    }

    #[test]
    fn test_parse_empty_reply() {
        assert!(parse_llm_output("").is_empty());
        assert!(parse_llm_output("No components discussed.").is_empty());
    }
}
