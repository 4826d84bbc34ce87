//! Terminal tables for CLI output.

use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};

use crate::models::{Record, ToolDescriptor};

/// Widest a summary cell may get before it is cut
pub const SUMMARY_WIDTH: usize = 100;

/// Truncate text to `max_width` characters, appending an ellipsis if anything was cut.
///
/// # Examples
///
/// ```
/// use drug_discovery_mcp::utils::truncate_with_ellipsis;
///
/// assert_eq!(truncate_with_ellipsis("Hello World", 8), "Hello...");
/// assert_eq!(truncate_with_ellipsis("Hi", 8), "Hi");
/// ```
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if text.chars().count() <= max_width {
        return text.to_string();
    }
    if max_width <= 3 {
        return ".".repeat(max_width);
    }

    let kept: String = text.chars().take(max_width - 3).collect();
    format!("{}...", kept.trim_end())
}

/// Short label for the record variant
pub fn record_kind(record: &Record) -> &'static str {
    match record {
        Record::Paper(_) => "paper",
        Record::Compound(_) => "compound",
        Record::Target(_) => "target",
        Record::Activity(_) => "activity",
        Record::Trial(_) => "trial",
        Record::WebResult(_) => "web",
        Record::Answer(_) => "answer",
    }
}

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Table of tool names, required parameters and descriptions
pub fn tools_table<'a>(descriptors: impl IntoIterator<Item = &'a ToolDescriptor>) -> Table {
    let mut table = base_table();
    table.set_header(vec!["Tool", "Required", "Parameters", "Description"]);

    for descriptor in descriptors {
        let params = descriptor
            .params
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut required = descriptor.required().join(", ");
        for group in &descriptor.any_of {
            if !required.is_empty() {
                required.push_str(", ");
            }
            required.push_str(&format!("one of ({})", group.join("|")));
        }

        table.add_row(vec![
            Cell::new(&descriptor.name).add_attribute(Attribute::Bold),
            Cell::new(required),
            Cell::new(params),
            Cell::new(truncate_with_ellipsis(&descriptor.description, SUMMARY_WIDTH)),
        ]);
    }

    table
}

/// Table with one row per record
pub fn records_table(records: &[Record]) -> Table {
    let mut table = base_table();
    table.set_header(vec!["#", "Kind", "Id", "Summary"]);

    for (index, record) in records.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(record_kind(record)),
            Cell::new(record.id().unwrap_or("-")).add_attribute(Attribute::Bold),
            Cell::new(truncate_with_ellipsis(&record.summary(), SUMMARY_WIDTH)),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Answer, ParamSpec, PaperOrigin};
    use crate::sources::mock::make_paper;

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("Hello World", 8), "Hello...");
        assert_eq!(truncate_with_ellipsis("Hi", 8), "Hi");
        assert_eq!(truncate_with_ellipsis("Hello", 2), "..");
        assert_eq!(truncate_with_ellipsis("Ünïcödé text", 10), "Ünïcödé...");
    }

    #[test]
    fn test_records_table() {
        let records = vec![
            make_paper("12345", "HER2 signalling", PaperOrigin::PubMed),
            Record::Answer(Answer {
                text: "Trastuzumab".to_string(),
            }),
        ];

        let rendered = records_table(&records).to_string();
        assert!(rendered.contains("12345"));
        assert!(rendered.contains("paper"));
        assert!(rendered.contains("answer"));
    }

    #[test]
    fn test_tools_table_lists_required_groups() {
        let descriptor = ToolDescriptor::new("get_bioactivity", "Activities")
            .param(ParamSpec::string("target_chembl_id", "Target"))
            .param(ParamSpec::string("molecule_chembl_id", "Molecule"))
            .at_least_one_of(&["target_chembl_id", "molecule_chembl_id"]);

        let rendered = tools_table([&descriptor]).to_string();
        assert!(rendered.contains("get_bioactivity"));
        assert!(rendered.contains("one of"));
    }
}
