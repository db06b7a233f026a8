//! Prompt templates sent to the text-generation endpoint

use crate::dataset::Dataset;

/// Rows of the dataset included in the insight prompt
pub const INSIGHT_PREVIEW_ROWS: usize = 15;

/// Rows of the dataset included in the chart-recommendation prompt
pub const CHART_PREVIEW_ROWS: usize = 10;

/// Placeholder replaced by the rendered data preview
const PREVIEW_SLOT: &str = "{preview}";

/// Business-insight prompt; `{preview}` is replaced with the table sample
pub const INSIGHT_TEMPLATE: &str = r#"
You are a Mckinsey level business strategy consultant.

Based on the dataset below, return 3–5 actionable business insights. Each insight should include:
- Decision
- What you observed
- Why it matters
- What action the business should take
- Possible Impact after implementation in terms of numbers

above all should be very crisp and to the point avoid long sentences

Data sample:
{preview}

Respond in numbered bullet points.
"#;

/// Chart-recommendation prompt; `{preview}` is replaced with the table sample
pub const CHART_TEMPLATE: &str = r#"
You are a data visualization expert.

Given the following table:
{preview}

Suggest 2–3 useful charts. For each chart, include:
1. Chart Type (bar, line, pie, scatter, etc.)
2. X-axis and Y-axis columns
3. A short Chart Title
4. One-sentence business insight about why this chart is useful.

Format your answer as a JSON list like this:
[
  {
    "chart_type": "bar",
    "x": "Category",
    "y": "Profit",
    "title": "Profit by Category",
    "insight": "Helps identify most profitable segments"
  }
]
"#;

/// Builds the prompt asking for numbered business insights
///
/// Embeds the first [`INSIGHT_PREVIEW_ROWS`] rows as a plain-text table.
pub fn insight_prompt(dataset: &Dataset) -> String {
    fill(INSIGHT_TEMPLATE, dataset, INSIGHT_PREVIEW_ROWS)
}

/// Builds the prompt asking for a JSON list of chart specifications
///
/// Embeds the first [`CHART_PREVIEW_ROWS`] rows as a plain-text table.
pub fn chart_prompt(dataset: &Dataset) -> String {
    fill(CHART_TEMPLATE, dataset, CHART_PREVIEW_ROWS)
}

fn fill(template: &str, dataset: &Dataset, rows: usize) -> String {
    template.replace(PREVIEW_SLOT, &dataset.head(rows).to_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Value;

    fn numbered(rows: i64) -> Dataset {
        Dataset::from_records(
            vec!["id".into()],
            (0..rows).map(|i| vec![Value::Int(1000 + i)]).collect(),
        )
    }

    #[test]
    fn insight_prompt_uses_fifteen_rows() {
        let prompt = insight_prompt(&numbered(40));

        assert!(prompt.contains("1014"));
        assert!(!prompt.contains("1015"));
        assert!(prompt.contains("Respond in numbered bullet points."));
        assert!(!prompt.contains(PREVIEW_SLOT));
    }

    #[test]
    fn chart_prompt_uses_ten_rows() {
        let prompt = chart_prompt(&numbered(40));

        assert!(prompt.contains("1009"));
        assert!(!prompt.contains("1010"));
        assert!(prompt.contains("\"chart_type\": \"bar\""));
    }

    #[test]
    fn prompts_are_deterministic() {
        let ds = numbered(5);
        assert_eq!(chart_prompt(&ds), chart_prompt(&ds));
        assert_eq!(insight_prompt(&ds), insight_prompt(&ds));
    }

    #[test]
    fn short_dataset_is_embedded_whole() {
        let ds = Dataset::from_records(
            vec!["Category".into(), "Profit".into()],
            vec![
                vec![Value::infer("A"), Value::infer("10")],
                vec![Value::infer("B"), Value::infer("20")],
            ],
        );

        let prompt = chart_prompt(&ds);
        assert!(prompt.contains("Given the following table:\nCategory  Profit\n       A      10\n       B      20\n"));
    }
}
