use crate::dataset::{Dataset, Value, format_table};
use crate::graph::{self, ChartKind, RenderOptions};
use crate::llm::{Completion, TextGenerator};
use crate::loader;
use crate::normalize::{self, ChartSpec};
use crate::notice::{Notice, Notices};
use crate::prompts;
use log::info;
use serde::Serialize;

/// Rows shown in the data preview table
pub const PREVIEW_ROWS: usize = 20;

/// Knobs for one pipeline run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportOptions {
    /// Echo raw endpoint responses as debug notices
    pub show_raw: bool,
    /// Canvas size for every chart
    pub render: RenderOptions,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            show_raw: true,
            render: RenderOptions::default(),
        }
    }
}

/// The leading rows of the upload, as shown to the user
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Preview {
    /// Column names after normalisation
    pub headers: Vec<String>,
    /// At most [`PREVIEW_ROWS`] rows, one value per column
    pub rows: Vec<Vec<Value>>,
}

impl Preview {
    fn from_dataset(dataset: &Dataset, rows: usize) -> Self {
        let head = dataset.head(rows);
        Preview {
            headers: head.columns.iter().map(|c| c.name.clone()).collect(),
            rows: (0..head.row_count())
                .map(|r| head.row(r).into_iter().cloned().collect())
                .collect(),
        }
    }

    /// Fixed-width text rendering, for terminals
    pub fn to_text(&self) -> String {
        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect();
        format_table(&self.headers, &rows)
    }
}

/// One recommended chart and what became of it
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartEntry {
    /// Title from the recommendation, empty when it had none
    pub title: String,
    /// `Why: {insight}` line shown under the title
    pub caption: String,
    /// Kind of the rendered chart
    pub kind: Option<ChartKind>,
    /// Rendered chart, absent when the record was skipped
    pub svg: Option<String>,
    /// Reason the chart was not drawn
    pub skipped: Option<String>,
}

/// Everything one upload produces
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Report {
    /// Name the file was uploaded under
    pub file_name: String,
    /// Encoding label for CSV uploads; none for XLSX
    pub encoding: Option<String>,
    /// Data rows in the whole upload
    pub rows: usize,
    /// Columns in the upload
    pub columns: usize,
    /// Leading rows, absent when there was nothing to analyse
    pub preview: Option<Preview>,
    /// Markdown returned by the insight request (or its error text)
    pub insights: Option<String>,
    /// One entry per recommendation, in response order
    pub charts: Vec<ChartEntry>,
    /// Messages for the user, in the order they arose
    pub notices: Vec<Notice>,
}

/// Runs the whole pipeline for one uploaded file
///
/// Load, preview, insights, chart recommendations, then one chart per
/// recommendation. The two completion requests are issued one after the
/// other. Nothing in here fails: every problem is recorded as a notice in the
/// returned report and the run continues where it can.
///
/// # Arguments
/// * `file_name` - Name of the upload, which selects CSV or XLSX parsing
/// * `bytes` - Raw upload content
/// * `generator` - Source of completions
/// * `options` - Debug echo and chart size settings
///
/// # Returns
/// * `Report` - What to show the user
pub fn analyze(
    file_name: &str,
    bytes: &[u8],
    generator: &dyn TextGenerator,
    options: &ReportOptions,
) -> Report {
    let mut notices = Notices::new();
    let mut report = Report {
        file_name: file_name.to_string(),
        ..Report::default()
    };

    let loaded = loader::load(bytes, file_name, &mut notices);
    let dataset = loaded.dataset;
    report.encoding = loaded.encoding.map(str::to_string);
    report.rows = dataset.row_count();
    report.columns = dataset.column_count();

    if dataset.is_empty() {
        if notices.is_empty() {
            notices.info("The uploaded file contains no data rows.");
        }
        report.notices = notices.iter().cloned().collect();
        return report;
    }

    report.preview = Some(Preview::from_dataset(&dataset, PREVIEW_ROWS));

    info!("Generating insights for {}", file_name);
    let insights = generator.complete(&prompts::insight_prompt(&dataset));
    echo_raw("insights", &insights, options, &mut notices);
    report.insights = Some(insights.text);

    info!("Generating chart recommendations for {}", file_name);
    let recommendations = generator.complete(&prompts::chart_prompt(&dataset));
    echo_raw("chart recommendations", &recommendations, options, &mut notices);

    let specs = normalize::normalize_chart_list(&recommendations.text, &mut notices);
    report.charts = specs
        .iter()
        .map(|spec| chart_entry(&dataset, spec, &options.render))
        .collect();

    info!(
        "Finished {}: {} of {} charts rendered",
        file_name,
        report.charts.iter().filter(|c| c.svg.is_some()).count(),
        report.charts.len()
    );
    report.notices = notices.iter().cloned().collect();
    report
}

fn echo_raw(step: &str, completion: &Completion, options: &ReportOptions, notices: &mut Notices) {
    if !options.show_raw {
        return;
    }
    if let Some(raw) = &completion.raw_response {
        notices.debug(format!("Raw response ({}):\n{}", step, raw));
    }
}

fn chart_entry(dataset: &Dataset, spec: &ChartSpec, render: &RenderOptions) -> ChartEntry {
    let mut entry = ChartEntry {
        title: spec.title.clone().unwrap_or_default(),
        caption: format!("Why: {}", spec.insight.as_deref().unwrap_or_default()),
        kind: None,
        svg: None,
        skipped: None,
    };

    match graph::build_chart(dataset, spec).and_then(|chart| {
        let svg = chart.to_svg(render)?;
        Ok((chart.kind, svg))
    }) {
        Ok((kind, svg)) => {
            entry.kind = Some(kind);
            entry.svg = Some(svg);
        }
        Err(e) => {
            graph::log_skip(spec, &e);
            entry.skipped = Some(e.to_string());
        }
    }

    entry
}
