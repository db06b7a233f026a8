use analyst::llm::{Completion, TextGenerator};
use analyst::loader;
use analyst::notice::{Level, Notices};
use analyst::prompts;
use analyst::report::{ReportOptions, analyze};
use analyst::{Dataset, Value};
use rust_xlsxwriter::Workbook;
use std::sync::Mutex;

/// Records every prompt and answers each with the next scripted reply
struct Recorder {
    replies: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl Recorder {
    fn new(replies: &[&str]) -> Self {
        Recorder {
            replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl TextGenerator for Recorder {
    fn complete(&self, prompt: &str) -> Completion {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Completion::text(self.replies.lock().unwrap().pop().unwrap_or_default())
    }
}

fn load_csv(content: &str) -> Dataset {
    let mut notices = Notices::new();
    let loaded = loader::load(content.as_bytes(), "data.csv", &mut notices);
    assert!(notices.is_empty(), "unexpected notices: {:?}", notices);
    loaded.dataset
}

#[test]
fn small_csv_goes_through_the_whole_pipeline() {
    let csv = "Category,Profit\nA,10\nB,20\nC,5";
    let dataset = load_csv(csv);

    assert_eq!(dataset.row_count(), 3);
    let chart_prompt = prompts::chart_prompt(&dataset);
    for row in ["A      10", "B      20", "C       5"] {
        assert!(chart_prompt.contains(row), "chart prompt lacks {:?}", row);
    }

    let generator = Recorder::new(&[
        "1. Category B earns twice as much as A.",
        "Sure!\n```json\n[\
            {\"chart_type\": \"pie\", \"x\": \"Category\", \"y\": \"Profit\", \"title\": \"Profit share\", \"insight\": \"B dominates\"},\
            {\"chart_type\": \"Bar\", \"x\": \"Category\", \"y\": \"Profit\"}\
        ]\n```",
    ]);
    let report = analyze("sales.csv", csv.as_bytes(), &generator, &ReportOptions::default());

    assert_eq!(report.rows, 3);
    assert_eq!(report.charts.len(), 2);
    assert!(report.charts.iter().all(|c| c.svg.is_some()));
    assert_eq!(report.charts[0].title, "Profit share");
    assert_eq!(report.charts[1].title, "");
    assert_eq!(report.charts[1].caption, "Why: ");
    assert!(report.notices.is_empty());

    let sent = generator.prompts.lock().unwrap();
    assert_eq!(sent[1], chart_prompt);
    assert_eq!(sent[0], prompts::insight_prompt(&dataset));
}

#[test]
fn xlsx_upload_matches_equivalent_csv() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Region").unwrap();
    sheet.write_string(0, 1, "Sales").unwrap();
    for (row, (region, sales)) in [("North", 120.0), ("South", 80.5)].into_iter().enumerate() {
        sheet.write_string(row as u32 + 1, 0, region).unwrap();
        sheet.write_number(row as u32 + 1, 1, sales).unwrap();
    }
    let bytes = workbook.save_to_buffer().unwrap();

    let mut notices = Notices::new();
    let loaded = loader::load(&bytes, "REPORT.XLSX", &mut notices);

    assert!(notices.is_empty());
    assert_eq!(loaded.encoding, None);
    assert_eq!(loaded.dataset.column_names(), vec!["Region", "Sales"]);
    assert_eq!(loaded.dataset.row_count(), 2);
    assert_eq!(loaded.dataset.row(1)[0], &Value::Text("South".to_string()));
    assert_eq!(loaded.dataset.row(1)[1], &Value::Float(80.5));
}

#[test]
fn unusable_recommendations_leave_insights_intact() {
    let generator = Recorder::new(&["Insight text", "I cannot produce charts today."]);

    let report = analyze(
        "sales.csv",
        b"Month,Revenue\nJan,100\nFeb,150\n",
        &generator,
        &ReportOptions::default(),
    );

    assert_eq!(report.insights.as_deref(), Some("Insight text"));
    assert!(report.charts.is_empty());
    assert_eq!(report.notices.len(), 1);
    assert_eq!(report.notices[0].level, Level::Warning);
}

#[test]
fn latin1_csv_is_decoded_before_prompting() {
    let mut bytes = b"City,Visitors\n".to_vec();
    bytes.extend_from_slice(b"M\xfcnchen,42\nK\xf6ln,17\n");
    let generator = Recorder::new(&["ok", "[]"]);

    let report = analyze("cities.csv", &bytes, &generator, &ReportOptions::default());

    assert_eq!(report.rows, 2);
    assert_ne!(report.encoding.as_deref(), Some("UTF-8"));
    let sent = generator.prompts.lock().unwrap();
    assert!(sent[0].contains("München"));
    assert!(sent[0].contains("Köln"));
}
