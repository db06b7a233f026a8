#![cfg(not(tarpaulin_include))]

use analyst::config::CliConfig;
use analyst::llm::GeminiClient;
use analyst::report::{Report, analyze};
use clap::Parser;
use env_logger::Env;
use std::fs;
use std::path::Path;

/// Runs the analysis pipeline on one file from the terminal
///
/// Prints the preview, insights and notices, and writes every rendered chart
/// to `<out-dir>/chart_<n>.svg`.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = CliConfig::parse();
    let bytes = fs::read(&config.path)?;
    let file_name = config
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let client = GeminiClient::new(config.analysis.llm_config());
    let report = analyze(&file_name, &bytes, &client, &config.analysis.report_options());

    print_report(&report);
    write_charts(&report, &config.out_dir)?;

    Ok(())
}

fn print_report(report: &Report) {
    for notice in &report.notices {
        println!("[{}] {}", notice.level, notice.message);
    }

    if let Some(preview) = &report.preview {
        let encoding = report.encoding.as_deref().unwrap_or("n/a");
        println!(
            "\n## Data Preview ({} rows x {} columns, encoding {})\n",
            report.rows, report.columns, encoding
        );
        println!("{}", preview.to_text());
    }

    if let Some(insights) = &report.insights {
        println!("\n## AI-Generated Insights\n\n{}", insights);
    }

    if !report.charts.is_empty() {
        println!("\n## Recommended Charts\n");
    }
    for (n, chart) in report.charts.iter().enumerate() {
        println!("{}. {}", n + 1, chart.title);
        println!("   {}", chart.caption);
        if let Some(reason) = &chart.skipped {
            println!("   skipped: {}", reason);
        }
    }
}

fn write_charts(report: &Report, out_dir: &Path) -> std::io::Result<()> {
    let rendered: Vec<(usize, &String)> = report
        .charts
        .iter()
        .enumerate()
        .filter_map(|(n, chart)| chart.svg.as_ref().map(|svg| (n + 1, svg)))
        .collect();
    if rendered.is_empty() {
        return Ok(());
    }

    fs::create_dir_all(out_dir)?;
    for (n, svg) in rendered {
        let path = out_dir.join(format!("chart_{}.svg", n));
        fs::write(&path, svg)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}
