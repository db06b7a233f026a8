use crate::graph::RenderOptions;
use crate::llm::{ApiKey, DEFAULT_ENDPOINT, LlmConfig};
use crate::report::ReportOptions;
use clap::{ArgAction, Args, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by every front end that runs the analysis pipeline
///
/// Each flag can also be supplied through the environment variable named
/// next to it; the API key has no default and must come from one of the two.
#[derive(Clone, Debug, Args)]
pub struct AnalysisArgs {
    /// API key for the text-generation endpoint
    #[arg(long = "api-key", env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Text-generation endpoint URL
    #[arg(long, env = "GEMINI_URL", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Request timeout in seconds (HTTP client default when unset)
    #[arg(long = "timeout-secs", env = "ANALYST_LLM_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Echo raw endpoint responses as debug notices
    #[arg(long = "show-raw", env = "ANALYST_SHOW_RAW", default_value_t = true, action = ArgAction::Set)]
    pub show_raw: bool,

    /// Rendered chart width in pixels
    #[arg(long = "chart-width", default_value_t = 800)]
    pub chart_width: u32,

    /// Rendered chart height in pixels
    #[arg(long = "chart-height", default_value_t = 500)]
    pub chart_height: u32,
}

impl AnalysisArgs {
    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            endpoint: self.endpoint.clone(),
            api_key: ApiKey::new(self.api_key.clone()),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            show_raw: self.show_raw,
            render: RenderOptions {
                width: self.chart_width,
                height: self.chart_height,
            },
        }
    }
}

/// Configuration of the `website` binary
#[derive(Clone, Debug, Parser)]
#[command(name = "website", version, about = "Upload a spreadsheet, get AI insights and charts")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "ANALYST_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Largest accepted upload, in megabytes
    #[arg(long = "max-upload-mb", env = "ANALYST_MAX_UPLOAD_MB", default_value_t = 25)]
    pub max_upload_mb: usize,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

impl ServerConfig {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

/// Configuration of the `analyze` binary
#[derive(Clone, Debug, Parser)]
#[command(name = "analyze", version, about = "Analyze a CSV or XLSX file from the terminal")]
pub struct CliConfig {
    /// File to analyze (.csv or .xlsx)
    pub path: PathBuf,

    /// Directory that receives rendered charts as SVG files
    #[arg(long = "out-dir", default_value = "charts")]
    pub out_dir: PathBuf,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}
