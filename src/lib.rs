/*!
# AI Data Analyst

Upload a spreadsheet, get business insights and chart recommendations from a
hosted language model, and see the recommended charts rendered in the browser.

## Overview

A single upload flows through a fixed pipeline:

1. **Load** - CSV or XLSX bytes become a [`dataset::Dataset`]. CSV encoding is
   detected first (BOM, UTF-8, then statistical detection).
2. **Prompt** - the leading rows are rendered as a fixed-width text table and
   embedded in two prompts, one asking for insights and one asking for chart
   recommendations as a JSON array.
3. **Complete** - both prompts are sent to the Gemini `generateContent`
   endpoint. Failures come back as text carrying an error marker, never as a
   panic or an aborted request.
4. **Normalize** - markdown fences are stripped from the recommendation text
   and what remains is parsed into [`normalize::ChartSpec`] records.
5. **Chart** - each spec naming a bar, line, scatter or pie chart over existing
   columns is rendered to SVG; anything else is skipped and logged.

Problems along the way are collected as [`notice::Notices`] in the final
[`report::Report`] instead of stopping the run.

## Front ends

- **website** (`web` feature) - axum server with an upload page and a JSON
  endpoint (`POST /api/analyze`)
- **analyze** - terminal front end that prints the report and writes charts as
  SVG files

## Modules

- **dataset**: In-memory table and cell value inference
- **loader**: CSV/XLSX parsing and encoding detection
- **prompts**: Prompt construction from the dataset preview
- **llm**: Gemini client and the [`llm::TextGenerator`] seam
- **normalize**: Fence stripping and chart spec decoding
- **graph**: Chart spec mapping and SVG rendering
- **notice**: User-facing errors, warnings and debug echoes
- **report**: The end-to-end pipeline
- **config**: Command line and environment configuration
- **app**: Routing and handlers (`web` feature)
*/

pub mod config;
pub mod dataset;
pub mod graph;
pub mod llm;
pub mod loader;
pub mod normalize;
pub mod notice;
pub mod prompts;
pub mod report;

#[cfg(feature = "web")]
pub mod app;

pub use dataset::{Column, Dataset, Value};
pub use llm::{Completion, GeminiClient, TextGenerator};
pub use notice::{Level, Notice, Notices};
pub use report::{Report, ReportOptions, analyze};
