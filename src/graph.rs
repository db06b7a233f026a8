use crate::dataset::{Column, Dataset};
use crate::normalize::ChartSpec;
use log::{info, warn};
use plotters::coord::Shift;
use plotters::element::Pie;
use plotters::prelude::*;
use serde::Serialize;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use thiserror::Error;

/// Title used when a spec does not provide one
pub const DEFAULT_TITLE: &str = "Chart";

/// Widest value axis plotters can lay ticks out on
pub const MAX_AXIS_SPAN: f64 = 1e300;

/// Chart kinds the mapper knows how to draw
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Vertical bars, one per row, categories along X
    Bar,

    /// Points joined in row order
    Line,

    /// Unconnected points
    Scatter,

    /// Share of a total per category
    Pie,
}

impl FromStr for ChartKind {
    type Err = ChartError;

    /// Parses a chart type name, ignoring case
    ///
    /// # Examples
    /// ```
    /// use analyst::graph::ChartKind;
    ///
    /// assert_eq!("Bar".parse::<ChartKind>().unwrap(), ChartKind::Bar);
    /// assert!("histogram".parse::<ChartKind>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bar" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            "scatter" => Ok(ChartKind::Scatter),
            "pie" => Ok(ChartKind::Pie),
            _ => Err(ChartError::UnknownKind(s.to_string())),
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Scatter => "scatter",
            ChartKind::Pie => "pie",
        };
        write!(f, "{}", name)
    }
}

/// Why a chart spec could not be turned into a chart
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ChartError {
    /// `chart_type` names something other than bar, line, scatter or pie
    #[error("unrecognised chart type '{0}'")]
    UnknownKind(String),

    /// A required spec field (`chart_type`, `x` or `y`) is absent
    #[error("chart spec has no '{0}' field")]
    MissingField(&'static str),

    /// The spec names a column the upload does not have
    #[error("column '{0}' is not in the dataset")]
    MissingColumn(String),

    /// The value column has no usable numbers
    #[error("column '{0}' has no numeric values to plot")]
    NoNumericValues(String),

    /// The values of a column are too far apart to fit on one axis
    #[error("column '{0}' spans a range too wide to plot")]
    RangeTooWide(String),

    /// plotters failed while drawing
    #[error("rendering failed: {0}")]
    Render(String),
}

impl ChartError {
    /// True when the spec named a chart kind the mapper does not draw,
    /// as opposed to a recognised chart that failed to build
    pub fn is_unrecognised(&self) -> bool {
        matches!(self, ChartError::UnknownKind(_))
    }
}

/// One plotted point of a bar, line or scatter chart
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    /// Text of the X cell, used for category axis labels
    pub label: String,
    /// Position along the X axis
    pub x: f64,
    /// Value from the Y column
    pub y: f64,
}

/// One pie slice
#[derive(Clone, Debug, PartialEq)]
pub struct Slice {
    /// Category name from the X column
    pub label: String,
    /// Sum of the Y values of the category, always positive
    pub value: f64,
}

/// How the points of a cartesian chart are drawn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Series {
    /// Rectangles rising from zero
    Bars,
    /// A connected line in point order
    Line,
    /// Circle markers
    Markers,
}

/// Everything needed to draw a bar, line or scatter chart
#[derive(Clone, Debug, PartialEq)]
pub struct CartesianData {
    /// Points in row order
    pub points: Vec<Point>,
    /// True when X positions are row order rather than X values
    pub categorical: bool,
    /// Bars, line or markers
    pub series: Series,
    /// X axis extent, padded
    pub x_range: Range<f64>,
    /// Y axis extent, padded
    pub y_range: Range<f64>,
}

/// Plottable content of a chart
#[derive(Clone, Debug, PartialEq)]
pub enum ChartData {
    /// X/Y data for bar, line and scatter charts
    Cartesian(CartesianData),

    /// Category totals for a proportion chart
    Proportion {
        /// Slices in first-seen category order
        slices: Vec<Slice>,
    },
}

/// A chart ready to render
#[derive(Clone, Debug, PartialEq)]
pub struct Chart {
    /// Kind named by the spec
    pub kind: ChartKind,
    /// Caption drawn above the plot
    pub title: String,
    /// X column name, used as the X axis description
    pub x_label: String,
    /// Y column name, used as the Y axis description
    pub y_label: String,
    /// What gets drawn
    pub data: ChartData,
}

/// Canvas size for rendered charts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,
}

impl Default for RenderOptions {
    /// 800x500 pixels
    fn default() -> Self {
        Self {
            width: 800,
            height: 500,
        }
    }
}

/// Maps one chart spec onto the dataset
///
/// This is the main entry point for chart construction. It checks the spec's
/// fields in order (`chart_type`, `x`, `y`), resolves the chart kind, looks up
/// the referenced columns and extracts the plottable data. A spec that cannot
/// be drawn yields an error; callers skip that chart and carry on.
///
/// # Arguments
/// * `dataset` - The loaded upload
/// * `spec` - One recommendation from the model
///
/// # Returns
/// * `Result<Chart, ChartError>` - The chart, or why it cannot be drawn
///
/// # Examples
/// ```
/// use analyst::dataset::{Dataset, Value};
/// use analyst::graph::{build_chart, ChartKind};
/// use analyst::normalize::ChartSpec;
///
/// let dataset = Dataset::from_records(
///     vec!["Region".into(), "Sales".into()],
///     vec![vec![Value::infer("North"), Value::infer("10")]],
/// );
/// let spec = ChartSpec {
///     chart_type: Some("pie".into()),
///     x: Some("Region".into()),
///     y: Some("Sales".into()),
///     ..ChartSpec::default()
/// };
///
/// let chart = build_chart(&dataset, &spec).unwrap();
/// assert_eq!(chart.kind, ChartKind::Pie);
/// assert_eq!(chart.title, "Chart");
/// ```
pub fn build_chart(dataset: &Dataset, spec: &ChartSpec) -> Result<Chart, ChartError> {
    let chart_type = spec
        .chart_type
        .as_deref()
        .ok_or(ChartError::MissingField("chart_type"))?;
    let x_name = spec.x.as_deref().ok_or(ChartError::MissingField("x"))?;
    let y_name = spec.y.as_deref().ok_or(ChartError::MissingField("y"))?;
    let kind: ChartKind = chart_type.parse()?;

    let x = find_column(dataset, x_name)?;
    let y = find_column(dataset, y_name)?;

    let data = match kind {
        ChartKind::Pie => proportion_data(x, y)?,
        ChartKind::Bar => cartesian_data(x, y, Series::Bars, true)?,
        ChartKind::Line => cartesian_data(x, y, Series::Line, !is_numeric_column(x))?,
        ChartKind::Scatter => cartesian_data(x, y, Series::Markers, !is_numeric_column(x))?,
    };

    Ok(Chart {
        kind,
        title: spec
            .title
            .clone()
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        x_label: x_name.to_string(),
        y_label: y_name.to_string(),
        data,
    })
}

/// Logs a skipped chart, keeping unknown kinds apart from build failures
///
/// # Arguments
/// * `spec` - The recommendation that was skipped
/// * `error` - Why it was skipped
pub fn log_skip(spec: &ChartSpec, error: &ChartError) {
    let title = spec.title.as_deref().unwrap_or(DEFAULT_TITLE);
    if error.is_unrecognised() {
        info!("Skipping chart '{}': {}", title, error);
    } else {
        warn!("Could not build chart '{}': {}", title, error);
    }
}

impl Chart {
    /// Renders the chart as a standalone SVG document
    ///
    /// # Arguments
    /// * `options` - Canvas size
    ///
    /// # Returns
    /// * `Result<String, ChartError>` - SVG markup or a render error
    pub fn to_svg(&self, options: &RenderOptions) -> Result<String, ChartError> {
        let mut svg = String::new();
        {
            let root =
                SVGBackend::with_string(&mut svg, (options.width, options.height)).into_drawing_area();
            root.fill(&WHITE).map_err(render_error)?;

            match &self.data {
                ChartData::Cartesian(data) => self.draw_cartesian(&root, data)?,
                ChartData::Proportion { slices } => self.draw_pie(&root, slices)?,
            }

            root.present().map_err(render_error)?;
        }
        Ok(svg)
    }

    fn draw_cartesian(
        &self,
        root: &DrawingArea<SVGBackend<'_>, Shift>,
        data: &CartesianData,
    ) -> Result<(), ChartError> {
        let points = &data.points;
        let categorical = data.categorical;

        let mut chart = ChartBuilder::on(root)
            .caption(&self.title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(data.x_range.clone(), data.y_range.clone())
            .map_err(render_error)?;

        let x_formatter = |v: &f64| {
            if categorical {
                category_label(points, *v)
            } else {
                number_label(*v)
            }
        };
        let y_formatter = |v: &f64| number_label(*v);
        let x_label_count = if categorical {
            points.len().clamp(1, 30)
        } else {
            10
        };

        chart
            .configure_mesh()
            .x_desc(self.x_label.as_str())
            .y_desc(self.y_label.as_str())
            .x_labels(x_label_count)
            .x_label_formatter(&x_formatter)
            .y_label_formatter(&y_formatter)
            .draw()
            .map_err(render_error)?;

        match data.series {
            Series::Bars => {
                chart
                    .draw_series(points.iter().map(|p| {
                        Rectangle::new([(p.x - 0.4, 0.0), (p.x + 0.4, p.y)], BLUE.filled())
                    }))
                    .map_err(render_error)?;
            }
            Series::Line => {
                chart
                    .draw_series(LineSeries::new(points.iter().map(|p| (p.x, p.y)), &BLUE))
                    .map_err(render_error)?;
            }
            Series::Markers => {
                chart
                    .draw_series(
                        points
                            .iter()
                            .map(|p| Circle::new((p.x, p.y), 4, GREEN.filled())),
                    )
                    .map_err(render_error)?;
            }
        }

        Ok(())
    }

    fn draw_pie(
        &self,
        root: &DrawingArea<SVGBackend<'_>, Shift>,
        slices: &[Slice],
    ) -> Result<(), ChartError> {
        let area = root
            .titled(&self.title, ("sans-serif", 24).into_font())
            .map_err(render_error)?;

        let (width, height) = area.dim_in_pixel();
        let center = ((width / 2) as i32, (height / 2) as i32);
        let radius = f64::from(width.min(height)) * 0.35;

        let sizes: Vec<f64> = slices.iter().map(|s| s.value).collect();
        let labels: Vec<String> = slices.iter().map(|s| s.label.clone()).collect();
        let colors: Vec<RGBColor> = (0..slices.len())
            .map(|i| {
                let (r, g, b) = Palette99::pick(i).rgb();
                RGBColor(r, g, b)
            })
            .collect();

        let pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
        area.draw(&pie).map_err(render_error)?;
        Ok(())
    }
}

fn find_column<'a>(dataset: &'a Dataset, name: &str) -> Result<&'a Column, ChartError> {
    dataset
        .column(name)
        .ok_or_else(|| ChartError::MissingColumn(name.to_string()))
}

/// True when every non-null cell is a number and there is at least one
fn is_numeric_column(column: &Column) -> bool {
    let mut any = false;
    for value in &column.values {
        if value.is_null() {
            continue;
        }
        if value.as_f64().is_none() {
            return false;
        }
        any = true;
    }
    any
}

fn cartesian_data(
    x: &Column,
    y: &Column,
    series: Series,
    categorical: bool,
) -> Result<ChartData, ChartError> {
    let points = cartesian_points(x, y, categorical);
    if points.is_empty() {
        return Err(ChartError::NoNumericValues(y.name.clone()));
    }

    let x_range = if categorical {
        -0.5..points.len() as f64 - 0.5
    } else {
        let (min_x, max_x) = bounds(points.iter().map(|p| p.x));
        axis_range(min_x, max_x, &x.name)?
    };
    let (min_y, max_y) = bounds(points.iter().map(|p| p.y));
    let y_range = match series {
        // bars grow from zero
        Series::Bars => axis_range(min_y.min(0.0), max_y.max(0.0), &y.name)?,
        Series::Line | Series::Markers => axis_range(min_y, max_y, &y.name)?,
    };

    Ok(ChartData::Cartesian(CartesianData {
        points,
        categorical,
        series,
        x_range,
        y_range,
    }))
}

fn cartesian_points(x: &Column, y: &Column, categorical: bool) -> Vec<Point> {
    let mut points = Vec::new();
    for (x_value, y_value) in x.values.iter().zip(&y.values) {
        let Some(y_pos) = y_value.as_f64() else {
            continue;
        };
        let x_pos = if categorical {
            points.len() as f64
        } else {
            match x_value.as_f64() {
                Some(v) => v,
                None => continue,
            }
        };
        points.push(Point {
            label: x_value.to_string(),
            x: x_pos,
            y: y_pos,
        });
    }
    points
}

fn proportion_data(names: &Column, values: &Column) -> Result<ChartData, ChartError> {
    let slices = pie_slices(names, values);
    if slices.is_empty() {
        return Err(ChartError::NoNumericValues(values.name.clone()));
    }
    let total: f64 = slices.iter().map(|s| s.value).sum();
    if !total.is_finite() {
        return Err(ChartError::RangeTooWide(values.name.clone()));
    }
    Ok(ChartData::Proportion { slices })
}

/// Sums values per category in first-seen order, keeping positive totals
fn pie_slices(names: &Column, values: &Column) -> Vec<Slice> {
    let mut slices: Vec<Slice> = Vec::new();
    for (name, value) in names.values.iter().zip(&values.values) {
        let Some(v) = value.as_f64() else {
            continue;
        };
        let label = name.to_string();
        match slices.iter_mut().find(|s| s.label == label) {
            Some(slice) => slice.value += v,
            None => slices.push(Slice { label, value: v }),
        }
    }
    slices.retain(|s| s.value > 0.0);
    slices
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Pads `min..max` by 5% per side, or by 1 when the values are all equal
///
/// Fails when the span exceeds [`MAX_AXIS_SPAN`] or padding leaves the
/// finite range.
fn axis_range(min: f64, max: f64, column: &str) -> Result<Range<f64>, ChartError> {
    let span = max - min;
    if !span.is_finite() || span > MAX_AXIS_SPAN {
        return Err(ChartError::RangeTooWide(column.to_string()));
    }

    let pad = if span.abs() < f64::EPSILON {
        1.0
    } else {
        span * 0.05
    };
    let (start, end) = (min - pad, max + pad);
    if !start.is_finite() || !end.is_finite() {
        return Err(ChartError::RangeTooWide(column.to_string()));
    }
    Ok(start..end)
}

fn category_label(points: &[Point], position: f64) -> String {
    let index = position.round();
    if (position - index).abs() > 1e-6 || index < 0.0 {
        return String::new();
    }
    points
        .get(index as usize)
        .map(|p| p.label.clone())
        .unwrap_or_default()
}

fn number_label(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.0}", v)
    } else {
        let text = format!("{:.2}", v);
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn render_error(e: impl fmt::Display) -> ChartError {
    ChartError::Render(e.to_string())
}
