//! One run of the tool: read every input, parse marker lines, aggregate,
//! reduce and export.

use crate::dataset::{prepare_columns, AggregateError, Aggregator, Dataset};
use crate::export::{columns_for, write_csv_file, ExportError, ExportOptions};
use crate::input::{open_input, InputError, Location};
use crate::parser::{parse_line, strip_marker, DEFAULT_MARKER};
use crate::reduce::{reduce, AggregateOp};
use std::io::BufRead;
use std::path::PathBuf;
use tracing::{debug, info};

/// Fully resolved settings for a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub columns: Option<Vec<String>>,
    pub key: Option<String>,
    pub op: Option<AggregateOp>,
    pub marker: String,
    pub export: ExportOptions,
}

impl RunOptions {
    pub fn new(inputs: Vec<PathBuf>, output: PathBuf) -> Self {
        Self {
            inputs,
            output,
            columns: None,
            key: None,
            op: None,
            marker: DEFAULT_MARKER.to_string(),
            export: ExportOptions::default(),
        }
    }
}

/// Parse and aggregate every marker line of every input, in order.
///
/// `columns` is the allow-list applied while parsing; it must already carry
/// the grouping key (see [`prepare_columns`]).
pub fn collect(
    inputs: &[PathBuf],
    marker: &str,
    columns: Option<&[String]>,
    key: Option<&str>,
) -> Result<Dataset, RunError> {
    let mut aggregator = Aggregator::new(key.map(str::to_string));

    for path in inputs {
        let reader = open_input(path)?;
        let mut marked = 0usize;

        for (idx, line) in reader.lines().enumerate() {
            let location = || Location {
                path: path.clone(),
                line: idx + 1,
            };
            let line = line.map_err(|e| InputError::Read {
                location: location(),
                source: e,
            })?;

            let Some(payload) = strip_marker(&line, marker) else {
                continue;
            };
            marked += 1;

            let record = parse_line(payload, columns);
            if record.is_empty() {
                debug!(location = %location(), "marker line without key=value pairs");
            }
            aggregator
                .add(record)
                .map_err(|source| RunError::Aggregate {
                    location: location(),
                    source,
                })?;
        }

        debug!(
            file = %path.display(),
            records = marked,
            entries = aggregator.len(),
            "read input"
        );
    }

    Ok(aggregator.finish())
}

/// Run the whole transformation and write the CSV.
///
/// Nothing is written unless every input was read successfully. Returns the
/// final dataset so the caller can echo it.
pub fn run(options: &RunOptions) -> Result<Dataset, RunError> {
    let columns = prepare_columns(options.columns.clone(), options.key.as_deref());

    let mut dataset = collect(
        &options.inputs,
        &options.marker,
        columns.as_deref(),
        options.key.as_deref(),
    )?;
    reduce(&mut dataset, options.op);

    let columns = columns_for(&dataset, columns.as_deref());
    write_csv_file(&options.output, &dataset, &columns, &options.export)?;

    info!(
        inputs = options.inputs.len(),
        rows = dataset.len(),
        output = %options.output.display(),
        "export complete"
    );
    Ok(dataset)
}

/// Fatal errors that abort a run.
#[derive(Debug)]
pub enum RunError {
    Input(InputError),
    Aggregate {
        location: Location,
        source: AggregateError,
    },
    Export(ExportError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Input(e) => write!(f, "{e}"),
            RunError::Aggregate { location, source } => write!(f, "{location}: {source}"),
            RunError::Export(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Input(e) => e.source(),
            RunError::Aggregate { source, .. } => Some(source),
            RunError::Export(e) => e.source(),
        }
    }
}

impl From<InputError> for RunError {
    fn from(e: InputError) -> Self {
        RunError::Input(e)
    }
}

impl From<ExportError> for RunError {
    fn from(e: ExportError) -> Self {
        RunError::Export(e)
    }
}
