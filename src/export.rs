//! CSV export of the final dataset.

use crate::dataset::Dataset;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Output dialect.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub delimiter: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// Columns to write: the explicit list verbatim, or every field name seen
/// in the dataset, in first-seen order.
pub fn columns_for(dataset: &Dataset, explicit: Option<&[String]>) -> Vec<String> {
    if let Some(columns) = explicit {
        return columns.to_vec();
    }

    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for record in dataset.records() {
        for name in record.names() {
            if seen.insert(name) {
                columns.push(name.to_string());
            }
        }
    }
    columns
}

/// Write the header and one row per record. Missing fields are empty cells,
/// fields outside `columns` are not written. A list that was never reduced
/// is written as `['a', 'b']`. Rows end in `\r\n` and cells
/// are quoted only when they contain the delimiter, a quote or a line break.
pub fn write_csv<W: Write>(
    writer: W,
    dataset: &Dataset,
    columns: &[String],
    options: &ExportOptions,
) -> Result<(), csv::Error> {
    let mut out = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .terminator(csv::Terminator::CRLF)
        .from_writer(writer);

    out.write_record(columns)?;
    for record in dataset.records() {
        let row = columns.iter().map(|column| {
            record
                .get(column)
                .map(|value| value.to_string())
                .unwrap_or_default()
        });
        out.write_record(row)?;
    }
    out.flush()?;
    Ok(())
}

/// Write the CSV to `path`, replacing any existing file.
pub fn write_csv_file(
    path: &Path,
    dataset: &Dataset,
    columns: &[String],
    options: &ExportOptions,
) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|e| ExportError::Create {
        path: path.to_path_buf(),
        source: e,
    })?;
    write_csv(file, dataset, columns, options).map_err(|e| ExportError::Write {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(
        file = %path.display(),
        rows = dataset.len(),
        columns = columns.len(),
        "wrote CSV"
    );
    Ok(())
}

/// Errors from writing the output table.
#[derive(Debug)]
pub enum ExportError {
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    Write {
        path: PathBuf,
        source: csv::Error,
    },
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Create { path, source } => {
                write!(f, "failed to create {}: {source}", path.display())
            }
            ExportError::Write { path, source } => {
                write!(f, "failed to write {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Create { source, .. } => Some(source),
            ExportError::Write { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Aggregator;
    use crate::parser::parse_line;
    use crate::reduce::{reduce, AggregateOp};
    use tempfile::tempdir;

    fn dataset(lines: &[&str], key: Option<&str>) -> Dataset {
        let mut agg = Aggregator::new(key.map(str::to_string));
        for line in lines {
            agg.add(parse_line(line, None)).unwrap();
        }
        agg.finish()
    }

    fn render(data: &Dataset, columns: &[String], options: &ExportOptions) -> String {
        let mut buf = Vec::new();
        write_csv(&mut buf, data, columns, options).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn derived_columns_are_union_in_first_seen_order() {
        let data = dataset(&["b=1 a=2", "c=3 a=4", "d=5"], None);
        assert_eq!(columns_for(&data, None), strings(&["b", "a", "c", "d"]));
    }

    #[test]
    fn explicit_columns_are_used_verbatim() {
        let data = dataset(&["b=1 a=2"], None);
        let explicit = strings(&["z", "a"]);
        assert_eq!(columns_for(&data, Some(&explicit)), explicit);
    }

    #[test]
    fn missing_fields_become_empty_cells() {
        let data = dataset(&["a=1 b=2", "b=3"], None);
        let columns = strings(&["a", "b", "c"]);
        let csv = render(&data, &columns, &ExportOptions::default());
        assert_eq!(csv, "a,b,c\r\n1,2,\r\n,3,\r\n");
    }

    #[test]
    fn fields_outside_columns_are_skipped() {
        let data = dataset(&["a=1 b=2 c=3"], None);
        let columns = strings(&["c", "a"]);
        let csv = render(&data, &columns, &ExportOptions::default());
        assert_eq!(csv, "c,a\r\n3,1\r\n");
    }

    #[test]
    fn values_needing_quotes_are_quoted() {
        let data = dataset(&["name=a,b q=say\"hi\""], None);
        let columns = strings(&["name", "q"]);
        let csv = render(&data, &columns, &ExportOptions::default());
        assert_eq!(csv, "name,q\r\n\"a,b\",\"say\"\"hi\"\"\"\r\n");
    }

    #[test]
    fn unreduced_lists_are_written_as_quoted_item_lists() {
        let data = dataset(&["k=x v=10", "k=x v=20"], Some("k"));
        let columns = columns_for(&data, None);
        let csv = render(&data, &columns, &ExportOptions::default());
        assert_eq!(csv, "k,v\r\n\"['x', 'x']\",\"['10', '20']\"\r\n");
    }

    #[test]
    fn field_seen_once_stays_plain_beside_list_cells() {
        let data = dataset(&["k=x v=10", "k=x"], Some("k"));
        let csv = render(&data, &strings(&["k", "v"]), &ExportOptions::default());
        assert_eq!(csv, "k,v\r\n\"['x', 'x']\",10\r\n");
    }

    #[test]
    fn reduced_values_render_as_numbers() {
        let mut data = dataset(&["k=x v=10", "k=x v=20", "k=y v=7"], Some("k"));
        reduce(&mut data, Some(AggregateOp::Average));
        let columns = strings(&["k", "v"]);
        let csv = render(&data, &columns, &ExportOptions::default());
        assert_eq!(csv, "k,v\r\nx,15.0\r\ny,7\r\n");
    }

    #[test]
    fn custom_delimiter() {
        let data = dataset(&["a=1 b=2"], None);
        let options = ExportOptions { delimiter: b'\t' };
        let csv = render(&data, &strings(&["a", "b"]), &options);
        assert_eq!(csv, "a\tb\r\n1\t2\r\n");
    }

    #[test]
    fn write_csv_file_overwrites_existing_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "stale content that is longer than the new table\n").unwrap();

        let data = dataset(&["a=1"], None);
        write_csv_file(&path, &data, &strings(&["a"]), &ExportOptions::default()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\r\n1\r\n");
    }

    #[test]
    fn unwritable_output_reports_path() {
        let data = dataset(&["a=1"], None);
        let err = write_csv_file(
            Path::new("/nonexistent/dir/out.csv"),
            &data,
            &strings(&["a"]),
            &ExportOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::Create { .. }));
        assert!(err.to_string().contains("/nonexistent/dir/out.csv"));
    }
}
