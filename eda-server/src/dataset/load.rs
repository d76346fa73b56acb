//! Upload decoding: bytes + filename → [`Dataset`]
//!
//! CSV text is decoded as UTF-8 when valid, otherwise as Windows-1252
//! (which also covers latin-1 and ISO-8859-1 uploads). The separator is
//! sniffed from the header line. Workbooks (`.xlsx`, `.xls`) are read from
//! their first sheet, with the first row as header.
//!
//! Both paths share one notion of "missing": empty cells, the usual null
//! tokens (`NA`, `N/A`, `null`, `NaN`, ...) and non-finite floats all load
//! as nulls, so null counts, imputation and quantiles agree.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use eda_common::sanitize::finite;
use encoding_rs::{UTF_8, WINDOWS_1252};
use polars::prelude::*;
use tracing::debug;

use super::Dataset;
use crate::error::{ApiError, ApiResult};

/// Rows scanned when inferring column dtypes
const INFER_SCHEMA_ROWS: usize = 1000;

/// Candidate separators, in tie-break order
const SEPARATORS: [u8; 3] = [b',', b';', b'\t'];

/// Cell texts read as missing values
pub const NULL_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Upload format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Csv,
    Excel,
}

impl UploadFormat {
    pub fn from_filename(filename: &str) -> ApiResult<Self> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" | "txt" => Ok(UploadFormat::Csv),
            "xlsx" | "xls" => Ok(UploadFormat::Excel),
            _ => Err(ApiError::InvalidUpload(
                "Unsupported file type. Supported: CSV, TXT, XLSX, XLS".to_string(),
            )),
        }
    }
}

/// Parse an uploaded file into a dataset
pub fn load_upload(bytes: &[u8], filename: &str) -> ApiResult<Dataset> {
    match UploadFormat::from_filename(filename)? {
        UploadFormat::Csv => read_csv(bytes),
        UploadFormat::Excel => read_excel(bytes),
    }
}

pub fn is_null_token(text: &str) -> bool {
    NULL_TOKENS.contains(&text)
}

/// Decode upload bytes to text, returning the encoding used
pub fn decode_text(bytes: &[u8]) -> (Cow<'_, str>, &'static str) {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return (text, UTF_8.name());
    }

    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    (text, WINDOWS_1252.name())
}

/// Most frequent candidate separator on the header line, `,` on ties
pub fn sniff_separator(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();

    let mut best = SEPARATORS[0];
    let mut best_count = 0;
    for sep in SEPARATORS {
        let count = header.bytes().filter(|b| *b == sep).count();
        if count > best_count {
            best = sep;
            best_count = count;
        }
    }
    best
}

/// Parse CSV bytes with encoding fallback and separator sniffing
pub fn read_csv(bytes: &[u8]) -> ApiResult<Dataset> {
    let (text, encoding) = decode_text(bytes);
    if text.trim().is_empty() {
        return Err(empty_upload());
    }

    let separator = sniff_separator(&text);
    debug!(
        encoding,
        separator = %char::from(separator),
        bytes = bytes.len(),
        "Parsing CSV upload"
    );

    let null_values = NullValues::AllColumns(
        NULL_TOKENS
            .iter()
            .map(|token| PlSmallStr::from_static(*token))
            .collect(),
    );
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(separator)
                .with_null_values(Some(null_values)),
        )
        .into_reader_with_file_handle(Cursor::new(text.into_owned().into_bytes()))
        .finish()
        .map_err(|e| ApiError::InvalidUpload(format!("Could not parse CSV: {}", e)))?;

    finish_frame(frame)
}

/// Parse the first sheet of a workbook
pub fn read_excel(bytes: &[u8]) -> ApiResult<Dataset> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ApiError::InvalidUpload(format!("Could not open workbook: {}", e)))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(empty_upload)?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| ApiError::InvalidUpload(format!("Could not read sheet '{}': {}", sheet, e)))?;

    let (height, width) = range.get_size();
    debug!(sheet = %sheet, height, width, bytes = bytes.len(), "Parsing workbook upload");

    finish_frame(sheet_frame(range.rows())?)
}

/// Build a frame from sheet rows, the first row naming the columns
pub fn sheet_frame<'a, I>(rows: I) -> ApiResult<DataFrame>
where
    I: IntoIterator<Item = &'a [Data]>,
{
    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Err(empty_upload());
    };
    let body: Vec<&[Data]> = rows.collect();
    let names = header_names(header);
    if names.is_empty() || body.is_empty() {
        return Err(empty_upload());
    }

    let columns = names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let cells: Vec<SheetCell> = body
                .iter()
                .map(|row| SheetCell::from_data(row.get(idx)))
                .collect();
            sheet_column(name, cells)
        })
        .collect();

    Ok(DataFrame::new(columns)?)
}

/// Header texts; blanks become `Unnamed: i`, repeats get `.1`, `.2`, ...
fn header_names(header: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    header
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let base = match cell {
                Data::Empty => format!("Unnamed: {}", idx),
                other => other.to_string(),
            };
            let repeats = seen.entry(base.clone()).or_insert(0);
            let name = if *repeats == 0 {
                base
            } else {
                format!("{}.{}", base, repeats)
            };
            *repeats += 1;
            name
        })
        .collect()
}

/// One sheet cell after null handling
#[derive(Debug, Clone, PartialEq)]
enum SheetCell {
    Missing,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl SheetCell {
    fn from_data(cell: Option<&Data>) -> Self {
        match cell {
            None | Some(Data::Empty) | Some(Data::Error(_)) => SheetCell::Missing,
            Some(Data::Int(v)) => SheetCell::Int(*v),
            Some(Data::Float(v)) => finite(*v).map_or(SheetCell::Missing, SheetCell::Float),
            Some(Data::Bool(v)) => SheetCell::Bool(*v),
            Some(Data::String(s)) if is_null_token(s.trim()) => SheetCell::Missing,
            Some(Data::String(s)) => SheetCell::Text(s.clone()),
            Some(other) => SheetCell::Text(other.to_string()),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            SheetCell::Int(v) => Some(*v as f64),
            SheetCell::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integral numbers within the exactly representable range
    fn as_i64(&self) -> Option<i64> {
        const EXACT: f64 = 9_007_199_254_740_992.0;
        match self {
            SheetCell::Int(v) => Some(*v),
            SheetCell::Float(v) if v.fract() == 0.0 && v.abs() <= EXACT => Some(*v as i64),
            _ => None,
        }
    }

    fn text(&self) -> Option<String> {
        match self {
            SheetCell::Missing => None,
            SheetCell::Int(v) => Some(v.to_string()),
            SheetCell::Float(v) => Some(v.to_string()),
            SheetCell::Bool(v) => Some(v.to_string()),
            SheetCell::Text(s) => Some(s.clone()),
        }
    }
}

/// Narrowest column type holding every present cell
///
/// Whole numbers load as integers (spreadsheets store every number as a
/// float), mixed content falls back to text, and an all-missing column is
/// a float column of nulls.
fn sheet_column(name: String, cells: Vec<SheetCell>) -> Column {
    let present: Vec<&SheetCell> = cells.iter().filter(|c| **c != SheetCell::Missing).collect();
    let name = PlSmallStr::from_string(name);

    let series = if present.is_empty() {
        Series::new(name, vec![None::<f64>; cells.len()])
    } else if present.iter().all(|c| matches!(c, SheetCell::Bool(_))) {
        let values: Vec<Option<bool>> = cells
            .iter()
            .map(|c| match c {
                SheetCell::Bool(v) => Some(*v),
                _ => None,
            })
            .collect();
        Series::new(name, values)
    } else if present.iter().all(|c| c.as_i64().is_some()) {
        let values: Vec<Option<i64>> = cells.iter().map(SheetCell::as_i64).collect();
        Series::new(name, values)
    } else if present.iter().all(|c| c.as_f64().is_some()) {
        let values: Vec<Option<f64>> = cells.iter().map(SheetCell::as_f64).collect();
        Series::new(name, values)
    } else {
        let values: Vec<Option<String>> = cells.iter().map(SheetCell::text).collect();
        Series::new(name, values)
    };
    series.into_column()
}

/// Shared tail of both loaders: null out non-finite floats, reject empties
fn finish_frame(frame: DataFrame) -> ApiResult<Dataset> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(empty_upload());
    }
    Ok(Dataset::new(null_non_finite(frame)?))
}

/// NaN and ±Infinity cells count as missing from load onwards
fn null_non_finite(frame: DataFrame) -> ApiResult<DataFrame> {
    if !frame.get_columns().iter().any(|c| c.dtype().is_float()) {
        return Ok(frame);
    }

    let columns = frame
        .get_columns()
        .iter()
        .map(|column| {
            if !column.dtype().is_float() {
                return Ok(column.clone());
            }
            let series = column.as_materialized_series().cast(&DataType::Float64)?;
            let values = Float64Chunked::from_iter_options(
                column.name().clone(),
                series.f64()?.into_iter().map(|v| v.and_then(finite)),
            );
            Ok(values.into_series().into_column())
        })
        .collect::<ApiResult<Vec<Column>>>()?;

    Ok(DataFrame::new(columns)?)
}

fn empty_upload() -> ApiError {
    ApiError::InvalidUpload("The uploaded file is empty".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnKind;
    use crate::pipeline::{detect_outliers, fill_missing, FillMethod, Mutation, OutlierMethod};

    fn s(text: &str) -> Data {
        Data::String(text.to_string())
    }

    #[test]
    fn test_format_by_extension() {
        assert_eq!(UploadFormat::from_filename("a.CSV").unwrap(), UploadFormat::Csv);
        assert_eq!(UploadFormat::from_filename("a.txt").unwrap(), UploadFormat::Csv);
        assert_eq!(UploadFormat::from_filename("a.xlsx").unwrap(), UploadFormat::Excel);
        assert_eq!(UploadFormat::from_filename("a.XLS").unwrap(), UploadFormat::Excel);
        assert!(UploadFormat::from_filename("a.json").is_err());
        assert!(UploadFormat::from_filename("noext").is_err());
    }

    #[test]
    fn test_separator_sniffing() {
        assert_eq!(sniff_separator("a,b,c\n1,2,3"), b',');
        assert_eq!(sniff_separator("a;b;c\n1;2;3"), b';');
        assert_eq!(sniff_separator("a\tb\n1\t2"), b'\t');
        assert_eq!(sniff_separator("single\n1"), b',');
    }

    #[test]
    fn test_latin1_fallback() {
        // "café" in latin-1 is not valid UTF-8
        let bytes = b"name,price\ncaf\xe9,3\n";
        let (text, encoding) = decode_text(bytes);
        assert_eq!(encoding, "windows-1252");
        assert!(text.contains("café"));

        let dataset = read_csv(bytes).unwrap();
        assert_eq!(dataset.text_values("name").unwrap(), vec![Some("café".to_string())]);
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let dataset = read_csv("\u{feff}id,value\n1,2\n".as_bytes()).unwrap();
        assert_eq!(dataset.column_names(), vec!["id", "value"]);
    }

    #[test]
    fn test_semicolon_csv_with_missing_values() {
        let dataset = read_csv(b"id;score;city\n1;1.5;Oslo\n2;;\n3;2.5;Lima\n").unwrap();
        assert_eq!(dataset.shape(), [3, 3]);
        assert_eq!(dataset.kind_of("id"), Some(ColumnKind::Integer));
        assert_eq!(dataset.kind_of("score"), Some(ColumnKind::Float));
        assert_eq!(dataset.kind_of("city"), Some(ColumnKind::Text));
        assert_eq!(dataset.null_count("score").unwrap(), 1);
        assert_eq!(dataset.null_count("city").unwrap(), 1);
    }

    #[test]
    fn test_null_tokens_keep_numeric_kind() {
        let dataset = read_csv(b"v,city\n1,Oslo\nNA,N/A\n3,null\n").unwrap();
        assert_eq!(dataset.kind_of("v"), Some(ColumnKind::Integer));
        assert_eq!(dataset.null_count("v").unwrap(), 1);
        assert_eq!(dataset.null_count("city").unwrap(), 2);

        let filled = match fill_missing(&dataset, "v", FillMethod::Mean, None).unwrap() {
            Mutation::Applied { dataset, .. } => dataset,
            other => panic!("expected applied, got {other:?}"),
        };
        assert_eq!(
            filled.float_values("v").unwrap(),
            vec![Some(1.0), Some(2.0), Some(3.0)]
        );
    }

    #[test]
    fn test_nan_and_infinity_load_as_missing() {
        let dataset = read_csv(b"v\n1.0\nNaN\n3.0\ninf\n-inf\n").unwrap();
        assert_eq!(dataset.kind_of("v"), Some(ColumnKind::Float));
        assert_eq!(dataset.null_count("v").unwrap(), 3);
        assert_eq!(
            dataset.float_values("v").unwrap(),
            vec![Some(1.0), None, Some(3.0), None, None]
        );
    }

    #[test]
    fn test_nan_cells_do_not_widen_iqr_bounds() {
        let dataset = read_csv(b"v\n10\n12\n11\nNaN\n9\n1000\n").unwrap();
        let report = detect_outliers(&dataset, "v", OutlierMethod::Iqr).unwrap();
        assert_eq!(report.outlier_indices, vec![5]);
        assert_eq!(report.lower_bound, Some(7.0));
        assert_eq!(report.upper_bound, Some(15.0));
    }

    #[test]
    fn test_empty_upload_rejected() {
        assert!(matches!(read_csv(b"  \n"), Err(ApiError::InvalidUpload(_))));
        assert!(matches!(read_csv(b"id,value\n"), Err(ApiError::InvalidUpload(_))));
    }

    #[test]
    fn test_sheet_rows_typed_per_column() {
        let rows = vec![
            vec![s("id"), s("score"), s("flag"), s("city"), s("when")],
            vec![
                Data::Float(1.0),
                Data::Float(1.5),
                Data::Bool(true),
                s("Oslo"),
                s("2024-01-02"),
            ],
            vec![Data::Float(2.0), s("NA"), Data::Bool(false), Data::Empty, s("n/a")],
            vec![Data::Int(3), Data::Float(2.5), Data::Empty, s("Lima"), Data::Empty],
        ];
        let frame = sheet_frame(rows.iter().map(Vec::as_slice)).unwrap();
        let dataset = Dataset::new(frame);

        assert_eq!(dataset.shape(), [3, 5]);
        assert_eq!(dataset.kind_of("id"), Some(ColumnKind::Integer));
        assert_eq!(dataset.kind_of("score"), Some(ColumnKind::Float));
        assert_eq!(dataset.kind_of("flag"), Some(ColumnKind::Boolean));
        assert_eq!(dataset.kind_of("city"), Some(ColumnKind::Text));
        assert_eq!(dataset.null_count("score").unwrap(), 1);
        assert_eq!(dataset.null_count("flag").unwrap(), 1);
        assert_eq!(dataset.null_count("when").unwrap(), 2);
    }

    #[test]
    fn test_sheet_header_blanks_and_repeats() {
        let rows = vec![
            vec![s("a"), Data::Empty, s("a")],
            vec![Data::Float(1.0), Data::Float(2.0), Data::Float(3.0)],
        ];
        let frame = sheet_frame(rows.iter().map(Vec::as_slice)).unwrap();
        assert_eq!(
            Dataset::new(frame).column_names(),
            vec!["a", "Unnamed: 1", "a.1"]
        );
    }

    #[test]
    fn test_sheet_without_data_rows_rejected() {
        let rows = vec![vec![s("a"), s("b")]];
        let err = sheet_frame(rows.iter().map(Vec::as_slice)).unwrap_err();
        assert!(matches!(err, ApiError::InvalidUpload(_)));
    }

    #[test]
    fn test_workbook_upload() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "region").unwrap();
        sheet.write_string(0, 1, "units").unwrap();
        for (row, (region, units)) in [("north", 10.0), ("south", 4.5), ("east", 7.0)]
            .into_iter()
            .enumerate()
        {
            let row = row as u32 + 1;
            sheet.write_string(row, 0, region).unwrap();
            sheet.write_number(row, 1, units).unwrap();
        }
        let bytes = workbook.save_to_buffer().unwrap();

        let dataset = load_upload(&bytes, "sales.xlsx").unwrap();
        assert_eq!(dataset.column_names(), vec!["region", "units"]);
        assert_eq!(dataset.kind_of("units"), Some(ColumnKind::Float));
        assert_eq!(
            dataset.float_values("units").unwrap(),
            vec![Some(10.0), Some(4.5), Some(7.0)]
        );
    }

    #[test]
    fn test_corrupt_workbook_rejected() {
        let err = load_upload(b"PK\x03\x04 not a zip", "book.xlsx").unwrap_err();
        assert!(matches!(err, ApiError::InvalidUpload(_)));
    }
}
