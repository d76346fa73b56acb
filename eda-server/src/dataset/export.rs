//! Serialize the current table for download

use polars::prelude::*;

use super::Dataset;
use crate::error::ApiResult;

/// Current table as CSV bytes with a header row
pub fn to_csv_bytes(dataset: &Dataset) -> ApiResult<Vec<u8>> {
    let mut frame = dataset.frame().clone();
    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(&mut frame)?;
    Ok(buffer)
}

/// Download name for a cleaned copy of `filename`
pub fn cleaned_filename(filename: &str) -> String {
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(filename);
    format!("cleaned_{}.csv", stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::fixtures::with_gaps;

    #[test]
    fn test_csv_has_header_and_empty_missing_cells() {
        let bytes = to_csv_bytes(&with_gaps()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("score,city"));
        assert_eq!(lines.next(), Some("1.0,Oslo"));
        assert_eq!(lines.next(), Some(",Lima"));
    }

    #[test]
    fn test_cleaned_filename() {
        assert_eq!(cleaned_filename("sales.csv"), "cleaned_sales.csv");
        assert_eq!(cleaned_filename("archive.2024.txt"), "cleaned_archive.2024.csv");
        assert_eq!(cleaned_filename("noext"), "cleaned_noext.csv");
    }
}
