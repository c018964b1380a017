// Product table storage - loads catalog rows from CSV and writes them back
// with the resolved image column

use crate::models::dataset::{DatasetError, DatasetResult, Record};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const PRODUCT_ID_COLUMN: &str = "product_id";
pub const MODEL_IMAGE_COLUMN: &str = "model_image_url";
pub const ADDITIONAL_IMAGES_COLUMN: &str = "additional_images";

/// In-memory product table. Original cells are kept verbatim so the output
/// has the input's schema plus the resolved image column.
#[derive(Debug, Clone)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    records: Vec<Record>,
    output_column: String,
}

impl Dataset {
    /// Load a CSV file with a header row
    pub fn load(path: &Path, output_column: &str) -> DatasetResult<Self> {
        if !path.is_file() {
            return Err(DatasetError::InputNotFound(path.to_path_buf()));
        }

        let file = std::fs::File::open(path).map_err(|e| read_error(path, csv::Error::from(e)))?;
        Self::from_reader(file, path, output_column)
    }

    /// Parse CSV from any reader; `source` only labels errors
    pub fn from_reader<R: Read>(reader: R, source: &Path, output_column: &str) -> DatasetResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()
            .map_err(|e| read_error(source, e))?
            .iter()
            .map(str::to_string)
            .collect();

        let id_col = column(&headers, PRODUCT_ID_COLUMN)?;
        let primary_col = column(&headers, MODEL_IMAGE_COLUMN)?;
        let additional_col = column(&headers, ADDITIONAL_IMAGES_COLUMN)?;

        let mut rows = Vec::new();
        let mut records = Vec::new();
        for (line, result) in csv_reader.records().enumerate() {
            let row = result.map_err(|e| read_error(source, e))?;
            let mut cells: Vec<String> = row.iter().map(str::to_string).collect();
            if cells.len() > headers.len() {
                tracing::warn!(
                    "Row {} has {} cells for {} columns; extra cells dropped",
                    line + 1,
                    cells.len(),
                    headers.len()
                );
            }
            cells.resize(headers.len(), String::new());

            let product_id = present(&cells[id_col]).unwrap_or_else(|| "N/A".to_string());
            records.push(Record::new(
                product_id,
                present(&cells[primary_col]),
                present(&cells[additional_col]),
            ));
            rows.push(cells);
        }

        Ok(Self {
            headers,
            rows,
            records,
            output_column: output_column.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn output_column(&self) -> &str {
        &self.output_column
    }

    /// Record a full-body winner for one row. Out-of-range indices are ignored.
    pub fn set_resolved(&mut self, index: usize, url: String) {
        if let Some(record) = self.records.get_mut(index) {
            record.resolved_image_url = Some(url);
        }
    }

    /// Header row of the output: input columns plus the resolved column,
    /// which replaces an existing column of the same name in place
    pub fn output_headers(&self) -> Vec<String> {
        let mut headers = self.headers.clone();
        if self.existing_output_index().is_none() {
            headers.push(self.output_column.clone());
        }
        headers
    }

    fn existing_output_index(&self) -> Option<usize> {
        self.headers.iter().position(|h| h == &self.output_column)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.output_headers())?;

        let replace_at = self.existing_output_index();
        for (cells, record) in self.rows.iter().zip(&self.records) {
            let resolved = record.resolved_image_url.clone().unwrap_or_default();
            let mut out = cells.clone();
            match replace_at {
                Some(index) => out[index] = resolved,
                None => out.push(resolved),
            }
            csv_writer.write_record(&out)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Write the table; the in-memory data is untouched on failure, so a
    /// caller can retry with another path
    pub fn save(&self, path: &Path) -> DatasetResult<()> {
        let persist_err = |reason: String| DatasetError::Persist {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| persist_err(e.to_string()))?;
        }

        let file = std::fs::File::create(path).map_err(|e| persist_err(e.to_string()))?;
        self.write_to(std::io::BufWriter::new(file))
            .map_err(|e| persist_err(e.to_string()))?;

        Ok(())
    }
}

fn column(headers: &[String], name: &'static str) -> DatasetResult<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or(DatasetError::MissingColumn(name))
}

/// Blank cells are missing values; surrounding whitespace is not part of a value
fn present(cell: &str) -> Option<String> {
    let value = cell.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn read_error(path: &Path, source: csv::Error) -> DatasetError {
    DatasetError::Read {
        path: PathBuf::from(path),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SAMPLE: &str = "\
product_id,product_name,model_image_url,additional_images
p1,Tee,https://img.test/p1-model.jpg,https://img.test/p1-a.jpg;https://img.test/p1-b.jpg
p2,\"Shirt, oversized\",,https://img.test/p2-a.jpg
p3,Cap,https://img.test/p3.jpg
";

    fn sample() -> Dataset {
        Dataset::from_reader(SAMPLE.as_bytes(), Path::new("sample.csv"), "new_model_image_url").unwrap()
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join("lookbook_test_dataset").join(name)
    }

    #[test]
    fn test_parse_records() {
        let dataset = sample();
        assert_eq!(dataset.len(), 3);

        let p1 = &dataset.records()[0];
        assert_eq!(p1.product_id, "p1");
        assert_eq!(p1.resolved_image_url.as_deref(), Some("https://img.test/p1-model.jpg"));
        assert_eq!(p1.candidates().len(), 3);

        let p2 = &dataset.records()[1];
        assert_eq!(p2.model_image_url, None);
        assert_eq!(p2.resolved_image_url, None);
        assert_eq!(p2.candidates().urls(), ["https://img.test/p2-a.jpg"]);

        // Short row padded; missing additional images are not an error
        let p3 = &dataset.records()[2];
        assert_eq!(p3.additional_images, None);
        assert_eq!(p3.candidates().len(), 1);
    }

    #[test]
    fn test_padded_cells_trimmed() {
        let csv = "product_id,model_image_url,additional_images\n p1 ,  https://img.test/p1.jpg  ,\" https://img.test/p1.jpg ; https://img.test/p1-b.jpg\"\n";
        let dataset = Dataset::from_reader(csv.as_bytes(), Path::new("x.csv"), "out").unwrap();

        let record = &dataset.records()[0];
        assert_eq!(record.product_id, "p1");
        assert_eq!(record.model_image_url.as_deref(), Some("https://img.test/p1.jpg"));
        assert_eq!(record.resolved_image_url, record.model_image_url);
        assert_eq!(
            record.candidates().urls(),
            ["https://img.test/p1.jpg", "https://img.test/p1-b.jpg"]
        );
    }

    #[test]
    fn test_missing_column() {
        let csv = "product_id,model_image_url\np1,u\n";
        let result = Dataset::from_reader(csv.as_bytes(), Path::new("x.csv"), "out");
        assert!(matches!(result, Err(DatasetError::MissingColumn("additional_images"))));
    }

    #[test]
    fn test_write_appends_resolved_column() {
        let mut dataset = sample();
        dataset.set_resolved(1, "https://img.test/p2-a.jpg".to_string());
        dataset.set_resolved(99, "ignored".to_string());

        let mut out = Vec::new();
        dataset.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "product_id,product_name,model_image_url,additional_images,new_model_image_url"
        );
        assert!(lines[1].ends_with(",https://img.test/p1-model.jpg"));
        assert_eq!(
            lines[2],
            "p2,\"Shirt, oversized\",,https://img.test/p2-a.jpg,https://img.test/p2-a.jpg"
        );
        assert_eq!(lines[3], "p3,Cap,https://img.test/p3.jpg,,https://img.test/p3.jpg");
    }

    #[test]
    fn test_existing_output_column_replaced() {
        let csv = "product_id,model_image_url,additional_images,new_model_image_url\np1,u0,u1,stale\n";
        let dataset = Dataset::from_reader(csv.as_bytes(), Path::new("x.csv"), "new_model_image_url").unwrap();

        let mut out = Vec::new();
        dataset.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec!["product_id,model_image_url,additional_images,new_model_image_url", "p1,u0,u1,u0"]
        );
    }

    #[test]
    fn test_load_missing_file() {
        let path = temp_path("does_not_exist.csv");
        let _ = fs::remove_file(&path);
        assert!(matches!(
            Dataset::load(&path, "out"),
            Err(DatasetError::InputNotFound(_))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = temp_path("save_reload");
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("nested").join("out.csv");

        let mut dataset = sample();
        dataset.set_resolved(0, "https://img.test/p1-b.jpg".to_string());
        dataset.save(&path).unwrap();

        let reloaded = Dataset::load(&path, "new_model_image_url").unwrap();
        assert_eq!(reloaded.len(), 3);
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.lines().nth(1).unwrap().ends_with(",https://img.test/p1-b.jpg"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_save_failure_keeps_data() {
        let dir = temp_path("save_failure");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        // A regular file where a directory is expected
        let blocker = dir.join("blocker");
        fs::write(&blocker, "x").unwrap();

        let mut dataset = sample();
        dataset.set_resolved(2, "https://img.test/other.jpg".to_string());

        let result = dataset.save(&blocker.join("out.csv"));
        assert!(matches!(result, Err(DatasetError::Persist { .. })));
        assert_eq!(
            dataset.records()[2].resolved_image_url.as_deref(),
            Some("https://img.test/other.jpg")
        );

        dataset.save(&dir.join("out.csv")).unwrap();
        let _ = fs::remove_dir_all(&dir);
    }
}
