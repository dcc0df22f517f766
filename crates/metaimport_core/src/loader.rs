use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Value;

/// One input row/object: ordered (key, value) pairs as they appeared in the
/// file. CSV rows carry the header's key order, JSON objects their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn from_pairs(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn url(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == "url")
            .map(|(_, value)| value.as_str())
    }

    /// Every field except `url`, in record order.
    pub fn meta_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter(|(key, _)| key != "url")
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
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
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputFormat {
    Csv,
    Json,
}

fn detect_format(path: &Path) -> Result<InputFormat> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => Ok(InputFormat::Csv),
        Some("json") => Ok(InputFormat::Json),
        _ => bail!("input file must be .csv or .json: {}", path.display()),
    }
}

/// Load a Batch from disk. Every failure here is fatal to the run: bad
/// extension, missing file, unreadable file, empty content, unparsable
/// content, and an empty parsed dataset each get their own message.
pub fn load_batch(path: &Path) -> Result<Batch> {
    let format = detect_format(path)?;
    if !path.exists() {
        bail!("input file does not exist: {}", path.display());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("could not read input file: {}", path.display()))?;
    if content.trim().is_empty() {
        bail!("input file is empty: {}", path.display());
    }

    let records = match format {
        InputFormat::Csv => parse_csv(&content)?,
        InputFormat::Json => parse_json(&content)?,
    };
    if records.is_empty() {
        bail!("no records found in input file: {}", path.display());
    }
    Ok(Batch::new(records))
}

fn parse_csv(content: &str) -> Result<Vec<Record>> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = reader
        .headers()
        .context("could not parse input file as CSV")?
        .clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.context("could not parse input file as CSV")?;
        let fields = headers
            .iter()
            .zip(row.iter())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        records.push(Record::from_pairs(fields));
    }
    Ok(records)
}

fn parse_json(content: &str) -> Result<Vec<Record>> {
    let parsed: Value =
        serde_json::from_str(content).context("could not parse input file as JSON")?;
    let Value::Array(items) = parsed else {
        bail!("input JSON must be an array of objects");
    };

    let mut records = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(entries) = item else {
            bail!("input JSON item at index {index} is not an object");
        };
        let mut fields = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let Some(text) = scalar_to_string(&value) else {
                bail!("input JSON item at index {index} has a non-scalar value for key '{key}'");
            };
            fields.push((key, text));
        }
        records.push(Record::from_pairs(fields));
    }
    Ok(records)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::tempdir;

    use super::{Batch, Record, load_batch};

    fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).expect("write fixture");
        path
    }

    fn record_pairs(record: &Record) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(url) = record.url() {
            pairs.push(("url".to_string(), url.to_string()));
        }
        for (key, value) in record.meta_fields() {
            pairs.push((key.to_string(), value.to_string()));
        }
        pairs
    }

    #[test]
    fn rejects_unknown_extension() {
        let temp = tempdir().expect("tempdir");
        let path = write_fixture(temp.path(), "input.txt", "url,title\n");
        let error = load_batch(&path).expect_err("must fail");
        assert!(error.to_string().contains("must be .csv or .json"));
    }

    #[test]
    fn missing_file_is_fatal() {
        let error = load_batch(Path::new("/nonexistent/input.csv")).expect_err("must fail");
        assert!(error.to_string().contains("does not exist"));
    }

    #[test]
    fn empty_file_is_fatal() {
        let temp = tempdir().expect("tempdir");
        let path = write_fixture(temp.path(), "input.csv", "  \n");
        let error = load_batch(&path).expect_err("must fail");
        assert!(error.to_string().contains("is empty"));
    }

    #[test]
    fn header_only_csv_is_fatal() {
        let temp = tempdir().expect("tempdir");
        let path = write_fixture(temp.path(), "input.csv", "url,title\n");
        let error = load_batch(&path).expect_err("must fail");
        assert!(error.to_string().contains("no records found"));
    }

    #[test]
    fn empty_json_array_is_fatal() {
        let temp = tempdir().expect("tempdir");
        let path = write_fixture(temp.path(), "input.json", "[]");
        let error = load_batch(&path).expect_err("must fail");
        assert!(error.to_string().contains("no records found"));
    }

    #[test]
    fn malformed_json_is_fatal() {
        let temp = tempdir().expect("tempdir");
        let path = write_fixture(temp.path(), "input.json", "[{\"url\": ");
        let error = load_batch(&path).expect_err("must fail");
        assert!(error.to_string().contains("could not parse input file as JSON"));
    }

    #[test]
    fn json_top_level_object_is_fatal() {
        let temp = tempdir().expect("tempdir");
        let path = write_fixture(temp.path(), "input.json", "{\"url\": \"https://x.test/a\"}");
        let error = load_batch(&path).expect_err("must fail");
        assert!(error.to_string().contains("must be an array"));
    }

    #[test]
    fn json_nested_value_is_fatal() {
        let temp = tempdir().expect("tempdir");
        let path = write_fixture(
            temp.path(),
            "input.json",
            r#"[{"url": "https://x.test/a", "tags": ["one", "two"]}]"#,
        );
        let error = load_batch(&path).expect_err("must fail");
        assert!(error.to_string().contains("non-scalar value for key 'tags'"));
    }

    #[test]
    fn ragged_csv_row_is_fatal() {
        let temp = tempdir().expect("tempdir");
        let path = write_fixture(
            temp.path(),
            "input.csv",
            "url,title\nhttps://x.test/a,Hello,extra\n",
        );
        let error = load_batch(&path).expect_err("must fail");
        assert!(error.to_string().contains("could not parse input file as CSV"));
    }

    #[test]
    fn csv_preserves_empty_cells() {
        let temp = tempdir().expect("tempdir");
        let path = write_fixture(
            temp.path(),
            "input.csv",
            "url,title,description\nhttps://x.test/a,Hello,\n",
        );
        let batch = load_batch(&path).expect("load");
        assert_eq!(batch.len(), 1);
        let fields: Vec<_> = batch.records()[0].meta_fields().collect();
        assert_eq!(fields, vec![("title", "Hello"), ("description", "")]);
    }

    #[test]
    fn json_coerces_null_bool_and_number() {
        let temp = tempdir().expect("tempdir");
        let path = write_fixture(
            temp.path(),
            "input.json",
            r#"[{"url": "https://x.test/a", "missing": null, "flag": true, "count": 7}]"#,
        );
        let batch = load_batch(&path).expect("load");
        let fields: Vec<_> = batch.records()[0].meta_fields().collect();
        assert_eq!(
            fields,
            vec![("missing", ""), ("flag", "true"), ("count", "7")]
        );
    }

    #[test]
    fn json_records_may_have_differing_keys() {
        let temp = tempdir().expect("tempdir");
        let path = write_fixture(
            temp.path(),
            "input.json",
            r#"[
  {"url": "https://x.test/a", "title": "Hello"},
  {"url": "https://x.test/b", "description": "World"}
]"#,
        );
        let batch = load_batch(&path).expect("load");
        assert_eq!(batch.len(), 2);
        let first: Vec<_> = batch.records()[0].meta_fields().collect();
        let second: Vec<_> = batch.records()[1].meta_fields().collect();
        assert_eq!(first, vec![("title", "Hello")]);
        assert_eq!(second, vec![("description", "World")]);
    }

    #[test]
    fn json_preserves_object_key_order() {
        let temp = tempdir().expect("tempdir");
        let path = write_fixture(
            temp.path(),
            "input.json",
            r#"[{"url": "https://x.test/a", "zeta": "1", "alpha": "2", "mid": "3"}]"#,
        );
        let batch = load_batch(&path).expect("load");
        let keys: Vec<_> = batch.records()[0]
            .meta_fields()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn csv_and_json_load_the_same_logical_records() {
        let temp = tempdir().expect("tempdir");
        let csv_path = write_fixture(
            temp.path(),
            "input.csv",
            "url,title,description\nhttps://x.test/a,Hello,First\nhttps://x.test/b,World,\n",
        );
        let json_path = write_fixture(
            temp.path(),
            "input.json",
            r#"[
  {"url": "https://x.test/a", "title": "Hello", "description": "First"},
  {"url": "https://x.test/b", "title": "World", "description": ""}
]"#,
        );

        let from_csv = load_batch(&csv_path).expect("load csv");
        let from_json = load_batch(&json_path).expect("load json");
        assert_eq!(from_csv.len(), from_json.len());
        for (left, right) in from_csv.records().iter().zip(from_json.records()) {
            assert_eq!(record_pairs(left), record_pairs(right));
        }
    }

    #[test]
    fn batch_reports_len() {
        let batch = Batch::new(vec![Record::from_pairs(vec![(
            "url".to_string(),
            "https://x.test/a".to_string(),
        )])]);
        assert_eq!(batch.len(), 1);
        assert!(!batch.is_empty());
    }
}
