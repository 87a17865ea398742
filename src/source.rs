use ignore::{DirEntry, WalkBuilder};
use serde_yaml::Value as YamlValue;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use dynq::Record;

const IGNORE_FILE: &str = ".dynqignore";

/// Where the CLI reads records from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSource {
    /// A record file, or a directory searched recursively.
    Path(PathBuf),
    /// An explicit list of record files.
    Files(Vec<PathBuf>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordFormat {
    Document,
    FrontMatter,
}

impl RecordFormat {
    fn of(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "yaml" | "yml" | "json" => Some(RecordFormat::Document),
            "md" => Some(RecordFormat::FrontMatter),
            _ => None,
        }
    }
}

impl RecordSource {
    /// One path per non-blank line of `reader`.
    pub fn from_reader(reader: impl BufRead) -> io::Result<Self> {
        let mut files = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if !line.is_empty() {
                files.push(PathBuf::from(line));
            }
        }
        Ok(RecordSource::Files(files))
    }

    /// Record files in path order. Directory walks honour `.gitignore` and `.dynqignore`.
    pub fn files(&self) -> Vec<PathBuf> {
        match self {
            RecordSource::Files(files) => files.clone(),
            RecordSource::Path(path) if path.is_file() => vec![path.clone()],
            RecordSource::Path(root) => {
                let mut files: Vec<PathBuf> = WalkBuilder::new(root)
                    .standard_filters(false)
                    .git_ignore(true)
                    .require_git(false)
                    .parents(true)
                    .add_custom_ignore_filename(IGNORE_FILE)
                    .build()
                    .filter_map(|entry| match entry {
                        Ok(entry) => Some(entry),
                        Err(e) => {
                            warn!(error = %e, "Skipping unreadable entry");
                            None
                        }
                    })
                    .filter(is_record_file)
                    .map(DirEntry::into_path)
                    .collect();
                files.sort();
                files
            }
        }
    }

    /// Every record the source yields. Files that fail to read or parse are
    /// logged and skipped.
    pub fn load(&self) -> Vec<Record> {
        let files = self.files();
        let mut records = Vec::new();
        for path in &files {
            match read_records(path) {
                Ok(found) => {
                    debug!(path = %path.display(), count = found.len(), "Read records");
                    records.extend(found);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping record file"),
            }
        }
        records
    }
}

fn is_record_file(entry: &DirEntry) -> bool {
    entry.file_type().is_some_and(|t| t.is_file()) && RecordFormat::of(entry.path()).is_some()
}

fn read_records(path: &Path) -> Result<Vec<Record>, String> {
    let format = RecordFormat::of(path).unwrap_or(RecordFormat::Document);
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;

    let document = match format {
        RecordFormat::Document => content.as_str(),
        RecordFormat::FrontMatter => match front_matter(&content) {
            Some(header) => header,
            None => return Ok(Vec::new()),
        },
    };
    let value: YamlValue = serde_yaml::from_str(document).map_err(|e| e.to_string())?;
    Ok(records_from_document(value))
}

/// A mapping is one record; a sequence contributes each mapping it holds.
pub fn records_from_document(document: YamlValue) -> Vec<Record> {
    match document {
        YamlValue::Sequence(items) => items.into_iter().filter_map(Record::from_value).collect(),
        other => Record::from_value(other).into_iter().collect(),
    }
}

/// The YAML block between an opening `---` line and the next `---` or `...` line.
fn front_matter(content: &str) -> Option<&str> {
    let mut lines = content.split_inclusive('\n');
    let mut offset = 0;

    loop {
        let line = lines.next()?;
        offset += line.len();
        match line.trim() {
            "" => continue,
            "---" => break,
            _ => return None,
        }
    }

    let start = offset;
    for line in lines {
        if matches!(line.trim_end(), "---" | "...") {
            return Some(&content[start..offset]);
        }
        offset += line.len();
    }
    None
}
