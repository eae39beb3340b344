use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A static-analysis finding at a file location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Line number (1-indexed, 0 for file-level findings)
    pub line: u32,
    /// Analyzer message
    pub message: String,
}

/// Findings grouped by absolute file path, in discovery order
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FileIssueSet {
    entries: Vec<(PathBuf, Vec<Finding>)>,
    index: HashMap<PathBuf, usize>,
}

impl FileIssueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finding to a file, registering the file on first sight
    pub fn push(&mut self, path: PathBuf, finding: Finding) {
        match self.index.get(&path) {
            Some(&i) => self.entries[i].1.push(finding),
            None => {
                self.index.insert(path.clone(), self.entries.len());
                self.entries.push((path, vec![finding]));
            }
        }
    }

    pub fn get(&self, path: &Path) -> Option<&[Finding]> {
        self.index.get(path).map(|&i| self.entries[i].1.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &[Finding])> {
        self.entries
            .iter()
            .map(|(path, findings)| (path.as_path(), findings.as_slice()))
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of findings across all files
    pub fn finding_count(&self) -> usize {
        self.entries.iter().map(|(_, f)| f.len()).sum()
    }
}

/// One file's content and findings while it is being fixed
#[derive(Debug)]
pub struct FixRequest<'a> {
    pub file_path: &'a Path,
    pub original_content: String,
    pub findings: &'a [Finding],
}

/// Per-run branch that receives the automated fixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingBranch {
    pub name: String,
    pub base: String,
}

/// Result of a successful cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub changed: bool,
    pub pull_request_url: Option<String>,
}
