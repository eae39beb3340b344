use crate::config::PatchStrategy;
use crate::error::{Error, Result};
use crate::llm::ModelClient;
use crate::prompt;
use crate::types::{FileIssueSet, Finding, FixRequest};
use std::path::Path;
use tracing::{debug, error, info, trace, warn};

/// Per-run tally of the fix pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FixSummary {
    pub changed: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Rewrites files on disk from model answers
pub struct FixApplier {
    model: Box<dyn ModelClient>,
    strategy: PatchStrategy,
}

impl FixApplier {
    pub fn new(model: Box<dyn ModelClient>, strategy: PatchStrategy) -> Self {
        Self { model, strategy }
    }

    /// Fix every file in the set, in order
    ///
    /// A model failure skips that file; any other error ends the pass.
    pub async fn apply_all(&self, issues: &FileIssueSet) -> Result<FixSummary> {
        let mut summary = FixSummary::default();

        for (path, findings) in issues.iter() {
            info!(
                "Generating fix for {} ({} findings)",
                path.display(),
                findings.len()
            );
            match self.apply(path, findings).await {
                Ok(true) => {
                    info!("Updated file: {}", path.display());
                    summary.changed += 1;
                }
                Ok(false) => {
                    info!("Model returned identical content for {}", path.display());
                    summary.unchanged += 1;
                }
                Err(Error::Model(e)) => {
                    warn!("Failed to get a fix for {}: {}", path.display(), e);
                    summary.failed += 1;
                }
                Err(e) => {
                    error!("Failed to fix {}: {}", path.display(), e);
                    return Err(e);
                }
            }
        }

        info!(
            "Fix pass complete: {} changed, {} unchanged, {} failed",
            summary.changed, summary.unchanged, summary.failed
        );
        Ok(summary)
    }

    /// Fix one file; returns whether its content changed
    pub async fn apply(&self, file_path: &Path, findings: &[Finding]) -> Result<bool> {
        let request = FixRequest {
            file_path,
            original_content: tokio::fs::read_to_string(file_path).await?,
            findings,
        };

        let fixed = match self.strategy {
            PatchStrategy::FullFile => self.full_file(&request).await?,
            PatchStrategy::LineRange => self.line_range(&request).await?,
        };

        if fixed == request.original_content {
            return Ok(false);
        }
        tokio::fs::write(file_path, &fixed).await?;
        Ok(true)
    }

    /// One prompt for all findings; the answer becomes the whole file
    async fn full_file(&self, request: &FixRequest<'_>) -> Result<String> {
        let prompt = prompt::build_fix_prompt(&request.original_content, request.findings);
        trace!("Prompt for {}:\n{}", request.file_path.display(), prompt);
        self.model.complete(&prompt).await
    }

    /// One prompt per finding, each answer spliced in at the finding's line
    async fn line_range(&self, request: &FixRequest<'_>) -> Result<String> {
        let mut content = request.original_content.clone();
        let mut applied = 0;
        let mut last_error = None;

        for finding in request.findings {
            let prompt = prompt::build_line_fix_prompt(&content, finding);
            trace!("Prompt for {}:\n{}", request.file_path.display(), prompt);
            match self.model.complete(&prompt).await {
                Ok(block) => {
                    debug!(
                        "Patching {} at line {}",
                        request.file_path.display(),
                        finding.line
                    );
                    content = apply_line_patch(&content, finding.line, &block);
                    applied += 1;
                }
                Err(e) => {
                    warn!(
                        "Skipping finding at line {} of {}: {}",
                        finding.line,
                        request.file_path.display(),
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if applied == 0 => Err(e),
            _ => Ok(content),
        }
    }
}

/// Replace lines of `content` starting at `line` (1-based, 0 = first line)
/// with the lines of `block`
///
/// As many lines are replaced as `block` has; a block running past the end of
/// the file extends it.
pub fn apply_line_patch(content: &str, line: u32, block: &str) -> String {
    let mut lines: Vec<&str> = content.split('\n').collect();
    let replacement: Vec<&str> = block.split('\n').collect();

    let start = (line.max(1) as usize - 1).min(lines.len());
    let end = (start + replacement.len()).min(lines.len());
    lines.splice(start..end, replacement);
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::fs;
    use std::sync::{Arc, Mutex};

    /// Model that answers from a script and records the prompts it saw
    #[derive(Clone, Default)]
    struct ScriptedModel {
        replies: Arc<Mutex<VecDeque<Result<String>>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.into())),
                prompts: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Model("script exhausted".into())))
        }
    }

    fn finding(line: u32) -> Finding {
        Finding {
            line,
            message: format!("issue at {}", line),
        }
    }

    #[tokio::test]
    async fn test_full_file_replacement() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        fs::write(&path, "a\nb\nc").unwrap();

        let model = ScriptedModel::new(vec![Ok("x\ny".into())]);
        let applier = FixApplier::new(Box::new(model.clone()), PatchStrategy::FullFile);
        let changed = applier.apply(&path, &[finding(2)]).await.unwrap();

        assert!(changed);
        assert_eq!(fs::read_to_string(&path).unwrap(), "x\ny");
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("1: a\n2: b\n3: c"));
        assert!(prompts[0].contains("Line 2: issue at 2"));
    }

    #[tokio::test]
    async fn test_identical_answer_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        fs::write(&path, "same").unwrap();

        let model = ScriptedModel::new(vec![Ok("same".into())]);
        let applier = FixApplier::new(Box::new(model), PatchStrategy::FullFile);
        assert!(!applier.apply(&path, &[finding(1)]).await.unwrap());
    }

    #[tokio::test]
    async fn test_apply_all_skips_failed_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.py");
        let b = dir.path().join("b.py");
        fs::write(&a, "old a").unwrap();
        fs::write(&b, "old b").unwrap();

        let mut issues = FileIssueSet::new();
        issues.push(a.clone(), finding(1));
        issues.push(b.clone(), finding(1));
        issues.push(b.clone(), finding(2));

        let model = ScriptedModel::new(vec![
            Err(Error::Model("rate limited".into())),
            Ok("new b".into()),
        ]);
        let applier = FixApplier::new(Box::new(model.clone()), PatchStrategy::FullFile);
        let summary = applier.apply_all(&issues).await.unwrap();

        assert_eq!(
            summary,
            FixSummary {
                changed: 1,
                unchanged: 0,
                failed: 1
            }
        );
        assert_eq!(fs::read_to_string(&a).unwrap(), "old a");
        assert_eq!(fs::read_to_string(&b).unwrap(), "new b");
        // One prompt per file, not per finding
        assert_eq!(model.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_apply_all_stops_on_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let later = dir.path().join("later.py");
        fs::write(&later, "old").unwrap();

        let mut issues = FileIssueSet::new();
        issues.push(dir.path().join("gone.py"), finding(1));
        issues.push(later.clone(), finding(1));

        let model = ScriptedModel::new(vec![Ok("new".into())]);
        let applier = FixApplier::new(Box::new(model.clone()), PatchStrategy::FullFile);
        let err = applier.apply_all(&issues).await.unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert!(model.prompts.lock().unwrap().is_empty());
        assert_eq!(fs::read_to_string(&later).unwrap(), "old");
    }

    #[test]
    fn test_apply_line_patch() {
        assert_eq!(apply_line_patch("a\nb\nc", 2, "X"), "a\nX\nc");
        assert_eq!(apply_line_patch("a\nb\nc", 1, "X\nY"), "X\nY\nc");
        assert_eq!(apply_line_patch("a\nb\nc", 3, "X\nY"), "a\nb\nX\nY");
        assert_eq!(apply_line_patch("a\nb\nc", 0, "X"), "X\nb\nc");
        assert_eq!(apply_line_patch("a", 5, "X"), "a\nX");
    }

    #[tokio::test]
    async fn test_line_range_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        fs::write(&path, "a\nb\nc\nd").unwrap();

        let model = ScriptedModel::new(vec![
            Ok("B".into()),
            Err(Error::Model("timeout".into())),
            Ok("D".into()),
        ]);
        let applier = FixApplier::new(Box::new(model.clone()), PatchStrategy::LineRange);
        let changed = applier
            .apply(&path, &[finding(2), finding(3), finding(4)])
            .await
            .unwrap();

        assert!(changed);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nB\nc\nD");
        assert_eq!(model.prompts.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_line_range_all_failed_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        fs::write(&path, "a").unwrap();

        let model = ScriptedModel::new(vec![Err(Error::Model("down".into()))]);
        let applier = FixApplier::new(Box::new(model), PatchStrategy::LineRange);
        let err = applier.apply(&path, &[finding(1)]).await.unwrap_err();
        assert!(matches!(err, Error::Model(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "a");
    }
}
