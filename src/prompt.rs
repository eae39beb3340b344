use crate::types::Finding;

/// Prefix every line with its 1-based number
pub fn number_lines(content: &str) -> String {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{}: {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render findings as one `Line <n>: <message>` entry per line
pub fn format_findings(findings: &[Finding]) -> String {
    findings
        .iter()
        .map(|f| format!("Line {}: {}", f.line, f.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build one prompt asking the model to fix every finding of a file at once
///
/// The model is expected to answer with the complete corrected file and no
/// line numbers. Sections are delimited with `###` so the `###` stop sequence
/// cuts the answer off before any trailing explanation.
pub fn build_fix_prompt(file_content: &str, findings: &[Finding]) -> String {
    format!(
        "#### Fix the following issues found by static analysis in the code below:\n\
        ### {}\n\
        The code is shown with line numbers. Fix the issues and return only the corrected code, \
        without line numbers.\n\
        ### Code with issues\n\
        {}\n\
        \n\
        ### Fixed Code:",
        format_findings(findings),
        number_lines(file_content)
    )
}

/// Build a prompt for a single finding that asks only for the fixed block of lines
pub fn build_line_fix_prompt(file_content: &str, finding: &Finding) -> String {
    format!(
        "##### Static analysis found the following issue on line {}: {}\n\
        \n\
        ### Code with issues\n\
        {}\n\
        \n\
        ### Fixed block of lines starting at line {} (not the entire code):",
        finding.line,
        finding.message,
        file_content,
        finding.line.max(1)
    )
}
