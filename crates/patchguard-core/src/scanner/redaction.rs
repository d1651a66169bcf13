use std::path::Path;

/// Rewrite references to the ephemeral workspace so reports are stable
/// across runs: the snippet's absolute path becomes `placeholder`, and any
/// other mention of the workspace directory becomes `.`.
pub fn redact_workspace_paths(report: &str, file: &Path, dir: &Path, placeholder: &str) -> String {
    let file_str = file.to_string_lossy();
    let dir_str = dir.to_string_lossy();
    let mut redacted = report.replace(file_str.as_ref(), placeholder);
    if !dir_str.is_empty() && redacted.contains(dir_str.as_ref()) {
        redacted = redacted.replace(dir_str.as_ref(), ".");
    }
    redacted
}
