use anyhow::{anyhow, Result};

const INVALID_CHARS: [char; 9] = [' ', '\t', '~', '^', ':', '?', '*', '[', '\\'];

pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(anyhow!("branch name cannot be empty"));
    }
    if name.trim() != name {
        return Err(anyhow!("branch name cannot have leading or trailing spaces"));
    }
    if name.contains("..") {
        return Err(anyhow!("branch name cannot contain '..'"));
    }
    if name.starts_with('.') {
        return Err(anyhow!("branch name cannot start with '.'"));
    }
    if name.ends_with(".lock") {
        return Err(anyhow!("branch name cannot end with '.lock'"));
    }
    for ch in INVALID_CHARS {
        if name.contains(ch) {
            return Err(anyhow!("branch name cannot contain '{ch}'"));
        }
    }
    Ok(())
}

/// Turn arbitrary text (usually a session title) into a branch name that
/// passes `validate_branch_name`, or an empty string when nothing survives.
pub fn sanitize_branch_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '.' && chars.peek() == Some(&'.') {
            chars.next();
            out.push('-');
        } else if ch == '/' || INVALID_CHARS.contains(&ch) {
            out.push('-');
        } else {
            out.push(ch);
        }
    }

    while out.contains("--") {
        out = out.replace("--", "-");
    }
    let mut out = out.trim_matches('-').to_string();
    while out.starts_with('.') {
        out.remove(0);
    }
    while out.ends_with(".lock") {
        out.truncate(out.len() - ".lock".len());
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_ordinary_names() {
        assert!(validate_branch_name("main").is_ok());
        assert!(validate_branch_name("feature/my-thing").is_ok());
    }

    #[test]
    fn validate_rejects_git_reserved_forms() {
        for bad in ["", "has space", "has..dots", ".foo", "ends.lock", "a\tb", "q?x"] {
            assert!(validate_branch_name(bad).is_err(), "{bad:?} should be invalid");
        }
        assert!(validate_branch_name(" padded ").is_err());
    }

    #[test]
    fn sanitize_vectors() {
        assert_eq!(sanitize_branch_name("my feature..v2"), "my-feature-v2");
        assert_eq!(sanitize_branch_name("--lead--trail--"), "lead-trail");
        assert_eq!(sanitize_branch_name("my feature"), "my-feature");
        assert_eq!(sanitize_branch_name("has..dots"), "has-dots");
        assert_eq!(sanitize_branch_name(".foo"), "foo");
        assert_eq!(sanitize_branch_name("x.lock"), "x");
        assert_eq!(sanitize_branch_name("a/b c"), "a-b-c");
    }

    #[test]
    fn sanitized_names_validate() {
        for input in [
            "my feature..v2",
            "--lead--trail--",
            "-.foo",
            "weird~^:?*[\\chars",
            "nested/branch/name",
            "...dots...",
            "locked.lock",
        ] {
            let sanitized = sanitize_branch_name(input);
            if !sanitized.is_empty() {
                assert!(
                    validate_branch_name(&sanitized).is_ok(),
                    "{input:?} sanitized to invalid {sanitized:?}"
                );
            }
        }
    }
}
