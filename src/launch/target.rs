use std::path::{Path, PathBuf};

/// How a resolved path is started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// URI or shell reference, handed to the desktop's opener.
    Shell(String),
    /// Something spawned directly.
    Executable(PathBuf),
}

/// Trims, strips surrounding quotes and expands environment variables.
pub fn resolve_path(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = trimmed.trim_matches('"').trim();
    expand_home(&expand_env(unquoted, |name| std::env::var(name).ok()))
}

pub fn looks_like_uri(path: &str) -> bool {
    path.contains("://")
        || path
            .get(..6)
            .is_some_and(|head| head.eq_ignore_ascii_case("shell:"))
}

pub fn classify(resolved: &str) -> Option<Target> {
    if resolved.is_empty() {
        None
    } else if looks_like_uri(resolved) {
        Some(Target::Shell(resolved.into()))
    } else {
        Some(Target::Executable(resolved.into()))
    }
}

/// Locates an executable on disk. Bare names go through `PATH`.
pub fn find_executable(path: &Path) -> Option<PathBuf> {
    if path.components().count() == 1 && !path.has_root() {
        return which::which(path).ok();
    }
    if !path.is_file() {
        return None;
    }
    // Children start in the executable's directory, relative paths would not resolve there.
    std::path::absolute(path).ok()
}

/// Expands `%VAR%`, `$VAR` and `${VAR}`. Unknown variables are kept as written.
pub fn expand_env(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find(['%', '$']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        let (name, consumed) = if let Some(body) = tail.strip_prefix('%') {
            match body.find('%') {
                Some(end) if end > 0 && is_var_name(&body[..end]) => (&body[..end], end + 2),
                _ => ("", 1),
            }
        } else if let Some(body) = tail.strip_prefix("${") {
            match body.find('}') {
                Some(end) if is_var_name(&body[..end]) => (&body[..end], end + 3),
                _ => ("", 1),
            }
        } else {
            let body = &tail[1..];
            let end = body
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(body.len());
            (&body[..end], end + 1)
        };

        match (!name.is_empty()).then(|| lookup(name)).flatten() {
            Some(value) => out.push_str(&value),
            None => out.push_str(&tail[..consumed]),
        }
        rest = &tail[consumed..];
    }

    out.push_str(rest);
    out
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '(' || c == ')')
}

fn expand_home(path: &str) -> String {
    let rest = if path == "~" {
        ""
    } else if let Some(rest) = path.strip_prefix("~/") {
        rest
    } else {
        return path.into();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest).to_string_lossy().into_owned(),
        None => path.into(),
    }
}
