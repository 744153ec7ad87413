//! Pure string path utilities.
//!
//! The browser navigates a *remote* filesystem whose OS may differ from the
//! host the client runs on, so none of this may rely on `std::path` — the
//! behavior has to be identical everywhere. Windows drive letters and
//! backslash separators are handled explicitly.

/// Whether a path is absolute: POSIX-rooted (`/...`) or rooted at a Windows
/// drive letter (`c:...`, case-insensitive).
pub fn is_absolute(path: &str) -> bool {
    let normalized = normalize(path);
    if normalized.starts_with('/') {
        return true;
    }
    let mut chars = normalized.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(c), Some(':')) if c.is_ascii_alphabetic()
    )
}

/// Normalize a path: fold backslashes to slashes, collapse repeated slashes,
/// resolve `.` and `..` segments (without escaping above the root), and
/// preserve a leading slash.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let path = path.replace('\\', "/");

    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            ".." => {
                parts.pop();
            }
            "" | "." => {}
            _ => parts.push(part),
        }
    }
    let result = parts.join("/");

    if path.starts_with('/') {
        format!("/{}", result)
    } else {
        result
    }
}

/// Join segments with `/` and normalize. The result keeps a trailing slash
/// iff the last input segment had one.
pub fn join<S: AsRef<str>>(paths: &[S]) -> String {
    if paths.is_empty() {
        return String::new();
    }
    let joined = paths
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join("/");
    let result = normalize(&joined);

    let ends_with_slash = paths[paths.len() - 1].as_ref().ends_with('/');
    if ends_with_slash && !result.ends_with('/') {
        format!("{}/", result)
    } else {
        result
    }
}

/// Resolve a possibly-relative path against a working directory, returning a
/// normalized absolute path.
pub fn normalize_relative_path_to_absolute(relative_path: &str, cwd: &str) -> String {
    if is_absolute(relative_path) {
        normalize(relative_path)
    } else {
        normalize(&join(&[cwd, relative_path]))
    }
}

/// Normalize and split into non-empty fragments. A leading drive-letter
/// fragment gets its trailing slash back (`c:` -> `c:/`) so it stays usable
/// as a listing target on Windows hosts.
pub fn split_path(path: &str) -> Vec<String> {
    let path = normalize(path);
    let mut frags: Vec<String> = path
        .split('/')
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .collect();
    if let Some(first) = frags.first_mut() {
        if first.ends_with(':') {
            first.push('/');
        }
    }
    frags
}
