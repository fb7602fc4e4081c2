//! Remote path helpers.
//!
//! Remote paths are plain strings with `/` separators. None of these helpers
//! touch the network or the local filesystem.

/// Replaces every backslash separator with a forward slash.
///
/// Applied to every path before it reaches the transport.
///
/// ```
/// assert_eq!(remote_file_client::normalize_path(r"\data\in\a.csv"), "/data/in/a.csv");
/// ```
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Returns the directory part of `path`: everything before the last `/`.
///
/// `"/file"` yields `"/"` and a bare name yields `"."`.
pub fn parent_directory(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => ".",
    }
}

/// Returns the final component of `path` (empty when `path` ends with `/`).
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Joins a directory and a name with exactly one `/` between them.
pub fn join_path(directory: &str, name: &str) -> String {
    let name = name.trim_start_matches('/');
    if directory.is_empty() {
        return name.to_string();
    }
    if directory.ends_with('/') {
        format!("{directory}{name}")
    } else {
        format!("{directory}/{name}")
    }
}

/// Resolves `path` against the working directory `cwd` lexically,
/// collapsing `.` and `..` components. The result is always absolute.
pub fn resolve_path(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        join_path(cwd, path)
    };

    let mut components: Vec<&str> = Vec::new();
    for component in joined.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            other => components.push(other),
        }
    }
    format!("/{}", components.join("/"))
}

/// Builds a filename predicate matching names that start with `prefix`
/// once surrounding whitespace is trimmed.
///
/// ```
/// let matches = remote_file_client::has_prefix("sendnumber_202");
/// assert!(matches(" sendnumber_20240101.csv"));
/// assert!(!matches("report.csv"));
/// ```
pub fn has_prefix(prefix: impl Into<String>) -> impl Fn(&str) -> bool + Send + Sync + 'static {
    let prefix = prefix.into();
    move |name: &str| name.trim().starts_with(prefix.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_replaces_all_backslashes() {
        let normalized = normalize_path(r"C:\upload\2024\report.csv");
        assert!(!normalized.contains('\\'));
        assert_eq!(normalized, "C:/upload/2024/report.csv");
    }

    #[test]
    fn normalize_preserves_segments() {
        let raw = r"\a\b/c\d.txt";
        let normalized = normalize_path(raw);
        let segments: Vec<&str> = normalized.split('/').collect();
        assert_eq!(segments, vec!["", "a", "b", "c", "d.txt"]);
    }

    #[test]
    fn normalize_leaves_forward_slash_paths_alone() {
        assert_eq!(normalize_path("/a/b/"), "/a/b/");
    }

    #[test]
    fn parent_directory_cases() {
        assert_eq!(parent_directory("/a/b/c/file.txt"), "/a/b/c");
        assert_eq!(parent_directory("/file.txt"), "/");
        assert_eq!(parent_directory("file.txt"), ".");
        assert_eq!(parent_directory("dir/file.txt"), "dir");
    }

    #[test]
    fn file_name_cases() {
        assert_eq!(file_name("/a/b/c.txt"), "c.txt");
        assert_eq!(file_name("c.txt"), "c.txt");
        assert_eq!(file_name("/a/b/"), "");
    }

    #[test]
    fn join_path_avoids_double_separators() {
        assert_eq!(join_path("/a", "b"), "/a/b");
        assert_eq!(join_path("/a/", "b"), "/a/b");
        assert_eq!(join_path("/", "b"), "/b");
        assert_eq!(join_path("/a", "/b"), "/a/b");
    }

    #[test]
    fn resolve_path_handles_relative_and_dots() {
        assert_eq!(resolve_path("/home/u", "docs/a.txt"), "/home/u/docs/a.txt");
        assert_eq!(resolve_path("/home/u", "/etc"), "/etc");
        assert_eq!(resolve_path("/home/u", "../v/./x"), "/home/v/x");
        assert_eq!(resolve_path("/", ".."), "/");
        assert_eq!(resolve_path("/home/u", "."), "/home/u");
    }

    #[test]
    fn prefix_predicate_trims_names() {
        let matches = has_prefix("sendnumber_202");
        assert!(matches("sendnumber_2024_01.csv"));
        assert!(matches("  sendnumber_2025.csv "));
        assert!(!matches("sendnumber"));
        assert!(!matches("other_sendnumber_2024.csv"));
    }
}
