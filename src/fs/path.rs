//! Lexical path handling for facade paths.

/// Join `name` under `root` and clean the result: duplicate and trailing
/// slashes go away, `.` is dropped and `..` pops a component (never above
/// the root). The result is always absolute.
pub fn join(root: &str, name: &str) -> String {
    let mut components: Vec<&str> = Vec::new();
    for component in root.split('/').chain(name.split('/')) {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            other => components.push(other),
        }
    }

    if components.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", components.join("/"))
    }
}

/// Every ancestor-or-self prefix of an absolute path, shortest first,
/// excluding the root: `/a/b` yields `/a`, `/a/b`.
pub fn prefixes(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for component in path.split('/').filter(|c| !c.is_empty()) {
        current.push('/');
        current.push_str(component);
        out.push(current.clone());
    }
    out
}

/// Last component of a path.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_cleans() {
        assert_eq!(join("/", "file1"), "/file1");
        assert_eq!(join("", "file1"), "/file1");
        assert_eq!(join("/Test-root", "dir1/file_0.txt"), "/Test-root/dir1/file_0.txt");
        assert_eq!(join("/root/", "/a//b/"), "/root/a/b");
        assert_eq!(join("/root", "./a/../b"), "/root/b");
        assert_eq!(join("/", ".."), "/");
        assert_eq!(join("/", ""), "/");
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(prefixes("/a/b/c"), vec!["/a", "/a/b", "/a/b/c"]);
        assert!(prefixes("/").is_empty());
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("/dir1/file_0.txt"), "file_0.txt");
        assert_eq!(base_name("file_0.txt"), "file_0.txt");
        assert_eq!(base_name("/dir1/"), "dir1");
        assert_eq!(base_name("/"), "");
    }
}
