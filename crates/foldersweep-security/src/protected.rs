//! Protected path set.
//!
//! Locations that can never be deletion targets, whatever the user selects:
//! the filesystem root, system partitions, kernel pseudo-filesystems and the
//! daemon's own data directory. Matching is component-wise, so `/system`
//! protects `/system/app` but not `/system2`.

use std::path::{Component, Path, PathBuf};

/// System subtrees that are never deletion targets.
const SYSTEM_SUBTREES: &[&str] = &[
    // Android system partitions
    "/system",
    "/vendor",
    "/apex",
    "/data/system",
    "/data/data/com.android",
    // Kernel pseudo-filesystems
    "/proc",
    "/dev",
    "/sys",
    "/run",
    // Unix system partitions
    "/boot",
    "/efi",
    "/etc",
    "/bin",
    "/sbin",
    "/lib",
    "/lib32",
    "/lib64",
    "/usr",
    "/var/lib",
    // macOS
    "/System",
    "/Library",
    "/private/etc",
    "/private/var/db",
];

/// A single protection rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtectedRule {
    /// Only this exact path is protected; its children are ordinary targets.
    Exact(PathBuf),
    /// This path and everything nested under it is protected.
    Subtree(PathBuf),
}

impl ProtectedRule {
    fn matches(&self, candidate: &Path) -> bool {
        match self {
            ProtectedRule::Exact(p) => candidate == p,
            ProtectedRule::Subtree(p) => candidate.starts_with(p),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ProtectedRule::Exact(p) | ProtectedRule::Subtree(p) => p,
        }
    }
}

impl std::fmt::Display for ProtectedRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtectedRule::Exact(p) => write!(f, "{} (exact)", p.display()),
            ProtectedRule::Subtree(p) => write!(f, "{} (subtree)", p.display()),
        }
    }
}

/// Immutable set of protection rules, built once at startup.
#[derive(Debug, Clone)]
pub struct ProtectedPathSet {
    rules: Vec<ProtectedRule>,
}

impl ProtectedPathSet {
    /// Built-in rules plus the daemon's data root and any configured extras.
    pub fn new(data_root: &Path, extra_subtrees: &[PathBuf]) -> Self {
        let mut set = Self::system();
        set.push(ProtectedRule::Subtree(data_root.to_path_buf()));
        for extra in extra_subtrees {
            set.push(ProtectedRule::Subtree(extra.clone()));
        }
        set
    }

    /// Built-in rules only: root and home by equality, system subtrees.
    pub fn system() -> Self {
        let mut set = Self { rules: Vec::new() };
        set.push(ProtectedRule::Exact(PathBuf::from("/")));
        if let Some(home) = dirs::home_dir() {
            set.push(ProtectedRule::Exact(home));
        }
        for subtree in SYSTEM_SUBTREES {
            set.push(ProtectedRule::Subtree(PathBuf::from(subtree)));
        }
        set
    }

    /// Custom rule list (tests, embedders).
    pub fn from_rules(rules: Vec<ProtectedRule>) -> Self {
        let mut set = Self { rules: Vec::new() };
        for rule in rules {
            set.push(rule);
        }
        set
    }

    fn push(&mut self, rule: ProtectedRule) {
        let Some(normalized) = normalize(rule.path()) else {
            tracing::warn!("Ignoring relative protection rule: {}", rule);
            return;
        };
        let rule = match rule {
            ProtectedRule::Exact(_) => ProtectedRule::Exact(normalized),
            ProtectedRule::Subtree(_) => ProtectedRule::Subtree(normalized),
        };
        if !self.rules.contains(&rule) {
            self.rules.push(rule);
        }
    }

    /// True iff `path` equals or is nested under a protected entry.
    /// Relative paths are always protected.
    pub fn is_protected(&self, path: &Path) -> bool {
        match normalize(path) {
            Some(candidate) => self.rules.iter().any(|r| r.matches(&candidate)),
            None => true,
        }
    }

    /// The first rule that protects `path`, for diagnostics.
    pub fn matching_rule(&self, path: &Path) -> Option<&ProtectedRule> {
        let candidate = normalize(path)?;
        self.rules.iter().find(|r| r.matches(&candidate))
    }

    pub fn rules(&self) -> &[ProtectedRule] {
        &self.rules
    }
}

/// Lexically fold `.` and `..` out of an absolute path.
/// Returns `None` for relative paths.
pub fn normalize(path: &Path) -> Option<PathBuf> {
    if !path.is_absolute() {
        return None;
    }
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> ProtectedPathSet {
        ProtectedPathSet::new(Path::new("/home/u/.foldersweep"), &[PathBuf::from("/srv/keep")])
    }

    #[test]
    fn test_exact_and_nested_protected() {
        let s = set();
        assert!(s.is_protected(Path::new("/system")));
        assert!(s.is_protected(Path::new("/system/app")));
        assert!(s.is_protected(Path::new("/system/app/")));
        assert!(s.is_protected(Path::new("/proc/1/fd")));
    }

    #[test]
    fn test_sibling_prefix_not_protected() {
        let s = set();
        assert!(!s.is_protected(Path::new("/system2")));
        assert!(!s.is_protected(Path::new("/systemic/cache")));
        assert!(!s.is_protected(Path::new("/sdcard/Download/tmp")));
    }

    #[test]
    fn test_root_protected_by_equality_only() {
        let s = set();
        assert!(s.is_protected(Path::new("/")));
        assert!(!s.is_protected(Path::new("/tmp/scratch")));
    }

    #[test]
    fn test_data_root_and_extras() {
        let s = set();
        assert!(s.is_protected(Path::new("/home/u/.foldersweep")));
        assert!(s.is_protected(Path::new("/home/u/.foldersweep/schedule.db")));
        assert!(s.is_protected(Path::new("/srv/keep/a/b")));
        assert!(!s.is_protected(Path::new("/srv/other")));
    }

    #[test]
    fn test_dot_dot_cannot_escape_into_protected() {
        let s = set();
        assert!(s.is_protected(Path::new("/tmp/../system")));
        assert!(s.is_protected(Path::new("/tmp/./../etc/ssh")));
        assert!(!s.is_protected(Path::new("/system/../tmp/x")));
    }

    #[test]
    fn test_relative_paths_are_protected() {
        let s = set();
        assert!(s.is_protected(Path::new("Downloads")));
        assert!(s.is_protected(Path::new("./tmp")));
    }

    #[test]
    fn test_matching_rule_reports_source() {
        let s = ProtectedPathSet::from_rules(vec![
            ProtectedRule::Exact("/".into()),
            ProtectedRule::Subtree("/system".into()),
        ]);
        assert_eq!(
            s.matching_rule(Path::new("/system/bin")),
            Some(&ProtectedRule::Subtree("/system".into()))
        );
        assert!(s.matching_rule(Path::new("/data/media")).is_none());
        assert_eq!(s.rules().len(), 2);
    }

    #[test]
    fn test_duplicate_rules_collapse() {
        let s = ProtectedPathSet::from_rules(vec![
            ProtectedRule::Subtree("/system".into()),
            ProtectedRule::Subtree("/system/".into()),
        ]);
        assert_eq!(s.rules().len(), 1);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), Some(PathBuf::from("/a/c")));
        assert_eq!(normalize(Path::new("/../..")), Some(PathBuf::from("/")));
        assert_eq!(normalize(Path::new("a/b")), None);
    }
}
