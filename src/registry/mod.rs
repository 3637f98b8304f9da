//! Language descriptor registry — maps a filesystem path to a project root
//! and the LSP server launch command that should serve it.
use std::path::{Path, PathBuf};

/// Launch configuration plus root-discovery rule for one language.
#[derive(Debug, Clone)]
pub struct LanguageDescriptor {
    /// Short language kind tag used in session ids, e.g. `"rust"`, `"python"`.
    pub kind: &'static str,
    /// The executable to launch.
    pub server_command: &'static str,
    /// Extra command-line arguments passed after the executable name.
    pub server_args: &'static [&'static str],
    /// File extensions this server claims (including the leading dot).
    pub file_extensions: &'static [&'static str],
    /// Marker filenames that identify a project root for this language.
    pub root_markers: &'static [&'static str],
}

impl LanguageDescriptor {
    /// Walk `path`'s ancestors looking for one of `root_markers`.
    ///
    /// If `path` is a file, its parent directory is the first candidate; if
    /// it is a directory, the directory itself is included.
    pub fn find_project_root(&self, path: &Path) -> Option<PathBuf> {
        let start = if path.is_dir() {
            path
        } else {
            path.parent()?
        };
        let ext_ok = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .map(|e| self.file_extensions.contains(&e.as_str()))
            .unwrap_or(true); // directories have no extension to check
        if !ext_ok {
            return None;
        }
        let mut dir = Some(start);
        while let Some(d) = dir {
            if self.root_markers.iter().any(|m| d.join(m).exists()) {
                return Some(d.to_path_buf());
            }
            dir = d.parent();
        }
        None
    }
}

/// Built-in descriptors, in the fixed priority order used for tie-breaking
/// (most specific root marker first).
pub fn builtin_descriptors() -> Vec<LanguageDescriptor> {
    vec![
        LanguageDescriptor {
            kind: "deno",
            server_command: "deno",
            server_args: &["lsp"],
            file_extensions: &[".ts", ".tsx", ".js", ".jsx"],
            root_markers: &["deno.json", "deno.jsonc"],
        },
        LanguageDescriptor {
            kind: "typescript",
            server_command: "typescript-language-server",
            server_args: &["--stdio"],
            file_extensions: &[".ts", ".tsx"],
            root_markers: &["tsconfig.json", "package.json"],
        },
        LanguageDescriptor {
            kind: "javascript",
            server_command: "typescript-language-server",
            server_args: &["--stdio"],
            file_extensions: &[".js", ".jsx", ".mjs"],
            root_markers: &["package.json"],
        },
        LanguageDescriptor {
            kind: "rust",
            server_command: "rust-analyzer",
            server_args: &[],
            file_extensions: &[".rs"],
            root_markers: &["Cargo.toml"],
        },
        LanguageDescriptor {
            kind: "go",
            server_command: "gopls",
            server_args: &[],
            file_extensions: &[".go"],
            root_markers: &["go.mod"],
        },
        LanguageDescriptor {
            kind: "python",
            server_command: "pylsp",
            server_args: &[],
            file_extensions: &[".py"],
            root_markers: &["pyproject.toml", "setup.py", "setup.cfg"],
        },
    ]
}

/// Resolved target: the descriptor that claimed `path`, plus its project root.
pub struct Target<'a> {
    pub descriptor: &'a LanguageDescriptor,
    pub project_root: PathBuf,
}

/// Registry of language descriptors, frozen for the lifetime of the broker.
pub struct Registry {
    descriptors: Vec<LanguageDescriptor>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            descriptors: builtin_descriptors(),
        }
    }

    /// Resolve a path to its (descriptor, project root), trying descriptors
    /// in registration order and returning the first match.
    pub fn find_target(&self, path: &Path) -> Option<Target<'_>> {
        self.descriptors.iter().find_map(|d| {
            d.find_project_root(path).map(|project_root| Target {
                descriptor: d,
                project_root,
            })
        })
    }

    /// The set of language kinds this registry can serve, in priority order.
    pub fn supported_kinds(&self) -> Vec<&'static str> {
        self.descriptors.iter().map(|d| d.kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_rust_root_from_nested_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("Cargo.toml"), "[package]\n").unwrap();
        let nested = tmp.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        let file = nested.join("lib.rs");
        std::fs::write(&file, "").unwrap();

        let registry = Registry::new();
        let target = registry.find_target(&file).expect("should find rust target");
        assert_eq!(target.descriptor.kind, "rust");
        assert_eq!(target.project_root, tmp.path());
    }

    #[test]
    fn deno_wins_over_typescript_when_both_markers_present() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("deno.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("package.json"), "{}").unwrap();
        let file = tmp.path().join("main.ts");
        std::fs::write(&file, "").unwrap();

        let registry = Registry::new();
        let target = registry.find_target(&file).unwrap();
        assert_eq!(target.descriptor.kind, "deno");
    }

    #[test]
    fn unclaimed_extension_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("README.md");
        std::fs::write(&file, "").unwrap();
        let registry = Registry::new();
        assert!(registry.find_target(&file).is_none());
    }

    #[test]
    fn same_root_is_deterministic_across_calls() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("go.mod"), "module x\n").unwrap();
        let file = tmp.path().join("main.go");
        std::fs::write(&file, "").unwrap();

        let registry = Registry::new();
        let a = registry.find_target(&file).unwrap().project_root;
        let b = registry.find_target(&file).unwrap().project_root;
        assert_eq!(a, b);
    }
}
