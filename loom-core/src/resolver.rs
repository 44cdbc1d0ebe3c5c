//! Path resolver: turns a raw import specifier plus an importer's
//! file path into an absolute filesystem path and its public-facing cleanId.
//! Pure path algebra plus filesystem probing — no caching of its own (callers
//! go through `FileCache` for the actual bytes).

use std::path::{Path, PathBuf};

use path_absolutize::Absolutize;

use crate::error::{CoreError, Result};
use crate::manifest;
use crate::specifier::{self, SpecifierKind};

/// A user-configured `alias` table entry, checked before any other
/// resolution strategy — longest-prefix-match wins.
#[derive(Debug, Clone)]
pub struct Alias {
    pub find: String,
    pub replacement: String,
}

pub struct Resolver {
    pub root: PathBuf,
    pub aliases: Vec<Alias>,
}

impl Resolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<Alias>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Maps a served public path (always root-relative, always starting
    /// with `/`) back to an absolute filesystem path.
    pub fn request_to_file(&self, public_path: &str) -> PathBuf {
        let clean = specifier::clean_url(public_path);
        let relative = clean.strip_prefix('/').unwrap_or(clean);
        self.root.join(relative)
    }

    /// The inverse — an absolute path under root becomes a root-relative
    /// public path with forward slashes regardless of OS.
    pub fn file_to_request(&self, abs_path: &Path) -> String {
        let relative = abs_path.strip_prefix(&self.root).unwrap_or(abs_path);
        let mut request = String::from("/");
        request.push_str(&relative.to_string_lossy().replace('\\', "/"));
        request
    }

    fn apply_alias(&self, id: &str) -> Option<String> {
        self.aliases
            .iter()
            .filter(|a| id == a.find || id.starts_with(&format!("{}/", a.find)))
            .max_by_key(|a| a.find.len())
            .map(|a| {
                if id == a.find {
                    a.replacement.clone()
                } else {
                    format!("{}{}", a.replacement, &id[a.find.len()..])
                }
            })
    }

    /// Resolves `./x`/`../x` against the importer's directory, then probes
    /// extensions/`index.*` if the literal path doesn't exist as a file.
    pub fn resolve_relative(&self, importer_abs: &Path, specifier: &str) -> Result<PathBuf> {
        let importer_dir = importer_abs.parent().unwrap_or(&self.root);
        let joined = importer_dir.join(specifier);
        let absolutized = joined
            .absolutize()
            .map_err(|e| CoreError::io(joined.clone(), e))?
            .into_owned();
        self.probe(&absolutized, &self.file_to_request(importer_abs))
    }

    /// Resolves a bare module specifier by delegating to the manifest reader.
    pub fn resolve_bare(&self, id: &str) -> Result<PathBuf> {
        manifest::resolve_bare_module(&self.root, id)
    }

    /// Entry point used by the rewriter: classifies, applies aliases, and
    /// dispatches to the relative/bare/absolute resolution strategy.
    pub fn resolve(&self, importer_abs: &Path, raw_specifier: &str) -> Result<ResolvedImport> {
        let aliased = self.apply_alias(raw_specifier);
        let id = aliased.as_deref().unwrap_or(raw_specifier);

        match specifier::classify(id) {
            SpecifierKind::ExternalUrl | SpecifierKind::DataUrl => Ok(ResolvedImport {
                kind: specifier::classify(id),
                abs_path: None,
                public_path: id.to_string(),
            }),
            SpecifierKind::Relative => {
                let abs = self.resolve_relative(importer_abs, id)?;
                Ok(ResolvedImport {
                    kind: SpecifierKind::Relative,
                    public_path: self.file_to_request(&abs),
                    abs_path: Some(abs),
                })
            }
            SpecifierKind::Absolute => {
                let abs = self.probe(&self.request_to_file(id), &self.file_to_request(importer_abs))?;
                Ok(ResolvedImport {
                    kind: SpecifierKind::Absolute,
                    public_path: self.file_to_request(&abs),
                    abs_path: Some(abs),
                })
            }
            SpecifierKind::Bare => {
                let abs = self.resolve_bare(id)?;
                Ok(ResolvedImport {
                    kind: SpecifierKind::Bare,
                    public_path: format!("/@modules/{id}"),
                    abs_path: Some(abs),
                })
            }
        }
    }

    /// Probes `path`, then `path.<ext>` for each of `PROBE_EXTENSIONS`, then
    /// `path/index.<ext>`.
    fn probe(&self, path: &Path, importer: &str) -> Result<PathBuf> {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }

        for ext in specifier::PROBE_EXTENSIONS {
            let candidate = append_ext(path, ext);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        for ext in specifier::PROBE_EXTENSIONS {
            let candidate = path.join(format!("index.{ext}"));
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        Err(CoreError::ResolveError {
            importer: importer.to_string(),
            specifier: path.display().to_string(),
        })
    }
}

fn append_ext(path: &Path, ext: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

#[derive(Debug, Clone)]
pub struct ResolvedImport {
    pub kind: SpecifierKind,
    pub abs_path: Option<PathBuf>,
    pub public_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn resolves_relative_with_extension_probing() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/util.js", "export default 1;");
        write(dir.path(), "src/main.js", "import u from './util';");

        let resolver = Resolver::new(dir.path());
        let importer = dir.path().join("src/main.js");
        let resolved = resolver.resolve_relative(&importer, "./util").unwrap();
        assert_eq!(resolved, dir.path().join("src/util.js"));
    }

    #[test]
    fn resolves_relative_index() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/lib/index.ts", "export default 1;");

        let resolver = Resolver::new(dir.path());
        let importer = dir.path().join("src/main.js");
        let resolved = resolver.resolve_relative(&importer, "./lib").unwrap();
        assert_eq!(resolved, dir.path().join("src/lib/index.ts"));
    }

    #[test]
    fn alias_longest_prefix_wins() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/components/Button.js", "export default 1;");

        let resolver = Resolver::new(dir.path()).with_aliases(vec![
            Alias { find: "@".to_string(), replacement: "/src".to_string() },
            Alias { find: "@/components".to_string(), replacement: "/src/components".to_string() },
        ]);

        let importer = dir.path().join("src/main.js");
        let resolved = resolver.resolve(&importer, "@/components/Button").unwrap();
        assert_eq!(resolved.abs_path.unwrap(), dir.path().join("src/components/Button.js"));
    }

    #[test]
    fn bare_module_maps_to_modules_public_path() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_dir = dir.path().join("node_modules/vue");
        std::fs::create_dir_all(&pkg_dir).unwrap();
        std::fs::write(pkg_dir.join("package.json"), r#"{"module": "dist/vue.esm.js"}"#).unwrap();
        std::fs::write(pkg_dir.join("dist/vue.esm.js"), "export default {};").unwrap_or_else(|_| {
            std::fs::create_dir_all(pkg_dir.join("dist")).unwrap();
            std::fs::write(pkg_dir.join("dist/vue.esm.js"), "export default {};").unwrap();
        });

        let resolver = Resolver::new(dir.path());
        let importer = dir.path().join("src/main.js");
        let resolved = resolver.resolve(&importer, "vue").unwrap();
        assert_eq!(resolved.public_path, "/@modules/vue");
    }

    #[test]
    fn unresolved_specifier_names_importer_in_error() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = Resolver::new(dir.path());
        let importer = dir.path().join("src/main.js");

        let err = resolver.resolve_relative(&importer, "./missing").unwrap_err();
        match err {
            CoreError::ResolveError { importer, .. } => assert_eq!(importer, "/src/main.js"),
            other => panic!("expected ResolveError, got {other:?}"),
        }
    }

    #[test]
    fn external_url_is_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = Resolver::new(dir.path());
        let importer = dir.path().join("src/main.js");
        let resolved = resolver.resolve(&importer, "https://cdn.skypack.dev/vue").unwrap();
        assert!(resolved.abs_path.is_none());
        assert_eq!(resolved.public_path, "https://cdn.skypack.dev/vue");
    }
}
