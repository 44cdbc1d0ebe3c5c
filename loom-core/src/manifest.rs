//! Package manifest reading for bare-module resolution: finds the
//! `node_modules/<pkg>` directory and reads its `package.json`'s `module`
//! (preferred, ESM) or `main` field.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CoreError, Result};

#[derive(Debug, Deserialize, Default)]
struct PackageJson {
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    main: Option<String>,
}

/// Splits a bare specifier into its package name and an optional subpath,
/// honoring scoped packages (`@scope/pkg/sub`).
pub fn split_package_specifier(id: &str) -> (&str, Option<&str>) {
    if id.starts_with('@') {
        // Scoped package: `@scope/name[/subpath]` — the package name spans
        // the first two `/`-separated segments.
        let mut indices = id.match_indices('/').map(|(i, _)| i);
        return match (indices.next(), indices.next()) {
            (Some(_), Some(second_slash)) => (&id[..second_slash], Some(&id[second_slash + 1..])),
            _ => (id, None),
        };
    }

    match id.split_once('/') {
        Some((pkg, sub)) => (pkg, Some(sub)),
        None => (id, None),
    }
}

/// Resolves a bare specifier to an absolute filesystem path under
/// `<root>/node_modules/<pkg>`, honoring the `module`/`main` manifest fields
/// and explicit subpath imports.
pub fn resolve_bare_module(root: &Path, id: &str) -> Result<PathBuf> {
    let (pkg, subpath) = split_package_specifier(id);
    let pkg_dir = root.join("node_modules").join(pkg);

    if let Some(sub) = subpath {
        return Ok(pkg_dir.join(sub));
    }

    let manifest_path = pkg_dir.join("package.json");
    let text = std::fs::read_to_string(&manifest_path)
        .map_err(|e| CoreError::io(manifest_path.clone(), e))?;
    let manifest: PackageJson = serde_json::from_str(&text).map_err(|e| CoreError::ParseError {
        path: manifest_path.display().to_string(),
        reason: e.to_string(),
    })?;

    let entry = manifest
        .module
        .or(manifest.main)
        .unwrap_or_else(|| "index.js".to_string());

    Ok(pkg_dir.join(entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_package() {
        assert_eq!(split_package_specifier("vue"), ("vue", None));
        assert_eq!(split_package_specifier("lodash/debounce"), ("lodash", Some("debounce")));
    }

    #[test]
    fn splits_scoped_package() {
        assert_eq!(split_package_specifier("@vue/runtime-core"), ("@vue/runtime-core", None));
        assert_eq!(
            split_package_specifier("@vue/runtime-core/dist/foo"),
            ("@vue/runtime-core", Some("dist/foo"))
        );
    }

    #[test]
    fn resolves_module_field_over_main() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_dir = dir.path().join("node_modules").join("vue");
        std::fs::create_dir_all(&pkg_dir).unwrap();
        std::fs::write(
            pkg_dir.join("package.json"),
            r#"{"main": "dist/vue.cjs.js", "module": "dist/vue.esm.js"}"#,
        )
        .unwrap();

        let resolved = resolve_bare_module(dir.path(), "vue").unwrap();
        assert_eq!(resolved, pkg_dir.join("dist/vue.esm.js"));
    }

    #[test]
    fn subpath_import_bypasses_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_bare_module(dir.path(), "lodash/debounce").unwrap();
        assert_eq!(
            resolved,
            dir.path().join("node_modules/lodash/debounce")
        );
    }
}
