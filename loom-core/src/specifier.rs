//! Specifier classification.

/// JS source extensions recognized by the resolver, in probing order.
pub static PROBE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "vue", "json"];

/// Extensions that the rewriter treats as already-JS (no `?import` marker needed).
pub static JS_SRC_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "vue"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    Bare,
    Relative,
    Absolute,
    ExternalUrl,
    DataUrl,
}

/// Classifies a raw import specifier by its syntactic shape.
pub fn classify(id: &str) -> SpecifierKind {
    if id.starts_with("data:") {
        SpecifierKind::DataUrl
    } else if is_external_url(id) {
        SpecifierKind::ExternalUrl
    } else if id.starts_with("./") || id.starts_with("../") {
        SpecifierKind::Relative
    } else if id.starts_with('/') {
        SpecifierKind::Absolute
    } else {
        SpecifierKind::Bare
    }
}

/// Protocol-relative (`//host/...`) or absolute `http(s):` URLs are never rewritten.
pub fn is_external_url(id: &str) -> bool {
    id.starts_with("//") || id.starts_with("http://") || id.starts_with("https://")
}

/// Strips a `?query#fragment` suffix, yielding the cleanId.
pub fn clean_url(public_path: &str) -> &str {
    let end = public_path
        .find(['?', '#'])
        .unwrap_or(public_path.len());
    &public_path[..end]
}

/// True if `path` carries a non-JS file extension.
pub fn has_non_js_extension(path: &str) -> bool {
    let clean = clean_url(path);
    match clean.rsplit_once('.') {
        Some((_, ext)) => !JS_SRC_EXTENSIONS.contains(&ext),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_bare_and_relative() {
        assert_eq!(classify("vue"), SpecifierKind::Bare);
        assert_eq!(classify("./App"), SpecifierKind::Relative);
        assert_eq!(classify("../util"), SpecifierKind::Relative);
        assert_eq!(classify("/src/x"), SpecifierKind::Absolute);
        assert_eq!(classify("https://cdn.skypack.dev/vue"), SpecifierKind::ExternalUrl);
        assert_eq!(classify("//cdn.skypack.dev/vue"), SpecifierKind::ExternalUrl);
        assert_eq!(classify("data:text/plain;base64,aGk="), SpecifierKind::DataUrl);
    }

    #[test]
    fn clean_url_strips_query_and_fragment() {
        assert_eq!(clean_url("/src/App.vue?import"), "/src/App.vue");
        assert_eq!(clean_url("/src/App.vue#frag"), "/src/App.vue");
        assert_eq!(clean_url("/src/App.vue"), "/src/App.vue");
    }

    #[test]
    fn non_js_extension_detection() {
        assert!(has_non_js_extension("/logo.png"));
        assert!(!has_non_js_extension("/src/App.vue"));
        assert!(!has_non_js_extension("/src/main.js"));
    }
}
