//! Import lexer & rewriter: parses a JS/TS module with swc,
//! walks its import/export/dynamic-import specifiers, resolves each one
//! against the `Resolver`, and rewrites the source in place with
//! `SourceEditor`. Also detects `import.meta.hot` usage so the graph can
//! record self-accepting boundaries and explicit `accept([...])` deps.

use std::path::Path;

use swc_common::source_map::SourceMap;
use swc_common::sync::Lrc;
use swc_common::{FileName, Span};
use swc_ecma_ast::*;
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax};
use swc_ecma_visit::{Visit, VisitWith};

use crate::editor::SourceEditor;
use crate::error::{CoreError, Result};
use crate::graph::ImportGraph;
use crate::resolver::Resolver;
use crate::specifier::{self, SpecifierKind};

/// One specifier reference found while walking the AST.
struct FoundSpecifier {
    span: Span,
    raw: String,
    /// Dynamic `import()` calls are rewritten the same way as static ones but
    /// are never treated as HMR-eligible edges by themselves.
    dynamic: bool,
}

#[derive(Default)]
struct ImportCollector {
    specifiers: Vec<FoundSpecifier>,
    is_self_accepting: bool,
    /// `import.meta.hot.accept(['./a', './b'], cb)` explicit dependency list.
    accepted_deps: Vec<String>,
    uses_hot: bool,
    uses_env: bool,
}

impl Visit for ImportCollector {
    fn visit_import_decl(&mut self, node: &ImportDecl) {
        self.specifiers.push(FoundSpecifier {
            span: node.src.span,
            raw: node.src.value.to_string(),
            dynamic: false,
        });
        node.visit_children_with(self);
    }

    fn visit_named_export(&mut self, node: &NamedExport) {
        if let Some(src) = &node.src {
            self.specifiers.push(FoundSpecifier {
                span: src.span,
                raw: src.value.to_string(),
                dynamic: false,
            });
        }
        node.visit_children_with(self);
    }

    fn visit_export_all(&mut self, node: &ExportAll) {
        self.specifiers.push(FoundSpecifier {
            span: node.src.span,
            raw: node.src.value.to_string(),
            dynamic: false,
        });
        node.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, node: &CallExpr) {
        if let Callee::Import(_) = &node.callee {
            if let Some(ExprOrSpread { expr, .. }) = node.args.first() {
                if let Expr::Lit(Lit::Str(s)) = expr.as_ref() {
                    self.specifiers.push(FoundSpecifier {
                        span: s.span,
                        raw: s.value.to_string(),
                        dynamic: true,
                    });
                }
            }
        }

        if is_hot_accept_call(node) {
            self.uses_hot = true;
            match node.args.first() {
                Some(ExprOrSpread { expr, .. }) => match expr.as_ref() {
                    Expr::Lit(Lit::Str(s)) => self.accepted_deps.push(s.value.to_string()),
                    Expr::Array(arr) => {
                        for el in arr.elems.iter().flatten() {
                            if let Expr::Lit(Lit::Str(s)) = el.expr.as_ref() {
                                self.accepted_deps.push(s.value.to_string());
                            }
                        }
                    }
                    Expr::Arrow(_) | Expr::Fn(_) => self.is_self_accepting = true,
                    _ => {}
                },
                None => self.is_self_accepting = true,
            }
        }

        node.visit_children_with(self);
    }

    fn visit_member_expr(&mut self, node: &MemberExpr) {
        if is_import_meta_hot(node) {
            self.uses_hot = true;
        }
        if is_import_meta_prop(node, "env") {
            self.uses_env = true;
        }
        node.visit_children_with(self);
    }
}

fn is_import_meta_hot(node: &MemberExpr) -> bool {
    is_import_meta_prop(node, "hot")
}

fn is_import_meta_prop(node: &MemberExpr, prop: &str) -> bool {
    matches!(node.obj.as_ref(), Expr::MetaProp(mp) if mp.kind == MetaPropKind::ImportMeta)
        && matches!(&node.prop, MemberProp::Ident(id) if id.sym.as_ref() == prop)
}

fn is_hot_accept_call(node: &CallExpr) -> bool {
    let Callee::Expr(callee) = &node.callee else {
        return false;
    };
    let Expr::Member(outer) = callee.as_ref() else {
        return false;
    };
    let MemberProp::Ident(method) = &outer.prop else {
        return false;
    };
    if method.sym.as_ref() != "accept" {
        return false;
    }
    let Expr::Member(inner) = outer.obj.as_ref() else {
        return false;
    };
    is_import_meta_hot(inner)
}

pub struct RewriteResult {
    pub code: String,
    pub importees: Vec<String>,
    pub is_self_accepting: bool,
    pub accepted_deps: Vec<String>,
}

/// Parses and rewrites one module's source, updating `graph` with the
/// reconciled importee set and HMR boundary bookkeeping as a side effect.
pub fn rewrite_module(
    resolver: &Resolver,
    graph: &ImportGraph,
    abs_path: &Path,
    clean_id: &str,
    source: &str,
) -> Result<RewriteResult> {
    let syntax = syntax_for(abs_path);
    let module = parse(abs_path, source, syntax)?;

    let mut collector = ImportCollector::default();
    module.visit_with(&mut collector);

    let mut editor = SourceEditor::new(source);
    let mut importees = Vec::new();

    for found in &collector.specifiers {
        let resolved = resolver.resolve(abs_path, &found.raw)?;

        if matches!(resolved.kind, SpecifierKind::ExternalUrl | SpecifierKind::DataUrl) {
            continue;
        }

        let importee = specifier::clean_url(&resolved.public_path).to_string();
        let rewritten = stamp_specifier(&resolved.public_path, &importee, graph);
        importees.push(importee);

        let quoted = format!("\"{rewritten}\"");
        let (start, end) = span_range(found.span);
        editor.overwrite(start, end, quoted);
        let _ = found.dynamic;
    }

    if collector.is_self_accepting {
        graph.mark_self_accepting(clean_id);
    }
    for dep_specifier in &collector.accepted_deps {
        if let Ok(resolved) = resolver.resolve(abs_path, dep_specifier) {
            graph.record_acceptance(clean_id, &resolved.public_path);
        }
    }
    if collector.uses_env {
        editor.prepend(ENV_PREAMBLE);
    }
    if collector.uses_hot {
        editor.prepend(hot_preamble(clean_id));
    }

    graph.reconcile_importees(clean_id, importees.iter().cloned());

    Ok(RewriteResult {
        code: editor.to_string(),
        importees,
        is_self_accepting: collector.is_self_accepting,
        accepted_deps: collector.accepted_deps,
    })
}

/// Applies the `?import` non-JS marker and the `?t=`/`&t=` cache-busting
/// version token to a resolved public path: a non-JS extension always gets
/// `?import` appended first, then a version token is appended if the
/// importee has a recorded version.
fn stamp_specifier(public_path: &str, clean_importee: &str, graph: &ImportGraph) -> String {
    let mut out = public_path.to_string();
    let mut has_query = out.contains('?');

    if specifier::has_non_js_extension(&out) && !has_query {
        out.push_str("?import");
        has_query = true;
    }

    if let Some(version) = graph.latest_version(clean_importee) {
        out.push(if has_query { '&' } else { '?' });
        out.push_str("t=");
        out.push_str(&version.to_string());
    }

    out
}

/// Public path of the synthetic env module served by `loom-server`'s `env`
/// plugin.
pub const ENV_PUBLIC_PATH: &str = "/@loom/env";

const ENV_PREAMBLE: &str = "import __ENV__ from \"/@loom/env\";\nimport.meta.env = __ENV__;\n";

/// The `import.meta.hot` / `import.meta.env` shim injected ahead of modules
/// that reference it — a thin client the dev-server's `/@hmr-client` script
/// defines `createHotContext` for.
fn hot_preamble(clean_id: &str) -> String {
    format!(
        "import {{ createHotContext as __loom_createHotContext }} from \"/@hmr-client\";\nimport.meta.hot = __loom_createHotContext(\"{clean_id}\");\n"
    )
}

fn span_range(span: Span) -> (usize, usize) {
    // swc spans carry absolute BytePos with a 1-based offset into a dummy
    // leading line; the source map below is created fresh per file starting
    // at BytePos(1), so subtracting 1 recovers a 0-based byte offset.
    (
        (span.lo.0.saturating_sub(1)) as usize,
        (span.hi.0.saturating_sub(1)) as usize,
    )
}

fn syntax_for(path: &Path) -> Syntax {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ts") => Syntax::Typescript(TsSyntax {
            tsx: false,
            ..Default::default()
        }),
        Some("tsx") => Syntax::Typescript(TsSyntax {
            tsx: true,
            ..Default::default()
        }),
        Some("jsx") => Syntax::Es(EsSyntax {
            jsx: true,
            ..Default::default()
        }),
        _ => Syntax::Es(EsSyntax::default()),
    }
}

fn parse(abs_path: &Path, source: &str, syntax: Syntax) -> Result<Module> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(
        Lrc::new(FileName::Real(abs_path.to_path_buf())),
        source.to_string(),
    );

    let lexer = Lexer::new(
        syntax,
        EsVersion::latest(),
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);

    parser.parse_module().map_err(|e| CoreError::ParseError {
        path: abs_path.display().to_string(),
        reason: format!("{e:?}"),
    })
}
