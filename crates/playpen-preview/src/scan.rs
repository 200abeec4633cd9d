//! Bare import discovery in bundled output.

use oxc_allocator::Allocator;
use oxc_ast::ast::ModuleDeclaration;
use oxc_parser::Parser;
use oxc_span::SourceType;

/// Bare specifiers of static `import` and `export ... from` declarations, in
/// source order without duplicates.
///
/// Code that fails to parse yields no specifiers; the runtime error trap
/// reports any problem inside the preview instead.
pub fn scan_bare_imports(code: &str) -> Vec<String> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, code, SourceType::mjs()).parse();

    if parsed.panicked || !parsed.errors.is_empty() {
        tracing::debug!("Skipping import scan: bundle did not parse cleanly");
        return Vec::new();
    }

    let mut specifiers: Vec<String> = Vec::new();

    for stmt in parsed.program.body.iter() {
        let Some(decl) = stmt.as_module_declaration() else {
            continue;
        };

        let source = match decl {
            ModuleDeclaration::ImportDeclaration(import) => Some(import.source.value.as_str()),
            ModuleDeclaration::ExportNamedDeclaration(named) => {
                named.source.as_ref().map(|s| s.value.as_str())
            }
            ModuleDeclaration::ExportAllDeclaration(all) => Some(all.source.value.as_str()),
            _ => None,
        };

        if let Some(source) = source {
            if is_bare(source) && !specifiers.iter().any(|s| s == source) {
                specifiers.push(source.to_string());
            }
        }
    }

    specifiers
}

/// Whether a specifier is a package name rather than a path or URL.
pub fn is_bare(specifier: &str) -> bool {
    !(specifier.is_empty()
        || specifier.starts_with('.')
        || specifier.starts_with('/')
        || specifier.contains("://")
        || specifier.starts_with("data:")
        || specifier.starts_with("blob:"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn finds_imports_and_reexports() {
        let code = r#"
import { BorderPanel } from "typecomposer";
import "./side-effect.js";
import confetti from "canvas-confetti";
export { nanoid } from "nanoid";
export * from "typecomposer";
export * from "https://cdn.example.com/x.js";
const local = 1;
export { local };
"#;

        assert_eq!(
            scan_bare_imports(code),
            vec!["typecomposer", "canvas-confetti", "nanoid"]
        );
    }

    #[test]
    fn unparsable_code_yields_nothing() {
        assert!(scan_bare_imports("import { from 'x'").is_empty());
    }

    #[test]
    fn classifies_bare_specifiers() {
        assert!(is_bare("typecomposer"));
        assert!(is_bare("@scope/pkg/sub"));
        assert!(!is_bare("./util.js"));
        assert!(!is_bare("/src/main.ts"));
        assert!(!is_bare("https://esm.sh/x"));
    }
}
