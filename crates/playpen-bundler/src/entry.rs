//! Entry-point discovery.

use std::sync::LazyLock;

use regex::Regex;

use crate::language::Language;
use crate::path::normalize;
use crate::store::VirtualFileStore;

/// Conventional entry files, highest priority first.
pub const ENTRY_CANDIDATES: &[&str] = &[
    "/src/main.ts",
    "/src/main.tsx",
    "/src/main.js",
    "/src/main.jsx",
    "/src/index.ts",
    "/src/index.tsx",
    "/src/index.js",
    "/src/index.jsx",
];

pub const NO_ENTRY_MESSAGE: &str =
    "No entry point found. Please provide a /src/main.ts or /src/main.js file.";

static MODULE_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<script\b[^>]*\btype\s*=\s*["']module["'][^>]*>"#)
        .expect("module script pattern is valid")
});

static SRC_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bsrc\s*=\s*["']([^"']+)["']"#).expect("src attribute pattern is valid")
});

/// Pick the entry file for a compile.
///
/// An explicit entry must exist. Without one, the conventional candidates
/// are tried, then the module script referenced by `/index.html`, then the
/// first script file under `/src`.
pub fn find_entry(files: &VirtualFileStore, explicit: Option<&str>) -> Result<String, String> {
    if let Some(entry) = explicit {
        let path = normalize(entry);
        return if files.has(&path) {
            Ok(path)
        } else {
            Err(format!("Entry point not found: {}", entry))
        };
    }

    if let Some(candidate) = ENTRY_CANDIDATES.iter().find(|c| files.has(c)) {
        return Ok(candidate.to_string());
    }

    if let Some(src) = files.get("/index.html").and_then(html_module_script) {
        if files.has(&src) {
            return Ok(src);
        }
        tracing::debug!("index.html references missing module script {}", src);
    }

    files
        .paths()
        .find(|p| p.starts_with("/src/") && Language::from_path(p).is_script())
        .map(str::to_string)
        .ok_or_else(|| NO_ENTRY_MESSAGE.to_string())
}

/// `src` of the first `<script type="module">` in an HTML document, as a
/// virtual path.
fn html_module_script(html: &str) -> Option<String> {
    MODULE_SCRIPT.find_iter(html).find_map(|tag| {
        let src = SRC_ATTR.captures(tag.as_str())?.get(1)?.as_str();
        if src.contains("://") {
            return None;
        }
        Some(normalize(src))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(paths: &[&str]) -> VirtualFileStore {
        let mut files = VirtualFileStore::new();
        for path in paths {
            files.set(path, "").unwrap();
        }
        files
    }

    #[test]
    fn prefers_main_over_index() {
        let files = store(&["/src/index.ts", "/src/main.js", "/src/main.ts"]);

        assert_eq!(find_entry(&files, None).unwrap(), "/src/main.ts");
    }

    #[test]
    fn falls_back_to_index() {
        let files = store(&["/src/index.tsx", "/src/app.ts"]);

        assert_eq!(find_entry(&files, None).unwrap(), "/src/index.tsx");
    }

    #[test]
    fn uses_index_html_module_script() {
        let mut files = store(&["/src/boot.ts", "/src/a.ts"]);
        files
            .set(
                "/index.html",
                r#"<body><script type="module" src="/src/boot.ts"></script></body>"#,
            )
            .unwrap();

        assert_eq!(find_entry(&files, None).unwrap(), "/src/boot.ts");
    }

    #[test]
    fn falls_back_to_first_source_script() {
        let files = store(&["/src/zeta.ts", "/src/styles.css", "/src/alpha.js"]);

        assert_eq!(find_entry(&files, None).unwrap(), "/src/alpha.js");
    }

    #[test]
    fn explicit_entry_must_exist() {
        let files = store(&["/src/main.ts", "/app.ts"]);

        assert_eq!(find_entry(&files, Some("/app.ts")).unwrap(), "/app.ts");
        let err = find_entry(&files, Some("/missing.ts")).unwrap_err();
        assert_eq!(err, "Entry point not found: /missing.ts");
    }

    #[test]
    fn reports_missing_entry() {
        let files = store(&["/package.json", "/lib/util.ts"]);

        assert_eq!(find_entry(&files, None).unwrap_err(), NO_ENTRY_MESSAGE);
    }
}
