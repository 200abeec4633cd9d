//! Path aliases from `tsconfig.json`.
//!
//! Only wildcard patterns (`"@/*": ["src/*"]`) are turned into aliases. The
//! first target of each pattern is used.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Deserialize;

use crate::path::{join, normalize};

/// Where the project's tsconfig lives in the store.
pub const TSCONFIG_PATH: &str = "/tsconfig.json";

// String literals are matched first so their contents are never touched.
static COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"("(?:[^"\\]|\\.)*")|//[^\n]*|/\*(?s:.*?)\*/"#).expect("comment pattern is valid")
});

static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"("(?:[^"\\]|\\.)*")|,(\s*[}\]])"#).expect("trailing comma pattern is valid")
});

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tsconfig {
    #[serde(default)]
    compiler_options: CompilerOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompilerOptions {
    base_url: Option<String>,
    #[serde(default)]
    paths: BTreeMap<String, Vec<String>>,
}

/// Extract `(prefix, target)` alias pairs from tsconfig source text.
pub fn path_aliases(source: &str) -> Result<Vec<(String, String)>, TsconfigError> {
    let cleaned = strip_trailing_commas(&strip_comments(source));
    let config: Tsconfig =
        serde_json::from_str(&cleaned).map_err(|e| TsconfigError::Parse(e.to_string()))?;

    let base = normalize(config.compiler_options.base_url.as_deref().unwrap_or("."));
    let mut aliases = Vec::new();

    for (pattern, targets) in &config.compiler_options.paths {
        let Some(prefix) = pattern.strip_suffix('*') else {
            tracing::debug!("Ignoring non-wildcard tsconfig path: {}", pattern);
            continue;
        };
        let Some(target) = targets.first().and_then(|t| t.strip_suffix('*')) else {
            tracing::debug!("Ignoring tsconfig path without wildcard target: {}", pattern);
            continue;
        };
        if prefix.is_empty() {
            continue;
        }

        let mut resolved = join(&base, target);
        if target.ends_with('/') && !resolved.ends_with('/') {
            resolved.push('/');
        }
        aliases.push((prefix.to_string(), resolved));
    }

    Ok(aliases)
}

/// Remove `//` and `/* */` comments outside of string literals.
fn strip_comments(source: &str) -> String {
    COMMENT.replace_all(source, keep_strings).into_owned()
}

/// Remove commas directly followed (ignoring whitespace) by `}` or `]`.
fn strip_trailing_commas(source: &str) -> String {
    TRAILING_COMMA
        .replace_all(source, |caps: &Captures| match caps.get(1) {
            Some(string) => string.as_str().to_string(),
            None => caps[2].to_string(),
        })
        .into_owned()
}

fn keep_strings(caps: &Captures) -> String {
    caps.get(1)
        .map(|string| string.as_str().to_string())
        .unwrap_or_default()
}

/// Errors reading a tsconfig.
#[derive(Debug, thiserror::Error)]
pub enum TsconfigError {
    #[error("Invalid tsconfig.json: {0}")]
    Parse(String),
}
