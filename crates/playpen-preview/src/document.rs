//! Standalone preview documents.
//!
//! A preview document carries everything the isolated frame needs: the import
//! map for runtime packages, error traps that render a visible diagnostic and
//! the bundle itself as an inline module script.

use minijinja::{context, Environment};

use crate::import_map::ImportMap;

/// Default `<title>` of preview documents.
pub const DEFAULT_TITLE: &str = "TypeComposer Preview";

/// Id of the element error traps render into.
pub const RUNTIME_ERROR_ID: &str = "playpen-runtime-error";

/// A complete HTML document ready to load into a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewDocument {
    pub html: String,
}

impl PreviewDocument {
    pub fn as_str(&self) -> &str {
        &self.html
    }

    pub fn len(&self) -> usize {
        self.html.len()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }
}

/// Errors rendering a preview document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Failed to render preview document: {0}")]
    Render(String),
}

/// Renders preview documents with minijinja.
pub struct DocumentRenderer {
    env: Environment<'static>,
}

impl DocumentRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("preview.html", PREVIEW_TEMPLATE)
            .expect("Failed to add preview template");
        Self { env }
    }

    /// Wrap `bundle` in a document that imports runtime packages via `imports`.
    pub fn render(
        &self,
        bundle: &str,
        imports: &ImportMap,
        title: &str,
    ) -> Result<PreviewDocument, DocumentError> {
        let tmpl = self
            .env
            .get_template("preview.html")
            .map_err(|e| DocumentError::Render(e.to_string()))?;

        let html = tmpl
            .render(context! {
                title => title,
                import_map => escape_json_for_script(&imports.to_json()),
                bundle => escape_js_for_script(bundle),
                error_id => RUNTIME_ERROR_ID,
            })
            .map_err(|e| DocumentError::Render(e.to_string()))?;

        Ok(PreviewDocument { html })
    }
}

impl Default for DocumentRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Make JSON safe inside a `<script>` element. `<` is only legal inside
/// strings in JSON, where `<` means the same thing.
fn escape_json_for_script(json: &str) -> String {
    json.replace('<', "\\u003c")
}

/// Make JavaScript safe inside a `<script>` element by breaking up
/// `</script` and `<!--` sequences.
fn escape_js_for_script(code: &str) -> String {
    let lower = code.to_ascii_lowercase();
    let mut out = String::with_capacity(code.len());
    let mut last = 0;

    for (idx, _) in lower.match_indices('<') {
        let rest = &lower[idx..];
        if rest.starts_with("</script") {
            out.push_str(&code[last..idx]);
            out.push_str("<\\/");
            last = idx + 2;
        } else if rest.starts_with("<!--") {
            out.push_str(&code[last..idx]);
            out.push_str("<\\!");
            last = idx + 2;
        }
    }

    out.push_str(&code[last..]);
    out
}

const PREVIEW_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{ title }}</title>
  <script type="importmap">
{{ import_map | safe }}
  </script>
  <style>
    * { margin: 0; padding: 0; box-sizing: border-box; }
    body { font-family: system-ui, -apple-system, sans-serif; }
    #{{ error_id }} {
      color: #dc2626;
      background: #fef2f2;
      border: 1px solid #fecaca;
      border-radius: 4px;
      margin: 20px;
      padding: 20px;
      font-family: monospace;
      white-space: pre-wrap;
    }
  </style>
  <script>
    (function () {
      function report(label, detail) {
        var text = label + ": " + (detail && detail.stack ? detail.stack : String(detail));
        var panel = document.getElementById("{{ error_id }}");
        if (!panel) {
          panel = document.createElement("div");
          panel.id = "{{ error_id }}";
          (document.body || document.documentElement).appendChild(panel);
        }
        panel.textContent = text;
      }
      window.addEventListener("error", function (event) {
        console.error("Runtime Error:", event.error || event.message);
        report("Error", event.error || event.message);
      });
      window.addEventListener("unhandledrejection", function (event) {
        console.error("Unhandled Promise Rejection:", event.reason);
        report("Unhandled Promise Rejection", event.reason);
      });
    })();
  </script>
</head>
<body>
  <script type="module">
{{ bundle | safe }}
  </script>
</body>
</html>
"##;
