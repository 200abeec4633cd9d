//! The playground page: editor, file tabs, error panel and preview pane.

use minijinja::{context, Environment};

/// Renders the playground page with minijinja.
pub struct PageRenderer {
    env: Environment<'static>,
}

impl PageRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("playground.html", PLAYGROUND_TEMPLATE)
            .expect("Failed to add playground template");
        Self { env }
    }

    /// Render the page. `script_src` is the URL of the client script.
    pub fn render(&self, title: &str, script_src: &str) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template("playground.html")?;
        tmpl.render(context! {
            title => title,
            script_src => script_src,
        })
    }
}

impl Default for PageRenderer {
    fn default() -> Self {
        Self::new()
    }
}

const PLAYGROUND_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{ title }}</title>
  <style>
    * { box-sizing: border-box; }
    html, body { height: 100%; margin: 0; }
    body {
      display: grid;
      grid-template-columns: 220px 1fr 1fr;
      grid-template-rows: 1fr auto;
      font-family: system-ui, sans-serif;
      color: #1f2937;
    }
    #files { grid-row: 1 / span 2; overflow-y: auto; border-right: 1px solid #e5e7eb; padding: 0.5rem; }
    .tab {
      display: block; width: 100%; text-align: left; padding: 0.25rem 0.5rem;
      border: 0; border-radius: 4px; background: none; font: 13px monospace; cursor: pointer;
    }
    .tab.active { background: #e0e7ff; }
    #editor-pane { display: flex; flex-direction: column; min-width: 0; }
    #mode { font: 12px monospace; color: #6b7280; padding: 0.25rem 0.5rem; border-bottom: 1px solid #e5e7eb; }
    #editor {
      flex: 1; width: 100%; border: 0; padding: 0.5rem; resize: none; outline: none;
      font: 14px/1.5 ui-monospace, monospace; tab-size: 2;
    }
    #preview { position: relative; border-left: 1px solid #e5e7eb; }
    #preview iframe { position: absolute; inset: 0; width: 100%; height: 100%; border: 0; visibility: hidden; }
    #preview iframe.visible { visibility: visible; }
    #error-panel {
      grid-column: 2 / span 2; max-height: 40vh; overflow-y: auto;
      background: #fef2f2; border-top: 1px solid #fecaca; color: #dc2626; padding: 0.5rem 1rem;
    }
    #error-text { margin: 0; white-space: pre-wrap; font: 13px monospace; }
    #error-dismiss { float: right; border: 0; background: none; color: inherit; cursor: pointer; font-size: 1rem; }
  </style>
</head>
<body>
  <nav id="files"></nav>
  <section id="editor-pane">
    <div id="mode"></div>
    <textarea id="editor" spellcheck="false" autocomplete="off"></textarea>
  </section>
  <section id="preview"></section>
  <div id="error-panel" hidden>
    <button id="error-dismiss" title="Dismiss">&times;</button>
    <pre id="error-text"></pre>
  </div>
  <script src="{{ script_src | safe }}"></script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_editor_preview_and_error_panel() {
        let html = PageRenderer::new().render("Playpen", "/__hmr.js").unwrap();

        assert!(html.contains("<title>Playpen</title>"));
        assert!(html.contains(r#"<textarea id="editor""#));
        assert!(html.contains(r#"<section id="preview">"#));
        assert!(html.contains(r#"<div id="error-panel" hidden>"#));
        assert!(html.contains(r#"src="/__hmr.js""#));
    }

    #[test]
    fn escapes_title_but_not_script_url() {
        let html = PageRenderer::new()
            .render("<b>Demo</b>", "/__hmr.js?v=1&t=2")
            .unwrap();

        assert!(html.contains("<title>&lt;b&gt;Demo&lt;&#x2f;b&gt;</title>"));
        assert!(html.contains(r#"<script src="/__hmr.js?v=1&t=2"></script>"#));
    }
}
