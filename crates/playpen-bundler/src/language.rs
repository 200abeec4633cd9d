//! Source language detection for virtual files.

/// Language of a virtual file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
    Jsx,
    Json,
    Css,
    Html,
    #[default]
    Unknown,
}

impl Language {
    /// Detect the language from a virtual path.
    pub fn from_path(path: &str) -> Self {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let ext = match file_name.rfind('.') {
            Some(idx) if idx > 0 => &file_name[idx + 1..],
            _ => "",
        };

        match ext.to_lowercase().as_str() {
            "ts" | "mts" | "cts" => Self::TypeScript,
            "tsx" => Self::Tsx,
            "js" | "mjs" | "cjs" => Self::JavaScript,
            "jsx" => Self::Jsx,
            "json" => Self::Json,
            "css" => Self::Css,
            "html" | "htm" => Self::Html,
            _ => Self::Unknown,
        }
    }

    /// Language mode name understood by the code editor.
    pub fn editor_mode(&self) -> &'static str {
        match self {
            Self::TypeScript | Self::Tsx => "typescript",
            Self::JavaScript | Self::Jsx => "javascript",
            Self::Json => "json",
            Self::Css => "css",
            Self::Html => "html",
            Self::Unknown => "plaintext",
        }
    }

    /// Whether files of this language can be an entry point or a probed import.
    pub fn is_script(&self) -> bool {
        matches!(
            self,
            Self::TypeScript | Self::Tsx | Self::JavaScript | Self::Jsx
        )
    }
}
