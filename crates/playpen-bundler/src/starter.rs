//! Default TypeComposer project used when no project directory exists.

use crate::store::VirtualFileStore;

const TSCONFIG: &str = r#"{
  "compilerOptions": {
    "target": "ESNext",
    "module": "ESNext",
    "moduleResolution": "node",
    "lib": ["ES2021", "DOM", "DOM.Iterable"],
    "strict": true,
    "useDefineForClassFields": true,
    "experimentalDecorators": true,
    "emitDecoratorMetadata": true,
    "isolatedModules": true,
    "noEmit": true,
    "baseUrl": ".",
    "paths": {
      "@/*": ["src/*"]
    }
  },
  "include": ["src"]
}
"#;

const VITE_CONFIG: &str = r#"import { defineConfig } from "vite";
import typeComposerPlugin from "typecomposer-plugin";

export default defineConfig({
  plugins: [typeComposerPlugin()],
  resolve: {
    alias: { "@": "/src" },
  },
});
"#;

const PACKAGE_JSON: &str = r#"{
  "name": "typecomposer-playground",
  "private": true,
  "version": "0.0.0",
  "type": "module",
  "scripts": {
    "dev": "vite",
    "build": "vite build"
  },
  "dependencies": {
    "typecomposer": "^0.1.53"
  },
  "devDependencies": {
    "typecomposer-plugin": "^0.0.35",
    "typescript": "^5.6.2",
    "vite": "^5.4.8"
  }
}
"#;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>TypeComposer</title>
  </head>
  <body>
    <script type="module" src="/src/main.ts"></script>
  </body>
</html>
"#;

const MAIN_TS: &str = r#"import { AppPage } from "./AppPage";

const app = new AppPage();
document.body.appendChild(app);
"#;

const APP_PAGE_TS: &str = r##"import { BorderPanel } from "typecomposer";

export class AppPage extends BorderPanel {
  constructor() {
    super({
      style: {
        width: "100vw",
        height: "100vh",
        backgroundColor: "#ef4444",
        display: "flex",
        alignItems: "center",
        justifyContent: "center",
        color: "white",
        fontSize: "24px",
        fontWeight: "bold",
      },
    });

    this.innerText = "Hello from TypeComposer!";
  }
}
"##;

/// Files of the starter project, as `(path, code)` pairs.
pub const STARTER_FILES: &[(&str, &str)] = &[
    ("/tsconfig.json", TSCONFIG),
    ("/vite.config.js", VITE_CONFIG),
    ("/package.json", PACKAGE_JSON),
    ("/index.html", INDEX_HTML),
    ("/src/main.ts", MAIN_TS),
    ("/src/AppPage.ts", APP_PAGE_TS),
];

/// The file opened in the editor when the starter project is loaded.
pub const STARTER_OPEN_FILE: &str = "/src/AppPage.ts";

/// Build a store holding the starter project.
pub fn starter_project() -> VirtualFileStore {
    STARTER_FILES
        .iter()
        .map(|(path, code)| (path.to_string(), code.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::find_entry;
    use crate::tsconfig::{path_aliases, TSCONFIG_PATH};

    #[test]
    fn starter_has_main_entry() {
        let files = starter_project();

        assert_eq!(files.len(), STARTER_FILES.len());
        assert_eq!(find_entry(&files, None).unwrap(), "/src/main.ts");
        assert!(files.has(STARTER_OPEN_FILE));
    }

    #[test]
    fn starter_tsconfig_declares_source_alias() {
        let files = starter_project();
        let aliases = path_aliases(files.get(TSCONFIG_PATH).unwrap()).unwrap();

        assert_eq!(aliases, vec![("@/".to_string(), "/src/".to_string())]);
    }

    #[test]
    fn app_page_keeps_its_full_body() {
        let files = starter_project();
        let page = files.get(STARTER_OPEN_FILE).unwrap();

        assert!(page.contains(r##"backgroundColor: "#ef4444","##));
        assert!(page.contains("this.innerText = \"Hello from TypeComposer!\";"));
        assert!(page.trim_end().ends_with('}'));
    }
}
