//! Browser-side configuration injected into the karma test page

use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::E2eResult;

/// Id of the injected script element read by the notebook frontend
pub const CONFIG_ELEMENT_ID: &str = "jupyter-config-data";

/// MIME type of the injected script element
pub const CONFIG_MIME_TYPE: &str = "application/json";

/// Default location of the generated script: `build/injector.js` next to
/// this crate's karma setup, independent of the working directory
pub fn default_injector_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("build")
        .join("injector.js")
}

/// Render the injector script for a base URL.
///
/// The URL is substituted as-is; no escaping is applied.
pub fn render_injector(base_url: &str) -> String {
    format!(
        r#"
var node = document.createElement('script');
node.id = '{id}';
node.type = '{mime}';
node.textContent = '{{"baseUrl": "{base_url}"}}';
document.body.appendChild(node);
"#,
        id = CONFIG_ELEMENT_ID,
        mime = CONFIG_MIME_TYPE,
        base_url = base_url,
    )
}

/// Write the injector script, creating parent directories as needed
pub fn write_injector(path: &Path, base_url: &str) -> E2eResult<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, render_injector(base_url))?;

    info!("Injector written to: {}", path.display());
    Ok(path.to_path_buf())
}
