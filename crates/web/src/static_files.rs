//! Static file serving
//!
//! The playground template, bundle and icon are embedded in the binary. A
//! configured static directory overrides any of them file by file.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::borrow::Cow;
use std::path::PathBuf;
use tracing::debug;

/// Placeholder replaced with the serialized playground options
pub const OPTS_PLACEHOLDER: &str = "__PLAYGROUND_OPTS__";

const INDEX_HTML: &str = include_str!("../static/index.html");
const PLAYGROUND_JS: &str = include_str!("../static/_playground.js");
const FAVICON_ICO: &[u8] = include_bytes!("../static/favicon.ico");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    IndexHtml,
    PlaygroundJs,
    Favicon,
}

impl Asset {
    pub fn file_name(&self) -> &'static str {
        match self {
            Asset::IndexHtml => "index.html",
            Asset::PlaygroundJs => "_playground.js",
            Asset::Favicon => "favicon.ico",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Asset::IndexHtml => "text/html; charset=utf-8",
            Asset::PlaygroundJs => "application/javascript",
            Asset::Favicon => "image/x-icon",
        }
    }

    fn embedded(&self) -> &'static [u8] {
        match self {
            Asset::IndexHtml => INDEX_HTML.as_bytes(),
            Asset::PlaygroundJs => PLAYGROUND_JS.as_bytes(),
            Asset::Favicon => FAVICON_ICO,
        }
    }
}

/// Static file handler
#[derive(Debug, Clone, Default)]
pub struct StaticFiles {
    dir: Option<PathBuf>,
}

impl StaticFiles {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    /// Raw asset bytes, from the override directory when present there
    pub async fn load(&self, asset: Asset) -> Cow<'static, [u8]> {
        if let Some(dir) = &self.dir {
            let path = dir.join(asset.file_name());
            match tokio::fs::read(&path).await {
                Ok(bytes) => return Cow::Owned(bytes),
                Err(e) => debug!("Using embedded {} ({}: {})", asset.file_name(), path.display(), e),
            }
        }
        Cow::Borrowed(asset.embedded())
    }

    /// Serve an asset unmodified
    pub async fn serve(&self, asset: Asset) -> Response {
        serve_bytes(self.load(asset).await, asset.content_type())
    }

    /// Serve the template with `opts_json` substituted for the placeholder.
    /// Everything else in the document is passed through byte for byte.
    pub async fn serve_index(&self, opts_json: &str) -> Response {
        let template = self.load(Asset::IndexHtml).await;
        match std::str::from_utf8(&template) {
            Ok(text) => serve_bytes(
                render_template(text, opts_json).into_bytes().into(),
                Asset::IndexHtml.content_type(),
            ),
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Template is not valid UTF-8").into_response(),
        }
    }
}

/// Replace the first placeholder occurrence
pub fn render_template(template: &str, opts_json: &str) -> String {
    template.replacen(OPTS_PLACEHOLDER, opts_json, 1)
}

fn serve_bytes(content: Cow<'static, [u8]>, content_type: &'static str) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        content.into_owned(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_template_preserves_document() {
        let template = "<a>\r\n  __PLAYGROUND_OPTS__;\n</a>\n";
        assert_eq!(
            render_template(template, r#"{"platform":"native"}"#),
            "<a>\r\n  {\"platform\":\"native\"};\n</a>\n"
        );
    }

    #[test]
    fn test_embedded_template_has_placeholder() {
        assert_eq!(INDEX_HTML.matches(OPTS_PLACEHOLDER).count(), 1);
        assert!(!FAVICON_ICO.is_empty());
    }

    #[tokio::test]
    async fn test_override_dir_wins_per_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("_playground.js"), "console.log('custom');").unwrap();

        let files = StaticFiles::new(Some(tmp.path().to_path_buf()));
        assert_eq!(
            &*files.load(Asset::PlaygroundJs).await,
            b"console.log('custom');"
        );
        assert_eq!(&*files.load(Asset::Favicon).await, FAVICON_ICO);
    }
}
