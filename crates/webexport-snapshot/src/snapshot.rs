//! Self-contained snapshot of a live page.
//!
//! External stylesheets are inlined into `<head>` (direct fetch first, the
//! page's parsed rules as fallback) and images are embedded as `data:` URLs.
//! Resources that cannot be recovered are skipped and reported as warnings;
//! they never fail the snapshot.

use base64::Engine;
use futures::future::join_all;
use tracing::{debug, info, warn};
use url::Url;
use webexport_core::{Error, Result};

use crate::fetch::Fetcher;
use crate::page::PageContext;
use crate::serialize::{collect_resources, rewrite, Rewrites};

/// A rendered page flattened into one markup string.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub html: String,
    pub warnings: Vec<SnapshotWarning>,
}

/// A resource left un-inlined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotWarning {
    Stylesheet { href: String, reason: String },
    Image { src: String, reason: String },
}

impl std::fmt::Display for SnapshotWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stylesheet { href, reason } => {
                write!(f, "Stylesheet {} not inlined: {}", href, reason)
            }
            Self::Image { src, reason } => write!(f, "Image {} not inlined: {}", src, reason),
        }
    }
}

/// Capture the page behind `page` as a self-contained document.
pub async fn capture(page: &dyn PageContext, fetcher: &dyn Fetcher) -> Result<Snapshot> {
    let markup = page.document_html().await?;
    let base_uri = page.base_url().await?;
    let base = Url::parse(&base_uri)
        .map_err(|e| Error::Conversion(format!("Invalid base URI {}: {}", base_uri, e)))?;

    let resources = collect_resources(&markup);
    debug!(
        "Snapshot of {}: {} stylesheet links, {} images",
        base,
        resources.stylesheets.len(),
        resources.images.len()
    );

    let stylesheets = resources
        .stylesheets
        .iter()
        .map(|href| recover_stylesheet(page, fetcher, &base, href));
    let images = resources
        .images
        .iter()
        .map(|src| inline_image(fetcher, &base, src.as_deref()));
    let (stylesheets, images) = futures::join!(join_all(stylesheets), join_all(images));

    let mut rewrites = Rewrites::default();
    let mut warnings = Vec::new();

    for (index, outcome) in stylesheets.into_iter().enumerate() {
        match outcome {
            Ok(css) => {
                rewrites.head_styles.push(css);
                rewrites.dropped_links.insert(index);
            }
            Err(warning) => {
                warn!("{}", warning);
                warnings.push(warning);
            }
        }
    }

    for (index, outcome) in images.into_iter().enumerate() {
        match outcome {
            Some(Ok(data_url)) => {
                rewrites.image_sources.insert(index, data_url);
            }
            Some(Err(warning)) => {
                warn!("{}", warning);
                warnings.push(warning);
            }
            None => {}
        }
    }

    let html = rewrite(&markup, &rewrites);

    info!(
        "Snapshot captured: {} stylesheets inlined, {} images embedded, {} skipped ({} bytes)",
        rewrites.head_styles.len(),
        rewrites.image_sources.len(),
        warnings.len(),
        html.len()
    );

    Ok(Snapshot { html, warnings })
}

async fn recover_stylesheet(
    page: &dyn PageContext,
    fetcher: &dyn Fetcher,
    base: &Url,
    raw_href: &str,
) -> std::result::Result<String, SnapshotWarning> {
    let href = base
        .join(raw_href)
        .map_err(|e| SnapshotWarning::Stylesheet {
            href: raw_href.to_string(),
            reason: format!("unresolvable address: {}", e),
        })?
        .to_string();

    match fetcher.fetch(&href).await {
        Ok(resource) => {
            let text = String::from_utf8_lossy(&resource.body).into_owned();
            if !text.is_empty() {
                return Ok(text);
            }
            debug!("Stylesheet {} fetched empty, reading parsed rules", href);
        }
        Err(e) => debug!("Direct fetch of {} failed, reading parsed rules: {}", href, e),
    }

    match page.stylesheet_rules(&href).await {
        Ok(Some(rules)) => {
            let mut css = String::new();
            for rule in rules {
                css.push_str(&rule);
                css.push('\n');
            }
            Ok(css)
        }
        Ok(None) => Err(SnapshotWarning::Stylesheet {
            href,
            reason: "fetch failed and rules are not readable".to_string(),
        }),
        Err(e) => Err(SnapshotWarning::Stylesheet {
            href,
            reason: e.to_string(),
        }),
    }
}

/// `None` when there is nothing to inline (no source, or already embedded).
async fn inline_image(
    fetcher: &dyn Fetcher,
    base: &Url,
    src: Option<&str>,
) -> Option<std::result::Result<String, SnapshotWarning>> {
    let src = src.map(str::trim).filter(|s| !s.is_empty())?;
    if src
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
    {
        return None;
    }

    let absolute = match base.join(src) {
        Ok(url) => url.to_string(),
        Err(e) => {
            return Some(Err(SnapshotWarning::Image {
                src: src.to_string(),
                reason: format!("unresolvable address: {}", e),
            }))
        }
    };

    Some(match fetcher.fetch(&absolute).await {
        Ok(resource) => {
            let mime = resource
                .content_type
                .as_deref()
                .and_then(|ct| ct.split(';').next())
                .map(|ct| ct.trim().to_ascii_lowercase())
                .filter(|ct| !ct.is_empty())
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let encoded = base64::engine::general_purpose::STANDARD.encode(&resource.body);
            Ok(format!("data:{};base64,{}", mime, encoded))
        }
        Err(e) => Err(SnapshotWarning::Image {
            src: absolute,
            reason: e.to_string(),
        }),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fetch::FetchedResource;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Page with fixed markup and optionally readable stylesheet rules.
    pub(crate) struct FakePage {
        pub html: String,
        pub base: String,
        pub rules: HashMap<String, Vec<String>>,
    }

    impl FakePage {
        pub(crate) fn new(html: &str) -> Self {
            Self {
                html: html.to_string(),
                base: "https://example.com/articles/page.html".to_string(),
                rules: HashMap::new(),
            }
        }
    }

    #[async_trait]
    impl PageContext for FakePage {
        async fn document_html(&self) -> Result<String> {
            Ok(self.html.clone())
        }

        async fn base_url(&self) -> Result<String> {
            Ok(self.base.clone())
        }

        async fn stylesheet_rules(&self, href: &str) -> Result<Option<Vec<String>>> {
            Ok(self.rules.get(href).cloned())
        }
    }

    /// Serves a fixed set of URLs; everything else is a 404.
    #[derive(Default)]
    pub(crate) struct FakeFetcher {
        pub resources: HashMap<String, (Option<String>, Vec<u8>)>,
        pub requested: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub(crate) fn serve(mut self, url: &str, content_type: Option<&str>, body: &[u8]) -> Self {
            self.resources.insert(
                url.to_string(),
                (content_type.map(|c| c.to_string()), body.to_vec()),
            );
            self
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedResource> {
            self.requested.lock().push(url.to_string());
            match self.resources.get(url) {
                Some((content_type, body)) => Ok(FetchedResource {
                    content_type: content_type.clone(),
                    body: body.clone(),
                }),
                None => Err(Error::Http(format!("{} returned 404 Not Found", url))),
            }
        }
    }

    #[tokio::test]
    async fn test_fetchable_stylesheet_inlined() {
        let page = FakePage::new(
            r#"<html><head><style>h1 { color: blue; }</style><link rel="stylesheet" href="/css/site.css"></head><body><h1>Hi</h1></body></html>"#,
        );
        let fetcher = FakeFetcher::default().serve(
            "https://example.com/css/site.css",
            Some("text/css"),
            b"body { font-family: serif; }",
        );

        let snapshot = capture(&page, &fetcher).await.unwrap();
        assert!(snapshot.warnings.is_empty());
        assert!(snapshot.html.contains("<style>body { font-family: serif; }</style>"));
        assert!(!snapshot.html.contains("<link"));
        assert!(!snapshot.html.contains("site.css"));

        // Native inline styles come first
        let native = snapshot.html.find("h1 { color: blue; }").unwrap();
        let inlined = snapshot.html.find("font-family: serif").unwrap();
        assert!(native < inlined);
    }

    #[tokio::test]
    async fn test_blocked_stylesheet_reconstructed_from_rules() {
        let mut page = FakePage::new(
            r#"<html><head><link rel="stylesheet" href="https://cdn.other.org/theme.css"></head><body></body></html>"#,
        );
        page.rules.insert(
            "https://cdn.other.org/theme.css".to_string(),
            vec!["p { margin: 0px; }".to_string(), "a { color: green; }".to_string()],
        );
        let fetcher = FakeFetcher::default();

        let snapshot = capture(&page, &fetcher).await.unwrap();
        assert_eq!(
            fetcher.requested.lock().as_slice(),
            ["https://cdn.other.org/theme.css".to_string()]
        );
        assert!(snapshot
            .html
            .contains("<style>p { margin: 0px; }\na { color: green; }\n</style>"));
        assert!(!snapshot.html.contains("theme.css"));
        assert!(snapshot.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_unrecoverable_stylesheet_skipped() {
        let page = FakePage::new(
            r#"<html><head><link rel="stylesheet" href="gone.css"></head><body><p>text</p></body></html>"#,
        );
        let fetcher = FakeFetcher::default();

        let snapshot = capture(&page, &fetcher).await.unwrap();
        // Link is left in place, nothing appended
        assert!(snapshot.html.contains(r#"href="gone.css""#));
        assert!(!snapshot.html.contains("<style>"));
        assert_eq!(snapshot.warnings.len(), 1);
        assert!(matches!(
            &snapshot.warnings[0],
            SnapshotWarning::Stylesheet { href, .. } if href == "https://example.com/articles/gone.css"
        ));
    }

    #[tokio::test]
    async fn test_alternate_stylesheet_left_disabled() {
        let page = FakePage::new(
            r#"<html><head><link rel="alternate stylesheet" title="Dark" href="/dark.css"></head><body></body></html>"#,
        );
        let fetcher = FakeFetcher::default().serve(
            "https://example.com/dark.css",
            Some("text/css"),
            b"body { background: black; }",
        );

        let snapshot = capture(&page, &fetcher).await.unwrap();
        assert!(fetcher.requested.lock().is_empty());
        assert!(!snapshot.html.contains("background: black"));
        assert!(snapshot.html.contains(r#"href="/dark.css""#));
        assert!(snapshot.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_recovered_stylesheets_keep_link_order() {
        let page = FakePage::new(
            r#"<html><head><link rel="stylesheet" href="/first.css"><link rel="stylesheet" href="/second.css"></head><body></body></html>"#,
        );
        let fetcher = FakeFetcher::default()
            .serve("https://example.com/first.css", None, b".first {}")
            .serve("https://example.com/second.css", None, b".second {}");

        let snapshot = capture(&page, &fetcher).await.unwrap();
        let first = snapshot.html.find(".first {}").unwrap();
        let second = snapshot.html.find(".second {}").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_images_embedded_as_data_urls() {
        let page = FakePage::new(
            r#"<html><head></head><body><img src="img/logo.png"><img src="//static.example.net/photo.jpg"></body></html>"#,
        );
        let fetcher = FakeFetcher::default()
            .serve(
                "https://example.com/articles/img/logo.png",
                Some("image/png"),
                b"\x89PNG",
            )
            .serve(
                "https://static.example.net/photo.jpg",
                Some("image/jpeg; charset=binary"),
                b"\xff\xd8\xff",
            );

        let snapshot = capture(&page, &fetcher).await.unwrap();
        assert!(snapshot.warnings.is_empty());
        assert!(snapshot.html.contains(r#"src="data:image/png;base64,iVBORw==""#));
        assert!(snapshot.html.contains(r#"src="data:image/jpeg;base64,/9j/""#));
        assert!(!snapshot.html.contains("logo.png"));
        assert!(!snapshot.html.contains("photo.jpg"));
    }

    #[tokio::test]
    async fn test_failed_image_keeps_original_source() {
        let page = FakePage::new(
            r#"<html><head></head><body><img src="ok.gif"><img src="missing.png"></body></html>"#,
        );
        let fetcher = FakeFetcher::default().serve(
            "https://example.com/articles/ok.gif",
            Some("image/gif"),
            b"GIF89a",
        );

        let snapshot = capture(&page, &fetcher).await.unwrap();
        assert!(snapshot.html.contains(r#"src="missing.png""#));
        assert!(snapshot.html.contains("data:image/gif;base64,"));
        assert_eq!(
            snapshot.warnings,
            vec![SnapshotWarning::Image {
                src: "https://example.com/articles/missing.png".to_string(),
                reason: "HTTP error: https://example.com/articles/missing.png returned 404 Not Found"
                    .to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_data_images_not_refetched() {
        let page = FakePage::new(
            r#"<html><head></head><body><img src="data:image/gif;base64,R0lGODlh"><img></body></html>"#,
        );
        let fetcher = FakeFetcher::default();

        let snapshot = capture(&page, &fetcher).await.unwrap();
        assert!(fetcher.requested.lock().is_empty());
        assert!(snapshot.html.contains("data:image/gif;base64,R0lGODlh"));
        assert!(snapshot.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_base_uri_fails() {
        let mut page = FakePage::new("<html><head></head><body></body></html>");
        page.base = "not a url".to_string();
        let err = capture(&page, &FakeFetcher::default()).await.unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));
    }
}
