//! Self-contained HTML rendering of a message body.
//!
//! The pipeline materializes the body, finds every `<img>` in it, resolves
//! `cid:` references against the message's attachments concurrently, and
//! writes the resulting `data:` URIs into the source once every resolution
//! has settled. Only those `src` values change; all other bytes are kept.
//! Failures in individual images never fail the render; the element is left
//! untouched.

pub mod body;
pub mod document;
pub mod index;
pub mod resolver;
pub mod sniff;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::message::Message;
use crate::parser;

pub use body::{materialize, BodySource, Materialized};
pub use document::{Document, Element};
pub use index::AttachmentIndex;
pub use resolver::{Resolution, SkipReason};
pub use sniff::{ImageSniffer, SignatureSniffer};

/// Knobs for [`render_html`].
#[derive(Clone)]
pub struct RenderOptions {
    /// Upper bound on resolving a single image. `None` waits indefinitely.
    pub image_timeout: Option<Duration>,
    /// Image type detector.
    pub sniffer: Arc<dyn ImageSniffer>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            image_timeout: None,
            sniffer: Arc::new(SignatureSniffer),
        }
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("image_timeout", &self.image_timeout)
            .finish_non_exhaustive()
    }
}

impl RenderOptions {
    pub fn with_sniffer(mut self, sniffer: Arc<dyn ImageSniffer>) -> Self {
        self.sniffer = sniffer;
        self
    }

    pub fn with_image_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.image_timeout = timeout;
        self
    }
}

/// Render the body of `message` as HTML with every resolvable `cid:` image
/// inlined as a `data:` URI.
///
/// Must be called within a tokio runtime. Only document construction can
/// fail; codec problems fall back to the plain-text body and unresolvable
/// images are left as found.
pub async fn render_html(message: &Message, options: &RenderOptions) -> Result<String> {
    let Materialized { html, source } = materialize(message);

    let index = AttachmentIndex::from_message(message);
    if index.is_empty() {
        debug!(source = ?source, "No content-id attachments, body returned as is");
        return Ok(html);
    }

    let sources = image_sources(&html)?;
    let index = Arc::new(index);
    let outcomes = resolve_all(&sources, Arc::clone(&index), options).await;

    let inlined = outcomes
        .iter()
        .filter(|o| matches!(o, Resolution::Inline(_)))
        .count();
    debug!(
        source = ?source,
        images = sources.len(),
        attachments = index.len(),
        inlined,
        "Resolved body images"
    );

    if inlined == 0 {
        return Ok(html);
    }
    apply(&html, outcomes)
}

/// Parse a `.msg` file and render its body.
pub async fn render_msg(bytes: &[u8], options: &RenderOptions) -> Result<String> {
    let message = parser::parse_msg(bytes)?;
    render_html(&message, options).await
}

/// `src` of every `<img>`, in document order.
fn image_sources(html: &str) -> Result<Vec<Option<String>>> {
    let doc = Document::parse(html)?;
    Ok(doc
        .elements("img")
        .into_iter()
        .map(|el| doc.attribute(el, "src"))
        .collect())
}

/// Resolve every `cid:` image concurrently and wait for all of them.
///
/// The returned outcomes are positional: `outcomes[i]` belongs to the i-th
/// `<img>` regardless of the order in which tasks finished.
async fn resolve_all(
    sources: &[Option<String>],
    index: Arc<AttachmentIndex>,
    options: &RenderOptions,
) -> Vec<Resolution> {
    let mut outcomes = vec![Resolution::Skip(SkipReason::NotReference); sources.len()];
    let mut tasks = JoinSet::new();

    for (position, src) in sources.iter().enumerate() {
        let Some(src) = src.as_ref().filter(|s| resolver::content_id_of(s).is_some()) else {
            continue;
        };
        outcomes[position] = Resolution::Skip(SkipReason::Failed("task did not report".into()));

        let src = src.clone();
        let index = Arc::clone(&index);
        let sniffer = Arc::clone(&options.sniffer);
        let limit = options.image_timeout;

        tasks.spawn(async move {
            let work = tokio::task::spawn_blocking(move || {
                resolver::resolve(&src, &index, sniffer.as_ref())
            });
            let joined = match limit {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        debug!(position, ?limit, "Image resolution timed out");
                        return (position, Resolution::Skip(SkipReason::TimedOut));
                    }
                },
                None => work.await,
            };
            let resolution = joined.unwrap_or_else(|e| {
                warn!(position, error = %e, "Image resolution failed, leaving image unchanged");
                Resolution::Skip(SkipReason::Failed(e.to_string()))
            });
            (position, resolution)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((position, resolution)) => outcomes[position] = resolution,
            Err(e) => warn!(error = %e, "Image task aborted"),
        }
    }

    outcomes
}

/// Write the `data:` URI of every inlined image over its `src` value.
fn apply(html: &str, outcomes: Vec<Resolution>) -> Result<String> {
    let mut doc = Document::parse(html)?;
    let images = doc.elements("img");
    for (element, outcome) in images.into_iter().zip(outcomes) {
        if let Some(uri) = outcome.into_data_uri() {
            doc.replace_attribute(element, "src", uri);
        }
    }
    Ok(doc.to_html())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attachment::{AttachMethod, Attachment};
    use crate::rtf::compressed::wrap_uncompressed;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00!\xf9\x04\x01\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00\x00\x01";

    fn html_message(html: &str, attachments: &[(&str, &'static [u8])]) -> Message {
        let rtf = format!("{{\\rtf1\\ansi\\fromhtml1 {{\\*\\htmltag0 {html}}}}}");
        Message {
            compressed_rtf: Some(Bytes::from(wrap_uncompressed(rtf.as_bytes()))),
            attachments: attachments
                .iter()
                .map(|(cid, content)| Attachment {
                    content_id: Some(cid.to_string()),
                    filename: None,
                    mime_tag: None,
                    method: AttachMethod::ByValue,
                    hidden: true,
                    content: Bytes::from_static(content),
                })
                .collect(),
            ..Message::default()
        }
    }

    fn srcs(html: &str) -> Vec<Option<String>> {
        image_sources(html).unwrap()
    }

    fn gif_uri() -> String {
        format!("data:image/gif;base64,{}", STANDARD.encode(GIF))
    }

    struct PanickingSniffer;

    impl ImageSniffer for PanickingSniffer {
        fn detect(&self, data: &[u8]) -> Option<String> {
            if data.starts_with(b"GIF") {
                panic!("detector blew up");
            }
            SignatureSniffer.detect(data)
        }
    }

    struct SlowSniffer(Duration);

    impl ImageSniffer for SlowSniffer {
        fn detect(&self, data: &[u8]) -> Option<String> {
            std::thread::sleep(self.0);
            SignatureSniffer.detect(data)
        }
    }

    /// Sleeps longer for GIFs so that tasks finish out of document order.
    struct ReorderingSniffer;

    impl ImageSniffer for ReorderingSniffer {
        fn detect(&self, data: &[u8]) -> Option<String> {
            if data.starts_with(b"GIF") {
                std::thread::sleep(Duration::from_millis(50));
            }
            SignatureSniffer.detect(data)
        }
    }

    #[derive(Default)]
    struct CountingSniffer(AtomicUsize);

    impl ImageSniffer for CountingSniffer {
        fn detect(&self, data: &[u8]) -> Option<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            SignatureSniffer.detect(data)
        }
    }

    #[tokio::test]
    async fn test_inlines_cid_and_keeps_remote() {
        let msg = html_message(
            r#"<p><img src="cid:X"><img src="http://example.com/a.png"></p>"#,
            &[("X", GIF)],
        );
        let out = render_html(&msg, &RenderOptions::default()).await.unwrap();
        assert_eq!(
            srcs(&out),
            vec![Some(gif_uri()), Some("http://example.com/a.png".to_string())]
        );
        assert!(out.starts_with("<p>"));
    }

    #[tokio::test]
    async fn test_same_cid_twice() {
        let msg = html_message(r#"<img src="cid:X"><img src="cid:X">"#, &[("X", GIF)]);
        let out = render_html(&msg, &RenderOptions::default()).await.unwrap();
        assert_eq!(srcs(&out), vec![Some(gif_uri()), Some(gif_uri())]);
    }

    #[tokio::test]
    async fn test_missing_cid_left_unchanged() {
        let html = r#"<img src="cid:nowhere">"#;
        let msg = html_message(html, &[("X", GIF)]);
        let out = render_html(&msg, &RenderOptions::default()).await.unwrap();
        assert_eq!(out, html);
    }

    #[tokio::test]
    async fn test_non_image_attachment_left_unchanged() {
        let html = r#"<img src="cid:doc">"#;
        let msg = html_message(html, &[("doc", b"%PDF-1.4")]);
        let out = render_html(&msg, &RenderOptions::default()).await.unwrap();
        assert_eq!(out, html);
    }

    #[tokio::test]
    async fn test_panicking_sniffer_skips_only_that_image() {
        let msg = html_message(
            r#"<img src="cid:g"><img src="cid:p">"#,
            &[("g", GIF), ("p", PNG)],
        );
        let options = RenderOptions::default().with_sniffer(Arc::new(PanickingSniffer));
        let out = render_html(&msg, &options).await.unwrap();
        let [gif, png] = <[_; 2]>::try_from(srcs(&out)).unwrap();
        assert_eq!(gif.as_deref(), Some("cid:g"));
        assert!(png.unwrap().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_timeout_skips_image() {
        let html = r#"<img src="cid:X">"#;
        let msg = html_message(html, &[("X", GIF)]);
        let options = RenderOptions::default()
            .with_sniffer(Arc::new(SlowSniffer(Duration::from_millis(200))))
            .with_image_timeout(Some(Duration::from_millis(10)));
        let out = render_html(&msg, &options).await.unwrap();
        assert_eq!(out, html);
    }

    #[tokio::test]
    async fn test_completion_order_does_not_matter() {
        let html = r#"<img src="cid:g"><img src="cid:p">"#;
        let msg = html_message(html, &[("g", GIF), ("p", PNG)]);
        let reordered = RenderOptions::default().with_sniffer(Arc::new(ReorderingSniffer));
        let fast = render_html(&msg, &RenderOptions::default()).await.unwrap();
        let slow = render_html(&msg, &reordered).await.unwrap();
        assert_eq!(srcs(&fast), srcs(&slow));
        assert_eq!(srcs(&slow)[0], Some(gif_uri()));
    }

    #[tokio::test]
    async fn test_only_cid_images_are_resolved() {
        let msg = html_message(
            r#"<img src="https://a/b.png"><img><img src="cid:X">"#,
            &[("X", GIF)],
        );
        let sniffer = Arc::new(CountingSniffer::default());
        let options = RenderOptions::default().with_sniffer(sniffer.clone());
        render_html(&msg, &options).await.unwrap();
        assert_eq!(sniffer.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_uppercase_img_src_inlined() {
        let msg = html_message(
            r#"<IMG SRC="cid:X"><img SRC="cid:X"><IMG src="cid:X">"#,
            &[("X", GIF)],
        );
        let out = render_html(&msg, &RenderOptions::default()).await.unwrap();
        let uri = gif_uri();
        assert_eq!(
            out,
            format!(r#"<IMG SRC="{uri}"><img SRC="{uri}"><IMG src="{uri}">"#)
        );
    }

    #[tokio::test]
    async fn test_markup_outside_src_is_preserved() {
        let html = concat!(
            r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 4.0 Transitional//EN">"#,
            r#"<html><body><p>if 1 < 2 && x</p><img width="10" src="cid:X" alt="logo">"#,
            "<script>if(a<b)go()</script></body></html>",
        );
        let msg = html_message(html, &[("X", GIF)]);
        let out = render_html(&msg, &RenderOptions::default()).await.unwrap();
        assert_eq!(out, html.replace("cid:X", &gif_uri()));
    }

    #[tokio::test]
    async fn test_no_attachments_returns_body_unchanged() {
        let html = "<!DOCTYPE html><p>a < b</p><IMG SRC=\"cid:X\">";
        let msg = html_message(html, &[]);
        let out = render_html(&msg, &RenderOptions::default()).await.unwrap();
        assert_eq!(out, html);
    }

    #[tokio::test]
    async fn test_plain_text_body_has_no_images() {
        let msg = Message {
            body: Some("<img src=\"cid:X\">".into()),
            ..Message::default()
        };
        let out = render_html(&msg, &RenderOptions::default()).await.unwrap();
        assert_eq!(out, "<pre>&lt;img src=\"cid:X\"&gt;</pre>");
    }

    #[tokio::test]
    async fn test_render_msg_rejects_garbage() {
        let err = render_msg(b"nope", &RenderOptions::default()).await.unwrap_err();
        assert_eq!(err.stage(), "container");
    }
}
