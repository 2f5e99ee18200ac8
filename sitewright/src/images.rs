//! Image placeholder enrichment.
//!
//! Generated markup asks for photos with `<unsplash-image query="…" alt="…" />`.
//! Each placeholder is swapped for a real `<img>` before the markup is parsed
//! (an HTML parser would treat the custom tag as an open element and swallow
//! everything after it).

use regex::Regex;
use std::sync::LazyLock;

use crate::tracing_macros::warn;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<unsplash-image query="([^"]+)" alt="([^"]+)" />"#)
        .expect("PLACEHOLDER regex is valid")
});

/// Photo used when a query cannot be resolved.
pub const FALLBACK_IMAGE_URL: &str = "https://images.unsplash.com/photo-1618005182384-a83a8bd57fbe";

const IMG_CLASS: &str = "w-full object-cover max-h-80";

/// One `<unsplash-image>` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePlaceholder {
    pub query: String,
    pub alt: String,
    /// Byte range of the whole tag in the source
    pub span: std::ops::Range<usize>,
}

/// Resolves a search query to a photo URL.
pub trait ImageSource {
    fn image_url(&self, query: &str) -> Option<String>;
}

/// Always answers with [`FALLBACK_IMAGE_URL`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackImages;

impl ImageSource for FallbackImages {
    fn image_url(&self, _query: &str) -> Option<String> {
        None
    }
}

impl<F> ImageSource for F
where
    F: Fn(&str) -> Option<String>,
{
    fn image_url(&self, query: &str) -> Option<String> {
        self(query)
    }
}

pub fn find_placeholders(html: &str) -> Vec<ImagePlaceholder> {
    PLACEHOLDER
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(ImagePlaceholder {
                query: caps[1].to_owned(),
                alt: caps[2].to_owned(),
                span: whole.range(),
            })
        })
        .collect()
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Replace every placeholder with an `<img>`. Markup without placeholders
/// comes back unchanged.
pub fn enrich_images(html: &str, source: &impl ImageSource) -> String {
    let placeholders = find_placeholders(html);
    if placeholders.is_empty() {
        return html.to_owned();
    }

    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for placeholder in &placeholders {
        let url = source.image_url(&placeholder.query).unwrap_or_else(|| {
            warn!(query = %placeholder.query, "no image found, using fallback");
            FALLBACK_IMAGE_URL.to_owned()
        });
        out.push_str(&html[last..placeholder.span.start]);
        // alt was captured from markup and is already attribute-safe
        out.push_str(&format!(
            r#"<img src="{}" alt="{}" class="{IMG_CLASS}" loading="lazy" />"#,
            escape_attr(&url),
            placeholder.alt
        ));
        last = placeholder.span.end;
    }
    out.push_str(&html[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn finds_exact_shape_only() {
        let html = concat!(
            r#"<div><unsplash-image query="mountain lake" alt="A lake" /></div>"#,
            r#"<unsplash-image alt="wrong order" query="x" />"#,
            r#"<unsplash-image query="city" alt="Skyline" />"#
        );
        let found = find_placeholders(html);
        let queries: Vec<&str> = found.iter().map(|p| p.query.as_str()).collect();
        assert_eq!(queries, vec!["mountain lake", "city"]);
        assert_eq!(found[0].alt, "A lake");
        assert_eq!(&html[found[0].span.clone()], r#"<unsplash-image query="mountain lake" alt="A lake" />"#);
    }

    #[test]
    fn replaces_with_resolved_urls() {
        let source = |query: &str| Some(format!("https://img.test/{}?w=800&q=80", query.replace(' ', "-")));
        let out = enrich_images(
            r#"<section><unsplash-image query="red car" alt="Car" /><p>after</p></section>"#,
            &source,
        );
        assert_eq!(
            out,
            concat!(
                r#"<section><img src="https://img.test/red-car?w=800&amp;q=80" alt="Car" "#,
                r#"class="w-full object-cover max-h-80" loading="lazy" /><p>after</p></section>"#
            )
        );
    }

    #[test]
    fn falls_back_to_default_photo() {
        let out = enrich_images(r#"<unsplash-image query="q" alt="a" />"#, &FallbackImages);
        assert!(out.starts_with(&format!(r#"<img src="{FALLBACK_IMAGE_URL}""#)));
    }

    #[test]
    fn no_placeholders_is_identity() {
        let html = "<p>nothing to see</p>";
        assert_eq!(enrich_images(html, &FallbackImages), html);
    }
}
