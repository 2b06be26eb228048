//! Structural segmentation of article bodies.
//!
//! Slideshows arrive as a single rendered article body. Segmentation flattens
//! the markup into an ordered sequence of block nodes and cuts it at every
//! image-bearing `<figure>` (a slide anchor):
//!
//! ```text
//! <p>intro</p>  <figure><img/></figure>  <h2>title</h2>  <p>body</p>  <figure>...
//! └── intro ──┘ └────────────────────── slide 1 ─────────────────────┘ └─ slide 2
//! ```
//!
//! Everything here is a pure function of the input markup.

mod blocks;

use scraper::{ElementRef, Html};
use tracing::debug;

use crate::domain::{ContentKind, NormalizedBody, Slide};

use blocks::{collapse_whitespace, flatten, Block};

/// Class of the figure child that carries the slide caption
pub const CAPTION_CLASS: &str = "wp-element-caption";

/// Image attributes checked for a URL, in order
const IMAGE_URL_ATTRS: [&str; 3] = ["src", "data-src", "data-lazy-src"];

/// Splits raw bodies into article or slideshow form
#[derive(Debug, Clone)]
pub struct Segmenter {
    heading: String,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Segmenter {
    /// Create a segmenter whose slide titles are `<h{heading_level}>` nodes
    pub fn new(heading_level: u8) -> Self {
        Self {
            heading: format!("h{}", heading_level.clamp(1, 6)),
        }
    }

    /// Normalize a raw body according to its content kind
    pub fn normalize(&self, raw_body: &str, kind: ContentKind) -> NormalizedBody {
        match kind {
            ContentKind::Article => NormalizedBody::article(raw_body),
            ContentKind::Slideshow => self.segment(raw_body),
        }
    }

    fn segment(&self, raw_body: &str) -> NormalizedBody {
        let fragment = Html::parse_fragment(raw_body);
        let mut nodes = Vec::new();
        flatten(fragment.root_element(), &mut nodes);

        let anchors: Vec<(usize, String)> = nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, node)| slide_image(node).map(|url| (idx, url)))
            .collect();

        let Some(&(first_anchor, _)) = anchors.first() else {
            debug!("No slide anchors found, treating body as article");
            return NormalizedBody {
                is_slideshow: false,
                body: raw_body.to_string(),
                intro: text_of(&nodes),
                slides: Vec::new(),
            };
        };

        let intro = text_of(&nodes[..first_anchor]);

        let slides: Vec<Slide> = anchors
            .iter()
            .enumerate()
            .map(|(n, (start, image_url))| {
                let end = anchors.get(n + 1).map(|(idx, _)| *idx).unwrap_or(nodes.len());
                self.build_slide(&nodes[*start], image_url.clone(), &nodes[start + 1..end])
            })
            .collect();

        debug!(slides = slides.len(), "Segmented slideshow");

        NormalizedBody {
            is_slideshow: true,
            body: raw_body.to_string(),
            intro,
            slides,
        }
    }

    fn build_slide(&self, anchor: &Block<'_>, image_url: String, following: &[Block<'_>]) -> Slide {
        let heading = following.iter().position(|node| node.is_element(&self.heading));

        let (title, body_nodes) = match heading {
            Some(pos) => (collapse_whitespace(&following[pos].text()), &following[pos + 1..]),
            None => (String::new(), following),
        };

        Slide {
            image_url,
            title,
            body: body_nodes.iter().map(Block::html).collect(),
            caption: anchor.element().and_then(caption_of),
        }
    }
}

/// Image URL of a slide anchor, or `None` if the node is not one
fn slide_image(node: &Block<'_>) -> Option<String> {
    let figure = node.element().filter(|e| e.value().name() == "figure")?;
    let img = figure
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "img")?;

    IMAGE_URL_ATTRS
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .map(str::trim)
        .find(|url| !url.is_empty())
        .map(str::to_string)
}

fn caption_of(figure: ElementRef<'_>) -> Option<String> {
    let captions: Vec<ElementRef<'_>> = figure
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "figcaption")
        .collect();

    let caption = captions
        .iter()
        .find(|e| e.value().classes().any(|c| c == CAPTION_CLASS))
        .or_else(|| captions.first())?;

    let text = collapse_whitespace(&caption.text().collect::<String>());
    (!text.is_empty()).then_some(text)
}

/// Plain text of a node run: tags stripped, whitespace collapsed
fn text_of(nodes: &[Block<'_>]) -> String {
    let joined = nodes.iter().map(Block::text).collect::<Vec<_>>().join(" ");
    collapse_whitespace(&joined)
}

/// Strip tags from a markup snippet and collapse whitespace
pub fn strip_tags(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    collapse_whitespace(&fragment.root_element().text().collect::<Vec<_>>().join(" "))
}

/// Decode HTML entities in a short snippet such as a title or excerpt.
/// Inline tags are dropped; whitespace inside the text is kept as is.
pub fn decode_entities(snippet: &str) -> String {
    let fragment = Html::parse_fragment(snippet);
    fragment.root_element().text().collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDESHOW: &str = r#"
        <p>Our <strong>top</strong> picks
           for spring.</p>
        <div class="wp-block-group">
            <figure class="wp-block-image">
                <img src="https://cdn.example.com/1.jpg" alt="">
                <figcaption class="wp-element-caption">Photo: A. Smith</figcaption>
            </figure>
            <h2>First</h2>
            <p>One.</p>
        </div>
        <aside class="related"><p>Read more</p></aside>
        <figure><img data-src="https://cdn.example.com/2.jpg"></figure>
        <h2>Second</h2>
        <p>Two.</p><ul><li>a</li></ul>
        <figure><img src="" alt="broken"></figure>
        <figure><img data-lazy-src="https://cdn.example.com/3.jpg"></figure>
        <h3>Not a slide title</h3>
        <h2>Third</h2>
        <p>Three.</p>
    "#;

    #[test]
    fn test_article_passes_through() {
        let raw = "<p>Hello &amp; welcome</p>";
        let normalized = Segmenter::default().normalize(raw, ContentKind::Article);

        assert_eq!(normalized, NormalizedBody::article(raw));
        assert!(!normalized.is_slideshow);
        assert!(normalized.slides.is_empty());
    }

    #[test]
    fn test_segments_slides_in_order() {
        let normalized = Segmenter::default().normalize(SLIDESHOW, ContentKind::Slideshow);

        assert!(normalized.is_slideshow);
        assert_eq!(normalized.intro, "Our top picks for spring.");
        assert_eq!(normalized.slides.len(), 3);

        let titles: Vec<&str> = normalized.slides.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);

        let images: Vec<&str> = normalized.slides.iter().map(|s| s.image_url.as_str()).collect();
        assert_eq!(
            images,
            vec![
                "https://cdn.example.com/1.jpg",
                "https://cdn.example.com/2.jpg",
                "https://cdn.example.com/3.jpg",
            ]
        );
    }

    #[test]
    fn test_slide_body_and_caption() {
        let normalized = Segmenter::default().normalize(SLIDESHOW, ContentKind::Slideshow);
        let slides = &normalized.slides;

        assert_eq!(slides[0].caption.as_deref(), Some("Photo: A. Smith"));
        assert_eq!(slides[0].body, "<p>One.</p>");
        assert_eq!(slides[1].caption, None);

        // The unresolvable figure is kept as ordinary body markup
        assert!(slides[1].body.starts_with("<p>Two.</p><ul><li>a</li></ul>"));
        assert!(slides[1].body.contains("broken"));

        // Sidebar content never leaks into a slide
        assert!(slides.iter().all(|s| !s.body.contains("Read more")));
        assert_eq!(slides[2].body, "<p>Three.</p>");
    }

    #[test]
    fn test_no_anchor_degenerates_to_article() {
        let raw = "<div><p>Just   text</p><figure><img alt=\"x\"></figure></div>";
        let normalized = Segmenter::default().normalize(raw, ContentKind::Slideshow);

        assert!(!normalized.is_slideshow);
        assert!(normalized.slides.is_empty());
        assert_eq!(normalized.intro, "Just text");
        assert_eq!(normalized.body, raw);
    }

    #[test]
    fn test_slide_without_heading_keeps_following_nodes() {
        let raw = r#"<figure><img src="a.jpg"></figure><p>Loose</p>"#;
        let normalized = Segmenter::default().normalize(raw, ContentKind::Slideshow);

        assert_eq!(normalized.slides.len(), 1);
        assert_eq!(normalized.slides[0].title, "");
        assert_eq!(normalized.slides[0].body, "<p>Loose</p>");
        assert_eq!(normalized.intro, "");
    }

    #[test]
    fn test_heading_level_is_configurable() {
        let raw = r#"<figure><img src="a.jpg"></figure><h3>Small</h3><p>x</p>"#;
        let h3 = Segmenter::new(3).normalize(raw, ContentKind::Slideshow);
        assert_eq!(h3.slides[0].title, "Small");
        assert_eq!(h3.slides[0].body, "<p>x</p>");

        let h2 = Segmenter::new(2).normalize(raw, ContentKind::Slideshow);
        assert_eq!(h2.slides[0].title, "");
    }

    #[test]
    fn test_segmentation_is_idempotent() {
        let segmenter = Segmenter::default();
        let first = segmenter.normalize(SLIDESHOW, ContentKind::Slideshow);
        let second = segmenter.normalize(SLIDESHOW, ContentKind::Slideshow);
        assert_eq!(first, second);
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("Ten &amp; More&#8230;"), "Ten & More…");
        assert_eq!(decode_entities("  spaced  out "), "  spaced  out ");
        assert_eq!(strip_tags("<p>a</p><p>b  <em>c</em></p>"), "a b c");
    }
}
