//! Flattening of a parsed fragment into block nodes.

use scraper::ElementRef;

/// Sidebar containers, dropped with everything inside them
const DISCARDED: [&str; 4] = ["aside", "script", "style", "noscript"];

/// Class token marking a sidebar; `sidebar-*` variants count too
const SIDEBAR_CLASS: &str = "sidebar";

/// Generic grouping containers, replaced by their children
const UNWRAPPED: [&str; 5] = ["div", "section", "article", "main", "span"];

/// One node of the flattened body
#[derive(Debug, Clone)]
pub(super) enum Block<'a> {
    Element(ElementRef<'a>),
    Text(String),
}

impl<'a> Block<'a> {
    pub(super) fn element(&self) -> Option<ElementRef<'a>> {
        match self {
            Block::Element(element) => Some(*element),
            Block::Text(_) => None,
        }
    }

    pub(super) fn is_element(&self, name: &str) -> bool {
        self.element().is_some_and(|e| e.value().name() == name)
    }

    pub(super) fn text(&self) -> String {
        match self {
            Block::Element(element) => element.text().collect(),
            Block::Text(text) => text.clone(),
        }
    }

    /// Markup of the node, as it appeared in the source
    pub(super) fn html(&self) -> String {
        match self {
            Block::Element(element) => element.html(),
            Block::Text(text) => htmlescape::encode_minimal(text),
        }
    }
}

fn is_discarded(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    DISCARDED.contains(&value.name()) || value.classes().any(is_sidebar_class)
}

fn is_sidebar_class(class: &str) -> bool {
    class
        .strip_prefix(SIDEBAR_CLASS)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('-'))
}

/// Append the block-level children of `parent` to `out`, unwrapping
/// grouping containers and skipping sidebars and blank text
pub(super) fn flatten<'a>(parent: ElementRef<'a>, out: &mut Vec<Block<'a>>) {
    for child in parent.children() {
        if let Some(element) = ElementRef::wrap(child) {
            if is_discarded(&element) {
                continue;
            }
            if UNWRAPPED.contains(&element.value().name()) {
                flatten(element, out);
            } else {
                out.push(Block::Element(element));
            }
        } else if let Some(text) = child.value().as_text() {
            if !text.trim().is_empty() {
                out.push(Block::Text(text.to_string()));
            }
        }
    }
}

pub(super) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn names(markup: &str) -> Vec<String> {
        let fragment = Html::parse_fragment(markup);
        let mut out = Vec::new();
        flatten(fragment.root_element(), &mut out);
        out.iter()
            .map(|b| match b {
                Block::Element(e) => e.value().name().to_string(),
                Block::Text(t) => format!("#{}", t.trim()),
            })
            .collect()
    }

    #[test]
    fn test_flatten_unwraps_groups_and_drops_sidebars() {
        let markup = r#"
            <section><div><p>a</p></div><h2>b</h2></section>
            <aside><p>hidden</p></aside>
            <div class="widget sidebar-left"><p>hidden</p></div>
            loose <em>x</em>
        "#;

        assert_eq!(names(markup), vec!["p", "h2", "#loose", "em"]);
    }

    #[test]
    fn test_layout_classes_mentioning_sidebar_are_kept() {
        let markup = r#"
            <div class="has-sidebar"><p>kept</p></div>
            <div class="no-sidebar layout"><h2>also kept</h2></div>
            <div class="sidebar"><p>hidden</p></div>
        "#;

        assert_eq!(names(markup), vec!["p", "h2"]);
    }

    #[test]
    fn test_text_blocks_are_escaped() {
        assert_eq!(Block::Text("a < b & c".to_string()).html(), "a &lt; b &amp; c");
    }
}
