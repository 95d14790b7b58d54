//! HTML fragment kind.
//!
//! Fragments are parsed with `html5ever` in a `<body>` context. A fragment
//! the parser has to repair (stray or misnested tags, malformed markup) is
//! rejected. Valid fragments are cleaned before they are stored: script,
//! style and template elements, comments, inline event handlers and
//! `javascript:` URLs are removed, then the tree is serialized back.

use super::ScalarKind;
use crate::Value;
use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::TendrilSink;
use html5ever::{Attribute, LocalName, Namespace, ParseOpts, QualName, parse_fragment};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Elements removed together with their content.
const DROPPED_ELEMENTS: [&str; 3] = ["script", "style", "template"];

/// Attributes holding a URL. Covers `xlink:href`, whose local name is `href`.
const URL_ATTRIBUTES: [&str; 5] = ["href", "src", "action", "formaction", "poster"];

fn parse(html: &str) -> RcDom {
    let context = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from("body"));
    parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new()).one(html)
}

fn is_dropped(node: &Handle) -> bool {
    match &node.data {
        NodeData::Comment { .. } => true,
        NodeData::Element { name, .. } => DROPPED_ELEMENTS.contains(&&*name.local),
        _ => false,
    }
}

fn is_script_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .take("javascript:".len())
        .collect();
    compact.eq_ignore_ascii_case("javascript:")
}

fn keeps_attribute(attr: &Attribute) -> bool {
    let local = attr.name.local.to_ascii_lowercase();
    if local.starts_with("on") {
        return false;
    }
    !(URL_ATTRIBUTES.contains(&&*local) && is_script_url(&attr.value))
}

/// Remove everything unsafe below `node`.
fn scrub(node: &Handle) {
    node.children.borrow_mut().retain(|child| !is_dropped(child));
    if let NodeData::Element { attrs, .. } = &node.data {
        attrs.borrow_mut().retain(keeps_attribute);
    }
    for child in node.children.borrow().iter() {
        scrub(child);
    }
}

/// Serialize the children of the fragment root.
fn render(root: Handle) -> Option<String> {
    let mut out = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..SerializeOpts::default()
    };
    serialize(&mut out, &SerializableHandle::from(root), opts).ok()?;
    String::from_utf8(out).ok()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlKind;

impl ScalarKind for HtmlKind {
    fn name(&self) -> &str {
        "html"
    }

    fn validate(&self, value: &Value) -> Option<Value> {
        let dom = parse(value.as_str()?);
        if !dom.errors.is_empty() {
            tracing::debug!(errors = ?dom.errors, "html fragment rejected");
            return None;
        }
        let root = dom.document.children.borrow().first().cloned()?;
        scrub(&root);
        render(root).map(Value::String)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(html: &str) -> Option<String> {
        HtmlKind
            .validate(&Value::from(html))
            .and_then(|v| v.as_str().map(str::to_string))
    }

    #[test]
    fn keeps_plain_markup() {
        assert_eq!(
            clean("<p>Hello <b>world</b><br></p>").as_deref(),
            Some("<p>Hello <b>world</b><br></p>")
        );
        assert_eq!(clean("Tom &amp; Jerry").as_deref(), Some("Tom &amp; Jerry"));
    }

    #[test]
    fn rejects_unbalanced_markup() {
        assert_eq!(clean("<p>open <b>bold</p>"), None);
        assert_eq!(clean("</div>"), None);
        assert_eq!(HtmlKind.validate(&Value::Int(1)), None);
    }

    #[test]
    fn strips_scripts_and_handlers() {
        let out = clean(r#"<p onclick="steal()">hi</p><script>alert(1)</script><style>p{}</style>"#)
            .expect("valid fragment");
        assert_eq!(out, "<p>hi</p>");
        assert_eq!(clean("<p>a<!-- note -->b</p>").as_deref(), Some("<p>ab</p>"));
        assert_eq!(clean("<template><script>x()</script></template><i>ok</i>").as_deref(), Some("<i>ok</i>"));
    }

    #[test]
    fn strips_handlers_on_foreign_elements() {
        assert_eq!(clean("<svg onload=alert(1)></svg>").as_deref(), Some("<svg></svg>"));
        assert_eq!(
            clean(r#"<img src="a.png" ONERROR="x()">"#).as_deref(),
            Some(r#"<img src="a.png">"#)
        );
    }

    #[test]
    fn solidus_separated_handlers_never_survive() {
        let out = clean("<svg/onload=alert(1)></svg>");
        assert!(out.is_none_or(|html| !html.contains("onload")));
    }

    #[test]
    fn removes_script_urls() {
        assert_eq!(clean(r#"<a href="javascript:alert(1)">x</a>"#).as_deref(), Some("<a>x</a>"));
        assert_eq!(
            clean(r#"<a href="java&#x73;cript:alert(1)">x</a>"#).as_deref(),
            Some("<a>x</a>")
        );
        assert_eq!(
            clean(r#"<a href=" JaVa&#09;Script:alert(1)">x</a>"#).as_deref(),
            Some("<a>x</a>")
        );
        assert_eq!(
            clean(r#"<a href="/docs?q=javascript:">x</a>"#).as_deref(),
            Some(r#"<a href="/docs?q=javascript:">x</a>"#)
        );
    }
}
