//! The builtin readers for the UNREPL tag vocabulary.

use crate::ast::Node;
use crate::elision::ElisionKind;
use crate::error::{UnreplError, UnreplResult};
use crate::registry::{Registry, TagRenderer};
use crate::render::{RenderOp, Style, Unparser};

pub const ELISION: &str = "unrepl/...";
pub const LAZY_ERROR: &str = "unrepl/lazy-error";
pub const MIME: &str = "unrepl/mime";
pub const OBJECT: &str = "unrepl/object";
pub const RATIO: &str = "unrepl/ratio";
pub const STRING: &str = "unrepl/string";
pub const CLASS: &str = "unrepl.java/class";
pub const VAR: &str = "clojure/var";
/// Template placeholder. Only ever authored locally, never received.
pub const PARAM: &str = "unrepl/param";

pub(crate) fn register_builtins(registry: &mut Registry, stdout: bool) {
    registry
        .register(ELISION, ElisionReader)
        .register(OBJECT, ObjectReader)
        .register(RATIO, RatioReader)
        .register(STRING, StringReader { stdout })
        .register(LAZY_ERROR, LazyErrorReader)
        .register(MIME, MimeReader)
        .register(CLASS, StyledChildReader(Style::Class))
        .register(VAR, StyledChildReader(Style::Var));
}

fn payload(node: &Node) -> UnreplResult<(&str, &Node)> {
    node.as_tag()
        .ok_or_else(|| UnreplError::malformed_tag(node.kind_name(), "reader called on a non-tag node"))
}

/// Payload of `tag` as a sequence of exactly `arity` elements.
fn fixed_sequence<'n>(tag: &str, node: &'n Node, arity: usize) -> UnreplResult<&'n [Node]> {
    match node.sequence() {
        Some(items) if items.len() == arity => Ok(items),
        Some(items) => Err(UnreplError::malformed_tag(
            tag,
            format!("expected {arity} elements, found {}", items.len()),
        )),
        None => Err(UnreplError::malformed_tag(
            tag,
            format!("expected a vector, found {}", node.kind_name()),
        )),
    }
}

struct ElisionReader;

impl TagRenderer for ElisionReader {
    fn render(&self, node: &Node, out: &mut Unparser<'_>) -> UnreplResult<()> {
        let (_, child) = payload(node)?;
        out.elision(child, ElisionKind::Collection)
    }
}

struct RatioReader;

impl TagRenderer for RatioReader {
    fn render(&self, node: &Node, out: &mut Unparser<'_>) -> UnreplResult<()> {
        let (tag, child) = payload(node)?;
        let [numerator, denominator] = fixed_sequence(tag, child, 2)? else {
            return Err(UnreplError::malformed_tag(tag, "expected [numerator denominator]"));
        };
        let numerator = out.render_text(numerator)?;
        let denominator = out.render_text(denominator)?;
        out.text(format!("{numerator}/{denominator}"));
        Ok(())
    }
}

/// Renders only the child, styled. Used for vars and classes.
struct StyledChildReader(Style);

impl TagRenderer for StyledChildReader {
    fn render(&self, node: &Node, out: &mut Unparser<'_>) -> UnreplResult<()> {
        let (_, child) = payload(node)?;
        let text = out.render_text(child)?;
        out.styled(text, self.0, None);
        Ok(())
    }
}

struct StringReader {
    stdout: bool,
}

impl TagRenderer for StringReader {
    fn render(&self, node: &Node, out: &mut Unparser<'_>) -> UnreplResult<()> {
        let (tag, child) = payload(node)?;
        let [string, elision] = fixed_sequence(tag, child, 2)? else {
            return Err(UnreplError::malformed_tag(tag, "expected [string elision]"));
        };
        let kind = ElisionKind::String {
            stdout: self.stdout,
        };
        if self.stdout {
            string_content(out, string, true)?;
            out.elision(elision, kind)
        } else {
            // The elision sits inside the quotes so a fetched tail continues
            // the literal.
            out.text("\"");
            string_content(out, string, false)?;
            out.elision(elision, kind)?;
            out.text("\"");
            Ok(())
        }
    }
}

/// Emits a string leaf without its quotes. Stdout text is shown decoded,
/// anything else keeps its escapes.
fn string_content(out: &mut Unparser<'_>, string: &Node, stdout: bool) -> UnreplResult<()> {
    if stdout {
        if let Some(value) = string.string_value() {
            out.styled(value, Style::Stdout, None);
            return Ok(());
        }
    }
    let text = string.text().ok_or_else(|| {
        UnreplError::malformed_tag(
            STRING,
            format!("expected a string leaf, found {}", string.kind_name()),
        )
    })?;
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);
    if stdout {
        out.styled(inner, Style::Stdout, None);
    } else {
        out.text(inner);
    }
    Ok(())
}

/// Renders the fetched continuation of a string so it can be spliced after
/// the text already shown, without quotes.
pub(crate) fn render_string_tail(
    out: &mut Unparser<'_>,
    node: &Node,
    stdout: bool,
) -> UnreplResult<()> {
    match node.as_tag() {
        Some((STRING, child)) => {
            let [string, elision] = fixed_sequence(STRING, child, 2)? else {
                return Err(UnreplError::malformed_tag(STRING, "expected [string elision]"));
            };
            string_content(out, string, stdout)?;
            out.elision(elision, ElisionKind::String { stdout })
        }
        Some(_) | None if node.string_value().is_some() => string_content(out, node, stdout),
        Some(_) | None => out.render_node(node),
    }
}

struct LazyErrorReader;

impl TagRenderer for LazyErrorReader {
    fn render(&self, node: &Node, out: &mut Unparser<'_>) -> UnreplResult<()> {
        let (tag, error) = payload(node)?;
        // The bundle is normally `#error {...}`; accept the bare map too.
        let bundle = error.as_tag().map_or(error, |(_, inner)| inner);
        let cause = bundle
            .map_get("cause")
            .ok_or_else(|| UnreplError::malformed_tag(tag, "error bundle has no :cause"))?;
        let cause = out.render_text(cause)?;
        out.styled(format!("#error {cause}"), Style::Error, None);
        if !out.mute_ui() {
            out.push(RenderOp::Inspect {
                error: error.clone(),
            });
        }
        Ok(())
    }
}

struct MimeReader;

impl TagRenderer for MimeReader {
    fn render(&self, node: &Node, out: &mut Unparser<'_>) -> UnreplResult<()> {
        let (_, attachment) = payload(node)?;
        let media_type = attachment
            .map_get("content-type")
            .and_then(Node::string_value)
            .ok_or_else(|| UnreplError::AttachmentDecode {
                media_type: "unknown".to_string(),
                reason: format!("expected a map with a :content-type string, found {}", attachment.kind_name()),
            })?;
        if attachment.map_get("content").is_none() {
            return Err(UnreplError::AttachmentDecode {
                media_type: media_type.to_string(),
                reason: "attachment has no :content".to_string(),
            });
        }
        out.styled(format!("#attachment[{media_type}]"), Style::Attachment, None);
        Ok(())
    }
}

struct ObjectReader;

impl TagRenderer for ObjectReader {
    fn render(&self, node: &Node, out: &mut Unparser<'_>) -> UnreplResult<()> {
        let (tag, child) = payload(node)?;
        let [class, hash, repr, _meta] = fixed_sequence(tag, child, 4)? else {
            return Err(UnreplError::malformed_tag(tag, "expected [class hash repr meta]"));
        };
        let class = out.render_text(class)?;
        let hash = hash
            .string_value()
            .map(str::to_string)
            .or_else(|| hash.text().map(str::to_string))
            .unwrap_or_default();
        let repr_text = out.render_text(repr)?;
        let raw = format!("#object[{class} {hash} {repr_text}]");

        if let Some(symbol) = repr.symbol_name() {
            out.styled(
                format!("#function[{}]", demunge(symbol)),
                Style::Function,
                Some(raw),
            );
            return Ok(());
        }

        let width = repr.map_get("width");
        let height = repr.map_get("height");
        let attachment = repr.map_get("attachment");
        if let (Some(width), Some(height), Some(attachment)) = (width, height, attachment) {
            let width = out.render_text(width)?;
            let height = out.render_text(height)?;
            out.styled(
                format!("#image[{class} {hash} {width}x{height}]"),
                Style::Image,
                Some(raw),
            );
            if !out.mute_ui() {
                out.text(" ");
                out.render_node(attachment)?;
            }
            return Ok(());
        }

        out.styled(raw, Style::Object, None);
        Ok(())
    }
}

/// Munged forms of the characters the JVM compiler cannot keep in class
/// names.
const DEMUNGE_MAP: &[(&str, char)] = &[
    ("_COLON_", ':'),
    ("_PLUS_", '+'),
    ("_GT_", '>'),
    ("_LT_", '<'),
    ("_EQ_", '='),
    ("_TILDE_", '~'),
    ("_BANG_", '!'),
    ("_CIRCA_", '@'),
    ("_SHARP_", '#'),
    ("_SINGLEQUOTE_", '\''),
    ("_DOUBLEQUOTE_", '"'),
    ("_PERCENT_", '%'),
    ("_CARET_", '^'),
    ("_AMPERSAND_", '&'),
    ("_STAR_", '*'),
    ("_BAR_", '|'),
    ("_LBRACE_", '{'),
    ("_RBRACE_", '}'),
    ("_LBRACK_", '['),
    ("_RBRACK_", ']'),
    ("_SLASH_", '/'),
    ("_BSLASH_", '\\'),
    ("_QMARK_", '?'),
];

/// Turns a compiled function class name back into the name it was defined
/// with: `clojure.core$even_QMARK_` becomes `clojure.core/even?`.
pub fn demunge(munged: &str) -> String {
    let mut out = String::with_capacity(munged.len());
    let mut rest = munged;
    while let Some(c) = rest.chars().next() {
        if c == '_' {
            if let Some((token, ch)) = DEMUNGE_MAP.iter().find(|(token, _)| rest.starts_with(token)) {
                out.push(*ch);
                rest = rest.get(token.len()..).unwrap_or_default();
                continue;
            }
            out.push('-');
        } else if c == '$' {
            out.push('/');
        } else {
            out.push(c);
        }
        rest = rest.get(c.len_utf8()..).unwrap_or_default();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{RenderOptions, render};
    use pretty_assertions::assert_eq;

    fn text(node: &Node) -> String {
        render(&Registry::builtin(), node, RenderOptions::new()).unwrap().text()
    }

    fn object(repr: Node) -> Node {
        Node::tag(
            OBJECT,
            Node::vector(vec![
                Node::tag(CLASS, Node::symbol("clojure.core$map")),
                Node::string("0x1f2e3d"),
                repr,
                Node::map(vec![]),
            ]),
        )
    }

    #[test]
    #[ntest::timeout(100)]
    fn demunges_clojure_names() {
        assert_eq!(demunge("clojure.core$map"), "clojure.core/map");
        assert_eq!(demunge("clojure.core$even_QMARK_"), "clojure.core/even?");
        assert_eq!(demunge("user$eval123$fn__124"), "user/eval123/fn--124");
        assert_eq!(demunge("my_ns$swap_BANG__STAR_"), "my-ns/swap!*");
    }

    #[test]
    #[ntest::timeout(100)]
    fn ratio_has_no_spacing() {
        let node = Node::tag(RATIO, Node::vector(vec![Node::integer(22), Node::integer(7)]));
        assert_eq!(text(&node), "22/7");
    }

    #[test]
    #[ntest::timeout(100)]
    fn malformed_ratio_is_an_error() {
        let node = Node::tag(RATIO, Node::vector(vec![Node::integer(22)]));
        let err = render(&Registry::builtin(), &node, RenderOptions::new()).unwrap_err();
        assert!(matches!(err, UnreplError::MalformedTag { ref tag, .. } if tag == RATIO));
    }

    #[test]
    #[ntest::timeout(100)]
    fn var_and_class_render_child_styled() {
        let node = Node::tag(VAR, Node::symbol("clojure.core/map"));
        let rendering = render(&Registry::builtin(), &node, RenderOptions::new()).unwrap();
        assert_eq!(
            rendering.ops,
            vec![RenderOp::Styled {
                text: "clojure.core/map".to_string(),
                style: Style::Var,
                help: None,
            }]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn function_object_shows_demunged_name_with_raw_help() {
        let node = object(Node::symbol("clojure.core$map"));
        let rendering = render(&Registry::builtin(), &node, RenderOptions::new()).unwrap();
        assert_eq!(
            rendering.ops,
            vec![RenderOp::Styled {
                text: "#function[clojure.core/map]".to_string(),
                style: Style::Function,
                help: Some("#object[clojure.core$map 0x1f2e3d clojure.core$map]".to_string()),
            }]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn generic_object_uses_rendered_repr() {
        let node = object(Node::string("state"));
        assert_eq!(text(&node), "#object[clojure.core$map 0x1f2e3d \"state\"]");
    }

    #[test]
    #[ntest::timeout(100)]
    fn image_object_renders_attachment_unless_muted() {
        let attachment = Node::tag(
            MIME,
            Node::map(vec![
                Node::keyword("content-type"),
                Node::string("image/png"),
                Node::keyword("content"),
                Node::tag("unrepl/base64", Node::string("iVBOR")),
            ]),
        );
        let node = object(Node::map(vec![
            Node::keyword("width"),
            Node::integer(640),
            Node::keyword("height"),
            Node::integer(480),
            Node::keyword("attachment"),
            attachment,
        ]));
        assert_eq!(
            text(&node),
            "#image[clojure.core$map 0x1f2e3d 640x480] #attachment[image/png]"
        );
        let muted = render(&Registry::builtin(), &node, RenderOptions::new().with_mute_ui(true))
            .unwrap()
            .text();
        assert_eq!(muted, "#image[clojure.core$map 0x1f2e3d 640x480]");
    }

    #[test]
    #[ntest::timeout(100)]
    fn broken_attachment_does_not_affect_siblings() {
        let node = Node::vector(vec![
            Node::integer(1),
            Node::tag(MIME, Node::map(vec![Node::keyword("content-type"), Node::string("image/png")])),
            Node::integer(2),
        ]);
        let rendering = render(&Registry::builtin(), &node, RenderOptions::new()).unwrap();
        assert_eq!(rendering.text(), "[1 2]");
        assert!(matches!(
            rendering.contained.as_slice(),
            [UnreplError::AttachmentDecode { media_type, .. }] if media_type == "image/png"
        ));
    }

    #[test]
    #[ntest::timeout(100)]
    fn tagged_string_places_elision_inside_quotes() {
        let get = Node::map(vec![Node::keyword("get"), Node::list(vec![Node::symbol("more")])]);
        let node = Node::tag(STRING, Node::vector(vec![Node::string("abc"), Node::tag(ELISION, get)]));
        let rendering = render(&Registry::builtin(), &node, RenderOptions::new()).unwrap();
        assert_eq!(rendering.text(), "\"abc...\"");
        assert_eq!(rendering.interactive().count(), 1);
    }

    #[test]
    #[ntest::timeout(100)]
    fn string_payload_must_start_with_a_leaf() {
        let node = Node::tag(
            STRING,
            Node::vector(vec![Node::vector(vec![Node::integer(1)]), Node::tag(ELISION, Node::nil())]),
        );
        for registry in [Registry::builtin(), Registry::builtin_stdout()] {
            let err = render(&registry, &node, RenderOptions::new()).unwrap_err();
            assert!(matches!(err, UnreplError::MalformedTag { ref tag, .. } if tag == STRING));
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn stdout_string_strips_quotes_and_decodes() {
        let node = Node::tag(
            STRING,
            Node::vector(vec![Node::string("abc\n"), Node::tag(ELISION, Node::nil())]),
        );
        let rendering = render(&Registry::builtin_stdout(), &node, RenderOptions::new()).unwrap();
        assert_eq!(rendering.text(), "abc\n");
        assert_eq!(
            rendering.ops,
            vec![RenderOp::Styled {
                text: "abc\n".to_string(),
                style: Style::Stdout,
                help: None
            }]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn lazy_error_shows_cause_and_inspect_affordance() {
        let error = Node::tag(
            "error",
            Node::map(vec![
                Node::keyword("cause"),
                Node::string("Divide by zero"),
                Node::keyword("via"),
                Node::vector(vec![]),
            ]),
        );
        let node = Node::tag(LAZY_ERROR, error.clone());
        let rendering = render(&Registry::builtin(), &node, RenderOptions::new()).unwrap();
        assert_eq!(rendering.text(), "#error \"Divide by zero\" [inspect]");
        assert_eq!(rendering.ops.last(), Some(&RenderOp::Inspect { error }));

        let muted = render(&Registry::builtin(), &node, RenderOptions::new().with_mute_ui(true)).unwrap();
        assert_eq!(muted.text(), "#error \"Divide by zero\"");
    }
}
