use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::ast::{CollectionKind, Node};
use crate::elision::ElisionKind;
use crate::error::{UnreplError, UnreplResult};
use crate::registry::Registry;
use crate::tags;
use crate::wire;

/// Text shown in place of elided content.
pub const ELLIPSIS: &str = "...";

/// Text shown for the inspect affordance of a lazy error.
pub const INSPECT_LABEL: &str = " [inspect]";

/// Options for one render call.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct RenderOptions {
    /// Omit the delimiters of the outermost collection.
    pub suppress_delimiters: bool,
    /// Plain text only: no elision triggers, no inspect affordances.
    pub mute_ui: bool,
    /// Fail with [`UnreplError::UnknownTag`] instead of falling back to
    /// `#tag child`.
    pub raise_on_missing_tags: bool,
    /// Treat malformed elision payloads as errors for their subtree rather
    /// than rendering a bare ellipsis.
    pub strict: bool,
}

impl RenderOptions {
    pub const fn new() -> Self {
        Self {
            suppress_delimiters: false,
            mute_ui: false,
            raise_on_missing_tags: false,
            strict: false,
        }
    }

    #[must_use]
    pub const fn with_suppress_delimiters(mut self, value: bool) -> Self {
        self.suppress_delimiters = value;
        self
    }

    #[must_use]
    pub const fn with_mute_ui(mut self, value: bool) -> Self {
        self.mute_ui = value;
        self
    }

    #[must_use]
    pub const fn with_raise_on_missing_tags(mut self, value: bool) -> Self {
        self.raise_on_missing_tags = value;
        self
    }

    #[must_use]
    pub const fn with_strict(mut self, value: bool) -> Self {
        self.strict = value;
        self
    }
}

/// How a presentation layer should decorate a styled span.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Style {
    Class,
    Var,
    Function,
    Object,
    Image,
    Attachment,
    Error,
    Stdout,
    Elision,
}

/// One step of rendered output.
///
/// Only `Elision` and `Inspect` are interactive; a presentation layer turns
/// them into buttons, everything else is text.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOp {
    Text(String),
    /// A synthetic space between two collection elements.
    Separator,
    Styled {
        text: String,
        style: Style,
        /// Hover/help text, e.g. the raw `#object[...]` form.
        help: Option<String>,
    },
    /// An unresolved "load more" placeholder.
    Elision {
        continuation: Node,
        kind: ElisionKind,
    },
    /// Expands a lazily rendered error in place when activated.
    Inspect { error: Node },
}

impl RenderOp {
    /// The text this operation contributes to plain output.
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) | Self::Styled { text, .. } => text,
            Self::Separator => " ",
            Self::Elision { .. } => ELLIPSIS,
            Self::Inspect { .. } => INSPECT_LABEL,
        }
    }

    pub const fn is_interactive(&self) -> bool {
        match self {
            Self::Elision { .. } | Self::Inspect { .. } => true,
            Self::Text(_) | Self::Separator | Self::Styled { .. } => false,
        }
    }
}

/// The result of a render call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rendering {
    pub ops: Vec<RenderOp>,
    /// Failures that were confined to a subtree and did not abort the render.
    pub contained: Vec<UnreplError>,
}

impl Rendering {
    pub fn text(&self) -> String {
        self.ops.iter().map(RenderOp::text).collect()
    }

    pub fn interactive(&self) -> impl Iterator<Item = &RenderOp> {
        self.ops.iter().filter(|op| op.is_interactive())
    }
}

/// Renders `node` into output operations.
///
/// # Errors
/// - [`UnreplError::UnknownTag`] for unregistered tags in strict-tag mode, and
///   always for `#unrepl/param`.
/// - Any non-contained error raised by a tag reader.
pub fn render(registry: &Registry, node: &Node, options: RenderOptions) -> UnreplResult<Rendering> {
    let mut unparser = Unparser::new(registry, options);
    unparser.render_top(node)?;
    Ok(unparser.finish())
}

/// Renders `node` to a single string.
///
/// # Errors
/// Same as [`render`].
pub fn render_to_text(
    registry: &Registry,
    node: &Node,
    include_ui: bool,
    raise_on_missing_tags: bool,
) -> UnreplResult<String> {
    let options = RenderOptions::new()
        .with_mute_ui(!include_ui)
        .with_raise_on_missing_tags(raise_on_missing_tags);
    Ok(render(registry, node, options)?.text())
}

/// Renders the response to an elision fetch so it can replace the elision's
/// placeholder.
///
/// Collection tails drop their delimiters and string tails drop their quotes,
/// so the spliced text continues the value already on screen.
///
/// # Errors
/// Same as [`render`].
pub fn render_continuation(
    registry: &Registry,
    node: &Node,
    kind: ElisionKind,
    options: RenderOptions,
) -> UnreplResult<Rendering> {
    match kind {
        ElisionKind::Collection => render(registry, node, options.with_suppress_delimiters(true)),
        ElisionKind::String { stdout } => {
            let mut unparser = Unparser::new(registry, options);
            tags::render_string_tail(&mut unparser, node, stdout)?;
            Ok(unparser.finish())
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct Checkpoint {
    ops: usize,
    /// Length of the trailing text run, if the last op was one.
    tail: Option<usize>,
}

/// The recursive tree walk. Tag readers receive it to emit output and to
/// render their descendants.
pub struct Unparser<'r> {
    registry: &'r Registry,
    options: RenderOptions,
    ops: Vec<RenderOp>,
    contained: Vec<UnreplError>,
}

impl<'r> Unparser<'r> {
    pub const fn new(registry: &'r Registry, options: RenderOptions) -> Self {
        Self {
            registry,
            options,
            ops: Vec::new(),
            contained: Vec::new(),
        }
    }

    pub const fn options(&self) -> RenderOptions {
        self.options
    }

    pub const fn mute_ui(&self) -> bool {
        self.options.mute_ui
    }

    pub const fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn push(&mut self, op: RenderOp) {
        self.ops.push(op);
    }

    /// Appends plain text, merging it into a preceding text run.
    pub fn text<S: AsRef<str>>(&mut self, text: S) {
        let text = text.as_ref();
        if text.is_empty() {
            return;
        }
        if let Some(RenderOp::Text(last)) = self.ops.last_mut() {
            last.push_str(text);
        } else {
            self.ops.push(RenderOp::Text(text.to_string()));
        }
    }

    pub fn styled<S: Into<String>>(&mut self, text: S, style: Style, help: Option<String>) {
        self.ops.push(RenderOp::Styled {
            text: text.into(),
            style,
            help,
        });
    }

    fn checkpoint(&self) -> Checkpoint {
        let tail = match self.ops.last() {
            Some(RenderOp::Text(last)) => Some(last.len()),
            Some(RenderOp::Separator | RenderOp::Styled { .. } | RenderOp::Elision { .. } | RenderOp::Inspect { .. })
            | None => None,
        };
        Checkpoint {
            ops: self.ops.len(),
            tail,
        }
    }

    /// Drops everything emitted since `checkpoint`, including text merged into
    /// the run that was last at the time.
    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.ops.truncate(checkpoint.ops);
        if self.ops.len() != checkpoint.ops {
            return;
        }
        if let (Some(len), Some(RenderOp::Text(last))) = (checkpoint.tail, self.ops.last_mut()) {
            last.truncate(len);
        }
    }

    fn emitted_since(&self, checkpoint: Checkpoint) -> bool {
        match self.ops.len().cmp(&checkpoint.ops) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => match (checkpoint.tail, self.ops.last()) {
                (Some(len), Some(RenderOp::Text(last))) => last.len() != len,
                (Some(_) | None, Some(_) | None) => false,
            },
        }
    }

    /// Removes a separator emitted in expectation of another element.
    pub fn trim_trailing_separator(&mut self) {
        if matches!(self.ops.last(), Some(RenderOp::Separator)) {
            self.ops.pop();
        }
    }

    fn render_top(&mut self, node: &Node) -> UnreplResult<()> {
        match node {
            Node::Collection {
                kind,
                children,
                preserve_whitespace,
            } if self.options.suppress_delimiters => {
                self.render_collection(*kind, children, *preserve_whitespace, false)
            }
            Node::Leaf { .. } | Node::Collection { .. } | Node::Tag { .. } => self.render_node(node),
        }
    }

    /// Renders a descendant. Nested collections always keep their delimiters.
    ///
    /// # Errors
    /// See [`render`].
    pub fn render_node(&mut self, node: &Node) -> UnreplResult<()> {
        match node {
            Node::Leaf { text, .. } => {
                self.text(text);
                Ok(())
            }
            Node::Collection {
                kind,
                children,
                preserve_whitespace,
            } => self.render_collection(*kind, children, *preserve_whitespace, true),
            Node::Tag { tag, child } => self.render_tag(node, tag, child),
        }
    }

    fn render_collection(
        &mut self,
        kind: CollectionKind,
        children: &[Node],
        preserve_whitespace: bool,
        delimited: bool,
    ) -> UnreplResult<()> {
        let (open, close) = kind.delimiters();
        if delimited {
            self.text(open);
        }
        let mut follows_content = false;
        for child in children {
            let separated = follows_content && !preserve_whitespace;
            if separated {
                self.push(RenderOp::Separator);
            }
            let checkpoint = self.checkpoint();
            self.render_node(child)?;
            if self.emitted_since(checkpoint) {
                follows_content = true;
            } else if separated {
                // A child that rendered nothing takes its separator with it.
                self.trim_trailing_separator();
            }
        }
        if delimited {
            self.text(close);
        }
        Ok(())
    }

    fn render_tag(&mut self, node: &Node, tag: &str, child: &Node) -> UnreplResult<()> {
        if tag == tags::PARAM {
            return Err(UnreplError::UnknownTag {
                tag: tag.to_string(),
            });
        }

        let registry = self.registry;
        match registry.lookup(tag, self.options.mute_ui) {
            Some(reader) => {
                let checkpoint = self.checkpoint();
                match reader.render(node, self) {
                    Ok(()) => Ok(()),
                    Err(err) if err.is_contained() => {
                        warn!(tag, error = %err, "dropping output of failed tagged literal");
                        self.rollback(checkpoint);
                        self.contained.push(err);
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
            None if self.options.raise_on_missing_tags => Err(UnreplError::UnknownTag {
                tag: tag.to_string(),
            }),
            None => {
                debug!(tag, "no reader registered, rendering tag generically");
                self.text(format!("#{tag} "));
                self.render_node(child)
            }
        }
    }

    /// Renders an elision payload: nil ends the value, a map with `:get`
    /// leaves a placeholder that can fetch the rest.
    ///
    /// # Errors
    /// [`UnreplError::MalformedElisionPayload`] in strict mode when the
    /// payload is neither.
    pub fn elision(&mut self, payload: &Node, kind: ElisionKind) -> UnreplResult<()> {
        if payload.is_nil() {
            if kind == ElisionKind::Collection {
                self.trim_trailing_separator();
            }
            return Ok(());
        }

        let Some(continuation) = payload.map_get("get") else {
            let err = UnreplError::MalformedElisionPayload {
                found: format!("{} {}", payload.kind_name(), wire::write(payload)),
            };
            if self.options.strict {
                return Err(err);
            }
            warn!(error = %err, "rendering malformed elision as a plain ellipsis");
            self.styled(ELLIPSIS, Style::Elision, None);
            return Ok(());
        };

        if self.options.mute_ui {
            self.styled(ELLIPSIS, Style::Elision, None);
        } else {
            self.push(RenderOp::Elision {
                continuation: continuation.clone(),
                kind,
            });
        }
        Ok(())
    }

    /// Renders `node` to plain text with the current options and no UI, for
    /// readers that fold a descendant into a single span.
    ///
    /// # Errors
    /// See [`render`].
    pub fn render_text(&mut self, node: &Node) -> UnreplResult<String> {
        let mut nested = Unparser::new(self.registry, self.options.with_mute_ui(true));
        nested.render_node(node)?;
        let Rendering { ops, contained } = nested.finish();
        self.contained.extend(contained);
        Ok(ops.iter().map(RenderOp::text).collect())
    }

    pub fn finish(self) -> Rendering {
        Rendering {
            ops: self.ops,
            contained: self.contained,
        }
    }
}
