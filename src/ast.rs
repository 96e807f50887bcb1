/// The shape of a collection node, which decides its delimiters.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// A top-level sequence of forms. Has no delimiters.
    Root,
    List,
    Vector,
    Set,
    Map,
}

impl CollectionKind {
    /// Opening and closing delimiters as they appear on the wire.
    pub const fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            Self::Root => ("", ""),
            Self::List => ("(", ")"),
            Self::Vector => ("[", "]"),
            Self::Set => ("#{", "}"),
            Self::Map => ("{", "}"),
        }
    }
}

/// The decoded value of a leaf.
///
/// Keywords and symbols are stored without their sigil, so `:foo/bar` decodes
/// to `Keyword("foo/bar")`. Literals the reader does not decode further (big
/// integers, decimals, regexes...) are `Other`; only their text matters.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Character(char),
    Keyword(String),
    Symbol(String),
    Other,
}

/// A node of the tree produced by reading UNREPL wire text.
///
/// Leaves keep the exact source text they were read from; everything that
/// prints a leaf prints that text and never re-derives it from `value`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf {
        text: String,
        value: Scalar,
    },
    Collection {
        kind: CollectionKind,
        children: Vec<Node>,
        /// Children already carry their own whitespace, so no separator is
        /// synthesised between them.
        preserve_whitespace: bool,
    },
    Tag {
        tag: String,
        child: Box<Node>,
    },
}

impl Node {
    /// A leaf with reader-provided text.
    pub fn leaf<T: Into<String>>(text: T, value: Scalar) -> Self {
        Self::Leaf {
            text: text.into(),
            value,
        }
    }

    pub fn nil() -> Self {
        Self::leaf("nil", Scalar::Nil)
    }

    pub fn boolean(value: bool) -> Self {
        Self::leaf(value.to_string(), Scalar::Boolean(value))
    }

    pub fn integer(value: i64) -> Self {
        Self::leaf(value.to_string(), Scalar::Integer(value))
    }

    pub fn float(value: f64) -> Self {
        Self::leaf(float_text(value), Scalar::Float(value))
    }

    /// A string leaf whose text is the quoted, escaped form of `value`.
    pub fn string<S: AsRef<str>>(value: S) -> Self {
        let value = value.as_ref();
        Self::leaf(quote(value), Scalar::String(value.to_string()))
    }

    /// A keyword leaf. A leading `:` on `name` is optional.
    pub fn keyword<S: AsRef<str>>(name: S) -> Self {
        let name = strip_colon(name.as_ref());
        Self::leaf(format!(":{name}"), Scalar::Keyword(name.to_string()))
    }

    pub fn symbol<S: AsRef<str>>(name: S) -> Self {
        let name = name.as_ref();
        Self::leaf(name, Scalar::Symbol(name.to_string()))
    }

    pub const fn collection(kind: CollectionKind, children: Vec<Self>) -> Self {
        Self::Collection {
            kind,
            children,
            preserve_whitespace: false,
        }
    }

    pub const fn root(children: Vec<Self>) -> Self {
        Self::collection(CollectionKind::Root, children)
    }

    pub const fn list(children: Vec<Self>) -> Self {
        Self::collection(CollectionKind::List, children)
    }

    pub const fn vector(children: Vec<Self>) -> Self {
        Self::collection(CollectionKind::Vector, children)
    }

    pub const fn set(children: Vec<Self>) -> Self {
        Self::collection(CollectionKind::Set, children)
    }

    /// A map from adjacent key/value children.
    pub const fn map(children: Vec<Self>) -> Self {
        Self::collection(CollectionKind::Map, children)
    }

    pub fn tag<T: Into<String>>(tag: T, child: Self) -> Self {
        Self::Tag {
            tag: tag.into(),
            child: Box::new(child),
        }
    }

    /// Marks a collection as lexically preserved. No effect on other nodes.
    #[must_use]
    pub fn preserving_whitespace(mut self) -> Self {
        if let Self::Collection {
            preserve_whitespace,
            ..
        } = &mut self
        {
            *preserve_whitespace = true;
        }
        self
    }

    pub fn as_tag(&self) -> Option<(&str, &Self)> {
        match self {
            Self::Tag { tag, child } => Some((tag, child)),
            Self::Leaf { .. } | Self::Collection { .. } => None,
        }
    }

    pub const fn collection_kind(&self) -> Option<CollectionKind> {
        match self {
            Self::Collection { kind, .. } => Some(*kind),
            Self::Leaf { .. } | Self::Tag { .. } => None,
        }
    }

    /// Children of a collection; empty for leaves and tags.
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Collection { children, .. } => children,
            Self::Leaf { .. } | Self::Tag { .. } => &[],
        }
    }

    /// Children of a list or vector, the two sequential shapes the server uses
    /// for fixed-arity payloads.
    pub fn sequence(&self) -> Option<&[Self]> {
        match self.collection_kind() {
            Some(CollectionKind::List | CollectionKind::Vector) => Some(self.children()),
            Some(CollectionKind::Root | CollectionKind::Set | CollectionKind::Map) | None => None,
        }
    }

    pub const fn scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Leaf { value, .. } => Some(value),
            Self::Collection { .. } | Self::Tag { .. } => None,
        }
    }

    /// Source text of a leaf.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Leaf { text, .. } => Some(text),
            Self::Collection { .. } | Self::Tag { .. } => None,
        }
    }

    pub const fn is_nil(&self) -> bool {
        matches!(self.scalar(), Some(Scalar::Nil))
    }

    pub fn keyword_name(&self) -> Option<&str> {
        match self.scalar() {
            Some(Scalar::Keyword(name)) => Some(name),
            Some(_) | None => None,
        }
    }

    pub fn symbol_name(&self) -> Option<&str> {
        match self.scalar() {
            Some(Scalar::Symbol(name)) => Some(name),
            Some(_) | None => None,
        }
    }

    pub fn string_value(&self) -> Option<&str> {
        match self.scalar() {
            Some(Scalar::String(value)) => Some(value),
            Some(_) | None => None,
        }
    }

    /// Looks up the value stored under keyword `key` in a map node.
    pub fn map_get(&self, key: &str) -> Option<&Self> {
        if self.collection_kind() != Some(CollectionKind::Map) {
            return None;
        }
        let key = strip_colon(key);
        self.children()
            .chunks_exact(2)
            .find_map(|pair| match pair {
                [k, v] if k.keyword_name() == Some(key) => Some(v),
                [..] => None,
            })
    }

    /// A short noun for the node's shape, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Leaf { value, .. } => match value {
                Scalar::Nil => "nil",
                Scalar::Boolean(_) => "boolean",
                Scalar::Integer(_) => "integer",
                Scalar::Float(_) => "float",
                Scalar::String(_) => "string",
                Scalar::Character(_) => "character",
                Scalar::Keyword(_) => "keyword",
                Scalar::Symbol(_) => "symbol",
                Scalar::Other => "literal",
            },
            Self::Collection { kind, .. } => match kind {
                CollectionKind::Root => "root",
                CollectionKind::List => "list",
                CollectionKind::Vector => "vector",
                CollectionKind::Set => "set",
                CollectionKind::Map => "map",
            },
            Self::Tag { .. } => "tagged literal",
        }
    }
}

pub(crate) fn strip_colon(name: &str) -> &str {
    name.strip_prefix(':').unwrap_or(name)
}

/// Quotes and escapes `value` as a wire string literal.
pub(crate) fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len().saturating_add(2));
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub(crate) fn float_text(value: f64) -> String {
    if value.is_nan() {
        "##NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "##Inf".to_string()
        } else {
            "##-Inf".to_string()
        }
    } else {
        format!("{value:?}")
    }
}
