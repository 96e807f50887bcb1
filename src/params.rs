use std::collections::BTreeMap;

use crate::ast::{CollectionKind, Node, strip_colon};

/// A value bound to a template parameter.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Keyword name, without the leading `:`.
    Keyword(String),
    Symbol(String),
    List(Vec<Value>),
    Vector(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    /// An already-built AST fragment, spliced as is.
    Node(Node),
}

impl Value {
    pub fn keyword<S: AsRef<str>>(name: S) -> Self {
        Self::Keyword(strip_colon(name.as_ref()).to_string())
    }

    pub fn symbol<S: Into<String>>(name: S) -> Self {
        Self::Symbol(name.into())
    }

    /// The AST fragment standing for this value, with canonical source text
    /// on every leaf.
    pub fn to_node(&self) -> Node {
        match self {
            Self::Nil => Node::nil(),
            Self::Boolean(b) => Node::boolean(*b),
            Self::Integer(i) => Node::integer(*i),
            Self::Float(f) => Node::float(*f),
            Self::String(s) => Node::string(s),
            Self::Keyword(k) => Node::keyword(k),
            Self::Symbol(s) => Node::symbol(s),
            Self::List(items) => Node::collection(CollectionKind::List, nodes(items)),
            Self::Vector(items) => Node::collection(CollectionKind::Vector, nodes(items)),
            Self::Set(items) => Node::collection(CollectionKind::Set, nodes(items)),
            Self::Map(entries) => Node::map(
                entries
                    .iter()
                    .flat_map(|(k, v)| [k.to_node(), v.to_node()])
                    .collect(),
            ),
            Self::Node(node) => node.clone(),
        }
    }
}

fn nodes(items: &[Value]) -> Vec<Node> {
    items.iter().map(Value::to_node).collect()
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Node> for Value {
    fn from(value: Node) -> Self {
        Self::Node(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Nil, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::Vector(value.into_iter().map(Into::into).collect())
    }
}

/// Values for the `#unrepl/param` placeholders of a template, keyed by
/// keyword name.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params {
    data: BTreeMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` (with or without its leading `:`) to `value`.
    pub fn insert<N: AsRef<str>, V: Into<Value>>(&mut self, name: N, value: V) -> &mut Self {
        self.data
            .insert(strip_colon(name.as_ref()).to_string(), value.into());
        self
    }

    pub fn get<N: AsRef<str>>(&self, name: N) -> Option<&Value> {
        self.data.get(strip_colon(name.as_ref()))
    }

    pub fn contains<N: AsRef<str>>(&self, name: N) -> bool {
        self.data.contains_key(strip_colon(name.as_ref()))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The supplied keywords, `:`-prefixed, in name order.
    pub fn keywords(&self) -> Vec<String> {
        self.data.keys().map(|k| format!(":{k}")).collect()
    }
}

impl<N: AsRef<str>, V: Into<Value>> FromIterator<(N, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}
