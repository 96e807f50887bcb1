use tracing::debug;

use crate::ast::Node;
use crate::error::{UnreplError, UnreplResult};
use crate::params::Params;
use crate::tags;
use crate::wire;

/// A Template is an outgoing command authored as an AST, with
/// `#unrepl/param :name` placeholders where values are filled in.
///
/// Templates come either from the client itself or from the server, which
/// advertises its actions (interrupt, elision fetches, print limits...) as
/// templates. Instantiating a template never modifies it, so one template can
/// be instantiated any number of times.
///
/// # Example
///
/// ```
/// use unrepl_engine::{Node, Params, Template};
///
/// let template = Template::new(Node::list(vec![
///     Node::symbol("set-limit!"),
///     Node::tag("unrepl/param", Node::keyword("limit")),
/// ]));
///
/// let mut params = Params::new();
/// params.insert(":limit", 10);
///
/// assert_eq!(template.instantiate(&params).unwrap(), "(set-limit! 10)");
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    ast: Node,
}

impl Template {
    pub const fn new(ast: Node) -> Self {
        Self { ast }
    }

    pub const fn ast(&self) -> &Node {
        &self.ast
    }

    /// Collects the parameter keywords this template needs, `:`-prefixed, in
    /// the order they first appear.
    ///
    /// # Errors
    ///
    /// Returns [`UnreplError::MalformedTemplate`] if a placeholder does not wrap
    /// a keyword.
    pub fn parameters(&self) -> UnreplResult<Vec<String>> {
        let mut names = Vec::new();
        collect_parameters(&self.ast, &mut names)?;
        Ok(names)
    }

    /// The parameters this template needs that `params` does not supply.
    ///
    /// # Errors
    ///
    /// Same as [`Template::parameters`].
    pub fn missing(&self, params: &Params) -> UnreplResult<Vec<String>> {
        Ok(self
            .parameters()?
            .into_iter()
            .filter(|name| !params.contains(name))
            .collect())
    }

    /// Returns a new AST with every placeholder replaced by its bound value.
    ///
    /// # Errors
    ///
    /// * [`UnreplError::MissingParameter`] - A placeholder has no binding. No
    ///   partial result is produced.
    /// * [`UnreplError::MalformedTemplate`] - A placeholder does not wrap a
    ///   keyword.
    pub fn substitute(&self, params: &Params) -> UnreplResult<Node> {
        substitute_node(&self.ast, params)
    }

    /// Substitutes `params` and serialises the result to wire text.
    ///
    /// # Errors
    ///
    /// Same as [`Template::substitute`].
    pub fn instantiate(&self, params: &Params) -> UnreplResult<String> {
        let node = self.substitute(params)?;
        let wire = wire::write(&node);
        debug!(bytes = wire.len(), "instantiated command template");
        Ok(wire)
    }
}

impl From<Node> for Template {
    fn from(ast: Node) -> Self {
        Self::new(ast)
    }
}

/// Extracts the keyword a placeholder wraps.
fn param_name(child: &Node) -> UnreplResult<&str> {
    child
        .keyword_name()
        .ok_or_else(|| UnreplError::MalformedTemplate {
            reason: format!(
                "#{} must wrap a keyword, found {}",
                tags::PARAM,
                child.kind_name()
            ),
        })
}

fn collect_parameters(node: &Node, names: &mut Vec<String>) -> UnreplResult<()> {
    match node {
        Node::Leaf { .. } => {}
        Node::Collection { children, .. } => {
            for child in children {
                collect_parameters(child, names)?;
            }
        }
        Node::Tag { tag, child } if tag == tags::PARAM => {
            let name = format!(":{}", param_name(child)?);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Node::Tag { child, .. } => collect_parameters(child, names)?,
    }
    Ok(())
}

/// Depth-first rewrite of `node`, replacing placeholders.
fn substitute_node(node: &Node, params: &Params) -> UnreplResult<Node> {
    match node {
        Node::Leaf { .. } => Ok(node.clone()),
        Node::Collection {
            kind,
            children,
            preserve_whitespace,
        } => Ok(Node::Collection {
            kind: *kind,
            children: children
                .iter()
                .map(|child| substitute_node(child, params))
                .collect::<UnreplResult<_>>()?,
            preserve_whitespace: *preserve_whitespace,
        }),
        Node::Tag { tag, child } if tag == tags::PARAM => {
            let name = param_name(child)?;
            params
                .get(name)
                .map(crate::params::Value::to_node)
                .ok_or_else(|| UnreplError::MissingParameter {
                    name: format!(":{name}"),
                    supplied: params.keywords(),
                })
        }
        Node::Tag { tag, child } => Ok(Node::tag(tag.clone(), substitute_node(child, params)?)),
    }
}
