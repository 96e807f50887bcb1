//! Classification of the `[tag payload group-id]` tuples the server streams on
//! the primary channel.

use crate::ast::{Node, Scalar};
use crate::error::{UnreplError, UnreplResult};

/// Identifies one evaluation on the server side.
pub type GroupId = i64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ServerMessage<'a> {
    /// Session greeting; `actions` maps action keywords to templates.
    Hello { actions: Option<&'a Node> },
    Prompt { payload: &'a Node },
    /// The server started evaluating the oldest form it has not answered yet.
    StartedEval {
        actions: Option<&'a Node>,
        group: Option<GroupId>,
    },
    Eval {
        value: &'a Node,
        group: Option<GroupId>,
    },
    Exception {
        error: &'a Node,
        group: Option<GroupId>,
    },
    Out {
        text: &'a Node,
        group: Option<GroupId>,
    },
    Err {
        text: &'a Node,
        group: Option<GroupId>,
    },
    /// Confirms an interrupt.
    Interrupted { group: Option<GroupId> },
    Unknown { tag: &'a str },
}

impl<'a> ServerMessage<'a> {
    /// # Errors
    /// [`UnreplError::MalformedTag`] if `node` is not a vector starting with a
    /// keyword and a payload.
    pub fn classify(node: &'a Node) -> UnreplResult<Self> {
        let malformed = |reason: &str| UnreplError::malformed_tag("message", reason);
        let items = node
            .sequence()
            .ok_or_else(|| malformed("server message must be a vector"))?;
        let (tag, payload, rest) = match items {
            [tag, payload, rest @ ..] => (tag, payload, rest),
            [_] | [] => return Err(malformed("server message needs a tag and a payload")),
        };
        let tag = tag
            .keyword_name()
            .ok_or_else(|| malformed("server message tag must be a keyword"))?;
        let group = rest.first().and_then(|id| match id.scalar() {
            Some(Scalar::Integer(id)) => Some(*id),
            Some(_) | None => None,
        });

        Ok(match tag {
            "hello" => Self::Hello {
                actions: payload.map_get("actions"),
            },
            "prompt" => Self::Prompt { payload },
            "started-eval" => Self::StartedEval {
                actions: payload.map_get("actions"),
                group,
            },
            "eval" => Self::Eval {
                value: payload,
                group,
            },
            "exception" => Self::Exception {
                error: payload.map_get("ex").unwrap_or(payload),
                group,
            },
            "out" => Self::Out {
                text: payload,
                group,
            },
            "err" => Self::Err {
                text: payload,
                group,
            },
            "interrupted" => Self::Interrupted { group },
            other => Self::Unknown { tag: other },
        })
    }

    pub const fn group(&self) -> Option<GroupId> {
        match self {
            Self::StartedEval { group, .. }
            | Self::Eval { group, .. }
            | Self::Exception { group, .. }
            | Self::Out { group, .. }
            | Self::Err { group, .. }
            | Self::Interrupted { group } => *group,
            Self::Hello { .. } | Self::Prompt { .. } | Self::Unknown { .. } => None,
        }
    }
}
