//! Seams to the collaborators outside this crate: the reader that parses
//! wire text and the transport that carries commands.

use crate::ast::Node;
use crate::error::ReadError;

/// The two logical connections to the server. Responses are ordered per
/// channel, but the channels interleave freely.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// User evaluations.
    Primary,
    /// Elision fetches, completion queries, print-setting updates, interrupts.
    Aux,
}

/// Correlates a sent command with the response the transport later delivers.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

/// Sends wire text to the server. Fire-and-forget: the response comes back
/// through [`crate::Session::deliver`] on the same event loop.
pub trait Transport {
    fn send(&mut self, channel: Channel, wire: String) -> RequestId;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, channel: Channel, wire: String) -> RequestId {
        (**self).send(channel, wire)
    }
}

/// Parses wire text into an AST, keeping the source text of every leaf.
pub trait Reader {
    /// # Errors
    /// Returns a [`ReadError`] if `wire` is not valid protocol syntax.
    fn read(&self, wire: &str) -> Result<Node, ReadError>;
}

impl<F> Reader for F
where
    F: Fn(&str) -> Result<Node, ReadError>,
{
    fn read(&self, wire: &str) -> Result<Node, ReadError> {
        self(wire)
    }
}
