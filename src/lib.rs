//! Client-side core of the UNREPL protocol: turns the server's tagged-literal
//! AST into styled output with lazy, fetch-on-demand elisions, and tracks the
//! commands a client has in flight.
//!
//! ```
//! use unrepl_engine::{Node, Registry, RenderOptions, render};
//!
//! let node = Node::tag(
//!     "unrepl/string",
//!     Node::vector(vec![Node::string("abc"), Node::tag("unrepl/...", Node::nil())]),
//! );
//! let rendering = render(&Registry::builtin_stdout(), &node, RenderOptions::new()).unwrap();
//! assert_eq!(rendering.text(), "abc");
//! ```

mod ast;
mod boundary;
mod elision;
mod error;
mod message;
mod output;
mod params;
mod registry;
mod render;
mod session;
pub mod tags;
mod template;
mod wire;

// Public exports.
pub use ast::{CollectionKind, Node, Scalar};
pub use boundary::{Channel, Reader, RequestId, Transport};
pub use elision::{ElisionKind, ElisionTrigger, InspectTrigger, Trigger, TriggerId, TriggerState};
pub use error::{ReadError, UnreplError, UnreplResult};
pub use message::{GroupId, ServerMessage};
pub use output::{Marker, OutputBuffer};
pub use params::{Params, Value};
pub use registry::{Registry, TagRenderer};
pub use render::{
    ELLIPSIS, INSPECT_LABEL, RenderOp, RenderOptions, Rendering, Style, Unparser, render, render_continuation,
    render_to_text,
};
pub use session::{EvalId, Notice, PendingEval, Session};
pub use tags::demunge;
pub use template::Template;
pub use wire::write as write_wire;
