use crate::ast::Node;
use crate::output::Marker;
use crate::template::Template;

/// What kind of value an elision truncated. Decides how the fetched tail is
/// rendered before it is spliced in.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ElisionKind {
    /// Remaining elements of a collection.
    Collection,
    /// Remaining characters of a string.
    String { stdout: bool },
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TriggerId(pub u64);

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TriggerState {
    Unconsumed,
    Consumed,
}

/// A "load more" placeholder in the output, waiting to be activated.
#[derive(Debug, Clone)]
pub struct ElisionTrigger {
    pub(crate) continuation: Template,
    pub(crate) kind: ElisionKind,
    pub(crate) marker: Marker,
    pub(crate) mute_ui: bool,
    pub(crate) state: TriggerState,
}

impl ElisionTrigger {
    pub(crate) const fn new(
        continuation: Template,
        kind: ElisionKind,
        marker: Marker,
        mute_ui: bool,
    ) -> Self {
        Self {
            continuation,
            kind,
            marker,
            mute_ui,
            state: TriggerState::Unconsumed,
        }
    }

    pub const fn continuation(&self) -> &Template {
        &self.continuation
    }

    pub const fn kind(&self) -> ElisionKind {
        self.kind
    }

    /// Where the fetched content will be spliced.
    pub const fn marker(&self) -> Marker {
        self.marker
    }

    pub const fn state(&self) -> TriggerState {
        self.state
    }

    /// Moves to `Consumed`. Returns false if it already was.
    pub(crate) fn consume(&mut self) -> bool {
        let was_unconsumed = self.state == TriggerState::Unconsumed;
        self.state = TriggerState::Consumed;
        was_unconsumed
    }
}

/// The inspect affordance of a lazily rendered error.
#[derive(Debug, Clone)]
pub struct InspectTrigger {
    pub(crate) error: Node,
    pub(crate) marker: Marker,
    pub(crate) state: TriggerState,
}

impl InspectTrigger {
    pub(crate) const fn new(error: Node, marker: Marker) -> Self {
        Self {
            error,
            marker,
            state: TriggerState::Unconsumed,
        }
    }

    pub const fn error(&self) -> &Node {
        &self.error
    }

    pub const fn marker(&self) -> Marker {
        self.marker
    }

    pub const fn state(&self) -> TriggerState {
        self.state
    }
}

#[derive(Debug, Clone)]
pub enum Trigger {
    Elision(ElisionTrigger),
    Inspect(InspectTrigger),
}

impl Trigger {
    pub const fn state(&self) -> TriggerState {
        match self {
            Self::Elision(trigger) => trigger.state,
            Self::Inspect(trigger) => trigger.state,
        }
    }

    pub const fn marker(&self) -> Marker {
        match self {
            Self::Elision(trigger) => trigger.marker,
            Self::Inspect(trigger) => trigger.marker,
        }
    }

    pub fn is_consumed(&self) -> bool {
        self.state() == TriggerState::Consumed
    }

    pub(crate) fn consume(&mut self) -> bool {
        match self {
            Self::Elision(trigger) => trigger.consume(),
            Self::Inspect(trigger) => {
                let was_unconsumed = trigger.state == TriggerState::Unconsumed;
                trigger.state = TriggerState::Consumed;
                was_unconsumed
            }
        }
    }
}
