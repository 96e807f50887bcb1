use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::ast::Node;
use crate::boundary::{Channel, Reader, RequestId, Transport};
use crate::elision::{ElisionKind, ElisionTrigger, InspectTrigger, Trigger, TriggerId, TriggerState};
use crate::error::{UnreplError, UnreplResult};
use crate::message::{GroupId, ServerMessage};
use crate::output::{Marker, OutputBuffer};
use crate::params::Params;
use crate::registry::Registry;
use crate::render::{RenderOp, RenderOptions, Rendering, Style, render, render_continuation};
use crate::template::Template;

/// A short, user-facing report of a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub error: UnreplError,
}

impl From<UnreplError> for Notice {
    fn from(error: UnreplError) -> Self {
        Self {
            message: error.to_string(),
            error,
        }
    }
}

/// Identifies an evaluation submitted through [`Session::submit_eval`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EvalId(pub u64);

/// An evaluation that has been sent and not yet answered.
#[derive(Debug, Clone)]
pub struct PendingEval {
    request: RequestId,
    group: Option<GroupId>,
    interrupt: Option<Template>,
}

impl PendingEval {
    pub const fn request(&self) -> RequestId {
        self.request
    }

    /// The server's group id, once the server has started evaluating.
    pub const fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub const fn interrupt(&self) -> Option<&Template> {
        self.interrupt.as_ref()
    }
}

/// The client-side state of one UNREPL connection: the output rendered so
/// far, the affordances in it, and the commands in flight.
///
/// Everything runs on the caller's event loop. Sending is fire-and-forget;
/// the caller hands responses back through [`Session::deliver`] and
/// [`Session::handle_message`].
#[derive(Debug)]
pub struct Session<T> {
    transport: T,
    registry: Arc<Registry>,
    stdout_registry: Arc<Registry>,
    options: RenderOptions,
    buffer: OutputBuffer,
    triggers: BTreeMap<TriggerId, Trigger>,
    next_trigger: u64,
    fetches: HashMap<RequestId, TriggerId>,
    evals: BTreeMap<EvalId, PendingEval>,
    next_eval: u64,
    unstarted: VecDeque<EvalId>,
    groups: HashMap<GroupId, EvalId>,
    interrupted: HashSet<EvalId>,
    actions: Option<Node>,
    notices: Vec<Notice>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self::with_registries(
            transport,
            Arc::new(Registry::builtin()),
            Arc::new(Registry::builtin_stdout()),
        )
    }

    pub fn with_registries(transport: T, registry: Arc<Registry>, stdout_registry: Arc<Registry>) -> Self {
        Self {
            transport,
            registry,
            stdout_registry,
            options: RenderOptions::default(),
            buffer: OutputBuffer::new(),
            triggers: BTreeMap::new(),
            next_trigger: 0,
            fetches: HashMap::new(),
            evals: BTreeMap::new(),
            next_eval: 0,
            unstarted: VecDeque::new(),
            groups: HashMap::new(),
            interrupted: HashSet::new(),
            actions: None,
            notices: Vec::new(),
        }
    }

    /// Default options for every render this session performs.
    #[must_use]
    pub const fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub const fn options(&self) -> RenderOptions {
        self.options
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub const fn buffer(&self) -> &OutputBuffer {
        &self.buffer
    }

    pub fn text(&self) -> String {
        self.buffer.text()
    }

    pub fn trigger(&self, id: TriggerId) -> Option<&Trigger> {
        self.triggers.get(&id)
    }

    pub fn triggers(&self) -> impl Iterator<Item = (TriggerId, &Trigger)> {
        self.triggers.iter().map(|(id, trigger)| (*id, trigger))
    }

    /// Triggers that can still be activated.
    pub fn unconsumed(&self) -> Vec<TriggerId> {
        self.triggers
            .iter()
            .filter(|(_, trigger)| trigger.state() == TriggerState::Unconsumed)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, error: UnreplError) {
        warn!(error = %error, "reporting failure to user");
        self.notices.push(error.into());
    }

    /// Renders `node` and appends it to the output.
    ///
    /// # Errors
    /// Any render failure. Nothing is appended in that case.
    pub fn render(&mut self, node: &Node) -> UnreplResult<Vec<TriggerId>> {
        let rendering = render(&self.registry, node, self.options)?;
        Ok(self.mount(None, rendering))
    }

    /// Renders captured `*out*` text and appends it to the output. Plain
    /// strings are shown decoded.
    ///
    /// # Errors
    /// Any render failure. Nothing is appended in that case.
    pub fn render_stdout(&mut self, node: &Node) -> UnreplResult<Vec<TriggerId>> {
        let rendering = match node.string_value() {
            Some(text) => Rendering {
                ops: vec![RenderOp::Styled {
                    text: text.to_string(),
                    style: Style::Stdout,
                    help: None,
                }],
                contained: Vec::new(),
            },
            None => render(&self.stdout_registry, node, self.options)?,
        };
        Ok(self.mount(None, rendering))
    }

    /// Puts `rendering` into the buffer, replacing the segment behind `at` or
    /// appending, and creates triggers for its interactive operations.
    fn mount(&mut self, at: Option<Marker>, rendering: Rendering) -> Vec<TriggerId> {
        let Rendering { ops, contained } = rendering;
        for error in contained {
            self.notify(error);
        }
        let interactive: Vec<Option<RenderOp>> = ops
            .iter()
            .map(|op| op.is_interactive().then(|| op.clone()))
            .collect();
        let markers = match at {
            Some(marker) => match self.buffer.replace(marker, ops) {
                Ok(markers) => markers,
                Err(error) => {
                    self.notify(error);
                    return Vec::new();
                }
            },
            None => self.buffer.append(ops),
        };
        self.register_triggers(markers.into_iter().zip(interactive))
    }

    fn register_triggers<I>(&mut self, segments: I) -> Vec<TriggerId>
    where
        I: IntoIterator<Item = (Marker, Option<RenderOp>)>,
    {
        let mut created = Vec::new();
        for (marker, op) in segments {
            let trigger = match op {
                Some(RenderOp::Elision { continuation, kind }) => Trigger::Elision(ElisionTrigger::new(
                    Template::new(continuation),
                    kind,
                    marker,
                    self.options.mute_ui,
                )),
                Some(RenderOp::Inspect { error }) => Trigger::Inspect(InspectTrigger::new(error, marker)),
                Some(RenderOp::Text(_) | RenderOp::Separator | RenderOp::Styled { .. }) | None => continue,
            };
            let id = TriggerId(self.next_trigger);
            self.next_trigger = self.next_trigger.wrapping_add(1);
            self.triggers.insert(id, trigger);
            created.push(id);
        }
        created
    }

    /// Activates a trigger. Returns false when there was nothing to do: the
    /// trigger is unknown or already consumed.
    ///
    /// An elision sends its continuation on the auxiliary channel and returns
    /// immediately; the fetched content is spliced in by [`Session::deliver`].
    /// An inspect affordance expands its error right after itself.
    ///
    /// # Errors
    /// A failure to instantiate the continuation (nothing is sent and the
    /// trigger stays unconsumed) or to render the error.
    pub fn activate(&mut self, id: TriggerId) -> UnreplResult<bool> {
        match self.triggers.get(&id) {
            None => {
                debug!(?id, "activation of unknown trigger ignored");
                Ok(false)
            }
            Some(trigger) if trigger.is_consumed() => {
                debug!(?id, "trigger already consumed");
                Ok(false)
            }
            Some(Trigger::Elision(elision)) => {
                let wire = elision.continuation().instantiate(&Params::new())?;
                self.consume(id);
                let request = self.transport.send(Channel::Aux, wire);
                debug!(?id, ?request, "fetching elided content");
                self.fetches.insert(request, id);
                Ok(true)
            }
            Some(Trigger::Inspect(_)) => self.inspect(id),
        }
    }

    /// Expands the error behind an inspect affordance right after it. Returns
    /// false if `id` is not an unconsumed inspect affordance.
    ///
    /// # Errors
    /// A failure to render the error. The affordance stays unconsumed.
    pub fn inspect(&mut self, id: TriggerId) -> UnreplResult<bool> {
        let Some(Trigger::Inspect(inspect)) = self.triggers.get(&id) else {
            return Ok(false);
        };
        if inspect.state() == TriggerState::Consumed {
            return Ok(false);
        }
        let marker = inspect.marker();
        let options = self.options.with_raise_on_missing_tags(false);
        let Rendering { mut ops, contained } = render(&self.registry, inspect.error(), options)?;
        ops.insert(0, RenderOp::Text("\n".to_string()));
        let interactive: Vec<Option<RenderOp>> = ops
            .iter()
            .map(|op| op.is_interactive().then(|| op.clone()))
            .collect();
        let markers = self.buffer.insert_after(marker, ops)?;
        self.consume(id);
        for error in contained {
            self.notify(error);
        }
        self.register_triggers(markers.into_iter().zip(interactive));
        Ok(true)
    }

    fn consume(&mut self, id: TriggerId) {
        if let Some(trigger) = self.triggers.get_mut(&id) {
            trigger.consume();
        }
    }

    /// Hands the response to an auxiliary request back to the session.
    ///
    /// Fetched elision content replaces the trigger's placeholder and the
    /// trigger is dropped; any new elision inside it becomes a new trigger.
    ///
    /// # Errors
    /// A render failure. The placeholder is left as it was.
    pub fn deliver(&mut self, request: RequestId, response: &Node) -> UnreplResult<Vec<TriggerId>> {
        let Some(id) = self.fetches.remove(&request) else {
            debug!(?request, "no pending fetch for response, ignoring");
            return Ok(Vec::new());
        };
        // The placeholder is replaced below, so the trigger goes with it.
        let Some(Trigger::Elision(elision)) = self.triggers.remove(&id) else {
            return Ok(Vec::new());
        };
        let marker = elision.marker();
        let options = RenderOptions::new()
            .with_mute_ui(elision.mute_ui)
            .with_raise_on_missing_tags(self.options.raise_on_missing_tags)
            .with_strict(self.options.strict);
        let registry = match elision.kind() {
            ElisionKind::String { stdout: true } => Arc::clone(&self.stdout_registry),
            ElisionKind::String { stdout: false } | ElisionKind::Collection => Arc::clone(&self.registry),
        };
        let rendering = render_continuation(&registry, response, elision.kind(), options)?;
        debug!(?id, ops = rendering.ops.len(), "splicing fetched content");
        Ok(self.mount(Some(marker), rendering))
    }

    /// Like [`Session::deliver`], for a response still in wire form.
    ///
    /// # Errors
    /// A read failure, or any error from [`Session::deliver`].
    pub fn deliver_wire<R: Reader + ?Sized>(
        &mut self,
        reader: &R,
        request: RequestId,
        wire: &str,
    ) -> UnreplResult<Vec<TriggerId>> {
        let node = reader.read(wire)?;
        self.deliver(request, &node)
    }

    /// Instantiates `template` and sends it on the primary channel.
    ///
    /// # Errors
    /// A template failure. Nothing is sent in that case.
    pub fn submit_eval(&mut self, template: &Template, params: &Params) -> UnreplResult<EvalId> {
        let wire = template.instantiate(params)?;
        let request = self.transport.send(Channel::Primary, wire);
        let id = EvalId(self.next_eval);
        self.next_eval = self.next_eval.wrapping_add(1);
        self.evals.insert(
            id,
            PendingEval {
                request,
                group: None,
                interrupt: None,
            },
        );
        self.unstarted.push_back(id);
        debug!(?id, ?request, "submitted evaluation");
        Ok(id)
    }

    pub fn pending(&self, id: EvalId) -> Option<&PendingEval> {
        self.evals.get(&id)
    }

    pub fn is_interrupted(&self, id: EvalId) -> bool {
        self.interrupted.contains(&id)
    }

    /// Records that the server started `id` under `group`, with the template
    /// that interrupts it.
    pub fn started(&mut self, id: EvalId, group: Option<GroupId>, interrupt: Option<Template>) {
        let Some(pending) = self.evals.get_mut(&id) else {
            return;
        };
        pending.group = group;
        pending.interrupt = interrupt;
        if let Some(group) = group {
            self.groups.insert(group, id);
        }
        self.unstarted.retain(|queued| *queued != id);
    }

    /// Sends the interrupt command for `id` on the auxiliary channel. From
    /// then on, responses for `id` are discarded.
    ///
    /// Returns false if `id` is not pending, already interrupted, or has no
    /// interrupt template yet.
    ///
    /// # Errors
    /// A template failure. Nothing is sent in that case.
    pub fn interrupt(&mut self, id: EvalId) -> UnreplResult<bool> {
        if self.interrupted.contains(&id) {
            return Ok(false);
        }
        let Some(pending) = self.evals.get(&id) else {
            return Ok(false);
        };
        let Some(template) = pending.interrupt.as_ref() else {
            warn!(?id, "evaluation has no interrupt action yet");
            return Ok(false);
        };
        let mut params = Params::new();
        if let Some(group) = pending.group {
            params.insert("id", group);
        }
        let wire = template.instantiate(&params)?;
        let request = self.transport.send(Channel::Aux, wire);
        debug!(?id, ?request, "sent interrupt");
        self.interrupted.insert(id);
        Ok(true)
    }

    /// Renders the terminal response of `id` and forgets it, unless `id` was
    /// interrupted, in which case the response is discarded.
    ///
    /// Returns whether anything was rendered.
    ///
    /// # Errors
    /// A render failure.
    pub fn complete(&mut self, id: EvalId, response: &Node) -> UnreplResult<bool> {
        let pending = self.evals.remove(&id);
        self.unstarted.retain(|queued| *queued != id);
        if self.interrupted.contains(&id) {
            debug!(?id, "discarding response of interrupted evaluation");
            return Ok(false);
        }
        if let Some(group) = pending.and_then(|pending| pending.group) {
            self.groups.remove(&group);
        }
        self.render(response)?;
        Ok(true)
    }

    fn eval_for(&self, group: Option<GroupId>) -> Option<EvalId> {
        group.and_then(|group| self.groups.get(&group).copied())
    }

    fn is_stale(&self, group: Option<GroupId>) -> bool {
        self.eval_for(group)
            .is_some_and(|id| self.interrupted.contains(&id))
    }

    /// Applies one message from the primary channel.
    ///
    /// Render failures become notices; the output already shown is kept.
    ///
    /// # Errors
    /// `node` is not a server message.
    pub fn handle_message(&mut self, node: &Node) -> UnreplResult<()> {
        let message = ServerMessage::classify(node)?;
        let outcome = match message {
            ServerMessage::Hello { actions } => {
                self.actions = actions.cloned();
                Ok(())
            }
            ServerMessage::Prompt { .. } => Ok(()),
            ServerMessage::StartedEval { actions, group } => {
                let interrupt = actions
                    .and_then(|actions| actions.map_get("interrupt"))
                    .cloned()
                    .map(Template::new);
                match self.unstarted.front().copied() {
                    Some(id) => self.started(id, group, interrupt),
                    None => debug!(?group, "evaluation started by another client"),
                }
                Ok(())
            }
            ServerMessage::Eval { value: response, group }
            | ServerMessage::Exception {
                error: response,
                group,
            } => match self.eval_for(group) {
                Some(id) => self.complete(id, response).map(|_| ()),
                None => self.render(response).map(|_| ()),
            },
            ServerMessage::Out { text, group } | ServerMessage::Err { text, group } => {
                if self.is_stale(group) {
                    debug!(?group, "discarding output of interrupted evaluation");
                    Ok(())
                } else {
                    self.render_stdout(text).map(|_| ())
                }
            }
            ServerMessage::Interrupted { group } => {
                if let Some(id) = self.eval_for(group) {
                    self.evals.remove(&id);
                    debug!(?id, "interrupt confirmed");
                }
                Ok(())
            }
            ServerMessage::Unknown { tag } => {
                debug!(tag, "ignoring unknown server message");
                Ok(())
            }
        };
        if let Err(error) = outcome {
            self.notify(error);
        }
        Ok(())
    }

    /// The template of a server action announced in `:hello`.
    pub fn action(&self, name: &str) -> Option<Template> {
        self.actions
            .as_ref()
            .and_then(|actions| actions.map_get(name))
            .cloned()
            .map(Template::new)
    }

    /// Instantiates a `:hello` action and sends it on the auxiliary channel.
    ///
    /// # Errors
    /// [`UnreplError::MalformedTemplate`] if the server announced no such
    /// action, or a template failure. Nothing is sent in either case.
    pub fn send_action(&mut self, name: &str, params: &Params) -> UnreplResult<RequestId> {
        let template = self.action(name).ok_or_else(|| UnreplError::MalformedTemplate {
            reason: format!("server announced no :{} action", crate::ast::strip_colon(name)),
        })?;
        let wire = template.instantiate(params)?;
        Ok(self.transport.send(Channel::Aux, wire))
    }
}
