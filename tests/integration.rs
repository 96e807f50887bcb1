
use fixtures::{RecordingTransport, elision, end, ints, message, param, random_chain_length, read_string};
use pretty_assertions::assert_eq;
use unrepl_engine::{
    Channel, Node, Params, RenderOptions, Session, Template, Trigger, TriggerState, UnreplError, tags,
};

fn session() -> Session<RecordingTransport> {
    Session::new(RecordingTransport::default())
}

fn tagged_string(text: &str, tail: Node) -> Node {
    Node::tag(tags::STRING, Node::vector(vec![Node::string(text), tail]))
}

#[test]
#[ntest::timeout(100)]
fn test_nil_elision_ends_stdout_string() {
    let mut session = session();
    let triggers = session.render_stdout(&tagged_string("abc", end())).unwrap();
    assert!(triggers.is_empty());
    assert_eq!(session.text(), "abc");
    assert!(session.transport().sent.is_empty());
}

#[test]
#[ntest::timeout(100)]
fn test_string_elision_fetches_and_splices_tail() {
    let mut session = session();
    let triggers = session.render_stdout(&tagged_string("abc", elision("s1"))).unwrap();
    assert_eq!(triggers.len(), 1, "one trigger for the elided tail");
    assert_eq!(session.text(), "abc...");

    let trigger = triggers[0];
    assert!(session.activate(trigger).unwrap());
    assert_eq!(session.transport().on(Channel::Aux), vec!["(unrepl/fetch :s1)"]);
    assert_eq!(
        session.trigger(trigger).map(Trigger::state),
        Some(TriggerState::Consumed)
    );

    let request = session.transport().last_request();
    session.deliver(request, &Node::string("def")).unwrap();
    assert_eq!(session.text(), "abcdef");

    assert!(!session.activate(trigger).unwrap(), "re-activation is a no-op");
    assert_eq!(session.transport().sent.len(), 1);
    assert_eq!(session.text(), "abcdef");
}

#[test]
#[ntest::timeout(100)]
fn test_quoted_string_tail_lands_inside_quotes() {
    let mut session = session();
    let triggers = session.render(&tagged_string("abc", elision("s1"))).unwrap();
    assert_eq!(session.text(), "\"abc...\"");

    session.activate(triggers[0]).unwrap();
    let request = session.transport().last_request();
    session.deliver_wire(&read_string, request, "\"def\"").unwrap();
    assert_eq!(session.text(), "\"abcdef\"");
}

#[test]
#[ntest::timeout(100)]
fn test_deliver_wire_reports_read_errors() {
    let mut session = session();
    let triggers = session.render(&Node::vector(vec![Node::integer(1), elision("v")])).unwrap();
    session.activate(triggers[0]).unwrap();
    let request = session.transport().last_request();

    let err = session.deliver_wire(&read_string, request, "[2 3]").unwrap_err();
    assert!(matches!(err, UnreplError::Read(_)));
    assert_eq!(session.text(), "[1 ...]", "placeholder stays on a failed read");
}

#[test]
#[ntest::timeout(100)]
fn test_collection_elisions_chain_without_bound() {
    let mut session = session();
    let mut triggers = session
        .render(&Node::vector(vec![Node::integer(0), elision("c0")]))
        .unwrap();
    let mut expected = String::from("[0");

    let links = random_chain_length();
    for link in 1..=links {
        assert_eq!(triggers.len(), 1, "each page leaves exactly one trigger");
        assert!(session.activate(triggers[0]).unwrap());
        let request = session.transport().last_request();

        let value = link as i64;
        let tail = if link == links {
            end()
        } else {
            elision(&format!("c{link}"))
        };
        triggers = session
            .deliver(request, &Node::vector(vec![Node::integer(value), tail]))
            .unwrap();
        expected.push_str(&format!(" {value}"));
    }
    expected.push(']');

    assert!(triggers.is_empty());
    assert_eq!(session.text(), expected);
    assert_eq!(session.transport().on(Channel::Aux).len(), links);
    assert!(session.unconsumed().is_empty());
}

#[test]
#[ntest::timeout(100)]
fn test_splice_survives_intervening_output() {
    let mut session = session();
    let mut children = ints(&[1, 2]);
    children.push(elision("late"));
    let triggers = session.render(&Node::vector(children)).unwrap();
    session.render(&Node::keyword("later")).unwrap();
    session.render(&Node::vector(ints(&[9]))).unwrap();
    assert_eq!(session.text(), "[1 2 ...]:later[9]");

    session.activate(triggers[0]).unwrap();
    let request = session.transport().last_request();
    session.deliver(request, &Node::vector(vec![Node::integer(3), end()])).unwrap();
    assert_eq!(session.text(), "[1 2 3]:later[9]");
}

#[test]
#[ntest::timeout(100)]
fn test_muted_session_never_fetches() {
    let mut session = session().with_options(RenderOptions::new().with_mute_ui(true));
    let triggers = session
        .render(&Node::vector(vec![Node::integer(1), elision("m")]))
        .unwrap();
    assert!(triggers.is_empty());
    assert_eq!(session.text(), "[1 ...]");
    assert_eq!(session.triggers().count(), 0);
    assert!(session.transport().sent.is_empty());
}

#[test]
#[ntest::timeout(100)]
fn test_unknown_trigger_and_stray_response_are_ignored() {
    let mut session = session();
    session.render(&Node::vector(ints(&[1]))).unwrap();
    assert!(!session.activate(unrepl_engine::TriggerId(42)).unwrap());
    assert!(
        session
            .deliver(unrepl_engine::RequestId(7), &Node::integer(2))
            .unwrap()
            .is_empty()
    );
    assert_eq!(session.text(), "[1]");
}

#[test]
#[ntest::timeout(100)]
fn test_failed_template_leaves_trigger_unconsumed() {
    let mut session = session();
    let bad = Node::tag(
        tags::ELISION,
        Node::map(vec![
            Node::keyword("get"),
            Node::list(vec![Node::symbol("fetch"), param("missing")]),
        ]),
    );
    let triggers = session.render(&Node::vector(vec![Node::integer(1), bad])).unwrap();

    let err = session.activate(triggers[0]).unwrap_err();
    assert!(matches!(err, UnreplError::MissingParameter { ref name, .. } if name == ":missing"));
    assert!(session.transport().sent.is_empty());
    assert_eq!(
        session.trigger(triggers[0]).map(Trigger::state),
        Some(TriggerState::Unconsumed)
    );
}

#[test]
#[ntest::timeout(100)]
fn test_inspect_expands_error_after_affordance() {
    let error = Node::tag(
        "error",
        Node::map(vec![
            Node::keyword("cause"),
            Node::string("Divide by zero"),
            Node::keyword("via"),
            Node::vector(vec![]),
        ]),
    );
    let mut session = session();
    let triggers = session.render(&Node::tag(tags::LAZY_ERROR, error)).unwrap();
    session.render(&Node::keyword("next")).unwrap();
    assert_eq!(session.text(), "#error \"Divide by zero\" [inspect]:next");

    assert!(session.inspect(triggers[0]).unwrap());
    assert_eq!(
        session.text(),
        "#error \"Divide by zero\" [inspect]\n#error {:cause \"Divide by zero\" :via []}:next"
    );
    assert!(!session.activate(triggers[0]).unwrap());
    assert!(session.transport().sent.is_empty(), "inspecting is local");
}

#[test]
#[ntest::timeout(100)]
fn test_contained_failures_become_notices() {
    let mut session = session();
    let broken = Node::tag(
        tags::MIME,
        Node::map(vec![Node::keyword("content-type"), Node::string("image/png")]),
    );
    session
        .render(&Node::vector(vec![Node::integer(1), broken, Node::integer(2)]))
        .unwrap();
    assert_eq!(session.text(), "[1 2]");

    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert!(matches!(notices[0].error, UnreplError::AttachmentDecode { .. }));
    assert!(session.notices().is_empty());
}

#[test]
#[ntest::timeout(100)]
fn test_eval_lifecycle_renders_value() {
    let mut session = session();
    let form = Template::new(Node::list(vec![Node::symbol("+"), param("a"), Node::integer(2)]));
    let mut params = Params::new();
    params.insert("a", 1);
    let id = session.submit_eval(&form, &params).unwrap();
    assert_eq!(session.transport().on(Channel::Primary), vec!["(+ 1 2)"]);

    session
        .handle_message(&message("started-eval", Node::map(vec![]), Some(1)))
        .unwrap();
    assert_eq!(session.pending(id).and_then(|pending| pending.group()), Some(1));

    session.handle_message(&message("out", Node::string("hi\n"), Some(1))).unwrap();
    session.handle_message(&message("eval", Node::integer(3), Some(1))).unwrap();
    assert_eq!(session.text(), "hi\n3");
    assert!(session.pending(id).is_none());
}

#[test]
#[ntest::timeout(100)]
fn test_interrupted_eval_discards_late_responses() {
    let mut session = session();
    let id = session
        .submit_eval(&Template::new(Node::list(vec![Node::symbol("loop")])), &Params::new())
        .unwrap();
    assert!(!session.interrupt(id).unwrap(), "no interrupt action before start");

    let interrupt = Node::list(vec![Node::symbol("unrepl/interrupt!"), param("id")]);
    let actions = Node::map(vec![Node::keyword("interrupt"), interrupt]);
    session
        .handle_message(&message(
            "started-eval",
            Node::map(vec![Node::keyword("actions"), actions]),
            Some(5),
        ))
        .unwrap();

    assert!(session.interrupt(id).unwrap());
    assert!(!session.interrupt(id).unwrap(), "interrupt is sent once");
    assert_eq!(session.transport().on(Channel::Aux), vec!["(unrepl/interrupt! 5)"]);
    assert!(session.is_interrupted(id));

    session.handle_message(&message("out", Node::string("tick"), Some(5))).unwrap();
    session.handle_message(&message("interrupted", Node::nil(), Some(5))).unwrap();
    session.handle_message(&message("eval", Node::integer(1), Some(5))).unwrap();
    assert_eq!(session.text(), "", "nothing from the interrupted evaluation is shown");
    assert!(session.pending(id).is_none());
}

#[test]
#[ntest::timeout(100)]
fn test_hello_actions_are_sent_on_aux() {
    let mut session = session();
    assert!(matches!(
        session.send_action("print-limits", &Params::new()),
        Err(UnreplError::MalformedTemplate { .. })
    ));

    let limits = Node::list(vec![Node::symbol("unrepl/set-limits"), param("unrepl.print/string-length")]);
    let hello = Node::map(vec![
        Node::keyword("actions"),
        Node::map(vec![Node::keyword("print-limits"), limits]),
    ]);
    session.handle_message(&message("hello", hello, None)).unwrap();

    let mut params = Params::new();
    params.insert("unrepl.print/string-length", 80);
    session.send_action(":print-limits", &params).unwrap();
    assert_eq!(session.transport().on(Channel::Aux), vec!["(unrepl/set-limits 80)"]);
}

#[test]
#[ntest::timeout(100)]
fn test_render_failure_in_message_becomes_notice() {
    let mut session = session();
    let value = Node::vector(vec![Node::integer(1), param("x")]);
    session.handle_message(&message("eval", value, None)).unwrap();
    assert_eq!(session.text(), "", "nothing is mounted on failure");
    assert!(matches!(
        session.take_notices().as_slice(),
        [notice] if matches!(notice.error, UnreplError::UnknownTag { .. })
    ));
}

#[test]
#[ntest::timeout(100)]
fn test_malformed_message_is_rejected() {
    let mut session = session();
    assert!(session.handle_message(&Node::integer(3)).is_err());
    session.handle_message(&message("bye", Node::nil(), None)).unwrap();
    session.handle_message(&message("prompt", Node::map(vec![]), None)).unwrap();
    assert_eq!(session.text(), "");
}
