//! Integration tests for weft.
//!
//! These tests exercise the public API from outside the crate: one shared tree,
//! several sessions, and full requests through the engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use weft::ajax::AjaxOperation;
use weft::component::ajax_control::REGISTERED;
use weft::component::{
    AjaxControl, AjaxControlData, ComponentExt, Container, Repeater, RepeaterData,
};
use weft::context::{Cx, Session, SessionSnapshot};
use weft::error::{ComponentError, LifecycleError, StateError};
use weft::lifecycle::{Engine, PaintFrame, Phase, Renderer};
use weft::model::Handle;
use weft::testing::fixtures::{Button, NumberData, NumberField, TextData, TextField};
use weft::testing::{MockEnvironment, MockRequest, OutlineRenderer, Pilot};
use weft::tree::ComponentTree;

fn single_field() -> (ComponentTree, Handle<()>, Handle<TextData>) {
    let mut tree = ComponentTree::new();
    let form = tree.insert(Container.with_id("form")).unwrap();
    let x = tree.insert_child(form, TextField.with_id("x")).unwrap();
    (tree, form, x)
}

// ---------------------------------------------------------------------------
// State overlay
// ---------------------------------------------------------------------------

#[test]
fn test_overlay_isolates_sessions() {
    let (tree, _, x) = single_field();
    let mut pilot = Pilot::new(tree);

    assert_eq!(pilot.state("s1", x).unwrap().data.value, "");
    pilot.post("s1", &[("x", "hi")]).unwrap();

    assert_eq!(pilot.state("s1", x).unwrap().data.value, "hi");
    assert_eq!(pilot.state("s2", x).unwrap().data.value, "");
    pilot.get("s2").unwrap();
    assert_eq!(pilot.state("s2", x).unwrap().data.value, "");
    assert_eq!(pilot.tree().default_state(x).unwrap().data.value, "");
}

#[test]
fn test_reads_never_create_session_models() {
    let (tree, _, _) = single_field();
    let mut pilot = Pilot::new(tree);
    pilot.get("s").unwrap();
    pilot.post("s", &[]).unwrap();
    assert_eq!(pilot.session("s").store().model_count(), 0);
}

#[test]
fn test_concrete_tidy_scenario() {
    let (tree, _, x) = single_field();
    let mut pilot = Pilot::new(tree);
    let tree = pilot.shared_tree();

    pilot.post("s1", &[("x", "hi")]).unwrap();
    assert_eq!(pilot.state("s1", x).unwrap().data.value, "hi");
    assert_eq!(pilot.state("s2", x).unwrap().data.value, "");

    {
        let session = pilot.session("s1");
        assert_eq!(session.tidy(&tree, x.node()), 0);
        let root = session.store().root();
        assert!(session.store().model(&tree, root, x.node()).unwrap().is_some());
    }

    pilot.post("s1", &[("x", "")]).unwrap();
    assert_eq!(pilot.session("s1").tidy(&tree, x.node()), 1);
    let session = pilot.session("s1");
    let root = session.store().root();
    assert!(session.store().model(&tree, root, x.node()).unwrap().is_none());
}

#[test]
fn test_tidy_twice_removes_nothing_more() {
    let (tree, form, x) = single_field();
    let mut pilot = Pilot::new(tree);
    let tree = pilot.shared_tree();
    {
        let session = pilot.session("s");
        session.state_mut(&tree, x).unwrap().data.value = "kept".into();
        session.state_mut(&tree, form).unwrap();
        session.state_mut(&tree, x).unwrap().attributes.set("hint", "x").unwrap();
    }

    let first = pilot.session("s").tidy(&tree, form.node());
    let second = pilot.session("s").tidy(&tree, form.node());
    assert_eq!((first, second), (1, 0));
    assert_eq!(pilot.session("s").store().model_count(), 1);
}

#[test]
fn test_custom_default_equivalence() {
    use weft::model::ModelData;

    /// Counts renders; the counter never makes a model worth keeping.
    #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Counted {
        label: String,
        renders: u32,
    }

    impl ModelData for Counted {
        fn matches_default(&self, default: &Self) -> bool {
            self.label == default.label
        }
    }

    struct Label;

    impl weft::Component for Label {
        type Model = Counted;

        fn type_name(&self) -> &'static str {
            "Label"
        }
    }

    let mut tree = ComponentTree::new();
    let label = tree.insert(Label.with_id("label")).unwrap();
    tree.lock();

    let mut session = Session::new();
    session.state_mut(&tree, label).unwrap().data.renders = 5;
    assert_eq!(session.tidy(&tree, label.node()), 1);

    session.state_mut(&tree, label).unwrap().data.label = "custom".into();
    assert_eq!(session.tidy(&tree, label.node()), 0);
}

// ---------------------------------------------------------------------------
// Locking
// ---------------------------------------------------------------------------

#[test]
fn test_lock_enforcement() {
    let (mut tree, form, x) = single_field();
    tree.default_state_mut(x).unwrap().data.value = "preset".into();
    tree.lock();

    let err = tree.default_state_mut(x).unwrap_err();
    assert!(matches!(err, StateError::LockedDefault { ref component } if component == "x"));
    assert!(matches!(
        tree.insert_child(form, TextField),
        Err(StateError::LockedStructure { .. })
    ));

    let mut session = Session::new();
    session.state_mut(&tree, x).unwrap().data.value = "mine".into();
    assert_eq!(session.state(&tree, x).unwrap().data.value, "mine");
    assert_eq!(tree.default_state(x).unwrap().data.value, "preset");
}

#[test]
fn test_attributes_fail_fast_on_unserializable_values() {
    let (tree, _, x) = single_field();
    let mut session = Session::new();
    let mut bad: HashMap<(u8, u8), u8> = HashMap::new();
    bad.insert((1, 2), 3);

    let model = session.state_mut(&tree, x).unwrap();
    let err = model.attributes.set("grid", &bad).unwrap_err();
    assert!(matches!(err, StateError::NotSerializable { ref key, .. } if key == "grid"));
    assert!(!model.attributes.contains("grid"));
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn test_traversal_order() {
    let mut tree = ComponentTree::new();
    let root = tree.insert(Container.with_id("root")).unwrap();
    let a = tree.insert_child(root, Container.with_id("a")).unwrap();
    tree.insert_child(a, TextField.with_id("c")).unwrap();
    tree.insert_child(a, TextField.with_id("d")).unwrap();
    tree.insert_child(root, TextField.with_id("b")).unwrap();
    let mut pilot = Pilot::new(tree);

    let outcome = pilot.post("s", &[]).unwrap().outcome;
    assert_eq!(outcome.collected, vec!["c", "d", "a", "b", "root"]);
    assert_eq!(outcome.prepared, vec!["root", "a", "c", "d", "b"]);
}

#[test]
fn test_deferred_actions_run_before_preparing() {
    let log: Arc<Mutex<Vec<String>>> = Arc::default();
    let mut tree = ComponentTree::new();
    let form = tree.insert(Container.with_id("form")).unwrap();
    let x = tree.insert_child(form, TextField.with_id("x")).unwrap();
    let seen = Arc::clone(&log);
    tree.insert_child(
        form,
        Button::new(move |cx| {
            // Runs after every component has taken its request data.
            let value = cx.state(x)?.data.value.clone();
            seen.lock().unwrap().push(format!("save {value}"));
            let nested = Arc::clone(&seen);
            cx.invoke_later(move |cx| {
                nested.lock().unwrap().push(format!("audit in {:?}", cx.phase()));
                Ok(())
            });
            Ok(())
        })
        .with_id("save"),
    )
    .unwrap();
    let mut pilot = Pilot::new(tree);

    let outcome = pilot.post("s", &[("save", ""), ("x", "draft")]).unwrap().outcome;
    assert_eq!(
        *log.lock().unwrap(),
        vec!["save draft".to_owned(), "audit in DeferredRunning".to_owned()]
    );
    assert_eq!(
        outcome.phases,
        vec![
            Phase::Collecting,
            Phase::Handling,
            Phase::DeferredRunning,
            Phase::Preparing,
            Phase::Painting,
            Phase::Idle,
        ]
    );
}

#[test]
fn test_disabled_component_resists_tampering() {
    let (tree, _, x) = single_field();
    let mut pilot = Pilot::new(tree);
    let tree = pilot.shared_tree();
    pilot.session("s").state_mut(&tree, x).unwrap().disabled = true;

    for forged in ["a", "b", "<script>"] {
        pilot.post("s", &[("x", forged)]).unwrap();
    }
    let model = pilot.state("s", x).unwrap();
    assert_eq!(model.data.value, "");
    assert!(model.disabled);
}

#[test]
fn test_non_handling_method_is_a_no_op() {
    let (tree, _, x) = single_field();
    let mut pilot = Pilot::new(tree);
    let exchange = pilot
        .request("s", MockRequest::get().param("x", "sneaky"))
        .unwrap();
    assert_eq!(exchange.outcome.phases, vec![Phase::Preparing, Phase::Painting, Phase::Idle]);
    assert_eq!(pilot.state("s", x).unwrap().data.value, "");
}

#[test]
fn test_unparseable_input_keeps_last_valid_value() {
    let mut tree = ComponentTree::new();
    let form = tree.insert(Container.with_id("form")).unwrap();
    let n = tree.insert_child(form, NumberField.with_id("n")).unwrap();
    let mut pilot = Pilot::new(tree);

    pilot.post("s", &[("n", "12")]).unwrap();
    let outcome = pilot.post("s", &[("n", "twelve")]).unwrap().outcome;
    assert!(outcome.changed.is_empty());
    assert_eq!(pilot.state("s", n).unwrap().data, NumberData { value: 12 });
}

#[test]
fn test_action_can_log_out() {
    let mut tree = ComponentTree::new();
    let form = tree.insert(Container.with_id("form")).unwrap();
    tree.insert_child(
        form,
        Button::new(|cx| {
            cx.logout();
            Ok(())
        })
        .with_id("logout"),
    )
    .unwrap();
    let mut pilot = Pilot::new(tree);
    assert!(!pilot.post("s", &[]).unwrap().logged_out);
    assert!(pilot.post("s", &[("logout", "")]).unwrap().logged_out);
}

#[test]
fn test_action_errors_do_not_fail_the_request() {
    let mut tree = ComponentTree::new();
    let form = tree.insert(Container.with_id("form")).unwrap();
    tree.insert_child(
        form,
        Button::new(|_| Err(ComponentError::application("payment declined"))).with_id("pay"),
    )
    .unwrap();
    let mut pilot = Pilot::new(tree);
    let exchange = pilot.post("s", &[("pay", "")]).unwrap();
    assert_eq!(exchange.outcome.action_errors.len(), 1);
    assert_eq!(exchange.outcome.action_errors[0].to_string(), "payment declined");
    assert!(!exchange.output.is_empty());
}

// ---------------------------------------------------------------------------
// Repeaters
// ---------------------------------------------------------------------------

fn rows_tree() -> (ComponentTree, Handle<RepeaterData>, Handle<TextData>) {
    let mut tree = ComponentTree::new();
    let page = tree.insert(Container.with_id("page")).unwrap();
    let rows = tree.insert_child(page, Repeater.with_id("rows")).unwrap();
    let name = tree.insert_child(rows, TextField.with_id("name")).unwrap();
    tree.default_state_mut(rows).unwrap().data.rows = vec!["1".into(), "2".into()];
    (tree, rows, name)
}

#[test]
fn test_rows_render_with_independent_state() {
    let (tree, _, name) = rows_tree();
    let mut pilot = Pilot::new(tree);
    let tree = pilot.shared_tree();

    let exchange = pilot.post("s", &[("name.2", "second")]).unwrap();
    insta::assert_snapshot!(exchange.output, @r"
    Container#page
      Repeater#rows
        TextField#name.1
        TextField#name.2
    ");

    let store = pilot.session("s").store();
    let (row1, _) = store.resolve_id(&tree, "name.1").unwrap();
    let (row2, _) = store.resolve_id(&tree, "name.2").unwrap();
    assert_eq!(store.state(&tree, row1, name).unwrap().data.value, "");
    assert_eq!(store.state(&tree, row2, name).unwrap().data.value, "second");
}

#[test]
fn test_disabling_one_row() {
    let (tree, _, name) = rows_tree();
    let mut pilot = Pilot::new(tree);
    let tree = pilot.shared_tree();
    pilot.get("s").unwrap();
    {
        let store = pilot.session("s").store_mut();
        let (row1, _) = store.resolve_id(&tree, "name.1").unwrap();
        store.state_mut(&tree, row1, name).unwrap().disabled = true;
    }

    let exchange = pilot
        .post("s", &[("name.1", "forged"), ("name.2", "fine")])
        .unwrap();
    assert_eq!(exchange.outcome.changed, vec!["name.2"]);
    insta::assert_snapshot!(exchange.output, @r"
    Container#page
      Repeater#rows
        TextField#name.1 [disabled]
        TextField#name.2
    ");
}

#[test]
fn test_row_action_writes_only_its_own_row() {
    let mut tree = ComponentTree::new();
    let page = tree.insert(Container.with_id("page")).unwrap();
    let rows = tree.insert_child(page, Repeater.with_id("rows")).unwrap();
    let note = tree.insert_child(rows, TextField.with_id("note")).unwrap();
    tree.insert_child(
        rows,
        Button::new(move |cx| {
            cx.state_mut(note)?.data.value = "flagged".into();
            Ok(())
        })
        .with_id("flag"),
    )
    .unwrap();
    tree.default_state_mut(rows).unwrap().data.rows = vec!["1".into(), "2".into()];
    let mut pilot = Pilot::new(tree);
    let tree = pilot.shared_tree();

    let exchange = pilot.post("s", &[("flag.2", "")]).unwrap();
    assert!(exchange.outcome.action_errors.is_empty());

    let session = pilot.session("s");
    let store = session.store();
    let (row1, _) = store.resolve_id(&tree, "note.1").unwrap();
    let (row2, _) = store.resolve_id(&tree, "note.2").unwrap();
    assert_eq!(store.state(&tree, row2, note).unwrap().data.value, "flagged");
    assert_eq!(store.state(&tree, row1, note).unwrap().data.value, "");
    assert_eq!(session.state(&tree, note).unwrap().data.value, "");
    assert!(store.model(&tree, store.root(), note.node()).unwrap().is_none());
    assert_eq!(store.get(row2).unwrap().model_count(), 1);
}

// ---------------------------------------------------------------------------
// Replication
// ---------------------------------------------------------------------------

#[test]
fn test_snapshot_moves_a_session_between_processes() {
    let (tree, _, name) = rows_tree();
    let mut pilot = Pilot::new(tree);
    let tree = pilot.shared_tree();
    pilot.post("s", &[("name.2", "second")]).unwrap();

    let json = serde_json::to_string(&pilot.session("s").snapshot(&tree).unwrap()).unwrap();
    let snapshot: SessionSnapshot = serde_json::from_str(&json).unwrap();
    *pilot.session("copy") = Session::restore(&tree, snapshot).unwrap();

    let store = pilot.session("copy").store();
    let (row2, _) = store.resolve_id(&tree, "name.2").unwrap();
    assert_eq!(store.state(&tree, row2, name).unwrap().data.value, "second");

    let exchange = pilot.post("copy", &[("name.1", "first")]).unwrap();
    assert_eq!(exchange.outcome.changed, vec!["name.1"]);
    let original = pilot.session("s").store();
    let (row1, _) = original.resolve_id(&tree, "name.1").unwrap();
    assert_eq!(original.state(&tree, row1, name).unwrap().data.value, "");
}

// ---------------------------------------------------------------------------
// AJAX
// ---------------------------------------------------------------------------

/// ```text
/// page
/// ├── a ── a_field
/// ├── b ── b_field
/// ├── c ── c_field
/// └── poll (AjaxControl)
/// ```
fn ajax_tree(data: AjaxControlData) -> (ComponentTree, Handle<AjaxControlData>) {
    let mut tree = ComponentTree::new();
    let page = tree.insert(Container.with_id("page")).unwrap();
    for (section, field) in [("a", "a_field"), ("b", "b_field"), ("c", "c_field")] {
        let section = tree.insert_child(page, Container.with_id(section)).unwrap();
        tree.insert_child(section, TextField.with_id(field)).unwrap();
    }
    let poll = tree.insert_child(page, AjaxControl.with_id("poll")).unwrap();
    tree.default_state_mut(poll).unwrap().data = data;
    (tree, poll)
}

#[test]
fn test_ajax_paints_exactly_the_targets() {
    let (tree, _) = ajax_tree(AjaxControlData {
        targets: vec!["a".into(), "b".into(), "a".into()],
        ..AjaxControlData::default()
    });
    let mut pilot = Pilot::new(tree);

    pilot.get("s").unwrap();
    let exchange = pilot.ajax("s", "poll", &[("b_field", "typed")]).unwrap();
    assert_eq!(exchange.outcome.trigger.as_deref(), Some("poll"));
    insta::assert_snapshot!(exchange.output, @r"
    Container#a
      TextField#a_field
    Container#b
      TextField#b_field
    ");
}

#[test]
fn test_ajax_trigger_must_be_registered_per_session() {
    let (tree, _) = ajax_tree(AjaxControlData::default());
    let mut pilot = Pilot::new(tree);

    pilot.get("s1").unwrap();
    let exchange = pilot.ajax("s2", "poll", &[]).unwrap();
    assert!(exchange.outcome.ignored);
    assert!(exchange.output.is_empty());

    // A control without targets repaints itself.
    let exchange = pilot.ajax("s1", "poll", &[]).unwrap();
    assert_eq!(exchange.output, "AjaxControl#poll\n");
}

#[test]
fn test_load_count_stops_registration() {
    #[derive(Default)]
    struct Recorder {
        registered: Vec<bool>,
    }

    impl Renderer for Recorder {
        fn render(&mut self, cx: &Cx<'_>, _frame: &PaintFrame) -> Result<(), ComponentError> {
            let poll = cx
                .tree()
                .find_by_id("poll")
                .ok_or_else(|| ComponentError::application("no poll"))?;
            let flag = cx
                .request_scratch_in(cx.current_context(), poll)
                .and_then(|scratch| scratch.get::<bool>(REGISTERED).copied());
            self.registered.extend(flag);
            Ok(())
        }
    }

    let (mut tree, _) = ajax_tree(AjaxControlData {
        load_count: Some(2),
        delay_ms: 0,
        ..AjaxControlData::default()
    });
    tree.lock();
    let engine = Engine::default();
    let mut session = Session::new();
    let mut recorder = Recorder::default();

    let mut send = |request: MockRequest| {
        let mut request = request;
        engine
            .serve(&tree, &mut session, &mut request, &mut recorder)
            .unwrap()
    };
    send(MockRequest::get());
    send(MockRequest::post().param("wc_ajax", "poll"));
    send(MockRequest::post().param("wc_ajax", "poll"));

    assert_eq!(recorder.registered, vec![true, true, false]);
    assert_eq!(session.operations().fire_count("poll"), 2);
    let operation = session.operations().get("poll").unwrap();
    assert_eq!(operation.policy().load_count, Some(2));
    assert_eq!(operation.policy().delay(), None);
}

#[test]
fn test_container_replace_swaps_in_hidden_content() {
    let mut tree = ComponentTree::new();
    let page = tree.insert(Container.with_id("page")).unwrap();
    let drawer = tree.insert_child(page, Container.with_id("drawer")).unwrap();
    tree.insert_child(drawer, TextField.with_id("details")).unwrap();
    tree.insert_child(page, Container.with_id("open")).unwrap();
    tree.default_state_mut(drawer).unwrap().visible = false;
    let mut pilot = Pilot::new(tree);

    pilot
        .session("s")
        .operations_mut()
        .register(AjaxOperation::replace_content("open", "dialog_body", "details"));
    let exchange = pilot.ajax("s", "open", &[]).unwrap();
    insta::assert_snapshot!(exchange.output, @r"
    @dialog_body
    TextField#details
    ");
}

#[test]
fn test_follow_up_url_uses_environment() {
    let (mut tree, poll) = ajax_tree(AjaxControlData::default());
    tree.lock();
    let mut session = Session::new();
    session
        .store_mut()
        .set_environment(Arc::new(MockEnvironment::new("/app").with_hidden("step", "4")));

    struct UrlProbe(Option<String>, Handle<AjaxControlData>);

    impl Renderer for UrlProbe {
        fn render(&mut self, cx: &Cx<'_>, _frame: &PaintFrame) -> Result<(), ComponentError> {
            self.0 = cx.ajax_url(self.1)?;
            Ok(())
        }
    }

    let mut probe = UrlProbe(None, poll);
    Engine::default()
        .serve(&tree, &mut session, &mut MockRequest::get(), &mut probe)
        .unwrap();
    assert_eq!(probe.0.as_deref(), Some("/app?step=4&wc_ajax=poll"));
}

#[test]
fn test_session_reset_forgets_operations() {
    let (tree, _) = ajax_tree(AjaxControlData::default());
    let mut pilot = Pilot::new(tree);
    pilot.get("s").unwrap();
    assert_eq!(pilot.session("s").operations().len(), 1);

    pilot.session("s").reset();
    assert!(pilot.ajax("s", "poll", &[]).unwrap().outcome.ignored);
}

// ---------------------------------------------------------------------------
// Sharing
// ---------------------------------------------------------------------------

#[test]
fn test_one_tree_serves_concurrent_sessions() {
    let (mut tree, _, x) = single_field();
    tree.lock();
    let tree = Arc::new(tree);

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let tree = Arc::clone(&tree);
            std::thread::spawn(move || {
                let mut session = Session::new();
                let value = format!("user{i}");
                let mut request = MockRequest::post().param("x", &value);
                let mut renderer = OutlineRenderer::new();
                Engine::default()
                    .serve(&tree, &mut session, &mut request, &mut renderer)
                    .unwrap();
                session.state(&tree, x).unwrap().data.value.clone()
            })
        })
        .collect();

    let values: Vec<String> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    assert_eq!(values, vec!["user0", "user1", "user2", "user3"]);
    assert_eq!(tree.default_state(x).unwrap().data.value, "");
}

#[test]
fn test_paint_frame_lists_instances() {
    let (tree, _, _) = single_field();
    let mut pilot = Pilot::new(tree);
    let exchange = pilot.get("s").unwrap();
    assert_eq!(exchange.outcome.painted, vec!["form", "x"]);
    assert!(PaintFrame::default().is_empty());
}

#[test]
fn test_render_failure_is_reported() {
    struct Broken;

    impl Renderer for Broken {
        fn render(&mut self, _cx: &Cx<'_>, _frame: &PaintFrame) -> Result<(), ComponentError> {
            Err(ComponentError::application("template missing"))
        }
    }

    let (mut tree, _, _) = single_field();
    tree.lock();
    let mut session = Session::new();
    let err = Engine::default()
        .serve(&tree, &mut session, &mut MockRequest::get(), &mut Broken)
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Render { ref message } if message == "template missing"));
}
