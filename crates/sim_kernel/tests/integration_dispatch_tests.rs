mod support;

use sim_kernel::component::Component;
use sim_kernel::environment::Environment;
use sim_kernel::error::SimError;
use sim_kernel::event::{EventSpec, NamedRef, TopicId};

use support::components::{delivery_log, heard_by, Probe};

const TOPIC_X: TopicId = TopicId::new("X");
const TOPIC_Y: TopicId = TopicId::new("Y");

#[test]
fn broadcast_reaches_only_subscribers_and_is_logged_once() {
    let heard = delivery_log();
    let a = Probe::new("a", &[TOPIC_X], heard.clone());
    let b = Probe::new("b", &[], heard.clone());

    let mut env = Environment::new();
    env.attach(vec![Box::new(a), Box::new(b)]);
    env.emit(None, EventSpec::new(TOPIC_X).with_delay(5.0))
        .expect("emit");
    env.run(100.0).expect("run");

    let a_heard = heard_by(&heard, "a");
    assert_eq!(a_heard.len(), 1);
    assert_eq!(a_heard[0].topic, Some("X"));
    assert_eq!(a_heard[0].time, 5.0);
    assert!(heard_by(&heard, "b").is_empty());

    let records = env.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].topic, "X");
    assert_eq!(records[0].sim_time, 5.0);
}

#[test]
fn broadcast_invokes_subscribers_in_registration_order() {
    let heard = delivery_log();
    let first = Probe::new("first", &[TOPIC_X], heard.clone());
    let second = Probe::new("second", &[TOPIC_X], heard.clone());
    let third = Probe::new("third", &[TOPIC_X], heard.clone());

    let mut env = Environment::new();
    env.attach(vec![Box::new(first), Box::new(second), Box::new(third)]);
    env.emit(None, EventSpec::new(TOPIC_X)).expect("emit");
    env.run(1.0).expect("run");

    let listeners: Vec<_> = heard
        .borrow()
        .iter()
        .map(|delivery| delivery.listener.clone())
        .collect();
    assert_eq!(listeners, vec!["first", "second", "third"]);
}

#[test]
fn targeted_timeout_fires_at_delay_and_reaches_only_the_target() {
    let heard = delivery_log();
    let c = Probe::new("c", &[TOPIC_X], heard.clone());
    let bystander = Probe::new("bystander", &[TOPIC_X], heard.clone());
    let c_id = c.id();

    let mut env = Environment::new();
    env.attach(vec![Box::new(c), Box::new(bystander)]);
    env.emit(
        None,
        EventSpec::new(TOPIC_X).with_target(c_id).with_delay(10.0),
    )
    .expect("emit");
    env.run(100.0).expect("run");

    let c_heard = heard_by(&heard, "c");
    assert_eq!(c_heard.len(), 1);
    assert_eq!(c_heard[0].time, 10.0);
    assert!(
        heard_by(&heard, "bystander").is_empty(),
        "single-target events bypass topic subscribers"
    );
}

#[test]
fn unknown_target_aborts_at_resolution_time() {
    let heard = delivery_log();
    let a = Probe::new("a", &[], heard.clone());

    let mut env = Environment::new();
    env.attach(vec![Box::new(a)]);
    let stranger = uuid::Uuid::new_v4();
    env.emit(None, EventSpec::new(TOPIC_X).with_target(stranger))
        .expect("emit");

    let err = env.run(10.0).expect_err("unknown target is fatal");
    assert!(matches!(err, SimError::UnknownTarget(id) if id == stranger));
}

#[test]
fn negative_delay_fails_at_construction_and_never_reaches_the_log() {
    let heard = delivery_log();
    let a = Probe::new("a", &[TOPIC_X], heard.clone());

    let mut env = Environment::new();
    env.attach(vec![Box::new(a)]);
    let err = env
        .emit(None, EventSpec::new(TOPIC_X).with_delay(-3.0))
        .expect_err("negative delay");
    assert!(matches!(err, SimError::InvalidDelay(d) if d == -3.0));

    env.run(10.0).expect("run");
    assert!(env.records().is_empty());
    assert!(heard.borrow().is_empty());
}

#[test]
fn late_subscription_changes_delivery_of_pending_broadcasts() {
    let heard = delivery_log();
    let early = Probe::new("early", &[TOPIC_X], heard.clone());
    let late = Probe::new("late", &[], heard.clone());
    let (early_id, late_id) = (early.id(), late.id());

    let mut env = Environment::new();
    env.attach(vec![Box::new(early), Box::new(late)]);
    env.emit(None, EventSpec::new(TOPIC_X).with_delay(5.0))
        .expect("emit");

    // Resolution happens at fire time, so flipping subscriptions while the
    // event is still queued changes who hears it.
    let registry = env.registry_mut().expect("attached");
    assert!(registry.subscribe(late_id, TOPIC_X));
    assert!(registry.unsubscribe(early_id, TOPIC_X));

    env.run(10.0).expect("run");
    assert!(heard_by(&heard, "early").is_empty());
    assert_eq!(heard_by(&heard, "late").len(), 1);
}

#[test]
fn events_fire_in_time_priority_sequence_order() {
    let heard = delivery_log();
    let a = Probe::new("a", &[TOPIC_X, TOPIC_Y], heard.clone());

    let mut env = Environment::new();
    env.attach(vec![Box::new(a)]);
    // Same fire time, same priority: schedule order must win.
    env.emit(None, EventSpec::new(TOPIC_Y).with_delay(7.0))
        .expect("emit");
    env.emit(None, EventSpec::new(TOPIC_X).with_delay(7.0))
        .expect("emit");
    env.emit(None, EventSpec::new(TOPIC_X).with_delay(2.0))
        .expect("emit");
    env.run(100.0).expect("run");

    let observed: Vec<_> = heard
        .borrow()
        .iter()
        .map(|delivery| (delivery.time, delivery.topic))
        .collect();
    assert_eq!(
        observed,
        vec![(2.0, Some("X")), (7.0, Some("Y")), (7.0, Some("X"))]
    );

    let sequences: Vec<_> = heard
        .borrow()
        .iter()
        .map(|delivery| delivery.sequence)
        .collect();
    let mut by_key: Vec<_> = heard
        .borrow()
        .iter()
        .map(|delivery| (delivery.time, delivery.sequence))
        .collect();
    by_key.sort_by(|lhs, rhs| lhs.partial_cmp(rhs).expect("finite keys"));
    let sorted: Vec<_> = by_key.into_iter().map(|(_, seq)| seq).collect();
    assert_eq!(sequences, sorted, "equal-time events fire in schedule order");
}

#[test]
fn update_state_is_idempotent_and_broadcasts_state_change() {
    use sim_kernel::component::ComponentMeta;
    use sim_kernel::environment::SimContext;
    use sim_kernel::event::Event;

    // Flips to "Busy" on the first X it hears, including repeats: the second
    // identical update must not produce a second STATE_CHANGE record.
    #[derive(Debug)]
    struct Flipper {
        meta: ComponentMeta,
    }

    impl Component for Flipper {
        fn meta(&self) -> &ComponentMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut ComponentMeta {
            &mut self.meta
        }

        fn listen(&mut self, event: &Event, ctx: &mut SimContext) -> Result<(), SimError> {
            if event.topic() == Some(TOPIC_X) {
                self.update_state(ctx, "Busy", Some(NamedRef::Literal("floor".to_string())))?;
            }
            Ok(())
        }
    }

    let flipper = Flipper {
        meta: ComponentMeta::new("flipper", [TOPIC_X]),
    };

    let mut env = Environment::new();
    env.attach(vec![Box::new(flipper)]);
    env.emit(None, EventSpec::new(TOPIC_X).with_delay(1.0))
        .expect("emit");
    env.emit(None, EventSpec::new(TOPIC_X).with_delay(2.0))
        .expect("emit");
    env.run(10.0).expect("run");

    let state_changes: Vec<_> = env
        .records()
        .iter()
        .filter(|record| record.topic == "STATE_CHANGE")
        .collect();
    assert_eq!(state_changes.len(), 1);
    assert_eq!(state_changes[0].parent.as_deref(), Some("flipper"));
    assert_eq!(state_changes[0].component_state.as_deref(), Some("Busy"));
    assert_eq!(state_changes[0].value, serde_json::json!("floor"));
}
