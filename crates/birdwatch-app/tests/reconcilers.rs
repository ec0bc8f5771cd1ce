mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use birdwatch_app::{ConfigReconciler, EnvironmentReconciler, OperatorError, PushStatus};
use birdwatch_core::{ConfigField, EditError, EnvironmentFactors, FactorField, RunConfig};
use support::{ScriptedRemote, zone};
use tokio::time::sleep;

#[tokio::test]
async fn config_edit_survives_failed_push() {
    let remote = Arc::new(ScriptedRemote::new());
    remote.script().config = RunConfig {
        simulation_speed: 100,
        world_size: 800,
        initial_birds: 20,
        obstacle_count: Some(4),
        resource_count: None,
    };
    let config = ConfigReconciler::new(Arc::clone(&remote));
    config.load().await.expect("config loads");

    remote.script().fail_push_config = true;
    let err = config
        .set_field(ConfigField::SimulationSpeed, 50)
        .await
        .expect_err("push refused");
    assert!(matches!(err, OperatorError::Remote(_)));

    assert_eq!(config.config().simulation_speed, 50, "local edit kept");
    let state = config.state();
    assert_eq!(state.config.remote.as_ref().map(|c| c.simulation_speed), Some(100));
    assert!(matches!(state.config.last_push, PushStatus::Failed(_)));
    assert!(state.config.is_dirty());

    let pushed = remote.script().pushed_configs.clone();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].simulation_speed, 50);
    assert_eq!(pushed[0].world_size, 800, "whole config is pushed");
    assert_eq!(pushed[0].obstacle_count, Some(4));
}

#[tokio::test(start_paused = true)]
async fn config_edit_is_visible_while_push_is_pending() {
    let remote = Arc::new(ScriptedRemote::new());
    let config = ConfigReconciler::new(Arc::clone(&remote));
    config.load().await.expect("config loads");
    let confirmed = config.config();
    remote.script().push_config_delay = Some(Duration::from_millis(500));

    let push = config.set_field(ConfigField::SimulationSpeed, 50);
    let observe = async {
        sleep(Duration::from_millis(100)).await;
        assert_eq!(remote.script().pushed_configs.len(), 1, "push in flight");
        assert_eq!(config.config().simulation_speed, 50);
        let state = config.state();
        assert_eq!(state.config.remote, Some(confirmed.clone()));
        assert_eq!(state.config.last_push, PushStatus::Never);
        assert!(state.config.is_dirty());
    };
    let (pushed, ()) = tokio::join!(push, observe);

    pushed.expect("push accepted");
    let state = config.state();
    assert_eq!(state.config.last_push, PushStatus::Confirmed);
    assert_eq!(state.config.remote.map(|c| c.simulation_speed), Some(50));
}

#[tokio::test]
async fn confirmed_push_updates_remote_slot() {
    let remote = Arc::new(ScriptedRemote::new());
    let config = ConfigReconciler::new(Arc::clone(&remote));
    config.load().await.expect("config loads");

    config
        .set_field(ConfigField::InitialBirds, 0)
        .await
        .expect("push accepted");
    let state = config.state();
    assert_eq!(state.config.last_push, PushStatus::Confirmed);
    assert_eq!(state.config.remote.map(|c| c.initial_birds), Some(0));
    assert_eq!(remote.script().config.initial_birds, 0);
}

#[tokio::test]
async fn invalid_config_input_changes_nothing() {
    let remote = Arc::new(ScriptedRemote::new());
    let config = ConfigReconciler::new(Arc::clone(&remote));
    config.load().await.expect("config loads");
    let before = config.config();

    let err = config
        .set_field_from_input("simulationSpeed", "fast")
        .await
        .expect_err("not a number");
    assert!(matches!(
        err,
        OperatorError::Edit(EditError::NotNumeric { .. })
    ));

    let err = config
        .set_field_from_input("worldSize", "0")
        .await
        .expect_err("world size must be positive");
    assert!(matches!(
        err,
        OperatorError::Edit(EditError::OutOfRange { .. })
    ));

    let err = config
        .set_field_from_input("gravity", "3")
        .await
        .expect_err("unknown field");
    assert!(matches!(err, OperatorError::Edit(EditError::UnknownField(_))));

    assert_eq!(config.config(), before);
    assert!(remote.script().pushed_configs.is_empty());
}

#[tokio::test]
async fn time_step_validated_then_pushed() {
    let remote = Arc::new(ScriptedRemote::new());
    let config = ConfigReconciler::new(Arc::clone(&remote));
    config.load_time_step().await.expect("time step loads");

    assert!(matches!(
        config.set_time_step(0).await,
        Err(OperatorError::Edit(_))
    ));
    config.set_time_step(4).await.expect("push accepted");
    assert_eq!(config.time_step().time_step, 4);
    assert_eq!(remote.script().time_step.time_step, 4);

    remote.script().fail_push_time_step = true;
    assert!(config.set_time_step(6).await.is_err());
    assert_eq!(config.time_step().time_step, 6);
}

#[tokio::test]
async fn saved_settings_replace_both_slots() {
    let remote = Arc::new(ScriptedRemote::new());
    let config = ConfigReconciler::new(Arc::clone(&remote));
    let saved = RunConfig {
        simulation_speed: 250,
        ..RunConfig::default()
    };

    config.adopt_saved(Some(saved.clone()), Some(3));
    let state = config.state();
    assert_eq!(state.config.local, saved);
    assert_eq!(state.config.remote, Some(saved));
    assert_eq!(state.time_step.local.time_step, 3);
    assert!(remote.script().pushed_configs.is_empty());
}

#[tokio::test]
async fn zone_selection_follows_known_ids() {
    let remote = Arc::new(ScriptedRemote::with_zones(vec![zone(1, 10.0), zone(2, 25.0)]));
    let environment = EnvironmentReconciler::new(Arc::clone(&remote));
    environment.load().await.expect("environment loads");

    assert_eq!(environment.selected_zone().map(|z| z.id), Some(1));
    assert!(environment.select_zone(2));
    assert_eq!(environment.selected_zone().map(|z| z.id), Some(2));
    assert!(!environment.select_zone(99));
    assert_eq!(environment.selected_zone().map(|z| z.id), Some(2));

    assert_eq!(environment.select_next_zone(), Some(1), "wraps around");
}

#[tokio::test]
async fn unknown_zone_edit_is_a_no_op() {
    let remote = Arc::new(ScriptedRemote::with_zones(vec![zone(1, 10.0)]));
    let environment = EnvironmentReconciler::new(Arc::clone(&remote));
    environment.load().await.expect("environment loads");
    let before = environment.zones();

    let applied = environment
        .edit_zone(7, FactorField::Temperature, 30.0)
        .expect("valid value");
    assert!(!applied);
    assert_eq!(environment.zones(), before);

    assert!(
        environment
            .edit_zone(1, FactorField::PredatorPresence, 1.5)
            .is_err()
    );
    assert_eq!(environment.zones(), before);

    assert!(
        environment
            .edit_zone(1, FactorField::FoodAvailability, 0.4)
            .expect("valid value")
    );
    assert_eq!(environment.zones()[0].food_availability, 0.4);
}

#[tokio::test]
async fn submit_notifies_only_after_both_pushes() {
    let remote = Arc::new(ScriptedRemote::with_zones(vec![zone(1, 10.0)]));
    let environment = EnvironmentReconciler::new(Arc::clone(&remote));
    environment.load().await.expect("environment loads");
    environment
        .edit_factor(FactorField::Temperature, 31.5)
        .expect("valid value");

    let calls = AtomicUsize::new(0);
    remote.script().fail_push_zones = true;
    let err = environment
        .submit(|_| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .expect_err("zone push refused");
    assert_eq!(err.operation(), "push_zones");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(remote.script().factors.temperature, 31.5, "factors already sent");

    remote.script().fail_push_zones = false;
    let mut seen = None;
    let submitted = environment
        .submit(|factors| seen = Some(*factors))
        .await
        .expect("both pushes accepted");
    assert_eq!(submitted.temperature, 31.5);
    assert_eq!(seen, Some(submitted));
    assert_eq!(environment.state().zones.last_push, PushStatus::Confirmed);
}

#[tokio::test]
async fn failed_factor_push_skips_zones() {
    let remote = Arc::new(ScriptedRemote::with_zones(vec![zone(1, 10.0)]));
    remote.script().fail_push_environment = true;
    let environment = EnvironmentReconciler::new(Arc::clone(&remote));
    environment.load().await.expect("environment loads");

    let mut notified = false;
    let err = environment
        .submit(|_| notified = true)
        .await
        .expect_err("factor push refused");
    assert_eq!(err.operation(), "push_environment");
    assert!(!notified);
    assert!(remote.script().pushed_zones.is_empty());
    assert_eq!(environment.factors(), EnvironmentFactors::default());
}

#[tokio::test]
async fn partial_load_keeps_what_arrived() {
    let remote = Arc::new(ScriptedRemote::with_zones(vec![zone(3, 15.0)]));
    remote.script().fail_fetch_environment = true;
    let environment = EnvironmentReconciler::new(Arc::clone(&remote));

    let err = environment.load().await.expect_err("factors failed");
    assert_eq!(err.operation(), "fetch_environment");
    assert_eq!(environment.zones().len(), 1);
    assert_eq!(environment.selected_zone().map(|z| z.id), Some(3));
    assert_eq!(environment.factors(), EnvironmentFactors::default());
}
