//! Host lifecycle tests against the bundled demo script

use std::io::Write;
use std::path::PathBuf;

use strategy_host::prelude::*;
use strategy_host_core::StrategyError;

fn demo_script() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scripts/strategy.wat")
}

fn config_for(script: PathBuf) -> HostConfig {
    HostConfig {
        script,
        ..HostConfig::default()
    }
}

fn script_file(source: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".wat").tempfile().unwrap();
    file.write_all(source.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_demo_run_acknowledges_goog_order() {
    let report = Host::new(config_for(demo_script())).run().unwrap();

    assert_eq!(report.orders.len(), 1);
    let order = &report.orders[0].order;
    assert_eq!(order.symbol, "GOOG");
    assert_eq!(order.side, Side::Buy);
    assert_eq!(order.size, 100);
    assert_eq!(order.price, 759.11);
    assert_eq!(order.order_id(), 1);

    assert_eq!(
        report.console,
        vec!["strategy constructed", "bought", "GOOG"]
    );
    assert_eq!(report.module, "strategy");
    assert_eq!(report.class, "Strategy");
    assert_eq!(report.modules_loaded, 1);
    assert!(report.fuel_consumed.unwrap_or_default() > 0);
}

#[test]
fn test_second_run_restarts_order_ids() {
    let first = Host::new(config_for(demo_script())).run().unwrap();
    let second = Host::new(config_for(demo_script())).run().unwrap();

    assert_eq!(first.orders[0].order.order_id(), 1);
    assert_eq!(second.orders[0].order.order_id(), 1);
    assert_ne!(first.run_id, second.run_id);
}

#[test]
fn test_steps_advance_phase_in_order() {
    let mut host = Host::new(config_for(demo_script()));

    host.init_runtime().unwrap();
    assert_eq!(host.phase(), HostPhase::RuntimeReady);
    host.register_bindings().unwrap();
    assert_eq!(host.phase(), HostPhase::BindingsRegistered);
    host.load_script().unwrap();
    assert_eq!(host.phase(), HostPhase::ModuleLoaded);
    host.construct_strategy().unwrap();
    assert_eq!(host.phase(), HostPhase::StrategyConstructed);
    assert_eq!(host.order_server().issued(), 0);
    host.evaluate().unwrap();
    assert_eq!(host.phase(), HostPhase::Evaluated);
    assert_eq!(host.order_server().issued(), 1);
    host.terminate().unwrap();
    assert_eq!(host.phase(), HostPhase::Terminated);

    assert!(matches!(
        host.init_runtime(),
        Err(HostError::InvalidTransition {
            from: HostPhase::Terminated,
            ..
        })
    ));
}

#[test]
fn test_loading_before_bindings_is_rejected() {
    let mut host = Host::new(config_for(demo_script()));
    host.init_runtime().unwrap();

    let err = host.load_script().unwrap_err();
    assert!(matches!(
        err,
        HostError::InvalidTransition {
            from: HostPhase::RuntimeReady,
            to: HostPhase::ModuleLoaded
        }
    ));
}

#[test]
fn test_missing_script_never_reaches_construction() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = Host::new(config_for(dir.path().join("absent.wat")));

    host.init_runtime().unwrap();
    host.register_bindings().unwrap();
    let err = host.load_script().unwrap_err();

    assert!(matches!(err, HostError::Script(ref script) if script.is_load_error()));
    assert_eq!(host.phase(), HostPhase::BindingsRegistered);
    assert!(host.construct_strategy().is_err());
    assert_eq!(host.order_server().issued(), 0);
}

#[test]
fn test_missing_callback_fails_during_evaluation() {
    let source = r#"(module
      (import "Strategy" "send_order" (func $send (param i32 i32 i32 i32 i64 f64)))
      (memory (export "memory") 1)
      (data (i32.const 0) "MSFT")
      (global $server (mut i32) (i32.const 0))
      (func (export "Strategy.new") (param i32) (result i32)
        (global.set $server (local.get 0))
        (i32.const 1))
      (func (export "Strategy.eval") (param i32)
        (call $send (global.get $server) (i32.const 0) (i32.const 4)
          (i32.const 1) (i64.const 5) (f64.const 10.5))))"#;
    let file = script_file(source);
    let mut host = Host::new(config_for(file.path().to_path_buf()));

    host.init_runtime().unwrap();
    host.register_bindings().unwrap();
    host.load_script().unwrap();
    host.construct_strategy().unwrap();
    let err = host.evaluate().unwrap_err();

    assert!(
        matches!(
            err,
            HostError::Strategy(StrategyError::Unimplemented { ref method, .. }) if method == "on_order"
        ),
        "{err:?}"
    );
    assert_eq!(host.phase(), HostPhase::StrategyConstructed);
}

#[test]
fn test_custom_class_name() {
    let source = r#"(module
      (global $evals (export "evals") (mut i32) (i32.const 0))
      (func (export "Momentum.new") (param i32) (result i32) (i32.const 3))
      (func (export "Momentum.eval") (param i32)
        (global.set $evals (i32.add (global.get $evals) (i32.const 1)))))"#;
    let file = script_file(source);
    let config = HostConfig {
        class_name: "Momentum".into(),
        module_name: "momentum".into(),
        ..config_for(file.path().to_path_buf())
    };

    let report = Host::new(config).run().unwrap();

    assert!(report.orders.is_empty());
    assert_eq!(report.class, "Momentum");
    assert_eq!(report.module, "momentum");
}

#[test]
fn test_report_serializes_to_json() {
    let report = Host::new(config_for(demo_script())).run().unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["orders"][0]["order"]["symbol"], "GOOG");
    assert_eq!(json["orders"][0]["order"]["side"], "BUY");
    assert_eq!(json["run_id"], report.run_id.to_string());
}
