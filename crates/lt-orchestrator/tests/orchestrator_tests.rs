//! ---
//! lt_section: "01-core-orchestration"
//! lt_subsection: "integration-tests"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Run lifecycle tests against a scripted workload."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lt_common::{AppType, LoadTesterConfig};
use lt_orchestrator::{Orchestrator, RunError, WorkerRole, WorkerState};
use lt_workload::{OperationError, Workload, WorkloadError, WorkloadFactory};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

#[derive(Debug, Default)]
struct Tally {
    instances: AtomicUsize,
    drop_schema: AtomicUsize,
    create_schema: AtomicUsize,
    run_simple: AtomicUsize,
    teardown: AtomicUsize,
    writes: AtomicUsize,
    reads: AtomicUsize,
    waiting: AtomicUsize,
}

impl Tally {
    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct Script {
    app_type: AppType,
    ops_per_instance: usize,
    unbounded: bool,
    fatal_on_write: Option<&'static str>,
    fail_drop_schema: bool,
    fail_create_at: Option<usize>,
    transient_every: Option<usize>,
    gate: Option<watch::Receiver<bool>>,
    blocking_call: Option<Duration>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            app_type: AppType::Concurrent,
            ops_per_instance: 20,
            unbounded: false,
            fatal_on_write: None,
            fail_drop_schema: false,
            fail_create_at: None,
            transient_every: None,
            gate: None,
            blocking_call: None,
        }
    }
}

struct ScriptedWorkload {
    tally: Arc<Tally>,
    script: Script,
    attempts: usize,
    passed_gate: bool,
}

impl ScriptedWorkload {
    async fn pass_gate(&mut self) {
        if self.passed_gate {
            return;
        }
        if let Some(gate) = self.script.gate.as_mut() {
            self.tally.waiting.fetch_add(1, Ordering::SeqCst);
            let _opened = gate.wait_for(|open| *open).await.is_ok();
        }
        self.passed_gate = true;
    }

    async fn operation(&mut self, write: bool) -> Result<(), OperationError> {
        self.pass_gate().await;
        match self.script.blocking_call {
            Some(pause) => std::thread::sleep(pause),
            None => tokio::task::yield_now().await,
        }
        self.attempts += 1;
        if matches!(self.script.transient_every, Some(every) if self.attempts % every == 0) {
            return Err(OperationError::transient("request timed out"));
        }
        let counter = if write {
            &self.tally.writes
        } else {
            &self.tally.reads
        };
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Workload for ScriptedWorkload {
    fn name(&self) -> &str {
        "scripted"
    }

    fn app_type(&self) -> AppType {
        self.script.app_type
    }

    async fn create_schema_if_needed(&mut self) -> Result<(), WorkloadError> {
        self.tally.create_schema.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn drop_schema(&mut self) -> Result<(), WorkloadError> {
        self.tally.drop_schema.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_drop_schema {
            return Err(WorkloadError::Schema("permission denied".into()));
        }
        Ok(())
    }

    async fn perform_write(&mut self) -> Result<(), OperationError> {
        if let Some(reason) = self.script.fatal_on_write {
            return Err(OperationError::fatal(reason));
        }
        self.operation(true).await
    }

    async fn perform_read(&mut self) -> Result<(), OperationError> {
        self.operation(false).await
    }

    async fn run_simple(&mut self) -> Result<(), WorkloadError> {
        self.tally.run_simple.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn has_finished(&self) -> bool {
        !self.script.unbounded && self.attempts >= self.script.ops_per_instance
    }

    async fn teardown(&mut self) {
        self.tally.teardown.fetch_add(1, Ordering::SeqCst);
    }
}

fn scripted_factory(tally: Arc<Tally>, script: Script) -> Arc<dyn WorkloadFactory> {
    Arc::new(move || -> Result<Box<dyn Workload>, WorkloadError> {
        let index = tally.instances.fetch_add(1, Ordering::SeqCst);
        if script.fail_create_at == Some(index) {
            return Err(WorkloadError::Connection("connection refused".into()));
        }
        let workload: Box<dyn Workload> = Box::new(ScriptedWorkload {
            tally: Arc::clone(&tally),
            script: script.clone(),
            attempts: 0,
            passed_gate: false,
        });
        Ok(workload)
    })
}

/// Bounded run shape; scripted workloads ignore the limit itself.
fn config(writers: usize, readers: usize) -> LoadTesterConfig {
    let mut config = unbounded_config(writers, readers);
    config.limits.run_time = Some(Duration::from_secs(60));
    config
}

fn unbounded_config(writers: usize, readers: usize) -> LoadTesterConfig {
    let mut config = LoadTesterConfig::default();
    config.threads.writers = writers;
    config.threads.readers = readers;
    config.reporting.interval = Duration::from_millis(25);
    config
}

fn spawn_run(
    orchestrator: &Arc<Orchestrator>,
) -> tokio::task::JoinHandle<Result<lt_orchestrator::RunReport, RunError>> {
    let orchestrator = Arc::clone(orchestrator);
    tokio::spawn(async move { orchestrator.run().await })
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_writers_three_readers_all_finish() {
    let tally = Arc::new(Tally::default());
    let orchestrator = Orchestrator::new(config(2, 3), scripted_factory(tally.clone(), Script::default()));

    let report = timeout(Duration::from_secs(10), orchestrator.run())
        .await
        .expect("run completes")
        .expect("run succeeds");

    let ids: Vec<usize> = report.workers.iter().map(|w| w.id).collect();
    let roles: Vec<WorkerRole> = report.workers.iter().map(|w| w.role).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    assert_eq!(
        roles,
        vec![
            WorkerRole::Write,
            WorkerRole::Write,
            WorkerRole::Read,
            WorkerRole::Read,
            WorkerRole::Read
        ]
    );
    assert!(report
        .workers
        .iter()
        .all(|w| w.state == WorkerState::Finished));
    assert!(report.schema_reset);
    assert_eq!(report.app_type, AppType::Concurrent);
    assert_eq!(report.total_writes(), 40);
    assert_eq!(report.total_reads(), 60);
    assert_eq!(report.interruptions, 0);
    assert!(report.start_failures.is_empty());

    assert_eq!(Tally::get(&tally.drop_schema), 1);
    assert_eq!(Tally::get(&tally.create_schema), 1);
    assert_eq!(Tally::get(&tally.teardown), 1);
    assert_eq!(Tally::get(&tally.instances), 6);
    assert_eq!(Tally::get(&tally.run_simple), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reuse_existing_schema_skips_schema_calls() {
    let tally = Arc::new(Tally::default());
    let mut cfg = config(1, 1);
    cfg.reuse_existing_schema = true;
    let orchestrator = Orchestrator::new(cfg, scripted_factory(tally.clone(), Script::default()));

    let report = orchestrator.run().await.expect("run succeeds");
    assert!(!report.schema_reset);
    assert_eq!(Tally::get(&tally.drop_schema), 0);
    assert_eq!(Tally::get(&tally.create_schema), 0);
    assert_eq!(Tally::get(&tally.teardown), 1);
    assert_eq!(report.workers.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn simple_workload_runs_once_without_workers() {
    let tally = Arc::new(Tally::default());
    let script = Script {
        app_type: AppType::Simple,
        ..Script::default()
    };
    let orchestrator = Orchestrator::new(config(2, 8), scripted_factory(tally.clone(), script));

    let report = orchestrator.run().await.expect("simple run succeeds");
    assert_eq!(report.app_type, AppType::Simple);
    assert!(report.workers.is_empty());
    assert!(!report.schema_reset);
    assert_eq!(Tally::get(&tally.run_simple), 1);
    assert_eq!(Tally::get(&tally.teardown), 1);
    assert_eq!(Tally::get(&tally.instances), 1);
    assert_eq!(Tally::get(&tally.drop_schema), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn configured_app_type_overrides_workload_declaration() {
    let tally = Arc::new(Tally::default());
    let mut cfg = config(1, 1);
    cfg.app_type = Some(AppType::Simple);
    let orchestrator = Orchestrator::new(cfg, scripted_factory(tally.clone(), Script::default()));
    orchestrator.run().await.expect("simple run succeeds");
    assert_eq!(Tally::get(&tally.run_simple), 1);
    assert_eq!(Tally::get(&tally.instances), 1);

    let tally = Arc::new(Tally::default());
    let mut cfg = config(1, 0);
    cfg.app_type = Some(AppType::Concurrent);
    let script = Script {
        app_type: AppType::Simple,
        ..Script::default()
    };
    let orchestrator = Orchestrator::new(cfg, scripted_factory(tally.clone(), script));
    let report = orchestrator.run().await.expect("concurrent run succeeds");
    assert_eq!(report.workers.len(), 1);
    assert_eq!(Tally::get(&tally.run_simple), 0);
    assert_eq!(Tally::get(&tally.writes), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fatal_first_write_fails_the_run() {
    let tally = Arc::new(Tally::default());
    let script = Script {
        fatal_on_write: Some("disk full"),
        ..Script::default()
    };
    let orchestrator = Orchestrator::new(config(1, 0), scripted_factory(tally.clone(), script));

    let err = timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .expect("run terminates")
        .expect_err("fatal write fails the run");
    assert_eq!(
        err,
        RunError::WorkerExecution {
            worker_id: 0,
            role: WorkerRole::Write,
            reason: "disk full".into(),
        }
    );
    assert_eq!(err.stage().to_string(), "worker execution");
    assert_eq!(Tally::get(&tally.teardown), 1);
    assert_eq!(Tally::get(&tally.writes), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn schema_failure_creates_no_workers() {
    let tally = Arc::new(Tally::default());
    let script = Script {
        fail_drop_schema: true,
        ..Script::default()
    };
    let orchestrator = Orchestrator::new(config(2, 2), scripted_factory(tally.clone(), script));

    let err = orchestrator.run().await.expect_err("schema failure");
    assert!(matches!(
        err,
        RunError::SchemaSetup {
            operation: "drop_schema",
            ..
        }
    ));
    assert_eq!(Tally::get(&tally.instances), 1);
    assert_eq!(Tally::get(&tally.create_schema), 0);
    assert_eq!(Tally::get(&tally.teardown), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_creation_failure_still_runs_remaining_workers() {
    let tally = Arc::new(Tally::default());
    // Instance 0 is the control instance, instance 2 belongs to worker #1.
    let script = Script {
        fail_create_at: Some(2),
        ..Script::default()
    };
    let orchestrator = Orchestrator::new(config(2, 2), scripted_factory(tally.clone(), script));

    let err = timeout(Duration::from_secs(10), orchestrator.run())
        .await
        .expect("run terminates")
        .expect_err("creation failure is fatal for the run");
    match err {
        RunError::WorkerStart {
            worker_id, role, ..
        } => {
            assert_eq!(worker_id, 1);
            assert_eq!(role, WorkerRole::Write);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(Tally::get(&tally.instances), 5);
    assert_eq!(Tally::get(&tally.writes), 20);
    assert_eq!(Tally::get(&tally.reads), 40);
    assert_eq!(Tally::get(&tally.teardown), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn control_instance_failure_skips_teardown() {
    let tally = Arc::new(Tally::default());
    let script = Script {
        fail_create_at: Some(0),
        ..Script::default()
    };
    let orchestrator = Orchestrator::new(config(2, 2), scripted_factory(tally.clone(), script));

    let err = orchestrator.run().await.expect_err("initialization failure");
    assert_eq!(
        err,
        RunError::Initialization {
            source: WorkloadError::Connection("connection refused".into()),
        }
    );
    assert_eq!(err.stage().exit_code(), 2);
    assert_eq!(Tally::get(&tally.instances), 1);
    assert_eq!(Tally::get(&tally.teardown), 0);
    assert_eq!(Tally::get(&tally.drop_schema), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interrupted_wait_retries_the_same_worker() {
    let tally = Arc::new(Tally::default());
    let (gate_tx, gate_rx) = watch::channel(false);
    let script = Script {
        ops_per_instance: 5,
        gate: Some(gate_rx),
        ..Script::default()
    };
    let orchestrator = Arc::new(Orchestrator::new(
        config(1, 2),
        scripted_factory(tally.clone(), script),
    ));
    let interrupts = orchestrator.interrupt_handle();
    let run = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.run().await }
    });

    wait_until(|| Tally::get(&tally.waiting) == 3).await;
    assert!(interrupts.interrupt());
    sleep(Duration::from_millis(30)).await;
    assert!(!run.is_finished(), "an interrupt must not end the wait");
    assert_eq!(Tally::get(&tally.teardown), 0);

    gate_tx.send_replace(true);
    let report = timeout(Duration::from_secs(5), run)
        .await
        .expect("run completes")
        .expect("task joins")
        .expect("run succeeds");

    assert_eq!(report.interruptions, 1);
    assert_eq!(report.workers.len(), 3);
    assert_eq!(report.finished_count(), 3);
    assert_eq!(Tally::get(&tally.writes), 5);
    assert_eq!(Tally::get(&tally.reads), 10);
    assert_eq!(Tally::get(&tally.teardown), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_on_interrupt_stops_unbounded_workers() {
    let tally = Arc::new(Tally::default());
    let script = Script {
        unbounded: true,
        ..Script::default()
    };
    let mut cfg = config(1, 1);
    cfg.stop_on_interrupt = true;
    let orchestrator = Arc::new(Orchestrator::new(cfg, scripted_factory(tally.clone(), script)));
    let interrupts = orchestrator.interrupt_handle();
    let run = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.run().await }
    });

    wait_until(|| Tally::get(&tally.writes) > 0 && Tally::get(&tally.reads) > 0).await;
    assert!(interrupts.interrupt());

    let report = timeout(Duration::from_secs(5), run)
        .await
        .expect("workers honour the stop flag")
        .expect("task joins")
        .expect("run succeeds");
    assert_eq!(report.interruptions, 1);
    assert_eq!(report.finished_count(), 2);
    assert!(report.total_writes() > 0);
    assert_eq!(Tally::get(&tally.teardown), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transient_failures_do_not_fail_the_run() {
    let tally = Arc::new(Tally::default());
    let script = Script {
        ops_per_instance: 9,
        transient_every: Some(3),
        ..Script::default()
    };
    let orchestrator = Orchestrator::new(config(1, 1), scripted_factory(tally.clone(), script));

    let report = orchestrator.run().await.expect("transient failures are tolerated");
    for worker in &report.workers {
        assert_eq!(worker.state, WorkerState::Finished);
        assert_eq!(worker.operations, 6);
        assert_eq!(worker.transient_errors, 3);
        assert!(worker.failure.is_none());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn zero_threads_still_resets_schema_and_tears_down() {
    let tally = Arc::new(Tally::default());
    let orchestrator = Orchestrator::new(config(0, 0), scripted_factory(tally.clone(), Script::default()));

    let report = orchestrator.run().await.expect("empty run succeeds");
    assert!(report.workers.is_empty());
    assert!(report.schema_reset);
    assert_eq!(Tally::get(&tally.instances), 1);
    assert_eq!(Tally::get(&tally.teardown), 1);
}

#[tokio::test]
async fn interrupt_without_a_run_is_not_delivered() {
    let tally = Arc::new(Tally::default());
    let orchestrator = Orchestrator::new(config(1, 1), scripted_factory(tally, Script::default()));
    assert!(!orchestrator.interrupt_handle().interrupt());
    assert_eq!(orchestrator.config().threads.readers, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interrupt_stops_a_run_without_limits() {
    let tally = Arc::new(Tally::default());
    let script = Script {
        unbounded: true,
        ..Script::default()
    };
    let orchestrator = Arc::new(Orchestrator::new(
        unbounded_config(1, 1),
        scripted_factory(tally.clone(), script),
    ));
    assert!(!orchestrator.config().stop_on_interrupt);
    let interrupts = orchestrator.interrupt_handle();
    let run = spawn_run(&orchestrator);

    wait_until(|| Tally::get(&tally.writes) > 0 && Tally::get(&tally.reads) > 0).await;
    assert!(interrupts.interrupt());

    let report = timeout(Duration::from_secs(5), run)
        .await
        .expect("unbounded workers stop on the first interrupt")
        .expect("task joins")
        .expect("run succeeds");
    assert_eq!(report.interruptions, 1);
    assert_eq!(report.finished_count(), 2);
    assert_eq!(Tally::get(&tally.teardown), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn second_interrupt_stops_a_bounded_run() {
    let tally = Arc::new(Tally::default());
    let script = Script {
        unbounded: true,
        ..Script::default()
    };
    let orchestrator = Arc::new(Orchestrator::new(
        config(1, 1),
        scripted_factory(tally.clone(), script),
    ));
    let interrupts = orchestrator.interrupt_handle();
    let run = spawn_run(&orchestrator);

    wait_until(|| Tally::get(&tally.writes) > 0).await;
    assert!(interrupts.interrupt());
    sleep(Duration::from_millis(50)).await;
    assert!(!run.is_finished(), "one interrupt keeps a bounded run going");
    let writes = Tally::get(&tally.writes);
    wait_until(|| Tally::get(&tally.writes) > writes).await;

    assert!(interrupts.interrupt());
    let report = timeout(Duration::from_secs(5), run)
        .await
        .expect("second interrupt stops the workers")
        .expect("task joins")
        .expect("run succeeds");
    assert_eq!(report.interruptions, 2);
    assert_eq!(report.finished_count(), 2);
    assert_eq!(Tally::get(&tally.teardown), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_workload_still_receives_interrupts() {
    let tally = Arc::new(Tally::default());
    let script = Script {
        unbounded: true,
        blocking_call: Some(Duration::from_micros(50)),
        ..Script::default()
    };
    let mut cfg = config(1, 1);
    cfg.stop_on_interrupt = true;
    let orchestrator = Orchestrator::new(cfg, scripted_factory(tally.clone(), script));
    let interrupts = orchestrator.interrupt_handle();
    tokio::spawn(async move {
        sleep(Duration::from_millis(200)).await;
        interrupts.interrupt();
    });

    let report = timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .expect("workers that never await do not starve the runtime")
        .expect("run succeeds");
    assert_eq!(report.interruptions, 1);
    assert_eq!(report.finished_count(), 2);
    assert!(report.total_writes() > 0);
    assert!(report.total_reads() > 0);
}
