mod common;

use serial_test::serial;
use transferflow::transfer::RunOutcome;

async fn seed_flags(pool: &sqlx::PgPool) {
    common::exec(pool, "CREATE TABLE tf_src.flags (code TEXT)").await;
    common::exec(pool, "INSERT INTO tf_src.flags VALUES ('X')").await;
    common::exec(pool, "CREATE TABLE tf_dst.flags (code TEXT)").await;
    common::exec(pool, "CREATE TABLE tf_src.orders (id INT)").await;
    common::exec(pool, "INSERT INTO tf_src.orders VALUES (10), (11)").await;
    common::exec(pool, "CREATE TABLE tf_dst.orders (id INT)").await;
}

fn flags_job() -> transferflow::jobs::JobDefinition {
    common::definition(
        "flags",
        vec![common::col("tf_src.flags", "tf_dst.flags", "code", "code")],
    )
}

fn orders_job() -> transferflow::jobs::JobDefinition {
    common::definition(
        "orders",
        vec![common::col("tf_src.orders", "tf_dst.orders", "id", "id")],
    )
}

fn completed_at(logs: &[transferflow::jobs::LogEntry]) -> chrono::DateTime<chrono::Utc> {
    logs.iter()
        .find(|l| l.log_message == "transfer completed")
        .map(|l| l.logged_at)
        .expect("completion logged")
}

#[tokio::test]
#[serial]
async fn job_without_edges_is_satisfied_without_connecting() {
    let pool = common::setup_db().await;
    let (engine, _) = common::engine(&pool);

    let mut def = common::definition("lonely", vec![]);
    def.target = common::unreachable_spec();
    let job_id = engine.create_job(&def).await.unwrap();

    assert!(engine.runner.satisfy(job_id).await.unwrap());
}

#[tokio::test]
#[serial]
async fn satisfied_edge_does_not_rerun_the_dependency() {
    let pool = common::setup_db().await;
    let (engine, _) = common::engine(&pool);
    seed_flags(&pool).await;
    common::exec(&pool, "INSERT INTO tf_dst.flags VALUES ('X')").await;

    let dep = engine.create_job(&flags_job()).await.unwrap();
    let mut def = orders_job();
    def.triggers.push(common::trigger(dep, "tf_dst.flags", "code", "X"));
    let job_id = engine.create_job(&def).await.unwrap();

    assert!(engine.run(job_id).await.unwrap().is_completed());
    assert!(engine.get_logs(dep).await.unwrap().is_empty());
    assert_eq!(common::count(&pool, "SELECT COUNT(*) FROM tf_dst.flags").await, 1);
}

#[tokio::test]
#[serial]
async fn missing_value_runs_the_dependency_first() {
    let pool = common::setup_db().await;
    let (engine, _) = common::engine(&pool);
    seed_flags(&pool).await;

    let dep = engine.create_job(&flags_job()).await.unwrap();
    let mut def = orders_job();
    def.triggers.push(common::trigger(dep, "tf_dst.flags", "code", "X"));
    let job_id = engine.create_job(&def).await.unwrap();

    let outcome = engine.run(job_id).await.unwrap();
    assert!(outcome.is_completed(), "got {outcome:?}");

    assert_eq!(common::count(&pool, "SELECT COUNT(*) FROM tf_dst.flags").await, 1);
    assert_eq!(common::count(&pool, "SELECT COUNT(*) FROM tf_dst.orders").await, 2);

    let dep_done = completed_at(&engine.get_logs(dep).await.unwrap());
    let job_done = completed_at(&engine.get_logs(job_id).await.unwrap());
    assert!(dep_done < job_done);

    assert!(engine.get_job(dep).await.unwrap().unwrap().last_run_at.is_some());
}

#[tokio::test]
#[serial]
async fn dependency_that_never_produces_the_value_blocks() {
    let pool = common::setup_db().await;
    let (engine, _) = common::engine(&pool);
    seed_flags(&pool).await;

    let dep = engine.create_job(&flags_job()).await.unwrap();
    let mut def = orders_job();
    def.triggers.push(common::trigger(dep, "tf_dst.flags", "code", "Y"));
    let job_id = engine.create_job(&def).await.unwrap();

    assert_eq!(engine.run(job_id).await.unwrap(), RunOutcome::Blocked);

    // The dependency itself ran to completion.
    assert_eq!(common::count(&pool, "SELECT COUNT(*) FROM tf_dst.flags").await, 1);

    assert_eq!(common::count(&pool, "SELECT COUNT(*) FROM tf_dst.orders").await, 0);
    let job = engine.get_job(job_id).await.unwrap().unwrap();
    assert!(job.last_run_at.is_none());

    let logs = engine.get_logs(job_id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].log_message, "blocked by trigger: transfer not started");
}

#[tokio::test]
#[serial]
async fn unreachable_dependency_target_blocks() {
    let pool = common::setup_db().await;
    let (engine, notifier) = common::engine(&pool);
    seed_flags(&pool).await;

    let mut dep_def = flags_job();
    dep_def.target = common::unreachable_spec();
    let dep = engine.create_job(&dep_def).await.unwrap();
    let mut def = orders_job();
    def.triggers.push(common::trigger(dep, "tf_dst.flags", "code", "X"));
    let job_id = engine.create_job(&def).await.unwrap();

    assert_eq!(engine.run(job_id).await.unwrap(), RunOutcome::Blocked);

    // The dependency's own connection failure is reported; the trigger check is not.
    let sent = notifier.messages();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("[TARGET_CONNECTION]"));
}

#[tokio::test]
#[serial]
async fn trigger_cycle_is_detected_and_blocks() {
    let pool = common::setup_db().await;
    let (engine, _) = common::engine(&pool);
    seed_flags(&pool).await;

    let a = engine.create_job(&orders_job()).await.unwrap();
    let b = engine.create_job(&flags_job()).await.unwrap();
    engine
        .add_trigger(a, &common::trigger(b, "tf_dst.flags", "code", "never"))
        .await
        .unwrap();
    engine
        .add_trigger(b, &common::trigger(a, "tf_dst.orders", "id", "-1"))
        .await
        .unwrap();

    assert_eq!(engine.run(a).await.unwrap(), RunOutcome::Blocked);

    let b_logs = engine.get_logs(b).await.unwrap();
    let expected = format!("trigger cycle detected: {a} -> {b} -> {a}");
    assert!(
        b_logs.iter().any(|l| l.log_message == expected),
        "logs: {b_logs:?}"
    );

    let a_logs = engine.get_logs(a).await.unwrap();
    assert_eq!(
        a_logs.last().map(|l| l.log_message.as_str()),
        Some("blocked by trigger: transfer not started")
    );

    assert_eq!(common::count(&pool, "SELECT COUNT(*) FROM tf_dst.orders").await, 0);
    assert!(!engine.runner.locks().is_running(a));
    assert!(!engine.runner.locks().is_running(b));
}

#[tokio::test]
#[serial]
async fn self_trigger_is_a_cycle() {
    let pool = common::setup_db().await;
    let (engine, _) = common::engine(&pool);
    seed_flags(&pool).await;

    let a = engine.create_job(&orders_job()).await.unwrap();
    engine
        .add_trigger(a, &common::trigger(a, "tf_dst.orders", "id", "10"))
        .await
        .unwrap();

    assert_eq!(engine.run(a).await.unwrap(), RunOutcome::Blocked);
    let logs = engine.get_logs(a).await.unwrap();
    assert_eq!(logs[0].log_message, format!("trigger cycle detected: {a} -> {a}"));
}

#[tokio::test]
#[serial]
async fn value_present_matches_on_text() {
    let pool = common::setup_db().await;
    let (engine, _) = common::engine(&pool);
    seed_flags(&pool).await;
    common::exec(&pool, "INSERT INTO tf_dst.orders VALUES (10)").await;

    let dep = engine.create_job(&orders_job()).await.unwrap();

    let present = engine
        .runner
        .value_present(dep, "tf_dst.orders", "id", "10")
        .await
        .unwrap();
    assert!(present);

    let absent = engine
        .runner
        .value_present(dep, "tf_dst.orders", "id", "11")
        .await
        .unwrap();
    assert!(!absent);

    let missing_table = engine
        .runner
        .value_present(dep, "tf_dst.nope", "id", "10")
        .await
        .unwrap();
    assert!(!missing_table);

    let missing_job = engine
        .runner
        .value_present(9_999, "tf_dst.orders", "id", "10")
        .await
        .unwrap();
    assert!(!missing_job);
}
