// ABOUTME: Integration tests for checkpoint store sessions against a real SQLite file.
// ABOUTME: Covers round trips, overwrites, abandonment, failure cleanup, pool limits, and concurrency.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use witness_store::{
    LogState, LogStateRead, LogStateWrite, Persistence, PoolConfig, Store, StoreError,
    create_schema,
};

fn db_url(dir: &TempDir) -> String {
    dir.path().join("witness.db").to_string_lossy().into_owned()
}

fn setup(dir: &TempDir, region: &str, max_size: usize) -> Store {
    setup_with(
        dir,
        region,
        PoolConfig {
            max_size,
            acquire_timeout: Duration::from_millis(300),
            busy_timeout: Duration::from_secs(5),
        },
    )
}

/// Generous timeouts for tests where threads contend for connections.
fn patient_config() -> PoolConfig {
    PoolConfig {
        max_size: 4,
        acquire_timeout: Duration::from_secs(30),
        busy_timeout: Duration::from_secs(30),
    }
}

fn setup_with(dir: &TempDir, region: &str, config: PoolConfig) -> Store {
    let url = db_url(dir);
    if !PathBuf::from(&url).exists() {
        create_schema(&url).unwrap();
    }
    let store = Store::open_with(&url, region, config).unwrap();
    store.init().unwrap();
    store
}

#[test]
fn scenario_write_then_read() {
    let dir = TempDir::new().unwrap();
    let store = setup(&dir, "us-east1", 4);

    store
        .write_ops("log1")
        .unwrap()
        .set(&[1, 2, 3], &[9])
        .unwrap();

    let (checkpoint, range) = store.read_ops("log1").get_latest().unwrap().into_parts();
    assert_eq!(checkpoint, vec![1, 2, 3]);
    assert_eq!(range, vec![9]);

    let err = store.read_ops("log2").get_latest().unwrap_err();
    assert!(matches!(err, StoreError::NotFound { ref log_id } if log_id == "log2"));
}

#[test]
fn scenario_two_sequential_write_sessions() {
    let dir = TempDir::new().unwrap();
    let store = setup(&dir, "us-east1", 4);

    store.write_ops("log1").unwrap().set(b"A", b"R1").unwrap();

    let session = store.write_ops("log1").unwrap();
    assert_eq!(session.get_latest().unwrap(), LogState::new(b"A".to_vec(), b"R1".to_vec()));
    session.set(b"B", b"R2").unwrap();

    let state = store.read_ops("log1").get_latest().unwrap();
    assert_eq!(state, LogState::new(b"B".to_vec(), b"R2".to_vec()));
}

#[test]
fn set_twice_leaves_only_second_payload() {
    let dir = TempDir::new().unwrap();
    let store = setup(&dir, "us-east1", 4);

    store.write_ops("log1").unwrap().set(b"first", b"r-first").unwrap();
    store.write_ops("log1").unwrap().set(b"second", b"r-second").unwrap();

    let state = store.read_ops("log1").get_latest().unwrap();
    assert_eq!(state.checkpoint, b"second");
    assert_eq!(state.range, b"r-second");
    assert_eq!(store.logs().unwrap().len(), 1);
}

#[test]
fn empty_payloads_are_stored() {
    let dir = TempDir::new().unwrap();
    let store = setup(&dir, "us-east1", 4);

    store.write_ops("log1").unwrap().set(&[], &[]).unwrap();

    assert_eq!(store.read_ops("log1").get_latest().unwrap(), LogState::default());
    assert!(store.logs().unwrap().contains("log1"));
}

#[test]
fn close_after_read_leaves_state_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = setup(&dir, "us-east1", 4);

    store.write_ops("log1").unwrap().set(b"A", b"R1").unwrap();

    let session = store.write_ops("log1").unwrap();
    session.get_latest().unwrap();
    session.close().unwrap();

    // Abandoning a never-written log creates nothing.
    let session = store.write_ops("log2").unwrap();
    assert!(session.get_latest().unwrap_err().is_not_found());
    session.close().unwrap();

    assert_eq!(
        store.read_ops("log1").get_latest().unwrap(),
        LogState::new(b"A".to_vec(), b"R1".to_vec())
    );
    assert_eq!(store.logs().unwrap(), HashSet::from(["log1".to_string()]));
}

#[test]
fn logs_returns_exactly_written_logs() {
    let dir = TempDir::new().unwrap();
    let store = setup(&dir, "us-east1", 4);

    store.write_ops("a").unwrap().set(b"1", b"").unwrap();
    store.write_ops("b").unwrap().set(b"2", b"").unwrap();
    store.write_ops("c").unwrap().close().unwrap();

    let logs = store.logs().unwrap();
    assert_eq!(logs, HashSet::from(["a".to_string(), "b".to_string()]));
}

#[test]
fn regions_are_isolated() {
    let dir = TempDir::new().unwrap();
    let east = setup(&dir, "us-east1", 2);
    let europe = setup(&dir, "europe-west4", 2);

    east.write_ops("log1").unwrap().set(b"east", b"").unwrap();
    europe.write_ops("log1").unwrap().set(b"europe", b"").unwrap();

    assert_eq!(east.read_ops("log1").get_latest().unwrap().checkpoint, b"east");
    assert_eq!(europe.read_ops("log1").get_latest().unwrap().checkpoint, b"europe");
}

#[test]
fn dropped_session_rolls_back_and_frees_connection() {
    let dir = TempDir::new().unwrap();
    let store = setup(&dir, "us-east1", 1);

    store.write_ops("log1").unwrap().set(b"A", b"R1").unwrap();

    {
        let session = store.write_ops("log1").unwrap();
        session.get_latest().unwrap();
        // Dropped without set or close.
    }

    let session = store.write_ops("log1").unwrap();
    assert_eq!(session.get_latest().unwrap().checkpoint, b"A");
    session.close().unwrap();

    let status = store.pool_status();
    assert_eq!(status.open, status.idle);
}

#[test]
fn write_ops_fails_when_pool_exhausted() {
    let dir = TempDir::new().unwrap();
    let store = setup(&dir, "us-east1", 1);

    let held = store.write_ops("log1").unwrap();
    let err = store.write_ops("log2").unwrap_err();
    assert!(matches!(err, StoreError::TransactionStart { .. }), "{err}");

    // Reads go through the same pool and fail as query errors, not not-found.
    let err = store.read_ops("log2").get_latest().unwrap_err();
    assert!(matches!(err, StoreError::Query { .. }), "{err}");

    held.close().unwrap();
    store.write_ops("log2").unwrap().close().unwrap();
}

#[test]
fn open_sessions_do_not_hold_up_writes_to_other_logs() {
    let dir = TempDir::new().unwrap();
    let store = setup_with(
        &dir,
        "us-east1",
        PoolConfig {
            max_size: 4,
            acquire_timeout: Duration::from_secs(1),
            busy_timeout: Duration::from_secs(1),
        },
    );
    store.write_ops("c").unwrap().set(b"c0", b"").unwrap();

    let reading = store.write_ops("a").unwrap();
    assert!(reading.get_latest().unwrap_err().is_not_found());
    let abandoning = store.write_ops("c").unwrap();
    abandoning.get_latest().unwrap();

    let started = Instant::now();
    store.write_ops("b").unwrap().set(b"b1", b"").unwrap();
    let waited = started.elapsed();
    assert!(waited < Duration::from_millis(900), "log b waited {waited:?}");

    abandoning.close().unwrap();
    reading.set(b"a1", b"").unwrap();

    assert_eq!(
        store.logs().unwrap(),
        HashSet::from(["a".to_string(), "b".to_string(), "c".to_string()])
    );
    assert_eq!(store.read_ops("a").get_latest().unwrap().checkpoint, b"a1");
    assert_eq!(store.read_ops("c").get_latest().unwrap().checkpoint, b"c0");
}

#[test]
fn failed_set_commits_nothing_and_releases_connection() {
    let dir = TempDir::new().unwrap();
    let store = setup(&dir, "us-east1", 1);

    store.write_ops("log1").unwrap().set(b"good", b"r").unwrap();

    {
        let conn = rusqlite::Connection::open(db_url(&dir)).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_update BEFORE UPDATE ON chkpts
                WHEN NEW.checkpoint = x'dead'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;
             CREATE TRIGGER reject_insert BEFORE INSERT ON chkpts
                WHEN NEW.checkpoint = x'dead'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();
    }

    let err = store
        .write_ops("log1")
        .unwrap()
        .set(&[0xde, 0xad], b"bad")
        .unwrap_err();
    assert!(matches!(err, StoreError::Commit { .. }), "{err}");

    let err = store
        .write_ops("log2")
        .unwrap()
        .set(&[0xde, 0xad], b"bad")
        .unwrap_err();
    assert!(matches!(err, StoreError::Commit { .. }), "{err}");

    assert_eq!(
        store.read_ops("log1").get_latest().unwrap(),
        LogState::new(b"good".to_vec(), b"r".to_vec())
    );
    assert!(store.read_ops("log2").get_latest().unwrap_err().is_not_found());
}

#[test]
fn concurrent_sessions_on_distinct_logs_all_land() {
    let dir = TempDir::new().unwrap();
    let store = setup_with(&dir, "us-east1", patient_config());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            std::thread::spawn(move || {
                let log_id = format!("log{i}");
                for round in 0u8..10 {
                    let session = store.write_ops(&log_id).unwrap();
                    match session.get_latest() {
                        Ok(state) => assert_eq!(state.checkpoint, vec![round - 1]),
                        Err(e) => assert!(e.is_not_found() && round == 0, "{e}"),
                    }
                    session.set(&[round], log_id.as_bytes()).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let logs = store.logs().unwrap();
    assert_eq!(logs.len(), 8);
    for log_id in logs {
        let state = store.read_ops(&log_id).get_latest().unwrap();
        assert_eq!(state.checkpoint, vec![9]);
        assert_eq!(state.range, log_id.as_bytes());
    }
}

#[test]
fn exclusive_sessions_on_same_log_do_not_lose_updates() {
    let dir = TempDir::new().unwrap();
    let store = setup_with(&dir, "us-east1", patient_config());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..5 {
                    let session = store.write_ops_exclusive("shared").unwrap();
                    let next = match session.get_latest() {
                        Ok(state) => state.checkpoint[0] + 1,
                        Err(e) if e.is_not_found() => 1,
                        Err(e) => panic!("unexpected error: {e}"),
                    };
                    session.set(&[next], b"").unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.read_ops("shared").get_latest().unwrap().checkpoint, vec![20]);
}

/// Advance a log only when the proposed checkpoint sorts after the stored
/// one, the way a witness engine drives the store through the traits.
fn advance<P: Persistence>(p: &P, log_id: &str, next: &[u8]) -> Result<bool, StoreError> {
    let session = p.write_ops(log_id)?;
    match session.get_latest() {
        Ok(state) if state.checkpoint.as_slice() >= next => {
            session.close()?;
            Ok(false)
        }
        Ok(_) => {
            session.set(next, b"range")?;
            Ok(true)
        }
        Err(e) if e.is_not_found() => {
            session.set(next, b"range")?;
            Ok(true)
        }
        Err(e) => {
            session.close()?;
            Err(e)
        }
    }
}

#[test]
fn persistence_traits_drive_bootstrap_and_update() {
    let dir = TempDir::new().unwrap();
    let store = setup(&dir, "us-east1", 2);
    Persistence::init(&store).unwrap();

    assert!(advance(&store, "log1", b"2").unwrap());
    assert!(!advance(&store, "log1", b"1").unwrap());
    assert!(advance(&store, "log1", b"3").unwrap());

    let read = Persistence::read_ops(&store, "log1");
    assert_eq!(LogStateRead::get_latest(&read).unwrap().checkpoint, b"3");
    assert_eq!(
        Persistence::logs(&store).unwrap(),
        HashSet::from(["log1".to_string()])
    );
}
