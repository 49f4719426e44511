//! Logger Integration Tests
//!
//! End-to-end checks of the composite logger over real backends, and of a
//! service bootstrapped from a YAML file.
//!
//! ## What These Tests Verify
//!
//! - Fan-out of one record to several file backends
//! - Single-row flush of the row-store backend on close
//! - Records of an unclosed row-store backend are lost
//! - Concurrent callers produce whole, non-interleaved lines
//! - Bootstrap from YAML, job logging, retrieval and tailing

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use joblog_core::rowstore::LogRow;
use joblog_core::{
    Backend, Closable, CompositeLogger, DbBackend, FileBackend, Getter, JobContext, JobInfo,
    JobKind, JobStatus, LogLevel, LogResult, LoggerExt, RowStore, ServiceConfig,
    ServiceEnvironment, TailGetter, Tracker,
};

/// Row store that records every call.
#[derive(Default)]
struct RecordingStore {
    creates: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RowStore for RecordingStore {
    fn create(&self, key: &str, content: &[u8]) -> LogResult<()> {
        self.creates.lock().push((key.to_string(), content.to_vec()));
        Ok(())
    }

    fn get(&self, key: &str) -> LogResult<Option<LogRow>> {
        Ok(self
            .creates
            .lock()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(k, content)| LogRow {
                uuid: k.clone(),
                content: content.clone(),
                creation_time: Utc::now(),
            }))
    }

    fn delete_older_than(&self, _cutoff: DateTime<Utc>) -> LogResult<usize> {
        Ok(0)
    }

    fn ping(&self) -> LogResult<()> {
        Ok(())
    }
}

struct StaticTracker {
    info: JobInfo,
}

impl Tracker for StaticTracker {
    fn status(&self) -> LogResult<JobStatus> {
        Ok(JobStatus::Running)
    }

    fn check_in(&self, _message: &str) -> LogResult<()> {
        Ok(())
    }

    fn job(&self) -> &JobInfo {
        &self.info
    }
}

#[test]
fn test_composite_fan_out_to_two_files() {
    let temp = tempdir().unwrap();
    let a = Arc::new(FileBackend::new(temp.path(), "a.log", LogLevel::Info, 5).unwrap());
    let b = Arc::new(FileBackend::new(temp.path(), "b.log", LogLevel::Info, 5).unwrap());
    let logger = CompositeLogger::new(vec![a as Arc<dyn Backend>, b]).unwrap();

    logger.info("hello");
    logger.close().unwrap();

    for name in ["a.log", "b.log"] {
        let content = std::fs::read_to_string(temp.path().join(name)).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 1, "{name} should hold one line");
        assert!(lines[0].ends_with("hello"));
    }
}

const WORKERS: usize = 8;
const RECORDS_PER_WORKER: usize = 250;

fn worker_message(worker: usize, record: usize) -> String {
    // Long enough that a torn write would be visible.
    format!("worker-{worker} record-{record} {}", "x".repeat(256))
}

/// Every line is one complete record and every record appears exactly once.
fn assert_whole_lines(text: &str) {
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), WORKERS * RECORDS_PER_WORKER);

    let mut seen = HashSet::new();
    for line in &lines {
        assert_eq!(line.matches(" [INFO] ").count(), 1, "interleaved line: {line}");
        let (_, message) = line.split_once("]: ").unwrap();
        assert!(seen.insert(message.to_string()), "duplicate line: {line}");
    }

    for worker in 0..WORKERS {
        for record in 0..RECORDS_PER_WORKER {
            assert!(seen.contains(&worker_message(worker, record)));
        }
    }
}

#[test]
fn test_concurrent_callers_write_whole_lines() {
    let temp = tempdir().unwrap();
    let store = Arc::new(RecordingStore::default());
    let file = Arc::new(FileBackend::new(temp.path(), "job.log", LogLevel::Info, 5).unwrap());
    let db = Arc::new(DbBackend::new("job", LogLevel::Info, 5, store.clone()).unwrap());
    let logger = Arc::new(CompositeLogger::new(vec![file as Arc<dyn Backend>, db]).unwrap());

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let logger = logger.clone();
            std::thread::spawn(move || {
                for record in 0..RECORDS_PER_WORKER {
                    if record % 2 == 0 {
                        logger.info(&worker_message(worker, record));
                    } else {
                        logger.infof(format_args!("{}", worker_message(worker, record)));
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    logger.close().unwrap();

    let file_text = std::fs::read_to_string(temp.path().join("job.log")).unwrap();
    assert_whole_lines(&file_text);

    let creates = store.creates.lock();
    assert_eq!(creates.len(), 1);
    assert_whole_lines(std::str::from_utf8(&creates[0].1).unwrap());
}

#[test]
fn test_row_store_close_flush() {
    let store = Arc::new(RecordingStore::default());
    let backend = DbBackend::new("j1", LogLevel::Info, 5, store.clone()).unwrap();

    backend.info("first");
    backend.infof(format_args!("second {}", 2));
    backend.info("third");
    backend.close().unwrap();

    let creates = store.creates.lock();
    assert_eq!(creates.len(), 1);
    let (key, content) = &creates[0];
    assert_eq!(key, "j1");

    let text = String::from_utf8(content.clone()).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("first"));
    assert!(lines[1].ends_with("second 2"));
    assert!(lines[2].ends_with("third"));
}

#[test]
fn test_unclosed_row_store_backend_loses_records() {
    let store = Arc::new(RecordingStore::default());
    {
        let backend = DbBackend::new("lost", LogLevel::Debug, 5, store.clone()).unwrap();
        backend.error("never persisted");
    }
    assert!(store.creates.lock().is_empty());
}

#[test]
fn test_composite_close_names_failing_backend() {
    let temp = tempdir().unwrap();
    let file = Arc::new(FileBackend::new(temp.path(), "ok.log", LogLevel::Info, 5).unwrap());
    let logger = CompositeLogger::new(vec![file.clone() as Arc<dyn Backend>]).unwrap();

    file.close().unwrap();
    let err = logger.close().unwrap_err();
    assert!(err.to_string().contains("FILE"));
}

#[tokio::test]
async fn test_service_from_yaml_file() {
    let temp = tempdir().unwrap();
    let config_path = temp.path().join("joblog.yml");
    std::fs::write(
        &config_path,
        r#"
loggers:
  - name: FILE
    level: INFO
    settings:
      base_dir: logs
      filename: service.log
job_loggers:
  - name: file
    level: DEBUG
    settings:
      base_dir: logs/jobs
    sweeper:
      duration: 7
job_properties:
  registry: harbor.local
"#,
    )
    .unwrap();

    let config = ServiceConfig::load(&config_path).unwrap();
    let env = ServiceEnvironment::bootstrap(&config, CancellationToken::new())
        .await
        .unwrap();
    env.service_logger().info("service ready");

    let tracker = Arc::new(StaticTracker {
        info: JobInfo::new("job-1", JobKind::Generic, "WEBHOOK"),
    });
    let ctx = JobContext::build(&env, &env, tracker).await.unwrap();
    assert_eq!(ctx.get("registry"), Some(&serde_json::json!("harbor.local")));

    ctx.logger().debug("0123456789");
    ctx.finish().unwrap();

    let log = env.retrieve("job-1").unwrap();
    assert!(String::from_utf8_lossy(&log).ends_with("0123456789\n"));

    let tail = TailGetter::new(Arc::new(joblog_core::FileGetter::new(temp.path().join("logs/jobs"))), 4);
    assert_eq!(tail.retrieve("job-1").unwrap(), b"789\n");

    env.shutdown().await.unwrap();
    let service_log = std::fs::read_to_string(temp.path().join("logs/service.log")).unwrap();
    assert!(service_log.contains("service ready"));
}

#[tokio::test]
async fn test_job_properties_are_a_snapshot() {
    let temp = tempdir().unwrap();
    let config = ServiceConfig::from_yaml(&format!(
        "loggers:\n  - name: STD_OUTPUT\n    level: FATAL\njob_loggers:\n  - name: FILE\n    settings:\n      base_dir: {}\n",
        temp.path().display()
    ))
    .unwrap();
    let env = ServiceEnvironment::bootstrap(&config, CancellationToken::new())
        .await
        .unwrap();

    let mut live = HashMap::from([("mode".to_string(), serde_json::json!("full"))]);
    let tracker = Arc::new(StaticTracker {
        info: JobInfo::new("snap", JobKind::Scheduled, "GC"),
    });
    let ctx = JobContext::build(&env, &live, tracker).await.unwrap();

    live.insert("mode".to_string(), serde_json::json!("dry-run"));
    assert_eq!(ctx.get("mode"), Some(&serde_json::json!("full")));

    ctx.finish().unwrap();
    env.shutdown().await.unwrap();
}
