//! Orchestrator tests with in-memory providers and actions.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::*;
use crate::bucket::ServerKey;
use crate::resolver::StaticResolver;
use crate::task::{SkipReason, TaskError, TaskOutcome};

fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 0, 2, last))
}

fn written(dest: &str, host: &str, source: &str) -> DownloadTask {
    let path = PathBuf::from(dest);
    DownloadTask::new(dest, host, source, move || Ok(TaskOutcome::Written(path.clone())))
}

fn skipped(dest: &str, host: &str, source: &str) -> DownloadTask {
    DownloadTask::new(dest, host, source, || {
        Ok(TaskOutcome::Skipped(SkipReason::Exists))
    })
}

fn failing(dest: &str, host: &str, source: &str) -> DownloadTask {
    DownloadTask::new(dest, host, source, || {
        Err(TaskError::Other("HTTP 503".to_string()))
    })
}

struct FixedProvider {
    name: &'static str,
    tasks: Vec<DownloadTask>,
}

impl Provider for FixedProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn discover(&self, _recency: Option<u32>) -> anyhow::Result<Vec<DownloadTask>> {
        Ok(self.tasks.clone())
    }
}

struct FailingProvider;

impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "BROKEN"
    }

    fn discover(&self, _recency: Option<u32>) -> anyhow::Result<Vec<DownloadTask>> {
        anyhow::bail!("index page returned HTTP 500")
    }
}

struct PanickingProvider;

impl Provider for PanickingProvider {
    fn name(&self) -> &str {
        "PANIC"
    }

    fn discover(&self, _recency: Option<u32>) -> anyhow::Result<Vec<DownloadTask>> {
        panic!("scraper bug")
    }
}

/// Records the recency bound it was asked for.
struct RecencyProvider {
    seen: Arc<AtomicUsize>,
}

impl Provider for RecencyProvider {
    fn name(&self) -> &str {
        "RECENT"
    }

    fn discover(&self, recency: Option<u32>) -> anyhow::Result<Vec<DownloadTask>> {
        self.seen.store(recency.unwrap_or(0) as usize, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

fn fixed(name: &'static str, tasks: Vec<DownloadTask>) -> Arc<dyn Provider> {
    Arc::new(FixedProvider { name, tasks })
}

fn options(workers: usize) -> RunOptions {
    RunOptions {
        workers,
        ..RunOptions::default()
    }
}

fn orchestrator(workers: usize, resolver: StaticResolver) -> Orchestrator {
    Orchestrator::new(options(workers), Arc::new(resolver))
}

#[test]
fn limiter_config_starts_at_pool_size_and_clamps_min() {
    let opts = RunOptions {
        workers: 8,
        min_workers: 20,
        window: 10,
        ..RunOptions::default()
    };
    let cfg = opts.limiter_config();
    assert_eq!((cfg.initial, cfg.min, cfg.max, cfg.window), (8, 8, 8, 10));

    let opts = RunOptions {
        workers: 0,
        min_workers: 0,
        ..RunOptions::default()
    };
    let cfg = opts.limiter_config();
    assert_eq!((cfg.min, cfg.max), (1, 1));
}

#[test]
fn options_follow_config() {
    let cfg = PublogsConfig {
        workers: 6,
        adaptive: false,
        min_workers: 2,
        ..PublogsConfig::default()
    };
    let opts = RunOptions::from_config(&cfg);
    assert_eq!(opts.workers, 6);
    assert!(!opts.adaptive);
    assert_eq!(opts.min_workers, 2);
    assert_eq!(RunOptions::default().workers, 20);
}

#[tokio::test]
async fn failing_provider_contributes_nothing_and_the_run_continues() {
    let tasks: Vec<DownloadTask> = (0..5)
        .map(|i| written(&format!("CQWW/{i}.log"), "cqww.com", "CQWW"))
        .collect();
    let providers = vec![Arc::new(FailingProvider) as Arc<dyn Provider>, fixed("CQWW", tasks)];
    let orch = orchestrator(4, StaticResolver::new().with("cqww.com", ip(1)));

    let summary = orch.run(&providers, None).await.unwrap();

    assert_eq!(summary.providers.len(), 2);
    assert_eq!(summary.providers[0].name, "BROKEN");
    assert_eq!(summary.providers[0].tasks, 0);
    assert!(summary.providers[0].error.as_deref().unwrap().contains("HTTP 500"));
    assert_eq!(summary.providers[1].name, "CQWW");
    assert_eq!(summary.providers[1].tasks, 5);
    assert_eq!(summary.discovered, 5);
    assert_eq!(summary.buckets.len(), 1);
    assert_eq!(summary.buckets[0].completed(), 5);
    assert_eq!(summary.written, 5);
    assert!(summary.produced_output());
}

#[tokio::test]
async fn panicking_provider_is_isolated() {
    let providers = vec![
        fixed("A", vec![written("a.log", "a.example", "A")]),
        Arc::new(PanickingProvider) as Arc<dyn Provider>,
    ];
    let orch = orchestrator(2, StaticResolver::new());
    let discovery = orch.discover(&providers, None).await;
    assert_eq!(discovery.total(), 1);
    assert_eq!(discovery.reports[1].name, "PANIC");
    assert_eq!(discovery.reports[1].error.as_deref(), Some("discovery panicked"));
}

#[tokio::test]
async fn reports_follow_selection_order_not_completion_order() {
    struct Slow;
    impl Provider for Slow {
        fn name(&self) -> &str {
            "SLOW"
        }
        fn discover(&self, _recency: Option<u32>) -> anyhow::Result<Vec<DownloadTask>> {
            std::thread::sleep(Duration::from_millis(50));
            Ok(vec![written("slow.log", "a.example", "SLOW")])
        }
    }
    let providers = vec![
        Arc::new(Slow) as Arc<dyn Provider>,
        fixed("FAST", vec![written("fast.log", "a.example", "FAST")]),
    ];
    let orch = orchestrator(4, StaticResolver::new());
    let discovery = orch.discover(&providers, None).await;
    let names: Vec<&str> = discovery.reports.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["SLOW", "FAST"]);
    assert_eq!(discovery.tasks[0].source(), "SLOW");
}

#[tokio::test]
async fn recency_bound_is_passed_to_providers() {
    let seen = Arc::new(AtomicUsize::new(0));
    let providers = vec![Arc::new(RecencyProvider { seen: Arc::clone(&seen) }) as Arc<dyn Provider>];
    let orch = orchestrator(1, StaticResolver::new());
    orch.discover(&providers, Some(3)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 3);
}

fn counted(dest: &str, host: &str, source: &str, runs: &Arc<AtomicUsize>) -> DownloadTask {
    let runs = Arc::clone(runs);
    let path = PathBuf::from(dest);
    DownloadTask::new(dest, host, source, move || {
        runs.fetch_add(1, Ordering::SeqCst);
        Ok(TaskOutcome::Written(path.clone()))
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_destination_runs_once_for_the_first_selected_provider() {
    let first_runs = Arc::new(AtomicUsize::new(0));
    let second_runs = Arc::new(AtomicUsize::new(0));

    struct Delayed(Vec<DownloadTask>);
    impl Provider for Delayed {
        fn name(&self) -> &str {
            "CQWW"
        }
        fn discover(&self, _recency: Option<u32>) -> anyhow::Result<Vec<DownloadTask>> {
            std::thread::sleep(Duration::from_millis(50));
            Ok(self.0.clone())
        }
    }

    // The first provider in selection order finishes discovery last.
    let providers = vec![
        Arc::new(Delayed(vec![
            counted("CQWW/cw/2023/k1abc.log", "cqww.com", "CQWW", &first_runs),
            counted("CQWW/cw/2023/dl1xyz.log", "cqww.com", "CQWW", &first_runs),
        ])) as Arc<dyn Provider>,
        fixed(
            "MIRROR",
            vec![
                counted("CQWW/cw/2023/k1abc.log", "mirror.example", "MIRROR", &second_runs),
                counted("CQWW/cw/2023/ea1aaa.log", "mirror.example", "MIRROR", &second_runs),
                counted("CQWW/cw/2023/ea1aaa.log", "mirror.example", "MIRROR", &second_runs),
            ],
        ),
    ];
    let orch = orchestrator(4, StaticResolver::new().with("cqww.com", ip(1)));

    let summary = orch.run(&providers, None).await.unwrap();

    assert_eq!(summary.discovered, 3);
    assert_eq!((summary.providers[0].tasks, summary.providers[0].duplicates), (2, 0));
    assert_eq!((summary.providers[1].tasks, summary.providers[1].duplicates), (1, 2));
    assert_eq!((summary.written, summary.skipped, summary.failed), (3, 0, 0));
    assert_eq!(first_runs.load(Ordering::SeqCst), 2);
    assert_eq!(second_runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn phase_hook_sees_discovery_then_buckets() {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let providers = vec![
        fixed("A", vec![written("a.log", "a.example", "A"), written("b.log", "b.example", "A")]),
        Arc::new(FailingProvider) as Arc<dyn Provider>,
    ];
    let orch = orchestrator(2, StaticResolver::new()).with_phase_hook({
        let seen = Arc::clone(&seen);
        move |phase: RunPhase<'_>| {
            let line = match phase {
                RunPhase::Discovered(d) => format!("discovered {} from {}", d.total(), d.reports.len()),
                RunPhase::Bucketed(b) => format!("bucketed {} into {}", b.total_tasks(), b.len()),
            };
            seen.lock().unwrap().push(line);
        }
    });

    let summary = orch.run(&providers, None).await.unwrap();
    assert_eq!(summary.written, 2);
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["discovered 2 from 2".to_string(), "bucketed 2 into 2".to_string()]
    );
}

#[tokio::test]
async fn empty_selection_is_a_start_up_error() {
    let orch = orchestrator(1, StaticResolver::new());
    let err = orch.run(&[], None).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NoProviders));
}

#[tokio::test]
async fn unresolved_hosts_bucket_by_hostname() {
    let same = vec![
        written("1.log", "dxhf2.darc.de", "WAE"),
        written("2.log", "dxhf2.darc.de", "WAE"),
        written("3.log", "dxhf2.darc.de", "WAE"),
    ];
    let orch = orchestrator(2, StaticResolver::new());
    let summary = orch.run(&[fixed("WAE", same)], None).await.unwrap();
    assert_eq!(summary.buckets.len(), 1);
    assert_eq!(
        summary.buckets[0].key,
        ServerKey::Unresolved("dxhf2.darc.de".to_string())
    );
    assert_eq!(summary.buckets[0].written, 3);

    let different = vec![
        written("1.log", "one.example", "X"),
        written("2.log", "two.example", "X"),
        written("3.log", "three.example", "X"),
    ];
    let summary = orch.run(&[fixed("X", different)], None).await.unwrap();
    assert_eq!(summary.buckets.len(), 3);
    assert!(summary.buckets.iter().all(|b| b.tasks == 1 && b.written == 1));
}

#[tokio::test]
async fn hostnames_sharing_an_address_across_providers_share_a_bucket() {
    let resolver = StaticResolver::new()
        .with("cqww.com", ip(1))
        .with("cqwpx.com", ip(1))
        .with("contests.arrl.org", ip(2));
    let providers = vec![
        fixed("CQWW", vec![written("a.log", "cqww.com", "CQWW")]),
        fixed(
            "CQWPX",
            vec![
                written("b.log", "cqwpx.com", "CQWPX"),
                written("c.log", "cqwpx.com", "CQWPX"),
            ],
        ),
        fixed("ARRL", vec![written("d.log", "contests.arrl.org", "ARRL")]),
    ];
    let summary = orchestrator(4, resolver).run(&providers, None).await.unwrap();
    assert_eq!(summary.buckets.len(), 2);
    let shared = summary
        .buckets
        .iter()
        .find(|b| b.key == ServerKey::Address(ip(1)))
        .unwrap();
    assert_eq!(shared.tasks, 3);
    assert_eq!(shared.hosts, vec!["cqwpx.com", "cqww.com"]);
    assert_eq!(summary.written, 4);
}

#[tokio::test]
async fn only_skips_and_failures_is_the_no_work_condition() {
    let tasks = vec![
        skipped("a.log", "a.example", "A"),
        skipped("b.log", "a.example", "A"),
        failing("c.log", "a.example", "A"),
    ];
    let summary = orchestrator(2, StaticResolver::new())
        .run(&[fixed("A", tasks)], None)
        .await
        .unwrap();
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.written, 0);
    assert!(!summary.produced_output());
}

#[tokio::test]
async fn panicking_action_fails_only_its_own_task() {
    let tasks = vec![
        written("a.log", "a.example", "A"),
        DownloadTask::new("boom.log", "a.example", "A", || -> Result<TaskOutcome, TaskError> {
            panic!("parser bug")
        }),
        written("b.log", "a.example", "A"),
    ];
    let (tx, mut rx) = mpsc::channel(16);
    let orch = orchestrator(1, StaticResolver::new()).with_events(tx);
    let summary = orch.run(&[fixed("A", tasks)], None).await.unwrap();
    drop(orch);

    assert_eq!(summary.written, 2);
    assert_eq!(summary.failed, 1);

    let mut failed = Vec::new();
    while let Some(event) = rx.recv().await {
        if let TaskStatus::Failed(msg) = &event.status {
            failed.push((event.destination.clone(), msg.clone()));
        }
    }
    assert_eq!(failed, vec![(PathBuf::from("boom.log"), "action panicked".to_string())]);
}

#[tokio::test]
async fn one_event_per_task() {
    let tasks: Vec<DownloadTask> = (0..6)
        .map(|i| {
            let host = if i % 2 == 0 { "a.example" } else { "b.example" };
            written(&format!("{i}.log"), host, "A")
        })
        .collect();
    let (tx, mut rx) = mpsc::channel(64);
    let orch = orchestrator(3, StaticResolver::new()).with_events(tx);
    orch.run(&[fixed("A", tasks)], None).await.unwrap();
    drop(orch);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert_eq!(events.len(), 6);
    assert!(events.iter().all(|e| e.status == TaskStatus::Written && e.source == "A"));
    assert!(events.iter().any(|e| e.bucket == "b.example (unresolved)"));
}

#[tokio::test]
async fn adaptive_off_means_no_limiter() {
    let mut opts = options(2);
    opts.adaptive = false;
    let orch = Orchestrator::new(opts, Arc::new(StaticResolver::new()));
    let summary = orch
        .run(&[fixed("A", vec![written("a.log", "a.example", "A")])], None)
        .await
        .unwrap();
    assert!(summary.buckets[0].limiter.is_none());
    assert_eq!(summary.written, 1);

    let summary = orchestrator(2, StaticResolver::new())
        .run(&[fixed("A", vec![written("a.log", "a.example", "A")])], None)
        .await
        .unwrap();
    let snapshot = summary.buckets[0].limiter.unwrap();
    assert_eq!(snapshot.limit, 2);
    assert_eq!(snapshot.in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_pool_bounds_concurrency_per_bucket() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let tasks: Vec<DownloadTask> = (0..12)
        .map(|i| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let path = PathBuf::from(format!("{i}.log"));
            DownloadTask::new(path.clone(), "a.example", "A", move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(TaskOutcome::Written(path.clone()))
            })
        })
        .collect();

    let summary = orchestrator(3, StaticResolver::new())
        .run(&[fixed("A", tasks)], None)
        .await
        .unwrap();
    assert_eq!(summary.written, 12);
    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak concurrency {peak}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failures_shrink_the_bucket_limit_without_losing_tasks() {
    let opts = RunOptions {
        workers: 4,
        adaptive: true,
        min_workers: 1,
        window: 4,
        up_threshold: 0.0,
        down_threshold: 0.3,
    };
    let tasks: Vec<DownloadTask> = (0..16)
        .map(|i| failing(&format!("{i}.log"), "flaky.example", "F"))
        .collect();
    let orch = Orchestrator::new(opts, Arc::new(StaticResolver::new()));
    let summary = orch.run(&[fixed("F", tasks)], None).await.unwrap();

    assert_eq!(summary.failed, 16);
    let snapshot = summary.buckets[0].limiter.unwrap();
    assert!(snapshot.limit < 4 && snapshot.limit >= 1, "limit {}", snapshot.limit);
    assert_eq!(snapshot.in_flight, 0);
}

#[tokio::test]
async fn buckets_do_not_share_limiters() {
    let opts = RunOptions {
        workers: 4,
        adaptive: true,
        min_workers: 1,
        window: 4,
        up_threshold: 0.0,
        down_threshold: 0.3,
    };
    let mut tasks: Vec<DownloadTask> = (0..8)
        .map(|i| failing(&format!("bad-{i}.log"), "bad.example", "X"))
        .collect();
    tasks.extend((0..8).map(|i| written(&format!("good-{i}.log"), "good.example", "X")));
    let orch = Orchestrator::new(opts, Arc::new(StaticResolver::new()));
    let summary = orch.run(&[fixed("X", tasks)], None).await.unwrap();

    let by_host = |host: &str| {
        summary
            .buckets
            .iter()
            .find(|b| b.hosts == vec![host.to_string()])
            .and_then(|b| b.limiter)
            .unwrap()
    };
    assert!(by_host("bad.example").limit < 4);
    assert_eq!(by_host("good.example").limit, 4);
}
