//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 立即 / 批量模式的端到端场景
//! - 故障隔离、重试、取消
//! - 配置文件驱动的完整运行

#[cfg(test)]
mod support {
    use std::collections::HashMap;
    use std::time::Duration;

    use contracts::{BoxedSource, SourceConfig};
    use ingestion::SimulatedSensor;

    pub fn sensors(ids: &[(&str, u64)]) -> Vec<BoxedSource> {
        ids.iter()
            .map(|(id, delay_ms)| {
                SimulatedSensor::with_delay(id, Duration::from_millis(*delay_ms)).boxed()
            })
            .collect()
    }

    pub fn sensor(config: SourceConfig) -> BoxedSource {
        SimulatedSensor::new(config).boxed()
    }

    /// Group emitted lines by device, keeping emission order
    pub fn by_device(lines: &[String]) -> HashMap<String, Vec<String>> {
        let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
        for line in lines {
            let (device, _) = line.split_once(": ").expect("line has a device prefix");
            grouped.entry(device.to_string()).or_default().push(line.clone());
        }
        grouped
    }

    /// The five default readings of a simulated sensor, rendered
    pub fn default_lines(device: &str) -> Vec<String> {
        ["20.0", "20.5", "21.0", "21.5", "22.0"]
            .iter()
            .map(|v| format!("{device}: value={v}"))
            .collect()
    }
}

#[cfg(test)]
mod immediate_tests {
    use std::time::Duration;

    use contracts::{EngineConfig, RetryConfig, SourceConfig};
    use dispatcher::MemorySink;
    use engine::{run_immediate, StreamEngine};
    use ingestion::SourceState;

    use crate::support::{by_device, default_lines, sensor, sensors};

    #[tokio::test(start_paused = true)]
    async fn test_three_sensors_emit_fifteen_lines_in_order() {
        let sink = MemorySink::new("mem");
        let report = run_immediate(
            sensors(&[("sensor_1", 300), ("sensor_2", 500), ("sensor_3", 400)]),
            sink.clone(),
        )
        .await
        .unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 15);
        let grouped = by_device(&lines);
        for device in ["sensor_1", "sensor_2", "sensor_3"] {
            assert_eq!(grouped[device], default_lines(device));
        }
        assert_eq!(report.sources_in(SourceState::Done), 3);
        assert_eq!(report.abandoned, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_does_not_block_fast_one() {
        let sink = MemorySink::new("mem");
        run_immediate(sensors(&[("slow", 1000), ("fast", 10)]), sink.clone())
            .await
            .unwrap();

        let lines = sink.lines();
        // The fast sensor finishes long before the slow one emits its first reading.
        assert!(lines[..5].iter().all(|l| l.starts_with("fast:")));
        assert!(lines[5..].iter().all(|l| l.starts_with("slow:")));
    }

    #[tokio::test]
    async fn test_empty_source_list_returns_immediately() {
        let sink = MemorySink::new("mem");
        let report = tokio::time::timeout(
            Duration::from_secs(1),
            run_immediate(Vec::new(), sink.clone()),
        )
        .await
        .expect("empty run must not hang")
        .unwrap();

        assert!(sink.is_empty());
        assert_eq!(report.delivered, 0);
        assert!(report.sources.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let sink = MemorySink::new("mem");
        sink.fail_next(2);

        let start = tokio::time::Instant::now();
        let report = run_immediate(sensors(&[("sensor_1", 0)]), sink.clone())
            .await
            .unwrap();

        assert_eq!(sink.lines(), default_lines("sensor_1"));
        assert_eq!(report.retries, 2);
        assert_eq!(report.write_failures, 2);
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_readings_are_dropped_not_fatal() {
        let sink = MemorySink::new("mem");
        sink.fail_device("broken");

        let report = StreamEngine::new(EngineConfig {
            retry: RetryConfig::new(3, Duration::from_millis(50)),
            ..Default::default()
        })
        .run_immediate(sensors(&[("broken", 0), ("ok", 0)]), sink.clone())
        .await
        .unwrap();

        // emitted == produced - abandoned
        assert_eq!(report.readings_received, 10);
        assert_eq!(report.abandoned, 5);
        assert_eq!(sink.lines(), default_lines("ok"));
        assert_eq!(report.sources_in(SourceState::Done), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_source_is_isolated() {
        let mut faulty = SourceConfig::new("faulty", Duration::from_millis(100));
        faulty.fail_after = Some(2);

        let sink = MemorySink::new("mem");
        let report = run_immediate(
            vec![sensor(faulty), sensor(SourceConfig::new("healthy", Duration::from_millis(100)))],
            sink.clone(),
        )
        .await
        .unwrap();

        let grouped = by_device(&sink.lines());
        assert_eq!(grouped["faulty"], default_lines("faulty")[..2].to_vec());
        assert_eq!(grouped["healthy"], default_lines("healthy"));
        assert_eq!(
            report.sources,
            vec![
                ("faulty".to_string(), SourceState::Failed),
                ("healthy".to_string(), SourceState::Done),
            ]
        );
    }

    #[tokio::test]
    async fn test_idempotent_output() {
        async fn run_once() -> Vec<String> {
            let sink = MemorySink::new("mem");
            run_immediate(sensors(&[("a", 0), ("b", 0)]), sink.clone())
                .await
                .unwrap();
            let mut lines = sink.lines();
            lines.sort();
            lines
        }

        let first = run_once().await;
        let second = run_once().await;
        assert_eq!(first.len(), 10);
        assert_eq!(first, second);
    }
}

#[cfg(test)]
mod batched_tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use contracts::{BatchConfig, DeliveryMode, EngineConfig, SourceConfig};
    use dispatcher::{FlushReason, MemorySink};
    use engine::{run_batched, StreamEngine};
    use ingestion::SourceState;

    use crate::support::{by_device, default_lines, sensor, sensors};

    #[tokio::test(start_paused = true)]
    async fn test_two_sources_three_readings_each() {
        let mut a = SourceConfig::new("a", Duration::from_millis(10));
        a.count = 3;
        let mut b = SourceConfig::new("b", Duration::from_millis(10));
        b.count = 3;

        let sink = MemorySink::new("mem");
        let report = run_batched(
            vec![sensor(a), sensor(b)],
            sink.clone(),
            5,
            Duration::from_millis(100),
        )
        .await
        .unwrap();

        assert_eq!(sink.len(), 6);
        assert!(report.flushes.len() >= 2);
        assert!(report.flush_sizes().iter().all(|&n| n <= 5));
        assert_eq!(report.flush_sizes().iter().sum::<usize>(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_source_flush_sizes() {
        let sink = MemorySink::new("mem");
        let report = run_batched(
            sensors(&[("sensor_1", 100)]),
            sink.clone(),
            2,
            Duration::from_secs(1000),
        )
        .await
        .unwrap();

        assert_eq!(report.flush_sizes(), vec![2, 2, 1]);
        let reasons: Vec<FlushReason> = report.flushes.iter().map(|f| f.reason).collect();
        assert_eq!(
            reasons,
            vec![FlushReason::Size, FlushReason::Size, FlushReason::Drain]
        );
        assert_eq!(sink.lines(), default_lines("sensor_1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_duplicates_or_omissions() {
        let ids = [("s1", 7), ("s2", 11), ("s3", 13), ("s4", 3)];
        let sink = MemorySink::new("mem");
        run_batched(sensors(&ids), sink.clone(), 3, Duration::from_millis(20))
            .await
            .unwrap();

        let lines = sink.lines();
        let unique: HashSet<&String> = lines.iter().collect();
        assert_eq!(lines.len(), 20);
        assert_eq!(unique.len(), 20);

        let grouped = by_device(&lines);
        for (id, _) in ids {
            assert_eq!(grouped[id], default_lines(id));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_flushes_slow_trickle() {
        let sink = MemorySink::new("mem");
        let report = run_batched(
            sensors(&[("trickle", 500)]),
            sink.clone(),
            10,
            Duration::from_millis(200),
        )
        .await
        .unwrap();

        assert_eq!(report.delivered, 5);
        assert!(report
            .flushes
            .iter()
            .any(|f| f.reason == FlushReason::Timeout));
    }

    #[tokio::test]
    async fn test_empty_source_list() {
        let sink = MemorySink::new("mem");
        let report = run_batched(Vec::new(), sink.clone(), 10, Duration::from_secs(1))
            .await
            .unwrap();

        assert!(sink.is_empty());
        assert!(report.flushes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_source_still_drains_the_rest() {
        let mut faulty = SourceConfig::new("faulty", Duration::from_millis(5));
        faulty.fail_after = Some(0);

        let sink = MemorySink::new("mem");
        let report = StreamEngine::new(EngineConfig {
            mode: DeliveryMode::Batched,
            batch: BatchConfig::new(4, Duration::from_secs(10)),
            ..Default::default()
        })
        .run(
            vec![sensor(faulty), sensor(SourceConfig::new("ok", Duration::from_millis(5)))],
            sink.clone(),
        )
        .await
        .unwrap();

        assert_eq!(sink.lines(), default_lines("ok"));
        assert_eq!(report.sources_in(SourceState::Failed), 1);
        assert_eq!(report.flush_sizes(), vec![4, 1]);
    }
}

#[cfg(test)]
mod cancellation_tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use contracts::{BatchConfig, DeliveryMode, EngineConfig, SourceConfig};
    use dispatcher::MemorySink;
    use engine::StreamEngine;
    use ingestion::SourceState;
    use tokio_util::sync::CancellationToken;

    use crate::support::sensor;

    fn endless(id: &str, delay_ms: u64) -> SourceConfig {
        let mut config = SourceConfig::new(id, Duration::from_millis(delay_ms));
        config.count = usize::MAX;
        config
    }

    async fn run_cancelled(mode: DeliveryMode) -> (MemorySink, engine::RunReport) {
        let cancel = CancellationToken::new();
        let engine = StreamEngine::with_cancellation(
            EngineConfig {
                mode,
                batch: BatchConfig::new(50, Duration::from_secs(100)),
                ..Default::default()
            },
            cancel.clone(),
        );

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1050)).await;
            cancel.cancel();
        });

        let sink = MemorySink::new("mem");
        let report = engine
            .run(vec![sensor(endless("a", 100)), sensor(endless("b", 250))], sink.clone())
            .await
            .unwrap();
        (sink, report)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_batched_flushes_partial_batch() {
        let (sink, report) = run_cancelled(DeliveryMode::Batched).await;

        // a: 10 readings by 1.0s, b: 4 by 1.0s
        assert_eq!(sink.len(), 14);
        assert_eq!(report.flush_sizes(), vec![14]);
        assert_eq!(report.sources_in(SourceState::Cancelled), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_immediate_emits_no_duplicates() {
        let (sink, report) = run_cancelled(DeliveryMode::Immediate).await;

        let lines = sink.lines();
        let unique: HashSet<&String> = lines.iter().collect();
        assert_eq!(lines.len(), 14);
        assert_eq!(unique.len(), lines.len());
        assert_eq!(report.delivered, 14);
        assert_eq!(report.sources_in(SourceState::Cancelled), 2);
    }
}

#[cfg(test)]
mod config_tests {
    use std::io::Write;

    use config_loader::{ConfigFormat, ConfigLoader};
    use dispatcher::{ConfiguredSink, MemorySink, SinkKind};
    use engine::StreamEngine;
    use ingestion::SimulatedSensor;

    use crate::support::{by_device, default_lines};

    const DEMO: &str = r#"
[engine]
mode = "batched"

[engine.batch]
batch_size = 4
batch_timeout_ms = 250

[[sources]]
device_id = "sensor_1"
delay_ms = 300

[[sources]]
device_id = "sensor_2"
delay_ms = 500

[[sources]]
device_id = "sensor_3"
delay_ms = 400
"#;

    #[tokio::test(start_paused = true)]
    async fn test_config_driven_batched_run() {
        let config = ConfigLoader::load_from_str(DEMO, ConfigFormat::Toml).unwrap();
        let sink = MemorySink::new("mem");

        let report = StreamEngine::new(config.engine.clone())
            .run(SimulatedSensor::from_configs(&config.sources), sink.clone())
            .await
            .unwrap();

        let grouped = by_device(&sink.lines());
        assert_eq!(grouped.len(), 3);
        for device in ["sensor_1", "sensor_2", "sensor_3"] {
            assert_eq!(grouped[device], default_lines(device));
        }
        assert!(report.flush_sizes().iter().all(|&n| n <= 4));
    }

    #[tokio::test]
    async fn test_file_sink_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.log");

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(
            br#"
[[sources]]
device_id = "sensor_1"
count = 3
base_value = 1.24
step = 1.0
"#,
        )
        .unwrap();
        let config = ConfigLoader::load_from_path(file.path()).unwrap();

        let sink = ConfiguredSink::create("file", &SinkKind::File(path.clone()))
            .await
            .unwrap();
        let report = StreamEngine::new(config.engine.clone())
            .run(SimulatedSensor::from_configs(&config.sources), sink)
            .await
            .unwrap();

        assert_eq!(report.delivered, 3);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "sensor_1: value=1.2\nsensor_1: value=2.2\nsensor_1: value=3.2\n"
        );
    }
}
