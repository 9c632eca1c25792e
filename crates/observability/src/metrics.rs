//! 投递指标收集模块
//!
//! 通过 `metrics` facade 上报计数器/直方图，并提供批次大小等在线统计。

use metrics::{counter, gauge, histogram};

/// 记录收到一条读数 (collector 侧)
pub fn record_reading_received(source: &str) {
    counter!(
        "sensor_stream_readings_received_total",
        "source" => source.to_string()
    )
    .increment(1);
}

/// 记录一条读数成功输出
pub fn record_reading_delivered(sink_name: &str, attempts: u32) {
    counter!(
        "sensor_stream_readings_delivered_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
    histogram!("sensor_stream_delivery_attempts").record(attempts as f64);
}

/// 记录一次重试 (退避前)
pub fn record_retry(sink_name: &str, backoff_ms: u64) {
    counter!(
        "sensor_stream_retries_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
    histogram!("sensor_stream_retry_backoff_ms").record(backoff_ms as f64);
}

/// 记录重试耗尽后被放弃的读数
pub fn record_reading_abandoned(sink_name: &str, device_id: &str) {
    counter!(
        "sensor_stream_readings_abandoned_total",
        "sink" => sink_name.to_string(),
        "device_id" => device_id.to_string()
    )
    .increment(1);
}

/// 记录一次批量刷新
///
/// `reason`: size / timeout / drain
pub fn record_batch_flushed(batch_len: usize, reason: &str) {
    counter!(
        "sensor_stream_batches_flushed_total",
        "reason" => reason.to_string()
    )
    .increment(1);
    histogram!("sensor_stream_batch_size").record(batch_len as f64);
}

/// 记录数据源结束
///
/// `state`: done / failed / cancelled
pub fn record_source_finished(source: &str, state: &str, finished: usize, total: usize) {
    counter!(
        "sensor_stream_sources_finished_total",
        "source" => source.to_string(),
        "state" => state.to_string()
    )
    .increment(1);
    gauge!("sensor_stream_sources_running").set(total.saturating_sub(finished) as f64);
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.2} (n={})",
                self.min, self.max, self.mean, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}
