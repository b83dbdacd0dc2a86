//! 拉取指标收集模块
//!
//! 基于 `Pulled` 结果与诊断事件收集和统计同步引擎的运行指标。

use std::collections::HashMap;

use contracts::{Coverage, Diagnostic, Pulled};
use metrics::{counter, gauge, histogram};

/// 记录一次拉取
///
/// 每次 `get_values` 返回时调用。
pub fn record_pull(item: &str, coverage: &Coverage, updates: usize) {
    counter!(
        "timelink_pulls_total",
        "coverage" => coverage.label()
    )
    .increment(1);

    histogram!("timelink_pull_updates", "item" => item.to_string()).record(updates as f64);
}

/// 记录诊断事件
pub fn record_diagnostic(diagnostic: &Diagnostic) {
    counter!(
        "timelink_diagnostics_total",
        "level" => diagnostic.level.as_str(),
        "reason" => diagnostic.reason.to_string()
    )
    .increment(1);
}

/// 记录缓存深度
pub fn record_cache_depth(item: &str, depth: usize) {
    gauge!("timelink_cache_records", "item" => item.to_string()).set(depth as f64);
}

/// 记录孤儿适配器回收
pub fn record_adapters_reclaimed(count: usize) {
    if count > 0 {
        counter!("timelink_adapters_reclaimed_total").increment(count as u64);
    }
}

/// 拉取指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct PullMetricsAggregator {
    /// 总拉取次数
    pub total_pulls: u64,

    /// 外推拉取次数
    pub extrapolated_pulls: u64,

    /// update() 调用总数
    pub total_updates: u64,

    /// 警告诊断数
    pub warnings: u64,

    /// 错误诊断数
    pub errors: u64,

    /// 每次拉取的 update() 次数统计
    pub update_stats: RunningStats,

    /// 各外推原因次数
    pub reason_counts: HashMap<String, u64>,
}

impl PullMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, pulled: &Pulled) {
        self.total_pulls += 1;
        self.total_updates += pulled.updates as u64;
        self.update_stats.push(pulled.updates as f64);

        if let Some(reason) = pulled.coverage.reason() {
            self.extrapolated_pulls += 1;
            *self.reason_counts.entry(reason.to_string()).or_insert(0) += 1;
        }

        for diagnostic in &pulled.diagnostics {
            match diagnostic.level {
                contracts::DiagnosticLevel::Warning => self.warnings += 1,
                contracts::DiagnosticLevel::Error => self.errors += 1,
                contracts::DiagnosticLevel::Info => {}
            }
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_pulls: self.total_pulls,
            extrapolated_pulls: self.extrapolated_pulls,
            total_updates: self.total_updates,
            warnings: self.warnings,
            errors: self.errors,
            extrapolation_rate: if self.total_pulls > 0 {
                self.extrapolated_pulls as f64 / self.total_pulls as f64 * 100.0
            } else {
                0.0
            },
            updates_per_pull: StatsSummary::from(&self.update_stats),
            reason_counts: self.reason_counts.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_pulls: u64,
    pub extrapolated_pulls: u64,
    pub total_updates: u64,
    pub warnings: u64,
    pub errors: u64,
    pub extrapolation_rate: f64,
    pub updates_per_pull: StatsSummary,
    pub reason_counts: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Pull Metrics Summary ===")?;
        writeln!(f, "Total pulls: {}", self.total_pulls)?;
        writeln!(
            f,
            "Extrapolated pulls: {} ({:.2}%)",
            self.extrapolated_pulls, self.extrapolation_rate
        )?;
        writeln!(f, "update() calls: {}", self.total_updates)?;
        writeln!(f, "Updates per pull: {}", self.updates_per_pull)?;
        writeln!(f, "Diagnostics: {} warnings, {} errors", self.warnings, self.errors)?;

        if !self.reason_counts.is_empty() {
            writeln!(f, "Extrapolation reasons:")?;
            let mut reasons: Vec<_> = self.reason_counts.iter().collect();
            reasons.sort();
            for (reason, count) in reasons {
                writeln!(f, "  {}: {}", reason, count)?;
            }
        }

        Ok(())
    }
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
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
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

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
