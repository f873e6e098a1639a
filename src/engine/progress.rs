// ==========================================
// 后台导入系统 - 导入进度跟踪
// ==========================================
// 职责: 维护 processed / total / percent，计算吞吐与剩余时间
// 红线:
// - percent 单调不减，最终恰好为 100
// - processed <= total
// - 模拟阶段的进度必须带 simulated 标记，不能当作存储端真实进度
// ==========================================

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

// 阶段百分比
pub const PREPARATION_STEPS: [f64; 3] = [5.0, 20.0, 35.0];
pub const SWEEP_START: f64 = 35.0;
pub const SWEEP_END: f64 = 85.0;
pub const AWAITING_STORE: f64 = 90.0;
pub const COMPLETE: f64 = 100.0;

// ==========================================
// ProgressPhase - 进度阶段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Preparing,     // 准备（0 → 35%）
    Simulated,     // 本地分批模拟推进（35 → 85%）
    AwaitingStore, // 等待存储端返回（90%）
    Settled,       // 调用结束（100%）
}

impl ProgressPhase {
    /// 该阶段的进度是否为模拟值
    pub fn is_simulated(&self) -> bool {
        matches!(self, ProgressPhase::Preparing | ProgressPhase::Simulated)
    }
}

/// 吞吐与剩余时间估算
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Throughput {
    pub records_per_second: f64,
    pub remaining: Duration,
    pub elapsed: Duration,
}

/// 单次进度快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub phase: ProgressPhase,
    pub percent: f64,
    pub processed: usize,
    pub total: usize,
    pub simulated: bool,
    pub throughput: Option<Throughput>,
}

// ==========================================
// ProgressTracker
// ==========================================
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: usize,
    processed: usize,
    percent: f64,
    phase: ProgressPhase,
    started_at: Instant,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self::started_at(total, Instant::now())
    }

    pub fn started_at(total: usize, started_at: Instant) -> Self {
        Self {
            total,
            processed: 0,
            percent: 0.0,
            phase: ProgressPhase::Preparing,
            started_at,
        }
    }

    /// 推进进度；回退的 percent / processed 被忽略，超出上限的被截断
    pub fn advance(&mut self, phase: ProgressPhase, percent: f64, processed: usize) -> ProgressSnapshot {
        let percent = if percent.is_finite() {
            percent.clamp(0.0, COMPLETE)
        } else {
            self.percent
        };

        self.percent = self.percent.max(percent);
        self.processed = self.processed.max(processed.min(self.total));
        self.phase = phase;
        self.snapshot()
    }

    /// 调用结束: 进度置为 100
    pub fn settle(&mut self, processed: usize) -> ProgressSnapshot {
        self.advance(ProgressPhase::Settled, COMPLETE, processed)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> ProgressSnapshot {
        ProgressSnapshot {
            phase: self.phase,
            percent: self.percent,
            processed: self.processed,
            total: self.total,
            simulated: self.phase.is_simulated(),
            throughput: self.throughput_at(now),
        }
    }

    /// 吞吐估算，仅在 0 < processed < total 时给出
    ///
    /// - rate = processed / elapsed
    /// - remaining = (elapsed / processed) * (total - processed)
    pub fn throughput_at(&self, now: Instant) -> Option<Throughput> {
        if self.processed == 0 || self.processed >= self.total {
            return None;
        }

        let elapsed = now.saturating_duration_since(self.started_at);
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return None;
        }

        let per_record = secs / self.processed as f64;
        let remaining = per_record * (self.total - self.processed) as f64;

        Some(Throughput {
            records_per_second: self.processed as f64 / secs,
            remaining: Duration::from_secs_f64(remaining),
            elapsed,
        })
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

// ==========================================
// 模拟分批计划
// ==========================================

/// 一个模拟批次结束时的位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepStep {
    pub processed: usize,
    pub percent: f64,
}

/// 生成模拟推进计划: batch_size = ceil(total / batches)，
/// 每批结束时 percent 在 35 → 85 之间按已处理行数线性分布
///
/// 行数少于批次数时批次数随行数减少；total 为 0 时计划为空
pub fn sweep_plan(total: usize, batches: usize) -> Vec<SweepStep> {
    if total == 0 {
        return Vec::new();
    }

    let batches = batches.clamp(1, total);
    let batch_size = total.div_ceil(batches);

    let mut steps = Vec::with_capacity(batches);
    let mut processed = 0;
    while processed < total {
        processed = (processed + batch_size).min(total);
        let ratio = processed as f64 / total as f64;
        steps.push(SweepStep {
            processed,
            percent: SWEEP_START + (SWEEP_END - SWEEP_START) * ratio,
        });
    }
    steps
}
