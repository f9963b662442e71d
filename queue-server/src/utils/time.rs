//! 时间工具函数
//!
//! 业务日期按 UTC 日历日划分 (`created_at` 的 UTC 日期)。
//! 所有时间戳均为 Unix millis。

use chrono::NaiveDate;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use super::{AppError, AppResult};

/// 时钟 - 允许测试中注入固定时间
pub trait Clock: Send + Sync + fmt::Debug {
    /// 当前时间 (Unix millis)
    fn now_millis(&self) -> i64;

    /// 当前业务日期 (UTC)
    fn today(&self) -> NaiveDate {
        shared::util::utc_date_of(self.now_millis())
    }
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        shared::util::now_millis()
    }
}

/// 手动时钟 (测试用)
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.now.fetch_add(minutes * 60_000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// 解析日期字符串 (YYYY-MM-DD)
pub fn parse_date(date: &str) -> AppResult<NaiveDate> {
    shared::util::parse_date_key(date)
        .ok_or_else(|| AppError::validation(format!("Invalid date format: {}", date)))
}
