use super::model::BackupLinkRecord;
use crate::error::{CtcError, Result};
use regex::Regex;
use std::time::Duration;

const SECOND_MS: f64 = 1000.0;
const MINUTE_MS: f64 = SECOND_MS * 60.0;
const HOUR_MS: f64 = MINUTE_MS * 60.0;
const DAY_MS: f64 = HOUR_MS * 24.0;
const WEEK_MS: f64 = DAY_MS * 7.0;
const YEAR_MS: f64 = DAY_MS * 365.25;

/// 解析频率表达式，例如 "1h"、"30 minutes"、"1.5d"、"500"（毫秒）
pub fn parse_frequency(expression: &str) -> Result<Duration> {
    let frequency_regex = Regex::new(
        r"(?i)^\s*((?:\d+)?\.?\d+)\s*(milliseconds?|msecs?|ms|seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h|days?|d|weeks?|w|years?|yrs?|y)?\s*$",
    )
    .map_err(|e| CtcError::custom(format!("正则表达式编译失败: {e}")))?;

    let captures = frequency_regex
        .captures(expression)
        .ok_or_else(|| CtcError::config(format!("无效的频率表达式: '{expression}'")))?;

    let value: f64 = captures[1]
        .parse()
        .map_err(|_| CtcError::config(format!("无效的频率数值: '{expression}'")))?;

    let unit = captures
        .get(2)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_else(|| "ms".to_string());

    let multiplier = match unit.as_str() {
        "years" | "year" | "yrs" | "yr" | "y" => YEAR_MS,
        "weeks" | "week" | "w" => WEEK_MS,
        "days" | "day" | "d" => DAY_MS,
        "hours" | "hour" | "hrs" | "hr" | "h" => HOUR_MS,
        "minutes" | "minute" | "mins" | "min" | "m" => MINUTE_MS,
        "seconds" | "second" | "secs" | "sec" | "s" => SECOND_MS,
        _ => 1.0,
    };

    let millis = (value * multiplier).round();
    if millis <= 0.0 {
        return Err(CtcError::config(format!(
            "频率必须大于 0: '{expression}'"
        )));
    }

    Ok(Duration::from_millis(millis as u64))
}

/// 计算距离下一次执行的等待时间
///
/// 有上次备份时间时返回 `max(0, 频率 - (now - 上次备份时间))`，否则返回 0（立即执行）。
pub fn compute_wait_time(record: &BackupLinkRecord, now_ms: i64) -> Result<Duration> {
    let frequency = parse_frequency(&record.job_frequence_ms)?;

    let Some(last) = record.last_backup_timestamp else {
        return Ok(Duration::ZERO);
    };

    let elapsed = now_ms.saturating_sub(last);
    if elapsed < 0 {
        // 时钟回拨，按整个周期等待
        return Ok(frequency);
    }

    Ok(frequency.saturating_sub(Duration::from_millis(elapsed as u64)))
}
