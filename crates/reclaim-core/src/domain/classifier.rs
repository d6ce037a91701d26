//! ExpirationClassifier - バケット名と現在時刻から削除対象かを判定する
//!
//! I/O を一切しない純粋な判定ロジック。
//! バケット名の末尾（キャプチャグループ）に base-36 のナノ秒タイムスタンプが入っている前提。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::policy::Policy;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// 削除しない理由
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// 除外リストに含まれる
    Excluded,
    /// パターンに一致しない、またはキャプチャグループが参加していない
    NoTimestampSuffix,
    /// 空、`[0-9a-z]` 以外の文字を含む、または `i64` に収まらない
    MalformedTimestamp,
    /// 寿命に達していない（未来のタイムスタンプを含む）
    NotExpired { age_secs: u64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Excluded => f.write_str("excluded"),
            SkipReason::NoTimestampSuffix => f.write_str("no timestamp suffix"),
            SkipReason::MalformedTimestamp => f.write_str("malformed timestamp"),
            SkipReason::NotExpired { age_secs } => write!(f, "not expired (age {age_secs}s)"),
        }
    }
}

/// 判定結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Eligible { age: Duration },
    Skip(SkipReason),
}

impl Classification {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Classification::Eligible { .. })
    }
}

/// ExpirationClassifier は Policy の判定部分だけを借りる
#[derive(Debug, Clone, Copy)]
pub struct ExpirationClassifier<'a> {
    policy: &'a Policy,
}

impl<'a> ExpirationClassifier<'a> {
    pub fn new(policy: &'a Policy) -> Self {
        Self { policy }
    }

    /// `now - timestamp >= lifespan` のときだけ Eligible（境界の `==` は削除対象）
    pub fn classify(&self, bucket_name: &str, now: DateTime<Utc>) -> Classification {
        if self.policy.is_excluded(bucket_name) {
            return Classification::Skip(SkipReason::Excluded);
        }
        let Some(suffix) = self.timestamp_suffix(bucket_name) else {
            return Classification::Skip(SkipReason::NoTimestampSuffix);
        };
        let Some(created_nanos) = parse_base36(suffix) else {
            return Classification::Skip(SkipReason::MalformedTimestamp);
        };

        let age_nanos = unix_nanos(now) - i128::from(created_nanos);
        let lifespan_nanos = self.policy.lifespan().as_nanos() as i128;
        let age = nanos_to_duration(age_nanos);
        if age_nanos < lifespan_nanos {
            return Classification::Skip(SkipReason::NotExpired {
                age_secs: age.as_secs(),
            });
        }
        Classification::Eligible { age }
    }

    /// キャプチャグループ 1 の中身。空文字のキャプチャもそのまま返す
    pub fn timestamp_suffix<'n>(&self, bucket_name: &'n str) -> Option<&'n str> {
        self.policy
            .bucket_name_regex()
            .captures(bucket_name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// 小文字 base-36 の数字列だけを受け付ける。符号（`+` / `-`）や大文字は None
fn parse_base36(suffix: &str) -> Option<i64> {
    let digits_only = !suffix.is_empty()
        && suffix
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase());
    if !digits_only {
        return None;
    }
    i64::from_str_radix(suffix, 36).ok()
}

/// `at` を base-36（小文字）のナノ秒タイムスタンプに変換する
///
/// バケット名を作る側と同じ形式。`i64` のナノ秒で表せない時刻は `None`。
pub fn format_timestamp_suffix(at: DateTime<Utc>) -> Option<String> {
    let nanos = at.timestamp_nanos_opt()?;
    Some(to_base36(nanos))
}

fn to_base36(value: i64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let negative = value < 0;
    let mut rest = value.unsigned_abs();
    let mut out = Vec::new();
    while rest > 0 {
        out.push(DIGITS[(rest % 36) as usize]);
        rest /= 36;
    }
    if negative {
        out.push(b'-');
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn unix_nanos(at: DateTime<Utc>) -> i128 {
    i128::from(at.timestamp()) * NANOS_PER_SEC + i128::from(at.timestamp_subsec_nanos())
}

fn nanos_to_duration(nanos: i128) -> Duration {
    if nanos <= 0 {
        return Duration::ZERO;
    }
    let secs = (nanos / NANOS_PER_SEC).min(i128::from(u64::MAX)) as u64;
    let subsec = (nanos % NANOS_PER_SEC) as u32;
    Duration::new(secs, subsec)
}
