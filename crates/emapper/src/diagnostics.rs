//! `tracing` events for statements, cache lookups and operation timing.
//!
//! Every event is emitted under the `emapper.sql` target. SQL text is
//! whitespace-collapsed and truncated to
//! [`MapperOptions::max_logged_sql_len`](crate::MapperOptions::max_logged_sql_len).

use crate::config::MapperOptions;
use crate::error::OrmError;
use crate::translate::TranslationResult;
use std::time::{Duration, Instant};

/// Cut `sql` to at most `max_bytes`, backing off to a char boundary.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Logging settings captured from the context options.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SqlLog {
    max_sql_len: usize,
    slow_threshold: Option<Duration>,
}

impl SqlLog {
    pub(crate) fn new(options: &MapperOptions) -> Self {
        Self {
            max_sql_len: options.max_logged_sql_len,
            slow_threshold: options.slow_threshold,
        }
    }

    pub(crate) fn truncate(&self, sql: &str) -> String {
        if sql.len() > self.max_sql_len {
            format!("{}...", truncate_sql_bytes(sql, self.max_sql_len))
        } else {
            sql.to_string()
        }
    }

    pub(crate) fn statement(&self, result: &TranslationResult) {
        if tracing::enabled!(target: "emapper.sql", tracing::Level::DEBUG) {
            tracing::debug!(
                target: "emapper.sql",
                kind = result.kind.as_str(),
                param_count = result.params.len(),
                sql = %self.truncate(&result.to_string()),
                "translated statement"
            );
        }
    }

    pub(crate) fn cache(&self, hit: bool, fingerprint: &str) {
        tracing::debug!(
            target: "emapper.sql",
            hit,
            fingerprint,
            "result cache lookup"
        );
    }

    /// Start timing one facade operation.
    pub(crate) fn watch(&self, operation: &'static str) -> Watch {
        Watch {
            log: *self,
            operation,
            started: Instant::now(),
        }
    }

    pub(crate) fn failed(&self, operation: &str, sql: &str, err: &OrmError) {
        tracing::error!(
            target: "emapper.sql",
            operation,
            sql = %self.truncate(sql),
            error = %err,
            "statement failed"
        );
    }
}

/// Elapsed-time tracker for one operation.
#[derive(Debug)]
pub(crate) struct Watch {
    log: SqlLog,
    operation: &'static str,
    started: Instant,
}

impl Watch {
    pub(crate) fn finish(self) -> Duration {
        let elapsed = self.started.elapsed();
        match self.log.slow_threshold {
            Some(threshold) if elapsed > threshold => tracing::warn!(
                target: "emapper.sql",
                operation = self.operation,
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = threshold.as_millis() as u64,
                "slow operation"
            ),
            _ => tracing::debug!(
                target: "emapper.sql",
                operation = self.operation,
                elapsed_us = elapsed.as_micros() as u64,
                "operation finished"
            ),
        }
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_sql_bytes("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql_bytes("SELECT 1", 6), "SELECT");
        // 'é' is two bytes; cutting inside it backs off.
        assert_eq!(truncate_sql_bytes("aé", 2), "a");
    }

    #[test]
    fn long_sql_gets_an_ellipsis() {
        let log = SqlLog::new(&MapperOptions::new().max_logged_sql_len(6));
        assert_eq!(log.truncate("SELECT 1"), "SELECT...");
        assert_eq!(log.truncate("SEL"), "SEL");
    }

    #[test]
    fn watch_reports_elapsed() {
        let log = SqlLog::new(&MapperOptions::new().slow_threshold(Duration::from_secs(3600)));
        let watch = log.watch("test");
        assert!(watch.finish() < Duration::from_secs(3600));
    }
}
