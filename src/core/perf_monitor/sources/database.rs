//! Adapters that read a database's dynamic management views.
//!
//! Queries target Azure SQL / SQL Server DMVs. The connection itself is
//! supplied by the caller through [`QueryExecutor`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::MetricSource;
use crate::core::perf_monitor::metrics::{MetricKind, Reading};
use crate::error::Result;

/// One result row, column name to value
pub type Row = Map<String, Value>;

/// Runs a query against the monitored database.
pub trait QueryExecutor: Send + Sync {
    fn execute_query(&self, sql: &str) -> Result<Vec<Row>>;
}

const RESOURCE_STATS_QUERY: &str = "SELECT TOP 1 avg_cpu_percent, avg_dtu_percent, end_time \
     FROM sys.dm_db_resource_stats ORDER BY end_time DESC";

const MEMORY_QUERY: &str = "SELECT SUM(single_pages_kb + multi_pages_kb) / 1024.0 AS memory_used_mb \
     FROM sys.dm_os_memory_clerks WHERE type IN ('MEMORYCLERK_SQLBUFFERPOOL')";

const IO_QUERY: &str = "SELECT TOP 1 avg_data_io_percent, avg_log_write_percent \
     FROM sys.dm_db_resource_stats ORDER BY end_time DESC";

const SESSIONS_QUERY: &str = "SELECT COUNT(*) AS active_connections, \
     COUNT(CASE WHEN status = 'running' THEN 1 END) AS running_sessions, \
     COUNT(CASE WHEN blocking_session_id > 0 THEN 1 END) AS blocked_sessions \
     FROM sys.dm_exec_sessions WHERE is_user_process = 1";

const WAIT_STATS_QUERY: &str = "SELECT TOP 5 wait_type, waiting_tasks_count, wait_time_ms, \
     signal_wait_time_ms, wait_time_ms - signal_wait_time_ms AS resource_wait_time_ms \
     FROM sys.dm_os_wait_stats WHERE wait_time_ms > 0 \
     AND wait_type NOT LIKE '%SLEEP%' AND wait_type NOT LIKE '%IDLE%' \
     AND wait_type NOT LIKE '%QUEUE%' ORDER BY wait_time_ms DESC";

const STORAGE_QUERY: &str = "SELECT \
     SUM(CAST(FILEPROPERTY(name, 'SpaceUsed') AS bigint) * 8192.) / (1024 * 1024 * 1024) AS used_gb, \
     SUM(size * 8192.) / (1024 * 1024 * 1024) AS allocated_gb \
     FROM sys.database_files WHERE type IN (0,1)";

const QUERY_STATS_QUERY: &str = "SELECT TOP 10 \
     qs.total_worker_time / qs.execution_count AS avg_cpu_time, \
     qs.total_elapsed_time / qs.execution_count AS avg_duration, \
     qs.total_logical_reads / qs.execution_count AS avg_logical_reads, \
     qs.execution_count \
     FROM sys.dm_exec_query_stats qs WHERE qs.execution_count > 1 \
     ORDER BY qs.total_worker_time DESC";

/// Build the standard database adapters, in collection order:
/// resource stats, memory, I/O, sessions, wait stats, storage, query stats.
pub fn database_sources(executor: Arc<dyn QueryExecutor>) -> Vec<MetricSource> {
    vec![
        adapter("resource_stats", &executor, collect_resource_stats),
        adapter("memory", &executor, collect_memory),
        adapter("io", &executor, collect_io),
        adapter("sessions", &executor, collect_sessions),
        adapter("wait_stats", &executor, collect_wait_stats),
        adapter("storage", &executor, collect_storage),
        adapter("query_stats", &executor, collect_query_stats),
    ]
}

fn adapter(
    name: &'static str,
    executor: &Arc<dyn QueryExecutor>,
    collect: fn(&dyn QueryExecutor, DateTime<Utc>) -> Result<Vec<Reading>>,
) -> MetricSource {
    let executor = Arc::clone(executor);
    MetricSource::new(name, move |timestamp| collect(executor.as_ref(), timestamp))
}

/// Numeric column value; NULL and missing columns read as `None`
fn number(row: &Row, column: &str) -> Option<f64> {
    match row.get(column)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn collect_resource_stats(db: &dyn QueryExecutor, timestamp: DateTime<Utc>) -> Result<Vec<Reading>> {
    let rows = db.execute_query(RESOURCE_STATS_QUERY)?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    Ok(vec![
        Reading::new(
            MetricKind::CpuPercent,
            number(row, "avg_cpu_percent").unwrap_or(0.0),
            timestamp,
        )
        .with_source("sys.dm_db_resource_stats"),
        Reading::new(
            MetricKind::DtuPercent,
            number(row, "avg_dtu_percent").unwrap_or(0.0),
            timestamp,
        )
        .with_source("sys.dm_db_resource_stats"),
    ])
}

fn collect_memory(db: &dyn QueryExecutor, timestamp: DateTime<Utc>) -> Result<Vec<Reading>> {
    let rows = db.execute_query(MEMORY_QUERY)?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let used_mb = number(row, "memory_used_mb").unwrap_or(0.0);
    // Rough estimate against a 1 GB buffer pool; the service tier's real
    // memory cap is not exposed through the DMVs.
    let percent = (used_mb / 1000.0 * 100.0).min(100.0);

    Ok(vec![Reading::new(MetricKind::MemoryPercent, percent, timestamp)
        .with_source("sys.dm_os_memory_clerks")
        .with_metadata("memory_used_mb", used_mb)])
}

fn collect_io(db: &dyn QueryExecutor, timestamp: DateTime<Utc>) -> Result<Vec<Reading>> {
    let rows = db.execute_query(IO_QUERY)?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let data_io = number(row, "avg_data_io_percent");
    let log_write = number(row, "avg_log_write_percent");
    let value = data_io.unwrap_or(0.0).max(log_write.unwrap_or(0.0));

    Ok(vec![Reading::new(MetricKind::IoPercent, value, timestamp)
        .with_source("sys.dm_db_resource_stats")
        .with_metadata("data_io_percent", data_io)
        .with_metadata("log_write_percent", log_write)])
}

fn collect_sessions(db: &dyn QueryExecutor, timestamp: DateTime<Utc>) -> Result<Vec<Reading>> {
    let rows = db.execute_query(SESSIONS_QUERY)?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let blocked = number(row, "blocked_sessions");

    Ok(vec![
        Reading::new(
            MetricKind::ActiveConnections,
            number(row, "active_connections").unwrap_or(0.0),
            timestamp,
        )
        .with_source("sys.dm_exec_sessions")
        .with_metadata("running_sessions", number(row, "running_sessions"))
        .with_metadata("blocked_sessions", blocked),
        Reading::new(MetricKind::BlockedProcesses, blocked.unwrap_or(0.0), timestamp)
            .with_source("sys.dm_exec_sessions"),
    ])
}

fn collect_wait_stats(db: &dyn QueryExecutor, timestamp: DateTime<Utc>) -> Result<Vec<Reading>> {
    let rows = db.execute_query(WAIT_STATS_QUERY)?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let total_wait_ms: f64 = rows
        .iter()
        .filter_map(|row| number(row, "wait_time_ms"))
        .sum();
    let top_waits: Vec<Value> = rows.into_iter().map(Value::Object).collect();

    Ok(vec![Reading::new(MetricKind::WaitTime, total_wait_ms, timestamp)
        .with_source("sys.dm_os_wait_stats")
        .with_metadata("top_waits", top_waits)])
}

fn collect_storage(db: &dyn QueryExecutor, timestamp: DateTime<Utc>) -> Result<Vec<Reading>> {
    let rows = db.execute_query(STORAGE_QUERY)?;
    let Some(row) = rows.first() else {
        return Ok(Vec::new());
    };

    let used_gb = number(row, "used_gb").unwrap_or(0.0);
    let allocated_gb = number(row, "allocated_gb").unwrap_or(1.0);
    let percent = if allocated_gb > 0.0 {
        used_gb / allocated_gb * 100.0
    } else {
        0.0
    };

    Ok(vec![Reading::new(MetricKind::StoragePercent, percent, timestamp)
        .with_source("sys.database_files")
        .with_metadata("used_gb", used_gb)
        .with_metadata("allocated_gb", allocated_gb)])
}

fn collect_query_stats(db: &dyn QueryExecutor, timestamp: DateTime<Utc>) -> Result<Vec<Reading>> {
    let rows = db.execute_query(QUERY_STATS_QUERY)?;

    let slowest = rows
        .iter()
        .filter_map(|row| number(row, "avg_duration").map(|duration| (duration, row)))
        .max_by(|(a, _), (b, _)| a.total_cmp(b));

    let Some((duration_us, row)) = slowest else {
        return Ok(Vec::new());
    };

    Ok(vec![Reading::new(MetricKind::QueryDuration, duration_us / 1000.0, timestamp)
        // avg_duration arrives in microseconds
        .with_unit("ms")
        .with_source("sys.dm_exec_query_stats")
        .with_metadata("execution_count", number(row, "execution_count"))
        .with_metadata("avg_cpu_time_us", number(row, "avg_cpu_time"))
        .with_metadata("queries_sampled", rows.len())])
}
