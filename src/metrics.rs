//! Counters for one stack instance

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use xtcp_core::EngineStats;

/// Stack-wide metrics, shared between the service task and its handle
#[derive(Debug, Default)]
pub struct StackMetrics {
    /// Total connections created
    pub connections_created: AtomicU64,
    /// Live connection records
    pub active_connections: AtomicUsize,
    /// Attached client endpoints
    pub clients: AtomicUsize,
    /// Events handed to clients, link events included
    pub events_delivered: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    /// `resend_data` events raised
    pub resends: AtomicU64,
    /// Client operations rejected as out of sequence
    pub protocol_violations: AtomicU64,
    /// UDP datagrams dropped on a full receive buffer
    pub dropped_datagrams: AtomicU64,
    /// Driver commands that failed
    pub driver_errors: AtomicU64,
}

impl StackMetrics {
    /// Mirror the engine counters (they are cumulative, so this overwrites)
    pub fn update_from_stats(&self, stats: &EngineStats, active: usize, clients: usize) {
        self.connections_created
            .store(stats.connections_created, Ordering::Relaxed);
        self.active_connections.store(active, Ordering::Relaxed);
        self.clients.store(clients, Ordering::Relaxed);
        self.events_delivered
            .store(stats.events_delivered, Ordering::Relaxed);
        self.bytes_sent.store(stats.bytes_sent, Ordering::Relaxed);
        self.bytes_received
            .store(stats.bytes_received, Ordering::Relaxed);
        self.resends.store(stats.resends, Ordering::Relaxed);
        self.protocol_violations
            .store(stats.violations, Ordering::Relaxed);
        self.dropped_datagrams
            .store(stats.dropped_datagrams, Ordering::Relaxed);
    }

    /// Record a failed driver command
    pub fn driver_error(&self) {
        self.driver_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_created: self.connections_created.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            clients: self.clients.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            resends: self.resends.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
            dropped_datagrams: self.dropped_datagrams.load(Ordering::Relaxed),
            driver_errors: self.driver_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_created: u64,
    pub active_connections: usize,
    pub clients: usize,
    pub events_delivered: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub resends: u64,
    pub protocol_violations: u64,
    pub dropped_datagrams: u64,
    pub driver_errors: u64,
}

/// Format metrics for human-readable display
pub fn format_metrics(snapshot: &MetricsSnapshot) -> String {
    format!(
        "xtcp Metrics:\n\
         Connections: {} created, {} active, {} clients\n\
         Traffic: {} bytes sent, {} bytes received\n\
         Events: {} delivered, {} resends\n\
         Errors: {} protocol violations, {} driver errors, {} datagrams dropped",
        snapshot.connections_created,
        snapshot.active_connections,
        snapshot.clients,
        snapshot.bytes_sent,
        snapshot.bytes_received,
        snapshot.events_delivered,
        snapshot.resends,
        snapshot.protocol_violations,
        snapshot.driver_errors,
        snapshot.dropped_datagrams,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_overwrites_cumulative_counters() {
        let metrics = StackMetrics::default();
        let stats = EngineStats {
            connections_created: 3,
            bytes_sent: 100,
            dropped_datagrams: 2,
            ..Default::default()
        };
        metrics.update_from_stats(&stats, 2, 1);
        metrics.update_from_stats(&stats, 1, 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connections_created, 3);
        assert_eq!(snapshot.bytes_sent, 100);
        assert_eq!(snapshot.active_connections, 1);
        assert_eq!(snapshot.dropped_datagrams, 2);
    }

    #[test]
    fn test_format_metrics() {
        let metrics = StackMetrics::default();
        metrics.driver_error();
        let text = format_metrics(&metrics.snapshot());
        assert!(text.contains("1 driver errors"));
    }
}
