//! Server counters. Updated by the session manager, read as snapshots.

use std::time::Duration;

use duelhall_protocol::MetricsSnapshot;

/// Process-lifetime counters.
///
/// Totals only grow; `current_connections` and `active_sessions` go up and
/// down. The average duration is a running mean, so no per-session history
/// is kept.
#[derive(Debug, Default)]
pub struct Metrics {
    total_connections: u64,
    current_connections: u64,
    peak_connections: u64,
    sessions_created: u64,
    active_sessions: u64,
    sessions_completed: u64,
    sessions_abandoned: u64,
    average_session_secs: f64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&mut self) {
        self.total_connections += 1;
        self.current_connections += 1;
        self.peak_connections = self.peak_connections.max(self.current_connections);
    }

    pub fn connection_closed(&mut self) {
        self.current_connections = self.current_connections.saturating_sub(1);
    }

    pub fn session_started(&mut self) {
        self.sessions_created += 1;
        self.active_sessions += 1;
    }

    /// A session reached a winner or a draw after `duration`.
    pub fn session_completed(&mut self, duration: Duration) {
        self.active_sessions = self.active_sessions.saturating_sub(1);
        self.sessions_completed += 1;
        let secs = duration.as_secs_f64();
        self.average_session_secs +=
            (secs - self.average_session_secs) / self.sessions_completed as f64;
    }

    /// A session ended because a participant left.
    pub fn session_abandoned(&mut self) {
        self.active_sessions = self.active_sessions.saturating_sub(1);
        self.sessions_abandoned += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_connections: self.total_connections,
            current_connections: self.current_connections,
            peak_connections: self.peak_connections,
            sessions_created: self.sessions_created,
            active_sessions: self.active_sessions,
            sessions_completed: self.sessions_completed,
            sessions_abandoned: self.sessions_abandoned,
            average_session_secs: self.average_session_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_connections_tracks_high_water_mark() {
        let mut metrics = Metrics::new();
        metrics.connection_opened();
        metrics.connection_opened();
        metrics.connection_opened();
        metrics.connection_closed();
        metrics.connection_closed();
        metrics.connection_opened();

        let snap = metrics.snapshot();
        assert_eq!(snap.total_connections, 4);
        assert_eq!(snap.current_connections, 2);
        assert_eq!(snap.peak_connections, 3);
    }

    #[test]
    fn test_average_equals_arithmetic_mean() {
        let durations = [1.5_f64, 30.0, 7.25, 0.0, 12.0];
        let mut metrics = Metrics::new();
        for d in durations {
            metrics.session_started();
            metrics.session_completed(Duration::from_secs_f64(d));
        }

        let expected = durations.iter().sum::<f64>() / durations.len() as f64;
        let snap = metrics.snapshot();
        assert!((snap.average_session_secs - expected).abs() < 1e-9);
        assert_eq!(snap.sessions_completed, 5);
        assert_eq!(snap.active_sessions, 0);
    }

    #[test]
    fn test_abandoned_sessions_do_not_move_average() {
        let mut metrics = Metrics::new();
        metrics.session_started();
        metrics.session_completed(Duration::from_secs(10));
        metrics.session_started();
        metrics.session_abandoned();

        let snap = metrics.snapshot();
        assert_eq!(snap.sessions_created, 2);
        assert_eq!(snap.sessions_abandoned, 1);
        assert_eq!(snap.active_sessions, 0);
        assert!((snap.average_session_secs - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_counters_never_underflow() {
        let mut metrics = Metrics::new();
        metrics.connection_closed();
        metrics.session_abandoned();
        let snap = metrics.snapshot();
        assert_eq!(snap.current_connections, 0);
        assert_eq!(snap.active_sessions, 0);
    }
}
