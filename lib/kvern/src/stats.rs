use serde::Serialize;

#[derive(Default, Clone, Debug, Serialize)]
pub struct MapStats {
    pub workers: usize,
    pub inputs: u64,
    pub pairs: u64,
    pub min_worker_ms: u64,
    pub max_worker_ms: u64,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, Serialize)]
pub struct ShuffleStats {
    pub pairs: u64,
    pub groups: u64,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, Serialize)]
pub struct ReduceStats {
    pub groups: u64,
    pub pairs_out: u64,
    pub wall_ms: u64,
}

/// Per-phase statistics of one job. The map and shuffle entries are
/// recorded by worker 0 at the phase boundaries; the reduce entry is
/// recorded when the job is first waited on.
#[derive(Default, Clone, Debug, Serialize)]
pub struct JobStats {
    pub map: Option<MapStats>,
    pub shuffle: Option<ShuffleStats>,
    pub reduce: Option<ReduceStats>,
}

impl JobStats {
    /// `per_worker` holds one `(pairs_emitted, task_ms)` tuple per worker.
    pub fn record_map(&mut self, inputs: u64, per_worker: &[(u64, u64)], wall_ms: u64) {
        self.map = Some(MapStats {
            workers: per_worker.len(),
            inputs,
            pairs: per_worker.iter().map(|t| t.0).sum(),
            min_worker_ms: per_worker.iter().map(|t| t.1).min().unwrap_or(0),
            max_worker_ms: per_worker.iter().map(|t| t.1).max().unwrap_or(0),
            wall_ms,
        });
    }

    pub fn record_shuffle(&mut self, pairs: u64, groups: u64, wall_ms: u64) {
        self.shuffle = Some(ShuffleStats { pairs, groups, wall_ms });
    }

    pub fn record_reduce(&mut self, groups: u64, pairs_out: u64, wall_ms: u64) {
        self.reduce = Some(ReduceStats { groups, pairs_out, wall_ms });
    }
}

#[cfg(test)]
mod tests {
    use super::JobStats;

    #[test]
    fn map_aggregates_per_worker_tuples() {
        let mut stats = JobStats::default();
        stats.record_map(10, &[(4, 7), (6, 3)], 9);
        let map = stats.map.unwrap();
        assert_eq!(map.workers, 2);
        assert_eq!(map.pairs, 10);
        assert_eq!(map.min_worker_ms, 3);
        assert_eq!(map.max_worker_ms, 7);
    }

    #[test]
    fn empty_worker_list_yields_zero_extremes() {
        let mut stats = JobStats::default();
        stats.record_map(0, &[], 0);
        let map = stats.map.unwrap();
        assert_eq!(map.min_worker_ms, 0);
        assert_eq!(map.max_worker_ms, 0);
    }
}
