use std::{collections::HashSet, sync::Arc};

use parking_lot::RwLock;

use crate::types::WaveRecord;

/// A ledger shared between the session and its live event subscription.
pub type SharedLedger = Arc<RwLock<WaveLedger>>;

/// Ordered, duplicate-free list of waves.
///
/// History arrives in one batch through [`seed`](Self::seed), live events one at a time through
/// [`append`](Self::append). The two channels race, so the same wave may be delivered twice; only
/// its first arrival is kept.
#[derive(Clone, Debug, Default)]
pub struct WaveLedger {
    records: Vec<WaveRecord>,
    seen: HashSet<WaveRecord>,
    seeded: bool,
}

impl WaveLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedLedger {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Installs the batch-fetched history.
    ///
    /// History always precedes live records. Live records that arrived before the history did are
    /// kept after it, unless the history already contains them.
    pub fn seed(&mut self, records: impl IntoIterator<Item = WaveRecord>) {
        let early = std::mem::take(&mut self.records);
        self.seen.clear();
        for record in records {
            self.push(record);
        }
        let history = self.records.len();
        for record in early {
            self.push(record);
        }
        self.seeded = true;
        debug!(history, live = self.records.len() - history, "seeded wave ledger");
    }

    /// Appends a live record. Returns `false` if the wave is already present.
    pub fn append(&mut self, record: WaveRecord) -> bool {
        let added = self.push(record);
        if !added {
            trace!("dropped duplicate wave");
        }
        added
    }

    pub fn all(&self) -> &[WaveRecord] {
        &self.records
    }

    pub fn contains(&self, record: &WaveRecord) -> bool {
        self.seen.contains(record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether history has been loaded yet.
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    fn push(&mut self, record: WaveRecord) -> bool {
        if self.seen.contains(&record) {
            return false;
        }
        self.seen.insert(record.clone());
        self.records.push(record);
        true
    }
}
