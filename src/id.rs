//! Numeric unique IDs for job rows and audit entries.
//!
//! The record store never auto-increments; every row ID comes from an
//! [`IdSource`] so that IDs stay unique across every control-plane instance.

use std::sync::Mutex;

use chrono::Utc;

/// 2020-01-01T00:00:00Z in epoch milliseconds.
const EPOCH_MS: i64 = 1_577_836_800_000;

const MACHINE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_MACHINE_ID: u16 = (1 << MACHINE_BITS) - 1;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

pub trait IdSource: Send + Sync {
    fn next_id(&self) -> i64;
}

#[derive(Debug, Default)]
struct SnowflakeState {
    last_ms: i64,
    sequence: i64,
}

/// Snowflake generator: 41-bit millisecond timestamp, 10-bit machine id,
/// 12-bit per-millisecond sequence.
#[derive(Debug)]
pub struct Snowflake {
    machine_id: i64,
    state: Mutex<SnowflakeState>,
}

impl Snowflake {
    /// Machine ids above 1023 are masked into range.
    pub fn new(machine_id: u16) -> Self {
        if machine_id > MAX_MACHINE_ID {
            tracing::warn!(machine_id, "Machine id out of range, masking to 10 bits");
        }
        Self {
            machine_id: i64::from(machine_id & MAX_MACHINE_ID),
            state: Mutex::new(SnowflakeState::default()),
        }
    }

    fn compose(&self, ms: i64, sequence: i64) -> i64 {
        ((ms - EPOCH_MS) << (MACHINE_BITS + SEQUENCE_BITS))
            | (self.machine_id << SEQUENCE_BITS)
            | sequence
    }
}

impl IdSource for Snowflake {
    fn next_id(&self) -> i64 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut now = Utc::now().timestamp_millis();

        // Clock went backwards: keep issuing from the last seen millisecond.
        if now < state.last_ms {
            now = state.last_ms;
        }

        if now == state.last_ms {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // Sequence exhausted for this millisecond
                while now <= state.last_ms {
                    std::hint::spin_loop();
                    now = Utc::now().timestamp_millis();
                }
            }
        } else {
            state.sequence = 0;
        }

        state.last_ms = now;
        self.compose(now, state.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_and_increasing() {
        let ids = Snowflake::new(7);
        let mut seen = HashSet::new();
        let mut last = 0;
        for _ in 0..10_000 {
            let id = ids.next_id();
            assert!(id > last);
            assert!(seen.insert(id));
            last = id;
        }
    }

    #[test]
    fn machine_id_is_embedded() {
        let ids = Snowflake::new(42);
        let id = ids.next_id();
        assert_eq!((id >> SEQUENCE_BITS) & i64::from(MAX_MACHINE_ID), 42);
    }

    #[test]
    fn oversized_machine_id_is_masked() {
        let ids = Snowflake::new(1024 + 3);
        let id = ids.next_id();
        assert_eq!((id >> SEQUENCE_BITS) & i64::from(MAX_MACHINE_ID), 3);
    }
}
