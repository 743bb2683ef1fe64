//! Shared test data: 25 variants observed in 2 biosamples with 3 replicates
//! each, all in run 1 and marker 1.

use crate::count_table::{OccurrenceKey, ReadCountRecord, ReadCountTable};

/// Read counts per variant, ordered (b1 r1, b1 r2, b1 r3, b2 r1, b2 r2, b2 r3).
pub const READ_COUNTS: [[i64; 6]; 25] = [
    [10, 5, 0, 249, 58, 185],
    [68, 54, 100, 0, 0, 0],
    [0, 0, 0, 258, 126, 500],
    [0, 0, 0, 0, 1, 0],
    [0, 0, 1, 0, 0, 0],
    [1524, 1815, 789, 118, 98, 50],
    [1, 0, 0, 0, 0, 0],
    [0, 1, 0, 0, 0, 0],
    [125, 214, 20, 1284, 1789, 1913],
    [0, 1, 0, 0, 1, 0],
    [15, 0, 1, 0, 0, 25],
    [0, 0, 2, 598, 50, 875],
    [2, 60, 12, 1, 0, 0],
    [1, 0, 0, 0, 0, 2],
    [0, 3, 0, 0, 5, 0],
    [65, 98, 152, 2, 0, 1],
    [52, 74, 85, 0, 0, 0],
    [1, 0, 0, 5, 0, 8],
    [5, 0, 1, 0, 0, 21],
    [0, 0, 0, 524, 658, 125],
    [0, 0, 0, 2, 0, 10],
    [25, 58, 23, 10980, 8999, 13814],
    [0, 5, 0, 0, 2, 0],
    [1, 0, 1, 1, 0, 284],
    [0, 2, 0, 0, 5, 0],
];

pub fn record(
    run: u64,
    biosample: u64,
    replicate: u64,
    variant: u64,
    read_count: i64,
) -> ReadCountRecord {
    ReadCountRecord {
        run,
        marker: 1,
        biosample,
        replicate,
        variant,
        read_count,
    }
}

pub fn lfn_table() -> ReadCountTable {
    let mut records = Vec::with_capacity(150);
    for (i, counts) in READ_COUNTS.iter().enumerate() {
        for (j, &count) in counts.iter().enumerate() {
            let biosample = if j < 3 { 1 } else { 2 };
            let replicate = (j % 3) as u64 + 1;
            records.push(record(1, biosample, replicate, i as u64 + 1, count));
        }
    }
    ReadCountTable::from_records(records).unwrap()
}

pub fn key(biosample: u64, replicate: u64, variant: u64) -> OccurrenceKey {
    OccurrenceKey::new(1, 1, biosample, replicate, variant)
}
