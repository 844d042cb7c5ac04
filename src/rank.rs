use crate::aggregate::AggregatedRow;

/// Orders rows by memory, largest first, and each row's children the same
/// way. The sorts are stable, so entries with equal memory keep their
/// incoming order and an already ranked set is left untouched.
pub fn rank(rows: &mut [AggregatedRow]) {
    rows.sort_by(|a, b| b.mem_kb.cmp(&a.mem_kb));
    for row in rows.iter_mut() {
        row.children.sort_by(|a, b| b.mem_kb.cmp(&a.mem_kb));
    }
}
