use crate::source::reader::Record;

/// Records harvested in one pass, in ascending timestamp order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergedBatch {
    records: Vec<Record>,
}

impl MergedBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

impl IntoIterator for MergedBatch {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Merge one pass's harvest into global timestamp order.
///
/// The sort is stable, so records sharing a timestamp keep their harvest
/// order (ascending source, then file order). Duplicates are kept.
pub fn merge_batch(mut records: Vec<Record>) -> MergedBatch {
    records.sort_by_key(|r| r.timestamp);
    MergedBatch { records }
}
