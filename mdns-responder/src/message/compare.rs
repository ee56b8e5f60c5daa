//! Lexicographic record ordering of RFC 6762 section 8.2.
//!
//! The same ordering settles simultaneous-probe tie-breaks and decides
//! whether a known answer duplicates a record this responder would send.

use std::cmp::Ordering;

use super::resource::Record;

/// Relative order of two records.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RecordOrder {
    Earlier,
    Equal,
    Later,
}

impl From<Ordering> for RecordOrder {
    fn from(o: Ordering) -> Self {
        match o {
            Ordering::Less => RecordOrder::Earlier,
            Ordering::Equal => RecordOrder::Equal,
            Ordering::Greater => RecordOrder::Later,
        }
    }
}

impl RecordOrder {
    pub(crate) fn reverse(self) -> Self {
        match self {
            RecordOrder::Earlier => RecordOrder::Later,
            RecordOrder::Equal => RecordOrder::Equal,
            RecordOrder::Later => RecordOrder::Earlier,
        }
    }
}

/// Orders `a` against `b`: class without the cache-flush bit, then type,
/// then rdata bytewise; when one rdata is a prefix of the other the longer
/// record is later. TTL and owner name play no part.
pub(crate) fn compare(a: &Record, b: &Record) -> RecordOrder {
    a.class
        .0
        .cmp(&b.class.0)
        .then_with(|| a.typ.value().cmp(&b.typ.value()))
        .then_with(|| a.rdata.as_slice().cmp(b.rdata.as_slice()))
        .into()
}

/// Whether the local set `ours` survives a simultaneous probe carrying
/// `theirs` for the same name.
///
/// Both sets are sorted and compared pair by pair; the first pair that
/// differs decides. A set that runs out first is earlier. Identical sets
/// are no conflict at all, which is what a looped-back copy of our own
/// probe looks like.
///
/// This is not a per-record rule where ours loses as soon as any local
/// record is not later than some peer record: with mixed sets that rule
/// makes both hosts lose and defer forever. Here exactly one side wins.
pub(crate) fn is_rr_win(ours: &[Record], theirs: &[Record]) -> bool {
    let mut ours: Vec<&Record> = ours.iter().collect();
    let mut theirs: Vec<&Record> = theirs.iter().collect();
    ours.sort_by(|a, b| cmp_ordering(a, b));
    theirs.sort_by(|a, b| cmp_ordering(a, b));

    for (a, b) in ours.iter().zip(theirs.iter()) {
        match compare(a, b) {
            RecordOrder::Later => return true,
            RecordOrder::Earlier => return false,
            RecordOrder::Equal => {}
        }
    }
    ours.len() >= theirs.len()
}

/// A known answer suppresses a local record when the data is identical and
/// the querier's copy still has more than half of the local TTL left.
pub(crate) fn is_duplicate(known: &Record, local: &Record) -> bool {
    compare(known, local) == RecordOrder::Equal && known.ttl > local.ttl / 2
}

fn cmp_ordering(a: &Record, b: &Record) -> Ordering {
    match compare(a, b) {
        RecordOrder::Earlier => Ordering::Less,
        RecordOrder::Equal => Ordering::Equal,
        RecordOrder::Later => Ordering::Greater,
    }
}
