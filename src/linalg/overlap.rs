//! Contributions to indices owned by other ranks, and their reduction onto
//! the owners.
//!
//! Non-owned contributions are summed locally and shipped once per
//! assembly cycle, so each contribution reaches its owner exactly once.

use std::collections::BTreeMap;

use crate::algs::communicator::{Communicator, PhaseTags};
use crate::algs::exchange::{agree_on_success, exchange_payloads};
use crate::algs::wire::WireCoef;
use crate::assembly_error::AssemblyError;
use crate::space::GlobalIndex;

/// Locally summed `(row, col) → value` contributions awaiting their owner.
/// Vectors use `col = 0`.
#[derive(Clone, Debug, Default)]
pub struct OverlapBuffer {
    coefs: BTreeMap<(GlobalIndex, GlobalIndex), f64>,
}

impl OverlapBuffer {
    #[inline]
    pub fn add(&mut self, row: GlobalIndex, col: GlobalIndex, value: f64) {
        *self.coefs.entry((row, col)).or_default() += value;
    }

    pub fn is_empty(&self) -> bool {
        self.coefs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.coefs.len()
    }

    pub fn clear(&mut self) {
        self.coefs.clear();
    }

    pub fn get(&self, row: GlobalIndex, col: GlobalIndex) -> Option<f64> {
        self.coefs.get(&(row, col)).copied()
    }

    /// Group the buffered contributions by the rank owning their row.
    fn by_owner(
        &self,
        owner_of: impl Fn(GlobalIndex) -> Result<usize, AssemblyError>,
    ) -> Result<BTreeMap<usize, Vec<WireCoef>>, AssemblyError> {
        let mut out: BTreeMap<usize, Vec<WireCoef>> = BTreeMap::new();
        for (&(row, col), &v) in &self.coefs {
            out.entry(owner_of(row)?)
                .or_default()
                .push(WireCoef::new(row, col, v));
        }
        Ok(out)
    }
}

/// Record counts of one reduction, for statistics output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReductionStats {
    pub sent: usize,
    pub received: usize,
}

/// Collective: send every buffered contribution to its row's owner, apply
/// what this rank receives with `apply`, and clear the buffer.
///
/// Failures to apply a received record are agreed on by all ranks before
/// returning, so every rank sees an error when any rank does.
pub(crate) fn reduce_to_owners<C: Communicator>(
    comm: &C,
    tags: PhaseTags,
    buffer: &mut OverlapBuffer,
    owner_of: impl Fn(GlobalIndex) -> Result<usize, AssemblyError>,
    mut apply: impl FnMut(GlobalIndex, GlobalIndex, f64) -> Result<(), AssemblyError>,
) -> Result<ReductionStats, AssemblyError> {
    let outgoing = buffer.by_owner(owner_of)?;
    let sent = outgoing.values().map(Vec::len).sum();
    let received = exchange_payloads(comm, tags, &outgoing)?;
    buffer.clear();

    let mut first_err = None;
    let mut n_received = 0;
    for records in received.values() {
        for rec in records {
            let (row, col, v) = rec.decode();
            n_received += 1;
            if let Err(e) = apply(row, col, v) {
                first_err.get_or_insert(e);
            }
        }
    }

    if !comm.is_no_comm() && comm.size() > 1 {
        let failed = agree_on_success(comm, tags.data.offset(1), first_err.is_none())?;
        match (first_err, failed) {
            (Some(e), _) => return Err(e),
            (None, Some(rank)) => {
                return Err(AssemblyError::CollectiveFailure {
                    rank,
                    reason: "a peer could not apply overlap contributions".into(),
                });
            }
            (None, None) => {}
        }
    }
    log::trace!(
        "rank {}: overlap reduction sent {sent}, received {n_received} records",
        comm.rank()
    );
    Ok(ReductionStats {
        sent,
        received: n_received,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{CommTag, ThreadComm};

    #[test]
    fn buffer_sums_repeated_positions() {
        let mut b = OverlapBuffer::default();
        b.add(4, 1, 1.0);
        b.add(4, 1, 0.5);
        b.add(5, 0, 2.0);
        assert_eq!(b.len(), 2);
        assert_eq!(b.get(4, 1), Some(1.5));
    }

    #[test]
    fn contributions_reach_owner_once() {
        let world = ThreadComm::world(2);
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| {
                std::thread::spawn(move || {
                    // rank r owns row r
                    let mut buf = OverlapBuffer::default();
                    let other = 1 - comm.rank();
                    buf.add(other, 0, 1.0 + comm.rank() as f64);
                    let mut got = Vec::new();
                    let stats = reduce_to_owners(
                        &comm,
                        PhaseTags::from_base(CommTag::new(0x40)),
                        &mut buf,
                        Ok,
                        |r, c, v| {
                            got.push((r, c, v));
                            Ok(())
                        },
                    )
                    .unwrap();
                    assert!(buf.is_empty());
                    (comm.rank(), stats, got)
                })
            })
            .collect();
        for h in handles {
            let (rank, stats, got) = h.join().unwrap();
            assert_eq!(stats, ReductionStats { sent: 1, received: 1 });
            let from = 1 - rank;
            assert_eq!(got, vec![(rank, 0, 1.0 + from as f64)]);
        }
    }
}
