//! Collective exchange helpers shared by every distributed phase.
//!
//! All helpers follow the same two-stage shape: (1) exchange the number of
//! records each neighbor is about to send, (2) exchange the records
//! themselves. Every posted send and receive is drained before a helper
//! returns, even when it returns an error, so a failing rank never leaves
//! a peer blocked on an orphaned message.

use std::collections::{BTreeMap, BTreeSet};

use bytemuck::Pod;

use crate::algs::communicator::{CommTag, Communicator, PhaseTags, Wait};
use crate::algs::wire::{WireCount, cast_slice, decode_records};
use crate::assembly_error::AssemblyError;

/// Every rank except the caller, ascending.
pub fn peers_of<C: Communicator>(comm: &C) -> BTreeSet<usize> {
    let me = comm.rank();
    (0..comm.size()).filter(|&r| r != me).collect()
}

/// Stage 1: tell each peer how many records to expect; learn how many
/// records each peer will send us.
pub fn exchange_sizes<C: Communicator>(
    comm: &C,
    tag: CommTag,
    outgoing: &BTreeMap<usize, usize>,
    peers: &BTreeSet<usize>,
) -> Result<BTreeMap<usize, usize>, AssemblyError> {
    // 1) post all receives
    let mut recv_size = Vec::with_capacity(peers.len());
    for &nbr in peers {
        let mut cnt = [WireCount::new(0)];
        let h = comm.irecv(nbr, tag.as_u16(), bytemuck::cast_slice_mut(&mut cnt));
        recv_size.push((nbr, h));
    }

    // 2) post all sends
    let mut pending_sends = Vec::with_capacity(peers.len());
    for &nbr in peers {
        let count = [WireCount::new(outgoing.get(&nbr).copied().unwrap_or(0))];
        pending_sends.push(comm.isend(nbr, tag.as_u16(), cast_slice(&count)));
    }

    // 3) wait for all recvs, collect counts (but do not early-return)
    let mut sizes_in = BTreeMap::new();
    let mut maybe_err = None;
    for (nbr, h) in recv_size {
        match h.wait().and_then(|raw| decode_records::<WireCount>(&raw, 1)) {
            Some(cnt) => {
                sizes_in.insert(nbr, cnt[0].get());
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(AssemblyError::CollectiveFailure {
                    rank: nbr,
                    reason: format!("malformed or missing size header from rank {nbr}"),
                });
            }
            None => {}
        }
    }

    // 4) always drain all send handles before returning
    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(sizes_in),
    }
}

/// Send `outgoing[peer]` to each peer and return what every peer sent us.
/// Peers with nothing to send still take part (with a zero count), so every
/// rank must call this together.
pub fn exchange_payloads<T: Pod, C: Communicator>(
    comm: &C,
    tags: PhaseTags,
    outgoing: &BTreeMap<usize, Vec<T>>,
) -> Result<BTreeMap<usize, Vec<T>>, AssemblyError> {
    if comm.is_no_comm() || comm.size() <= 1 {
        return Ok(BTreeMap::new());
    }
    let peers = peers_of(comm);
    let counts: BTreeMap<usize, usize> = outgoing.iter().map(|(&r, v)| (r, v.len())).collect();
    let recv_counts = exchange_sizes(comm, tags.sizes, &counts, &peers)?;

    let mut recv_data = Vec::with_capacity(peers.len());
    for &nbr in &peers {
        let n = recv_counts.get(&nbr).copied().unwrap_or(0);
        let mut buffer = vec![0u8; n * std::mem::size_of::<T>()];
        let h = comm.irecv(nbr, tags.data.as_u16(), &mut buffer);
        recv_data.push((nbr, n, h));
    }

    let mut pending_sends = Vec::with_capacity(peers.len());
    for &nbr in &peers {
        let payload = outgoing.get(&nbr).map_or(&[][..], |v| &v[..]);
        pending_sends.push(comm.isend(nbr, tags.data.as_u16(), cast_slice(payload)));
    }

    let mut received = BTreeMap::new();
    let mut maybe_err = None;
    for (nbr, n, h) in recv_data {
        let raw = h.wait();
        match raw.as_deref().and_then(|bytes| decode_records::<T>(bytes, n)) {
            Some(records) => {
                received.insert(nbr, records);
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(AssemblyError::CollectiveFailure {
                    rank: nbr,
                    reason: format!(
                        "expected {} bytes from rank {nbr}, got {}",
                        n * std::mem::size_of::<T>(),
                        raw.as_ref().map_or(0, Vec::len)
                    ),
                });
            }
            None => {}
        }
    }

    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => {
            log::trace!(
                "rank {}: exchanged payloads on tag {:#06x} with {} peers",
                comm.rank(),
                tags.data.as_u16(),
                received.len()
            );
            Ok(received)
        }
    }
}

/// Gather every rank's variable-length record list on every rank.
/// The result is indexed by rank.
pub fn allgather_varcount<T: Pod, C: Communicator>(
    comm: &C,
    tags: PhaseTags,
    local: &[T],
) -> Result<Vec<Vec<T>>, AssemblyError> {
    if comm.is_no_comm() || comm.size() <= 1 {
        return Ok(vec![local.to_vec()]);
    }
    let outgoing: BTreeMap<usize, Vec<T>> =
        peers_of(comm).into_iter().map(|r| (r, local.to_vec())).collect();
    let mut received = exchange_payloads(comm, tags, &outgoing)?;
    let me = comm.rank();
    Ok((0..comm.size())
        .map(|r| {
            if r == me {
                local.to_vec()
            } else {
                received.remove(&r).unwrap_or_default()
            }
        })
        .collect())
}

/// All-rank agreement on the outcome of a collective phase. Returns the
/// lowest rank that reported failure, identically on every rank.
pub fn agree_on_success<C: Communicator>(
    comm: &C,
    tag: CommTag,
    ok: bool,
) -> Result<Option<usize>, AssemblyError> {
    let flags = allgather_varcount(comm, PhaseTags::from_base(tag), &[u8::from(ok)])?;
    Ok(flags
        .iter()
        .position(|f| f.first().copied() != Some(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, ThreadComm};
    use crate::algs::wire::WireCoef;

    #[test]
    fn serial_allgather_is_identity() {
        let out = allgather_varcount(&NoComm, PhaseTags::from_base(CommTag::new(1)), &[3u64, 4])
            .unwrap();
        assert_eq!(out, vec![vec![3u64, 4]]);
    }

    #[test]
    fn three_rank_allgather_varcount() {
        let world = ThreadComm::world(3);
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| {
                std::thread::spawn(move || {
                    let local: Vec<u64> = (0..=comm.rank() as u64).collect();
                    allgather_varcount(&comm, PhaseTags::from_base(CommTag::new(0x10)), &local)
                        .unwrap()
                })
            })
            .collect();
        for h in handles {
            let all = h.join().unwrap();
            assert_eq!(all, vec![vec![0], vec![0, 1], vec![0, 1, 2]]);
        }
    }

    #[test]
    fn payloads_reach_only_their_target() {
        let world = ThreadComm::world(2);
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| {
                std::thread::spawn(move || {
                    let mut out = BTreeMap::new();
                    if comm.rank() == 0 {
                        out.insert(1, vec![WireCoef::new(5, 6, 1.5)]);
                    }
                    exchange_payloads(&comm, PhaseTags::from_base(CommTag::new(0x20)), &out)
                        .unwrap()
                })
            })
            .collect();
        let mut results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let on_rank1 = results.pop().unwrap();
        let on_rank0 = results.pop().unwrap();
        assert!(on_rank0[&1].is_empty());
        assert_eq!(on_rank1[&0][0].decode(), (5, 6, 1.5));
    }

    #[test]
    fn agreement_reports_lowest_failing_rank() {
        let world = ThreadComm::world(3);
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| {
                std::thread::spawn(move || {
                    let ok = comm.rank() != 1;
                    agree_on_success(&comm, CommTag::new(0x30), ok).unwrap()
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), Some(1));
        }
    }
}
