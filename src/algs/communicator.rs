//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable** but non-blocking: the exchange helpers call
//! `.wait()` before they trust that a buffer is ready.
//!
//! Every collective in this crate is built from `isend`/`irecv` pairs plus a
//! [`CommTag`] per phase, so a backend only has to provide point-to-point
//! transport, its rank, and its size.

use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;

/// Non-blocking communication interface (minimal by design).
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// Post a send of `buf` to `peer`. The buffer is copied before returning.
    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of `buf.len()` bytes from `peer`; the data is returned by
    /// [`Wait::wait`] on the handle.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// This process' rank in `0..size()`.
    fn rank(&self) -> usize;
    /// Number of participating processes.
    fn size(&self) -> usize;

    /// True for the serial backend, letting collectives skip all exchange logic.
    fn is_no_comm(&self) -> bool {
        false
    }

    /// Synchronize all ranks. Backends without a cheap barrier may no-op.
    fn barrier(&self) {}
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// A typed message tag. Each collective phase owns a distinct tag so that
/// concurrent phases never consume each other's messages.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommTag(u16);

impl CommTag {
    #[inline]
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// A tag at a fixed distance from this one (wrapping).
    #[inline]
    pub const fn offset(self, by: u16) -> Self {
        Self(self.0.wrapping_add(by))
    }
}

/// Tags for a two-stage exchange: item counts first, payload second.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PhaseTags {
    pub sizes: CommTag,
    pub data: CommTag,
}

impl PhaseTags {
    #[inline]
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            sizes: base,
            data: base.offset(1),
        }
    }
}

/// Compile-time no-op comm for pure serial runs: one rank, nothing to exchange.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn is_no_comm(&self) -> bool {
        true
    }
}

// --- ThreadComm: intra-process ranks on separate threads ---
type Key = (usize, usize, u16); // (src, dst, tag)

/// Shared mailbox of one in-process "world". Messages between a given
/// (src, dst, tag) triple are delivered in send order.
#[derive(Debug, Default)]
struct Mailbox {
    slots: DashMap<Key, VecDeque<Bytes>>,
}

/// Receive handle of [`ThreadComm`]; polls the mailbox on `wait`.
pub struct LocalHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some(mut queue) = self.mailbox.slots.get_mut(&self.key) {
                if let Some(bytes) = queue.pop_front() {
                    return Some(bytes.to_vec());
                }
            }
            std::thread::yield_now();
        }
    }
}

/// In-process communicator: each rank of a world runs on its own thread and
/// all ranks share one mailbox. Distinct worlds never see each other's
/// messages, so independent tests can run concurrently.
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl ThreadComm {
    /// Create the `size` rank handles of a fresh world, indexed by rank.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        self.mailbox
            .slots
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, tag),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use mpi::environment::Universe;
    use mpi::request::StaticScope;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    type Finish = Box<dyn FnOnce() -> Option<Vec<u8>>>;

    /// MPI world communicator. Keeps the universe alive for as long as the
    /// communicator exists.
    pub struct MpiComm {
        _universe: Universe,
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        /// Initialize MPI; `None` if it was already initialized elsewhere.
        pub fn new() -> Option<Self> {
            let universe = mpi::initialize()?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Some(Self {
                _universe: universe,
                world,
                rank,
                size,
            })
        }
    }

    /// Pending MPI request; owns its buffer until completion.
    pub struct MpiHandle(Option<Finish>);

    impl Wait for MpiHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            self.0.take().and_then(|finish| finish())
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            let ptr: *mut [u8] = Box::into_raw(buf.to_vec().into_boxed_slice());
            // SAFETY: the allocation is reclaimed only after the request completes.
            let owned: &'static [u8] = unsafe { &*ptr };
            let req = self.world.process_at_rank(peer as i32).immediate_send_with_tag(
                StaticScope,
                owned,
                i32::from(tag),
            );
            MpiHandle(Some(Box::new(move || {
                req.wait();
                // SAFETY: the request has completed, nothing else references the buffer.
                drop(unsafe { Box::from_raw(ptr) });
                None
            })))
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let ptr: *mut [u8] = Box::into_raw(vec![0u8; buf.len()].into_boxed_slice());
            // SAFETY: the allocation is reclaimed only after the request completes.
            let target: &'static mut [u8] = unsafe { &mut *ptr };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, target, i32::from(tag));
            MpiHandle(Some(Box::new(move || {
                req.wait();
                // SAFETY: the request has completed and released its borrow.
                let data = unsafe { Box::from_raw(ptr) };
                Some(data.into_vec())
            })))
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn barrier(&self) {
            self.world.barrier();
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_comm_roundtrip_two_ranks() {
        let mut world = ThreadComm::world(2);
        let comm1 = world.pop().unwrap();
        let comm0 = world.pop().unwrap();

        let mut recv_buf = [0u8; 4];
        let recv_handle = comm1.irecv(0, 7, &mut recv_buf);
        let send_handle = comm0.isend(1, 7, &[1, 2, 3, 4]);
        send_handle.wait();

        let data = recv_handle
            .wait()
            .expect("Expected to receive data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    fn same_tag_messages_arrive_in_send_order() {
        let world = ThreadComm::world(2);
        world[0].isend(1, 3, &[1]);
        world[0].isend(1, 3, &[2]);
        let mut buf = [0u8; 1];
        assert_eq!(world[1].irecv(0, 3, &mut buf).wait(), Some(vec![1]));
        assert_eq!(world[1].irecv(0, 3, &mut buf).wait(), Some(vec![2]));
    }

    #[test]
    fn worlds_are_isolated() {
        let a = ThreadComm::world(2);
        let b = ThreadComm::world(2);
        a[0].isend(1, 9, &[10]);
        b[0].isend(1, 9, &[20]);
        let mut buf = [0u8; 1];
        assert_eq!(b[1].irecv(0, 9, &mut buf).wait(), Some(vec![20]));
        assert_eq!(a[1].irecv(0, 9, &mut buf).wait(), Some(vec![10]));
    }

    #[test]
    fn no_comm_is_single_rank() {
        let comm = NoComm;
        assert!(comm.is_no_comm());
        assert_eq!((comm.rank(), comm.size()), (0, 1));
        let mut buf = [0u8; 8];
        assert!(comm.irecv(0, 1, &mut buf).wait().is_none());
    }

    #[test]
    fn phase_tags_are_adjacent() {
        let tags = PhaseTags::from_base(CommTag::new(0xFFFF));
        assert_eq!(tags.sizes.as_u16(), 0xFFFF);
        assert_eq!(tags.data.as_u16(), 0);
    }
}
