//! Distributed vector over the rows of a finalized [`MatrixGraph`].
//!
//! Each rank stores its owned range densely plus a copy of every overlap
//! row its connectivity touches. Contributions to rows owned elsewhere are
//! buffered and shipped to the owners by [`DistributedVector::gather_from_overlap`];
//! [`DistributedVector::scatter_to_overlap`] refreshes the overlap copies from
//! the owners.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use crate::algs::communicator::{CommTag, Communicator, PhaseTags};
use crate::algs::exchange::{agree_on_success, exchange_payloads};
use crate::algs::wire::WireCoef;
use crate::assembly_error::AssemblyError;
use crate::graph::MatrixGraph;
use crate::linalg::matrix::AssemblyState;
use crate::linalg::overlap::{OverlapBuffer, reduce_to_owners};
use crate::space::GlobalIndex;

const TAGS_GATHER: PhaseTags = PhaseTags::from_base(CommTag::new(0xA310));
const TAGS_SCATTER_REQUEST: PhaseTags = PhaseTags::from_base(CommTag::new(0xA318));
const TAGS_SCATTER_REPLY: PhaseTags = PhaseTags::from_base(CommTag::new(0xA31C));
const TAG_SCATTER_AGREE: CommTag = CommTag::new(0xA31E);

#[derive(Debug)]
pub struct DistributedVector<C: Communicator> {
    graph: Arc<MatrixGraph<C>>,
    owned: Range<GlobalIndex>,
    values: Vec<f64>,
    shared: BTreeMap<GlobalIndex, f64>,
    pending: OverlapBuffer,
    state: AssemblyState,
}

impl<C: Communicator> DistributedVector<C> {
    /// A zeroed vector over `graph`'s row space.
    pub fn new(graph: Arc<MatrixGraph<C>>) -> Result<Self, AssemblyError> {
        let owned = graph.row_space().owned_range()?;
        let shared = graph.overlap_rows()?.iter().map(|&r| (r, 0.0)).collect();
        Ok(Self {
            values: vec![0.0; owned.len()],
            owned,
            shared,
            pending: OverlapBuffer::default(),
            state: AssemblyState::Open,
            graph,
        })
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    pub fn owned_range(&self) -> Range<GlobalIndex> {
        self.owned.clone()
    }

    /// Owned values, indexed from the start of the owned range.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Overlap rows held as copies, ascending.
    pub fn overlap_indices(&self) -> impl Iterator<Item = GlobalIndex> + '_ {
        self.shared.keys().copied()
    }

    #[inline]
    fn local(&self, index: GlobalIndex) -> Option<usize> {
        self.owned.contains(&index).then(|| index - self.owned.start)
    }

    /// Accumulate one element's contribution, ordered like the block's row
    /// indices.
    pub fn sum_in_element(
        &mut self,
        block: i32,
        element: i64,
        coefs: &[f64],
    ) -> Result<(), AssemblyError> {
        let graph = Arc::clone(&self.graph);
        let rows = graph.connectivity_indices(block, element)?;
        self.sum_in(rows, coefs)
    }

    /// Accumulate `coefs` at `indices`. Slave contributions are moved onto
    /// their masters; rows owned elsewhere are buffered for the next gather.
    pub fn sum_in(&mut self, indices: &[GlobalIndex], coefs: &[f64]) -> Result<(), AssemblyError> {
        if indices.len() != coefs.len() {
            return Err(AssemblyError::DimensionMismatch {
                expected: indices.len(),
                got: coefs.len(),
            });
        }
        let graph = Arc::clone(&self.graph);
        let elim = graph.elimination()?;
        let mut staged = Vec::with_capacity(indices.len());
        for (&i, &v) in indices.iter().zip(coefs) {
            elim.expand(i, |m, w| staged.push((m, v * w)));
        }
        for &(i, _) in &staged {
            if self.local(i).is_none() {
                graph.row_space().owner_of(i)?;
            }
        }
        for (i, v) in staged {
            match self.local(i) {
                Some(l) => self.values[l] += v,
                None => self.pending.add(i, 0, v),
            }
        }
        self.state = AssemblyState::Open;
        Ok(())
    }

    /// Overwrite owned or overlap entries. No elimination is applied.
    pub fn copy_in(&mut self, indices: &[GlobalIndex], coefs: &[f64]) -> Result<(), AssemblyError> {
        if indices.len() != coefs.len() {
            return Err(AssemblyError::DimensionMismatch {
                expected: indices.len(),
                got: coefs.len(),
            });
        }
        if let Some(&bad) = indices
            .iter()
            .find(|&&i| self.local(i).is_none() && !self.shared.contains_key(&i))
        {
            return Err(AssemblyError::IndexNotOwned(bad));
        }
        for (&i, &v) in indices.iter().zip(coefs) {
            match self.local(i) {
                Some(l) => self.values[l] = v,
                None => {
                    self.shared.insert(i, v);
                }
            }
        }
        self.state = AssemblyState::Open;
        Ok(())
    }

    /// Read owned or overlap entries.
    pub fn copy_out(&self, indices: &[GlobalIndex]) -> Result<Vec<f64>, AssemblyError> {
        indices
            .iter()
            .map(|&i| match self.local(i) {
                Some(l) => Ok(self.values[l]),
                None => self
                    .shared
                    .get(&i)
                    .copied()
                    .ok_or(AssemblyError::IndexNotOwned(i)),
            })
            .collect()
    }

    pub fn put_scalar(&mut self, value: f64) {
        self.values.fill(value);
        self.shared.values_mut().for_each(|v| *v = value);
        self.pending.clear();
        self.state = AssemblyState::Reset;
    }

    /// Collective: add every buffered non-owned contribution into its
    /// owner's value.
    pub fn gather_from_overlap(&mut self) -> Result<(), AssemblyError> {
        self.state = AssemblyState::Assembling;
        let graph = Arc::clone(&self.graph);
        let comm = graph.comm();
        if comm.is_no_comm() || comm.size() <= 1 {
            self.state = AssemblyState::Assembled;
            return Ok(());
        }
        let owned = self.owned.clone();
        let values = &mut self.values;
        let result = reduce_to_owners(
            &**comm,
            TAGS_GATHER,
            &mut self.pending,
            |r| graph.row_space().owner_of(r),
            |r, _, v| {
                if !owned.contains(&r) {
                    return Err(AssemblyError::IndexNotOwned(r));
                }
                values[r - owned.start] += v;
                Ok(())
            },
        );
        match result {
            Ok(_) => {
                self.state = AssemblyState::Assembled;
                Ok(())
            }
            Err(e) => {
                self.state = AssemblyState::Open;
                Err(e)
            }
        }
    }

    /// Collective: copy each owner's value into every rank holding that
    /// row as an overlap copy.
    pub fn scatter_to_overlap(&mut self) -> Result<(), AssemblyError> {
        let graph = Arc::clone(&self.graph);
        let comm = graph.comm();
        if comm.is_no_comm() || comm.size() <= 1 {
            return Ok(());
        }
        let space = graph.row_space();
        let mut requests: BTreeMap<usize, Vec<WireCoef>> = BTreeMap::new();
        for &r in self.shared.keys() {
            requests
                .entry(space.owner_of(r)?)
                .or_default()
                .push(WireCoef::new(r, 0, 0.0));
        }
        let incoming = exchange_payloads(&**comm, TAGS_SCATTER_REQUEST, &requests)?;

        let mut first_err = None;
        let mut replies: BTreeMap<usize, Vec<WireCoef>> = BTreeMap::new();
        for (&peer, recs) in &incoming {
            let out = replies.entry(peer).or_default();
            for rec in recs {
                let (r, _, _) = rec.decode();
                match self.local(r) {
                    Some(l) => out.push(WireCoef::new(r, 0, self.values[l])),
                    None => {
                        first_err.get_or_insert(AssemblyError::IndexNotOwned(r));
                        out.push(WireCoef::new(r, 0, 0.0));
                    }
                }
            }
        }
        let answered = exchange_payloads(&**comm, TAGS_SCATTER_REPLY, &replies)?;
        if let Some(rank) = agree_on_success(&**comm, TAG_SCATTER_AGREE, first_err.is_none())? {
            return Err(first_err.unwrap_or(AssemblyError::CollectiveFailure {
                rank,
                reason: "a peer could not answer overlap requests".into(),
            }));
        }
        for rec in answered.values().flatten() {
            let (r, _, v) = rec.decode();
            if let Some(slot) = self.shared.get_mut(&r) {
                *slot = v;
            }
        }
        log::trace!(
            "rank {}: refreshed {} overlap entries",
            comm.rank(),
            self.shared.len()
        );
        Ok(())
    }

    /// Collective: gather to the owners, then refresh the overlap copies.
    pub fn global_assemble(&mut self) -> Result<(), AssemblyError> {
        self.gather_from_overlap()?;
        self.scatter_to_overlap()?;
        log::debug!(
            "vector over '{}' assembled on rank {}",
            self.graph.row_space().name(),
            self.graph.comm().rank()
        );
        Ok(())
    }
}
