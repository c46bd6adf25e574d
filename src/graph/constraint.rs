//! Slave constraints and their elimination.
//!
//! A slave constraint states `slave = Σ w_k · master_k + rhs`. Declared
//! constraints are resolved to global indices, gathered from every rank,
//! and flattened so that no substitution refers to another slave. Chains
//! are followed; cycles are rejected with [`AssemblyError::CyclicConstraint`].

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use crate::algs::communicator::Communicator;
use crate::algs::wire::WireConstraintTerm;
use crate::assembly_error::AssemblyError;
use crate::space::{FieldId, GlobalIndex, IdType, IndexSpace};

/// One listed `(id type, id, field)` of a constraint.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConstraintEntry {
    pub id_type: IdType,
    pub id: i64,
    pub field: FieldId,
}

/// A declared constraint, still in entity terms.
///
/// `weights` holds one weight per scalar DOF of the listed entries, in
/// listing order. The weight at the slave's own position is ignored.
#[derive(Clone, Debug, PartialEq)]
pub struct SlaveConstraint {
    pub entries: Vec<ConstraintEntry>,
    pub slave_offset: usize,
    pub slave_field_offset: usize,
    pub weights: Vec<f64>,
    pub rhs: f64,
}

impl SlaveConstraint {
    /// Check list lengths, offsets and vocabulary against the space.
    pub(crate) fn validate<C: Communicator>(
        &self,
        space: &IndexSpace<C>,
    ) -> Result<(), AssemblyError> {
        let slave = self.entries.get(self.slave_offset).ok_or_else(|| {
            AssemblyError::Configuration(format!(
                "slave offset {} out of range for {} constraint entries",
                self.slave_offset,
                self.entries.len()
            ))
        })?;
        let slave_size = space.field_size(Some(slave.field))?;
        if self.slave_field_offset >= slave_size {
            return Err(AssemblyError::Configuration(format!(
                "slave field offset {} out of range for field {} of size {slave_size}",
                self.slave_field_offset, slave.field.0
            )));
        }
        let mut n_dofs = 0;
        for e in &self.entries {
            if !space.has_id_type(e.id_type) {
                return Err(AssemblyError::Configuration(format!(
                    "constraint entry {} uses id type {} not defined on space '{}'",
                    e.id,
                    e.id_type.0,
                    space.name()
                )));
            }
            n_dofs += space.field_size(Some(e.field))?;
        }
        if self.weights.len() != n_dofs {
            return Err(AssemblyError::Configuration(format!(
                "constraint lists {n_dofs} DOFs but {} weights",
                self.weights.len()
            )));
        }
        Ok(())
    }

    /// Resolve to `(slave, substitution)` through a finalized space.
    fn resolve<C: Communicator>(
        &self,
        space: &IndexSpace<C>,
    ) -> Result<(GlobalIndex, Substitution), AssemblyError> {
        let mut slave = None;
        let mut terms: BTreeMap<GlobalIndex, f64> = BTreeMap::new();
        let mut weights = self.weights.iter();
        for (pos, e) in self.entries.iter().enumerate() {
            for (component, index) in space
                .slot_indices(e.id_type, e.id, Some(e.field))?
                .enumerate()
            {
                let w = weights.next().copied().unwrap_or(0.0);
                if pos == self.slave_offset && component == self.slave_field_offset {
                    slave = Some(index);
                } else {
                    *terms.entry(index).or_default() += w;
                }
            }
        }
        let slave = slave.ok_or_else(|| {
            AssemblyError::Configuration("constraint has no slave DOF".to_owned())
        })?;
        Ok((
            slave,
            Substitution {
                terms: terms.into_iter().collect(),
                rhs: self.rhs,
            },
        ))
    }
}

/// `slave = Σ terms + rhs`, with masters sorted ascending.
#[derive(Clone, Debug, PartialEq)]
pub struct Substitution {
    pub terms: Vec<(GlobalIndex, f64)>,
    pub rhs: f64,
}

impl Substitution {
    fn same_as(&self, other: &Substitution) -> bool {
        self.rhs.to_bits() == other.rhs.to_bits()
            && self.terms.len() == other.terms.len()
            && self
                .terms
                .iter()
                .zip(&other.terms)
                .all(|(a, b)| a.0 == b.0 && a.1.to_bits() == b.1.to_bits())
    }
}

/// Constraints declared on one rank before finalization.
#[derive(Clone, Debug, Default)]
pub struct ConstraintSet {
    declared: Vec<SlaveConstraint>,
}

impl ConstraintSet {
    pub fn push(&mut self, c: SlaveConstraint) {
        self.declared.push(c);
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlaveConstraint> {
        self.declared.iter()
    }

    /// Resolve the local declarations and flatten them into wire records.
    pub(crate) fn to_wire<C: Communicator>(
        &self,
        space: &IndexSpace<C>,
    ) -> Result<Vec<WireConstraintTerm>, AssemblyError> {
        let mut out = Vec::new();
        for c in &self.declared {
            let (slave, sub) = c.resolve(space)?;
            out.push(WireConstraintTerm::rhs(slave, sub.rhs));
            out.extend(
                sub.terms
                    .iter()
                    .map(|&(m, w)| WireConstraintTerm::term(slave, m, w)),
            );
        }
        Ok(out)
    }

    /// Merge every rank's records into one direct substitution per slave.
    /// The same slave declared with different terms is a configuration error.
    pub(crate) fn merge_gathered(
        gathered: &[Vec<WireConstraintTerm>],
    ) -> Result<BTreeMap<GlobalIndex, Substitution>, AssemblyError> {
        let mut merged: BTreeMap<GlobalIndex, Substitution> = BTreeMap::new();
        for (rank, records) in gathered.iter().enumerate() {
            let mut current: Option<(GlobalIndex, Substitution)> = None;
            let mut finished = Vec::new();
            for rec in records {
                if rec.is_rhs() {
                    finished.extend(current.take());
                    current = Some((
                        rec.slave(),
                        Substitution {
                            terms: Vec::new(),
                            rhs: rec.value(),
                        },
                    ));
                } else {
                    match current.as_mut() {
                        Some((slave, sub)) if *slave == rec.slave() => {
                            sub.terms.push((rec.master(), rec.value()));
                        }
                        _ => {
                            return Err(AssemblyError::CollectiveFailure {
                                rank,
                                reason: format!(
                                    "constraint term for slave {} without header",
                                    rec.slave()
                                ),
                            });
                        }
                    }
                }
            }
            finished.extend(current);
            for (slave, sub) in finished {
                match merged.get(&slave) {
                    Some(existing) if !existing.same_as(&sub) => {
                        return Err(AssemblyError::Configuration(format!(
                            "slave {slave} is declared with conflicting constraints"
                        )));
                    }
                    Some(_) => {}
                    None => {
                        merged.insert(slave, sub);
                    }
                }
            }
        }
        Ok(merged)
    }
}

/// Flattened substitutions for every slave in the system.
#[derive(Clone, Debug, Default)]
pub struct Elimination {
    subs: BTreeMap<GlobalIndex, Substitution>,
    slaves: Vec<GlobalIndex>,
}

impl Elimination {
    /// Follow chains until every substitution refers to masters only.
    pub fn flatten(direct: BTreeMap<GlobalIndex, Substitution>) -> Result<Self, AssemblyError> {
        let mut done = BTreeMap::new();
        let mut on_path = BTreeSet::new();
        for &slave in direct.keys() {
            flatten_one(slave, &direct, &mut done, &mut on_path)?;
        }
        let slaves = done.keys().copied().collect();
        Ok(Self { subs: done, slaves })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    #[inline]
    pub fn is_slave(&self, index: GlobalIndex) -> bool {
        self.subs.contains_key(&index)
    }

    #[inline]
    pub fn substitution(&self, index: GlobalIndex) -> Option<&Substitution> {
        self.subs.get(&index)
    }

    pub fn num_slaves(&self) -> usize {
        self.slaves.len()
    }

    /// All slaves, ascending.
    pub fn slaves(&self) -> &[GlobalIndex] {
        &self.slaves
    }

    pub fn num_slaves_below(&self, index: GlobalIndex) -> usize {
        self.slaves.partition_point(|&s| s < index)
    }

    pub fn num_slaves_in(&self, range: Range<GlobalIndex>) -> usize {
        self.num_slaves_below(range.end) - self.num_slaves_below(range.start)
    }

    /// Position of a solvable index once slaves are removed.
    pub fn reduced_index(&self, index: GlobalIndex) -> Option<usize> {
        (!self.is_slave(index)).then(|| index - self.num_slaves_below(index))
    }

    /// Call `f(master, weight)` for each index `index` expands to: its
    /// masters when it is a slave, itself with weight one otherwise.
    #[inline]
    pub fn expand(&self, index: GlobalIndex, mut f: impl FnMut(GlobalIndex, f64)) {
        match self.subs.get(&index) {
            Some(sub) => sub.terms.iter().for_each(|&(m, w)| f(m, w)),
            None => f(index, 1.0),
        }
    }
}

fn flatten_one(
    slave: GlobalIndex,
    direct: &BTreeMap<GlobalIndex, Substitution>,
    done: &mut BTreeMap<GlobalIndex, Substitution>,
    on_path: &mut BTreeSet<GlobalIndex>,
) -> Result<(), AssemblyError> {
    if done.contains_key(&slave) {
        return Ok(());
    }
    if !on_path.insert(slave) {
        return Err(AssemblyError::CyclicConstraint(slave));
    }
    let Some(sub) = direct.get(&slave) else {
        return Ok(());
    };
    let mut acc: BTreeMap<GlobalIndex, f64> = BTreeMap::new();
    let mut rhs = sub.rhs;
    for &(master, w) in &sub.terms {
        if direct.contains_key(&master) {
            flatten_one(master, direct, done, on_path)?;
            let inner = &done[&master];
            for &(m, ww) in &inner.terms {
                *acc.entry(m).or_default() += w * ww;
            }
            rhs += w * inner.rhs;
        } else {
            *acc.entry(master).or_default() += w;
        }
    }
    on_path.remove(&slave);
    done.insert(
        slave,
        Substitution {
            terms: acc.into_iter().collect(),
            rhs,
        },
    );
    Ok(())
}
