use std::collections::VecDeque;

use petgraph::graph::{EdgeIndex, NodeIndex};

use super::expr::ExprType;
use super::stereo::{combine, has_direction, is_double_like, seen_from, Configuration, Direction};
use super::QueryMol;

/// Marker sets tried, in order, for a bond that is not yet pinned.
const CANDIDATES: [Direction; 6] = [
    Direction::UP,
    Direction::DOWN,
    Direction::UP.union(Direction::NEITHER),
    Direction::DOWN.union(Direction::NEITHER),
    Direction::NEITHER,
    Direction::UP.union(Direction::DOWN),
];

/// Chooses `/` `\` markers so that every double bond carrying a
/// `Stereochemistry` constraint is written with that configuration.
///
/// The result is indexed by edge and expressed in each bond's own frame
/// (read from its begin atom). Exact cis/trans constraints are placed
/// first, looser ones afterwards, so that shared neighbour bonds are pinned
/// by the stricter constraint.
pub(crate) fn assign(mol: &QueryMol) -> Vec<Option<Direction>> {
    let mut assigner = Assigner {
        mol,
        dirs: vec![None; mol.bond_count()],
        config: mol
            .bonds()
            .map(|e| {
                mol.bond(e)
                    .expr
                    .conjunct(ExprType::Stereochemistry)
                    .map(Configuration::from_value)
            })
            .collect(),
    };

    let strict = |c: Configuration| c == Configuration::TOGETHER || c == Configuration::OPPOSITE;
    let mut done = vec![false; mol.bond_count()];

    for wave_is_strict in [true, false] {
        let mut queue: VecDeque<EdgeIndex> = mol
            .bonds()
            .filter(|e| assigner.config[e.index()].is_some_and(|c| strict(c) == wave_is_strict))
            .collect();

        while let Some(bond) = queue.pop_front() {
            if done[bond.index()] {
                continue;
            }
            done[bond.index()] = true;
            let Some(config) = assigner.config[bond.index()] else {
                continue;
            };
            assigner.place(bond, config);

            for next in assigner.conjugated(bond) {
                let same_wave = assigner.config[next.index()]
                    .is_some_and(|c| strict(c) == wave_is_strict);
                if same_wave && !done[next.index()] {
                    queue.push_front(next);
                }
            }
        }
    }

    assigner.dirs
}

struct Assigner<'m> {
    mol: &'m QueryMol,
    dirs: Vec<Option<Direction>>,
    config: Vec<Option<Configuration>>,
}

impl Assigner<'_> {
    fn is_stereo(&self, bond: EdgeIndex) -> bool {
        self.config[bond.index()].is_some()
    }

    /// Neighbour bonds of `atom` that may carry a marker for `double`.
    fn candidates(&self, atom: NodeIndex, double: EdgeIndex) -> Vec<EdgeIndex> {
        self.mol
            .bonds_in_order(atom)
            .into_iter()
            .filter(|&b| b != double && !self.is_stereo(b))
            .collect()
    }

    /// Stereo double bonds one marker bond away from `double`.
    fn conjugated(&self, double: EdgeIndex) -> Vec<EdgeIndex> {
        let Some((u, v)) = self.mol.bond_endpoints(double) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for atom in [u, v] {
            for b in self.candidates(atom, double) {
                let Some(far) = self.mol.other_atom(b, atom) else {
                    continue;
                };
                for d in self.mol.bonds_in_order(far) {
                    if d != double && self.is_stereo(d) && !out.contains(&d) {
                        out.push(d);
                    }
                }
            }
        }
        out
    }

    fn leads_to_stereo(&self, bond: EdgeIndex, atom: NodeIndex, double: EdgeIndex) -> bool {
        self.mol.other_atom(bond, atom).is_some_and(|far| {
            self.mol
                .bonds_in_order(far)
                .into_iter()
                .any(|d| d != double && self.is_stereo(d))
        })
    }

    /// Whether a new marker on `bond` would leave an unconstrained
    /// double-like bond with markers on both ends, which reads back as a
    /// cis/trans constraint the graph does not have.
    fn completes_unconstrained(&self, bond: EdgeIndex) -> bool {
        let Some((a, b)) = self.mol.bond_endpoints(bond) else {
            return false;
        };
        [a, b].into_iter().any(|atom| {
            self.mol.bonds_in_order(atom).into_iter().any(|d| {
                d != bond
                    && !self.is_stereo(d)
                    && is_double_like(&self.mol.bond(d).expr)
                    && self
                        .mol
                        .other_atom(d, atom)
                        .is_some_and(|far| self.is_marked(far, d))
            })
        })
    }

    /// Whether some bond at `atom` other than `skip` carries a marker.
    fn is_marked(&self, atom: NodeIndex, skip: EdgeIndex) -> bool {
        self.mol.bonds_in_order(atom).into_iter().any(|b| {
            b != skip && (self.dirs[b.index()].is_some() || has_direction(&self.mol.bond(b).expr))
        })
    }

    /// Pinned bonds are always usable; a free one only if marking it adds
    /// no constraint elsewhere.
    fn usable(&self, bond: EdgeIndex) -> bool {
        self.dirs[bond.index()].is_some() || !self.completes_unconstrained(bond)
    }

    /// Preferred marker bond at one end: already pinned, then shared with
    /// another stereo double bond, then the first written.
    fn reference(&self, candidates: &[EdgeIndex], atom: NodeIndex, double: EdgeIndex) -> Option<EdgeIndex> {
        candidates
            .iter()
            .copied()
            .find(|b| self.dirs[b.index()].is_some())
            .or_else(|| {
                candidates
                    .iter()
                    .copied()
                    .find(|&b| self.leads_to_stereo(b, atom, double))
            })
            .or_else(|| candidates.first().copied())
    }

    fn place(&mut self, double: EdgeIndex, config: Configuration) {
        let Some((u, v)) = self.mol.bond_endpoints(double) else {
            return;
        };
        let left = self.candidates(u, double);
        let right = self.candidates(v, double);
        if left.is_empty() || right.is_empty() {
            tracing::warn!(
                bond = double.index(),
                "double bond has no neighbour bond to carry a directional marker"
            );
            return;
        }

        let usable = |bonds: &[EdgeIndex]| -> Vec<EdgeIndex> {
            bonds.iter().copied().filter(|&b| self.usable(b)).collect()
        };
        let left = usable(&left);
        let right = usable(&right);
        let l = self.reference(&left, u, double);
        let r = self.reference(&right, v, double);
        let (Some(l), Some(r)) = (l, r) else {
            tracing::warn!(
                bond = double.index(),
                ?config,
                "every marker bond would constrain a neighbouring double bond, configuration dropped"
            );
            return;
        };

        let unpinned = |bonds: &[EdgeIndex], skip: EdgeIndex| -> Vec<EdgeIndex> {
            bonds
                .iter()
                .copied()
                .filter(|&b| b != skip && self.dirs[b.index()].is_none())
                .collect()
        };
        let pairs: Vec<(EdgeIndex, EdgeIndex)> = std::iter::once((l, r))
            .chain(unpinned(&left, l).into_iter().map(|alt| (alt, r)))
            .chain(unpinned(&right, r).into_iter().map(|alt| (l, alt)))
            .collect();

        for exact in [true, false] {
            for &(a, b) in &pairs {
                if self.try_pair(config, (u, a), (v, b), exact) {
                    if !exact {
                        tracing::warn!(
                            bond = double.index(),
                            ?config,
                            "double bond configuration written as a wider set"
                        );
                    }
                    return;
                }
            }
        }

        tracing::warn!(
            bond = double.index(),
            ?config,
            "conflicting directional markers, widening to either direction"
        );
        self.widen(config, (u, l), (v, r));
    }

    /// Finds markers for `l` and `r` (each at the given double bond atom)
    /// that produce `config`, or a superset of it when `exact` is false.
    /// Pinned markers are kept as they are.
    fn try_pair(
        &mut self,
        config: Configuration,
        (u, l): (NodeIndex, EdgeIndex),
        (v, r): (NodeIndex, EdgeIndex),
        exact: bool,
    ) -> bool {
        let options = |bond: EdgeIndex| -> Vec<Direction> {
            match self.dirs[bond.index()] {
                Some(d) => vec![d],
                None => CANDIDATES.to_vec(),
            }
        };
        let left = options(l);
        let right = options(r);
        for &dl in &left {
            for &dr in &right {
                let got = self.combined((u, l, dl), (v, r, dr));
                if got == config || (!exact && got.contains(config)) {
                    self.dirs[l.index()] = Some(dl);
                    self.dirs[r.index()] = Some(dr);
                    return true;
                }
            }
        }
        false
    }

    fn combined(
        &self,
        (u, l, dl): (NodeIndex, EdgeIndex, Direction),
        (v, r, dr): (NodeIndex, EdgeIndex, Direction),
    ) -> Configuration {
        combine(seen_from(self.mol, l, u, dl), seen_from(self.mol, r, v, dr))
    }

    /// Both ends are pinned and disagree with `config`. Widens the right
    /// marker, then the left one, to admit both directions, so every double
    /// bond sharing them reads back with a superset of its configuration.
    /// A marker widened to every direction is written as no marker at all.
    fn widen(
        &mut self,
        config: Configuration,
        (u, l): (NodeIndex, EdgeIndex),
        (v, r): (NodeIndex, EdgeIndex),
    ) {
        let mut extra = Direction::UP | Direction::DOWN;
        if config.contains(Configuration::UNSPECIFIED) {
            extra |= Direction::NEITHER;
        }
        for bond in [r, l] {
            let current = self.dirs[bond.index()].unwrap_or(Direction::empty());
            self.dirs[bond.index()] = Some(current | extra);
            let (Some(dl), Some(dr)) = (self.dirs[l.index()], self.dirs[r.index()]) else {
                continue;
            };
            if self.combined((u, l, dl), (v, r, dr)).contains(config) {
                return;
            }
        }
    }
}
