use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::mol::TetrahedralStereo;

use super::expr::{Expr, ExprType};
use super::QueryMol;

bitflags::bitflags! {
    /// Directional marks a bond may carry, read from its begin atom.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Direction: u8 {
        /// `/`
        const UP      = 0x01;
        /// `\`
        const DOWN    = 0x02;
        /// No mark.
        const NEITHER = 0x04;
    }
}

bitflags::bitflags! {
    /// Relative arrangement of the marked neighbours around a double bond.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Configuration: u8 {
        /// Same side (cis, Z when the marked neighbours have priority).
        const TOGETHER    = 0x01;
        /// Opposite sides (trans).
        const OPPOSITE    = 0x02;
        const UNSPECIFIED = 0x04;
    }
}

impl Direction {
    /// The same marks read from the other end of the bond.
    pub fn flip(self) -> Direction {
        let mut out = self & Direction::NEITHER;
        if self.contains(Direction::UP) {
            out |= Direction::DOWN;
        }
        if self.contains(Direction::DOWN) {
            out |= Direction::UP;
        }
        out
    }

    pub(crate) fn as_value(self) -> i32 {
        self.bits() as i32
    }

    pub(crate) fn from_value(value: i32) -> Direction {
        Direction::from_bits_truncate(value as u8)
    }
}

impl Configuration {
    pub(crate) fn as_value(self) -> i32 {
        self.bits() as i32
    }

    pub(crate) fn from_value(value: i32) -> Configuration {
        Configuration::from_bits_truncate(value as u8)
    }
}

/// Atom stereo value for `@`.
pub const ANTICLOCKWISE: i32 = 1;
/// Atom stereo value for `@@`.
pub const CLOCKWISE: i32 = 2;
/// Atom stereo value for an unspecified center (the `?` in `@?`).
pub const UNSPECIFIED_CENTER: i32 = 0;

pub(crate) fn has_direction(expr: &Expr) -> bool {
    expr.contains(ExprType::BondDirection)
}

/// The set of directions a bond expression admits.
///
/// Leaves other than `BondDirection` do not constrain the direction. A
/// negation only complements when its operand mentions a direction.
pub(crate) fn direction_set(expr: &Expr) -> Direction {
    match expr {
        Expr::Leaf {
            kind: ExprType::BondDirection,
            value,
        } => Direction::from_value(*value),
        Expr::Leaf { .. } | Expr::Recursive(_) => Direction::all(),
        Expr::And(l, r) => direction_set(l) & direction_set(r),
        Expr::Or(l, r) => direction_set(l) | direction_set(r),
        Expr::Not(x) => {
            if has_direction(x) {
                direction_set(x).complement()
            } else {
                Direction::all()
            }
        }
    }
}

/// Configurations produced by every pairing of the two direction sets.
///
/// Both sets must already be read outward from the double bond.
pub(crate) fn combine(left: Direction, right: Direction) -> Configuration {
    let mut out = Configuration::empty();
    for l in left.iter() {
        for r in right.iter() {
            out |= if l == Direction::NEITHER || r == Direction::NEITHER {
                Configuration::UNSPECIFIED
            } else if l == r {
                Configuration::TOGETHER
            } else {
                Configuration::OPPOSITE
            };
        }
    }
    out
}

/// Flips every direction leaf in `expr`, for markers read from the end atom.
pub(crate) fn flip_directions(mut expr: Expr) -> Expr {
    expr.map_values(ExprType::BondDirection, &|v| {
        Direction::from_value(v).flip().as_value()
    });
    expr
}

/// Directions of `bond` as seen from `atom` outward.
pub(crate) fn seen_from(mol: &QueryMol, bond: EdgeIndex, atom: NodeIndex, dirs: Direction) -> Direction {
    match mol.bond_endpoints(bond) {
        Some((begin, _)) if begin != atom => dirs.flip(),
        _ => dirs,
    }
}

/// Whether the bond is a double bond, or may match one.
pub(crate) fn is_double_like(expr: &Expr) -> bool {
    expr.any_positive_leaf(&|kind, value| {
        matches!(
            (kind, value),
            (ExprType::AliphaticOrder, 2) | (ExprType::SingleOrDouble, _) | (ExprType::DoubleOrAromatic, _)
        )
    })
}

pub(crate) fn is_atom_stereo(expr: &Expr) -> bool {
    expr.contains(ExprType::Stereochemistry)
}

/// Swaps `@` and `@@` in every atom stereo leaf.
pub(crate) fn invert_atom_stereo(expr: &mut Expr) {
    expr.map_values(ExprType::Stereochemistry, &|v| match v {
        ANTICLOCKWISE => CLOCKWISE,
        CLOCKWISE => ANTICLOCKWISE,
        v => v,
    });
}

/// Derives cis/trans constraints from directional markers.
///
/// Every double-like bond among `bonds` that has a marked neighbour bond on
/// both ends gains a `Stereochemistry` leaf. The first marked bond (in
/// insertion order) at each end is used. Markers that contributed to a
/// constraint are removed afterwards; a bond left empty becomes the
/// implicit single-or-aromatic bond.
pub(crate) fn resolve_double_bonds(mol: &mut QueryMol, bonds: &[EdgeIndex]) {
    let mut consumed: Vec<EdgeIndex> = Vec::new();

    for &bond in bonds {
        if !is_double_like(&mol.bond(bond).expr) {
            continue;
        }
        let Some((u, v)) = mol.bond_endpoints(bond) else {
            continue;
        };
        let Some(left) = first_marked(mol, u, bond) else {
            continue;
        };
        let Some(right) = first_marked(mol, v, bond) else {
            continue;
        };

        let l = seen_from(mol, left, u, direction_set(&mol.bond(left).expr));
        let r = seen_from(mol, right, v, direction_set(&mol.bond(right).expr));
        let config = combine(l, r);
        if config.is_empty() || config.is_all() {
            continue;
        }

        let expr = std::mem::take(&mut mol.bond_mut(bond).expr);
        mol.bond_mut(bond).expr = expr.and(Expr::prim(ExprType::Stereochemistry, config.as_value()));
        consumed.push(left);
        consumed.push(right);
    }

    consumed.sort();
    consumed.dedup();
    for bond in consumed {
        let expr = std::mem::take(&mut mol.bond_mut(bond).expr);
        mol.bond_mut(bond).expr = expr
            .remove_leaves(&|kind, _| kind == ExprType::BondDirection)
            .unwrap_or_else(|| Expr::prim(ExprType::SingleOrAromatic, 0));
    }
}

fn first_marked(mol: &QueryMol, atom: NodeIndex, skip: EdgeIndex) -> Option<EdgeIndex> {
    mol.bonds_in_order(atom)
        .into_iter()
        .find(|&b| b != skip && has_direction(&mol.bond(b).expr))
}

/// Builds the ligand order of a tetrahedral center from its written
/// neighbours.
///
/// With three neighbours the center stands in for the implicit ligand,
/// placed right after the preceding atom, or first when there is none.
pub(crate) fn tetrahedral_ligands(
    center: NodeIndex,
    preceded: bool,
    written: &[NodeIndex],
) -> Option<TetrahedralStereo> {
    let ligands = match *written {
        [a, b, c] if preceded => [a, center, b, c],
        [a, b, c] => [center, a, b, c],
        [a, b, c, d] => [a, b, c, d],
        _ => return None,
    };
    Some(TetrahedralStereo { center, ligands })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(d: Direction) -> Expr {
        Expr::prim(ExprType::BondDirection, d.as_value())
    }

    #[test]
    fn flip_swaps_up_and_down() {
        assert_eq!(Direction::UP.flip(), Direction::DOWN);
        assert_eq!((Direction::DOWN | Direction::NEITHER).flip(), Direction::UP | Direction::NEITHER);
        assert_eq!(Direction::NEITHER.flip(), Direction::NEITHER);
        assert_eq!(Direction::all().flip(), Direction::all());
    }

    #[test]
    fn direction_set_truth_table() {
        assert_eq!(direction_set(&dir(Direction::UP)), Direction::UP);
        assert_eq!(
            direction_set(&Expr::prim(ExprType::AliphaticOrder, 1)),
            Direction::all()
        );
        assert_eq!(
            direction_set(&dir(Direction::UP).or(dir(Direction::DOWN))),
            Direction::UP | Direction::DOWN
        );
        assert_eq!(
            direction_set(&dir(Direction::UP).negate().and(dir(Direction::DOWN).negate())),
            Direction::NEITHER
        );
        assert_eq!(
            direction_set(&Expr::prim(ExprType::IsInRing, 0).negate()),
            Direction::all()
        );
    }

    #[test]
    fn combine_pairs() {
        assert_eq!(combine(Direction::UP, Direction::UP), Configuration::TOGETHER);
        assert_eq!(combine(Direction::UP, Direction::DOWN), Configuration::OPPOSITE);
        assert_eq!(
            combine(Direction::UP, Direction::UP | Direction::NEITHER),
            Configuration::TOGETHER | Configuration::UNSPECIFIED
        );
        assert_eq!(combine(Direction::NEITHER, Direction::DOWN), Configuration::UNSPECIFIED);
        assert_eq!(combine(Direction::UP, Direction::empty()), Configuration::empty());
    }

    #[test]
    fn double_like_ignores_negation() {
        assert!(is_double_like(&Expr::prim(ExprType::AliphaticOrder, 2)));
        assert!(is_double_like(&Expr::prim(ExprType::DoubleOrAromatic, 0)));
        assert!(!is_double_like(&Expr::prim(ExprType::AliphaticOrder, 2).negate()));
        assert!(!is_double_like(&Expr::prim(ExprType::SingleOrAromatic, 0)));
    }

    #[test]
    fn ligands_for_implicit_neighbour() {
        let c = NodeIndex::new(1);
        let (a, b, d) = (NodeIndex::new(0), NodeIndex::new(2), NodeIndex::new(3));
        let s = tetrahedral_ligands(c, true, &[a, b, d]).unwrap();
        assert_eq!(s.ligands, [a, c, b, d]);
        let s = tetrahedral_ligands(c, false, &[a, b, d]).unwrap();
        assert_eq!(s.ligands, [c, a, b, d]);
        assert!(tetrahedral_ligands(c, true, &[a, b]).is_none());
    }

    #[test]
    fn invert_atom_stereo_keeps_unspecified() {
        let mut e = Expr::prim(ExprType::Stereochemistry, ANTICLOCKWISE)
            .or(Expr::prim(ExprType::Stereochemistry, UNSPECIFIED_CENTER));
        invert_atom_stereo(&mut e);
        assert_eq!(e.left().map(Expr::value), Some(CLOCKWISE));
        assert_eq!(e.right().map(Expr::value), Some(UNSPECIFIED_CENTER));
    }
}
