//! SMARTS query patterns: parsing, the expression tree and writing back.

mod bond_dirs;
mod error;
mod expr;
mod flavor;
mod lexer;
mod parser;
mod stereo;
mod writer;

pub use error::{last_error_location_display, last_error_message, GenerateError, SmartsError};
pub use expr::{Expr, ExprType};
pub use flavor::Flavor;
pub use parser::{parse_into, MAX_RECURSION_DEPTH};
pub use stereo::{Configuration, Direction, ANTICLOCKWISE, CLOCKWISE, UNSPECIFIED_CENTER};
pub use writer::{generate_atom_expr, generate_bond_expr, to_smarts};

use crate::atom::QueryAtom;
use crate::bond::QueryBond;
use crate::mol::Mol;

/// A parsed SMARTS pattern.
pub type QueryMol = Mol<QueryAtom, QueryBond>;

/// Parses a SMARTS pattern with the default (permissive) flavor.
pub fn from_smarts(s: &str) -> Result<QueryMol, SmartsError> {
    from_smarts_with(s, Flavor::default())
}

/// Parses a SMARTS pattern, accepting only what `flavor` allows.
pub fn from_smarts_with(s: &str, flavor: Flavor) -> Result<QueryMol, SmartsError> {
    let mut mol = QueryMol::new();
    parse_into(&mut mol, s, flavor)?;
    Ok(mol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::ReactionRole;
    use petgraph::graph::{EdgeIndex, NodeIndex};

    fn smarts(s: &str) -> QueryMol {
        from_smarts(s).unwrap_or_else(|e| panic!("bad SMARTS {s:?}: {e}"))
    }

    fn leaf(kind: ExprType, value: i32) -> Expr {
        Expr::prim(kind, value)
    }

    fn atom(q: &QueryMol, i: usize) -> &Expr {
        &q.atom(NodeIndex::new(i)).expr
    }

    /// Parse, write, parse again: the two graphs must be equal.
    fn assert_round_trip(s: &str) {
        let first = smarts(s);
        let text = to_smarts(&first).unwrap_or_else(|e| panic!("cannot write {s:?}: {e}"));
        let second = from_smarts(&text).unwrap_or_else(|e| panic!("cannot re-read {text:?} from {s:?}: {e}"));
        assert_eq!(first, second, "{s:?} was written as {text:?}");
    }

    // ---- Ring closures ----

    #[test]
    fn unclosed_ring_is_an_error() {
        assert!(matches!(
            from_smarts("C1CC"),
            Err(SmartsError::UnclosedRing { pos: 1, ring: 1 })
        ));
    }

    #[test]
    fn percent_ring_numbers() {
        let q = smarts("C%12CC%12");
        assert_eq!(q.bond_count(), 3);
        assert!(from_smarts("C%1CC").is_err());
        assert!(from_smarts("C%").is_err());
    }

    #[test]
    fn self_ring_is_rejected() {
        assert!(from_smarts("C11").is_err());
    }

    // ---- Branches ----

    #[test]
    fn nested_branches() {
        let q = smarts("C(C(C)C)C");
        assert_eq!(q.atom_count(), 5);
        assert_eq!(q.bond_count(), 4);
        assert_eq!(q.neighbors(NodeIndex::new(0)).count(), 2);
        assert_eq!(q.neighbors(NodeIndex::new(1)).count(), 3);
    }

    #[test]
    fn unopened_branch() {
        assert!(matches!(from_smarts("C)C"), Err(SmartsError::UnopenedBranch { pos: 1 })));
        assert_eq!(
            last_error_message().as_deref(),
            Some("closing unopened branch at position 1")
        );
        assert_eq!(last_error_location_display().as_deref(), Some("C)C\n ^"));
    }

    #[test]
    fn unclosed_branch() {
        assert!(matches!(from_smarts("C(C"), Err(SmartsError::UnclosedBranch { .. })));
    }

    #[test]
    fn successful_parse_clears_last_error() {
        assert!(from_smarts("C)C").is_err());
        smarts("CC");
        assert!(last_error_message().is_none());
    }

    // ---- Flavors ----

    #[test]
    fn heavy_degree_depends_on_flavor() {
        let q = from_smarts_with("[D3]", Flavor::CDK_LEGACY).unwrap();
        assert_eq!(atom(&q, 0), &leaf(ExprType::HeavyDegree, 3));
        let q = from_smarts_with("[D3]", Flavor::DAYLIGHT).unwrap();
        assert_eq!(atom(&q, 0), &leaf(ExprType::Degree, 3));
    }

    #[test]
    fn extension_primitives_are_gated() {
        assert!(from_smarts_with("[^2]", Flavor::DAYLIGHT).is_err());
        assert!(from_smarts_with("[^2]", Flavor::OECHEM).is_ok());
        assert!(from_smarts_with("[z2]", Flavor::DAYLIGHT).is_err());
        assert!(from_smarts_with("[z2]", Flavor::CACTVS).is_ok());
        assert!(matches!(
            from_smarts_with("[d2]", Flavor::DAYLIGHT),
            Err(SmartsError::UnsupportedPrimitive { pos: 1, ch: 'd' })
        ));
    }

    // ---- Double bond stereo ----

    #[test]
    fn trans_bond_gets_configuration() {
        let q = smarts("F/C=C/F");
        let double = &q.bond(EdgeIndex::new(1)).expr;
        assert_eq!(
            double,
            &leaf(ExprType::AliphaticOrder, 2).and(leaf(
                ExprType::Stereochemistry,
                Configuration::OPPOSITE.bits() as i32
            ))
        );
        assert_eq!(q.bond(EdgeIndex::new(0)).expr, leaf(ExprType::SingleOrAromatic, 0));
        assert_eq!(to_smarts(&q).unwrap(), "F/C=C/F");
    }

    #[test]
    fn unresolved_markers_stay_on_the_bond() {
        let q = smarts("F/CC");
        assert_eq!(
            q.bond(EdgeIndex::new(0)).expr,
            leaf(ExprType::BondDirection, Direction::UP.bits() as i32)
        );
    }

    // ---- Recursive SMARTS ----

    #[test]
    fn single_atom_recursion_collapses() {
        let q = smarts("[$([CH2])]");
        assert_eq!(
            atom(&q, 0),
            &leaf(ExprType::AliphaticElement, 6).and(leaf(ExprType::TotalHCount, 2))
        );
    }

    #[test]
    fn multi_atom_recursion_is_kept() {
        let q = smarts("[$(CO)]C");
        let sub = atom(&q, 0).subquery().unwrap();
        assert_eq!(sub.atom_count(), 2);
        assert_eq!(to_smarts(&q).unwrap(), "[$(CO)]C");
    }

    // ---- Precedence ----

    #[test]
    fn not_binds_tighter_than_low_and() {
        let q = smarts("[!C;R]");
        assert_eq!(
            atom(&q, 0),
            &leaf(ExprType::AliphaticElement, 6)
                .negate()
                .and(leaf(ExprType::IsInRing, 0))
        );
    }

    #[test]
    fn or_binds_looser_than_high_and() {
        let q = smarts("[C,N&R]");
        assert_eq!(
            atom(&q, 0),
            &leaf(ExprType::AliphaticElement, 6)
                .or(leaf(ExprType::AliphaticElement, 7).and(leaf(ExprType::IsInRing, 0)))
        );
    }

    // ---- Round trips ----

    #[test]
    fn round_trips() {
        for s in [
            "CCO",
            "c1ccccc1",
            "[#6;R2]",
            "[C,N;!R]",
            "[!$([C,N])]",
            "[CH2:3]C",
            "C=,#C",
            "C-,:C",
            "C!@C",
            "[NX3;H2,H1;!$(NC=O)]",
            "[$(C=O)]N",
            "[13C]",
            "[+,-]",
            "[D{2-3}]",
            "C1CC2CC1CC2",
            "N.(C.O)",
            "C>N>O",
            "[C:1]>>[N:1]",
            "F/C=C/C=C\\F",
            "F/C=C/C=CC(/C)=C/F",
            "F/C=C/?F",
            "C1CCCC/C=C/CCC1",
            "[*;x2]",
        ] {
            assert_round_trip(s);
        }
    }

    #[test]
    fn tetrahedral_round_trips() {
        for s in [
            "N[C@H](C)O",
            "N[C@@H](C)O",
            "[C@](F)(Cl)(Br)I",
            "F[C@]1(Cl)CCC1",
            "C1CC[C@@H]1N",
        ] {
            assert_round_trip(s);
        }
    }

    #[test]
    fn written_mark_follows_stored_ligand_order() {
        let mut q = smarts("N[C@H](C)O");
        let [n, c, me, o] = [0, 1, 2, 3].map(NodeIndex::new);
        // Same handedness after an odd permutation of the ligands means the
        // opposite mark when written in graph order.
        q.add_tetrahedral_stereo(crate::TetrahedralStereo {
            center: c,
            ligands: [n, c, o, me],
        });
        assert_eq!(to_smarts(&q).unwrap(), "N[C@@H1](C)O");
    }

    // ---- Reactions and components ----

    #[test]
    fn reaction_roles_are_tagged() {
        let q = smarts("CC>O>N");
        let roles: Vec<ReactionRole> = q.atoms().map(|a| q.atom(a).role).collect();
        assert_eq!(
            roles,
            vec![
                ReactionRole::Reactant,
                ReactionRole::Reactant,
                ReactionRole::Agent,
                ReactionRole::Product
            ]
        );
        assert!(from_smarts("C>C>C>C").is_err());
    }

    #[test]
    fn component_groups() {
        let q = smarts("(C.C).C");
        let comps: Vec<u32> = q.atoms().map(|a| q.atom(a).component).collect();
        assert_eq!(comps, vec![1, 1, 0]);
        assert!(matches!(from_smarts("(C.C"), Err(SmartsError::UnclosedComponent { .. })));
    }

    #[test]
    fn parse_into_appends_and_offsets_components() {
        let mut q = smarts("(C).N");
        parse_into(&mut q, "(O)", Flavor::default()).unwrap();
        assert_eq!(q.atom_count(), 3);
        assert_eq!(q.atom(NodeIndex::new(2)).component, 2);

        let before = q.clone();
        assert!(parse_into(&mut q, "C(", Flavor::default()).is_err());
        assert_eq!(q, before);
    }

    #[test]
    fn empty_and_whitespace() {
        assert_eq!(from_smarts(""), Err(SmartsError::EmptyInput));
        assert_eq!(from_smarts("   "), Err(SmartsError::EmptyInput));
        assert_eq!(smarts("CC name").atom_count(), 2);
    }
}
