use crate::*;

use petgraph::graph::NodeIndex;

fn carbon() -> QueryAtom {
    QueryAtom::new(Expr::prim(ExprType::AliphaticElement, 6))
}

#[test]
fn query_mol_add_atoms_and_bonds() {
    let mut mol = QueryMol::new();
    let c = mol.add_atom(carbon());
    let o = mol.add_atom(QueryAtom::new(Expr::prim(ExprType::AliphaticElement, 8)));
    let bond_idx = mol.add_bond(
        c,
        o,
        QueryBond::new(Expr::prim(ExprType::AliphaticOrder, 2)),
    );

    assert_eq!(mol.atom_count(), 2);
    assert_eq!(mol.bond_count(), 1);
    assert!(mol.atom(c).expr.is(ExprType::AliphaticElement, 6));
    assert!(mol.bond(bond_idx).expr.is(ExprType::AliphaticOrder, 2));
    assert_eq!(to_smarts(&mol).unwrap(), "C=O");
}

#[test]
fn query_mol_neighbors_and_bonds_of() {
    let mut mol = QueryMol::new();
    let a = mol.add_atom(carbon());
    let b = mol.add_atom(carbon());
    let c = mol.add_atom(carbon());
    mol.add_bond(a, b, QueryBond::default());
    mol.add_bond(a, c, QueryBond::default());

    assert_eq!(mol.neighbors(a).count(), 2);
    assert_eq!(mol.bonds_of(a).count(), 2);
    assert_eq!(to_smarts(&mol).unwrap(), "C(C)C");
}

#[test]
fn default_atom_and_bond() {
    let atom = QueryAtom::default();
    assert!(atom.expr.is(ExprType::True, 0));
    assert_eq!(atom.map_idx, 0);
    assert_eq!(atom.component, 0);
    assert_eq!(atom.role, ReactionRole::None);
    assert!(QueryBond::default().expr.is(ExprType::SingleOrAromatic, 0));
}

#[test]
fn hand_built_reaction() {
    let mut mol = QueryMol::new();
    let mut reactant = carbon();
    reactant.role = ReactionRole::Reactant;
    reactant.map_idx = 1;
    let mut product = QueryAtom::new(Expr::prim(ExprType::AliphaticElement, 7));
    product.role = ReactionRole::Product;
    product.map_idx = 1;
    mol.add_atom(product);
    mol.add_atom(reactant);

    assert_eq!(to_smarts(&mol).unwrap(), "[C:1]>>[N:1]");
}

#[test]
fn unassigned_role_is_written_as_reactant() {
    let mut mol = QueryMol::new();
    mol.add_atom(carbon());
    let mut agent = carbon();
    agent.role = ReactionRole::Agent;
    mol.add_atom(agent);
    assert_eq!(to_smarts(&mol).unwrap(), "C>C>");
}

#[test]
fn hand_built_tetrahedral_center() {
    let mut mol = QueryMol::new();
    let center = mol.add_atom(QueryAtom::new(
        Expr::prim(ExprType::AliphaticElement, 6).and(Expr::prim(ExprType::Stereochemistry, smarts::CLOCKWISE)),
    ));
    let mut ligands = [center; 4];
    for (i, n) in [9, 17, 35, 53].into_iter().enumerate() {
        let a = mol.add_atom(QueryAtom::new(Expr::prim(ExprType::AliphaticElement, n)));
        mol.add_bond(center, a, QueryBond::default());
        ligands[i] = a;
    }
    mol.add_tetrahedral_stereo(TetrahedralStereo { center, ligands });
    assert_eq!(to_smarts(&mol).unwrap(), "[C@@](F)(Cl)(Br)I");

    ligands.swap(0, 1);
    mol.add_tetrahedral_stereo(TetrahedralStereo { center, ligands });
    assert_eq!(to_smarts(&mol).unwrap(), "[C@](F)(Cl)(Br)I");
}

#[test]
fn ring_bond_written_from_closing_end_flips_marker() {
    let mut mol = QueryMol::new();
    let atoms: Vec<NodeIndex> = (0..4).map(|_| mol.add_atom(carbon())).collect();
    for w in atoms.windows(2) {
        mol.add_bond(w[0], w[1], QueryBond::default());
    }
    let up = Expr::prim(ExprType::BondDirection, smarts::Direction::UP.bits() as i32);
    // Stored end to start, so written from the start it reads as `\`.
    mol.add_bond(atoms[3], atoms[0], QueryBond::new(up));
    assert_eq!(to_smarts(&mol).unwrap(), "C\\1CCC1");
}

#[test]
fn element_symbols() {
    assert_eq!(Element::from_symbol("Cl"), Some(Element::CL));
    assert_eq!(Element::CL.symbol(), "Cl");
    assert_eq!(Element::SE.aromatic_symbol(), Some("se"));
    assert!(Element::from_atomic_num(0).is_none());
}
