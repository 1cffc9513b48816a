use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::atom::ReactionRole;
use crate::element::Element;
use crate::mol::permutation_parity;

use super::bond_dirs;
use super::error::GenerateError;
use super::expr::{Expr, ExprType};
use super::stereo::{self, Direction};
use super::QueryMol;

/// Operator strength an expression slot requires, loosest first.
const LOW_AND: u8 = 0;
const OR: u8 = 1;
const HIGH_AND: u8 = 2;
const UNARY: u8 = 3;

/// Writes a query graph as a SMARTS string.
///
/// Re-parsing the output gives a graph equal to `mol` up to atom and bond
/// renumbering, with the exceptions noted on [`generate_atom_expr`].
pub fn to_smarts(mol: &QueryMol) -> Result<String, GenerateError> {
    if mol.atom_count() == 0 {
        return Ok(String::new());
    }

    let uses_roles = mol.atoms().any(|a| mol.atom(a).role != ReactionRole::None);
    let role_of = |a: NodeIndex| match mol.atom(a).role {
        ReactionRole::None if uses_roles => ReactionRole::Reactant,
        role => role,
    };

    let mut atoms: Vec<NodeIndex> = mol.atoms().collect();
    atoms.sort_by_key(|&a| (role_of(a), mol.atom(a).component));

    let layout = Layout::build(mol, &atoms);
    let mut writer = Writer {
        mol,
        dirs: bond_dirs::assign(mol),
        ring_ids: vec![None; mol.bond_count()],
        in_use: [false; 100],
        out: String::new(),
        layout,
    };

    let roots = writer.layout.roots.clone();
    if uses_roles {
        for (i, role) in [ReactionRole::Reactant, ReactionRole::Agent, ReactionRole::Product]
            .into_iter()
            .enumerate()
        {
            if i > 0 {
                writer.out.push('>');
            }
            let section: Vec<NodeIndex> = roots.iter().copied().filter(|&r| role_of(r) == role).collect();
            writer.write_fragments(&section)?;
        }
    } else {
        writer.write_fragments(&roots)?;
    }

    Ok(writer.out)
}

/// Writes a single atom as it would appear in a pattern: bare when the
/// expression has an organic-subset form, bracketed otherwise.
///
/// Expressions that cannot be nested with the SMARTS operators are wrapped
/// as `$([...])`. Some trees come back in an equivalent but different shape:
/// `RingSize` is written as `r`, `RingCount(0)` as `R0` and an aromatic
/// element without a lowercase symbol as `#n&a`.
pub fn generate_atom_expr(expr: &Expr) -> Result<String, GenerateError> {
    let expr = expr
        .clone()
        .remove_leaves(&|kind, _| kind == ExprType::ReactionRole)
        .unwrap_or_default();
    atom_text(&expr, 0)
}

/// Writes a bond expression. The implicit single-or-aromatic bond is
/// written as the empty string.
pub fn generate_bond_expr(expr: &Expr) -> Result<String, GenerateError> {
    let expr = expr
        .clone()
        .remove_leaves(&|kind, _| kind == ExprType::Stereochemistry)
        .unwrap_or_else(default_bond);
    bond_text(&expr)
}

fn default_bond() -> Expr {
    Expr::prim(ExprType::SingleOrAromatic, 0)
}

/// Depth-first spanning forest of the graph, in writing order.
struct Layout {
    preorder: Vec<usize>,
    children: Vec<Vec<(EdgeIndex, NodeIndex)>>,
    rings: Vec<Vec<(EdgeIndex, NodeIndex)>>,
    roots: Vec<NodeIndex>,
}

impl Layout {
    fn build(mol: &QueryMol, start_order: &[NodeIndex]) -> Self {
        let n = mol.atom_count();
        let mut preorder = vec![usize::MAX; n];
        let mut parent_edge: Vec<Option<EdgeIndex>> = vec![None; n];
        let mut children: Vec<Vec<(EdgeIndex, NodeIndex)>> = (0..n).map(|_| Vec::new()).collect();
        let mut rings: Vec<Vec<(EdgeIndex, NodeIndex)>> = (0..n).map(|_| Vec::new()).collect();
        let mut roots = Vec::new();
        let mut counter = 0;

        for &start in start_order {
            if preorder[start.index()] != usize::MAX {
                continue;
            }
            roots.push(start);
            preorder[start.index()] = counter;
            counter += 1;

            let mut stack: Vec<(NodeIndex, Vec<EdgeIndex>, usize)> =
                vec![(start, mol.bonds_in_order(start), 0)];
            loop {
                let Some((node, edges, next)) = stack.last_mut() else {
                    break;
                };
                let node = *node;
                let Some(&edge) = edges.get(*next) else {
                    stack.pop();
                    continue;
                };
                *next += 1;

                if parent_edge[node.index()] == Some(edge) {
                    continue;
                }
                let Some(neighbor) = mol.other_atom(edge, node) else {
                    continue;
                };
                if neighbor == node {
                    continue;
                }
                if preorder[neighbor.index()] == usize::MAX {
                    preorder[neighbor.index()] = counter;
                    counter += 1;
                    parent_edge[neighbor.index()] = Some(edge);
                    children[node.index()].push((edge, neighbor));
                    stack.push((neighbor, mol.bonds_in_order(neighbor), 0));
                } else if !rings[node.index()].iter().any(|&(e, _)| e == edge) {
                    rings[node.index()].push((edge, neighbor));
                    rings[neighbor.index()].push((edge, node));
                }
            }
        }

        Self {
            preorder,
            children,
            rings,
            roots,
        }
    }
}

enum Step {
    Atom(NodeIndex, Option<EdgeIndex>),
    Bond {
        edge: EdgeIndex,
        from: NodeIndex,
        child: NodeIndex,
        branch: bool,
    },
    Close,
}

struct Writer<'m> {
    mol: &'m QueryMol,
    layout: Layout,
    dirs: Vec<Option<Direction>>,
    ring_ids: Vec<Option<usize>>,
    in_use: [bool; 100],
    out: String,
}

impl Writer<'_> {
    /// Writes `.`-separated fragments, grouping runs that share a non-zero
    /// component number in parentheses.
    fn write_fragments(&mut self, roots: &[NodeIndex]) -> Result<(), GenerateError> {
        let mut i = 0;
        while i < roots.len() {
            if i > 0 {
                self.out.push('.');
            }
            let component = self.mol.atom(roots[i]).component;
            if component == 0 {
                self.write_node(roots[i], None)?;
                i += 1;
                continue;
            }
            let end = roots[i..]
                .iter()
                .position(|&r| self.mol.atom(r).component != component)
                .map_or(roots.len(), |p| i + p);
            self.out.push('(');
            for (k, &root) in roots[i..end].iter().enumerate() {
                if k > 0 {
                    self.out.push('.');
                }
                self.write_node(root, None)?;
            }
            self.out.push(')');
            i = end;
        }
        Ok(())
    }

    /// Writes the tree rooted at `root`. Emission runs off an explicit
    /// stack, so chain length does not grow the call stack.
    fn write_node(&mut self, root: NodeIndex, incoming: Option<EdgeIndex>) -> Result<(), GenerateError> {
        let mut stack = vec![Step::Atom(root, incoming)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Atom(node, incoming) => {
                    self.write_atom(node, incoming)?;
                    let kids = &self.layout.children[node.index()];
                    let last = kids.len().saturating_sub(1);
                    for (i, &(edge, child)) in kids.iter().enumerate().rev() {
                        stack.push(Step::Bond {
                            edge,
                            from: node,
                            child,
                            branch: i < last,
                        });
                    }
                }
                Step::Bond {
                    edge,
                    from,
                    child,
                    branch,
                } => {
                    if branch {
                        self.out.push('(');
                        stack.push(Step::Close);
                    }
                    let bond = self.edge_text(edge, from)?;
                    self.out.push_str(&bond);
                    stack.push(Step::Atom(child, Some(edge)));
                }
                Step::Close => self.out.push(')'),
            }
        }
        Ok(())
    }

    /// Atom text followed by its ring-closure digits.
    fn write_atom(&mut self, node: NodeIndex, incoming: Option<EdgeIndex>) -> Result<(), GenerateError> {
        let text = self.atom_text(node, incoming)?;
        self.out.push_str(&text);

        let rings = self.layout.rings[node.index()].clone();
        for (edge, partner) in rings {
            if self.layout.preorder[partner.index()] < self.layout.preorder[node.index()] {
                if let Some(id) = self.ring_ids[edge.index()].take() {
                    self.in_use[id] = false;
                    write_ring_digit(id, &mut self.out);
                }
            } else {
                let id = (1..self.in_use.len())
                    .find(|&id| !self.in_use[id])
                    .ok_or(GenerateError::TooManyRings)?;
                self.in_use[id] = true;
                self.ring_ids[edge.index()] = Some(id);
                let bond = self.edge_text(edge, node)?;
                self.out.push_str(&bond);
                write_ring_digit(id, &mut self.out);
            }
        }
        Ok(())
    }

    fn atom_text(&self, node: NodeIndex, incoming: Option<EdgeIndex>) -> Result<String, GenerateError> {
        let atom = self.mol.atom(node);
        let mut expr = atom
            .expr
            .clone()
            .remove_leaves(&|kind, _| kind == ExprType::ReactionRole)
            .unwrap_or_default();

        if let Some(center) = self.mol.tetrahedral_stereo_for(node) {
            if stereo::is_atom_stereo(&expr) {
                let written = self.written_ligands(node, incoming, &center.ligands);
                if !permutation_parity(&center.ligands, &written) {
                    stereo::invert_atom_stereo(&mut expr);
                }
            }
        }

        atom_text(&expr, atom.map_idx)
    }

    /// Neighbours of `node` in the order they will appear in the output,
    /// with `node` itself standing in for an implicit hydrogen.
    fn written_ligands(&self, node: NodeIndex, incoming: Option<EdgeIndex>, stored: &[NodeIndex]) -> Vec<NodeIndex> {
        let mut out = Vec::with_capacity(4);
        if let Some(parent) = incoming.and_then(|e| self.mol.other_atom(e, node)) {
            out.push(parent);
        }
        if stored.contains(&node) {
            out.push(node);
        }
        out.extend(self.layout.rings[node.index()].iter().map(|&(_, p)| p));
        out.extend(self.layout.children[node.index()].iter().map(|&(_, c)| c));
        out
    }

    /// Bond text for `edge` written after atom `from`.
    fn edge_text(&self, edge: EdgeIndex, from: NodeIndex) -> Result<String, GenerateError> {
        let stripped = self
            .mol
            .bond(edge)
            .expr
            .clone()
            .remove_leaves(&|kind, _| kind == ExprType::Stereochemistry);

        // A marker admitting every direction is the same as no marker.
        let dir = self.dirs[edge.index()].filter(|d| !d.is_all());
        let mut expr = match (stripped, dir) {
            (None, None) => default_bond(),
            (Some(e), None) => e,
            (None, Some(d)) => direction(d),
            (Some(e), Some(d)) if e.is(ExprType::SingleOrAromatic, 0) => direction(d),
            (Some(e), Some(d)) => e.and(direction(d)),
        };

        let begin = self.mol.bond_endpoints(edge).map(|(b, _)| b);
        if begin != Some(from) {
            expr = stereo::flip_directions(expr);
        }
        bond_text(&expr)
    }
}

fn direction(d: Direction) -> Expr {
    Expr::prim(ExprType::BondDirection, d.as_value())
}

fn write_ring_digit(id: usize, out: &mut String) {
    if id <= 9 {
        out.push(char::from(b'0' + id as u8));
    } else {
        out.push('%');
        out.push(char::from(b'0' + (id / 10) as u8));
        out.push(char::from(b'0' + (id % 10) as u8));
    }
}

fn atom_text(expr: &Expr, map_idx: u32) -> Result<String, GenerateError> {
    if map_idx == 0 {
        if let Some(bare) = bare_atom(expr) {
            return Ok(bare.to_string());
        }
    }
    let mut out = String::from("[");
    out.push_str(&write_expr(Ctx::Atom, expr, LOW_AND)?);
    if map_idx != 0 {
        out.push(':');
        out.push_str(&map_idx.to_string());
    }
    out.push(']');
    Ok(out)
}

fn bare_atom(expr: &Expr) -> Option<&'static str> {
    let Expr::Leaf { kind, value } = *expr else {
        return None;
    };
    let element = || u8::try_from(value).ok().and_then(Element::from_atomic_num);
    match kind {
        ExprType::True => Some("*"),
        ExprType::IsAromatic => Some("a"),
        ExprType::IsAliphatic => Some("A"),
        ExprType::AliphaticElement => element()
            .filter(|e| e.is_organic_subset())
            .map(Element::symbol),
        ExprType::AromaticElement => element()
            .filter(|e| e.is_aromatic_organic_subset())
            .and_then(Element::aromatic_symbol),
        _ => None,
    }
}

fn bond_text(expr: &Expr) -> Result<String, GenerateError> {
    if expr.is(ExprType::SingleOrAromatic, 0) {
        return Ok(String::new());
    }
    write_expr(Ctx::Bond, expr, LOW_AND)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ctx {
    Atom,
    Bond,
}

/// `@?` and `@@?` parse as a single primitive.
fn stereo_token(expr: &Expr) -> Option<&'static str> {
    let Expr::Or(l, r) = expr else {
        return None;
    };
    if !r.is(ExprType::Stereochemistry, stereo::UNSPECIFIED_CENTER) {
        return None;
    }
    if l.is(ExprType::Stereochemistry, stereo::ANTICLOCKWISE) {
        Some("@?")
    } else if l.is(ExprType::Stereochemistry, stereo::CLOCKWISE) {
        Some("@@?")
    } else {
        None
    }
}

/// Serializes `expr` so that it parses back as one operand at `level`.
fn write_expr(ctx: Ctx, expr: &Expr, level: u8) -> Result<String, GenerateError> {
    if ctx == Ctx::Atom {
        if let Some(token) = stereo_token(expr) {
            return Ok(token.to_string());
        }
    }
    match expr {
        Expr::Leaf { kind, value } => {
            let (text, natural) = leaf_text(ctx, *kind, *value)?;
            if natural >= level {
                Ok(text)
            } else {
                regroup(ctx, expr)
            }
        }
        Expr::Recursive(query) => match ctx {
            Ctx::Atom => Ok(format!("$({})", to_smarts(query)?)),
            Ctx::Bond => Err(GenerateError::UnsupportedBondExpr {
                kind: ExprType::Recursive,
                value: 0,
            }),
        },
        Expr::Not(x) => Ok(format!("!{}", write_expr(ctx, x, UNARY)?)),
        Expr::Or(l, r) => {
            if level > OR {
                return regroup(ctx, expr);
            }
            Ok(format!(
                "{},{}",
                write_expr(ctx, l, OR)?,
                write_expr(ctx, r, HIGH_AND)?
            ))
        }
        Expr::And(l, r) => {
            let high = fits(ctx, l, HIGH_AND) && fits(ctx, r, UNARY);
            if level == LOW_AND && !high {
                Ok(format!(
                    "{};{}",
                    write_expr(ctx, l, LOW_AND)?,
                    write_expr(ctx, r, OR)?
                ))
            } else if level <= HIGH_AND {
                let left = write_expr(ctx, l, HIGH_AND)?;
                let right = write_expr(ctx, r, UNARY)?;
                Ok(join_high(ctx, left, right))
            } else {
                regroup(ctx, expr)
            }
        }
    }
}

/// Whether `expr` can be written at `level` without regrouping.
fn fits(ctx: Ctx, expr: &Expr, level: u8) -> bool {
    if ctx == Ctx::Atom && stereo_token(expr).is_some() {
        return true;
    }
    match expr {
        Expr::Leaf { kind, value } => {
            leaf_text(ctx, *kind, *value).map_or(true, |(_, natural)| natural >= level)
        }
        Expr::Recursive(_) => true,
        Expr::Not(x) => fits(ctx, x, UNARY),
        Expr::Or(l, r) => level <= OR && fits(ctx, l, OR) && fits(ctx, r, HIGH_AND),
        Expr::And(l, r) => {
            (level <= HIGH_AND && fits(ctx, l, HIGH_AND) && fits(ctx, r, UNARY))
                || (level == LOW_AND && fits(ctx, l, LOW_AND) && fits(ctx, r, OR))
        }
    }
}

/// Wraps an atom expression as a single-atom recursive pattern so it can
/// sit anywhere. Bonds have no grouping syntax, so they are written as they
/// stand.
fn regroup(ctx: Ctx, expr: &Expr) -> Result<String, GenerateError> {
    let inner = write_expr(ctx, expr, LOW_AND)?;
    match ctx {
        Ctx::Atom => Ok(format!("$([{inner}])")),
        Ctx::Bond => {
            tracing::warn!(
                bond = %inner,
                "bond expression cannot be grouped, operator precedence may change on re-parse"
            );
            Ok(inner)
        }
    }
}

/// Joins two high-precedence operands, dropping the `&` when the right
/// side cannot run into the left.
fn join_high(ctx: Ctx, left: String, right: String) -> String {
    let juxtapose = match ctx {
        Ctx::Bond => true,
        Ctx::Atom => {
            let last = left.chars().last();
            right.chars().next().is_some_and(|c| match c {
                '@' | '+' | '-' => !matches!(last, Some('@' | '+' | '-')),
                c => c.is_ascii_uppercase() || matches!(c, '#' | '*' | '$' | '!' | '^'),
            })
        }
    };
    if juxtapose {
        left + &right
    } else {
        format!("{left}&{right}")
    }
}

fn leaf_text(ctx: Ctx, kind: ExprType, value: i32) -> Result<(String, u8), GenerateError> {
    match ctx {
        Ctx::Atom => atom_leaf(kind, value),
        Ctx::Bond => bond_leaf(kind, value),
    }
}

fn atom_leaf(kind: ExprType, value: i32) -> Result<(String, u8), GenerateError> {
    let unsupported = || GenerateError::UnsupportedAtomExpr { kind, value };
    let element = || {
        u8::try_from(value)
            .ok()
            .and_then(Element::from_atomic_num)
            .ok_or(GenerateError::InvalidAtomicNumber(value))
    };
    let counted = |prefix: char| -> Result<(String, u8), GenerateError> {
        if value < 0 {
            Err(unsupported())
        } else {
            Ok((format!("{prefix}{value}"), UNARY))
        }
    };
    let fixed = |text: &str| -> Result<(String, u8), GenerateError> { Ok((text.to_string(), UNARY)) };

    match kind {
        ExprType::True => fixed("*"),
        ExprType::False => fixed("!*"),
        ExprType::IsAromatic => fixed("a"),
        ExprType::IsAliphatic => fixed("A"),
        ExprType::IsInRing => fixed("R"),
        ExprType::IsInChain => fixed("R0"),
        ExprType::HasImplicitHydrogen => fixed("h"),
        ExprType::HasIsotope => fixed("!0"),
        ExprType::HasUnspecifiedIsotope => fixed("0"),
        ExprType::Element => {
            let e = element()?;
            Ok((format!("#{}", e.atomic_num()), UNARY))
        }
        ExprType::AliphaticElement => {
            let e = element()?;
            if e == Element::H {
                fixed("#1")
            } else {
                fixed(e.symbol())
            }
        }
        ExprType::AromaticElement => {
            let e = element()?;
            match e.aromatic_symbol() {
                Some(sym) => fixed(sym),
                None => Ok((format!("#{}&a", e.atomic_num()), HIGH_AND)),
            }
        }
        ExprType::Isotope => counted_number(value).ok_or_else(unsupported),
        ExprType::FormalCharge => {
            let text = match value {
                0 => "+0".to_string(),
                1 => "+".to_string(),
                -1 => "-".to_string(),
                v if v > 0 => format!("+{v}"),
                v => format!("-{}", v.unsigned_abs()),
            };
            Ok((text, UNARY))
        }
        ExprType::Degree => counted('D'),
        ExprType::HeavyDegree => counted('d'),
        ExprType::TotalDegree => counted('X'),
        ExprType::TotalHCount => counted('H'),
        ExprType::ImplicitHCount => counted('h'),
        ExprType::Valence => counted('v'),
        ExprType::RingCount => counted('R'),
        ExprType::RingSize | ExprType::RingSmallest => counted('r'),
        ExprType::RingBondCount => counted('x'),
        ExprType::HeteroSubstituentCount => counted('z'),
        ExprType::AliphaticHeteroSubstituentCount => counted('Z'),
        ExprType::HybridisationNumber => counted('^'),
        ExprType::PeriodicGroup => counted('G'),
        ExprType::Insaturation => counted('i'),
        ExprType::Stereochemistry => match value {
            stereo::ANTICLOCKWISE => fixed("@"),
            stereo::CLOCKWISE => fixed("@@"),
            _ => Err(unsupported()),
        },
        _ => Err(unsupported()),
    }
}

fn counted_number(value: i32) -> Option<(String, u8)> {
    (value >= 0).then(|| (value.to_string(), UNARY))
}

fn bond_leaf(kind: ExprType, value: i32) -> Result<(String, u8), GenerateError> {
    let fixed = |text: &str, level: u8| -> Result<(String, u8), GenerateError> { Ok((text.to_string(), level)) };
    match kind {
        ExprType::True => fixed("~", UNARY),
        ExprType::False => fixed("!~", UNARY),
        ExprType::AliphaticOrder => match value {
            1 => fixed("-", UNARY),
            2 => fixed("=", UNARY),
            3 => fixed("#", UNARY),
            4 => fixed("$", UNARY),
            _ => Err(GenerateError::UnsupportedBondExpr { kind, value }),
        },
        ExprType::IsAromatic => fixed(":", UNARY),
        ExprType::IsAliphatic => fixed("!:", UNARY),
        ExprType::IsInRing => fixed("@", UNARY),
        ExprType::IsInChain => fixed("!@", UNARY),
        ExprType::SingleOrAromatic => fixed("-,:", OR),
        ExprType::SingleOrDouble => fixed("-,=", OR),
        ExprType::DoubleOrAromatic => fixed("=,:", OR),
        ExprType::BondDirection => {
            let d = Direction::from_value(value);
            let up_n = Direction::UP | Direction::NEITHER;
            let down_n = Direction::DOWN | Direction::NEITHER;
            if d == Direction::UP {
                fixed("/", UNARY)
            } else if d == Direction::DOWN {
                fixed("\\", UNARY)
            } else if d == up_n {
                fixed("/?", UNARY)
            } else if d == down_n {
                fixed("\\?", UNARY)
            } else if d == Direction::NEITHER {
                fixed("!/&!\\", HIGH_AND)
            } else if d == Direction::UP | Direction::DOWN {
                fixed("/,\\", OR)
            } else if d.is_all() {
                fixed("~", UNARY)
            } else {
                fixed("!~", UNARY)
            }
        }
        _ => Err(GenerateError::UnsupportedBondExpr { kind, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smarts::from_smarts;

    fn leaf(kind: ExprType, value: i32) -> Expr {
        Expr::prim(kind, value)
    }

    fn round_trip(s: &str) -> String {
        to_smarts(&from_smarts(s).unwrap()).unwrap()
    }

    #[test]
    fn simple_chains_and_branches() {
        assert_eq!(round_trip("CCO"), "CCO");
        assert_eq!(round_trip("CC(C)O"), "CC(C)O");
        assert_eq!(round_trip("C(C(C)C)C"), "C(C(C)C)C");
        assert_eq!(round_trip("c1ccccc1"), "c1ccccc1");
    }

    #[test]
    fn bracket_atoms() {
        assert_eq!(round_trip("[#6]"), "[#6]");
        assert_eq!(round_trip("[C;R]"), "[CR]");
        assert_eq!(round_trip("[C,N;!R]"), "[C,N;!R]");
        assert_eq!(round_trip("[CH3:4]"), "[CH3:4]");
        assert_eq!(round_trip("[C:1]"), "[C:1]");
    }

    #[test]
    fn bond_expressions() {
        assert_eq!(round_trip("C=C"), "C=C");
        assert_eq!(round_trip("C~C"), "C~C");
        assert_eq!(round_trip("C-,:C"), "C-,:C");
        assert_eq!(round_trip("C!@C"), "C!@C");
        assert_eq!(round_trip("C=;@C"), "C=@C");
    }

    #[test]
    fn ring_numbers_are_reused() {
        assert_eq!(round_trip("C1CC1C1CC1"), "C1CC1C1CC1");
        assert_eq!(round_trip("C12CC1CC2"), "C12CC1CC2");
    }

    #[test]
    fn fragments_components_and_roles() {
        assert_eq!(round_trip("C.N"), "C.N");
        assert_eq!(round_trip("(C.C).N"), "N.(C.C)");
        assert_eq!(round_trip("C>>N"), "C>>N");
        assert_eq!(round_trip("C>O>N"), "C>O>N");
        assert_eq!(round_trip(">>N"), ">>N");
    }

    #[test]
    fn trans_double_bond_is_exact() {
        assert_eq!(round_trip("F/C=C/F"), "F/C=C/F");
        assert_eq!(round_trip("F/C=C\\F"), "F/C=C\\F");
    }

    #[test]
    fn tetrahedral_round_trip() {
        assert_eq!(round_trip("N[C@H](C)O"), "N[C@H1](C)O");
        assert_eq!(round_trip("N[C@@H](C)O"), "N[C@@H1](C)O");
        assert_eq!(round_trip("[C@@H](N)(C)O"), "[C@@H1](N)(C)O");
    }

    #[test]
    fn atom_precedence_regroups() {
        let e = leaf(ExprType::AliphaticElement, 6)
            .or(leaf(ExprType::AliphaticElement, 7))
            .negate();
        assert_eq!(generate_atom_expr(&e).unwrap(), "[!$([C,N])]");

        let e = leaf(ExprType::AliphaticElement, 6).and(
            leaf(ExprType::AliphaticElement, 7).or(leaf(ExprType::AliphaticElement, 8)),
        );
        assert_eq!(generate_atom_expr(&e).unwrap(), "[C;N,O]");
    }

    #[test]
    fn juxtaposition_only_when_safe() {
        let e = leaf(ExprType::Degree, 2).and(leaf(ExprType::RingBondCount, 2));
        assert_eq!(generate_atom_expr(&e).unwrap(), "[D2&x2]");
        let e = leaf(ExprType::Degree, 2).and(leaf(ExprType::TotalHCount, 1));
        assert_eq!(generate_atom_expr(&e).unwrap(), "[D2H1]");
        let e = leaf(ExprType::Isotope, 13).and(leaf(ExprType::AliphaticElement, 6));
        assert_eq!(generate_atom_expr(&e).unwrap(), "[13C]");
    }

    #[test]
    fn atom_leaf_forms() {
        let text = |kind, value| generate_atom_expr(&leaf(kind, value)).unwrap();
        assert_eq!(text(ExprType::AliphaticElement, 1), "[#1]");
        assert_eq!(text(ExprType::AliphaticElement, 17), "Cl");
        assert_eq!(text(ExprType::AliphaticElement, 26), "[Fe]");
        assert_eq!(text(ExprType::AromaticElement, 34), "[se]");
        assert_eq!(text(ExprType::AromaticElement, 9), "[#9&a]");
        assert_eq!(text(ExprType::FormalCharge, -2), "[-2]");
        assert_eq!(text(ExprType::FormalCharge, 0), "[+0]");
        assert_eq!(text(ExprType::HasUnspecifiedIsotope, 0), "[0]");
        assert_eq!(text(ExprType::IsInChain, 0), "[R0]");
        assert_eq!(text(ExprType::True, 0), "*");
    }

    #[test]
    fn unspecified_stereo_token() {
        let e = leaf(ExprType::Stereochemistry, 1).or(leaf(ExprType::Stereochemistry, 0));
        assert_eq!(generate_atom_expr(&e).unwrap(), "[@?]");
    }

    #[test]
    fn generation_errors() {
        assert_eq!(
            generate_atom_expr(&leaf(ExprType::Element, 200)),
            Err(GenerateError::InvalidAtomicNumber(200))
        );
        assert_eq!(
            generate_atom_expr(&leaf(ExprType::AliphaticOrder, 2)),
            Err(GenerateError::UnsupportedAtomExpr {
                kind: ExprType::AliphaticOrder,
                value: 2
            })
        );
        assert_eq!(
            generate_bond_expr(&leaf(ExprType::Degree, 1)),
            Err(GenerateError::UnsupportedBondExpr {
                kind: ExprType::Degree,
                value: 1
            })
        );
        assert!(generate_atom_expr(&leaf(ExprType::Stereochemistry, 0)).is_err());
    }

    #[test]
    fn bond_generation() {
        assert_eq!(generate_bond_expr(&default_bond()).unwrap(), "");
        assert_eq!(generate_bond_expr(&leaf(ExprType::AliphaticOrder, 3)).unwrap(), "#");
        let neither = leaf(ExprType::BondDirection, Direction::NEITHER.as_value());
        assert_eq!(generate_bond_expr(&neither).unwrap(), "!/&!\\");
    }

    #[test]
    fn too_many_rings() {
        let mut mol = QueryMol::new();
        let hub = mol.add_atom(crate::QueryAtom::default());
        let mut prev = hub;
        let mut spokes = Vec::new();
        for _ in 0..101 {
            let a = mol.add_atom(crate::QueryAtom::default());
            mol.add_bond(prev, a, crate::QueryBond::default());
            spokes.push(a);
            prev = a;
        }
        for &a in &spokes[1..] {
            mol.add_bond(hub, a, crate::QueryBond::default());
        }
        assert_eq!(to_smarts(&mol), Err(GenerateError::TooManyRings));
    }

    #[test]
    fn long_chain_is_written_without_recursion() {
        let chain = "C".repeat(10_000);
        assert_eq!(round_trip(&chain), chain);

        // The final branch has no following atom, so it is written inline.
        let branched = "C(C)".repeat(5_000);
        let expected = format!("{}CC", "C(C)".repeat(4_999));
        assert_eq!(round_trip(&branched), expected);
    }

    #[test]
    fn empty_graph_writes_nothing() {
        assert_eq!(to_smarts(&QueryMol::new()).unwrap(), "");
    }
}
