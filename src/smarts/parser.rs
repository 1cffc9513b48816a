use std::collections::BTreeMap;

use petgraph::graph::NodeIndex;

use crate::atom::{QueryAtom, ReactionRole};
use crate::bond::QueryBond;
use crate::element::Element;
use crate::mol::TetrahedralStereo;

use super::error::{clear_last_error, set_last_error, SmartsError};
use super::expr::{Expr, ExprType};
use super::flavor::Flavor;
use super::lexer::Lexer;
use super::stereo::{self, Direction};
use super::QueryMol;

/// Deepest `$(...)` nesting accepted before the pattern is rejected.
pub const MAX_RECURSION_DEPTH: usize = 20;

/// Widest numeric range (`{lo-hi}`, `<n`, `>n`) that is expanded.
const MAX_RANGE_SPAN: i32 = 100;

const RING_SLOTS: usize = 100;

struct RingOpen {
    atom: NodeIndex,
    bond: Option<Expr>,
    /// Index of the placeholder in the opening atom's ligand list.
    slot: Option<usize>,
    pos: usize,
}

struct StereoCenter {
    preceded: bool,
    ligands: Vec<Option<NodeIndex>>,
}

/// What a counting primitive means when no number follows it.
enum Bare {
    Value(i32),
    Expr(Expr),
    Required,
}

#[derive(Clone, Copy)]
enum Ctx {
    Atom,
    Bond,
}

struct Parser<'a> {
    lex: Lexer<'a>,
    mol: QueryMol,
    flavor: Flavor,
    depth: usize,
    prev: Option<NodeIndex>,
    branches: Vec<(NodeIndex, usize)>,
    rings: [Option<RingOpen>; RING_SLOTS],
    bond: Option<(Expr, usize)>,
    centers: BTreeMap<NodeIndex, StereoCenter>,
    group: Option<(u32, usize)>,
    next_component: u32,
    role: ReactionRole,
    role_start: usize,
    bracket_start: usize,
}

fn is_bond_start(ch: char) -> bool {
    matches!(
        ch,
        '-' | '=' | '#' | '$' | ':' | '~' | '@' | '/' | '\\' | '!'
    )
}

fn default_bond() -> Expr {
    Expr::prim(ExprType::SingleOrAromatic, 0)
}

fn isotope(n: i32) -> Expr {
    if n == 0 {
        Expr::prim(ExprType::HasUnspecifiedIsotope, 0)
    } else {
        Expr::prim(ExprType::Isotope, n)
    }
}

impl<'a> Parser<'a> {
    fn new(lex: Lexer<'a>, flavor: Flavor, depth: usize) -> Self {
        Self {
            bracket_start: lex.pos(),
            lex,
            mol: QueryMol::new(),
            flavor,
            depth,
            prev: None,
            branches: Vec::new(),
            rings: std::array::from_fn(|_| None),
            bond: None,
            centers: BTreeMap::new(),
            group: None,
            next_component: 1,
            role: ReactionRole::None,
            role_start: 0,
        }
    }

    /// Reads the pattern up to the first whitespace or the end of input.
    fn parse(&mut self) -> Result<(), SmartsError> {
        while let Some(ch) = self.lex.peek() {
            if ch.is_whitespace() {
                break;
            }
            let pos = self.lex.pos();
            match ch {
                '[' => {
                    let (expr, map_idx) = self.bracket_atom()?;
                    self.add_atom(expr, map_idx);
                }
                '*' | 'A' | 'a' | 'B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I' | 'b' | 'c'
                | 'n' | 'o' | 'p' | 's' => {
                    let expr = self.bare_atom()?;
                    self.add_atom(expr, 0);
                }
                '0'..='9' | '%' => self.ring_bond()?,
                '(' => self.open_branch()?,
                ')' => self.close_branch()?,
                '.' => self.dot()?,
                '>' => self.role_separator()?,
                _ if is_bond_start(ch) => {
                    if self.prev.is_none() || self.bond.is_some() {
                        return Err(SmartsError::DanglingBond { pos });
                    }
                    let expr = self.expr_low(Ctx::Bond)?;
                    self.bond = Some((expr, pos));
                }
                _ => return Err(SmartsError::UnexpectedChar { pos, ch }),
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<QueryMol, SmartsError> {
        if let Some((_, pos)) = self.bond {
            return Err(SmartsError::DanglingBond { pos });
        }
        let open_ring = self
            .rings
            .iter()
            .enumerate()
            .filter_map(|(n, r)| r.as_ref().map(|r| (r.pos, n)))
            .min();
        if let Some((pos, ring)) = open_ring {
            return Err(SmartsError::UnclosedRing {
                pos,
                ring: ring as u8,
            });
        }
        if let Some(&(_, pos)) = self.branches.first() {
            return Err(SmartsError::UnclosedBranch { pos });
        }
        if let Some((_, pos)) = self.group {
            return Err(SmartsError::UnclosedComponent { pos });
        }

        match self.role {
            ReactionRole::None => {}
            ReactionRole::Product => {
                self.tag_role(ReactionRole::Product);
                let atoms: Vec<NodeIndex> = self.mol.atoms().collect();
                for idx in atoms {
                    let atom = self.mol.atom_mut(idx);
                    let expr = std::mem::take(&mut atom.expr);
                    atom.expr = expr.and(Expr::prim(ExprType::ReactionRole, atom.role.as_value()));
                }
            }
            ReactionRole::Reactant | ReactionRole::Agent => {
                return Err(SmartsError::syntax(
                    self.lex.pos(),
                    "reaction SMARTS needs two '>' separators",
                ));
            }
        }

        for (&center, info) in &self.centers {
            let written: Option<Vec<NodeIndex>> = info.ligands.iter().copied().collect();
            let stereo = written
                .and_then(|w| stereo::tetrahedral_ligands(center, info.preceded, &w));
            if let Some(stereo) = stereo {
                self.mol.add_tetrahedral_stereo(stereo);
            }
        }

        let bonds: Vec<_> = self.mol.bonds().collect();
        stereo::resolve_double_bonds(&mut self.mol, &bonds);

        Ok(self.mol)
    }

    fn add_atom(&mut self, expr: Expr, map_idx: u32) {
        let is_center = stereo::is_atom_stereo(&expr);
        let mut atom = QueryAtom::new(expr);
        atom.map_idx = map_idx;
        if let Some((id, _)) = self.group {
            atom.component = id;
        }
        let idx = self.mol.add_atom(atom);
        if is_center {
            self.centers.insert(
                idx,
                StereoCenter {
                    preceded: self.prev.is_some(),
                    ligands: Vec::new(),
                },
            );
        }
        if let Some(prev) = self.prev {
            let expr = self.bond.take().map_or_else(default_bond, |(e, _)| e);
            self.mol.add_bond(prev, idx, QueryBond::new(expr));
            self.push_ligand(prev, idx);
            self.push_ligand(idx, prev);
        }
        self.prev = Some(idx);
    }

    fn push_ligand(&mut self, center: NodeIndex, ligand: NodeIndex) {
        if let Some(info) = self.centers.get_mut(&center) {
            info.ligands.push(Some(ligand));
        }
    }

    fn bare_atom(&mut self) -> Result<Expr, SmartsError> {
        let pos = self.lex.pos();
        let Some(ch) = self.lex.next() else {
            return Err(SmartsError::UnexpectedEnd { pos });
        };
        let aliphatic = |e: Element| Expr::prim(ExprType::AliphaticElement, e.atomic_num() as i32);
        let aromatic = |e: Element| Expr::prim(ExprType::AromaticElement, e.atomic_num() as i32);
        let expr = match ch {
            '*' => Expr::prim(ExprType::True, 0),
            'A' => Expr::prim(ExprType::IsAliphatic, 0),
            'a' => Expr::prim(ExprType::IsAromatic, 0),
            'C' if self.lex.eat('l') => aliphatic(Element::CL),
            'B' if self.lex.eat('r') => aliphatic(Element::BR),
            'B' => aliphatic(Element::B),
            'C' => aliphatic(Element::C),
            'N' => aliphatic(Element::N),
            'O' => aliphatic(Element::O),
            'P' => aliphatic(Element::P),
            'S' => aliphatic(Element::S),
            'F' => aliphatic(Element::F),
            'I' => aliphatic(Element::I),
            _ => match Element::from_aromatic_symbol(ch.encode_utf8(&mut [0; 4])) {
                Some(e) if e.is_aromatic_organic_subset() => aromatic(e),
                _ => return Err(SmartsError::UnexpectedChar { pos, ch }),
            },
        };
        Ok(expr)
    }

    fn bracket_atom(&mut self) -> Result<(Expr, u32), SmartsError> {
        self.bracket_start = self.lex.pos();
        self.lex.next();

        let expr = match self.explicit_hydrogen() {
            Some(expr) => expr,
            None => self.expr_low(Ctx::Atom)?,
        };

        let mut map_idx = 0;
        if self.lex.eat(':') {
            let pos = self.lex.pos();
            let n = self
                .lex
                .number()
                .ok_or_else(|| SmartsError::syntax(pos, "expected atom map number"))?;
            map_idx = n as u32;
        }

        let pos = self.lex.pos();
        match self.lex.next() {
            Some(']') => Ok((expr, map_idx)),
            Some(ch) => Err(SmartsError::UnexpectedChar { pos, ch }),
            None => Err(SmartsError::UnclosedBracket {
                pos: self.bracket_start,
            }),
        }
    }

    /// `[H]`, `[2H]`, `[H+]` and friends: a hydrogen atom rather than an
    /// H-count primitive.
    fn explicit_hydrogen(&mut self) -> Option<Expr> {
        let start = self.lex.pos();
        let mass = self.lex.number();
        if !self.lex.eat('H') {
            self.lex.seek(start);
            return None;
        }
        let charge = match self.lex.peek() {
            Some('+') | Some('-') => Some(self.charge()),
            _ => None,
        };
        if !matches!(self.lex.peek(), Some(']') | Some(':')) {
            self.lex.seek(start);
            return None;
        }
        let hydrogen = Expr::prim(ExprType::Element, 1);
        let expr = match mass {
            Some(n) => isotope(n).and(hydrogen),
            None => hydrogen,
        };
        Some(match charge {
            Some(c) => expr.and(c),
            None => expr,
        })
    }

    fn expr_low(&mut self, ctx: Ctx) -> Result<Expr, SmartsError> {
        let mut expr = self.expr_or(ctx)?;
        while self.lex.eat(';') {
            let rhs = self.expr_or(ctx)?;
            expr = expr.and(rhs);
        }
        Ok(expr)
    }

    fn expr_or(&mut self, ctx: Ctx) -> Result<Expr, SmartsError> {
        let mut expr = self.expr_high(ctx)?;
        while self.lex.eat(',') {
            let rhs = self.expr_high(ctx)?;
            expr = expr.or(rhs);
        }
        Ok(expr)
    }

    fn expr_high(&mut self, ctx: Ctx) -> Result<Expr, SmartsError> {
        let mut expr = self.expr_unary(ctx)?;
        loop {
            let implicit = match (ctx, self.lex.peek()) {
                (_, None) => false,
                (_, Some('&')) => {
                    self.lex.next();
                    true
                }
                (Ctx::Atom, Some(c)) => !matches!(c, ']' | ';' | ',' | ':'),
                (Ctx::Bond, Some(c)) => is_bond_start(c),
            };
            if !implicit {
                break;
            }
            let rhs = self.expr_unary(ctx)?;
            expr = expr.and(rhs);
        }
        Ok(expr)
    }

    fn expr_unary(&mut self, ctx: Ctx) -> Result<Expr, SmartsError> {
        if self.lex.eat('!') {
            return Ok(self.expr_unary(ctx)?.negate());
        }
        match ctx {
            Ctx::Atom => self.atom_primitive(),
            Ctx::Bond => self.bond_primitive(),
        }
    }

    fn bond_primitive(&mut self) -> Result<Expr, SmartsError> {
        let pos = self.lex.pos();
        let Some(ch) = self.lex.next() else {
            return Err(SmartsError::UnexpectedEnd { pos });
        };
        let expr = match ch {
            '-' => Expr::prim(ExprType::AliphaticOrder, 1),
            '=' => Expr::prim(ExprType::AliphaticOrder, 2),
            '#' => Expr::prim(ExprType::AliphaticOrder, 3),
            '$' => Expr::prim(ExprType::AliphaticOrder, 4),
            ':' => Expr::prim(ExprType::IsAromatic, 0),
            '~' => Expr::prim(ExprType::True, 0),
            '@' => Expr::prim(ExprType::IsInRing, 0),
            '/' | '\\' => {
                let mut dir = if ch == '/' {
                    Direction::UP
                } else {
                    Direction::DOWN
                };
                if self.lex.eat('?') {
                    dir |= Direction::NEITHER;
                }
                Expr::prim(ExprType::BondDirection, dir.as_value())
            }
            _ => return Err(SmartsError::UnexpectedChar { pos, ch }),
        };
        Ok(expr)
    }

    fn atom_primitive(&mut self) -> Result<Expr, SmartsError> {
        let pos = self.lex.pos();
        let Some(ch) = self.lex.next() else {
            return Err(SmartsError::UnclosedBracket {
                pos: self.bracket_start,
            });
        };
        let flavor = self.flavor;
        let expr = match ch {
            '*' => Expr::prim(ExprType::True, 0),
            '#' => {
                let n = self.lex.number().unwrap_or(0);
                if !(1..=118).contains(&n) {
                    return Err(SmartsError::InvalidAtomicNumber { pos });
                }
                Expr::prim(ExprType::Element, n)
            }
            '0'..='9' => {
                self.lex.unget();
                isotope(self.lex.number().unwrap_or(0))
            }
            '+' | '-' => {
                self.lex.unget();
                self.charge()
            }
            '@' => self.chirality(pos)?,
            '$' => self.recursive(pos)?,
            'a' if self.lex.eat('s') => Expr::prim(ExprType::AromaticElement, Element::AS.atomic_num() as i32),
            'a' => Expr::prim(ExprType::IsAromatic, 0),
            'A' => match self.two_char_element(ch) {
                Some(e) => e,
                None => Expr::prim(ExprType::IsAliphatic, 0),
            },
            'D' => match self.two_char_element(ch) {
                Some(e) => e,
                None if flavor.heavy_degree() => self.counted(ExprType::HeavyDegree, Bare::Value(1))?,
                None => self.counted(ExprType::Degree, Bare::Value(1))?,
            },
            'd' => {
                self.gate(flavor.allows_heavy_degree_prim(), pos, ch)?;
                self.counted(ExprType::HeavyDegree, Bare::Value(1))?
            }
            'X' => match self.two_char_element(ch) {
                Some(e) => e,
                None => self.counted(ExprType::TotalDegree, Bare::Value(1))?,
            },
            'H' => match self.two_char_element(ch) {
                Some(e) => e,
                None => self.counted(ExprType::TotalHCount, Bare::Value(1))?,
            },
            'h' => self.counted(
                ExprType::ImplicitHCount,
                Bare::Expr(Expr::prim(ExprType::HasImplicitHydrogen, 0)),
            )?,
            'v' => self.counted(ExprType::Valence, Bare::Value(1))?,
            'R' => match self.two_char_element(ch) {
                Some(e) => e,
                None => self.ring_primitive(ExprType::RingCount)?,
            },
            'r' if flavor.any_ring_size() => self.ring_primitive(ExprType::RingSize)?,
            'r' => self.ring_primitive(ExprType::RingSmallest)?,
            'x' => self.ring_primitive(ExprType::RingBondCount)?,
            'z' => {
                self.gate(flavor.allows_cactvs_prims(), pos, ch)?;
                self.counted(
                    ExprType::HeteroSubstituentCount,
                    Bare::Expr(Expr::prim(ExprType::HeteroSubstituentCount, 0).negate()),
                )?
            }
            'Z' => match self.two_char_element(ch) {
                Some(e) => e,
                None => {
                    self.gate(flavor.allows_cactvs_prims(), pos, ch)?;
                    self.counted(
                        ExprType::AliphaticHeteroSubstituentCount,
                        Bare::Expr(Expr::prim(ExprType::AliphaticHeteroSubstituentCount, 0).negate()),
                    )?
                }
            },
            'G' => match self.two_char_element(ch) {
                Some(e) => e,
                None => {
                    self.gate(flavor.allows_cactvs_prims(), pos, ch)?;
                    self.counted(ExprType::PeriodicGroup, Bare::Required)?
                }
            },
            'i' => {
                self.gate(flavor.allows_cactvs_prims(), pos, ch)?;
                self.counted(ExprType::Insaturation, Bare::Value(1))?
            }
            '^' => {
                self.gate(flavor.allows_hybridisation(), pos, ch)?;
                self.counted(ExprType::HybridisationNumber, Bare::Required)?
            }
            c if c.is_ascii_uppercase() => match self.two_char_element(c) {
                Some(e) => e,
                None => match Element::from_symbol(c.encode_utf8(&mut [0; 4])) {
                    Some(e) => Expr::prim(ExprType::AliphaticElement, e.atomic_num() as i32),
                    None => return Err(SmartsError::UnexpectedChar { pos, ch }),
                },
            },
            c if c.is_ascii_lowercase() => self.aromatic_symbol(c, pos)?,
            _ => return Err(SmartsError::UnexpectedChar { pos, ch }),
        };
        Ok(expr)
    }

    fn gate(&self, allowed: bool, pos: usize, ch: char) -> Result<(), SmartsError> {
        if allowed {
            Ok(())
        } else {
            Err(SmartsError::UnsupportedPrimitive { pos, ch })
        }
    }

    /// Consumes a lowercase second letter when it completes an element
    /// symbol with `first`.
    fn two_char_element(&mut self, first: char) -> Option<Expr> {
        let second = self.lex.peek().filter(char::is_ascii_lowercase)?;
        let symbol: String = [first, second].iter().collect();
        let element = Element::from_symbol(&symbol)?;
        self.lex.next();
        Some(Expr::prim(
            ExprType::AliphaticElement,
            element.atomic_num() as i32,
        ))
    }

    fn aromatic_symbol(&mut self, first: char, pos: usize) -> Result<Expr, SmartsError> {
        if let Some(second) = self.lex.peek() {
            let symbol: String = [first, second].iter().collect();
            if let Some(e) = Element::from_aromatic_symbol(&symbol) {
                self.lex.next();
                return Ok(Expr::prim(ExprType::AromaticElement, e.atomic_num() as i32));
            }
        }
        match Element::from_aromatic_symbol(first.encode_utf8(&mut [0; 4])) {
            Some(e) => Ok(Expr::prim(ExprType::AromaticElement, e.atomic_num() as i32)),
            None => Err(SmartsError::UnexpectedChar { pos, ch: first }),
        }
    }

    fn counted(&mut self, kind: ExprType, bare: Bare) -> Result<Expr, SmartsError> {
        let pos = self.lex.pos();
        match self.lex.peek() {
            Some('{') => return self.range(kind),
            Some('<') | Some('>') => return self.comparison(kind),
            _ => {}
        }
        if let Some(n) = self.lex.number() {
            return Ok(Expr::prim(kind, n));
        }
        match bare {
            Bare::Value(v) => Ok(Expr::prim(kind, v)),
            Bare::Expr(e) => Ok(e),
            Bare::Required => Err(match self.lex.peek() {
                Some(ch) => SmartsError::UnexpectedChar { pos, ch },
                None => SmartsError::UnexpectedEnd { pos },
            }),
        }
    }

    /// `R`, `r` and `x`: alone they mean "in a ring", with `0` "not in a ring".
    fn ring_primitive(&mut self, kind: ExprType) -> Result<Expr, SmartsError> {
        let expr = self.counted(kind, Bare::Expr(Expr::prim(ExprType::IsInRing, 0)))?;
        if expr.is(kind, 0) {
            Ok(Expr::prim(ExprType::IsInChain, 0))
        } else {
            Ok(expr)
        }
    }

    fn range(&mut self, kind: ExprType) -> Result<Expr, SmartsError> {
        let pos = self.lex.pos();
        self.lex.next();
        self.gate(self.flavor.allows_ranges(), pos, '{')?;

        let lo = self.lex.number();
        if lo.is_some() && self.lex.eat('}') {
            return Ok(Expr::prim(kind, lo.unwrap_or(0)));
        }
        if !self.lex.eat('-') {
            return Err(SmartsError::syntax(self.lex.pos(), "expected '-' in range"));
        }
        let hi = self.lex.number();
        if !self.lex.eat('}') {
            return Err(SmartsError::syntax(self.lex.pos(), "expected '}' after range"));
        }

        let too_wide = || SmartsError::syntax(pos, "range is too wide");
        match (lo, hi) {
            (Some(lo), Some(hi)) => {
                if lo > hi {
                    return Err(SmartsError::syntax(pos, "range bounds are reversed"));
                }
                if hi - lo > MAX_RANGE_SPAN {
                    return Err(too_wide());
                }
                Ok(Expr::range(kind, lo, hi))
            }
            (None, Some(hi)) if hi <= MAX_RANGE_SPAN => Ok(Expr::range(kind, 0, hi)),
            (Some(lo), None) if lo <= MAX_RANGE_SPAN => Ok(Expr::at_least(kind, lo)),
            (None, None) => Err(SmartsError::syntax(pos, "empty range")),
            _ => Err(too_wide()),
        }
    }

    fn comparison(&mut self, kind: ExprType) -> Result<Expr, SmartsError> {
        let pos = self.lex.pos();
        let op = self.lex.next().unwrap_or('<');
        self.gate(self.flavor.allows_comparisons(), pos, op)?;
        let n = self
            .lex
            .number()
            .ok_or_else(|| SmartsError::syntax(self.lex.pos(), "expected a number"))?;
        if n >= MAX_RANGE_SPAN {
            return Err(SmartsError::syntax(pos, "range is too wide"));
        }
        Ok(if op == '<' {
            Expr::below(kind, n)
        } else {
            Expr::at_least(kind, n + 1)
        })
    }

    /// `+`, `++`, `+2`, and the same for `-`.
    fn charge(&mut self) -> Expr {
        let sign_ch = self.lex.next().unwrap_or('+');
        let sign = if sign_ch == '-' { -1 } else { 1 };
        let magnitude = match self.lex.number() {
            Some(n) => n,
            None => {
                let mut n = 1;
                while self.lex.eat(sign_ch) {
                    n += 1;
                }
                n
            }
        };
        Expr::prim(ExprType::FormalCharge, sign * magnitude)
    }

    fn chirality(&mut self, pos: usize) -> Result<Expr, SmartsError> {
        let value = if self.lex.peek() == Some('T') && self.lex.peek_at(1) == Some('H') {
            self.lex.skip(2);
            match self.lex.next() {
                Some('1') => stereo::ANTICLOCKWISE,
                Some('2') => stereo::CLOCKWISE,
                _ => return Err(SmartsError::syntax(pos, "expected @TH1 or @TH2")),
            }
        } else if self.lex.eat('@') {
            stereo::CLOCKWISE
        } else {
            stereo::ANTICLOCKWISE
        };
        let expr = Expr::prim(ExprType::Stereochemistry, value);
        if self.lex.eat('?') {
            Ok(expr.or(Expr::prim(
                ExprType::Stereochemistry,
                stereo::UNSPECIFIED_CENTER,
            )))
        } else {
            Ok(expr)
        }
    }

    fn recursive(&mut self, pos: usize) -> Result<Expr, SmartsError> {
        if !self.lex.eat('(') {
            return Err(match self.lex.peek() {
                Some(ch) => SmartsError::UnexpectedChar {
                    pos: self.lex.pos(),
                    ch,
                },
                None => SmartsError::UnexpectedEnd {
                    pos: self.lex.pos(),
                },
            });
        }
        let Some(close) = self.lex.find_closing_paren() else {
            return Err(SmartsError::syntax(pos, "unclosed recursive SMARTS"));
        };
        if self.depth + 1 > MAX_RECURSION_DEPTH {
            return Err(SmartsError::RecursionTooDeep { pos });
        }
        let start = self.lex.pos();
        if start == close {
            return Err(SmartsError::syntax(pos, "empty recursive SMARTS"));
        }

        let mut sub = Parser::new(
            Lexer::new(self.lex.chars(), start, close),
            self.flavor,
            self.depth + 1,
        );
        sub.parse()?;
        if let Some(ch) = sub.lex.peek() {
            return Err(SmartsError::UnexpectedChar {
                pos: sub.lex.pos(),
                ch,
            });
        }
        let mut query = sub.finish()?;
        self.lex.seek(close + 1);

        match query.atom_count() {
            0 => Err(SmartsError::syntax(pos, "empty recursive SMARTS")),
            1 => {
                tracing::debug!(pos, "collapsed single-atom recursive SMARTS");
                let atom = query.atom_mut(NodeIndex::new(0));
                Ok(std::mem::take(&mut atom.expr))
            }
            _ => Ok(Expr::recursive(query)),
        }
    }

    fn ring_bond(&mut self) -> Result<(), SmartsError> {
        let pos = self.lex.pos();
        let ring = if self.lex.eat('%') {
            let digits = (self.lex.next(), self.lex.next());
            match digits {
                (Some(a), Some(b)) if a.is_ascii_digit() && b.is_ascii_digit() => {
                    (a as usize - '0' as usize) * 10 + (b as usize - '0' as usize)
                }
                _ => return Err(SmartsError::syntax(pos, "expected two digits after '%'")),
            }
        } else {
            let ch = self.lex.next().unwrap_or('0');
            ch as usize - '0' as usize
        };

        let Some(atom) = self.prev else {
            return Err(SmartsError::syntax(pos, "ring bond without a preceding atom"));
        };

        match self.rings[ring].take() {
            None => {
                let slot = self.centers.get_mut(&atom).map(|info| {
                    info.ligands.push(None);
                    info.ligands.len() - 1
                });
                self.rings[ring] = Some(RingOpen {
                    atom,
                    bond: self.bond.take().map(|(e, _)| e),
                    slot,
                    pos,
                });
            }
            Some(open) => {
                if open.atom == atom {
                    return Err(SmartsError::InvalidRingBond {
                        pos,
                        msg: "ring bond to the same atom",
                    });
                }
                if self.mol.bond_between(open.atom, atom).is_some() {
                    return Err(SmartsError::InvalidRingBond {
                        pos,
                        msg: "atoms are already bonded",
                    });
                }
                let closing = self.bond.take().map(|(e, _)| stereo::flip_directions(e));
                let expr = match (open.bond, closing) {
                    (None, None) => default_bond(),
                    (Some(e), None) | (None, Some(e)) => e,
                    (Some(a), Some(b)) if a == b => a,
                    _ => return Err(SmartsError::RingBondMismatch { pos }),
                };
                self.mol.add_bond(open.atom, atom, QueryBond::new(expr));
                if let Some(slot) = open.slot {
                    if let Some(info) = self.centers.get_mut(&open.atom) {
                        info.ligands[slot] = Some(atom);
                    }
                }
                self.push_ligand(atom, open.atom);
            }
        }
        Ok(())
    }

    fn open_branch(&mut self) -> Result<(), SmartsError> {
        let pos = self.lex.pos();
        self.lex.next();
        if let Some((_, bond_pos)) = self.bond {
            return Err(SmartsError::DanglingBond { pos: bond_pos });
        }
        match self.prev {
            Some(atom) => self.branches.push((atom, pos)),
            None if self.branches.is_empty() && self.group.is_none() => {
                self.group = Some((self.next_component, pos));
                self.next_component += 1;
            }
            None => return Err(SmartsError::syntax(pos, "branch without a preceding atom")),
        }
        Ok(())
    }

    fn close_branch(&mut self) -> Result<(), SmartsError> {
        let pos = self.lex.pos();
        self.lex.next();
        if let Some((_, bond_pos)) = self.bond {
            return Err(SmartsError::DanglingBond { pos: bond_pos });
        }
        if let Some((atom, _)) = self.branches.pop() {
            self.prev = Some(atom);
        } else if self.group.take().is_some() {
            self.prev = None;
        } else {
            return Err(SmartsError::UnopenedBranch { pos });
        }
        Ok(())
    }

    fn dot(&mut self) -> Result<(), SmartsError> {
        let pos = self.lex.pos();
        self.lex.next();
        if let Some((_, bond_pos)) = self.bond {
            return Err(SmartsError::DanglingBond { pos: bond_pos });
        }
        if !self.branches.is_empty() {
            return Err(SmartsError::syntax(pos, "'.' inside a branch"));
        }
        self.prev = None;
        Ok(())
    }

    fn role_separator(&mut self) -> Result<(), SmartsError> {
        let pos = self.lex.pos();
        self.lex.next();
        if let Some((_, bond_pos)) = self.bond {
            return Err(SmartsError::DanglingBond { pos: bond_pos });
        }
        if let Some(&(_, branch_pos)) = self.branches.first() {
            return Err(SmartsError::UnclosedBranch { pos: branch_pos });
        }
        if let Some((_, group_pos)) = self.group {
            return Err(SmartsError::UnclosedComponent { pos: group_pos });
        }
        let Some(next) = self.role.next() else {
            return Err(SmartsError::syntax(pos, "too many '>' in reaction SMARTS"));
        };
        let current = match self.role {
            ReactionRole::None => ReactionRole::Reactant,
            role => role,
        };
        self.tag_role(current);
        self.role = next;
        self.prev = None;
        Ok(())
    }

    /// Assigns `role` to every atom added since the last separator.
    fn tag_role(&mut self, role: ReactionRole) {
        for i in self.role_start..self.mol.atom_count() {
            self.mol.atom_mut(NodeIndex::new(i)).role = role;
        }
        self.role_start = self.mol.atom_count();
    }
}

/// Parses `input` and appends the resulting atoms and bonds to `mol`.
///
/// On failure `mol` is left untouched and the error is also stored in the
/// per-thread slot read by [`last_error_message`](super::last_error_message).
pub fn parse_into(mol: &mut QueryMol, input: &str, flavor: Flavor) -> Result<(), SmartsError> {
    clear_last_error();
    match parse_str(input, flavor) {
        Ok(query) => {
            append(mol, query);
            Ok(())
        }
        Err(err) => {
            tracing::debug!(%err, input, "failed to parse SMARTS");
            set_last_error(&err, input);
            Err(err)
        }
    }
}

fn parse_str(input: &str, flavor: Flavor) -> Result<QueryMol, SmartsError> {
    let chars: Vec<char> = input.chars().collect();
    let start = chars
        .iter()
        .position(|c| !c.is_whitespace())
        .ok_or(SmartsError::EmptyInput)?;
    let mut parser = Parser::new(Lexer::new(&chars, start, chars.len()), flavor, 0);
    parser.parse()?;
    parser.finish()
}

fn append(target: &mut QueryMol, part: QueryMol) {
    if target.atom_count() == 0 && target.tetrahedral_stereo().is_empty() {
        *target = part;
        return;
    }
    let offset = target
        .atoms()
        .map(|a| target.atom(a).component)
        .max()
        .unwrap_or(0);
    let mut map = Vec::with_capacity(part.atom_count());
    for idx in part.atoms() {
        let mut atom = part.atom(idx).clone();
        if atom.component != 0 {
            atom.component += offset;
        }
        map.push(target.add_atom(atom));
    }
    for edge in part.bonds() {
        if let Some((a, b)) = part.bond_endpoints(edge) {
            target.add_bond(map[a.index()], map[b.index()], part.bond(edge).clone());
        }
    }
    for s in part.tetrahedral_stereo() {
        target.add_tetrahedral_stereo(TetrahedralStereo {
            center: map[s.center.index()],
            ligands: s.ligands.map(|l| map[l.index()]),
        });
    }
}
