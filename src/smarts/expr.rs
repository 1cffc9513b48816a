use super::stereo::Direction;
use super::QueryMol;

/// Tag of an expression node.
///
/// Leaf tags carry an integer `value` whose meaning depends on the tag:
/// an atomic number for the element tags, a count for the counting
/// primitives, a [`Direction`] mask for `BondDirection`, a
/// [`Configuration`](super::Configuration) mask for bond
/// `Stereochemistry` and `0`/`1`/`2` (unspecified, `@`, `@@`) for atom
/// `Stereochemistry`. Tags without a natural value use `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprType {
    True,
    False,
    IsAromatic,
    IsAliphatic,
    IsInRing,
    IsInChain,
    HasImplicitHydrogen,
    HasIsotope,
    HasUnspecifiedIsotope,
    /// `#n`: element regardless of aromaticity.
    Element,
    /// Uppercase symbol: aliphatic element.
    AliphaticElement,
    /// Lowercase symbol: aromatic element.
    AromaticElement,
    Isotope,
    FormalCharge,
    /// `D`: explicit connections.
    Degree,
    /// `d`: connections to non-hydrogen atoms.
    HeavyDegree,
    /// `X`: connections including implicit hydrogens.
    TotalDegree,
    TotalHCount,
    ImplicitHCount,
    Valence,
    /// `R<n>`: number of rings the atom is in.
    RingCount,
    /// `r<n>` in legacy mode: atom is in some ring of size n.
    RingSize,
    /// `r<n>`: smallest ring containing the atom has size n.
    RingSmallest,
    RingBondCount,
    HeteroSubstituentCount,
    AliphaticHeteroSubstituentCount,
    HybridisationNumber,
    PeriodicGroup,
    Insaturation,
    Stereochemistry,
    ReactionRole,
    /// Bond order of a non-aromatic bond (`-`, `=`, `#`, `$`).
    AliphaticOrder,
    SingleOrAromatic,
    SingleOrDouble,
    DoubleOrAromatic,
    BondDirection,
    And,
    Or,
    Not,
    Recursive,
}

/// A predicate over an atom or a bond.
///
/// Trees are built bottom-up with [`Expr::prim`] and the combinators
/// [`Expr::and`], [`Expr::or`] and [`Expr::negate`]. No simplification is
/// performed: `!!C` stays a double negation, so a parsed tree can be
/// written back and re-parsed to an identical tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Leaf { kind: ExprType, value: i32 },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// `$(...)` with more than one atom.
    Recursive(Box<QueryMol>),
}

impl Default for Expr {
    fn default() -> Self {
        Expr::prim(ExprType::True, 0)
    }
}

impl Expr {
    pub fn prim(kind: ExprType, value: i32) -> Expr {
        Expr::Leaf { kind, value }
    }

    pub fn recursive(query: QueryMol) -> Expr {
        Expr::Recursive(Box::new(query))
    }

    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    pub fn kind(&self) -> ExprType {
        match self {
            Expr::Leaf { kind, .. } => *kind,
            Expr::And(..) => ExprType::And,
            Expr::Or(..) => ExprType::Or,
            Expr::Not(_) => ExprType::Not,
            Expr::Recursive(_) => ExprType::Recursive,
        }
    }

    /// Leaf value, `0` for operator and recursive nodes.
    pub fn value(&self) -> i32 {
        match self {
            Expr::Leaf { value, .. } => *value,
            _ => 0,
        }
    }

    /// Left operand of a binary node, or the operand of a `Not`.
    pub fn left(&self) -> Option<&Expr> {
        match self {
            Expr::And(l, _) | Expr::Or(l, _) | Expr::Not(l) => Some(l),
            _ => None,
        }
    }

    pub fn right(&self) -> Option<&Expr> {
        match self {
            Expr::And(_, r) | Expr::Or(_, r) => Some(r),
            _ => None,
        }
    }

    pub fn subquery(&self) -> Option<&QueryMol> {
        match self {
            Expr::Recursive(q) => Some(q),
            _ => None,
        }
    }

    pub fn is(&self, kind: ExprType, value: i32) -> bool {
        matches!(self, Expr::Leaf { kind: k, value: v } if *k == kind && *v == value)
    }

    /// `true` when the predicate admits more than one alternative: it
    /// contains an `Or`, one of the ambiguous bond-order aliases or a
    /// direction mask with more than one bit set.
    pub fn has_or(&self) -> bool {
        match self {
            Expr::Leaf { kind, value } => match kind {
                ExprType::SingleOrAromatic | ExprType::SingleOrDouble | ExprType::DoubleOrAromatic => {
                    true
                }
                ExprType::BondDirection => {
                    Direction::from_bits_truncate(*value as u8).bits().count_ones() > 1
                }
                _ => false,
            },
            Expr::Or(..) => true,
            Expr::And(l, r) => l.has_or() || r.has_or(),
            Expr::Not(x) => x.has_or(),
            Expr::Recursive(_) => false,
        }
    }

    /// Whether any leaf (outside recursive sub-queries) satisfies `f`.
    pub fn any_leaf(&self, f: &impl Fn(ExprType, i32) -> bool) -> bool {
        match self {
            Expr::Leaf { kind, value } => f(*kind, *value),
            Expr::And(l, r) | Expr::Or(l, r) => l.any_leaf(f) || r.any_leaf(f),
            Expr::Not(x) => x.any_leaf(f),
            Expr::Recursive(_) => false,
        }
    }

    pub fn contains(&self, kind: ExprType) -> bool {
        self.any_leaf(&|k, _| k == kind)
    }

    /// Like [`any_leaf`](Self::any_leaf) but ignores negated subtrees.
    pub(crate) fn any_positive_leaf(&self, f: &impl Fn(ExprType, i32) -> bool) -> bool {
        match self {
            Expr::Leaf { kind, value } => f(*kind, *value),
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.any_positive_leaf(f) || r.any_positive_leaf(f)
            }
            Expr::Not(_) | Expr::Recursive(_) => false,
        }
    }

    /// First leaf of `kind` reachable through `And` nodes only.
    pub(crate) fn conjunct(&self, kind: ExprType) -> Option<i32> {
        match self {
            Expr::Leaf { kind: k, value } if *k == kind => Some(*value),
            Expr::And(l, r) => l.conjunct(kind).or_else(|| r.conjunct(kind)),
            _ => None,
        }
    }

    /// Removes every leaf matching `f`.
    ///
    /// A removed operand of an `And` leaves the other operand. An `Or` or
    /// `Not` that loses an operand is removed as a whole. Returns `None`
    /// when nothing is left.
    pub(crate) fn remove_leaves(self, f: &impl Fn(ExprType, i32) -> bool) -> Option<Expr> {
        match self {
            Expr::Leaf { kind, value } => {
                if f(kind, value) {
                    None
                } else {
                    Some(Expr::Leaf { kind, value })
                }
            }
            Expr::And(l, r) => match (l.remove_leaves(f), r.remove_leaves(f)) {
                (Some(l), Some(r)) => Some(l.and(r)),
                (Some(x), None) | (None, Some(x)) => Some(x),
                (None, None) => None,
            },
            Expr::Or(l, r) => match (l.remove_leaves(f), r.remove_leaves(f)) {
                (Some(l), Some(r)) => Some(l.or(r)),
                _ => None,
            },
            Expr::Not(x) => x.remove_leaves(f).map(Expr::negate),
            Expr::Recursive(q) => Some(Expr::Recursive(q)),
        }
    }

    /// Rewrites leaf values of `kind` in place.
    pub(crate) fn map_values(&mut self, kind: ExprType, f: &impl Fn(i32) -> i32) {
        match self {
            Expr::Leaf { kind: k, value } => {
                if *k == kind {
                    *value = f(*value);
                }
            }
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.map_values(kind, f);
                r.map_values(kind, f);
            }
            Expr::Not(x) => x.map_values(kind, f),
            Expr::Recursive(_) => {}
        }
    }

    /// `lo..=hi` as an `Or` chain, `False` when empty.
    pub fn range(kind: ExprType, lo: i32, hi: i32) -> Expr {
        let mut values = lo..=hi;
        let Some(first) = values.next() else {
            return Expr::prim(ExprType::False, 0);
        };
        values.fold(Expr::prim(kind, first), |acc, v| acc.or(Expr::prim(kind, v)))
    }

    /// Values `>= lo` as an `And` chain of the negated values below it.
    pub fn at_least(kind: ExprType, lo: i32) -> Expr {
        let mut values = 0..lo;
        let Some(first) = values.next() else {
            return Expr::prim(ExprType::True, 0);
        };
        values.fold(Expr::prim(kind, first).negate(), |acc, v| {
            acc.and(Expr::prim(kind, v).negate())
        })
    }

    /// Values `< hi`, starting from zero.
    pub fn below(kind: ExprType, hi: i32) -> Expr {
        Expr::range(kind, 0, hi - 1)
    }
}
