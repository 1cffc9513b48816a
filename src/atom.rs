use crate::smarts::Expr;

/// Position of an atom in a reaction query (`reactants>agents>products`).
///
/// Ordered so that sorting atoms by role yields the textual layout of a
/// reaction SMARTS. `None` is used for plain (non-reaction) patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ReactionRole {
    #[default]
    None,
    Reactant,
    Agent,
    Product,
}

impl ReactionRole {
    /// Integer form stored in `ReactionRole` expression leaves.
    pub fn as_value(self) -> i32 {
        match self {
            ReactionRole::None => 0,
            ReactionRole::Reactant => 1,
            ReactionRole::Agent => 2,
            ReactionRole::Product => 3,
        }
    }

    pub fn from_value(value: i32) -> Option<ReactionRole> {
        match value {
            0 => Some(ReactionRole::None),
            1 => Some(ReactionRole::Reactant),
            2 => Some(ReactionRole::Agent),
            3 => Some(ReactionRole::Product),
            _ => None,
        }
    }

    /// The role that follows a `>` separator, if any.
    pub(crate) fn next(self) -> Option<ReactionRole> {
        match self {
            ReactionRole::None | ReactionRole::Reactant => Some(ReactionRole::Agent),
            ReactionRole::Agent => Some(ReactionRole::Product),
            ReactionRole::Product => None,
        }
    }
}

/// Atom payload of a query graph.
///
/// `expr` is the predicate a target atom must satisfy. The remaining fields
/// carry the layout information SMARTS can express outside the predicate:
///
/// - `map_idx`: atom-map number written as `[C:3]`, `0` when absent.
/// - `component`: component-group id for `(C.C)` grouping, `0` when the
///   atom is not inside a group.
/// - `role`: position in a reaction pattern.
///
/// # Examples
///
/// ```
/// use smartcrab::{QueryAtom, ReactionRole};
/// use smartcrab::smarts::{Expr, ExprType};
///
/// let atom = QueryAtom::new(Expr::prim(ExprType::AliphaticElement, 6));
/// assert_eq!(atom.map_idx, 0);
/// assert_eq!(atom.role, ReactionRole::None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAtom {
    pub expr: Expr,
    pub map_idx: u32,
    pub component: u32,
    pub role: ReactionRole,
}

impl QueryAtom {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            map_idx: 0,
            component: 0,
            role: ReactionRole::None,
        }
    }
}

impl Default for QueryAtom {
    fn default() -> Self {
        Self::new(Expr::default())
    }
}
