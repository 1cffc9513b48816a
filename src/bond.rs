use crate::smarts::{Expr, ExprType};

/// Bond payload of a query graph.
///
/// The bond's orientation is the order of its petgraph endpoints: the first
/// endpoint is the begin atom. Directional markers (`/`, `\`) in `expr` are
/// read from begin to end.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBond {
    pub expr: Expr,
}

impl QueryBond {
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }
}

impl Default for QueryBond {
    /// The implicit bond between two adjacent atoms: single or aromatic.
    fn default() -> Self {
        Self {
            expr: Expr::prim(ExprType::SingleOrAromatic, 0),
        }
    }
}
