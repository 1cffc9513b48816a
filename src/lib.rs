pub mod atom;
pub mod bond;
pub mod element;
pub mod mol;
pub mod smarts;

pub use atom::{QueryAtom, ReactionRole};
pub use bond::QueryBond;
pub use element::Element;
pub use mol::{Mol, TetrahedralStereo};
pub use smarts::{
    from_smarts, from_smarts_with, to_smarts, Expr, ExprType, Flavor, GenerateError, QueryMol,
    SmartsError,
};

#[cfg(test)]
mod tests;
