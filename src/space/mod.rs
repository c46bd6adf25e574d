//! Global DOF numbering: vocabulary types, the index space, and its
//! finalized numbering.

pub mod field;
pub mod index_space;
pub mod numbering;

pub use field::{DofSlot, EntityBlock, EntityKey, FieldId, GlobalIndex, IdType};
pub use index_space::IndexSpace;
pub use numbering::Numbering;
