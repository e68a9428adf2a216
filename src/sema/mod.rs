// src/sema/mod.rs
pub mod adapter;
pub mod catalog;
pub mod elaborate;
pub mod foreign;
pub mod iterator;
pub mod signature;

pub use adapter::{AdapterOut, DelegatedMethod};
pub use catalog::{
    AdapterLink, Backing, FieldKind, FieldSlot, MethodId, TypeCatalog, TypeDescriptor, TypeId,
    TypeIdVec,
};
pub use elaborate::{ElaboratedMember, ElaborationOutput, elaborate};
pub use foreign::{ForeignMethodDef, ForeignParam, ForeignTypeId, ForeignWorld};
pub use iterator::IterLowering;
pub use signature::{MethodSignature, ObligationSet, builtin_conforms, conflicts, conforms};
