// src/sema/signature.rs
//
// Method signatures and the two relations evaluated over them during
// elaboration: conflict (same-name collision that is not a legitimate
// overload) and conformance (exact match against an ancestor-required
// signature). Both are per-candidate-pair predicates; obligation
// consumption is destructive and order-sensitive, owned by the current
// class or adapter scope.

use crate::frontend::{ParamMode, Symbol, Visibility};
use crate::sema::catalog::{MethodId, TypeCatalog, TypeId};

/// A method signature as the type-construction backend can express it.
/// Passing modes and the original source name live in catalog
/// side-tables, not here (see catalog.rs).
#[derive(Debug, Clone)]
pub struct MethodSignature {
    pub owner: TypeId,
    pub name: Symbol,
    pub params: Vec<TypeId>,
    /// None is a void return
    pub return_type: Option<TypeId>,
    pub vis: Visibility,
    /// Marks an iterator factory; its structural return is a
    /// step-protocol type and its logical element type is recorded in
    /// the catalog's iter_return side-table
    pub is_iter: bool,
}

impl MethodSignature {
    pub fn public(
        owner: TypeId,
        name: Symbol,
        params: Vec<TypeId>,
        return_type: Option<TypeId>,
    ) -> Self {
        Self {
            owner,
            name,
            params,
            return_type,
            vis: Visibility::Public,
            is_iter: false,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn returns_void(&self) -> bool {
        match self.return_type {
            None => true,
            Some(t) => t.is_void(),
        }
    }
}

/// Conflict between a new signature and an existing declared one.
///
/// Same name, same arity, same return-voidness, and every parameter
/// position either identical or a pair of abstract types related by
/// subtyping in either direction. Any position failing both makes the
/// pair a legitimate overload, not a conflict.
pub fn conflicts(catalog: &mut TypeCatalog, new: &MethodSignature, existing: &MethodSignature) -> bool {
    if new.name != existing.name
        || new.arity() != existing.arity()
        || new.returns_void() != existing.returns_void()
    {
        return false;
    }
    for (&a, &b) in new.params.iter().zip(existing.params.iter()) {
        if a == b {
            continue;
        }
        let both_abstract =
            catalog.descriptor(a).is_abstract && catalog.descriptor(b).is_abstract;
        if both_abstract && (catalog.is_subtype(a, b) || catalog.is_subtype(b, a)) {
            continue;
        }
        return false;
    }
    true
}

/// Exact conformance of a declared method against an ancestor-required
/// one: name, arity, return type, and every parameter's type and mode
/// must be identical. Modes come from the catalog side-table so the
/// predicate works for both in-progress and foreign candidates.
pub fn conforms(catalog: &TypeCatalog, candidate: MethodId, obligation: MethodId) -> bool {
    let c = catalog.signature(candidate);
    let o = catalog.signature(obligation);
    if c.name != o.name
        || c.arity() != o.arity()
        || c.return_type != o.return_type
        || c.is_iter != o.is_iter
    {
        return false;
    }
    params_align(catalog, candidate, obligation, 0)
}

/// Conformance for iterator definitions: matches on the logical element
/// type rather than the structural step-type return, which necessarily
/// differs between a definition and the ancestor signature it satisfies.
pub fn iter_conforms(
    catalog: &TypeCatalog,
    name: Symbol,
    params: &[TypeId],
    modes: &[ParamMode],
    elem: Option<TypeId>,
    obligation: MethodId,
) -> bool {
    let o = catalog.signature(obligation);
    if !o.is_iter || o.name != name || o.arity() != params.len() {
        return false;
    }
    if catalog.iter_return(obligation) != elem {
        return false;
    }
    for (i, &p) in params.iter().enumerate() {
        if p != o.params[i] || modes[i] != catalog.arg_mode(obligation, i) {
            return false;
        }
    }
    true
}

/// Receiver-shifted conformance for foreign static-style methods: the
/// candidate passes the receiver as its first parameter, so its arity is
/// one above the obligation's and parameters align at offset one.
pub fn builtin_conforms(
    catalog: &TypeCatalog,
    candidate: MethodId,
    obligation: MethodId,
    receiver: TypeId,
) -> bool {
    let c = catalog.signature(candidate);
    let o = catalog.signature(obligation);
    if c.name != o.name
        || c.arity() != o.arity() + 1
        || c.return_type != o.return_type
        || c.is_iter != o.is_iter
        || c.params[0] != receiver
    {
        return false;
    }
    params_align(catalog, candidate, obligation, 1)
}

fn params_align(
    catalog: &TypeCatalog,
    candidate: MethodId,
    obligation: MethodId,
    offset: usize,
) -> bool {
    let c = catalog.signature(candidate);
    let o = catalog.signature(obligation);
    for i in 0..o.arity() {
        if c.params[i + offset] != o.params[i]
            || catalog.arg_mode(candidate, i + offset) != catalog.arg_mode(obligation, i)
        {
            return false;
        }
    }
    true
}

/// The ancestor-method obligations of one class or adapter scope.
/// Conformant matches consume entries destructively; a required method
/// is satisfied by at most one declared method, first match wins, in
/// source order.
#[derive(Debug, Default)]
pub struct ObligationSet {
    entries: Vec<MethodId>,
}

impl ObligationSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Seed from every method declared by an ancestor of `ty`
    pub fn seed(catalog: &mut TypeCatalog, ty: TypeId) -> Self {
        Self {
            entries: catalog.ancestor_methods_of(ty),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn remaining(&self) -> &[MethodId] {
        &self.entries
    }

    /// Consume the first obligation the candidate conforms to
    pub fn take_conforming(&mut self, catalog: &TypeCatalog, candidate: MethodId) -> Option<MethodId> {
        let idx = self
            .entries
            .iter()
            .position(|&obl| conforms(catalog, candidate, obl))?;
        Some(self.entries.remove(idx))
    }

    /// Consume every obligation an iterator definition conforms to; the
    /// matched list drives bridge-method synthesis
    pub fn take_iter_conforming(
        &mut self,
        catalog: &TypeCatalog,
        name: Symbol,
        params: &[TypeId],
        modes: &[ParamMode],
        elem: Option<TypeId>,
    ) -> Vec<MethodId> {
        let mut matched = Vec::new();
        self.entries.retain(|&obl| {
            if iter_conforms(catalog, name, params, modes, elem, obl) {
                matched.push(obl);
                false
            } else {
                true
            }
        });
        matched
    }

    /// Consume the first obligation the receiver-shifted candidate
    /// conforms to
    pub fn take_builtin_conforming(
        &mut self,
        catalog: &TypeCatalog,
        candidate: MethodId,
        receiver: TypeId,
    ) -> Option<MethodId> {
        let idx = self
            .entries
            .iter()
            .position(|&obl| builtin_conforms(catalog, candidate, obl, receiver))?;
        Some(self.entries.remove(idx))
    }
}
