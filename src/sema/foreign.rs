// src/sema/foreign.rs
//
// Registry of foreign/builtin types: the introspection provider the
// catalog consults for anything not declared in Cedar source. Populated
// by the embedder (runtime bindings, builtin library) before elaboration.

use rustc_hash::FxHashMap;

use crate::frontend::{ParamMode, Symbol};

/// Handle to a foreign type in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForeignTypeId(pub u32);

#[derive(Debug, Clone, Copy)]
pub struct ForeignParam {
    pub mode: ParamMode,
    pub ty: ForeignTypeId,
}

/// A method as the foreign backend reports it: name, parameters with
/// passing modes, return type, and an optional original name when the
/// binding renamed it.
#[derive(Debug, Clone)]
pub struct ForeignMethodDef {
    pub name: Symbol,
    pub params: Vec<ForeignParam>,
    pub return_type: Option<ForeignTypeId>,
    pub source_name: Option<Symbol>,
}

#[derive(Debug)]
pub struct ForeignTypeDef {
    pub name: Symbol,
    pub is_abstract: bool,
    interfaces: Vec<ForeignTypeId>,
    methods: Vec<ForeignMethodDef>,
    /// Companion type holding static-style methods (receiver as first
    /// parameter) for this type, if one is registered
    method_container: Option<ForeignTypeId>,
}

impl ForeignTypeDef {
    pub fn interfaces(&self) -> &[ForeignTypeId] {
        &self.interfaces
    }

    pub fn methods(&self) -> &[ForeignMethodDef] {
        &self.methods
    }

    pub fn method_container(&self) -> Option<ForeignTypeId> {
        self.method_container
    }
}

/// All foreign/builtin types known to this compilation
#[derive(Debug, Default)]
pub struct ForeignWorld {
    types: Vec<ForeignTypeDef>,
    by_name: FxHashMap<Symbol, ForeignTypeId>,
}

impl ForeignWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&mut self, name: Symbol, is_abstract: bool) -> ForeignTypeId {
        let id = ForeignTypeId(self.types.len() as u32);
        self.types.push(ForeignTypeDef {
            name,
            is_abstract,
            interfaces: Vec::new(),
            methods: Vec::new(),
            method_container: None,
        });
        self.by_name.insert(name, id);
        id
    }

    pub fn add_interface(&mut self, ty: ForeignTypeId, parent: ForeignTypeId) {
        self.types[ty.0 as usize].interfaces.push(parent);
    }

    pub fn add_method(&mut self, ty: ForeignTypeId, method: ForeignMethodDef) {
        self.types[ty.0 as usize].methods.push(method);
    }

    pub fn set_method_container(&mut self, ty: ForeignTypeId, container: ForeignTypeId) {
        self.types[ty.0 as usize].method_container = Some(container);
    }

    pub fn lookup(&self, name: Symbol) -> Option<ForeignTypeId> {
        self.by_name.get(&name).copied()
    }

    pub fn get(&self, id: ForeignTypeId) -> &ForeignTypeDef {
        &self.types[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::Interner;

    #[test]
    fn register_and_lookup_type() {
        let mut interner = Interner::new();
        let name = interner.intern("FILE");

        let mut world = ForeignWorld::new();
        let id = world.register_type(name, false);

        assert_eq!(world.lookup(name), Some(id));
        assert_eq!(world.get(id).name, name);
        assert!(!world.get(id).is_abstract);
    }

    #[test]
    fn methods_and_container() {
        let mut interner = Interner::new();
        let file = interner.intern("FILE");
        let file_ops = interner.intern("FILE_OPS");
        let close = interner.intern("close");

        let mut world = ForeignWorld::new();
        let file_id = world.register_type(file, false);
        let ops_id = world.register_type(file_ops, false);
        world.add_method(
            file_id,
            ForeignMethodDef {
                name: close,
                params: vec![],
                return_type: None,
                source_name: None,
            },
        );
        world.set_method_container(file_id, ops_id);

        assert_eq!(world.get(file_id).methods().len(), 1);
        assert_eq!(world.get(file_id).method_container(), Some(ops_id));
        assert_eq!(world.get(ops_id).method_container(), None);
    }
}
