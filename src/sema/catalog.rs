// src/sema/catalog.rs
//
// The type universe for one compilation. Owns builtin type identities,
// descriptors for user classes and foreign types behind one interface,
// ancestor closures, adapter-extended subtype testing, per-type method
// and field tables, and the metadata side-tables that stand in for
// attributes a type under construction cannot yet answer reflectively.
//
// TypeId is a u32 handle with identity equality; descriptors are created
// on first reference and live for the whole compilation.

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::frontend::{ClassKind, Interner, ParamMode, Symbol};
use crate::sema::foreign::{ForeignTypeId, ForeignWorld};
use crate::sema::signature::MethodSignature;

/// Concrete type identity in the catalog.
///
/// Two types are the same type iff their TypeIds are equal; method-table
/// and side-table lookups all key on this identity, never on structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    // Reserved TypeIds, interned by TypeCatalog::new() at these indices

    /// Universal root: every type is a subtype of ANY
    pub const ANY: TypeId = TypeId(0);
    pub const BOOL: TypeId = TypeId(1);
    pub const INT: TypeId = TypeId(2);
    pub const FLT: TypeId = TypeId(3);
    pub const STR: TypeId = TypeId(4);
    pub const VOID: TypeId = TypeId(5);

    /// First non-reserved TypeId index
    pub const FIRST_DYNAMIC: u32 = 6;

    pub fn index(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_reserved(self) -> bool {
        self.0 < Self::FIRST_DYNAMIC
    }

    #[inline]
    pub fn is_void(self) -> bool {
        self == Self::VOID
    }
}

/// SmallVec for ancestor/parent lists - inline up to 4
pub type TypeIdVec = SmallVec<[TypeId; 4]>;

/// Handle to an interned method signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(u32);

impl MethodId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Which backend answers reflective queries for a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    /// Reserved builtin identity (ANY, BOOL, ...)
    Builtin,
    /// Cedar class still being elaborated; served from catalog tables
    InProgress,
    /// Finalized foreign type; served from ForeignWorld introspection
    Foreign(ForeignTypeId),
}

#[derive(Debug, Clone, Copy)]
pub struct TypeDescriptor {
    pub id: TypeId,
    pub name: Symbol,
    pub is_abstract: bool,
    pub is_builtin: bool,
    pub backing: Backing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Attr,
    Shared,
    Const,
}

/// Backing storage slot synthesized for an attribute/shared/constant
#[derive(Debug, Clone, Copy)]
pub struct FieldSlot {
    pub name: Symbol,
    pub ty: TypeId,
    pub kind: FieldKind,
    pub slot: usize,
}

/// Wrapper-type linkage: which foreign type a wrapper holds and which
/// supertype it presents it as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterLink {
    pub adaptee: TypeId,
    pub supertype: TypeId,
}

pub struct TypeCatalog {
    foreign: ForeignWorld,
    descriptors: Vec<TypeDescriptor>,
    by_name: HashMap<Symbol, TypeId>,
    foreign_cache: HashMap<ForeignTypeId, TypeId>,

    /// Declared parents for in-progress types (set by the declare pass)
    parents: HashMap<TypeId, TypeIdVec>,
    /// Memoized ancestor closures
    ancestors: HashMap<TypeId, TypeIdVec>,

    sigs: Vec<MethodSignature>,
    methods: HashMap<TypeId, Vec<MethodId>>,
    fields: HashMap<TypeId, Vec<FieldSlot>>,
    materialized: HashSet<TypeId>,

    /// (adaptee, supertype) -> wrapper; consulted by is_subtype
    adapters: HashMap<(TypeId, TypeId), TypeId>,

    // Side-tables for metadata the signature representation cannot carry
    // until a type is finalized
    source_names: HashMap<MethodId, Symbol>,
    iter_returns: HashMap<MethodId, TypeId>,
    arg_modes: HashMap<(MethodId, u32), ParamMode>,
    adapter_links: HashMap<TypeId, AdapterLink>,
}

impl TypeCatalog {
    pub fn new(foreign: ForeignWorld, interner: &mut Interner) -> Self {
        let mut catalog = Self {
            foreign,
            descriptors: Vec::new(),
            by_name: HashMap::new(),
            foreign_cache: HashMap::new(),
            parents: HashMap::new(),
            ancestors: HashMap::new(),
            sigs: Vec::new(),
            methods: HashMap::new(),
            fields: HashMap::new(),
            materialized: HashSet::new(),
            adapters: HashMap::new(),
            source_names: HashMap::new(),
            iter_returns: HashMap::new(),
            arg_modes: HashMap::new(),
            adapter_links: HashMap::new(),
        };

        // Reserved identities must land at their TypeId constants
        catalog.intern_builtin(interner, "ANY", true);
        catalog.intern_builtin(interner, "BOOL", false);
        catalog.intern_builtin(interner, "INT", false);
        catalog.intern_builtin(interner, "FLT", false);
        catalog.intern_builtin(interner, "STR", false);
        catalog.intern_builtin(interner, "VOID", false);

        catalog
    }

    fn intern_builtin(&mut self, interner: &mut Interner, name: &str, is_abstract: bool) {
        let sym = interner.intern(name);
        let id = TypeId(self.descriptors.len() as u32);
        self.descriptors.push(TypeDescriptor {
            id,
            name: sym,
            is_abstract,
            is_builtin: true,
            backing: Backing::Builtin,
        });
        self.by_name.insert(sym, id);
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a Cedar class from the declare pass
    pub fn declare_class(&mut self, name: Symbol, kind: ClassKind) -> TypeId {
        self.declare_in_progress(name, kind == ClassKind::Abstract)
    }

    /// Register a synthesized type (step-protocol or adapter wrapper)
    pub fn declare_synthetic(&mut self, name: Symbol, is_abstract: bool) -> TypeId {
        self.declare_in_progress(name, is_abstract)
    }

    fn declare_in_progress(&mut self, name: Symbol, is_abstract: bool) -> TypeId {
        let id = TypeId(self.descriptors.len() as u32);
        self.descriptors.push(TypeDescriptor {
            id,
            name,
            is_abstract,
            is_builtin: false,
            backing: Backing::InProgress,
        });
        self.by_name.insert(name, id);
        self.methods.insert(id, Vec::new());
        self.fields.insert(id, Vec::new());
        id
    }

    pub fn set_parents(&mut self, ty: TypeId, parents: TypeIdVec) {
        self.parents.insert(ty, parents);
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Resolve a source-level type name: user classes shadow foreign
    /// types; an unknown name is reported by the caller as an
    /// UnresolvedType at the referencing member.
    pub fn resolve_named(&mut self, name: Symbol) -> Option<TypeId> {
        if let Some(&id) = self.by_name.get(&name) {
            return Some(id);
        }
        let fid = self.foreign.lookup(name)?;
        Some(self.resolve_foreign(fid))
    }

    /// Memoized foreign-handle to descriptor mapping
    pub fn resolve_foreign(&mut self, fid: ForeignTypeId) -> TypeId {
        if let Some(&id) = self.foreign_cache.get(&fid) {
            return id;
        }
        let def = self.foreign.get(fid);
        let (name, is_abstract) = (def.name, def.is_abstract);
        let id = TypeId(self.descriptors.len() as u32);
        self.descriptors.push(TypeDescriptor {
            id,
            name,
            is_abstract,
            is_builtin: true,
            backing: Backing::Foreign(fid),
        });
        self.foreign_cache.insert(fid, id);
        id
    }

    pub fn descriptor(&self, ty: TypeId) -> &TypeDescriptor {
        &self.descriptors[ty.index() as usize]
    }

    pub fn type_name<'a>(&self, ty: TypeId, interner: &'a Interner) -> &'a str {
        interner.resolve(self.descriptor(ty).name)
    }

    // ------------------------------------------------------------------
    // Ancestry and subtyping
    // ------------------------------------------------------------------

    fn parents_of(&mut self, ty: TypeId) -> TypeIdVec {
        match self.descriptor(ty).backing {
            Backing::Builtin => TypeIdVec::new(),
            Backing::InProgress => self.parents.get(&ty).cloned().unwrap_or_default(),
            Backing::Foreign(fid) => {
                let ifaces: Vec<ForeignTypeId> = self.foreign.get(fid).interfaces().to_vec();
                ifaces.into_iter().map(|f| self.resolve_foreign(f)).collect()
            }
        }
    }

    /// Transitive, duplicate-free, order-preserving closure of declared
    /// supertypes. Self is excluded; a parent cycle terminates.
    pub fn ancestors_of(&mut self, ty: TypeId) -> TypeIdVec {
        if let Some(memo) = self.ancestors.get(&ty) {
            return memo.clone();
        }
        // In-flight marker so a declared-parent cycle bottoms out
        self.ancestors.insert(ty, TypeIdVec::new());

        let mut out = TypeIdVec::new();
        for parent in self.parents_of(ty) {
            if parent != ty && !out.contains(&parent) {
                out.push(parent);
            }
            for ancestor in self.ancestors_of(parent) {
                if ancestor != ty && !out.contains(&ancestor) {
                    out.push(ancestor);
                }
            }
        }

        self.ancestors.insert(ty, out.clone());
        out
    }

    /// Subtype test over declared hierarchy, the universal root, and
    /// registered supertyping adapters.
    pub fn is_subtype(&mut self, t: TypeId, s: TypeId) -> bool {
        t == s
            || s == TypeId::ANY
            || self.ancestors_of(t).contains(&s)
            || self.adapters.contains_key(&(t, s))
    }

    // ------------------------------------------------------------------
    // Methods and fields
    // ------------------------------------------------------------------

    pub fn add_method(&mut self, sig: MethodSignature) -> MethodId {
        let id = MethodId(self.sigs.len() as u32);
        let owner = sig.owner;
        self.sigs.push(sig);
        self.methods.entry(owner).or_default().push(id);
        id
    }

    pub fn signature(&self, id: MethodId) -> &MethodSignature {
        &self.sigs[id.index() as usize]
    }

    /// Declared methods only (not ancestors). Foreign types materialize
    /// their introspected methods on first query; callers cannot tell
    /// which backend served them.
    pub fn methods_of(&mut self, ty: TypeId) -> Vec<MethodId> {
        if let Backing::Foreign(fid) = self.descriptor(ty).backing
            && !self.materialized.contains(&ty)
        {
            self.materialized.insert(ty);
            let defs = self.foreign.get(fid).methods().to_vec();
            for def in defs {
                let params: Vec<TypeId> = def
                    .params
                    .iter()
                    .map(|p| self.resolve_foreign(p.ty))
                    .collect();
                let return_type = def.return_type.map(|r| self.resolve_foreign(r));
                let id = self.add_method(MethodSignature::public(ty, def.name, params, return_type));
                for (i, p) in def.params.iter().enumerate() {
                    if p.mode != ParamMode::In {
                        self.record_arg_mode(id, i, p.mode);
                    }
                }
                if let Some(orig) = def.source_name {
                    self.record_source_name(id, orig);
                }
            }
        }
        self.methods.get(&ty).cloned().unwrap_or_default()
    }

    /// Union of methods_of over the ancestor closure, in ancestor order
    pub fn ancestor_methods_of(&mut self, ty: TypeId) -> Vec<MethodId> {
        let mut out = Vec::new();
        for ancestor in self.ancestors_of(ty) {
            out.extend(self.methods_of(ancestor));
        }
        out
    }

    /// The companion type holding static-style methods for a foreign
    /// type, if its introspection registers one
    pub fn method_container_of(&mut self, ty: TypeId) -> Option<TypeId> {
        match self.descriptor(ty).backing {
            Backing::Foreign(fid) => {
                let container = self.foreign.get(fid).method_container()?;
                Some(self.resolve_foreign(container))
            }
            _ => None,
        }
    }

    pub fn add_field(&mut self, ty: TypeId, field: FieldSlot) {
        self.fields.entry(ty).or_default().push(field);
    }

    pub fn fields_of(&self, ty: TypeId) -> &[FieldSlot] {
        self.fields.get(&ty).map(Vec::as_slice).unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Adapters
    // ------------------------------------------------------------------

    pub fn register_adapter(&mut self, adaptee: TypeId, supertype: TypeId, wrapper: TypeId) {
        self.adapters.insert((adaptee, supertype), wrapper);
    }

    pub fn adapter_for(&self, adaptee: TypeId, supertype: TypeId) -> Option<TypeId> {
        self.adapters.get(&(adaptee, supertype)).copied()
    }

    // ------------------------------------------------------------------
    // Metadata side-tables
    // ------------------------------------------------------------------

    pub fn record_source_name(&mut self, method: MethodId, name: Symbol) {
        self.source_names.insert(method, name);
    }

    /// Original source-level name of a method; defaults to its
    /// structural name when no rename was recorded
    pub fn source_name(&self, method: MethodId) -> Symbol {
        self.source_names
            .get(&method)
            .copied()
            .unwrap_or_else(|| self.signature(method).name)
    }

    pub fn record_iter_return(&mut self, method: MethodId, elem: TypeId) {
        self.iter_returns.insert(method, elem);
    }

    /// Logical element type of an iterator-flavored method; None for a
    /// value-less iterator or a plain routine
    pub fn iter_return(&self, method: MethodId) -> Option<TypeId> {
        self.iter_returns.get(&method).copied()
    }

    pub fn record_arg_mode(&mut self, method: MethodId, index: usize, mode: ParamMode) {
        self.arg_modes.insert((method, index as u32), mode);
    }

    pub fn arg_mode(&self, method: MethodId, index: usize) -> ParamMode {
        self.arg_modes
            .get(&(method, index as u32))
            .copied()
            .unwrap_or(ParamMode::In)
    }

    pub fn record_adapter_link(&mut self, wrapper: TypeId, link: AdapterLink) {
        self.adapter_links.insert(wrapper, link);
    }

    pub fn adapter_link(&self, wrapper: TypeId) -> Option<AdapterLink> {
        self.adapter_links.get(&wrapper).copied()
    }
}
