// src/sema/elaborate.rs
//
// The element-creation pass: one visitor sweep over the class tree. For
// every member it creates the signature representation, runs conflict
// and conformance checks against the shared catalog, and records the
// synthesized handles for codegen. Errors are contained at member
// granularity; sibling members always elaborate.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::{debug, info_span};

use crate::errors::{Diagnostics, ElabError};
use crate::frontend::{
    AttrDecl, ClassDecl, ClassKind, ConstDecl, IncludeDecl, Interner, IterDecl, Member, NodeId,
    Param, ParamMode, Program, RoutineDecl, Span, Symbol, TypeRef, Visibility,
};
use crate::sema::adapter::{AdapterOut, synthesize_adapter};
use crate::sema::catalog::{FieldKind, FieldSlot, MethodId, TypeCatalog, TypeId, TypeIdVec};
use crate::sema::iterator::{IterLowering, declare_step_protocol, lower_iterator};
use crate::sema::signature::{MethodSignature, ObligationSet, conflicts};

/// Handles synthesized for one member, keyed by (class, member node) in
/// the output. Includes re-elaborate the source class's members, so the
/// same node can appear under several classes.
#[derive(Debug, Clone)]
pub enum ElaboratedMember {
    Routine { method: MethodId },
    AbstractRoutine { method: MethodId },
    Iterator(IterLowering),
    AbstractIterator { method: MethodId, step_type: TypeId },
    Accessors {
        slot: usize,
        reader: Option<MethodId>,
        writer: Option<MethodId>,
    },
}

/// Everything the downstream code generator needs from this pass
#[derive(Debug, Default)]
pub struct ElaborationOutput {
    pub classes: FxHashMap<Symbol, TypeId>,
    pub members: FxHashMap<(TypeId, NodeId), ElaboratedMember>,
    pub adapters: Vec<AdapterOut>,
}

/// Per-class ambient state: the obligation set being consumed and the
/// synthetic-iterator counter, reset for each class
struct ClassCx {
    class_id: TypeId,
    obligations: ObligationSet,
    iter_counter: usize,
    /// Classes currently being expanded through include clauses
    include_stack: Vec<Symbol>,
}

/// Effective name/visibility substitution applied when a member is
/// copied in through an include clause
struct Subst {
    name: Symbol,
    vis: Option<Visibility>,
    /// The member's name in the class it was copied from
    source: Symbol,
}

struct Elaborator<'a> {
    catalog: &'a mut TypeCatalog,
    interner: &'a mut Interner,
    diags: &'a mut Diagnostics,
    /// Class name -> index in program.classes (first declaration wins)
    class_index: FxHashMap<Symbol, usize>,
    output: ElaborationOutput,
}

/// Run the element-creation pass over a whole program. Diagnostics
/// accumulate in the sink; the pass always runs to completion.
pub fn elaborate(
    program: &Program,
    catalog: &mut TypeCatalog,
    interner: &mut Interner,
    diags: &mut Diagnostics,
) -> ElaborationOutput {
    let _span = info_span!("elaborate").entered();

    let mut elab = Elaborator {
        catalog,
        interner,
        diags,
        class_index: FxHashMap::default(),
        output: ElaborationOutput::default(),
    };

    // Declare pass: register every class, then resolve supertype lists
    for (idx, class) in program.classes.iter().enumerate() {
        if elab.class_index.contains_key(&class.name) {
            continue;
        }
        elab.class_index.insert(class.name, idx);
        let id = elab.catalog.declare_class(class.name, class.kind);
        elab.output.classes.insert(class.name, id);
    }
    for (idx, class) in program.classes.iter().enumerate() {
        if elab.class_index.get(&class.name) != Some(&idx) {
            continue;
        }
        let class_id = elab.output.classes[&class.name];
        let mut parents = TypeIdVec::new();
        for supertype in &class.supertypes {
            if let Some(parent) = elab.resolve_ty(supertype)
                && parent != class_id
                && !parents.contains(&parent)
            {
                parents.push(parent);
            }
        }
        elab.catalog.set_parents(class_id, parents);
    }

    // Member pass, one class at a time, members in source order.
    // Ancestors elaborate before descendants so obligation seeding sees
    // their methods regardless of declaration order; a hierarchy cycle
    // falls back to encounter order.
    let mut done = FxHashSet::default();
    for (idx, class) in program.classes.iter().enumerate() {
        if elab.class_index.get(&class.name) != Some(&idx) {
            continue;
        }
        elab.elab_class_rec(program, idx, &mut done);
    }

    elab.output
}

impl Elaborator<'_> {
    fn elab_class_rec(&mut self, program: &Program, idx: usize, done: &mut FxHashSet<usize>) {
        if !done.insert(idx) {
            return;
        }
        let class = &program.classes[idx];
        let dependencies = class
            .supertypes
            .iter()
            .chain(class.adapters.iter().map(|req| &req.supertype))
            .filter_map(|type_ref| self.class_index.get(&type_ref.name).copied())
            .collect::<Vec<_>>();
        for dep in dependencies {
            self.elab_class_rec(program, dep, done);
        }
        self.elab_class(program, class);
    }

    fn elab_class(&mut self, program: &Program, class: &ClassDecl) {
        debug!(class = self.interner.resolve(class.name), "elaborating class");
        let class_id = self.output.classes[&class.name];

        // Abstract classes may leave ancestor obligations open
        let obligations = if class.kind == ClassKind::Concrete {
            ObligationSet::seed(self.catalog, class_id)
        } else {
            ObligationSet::empty()
        };
        let mut cx = ClassCx {
            class_id,
            obligations,
            iter_counter: 0,
            include_stack: vec![class.name],
        };

        for member in &class.members {
            self.visit_member(&mut cx, program, member, None);
        }

        for req in &class.adapters {
            if let Some(out) =
                synthesize_adapter(self.catalog, self.interner, self.diags, class.span, req)
            {
                self.output.adapters.push(out);
            }
        }

        if class.kind == ClassKind::Concrete && !cx.obligations.is_empty() {
            let class_name = self.interner.resolve(class.name).to_string();
            for &obligation in cx.obligations.remaining() {
                let method = self
                    .interner
                    .resolve(self.catalog.source_name(obligation))
                    .to_string();
                self.diags.report(
                    ElabError::UnimplementedObligation {
                        method,
                        class: class_name.clone(),
                        span: class.span.into(),
                    },
                    class.span,
                );
            }
        }
    }

    fn visit_member(
        &mut self,
        cx: &mut ClassCx,
        program: &Program,
        member: &Member,
        subst: Option<&Subst>,
    ) {
        match member {
            Member::Routine(decl) => self.elab_routine(cx, decl, false, subst),
            Member::AbstractRoutine(decl) => self.elab_routine(cx, decl, true, subst),
            Member::Iterator(decl) => self.elab_iter(cx, decl, false, subst),
            Member::AbstractIterator(decl) => self.elab_iter(cx, decl, true, subst),
            Member::Attr(decl) => self.elab_attr(cx, decl, FieldKind::Attr, subst),
            Member::Shared(decl) => self.elab_attr(cx, decl, FieldKind::Shared, subst),
            Member::Const(decl) => self.elab_const(cx, decl, subst),
            Member::Include(decl) => self.elab_include(cx, program, decl),
        }
    }

    fn elab_routine(
        &mut self,
        cx: &mut ClassCx,
        decl: &RoutineDecl,
        is_abstract: bool,
        subst: Option<&Subst>,
    ) {
        let name = subst.map_or(decl.name, |s| s.name);
        let Some((params, modes)) = self.resolve_params(&decl.params) else {
            return;
        };
        let return_type = match &decl.return_type {
            Some(type_ref) => match self.resolve_ty(type_ref) {
                Some(ty) => Some(ty),
                None => return,
            },
            None => None,
        };

        let sig = MethodSignature::public(cx.class_id, name, params, return_type);
        if self.conflicts_with_declared(cx.class_id, &sig, decl.span) {
            return;
        }
        let method = self.catalog.add_method(sig);
        self.record_modes(method, &modes);
        if let Some(s) = subst
            && s.source != name
        {
            self.catalog.record_source_name(method, s.source);
        }

        let elaborated = if is_abstract {
            // Abstract declarations create obligations for descendants;
            // they never discharge the current class's own set
            ElaboratedMember::AbstractRoutine { method }
        } else {
            cx.obligations.take_conforming(self.catalog, method);
            ElaboratedMember::Routine { method }
        };
        self.output.members.insert((cx.class_id, decl.id), elaborated);
    }

    fn elab_iter(
        &mut self,
        cx: &mut ClassCx,
        decl: &IterDecl,
        is_abstract: bool,
        subst: Option<&Subst>,
    ) {
        let name = subst.map_or(decl.name, |s| s.name);
        let Some((params, modes)) = self.resolve_params(&decl.params) else {
            return;
        };
        let elem = match &decl.return_type {
            Some(type_ref) => match self.resolve_ty(type_ref) {
                Some(ty) => Some(ty),
                None => return,
            },
            None => None,
        };

        // Conflict probe before synthesizing anything: the factory's
        // structural return is a step object, so never void
        let probe = MethodSignature {
            owner: cx.class_id,
            name,
            params: params.clone(),
            return_type: Some(TypeId::ANY),
            vis: Visibility::Public,
            is_iter: true,
        };
        if self.conflicts_with_declared(cx.class_id, &probe, decl.span) {
            return;
        }

        if is_abstract {
            let step = declare_step_protocol(
                self.catalog,
                self.interner,
                cx.class_id,
                name,
                &params,
                &modes,
                elem,
            );
            let method = self.catalog.add_method(MethodSignature {
                owner: cx.class_id,
                name,
                params,
                return_type: Some(step),
                vis: Visibility::Public,
                is_iter: true,
            });
            self.record_modes(method, &modes);
            if let Some(elem_ty) = elem {
                self.catalog.record_iter_return(method, elem_ty);
            }
            if let Some(s) = subst
                && s.source != name
            {
                self.catalog.record_source_name(method, s.source);
            }
            self.output.members.insert(
                (cx.class_id, decl.id),
                ElaboratedMember::AbstractIterator {
                    method,
                    step_type: step,
                },
            );
        } else {
            let matched =
                cx.obligations
                    .take_iter_conforming(self.catalog, name, &params, &modes, elem);
            let lowered = lower_iterator(
                self.catalog,
                self.interner,
                cx.class_id,
                name,
                &params,
                &modes,
                elem,
                &matched,
                cx.iter_counter,
            );
            cx.iter_counter += 1;
            if let Some(s) = subst
                && s.source != name
            {
                self.catalog.record_source_name(lowered.factory, s.source);
            }
            self.output
                .members
                .insert((cx.class_id, decl.id), ElaboratedMember::Iterator(lowered));
        }
    }

    fn elab_attr(
        &mut self,
        cx: &mut ClassCx,
        decl: &AttrDecl,
        kind: FieldKind,
        subst: Option<&Subst>,
    ) {
        let name = subst.map_or(decl.name, |s| s.name);
        let source = subst.map_or(decl.name, |s| s.source);
        let vis = subst.and_then(|s| s.vis).unwrap_or(decl.vis);
        let Some(ty) = self.resolve_ty(&decl.ty) else {
            return;
        };
        self.add_accessors(cx, decl.id, name, source, vis, ty, kind, decl.span, true);
    }

    fn elab_const(&mut self, cx: &mut ClassCx, decl: &ConstDecl, subst: Option<&Subst>) {
        let name = subst.map_or(decl.name, |s| s.name);
        let source = subst.map_or(decl.name, |s| s.source);
        let vis = subst.and_then(|s| s.vis).unwrap_or(decl.vis);
        let Some(ty) = self.resolve_ty(&decl.ty) else {
            return;
        };
        self.add_accessors(cx, decl.id, name, source, vis, ty, FieldKind::Const, decl.span, false);
    }

    /// Backing slot plus reader (and writer for mutable kinds), each
    /// conflict-checked as an ordinary zero/one-argument method
    fn add_accessors(
        &mut self,
        cx: &mut ClassCx,
        node: NodeId,
        name: Symbol,
        source: Symbol,
        vis: Visibility,
        ty: TypeId,
        kind: FieldKind,
        span: Span,
        with_writer: bool,
    ) {
        let slot = self.catalog.fields_of(cx.class_id).len();
        self.catalog.add_field(cx.class_id, FieldSlot { name, ty, kind, slot });

        let reader_sig = MethodSignature {
            owner: cx.class_id,
            name,
            params: vec![],
            return_type: Some(ty),
            vis: reader_vis(vis),
            is_iter: false,
        };
        let reader = self.add_accessor(cx, reader_sig, name, source, span);

        let writer = if with_writer {
            let writer_sig = MethodSignature {
                owner: cx.class_id,
                name,
                params: vec![ty],
                return_type: None,
                vis: writer_vis(vis),
                is_iter: false,
            };
            self.add_accessor(cx, writer_sig, name, source, span)
        } else {
            None
        };

        self.output.members.insert(
            (cx.class_id, node),
            ElaboratedMember::Accessors {
                slot,
                reader,
                writer,
            },
        );
    }

    fn add_accessor(
        &mut self,
        cx: &mut ClassCx,
        sig: MethodSignature,
        name: Symbol,
        source: Symbol,
        span: Span,
    ) -> Option<MethodId> {
        if self.conflicts_with_declared(cx.class_id, &sig, span) {
            return None;
        }
        let method = self.catalog.add_method(sig);
        cx.obligations.take_conforming(self.catalog, method);
        if source != name {
            self.catalog.record_source_name(method, source);
        }
        Some(method)
    }

    fn elab_include(&mut self, cx: &mut ClassCx, program: &Program, decl: &IncludeDecl) {
        let Some(&idx) = self.class_index.get(&decl.source.name) else {
            self.diags.report(
                ElabError::UnresolvedInclude {
                    name: self.interner.resolve(decl.source.name).to_string(),
                    span: decl.source.span.into(),
                },
                decl.span,
            );
            return;
        };
        if cx.include_stack.contains(&decl.source.name) {
            return;
        }
        cx.include_stack.push(decl.source.name);

        let target = &program.classes[idx];
        for member in &target.members {
            match member.name() {
                Some(original) => {
                    let rename = decl.renames.iter().find(|r| r.from == original);
                    let subst = match rename {
                        Some(r) => match r.to {
                            // Renamed to nothing: suppressed entirely
                            None => continue,
                            Some(to) => Subst {
                                name: to,
                                vis: r.vis,
                                source: original,
                            },
                        },
                        None => Subst {
                            name: original,
                            vis: None,
                            source: original,
                        },
                    };
                    self.visit_member(cx, program, member, Some(&subst));
                }
                // Nested include clauses re-expand with their own renames
                None => self.visit_member(cx, program, member, None),
            }
        }

        cx.include_stack.pop();
    }

    // ------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------

    fn conflicts_with_declared(
        &mut self,
        class_id: TypeId,
        sig: &MethodSignature,
        span: Span,
    ) -> bool {
        for existing_id in self.catalog.methods_of(class_id) {
            let existing = self.catalog.signature(existing_id).clone();
            if conflicts(self.catalog, sig, &existing) {
                self.diags.report(
                    ElabError::SignatureConflict {
                        name: self.interner.resolve(sig.name).to_string(),
                        class: self
                            .interner
                            .resolve(self.catalog.descriptor(class_id).name)
                            .to_string(),
                        span: span.into(),
                    },
                    span,
                );
                return true;
            }
        }
        false
    }

    fn resolve_ty(&mut self, type_ref: &TypeRef) -> Option<TypeId> {
        match self.catalog.resolve_named(type_ref.name) {
            Some(ty) => Some(ty),
            None => {
                self.diags.report(
                    ElabError::UnresolvedType {
                        name: self.interner.resolve(type_ref.name).to_string(),
                        span: type_ref.span.into(),
                    },
                    type_ref.span,
                );
                None
            }
        }
    }

    fn resolve_params(&mut self, params: &[Param]) -> Option<(Vec<TypeId>, SmallVec<[ParamMode; 4]>)> {
        let mut types = Vec::with_capacity(params.len());
        let mut modes = SmallVec::new();
        for param in params {
            types.push(self.resolve_ty(&param.ty)?);
            modes.push(param.mode);
        }
        Some((types, modes))
    }

    fn record_modes(&mut self, method: MethodId, modes: &[ParamMode]) {
        for (i, &mode) in modes.iter().enumerate() {
            if mode != ParamMode::In {
                self.catalog.record_arg_mode(method, i, mode);
            }
        }
    }
}

fn reader_vis(vis: Visibility) -> Visibility {
    if vis == Visibility::Private {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

fn writer_vis(vis: Visibility) -> Visibility {
    if vis == Visibility::Public {
        Visibility::Public
    } else {
        Visibility::Private
    }
}
