// src/sema/adapter.rs
//
// Synthesizes supertyping adapters: wrapper types that let a foreign
// type satisfy a Cedar interface it never declared, by delegation. The
// wrapper holds one adaptee instance and descends from the requested
// supertype; registering it extends the catalog's subtype relation.

use smallvec::smallvec;

use crate::errors::{Diagnostics, ElabError};
use crate::frontend::{AdapterRequest, Interner, NodeId, Span, Symbol, Visibility};
use crate::sema::catalog::{
    AdapterLink, FieldKind, FieldSlot, MethodId, TypeCatalog, TypeId,
};
use crate::sema::signature::{MethodSignature, ObligationSet};

/// One delegating method on a wrapper type
#[derive(Debug, Clone, Copy)]
pub struct DelegatedMethod {
    /// The supertype obligation this delegation satisfies
    pub interface_method: MethodId,
    /// The adaptee (or container) method the wrapper forwards to
    pub adaptee_method: MethodId,
    pub wrapper_method: MethodId,
}

/// Result of synthesizing one adapter request
#[derive(Debug, Clone)]
pub struct AdapterOut {
    pub request: NodeId,
    pub wrapper: TypeId,
    pub ctor: MethodId,
    pub methods: Vec<DelegatedMethod>,
}

/// Synthesize the wrapper for one `adapt S as T` request. Unresolved
/// types abort this adapter only; unimplemented supertype methods are
/// reported but still leave the adapter emitted.
pub(crate) fn synthesize_adapter(
    catalog: &mut TypeCatalog,
    interner: &mut Interner,
    diags: &mut Diagnostics,
    class_span: Span,
    req: &AdapterRequest,
) -> Option<AdapterOut> {
    let adaptee = resolve_or_report(catalog, interner, diags, req.adaptee.name, req.adaptee.span)?;
    let supertype =
        resolve_or_report(catalog, interner, diags, req.supertype.name, req.supertype.span)?;

    let adaptee_name = interner.resolve(catalog.descriptor(adaptee).name).to_string();
    let super_name = interner.resolve(catalog.descriptor(supertype).name).to_string();
    let wrapper_name = interner.intern(&format!("{adaptee_name}${super_name}"));

    let wrapper = catalog.declare_synthetic(wrapper_name, false);
    catalog.set_parents(wrapper, smallvec![supertype]);
    catalog.register_adapter(adaptee, supertype, wrapper);
    catalog.record_adapter_link(
        wrapper,
        AdapterLink {
            adaptee,
            supertype,
        },
    );

    // Adaptee-holding field and the one-argument constructor
    let wrapped = interner.intern("wrapped");
    catalog.add_field(
        wrapper,
        FieldSlot {
            name: wrapped,
            ty: adaptee,
            kind: FieldKind::Attr,
            slot: 0,
        },
    );
    let create = interner.intern("create");
    let ctor = catalog.add_method(MethodSignature::public(
        wrapper,
        create,
        vec![adaptee],
        Some(wrapper),
    ));

    // The wrapper's sole parent is the supertype, so its ancestor
    // methods are exactly the supertype's declared plus inherited ones
    let mut obligations = ObligationSet::seed(catalog, wrapper);
    let mut methods = Vec::new();

    for adaptee_method in catalog.methods_of(adaptee) {
        if let Some(obligation) = obligations.take_conforming(catalog, adaptee_method) {
            methods.push(delegate(catalog, wrapper, obligation, adaptee_method));
        }
    }

    if let Some(container) = catalog.method_container_of(adaptee) {
        for container_method in catalog.methods_of(container) {
            if let Some(obligation) =
                obligations.take_builtin_conforming(catalog, container_method, adaptee)
            {
                methods.push(delegate(catalog, wrapper, obligation, container_method));
            }
        }
    }

    for &obligation in obligations.remaining() {
        let method = interner.resolve(catalog.source_name(obligation)).to_string();
        diags.report(
            ElabError::AdapterObligation {
                method,
                adaptee: adaptee_name.clone(),
                span: class_span.into(),
            },
            class_span,
        );
    }

    Some(AdapterOut {
        request: req.id,
        wrapper,
        ctor,
        methods,
    })
}

/// Emit a delegating method mirroring the obligation's signature on the
/// wrapper, forwarding to the matched adaptee method
fn delegate(
    catalog: &mut TypeCatalog,
    wrapper: TypeId,
    obligation: MethodId,
    adaptee_method: MethodId,
) -> DelegatedMethod {
    let obl_sig = catalog.signature(obligation).clone();
    let wrapper_method = catalog.add_method(MethodSignature {
        owner: wrapper,
        name: obl_sig.name,
        params: obl_sig.params.clone(),
        return_type: obl_sig.return_type,
        vis: Visibility::Public,
        is_iter: obl_sig.is_iter,
    });
    for i in 0..obl_sig.arity() {
        let mode = catalog.arg_mode(obligation, i);
        if mode != crate::frontend::ParamMode::In {
            catalog.record_arg_mode(wrapper_method, i, mode);
        }
    }
    DelegatedMethod {
        interface_method: obligation,
        adaptee_method,
        wrapper_method,
    }
}

fn resolve_or_report(
    catalog: &mut TypeCatalog,
    interner: &Interner,
    diags: &mut Diagnostics,
    name: Symbol,
    span: Span,
) -> Option<TypeId> {
    match catalog.resolve_named(name) {
        Some(ty) => Some(ty),
        None => {
            diags.report(
                ElabError::UnresolvedType {
                    name: interner.resolve(name).to_string(),
                    span: span.into(),
                },
                span,
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{ClassKind, ParamMode, TypeRef};
    use crate::sema::foreign::{ForeignMethodDef, ForeignParam, ForeignWorld};

    fn type_ref(name: Symbol) -> TypeRef {
        TypeRef {
            name,
            span: Span::default(),
        }
    }

    fn request(adaptee: Symbol, supertype: Symbol) -> AdapterRequest {
        AdapterRequest {
            id: NodeId(900),
            adaptee: type_ref(adaptee),
            supertype: type_ref(supertype),
            span: Span::default(),
        }
    }

    #[test]
    fn conformant_adaptee_methods_become_delegations() {
        let mut interner = Interner::new();
        let mut world = ForeignWorld::new();
        let rope = interner.intern("ROPE");
        let len = interner.intern("len");
        let clear = interner.intern("clear");
        let extra = interner.intern("extra");
        let rope_id = world.register_type(rope, false);
        for name in [len, clear, extra] {
            world.add_method(
                rope_id,
                ForeignMethodDef {
                    name,
                    params: vec![],
                    return_type: None,
                    source_name: None,
                },
            );
        }

        let mut catalog = TypeCatalog::new(world, &mut interner);
        let sink = interner.intern("$SINK");
        let iface = catalog.declare_class(sink, ClassKind::Abstract);
        catalog.add_method(MethodSignature::public(iface, len, vec![], None));
        catalog.add_method(MethodSignature::public(iface, clear, vec![], None));

        let mut diags = Diagnostics::new();
        let out = synthesize_adapter(
            &mut catalog,
            &mut interner,
            &mut diags,
            Span::default(),
            &request(rope, sink),
        )
        .unwrap();

        assert_eq!(out.methods.len(), 2);
        assert!(diags.is_empty());
        let rope_ty = catalog.resolve_named(rope).unwrap();
        assert!(catalog.is_subtype(rope_ty, iface));
        assert_eq!(catalog.adapter_link(out.wrapper).unwrap().adaptee, rope_ty);

        // constructor takes one adaptee instance and returns the wrapper
        let ctor = catalog.signature(out.ctor);
        assert_eq!(ctor.params, vec![rope_ty]);
        assert_eq!(ctor.return_type, Some(out.wrapper));
    }

    #[test]
    fn missing_obligation_reported_but_adapter_emitted() {
        let mut interner = Interner::new();
        let mut world = ForeignWorld::new();
        let rope = interner.intern("ROPE");
        let rope_id = world.register_type(rope, false);
        let _ = rope_id;

        let mut catalog = TypeCatalog::new(world, &mut interner);
        let sink = interner.intern("$SINK");
        let iface = catalog.declare_class(sink, ClassKind::Abstract);
        let flush = interner.intern("flush");
        catalog.add_method(MethodSignature::public(iface, flush, vec![], None));

        let mut diags = Diagnostics::new();
        let out = synthesize_adapter(
            &mut catalog,
            &mut interner,
            &mut diags,
            Span::default(),
            &request(rope, sink),
        );

        assert!(out.is_some());
        assert_eq!(diags.len(), 1);
        assert!(matches!(
            diags.iter().next().unwrap().error,
            ElabError::AdapterObligation { .. }
        ));
    }

    #[test]
    fn container_methods_match_receiver_shifted() {
        let mut interner = Interner::new();
        let mut world = ForeignWorld::new();
        let buf = interner.intern("BUF");
        let buf_ops = interner.intern("BUF_OPS");
        let put = interner.intern("put");
        let buf_id = world.register_type(buf, false);
        let ops_id = world.register_type(buf_ops, false);
        world.set_method_container(buf_id, ops_id);
        // static-style: put(receiver: BUF, value: BUF)
        world.add_method(
            ops_id,
            ForeignMethodDef {
                name: put,
                params: vec![
                    ForeignParam {
                        mode: ParamMode::In,
                        ty: buf_id,
                    },
                    ForeignParam {
                        mode: ParamMode::In,
                        ty: buf_id,
                    },
                ],
                return_type: None,
                source_name: None,
            },
        );

        let mut catalog = TypeCatalog::new(world, &mut interner);
        let sink = interner.intern("$SINK");
        let iface = catalog.declare_class(sink, ClassKind::Abstract);
        let buf_ty = catalog.resolve_named(buf).unwrap();
        catalog.add_method(MethodSignature::public(iface, put, vec![buf_ty], None));

        let mut diags = Diagnostics::new();
        let out = synthesize_adapter(
            &mut catalog,
            &mut interner,
            &mut diags,
            Span::default(),
            &request(buf, sink),
        )
        .unwrap();

        assert!(diags.is_empty());
        assert_eq!(out.methods.len(), 1);
        // the delegation mirrors the instance-style obligation, not the
        // receiver-shifted container signature
        let wrapper_method = catalog.signature(out.methods[0].wrapper_method);
        assert_eq!(wrapper_method.arity(), 1);
    }

    #[test]
    fn unresolved_adaptee_aborts_this_adapter_only() {
        let mut interner = Interner::new();
        let mut catalog = TypeCatalog::new(ForeignWorld::new(), &mut interner);
        let sink = interner.intern("$SINK");
        catalog.declare_class(sink, ClassKind::Abstract);
        let ghost = interner.intern("GHOST");

        let mut diags = Diagnostics::new();
        let out = synthesize_adapter(
            &mut catalog,
            &mut interner,
            &mut diags,
            Span::default(),
            &request(ghost, sink),
        );

        assert!(out.is_none());
        assert_eq!(diags.len(), 1);
        assert!(matches!(
            diags.iter().next().unwrap().error,
            ElabError::UnresolvedType { .. }
        ));
    }
}
