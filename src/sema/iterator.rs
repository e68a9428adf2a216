// src/sema/iterator.rs
//
// Lowers generator-style iterator routines to explicit step-protocol
// objects: a nested type holding the iteration state, an `advance`
// method returning whether another value is available, and a `current`
// accessor when the iterator produces values. The declaring class keeps
// a factory method returning the step object, plus one bridge method per
// ancestor step interface the definition satisfies.

use smallvec::SmallVec;

use crate::frontend::{Interner, ParamMode, Symbol, Visibility};
use crate::sema::catalog::{FieldKind, FieldSlot, MethodId, TypeCatalog, TypeId, TypeIdVec};
use crate::sema::signature::MethodSignature;

/// Handles produced by lowering one iterator definition
#[derive(Debug, Clone)]
pub struct IterLowering {
    pub step_type: TypeId,
    pub factory: MethodId,
    pub advance: MethodId,
    pub current: Option<MethodId>,
    pub bridges: Vec<MethodId>,
}

/// Synthesize the abstract step-protocol type for an iterator signature
/// declared without a body. Descendant definitions provide the concrete
/// state; this type only carries the protocol.
pub(crate) fn declare_step_protocol(
    catalog: &mut TypeCatalog,
    interner: &mut Interner,
    owner: TypeId,
    name: Symbol,
    params: &[TypeId],
    modes: &[ParamMode],
    elem: Option<TypeId>,
) -> TypeId {
    let step_name = step_type_name(catalog, interner, owner, name, None);
    let step = catalog.declare_synthetic(step_name, true);
    add_protocol_methods(catalog, interner, step, params, modes, elem);
    step
}

/// Lower a concrete iterator definition. `matched` is the list of
/// ancestor obligations the definition's own conformance check consumed;
/// their structural return types are exactly the bridge targets and the
/// step type's supertypes.
pub(crate) fn lower_iterator(
    catalog: &mut TypeCatalog,
    interner: &mut Interner,
    owner: TypeId,
    name: Symbol,
    params: &[TypeId],
    modes: &[ParamMode],
    elem: Option<TypeId>,
    matched: &[MethodId],
    counter: usize,
) -> IterLowering {
    let step_name = step_type_name(catalog, interner, owner, name, Some(counter));
    let step = catalog.declare_synthetic(step_name, false);

    // The step type descends from every distinct ancestor step interface
    // the definition satisfies - computed, never declared in source
    let mut targets = TypeIdVec::new();
    for &obligation in matched {
        if let Some(ancestor_step) = catalog.signature(obligation).return_type
            && !targets.contains(&ancestor_step)
        {
            targets.push(ancestor_step);
        }
    }
    catalog.set_parents(step, targets.clone());

    // State: owner back-reference, position counter, current-value slot
    let owner_field = interner.intern("owner");
    let pos_field = interner.intern("pos");
    catalog.add_field(
        step,
        FieldSlot {
            name: owner_field,
            ty: owner,
            kind: FieldKind::Attr,
            slot: 0,
        },
    );
    catalog.add_field(
        step,
        FieldSlot {
            name: pos_field,
            ty: TypeId::INT,
            kind: FieldKind::Attr,
            slot: 1,
        },
    );
    if let Some(elem_ty) = elem {
        let cur_field = interner.intern("cur");
        catalog.add_field(
            step,
            FieldSlot {
                name: cur_field,
                ty: elem_ty,
                kind: FieldKind::Attr,
                slot: 2,
            },
        );
    }

    let (advance, current) = add_protocol_methods(catalog, interner, step, params, modes, elem);

    // Factory on the declaring class: all declared params (once-mode
    // captured at construction, recorded through the mode side-table)
    let factory = catalog.add_method(MethodSignature {
        owner,
        name,
        params: params.to_vec(),
        return_type: Some(step),
        vis: Visibility::Public,
        is_iter: true,
    });
    record_modes(catalog, factory, modes, 0);
    if let Some(elem_ty) = elem {
        catalog.record_iter_return(factory, elem_ty);
    }

    // One bridge per ancestor step interface, covariantly returning that
    // interface and forwarding to the factory
    let base = interner.resolve(name).to_string();
    let mut bridges = Vec::new();
    for &target in &targets {
        let target_name = interner.resolve(catalog.descriptor(target).name).to_string();
        let bridge_name = interner.intern(&format!("{base}${target_name}"));
        let bridge = catalog.add_method(MethodSignature {
            owner,
            name: bridge_name,
            params: params.to_vec(),
            return_type: Some(target),
            vis: Visibility::Public,
            is_iter: true,
        });
        record_modes(catalog, bridge, modes, 0);
        if let Some(elem_ty) = elem {
            catalog.record_iter_return(bridge, elem_ty);
        }
        catalog.record_source_name(bridge, name);
        bridges.push(bridge);
    }

    IterLowering {
        step_type: step,
        factory,
        advance,
        current,
        bridges,
    }
}

/// `advance` takes the non-once parameters on every call; `current` is
/// synthesized only for value-producing iterators.
fn add_protocol_methods(
    catalog: &mut TypeCatalog,
    interner: &mut Interner,
    step: TypeId,
    params: &[TypeId],
    modes: &[ParamMode],
    elem: Option<TypeId>,
) -> (MethodId, Option<MethodId>) {
    let advance_name = interner.intern("advance");
    let mut advance_params = Vec::new();
    let mut advance_modes: SmallVec<[ParamMode; 4]> = SmallVec::new();
    for (i, &p) in params.iter().enumerate() {
        if modes[i] != ParamMode::Once {
            advance_params.push(p);
            advance_modes.push(modes[i]);
        }
    }
    let advance = catalog.add_method(MethodSignature::public(
        step,
        advance_name,
        advance_params,
        Some(TypeId::BOOL),
    ));
    record_modes(catalog, advance, &advance_modes, 0);

    let current = elem.map(|elem_ty| {
        let current_name = interner.intern("current");
        catalog.add_method(MethodSignature::public(
            step,
            current_name,
            vec![],
            Some(elem_ty),
        ))
    });

    (advance, current)
}

fn record_modes(catalog: &mut TypeCatalog, method: MethodId, modes: &[ParamMode], offset: usize) {
    for (i, &mode) in modes.iter().enumerate() {
        if mode != ParamMode::In {
            catalog.record_arg_mode(method, i + offset, mode);
        }
    }
}

fn step_type_name(
    catalog: &TypeCatalog,
    interner: &mut Interner,
    owner: TypeId,
    name: Symbol,
    counter: Option<usize>,
) -> Symbol {
    let owner_name = interner.resolve(catalog.descriptor(owner).name).to_string();
    let base = interner.resolve(name).to_string();
    match counter {
        Some(n) => interner.intern(&format!("{owner_name}_{base}_step{n}")),
        None => interner.intern(&format!("{owner_name}_{base}_step")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{ClassKind, Interner};
    use crate::sema::foreign::ForeignWorld;

    fn setup() -> (TypeCatalog, Interner) {
        let mut interner = Interner::new();
        let catalog = TypeCatalog::new(ForeignWorld::new(), &mut interner);
        (catalog, interner)
    }

    #[test]
    fn value_producing_iterator_gets_full_protocol() {
        let (mut catalog, mut interner) = setup();
        let class = catalog.declare_class(interner.intern("LIST"), ClassKind::Concrete);
        let elts = interner.intern("elts");

        let lowered = lower_iterator(
            &mut catalog,
            &mut interner,
            class,
            elts,
            &[],
            &[],
            Some(TypeId::INT),
            &[],
            0,
        );

        let factory = catalog.signature(lowered.factory);
        assert!(factory.is_iter);
        assert_eq!(factory.return_type, Some(lowered.step_type));
        assert_eq!(catalog.iter_return(lowered.factory), Some(TypeId::INT));

        let advance = catalog.signature(lowered.advance);
        assert_eq!(advance.owner, lowered.step_type);
        assert_eq!(advance.return_type, Some(TypeId::BOOL));

        let current = catalog.signature(lowered.current.unwrap());
        assert_eq!(current.return_type, Some(TypeId::INT));

        // owner back-reference, position counter, current slot
        assert_eq!(catalog.fields_of(lowered.step_type).len(), 3);
        assert!(lowered.bridges.is_empty());
    }

    #[test]
    fn once_params_stay_off_advance() {
        let (mut catalog, mut interner) = setup();
        let class = catalog.declare_class(interner.intern("GRID"), ClassKind::Concrete);
        let walk = interner.intern("walk");

        let lowered = lower_iterator(
            &mut catalog,
            &mut interner,
            class,
            walk,
            &[TypeId::INT, TypeId::INT],
            &[ParamMode::Once, ParamMode::In],
            None,
            &[],
            0,
        );

        let factory = catalog.signature(lowered.factory);
        assert_eq!(factory.arity(), 2);
        assert_eq!(catalog.arg_mode(lowered.factory, 0), ParamMode::Once);

        let advance = catalog.signature(lowered.advance);
        assert_eq!(advance.arity(), 1);
        assert_eq!(catalog.arg_mode(lowered.advance, 0), ParamMode::In);

        // value-less: no current accessor, no current slot
        assert!(lowered.current.is_none());
        assert_eq!(catalog.fields_of(lowered.step_type).len(), 2);
    }

    #[test]
    fn bridges_cover_each_distinct_ancestor_step_type() {
        let (mut catalog, mut interner) = setup();
        let iface_a = catalog.declare_class(interner.intern("$A"), ClassKind::Abstract);
        let iface_b = catalog.declare_class(interner.intern("$B"), ClassKind::Abstract);
        let class = catalog.declare_class(interner.intern("C"), ClassKind::Concrete);
        let elts = interner.intern("elts");

        let step_a = declare_step_protocol(
            &mut catalog,
            &mut interner,
            iface_a,
            elts,
            &[],
            &[],
            Some(TypeId::INT),
        );
        let step_b = declare_step_protocol(
            &mut catalog,
            &mut interner,
            iface_b,
            elts,
            &[],
            &[],
            Some(TypeId::INT),
        );
        let obl_a = catalog.add_method(MethodSignature {
            owner: iface_a,
            name: elts,
            params: vec![],
            return_type: Some(step_a),
            vis: Visibility::Public,
            is_iter: true,
        });
        catalog.record_iter_return(obl_a, TypeId::INT);
        let obl_b = catalog.add_method(MethodSignature {
            owner: iface_b,
            name: elts,
            params: vec![],
            return_type: Some(step_b),
            vis: Visibility::Public,
            is_iter: true,
        });
        catalog.record_iter_return(obl_b, TypeId::INT);

        let lowered = lower_iterator(
            &mut catalog,
            &mut interner,
            class,
            elts,
            &[],
            &[],
            Some(TypeId::INT),
            &[obl_a, obl_b],
            0,
        );

        assert_eq!(lowered.bridges.len(), 2);
        let returns: Vec<_> = lowered
            .bridges
            .iter()
            .map(|&b| catalog.signature(b).return_type.unwrap())
            .collect();
        assert!(returns.contains(&step_a));
        assert!(returns.contains(&step_b));

        // bridges keep the source-level name through the side-table
        for &b in &lowered.bridges {
            assert_eq!(catalog.source_name(b), elts);
            assert_ne!(catalog.signature(b).name, elts);
        }

        // the step type descends from both ancestor step interfaces
        let ancestors = catalog.ancestors_of(lowered.step_type);
        assert!(ancestors.contains(&step_a));
        assert!(ancestors.contains(&step_b));
    }
}
