//! Mamba's structural type algebra.
//!
//! Every composite type is stored behind a `TypeId` handle into a process-local
//! `TypeRegistry` arena, so structurally identical types are deduplicated and
//! self-referential (cyclic) object types never require unbounded Rust value
//! recursion to represent. `TypeVariable`s and `TypePlaceholder`s bypass the
//! interning cache: their identity is the point at which they were freshly
//! allocated, not their structural shape, so two placeholders that happen to
//! share a name (e.g. `T` declared in two unrelated generics) remain distinct.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(usize);

impl TypeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// A named nullary type, e.g. `Int`, or a generic's own declaration such
    /// as `List` with its placeholder names (never carries bound type args:
    /// see SPEC_FULL.md §9 on this corner's deliberate incompleteness).
    Ground {
        name: String,
        placeholders: Vec<String>,
    },
    /// An inference unknown. The payload is only a human-readable ordinal;
    /// identity is the owning `TypeId`, never the payload.
    Variable(u64),
    /// A named slot bound inside a declaration's inner scope.
    Placeholder(String),
    /// Wraps a type declaration's target; never transits in constraints
    /// directly (only `subject` does).
    Alias { subject: TypeId },
    /// An ordered structural mapping from property name to type.
    Object {
        properties: Vec<(String, TypeId)>,
        placeholders: Vec<String>,
    },
    Function {
        domain: TypeId,
        codomain: TypeId,
        placeholders: Vec<String>,
    },
    Union { members: Vec<TypeId> },
}

impl Type {
    pub fn placeholders(&self) -> &[String] {
        match self {
            Type::Ground { placeholders, .. }
            | Type::Object { placeholders, .. }
            | Type::Function { placeholders, .. } => placeholders,
            Type::Variable(_) | Type::Placeholder(_) | Type::Alias { .. } | Type::Union { .. } => {
                &[]
            }
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Type::Ground { .. } => "Ground",
            Type::Variable(_) => "Variable",
            Type::Placeholder(_) => "Placeholder",
            Type::Alias { .. } => "Alias",
            Type::Object { .. } => "Object",
            Type::Function { .. } => "Function",
            Type::Union { .. } => "Union",
        }
    }
}

/// Central type storage with interning, mirroring the `TypeRegistry` pattern
/// used elsewhere in this crate for AST/string arenas.
pub struct TypeRegistry {
    types: Vec<Type>,
    cache: HashMap<Type, TypeId>,
    next_var: u64,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            types: Vec::new(),
            cache: HashMap::new(),
            next_var: 0,
        }
    }

    fn push_uncached(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len());
        self.types.push(ty);
        id
    }

    /// Interns a structural type, deduplicating on value equality.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.cache.get(&ty) {
            return id;
        }
        let id = TypeId(self.types.len());
        self.types.push(ty.clone());
        self.cache.insert(ty, id);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0]
    }

    /// Alias for `get`, kept for consistency with inference-code terminology.
    pub fn resolve(&self, id: TypeId) -> &Type {
        self.get(id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn fresh_variable(&mut self) -> TypeId {
        let ordinal = self.next_var;
        self.next_var += 1;
        self.push_uncached(Type::Variable(ordinal))
    }

    pub fn fresh_placeholder(&mut self, name: impl Into<String>) -> TypeId {
        self.push_uncached(Type::Placeholder(name.into()))
    }

    pub fn ground(&mut self, name: impl Into<String>) -> TypeId {
        self.intern(Type::Ground {
            name: name.into(),
            placeholders: Vec::new(),
        })
    }

    pub fn ground_generic(&mut self, name: impl Into<String>, placeholders: Vec<String>) -> TypeId {
        self.intern(Type::Ground {
            name: name.into(),
            placeholders,
        })
    }

    pub fn alias(&mut self, subject: TypeId) -> TypeId {
        self.intern(Type::Alias { subject })
    }

    pub fn object(&mut self, properties: Vec<(String, TypeId)>) -> TypeId {
        self.intern(Type::Object {
            properties,
            placeholders: Vec::new(),
        })
    }

    pub fn object_generic(
        &mut self,
        properties: Vec<(String, TypeId)>,
        placeholders: Vec<String>,
    ) -> TypeId {
        self.intern(Type::Object {
            properties,
            placeholders,
        })
    }

    pub fn function(&mut self, domain: TypeId, codomain: TypeId, placeholders: Vec<String>) -> TypeId {
        self.intern(Type::Function {
            domain,
            codomain,
            placeholders,
        })
    }

    pub fn union(&mut self, members: Vec<TypeId>) -> TypeId {
        self.intern(Type::Union { members })
    }

    /// Human-readable debug rendering, memoized on object types to tolerate
    /// cycles the same way `deep_walk` does.
    pub fn describe(&self, id: TypeId) -> String {
        let mut memo = HashSet::new();
        self.describe_inner(id, &mut memo)
    }

    fn describe_inner(&self, id: TypeId, memo: &mut HashSet<TypeId>) -> String {
        match self.get(id) {
            Type::Ground { name, placeholders } => {
                if placeholders.is_empty() {
                    name.clone()
                } else {
                    format!("[ {} ]{}", placeholders.join(", "), name)
                }
            }
            Type::Variable(n) => format!("__{}", n),
            Type::Placeholder(name) => name.clone(),
            Type::Alias { subject } => format!("~{}", self.describe_inner(*subject, memo)),
            Type::Object {
                properties,
                placeholders,
            } => {
                let ph = if placeholders.is_empty() {
                    String::new()
                } else {
                    format!("[ {} ]", placeholders.join(", "))
                };
                if !memo.insert(id) {
                    return format!("{}{{ ... }}", ph);
                }
                let props: Vec<String> = properties
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, self.describe_inner(*v, memo)))
                    .collect();
                format!("{}{{ {} }}", ph, props.join(", "))
            }
            Type::Function {
                domain,
                codomain,
                placeholders,
            } => {
                let ph = if placeholders.is_empty() {
                    String::new()
                } else {
                    format!("[ {} ]", placeholders.join(", "))
                };
                format!(
                    "{}{} -> {}",
                    ph,
                    self.describe_inner(*domain, memo),
                    self.describe_inner(*codomain, memo)
                )
            }
            Type::Union { members } => members
                .iter()
                .map(|m| self.describe_inner(*m, memo))
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Returned when `specialize` cannot reconcile a placeholder's two observed
/// bindings, or when the generic/pattern shapes do not match structurally.
#[derive(Debug, Clone, Copy)]
pub struct SpecializationError;

/// Structural, memoized substitution: obtains `generic` from `pattern` by
/// consistently substituting `generic`'s placeholders. Mirrors
/// `mamba.sema.types.specialize` (and the solver's internal copy of the same
/// function) exactly, including which shapes are left unhandled (SPEC_FULL.md
/// §4.5): only `TypePlaceholder`, `TypeVariable` (on either side), and
/// `FunctionType` pairs are recognized; anything else fails unless the two
/// sides are already the same `TypeId`.
pub fn specialize(
    types: &mut TypeRegistry,
    generic: TypeId,
    pattern: TypeId,
    memo: &mut HashMap<TypeId, TypeId>,
) -> Result<TypeId, SpecializationError> {
    if generic == pattern {
        return Ok(generic);
    }
    if let Some(&bound) = memo.get(&generic) {
        return Ok(bound);
    }
    if matches!(types.get(generic), Type::Placeholder(_)) {
        memo.insert(generic, pattern);
        return Ok(pattern);
    }
    if matches!(types.get(generic), Type::Variable(_)) || matches!(types.get(pattern), Type::Variable(_))
    {
        return Ok(generic);
    }
    if let (
        Type::Function {
            domain: gd,
            codomain: gc,
            ..
        },
        Type::Function {
            domain: pd,
            codomain: pc,
            ..
        },
    ) = (types.get(generic).clone(), types.get(pattern).clone())
    {
        let domain = specialize(types, gd, pd, memo)?;
        let codomain = specialize(types, gc, pc, memo)?;
        return Ok(types.function(domain, codomain, Vec::new()));
    }
    Err(SpecializationError)
}

/// Substitutes `target`'s placeholders by explicit name (or the `_0` sugar,
/// resolved to a name by the caller), used by the signature visitor's
/// `Identifier` specialization path. Distinct from `specialize` above: that
/// function derives a substitution from structural pattern-matching against
/// another type, while this one applies an already-known name -> type mapping
/// directly. Declared placeholders without a corresponding entry in `args`
/// remain declared (partial specialization) on the result.
pub fn specialize_with_args(
    types: &mut TypeRegistry,
    target: TypeId,
    args: &HashMap<String, TypeId>,
) -> TypeId {
    match types.get(target).clone() {
        Type::Placeholder(name) => args.get(&name).copied().unwrap_or(target),
        Type::Alias { subject } => {
            let substituted = specialize_with_args(types, subject, args);
            types.alias(substituted)
        }
        Type::Object {
            properties,
            placeholders,
        } => {
            let new_properties: Vec<(String, TypeId)> = properties
                .into_iter()
                .map(|(name, prop_ty)| (name, specialize_with_args(types, prop_ty, args)))
                .collect();
            let remaining: Vec<String> = placeholders
                .into_iter()
                .filter(|p| !args.contains_key(p))
                .collect();
            types.object_generic(new_properties, remaining)
        }
        Type::Function {
            domain,
            codomain,
            placeholders,
        } => {
            let domain = specialize_with_args(types, domain, args);
            let codomain = specialize_with_args(types, codomain, args);
            let remaining: Vec<String> = placeholders
                .into_iter()
                .filter(|p| !args.contains_key(p))
                .collect();
            types.function(domain, codomain, remaining)
        }
        Type::Union { members } => {
            let new_members: Vec<TypeId> = members
                .into_iter()
                .map(|m| specialize_with_args(types, m, args))
                .collect();
            types.union(new_members)
        }
        Type::Ground { .. } | Type::Variable(_) => target,
    }
}
