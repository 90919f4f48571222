//! Dependency keys: the tagged value identifying a declaration or a
//! file provide/depend, plus its cascading/non-cascading aspect.

use std::cmp::Ordering;
use std::sync::Arc;

/// Whether a change to this key's node should cascade to users
/// (`Interface`) or stay local to the defining file (`Implementation`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Aspect {
    Interface,
    Implementation,
}

impl Aspect {
    fn order_key(self) -> u8 {
        match self {
            Aspect::Interface => 0,
            Aspect::Implementation => 1,
        }
    }
}

impl PartialOrd for Aspect {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Aspect {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

/// The seven closed cases of a dependency designator. A sum type rather
/// than a trait object: the cases are closed and their integer codes
/// must stay stable across the wire format in `dep_graph_codec`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Designator {
    /// A global name.
    TopLevel { name: Arc<str> },
    /// A named type; `context` is the type's mangled name.
    Nominal { context: Arc<str> },
    /// Any member of a type, for open-ended member lookups.
    PotentialMember { context: Arc<str> },
    /// A specific member of a type.
    Member { context: Arc<str>, name: Arc<str> },
    /// A dynamic dispatch site.
    DynamicLookup { name: Arc<str> },
    /// A file outside this build.
    ExternalDepend { path: Arc<str> },
    /// Marker for an entire source file's dependency record.
    SourceFileProvide { name: Arc<str> },
}

/// The stable on-disk code for each designator case (§6). Values occupy
/// `[0, 6]`, fitting the wire format's 3-bit field.
pub const CODE_TOP_LEVEL: u8 = 0;
pub const CODE_NOMINAL: u8 = 1;
pub const CODE_POTENTIAL_MEMBER: u8 = 2;
pub const CODE_MEMBER: u8 = 3;
pub const CODE_DYNAMIC_LOOKUP: u8 = 4;
pub const CODE_EXTERNAL_DEPEND: u8 = 5;
pub const CODE_SOURCE_FILE_PROVIDE: u8 = 6;

impl Designator {
    pub fn code(&self) -> u8 {
        match self {
            Designator::TopLevel { .. } => CODE_TOP_LEVEL,
            Designator::Nominal { .. } => CODE_NOMINAL,
            Designator::PotentialMember { .. } => CODE_POTENTIAL_MEMBER,
            Designator::Member { .. } => CODE_MEMBER,
            Designator::DynamicLookup { .. } => CODE_DYNAMIC_LOOKUP,
            Designator::ExternalDepend { .. } => CODE_EXTERNAL_DEPEND,
            Designator::SourceFileProvide { .. } => CODE_SOURCE_FILE_PROVIDE,
        }
    }

    /// Splits this designator into the wire format's generic
    /// `(context, name)` slots, each empty (`""`) when the case does not
    /// use that slot. See `from_parts` for the inverse and the
    /// emptiness constraints each code enforces.
    pub fn to_parts(&self) -> (Option<&str>, Option<&str>) {
        match self {
            Designator::TopLevel { name } => (None, Some(name)),
            Designator::Nominal { context } => (Some(context), None),
            Designator::PotentialMember { context } => (Some(context), None),
            Designator::Member { context, name } => (Some(context), Some(name)),
            Designator::DynamicLookup { name } => (None, Some(name)),
            Designator::ExternalDepend { path } => (Some(path), None),
            Designator::SourceFileProvide { name } => (None, Some(name)),
        }
    }

    /// Reconstructs a designator from a wire code plus the generic
    /// `(context, name)` slots. Fails if the emptiness constraint for
    /// `code` is violated (e.g. a `TopLevel` record carrying a non-empty
    /// context), or if a slot required by `code` is missing.
    pub fn from_parts(
        code: u8,
        context: Option<&str>,
        name: Option<&str>,
    ) -> Result<Designator, super::error::EngineError> {
        use super::error::EngineError;
        let bad = || EngineError::EmptinessViolation { code };
        match code {
            CODE_TOP_LEVEL => {
                if context.is_some() {
                    return Err(bad());
                }
                Ok(Designator::TopLevel { name: name.ok_or(bad())?.into() })
            }
            CODE_NOMINAL => {
                if name.is_some() {
                    return Err(bad());
                }
                Ok(Designator::Nominal { context: context.ok_or(bad())?.into() })
            }
            CODE_POTENTIAL_MEMBER => {
                if name.is_some() {
                    return Err(bad());
                }
                Ok(Designator::PotentialMember { context: context.ok_or(bad())?.into() })
            }
            CODE_MEMBER => Ok(Designator::Member {
                context: context.ok_or(bad())?.into(),
                name: name.ok_or(bad())?.into(),
            }),
            CODE_DYNAMIC_LOOKUP => {
                if context.is_some() {
                    return Err(bad());
                }
                Ok(Designator::DynamicLookup { name: name.ok_or(bad())?.into() })
            }
            CODE_EXTERNAL_DEPEND => {
                if name.is_some() {
                    return Err(bad());
                }
                Ok(Designator::ExternalDepend { path: context.ok_or(bad())?.into() })
            }
            CODE_SOURCE_FILE_PROVIDE => {
                if context.is_some() {
                    return Err(bad());
                }
                Ok(Designator::SourceFileProvide { name: name.ok_or(bad())?.into() })
            }
            other => Err(EngineError::UnknownDesignatorCode(other)),
        }
    }
}

impl PartialOrd for Designator {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Designator {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code().cmp(&other.code()).then_with(|| self.to_parts().cmp(&other.to_parts()))
    }
}

/// A key has two parts: the cascading `Aspect` and the `Designator` it
/// tags. Totally ordered (aspect first, then designator) so the tracer
/// can walk uses in a deterministic order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DependencyKey {
    pub aspect: Aspect,
    pub designator: Designator,
}

impl DependencyKey {
    pub fn new(aspect: Aspect, designator: Designator) -> Self {
        DependencyKey { aspect, designator }
    }

    pub fn interface(designator: Designator) -> Self {
        DependencyKey::new(Aspect::Interface, designator)
    }

    pub fn implementation(designator: Designator) -> Self {
        DependencyKey::new(Aspect::Implementation, designator)
    }

    /// Convenience constructor for an interface-aspect external dependency key.
    pub fn interface_for(path: impl Into<Arc<str>>) -> Self {
        DependencyKey::interface(Designator::ExternalDepend { path: path.into() })
    }

    /// If this key is interface-aspect, returns the implementation-aspect
    /// key with the same designator; otherwise `None`. Used to derive the
    /// implicit interface→implementation arc (invariant 3, §3).
    pub fn corresponding_implementation(&self) -> Option<DependencyKey> {
        match self.aspect {
            Aspect::Interface => {
                Some(DependencyKey::implementation(self.designator.clone()))
            }
            Aspect::Implementation => None,
        }
    }
}

impl PartialOrd for DependencyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DependencyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.aspect.cmp(&other.aspect).then_with(|| self.designator.cmp(&other.designator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corresponding_implementation_only_for_interface() {
        let iface = DependencyKey::interface(Designator::TopLevel { name: "a".into() });
        let impl_key = iface.corresponding_implementation().unwrap();
        assert_eq!(impl_key.aspect, Aspect::Implementation);
        assert_eq!(impl_key.designator, iface.designator);
        assert!(impl_key.corresponding_implementation().is_none());
    }

    #[test]
    fn parts_round_trip_through_from_parts() {
        let member = Designator::Member { context: "C".into(), name: "m".into() };
        let (context, name) = member.to_parts();
        let rebuilt = Designator::from_parts(member.code(), context, name).unwrap();
        assert_eq!(rebuilt, member);
    }

    #[test]
    fn from_parts_rejects_emptiness_violation() {
        // TopLevel must not carry a context.
        let err = Designator::from_parts(CODE_TOP_LEVEL, Some("bogus"), Some("name"));
        assert!(err.is_err());
    }

    #[test]
    fn ordering_is_aspect_major() {
        let impl_key = DependencyKey::implementation(Designator::TopLevel { name: "a".into() });
        let iface_key = DependencyKey::interface(Designator::TopLevel { name: "z".into() });
        assert!(iface_key < impl_key);
    }
}
