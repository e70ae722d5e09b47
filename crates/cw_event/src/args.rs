use core::any::TypeId;
use core::hash::{BuildHasher, Hash, Hasher};

use cw_utils::hash::FixedHashState;

// -----------------------------------------------------------------------------
// EventArgs

/// An argument tuple an event can be emitted with.
///
/// Implemented for tuples of up to eight elements whose members are
/// `Clone + Send + 'static` — each dispatched handler receives its own clone
/// of the arguments. [`signature`](Self::signature) condenses the element
/// types into the hash that distinguishes same-named events with different
/// parameter lists. The hash is computed from [`TypeId`]s, so it is only
/// meaningful within one process run.
pub trait EventArgs: Clone + Send + 'static {
    /// A process-stable hash of the tuple's element types.
    fn signature() -> u64;
}

// -----------------------------------------------------------------------------
// EventHandler

/// A callback registrable for events carrying the argument tuple `A`.
///
/// Blanket-implemented for closures and functions whose parameter list
/// matches `A` element for element and whose return type is `()` — a
/// handler with the wrong arity, types, or a non-unit return simply does not
/// satisfy the bound.
pub trait EventHandler<A: EventArgs>: Send + Sync + 'static {
    /// Calls the handler with one set of event arguments.
    fn invoke(&self, args: A);
}

impl EventArgs for () {
    fn signature() -> u64 {
        FixedHashState.build_hasher().finish()
    }
}

impl<Func> EventHandler<()> for Func
where
    Func: Fn() + Send + Sync + 'static,
{
    fn invoke(&self, (): ()) {
        self();
    }
}

macro_rules! impl_event_args {
    ($(($param:ident, $index:tt)),+) => {
        impl<$($param: Clone + Send + 'static),+> EventArgs for ($($param,)+) {
            fn signature() -> u64 {
                let mut hasher = FixedHashState.build_hasher();
                $(TypeId::of::<$param>().hash(&mut hasher);)+
                hasher.finish()
            }
        }

        impl<Func, $($param: Clone + Send + 'static),+> EventHandler<($($param,)+)> for Func
        where
            Func: Fn($($param),+) + Send + Sync + 'static,
        {
            fn invoke(&self, args: ($($param,)+)) {
                self($(args.$index),+);
            }
        }
    };
}

impl_event_args!((A0, 0));
impl_event_args!((A0, 0), (A1, 1));
impl_event_args!((A0, 0), (A1, 1), (A2, 2));
impl_event_args!((A0, 0), (A1, 1), (A2, 2), (A3, 3));
impl_event_args!((A0, 0), (A1, 1), (A2, 2), (A3, 3), (A4, 4));
impl_event_args!((A0, 0), (A1, 1), (A2, 2), (A3, 3), (A4, 4), (A5, 5));
impl_event_args!((A0, 0), (A1, 1), (A2, 2), (A3, 3), (A4, 4), (A5, 5), (A6, 6));
impl_event_args!((A0, 0), (A1, 1), (A2, 2), (A3, 3), (A4, 4), (A5, 5), (A6, 6), (A7, 7));

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{EventArgs, EventHandler};

    #[test]
    fn signatures_are_stable_per_tuple() {
        assert_eq!(<(i32,)>::signature(), <(i32,)>::signature());
        assert_eq!(<()>::signature(), <()>::signature());
    }

    #[test]
    fn signatures_distinguish_element_types() {
        assert_ne!(<(i32,)>::signature(), <(u32,)>::signature());
        assert_ne!(<(i32,)>::signature(), <(String,)>::signature());
        assert_ne!(<(i32, i32)>::signature(), <(i32,)>::signature());
        assert_ne!(<(i32, String)>::signature(), <(String, i32)>::signature());
        assert_ne!(<()>::signature(), <(i32,)>::signature());
    }

    #[test]
    fn handlers_receive_destructured_tuples() {
        use std::sync::atomic::{AtomicI64, Ordering};
        static SUM: AtomicI64 = AtomicI64::new(0);

        let handler = |a: i32, b: i32| {
            SUM.fetch_add(i64::from(a + b), Ordering::AcqRel);
        };
        handler.invoke((20, 22));
        assert_eq!(SUM.load(Ordering::Acquire), 42);
    }
}
