//! Per-shell handles and the arena that owns curves and surfaces.
//!
//! Handles are small integers allocated monotonically by an [`IdList`]. They are
//! stable for the lifetime of the list and carry no meaning in any other shell.

use serde::{Deserialize, Serialize};

pub trait Handle: Copy + Eq + Ord + std::hash::Hash + std::fmt::Debug {
    fn from_raw(raw: u32) -> Self;
    fn raw(self) -> u32;
}

/// Implemented by items that live in an [`IdList`] and remember their handle.
pub trait HasHandle {
    type H: Handle;

    fn handle(&self) -> Self::H;
    fn set_handle(&mut self, h: Self::H);
}

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl Handle for $name {
            fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            fn raw(self) -> u32 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

define_handle!(
    /// Handle of a [`ShellCurve`](super::curve::ShellCurve) within one shell.
    CurveHandle
);
define_handle!(
    /// Handle of a [`BezierSurface`](super::surface::BezierSurface) within one shell.
    SurfaceHandle
);

/// Arena of items keyed by monotonically allocated handles.
///
/// Items are kept sorted by handle, so lookups are a binary search and iteration
/// order is allocation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdList<T> {
    items: Vec<T>,
    next: u32,
}

impl<T> Default for IdList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next: 1,
        }
    }
}

impl<T: HasHandle> IdList<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `item` under a freshly allocated handle and return that handle.
    pub fn add_and_assign_id(&mut self, mut item: T) -> T::H {
        let h = T::H::from_raw(self.next);
        self.next += 1;
        item.set_handle(h);
        self.items.push(item);
        h
    }

    #[must_use]
    pub fn find(&self, h: T::H) -> Option<&T> {
        self.position(h).map(|i| &self.items[i])
    }

    #[must_use]
    pub fn find_mut(&mut self, h: T::H) -> Option<&mut T> {
        self.position(h).map(move |i| &mut self.items[i])
    }

    /// Remove and return the item stored under `h`.
    pub fn remove(&mut self, h: T::H) -> Option<T> {
        self.position(h).map(|i| self.items.remove(i))
    }

    fn position(&self, h: T::H) -> Option<usize> {
        self.items.binary_search_by(|it| it.handle().cmp(&h)).ok()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Drop every item. Handles keep counting up so stale handles never alias.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<'a, T: HasHandle> IntoIterator for &'a IdList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Item {
        h: CurveHandle,
        value: i32,
    }

    impl HasHandle for Item {
        type H = CurveHandle;

        fn handle(&self) -> CurveHandle {
            self.h
        }

        fn set_handle(&mut self, h: CurveHandle) {
            self.h = h;
        }
    }

    fn item(value: i32) -> Item {
        Item {
            h: CurveHandle::default(),
            value,
        }
    }

    #[test]
    fn handles_are_monotonic_and_findable() {
        let mut list = IdList::new();
        let a = list.add_and_assign_id(item(10));
        let b = list.add_and_assign_id(item(20));
        assert!(b > a);
        assert_eq!(list.find(a).map(|i| i.value), Some(10));
        assert_eq!(list.find(b).map(|i| i.value), Some(20));
        assert!(list.find(CurveHandle(999)).is_none());
    }

    #[test]
    fn cleared_handles_are_not_reused() {
        let mut list = IdList::new();
        let a = list.add_and_assign_id(item(1));
        list.clear();
        assert!(list.is_empty());
        let b = list.add_and_assign_id(item(2));
        assert_ne!(a, b);
        assert!(list.find(a).is_none());
    }

    #[test]
    fn remove_keeps_remaining_items_searchable() {
        let mut list = IdList::new();
        let a = list.add_and_assign_id(item(1));
        let b = list.add_and_assign_id(item(2));
        let c = list.add_and_assign_id(item(3));
        assert_eq!(list.remove(b).map(|i| i.value), Some(2));
        assert_eq!(list.find(a).map(|i| i.value), Some(1));
        assert_eq!(list.find(c).map(|i| i.value), Some(3));
        assert_eq!(list.len(), 2);
    }
}
