/// Anything that can be parked in a [`ScopedResources`] list.
///
/// Every type qualifies; releasing a resource means dropping it.
pub trait Resource {
    /// Address of the value inside its box.
    fn addr(&mut self) -> *mut ();
}

impl<T> Resource for T {
    fn addr(&mut self) -> *mut () {
        (self as *mut T).cast()
    }
}

/// An ordered set of resources released together, last acquired first, when the
/// list goes out of scope.
///
/// Each resource is boxed, so its heap address is fixed from [`ScopedResources::add`]
/// until the list is dropped. Callers rely on this to hand pointers to buffers
/// (security descriptors, attribute values) to the OS for the duration of a call.
#[derive(Default)]
pub struct ScopedResources<'a> {
    items: Vec<Box<dyn Resource + 'a>>,
}

impl<'a> ScopedResources<'a> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Takes ownership of `resource` and returns a reference to it at its final address.
    pub fn add<T: 'a>(&mut self, resource: T) -> &mut T {
        self.items.push(Box::new(resource));
        let last = self.items.len() - 1;

        // Taken through the trait object after the box was stored, so it names the
        // boxed value (not the box) and no later move of the box invalidates it.
        let item: &mut (dyn Resource + 'a) = &mut *self.items[last];
        let ptr = Resource::addr(item).cast::<T>();
        unsafe { &mut *ptr }
    }

    /// Number of resources held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Checks if the list holds nothing.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Releases everything now, in reverse acquisition order.
    pub fn release(&mut self) {
        while let Some(item) = self.items.pop() {
            drop(item);
        }
    }
}

impl Drop for ScopedResources<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl core::fmt::Debug for ScopedResources<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScopedResources")
            .field("len", &self.items.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Tracked<'a> {
        id: u32,
        log: &'a RefCell<Vec<u32>>,
    }

    impl Drop for Tracked<'_> {
        fn drop(&mut self) {
            self.log.borrow_mut().push(self.id);
        }
    }

    #[test]
    fn releases_in_reverse_order_on_drop() {
        let log = RefCell::new(Vec::new());
        {
            let mut resources = ScopedResources::new();
            for id in 1..=3 {
                resources.add(Tracked { id, log: &log });
            }
            assert_eq!(resources.len(), 3);
        }
        assert_eq!(*log.borrow(), vec![3, 2, 1]);
    }

    #[test]
    fn explicit_release_empties_the_list_once() {
        let log = RefCell::new(Vec::new());
        let mut resources = ScopedResources::new();
        resources.add(Tracked { id: 7, log: &log });
        resources.release();
        assert!(resources.is_empty());
        drop(resources);
        assert_eq!(*log.borrow(), vec![7]);
    }

    #[test]
    fn added_buffers_keep_their_address() {
        let mut resources = ScopedResources::new();
        let first = resources.add(vec![1u8, 2, 3]).as_ptr();
        for _ in 0..64 {
            resources.add(vec![0u8; 16]);
        }
        let second = resources.add(vec![9u8]).as_ptr();
        assert_ne!(first, second);
        assert_eq!(unsafe { *first.add(2) }, 3);
    }

    #[test]
    fn writes_through_the_returned_reference_reach_the_stored_value() {
        let log = RefCell::new(Vec::new());
        let mut resources = ScopedResources::new();
        resources.add(Tracked { id: 1, log: &log }).id = 10;
        let second: *mut Tracked<'_> = resources.add(Tracked { id: 2, log: &log });
        resources.add(Tracked { id: 3, log: &log });
        unsafe { (*second).id = 20 };

        resources.release();
        assert_eq!(*log.borrow(), vec![3, 20, 10]);
    }
}
