//! Copying a value vs. aliasing a reference.
//!
//! A `Clone` struct gives the copy its own storage; an `Rc<RefCell<_>>`
//! handle gives two names for one object, so a write through either is seen
//! through both.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ObjectKind {
    Value,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoObject {
    pub name: String,
}

impl Default for DemoObject {
    fn default() -> Self {
        Self {
            name: "hello".to_string(),
        }
    }
}

/// Shared handle: cloning it clones the pointer, not the object.
pub type SharedObject = Rc<RefCell<DemoObject>>;

/// Makes `obj2` from `obj1`, renames `obj2`, and returns both names.
pub fn copy_then_rename(kind: ObjectKind, new_name: &str) -> (String, String) {
    let names = match kind {
        ObjectKind::Value => {
            let obj1 = DemoObject::default();
            let mut obj2 = obj1.clone();
            obj2.name = new_name.to_string();
            (obj1.name, obj2.name)
        }
        ObjectKind::Reference => {
            let obj1: SharedObject = Rc::new(RefCell::new(DemoObject::default()));
            let obj2 = Rc::clone(&obj1);
            obj2.borrow_mut().name = new_name.to_string();
            let first = obj1.borrow().name.clone();
            let second = obj2.borrow().name.clone();
            (first, second)
        }
    };
    debug!(?kind, first = %names.0, second = %names.1, "copy semantics");
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_copy_is_independent() {
        let (first, second) = copy_then_rename(ObjectKind::Value, "what");
        assert_eq!(format!("{first} {second}"), "hello what");
    }

    #[test]
    fn test_reference_copy_aliases() {
        let (first, second) = copy_then_rename(ObjectKind::Reference, "what");
        assert_eq!(format!("{first} {second}"), "what what");
    }

    #[test]
    fn test_reference_clone_shares_count() {
        let obj1: SharedObject = Rc::new(RefCell::new(DemoObject::default()));
        let obj2 = Rc::clone(&obj1);
        assert_eq!(Rc::strong_count(&obj1), 2);
        assert!(Rc::ptr_eq(&obj1, &obj2));
    }
}
