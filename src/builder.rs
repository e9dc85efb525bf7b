//! A module providing builders for constructing trees and nodes.
//!
//! The `NodeBuilder` and `TreeBuilder` types enable building tree structures
//! in a composable way, nesting a closure per level so a caller can build a
//! tree top-down while only ever holding a reference to the node it's
//! currently populating.

use tracing::{debug, debug_span};

use crate::arena::{Fragment, Tree};

/// A builder for constructing children of a parent node.
///
/// Designed to be used from within a [`TreeBuilder::root`] or
/// [`NodeBuilder::child`] closure.
pub struct NodeBuilder<D> {
    children: Vec<Fragment<D>>,
}

impl<D: Clone + std::fmt::Debug> NodeBuilder<D> {
    fn new() -> Self {
        Self {
            children: Vec::new(),
        }
    }

    /// Adds a child to the current node.
    ///
    /// # Arguments
    ///
    /// * `data`: the payload of the child node.
    /// * `f`: a closure that takes the child builder and adds its own children.
    pub fn child<F, E>(&mut self, data: D, f: F) -> Result<(), E>
    where
        F: FnOnce(&mut NodeBuilder<D>) -> Result<(), E>,
    {
        let mut builder = NodeBuilder::new();
        f(&mut builder)?;
        debug!("Added child node");
        self.children.push(Fragment {
            payload: data,
            children: builder.children,
        });
        Ok(())
    }
}

/// A builder for constructing a whole [`Tree`].
///
/// ```
/// use corymb::TreeBuilder;
///
/// #[derive(Debug)]
/// enum MyError {}
///
/// let tree = TreeBuilder::<String, MyError>::new()
///     .root("root".to_string(), |root| {
///         root.child("child".to_string(), |_| Ok(()))?;
///         Ok(())
///     })
///     .unwrap()
///     .done();
/// assert!(tree.is_some());
/// ```
#[derive(Debug, Default)]
pub struct TreeBuilder<D, E> {
    root: Option<Fragment<D>>,
    _error: std::marker::PhantomData<E>,
}

impl<D: Clone + std::fmt::Debug, E> TreeBuilder<D, E> {
    pub fn new() -> Self {
        debug_span!("TreeBuilder").in_scope(|| debug!("Created new TreeBuilder"));
        Self {
            root: None,
            _error: std::marker::PhantomData,
        }
    }

    /// Adds the root node and returns the updated builder. Only one root
    /// may be set; calling this twice panics.
    pub fn root<F>(mut self, data: D, f: F) -> Result<Self, E>
    where
        F: FnOnce(&mut NodeBuilder<D>) -> Result<(), E>,
    {
        let mut builder = NodeBuilder::new();
        f(&mut builder)?;

        if self.root.is_some() {
            panic!("Root node already exists");
        }

        debug!("Added root node");
        self.root = Some(Fragment {
            payload: data,
            children: builder.children,
        });
        Ok(self)
    }

    /// Returns the constructed tree when finished building it.
    pub fn done(self) -> Option<Tree<D>> {
        self.root.map(Tree::from_fragment)
    }
}

#[cfg(test)]
mod tests {
    use tracing::info;
    use tracing_test::traced_test;

    use super::*;

    #[traced_test]
    #[test]
    fn test_builder() {
        #[derive(Debug)]
        #[allow(unused)]
        enum TestError {
            Fail(String),
        }

        let tree = TreeBuilder::<String, TestError>::new()
            .root("Foo".into(), |foo| {
                foo.child("Bar".into(), |bar| {
                    bar.child("Baz".into(), |_| Ok(()))
                })?;
                foo.child("Hello".into(), |_| Ok(()))?;
                Ok(())
            })
            .unwrap()
            .done();

        info!("{tree:#?}");
        let tree = tree.unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.children(tree.root()).len(), 2);
    }
}
