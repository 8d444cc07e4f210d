use std::ops::Deref;
use std::sync::Arc;

/// Reference-counted handle to an intermediate field.
///
/// Several consumers may share one temporary; mutation goes through
/// [`Tmp::make_mut`], which works in place while the handle is unique and
/// copies otherwise.
#[derive(Debug)]
pub struct Tmp<F>(Arc<F>);

impl<F: Clone> Tmp<F> {
    pub fn new(value: F) -> Self {
        Self(Arc::new(value))
    }

    pub fn share(&self) -> Self {
        self.clone()
    }

    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.0) == 1
    }

    pub fn make_mut(&mut self) -> &mut F {
        Arc::make_mut(&mut self.0)
    }

    /// Takes the value out, copying only if other handles still exist.
    pub fn into_owned(self) -> F {
        Arc::try_unwrap(self.0).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl<F> Clone for Tmp<F> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<F> Deref for Tmp<F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.0
    }
}

impl<F: Clone> From<F> for Tmp<F> {
    fn from(value: F) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_handles_are_reused() {
        let mut t = Tmp::new(vec![1.0, 2.0]);
        let before = t.as_ptr();
        t.make_mut()[0] = 5.0;
        assert_eq!(t.as_ptr(), before);
        assert_eq!(t.into_owned(), vec![5.0, 2.0]);
    }

    #[test]
    fn shared_handles_copy_on_write() {
        let a = Tmp::new(vec![1.0]);
        let mut b = a.share();
        assert!(!a.is_unique());
        b.make_mut()[0] = 2.0;
        assert_eq!(a[0], 1.0);
        assert_eq!(b[0], 2.0);
        assert!(a.is_unique());
    }
}
