use std::ops::Range;

/// A value, along with the byte range it was parsed from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Located<T> {
    pub inner: T,
    pub location: Range<usize>,
}

pub(crate) trait Locatable: Sized {
    fn with_location(self, location: Range<usize>) -> Located<Self> {
        Located {
            inner: self,
            location,
        }
    }
}

impl<T> Locatable for T {}
