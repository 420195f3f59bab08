/// Trait for types that can be merged with overriding values
pub trait Merge<T = Self> {
    /// Merge self with another instance, with the other instance taking precedence
    /// for any field it sets
    fn merge(&self, other: &T) -> Self
    where
        Self: Sized;
}
