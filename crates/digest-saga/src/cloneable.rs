use std::any::Any;

/// Type-erased value flowing between saga stages.
///
/// Combines `Any` with `Clone` so the engine can fan one value out to
/// several parallel siblings without knowing its concrete type.
pub(crate) trait CloneableAny: Any + Send + Sync {
    /// Clone the value into a new boxed trait object.
    fn clone_box(&self) -> Box<dyn CloneableAny>;

    /// Convert into a boxed `Any` for downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl<T> CloneableAny for T
where
    T: Clone + Send + Sync + 'static,
{
    fn clone_box(&self) -> Box<dyn CloneableAny> {
        Box::new(self.clone())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

/// Downcast an erased stage value back to the type the builder promised.
pub(crate) fn downcast<T: 'static>(value: Box<dyn CloneableAny>) -> T {
    *value
        .into_any()
        .downcast::<T>()
        .expect("type-state builder guarantees stage value types")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_box_creates_independent_copy() {
        let original: Box<dyn CloneableAny> = Box::new(vec![1_u8, 2, 3]);
        let cloned = original.clone_box();

        assert_eq!(downcast::<Vec<u8>>(original), vec![1, 2, 3]);
        assert_eq!(downcast::<Vec<u8>>(cloned), vec![1, 2, 3]);
    }

    #[test]
    fn into_any_returns_error_for_wrong_type() {
        let boxed: Box<dyn CloneableAny> = Box::new(42_i32);
        let result = boxed.into_any().downcast::<String>();
        assert!(result.is_err());
    }
}
