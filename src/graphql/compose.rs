//! Sequential resolver composition.
//!
//! A [`Pipeline`] runs its steps in order. Every step receives the shared
//! input and the value produced by the step before it (`None` for the first
//! step); the value of the last step is the result. The first error stops
//! the pipeline.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;

type Step<I, V> = Arc<dyn Fn(I, Option<V>) -> BoxFuture<'static, Result<V>> + Send + Sync>;

pub struct Pipeline<I, V> {
    steps: Vec<Step<I, V>>,
}

impl<I, V> Clone for Pipeline<I, V> {
    fn clone(&self) -> Self {
        Self {
            steps: self.steps.clone(),
        }
    }
}

impl<I, V> Default for Pipeline<I, V> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<I, V> Pipeline<I, V>
where
    I: Clone + Send + 'static,
    V: Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    pub fn then<F>(mut self, step: F) -> Self
    where
        F: Fn(I, Option<V>) -> BoxFuture<'static, Result<V>> + Send + Sync + 'static,
    {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step; an empty pipeline yields `None`.
    pub async fn run(&self, input: I) -> Result<Option<V>> {
        let mut value = None;
        for step in &self.steps {
            value = Some(step(input.clone(), value.take()).await?);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolverError;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_steps_see_previous_value() {
        let pipeline = Pipeline::<i64, Vec<i64>>::new()
            .then(|input, prev| {
                assert!(prev.is_none());
                async move { Ok(vec![input]) }.boxed()
            })
            .then(|input, prev| {
                async move {
                    let mut values = prev.unwrap_or_default();
                    values.push(input * 10);
                    Ok(values)
                }
                .boxed()
            });

        assert_eq!(pipeline.run(4).await.unwrap(), Some(vec![4, 40]));
    }

    #[tokio::test]
    async fn test_empty_pipeline() {
        let pipeline = Pipeline::<(), i64>::new();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.run(()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_error_short_circuits() {
        let reached = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reached);
        let pipeline = Pipeline::<(), i64>::new()
            .then(|_, _| async { Err(ResolverError::Validation("stop".into())) }.boxed())
            .then(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(1) }.boxed()
            });

        assert!(pipeline.run(()).await.is_err());
        assert_eq!(reached.load(Ordering::SeqCst), 0);
    }
}
