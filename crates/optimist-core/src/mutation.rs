//! Mutations
//!
//! A mutation is a pure function from one snapshot to the next. It may also
//! receive the payload an asynchronous operation settled with, so a
//! confirmed write can adopt the server's version of the value.

use std::fmt;
use std::sync::Arc;

use crate::{Batch, Document, OptimistResult};

type ApplyFn<S, P> = dyn Fn(S, Option<&P>) -> S + Send + Sync;

/// Shareable snapshot transition
pub struct Mutation<S, P> {
    apply: Arc<ApplyFn<S, P>>,
}

impl<S, P> Mutation<S, P> {
    /// Mutation that sees the settlement payload (if any)
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(S, Option<&P>) -> S + Send + Sync + 'static,
    {
        Mutation { apply: Arc::new(f) }
    }

    /// Mutation that ignores the settlement payload
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(S) -> S + Send + Sync + 'static,
        S: 'static,
        P: 'static,
    {
        Mutation::new(move |snapshot, _| f(snapshot))
    }

    #[inline]
    pub fn apply(&self, snapshot: S, payload: Option<&P>) -> S {
        (self.apply)(snapshot, payload)
    }
}

impl<S, P> Clone for Mutation<S, P> {
    fn clone(&self) -> Self {
        Mutation {
            apply: Arc::clone(&self.apply),
        }
    }
}

impl<S, P> fmt::Debug for Mutation<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation").finish_non_exhaustive()
    }
}

/// Anything the engine can turn into a mutation
pub trait IntoMutation<S, P> {
    fn into_mutation(self) -> OptimistResult<Mutation<S, P>>;
}

impl<S, P> IntoMutation<S, P> for Mutation<S, P> {
    fn into_mutation(self) -> OptimistResult<Mutation<S, P>> {
        Ok(self)
    }
}

impl<P: 'static> IntoMutation<Document, P> for Batch {
    fn into_mutation(self) -> OptimistResult<Mutation<Document, P>> {
        self.validate()?;
        Ok(Mutation::from_fn(move |doc: Document| doc.apply_batch(&self)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Node, OptimistError, Snapshot};
    use serde_json::{json, Value};

    #[test]
    fn test_payload_reaches_mutation() {
        let m: Mutation<Document, Value> = Mutation::new(|doc: Document, payload: Option<&Value>| {
            let title = payload.and_then(Value::as_str).unwrap_or("goodbye");
            doc.set("test", title)
        });

        let doc = Document::from_plain(&json!({ "test": "hello" }));
        let guessed = m.apply(doc.clone(), None);
        let confirmed = m.apply(doc, Some(&json!("ADIOS!")));

        assert_eq!(guessed.get("test").and_then(Node::as_str), Some("goodbye"));
        assert_eq!(confirmed.get("test").and_then(Node::as_str), Some("ADIOS!"));
    }

    #[test]
    fn test_batch_into_mutation() {
        let batch = Batch::new().set(vec!["a".into()], 2);
        let m: Mutation<Document, Value> = batch.into_mutation().unwrap();
        let doc = m.apply(Document::new(), None);
        assert_eq!(doc.to_plain(), json!({ "a": 2 }));
    }

    #[test]
    fn test_invalid_batch_is_rejected() {
        let batch = Batch::new().set(Vec::new(), 2);
        let err = IntoMutation::<Document, Value>::into_mutation(batch).unwrap_err();
        assert!(matches!(err, OptimistError::InvalidMutation(_)));
    }
}
