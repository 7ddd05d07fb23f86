//! The enrollment: labeled embeddings known to the matcher.

use crate::types::Embedding;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum EnrollmentError {
    #[error("embedding for {label:?} has {actual} dimensions, enrollment holds {expected}")]
    DimensionMismatch {
        label: String,
        expected: usize,
        actual: usize,
    },
    #[error("embedding for {0:?} is empty")]
    EmptyEmbedding(String),
}

/// All embeddings enrolled for one person.
#[derive(Debug, Clone)]
pub struct EnrolledIdentity {
    pub label: String,
    pub embeddings: Vec<Embedding>,
}

/// Insertion-ordered mapping from identity label to its embeddings.
///
/// Every embedding has the same dimensionality. Identities keep the order in
/// which their label was first inserted, and embeddings keep their insertion
/// order within an identity, so a linear scan is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Enrollment {
    identities: Vec<EnrolledIdentity>,
}

impl Enrollment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `embedding` to `label`, creating the identity on first use.
    pub fn insert(&mut self, label: &str, embedding: Embedding) -> Result<(), EnrollmentError> {
        if embedding.values.is_empty() {
            return Err(EnrollmentError::EmptyEmbedding(label.to_string()));
        }
        if let Some(expected) = self.dim() {
            if embedding.dim() != expected {
                return Err(EnrollmentError::DimensionMismatch {
                    label: label.to_string(),
                    expected,
                    actual: embedding.dim(),
                });
            }
        }

        match self.identities.iter_mut().find(|i| i.label == label) {
            Some(identity) => identity.embeddings.push(embedding),
            None => self.identities.push(EnrolledIdentity {
                label: label.to_string(),
                embeddings: vec![embedding],
            }),
        }
        Ok(())
    }

    /// Embeddings enrolled for `label`.
    pub fn get(&self, label: &str) -> Option<&[Embedding]> {
        self.identities
            .iter()
            .find(|i| i.label == label)
            .map(|i| i.embeddings.as_slice())
    }

    pub fn identities(&self) -> &[EnrolledIdentity] {
        &self.identities
    }

    /// Labels in insertion order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.identities.iter().map(|i| i.label.as_str())
    }

    /// Every `(label, embedding)` pair in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Embedding)> {
        self.identities
            .iter()
            .flat_map(|i| i.embeddings.iter().map(move |e| (i.label.as_str(), e)))
    }

    /// Number of identities.
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Total number of embeddings across all identities.
    pub fn embedding_count(&self) -> usize {
        self.identities.iter().map(|i| i.embeddings.len()).sum()
    }

    /// Dimensionality shared by all embeddings, `None` while empty.
    pub fn dim(&self) -> Option<usize> {
        self.identities
            .first()
            .and_then(|i| i.embeddings.first())
            .map(Embedding::dim)
    }
}
