//! Stage inputs: raw documents for `Data`, upstream artifacts afterwards.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::{Artifact, PipelineStage};
use crate::errors::StageExecutionError;

/// A single input document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier, unique within a bundle.
    pub id: String,
    /// The document text.
    pub text: String,
}

impl Document {
    /// Creates a new document.
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// The raw corpus consumed by the `Data` stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBundle {
    /// The documents.
    pub documents: Vec<Document>,
    /// Optional gold labels keyed by document id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

impl DocumentBundle {
    /// Creates a bundle without labels.
    #[must_use]
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            labels: None,
        }
    }

    /// Attaches labels to the bundle.
    #[must_use]
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Returns the number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if the bundle has no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// A provider of input documents, e.g. a remote search index.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Returns a short description used in logs.
    fn describe(&self) -> String;

    /// Fetches the documents.
    async fn fetch(&self) -> Result<DocumentBundle, StageExecutionError>;
}

/// A source that always yields the same bundle.
#[derive(Debug, Clone)]
pub struct StaticDocumentSource {
    bundle: DocumentBundle,
}

impl StaticDocumentSource {
    /// Creates a new static source.
    #[must_use]
    pub fn new(bundle: DocumentBundle) -> Self {
        Self { bundle }
    }
}

#[async_trait]
impl DocumentSource for StaticDocumentSource {
    fn describe(&self) -> String {
        format!("static({} documents)", self.bundle.len())
    }

    async fn fetch(&self) -> Result<DocumentBundle, StageExecutionError> {
        Ok(self.bundle.clone())
    }
}

/// Where the `Data` stage gets its documents from.
#[derive(Clone)]
pub enum InputSource {
    /// Documents supplied with the request.
    Bundle(Arc<DocumentBundle>),
    /// Documents fetched when the `Data` stage actually runs.
    Source(Arc<dyn DocumentSource>),
}

impl InputSource {
    /// Resolves the source into a bundle.
    ///
    /// Fetch failures are attributed to the `Data` stage.
    pub async fn resolve(&self) -> Result<Arc<DocumentBundle>, StageExecutionError> {
        match self {
            Self::Bundle(bundle) => Ok(Arc::clone(bundle)),
            Self::Source(source) => {
                let bundle = source.fetch().await.map_err(|e| {
                    StageExecutionError::new(
                        PipelineStage::Data,
                        format!("fetching documents from {} failed: {}", source.describe(), e.message),
                    )
                })?;
                Ok(Arc::new(bundle))
            }
        }
    }
}

impl From<DocumentBundle> for InputSource {
    fn from(bundle: DocumentBundle) -> Self {
        Self::Bundle(Arc::new(bundle))
    }
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bundle(bundle) => f
                .debug_tuple("Bundle")
                .field(&format_args!("{} documents", bundle.len()))
                .finish(),
            Self::Source(source) => f.debug_tuple("Source").field(&source.describe()).finish(),
        }
    }
}

/// The input handed to a stage's `create`.
#[derive(Debug, Clone)]
pub enum StageInput {
    /// Raw documents, for the `Data` stage.
    Documents(Arc<DocumentBundle>),
    /// The loaded artifact of the upstream stage.
    Upstream(Artifact),
}

impl StageInput {
    /// Returns the documents, if this is a `Data` input.
    #[must_use]
    pub fn documents(&self) -> Option<&DocumentBundle> {
        match self {
            Self::Documents(bundle) => Some(bundle),
            Self::Upstream(_) => None,
        }
    }

    /// Returns the upstream artifact, if any.
    #[must_use]
    pub fn upstream(&self) -> Option<&Artifact> {
        match self {
            Self::Upstream(artifact) => Some(artifact),
            Self::Documents(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSource;

    #[async_trait]
    impl DocumentSource for FailingSource {
        fn describe(&self) -> String {
            "failing".to_string()
        }

        async fn fetch(&self) -> Result<DocumentBundle, StageExecutionError> {
            Err(StageExecutionError::new(PipelineStage::Data, "index unreachable"))
        }
    }

    fn bundle() -> DocumentBundle {
        DocumentBundle::new(vec![
            Document::new("d1", "heart failure"),
            Document::new("d2", "renal failure"),
        ])
    }

    #[tokio::test]
    async fn test_resolve_bundle() {
        let source = InputSource::from(bundle());
        let resolved = source.resolve().await.unwrap();
        assert_eq!(resolved.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_static_source() {
        let source = InputSource::Source(Arc::new(StaticDocumentSource::new(bundle())));
        let resolved = source.resolve().await.unwrap();
        assert_eq!(resolved.documents[1].id, "d2");
    }

    #[tokio::test]
    async fn test_resolve_failure_names_source() {
        let source = InputSource::Source(Arc::new(FailingSource));
        let err = source.resolve().await.unwrap_err();
        assert_eq!(err.stage, PipelineStage::Data);
        assert!(err.message.contains("failing"));
        assert!(err.message.contains("index unreachable"));
    }

    #[test]
    fn test_bundle_labels_roundtrip_through_json() {
        let labels = BTreeMap::from([("d1".to_string(), "cardio".to_string())]);
        let bundle = bundle().with_labels(labels);
        let json = serde_json::to_string(&bundle).unwrap();
        let parsed: DocumentBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, bundle);

        let unlabeled = serde_json::to_value(DocumentBundle::default()).unwrap();
        assert!(unlabeled.get("labels").is_none());
    }

    #[test]
    fn test_stage_input_accessors() {
        let input = StageInput::Documents(Arc::new(bundle()));
        assert!(input.documents().is_some());
        assert!(input.upstream().is_none());
    }
}
