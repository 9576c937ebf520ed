use thiserror::Error;

use crate::geometry::GeometryError;
use crate::object_catalog::CatalogError;
use crate::providers::ProviderError;
use crate::sql_compiler::CompileError;
use crate::store::StoreError;

/// Caller-facing classification of a federation failure. The
/// coordinator keys its fallback decisions on this, and the HTTP layer
/// keys status codes on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Problem in the caller's own input. Surfaced with its message,
    /// never retried, never absorbed into a partial result.
    UserFriendly,
    /// Transient upstream trouble. The only kind eligible for cache
    /// fallback.
    Environmental,
    /// Schema-authoring or code defect. Fatal, never caught for
    /// fallback.
    Programmer,
    /// Id lookup found nothing in the cache nor live.
    NotFound,
}

#[derive(Error, Debug)]
pub enum FederationError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Upstream failure: {0}")]
    Upstream(String),
    #[error("{0}")]
    Defect(String),
    #[error("No instance of class `{class_name}` with id `{id}`")]
    InstanceNotFound { class_name: String, id: String },
    #[error("Related-criterion resolution exceeds {0} levels")]
    RelatedDepthExceeded(usize),
    #[error("Query compilation failed: {0}")]
    Compile(#[from] CompileError),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
}

impl FederationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FederationError::BadRequest(_) => ErrorKind::UserFriendly,
            FederationError::Upstream(_) => ErrorKind::Environmental,
            FederationError::Defect(_) => ErrorKind::Programmer,
            FederationError::InstanceNotFound { .. } => ErrorKind::NotFound,
            FederationError::RelatedDepthExceeded(_) => ErrorKind::Programmer,
            FederationError::Compile(e) => compile_kind(e),
            FederationError::Catalog(e) => catalog_kind(e),
            FederationError::Store(e) => match e {
                StoreError::UnexpectedShape(_) => ErrorKind::Programmer,
                _ => ErrorKind::Environmental,
            },
            // Providers are only contacted after caller input has been
            // validated, so their failures are upstream trouble.
            FederationError::Provider(_) => ErrorKind::Environmental,
            // Geometry errors surface here only while validating
            // caller-supplied polygons.
            FederationError::Geometry(_) => ErrorKind::UserFriendly,
        }
    }

    pub fn is_user_friendly(&self) -> bool {
        self.kind() == ErrorKind::UserFriendly
    }

    pub fn is_environmental(&self) -> bool {
        self.kind() == ErrorKind::Environmental
    }

    pub fn not_found(class_name: impl Into<String>, id: impl Into<String>) -> Self {
        FederationError::InstanceNotFound {
            class_name: class_name.into(),
            id: id.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        FederationError::BadRequest(message.into())
    }

    pub fn defect(message: impl Into<String>) -> Self {
        FederationError::Defect(message.into())
    }
}

fn compile_kind(error: &CompileError) -> ErrorKind {
    match error {
        CompileError::UnknownProperty { .. }
        | CompileError::UnsupportedOperator(_)
        | CompileError::EmptyIdSet
        | CompileError::EmptyWhereGroup
        | CompileError::InvalidPolygon(_)
        | CompileError::InvalidSrid(_)
        | CompileError::ValueTypeMismatch { .. }
        | CompileError::RelationshipMismatch { .. }
        | CompileError::UnsupportedCacheCriterion(_)
        | CompileError::NoSpatialProperty(_) => ErrorKind::UserFriendly,
        CompileError::UnqueriableClass(_)
        | CompileError::UnsupportedType(_)
        | CompileError::MisplacedLogicalOperator
        | CompileError::UnbalancedWhereGroup
        | CompileError::MissingFromClause
        | CompileError::EmptySelectList
        | CompileError::MissingOrderByForWindow
        | CompileError::AmbiguousSpatialProperty(_, _)
        | CompileError::MissingColumnBinding { .. } => ErrorKind::Programmer,
        CompileError::Catalog(inner) => catalog_kind(inner),
    }
}

fn catalog_kind(error: &CatalogError) -> ErrorKind {
    match error {
        // Unknown names come from caller input once the process is up
        CatalogError::Class { .. }
        | CatalogError::Property { .. }
        | CatalogError::Relationship { .. } => ErrorKind::UserFriendly,
        CatalogError::MultipleBaseClasses { .. }
        | CatalogError::InheritanceCycle { .. }
        | CatalogError::MissingBinding { .. }
        | CatalogError::ConfigReadError { .. }
        | CatalogError::ConfigParseError { .. }
        | CatalogError::InvalidConfig { .. } => ErrorKind::Programmer,
    }
}
