use std::path::PathBuf;

use serde::Serialize;

use crate::runtime::RuntimeError;

/// Errors surfaced by the orchestrator's operations.
///
/// Every variant maps to a stable [`ErrorKind`] so front ends can match on
/// the kind without parsing messages.
#[derive(Debug, thiserror::Error)]
pub enum RigError {
    #[error("template '{name}' not found{}. Available templates: {}",
        did_you_mean(.suggestion), .available.join(", "))]
    TemplateNotFound {
        name: String,
        available: Vec<String>,
        suggestion: Option<String>,
    },

    #[error("service '{id}' not found in registry{}", known_suffix(.known))]
    ServiceNotFound { id: String, known: Vec<String> },

    #[error("instance label '{label}' is already in use for template '{template}'")]
    InstanceLabelTaken { template: String, label: String },

    #[error("invalid instance label '{label}': {reason}")]
    InvalidLabel { label: String, reason: String },

    #[error("no free port at or above {start}")]
    ResourceExhausted { start: u16 },

    #[error("no instance numbers left for template '{template}'")]
    InstanceIdsExhausted { template: String },

    #[error("{operation} failed for '{target}': {source}")]
    RuntimeOperationFailed {
        operation: String,
        target: String,
        #[source]
        source: RuntimeError,
    },

    #[error("registry {} is corrupt: {reason}", .path.display())]
    CorruptRegistry { path: PathBuf, reason: String },

    #[error("{operation} completed with {} failure(s): {}", .failures.len(), .failures.join("; "))]
    PartialCleanupFailure {
        operation: String,
        failures: Vec<String>,
    },

    #[error("registry {} could not be persisted: {source}", .path.display())]
    Registry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not prepare project directory {}: {source}", .path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Config(String),
}

/// Machine-checkable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TemplateNotFound,
    ServiceNotFound,
    InstanceLabelTaken,
    InvalidLabel,
    ResourceExhausted,
    RuntimeOperationFailed,
    CorruptRegistry,
    PartialCleanupFailure,
    RegistryIo,
    WorkspaceIo,
    Config,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::TemplateNotFound => "template_not_found",
            ErrorKind::ServiceNotFound => "service_not_found",
            ErrorKind::InstanceLabelTaken => "instance_label_taken",
            ErrorKind::InvalidLabel => "invalid_label",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::RuntimeOperationFailed => "runtime_operation_failed",
            ErrorKind::CorruptRegistry => "corrupt_registry",
            ErrorKind::PartialCleanupFailure => "partial_cleanup_failure",
            ErrorKind::RegistryIo => "registry_io",
            ErrorKind::WorkspaceIo => "workspace_io",
            ErrorKind::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable error shape handed to front ends.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
}

impl RigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RigError::TemplateNotFound { .. } => ErrorKind::TemplateNotFound,
            RigError::ServiceNotFound { .. } => ErrorKind::ServiceNotFound,
            RigError::InstanceLabelTaken { .. } => ErrorKind::InstanceLabelTaken,
            RigError::InvalidLabel { .. } => ErrorKind::InvalidLabel,
            RigError::ResourceExhausted { .. } | RigError::InstanceIdsExhausted { .. } => {
                ErrorKind::ResourceExhausted
            }
            RigError::RuntimeOperationFailed { .. } => ErrorKind::RuntimeOperationFailed,
            RigError::CorruptRegistry { .. } => ErrorKind::CorruptRegistry,
            RigError::PartialCleanupFailure { .. } => ErrorKind::PartialCleanupFailure,
            RigError::Registry { .. } => ErrorKind::RegistryIo,
            RigError::Workspace { .. } => ErrorKind::WorkspaceIo,
            RigError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind(),
            message: self.to_string(),
        }
    }

    pub(crate) fn runtime(
        operation: impl Into<String>,
        target: impl Into<String>,
        source: RuntimeError,
    ) -> Self {
        RigError::RuntimeOperationFailed {
            operation: operation.into(),
            target: target.into(),
            source,
        }
    }
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean '{s}'?)"))
        .unwrap_or_default()
}

fn known_suffix(known: &[String]) -> String {
    if known.is_empty() {
        String::new()
    } else {
        format!(" (known: {})", known.join(", "))
    }
}

pub type Result<T, E = RigError> = std::result::Result<T, E>;

/// Closest candidate by Jaro-Winkler similarity, if any scores above 0.8.
pub fn suggest<'a>(name: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let score = strsim::jaro_winkler(name, candidate);
        if score > 0.8 && best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }
    best.map(|(c, _)| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_not_found_lists_alternatives_and_suggestion() {
        let err = RigError::TemplateNotFound {
            name: "bucket".into(),
            available: vec!["buckets".into(), "db".into()],
            suggestion: suggest("bucket", ["buckets", "db"]),
        };
        let msg = err.to_string();
        assert!(msg.contains("did you mean 'buckets'"), "got: {msg}");
        assert!(msg.contains("Available templates: buckets, db"), "got: {msg}");
        assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
    }

    #[test]
    fn suggestion_absent_for_unrelated_names() {
        assert_eq!(suggest("zzz", ["buckets", "db"]), None);
    }

    #[test]
    fn payload_serializes_stable_kind() {
        let err = RigError::InstanceLabelTaken {
            template: "buckets".into(),
            label: "staging".into(),
        };
        let json = serde_json::to_value(err.payload()).unwrap();
        assert_eq!(json["kind"], "instance_label_taken");
        assert_eq!(
            json["message"],
            "instance label 'staging' is already in use for template 'buckets'"
        );
    }

    #[test]
    fn kind_strings_match_serde_names() {
        for kind in [
            ErrorKind::TemplateNotFound,
            ErrorKind::ResourceExhausted,
            ErrorKind::PartialCleanupFailure,
            ErrorKind::RegistryIo,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }

    #[test]
    fn partial_cleanup_counts_failures() {
        let err = RigError::PartialCleanupFailure {
            operation: "remove buckets_instance_1".into(),
            failures: vec!["remove: boom".into()],
        };
        assert_eq!(
            err.to_string(),
            "remove buckets_instance_1 completed with 1 failure(s): remove: boom"
        );
    }
}
