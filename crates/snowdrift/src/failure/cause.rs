//! Failure origins and causes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin of a failure. Batches never mix types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureType {
    Indexing,
    Processing,
    Input,
}

impl FailureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::Indexing => "indexing",
            FailureType::Processing => "processing",
            FailureType::Input => "input",
        }
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the search engine rejected a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexingFailureCause {
    MappingError,
    Unknown,
}

impl IndexingFailureCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexingFailureCause::MappingError => "MappingError",
            IndexingFailureCause::Unknown => "Unknown",
        }
    }
}

/// Which processing stage failed on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingFailureCause {
    RuleStatementEvaluationError,
    RuleConditionEvaluationError,
    ExtractorException,
    MessageFilterException,
    InvalidTimestampException,
    Unknown,
}

impl ProcessingFailureCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingFailureCause::RuleStatementEvaluationError => "RuleStatementEvaluationError",
            ProcessingFailureCause::RuleConditionEvaluationError => "RuleConditionEvaluationError",
            ProcessingFailureCause::ExtractorException => "ExtractorException",
            ProcessingFailureCause::MessageFilterException => "MessageFilterException",
            ProcessingFailureCause::InvalidTimestampException => "InvalidTimestampException",
            ProcessingFailureCause::Unknown => "Unknown",
        }
    }
}

/// Why an input could not turn a raw payload into a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputFailureCause {
    InputParse,
}

impl InputFailureCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputFailureCause::InputParse => "InputParse",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_type_serde_lowercase() {
        let json = serde_json::to_string(&FailureType::Processing).unwrap();
        assert_eq!(json, "\"processing\"");

        let parsed: Vec<FailureType> = serde_yaml::from_str("[indexing, input]").unwrap();
        assert_eq!(parsed, vec![FailureType::Indexing, FailureType::Input]);
    }

    #[test]
    fn test_cause_labels_match_serde_names() {
        let json = serde_json::to_string(&ProcessingFailureCause::ExtractorException).unwrap();
        assert_eq!(json, format!("\"{}\"", ProcessingFailureCause::ExtractorException.as_str()));
        assert_eq!(IndexingFailureCause::MappingError.as_str(), "MappingError");
        assert_eq!(InputFailureCause::InputParse.as_str(), "InputParse");
    }
}
