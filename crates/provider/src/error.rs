//! Error types for rig-provider

use thiserror::Error;

/// Errors raised by provider declaration, record construction, and merge
///
/// The message wording is part of the diagnostics contract: the evaluator
/// reports these verbatim to build scripts.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The same keyword was supplied twice in an instantiation call
    #[error("got multiple values for parameter {field} in call to instantiate provider {provider}")]
    DuplicateField { field: String, provider: String },

    /// One or more keywords named no field of the schema
    ///
    /// Collected across the whole call and reported together, in the order
    /// the call supplied them.
    #[error(
        "got unexpected field{} '{}' in call to instantiate provider {provider}",
        plural_suffix(.fields),
        .fields.join("', '")
    )]
    UnknownFields { fields: Vec<String>, provider: String },

    /// `+` applied to records of two different providers
    #[error("Cannot use '+' operator on instances of different providers ({left} and {right})")]
    ProviderMismatch { left: String, right: String },

    /// `+` applied to records that both set the same field
    #[error("cannot add struct instances with common field '{field}'")]
    FieldConflict { field: String },

    /// A provider declaration listed the same field name twice
    #[error("provider {provider} declares field '{field}' more than once")]
    DuplicateSchemaField { field: String, provider: String },
}

fn plural_suffix(fields: &[String]) -> &'static str {
    if fields.len() > 1 {
        "s"
    } else {
        ""
    }
}
