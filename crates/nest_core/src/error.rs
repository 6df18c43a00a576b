//!A mod for the error types

///Raised when an inbound payload deserialized fine but cannot be mapped to a record.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("text log needs a non-blank `content` or `text`")]
    EmptyText,
}
