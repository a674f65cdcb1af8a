/// Raised when a structured-data payload cannot be mapped onto any recognized shape.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidPayloadError(pub String);

impl std::fmt::Display for InvalidPayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InvalidPayloadError: {}", self.0)
    }
}

impl std::error::Error for InvalidPayloadError {}

impl InvalidPayloadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}
