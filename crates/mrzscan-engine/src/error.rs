//! Error types for the engine layer.

use thiserror::Error;

/// Errors returned by a recognition engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Initialization was refused by the license check.
    #[error("license check failed: {0}")]
    License(#[from] LicenseError),

    /// The license does not include MRZ recognition.
    #[error("MRZ recognition is not enabled for this license")]
    MrzDisabled,

    /// A call was made before `initialize` succeeded.
    #[error("engine is not initialized")]
    NotInitialized,

    /// A call was made after `close`.
    #[error("engine has been closed")]
    Closed,

    /// The engine refused a tuning parameter.
    #[error("failed to apply {param}: engine returned {code}")]
    Parameter { param: &'static str, code: i32 },

    /// The engine answered with something that is not a valid response.
    #[error("malformed engine response: {0}")]
    MalformedResponse(String),

    /// Any other engine-side failure.
    #[error("engine call failed: {0}")]
    Call(String),
}

/// License failures reported by engine initialization as negative status.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseError {
    #[error("No Key Found")]
    NoKey,

    #[error("Invalid Key")]
    InvalidKey,

    #[error("Invalid Platform")]
    InvalidPlatform,

    #[error("Invalid License")]
    InvalidLicense,

    #[error("unknown license failure ({0})")]
    Unknown(i32),
}

impl LicenseError {
    /// Map a negative initialization status to a license failure.
    pub fn from_status(status: i32) -> Self {
        match status {
            -1 => Self::NoKey,
            -2 => Self::InvalidKey,
            -3 => Self::InvalidPlatform,
            -4 => Self::InvalidLicense,
            other => Self::Unknown(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_license_status_mapping() {
        assert_eq!(LicenseError::from_status(-1), LicenseError::NoKey);
        assert_eq!(LicenseError::from_status(-2), LicenseError::InvalidKey);
        assert_eq!(LicenseError::from_status(-3), LicenseError::InvalidPlatform);
        assert_eq!(LicenseError::from_status(-4), LicenseError::InvalidLicense);
        assert_eq!(LicenseError::from_status(-9), LicenseError::Unknown(-9));
    }

    #[test]
    fn test_license_messages() {
        assert_eq!(LicenseError::NoKey.to_string(), "No Key Found");
        assert_eq!(
            EngineError::from(LicenseError::InvalidLicense).to_string(),
            "license check failed: Invalid License"
        );
    }
}
