use crate::exit_codes::ExitCode;

#[derive(Debug)]
pub enum RunError {
    InvalidInput(anyhow::Error),
    SetupFailed(anyhow::Error),
    RuntimeError(anyhow::Error),
}

impl RunError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::SetupFailed(_) => ExitCode::SetupFailed,
            Self::RuntimeError(_) => ExitCode::RuntimeError,
        }
    }

    #[must_use]
    pub fn anyhow(&self) -> &anyhow::Error {
        match self {
            Self::InvalidInput(e) | Self::SetupFailed(e) | Self::RuntimeError(e) => e,
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.anyhow())
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.anyhow().as_ref())
    }
}

/// Maps engine errors onto the exit-code classes.
pub(crate) fn classify_core_error(err: authload_core::Error) -> RunError {
    use authload_core::Error as CoreError;

    let kind = match &err {
        CoreError::SetupTimeout(_) | CoreError::EmptySetupData { .. } => RunError::SetupFailed,

        CoreError::InvalidExecutor
        | CoreError::DuplicateScenario(_)
        | CoreError::InvalidStages
        | CoreError::InvalidRate
        | CoreError::InvalidDuration
        | CoreError::InvalidTimeUnit
        | CoreError::InvalidPreAllocatedVus
        | CoreError::InvalidMaxVus
        | CoreError::InvalidBatchSize
        | CoreError::InvalidThreshold { .. } => RunError::InvalidInput,

        CoreError::Join(_) => RunError::RuntimeError,
    };
    kind(anyhow::Error::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn setup_errors_map_to_setup_failed() {
        let err = classify_core_error(authload_core::Error::EmptySetupData {
            scenario: "login_scn".to_string(),
        });
        assert_eq!(err.exit_code(), ExitCode::SetupFailed);
        assert!(err.to_string().contains("login_scn"));

        let err = classify_core_error(authload_core::Error::SetupTimeout(Duration::from_secs(1)));
        assert_eq!(err.exit_code(), ExitCode::SetupFailed);
    }

    #[test]
    fn option_errors_map_to_invalid_input() {
        let err = classify_core_error(authload_core::Error::InvalidMaxVus);
        assert_eq!(err.exit_code(), ExitCode::InvalidInput);
    }
}
