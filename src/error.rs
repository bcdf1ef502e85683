//! Application error carrying a process exit code.
//!
//! Exit codes:
//! - `2` usage / file I/O
//! - `3` fatal input (reference table empty or unreadable)
//! - `4` fetch layer failure
//! - `5` QA failed under `--strict`

pub const EXIT_IO: u8 = 2;
pub const EXIT_FATAL_INPUT: u8 = 3;
pub const EXIT_FETCH: u8 = 4;
pub const EXIT_QA_FAILED: u8 = 5;

#[derive(Clone, thiserror::Error)]
#[error("{message}")]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(EXIT_IO, message)
    }

    pub fn fatal_input(message: impl Into<String>) -> Self {
        Self::new(EXIT_FATAL_INPUT, message)
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        Self::new(EXIT_FETCH, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}
