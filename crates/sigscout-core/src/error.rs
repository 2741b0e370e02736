use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Invalid operand at {instruction:#x}: {message}")]
    InvalidOperand { instruction: u64, message: String },

    #[error("Slot '{0}' already resolved")]
    SlotAlreadyResolved(String),

    #[error("Catalogue targets the support image but deployment mode is single-image")]
    SupportImageNotConfigured,

    #[error("Post-startup pass requires a completed main resolution pass")]
    PostResolveNotReady,

    #[error("Post-startup pass already ran")]
    PostResolveAlreadyRan,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_operand_display() {
        let err = Error::InvalidOperand {
            instruction: 0x1400_0100,
            message: "target 0x5 is outside every known image".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("0x14000100"));
        assert!(text.contains("outside every known image"));
    }
}
