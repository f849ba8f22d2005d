pub type CardResult<T> = Result<T, CardError>;

#[derive(thiserror::Error, Debug)]
pub enum CardError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("layout error: {0}")]
    Layout(String),

    #[error("draw error: {0}")]
    Draw(String),

    #[error("asset error: {0}")]
    Asset(String),

    #[error("export error: {0}")]
    Export(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CardError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn layout(msg: impl Into<String>) -> Self {
        Self::Layout(msg.into())
    }

    pub fn draw(msg: impl Into<String>) -> Self {
        Self::Draw(msg.into())
    }

    pub fn asset(msg: impl Into<String>) -> Self {
        Self::Asset(msg.into())
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            CardError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(CardError::layout("x").to_string().contains("layout error:"));
        assert!(CardError::draw("x").to_string().contains("draw error:"));
        assert!(CardError::asset("x").to_string().contains("asset error:"));
        assert!(CardError::export("x").to_string().contains("export error:"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = CardError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
