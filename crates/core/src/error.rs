/// Result alias that carries the custom [`ExprVizError`] type.
pub type Result<T> = std::result::Result<T, ExprVizError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum ExprVizError {
    /// An operand handed to the expression builder could not be lifted into
    /// a graph node, or a finished graph combines incompatible shapes.
    #[error("coercion error: {0}")]
    Coercion(String),
    /// A uniform field declaration has no usable wire representation.
    #[error("layout error: {0}")]
    Layout(String),
    /// Buffer data does not match the element layout it is bound to, or a
    /// graph references a buffer that no longer exists.
    #[error("binding error: {0}")]
    Binding(String),
    /// Failure reported by the rendering backend and tunnelled through.
    #[error("backend error: {0}")]
    Backend(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON configuration or declaration input.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl ExprVizError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn coercion<T: Into<String>>(msg: T) -> Self {
        Self::Coercion(msg.into())
    }

    pub fn layout<T: Into<String>>(msg: T) -> Self {
        Self::Layout(msg.into())
    }

    pub fn binding<T: Into<String>>(msg: T) -> Self {
        Self::Binding(msg.into())
    }

    pub fn backend<T: Into<String>>(msg: T) -> Self {
        Self::Backend(msg.into())
    }
}

impl From<&str> for ExprVizError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for ExprVizError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
