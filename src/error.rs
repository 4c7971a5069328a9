/// Coarse classification of a [`GenerationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Parse,
    Authentication,
    Service,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("please enter a story first")]
    EmptyStory,

    #[error("scene not found: {0}")]
    UnknownScene(String),

    #[error("character has no DNA: {0}")]
    UnknownCharacter(String),

    #[error("unknown DNA field: {0}")]
    UnknownField(String),

    #[error("project not found: {0}")]
    UnknownProject(String),

    #[error("no scenes to {0}")]
    NoScenes(&'static str),

    #[error("could not parse {what} response as JSON")]
    Parse {
        what: &'static str,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("{service} authentication failed. {hint}")]
    Authentication {
        service: &'static str,
        hint: &'static str,
    },

    #[error("{service} error: {message}")]
    Service {
        service: &'static str,
        message: String,
    },
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyStory
            | Self::UnknownScene(_)
            | Self::UnknownCharacter(_)
            | Self::UnknownField(_)
            | Self::UnknownProject(_)
            | Self::NoScenes(_) => ErrorKind::Input,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Service { .. } => ErrorKind::Service,
        }
    }

    pub(crate) fn service(service: &'static str, message: impl Into<String>) -> Self {
        Self::Service {
            service,
            message: message.into(),
        }
    }

    pub(crate) fn transport(service: &'static str, err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        Self::service(service, message)
    }
}
