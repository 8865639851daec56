use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("malformed agent id `{0}`")]
    MalformedAgentId(String),
}

/// Agent ids are either platform-assigned (`agent_` prefix plus an
/// alphanumeric tail) or a bare token of alphanumerics, `_`, `-`.
pub fn validate_agent_id(raw: &str) -> Result<(), DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::MalformedAgentId(raw.to_string()));
    }

    let tail = trimmed.strip_prefix("agent_").unwrap_or(trimmed);
    let valid = !tail.is_empty()
        && tail.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if valid {
        Ok(())
    } else {
        Err(DomainError::MalformedAgentId(raw.to_string()))
    }
}
