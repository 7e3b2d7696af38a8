use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("'{}' must not be empty", field))]
    EmptyField { field: &'static str },

    #[snafu(display("'{}' has invalid value '{}': {}", field, value, reason))]
    InvalidField {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[snafu(display("Instance count must be at least 1, got {}", count))]
    InstanceCount { count: usize },

    #[snafu(display("No cluster member found with private IP '{}'", private_ip))]
    MemberNotFound { private_ip: String },
}

impl Error {
    /// Whether this error reports an entity that does not exist rather than bad input.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::MemberNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
