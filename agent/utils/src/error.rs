use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to connect to '{}': {}", host, source))]
    Connect {
        host: String,
        source: openssh::Error,
    },

    #[snafu(display("Unable to start '{}' on '{}': {}", command, host, source))]
    Spawn {
        host: String,
        command: String,
        source: openssh::Error,
    },

    #[snafu(display("Unable to write the input of '{}' on '{}': {}", command, host, source))]
    WriteStdin {
        host: String,
        command: String,
        source: std::io::Error,
    },

    #[snafu(display("Unable to wait for '{}' on '{}': {}", command, host, source))]
    Wait {
        host: String,
        command: String,
        source: openssh::Error,
    },
}

impl Error {
    /// Whether the SSH session itself broke, as opposed to the remote command failing.
    pub(crate) fn is_session_failure(&self) -> bool {
        matches!(self, Error::Spawn { .. } | Error::Wait { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
