pub mod app;
pub mod cli;
pub mod config;
pub mod context;
pub mod deck;
pub mod decimal;
pub mod net;
pub mod telemetry;
pub mod timer;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Required connection identifiers are missing or malformed.
    Config(String),
    /// Address resolution or socket binding failed.
    Transport(String),
    Io(std::io::Error),
    Parse(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::Transport(msg) => write!(f, "transport error: {msg}"),
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}
