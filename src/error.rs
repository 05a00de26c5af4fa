use std::{
    error::Error,
    fmt::{Display, Formatter},
};

/// An error raised while turning a satellite scan into clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindFireError {
    pub msg: &'static str,
}

impl Display for FindFireError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.msg)
    }
}

impl Error for FindFireError {}

/// An error raised while connecting clusters through time into fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectFireError {
    pub msg: &'static str,
}

impl Display for ConnectFireError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.msg)
    }
}

impl Error for ConnectFireError {}
