use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Dbus connection error")]
    DbusError(#[from] zbus::Error),
    #[error("Dbus call error")]
    FdoError(#[from] zbus::fdo::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
