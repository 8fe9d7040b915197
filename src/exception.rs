// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains exception and Result definitions
use thiserror::Error;

/// Represents all kind of errors which can occur while setting up or running the
/// [`VelocityCartesianDampingController`](`crate::VelocityCartesianDampingController`)
#[derive(Error, Debug)]
pub enum DampingException {
    /// ConfigurationException is returned if the controller parameters are incomplete or invalid.
    /// The controller cannot be activated in this case.
    #[error("{message:?}")]
    ConfigurationException { message: String },

    /// HardwareException is returned if a required hardware handle cannot be bound.
    #[error("{message:?}")]
    HardwareException { message: String },

    /// CommandException is returned if a velocity command is malformed. The control loop
    /// never propagates it, it falls back to the last known-good command instead.
    #[error("{message:?}")]
    CommandException { message: String },

    /// ConfigLoadException is returned if a parameter file cannot be read or parsed.
    #[error("{message:?}")]
    ConfigLoadException { message: String },

    /// RealTimeException is returned if the real-time priority cannot be set
    #[error("{message:?}")]
    RealTimeException { message: String },
}

/// creates a ConfigurationException from anything which can be turned into a String
pub(crate) fn create_configuration_exception<S: Into<String>>(message: S) -> DampingException {
    DampingException::ConfigurationException {
        message: message.into(),
    }
}

/// Result type which can have DampingException as Error
pub type DampingResult<T> = Result<T, DampingException>;
