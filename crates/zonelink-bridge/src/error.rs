//! Bridge error taxonomy and the raw status mapping used by the C surface.

use thiserror::Error;

/// Stable raw status values. 0 and 1 are success-shaped (`zl_send_to`
/// returns [`ZL_PENDING`] for an accepted async submission); bridge-level
/// failures use small negative codes; transport failures pass the runtime's
/// own nonzero code through unchanged.
pub mod abi {
    pub const ZL_OK: i32 = 0;
    pub const ZL_PENDING: i32 = 1;
    pub const ZL_ERR_NOT_INITIALIZED: i32 = -2;
    pub const ZL_ERR_INVALID_ARGUMENT: i32 = -3;
    pub const ZL_ERR_OUT_OF_MEMORY: i32 = -4;
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    /// Session operation before hosting.
    #[error("session not initialized")]
    NotInitialized,

    /// Null or zero-length buffer, or otherwise unusable input.
    #[error("invalid argument")]
    InvalidArgument,

    /// Arena or queue allocation failed.
    #[error("out of memory")]
    OutOfMemory,

    /// Opaque passthrough of the runtime's failure code.
    #[error("transport failure (code {0})")]
    Transport(i32),
}

impl BridgeError {
    /// Map to the raw status value crossing the ABI. Transport codes are
    /// nonzero by contract and pass through unchanged.
    pub fn to_raw(self) -> i32 {
        match self {
            BridgeError::NotInitialized => abi::ZL_ERR_NOT_INITIALIZED,
            BridgeError::InvalidArgument => abi::ZL_ERR_INVALID_ARGUMENT,
            BridgeError::OutOfMemory => abi::ZL_ERR_OUT_OF_MEMORY,
            BridgeError::Transport(code) => code,
        }
    }
}

/// Success shape of a send: delivered during the call, or accepted with a
/// completion forthcoming. Pending is not an error, it travels through the
/// same status channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Pending,
}

impl SendOutcome {
    pub fn to_raw(self) -> i32 {
        match self {
            SendOutcome::Delivered => abi::ZL_OK,
            SendOutcome::Pending => abi::ZL_PENDING,
        }
    }
}
