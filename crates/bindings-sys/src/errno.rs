/// Error code for a generic failure inside a host call.
pub const HOST_CALL_FAILURE: u16 = 1;

/// Error code for calling a datastore operation outside a transaction.
pub const NOT_IN_TRANSACTION: u16 = 2;

/// Error code for BSATN the host could not decode at the expected type.
pub const BSATN_DECODE_ERROR: u16 = 3;

/// Error code for "No such table".
pub const NO_SUCH_TABLE: u16 = 4;

/// Error code for "No such index".
pub const NO_SUCH_INDEX: u16 = 5;

/// Error code for an invalid row iterator handle.
pub const NO_SUCH_ITER: u16 = 6;

/// Error code for an invalid bytes source or sink handle.
pub const NO_SUCH_BYTES: u16 = 8;

/// Error code for a sink with no space left.
pub const NO_SPACE: u16 = 9;

/// Error code for a caller buffer too small for the data at hand.
pub const BUFFER_TOO_SMALL: u16 = 11;

/// Error code for when a unique constraint is violated.
pub const UNIQUE_ALREADY_EXISTS: u16 = 12;

/// Error code for scheduling a reducer unreasonably far into the future.
pub const SCHEDULE_AT_DELAY_TOO_LONG: u16 = 13;

/// Error code for calling a reducer id the module does not have.
pub const NO_SUCH_REDUCER: u16 = 16;

macro_rules! errnos {
    ($mac:ident) => {
        $mac! {
            HOST_CALL_FAILURE => "The host call failed",
            NOT_IN_TRANSACTION => "The operation is only valid inside a transaction",
            BSATN_DECODE_ERROR => "Could not decode the BSATN to the expected type",
            NO_SUCH_TABLE => "No such table",
            NO_SUCH_INDEX => "No such index",
            NO_SUCH_ITER => "The row iterator is not valid",
            NO_SUCH_BYTES => "The bytes source or sink is not valid",
            NO_SPACE => "The bytes sink has no more space left",
            BUFFER_TOO_SMALL => "The provided buffer is not large enough",
            UNIQUE_ALREADY_EXISTS => "Value with given unique identifier already exists",
            SCHEDULE_AT_DELAY_TOO_LONG => "The delay in scheduling a reducer is too long",
            NO_SUCH_REDUCER => "No such reducer",
        }
    };
}
