use crate::error::OpalError;
use log::warn;

pub const OPAL_SUCCESS: i64 = 0;
pub const OPAL_PARAMETER: i64 = -1;
pub const OPAL_UNSUPPORTED: i64 = -7;

pub const OPAL_REGISTER_OPAL_EXCEPTION_HANDLER: u64 = 32;

impl OpalError {
    /// Return code handed back to the caller in r3
    pub fn code(&self) -> i64 {
        match self {
            OpalError::Parameter => OPAL_PARAMETER,
            OpalError::Unsupported => OPAL_UNSUPPORTED,
        }
    }
}

pub fn to_return_code(result: Result<(), OpalError>) -> i64 {
    match result {
        Ok(()) => OPAL_SUCCESS,
        Err(e) => e.code(),
    }
}

/// One entry in the firmware call table.
pub struct OpalCall {
    pub token: u64,
    pub name: &'static str,
    pub nargs: usize,
    pub handler: fn(&[u64]) -> Result<(), OpalError>,
}

/// Legacy hook for an OS-provided exception handler. The interface is
/// deprecated: it is still answered but never registers anything.
pub fn register_exception_handler(
    _opal_exception: u64,
    _handler_address: u64,
    _glue_cache_line: u64,
) -> Result<(), OpalError> {
    Err(OpalError::Unsupported)
}

fn register_exception_handler_call(args: &[u64]) -> Result<(), OpalError> {
    match *args {
        [exception, handler, glue] => register_exception_handler(exception, handler, glue),
        _ => Err(OpalError::Parameter),
    }
}

/// Firmware calls owned by the trap subsystem.
pub static EXCEPTION_CALLS: [OpalCall; 1] = [OpalCall {
    token: OPAL_REGISTER_OPAL_EXCEPTION_HANDLER,
    name: "opal_register_exc_handler",
    nargs: 3,
    handler: register_exception_handler_call,
}];

/// Route a firmware call by token through `EXCEPTION_CALLS`.
pub fn opal_call(token: u64, args: &[u64]) -> i64 {
    let Some(call) = EXCEPTION_CALLS.iter().find(|c| c.token == token) else {
        warn!("unknown firmware call token {}", token);
        return OPAL_PARAMETER;
    };
    if args.len() != call.nargs {
        warn!(
            "{}: expected {} arguments, got {}",
            call.name,
            call.nargs,
            args.len()
        );
        return OPAL_PARAMETER;
    }
    to_return_code((call.handler)(args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_handler_registration_is_unsupported() {
        assert_eq!(
            register_exception_handler(0, 0x3000_0000, 0x80),
            Err(OpalError::Unsupported)
        );
        assert_eq!(
            opal_call(OPAL_REGISTER_OPAL_EXCEPTION_HANDLER, &[1, 2, 3]),
            OPAL_UNSUPPORTED
        );
    }

    #[test]
    fn bad_token_or_arity_is_a_parameter_error() {
        assert_eq!(opal_call(9999, &[]), OPAL_PARAMETER);
        assert_eq!(
            opal_call(OPAL_REGISTER_OPAL_EXCEPTION_HANDLER, &[1, 2]),
            OPAL_PARAMETER
        );
    }
}
