mod castor;

pub use castor::{CastorError, ErrorInfo, NOT_INITIALIZED_MESSAGE, SharedError};
