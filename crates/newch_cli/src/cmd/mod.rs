/// Dock session command.
pub mod connect;
/// NSOF file decode command.
pub mod decode;
/// CLI error type.
pub mod error;
/// Object tree and JSON rendering.
pub mod print;
/// Interactive line prompt.
pub mod prompt;
#[cfg(test)]
pub(crate) mod test_support;
mod util;
