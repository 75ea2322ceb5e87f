//! Newton NSOF object codec and Dock session protocol.

/// Dock packet framing, connection state machine, and session driver.
pub mod dock;
/// NSOF object model, decoder, and encoder.
pub mod nsof;
