//! Gateway: HTTP surface for the Instagram webhook.
//!
//! Single port. The POST webhook answers immediately and forwards in the background; the GET
//! webhook answers Meta's verification handshake.

mod server;
mod webhook;

pub use server::{router, run_gateway, GatewayState};
pub use webhook::{verify_handshake, Verification, VerifyParams};
