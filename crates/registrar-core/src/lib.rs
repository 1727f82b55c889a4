//! # voipmon-registrar-core
//!
//! SIP registrar and redirecting proxy for the quality monitor.
//!
//! Gateways REGISTER here with MD5 digest credentials and place calls through
//! it. Each INVITE starts a call in the shared
//! [`CallManager`](voipmon_call_engine::CallManager); calls to a test
//! extension or a registered device are answered with an SDP pointing at a
//! freshly bound RTP processor, anything else is redirected to the echo URI.
//!
//! The server listens on UDP, TCP and TLS. Stream transports are framed by
//! `Content-Length`, and every complete message is handled on its own task.
//! Inbound and outbound messages are mirrored to an
//! [`EventSink`](voipmon_infra_common::EventSink) for observers.

pub mod auth;
pub mod config;
pub mod error;
pub mod framing;
pub mod message;
pub mod net;
pub mod registrar;
pub mod registry;
pub mod response;
pub mod sdp;
pub mod server;
pub mod tls;
pub mod transport;

pub use auth::{compute_digest_response, DigestCredentials};
pub use config::{RegistrarConfig, TestExtension};
pub use error::{Error, Result};
pub use framing::StreamFramer;
pub use message::{Method, SipMessage, StartLine};
pub use registrar::{Direction, SipRegistrar};
pub use registry::{DeviceView, RegisteredDevice, RegistrationTable};
pub use response::ResponseBuilder;
pub use server::RegistrarHandle;
pub use transport::Transport;
