//! Per-message SIP dispatch
//!
//! [`SipRegistrar`] turns one complete inbound message into at most one
//! response. It holds no dialog or transaction state: registrations live in
//! the [`RegistrationTable`], calls in the shared [`CallManager`], and RTP
//! processors are tracked only so BYE and shutdown can stop them.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::json;
use tracing::{debug, error, info, warn};
use voipmon_call_engine::{CallManager, SessionInfo};
use voipmon_infra_common::{EventKind, EventSink, MonitorEvent};
use voipmon_rtp_core::{CallMetricsSink, RtpProcessor, RtpProcessorConfig, RtpProcessorHandle};

use crate::auth::{self, DigestCredentials};
use crate::config::RegistrarConfig;
use crate::error::Result;
use crate::message::{extract_address, extract_contact_uri, extract_extension, header_param, Method, SipMessage};
use crate::net::discover_local_ip;
use crate::registry::{DeviceView, RegisteredDevice, RegistrationTable};
use crate::response::ResponseBuilder;
use crate::sdp;
use crate::transport::Transport;

/// Which way a SIP message travelled, as reported to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}

/// How an INVITE was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InviteTarget {
    TestExtension,
    RegisteredDevice,
    Redirect,
}

/// SIP registrar and redirecting proxy
#[derive(Clone)]
pub struct SipRegistrar {
    pub(crate) inner: Arc<RegistrarInner>,
}

pub(crate) struct RegistrarInner {
    pub(crate) config: RegistrarConfig,
    rtp_config: RtpProcessorConfig,
    devices: RegistrationTable,
    calls: Arc<CallManager>,
    events: Arc<dyn EventSink>,
    media: DashMap<String, RtpProcessorHandle>,
    advertised_ip: IpAddr,
    /// UDP port written into Contact headers; updated once the socket is bound
    sip_port: AtomicU16,
}

impl SipRegistrar {
    pub fn new(
        config: RegistrarConfig,
        rtp_config: RtpProcessorConfig,
        calls: Arc<CallManager>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let advertised_ip = config.advertised_ip.unwrap_or_else(discover_local_ip);
        let sip_port = AtomicU16::new(config.udp_port);
        info!("SIP registrar advertising {} for domain {}", advertised_ip, config.domain);

        Self {
            inner: Arc::new(RegistrarInner {
                config,
                rtp_config,
                devices: RegistrationTable::new(),
                calls,
                events,
                media: DashMap::new(),
                advertised_ip,
                sip_port,
            }),
        }
    }

    pub fn config(&self) -> &RegistrarConfig {
        &self.inner.config
    }

    pub fn advertised_ip(&self) -> IpAddr {
        self.inner.advertised_ip
    }

    pub fn call_manager(&self) -> &Arc<CallManager> {
        &self.inner.calls
    }

    pub fn registrations(&self) -> &RegistrationTable {
        &self.inner.devices
    }

    /// Snapshot of every registered device
    pub fn get_registered_devices(&self) -> Vec<DeviceView> {
        self.inner.devices.views()
    }

    /// Number of RTP processors still running
    pub fn active_media_count(&self) -> usize {
        self.inner.media.len()
    }

    /// Local RTP port allocated for a call, if its processor is running
    pub fn media_port(&self, call_id: &str) -> Option<u16> {
        self.inner.media.get(call_id).map(|h| h.port())
    }

    pub(crate) fn set_sip_port(&self, port: u16) {
        self.inner.sip_port.store(port, Ordering::Relaxed);
    }

    fn sip_port(&self) -> u16 {
        self.inner.sip_port.load(Ordering::Relaxed)
    }

    fn publish(&self, kind: EventKind, payload: serde_json::Value) {
        self.inner.events.publish(MonitorEvent::new(kind, payload));
    }

    fn publish_sip(&self, message: &str, peer: SocketAddr, transport: Transport, direction: Direction) {
        self.publish(
            EventKind::SipMessage,
            json!({
                "message": message,
                "remote_addr": peer.to_string(),
                "transport": transport.as_str(),
                "direction": direction.as_str(),
            }),
        );
    }

    /// Handle one complete SIP message and return the response to send back.
    ///
    /// Malformed messages, responses and unknown methods produce `None`.
    pub async fn handle_message(&self, data: &[u8], peer: SocketAddr, transport: Transport) -> Option<String> {
        self.publish_sip(&String::from_utf8_lossy(data), peer, transport, Direction::Incoming);

        let message = match SipMessage::parse(data) {
            Ok(message) => message,
            Err(e) => {
                debug!(peer = %peer, transport = %transport, "Dropping malformed SIP message: {}", e);
                return None;
            }
        };

        let method = match message.method() {
            Some(method) => method.clone(),
            None => {
                debug!(peer = %peer, "Ignoring SIP response");
                return None;
            }
        };
        debug!(peer = %peer, transport = %transport, method = %method, "SIP request received");

        let response = match method {
            Method::Register => Some(self.handle_register(&message, peer, transport)),
            Method::Invite => Some(self.handle_invite(&message, peer, transport).await),
            Method::Ack => {
                self.handle_ack(&message, peer);
                None
            }
            Method::Bye => Some(self.handle_bye(&message, transport)),
            Method::Options | Method::Cancel => Some(self.reply(&message, 200, "OK").build()),
            Method::Other(name) => {
                warn!(peer = %peer, method = %name, "Unsupported SIP method, dropping");
                None
            }
        };

        if let Some(response) = &response {
            self.publish_sip(response, peer, transport, Direction::Outgoing);
        }
        response
    }

    fn reply(&self, request: &SipMessage, status: u16, reason: &str) -> ResponseBuilder {
        ResponseBuilder::new(request, status, reason).server(self.inner.config.server_header.as_str())
    }

    fn handle_register(&self, message: &SipMessage, peer: SocketAddr, transport: Transport) -> String {
        let config = &self.inner.config;

        let extension = match message.from_header().and_then(extract_extension) {
            Some(extension) => extension,
            None => {
                warn!(peer = %peer, "REGISTER without an extension in From");
                return self.reply(message, 400, "Bad Request").build();
            }
        };

        let authorization = match message.header("authorization") {
            Some(value) => value,
            None => {
                let nonce = auth::generate_nonce(peer);
                debug!(extension = %extension, peer = %peer, "Challenging REGISTER");
                return self
                    .reply(message, 401, "Unauthorized")
                    .header("WWW-Authenticate", auth::challenge(&config.domain, &nonce))
                    .build();
            }
        };

        if !self.verify_credentials(authorization, &extension) {
            warn!(extension = %extension, peer = %peer, "REGISTER authentication failed");
            return self.reply(message, 403, "Forbidden").build();
        }

        let expires = requested_expires(message, config.registration_expires);
        let contact_header = message.header("contact").unwrap_or_default();
        let contact = extract_contact_uri(contact_header);

        if expires > 0 {
            let device = RegisteredDevice::new(&extension, &contact, transport, peer, expires, Utc::now());
            self.inner.devices.register(device);
            info!(extension = %extension, peer = %peer, transport = %transport, expires, "Registered {}", contact);
            self.publish(
                EventKind::DeviceRegistered,
                json!({
                    "extension": extension,
                    "contact": contact,
                    "transport": transport.as_str(),
                }),
            );
        } else if self.inner.devices.unregister(&extension).is_some() {
            info!(extension = %extension, "Unregistered");
            self.publish(EventKind::DeviceUnregistered, json!({ "extension": extension }));
        }

        self.reply(message, 200, "OK")
            .header("Contact", contact_header)
            .header("Expires", expires.to_string())
            .build()
    }

    /// The digest username must be the From extension and a known user
    fn verify_credentials(&self, authorization: &str, extension: &str) -> bool {
        let creds = match DigestCredentials::parse(authorization) {
            Some(creds) => creds,
            None => return false,
        };
        if creds.username != extension {
            return false;
        }
        match self.inner.config.password_for(&creds.username) {
            Some(password) => creds.verify(Method::Register.as_str(), password),
            None => false,
        }
    }

    async fn handle_invite(&self, message: &SipMessage, peer: SocketAddr, transport: Transport) -> String {
        let config = &self.inner.config;
        let call_id = message
            .call_id()
            .map(str::to_string)
            .unwrap_or_else(|| format!("call_{}", Utc::now().timestamp_millis()));

        let from_header = message.from_header().unwrap_or_default();
        let to_header = message.to_header().unwrap_or_default();
        let from_ext = extract_extension(from_header);
        let to_ext = extract_extension(to_header);

        let info = SessionInfo::new(
            from_ext.clone().unwrap_or_else(|| extract_address(from_header)),
            to_ext.clone().unwrap_or_else(|| extract_address(to_header)),
            transport.as_str(),
        )
        .with_remote_addr(peer.to_string());

        if !self.inner.calls.start_call(&call_id, info) {
            debug!(call_id = %call_id, "INVITE for a call already being tracked");
        }

        let target = match to_ext.as_deref() {
            Some(ext) if config.test_extension(ext).is_some() => InviteTarget::TestExtension,
            Some(ext) if self.inner.devices.contains(ext) => InviteTarget::RegisteredDevice,
            _ => InviteTarget::Redirect,
        };
        info!(
            call_id = %call_id,
            transport = %transport,
            "Call setup {} -> {} ({:?})",
            from_ext.as_deref().unwrap_or("unknown"),
            to_ext.as_deref().unwrap_or("unknown"),
            target
        );

        if target == InviteTarget::Redirect {
            let redirect = format!("<sip:{}@{}:{}>", config.echo_user, self.inner.advertised_ip, self.sip_port());
            return ResponseBuilder::new(message, 302, "Moved Temporarily")
                .with_to_tag()
                .header("Contact", redirect)
                .server(config.proxy_server_header.as_str())
                .build();
        }

        if !message.body.is_empty() {
            let offer = sdp::parse_offer(&message.body);
            debug!(call_id = %call_id, "SDP offer: {:?}", offer);
        }

        let port = match self.start_media(&call_id).await {
            Ok(port) => port,
            Err(e) => {
                error!(call_id = %call_id, "Failed to start RTP processing: {}", e);
                self.inner.calls.end_call(&call_id);
                return self.reply(message, 500, "Internal Server Error").build();
            }
        };

        if target == InviteTarget::TestExtension {
            if let Some((ext, test)) = to_ext
                .as_deref()
                .and_then(|ext| config.test_extension(ext).map(|test| (ext, test)))
            {
                info!(call_id = %call_id, extension = %ext, "Test call to {} on RTP port {}", test.name, port);
                self.publish(
                    EventKind::TestCallStarted,
                    json!({
                        "call_id": call_id,
                        "extension": ext,
                        "test_name": test.name,
                        "analysis_type": "real_rtp",
                    }),
                );
            }
        }

        let ip = self.inner.advertised_ip;
        ResponseBuilder::new(message, 200, "OK")
            .with_to_tag()
            .header("Contact", format!("<sip:{}:{}>", ip, self.sip_port()))
            .server(config.server_header.as_str())
            .body("application/sdp", sdp::build_answer(ip, port))
            .build()
    }

    /// Bind an RTP processor for the call and run it on its own task
    async fn start_media(&self, call_id: &str) -> Result<u16> {
        if let Some(port) = self.media_port(call_id) {
            return Ok(port);
        }

        let config = &self.inner.config;
        let sink: Arc<dyn CallMetricsSink> = self.inner.calls.clone();
        let processor = RtpProcessor::bind_in_range(
            call_id,
            config.rtp_bind_ip,
            config.rtp_port_range(),
            sink,
            self.inner.rtp_config.clone(),
        )
        .await?;

        let handle = processor.handle();
        let port = handle.port();
        self.inner.media.insert(call_id.to_string(), handle);

        let registrar = self.clone();
        let call_id = call_id.to_string();
        tokio::spawn(async move {
            match processor.run().await {
                Ok(summary) => info!(
                    call_id = %call_id,
                    reason = ?summary.reason,
                    "RTP processing finished: {} packets, {} lost, {} malformed",
                    summary.packets_received,
                    summary.packets_lost,
                    summary.malformed
                ),
                Err(e) => warn!(call_id = %call_id, "RTP processing failed: {}", e),
            }
            registrar.inner.media.remove_if(&call_id, |_, h| h.port() == port);
        });

        Ok(port)
    }

    fn stop_media(&self, call_id: &str) {
        if let Some((_, handle)) = self.inner.media.remove(call_id) {
            handle.stop();
        }
    }

    /// Stop every running RTP processor
    pub fn stop_all_media(&self) {
        for entry in self.inner.media.iter() {
            entry.value().stop();
        }
        self.inner.media.clear();
    }

    fn handle_ack(&self, message: &SipMessage, peer: SocketAddr) {
        match message.call_id() {
            Some(call_id) if self.inner.calls.is_active(call_id) => {
                info!(call_id = %call_id, peer = %peer, "Call confirmed");
            }
            call_id => warn!(call_id = ?call_id, peer = %peer, "ACK for inactive call"),
        }
    }

    fn handle_bye(&self, message: &SipMessage, transport: Transport) -> String {
        let call_id = match message.call_id() {
            Some(call_id) => call_id,
            None => return self.reply(message, 400, "Bad Request").build(),
        };

        if self.inner.calls.end_call(call_id).is_some() {
            info!(call_id = %call_id, transport = %transport, "Call terminated");
        } else {
            debug!(call_id = %call_id, "BYE for unknown call");
        }
        self.stop_media(call_id);

        self.reply(message, 200, "OK").build()
    }

    /// Remove registrations whose expiry has passed and notify observers
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> Vec<String> {
        let expired = self.inner.devices.remove_expired(now);
        for extension in &expired {
            info!(extension = %extension, "Registration expired");
            self.publish(EventKind::DeviceExpired, json!({ "extension": extension }));
        }
        expired
    }

    pub fn sweep_expired(&self) -> Vec<String> {
        self.sweep_expired_at(Utc::now())
    }
}

/// `Expires` header, else the Contact `expires` parameter, else the default.
/// Unparsable values fall back to the default.
fn requested_expires(message: &SipMessage, default: u32) -> u32 {
    if let Some(value) = message.header("expires") {
        return value.trim().parse().unwrap_or(default);
    }
    message
        .header("contact")
        .and_then(|contact| header_param(contact, "expires"))
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
