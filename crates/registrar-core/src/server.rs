//! Listening sockets and the accept/receive loop

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::framing::StreamFramer;
use crate::registrar::SipRegistrar;
use crate::tls::build_tls_acceptor;
use crate::transport::Transport;

const UDP_BUFFER_SIZE: usize = 65535;
const STREAM_READ_SIZE: usize = 8192;
const WRITE_QUEUE_CAPACITY: usize = 64;

/// Running registrar. Dropping the handle also closes the listeners, but only
/// [`shutdown`](Self::shutdown) waits for them and stops RTP processors.
pub struct RegistrarHandle {
    registrar: SipRegistrar,
    udp_addr: SocketAddr,
    tcp_addr: SocketAddr,
    tls_addr: Option<SocketAddr>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RegistrarHandle {
    pub fn udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    pub fn tcp_addr(&self) -> SocketAddr {
        self.tcp_addr
    }

    /// `None` when TLS is disabled or could not be set up
    pub fn tls_addr(&self) -> Option<SocketAddr> {
        self.tls_addr
    }

    pub fn registrar(&self) -> &SipRegistrar {
        &self.registrar
    }

    /// Stop listening, close connections and stop RTP processors
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Registrar task ended abnormally: {}", e);
            }
        }
        self.registrar.stop_all_media();
        info!("SIP registrar stopped");
    }
}

struct Listeners {
    udp: Arc<UdpSocket>,
    tcp: TcpListener,
    tls: Option<(TcpListener, TlsAcceptor)>,
}

impl SipRegistrar {
    /// Bind UDP, TCP and (when possible) TLS and start serving.
    ///
    /// UDP and TCP bind failures are fatal. TLS problems only disable TLS.
    pub async fn start(&self) -> Result<RegistrarHandle> {
        let config = self.config();

        let udp_bind = SocketAddr::new(config.bind_host, config.udp_port);
        let udp = UdpSocket::bind(udp_bind).await.map_err(|source| Error::Bind {
            transport: Transport::Udp,
            addr: udp_bind,
            source,
        })?;
        let udp_addr = udp.local_addr()?;
        self.set_sip_port(udp_addr.port());
        info!("SIP registrar listening on UDP {}", udp_addr);

        let tcp_bind = SocketAddr::new(config.bind_host, config.tcp_port);
        let tcp = TcpListener::bind(tcp_bind).await.map_err(|source| Error::Bind {
            transport: Transport::Tcp,
            addr: tcp_bind,
            source,
        })?;
        let tcp_addr = tcp.local_addr()?;
        info!("SIP registrar listening on TCP {}", tcp_addr);

        let tls = self.bind_tls().await;
        let tls_addr = match &tls {
            Some((listener, _)) => listener.local_addr().ok(),
            None => None,
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let listeners = Listeners {
            udp: Arc::new(udp),
            tcp,
            tls,
        };

        let accept_task = tokio::spawn(self.clone().run_accept_loop(listeners, shutdown_rx.clone()));
        let sweep_task = tokio::spawn(self.clone().run_expiry_sweep(shutdown_rx));

        Ok(RegistrarHandle {
            registrar: self.clone(),
            udp_addr,
            tcp_addr,
            tls_addr,
            shutdown_tx,
            tasks: vec![accept_task, sweep_task],
        })
    }

    async fn bind_tls(&self) -> Option<(TcpListener, TlsAcceptor)> {
        let config = self.config();
        if !config.tls_enabled {
            info!("TLS disabled");
            return None;
        }

        let acceptor = match build_tls_acceptor(&config.tls_cert_path, &config.tls_key_path) {
            Ok(acceptor) => acceptor,
            Err(e) => {
                warn!("TLS not available: {}", e);
                return None;
            }
        };

        let addr = SocketAddr::new(config.bind_host, config.tls_port);
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Ok(local) = listener.local_addr() {
                    info!("SIP registrar listening on TLS {}", local);
                }
                Some((listener, acceptor))
            }
            Err(e) => {
                warn!("TLS not available, cannot bind {}: {}", addr, e);
                None
            }
        }
    }

    async fn run_accept_loop(self, listeners: Listeners, mut shutdown: watch::Receiver<bool>) {
        let Listeners { udp, tcp, tls } = listeners;
        let mut buf = vec![0u8; UDP_BUFFER_SIZE];

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,

                received = udp.recv_from(&mut buf) => match received {
                    Ok((len, peer)) => {
                        let data = buf[..len].to_vec();
                        let registrar = self.clone();
                        let socket = udp.clone();
                        tokio::spawn(async move {
                            if let Some(response) = registrar.handle_message(&data, peer, Transport::Udp).await {
                                if let Err(e) = socket.send_to(response.as_bytes(), peer).await {
                                    warn!(peer = %peer, "Failed to send UDP response: {}", e);
                                }
                            }
                        });
                    }
                    Err(e) => warn!("UDP receive error: {}", e),
                },

                accepted = tcp.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "TCP connection accepted");
                        tokio::spawn(self.clone().serve_stream(stream, peer, Transport::Tcp, shutdown.clone()));
                    }
                    Err(e) => warn!("TCP accept error: {}", e),
                },

                accepted = accept_optional(tls.as_ref().map(|(l, _)| l)), if tls.is_some() => match accepted {
                    Ok((stream, peer)) => {
                        if let Some((_, acceptor)) = &tls {
                            tokio::spawn(self.clone().handshake_tls(acceptor.clone(), stream, peer, shutdown.clone()));
                        }
                    }
                    Err(e) => warn!("TLS accept error: {}", e),
                },
            }
        }

        info!("SIP accept loop stopped");
    }

    async fn handshake_tls(
        self,
        acceptor: TlsAcceptor,
        stream: TcpStream,
        peer: SocketAddr,
        shutdown: watch::Receiver<bool>,
    ) {
        match timeout(self.config().tls_handshake_timeout(), acceptor.accept(stream)).await {
            Ok(Ok(tls_stream)) => {
                debug!(peer = %peer, "TLS connection established");
                self.serve_stream(tls_stream, peer, Transport::Tls, shutdown).await;
            }
            Ok(Err(e)) => warn!(peer = %peer, "TLS handshake failed: {}", e),
            Err(_) => warn!(peer = %peer, "TLS handshake timed out"),
        }
    }

    /// Read, frame and dispatch messages from one stream connection.
    ///
    /// Responses go through a writer task so slow handlers never block reads.
    async fn serve_stream<S>(self, stream: S, peer: SocketAddr, transport: Transport, mut shutdown: watch::Receiver<bool>)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let (tx, mut rx) = mpsc::channel::<String>(WRITE_QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(response) = rx.recv().await {
                if let Err(e) = writer.write_all(response.as_bytes()).await {
                    debug!(peer = %peer, "Write failed, closing connection: {}", e);
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        let mut framer = StreamFramer::new(self.config().max_message_size);
        let mut buf = vec![0u8; STREAM_READ_SIZE];

        'conn: loop {
            tokio::select! {
                _ = shutdown.changed() => break,

                read = reader.read(&mut buf) => match read {
                    Ok(0) => {
                        debug!(peer = %peer, transport = %transport, "Connection closed by peer");
                        break;
                    }
                    Ok(n) => {
                        framer.extend(&buf[..n]);
                        loop {
                            match framer.next_message() {
                                Ok(Some(message)) => self.dispatch_stream_message(message, peer, transport, tx.clone()),
                                Ok(None) => break,
                                Err(e) => {
                                    warn!(peer = %peer, transport = %transport, "Closing connection: {}", e);
                                    break 'conn;
                                }
                            }
                        }
                        trace!(peer = %peer, buffered = framer.buffered(), "Stream read");
                    }
                    Err(e) => {
                        debug!(peer = %peer, transport = %transport, "Read error: {}", e);
                        break;
                    }
                },
            }
        }
    }

    fn dispatch_stream_message(&self, message: Vec<u8>, peer: SocketAddr, transport: Transport, tx: mpsc::Sender<String>) {
        let registrar = self.clone();
        tokio::spawn(async move {
            if let Some(response) = registrar.handle_message(&message, peer, transport).await {
                if tx.send(response).await.is_err() {
                    debug!(peer = %peer, "Connection gone before response could be sent");
                }
            }
        });
    }

    async fn run_expiry_sweep(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config().expiry_sweep_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let expired = self.sweep_expired();
                    if !expired.is_empty() {
                        info!("Removed {} expired registrations", expired.len());
                    }
                }
            }
        }
        debug!("Registration expiry sweep stopped");
    }
}

async fn accept_optional(listener: Option<&TcpListener>) -> io::Result<(TcpStream, SocketAddr)> {
    match listener {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}
