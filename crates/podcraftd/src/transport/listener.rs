//! Accept loop for the control socket.

use std::fs;
use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use podcraft_config::SocketEndpoint;
use tracing::{debug, info, warn};

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

const IDLE_POLL: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to the control endpoint but not yet accepting.
#[derive(Debug)]
pub struct SocketListener {
    endpoint: SocketEndpoint,
    acceptor: Acceptor,
}

#[derive(Debug)]
enum Acceptor {
    Tcp(TcpListener),
    Unix {
        listener: UnixListener,
        path: Utf8PathBuf,
    },
}

impl Acceptor {
    fn set_nonblocking(&self) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            Self::Unix { listener, .. } => listener.set_nonblocking(true),
        }
    }

    /// Polls for one connection; `None` when nobody is waiting.
    fn poll(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Tcp(stream))
            }),
            Self::Unix { listener, .. } => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Unix(stream))
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn remove_socket_file(&self) {
        let Self::Unix { path, .. } = self else {
            return;
        };
        if let Err(error) = fs::remove_file(path)
            && error.kind() != io::ErrorKind::NotFound
        {
            warn!(target: LISTENER_TARGET, path = %path, error = %error, "failed to remove control socket");
        }
    }
}

impl SocketListener {
    /// Binds `endpoint`.
    ///
    /// A Unix socket file nobody accepts on is a leftover from a daemon that
    /// died and is replaced; a live one is refused.
    pub fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let acceptor = match endpoint {
            SocketEndpoint::Tcp { host, port } => Acceptor::Tcp(bind_tcp(endpoint, host, *port)?),
            SocketEndpoint::Unix { path } => {
                clear_leftover_socket(path)?;
                let listener = UnixListener::bind(path).map_err(|source| ListenerError::Bind {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
                Acceptor::Unix {
                    listener,
                    path: path.clone(),
                }
            }
        };
        Ok(Self {
            endpoint: endpoint.clone(),
            acceptor,
        })
    }

    /// Bound TCP address; `None` for Unix sockets.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.acceptor {
            Acceptor::Tcp(listener) => listener.local_addr().ok(),
            Acceptor::Unix { .. } => None,
        }
    }

    /// Moves the listener onto a background thread that hands every accepted
    /// connection to `handler` on a thread of its own.
    pub fn start(self, handler: Arc<dyn ConnectionHandler>) -> Result<ListenerHandle, ListenerError> {
        if let Err(source) = self.acceptor.set_nonblocking() {
            self.acceptor.remove_socket_file();
            return Err(ListenerError::Configure { source });
        }
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("podcraft-control".to_owned())
            .spawn(move || self.serve(&thread_stop, &handler))
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            stop,
            thread: Some(thread),
        })
    }

    fn serve(self, stop: &AtomicBool, handler: &Arc<dyn ConnectionHandler>) {
        info!(target: LISTENER_TARGET, endpoint = %self.endpoint, "control socket listening");
        let mut reported = None::<io::ErrorKind>;
        while !stop.load(Ordering::SeqCst) {
            match self.acceptor.poll() {
                Ok(Some(stream)) => {
                    reported = None;
                    let handler = Arc::clone(handler);
                    thread::spawn(move || handler.handle(stream));
                }
                Ok(None) => thread::sleep(IDLE_POLL),
                Err(error) => {
                    // Repeats of the same failure are logged once.
                    if reported != Some(error.kind()) {
                        warn!(target: LISTENER_TARGET, error = %error, "accept failed");
                    }
                    reported = Some(error.kind());
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        self.acceptor.remove_socket_file();
        debug!(target: LISTENER_TARGET, "control socket closed");
    }
}

/// Running accept loop.
#[derive(Debug)]
pub struct ListenerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Asks the accept loop to stop after its current poll.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept loop to exit.
    pub fn join(mut self) -> Result<(), ListenerError> {
        self.thread
            .take()
            .map_or(Ok(()), |thread| thread.join().map_err(|_| ListenerError::Panicked))
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn bind_tcp(endpoint: &SocketEndpoint, host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs.next().ok_or_else(|| ListenerError::Unresolved {
        host: host.to_owned(),
        port,
    })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::Bind {
        endpoint: endpoint.to_string(),
        source,
    })
}

fn clear_leftover_socket(path: &Utf8Path) -> Result<(), ListenerError> {
    let stale = |source| ListenerError::StaleSocket {
        path: path.to_path_buf(),
        source,
    };
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => return Err(stale(source)),
    };
    if !metadata.file_type().is_socket() {
        return Err(ListenerError::NotASocket {
            path: path.to_path_buf(),
        });
    }
    match UnixStream::connect(path) {
        Ok(_) => Err(ListenerError::SocketBusy {
            path: path.to_path_buf(),
        }),
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ) =>
        {
            info!(target: LISTENER_TARGET, path = %path, "removing leftover control socket");
            fs::remove_file(path).map_err(stale)
        }
        Err(source) => Err(stale(source)),
    }
}
