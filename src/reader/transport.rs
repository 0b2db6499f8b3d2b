use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::ReaderError;
use crate::llrp::message_types::{self, MessageType};
use crate::llrp::{self, requests, Message};
use crate::reader::TransportListener;

/// Receives the reader initiated messages: tag reports, keepalives and
/// reader event notifications.
pub trait LlrpEndpoint: Send + Sync {
    fn on_async_message(&self, msg: &Message);
}

/// The connection boundary the read lifecycle drives. Messages are
/// structured; the lifecycle never touches raw frames. One request may be
/// outstanding at a time, which the single threaded lifecycle guarantees.
pub trait LlrpConnection: Send {
    fn connect(&mut self) -> Result<(), ReaderError>;
    fn send(&self, buf: &[u8]) -> Result<(), ReaderError>;
    /// Send and block for the response, up to `timeout`. A timeout is a
    /// communication failure; this layer never retries.
    fn transact(&self, buf: &[u8], timeout: Duration) -> Result<Message, ReaderError>;
    fn set_endpoint(&mut self, endpoint: Arc<dyn LlrpEndpoint>);
    fn add_transport_listener(&mut self, listener: Box<dyn TransportListener>);
    fn next_id(&self) -> u32;
    fn is_connected(&self) -> bool;
    fn disconnect(&mut self);
}

type ResponseSlot = Arc<(Mutex<Option<Message>>, Condvar)>;

/// TCP implementation. A dedicated thread reads frames off the socket,
/// acks keepalives directly, hands asynchronous messages to the endpoint
/// and parks responses for `transact` to pick up.
pub struct TcpLlrpConnection {
    ip_address: String,
    port: u16,

    socket: Mutex<Option<TcpStream>>,
    keepalive: Arc<Mutex<bool>>,
    msg_id: Arc<Mutex<u32>>,
    response: ResponseSlot,
    endpoint: Arc<Mutex<Option<Arc<dyn LlrpEndpoint>>>>,
    listeners: Arc<Mutex<Vec<Box<dyn TransportListener>>>>,
    read_thread: Option<JoinHandle<()>>,
}

impl TcpLlrpConnection {
    pub fn new(ip_address: &str, port: u16) -> TcpLlrpConnection {
        TcpLlrpConnection {
            ip_address: String::from(ip_address),
            port,
            socket: Mutex::new(None),
            keepalive: Arc::new(Mutex::new(true)),
            msg_id: Arc::new(Mutex::new(0)),
            response: Arc::new((Mutex::new(None), Condvar::new())),
            endpoint: Arc::new(Mutex::new(None)),
            listeners: Arc::new(Mutex::new(Vec::new())),
            read_thread: None,
        }
    }

    fn notify_listeners(listeners: &Arc<Mutex<Vec<Box<dyn TransportListener>>>>, bytes: &[u8], outbound: bool) {
        if let Ok(list) = listeners.lock() {
            for listener in list.iter() {
                listener.on_message(bytes, outbound);
            }
        }
    }
}

impl LlrpConnection for TcpLlrpConnection {
    fn connect(&mut self) -> Result<(), ReaderError> {
        let res = TcpStream::connect(format!("{}:{}", self.ip_address, self.port));
        let tcp_stream = match res {
            Ok(s) => s,
            Err(e) => return Err(ReaderError::Communication(format!("unable to connect: {e}"))),
        };
        self.socket = match tcp_stream.try_clone() {
            Ok(stream) => Mutex::new(Some(stream)),
            Err(_) => {
                return Err(ReaderError::Communication(String::from(
                    "error copying stream to thread",
                )))
            }
        };
        if let Ok(mut ka) = self.keepalive.lock() {
            *ka = true;
        }
        let mut t_stream = tcp_stream;
        let t_mutex = self.keepalive.clone();
        let msg_id = self.msg_id.clone();
        let response = self.response.clone();
        let endpoint = self.endpoint.clone();
        let listeners = self.listeners.clone();
        let handle = thread::spawn(move || {
            match t_stream.set_read_timeout(Some(Duration::from_secs(1))) {
                Ok(_) => (),
                Err(e) => {
                    println!("Error setting read timeout. {e}")
                }
            }
            loop {
                if let Ok(keepalive) = t_mutex.lock() {
                    // check if we've been told to quit
                    if *keepalive == false {
                        break;
                    }
                } else {
                    // unable to grab mutex...
                    break;
                }
                match read_frame(&mut t_stream) {
                    Ok(Some((frame_bytes, msg))) => {
                        Self::notify_listeners(&listeners, &frame_bytes, false);
                        dispatch(&mut t_stream, msg, &response, &endpoint);
                    }
                    Ok(None) => (),
                    Err(e) => match e.kind() {
                        ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset => {
                            break;
                        }
                        ErrorKind::TimedOut | ErrorKind::WouldBlock => (),
                        _ => println!("Error reading from reader. {e}"),
                    },
                }
            }
            // finalize what we're doing
            let fin_id = match msg_id.lock() {
                Ok(id) => *id,
                Err(_) => 0,
            };
            let close = requests::close_connection(&fin_id);
            match t_stream.write_all(&close) {
                Ok(_) => {
                    // best effort read of the close response
                    _ = read_frame(&mut t_stream);
                }
                Err(e) => println!("Error closing connection. {e}"),
            }
            println!("Thread reading from this reader has now closed.")
        });
        self.read_thread = Some(handle);
        Ok(())
    }

    fn send(&self, buf: &[u8]) -> Result<(), ReaderError> {
        if let Ok(stream) = self.socket.lock() {
            match &*stream {
                Some(s) => {
                    let mut w_stream = match s.try_clone() {
                        Ok(v) => v,
                        Err(_) => {
                            return Err(ReaderError::Communication(String::from(
                                "unable to copy stream",
                            )))
                        }
                    };
                    match w_stream.write_all(buf) {
                        Ok(_) => (),
                        Err(_) => {
                            return Err(ReaderError::Communication(String::from(
                                "error writing data",
                            )))
                        }
                    }
                    Self::notify_listeners(&self.listeners, buf, true);
                    Ok(())
                }
                None => Err(ReaderError::Communication(String::from("not connected"))),
            }
        } else {
            Err(ReaderError::MutexError(String::from("unable to get socket mutex")))
        }
    }

    fn transact(&self, buf: &[u8], timeout: Duration) -> Result<Message, ReaderError> {
        {
            let (slot, _) = &*self.response;
            match slot.lock() {
                Ok(mut pending) => *pending = None,
                Err(_) => {
                    return Err(ReaderError::MutexError(String::from(
                        "unable to get response mutex",
                    )))
                }
            }
        }
        self.send(buf)?;
        let deadline = Instant::now() + timeout;
        let (slot, signal) = &*self.response;
        let mut pending = match slot.lock() {
            Ok(p) => p,
            Err(_) => {
                return Err(ReaderError::MutexError(String::from(
                    "unable to get response mutex",
                )))
            }
        };
        loop {
            if let Some(msg) = pending.take() {
                return Ok(msg)
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ReaderError::Communication(String::from(
                    "timed out waiting for response",
                )))
            }
            pending = match signal.wait_timeout(pending, deadline - now) {
                Ok((guard, _)) => guard,
                Err(_) => {
                    return Err(ReaderError::MutexError(String::from(
                        "response mutex poisoned",
                    )))
                }
            };
        }
    }

    fn set_endpoint(&mut self, endpoint: Arc<dyn LlrpEndpoint>) {
        if let Ok(mut slot) = self.endpoint.lock() {
            *slot = Some(endpoint);
        }
    }

    fn add_transport_listener(&mut self, listener: Box<dyn TransportListener>) {
        if let Ok(mut list) = self.listeners.lock() {
            list.push(listener);
        }
    }

    fn next_id(&self) -> u32 {
        let mut output: u32 = 0;
        if let Ok(mut v) = self.msg_id.lock() {
            output = *v + 1;
            *v = output;
        }
        output
    }

    fn is_connected(&self) -> bool {
        if let Ok(socket) = self.socket.lock() {
            return socket.is_some()
        }
        false
    }

    fn disconnect(&mut self) {
        if let Ok(mut keepalive) = self.keepalive.lock() {
            *keepalive = false;
        }
        if let Some(handle) = self.read_thread.take() {
            _ = handle.join();
        }
        if let Ok(mut socket) = self.socket.lock() {
            *socket = None;
        }
    }
}

impl Drop for TcpLlrpConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Read one complete frame: the fixed header then the remainder of the
/// message. Returns None when the socket timed out between frames.
fn read_frame(stream: &mut TcpStream) -> Result<Option<(Vec<u8>, Message)>, std::io::Error> {
    let mut header_buf = [0u8; llrp::HEADER_LEN];
    match stream.read_exact(&mut header_buf) {
        Ok(_) => (),
        Err(e) => {
            return match e.kind() {
                ErrorKind::TimedOut | ErrorKind::WouldBlock => Ok(None),
                _ => Err(e),
            }
        }
    }
    let header = match llrp::decode_header(&header_buf) {
        Ok(h) => h,
        Err(e) => return Err(std::io::Error::new(ErrorKind::InvalidData, e)),
    };
    let body_len = header.length as usize - llrp::HEADER_LEN;
    let mut payload = vec![0u8; body_len];
    if body_len > 0 {
        stream.read_exact(&mut payload)?;
    }
    let mut frame = Vec::with_capacity(llrp::HEADER_LEN + body_len);
    frame.extend_from_slice(&header_buf);
    frame.extend_from_slice(&payload);
    let msg = Message {
        version: header.version,
        kind: header.kind,
        id: header.id,
        payload,
    };
    Ok(Some((frame, msg)))
}

/// Route one inbound message. Keepalives are acked right here on the read
/// thread and still forwarded so the watchdog timestamp updates.
fn dispatch(
    stream: &mut TcpStream,
    msg: Message,
    response: &ResponseSlot,
    endpoint: &Arc<Mutex<Option<Arc<dyn LlrpEndpoint>>>>,
) {
    let is_async = match MessageType::from_code(msg.kind) {
        Ok(kind) => kind.asynchronous(),
        Err(e) => {
            println!("Dropping message of type {}. {e}", msg.kind);
            return
        }
    };
    if msg.kind == message_types::KEEPALIVE {
        let ack = requests::keepalive_ack(&msg.id);
        match stream.write_all(&ack) {
            Ok(_) => (),
            Err(e) => println!("Error responding to keepalive. {e}"),
        }
    }
    if is_async {
        let target = match endpoint.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        if let Some(target) = target {
            target.on_async_message(&msg);
        }
        return
    }
    let (slot, signal) = &**response;
    if let Ok(mut pending) = slot.lock() {
        *pending = Some(msg);
        signal.notify_all();
    }
}
