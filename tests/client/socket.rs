//! The blocking socket driver over an in-process transport.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use dtls_auth::message::MAX_PLAINTEXT_LEN;
use dtls_auth::{Datagram, DtlsSocket, Event};

use crate::common::*;

/// Hands every datagram to the scripted server and queues its answers.
#[derive(Clone)]
struct Loopback {
    server: Rc<RefCell<TestServer>>,
    inbox: Rc<RefCell<VecDeque<Vec<u8>>>>,
    /// Drop this many client datagrams before answering.
    drop_next: Rc<RefCell<usize>>,
}

impl Loopback {
    fn new() -> Self {
        Loopback {
            server: Rc::new(RefCell::new(TestServer::new())),
            inbox: Rc::new(RefCell::new(VecDeque::new())),
            drop_next: Rc::new(RefCell::new(0)),
        }
    }
}

impl Datagram for Loopback {
    fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        let mut drop_next = self.drop_next.borrow_mut();
        if *drop_next > 0 {
            *drop_next -= 1;
            return Ok(datagram.len());
        }

        let replies = self.server.borrow_mut().respond(datagram);
        self.inbox.borrow_mut().extend(replies);
        Ok(datagram.len())
    }

    fn recv_timeout(&self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>> {
        match self.inbox.borrow_mut().pop_front() {
            Some(datagram) => {
                buf[..datagram.len()].copy_from_slice(&datagram);
                Ok(Some(datagram.len()))
            }
            None => {
                std::thread::sleep(timeout.min(Duration::from_millis(5)));
                Ok(None)
            }
        }
    }
}

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn socket_connects_and_exchanges_data() {
    init_log();

    let loopback = Loopback::new();
    let mut socket = DtlsSocket::new(loopback.clone(), Arc::new(config())).unwrap();
    assert!(!socket.is_ready());

    socket.send(b"hello").unwrap();

    assert_eq!(socket.poll_event(WAIT).unwrap(), Some(Event::Ready));
    assert!(socket.is_ready());

    assert_eq!(
        socket.poll_event(WAIT).unwrap(),
        Some(Event::Message(b"echo:hello".to_vec()))
    );
    assert_eq!(loopback.server.borrow().received, vec![b"hello".to_vec()]);

    socket.send(b"again").unwrap();
    assert_eq!(
        socket.poll_event(WAIT).unwrap(),
        Some(Event::Message(b"echo:again".to_vec()))
    );
}

#[test]
fn socket_sends_and_receives_largest_record() {
    init_log();

    let loopback = Loopback::new();
    let mut socket = DtlsSocket::new(loopback.clone(), Arc::new(config())).unwrap();
    assert_eq!(socket.poll_event(WAIT).unwrap(), Some(Event::Ready));

    socket.send(&vec![7u8; MAX_PLAINTEXT_LEN]).unwrap();
    assert_eq!(
        loopback.server.borrow().received.last().map(|d| d.len()),
        Some(MAX_PLAINTEXT_LEN)
    );

    let Some(Event::Message(echo)) = socket.poll_event(WAIT).unwrap() else {
        panic!("expected the echo");
    };
    assert_eq!(echo.len(), MAX_PLAINTEXT_LEN);
    assert!(echo.starts_with(b"echo:"));
    assert!(echo[5..].iter().all(|&b| b == 7));
}

#[test]
fn socket_recovers_lost_client_hello() {
    init_log();

    let config = dtls_auth::Config::builder()
        .rng_seed(Some(42))
        .flight_rto(Duration::from_millis(20))
        .build()
        .unwrap();

    let loopback = Loopback::new();
    *loopback.drop_next.borrow_mut() = 2;

    let mut socket = DtlsSocket::new(loopback.clone(), Arc::new(config)).unwrap();
    assert_eq!(socket.poll_event(WAIT).unwrap(), Some(Event::Ready));
}

#[test]
fn socket_poll_times_out_quietly() {
    init_log();

    let loopback = Loopback::new();
    let mut socket = DtlsSocket::new(loopback.clone(), Arc::new(config())).unwrap();
    assert_eq!(socket.poll_event(WAIT).unwrap(), Some(Event::Ready));

    assert_eq!(socket.poll_event(Duration::from_millis(20)).unwrap(), None);
    assert!(socket.is_ready());
}

#[test]
fn socket_restart_connection() {
    init_log();

    let loopback = Loopback::new();
    let mut socket = DtlsSocket::new(loopback.clone(), Arc::new(config())).unwrap();
    assert_eq!(socket.poll_event(WAIT).unwrap(), Some(Event::Ready));

    socket.restart_connection().unwrap();
    assert!(!socket.is_ready());

    assert_eq!(socket.poll_event(WAIT).unwrap(), Some(Event::Ready));
    assert!(socket.is_ready());

    socket.send(b"second session").unwrap();
    assert_eq!(
        socket.poll_event(WAIT).unwrap(),
        Some(Event::Message(b"echo:second session".to_vec()))
    );
}
