//! A single-process loopback transport, standing in for the socket that
//! connects two real peers.
//!
//! The concurrency model treats Sender, Generator and Receiver as the same
//! process's common case: a Generator+Receiver pairing that services a
//! Sender inline on the calling thread rather than over an OS-level
//! connection. [`loopback_pair`] gives that pairing two cross-wired
//! [`std::io::Read`]/[`std::io::Write`] ends so the traffic between them
//! still goes through the real duplex channel and index codec rather than a
//! bare function call, without requiring either side to be [`Send`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;

type Queue = Rc<RefCell<VecDeque<u8>>>;

/// One end of a [`loopback_pair`]: bytes written here are what the other end
/// reads back.
pub struct LoopbackHalf {
    outbox: Queue,
    inbox: Queue,
}

impl Read for LoopbackHalf {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inbox = self.inbox.borrow_mut();
        let n = buf.len().min(inbox.len());
        for slot in buf.iter_mut().take(n) {
            *slot = inbox.pop_front().expect("n is bounded by inbox.len()");
        }
        Ok(n)
    }
}

impl Write for LoopbackHalf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outbox.borrow_mut().extend(buf.iter().copied());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Creates two cross-wired [`LoopbackHalf`] ends: everything written to one
/// is read back from the other, in both directions independently.
#[must_use]
pub fn loopback_pair() -> (LoopbackHalf, LoopbackHalf) {
    let a_to_b: Queue = Rc::new(RefCell::new(VecDeque::new()));
    let b_to_a: Queue = Rc::new(RefCell::new(VecDeque::new()));
    (
        LoopbackHalf {
            outbox: Rc::clone(&a_to_b),
            inbox: Rc::clone(&b_to_a),
        },
        LoopbackHalf {
            outbox: b_to_a,
            inbox: a_to_b,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_written_to_one_end_are_read_from_the_other() {
        let (mut a, mut b) = loopback_pair();
        a.write_all(b"hi").unwrap();
        let mut buf = [0u8; 2];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hi");
    }

    #[test]
    fn both_directions_are_independent() {
        let (mut a, mut b) = loopback_pair();
        a.write_all(b"a->b").unwrap();
        b.write_all(b"b->a").unwrap();

        let mut buf = [0u8; 4];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"a->b");
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"b->a");
    }

    #[test]
    fn a_short_read_returns_only_whats_available() {
        let (mut a, mut b) = loopback_pair();
        a.write_all(b"x").unwrap();
        let mut buf = [0u8; 4];
        let n = b.read(&mut buf).unwrap();
        assert_eq!(n, 1);
        assert_eq!(buf[0], b'x');
    }
}
