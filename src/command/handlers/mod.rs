//! Handlers for the built-in commands
//!
//! Every handler has the same shape:
//! `fn(&mut DeviceContext, Invocation, &mut Output) -> HandlerOutcome`.

pub mod fs20;
pub mod network;
pub mod onewire;
pub mod portio;
pub mod rc5;
pub mod system;

use ecmd_shared::{HandlerError, HandlerOutcome};
use std::fmt::{Display, Write};
use tracing::debug;

use super::Output;
use crate::hardware::EventQueue;

/// Code returned when a device or bus operation fails
pub const DEVICE_ERROR: i16 = -2;

pub(crate) fn parse_error() -> HandlerOutcome {
    HandlerOutcome::Error(HandlerError::Parse)
}

pub(crate) fn device_error() -> HandlerOutcome {
    HandlerOutcome::Error(HandlerError::Code(DEVICE_ERROR))
}

/// Write as many `record\n` lines as fit, then empty the queue
///
/// Records that did not fit are dropped with the rest of the queue.
pub(crate) fn drain_queue<T: Display>(
    queue: &mut EventQueue<T>,
    record_len: usize,
    out: &mut Output<'_>,
) -> HandlerOutcome {
    let width = record_len + 1;
    let mut emitted = 0;

    for record in queue.iter() {
        if out.len() + width > out.capacity() {
            break;
        }
        let _ = writeln!(out, "{}", record);
        emitted += 1;
    }

    let dropped = queue.len() - emitted;
    if dropped > 0 {
        debug!("Queue drain emitted {} records, dropped {}", emitted, dropped);
    }
    queue.clear();

    out.done()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{Fs20Frame, Rc5Frame};

    #[test]
    fn test_drain_fits_exact_number_of_records() {
        let mut queue = EventQueue::new(16);
        for i in 0..12u8 {
            queue.push(Fs20Frame::new(0x1234, i, 0x11));
        }

        // room for exactly five 8-byte records and their newlines
        let mut buf = [0u8; 5 * 9];
        let mut out = Output::new(&mut buf);
        let outcome = drain_queue(&mut queue, Fs20Frame::RECORD_LEN, &mut out);

        assert_eq!(outcome, HandlerOutcome::Done { written: 45 });
        assert_eq!(&out.as_bytes()[..9], b"12340011\n");
        assert_eq!(&out.as_bytes()[36..], b"12340411\n");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_four_byte_records() {
        let mut queue = EventQueue::new(12);
        for address in 0..12u8 {
            queue.push(Rc5Frame::new(address, 7));
        }
        assert_eq!(queue.len(), 12);

        let mut buf = [0u8; 5 * 5];
        let mut out = Output::new(&mut buf);
        let outcome = drain_queue(&mut queue, Rc5Frame::RECORD_LEN, &mut out);

        assert_eq!(outcome, HandlerOutcome::Done { written: 25 });
        assert_eq!(out.as_bytes(), b"0007\n0107\n0207\n0307\n0407\n");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_with_spare_room() {
        let mut queue = EventQueue::new(4);
        queue.push(Fs20Frame::new(1, 2, 3));

        let mut buf = [0u8; 64];
        let mut out = Output::new(&mut buf);
        drain_queue(&mut queue, Fs20Frame::RECORD_LEN, &mut out);
        assert_eq!(out.as_bytes(), b"00010203\n");
    }

    #[test]
    fn test_drain_empty_queue_is_ok() {
        let mut queue: EventQueue<Fs20Frame> = EventQueue::new(4);
        let mut buf = [0u8; 16];
        let mut out = Output::new(&mut buf);
        assert_eq!(
            drain_queue(&mut queue, Fs20Frame::RECORD_LEN, &mut out),
            HandlerOutcome::OK
        );
    }
}
