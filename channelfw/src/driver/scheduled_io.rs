use std::{io, time::Instant};

use super::{
    op::{Completion, Op},
    ready::{Direction, Ready},
};
use crate::io::timed_out;

/// Requests parked on one connection, at most one per direction.
#[derive(Default)]
pub(crate) struct ScheduledIo {
    /// Pending read.
    reader: Option<Op>,
    /// Pending write.
    writer: Option<Op>,
}

impl ScheduledIo {
    fn slot(&mut self, direction: Direction) -> &mut Option<Op> {
        match direction {
            Direction::Read => &mut self.reader,
            Direction::Write => &mut self.writer,
        }
    }

    /// Attempt a fresh request right away; park it if the socket is dry.
    pub(crate) fn submit(&mut self, op: Op) {
        let direction = op.direction();
        if let Some(op) = op.drive() {
            let slot = self.slot(direction);
            debug_assert!(slot.is_none(), "two outstanding {direction} requests");
            if let Some(stale) = slot.replace(op) {
                stale.complete(Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "request superseded",
                )));
            }
        }
    }

    /// Retry the requests whose direction became ready.
    pub(crate) fn wake(&mut self, ready: Ready) {
        for direction in [Direction::Read, Direction::Write] {
            if (direction.mask() & ready).is_empty() {
                continue;
            }
            let slot = self.slot(direction);
            if let Some(op) = slot.take() {
                *slot = op.drive();
            }
        }
    }

    /// Retry the request once; if it still cannot finish, time it out.
    /// With `redirect` the outcome goes there instead of to the callback the
    /// request was issued with. Returns whether there was a request to cancel.
    pub(crate) fn cancel(&mut self, direction: Direction, redirect: Option<Completion>) -> bool {
        match self.slot(direction).take() {
            Some(mut op) => {
                if let Some(completion) = redirect {
                    op.redirect(completion);
                }
                if let Some(op) = op.drive() {
                    op.complete(Err(timed_out()));
                }
                true
            }
            None => false,
        }
    }

    /// Fail every parked request with `kind`.
    pub(crate) fn fail_all(&mut self, kind: io::ErrorKind, msg: &'static str) {
        for direction in [Direction::Read, Direction::Write] {
            if let Some(op) = self.slot(direction).take() {
                op.complete(Err(io::Error::new(kind, msg)));
            }
        }
    }

    /// Earliest deadline among the parked requests.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        [&self.reader, &self.writer]
            .into_iter()
            .filter_map(|op| op.as_ref().and_then(Op::deadline))
            .min()
    }

    /// Time out every request whose deadline has passed.
    pub(crate) fn expire(&mut self, now: Instant) {
        for direction in [Direction::Read, Direction::Write] {
            let slot = self.slot(direction);
            if slot
                .as_ref()
                .and_then(Op::deadline)
                .is_some_and(|deadline| deadline <= now)
            {
                if let Some(op) = slot.take() {
                    op.complete(Err(timed_out()));
                }
            }
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.reader.is_none() && self.writer.is_none()
    }
}
