#![allow(dead_code)]

use std::{
    io,
    sync::Arc,
    thread::{self, ThreadId},
    time::Duration,
};

use channelfw::{
    buf::ByteBuffer, read_callback, write_callback, Channel, ConnectRequestContext,
    ConnectionContext, ReadCompletedCallback, Timeout, VirtualConnection, WriteAmount,
    WriteCompletedCallback,
};

pub const WAIT: Duration = Duration::from_secs(5);
pub const QUIET: Duration = Duration::from_millis(200);

pub fn channel() -> Channel {
    Channel::builder()
        .worker_threads(2)
        .read_timeout(Duration::from_secs(10))
        .write_timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// A connected (client, server) pair over loopback.
pub fn pair(channel: &Channel) -> (ConnectionContext, ConnectionContext) {
    let acceptor = channel.bind("127.0.0.1:0").unwrap();
    let request = ConnectRequestContext::new(acceptor.local_addr().unwrap());
    let client = channel.connect(&request).unwrap();
    let server = acceptor.accept().unwrap();
    (client, server)
}

/// Write all of `data` synchronously.
pub fn send(conn: &ConnectionContext, data: &[u8]) {
    let write = conn.write_interface();
    write.set_buffer(ByteBuffer::wrap(data));
    let n = write.write(WriteAmount::All, Timeout::UseDefault).unwrap();
    assert_eq!(n, data.len() as u64);
}

pub struct Completed {
    pub vc: VirtualConnection,
    pub thread: ThreadId,
    pub result: io::Result<u64>,
    /// Flipped content of the buffers at completion.
    pub content: Option<Vec<u8>>,
}

/// A read callback reporting every completion over a channel.
pub fn recorder() -> (
    Arc<dyn ReadCompletedCallback>,
    flume::Receiver<Completed>,
) {
    let (tx, rx) = flume::unbounded();
    let callback = read_callback(move |vc, ctx, result| {
        let content = ctx.with_buffers(|buffers| {
            channelfw::buf::leading_buffers(buffers)
                .flat_map(|buf| buf.window(0, buf.position()).unwrap_or_default().to_vec())
                .collect::<Vec<u8>>()
        });
        let _ = tx.send(Completed {
            vc,
            thread: thread::current().id(),
            result,
            content: Some(content).filter(|c| !c.is_empty()),
        });
    });
    (callback, rx)
}

/// A write callback reporting `Ok(vc)` or the error kind of every completion.
pub fn write_recorder() -> (
    Arc<dyn WriteCompletedCallback>,
    flume::Receiver<Result<VirtualConnection, io::ErrorKind>>,
) {
    let (tx, rx) = flume::unbounded();
    let err_tx = tx.clone();
    let callback = write_callback(
        move |vc, _ctx| {
            let _ = tx.send(Ok(vc));
        },
        move |_vc, _ctx, e| {
            let _ = err_tx.send(Err(e.kind()));
        },
    );
    (callback, rx)
}

/// Start a write the peer never drains, so it stays outstanding.
pub fn stalled_write(
    conn: &ConnectionContext,
    callback: Arc<dyn WriteCompletedCallback>,
) {
    let write = conn.write_interface();
    write.set_buffer(ByteBuffer::wrap(vec![0u8; 64 * 1024 * 1024]));
    let outcome = write.write_async(WriteAmount::All, callback, false, Timeout::Infinite);
    assert_eq!(outcome, channelfw::IoOutcome::Pending);
    assert!(write.is_pending());
}
