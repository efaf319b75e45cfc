use bytes::Bytes;
use dbgvis_frame::Endian;

/// Application hook that answers resource requests from the peer.
///
/// Resources travel inside the frame stream, so a large blob delays every
/// frame queued behind it. Keep them small.
pub trait ResourceProvider: Send {
    /// The blob stored under `namespace`/`name`, if there is one.
    fn resource(&mut self, namespace: &str, name: &str) -> Option<Bytes>;
}

impl<F> ResourceProvider for F
where
    F: FnMut(&str, &str) -> Option<Bytes> + Send,
{
    fn resource(&mut self, namespace: &str, name: &str) -> Option<Bytes> {
        self(namespace, name)
    }
}

/// A resource received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub namespace: String,
    pub name: String,
    /// Exactly as sent; not byte-swapped.
    pub data: Bytes,
    /// Byte order of the sender, for callers that interpret `data`.
    pub remote_endian: Endian,
}
