//! Message assembly: composed header followed by a filled payload.

use crate::clock::Clock;
use crate::header::Header;
use rand::Rng;

/// How payload bytes are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    Zero,
    /// Uniform bytes in `0..=254`.
    Random,
}

/// Transport metadata carried alongside a message. Opaque to the codec.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Route {
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: u32,
    pub dst_port: u32,
    pub interface: String,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub name: String,
    /// Header name as declared; resolved after the whole source is read.
    pub header_name: String,
    /// Index into the model's header table once resolved.
    pub header: Option<usize>,
    pub payload_bytes: u32,
    pub route: Route,
    pub fill: FillPolicy,
}

impl Message {
    /// Build the bytes of this message from scratch.
    pub fn build<R: Rng + ?Sized>(&self, header: &Header, clock: &dyn Clock, rng: &mut R) -> Vec<u8> {
        let mut out = header.compose(self.payload_bytes, clock);
        out.reserve(self.payload_bytes as usize);
        match self.fill {
            FillPolicy::Zero => out.resize(out.len() + self.payload_bytes as usize, 0),
            FillPolicy::Random => {
                for _ in 0..self.payload_bytes {
                    out.push(rng.gen_range(0..=254u8));
                }
            }
        }
        out
    }
}
