use crate::boxes::BoxContent;
use crate::error::Result;
use crate::source::Payload;
use std::io::Write;

/// `mdat` content.
///
/// A parsed box keeps one lazy range over its source. A built box holds the
/// interleaved runs produced by the multiplexer, each either a merged
/// in-memory buffer or a contiguous source range.
#[derive(Debug, Clone)]
pub enum MediaPayload {
    Source(Payload),
    Interleaved(Vec<Payload>),
}

#[derive(Debug, Clone)]
pub struct MediaDataBox {
    pub payload: MediaPayload,
}

impl MediaDataBox {
    pub fn from_payload(payload: Payload) -> Self {
        Self { payload: MediaPayload::Source(payload) }
    }

    pub fn interleaved(runs: Vec<Payload>) -> Self {
        Self { payload: MediaPayload::Interleaved(runs) }
    }

    pub fn runs(&self) -> &[Payload] {
        match &self.payload {
            MediaPayload::Source(p) => std::slice::from_ref(p),
            MediaPayload::Interleaved(runs) => runs,
        }
    }
}

impl BoxContent for MediaDataBox {
    fn content_size(&self) -> u64 {
        self.runs().iter().map(Payload::len).sum()
    }

    fn write_content(&self, w: &mut dyn Write) -> Result<()> {
        for run in self.runs() {
            run.write_to(w)?;
        }
        Ok(())
    }
}
