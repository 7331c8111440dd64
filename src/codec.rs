use bytes::{Buf, Bytes, BytesMut};
use std::io;
use tokio_util::codec::Decoder;

/// Frames raw bytes in some legacy charset into UTF-8 chunks.
///
/// `encoding_rs` keeps partial multi-byte sequences inside the decoder, so
/// every call consumes the whole input buffer and a character split across two
/// reads still comes out whole.
pub struct Transcoder {
    decoder: encoding_rs::Decoder,
    flushed: bool,
}

impl Transcoder {
    pub fn new(charset: &'static encoding_rs::Encoding) -> Self {
        Self {
            decoder: charset.new_decoder(),
            flushed: false,
        }
    }

    fn transcode(&mut self, src: &mut BytesMut, last: bool) -> Option<Bytes> {
        let capacity = self
            .decoder
            .max_utf8_buffer_length(src.len())
            .unwrap_or_else(|| src.len() * 3 + 16);
        let mut out = vec![0u8; capacity];

        let (_result, read, written, _had_replacements) =
            self.decoder.decode_to_utf8(&src[..], &mut out, last);
        src.advance(read);

        if written == 0 {
            return None;
        }
        out.truncate(written);
        Some(Bytes::from(out))
    }
}

impl Decoder for Transcoder {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        Ok(self.transcode(src, false))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.flushed {
            buf.clear();
            return Ok(None);
        }
        self.flushed = true;
        Ok(self.transcode(buf, true))
    }
}
