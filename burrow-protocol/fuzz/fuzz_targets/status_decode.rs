#![no_main]

use burrow_protocol::StatusCodec;
use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    let mut codec = StatusCodec::with_max_message_size(4096);
    let mut buf = BytesMut::from(data);

    // Never panics: Ok(None) on short input, Ok(Some(status)) or Err(_) otherwise
    let _ = codec.decode(&mut buf);
});
