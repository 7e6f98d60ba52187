#![no_main]

use dod::protocol::{Command, ServerLine, decode_handshake};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|line: &str| {
    let _ = decode_handshake(line);

    // Anything a client sends decodes to something the server can re-encode
    let command = Command::decode(line);
    let _ = command.to_string();

    // Every server line the codec recognises encodes back to itself
    let reply = ServerLine::decode(line);
    if !matches!(reply, ServerLine::Other(_)) && !line.contains(['\r', '\n']) {
        assert_eq!(ServerLine::decode(&reply.to_string()), reply);
    }
});
