#![no_main]

use burrow_protocol::ProxyArgs;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let argv: Vec<&str> = text.split('\n').collect();

    // Anything that parses must serialize back to the same fields
    if let Ok(args) = ProxyArgs::from_argv(&argv) {
        let again = ProxyArgs::from_argv(&args.to_argv());
        assert_eq!(again.ok(), Some(args));
    }
});
