#![no_main]

use libfuzzer_sys::fuzz_target;
use relay::{net::decode, Packet};
use serde::{de::IgnoredAny, Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
enum Payload {
    Simple { text: String, number: i32 },
    Move(u32, u32),
    Leave,
}

fuzz_target!(|data: &[u8]| {
    let _ = decode::<Packet<Payload>>(data);
    let _ = decode::<IgnoredAny>(data);
});
