#![no_main]

use arbitrary::Arbitrary;
use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use relay::{
    net::{deserializer::WireDeserializer, serializer::WireSerializer},
    Packet, RelayMode,
};
use serde::{de::Deserialize, ser::Serialize};

#[derive(Arbitrary, Serialize, Deserialize, Debug, PartialEq)]
enum Payload {
    Simple { text: String, number: i64 },
    Route(RelayMode, Option<Vec<u16>>),
    Flag(bool, char),
    Leave,
}

fuzz_target!(|data: Packet<Payload>| {
    roundtrip(data);
});

fn roundtrip(packet: Packet<Payload>) {
    let mut buff = BytesMut::new();
    let mut ser = WireSerializer::new(&mut buff);

    packet.serialize(&mut ser).unwrap();

    let size = ser.size;
    let buf = buff.freeze();
    assert_eq!(size, buf.len());

    let mut deser = WireDeserializer::new(&buf[..]);

    let out = Packet::<Payload>::deserialize(&mut deser).unwrap();
    assert_eq!(size, deser.consumed);
    assert_eq!(packet, out);
}
