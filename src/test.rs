use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use quickcheck::{quickcheck, TestResult};
use serde::{de::IgnoredAny, Deserialize, Serialize};

use crate::{
    channel::{channel_id_from_workshop_id, ChannelConfig, ChannelID, ChannelState, Registry},
    consts::{DEFAULT_PEER_COUNT, MAXIMUM_QUEUED_NOTICES},
    error::{EncodingError, RelayError, TransportError},
    host::{config::HostConfig, Host},
    net::{decode, decode_limited, encode, encode_limited, tag},
    packet::{Packet, Payload, ReceiveInfo, RelayDecision},
    peer::PeerID,
    transport::{Delivery, Transport},
    Channel,
};

const CHANNEL: ChannelID = 4242;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
enum TestPayload {
    Simple { text: String, number: i32 },
    Ping,
    Forward(u32, Option<String>),
}

#[derive(Default)]
struct Log {
    seen: Vec<(PeerID, ReceiveInfo, TestPayload)>,
    decision: RelayDecision,
    rename: Option<String>,
}

impl Payload for TestPayload {
    type Context = Log;

    fn kind(&self) -> &'static str {
        match self {
            TestPayload::Simple { .. } => "Simple",
            TestPayload::Ping => "Ping",
            TestPayload::Forward(..) => "Forward",
        }
    }

    fn received(&mut self, origin: PeerID, info: &ReceiveInfo, ctx: &mut Log) -> RelayDecision {
        ctx.seen.push((origin, *info, self.clone()));
        if info.is_authority {
            if let (Some(rename), TestPayload::Simple { text, .. }) = (&ctx.rename, self) {
                *text = rename.clone();
            }
        }
        ctx.decision
    }
}

/// Transport double that records every send
#[derive(Default)]
struct Recorder {
    local: PeerID,
    authority: Option<PeerID>,
    ready: bool,
    interactive: bool,
    peers: Vec<PeerID>,
    names: HashMap<PeerID, String>,
    handlers: Vec<ChannelID>,
    failing: HashSet<PeerID>,
    to_authority: Vec<(ChannelID, Bytes)>,
    sent: Vec<(ChannelID, Bytes, PeerID)>,
    inbox: VecDeque<Delivery>,
}

impl Recorder {
    fn authority(local: u64, peers: &[u64]) -> Self {
        Recorder {
            local: PeerID(local),
            authority: Some(PeerID(local)),
            ready: true,
            interactive: true,
            peers: peers.iter().copied().map(PeerID).collect(),
            ..Default::default()
        }
    }

    fn client(local: u64, authority: u64) -> Self {
        Recorder {
            local: PeerID(local),
            authority: Some(PeerID(authority)),
            ready: true,
            interactive: true,
            peers: vec![PeerID(authority), PeerID(local)],
            ..Default::default()
        }
    }

    fn targets(&self) -> Vec<PeerID> {
        let mut targets: Vec<_> = self.sent.iter().map(|(_, _, peer)| *peer).collect();
        targets.sort();
        targets
    }
}

impl Transport for Recorder {
    fn local_id(&self) -> PeerID {
        self.local
    }

    fn authority_id(&self) -> Option<PeerID> {
        self.authority
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn peer_capacity(&self) -> usize {
        8
    }

    fn register_handler(&mut self, channel: ChannelID) -> Result<(), TransportError> {
        self.handlers.push(channel);
        Ok(())
    }

    fn unregister_handler(&mut self, channel: ChannelID) -> Result<(), TransportError> {
        self.handlers.retain(|c| *c != channel);
        Ok(())
    }

    fn send_to_authority(&mut self, channel: ChannelID, bytes: Bytes) -> Result<(), TransportError> {
        self.to_authority.push((channel, bytes));
        Ok(())
    }

    fn send_to(&mut self, channel: ChannelID, bytes: Bytes, peer: PeerID) -> Result<(), TransportError> {
        if self.failing.contains(&peer) {
            return Err(TransportError::Disconnected(peer));
        }
        self.sent.push((channel, bytes, peer));
        Ok(())
    }

    fn peers(&self, out: &mut Vec<PeerID>) {
        out.extend(self.peers.iter().copied());
    }

    fn display_name(&self, peer: PeerID) -> Option<String> {
        self.names.get(&peer).cloned()
    }

    fn try_recv(&mut self) -> Option<Delivery> {
        self.inbox.pop_front()
    }
}

fn open(transport: Recorder, registry: &Registry) -> Channel<TestPayload, Recorder> {
    let config = ChannelConfig::new(CHANNEL, "Test Mod").unwrap();
    Channel::new(config, transport, registry).unwrap()
}

fn simple(origin: u64, text: &str) -> Packet<TestPayload> {
    Packet::new(
        PeerID(origin),
        TestPayload::Simple {
            text: text.to_string(),
            number: 7,
        },
    )
}

fn delivery(sender: u64, packet: &Packet<TestPayload>) -> Delivery {
    Delivery {
        channel_id: CHANNEL,
        bytes: encode(packet).unwrap(),
        sender: PeerID(sender),
        sender_is_authority: false,
    }
}

fn collect<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, Arc<Mutex<Vec<T>>>) {
    let shared = Arc::new(Mutex::new(Vec::new()));
    (shared.clone(), shared)
}

#[test]
fn second_instance_is_fatal() {
    let registry = Registry::new();
    let first = open(Recorder::authority(1, &[1]), &registry);

    let config = ChannelConfig::new(CHANNEL, "Other Mod").unwrap();
    let err = Channel::<TestPayload, _>::new(config, Recorder::authority(1, &[1]), &registry)
        .unwrap_err();

    assert!(err.is_fatal());
    match err {
        RelayError::AlreadyInstanced {
            channel_id,
            owner,
            current,
        } => {
            assert_eq!(channel_id, CHANNEL);
            assert_eq!(owner, "Other Mod");
            assert_eq!(current, "Test Mod");
        }
        e => panic!("Unexpected error: {e:?}"),
    }
    assert_eq!(first.state(), ChannelState::Active);
}

#[test]
fn dispose_frees_channel_id() {
    let registry = Registry::new();
    let mut channel = open(Recorder::authority(1, &[1]), &registry);
    assert!(registry.is_active(CHANNEL));
    assert_eq!(channel.transport().handlers, vec![CHANNEL]);

    channel.dispose();
    channel.dispose();
    assert_eq!(channel.state(), ChannelState::Disposed);
    assert!(!registry.is_active(CHANNEL));
    assert!(channel.transport().handlers.is_empty());

    let packet = simple(1, "late");
    let err = channel
        .send_to_authority(packet, None, &mut Log::default())
        .unwrap_err();
    assert!(matches!(err, RelayError::Disposed(CHANNEL)));

    let again = open(Recorder::authority(1, &[1]), &registry);
    drop(again);
    assert!(!registry.is_active(CHANNEL));
}

#[test]
fn global_registry_is_shared() {
    let id = channel_id_from_workshop_id(9_000_001);
    let config = ChannelConfig::new(id, "Global Mod").unwrap();
    let channel = Channel::<TestPayload, _>::create(config, Recorder::authority(1, &[1])).unwrap();

    assert_eq!(Registry::global().owner(id).as_deref(), Some("Global Mod"));
    drop(channel);
    assert!(!Registry::global().is_active(id));
}

#[test]
fn transport_not_ready() {
    let registry = Registry::new();
    let transport = Recorder {
        ready: false,
        ..Recorder::authority(1, &[1])
    };
    assert!(Packet::from_transport(&transport, TestPayload::Ping).is_err());

    let config = ChannelConfig::new(CHANNEL, "Test Mod").unwrap();
    let err = Channel::<TestPayload, _>::new(config, transport, &registry).unwrap_err();
    assert!(matches!(err, RelayError::TransportNotReady(_)));
    assert!(err.is_fatal());
    assert!(!registry.is_active(CHANNEL));
}

#[test]
fn listener_can_be_skipped() {
    let registry = Registry::new();
    let config = ChannelConfig::new(CHANNEL, "Test Mod")
        .unwrap()
        .with_listener(false);
    let channel =
        Channel::<TestPayload, _>::new(config, Recorder::client(2, 1), &registry).unwrap();

    assert!(!channel.is_listening());
    assert!(channel.transport().handlers.is_empty());
}

#[test]
fn authority_delivers_to_itself() {
    let registry = Registry::new();
    let mut channel = open(Recorder::authority(1, &[1, 2, 3]), &registry);
    let mut log = Log::default();

    let packet = channel.packet(TestPayload::Ping).unwrap();
    assert_eq!(packet.original_sender, PeerID(1));
    channel.send_to_authority(packet, None, &mut log).unwrap();

    assert_eq!(log.seen.len(), 1);
    let (origin, info, payload) = &log.seen[0];
    assert_eq!(*origin, PeerID(1));
    assert_eq!(info.sender, PeerID(1));
    assert!(info.is_authority);
    assert_eq!(*payload, TestPayload::Ping);

    assert!(channel.transport().to_authority.is_empty());
    assert!(channel.transport().sent.is_empty());
}

#[test]
fn serialize_test_goes_through_transport() {
    let registry = Registry::new();
    let mut channel = open(Recorder::authority(1, &[1, 2]), &registry);
    channel.set_serialize_test(true);
    let mut log = Log::default();

    let packet = simple(1, "loop");
    channel
        .send_to_authority(packet.clone(), None, &mut log)
        .unwrap();

    assert!(log.seen.is_empty());
    let (id, bytes) = &channel.transport().to_authority[0];
    assert_eq!(*id, CHANNEL);
    assert_eq!(decode::<Packet<TestPayload>>(bytes).unwrap(), packet);
}

#[test]
fn client_sends_to_authority() {
    let registry = Registry::new();
    let mut channel = open(Recorder::client(2, 1), &registry);
    let mut log = Log::default();

    let packet = channel.packet(TestPayload::Forward(3, None)).unwrap();
    channel
        .send_to_authority(packet.clone(), None, &mut log)
        .unwrap();

    assert!(log.seen.is_empty());
    let (_, bytes) = &channel.transport().to_authority[0];
    let decoded: Packet<TestPayload> = decode(bytes).unwrap();
    assert_eq!(decoded.original_sender, PeerID(2));
    assert_eq!(decoded, packet);

    let cached = Bytes::from_static(b"cached");
    channel
        .send_to_authority(packet, Some(cached.clone()), &mut log)
        .unwrap();
    assert_eq!(channel.transport().to_authority[1].1, cached);
}

#[test]
fn client_cannot_relay() {
    let registry = Registry::new();
    let mut channel = open(Recorder::client(2, 1), &registry);
    let packet = simple(2, "nope");

    let err = channel.send_to_peer(&packet, PeerID(3), None).unwrap_err();
    assert!(matches!(err, RelayError::NotAuthority { .. }));
    assert!(err.is_fatal());

    let err = channel.send_to_everyone(&packet, None).unwrap_err();
    assert!(matches!(err, RelayError::NotAuthority { .. }));
    assert!(channel.transport().sent.is_empty());
}

#[test]
fn client_ignores_relay_decision() {
    let registry = Registry::new();
    let mut channel = open(Recorder::client(2, 1), &registry);
    let mut log = Log {
        decision: RelayDecision::to_everyone(),
        ..Default::default()
    };

    let packet = simple(3, "from three");
    channel.receive(delivery(1, &packet), &mut log);

    assert_eq!(log.seen.len(), 1);
    assert_eq!(log.seen[0].0, PeerID(3));
    assert!(!log.seen[0].1.is_authority);
    assert!(channel.transport().sent.is_empty());
}

#[test]
fn relay_to_others_skips_sender() {
    let registry = Registry::new();
    let mut channel = open(Recorder::authority(1, &[1, 2, 3, 4]), &registry);
    let mut log = Log {
        decision: RelayDecision::to_others(),
        ..Default::default()
    };

    let incoming = delivery(2, &simple(2, "hi"));
    channel.receive(incoming.clone(), &mut log);

    assert_eq!(log.seen.len(), 1);
    assert_eq!(channel.transport().targets(), vec![PeerID(3), PeerID(4)]);
    for (id, bytes, _) in &channel.transport().sent {
        assert_eq!(*id, CHANNEL);
        assert_eq!(bytes.as_ptr(), incoming.bytes.as_ptr());
    }
}

#[test]
fn relay_to_everyone_includes_sender() {
    let registry = Registry::new();
    let mut channel = open(Recorder::authority(1, &[1, 2, 3, 4]), &registry);
    let mut log = Log {
        decision: RelayDecision::to_everyone(),
        ..Default::default()
    };

    channel.receive(delivery(2, &simple(2, "hi")), &mut log);

    assert_eq!(
        channel.transport().targets(),
        vec![PeerID(2), PeerID(3), PeerID(4)]
    );
}

#[test]
fn reserialize_encodes_once() {
    let registry = Registry::new();
    let mut channel = open(Recorder::authority(1, &[1, 2, 3, 4]), &registry);
    let mut log = Log {
        decision: RelayDecision::to_everyone().reserialized(),
        rename: Some("changed".to_string()),
        ..Default::default()
    };

    let incoming = delivery(2, &simple(2, "original"));
    channel.receive(incoming.clone(), &mut log);

    let sent = &channel.transport().sent;
    assert_eq!(sent.len(), 3);
    let first = sent[0].1.as_ptr();
    assert_ne!(first, incoming.bytes.as_ptr());
    assert!(sent.iter().all(|(_, bytes, _)| bytes.as_ptr() == first));

    let relayed: Packet<TestPayload> = decode(&sent[0].1).unwrap();
    assert_eq!(relayed, simple(2, "changed"));
}

#[test]
fn authority_send_to_everyone() {
    let registry = Registry::new();
    let mut channel = open(Recorder::authority(1, &[1, 2, 3]), &registry);

    let packet = simple(2, "broadcast");
    channel.send_to_everyone(&packet, None).unwrap();
    assert_eq!(channel.transport().targets(), vec![PeerID(2), PeerID(3)]);

    channel.send_to_peer(&packet, PeerID(3), None).unwrap();
    assert_eq!(channel.transport().sent.len(), 3);
    let decoded: Packet<TestPayload> = decode(&channel.transport().sent[2].1).unwrap();
    assert_eq!(decoded, packet);
}

#[test]
fn spoofed_origin_is_replaced() {
    let registry = Registry::new();
    let mut channel = open(Recorder::authority(1, &[1, 2, 3]), &registry);
    let (errors, sink) = collect::<String>();
    channel.set_error_handler(move |text| sink.lock().unwrap().push(text.to_string()));
    let mut log = Log {
        decision: RelayDecision::to_others(),
        ..Default::default()
    };

    let incoming = delivery(2, &simple(3, "spoof"));
    channel.receive(incoming.clone(), &mut log);

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("altered origin to 3"));
    assert_eq!(log.seen[0].0, PeerID(2));

    let sent = &channel.transport().sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].2, PeerID(3));
    assert_ne!(sent[0].1, incoming.bytes);
    let relayed: Packet<TestPayload> = decode(&sent[0].1).unwrap();
    assert_eq!(relayed.original_sender, PeerID(2));
}

#[test]
fn clients_do_not_check_origin() {
    let registry = Registry::new();
    let mut channel = open(Recorder::client(2, 1), &registry);
    let (errors, sink) = collect::<String>();
    channel.set_error_handler(move |text| sink.lock().unwrap().push(text.to_string()));
    let mut log = Log::default();

    channel.receive(delivery(1, &simple(3, "relayed")), &mut log);

    assert!(errors.lock().unwrap().is_empty());
    assert_eq!(log.seen[0].0, PeerID(3));
}

#[test]
fn bad_packet_does_not_stop_channel() {
    let registry = Registry::new();
    let mut transport = Recorder::authority(1, &[1, 2]);
    transport.names.insert(PeerID(2), "Bob".to_string());
    let mut channel = open(transport, &registry);

    let (exceptions, sink) = collect::<String>();
    channel.set_exception_handler(move |e| sink.lock().unwrap().push(e.to_string()));
    let (reports, report_sink) = collect::<(PeerID, Option<String>, Vec<u8>)>();
    channel.set_receive_exception_handler(move |peer, name, raw| {
        report_sink
            .lock()
            .unwrap()
            .push((peer, name.map(str::to_string), raw.to_vec()))
    });
    let mut log = Log::default();

    let garbage = Delivery {
        channel_id: CHANNEL,
        bytes: Bytes::from_static(&[1, 0xEE, 3]),
        sender: PeerID(2),
        sender_is_authority: false,
    };
    channel.receive(garbage, &mut log);
    channel.receive(delivery(2, &simple(2, "fine")), &mut log);

    assert_eq!(exceptions.lock().unwrap().len(), 1);
    let reports = reports.lock().unwrap();
    assert_eq!(
        reports[0],
        (PeerID(2), Some("Bob".to_string()), vec![1, 0xEE, 3])
    );
    assert_eq!(log.seen.len(), 1);
    assert_eq!(channel.state(), ChannelState::Active);
}

#[test]
fn failed_peer_send_is_reported() {
    let registry = Registry::new();
    let mut transport = Recorder::authority(1, &[1, 2, 3, 4]);
    transport.failing.insert(PeerID(3));
    let mut channel = open(transport, &registry);
    let (exceptions, sink) = collect::<String>();
    channel.set_exception_handler(move |e| sink.lock().unwrap().push(e.to_string()));

    channel.send_to_everyone(&simple(1, "hi"), None).unwrap();

    assert_eq!(channel.transport().targets(), vec![PeerID(2), PeerID(4)]);
    let exceptions = exceptions.lock().unwrap();
    assert_eq!(exceptions.len(), 1);
    assert!(exceptions[0].contains("disconnected"));
}

#[test]
fn default_hooks_leave_notices() {
    let registry = Registry::new();
    let mut channel = open(Recorder::authority(1, &[1, 2]), &registry);
    let mut log = Log::default();

    channel.receive(delivery(2, &simple(5, "spoof")), &mut log);

    let notices = channel.drain_notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].text.starts_with("[ERROR: Test Mod: WARNING: packet Simple"));
    assert!(notices[0].text.ends_with("| Send the log file to the author]"));
    assert!(channel.drain_notices().is_empty());
}

#[test]
fn notices_are_bounded() {
    let registry = Registry::new();
    let mut channel = open(Recorder::authority(1, &[1, 2]), &registry);
    let mut log = Log::default();

    for origin in 100..1100 {
        channel.receive(delivery(2, &simple(origin, "spoof")), &mut log);
    }

    let notices = channel.drain_notices();
    assert_eq!(notices.len(), MAXIMUM_QUEUED_NOTICES);
    assert!(notices[MAXIMUM_QUEUED_NOTICES - 1]
        .text
        .contains("altered origin to 1099"));
    assert!(channel.drain_notices().is_empty());
    assert_eq!(log.seen.len(), 1000);
}

#[test]
fn oversized_delivery_is_reported() {
    let registry = Registry::new();
    let config = ChannelConfig::new(CHANNEL, "Tiny")
        .unwrap()
        .with_max_packet_size(64)
        .unwrap();
    let mut channel =
        Channel::<TestPayload, _>::new(config, Recorder::authority(1, &[1, 2]), &registry)
            .unwrap();
    let (exceptions, sink) = collect::<String>();
    channel.set_exception_handler(move |e| {
        assert!(matches!(
            e,
            RelayError::Encoding(EncodingError::TooLarge(_, 64))
        ));
        sink.lock().unwrap().push(e.to_string())
    });
    let mut log = Log::default();

    let incoming = delivery(2, &simple(2, &"x".repeat(200)));
    assert!(incoming.bytes.len() > 64);
    channel.receive(incoming, &mut log);

    assert_eq!(exceptions.lock().unwrap().len(), 1);
    assert!(log.seen.is_empty());
    assert!(channel.transport().sent.is_empty());
}

#[test]
fn dedicated_authority_only_logs() {
    let registry = Registry::new();
    let transport = Recorder {
        interactive: false,
        ..Recorder::authority(1, &[2])
    };
    let mut channel = open(transport, &registry);
    let mut log = Log::default();

    channel.receive(delivery(2, &simple(5, "spoof")), &mut log);
    channel.receive(
        Delivery {
            channel_id: CHANNEL,
            bytes: Bytes::from_static(&[9]),
            sender: PeerID(2),
            sender_is_authority: false,
        },
        &mut log,
    );

    assert!(channel.drain_notices().is_empty());
    assert_eq!(log.seen.len(), 1);
}

#[test]
fn other_channels_are_ignored() {
    let registry = Registry::new();
    let mut channel = open(Recorder::authority(1, &[1, 2]), &registry);
    let mut log = Log::default();

    let mut foreign = delivery(2, &simple(2, "elsewhere"));
    foreign.channel_id = CHANNEL + 1;
    channel.receive(foreign, &mut log);

    assert!(log.seen.is_empty());
    assert!(channel.drain_notices().is_empty());
}

#[test]
fn pump_drains_inbox() {
    let registry = Registry::new();
    let mut transport = Recorder::authority(1, &[1, 2, 3]);
    transport.inbox.push_back(delivery(2, &simple(2, "a")));
    transport.inbox.push_back(delivery(3, &simple(3, "b")));
    let mut channel = open(transport, &registry);
    let mut log = Log::default();

    assert_eq!(channel.pump(&mut log), 2);
    assert_eq!(channel.pump(&mut log), 0);
    let origins: Vec<_> = log.seen.iter().map(|(origin, ..)| *origin).collect();
    assert_eq!(origins, vec![PeerID(2), PeerID(3)]);
}

#[test]
fn config_validation() {
    assert!(matches!(
        ChannelConfig::new(1, "  "),
        Err(RelayError::BadConfig(_))
    ));
    let config = ChannelConfig::new(1, "Mod").unwrap();
    assert!(config.clone().with_max_packet_size(0).is_err());
    assert!(config.clone().with_max_packet_size(usize::MAX).is_err());
    assert_eq!(config.with_max_packet_size(512).unwrap().max_packet_size, 512);

    assert!(HostConfig::new(0).is_err());
    assert!(HostConfig::new(2).unwrap().with_queue_capacity(0).is_err());
}

#[test]
fn workshop_id_mapping() {
    assert_eq!(channel_id_from_workshop_id(0), 0);
    assert_eq!(channel_id_from_workshop_id(65_535), 0);
    assert_eq!(channel_id_from_workshop_id(65_536), 1);
    assert_eq!(channel_id_from_workshop_id(u64::MAX), 0);
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Old {
    id: u32,
    name: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct New {
    id: u32,
    tags: Vec<(u8, char)>,
    name: String,
    #[serde(default)]
    extra: Option<TestPayload>,
}

#[test]
fn unknown_fields_are_skipped() {
    let new = New {
        id: 9,
        tags: vec![(1, 'x'), (2, 'y')],
        name: "bob".to_string(),
        extra: Some(TestPayload::Forward(1, Some("deep".to_string()))),
    };
    let old: Old = decode(&encode(&new).unwrap()).unwrap();
    assert_eq!(
        old,
        Old {
            id: 9,
            name: "bob".to_string()
        }
    );
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Flattened {
    id: u32,
    #[serde(flatten)]
    rest: HashMap<String, u32>,
}

#[test]
fn unsized_collections_are_rejected() {
    let value = Flattened {
        id: 1,
        rest: HashMap::from([("a".to_string(), 2)]),
    };
    assert!(matches!(encode(&value), Err(EncodingError::UnknownLength)));
}

#[test]
fn malformed_input_is_rejected() {
    assert!(matches!(
        decode::<u32>(&[]),
        Err(EncodingError::NotEnoughData(0, 1))
    ));
    assert!(matches!(
        decode::<u32>(&[0, tag::U32, 0, 0, 0, 1]),
        Err(EncodingError::UnsupportedVersion(0))
    ));
    assert!(matches!(
        decode::<u32>(&[2, tag::U32, 0, 0, 0, 1]),
        Err(EncodingError::UnsupportedVersion(2))
    ));
    assert!(matches!(
        decode::<u32>(&[1, 0xFF]),
        Err(EncodingError::UnexpectedTag(0xFF))
    ));
    assert!(matches!(
        decode::<u32>(&[1, tag::U32, 0, 0, 0, 1, 0]),
        Err(EncodingError::TrailingBytes(1))
    ));
    assert!(matches!(
        decode::<String>(&[1, tag::STR, 0xFF, 0xFF, 0xFF, 0xFF]),
        Err(EncodingError::NotEnoughData(..))
    ));
    assert!(matches!(
        decode::<Vec<u8>>(&[1, tag::SEQ, 0x7F, 0xFF, 0xFF, 0xFF]),
        Err(EncodingError::NotEnoughData(..))
    ));

    let bytes = encode(&simple(4, "truncate me")).unwrap();
    for len in 0..bytes.len() {
        assert!(decode::<Packet<TestPayload>>(&bytes[..len]).is_err());
    }
}

#[test]
fn nesting_is_limited() {
    let mut bytes = vec![1];
    for _ in 0..100 {
        bytes.extend_from_slice(&[tag::SEQ, 0, 0, 0, 1]);
    }
    bytes.push(tag::UNIT);

    assert!(matches!(
        decode::<IgnoredAny>(&bytes),
        Err(EncodingError::TooDeep(_))
    ));
}

#[test]
fn size_limits() {
    let packet = simple(1, &"x".repeat(200));
    assert!(matches!(
        encode_limited(&packet, 64),
        Err(EncodingError::TooLarge(_, 64))
    ));

    let bytes = encode(&packet).unwrap();
    assert!(matches!(
        decode_limited::<Packet<TestPayload>>(&bytes, 64),
        Err(EncodingError::TooLarge(..))
    ));

    let registry = Registry::new();
    let config = ChannelConfig::new(CHANNEL, "Tiny")
        .unwrap()
        .with_max_packet_size(64)
        .unwrap();
    let mut channel =
        Channel::<TestPayload, _>::new(config, Recorder::client(2, 1), &registry).unwrap();
    let err = channel
        .send_to_authority(simple(2, &"x".repeat(200)), None, &mut Log::default())
        .unwrap_err();
    assert!(matches!(err, RelayError::Encoding(EncodingError::TooLarge(..))));
}

#[test]
fn packet_roundtrip() {
    fn prop(origin: u64, text: String, number: i32, extra: Option<String>) -> bool {
        let simple = Packet::new(PeerID(origin), TestPayload::Simple { text, number });
        let forward = Packet::new(PeerID(origin), TestPayload::Forward(number as u32, extra));

        decode::<Packet<TestPayload>>(&encode(&simple).unwrap()).unwrap() == simple
            && decode::<Packet<TestPayload>>(&encode(&forward).unwrap()).unwrap() == forward
    }
    quickcheck(prop as fn(u64, String, i32, Option<String>) -> bool);
}

#[test]
fn arbitrary_bytes_never_panic() {
    fn prop(data: Vec<u8>) -> TestResult {
        if data.is_empty() {
            return TestResult::discard();
        }
        let mut bytes = vec![1];
        bytes.extend(data);
        let _ = decode::<Packet<TestPayload>>(&bytes);
        let _ = decode::<IgnoredAny>(&bytes);
        TestResult::passed()
    }
    quickcheck(prop as fn(Vec<u8>) -> TestResult);
}

#[test]
fn host_rejects_bad_peers() {
    let host = Host::new(HostConfig::new(2).unwrap());
    let _authority = host.connect_authority(PeerID(1), "server", false).unwrap();

    assert!(host.connect_authority(PeerID(5), "second", false).is_err());
    assert!(matches!(
        host.connect(PeerID(1), "dup"),
        Err(RelayError::Transport(TransportError::DuplicatePeer(_)))
    ));
    assert!(host.connect(PeerID::UNASSIGNED, "nobody").is_err());

    let _client = host.connect(PeerID(2), "client").unwrap();
    assert!(matches!(
        host.connect(PeerID(3), "late"),
        Err(RelayError::Transport(TransportError::HostFull(2)))
    ));
}

#[test]
fn stale_endpoint_leaves_reconnected_peer() {
    let host = Host::new(HostConfig::default());
    let old_server = host.connect_authority(PeerID(1), "server", false).unwrap();
    let old_client = host.connect(PeerID(2), "client").unwrap();

    host.disconnect(PeerID(1)).unwrap();
    host.disconnect(PeerID(2)).unwrap();
    let server = host.connect_authority(PeerID(1), "server again", false).unwrap();
    let mut client = host.connect(PeerID(2), "client again").unwrap();

    assert!(!old_client.is_ready());
    assert!(client.is_ready());
    drop(old_client);
    drop(old_server);

    assert!(host.is_connected(PeerID(2)));
    assert_eq!(host.authority(), Some(PeerID(1)));
    assert_eq!(client.display_name(PeerID(2)).as_deref(), Some("client again"));
    client
        .send_to_authority(CHANNEL, Bytes::from_static(b"still here"))
        .unwrap();
    assert!(server.is_ready());
}

#[test]
fn host_routes_registered_channels() {
    let host = Host::new(HostConfig::default());
    let mut server = host.connect_authority(PeerID(1), "server", true).unwrap();
    let mut client = host.connect(PeerID(2), "client").unwrap();

    assert!(server.is_authority());
    assert!(!server.is_interactive());
    assert!(!client.is_authority());
    assert_eq!(client.authority_id(), Some(PeerID(1)));

    let mut peers = Vec::new();
    server.peers(&mut peers);
    assert_eq!(peers, vec![PeerID(2)]);

    server.register_handler(CHANNEL).unwrap();
    assert!(server.has_handler(CHANNEL));
    assert!(!server.has_handler(CHANNEL + 1));
    assert_eq!(server.host().config().peer_count, DEFAULT_PEER_COUNT);
    client
        .send_to_authority(CHANNEL + 1, Bytes::from_static(b"dropped"))
        .unwrap();
    client
        .send_to_authority(CHANNEL, Bytes::from_static(b"kept"))
        .unwrap();

    let delivery = server.try_recv().unwrap();
    assert_eq!(delivery.bytes, Bytes::from_static(b"kept"));
    assert_eq!(delivery.sender, PeerID(2));
    assert!(!delivery.sender_is_authority);
    assert!(server.try_recv().is_none());

    assert!(matches!(
        server.send_to(CHANNEL, Bytes::new(), PeerID(9)),
        Err(TransportError::UnknownPeer(_))
    ));
    assert_eq!(server.display_name(PeerID(2)).as_deref(), Some("client"));

    drop(client);
    assert!(!host.is_connected(PeerID(2)));
}

#[test]
fn host_queue_is_bounded() {
    let host = Host::new(HostConfig::new(4).unwrap().with_queue_capacity(1).unwrap());
    let mut server = host.connect_authority(PeerID(1), "server", false).unwrap();
    let _client = host.connect(PeerID(2), "client").unwrap();

    server.send_to(CHANNEL, Bytes::new(), PeerID(2)).unwrap();
    assert!(matches!(
        server.send_to(CHANNEL, Bytes::new(), PeerID(2)),
        Err(TransportError::QueueFull(_))
    ));

    host.disconnect(PeerID(1)).unwrap();
    assert!(!server.is_ready());
    assert!(matches!(
        server.send_to(CHANNEL, Bytes::new(), PeerID(2)),
        Err(TransportError::NotReady)
    ));
}
