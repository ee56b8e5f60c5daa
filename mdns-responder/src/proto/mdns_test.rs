use super::*;
use crate::message::header::Header;
use crate::message::name::put_name;
use crate::message::parser::Parser;
use crate::message::question::Question;
use crate::message::resource::{Record, ResourceHeader};
use crate::message::writer::MessageWriter;
use crate::message::{DNSCLASS_INET, DnsType};
use sansio::Protocol;
use shared::error::Error;

const HOST_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 100);

fn config() -> ResponderConfig {
    ResponderConfig::new("eth0", AddressFamily::Ipv4, "mydevice").with_ipv4(HOST_IP)
}

fn peer(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)), port)
}

fn drain(r: &mut Responder) -> Vec<TaggedBytesMut> {
    let mut out = Vec::new();
    while let Some(msg) = r.poll_write() {
        out.push(msg);
    }
    out
}

fn events(r: &mut Responder) -> Vec<ResponderEvent> {
    let mut out = Vec::new();
    while let Some(evt) = r.poll_event() {
        out.push(evt);
    }
    out
}

/// Drives `r` through probing and announcing. Returns the time it reached
/// WaitingRequest, with its queues drained.
fn settle(r: &mut Responder, mut now: Instant) -> Instant {
    for _ in 0..16 {
        if r.state() == ResponderState::WaitingRequest {
            break;
        }
        now = r.poll_timeout().unwrap();
        r.handle_timeout(now).unwrap();
    }
    assert_eq!(r.state(), ResponderState::WaitingRequest);
    drain(r);
    events(r);
    now
}

fn established(services: &[(&str, u16)]) -> (Responder, Instant) {
    let start = Instant::now();
    let mut r = Responder::new(config(), start).unwrap();
    for (service_type, port) in services {
        r.register_service(service_type, *port, None).unwrap();
    }
    let now = settle(&mut r, start);
    (r, now)
}

fn packet(
    id: u16,
    response: bool,
    questions: &[(&Name, DnsType)],
    answers: &[Record],
    authorities: &[Record],
) -> Vec<u8> {
    let mut w = MessageWriter::new();
    Header {
        id,
        response,
        authoritative: response,
        questions: questions.len() as u16,
        answers: answers.len() as u16,
        authorities: authorities.len() as u16,
        ..Default::default()
    }
    .pack(&mut w)
    .unwrap();
    for (name, typ) in questions {
        put_name(&mut w, name).unwrap();
        Question {
            typ: *typ,
            class: DNSCLASS_INET,
            ..Default::default()
        }
        .pack_tail(&mut w)
        .unwrap();
    }
    for r in answers.iter().chain(authorities) {
        put_name(&mut w, &r.name).unwrap();
        ResourceHeader {
            typ: r.typ,
            class: r.class,
            cache_flush: r.cache_flush,
            ttl: r.ttl,
            length: r.rdata.len() as u16,
        }
        .pack(&mut w)
        .unwrap();
        w.put_slice(&r.rdata).unwrap();
    }
    w.as_bytes().to_vec()
}

fn read(r: &mut Responder, msg: &[u8], src: SocketAddr, now: Instant) {
    r.handle_read(TransportMessage {
        now,
        transport: TransportContext {
            local_addr: SocketAddr::new(IpAddr::V4(HOST_IP), MDNS_PORT),
            peer_addr: src,
        },
        message: BytesMut::from(msg),
    })
    .unwrap();
}

fn parse(msg: &[u8]) -> (Header, Vec<Question>, Vec<Record>) {
    let mut p = Parser::default();
    let header = p.start(msg).unwrap();
    let mut questions = Vec::new();
    while let Ok(q) = p.question() {
        questions.push(q);
    }
    let mut records = Vec::new();
    while let Ok((_, r)) = p.any_record() {
        records.push(r);
    }
    (header, questions, records)
}

fn types(records: &[Record]) -> Vec<DnsType> {
    records.iter().map(|r| r.typ).collect()
}

fn host() -> Name {
    Name::new("mydevice.local").unwrap()
}

#[test]
fn test_first_probe_is_immediate() {
    let start = Instant::now();
    let mut r = Responder::new(config(), start).unwrap();
    assert_eq!(r.state(), ResponderState::Probing);
    assert_eq!(
        events(&mut r),
        vec![ResponderEvent::StateChanged(ResponderState::Probing)]
    );

    let outs = drain(&mut r);
    assert_eq!(outs.len(), 1);
    assert_eq!(outs[0].transport.peer_addr, MDNS_DEST_ADDR);
    assert_eq!(
        outs[0].transport.local_addr,
        SocketAddr::new(IpAddr::V4(HOST_IP), MDNS_PORT)
    );

    let (header, questions, records) = parse(&outs[0].message);
    assert!(header.is_query());
    assert_eq!(header.authorities, 1);
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].name, host());
    assert_eq!(questions[0].typ, DnsType::Any);
    assert_eq!(types(&records), vec![DnsType::A]);
    assert!(!records[0].cache_flush);
    assert_eq!(records[0].rdata, HOST_IP.octets().to_vec());

    assert_eq!(r.poll_timeout(), Some(start + Duration::from_millis(250)));
}

#[test]
fn test_probe_and_announce_schedule() {
    let start = Instant::now();
    let mut r = Responder::new(config(), start).unwrap();
    drain(&mut r);

    // nothing before the probe interval elapses
    r.handle_timeout(start + Duration::from_millis(100)).unwrap();
    assert!(drain(&mut r).is_empty());

    let mut probes = 1;
    for ms in [250, 500] {
        r.handle_timeout(start + Duration::from_millis(ms)).unwrap();
        let outs = drain(&mut r);
        assert_eq!(outs.len(), 1);
        assert!(parse(&outs[0].message).0.is_query());
        probes += 1;
    }
    assert_eq!(probes, 3);
    assert_eq!(r.state(), ResponderState::Probing);

    let mut announcements = 0;
    for ms in [750, 1750] {
        r.handle_timeout(start + Duration::from_millis(ms)).unwrap();
        assert_eq!(r.state(), ResponderState::Announcing);
        let outs = drain(&mut r);
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].transport.peer_addr, MDNS_DEST_ADDR);
        let (header, _, records) = parse(&outs[0].message);
        assert!(header.is_response());
        assert_eq!(header.id, 0);
        assert_eq!(types(&records), vec![DnsType::A]);
        assert!(records[0].cache_flush);
        assert_eq!(records[0].ttl, 120);
        announcements += 1;
    }
    assert_eq!(announcements, 2);

    r.handle_timeout(start + Duration::from_millis(2749)).unwrap();
    assert_eq!(r.state(), ResponderState::Announcing);
    r.handle_timeout(start + Duration::from_millis(2750)).unwrap();
    assert_eq!(r.state(), ResponderState::WaitingRequest);
    assert!(drain(&mut r).is_empty());
    assert_eq!(r.poll_timeout(), None);

    assert_eq!(
        events(&mut r),
        vec![
            ResponderEvent::StateChanged(ResponderState::Probing),
            ResponderEvent::StateChanged(ResponderState::Announcing),
            ResponderEvent::StateChanged(ResponderState::WaitingRequest),
        ]
    );
}

#[test]
fn test_answers_any_query() {
    let (mut r, now) = established(&[]);
    let query = packet(7, false, &[(&host(), DnsType::Any)], &[], &[]);
    read(&mut r, &query, peer(MDNS_PORT), now);

    let outs = drain(&mut r);
    assert_eq!(outs.len(), 1);
    assert_eq!(outs[0].transport.peer_addr, MDNS_DEST_ADDR);
    let (header, questions, records) = parse(&outs[0].message);
    assert!(header.is_response());
    assert!(header.authoritative);
    assert_eq!(header.id, 0);
    assert!(questions.is_empty());
    assert_eq!(types(&records), vec![DnsType::A]);
    assert!(records[0].cache_flush);
    assert_eq!(records[0].rdata, HOST_IP.octets().to_vec());
}

#[test]
fn test_query_matching_is_case_insensitive() {
    let (mut r, now) = established(&[]);
    let name = Name::new("MyDevice.LOCAL").unwrap();
    read(&mut r, &packet(0, false, &[(&name, DnsType::A)], &[], &[]), peer(MDNS_PORT), now);
    assert_eq!(drain(&mut r).len(), 1);
}

#[test]
fn test_ignores_foreign_and_unanswerable_queries() {
    let (mut r, now) = established(&[]);
    let other = Name::new("other.local").unwrap();
    read(&mut r, &packet(0, false, &[(&other, DnsType::Any)], &[], &[]), peer(MDNS_PORT), now);
    // no IPv6 address configured
    read(&mut r, &packet(0, false, &[(&host(), DnsType::Aaaa)], &[], &[]), peer(MDNS_PORT), now);
    assert!(drain(&mut r).is_empty());
    assert_eq!(r.state(), ResponderState::WaitingRequest);
}

#[test]
fn test_legacy_unicast_reply() {
    let (mut r, now) = established(&[]);
    let src = peer(40000);
    let query = packet(0x1234, false, &[(&host(), DnsType::A)], &[], &[]);
    read(&mut r, &query, src, now);

    let outs = drain(&mut r);
    assert_eq!(outs.len(), 1);
    assert_eq!(outs[0].transport.peer_addr, src);
    let (header, questions, records) = parse(&outs[0].message);
    assert_eq!(header.id, 0x1234);
    assert!(questions.is_empty());
    assert_eq!(types(&records), vec![DnsType::A]);
    assert_eq!(records[0].ttl, 10);
    assert!(!records[0].cache_flush);
}

#[test]
fn test_shared_answer_is_delayed() {
    let (mut r, now) = established(&[("_http._tcp", 80)]);
    let service_type = Name::new("_http._tcp.local").unwrap();
    read(&mut r, &packet(0, false, &[(&service_type, DnsType::Ptr)], &[], &[]), peer(MDNS_PORT), now);

    assert!(drain(&mut r).is_empty());
    let deadline = now + Duration::from_millis(200);
    assert_eq!(r.poll_timeout(), Some(deadline));

    r.handle_timeout(now + Duration::from_millis(100)).unwrap();
    assert!(drain(&mut r).is_empty());

    r.handle_timeout(deadline).unwrap();
    let outs = drain(&mut r);
    assert_eq!(outs.len(), 1);
    let (header, _, records) = parse(&outs[0].message);
    assert_eq!(header.answers, 1);
    assert_eq!(header.additionals, 3);
    assert_eq!(
        types(&records),
        vec![DnsType::Ptr, DnsType::Srv, DnsType::Txt, DnsType::A]
    );
    assert!(!records[0].cache_flush);
    assert_eq!(
        records[0].rdata,
        Name::new("mydevice._http._tcp.local").unwrap().wire().to_vec()
    );
    assert_eq!(r.poll_timeout(), None);
}

#[test]
fn test_service_instance_query() {
    let (mut r, now) = established(&[("_http._tcp", 8080)]);
    let instance = Name::new("mydevice._http._tcp.local").unwrap();
    read(&mut r, &packet(0, false, &[(&instance, DnsType::Srv)], &[], &[]), peer(MDNS_PORT), now);

    let outs = drain(&mut r);
    assert_eq!(outs.len(), 1);
    let (header, _, records) = parse(&outs[0].message);
    assert_eq!(header.answers, 1);
    assert_eq!(types(&records), vec![DnsType::Srv, DnsType::A]);
    assert_eq!(records[0], Record::srv(instance, 120, 8080, &host()));
}

#[test]
fn test_known_answer_suppression() {
    let (mut r, now) = established(&[("_http._tcp", 80)]);
    let service_type = Name::new("_http._tcp.local").unwrap();
    let instance = Name::new("mydevice._http._tcp.local").unwrap();

    // the querier already holds our PTR with most of its TTL left
    let known = Record::ptr(service_type.clone(), 100, &instance);
    let query = packet(0, false, &[(&service_type, DnsType::Ptr)], &[known], &[]);
    read(&mut r, &query, peer(MDNS_PORT), now);
    r.handle_timeout(now + Duration::from_millis(200)).unwrap();
    assert!(drain(&mut r).is_empty());

    // an expiring copy does not suppress
    let stale = Record::ptr(service_type.clone(), 30, &instance);
    let later = now + Duration::from_secs(1);
    let query = packet(0, false, &[(&service_type, DnsType::Ptr)], &[stale], &[]);
    read(&mut r, &query, peer(MDNS_PORT), later);
    r.handle_timeout(later + Duration::from_millis(200)).unwrap();
    assert_eq!(drain(&mut r).len(), 1);
}

#[test]
fn test_conflict_while_probing_renames() {
    let start = Instant::now();
    let mut r = Responder::new(config(), start).unwrap();
    r.register_service("_http._tcp", 80, None).unwrap();
    drain(&mut r);
    events(&mut r);

    let theirs = Record::a(host(), 120, Ipv4Addr::new(192, 168, 1, 50));
    let now = start + Duration::from_millis(100);
    read(&mut r, &packet(0, true, &[], &[theirs], &[]), peer(MDNS_PORT), now);

    assert_eq!(r.state(), ResponderState::ProbingWait);
    assert_eq!(r.host_name(), "mydevice-2");
    assert_eq!(r.fqdn().to_string(), "mydevice-2.local");
    assert_eq!(r.last_conflict(), Some(now));
    assert_eq!(
        events(&mut r),
        vec![
            ResponderEvent::NameConflict {
                host_name: "mydevice-2".to_owned()
            },
            ResponderEvent::StateChanged(ResponderState::ProbingWait),
        ]
    );

    let resume = now + Duration::from_secs(5);
    assert_eq!(r.poll_timeout(), Some(resume));
    r.handle_timeout(resume - Duration::from_millis(1)).unwrap();
    assert!(drain(&mut r).is_empty());

    r.handle_timeout(resume).unwrap();
    assert_eq!(r.state(), ResponderState::Probing);
    let outs = drain(&mut r);
    assert_eq!(outs.len(), 1);
    let (_, questions, _) = parse(&outs[0].message);
    let names: Vec<String> = questions.iter().map(|q| q.name.to_string()).collect();
    assert_eq!(
        names,
        vec!["mydevice 2._http._tcp.local", "mydevice-2.local"]
    );
}

#[test]
fn test_conflict_after_announcing_reprobes_same_name() {
    let (mut r, now) = established(&[]);
    let theirs = Record::a(host(), 120, Ipv4Addr::new(192, 168, 1, 50));
    read(&mut r, &packet(0, true, &[], &[theirs], &[]), peer(MDNS_PORT), now);

    assert_eq!(r.state(), ResponderState::ProbingWait);
    assert_eq!(r.host_name(), "mydevice");
    assert_eq!(r.poll_timeout(), Some(now + Duration::from_secs(5)));
    assert_eq!(
        events(&mut r),
        vec![ResponderEvent::StateChanged(ResponderState::ProbingWait)]
    );
}

#[test]
fn test_conflict_in_additional_section() {
    let (mut r, now) = established(&[]);
    let theirs = Record::a(host(), 120, Ipv4Addr::new(192, 168, 1, 50));
    let mut msg = packet(0, true, &[], &[theirs], &[]);
    // move the record from the answer count to the additional count
    msg[6..8].copy_from_slice(&0u16.to_be_bytes());
    msg[10..12].copy_from_slice(&1u16.to_be_bytes());
    read(&mut r, &msg, peer(MDNS_PORT), now);

    assert_eq!(r.state(), ResponderState::ProbingWait);
    assert_eq!(r.last_conflict(), Some(now));
}

#[test]
fn test_records_that_are_not_conflicts() {
    let (mut r, now) = established(&[]);
    let src = peer(MDNS_PORT);

    // our own announcement looped back
    let ours = Record::a(host(), 120, HOST_IP);
    read(&mut r, &packet(0, true, &[], &[ours], &[]), src, now);

    // a goodbye, and a record without the cache-flush bit
    let goodbye = Record::a(host(), 0, Ipv4Addr::new(192, 168, 1, 50));
    let mut shared = Record::a(host(), 120, Ipv4Addr::new(192, 168, 1, 50));
    shared.cache_flush = false;
    read(&mut r, &packet(0, true, &[], &[goodbye, shared], &[]), src, now);

    // somebody else's name
    let other = Record::a(Name::new("other.local").unwrap(), 120, HOST_IP);
    read(&mut r, &packet(0, true, &[], &[other], &[]), src, now);

    assert_eq!(r.state(), ResponderState::WaitingRequest);
    assert_eq!(r.last_conflict(), None);
}

#[test]
fn test_simultaneous_probe_lost() {
    let start = Instant::now();
    let mut r = Responder::new(config(), start).unwrap();
    drain(&mut r);
    events(&mut r);

    let theirs = Record {
        cache_flush: false,
        ..Record::a(host(), 120, Ipv4Addr::new(192, 168, 1, 200))
    };
    let probe = packet(0, false, &[(&host(), DnsType::Any)], &[], &[theirs]);
    let now = start + Duration::from_millis(100);
    read(&mut r, &probe, peer(MDNS_PORT), now);

    assert_eq!(r.state(), ResponderState::ProbingWait);
    assert_eq!(r.host_name(), "mydevice");
    assert_eq!(r.poll_timeout(), Some(now + Duration::from_secs(1)));
    assert_eq!(r.last_conflict(), None);
}

#[test]
fn test_simultaneous_probe_won() {
    let start = Instant::now();
    let mut r = Responder::new(config(), start).unwrap();
    drain(&mut r);

    let theirs = Record {
        cache_flush: false,
        ..Record::a(host(), 120, Ipv4Addr::new(192, 168, 1, 50))
    };
    let probe = packet(0, false, &[(&host(), DnsType::Any)], &[], &[theirs]);
    read(&mut r, &probe, peer(MDNS_PORT), start + Duration::from_millis(100));

    assert_eq!(r.state(), ResponderState::Probing);
    assert!(drain(&mut r).is_empty());
}

#[test]
fn test_own_probe_looped_back() {
    let start = Instant::now();
    let mut r = Responder::new(config(), start).unwrap();
    let probe = drain(&mut r).remove(0);
    read(&mut r, &probe.message, peer(MDNS_PORT), start);
    assert_eq!(r.state(), ResponderState::Probing);
}

#[test]
fn test_plain_query_while_probing_is_not_answered() {
    let start = Instant::now();
    let mut r = Responder::new(config(), start).unwrap();
    drain(&mut r);
    read(&mut r, &packet(0, false, &[(&host(), DnsType::A)], &[], &[]), peer(MDNS_PORT), start);
    assert!(drain(&mut r).is_empty());
    assert_eq!(r.state(), ResponderState::Probing);
}

#[test]
fn test_register_restarts_probing() {
    let (mut r, now) = established(&[]);
    r.register_service("_ipp._tcp", 631, None).unwrap();
    assert_eq!(r.state(), ResponderState::Probing);
    assert_eq!(r.poll_timeout(), Some(now));

    r.handle_timeout(now).unwrap();
    let outs = drain(&mut r);
    assert_eq!(outs.len(), 1);
    let (header, _, records) = parse(&outs[0].message);
    assert_eq!(header.questions, 2);
    assert_eq!(types(&records), vec![DnsType::Srv, DnsType::A]);
}

#[test]
fn test_registered_service_answers_only_after_reprobing() {
    let (mut r, now) = established(&[]);
    let service_type = Name::new("_http._tcp.local").unwrap();
    let browse = packet(0, false, &[(&service_type, DnsType::Ptr)], &[], &[]);

    r.register_service("_http._tcp", 80, None).unwrap();
    r.handle_timeout(now).unwrap();
    assert_eq!(drain(&mut r).len(), 1);

    let during = now + Duration::from_millis(10);
    read(&mut r, &browse, peer(MDNS_PORT), during);
    r.handle_timeout(during).unwrap();
    assert!(drain(&mut r).is_empty());
    assert_eq!(r.state(), ResponderState::Probing);

    let now = settle(&mut r, during);
    read(&mut r, &browse, peer(MDNS_PORT), now);
    let deadline = now + Duration::from_millis(200);
    r.handle_timeout(deadline).unwrap();
    let outs = drain(&mut r);
    assert_eq!(outs.len(), 1);
    let (header, _, records) = parse(&outs[0].message);
    assert!(header.response);
    assert_eq!(header.answers, 1);
    assert_eq!(records[0].typ, DnsType::Ptr);
    assert_eq!(records[0].name, service_type);
    assert_eq!(
        records[0].rdata,
        Name::new("mydevice._http._tcp.local").unwrap().wire().to_vec()
    );
}

#[test]
fn test_unregister_sends_goodbye() {
    let start = Instant::now();
    let mut r = Responder::new(config(), start).unwrap();
    let id = r.register_service("_http._tcp", 80, None).unwrap();
    settle(&mut r, start);
    assert_eq!(
        r.service_instance_name(id).map(|n| n.to_string()),
        Some("mydevice._http._tcp.local".to_owned())
    );

    r.unregister_service(id).unwrap();
    let outs = drain(&mut r);
    assert_eq!(outs.len(), 1);
    let (_, _, records) = parse(&outs[0].message);
    assert_eq!(
        types(&records),
        vec![DnsType::Txt, DnsType::Ptr, DnsType::Srv]
    );
    assert!(records.iter().all(|r| r.ttl == 0));
    assert!(r.service_instance_name(id).is_none());
    assert_eq!(r.unregister_service(id), Err(Error::ErrInvalidHandle));
}

#[test]
fn test_unregister_before_announcing_is_silent() {
    let start = Instant::now();
    let mut r = Responder::new(config(), start).unwrap();
    let id = r.register_service("_http._tcp", 80, None).unwrap();
    drain(&mut r);
    r.unregister_service(id).unwrap();
    assert!(drain(&mut r).is_empty());
}

#[test]
fn test_announce_on_demand() {
    let (mut r, now) = established(&[]);
    r.announce().unwrap();
    assert_eq!(r.state(), ResponderState::Announcing);
    assert_eq!(r.poll_timeout(), Some(now));
    r.handle_timeout(now).unwrap();
    assert_eq!(drain(&mut r).len(), 1);

    // ignored while probing
    let mut fresh = Responder::new(config(), now).unwrap();
    fresh.announce().unwrap();
    assert_eq!(fresh.state(), ResponderState::Probing);
}

#[test]
fn test_set_addresses_reannounces() {
    let (mut r, now) = established(&[]);
    let new_ip = Ipv4Addr::new(10, 0, 0, 7);
    r.set_addresses(Some(new_ip), None).unwrap();
    r.handle_timeout(now).unwrap();
    let outs = drain(&mut r);
    let (_, _, records) = parse(&outs[0].message);
    assert_eq!(records[0].rdata, new_ip.octets().to_vec());

    assert_eq!(r.set_addresses(None, None), Err(Error::ErrNoAddressForFamily));
    assert_eq!(r.config().ipv4, Some(new_ip));
}

#[test]
fn test_close_sends_goodbye() {
    let (mut r, _) = established(&[("_http._tcp", 80)]);
    r.close().unwrap();
    assert!(r.is_closed());
    assert!(!r.is_enabled());
    assert_eq!(r.state(), ResponderState::Disabled);

    let outs = drain(&mut r);
    assert_eq!(outs.len(), 1);
    let (_, _, records) = parse(&outs[0].message);
    assert_eq!(
        types(&records),
        vec![DnsType::Txt, DnsType::Ptr, DnsType::Srv, DnsType::A]
    );
    assert!(records.iter().all(|r| r.ttl == 0));

    let now = Instant::now();
    assert_eq!(r.handle_timeout(now), Err(Error::ErrResponderClosed));
    assert_eq!(r.poll_timeout(), None);
    assert_eq!(
        r.register_service("_ipp._tcp", 631, None).map(|_| ()),
        Err(Error::ErrResponderClosed)
    );
    assert_eq!(r.announce(), Err(Error::ErrResponderClosed));
    assert!(r.close().is_ok());
    assert!(drain(&mut r).is_empty());
}

#[test]
fn test_close_before_announcing_is_silent() {
    let mut r = Responder::new(config(), Instant::now()).unwrap();
    drain(&mut r);
    r.close().unwrap();
    assert!(drain(&mut r).is_empty());
}

#[test]
fn test_read_after_close() {
    let (mut r, now) = established(&[]);
    r.close().unwrap();
    let result = r.handle_read(TransportMessage {
        now,
        transport: TransportContext {
            local_addr: SocketAddr::new(IpAddr::V4(HOST_IP), MDNS_PORT),
            peer_addr: peer(MDNS_PORT),
        },
        message: BytesMut::from(&[0u8; 12][..]),
    });
    assert_eq!(result, Err(Error::ErrResponderClosed));
}

#[test]
fn test_malformed_datagrams_are_ignored() {
    let (mut r, now) = established(&[]);
    let src = peer(MDNS_PORT);

    read(&mut r, &[0u8; 3], src, now);

    // one question announced, none present
    let mut truncated = packet(0, false, &[], &[], &[]);
    truncated[5] = 1;
    truncated.extend_from_slice(&[0x08, b'm']);
    read(&mut r, &truncated, src, now);

    // pointer to itself
    let mut looping = packet(0, false, &[], &[], &[]);
    looping[5] = 1;
    looping.extend_from_slice(&[0xC0, 12, 0, 1, 0, 1]);
    read(&mut r, &looping, src, now);

    read(&mut r, &vec![0u8; 9001], src, now);

    assert!(drain(&mut r).is_empty());
    assert_eq!(r.state(), ResponderState::WaitingRequest);

    // still answering afterwards
    read(&mut r, &packet(0, false, &[(&host(), DnsType::A)], &[], &[]), src, now);
    assert_eq!(drain(&mut r).len(), 1);
}

#[test]
fn test_config_is_validated() {
    let now = Instant::now();
    assert_eq!(
        Responder::new(config().with_rr_ttl(0), now).map(|_| ()),
        Err(Error::ErrInvalidTtl)
    );
    assert_eq!(
        Responder::new(
            ResponderConfig::new("eth0", AddressFamily::Ipv6, "mydevice"),
            now
        )
        .map(|_| ()),
        Err(Error::ErrNoAddressForFamily)
    );
}

#[test]
fn test_ipv6_destination_carries_scope() {
    let addr: Ipv6Addr = "fe80::1".parse().unwrap();
    let config = ResponderConfig::new("eth0", AddressFamily::Ipv6, "mydevice").with_ipv6(addr, 3);
    let mut r = Responder::new(config, Instant::now()).unwrap();
    let outs = drain(&mut r);
    assert_eq!(
        outs[0].transport.peer_addr,
        SocketAddr::V6(SocketAddrV6::new(MDNS_MULTICAST_IPV6, MDNS_PORT, 0, 3))
    );
    let (_, _, records) = parse(&outs[0].message);
    assert_eq!(types(&records), vec![DnsType::Aaaa]);
}
