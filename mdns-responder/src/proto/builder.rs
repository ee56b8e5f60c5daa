//! Outbound message assembly.
//!
//! Every message is built into a fresh [`MessageWriter`] together with a
//! fresh [`CompressionCache`], so name offsets never leak from one message
//! into the next.

use std::net::{Ipv4Addr, Ipv6Addr};

use super::pending::{Pending, ResponseFlags};
use crate::message::header::Header;
use crate::message::name::*;
use crate::message::question::Question;
use crate::message::resource::{Record, ResourceHeader, txt_rdata};
use crate::message::writer::MessageWriter;
use crate::message::{DNSCLASS_INET, DnsType};
use crate::service::{Service, ServiceTable};
use shared::error::{Error, Result};

// Offsets of the section counts within the header.
const QDCOUNT_OFF: usize = 4;
const ANCOUNT_OFF: usize = 6;
const NSCOUNT_OFF: usize = 8;
const ARCOUNT_OFF: usize = 10;

/// Whose record it is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Owner {
    Host,
    Service(usize),
}

/// Everything a responder currently asserts.
pub(crate) struct RecordSet<'a> {
    pub(crate) host: &'a Name,
    pub(crate) ipv4: Option<Ipv4Addr>,
    pub(crate) ipv6: Option<Ipv6Addr>,
    pub(crate) services: &'a ServiceTable,
}

impl RecordSet<'_> {
    /// Every local record in canonical form, tagged with its owner and the
    /// pending flag that would send it.
    pub(crate) fn records(&self, ttl: u32) -> Vec<(Owner, ResponseFlags, Record)> {
        let mut out = Vec::new();
        if let Some(addr) = self.ipv4 {
            out.push((
                Owner::Host,
                ResponseFlags::A,
                Record::a(self.host.clone(), ttl, addr),
            ));
        }
        if let Some(addr) = self.ipv6 {
            out.push((
                Owner::Host,
                ResponseFlags::AAAA,
                Record::aaaa(self.host.clone(), ttl, addr),
            ));
        }
        for (slot, svc) in self.services.iter() {
            let owner = Owner::Service(slot);
            out.push((
                owner,
                ResponseFlags::PTR,
                Record::ptr(svc.type_name.clone(), ttl, &svc.instance_name),
            ));
            out.push((
                owner,
                ResponseFlags::SRV,
                Record::srv(svc.instance_name.clone(), ttl, svc.port, self.host),
            ));
            out.push((
                owner,
                ResponseFlags::TXT,
                Record::txt(svc.instance_name.clone(), ttl, svc.txt_bytes()),
            ));
        }
        out
    }

    /// The records a probe proposes for `owner`'s name, as they appear in
    /// its authority section.
    pub(crate) fn probe_records(&self, owner: Owner, ttl: u32) -> Vec<Record> {
        let mut out: Vec<Record> = match owner {
            Owner::Host => {
                let mut v = Vec::new();
                if let Some(addr) = self.ipv4 {
                    v.push(Record::a(self.host.clone(), ttl, addr));
                }
                if let Some(addr) = self.ipv6 {
                    v.push(Record::aaaa(self.host.clone(), ttl, addr));
                }
                v
            }
            Owner::Service(slot) => self
                .services
                .by_slot(slot)
                .map(|svc| Record::srv(svc.instance_name.clone(), ttl, svc.port, self.host))
                .into_iter()
                .collect(),
        };
        for r in &mut out {
            r.cache_flush = false;
        }
        out
    }

    /// Owner whose unique name `name` is: the host name or a service
    /// instance name.
    pub(crate) fn unique_owner(&self, name: &Name) -> Option<Owner> {
        if name.matches(self.host) {
            return Some(Owner::Host);
        }
        self.services
            .iter()
            .find(|(_, svc)| name.matches(&svc.instance_name))
            .map(|(slot, _)| Owner::Service(slot))
    }
}

/// Offsets at which names were written earlier in the current message;
/// 0 means not written yet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct CompressionCache {
    host: u16,
    services: Vec<NameOffsets>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct NameOffsets {
    instance: u16,
    service_type: u16,
}

impl CompressionCache {
    pub(crate) fn new(slots: usize) -> Self {
        Self {
            host: 0,
            services: vec![NameOffsets::default(); slots],
        }
    }

    fn slot(&mut self, slot: usize) -> Result<&mut NameOffsets> {
        self.services.get_mut(slot).ok_or(Error::ErrInvalidHandle)
    }
}

// Offsets beyond the reach of a pointer are simply not cached.
fn reachable(off: usize) -> u16 {
    if off <= MAX_COMPRESSION_OFFSET {
        off as u16
    } else {
        0
    }
}

/// Parameters of a response or announcement.
#[derive(Copy, Clone, Debug)]
pub(crate) struct ResponseOptions {
    /// Echoed query ID for legacy unicast, 0 otherwise.
    pub(crate) id: u16,
    pub(crate) ttl: u32,
    pub(crate) cache_flush: bool,
    /// Bundle the records RFC 6763 section 12 recommends.
    pub(crate) additionals: bool,
}

struct MessageBuilder<'a> {
    set: &'a RecordSet<'a>,
    w: MessageWriter,
    cache: CompressionCache,
    ttl: u32,
    cache_flush: bool,
}

impl<'a> MessageBuilder<'a> {
    fn new(set: &'a RecordSet<'a>, header: Header, ttl: u32, cache_flush: bool) -> Result<Self> {
        let mut w = MessageWriter::new();
        header.pack(&mut w)?;
        Ok(Self {
            set,
            w,
            cache: CompressionCache::new(set.services.capacity()),
            ttl,
            cache_flush,
        })
    }

    fn service(&self, slot: usize) -> Option<&'a Service> {
        let services: &'a ServiceTable = self.set.services;
        services.by_slot(slot)
    }

    fn put_host_name(&mut self) -> Result<()> {
        if self.cache.host != 0 {
            encode_compressed_name(&mut self.w, self.cache.host as usize)?;
            return Ok(());
        }
        let off = self.w.len();
        put_name(&mut self.w, self.set.host)?;
        self.cache.host = reachable(off);
        Ok(())
    }

    fn put_type_name(&mut self, slot: usize, svc: &Service) -> Result<()> {
        let cached = self.cache.slot(slot)?.service_type;
        if cached != 0 {
            encode_compressed_name(&mut self.w, cached as usize)?;
            return Ok(());
        }
        let off = self.w.len();
        put_name(&mut self.w, &svc.type_name)?;
        self.cache.slot(slot)?.service_type = reachable(off);
        Ok(())
    }

    // The instance name is its own label followed by the type name, so a
    // cached type name shortens it too.
    fn put_instance_name(&mut self, slot: usize, svc: &Service) -> Result<()> {
        let offsets = *self.cache.slot(slot)?;
        if offsets.instance != 0 {
            encode_compressed_name(&mut self.w, offsets.instance as usize)?;
            return Ok(());
        }

        let wire = svc.instance_name.wire();
        let label_len = wire.len() - svc.instance_name.parent_wire().len();
        let off = self.w.len();
        if offsets.service_type != 0 {
            self.w.put_slice(&wire[..label_len])?;
            encode_compressed_name(&mut self.w, offsets.service_type as usize)?;
            self.cache.slot(slot)?.instance = reachable(off);
        } else {
            put_name(&mut self.w, &svc.instance_name)?;
            let entry = self.cache.slot(slot)?;
            entry.instance = reachable(off);
            entry.service_type = reachable(off + label_len);
        }
        Ok(())
    }

    fn record_header(&mut self, typ: DnsType, cache_flush: bool) -> Result<usize> {
        ResourceHeader {
            typ,
            class: DNSCLASS_INET,
            cache_flush,
            ttl: self.ttl,
            length: 0,
        }
        .pack(&mut self.w)
    }

    fn put_a(&mut self, addr: Ipv4Addr) -> Result<()> {
        self.put_host_name()?;
        let len_off = self.record_header(DnsType::A, self.cache_flush)?;
        let pre = self.w.len();
        self.w.put_slice(&addr.octets())?;
        ResourceHeader::fix_len(&mut self.w, len_off, pre)
    }

    fn put_aaaa(&mut self, addr: Ipv6Addr) -> Result<()> {
        self.put_host_name()?;
        let len_off = self.record_header(DnsType::Aaaa, self.cache_flush)?;
        let pre = self.w.len();
        self.w.put_slice(&addr.octets())?;
        ResourceHeader::fix_len(&mut self.w, len_off, pre)
    }

    // PTR records are shared and never carry the cache-flush bit.
    fn put_ptr(&mut self, slot: usize, svc: &Service) -> Result<()> {
        self.put_type_name(slot, svc)?;
        let len_off = self.record_header(DnsType::Ptr, false)?;
        let pre = self.w.len();
        self.put_instance_name(slot, svc)?;
        ResourceHeader::fix_len(&mut self.w, len_off, pre)
    }

    fn put_srv(&mut self, slot: usize, svc: &Service) -> Result<()> {
        self.put_instance_name(slot, svc)?;
        let len_off = self.record_header(DnsType::Srv, self.cache_flush)?;
        let pre = self.w.len();
        self.w.put_u16(0)?; // priority
        self.w.put_u16(0)?; // weight
        self.w.put_u16(svc.port)?;
        self.put_host_name()?;
        ResourceHeader::fix_len(&mut self.w, len_off, pre)
    }

    fn put_txt(&mut self, slot: usize, svc: &Service) -> Result<()> {
        self.put_instance_name(slot, svc)?;
        let len_off = self.record_header(DnsType::Txt, self.cache_flush)?;
        let pre = self.w.len();
        self.w.put_slice(txt_rdata(svc.txt_bytes()))?;
        ResourceHeader::fix_len(&mut self.w, len_off, pre)
    }

    /// Writes one record, or nothing at all: on error both the writer and
    /// the compression cache are rolled back. Returns whether a record was
    /// written; owners without the requested data write nothing.
    fn put_record(&mut self, owner: Owner, flag: ResponseFlags) -> Result<bool> {
        let start = self.w.len();
        let saved = self.cache.clone();

        let result = match owner {
            Owner::Host => match flag {
                ResponseFlags::A => match self.set.ipv4 {
                    Some(addr) => self.put_a(addr).map(|_| true),
                    None => Ok(false),
                },
                ResponseFlags::AAAA => match self.set.ipv6 {
                    Some(addr) => self.put_aaaa(addr).map(|_| true),
                    None => Ok(false),
                },
                _ => Ok(false),
            },
            Owner::Service(slot) => match self.service(slot) {
                None => Ok(false),
                Some(svc) => match flag {
                    ResponseFlags::PTR => self.put_ptr(slot, svc).map(|_| true),
                    ResponseFlags::SRV => self.put_srv(slot, svc).map(|_| true),
                    ResponseFlags::TXT => self.put_txt(slot, svc).map(|_| true),
                    _ => Ok(false),
                },
            },
        };

        if result.is_err() {
            self.w.truncate(start);
            self.cache = saved;
        }
        result
    }

    /// ANY/IN question for `owner`'s name.
    fn put_question(&mut self, owner: Owner) -> Result<()> {
        match owner {
            Owner::Host => self.put_host_name()?,
            Owner::Service(slot) => {
                let svc = self.service(slot).ok_or(Error::ErrInvalidHandle)?;
                self.put_instance_name(slot, svc)?;
            }
        }
        Question {
            typ: DnsType::Any,
            class: DNSCLASS_INET,
            ..Default::default()
        }
        .pack_tail(&mut self.w)?;
        Ok(())
    }

    fn finish(mut self, questions: u16, answers: u16, authorities: u16, additionals: u16) -> Result<Vec<u8>> {
        self.w.set_u16(QDCOUNT_OFF, questions)?;
        self.w.set_u16(ANCOUNT_OFF, answers)?;
        self.w.set_u16(NSCOUNT_OFF, authorities)?;
        self.w.set_u16(ARCOUNT_OFF, additionals)?;
        Ok(self.w.as_bytes().to_vec())
    }
}

/// A probe: one ANY question per service instance name and one for the
/// host name, with the proposed SRV, A and AAAA records in the authority
/// section. Probe records never carry the cache-flush bit.
pub(crate) fn build_probe(set: &RecordSet<'_>, ttl: u32) -> Result<Vec<u8>> {
    let mut b = MessageBuilder::new(set, Header::default(), ttl, false)?;

    let mut questions = 0u16;
    for (slot, _) in set.services.iter() {
        b.put_question(Owner::Service(slot))?;
        questions += 1;
    }
    b.put_question(Owner::Host)?;
    questions += 1;

    let mut authorities = 0u16;
    for (slot, _) in set.services.iter() {
        if b.put_record(Owner::Service(slot), ResponseFlags::SRV)? {
            authorities += 1;
        }
    }
    for flag in [ResponseFlags::A, ResponseFlags::AAAA] {
        if b.put_record(Owner::Host, flag)? {
            authorities += 1;
        }
    }

    b.finish(questions, 0, authorities, 0)
}

/// A response, announcement or goodbye carrying what `pending` asks for.
///
/// Answers go TXT, PTR, SRV per service, then A and AAAA. An answer that
/// does not fit aborts the whole build; additional records are best effort
/// and stop at the first one that does not fit. Returns `None` when nothing
/// would be answered.
pub(crate) fn build_response(
    set: &RecordSet<'_>,
    pending: &Pending,
    opts: &ResponseOptions,
) -> Result<Option<Vec<u8>>> {
    let header = Header {
        id: opts.id,
        response: true,
        authoritative: true,
        ..Default::default()
    };
    let mut b = MessageBuilder::new(set, header, opts.ttl, opts.cache_flush)?;
    let capacity = set.services.capacity();

    let mut answered = Pending::new(capacity);
    let mut answers = 0u16;
    for (slot, _) in set.services.iter() {
        let flags = pending.service(slot);
        for flag in [ResponseFlags::TXT, ResponseFlags::PTR, ResponseFlags::SRV] {
            if flags.contains(flag) && b.put_record(Owner::Service(slot), flag)? {
                answers += 1;
                answered.insert_service(slot, flag);
            }
        }
    }
    for flag in [ResponseFlags::A, ResponseFlags::AAAA] {
        if pending.host.contains(flag) && b.put_record(Owner::Host, flag)? {
            answers += 1;
            answered.host |= flag;
        }
    }
    if answers == 0 {
        return Ok(None);
    }

    let mut additionals = 0u16;
    if opts.additionals {
        let mut wanted = Pending::new(capacity);
        for (slot, _) in set.services.iter() {
            let got = answered.service(slot);
            if got.contains(ResponseFlags::PTR) {
                wanted.insert_service(slot, ResponseFlags::INSTANCE);
                wanted.host |= ResponseFlags::ADDRESS;
            }
            if got.contains(ResponseFlags::SRV) {
                wanted.host |= ResponseFlags::ADDRESS;
            }
        }

        let mut extras: Vec<(Owner, ResponseFlags)> = Vec::new();
        for (slot, _) in set.services.iter() {
            for flag in [ResponseFlags::SRV, ResponseFlags::TXT] {
                if wanted.service(slot).contains(flag) && !answered.service(slot).contains(flag) {
                    extras.push((Owner::Service(slot), flag));
                }
            }
        }
        for flag in [ResponseFlags::A, ResponseFlags::AAAA] {
            if wanted.host.contains(flag) && !answered.host.contains(flag) {
                extras.push((Owner::Host, flag));
            }
        }

        for (owner, flag) in extras {
            match b.put_record(owner, flag) {
                Ok(true) => additionals += 1,
                Ok(false) => {}
                Err(Error::ErrMessageTooLarge) => {
                    log::debug!("additional {flag:?} for {owner:?} does not fit, skipped");
                }
                Err(err) => return Err(err),
            }
        }
    }

    b.finish(0, answers, 0, additionals).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::parser::Parser;
    use crate::message::{HEADER_LEN, MAX_MESSAGE_SIZE};
    use crate::service::Service;

    fn table(txt: &'static [u8]) -> ServiceTable {
        let mut table = ServiceTable::new(2);
        let supplier: Option<Box<dyn crate::service::TxtSupplier>> = Some(Box::new(txt));
        table
            .insert(Service::new("_http._tcp", 80, supplier, "mydevice").unwrap())
            .unwrap();
        table
    }

    fn host() -> Name {
        Name::new("mydevice.local").unwrap()
    }

    fn set<'a>(host: &'a Name, services: &'a ServiceTable) -> RecordSet<'a> {
        RecordSet {
            host,
            ipv4: Some(Ipv4Addr::new(192, 168, 1, 100)),
            ipv6: None,
            services,
        }
    }

    fn opts() -> ResponseOptions {
        ResponseOptions {
            id: 0,
            ttl: 120,
            cache_flush: true,
            additionals: true,
        }
    }

    fn records(msg: &[u8]) -> Vec<Record> {
        let mut p = Parser::default();
        p.start(msg).unwrap();
        let mut out = Vec::new();
        while let Ok((_, r)) = p.any_record() {
            out.push(r);
        }
        out
    }

    #[test]
    fn test_probe_layout() {
        let (host, services) = (host(), table(b""));
        let set = set(&host, &services);
        let msg = build_probe(&set, 120).unwrap();

        let mut p = Parser::default();
        let header = p.start(&msg).unwrap();
        assert!(header.is_query());
        assert_eq!(header.questions, 2);
        assert_eq!(header.authorities, 2);

        let q1 = p.question().unwrap();
        assert_eq!(q1.name.to_string(), "mydevice._http._tcp.local");
        assert_eq!(q1.typ, DnsType::Any);
        let q2 = p.question().unwrap();
        assert_eq!(q2.name.to_string(), "mydevice.local");

        p.question().unwrap_err();
        p.skip_all_answers().unwrap();
        let srv = p.authority().unwrap();
        let a = p.authority().unwrap();
        assert_eq!(srv, set.probe_records(Owner::Service(0), 120)[0]);
        assert_eq!(a, set.probe_records(Owner::Host, 120)[0]);
        assert!(!srv.cache_flush && !a.cache_flush);
    }

    #[test]
    fn test_response_order_and_cache_flush() {
        let (host, services) = (host(), table(b"\x03a=1"));
        let set = set(&host, &services);
        let pending = Pending::all([0], services.capacity());
        let msg = build_response(&set, &pending, &opts()).unwrap().unwrap();

        let mut p = Parser::default();
        let header = p.start(&msg).unwrap();
        assert!(header.is_response());
        assert!(header.authoritative);
        assert_eq!(header.answers, 4);
        assert_eq!(header.additionals, 0);

        let got = records(&msg);
        let types: Vec<DnsType> = got.iter().map(|r| r.typ).collect();
        assert_eq!(types, vec![DnsType::Txt, DnsType::Ptr, DnsType::Srv, DnsType::A]);
        let flush: Vec<bool> = got.iter().map(|r| r.cache_flush).collect();
        assert_eq!(flush, vec![true, false, true, true]);

        // parsed records equal the canonical local records
        let local: Vec<Record> = set.records(120).into_iter().map(|(_, _, r)| r).collect();
        for r in &got {
            assert!(local.contains(r), "unexpected {r}");
        }
    }

    #[test]
    fn test_ptr_answer_bundles_additionals() {
        let (host, services) = (host(), table(b""));
        let set = set(&host, &services);
        let mut pending = Pending::new(services.capacity());
        pending.insert_service(0, ResponseFlags::PTR);
        let msg = build_response(&set, &pending, &opts()).unwrap().unwrap();

        let mut p = Parser::default();
        let header = p.start(&msg).unwrap();
        assert_eq!(header.answers, 1);
        assert_eq!(header.additionals, 3);
        let types: Vec<DnsType> = records(&msg).iter().map(|r| r.typ).collect();
        assert_eq!(types, vec![DnsType::Ptr, DnsType::Srv, DnsType::Txt, DnsType::A]);
        // empty TXT goes out as one zero byte
        assert_eq!(records(&msg)[2].rdata, vec![0]);
    }

    #[test]
    fn test_no_additionals_for_goodbye() {
        let (host, services) = (host(), table(b""));
        let set = set(&host, &services);
        let mut pending = Pending::new(services.capacity());
        pending.insert_service(0, ResponseFlags::PTR | ResponseFlags::INSTANCE);
        let goodbye = ResponseOptions {
            ttl: 0,
            additionals: false,
            ..opts()
        };
        let msg = build_response(&set, &pending, &goodbye).unwrap().unwrap();
        let got = records(&msg);
        assert_eq!(got.len(), 3);
        assert!(got.iter().all(|r| r.ttl == 0));
    }

    #[test]
    fn test_empty_pending_builds_nothing() {
        let (host, services) = (host(), table(b""));
        let set = set(&host, &services);
        assert_eq!(
            build_response(&set, &Pending::new(2), &opts()).unwrap(),
            None
        );
        // asking for AAAA without an IPv6 address answers nothing either
        assert!(set.ipv6.is_none());
        let mut pending = Pending::new(2);
        pending.host = ResponseFlags::AAAA;
        assert_eq!(build_response(&set, &pending, &opts()).unwrap(), None);
    }

    #[test]
    fn test_legacy_options() {
        let (host, services) = (host(), table(b""));
        let set = set(&host, &services);
        let mut pending = Pending::new(2);
        pending.host = ResponseFlags::A;
        let legacy = ResponseOptions {
            id: 0xbeef,
            ttl: 10,
            cache_flush: false,
            additionals: true,
        };
        let msg = build_response(&set, &pending, &legacy).unwrap().unwrap();
        assert_eq!(&msg[..2], &[0xbe, 0xef]);
        let got = records(&msg);
        assert_eq!(got.len(), 1);
        assert!(!got[0].cache_flush);
        assert_eq!(got[0].ttl, 10);
    }

    #[test]
    fn test_names_are_compressed() {
        let (host, services) = (host(), table(b""));
        let set = set(&host, &services);
        let pending = Pending::all([0], services.capacity());
        let msg = build_response(&set, &pending, &opts()).unwrap().unwrap();
        // "mydevice._http._tcp.local" appears once in full
        let needle = b"\x08mydevice\x05_http";
        let hits = msg
            .windows(needle.len())
            .filter(|w| *w == &needle[..])
            .count();
        assert_eq!(hits, 1);
        // the host name is written once, the SRV target and A owner share it
        let host_hits = msg
            .windows(host.wire().len())
            .filter(|w| *w == host.wire())
            .count();
        assert_eq!(host_hits, 1);
        assert!(msg.len() > HEADER_LEN);
    }

    #[test]
    fn test_oversized_answer_aborts() {
        static BIG: [u8; 600] = [1u8; 600];
        let (host, services) = (host(), table(&BIG));
        let set = set(&host, &services);
        let mut pending = Pending::new(2);
        pending.insert_service(0, ResponseFlags::TXT);
        assert_eq!(
            build_response(&set, &pending, &opts()),
            Err(Error::ErrMessageTooLarge)
        );
    }

    #[test]
    fn test_oversized_additional_is_skipped() {
        static BIG: [u8; 450] = [1u8; 450];
        let (host, services) = (host(), table(&BIG));
        let set = set(&host, &services);
        let mut pending = Pending::new(2);
        pending.insert_service(0, ResponseFlags::PTR);
        let msg = build_response(&set, &pending, &opts()).unwrap().unwrap();
        assert!(msg.len() <= MAX_MESSAGE_SIZE);

        let mut p = Parser::default();
        let header = p.start(&msg).unwrap();
        assert_eq!(header.answers, 1);
        // the TXT does not fit, the address record after it still does
        assert_eq!(header.additionals, 2);
        let types: Vec<DnsType> = records(&msg).iter().map(|r| r.typ).collect();
        assert_eq!(types, vec![DnsType::Ptr, DnsType::Srv, DnsType::A]);
    }
}
