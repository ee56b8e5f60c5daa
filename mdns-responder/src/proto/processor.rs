//! Inbound datagram handling: the query path and the response path.

use std::net::SocketAddr;
use std::time::Instant;

use super::builder::{Owner, ResponseOptions};
use super::pending::{Pending, ResponseFlags};
use super::{MDNS_PORT, Responder, ResponderState};
use crate::config::{CONFLICT_HOLD, LEGACY_UNICAST_TTL, PROBE_DEFER_DELAY, SHARED_RESPONSE_DELAY};
use crate::message::compare::{is_duplicate, is_rr_win};
use crate::message::header::Header;
use crate::message::name::Name;
use crate::message::parser::Parser;
use crate::message::resource::Record;
use crate::message::{DNSCLASS_ANY, DNSCLASS_INET, MAX_INBOUND_SIZE, MIN_PACKET_LEN};
use shared::AddressFamily;
use shared::error::{Error, Result};

impl Responder {
    /// Handles one inbound datagram. Any error means the rest of the
    /// datagram was ignored; the responder itself is unaffected.
    pub(super) fn process_message(&mut self, msg: &[u8], src: SocketAddr, now: Instant) -> Result<()> {
        if msg.len() < MIN_PACKET_LEN {
            return Err(Error::ErrPacketTooShort);
        }
        if msg.len() > MAX_INBOUND_SIZE {
            return Err(Error::ErrPacketTooLong);
        }

        let mut parser = Parser::default();
        let header = parser.start(msg)?;
        if header.is_query() {
            self.process_query(&mut parser, &header, src, now)
        } else if header.is_response() {
            self.process_response(&mut parser, now)
        } else {
            Err(Error::ErrNotMdnsMessage)
        }
    }

    fn process_query(
        &mut self,
        parser: &mut Parser<'_>,
        header: &Header,
        src: SocketAddr,
        now: Instant,
    ) -> Result<()> {
        let mut pending = Pending::new(self.services.capacity());
        let mut shared = false;
        let mut probed: Vec<Owner> = Vec::new();

        loop {
            let q = match parser.question() {
                Ok(q) => q,
                Err(Error::ErrSectionDone) => break,
                Err(err) => return Err(err),
            };
            if q.class != DNSCLASS_INET && q.class != DNSCLASS_ANY {
                continue;
            }
            match self.state {
                ResponderState::Probing => {
                    if let Some(owner) = self.record_set().unique_owner(&q.name)
                        && !probed.contains(&owner)
                    {
                        probed.push(owner);
                    }
                }
                ResponderState::Announcing | ResponderState::WaitingRequest => {
                    let flags = ResponseFlags::from_query_type(q.typ);
                    shared |= self.match_question(&q.name, flags, &mut pending);
                }
                ResponderState::Disabled | ResponderState::ProbingWait => {}
            }
        }

        if !probed.is_empty() {
            return self.check_simultaneous_probe(parser, &probed, now);
        }
        if pending.is_empty() {
            return Ok(());
        }

        self.suppress_known_answers(parser, &mut pending)?;
        if pending.is_empty() {
            log::debug!("every answer for {src} suppressed by known answers");
            return Ok(());
        }

        if src.port() != MDNS_PORT {
            // legacy unicast: straight back to the querier, no cache-flush
            let opts = ResponseOptions {
                id: header.id,
                ttl: self.config.rr_ttl.min(LEGACY_UNICAST_TTL),
                cache_flush: false,
                additionals: true,
            };
            self.send_response(&pending, &opts, src, now);
            return Ok(());
        }

        self.pending.merge(&pending);
        self.pending_family = AddressFamily::of(&src.ip());
        if shared {
            if self.shared_deadline.is_none() {
                self.shared_deadline = Some(now + SHARED_RESPONSE_DELAY);
            }
        } else {
            self.flush_pending(now);
        }
        Ok(())
    }

    /// Adds what a question asks of us to `pending`. Returns true when a
    /// shared (PTR) record was asked for.
    fn match_question(&self, name: &Name, flags: ResponseFlags, pending: &mut Pending) -> bool {
        let mut shared = false;
        if name.matches(self.host_name.fqdn()) {
            pending.host |= flags & ResponseFlags::ADDRESS;
        }
        for (slot, svc) in self.services.iter() {
            if name.matches(&svc.instance_name) {
                pending.insert_service(slot, flags & ResponseFlags::INSTANCE);
            }
            if name.matches(&svc.type_name) {
                let ptr = flags & ResponseFlags::PTR;
                if !ptr.is_empty() {
                    pending.insert_service(slot, ptr);
                    shared = true;
                }
            }
        }
        shared
    }

    // The querier's answer section lists what it already knows.
    fn suppress_known_answers(&self, parser: &mut Parser<'_>, pending: &mut Pending) -> Result<()> {
        let local = self.record_set().records(self.config.rr_ttl);
        loop {
            let known = match parser.answer() {
                Ok(r) => r,
                Err(Error::ErrSectionDone) => return Ok(()),
                Err(err) => return Err(err),
            };
            for (owner, flag, record) in &local {
                if known.name.matches(&record.name) && is_duplicate(&known, record) {
                    log::debug!("known answer suppresses {record}");
                    match *owner {
                        Owner::Host => pending.host.remove(*flag),
                        Owner::Service(slot) => pending.remove_service(slot, *flag),
                    }
                }
            }
        }
    }

    /// A query naming one of our names while we probe is either an
    /// ordinary query, ignored, or another host's probe carrying its
    /// proposed records in the authority section. For a probe, both record
    /// sets are compared and the lexicographically earlier set defers.
    fn check_simultaneous_probe(
        &mut self,
        parser: &mut Parser<'_>,
        probed: &[Owner],
        now: Instant,
    ) -> Result<()> {
        parser.skip_all_answers()?;
        let mut theirs: Vec<Record> = Vec::new();
        loop {
            match parser.authority() {
                Ok(r) => theirs.push(r),
                Err(Error::ErrSectionDone) => break,
                Err(err) => return Err(err),
            }
        }
        if theirs.is_empty() {
            return Ok(());
        }

        let lost = {
            let set = self.record_set();
            probed.iter().find_map(|&owner| {
                let name = match owner {
                    Owner::Host => set.host,
                    Owner::Service(slot) => &set.services.by_slot(slot)?.instance_name,
                };
                let theirs: Vec<Record> = theirs
                    .iter()
                    .filter(|r| r.name.matches(name))
                    .cloned()
                    .collect();
                if theirs.is_empty() {
                    return None;
                }
                let ours = set.probe_records(owner, self.config.rr_ttl);
                if is_rr_win(&ours, &theirs) {
                    None
                } else {
                    Some(name.to_string())
                }
            })
        };

        if let Some(name) = lost {
            log::info!("lost simultaneous probe tie-break for {name}, deferring");
            self.enter_probing_wait(now, PROBE_DEFER_DELAY);
        }
        Ok(())
    }

    fn process_response(&mut self, parser: &mut Parser<'_>, now: Instant) -> Result<()> {
        if !matches!(
            self.state,
            ResponderState::Probing | ResponderState::Announcing | ResponderState::WaitingRequest
        ) {
            return Ok(());
        }

        let local = self.record_set().records(self.config.rr_ttl);
        let conflict = loop {
            let record = match parser.any_record() {
                Ok((_, record)) => record,
                Err(Error::ErrSectionDone) => break None,
                Err(err) => return Err(err),
            };
            if self.is_conflicting(&record, &local) {
                break Some(record);
            }
        };

        if let Some(record) = conflict {
            self.handle_conflict(&record, now);
        }
        Ok(())
    }

    /// Another host asserting one of our unique names with data we do not
    /// hold. Identical records are what our own looped-back traffic looks
    /// like and are not a conflict.
    fn is_conflicting(&self, record: &Record, local: &[(Owner, ResponseFlags, Record)]) -> bool {
        if record.class != DNSCLASS_INET || !record.cache_flush || record.ttl == 0 {
            return false;
        }
        if self.record_set().unique_owner(&record.name).is_none() {
            return false;
        }
        !local.iter().any(|(_, _, ours)| {
            ours.name.matches(&record.name) && ours.typ == record.typ && ours.rdata == record.rdata
        })
    }

    fn handle_conflict(&mut self, record: &Record, now: Instant) {
        log::warn!(
            "{}: conflicting record in state {}: {record}",
            self.host_name.label(),
            self.state
        );
        self.last_conflict = Some(now);
        self.host_announced = false;
        if self.state == ResponderState::Probing
            && let Err(err) = self.rename()
        {
            log::warn!("Failed to rename after conflict: {err}");
        }
        self.enter_probing_wait(now, CONFLICT_HOLD);
    }
}
