//! mDNS Responder Example
//!
//! This example runs a sans-I/O mdns-responder on a real interface: it
//! claims `<host-name>.local`, advertises the given services and answers
//! queries until Ctrl+C, then says goodbye.
//!
//! # Usage
//!
//! ```
//! cargo run --package mdns-responder --example mdns_responder -- \
//!     --interface eth0 --host-name mydevice --service _http._tcp:8080 --txt path=/
//! ```
//!
//! Then browse with `avahi-browse -r _http._tcp` or `dns-sd -B _http._tcp`.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use clap::Parser;
use mdns_responder::ifaces::SystemInterfaces;
use mdns_responder::{MulticastSocket, Responder, ResponderConfig, ResponderEvent, TxtRecord};
use sansio::Protocol;
use shared::{AddressFamily, TaggedBytesMut, TransportContext};
use tokio::net::UdpSocket;

#[derive(Parser, Debug)]
#[command(name = "mDNS Responder")]
#[command(version = "0.1.0")]
#[command(about = "An example of an mDNS/DNS-SD responder using sans-I/O mdns-responder")]
struct Args {
    /// Interface to advertise on
    #[arg(long, default_value = "eth0")]
    interface: String,

    /// Host name, without .local
    #[arg(long, default_value = "mdns-responder")]
    host_name: String,

    /// Use IPv6 (ff02::fb) instead of IPv4 (224.0.0.251)
    #[arg(long)]
    ipv6: bool,

    /// Address to advertise instead of the interface's own
    #[arg(long)]
    ip: Option<IpAddr>,

    /// Service to advertise as <type>:<port>, e.g. _http._tcp:8080
    #[arg(long)]
    service: Vec<String>,

    /// TXT entry key=value attached to every service
    #[arg(long)]
    txt: Vec<String>,

    /// Record TTL in seconds
    #[arg(long, default_value_t = 120)]
    ttl: u32,
}

fn txt_record(entries: &[String]) -> Result<TxtRecord, Box<dyn std::error::Error>> {
    let mut txt = TxtRecord::new();
    for entry in entries {
        txt = match entry.split_once('=') {
            Some((key, value)) => txt.with_entry(key, value)?,
            None => txt.with_flag(entry)?,
        };
    }
    Ok(txt)
}

fn log_events(responder: &mut Responder) {
    while let Some(event) = responder.poll_event() {
        match event {
            ResponderEvent::StateChanged(state) => log::info!("state: {state}"),
            ResponderEvent::NameConflict { host_name } => {
                log::warn!("name conflict, now advertising as {host_name}.local")
            }
        }
    }
}

async fn flush(responder: &mut Responder, socket: &UdpSocket) {
    while let Some(packet) = responder.poll_write() {
        log::debug!(
            "Sending {} bytes to {}",
            packet.message.len(),
            packet.transport.peer_addr
        );
        if let Err(e) = socket
            .send_to(&packet.message, packet.transport.peer_addr)
            .await
        {
            log::warn!("Failed to send packet: {e}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let family = if args.ipv6 {
        AddressFamily::Ipv6
    } else {
        AddressFamily::Ipv4
    };

    let mut config = ResponderConfig::new(&args.interface, family, &args.host_name)
        .with_rr_ttl(args.ttl);
    match args.ip {
        Some(IpAddr::V4(ip)) => config = config.with_ipv4(ip),
        Some(IpAddr::V6(ip)) => config = config.with_ipv6(ip, 0),
        None => {}
    }
    let config = config.resolve_addresses(&SystemInterfaces);

    log::info!("Starting mDNS responder");
    log::info!("  Interface: {} ({:?})", config.interface, config.family);
    log::info!("  Host name: {}.local", config.host_name);
    log::info!("  IPv4: {:?}, IPv6: {:?}", config.ipv4, config.ipv6.map(|(ip, _)| ip));

    let std_socket = MulticastSocket::for_config(&config).into_std()?;
    let socket = UdpSocket::from_std(std_socket)?;
    let local_addr = socket.local_addr()?;

    let mut responder = Responder::new(config, Instant::now())?;
    for service in &args.service {
        let Some((service_type, port)) = service.rsplit_once(':') else {
            return Err(format!("service {service} is not <type>:<port>").into());
        };
        let txt = txt_record(&args.txt)?;
        responder.register_service(service_type, port.parse()?, Some(Box::new(txt)))?;
        log::info!("  Service: {service_type} on port {port}");
    }

    println!("mDNS responder running. Press Ctrl+C to stop.");

    let mut buf = vec![0u8; 9000];

    loop {
        flush(&mut responder, &socket).await;
        log_events(&mut responder);

        let wait = responder
            .poll_timeout()
            .map_or(Duration::from_secs(1), |deadline| {
                deadline.saturating_duration_since(Instant::now())
            });

        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, src)) => {
                        log::trace!("Received {len} bytes from {src}");
                        let msg = TaggedBytesMut {
                            now: Instant::now(),
                            transport: TransportContext {
                                local_addr,
                                peer_addr: src,
                            },
                            message: BytesMut::from(&buf[..len]),
                        };
                        if let Err(e) = responder.handle_read(msg) {
                            log::warn!("Failed to handle packet: {e}");
                        }
                    }
                    Err(e) => {
                        log::warn!("Socket recv error: {e}");
                    }
                }
            }
            _ = tokio::time::sleep(wait) => {
                responder.handle_timeout(Instant::now())?;
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    responder.close()?;
    flush(&mut responder, &socket).await;
    Ok(())
}
