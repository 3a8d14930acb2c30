//! Socket and interface queries.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::launcher::{LaunchError, ProcessLauncher};
use crate::proc_stats::ProcFs;

/// One row of a `/proc/net/{tcp,udp}[6]` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEntry {
    pub local: (IpAddr, u16),
    pub remote: (IpAddr, u16),
    pub state: u8,
}

impl SocketEntry {
    pub fn state_name(&self) -> &'static str {
        tcp_state_name(self.state)
    }
}

pub const TCP_LISTEN: u8 = 0x0A;

pub fn tcp_state_name(state: u8) -> &'static str {
    match state {
        0x01 => "ESTABLISHED",
        0x02 => "SYN_SENT",
        0x03 => "SYN_RECV",
        0x04 => "FIN_WAIT1",
        0x05 => "FIN_WAIT2",
        0x06 => "TIME_WAIT",
        0x07 => "CLOSE",
        0x08 => "CLOSE_WAIT",
        0x09 => "LAST_ACK",
        0x0A => "LISTEN",
        0x0B => "CLOSING",
        _ => "UNKNOWN",
    }
}

/// IPv4-mapped IPv6 addresses compare as their IPv4 form.
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

/// Address words are printed as host-order `u32`s.
fn parse_hex_ip(hex: &str) -> Option<IpAddr> {
    match hex.len() {
        8 => {
            let word = u32::from_str_radix(hex, 16).ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(word.to_ne_bytes())))
        }
        32 => {
            let mut bytes = [0u8; 16];
            for (i, chunk) in bytes.chunks_mut(4).enumerate() {
                let word = u32::from_str_radix(hex.get(i * 8..i * 8 + 8)?, 16).ok()?;
                chunk.copy_from_slice(&word.to_ne_bytes());
            }
            Some(IpAddr::V6(Ipv6Addr::from(bytes)))
        }
        _ => None,
    }
}

fn parse_endpoint(field: &str) -> Option<(IpAddr, u16)> {
    let (ip, port) = field.split_once(':')?;
    Some((canonical(parse_hex_ip(ip)?), u16::from_str_radix(port, 16).ok()?))
}

/// Parse a socket table, skipping the header and any malformed row.
pub fn parse_socket_table(text: &str) -> Vec<SocketEntry> {
    text.lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace().skip(1);
            let local = parse_endpoint(fields.next()?)?;
            let remote = parse_endpoint(fields.next()?)?;
            let state = u8::from_str_radix(fields.next()?, 16).ok()?;
            Some(SocketEntry {
                local,
                remote,
                state,
            })
        })
        .collect()
}

/// Rows of every table in `tables` that exists; missing tables (no IPv6,
/// for instance) are skipped.
fn read_tables(procfs: &ProcFs, tables: &[&str]) -> io::Result<Vec<SocketEntry>> {
    let mut entries = Vec::new();
    let mut found = false;
    for table in tables {
        match procfs.read(&format!("net/{}", table)) {
            Ok(text) => {
                found = true;
                entries.extend(parse_socket_table(&text));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err),
        }
    }
    if !found {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "socket tables are not available on this platform",
        ));
    }
    Ok(entries)
}

/// State of the TCP connection with this exact 4-tuple, if one exists.
pub fn outgoing_socket_state(
    procfs: &ProcFs,
    local: (IpAddr, u16),
    remote: (IpAddr, u16),
) -> io::Result<Option<&'static str>> {
    let local = (canonical(local.0), local.1);
    let remote = (canonical(remote.0), remote.1);
    Ok(read_tables(procfs, &["tcp", "tcp6"])?
        .into_iter()
        .find(|entry| entry.local == local && entry.remote == remote)
        .map(|entry| entry.state_name()))
}

/// Whether a socket is bound at `ip:port`: in `LISTEN` state for TCP, or
/// present at all for UDP.
pub fn listening_socket_exists(procfs: &ProcFs, ip: IpAddr, port: u16, tcp: bool) -> io::Result<bool> {
    let local = (canonical(ip), port);
    let tables: &[&str] = if tcp { &["tcp", "tcp6"] } else { &["udp", "udp6"] };
    Ok(read_tables(procfs, tables)?
        .iter()
        .any(|entry| entry.local == local && (!tcp || entry.state == TCP_LISTEN)))
}

#[derive(Debug)]
pub enum InterfaceError {
    InvalidName(String),
    Launch(LaunchError),
    Failed { status: Option<i32>, stderr: String },
}

impl std::fmt::Display for InterfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterfaceError::InvalidName(name) => write!(f, "invalid interface name {:?}", name),
            InterfaceError::Launch(err) => write!(f, "{}", err),
            InterfaceError::Failed { status, stderr } => match status {
                Some(code) => write!(f, "ip exited with status {}: {}", code, stderr.trim()),
                None => write!(f, "ip was terminated by a signal"),
            },
        }
    }
}

impl std::error::Error for InterfaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InterfaceError::Launch(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LaunchError> for InterfaceError {
    fn from(err: LaunchError) -> Self {
        InterfaceError::Launch(err)
    }
}

/// Interface names are passed as a single argument; anything that could be
/// read as an option is refused.
fn validate_interface_name(name: &str) -> Result<&str, InterfaceError> {
    let name = name.trim();
    let valid = !name.is_empty()
        && name.len() <= 15
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@' | ':'));
    if valid {
        Ok(name)
    } else {
        Err(InterfaceError::InvalidName(name.to_string()))
    }
}

/// IPv4 addresses of `interface`, via `ip -4 -o addr show`.
pub fn interface_ip_addresses(
    launcher: &dyn ProcessLauncher,
    interface: &str,
) -> Result<Vec<String>, InterfaceError> {
    let interface = validate_interface_name(interface)?;
    let output = launcher.run("ip", &["-4", "-o", "addr", "show", "dev", interface])?;
    if !output.success() {
        return Err(InterfaceError::Failed {
            status: output.status,
            stderr: output.stderr,
        });
    }
    Ok(parse_ip_addr_output(&output.stdout))
}

pub fn parse_ip_addr_output(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut words = line.split_whitespace();
            words.find(|word| *word == "inet")?;
            let cidr = words.next()?;
            Some(cidr.split('/').next().unwrap_or(cidr).to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::{DisabledLauncher, LaunchOutput};

    const TCP: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n\
   0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 1 1\n\
   1: 0100007F:C350 0100007F:1F90 01 00000000:00000000 00:00000000 00000000  1000        0 2 1\n";

    struct CannedLauncher(&'static str);

    impl ProcessLauncher for CannedLauncher {
        fn run(&self, _program: &str, _args: &[&str]) -> Result<LaunchOutput, LaunchError> {
            Ok(LaunchOutput {
                status: Some(0),
                stdout: self.0.to_string(),
                stderr: String::new(),
            })
        }
    }

    fn fixture(tcp: &str) -> (tempfile::TempDir, ProcFs) {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("net")).expect("mkdir net");
        std::fs::write(dir.path().join("net/tcp"), tcp).expect("write tcp");
        let procfs = ProcFs::new(dir.path());
        (dir, procfs)
    }

    fn localhost() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    #[cfg(target_endian = "little")]
    #[test]
    fn parses_ipv4_rows() {
        let entries = parse_socket_table(TCP);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].local, (localhost(), 8080));
        assert_eq!(entries[0].state_name(), "LISTEN");
        assert_eq!(entries[1].remote, (localhost(), 8080));
    }

    #[cfg(target_endian = "little")]
    #[test]
    fn finds_sockets_in_fixture_tables() {
        let (_dir, procfs) = fixture(TCP);
        assert!(listening_socket_exists(&procfs, localhost(), 8080, true).unwrap());
        assert!(!listening_socket_exists(&procfs, localhost(), 50000, true).unwrap());
        assert_eq!(
            outgoing_socket_state(&procfs, (localhost(), 50000), (localhost(), 8080)).unwrap(),
            Some("ESTABLISHED")
        );
        // UDP tables are absent from the fixture.
        assert!(listening_socket_exists(&procfs, localhost(), 8080, false).is_err());
    }

    #[test]
    fn mapped_addresses_are_canonical() {
        let mapped: IpAddr = "::ffff:127.0.0.1".parse().expect("parse");
        assert_eq!(canonical(mapped), localhost());
    }

    #[test]
    fn parses_ip_addr_output() {
        let stdout = "2: eth0    inet 10.0.0.5/24 brd 10.0.0.255 scope global eth0\\       valid_lft forever\n\
                      2: eth0    inet 10.0.0.6/24 scope global secondary eth0\n";
        assert_eq!(
            parse_ip_addr_output(stdout),
            vec!["10.0.0.5".to_string(), "10.0.0.6".to_string()]
        );
    }

    #[test]
    fn interface_lookup_uses_launcher() {
        let launcher = CannedLauncher("1: lo    inet 127.0.0.1/8 scope host lo\n");
        assert_eq!(
            interface_ip_addresses(&launcher, " lo ").unwrap(),
            vec!["127.0.0.1".to_string()]
        );
    }

    #[test]
    fn option_like_interface_names_are_refused() {
        let err = interface_ip_addresses(&DisabledLauncher, "-h").unwrap_err();
        assert!(matches!(err, InterfaceError::InvalidName(_)));
        let err = interface_ip_addresses(&DisabledLauncher, "eth0").unwrap_err();
        assert!(matches!(err, InterfaceError::Launch(LaunchError::Unsupported { .. })));
    }
}
