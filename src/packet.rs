//! Packet model: addresses, memory commands, and the unit of work moving through a port.

use crate::event::Tick;
use std::fmt;

/// Physical address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Addr(pub u64);

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Identifies a packet for tracing (unique per issuer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PacketId(pub u64);

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Half-open address range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddrRange {
    pub start: Addr,
    pub end: Addr,
}

impl AddrRange {
    pub fn new(start: u64, end: u64) -> Self {
        assert!(start <= end, "address range must not be inverted");
        Self {
            start: Addr(start),
            end: Addr(end),
        }
    }

    pub fn contains(&self, addr: Addr) -> bool {
        addr >= self.start && addr < self.end
    }

    pub fn size(&self) -> u64 {
        self.end.0 - self.start.0
    }
}

/// Memory command carried by a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemCmd {
    ReadReq,
    ReadExReq,
    ReadSharedReq,
    WriteReq,
    WritebackDirty,
    WritebackClean,
    CleanEvict,
    InvalidateReq,
    ReadResp,
    WriteResp,
}

/// Coarse classification used to pick a security-check latency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    Read,
    Write,
    Other,
}

impl CommandKind {
    /// Classifies a command by name: any name mentioning "read" is a read, otherwise any
    /// name mentioning "write" is a write. Matching ignores case.
    pub fn classify(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.contains("read") {
            CommandKind::Read
        } else if lower.contains("write") {
            CommandKind::Write
        } else {
            CommandKind::Other
        }
    }
}

impl MemCmd {
    pub fn name(&self) -> &'static str {
        match self {
            MemCmd::ReadReq => "ReadReq",
            MemCmd::ReadExReq => "ReadExReq",
            MemCmd::ReadSharedReq => "ReadSharedReq",
            MemCmd::WriteReq => "WriteReq",
            MemCmd::WritebackDirty => "WritebackDirty",
            MemCmd::WritebackClean => "WritebackClean",
            MemCmd::CleanEvict => "CleanEvict",
            MemCmd::InvalidateReq => "InvalidateReq",
            MemCmd::ReadResp => "ReadResp",
            MemCmd::WriteResp => "WriteResp",
        }
    }

    pub fn kind(&self) -> CommandKind {
        CommandKind::classify(self.name())
    }

    pub fn is_request(&self) -> bool {
        !self.is_response()
    }

    pub fn is_response(&self) -> bool {
        matches!(self, MemCmd::ReadResp | MemCmd::WriteResp)
    }

    /// Whether the memory side answers this command with a response packet.
    pub fn needs_response(&self) -> bool {
        matches!(
            self,
            MemCmd::ReadReq | MemCmd::ReadExReq | MemCmd::ReadSharedReq | MemCmd::WriteReq
        )
    }

    /// The response command paired with this request, if any.
    pub fn response_command(&self) -> Option<MemCmd> {
        match self {
            MemCmd::ReadReq | MemCmd::ReadExReq | MemCmd::ReadSharedReq => Some(MemCmd::ReadResp),
            MemCmd::WriteReq => Some(MemCmd::WriteResp),
            _ => None,
        }
    }
}

impl fmt::Display for MemCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single memory request or response.
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    pub id: PacketId,
    pub cmd: MemCmd,
    pub addr: Addr,
    /// Access size in bytes.
    pub size: u32,
    /// Write data on requests, read data on responses.
    pub data: Vec<u8>,
    /// Tick at which the issuer created the request (kept on the response).
    pub created_at: Tick,
}

impl Packet {
    pub fn new(id: PacketId, cmd: MemCmd, addr: u64, size: u32, created_at: Tick) -> Self {
        Self {
            id,
            cmd,
            addr: Addr(addr),
            size,
            data: Vec::new(),
            created_at,
        }
    }

    pub fn read(id: u64, addr: u64, created_at: Tick) -> Self {
        Self::new(PacketId(id), MemCmd::ReadReq, addr, 64, created_at)
    }

    pub fn write(id: u64, addr: u64, created_at: Tick) -> Self {
        let mut pkt = Self::new(PacketId(id), MemCmd::WriteReq, addr, 64, created_at);
        pkt.data = vec![0; 64];
        pkt
    }

    /// Turns a request into its response in place. Returns false if the command has no
    /// response form.
    pub fn make_response(&mut self) -> bool {
        let Some(resp) = self.cmd.response_command() else {
            return false;
        };
        if resp == MemCmd::ReadResp {
            self.data = vec![0; self.size as usize];
        } else {
            self.data.clear();
        }
        self.cmd = resp;
        true
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [{}:{}]", self.id, self.cmd, self.addr, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_command_name() {
        assert_eq!(MemCmd::ReadReq.kind(), CommandKind::Read);
        assert_eq!(MemCmd::ReadExReq.kind(), CommandKind::Read);
        assert_eq!(MemCmd::ReadSharedReq.kind(), CommandKind::Read);
        assert_eq!(MemCmd::WriteReq.kind(), CommandKind::Write);
        assert_eq!(MemCmd::WritebackDirty.kind(), CommandKind::Write);
        assert_eq!(MemCmd::CleanEvict.kind(), CommandKind::Other);
        assert_eq!(MemCmd::InvalidateReq.kind(), CommandKind::Other);
    }

    #[test]
    fn classify_ignores_case_and_position() {
        // A match at the very start of the name still counts.
        assert_eq!(CommandKind::classify("read"), CommandKind::Read);
        assert_eq!(CommandKind::classify("UncachedWRITE"), CommandKind::Write);
        assert_eq!(CommandKind::classify("ReadModifyWrite"), CommandKind::Read);
        assert_eq!(CommandKind::classify("Flush"), CommandKind::Other);
    }

    #[test]
    fn make_response_converts_command() {
        let mut rd = Packet::read(1, 0x40, 0);
        assert!(rd.make_response());
        assert_eq!(rd.cmd, MemCmd::ReadResp);
        assert_eq!(rd.data.len(), 64);

        let mut wr = Packet::write(2, 0x80, 0);
        assert!(wr.make_response());
        assert_eq!(wr.cmd, MemCmd::WriteResp);
        assert!(wr.data.is_empty());

        let mut evict = Packet::new(PacketId(3), MemCmd::CleanEvict, 0, 64, 0);
        assert!(!evict.make_response());
        assert_eq!(evict.cmd, MemCmd::CleanEvict);
    }

    #[test]
    fn addr_range_contains() {
        let r = AddrRange::new(0x1000, 0x2000);
        assert!(r.contains(Addr(0x1000)));
        assert!(r.contains(Addr(0x1fff)));
        assert!(!r.contains(Addr(0x2000)));
        assert_eq!(r.size(), 0x1000);
    }
}
