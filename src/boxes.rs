use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const UUID: FourCC = FourCC(*b"uuid");

    pub fn from_str(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() == 4 {
            Some(FourCC([b[0], b[1], b[2], b[3]]))
        } else {
            None
        }
    }

    pub fn as_str_lossy(&self) -> String {
        self.0
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}
impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl Serialize for FourCC {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.as_str_lossy())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxHeader {
    pub start: u64,               // file offset of header start
    pub typ: FourCC,              // 4CC or b"uuid"
    pub declared_size: u32,       // raw 32-bit size field: 0, 1, or a literal size
    pub large_size: Option<u64>,  // 64-bit size, only when declared_size == 1
    pub size: u64,                // resolved total size including header
    pub uuid: Option<[u8; 16]>,
    pub header_size: u64,         // 8, 16, 24, or 32
}

impl BoxHeader {
    pub fn end(&self) -> u64 {
        self.start + self.size
    }

    pub fn payload_start(&self) -> u64 {
        self.start + self.header_size
    }

    /// The size the header itself claims, before any clamping to an enclosing range.
    pub fn claimed_size(&self) -> Option<u64> {
        match self.declared_size {
            0 => None,
            1 => self.large_size,
            n => Some(n as u64),
        }
    }

    pub fn display_type(&self) -> String {
        match self.uuid {
            Some(u) => format!("uuid:{}", hex::encode(u)),
            None => self.typ.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxClass {
    /// Payload is a sequence of child boxes.
    Container,
    /// Known type; payload is skipped.
    Leaf,
    /// Type not in the registry; reported by size/type only.
    Unknown,
}

impl fmt::Display for BoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BoxClass::Container => "container",
            BoxClass::Leaf => "leaf",
            BoxClass::Unknown => "unknown",
        })
    }
}

/// One parsed box. `children` is `Some` only for containers, even when empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxNode {
    pub header: BoxHeader,
    pub class: BoxClass,
    pub children: Option<Vec<BoxNode>>,
}

impl BoxNode {
    pub fn start(&self) -> u64 {
        self.header.start
    }

    pub fn end(&self) -> u64 {
        self.header.end()
    }

    pub fn size(&self) -> u64 {
        self.header.size
    }

    pub fn typ(&self) -> FourCC {
        self.header.typ
    }

    /// Depth-first search for the first box of the given type.
    pub fn find(&self, typ: FourCC) -> Option<&BoxNode> {
        if self.header.typ == typ {
            return Some(self);
        }
        self.children
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find_map(|c| c.find(typ))
    }
}

impl Serialize for BoxNode {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let hdr = &self.header;
        let mut st = s.serialize_struct("BoxNode", 7)?;
        st.serialize_field("offset", &hdr.start)?;
        st.serialize_field("size", &hdr.size)?;
        st.serialize_field("header_size", &hdr.header_size)?;
        st.serialize_field("typ", &hdr.typ)?;
        st.serialize_field("uuid", &hdr.uuid.map(hex::encode))?;
        st.serialize_field("class", &self.class)?;
        st.serialize_field("children", &self.children)?;
        st.end()
    }
}

/// Lookup key for payload decoders: a plain type code or a `uuid` extended type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoxKey {
    FourCC(FourCC),
    Uuid([u8; 16]),
}

impl From<&BoxHeader> for BoxKey {
    fn from(h: &BoxHeader) -> Self {
        match h.uuid {
            Some(u) => BoxKey::Uuid(u),
            None => BoxKey::FourCC(h.typ),
        }
    }
}
