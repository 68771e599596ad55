use crate::boxes::{BoxClass, FourCC};
use std::collections::HashMap;

/// Registry entry for one box type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxSpec {
    pub class: BoxClass,
    /// Fixed payload (FullBox version/flags, entry count) that precedes the
    /// first child box. Always `Fixed(0)` for leaves.
    pub preamble: Preamble,
    pub name: &'static str,
}

/// How many payload bytes a container skips before its first child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preamble {
    Fixed(u64),
    /// A 4-byte version/flags word that is absent when the payload already
    /// opens with a `first_child` box (QuickTime `meta` vs ISO `meta`).
    OptionalFullBox { first_child: FourCC },
}

impl Preamble {
    /// The longest the preamble can be.
    pub fn max_len(self) -> u64 {
        match self {
            Preamble::Fixed(n) => n,
            Preamble::OptionalFullBox { .. } => 4,
        }
    }
}

const fn container(name: &'static str) -> BoxSpec {
    BoxSpec { class: BoxClass::Container, preamble: Preamble::Fixed(0), name }
}

/// Container that is also a FullBox, possibly with an entry count before its children.
const fn container_at(children_offset: u64, name: &'static str) -> BoxSpec {
    BoxSpec { class: BoxClass::Container, preamble: Preamble::Fixed(children_offset), name }
}

const fn optional_full_box(first_child: &[u8; 4], name: &'static str) -> BoxSpec {
    BoxSpec {
        class: BoxClass::Container,
        preamble: Preamble::OptionalFullBox { first_child: FourCC(*first_child) },
        name,
    }
}

const fn leaf(name: &'static str) -> BoxSpec {
    BoxSpec { class: BoxClass::Leaf, preamble: Preamble::Fixed(0), name }
}

/// Box types recognized out of the box.
///
/// Anything not in this table is classified `Unknown` and skipped by size.
pub static STANDARD_BOXES: &[([u8; 4], BoxSpec)] = &[
    // File-level / top-level
    (*b"ftyp", leaf("File Type Box")),
    (*b"styp", leaf("Segment Type Box")),
    (*b"moov", container("Movie Box")),
    (*b"mdat", leaf("Media Data Box")),
    (*b"free", leaf("Free Space Box")),
    (*b"skip", leaf("Free Space Box")),
    (*b"wide", leaf("Wide Atom")),
    (*b"pdin", leaf("Progressive Download Information Box")),
    (*b"meta", optional_full_box(b"hdlr", "Meta Box")),
    (*b"pssh", leaf("Protection System Specific Header Box")),
    (*b"sidx", leaf("Segment Index Box")),
    (*b"ssix", leaf("Subsegment Index Box")),
    (*b"prft", leaf("Producer Reference Time Box")),
    (*b"emsg", leaf("Event Message Box")),
    (*b"mfra", container("Movie Fragment Random Access Box")),
    (*b"mfro", leaf("Movie Fragment Random Access Offset Box")),
    (*b"tfra", leaf("Track Fragment Random Access Box")),
    (*b"uuid", leaf("User Extension Box")),
    // moov children
    (*b"mvhd", leaf("Movie Header Box")),
    (*b"trak", container("Track Box")),
    (*b"mvex", container("Movie Extends Box")),
    (*b"udta", container("User Data Box")),
    (*b"cprt", leaf("Copyright Box")),
    // trak children
    (*b"tkhd", leaf("Track Header Box")),
    (*b"edts", container("Edit Box")),
    (*b"elst", leaf("Edit List Box")),
    (*b"tref", container("Track Reference Box")),
    (*b"trgr", container("Track Group Box")),
    (*b"meco", container("Additional Metadata Container Box")),
    (*b"mdia", container("Media Box")),
    // mdia children
    (*b"mdhd", leaf("Media Header Box")),
    (*b"hdlr", leaf("Handler Reference Box")),
    (*b"minf", container("Media Information Box")),
    // minf children
    (*b"vmhd", leaf("Video Media Header Box")),
    (*b"smhd", leaf("Sound Media Header Box")),
    (*b"hmhd", leaf("Hint Media Header Box")),
    (*b"nmhd", leaf("Null Media Header Box")),
    (*b"sthd", leaf("Subtitle Media Header Box")),
    (*b"dinf", container("Data Information Box")),
    (*b"dref", container_at(8, "Data Reference Box")),
    (*b"url ", leaf("Data Entry URL Box")),
    (*b"urn ", leaf("Data Entry URN Box")),
    (*b"stbl", container("Sample Table Box")),
    // stbl children
    (*b"stsd", container_at(8, "Sample Description Box")),
    (*b"stts", leaf("Decoding Time to Sample Box")),
    (*b"ctts", leaf("Composition Time to Sample Box")),
    (*b"cslg", leaf("Composition to Decode Box")),
    (*b"stsc", leaf("Sample to Chunk Box")),
    (*b"stsz", leaf("Sample Size Box")),
    (*b"stz2", leaf("Compact Sample Size Box")),
    (*b"stco", leaf("Chunk Offset Box")),
    (*b"co64", leaf("64-bit Chunk Offset Box")),
    (*b"stss", leaf("Sync Sample Box")),
    (*b"stsh", leaf("Shadow Sync Sample Box")),
    (*b"padb", leaf("Padding Bits Box")),
    (*b"stdp", leaf("Degradation Priority Box")),
    (*b"sdtp", leaf("Independent and Disposable Samples Box")),
    (*b"sgpd", leaf("Sample Group Description Box")),
    (*b"sbgp", leaf("Sample to Group Box")),
    (*b"subs", leaf("Sub-Sample Information Box")),
    (*b"saio", leaf("Sample Auxiliary Information Offsets Box")),
    (*b"saiz", leaf("Sample Auxiliary Information Sizes Box")),
    // fragments
    (*b"mehd", leaf("Movie Extends Header Box")),
    (*b"trex", leaf("Track Extends Box")),
    (*b"moof", container("Movie Fragment Box")),
    (*b"mfhd", leaf("Movie Fragment Header Box")),
    (*b"traf", container("Track Fragment Box")),
    (*b"tfhd", leaf("Track Fragment Header Box")),
    (*b"tfdt", leaf("Track Fragment Decode Time Box")),
    (*b"trun", leaf("Track Fragment Run Box")),
    // meta / HEIF
    (*b"iloc", leaf("Item Location Box")),
    (*b"iinf", leaf("Item Information Box")),
    (*b"infe", leaf("Item Info Entry")),
    (*b"iref", container_at(4, "Item Reference Box")),
    (*b"pitm", leaf("Primary Item Box")),
    (*b"iprp", container("Item Properties Box")),
    (*b"ipco", container("Item Property Container Box")),
    (*b"ipma", leaf("Item Property Association Box")),
    (*b"ispe", leaf("Image Spatial Extents Property")),
    (*b"pixi", leaf("Pixel Information Property")),
    (*b"auxC", leaf("Auxiliary Type Property")),
    (*b"ilst", container("Metadata Item List")),
    // protection
    (*b"sinf", container("Protection Scheme Information Box")),
    (*b"frma", leaf("Original Format Box")),
    (*b"schm", leaf("Scheme Type Box")),
    (*b"schi", container("Scheme Information Box")),
    (*b"tenc", leaf("Track Encryption Box")),
    (*b"senc", leaf("Sample Encryption Box")),
    // sample entries and codec configuration
    (*b"avc1", leaf("AVC Sample Entry")),
    (*b"avc3", leaf("AVC Sample Entry")),
    (*b"hev1", leaf("HEVC Sample Entry")),
    (*b"hvc1", leaf("HEVC Sample Entry")),
    (*b"vvc1", leaf("VVC Sample Entry")),
    (*b"av01", leaf("AV1 Sample Entry")),
    (*b"vp08", leaf("VP8 Sample Entry")),
    (*b"vp09", leaf("VP9 Sample Entry")),
    (*b"mp4v", leaf("MPEG-4 Visual Sample Entry")),
    (*b"encv", leaf("Encrypted Video Sample Entry")),
    (*b"mp4a", leaf("MPEG-4 Audio Sample Entry")),
    (*b"ac-3", leaf("AC-3 Sample Entry")),
    (*b"ec-3", leaf("E-AC-3 Sample Entry")),
    (*b"Opus", leaf("Opus Sample Entry")),
    (*b"fLaC", leaf("FLAC Sample Entry")),
    (*b"alac", leaf("ALAC Sample Entry")),
    (*b"enca", leaf("Encrypted Audio Sample Entry")),
    (*b"avcC", leaf("AVC Configuration Box")),
    (*b"hvcC", leaf("HEVC Configuration Box")),
    (*b"av1C", leaf("AV1 Configuration Box")),
    (*b"esds", leaf("Elementary Stream Descriptor Box")),
    (*b"btrt", leaf("Bit Rate Box")),
    (*b"pasp", leaf("Pixel Aspect Ratio Box")),
    (*b"clap", leaf("Clean Aperture Box")),
    (*b"colr", leaf("Colour Information Box")),
    // QuickTime extras
    (*b"gama", leaf("Gamma Atom")),
    (*b"fiel", leaf("Field Handling Atom")),
    (*b"tapt", leaf("Track Aperture Mode Dimensions Atom")),
];

/// Type code → classification lookup.
///
/// Immutable once built; extend it with [`BoxRegistry::with_container`] and
/// [`BoxRegistry::with_leaf`] before handing it to the tree builder.
#[derive(Debug, Clone)]
pub struct BoxRegistry {
    map: HashMap<FourCC, BoxSpec>,
}

impl BoxRegistry {
    /// An empty registry: every type classifies as `Unknown`.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// The registry built from [`STANDARD_BOXES`].
    pub fn standard() -> Self {
        let map = STANDARD_BOXES
            .iter()
            .map(|(cc, spec)| (FourCC(*cc), *spec))
            .collect();
        Self { map }
    }

    pub fn with_container(self, typ: FourCC, name: &'static str) -> Self {
        self.with_spec(typ, container(name))
    }

    /// Register a container whose children start `children_offset` bytes into the payload.
    pub fn with_container_at(self, typ: FourCC, children_offset: u64, name: &'static str) -> Self {
        self.with_spec(typ, container_at(children_offset, name))
    }

    pub fn with_leaf(self, typ: FourCC, name: &'static str) -> Self {
        self.with_spec(typ, leaf(name))
    }

    pub fn with_spec(mut self, typ: FourCC, spec: BoxSpec) -> Self {
        self.map.insert(typ, spec);
        self
    }

    pub fn lookup(&self, typ: FourCC) -> Option<&BoxSpec> {
        self.map.get(&typ)
    }

    pub fn classify(&self, typ: FourCC) -> BoxClass {
        self.lookup(typ).map_or(BoxClass::Unknown, |s| s.class)
    }

    pub fn preamble(&self, typ: FourCC) -> Preamble {
        self.lookup(typ).map_or(Preamble::Fixed(0), |s| s.preamble)
    }

    /// Longest preamble for `typ`; the tree builder resolves optional ones per box.
    pub fn children_offset(&self, typ: FourCC) -> u64 {
        self.preamble(typ).max_len()
    }

    pub fn full_name(&self, typ: FourCC) -> &'static str {
        self.lookup(typ).map_or("Unknown Box", |s| s.name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for BoxRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn standard_table_has_no_duplicates() {
        let mut seen = HashSet::new();
        for (cc, _) in STANDARD_BOXES {
            assert!(seen.insert(*cc), "duplicate entry {:?}", FourCC(*cc));
        }
        assert_eq!(BoxRegistry::standard().len(), STANDARD_BOXES.len());
    }

    #[test]
    fn leaves_have_no_children_offset() {
        for (cc, spec) in STANDARD_BOXES {
            if spec.class == BoxClass::Leaf {
                assert_eq!(spec.preamble, Preamble::Fixed(0), "{:?}", FourCC(*cc));
            }
            assert_ne!(spec.class, BoxClass::Unknown);
        }
    }
}
