use crate::boxes::FourCC;

macro_rules! known_boxes {
    ($($variant:ident => $cc:literal, $name:literal;)*) => {
        /// Typed view over common MP4 / ISOBMFF boxes.
        ///
        /// Anything not in this list becomes `KnownBox::Unknown(fourcc)`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum KnownBox {
            $($variant,)*
            Unknown(FourCC),
        }

        impl KnownBox {
            pub const ALL: &'static [KnownBox] = &[$(KnownBox::$variant,)*];

            pub fn fourcc(&self) -> FourCC {
                match self {
                    $(KnownBox::$variant => FourCC(*$cc),)*
                    KnownBox::Unknown(cc) => *cc,
                }
            }

            pub fn full_name(&self) -> &'static str {
                match self {
                    $(KnownBox::$variant => $name,)*
                    KnownBox::Unknown(_) => "Unknown Box",
                }
            }
        }

        impl From<FourCC> for KnownBox {
            fn from(cc: FourCC) -> Self {
                match &cc.0 {
                    $($cc => KnownBox::$variant,)*
                    _ => KnownBox::Unknown(cc),
                }
            }
        }
    };
}

known_boxes! {
    // File level
    Ftyp => b"ftyp", "File Type Box";
    Moov => b"moov", "Movie Box";
    Mdat => b"mdat", "Media Data Box";
    Free => b"free", "Free Space Box";
    Skip => b"skip", "Free Space Box";
    Wide => b"wide", "Wide Box";
    Meta => b"meta", "Meta Box";
    Pssh => b"pssh", "Protection System Specific Header Box";
    Sidx => b"sidx", "Segment Index Box";
    Styp => b"styp", "Segment Type Box";
    Mfra => b"mfra", "Movie Fragment Random Access Box";
    Mfro => b"mfro", "Movie Fragment Random Access Offset Box";

    // moov / trak
    Mvhd => b"mvhd", "Movie Header Box";
    Trak => b"trak", "Track Box";
    Udta => b"udta", "User Data Box";
    Tkhd => b"tkhd", "Track Header Box";
    Tref => b"tref", "Track Reference Box";
    Edts => b"edts", "Edit Box";
    Elst => b"elst", "Edit List Box";
    Mdia => b"mdia", "Media Box";
    Mdhd => b"mdhd", "Media Header Box";
    Hdlr => b"hdlr", "Handler Reference Box";
    Minf => b"minf", "Media Information Box";
    Vmhd => b"vmhd", "Video Media Header Box";
    Smhd => b"smhd", "Sound Media Header Box";
    Hmhd => b"hmhd", "Hint Media Header Box";
    Nmhd => b"nmhd", "Null Media Header Box";
    Dinf => b"dinf", "Data Information Box";
    Dref => b"dref", "Data Reference Box";
    Url => b"url ", "Data Entry URL Box";
    Urn => b"urn ", "Data Entry URN Box";
    Xml => b"xml ", "XML Box";

    // stbl
    Stbl => b"stbl", "Sample Table Box";
    Stsd => b"stsd", "Sample Description Box";
    Stts => b"stts", "Decoding Time to Sample Box";
    Ctts => b"ctts", "Composition Time to Sample Box";
    Stss => b"stss", "Sync Sample Box";
    Sdtp => b"sdtp", "Independent and Disposable Samples Box";
    Stsc => b"stsc", "Sample To Chunk Box";
    Stsz => b"stsz", "Sample Size Box";
    Stz2 => b"stz2", "Compact Sample Size Box";
    Stco => b"stco", "Chunk Offset Box";
    Co64 => b"co64", "Chunk Large Offset Box";
    Sgpd => b"sgpd", "Sample Group Description Box";
    Sbgp => b"sbgp", "Sample To Group Box";

    // fragments
    Mvex => b"mvex", "Movie Extends Box";
    Mehd => b"mehd", "Movie Extends Header Box";
    Trex => b"trex", "Track Extends Box";
    Moof => b"moof", "Movie Fragment Box";
    Mfhd => b"mfhd", "Movie Fragment Header Box";
    Traf => b"traf", "Track Fragment Box";
    Tfhd => b"tfhd", "Track Fragment Header Box";
    Tfdt => b"tfdt", "Track Fragment Decode Time Box";
    Trun => b"trun", "Track Run Box";

    // protection
    Sinf => b"sinf", "Protection Scheme Information Box";
    Frma => b"frma", "Original Format Box";
    Schm => b"schm", "Scheme Type Box";
    Schi => b"schi", "Scheme Information Box";
    Tenc => b"tenc", "Track Encryption Box";
    Senc => b"senc", "Sample Encryption Box";
    Saio => b"saio", "Sample Auxiliary Information Offsets Box";
    Saiz => b"saiz", "Sample Auxiliary Information Sizes Box";

    // visual sample entries
    Avc1 => b"avc1", "AVC Sample Entry";
    Avc3 => b"avc3", "AVC Sample Entry";
    Hev1 => b"hev1", "HEVC Sample Entry";
    Hvc1 => b"hvc1", "HEVC Sample Entry";
    Mp4v => b"mp4v", "MPEG-4 Visual Sample Entry";
    S263 => b"s263", "H.263 Sample Entry";
    Vp08 => b"vp08", "VP8 Sample Entry";
    Vp09 => b"vp09", "VP9 Sample Entry";
    Av01 => b"av01", "AV1 Sample Entry";
    Encv => b"encv", "Encrypted Video Sample Entry";

    // audio sample entries
    Mp4a => b"mp4a", "MPEG-4 Audio Sample Entry";
    Ac3 => b"ac-3", "AC-3 Sample Entry";
    Ec3 => b"ec-3", "E-AC-3 Sample Entry";
    Opus => b"Opus", "Opus Sample Entry";
    Samr => b"samr", "AMR Sample Entry";
    Sawb => b"sawb", "AMR-WB Sample Entry";
    Flac => b"fLaC", "FLAC Sample Entry";
    Enca => b"enca", "Encrypted Audio Sample Entry";

    // hint sample entries
    Rtp => b"rtp ", "RTP Hint Sample Entry";

    // codec configuration and misc
    Avcc => b"avcC", "AVC Configuration Box";
    Hvcc => b"hvcC", "HEVC Configuration Box";
    Esds => b"esds", "Elementary Stream Descriptor Box";
    Pasp => b"pasp", "Pixel Aspect Ratio Box";
    Btrt => b"btrt", "Bit Rate Box";
    Colr => b"colr", "Colour Information Box";
    Uuid => b"uuid", "User Extension Box";
}

impl KnownBox {
    /// Boxes whose whole content is child boxes.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            KnownBox::Moov
                | KnownBox::Trak
                | KnownBox::Tref
                | KnownBox::Edts
                | KnownBox::Mdia
                | KnownBox::Minf
                | KnownBox::Dinf
                | KnownBox::Stbl
                | KnownBox::Mvex
                | KnownBox::Moof
                | KnownBox::Traf
                | KnownBox::Mfra
                | KnownBox::Sinf
                | KnownBox::Schi
        )
    }

    /// Full boxes whose content after version/flags is an entry count and
    /// child boxes.
    pub fn is_counted_container(&self) -> bool {
        matches!(self, KnownBox::Stsd | KnownBox::Dref)
    }

    pub fn is_visual_sample_entry(&self) -> bool {
        matches!(
            self,
            KnownBox::Avc1
                | KnownBox::Avc3
                | KnownBox::Hev1
                | KnownBox::Hvc1
                | KnownBox::Mp4v
                | KnownBox::S263
                | KnownBox::Vp08
                | KnownBox::Vp09
                | KnownBox::Av01
                | KnownBox::Encv
        )
    }

    pub fn is_audio_sample_entry(&self) -> bool {
        matches!(
            self,
            KnownBox::Mp4a
                | KnownBox::Ac3
                | KnownBox::Ec3
                | KnownBox::Opus
                | KnownBox::Samr
                | KnownBox::Sawb
                | KnownBox::Flac
                | KnownBox::Enca
        )
    }

    /// Is this a FullBox (version + flags)?
    pub fn is_full_box(&self) -> bool {
        matches!(
            self,
            KnownBox::Meta
                | KnownBox::Pssh
                | KnownBox::Sidx
                | KnownBox::Mfro
                | KnownBox::Mvhd
                | KnownBox::Tkhd
                | KnownBox::Elst
                | KnownBox::Mdhd
                | KnownBox::Hdlr
                | KnownBox::Vmhd
                | KnownBox::Smhd
                | KnownBox::Hmhd
                | KnownBox::Nmhd
                | KnownBox::Dref
                | KnownBox::Url
                | KnownBox::Urn
                | KnownBox::Xml
                | KnownBox::Stsd
                | KnownBox::Stts
                | KnownBox::Ctts
                | KnownBox::Stss
                | KnownBox::Sdtp
                | KnownBox::Stsc
                | KnownBox::Stsz
                | KnownBox::Stz2
                | KnownBox::Stco
                | KnownBox::Co64
                | KnownBox::Sgpd
                | KnownBox::Sbgp
                | KnownBox::Mehd
                | KnownBox::Trex
                | KnownBox::Mfhd
                | KnownBox::Tfhd
                | KnownBox::Tfdt
                | KnownBox::Trun
                | KnownBox::Schm
                | KnownBox::Tenc
                | KnownBox::Senc
                | KnownBox::Saio
                | KnownBox::Saiz
                | KnownBox::Esds
        )
    }
}
