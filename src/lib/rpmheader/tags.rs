//! Well-known header tag names and numbers.
//!
//! Covers the standard RPM tags used in package queries and the APT-RPM extension
//! tags that package lists add to each header (`FILENAME`, `FILESIZE`, `MD5`,
//! `DIRECTORY`).

pub const HEADERIMMUTABLE: u32 = 63;
pub const HEADERI18NTABLE: u32 = 100;
pub const SHA1HEADER: u32 = 269;

pub const NAME: u32 = 1000;
pub const VERSION: u32 = 1001;
pub const RELEASE: u32 = 1002;
pub const EPOCH: u32 = 1003;
pub const SUMMARY: u32 = 1004;
pub const DESCRIPTION: u32 = 1005;
pub const BUILDTIME: u32 = 1006;
pub const BUILDHOST: u32 = 1007;
pub const SIZE: u32 = 1009;
pub const DISTRIBUTION: u32 = 1010;
pub const VENDOR: u32 = 1011;
pub const LICENSE: u32 = 1014;
pub const PACKAGER: u32 = 1015;
pub const GROUP: u32 = 1016;
pub const URL: u32 = 1020;
pub const OS: u32 = 1021;
pub const ARCH: u32 = 1022;
pub const FILESIZES: u32 = 1028;
pub const FILEMODES: u32 = 1030;
pub const FILEMD5S: u32 = 1035;
pub const FILEFLAGS: u32 = 1037;
pub const FILEUSERNAME: u32 = 1039;
pub const FILEGROUPNAME: u32 = 1040;
pub const SOURCERPM: u32 = 1044;
pub const ARCHIVESIZE: u32 = 1046;
pub const PROVIDENAME: u32 = 1047;
pub const REQUIREFLAGS: u32 = 1048;
pub const REQUIRENAME: u32 = 1049;
pub const REQUIREVERSION: u32 = 1050;
pub const CONFLICTFLAGS: u32 = 1053;
pub const CONFLICTNAME: u32 = 1054;
pub const CONFLICTVERSION: u32 = 1055;
pub const RPMVERSION: u32 = 1064;
pub const CHANGELOGTIME: u32 = 1080;
pub const CHANGELOGNAME: u32 = 1081;
pub const CHANGELOGTEXT: u32 = 1082;
pub const OBSOLETENAME: u32 = 1090;
pub const COOKIE: u32 = 1094;
pub const PROVIDEFLAGS: u32 = 1112;
pub const PROVIDEVERSION: u32 = 1113;
pub const OBSOLETEFLAGS: u32 = 1114;
pub const OBSOLETEVERSION: u32 = 1115;
pub const DIRINDEXES: u32 = 1116;
pub const BASENAMES: u32 = 1117;
pub const DIRNAMES: u32 = 1118;
pub const OPTFLAGS: u32 = 1122;
pub const PAYLOADFORMAT: u32 = 1124;
pub const PAYLOADCOMPRESSOR: u32 = 1125;
pub const PLATFORM: u32 = 1132;
pub const DISTTAG: u32 = 1155;

pub const FILENAME: u32 = 1_000_000;
pub const FILESIZE: u32 = 1_000_001;
pub const MD5: u32 = 1_000_005;
pub const DIRECTORY: u32 = 1_000_010;

/// Every known tag, by canonical name.
const TAG_TABLE: &[(&str, u32)] = &[
    ("HEADERIMMUTABLE", HEADERIMMUTABLE),
    ("HEADERI18NTABLE", HEADERI18NTABLE),
    ("SHA1HEADER", SHA1HEADER),
    ("NAME", NAME),
    ("VERSION", VERSION),
    ("RELEASE", RELEASE),
    ("EPOCH", EPOCH),
    ("SUMMARY", SUMMARY),
    ("DESCRIPTION", DESCRIPTION),
    ("BUILDTIME", BUILDTIME),
    ("BUILDHOST", BUILDHOST),
    ("SIZE", SIZE),
    ("DISTRIBUTION", DISTRIBUTION),
    ("VENDOR", VENDOR),
    ("LICENSE", LICENSE),
    ("PACKAGER", PACKAGER),
    ("GROUP", GROUP),
    ("URL", URL),
    ("OS", OS),
    ("ARCH", ARCH),
    ("FILESIZES", FILESIZES),
    ("FILEMODES", FILEMODES),
    ("FILEMD5S", FILEMD5S),
    ("FILEFLAGS", FILEFLAGS),
    ("FILEUSERNAME", FILEUSERNAME),
    ("FILEGROUPNAME", FILEGROUPNAME),
    ("SOURCERPM", SOURCERPM),
    ("ARCHIVESIZE", ARCHIVESIZE),
    ("PROVIDENAME", PROVIDENAME),
    ("REQUIREFLAGS", REQUIREFLAGS),
    ("REQUIRENAME", REQUIRENAME),
    ("REQUIREVERSION", REQUIREVERSION),
    ("CONFLICTFLAGS", CONFLICTFLAGS),
    ("CONFLICTNAME", CONFLICTNAME),
    ("CONFLICTVERSION", CONFLICTVERSION),
    ("RPMVERSION", RPMVERSION),
    ("CHANGELOGTIME", CHANGELOGTIME),
    ("CHANGELOGNAME", CHANGELOGNAME),
    ("CHANGELOGTEXT", CHANGELOGTEXT),
    ("OBSOLETENAME", OBSOLETENAME),
    ("COOKIE", COOKIE),
    ("PROVIDEFLAGS", PROVIDEFLAGS),
    ("PROVIDEVERSION", PROVIDEVERSION),
    ("OBSOLETEFLAGS", OBSOLETEFLAGS),
    ("OBSOLETEVERSION", OBSOLETEVERSION),
    ("DIRINDEXES", DIRINDEXES),
    ("BASENAMES", BASENAMES),
    ("DIRNAMES", DIRNAMES),
    ("OPTFLAGS", OPTFLAGS),
    ("PAYLOADFORMAT", PAYLOADFORMAT),
    ("PAYLOADCOMPRESSOR", PAYLOADCOMPRESSOR),
    ("PLATFORM", PLATFORM),
    ("DISTTAG", DISTTAG),
    ("FILENAME", FILENAME),
    ("FILESIZE", FILESIZE),
    ("MD5", MD5),
    ("DIRECTORY", DIRECTORY),
];

/// Alternative spellings accepted on lookup.
const TAG_ALIASES: &[(&str, u32)] = &[("SERIAL", EPOCH), ("COPYRIGHT", LICENSE)];

/// Resolve a tag by name.
///
/// Lookup ignores case and an optional `RPMTAG_` prefix. A decimal number is
/// accepted as a raw tag.
#[must_use]
pub fn tag_by_name(name: &str) -> Option<u32> {
    let bare = strip_prefix_ignore_case(name, "RPMTAG_").unwrap_or(name);
    if !bare.is_empty() && bare.bytes().all(|b| b.is_ascii_digit()) {
        return bare.parse().ok();
    }
    TAG_TABLE
        .iter()
        .chain(TAG_ALIASES)
        .find(|(known, _)| known.eq_ignore_ascii_case(bare))
        .map(|&(_, tag)| tag)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// Canonical name of a tag, if it is known.
#[must_use]
pub fn tag_name(tag: u32) -> Option<&'static str> {
    TAG_TABLE.iter().find(|&&(_, known)| known == tag).map(|&(name, _)| name)
}

/// All known tags with their canonical names, in table order.
pub fn known_tags() -> impl Iterator<Item = (&'static str, u32)> {
    TAG_TABLE.iter().copied()
}
