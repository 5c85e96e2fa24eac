//! Builders for package list fixtures.
//!
//! Packages are described by [`TestPackage`] and serialized into the framing a
//! package list uses, optionally gzip-compressed.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use rand::Rng;
use rand::rngs::StdRng;

use pkgq_lib::rpmheader::{HeaderBuilder, tags};

/// Offset of the first index entry's type field within a framed record.
const FIRST_TYPE_OFFSET: usize = 8 + 8 + 4;

/// A package with the handful of tags the tests query.
#[derive(Debug, Clone)]
pub struct TestPackage {
    pub name: String,
    pub version: String,
    pub release: String,
    pub size: u32,
    pub requires: Vec<String>,
}

impl TestPackage {
    pub fn new(name: &str, version: &str, release: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            release: release.to_string(),
            size: 1024,
            requires: Vec::new(),
        }
    }

    #[must_use]
    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn requires(mut self, names: &[&str]) -> Self {
        self.requires = names.iter().map(ToString::to_string).collect();
        self
    }

    /// `NAME-VERSION-RELEASE`.
    pub fn nvr(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.release)
    }

    pub fn builder(&self) -> HeaderBuilder {
        let mut builder = HeaderBuilder::new()
            .string(tags::NAME, &self.name)
            .string(tags::VERSION, &self.version)
            .string(tags::RELEASE, &self.release)
            .i18n_string(tags::SUMMARY, &[&format!("The {} package", self.name)])
            .int32(tags::SIZE, &[self.size]);
        if !self.requires.is_empty() {
            let names: Vec<&str> = self.requires.iter().map(String::as_str).collect();
            builder = builder.string_array(tags::REQUIRENAME, &names);
        }
        builder
    }

    /// The bare header blob.
    pub fn blob(&self) -> Vec<u8> {
        self.builder().build()
    }

    /// The header framed as a package list record.
    pub fn record(&self) -> Vec<u8> {
        self.builder().build_record()
    }
}

/// `count` packages named `pkg00000`, `pkg00001`, ...
pub fn numbered_packages(count: usize) -> Vec<TestPackage> {
    (0..count).map(|i| TestPackage::new(&format!("pkg{i:05}"), "1.0", &format!("alt{i}"))).collect()
}

/// Packages with random names and a random number of requirements, so records
/// vary widely in size.
pub fn random_packages(rng: &mut StdRng, count: usize) -> Vec<TestPackage> {
    (0..count)
        .map(|i| {
            let name_len = rng.random_range(1..40);
            let name: String =
                (0..name_len).map(|_| char::from(rng.random_range(b'a'..=b'z'))).collect();
            let requires: Vec<String> =
                (0..rng.random_range(0..60)).map(|r| format!("lib{name}-{r}")).collect();
            let requires: Vec<&str> = requires.iter().map(String::as_str).collect();
            TestPackage::new(&format!("{name}{i}"), "2.4", "alt1")
                .size(rng.random())
                .requires(&requires)
        })
        .collect()
}

/// Serialize packages as a package list.
pub fn pkglist_bytes(packages: &[TestPackage]) -> Vec<u8> {
    packages.iter().flat_map(TestPackage::record).collect()
}

/// A framed record whose header passes framing checks but fails to decode.
pub fn undecodable_record(package: &TestPackage) -> Vec<u8> {
    let mut record = package.record();
    record[FIRST_TYPE_OFFSET..FIRST_TYPE_OFFSET + 4].copy_from_slice(&99u32.to_be_bytes());
    record
}

pub fn write_pkglist(path: &Path, bytes: &[u8]) {
    let mut file = File::create(path).expect("Failed to create package list");
    file.write_all(bytes).expect("Failed to write package list");
}

pub fn write_gzipped_pkglist(path: &Path, bytes: &[u8]) {
    let file = File::create(path).expect("Failed to create package list");
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(bytes).expect("Failed to write package list");
    encoder.finish().expect("Failed to finish gzip stream");
}
