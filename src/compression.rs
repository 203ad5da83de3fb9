//! Payload compression for JWE (the `zip` header parameter).

use flate2::{
    read::{DeflateDecoder, GzDecoder, ZlibDecoder},
    write::{DeflateEncoder, GzEncoder, ZlibEncoder},
    Compression,
};

use std::{
    collections::BTreeMap,
    fmt,
    io::{Read, Write},
    sync::Arc,
};

use crate::KeyManagementError;

/// Compression method identified by the `zip` header parameter.
pub trait CompressionMethod: Send + Sync {
    /// Name of the method, e.g. `DEF`.
    fn name(&self) -> &str;

    /// Compresses `data`.
    fn compress(&self, data: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Decompresses `data`. Fails if the decompressed data exceeds `limit` bytes.
    fn decompress(&self, data: &[u8], limit: usize) -> anyhow::Result<Vec<u8>>;
}

fn read_limited(reader: impl Read, limit: usize) -> anyhow::Result<Vec<u8>> {
    let mut output = Vec::new();
    // Read one byte over the limit to detect overflows.
    let max_len = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    reader.take(max_len).read_to_end(&mut output)?;
    anyhow::ensure!(
        output.len() <= limit,
        "decompressed data exceeds {limit} bytes"
    );
    Ok(output)
}

/// Raw DEFLATE ([RFC 1951]) compression, `DEF`. This is the only method registered
/// in the IANA JOSE registry.
///
/// [RFC 1951]: https://www.rfc-editor.org/rfc/rfc1951.html
#[derive(Debug, Clone, Copy, Default)]
pub struct Deflate;

impl CompressionMethod for Deflate {
    fn name(&self) -> &str {
        "DEF"
    }

    fn compress(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, data: &[u8], limit: usize) -> anyhow::Result<Vec<u8>> {
        read_limited(DeflateDecoder::new(data), limit)
    }
}

/// Gzip compression, `GZ`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gzip;

impl CompressionMethod for Gzip {
    fn name(&self) -> &str {
        "GZ"
    }

    fn compress(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, data: &[u8], limit: usize) -> anyhow::Result<Vec<u8>> {
        read_limited(GzDecoder::new(data), limit)
    }
}

/// Zlib compression, `ZLIB`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zlib;

impl CompressionMethod for Zlib {
    fn name(&self) -> &str {
        "ZLIB"
    }

    fn compress(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, data: &[u8], limit: usize) -> anyhow::Result<Vec<u8>> {
        read_limited(ZlibDecoder::new(data), limit)
    }
}

/// Allow-list of compression methods keyed by name.
#[derive(Clone)]
pub struct CompressionManager {
    methods: BTreeMap<String, Arc<dyn CompressionMethod>>,
    decompression_limit: usize,
}

impl fmt::Debug for CompressionManager {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CompressionManager")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("decompression_limit", &self.decompression_limit)
            .finish()
    }
}

impl Default for CompressionManager {
    fn default() -> Self {
        Self {
            methods: BTreeMap::new(),
            decompression_limit: Self::DEFAULT_DECOMPRESSION_LIMIT,
        }
    }
}

impl CompressionManager {
    /// Default upper bound on the decompressed payload size: 16 MiB.
    pub const DEFAULT_DECOMPRESSION_LIMIT: usize = 16 << 20;

    /// Creates a manager without any methods.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager with built-in methods (`DEF`, `GZ` and `ZLIB`) with the specified names.
    ///
    /// # Errors
    ///
    /// Returns an error if a name does not correspond to a built-in method.
    pub fn from_names<I, S>(names: I) -> Result<Self, KeyManagementError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(Self::new(), |manager, name| {
            Ok(match name.as_ref() {
                "DEF" => manager.with(Deflate),
                "GZ" => manager.with(Gzip),
                "ZLIB" => manager.with(Zlib),
                other => return Err(KeyManagementError::UnsupportedCompression(other.to_owned())),
            })
        })
    }

    /// Adds a compression method.
    #[must_use]
    pub fn with(mut self, method: impl CompressionMethod + 'static) -> Self {
        self.methods
            .insert(method.name().to_owned(), Arc::new(method));
        self
    }

    /// Sets the upper bound on the decompressed payload size.
    #[must_use]
    pub fn with_decompression_limit(mut self, limit: usize) -> Self {
        self.decompression_limit = limit;
        self
    }

    /// Returns names of the registered methods.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.methods.keys().map(String::as_str)
    }

    /// Gets a method by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the method is not registered.
    pub fn get(&self, name: &str) -> Result<&dyn CompressionMethod, KeyManagementError> {
        self.methods
            .get(name)
            .map(|method| &**method)
            .ok_or_else(|| KeyManagementError::UnsupportedCompression(name.to_owned()))
    }

    pub(crate) fn decompress(
        &self,
        method: &dyn CompressionMethod,
        data: &[u8],
    ) -> anyhow::Result<Vec<u8>> {
        method.decompress(data, self.decompression_limit)
    }
}
