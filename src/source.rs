use crate::codec::Transcoder;
use crate::{SeedError, SeedResult};
use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncSeekExt, BufReader};
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;

pub const GZIP_CONTENT_TYPE: &str = "application/x-gzip";
pub const ZSTD_CONTENT_TYPE: &str = "application/zstd";
pub const PLAIN_CONTENT_TYPE: &str = "text/plain";

/// Decoding-agnostic UTF-8 byte stream handed to the CSV reader.
pub type SourceReader = Box<dyn AsyncRead + Unpin + Send>;

#[derive(Debug, Clone)]
pub struct SourceMeta {
    /// Sniffed from the leading bytes, e.g. "application/x-gzip" or "text/plain"
    pub content_type: String,
    /// Character encoding of the file, transcoded to UTF-8 when it differs
    pub charset: &'static encoding_rs::Encoding,
    pub path: PathBuf,
}

/// MIME type of a file judged by its magic bytes.
pub fn detect_content_type(head: &[u8]) -> &'static str {
    if head.starts_with(&[0x1f, 0x8b]) {
        GZIP_CONTENT_TYPE
    } else if head.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
        ZSTD_CONTENT_TYPE
    } else {
        PLAIN_CONTENT_TYPE
    }
}

/// From a generic AsyncRead, wrap with the decompressor picked by
/// `meta.content_type` and transcode to UTF-8 when needed.
pub fn build_csv_reader<R>(raw: R, meta: &SourceMeta) -> SourceReader
where
    R: AsyncRead + Unpin + Send + 'static,
{
    // Use a larger buffer for fewer syscalls (1 MiB)
    let buf = BufReader::with_capacity(1 << 20, raw);
    let decompressed: SourceReader = match meta.content_type.as_str() {
        GZIP_CONTENT_TYPE => {
            let mut decoder = GzipDecoder::new(buf);
            // concatenated members, as produced by `cat a.gz b.gz`
            decoder.multiple_members(true);
            Box::new(decoder)
        }
        ZSTD_CONTENT_TYPE => Box::new(ZstdDecoder::new(buf)),
        _ => Box::new(buf),
    };

    if meta.charset == encoding_rs::UTF_8 {
        return decompressed;
    }
    let framed = FramedRead::new(decompressed, Transcoder::new(meta.charset));
    Box::new(StreamReader::new(framed))
}

/// Open a local file for seeding, rewound to byte 0 after content sniffing.
///
/// Missing, unreadable and non-regular paths all come back as
/// [`SeedError::SourceUnavailable`].
pub async fn open_source(
    path: &Path,
    charset: &'static encoding_rs::Encoding,
) -> SeedResult<(SourceReader, SourceMeta)> {
    let unavailable = |source: io::Error| SeedError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    };

    let metadata = tokio::fs::metadata(path).await.map_err(unavailable)?;
    if !metadata.is_file() {
        return Err(unavailable(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }

    let mut file = File::open(path).await.map_err(unavailable)?;
    let mut head = [0u8; 4];
    let filled = read_head(&mut file, &mut head).await.map_err(unavailable)?;
    file.seek(SeekFrom::Start(0)).await.map_err(unavailable)?;

    let meta = SourceMeta {
        content_type: detect_content_type(&head[..filled]).to_string(),
        charset,
        path: path.to_path_buf(),
    };
    let reader = build_csv_reader(file, &meta);
    Ok((reader, meta))
}

/// Discard up to `lines` physical lines, empty ones included. Returns how many
/// were actually skipped before EOF.
pub async fn skip_lines<R>(reader: &mut R, lines: usize) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut discard = Vec::new();
    let mut skipped = 0;
    while skipped < lines {
        discard.clear();
        if reader.read_until(b'\n', &mut discard).await? == 0 {
            break;
        }
        skipped += 1;
    }
    Ok(skipped)
}

async fn read_head(file: &mut File, head: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < head.len() {
        let n = file.read(&mut head[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::write::GzipEncoder;
    use tokio::io::AsyncWriteExt;

    async fn read_all(mut reader: SourceReader) -> String {
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        out
    }

    #[test]
    fn sniffs_magic_bytes() {
        assert_eq!(detect_content_type(&[0x1f, 0x8b, 0x08, 0x00]), GZIP_CONTENT_TYPE);
        assert_eq!(detect_content_type(&[0x28, 0xb5, 0x2f, 0xfd]), ZSTD_CONTENT_TYPE);
        assert_eq!(detect_content_type(b"id;n"), PLAIN_CONTENT_TYPE);
        assert_eq!(detect_content_type(&[]), PLAIN_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn gzip_is_detected_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.csv");

        let mut encoder = GzipEncoder::new(Vec::new());
        encoder.write_all(b"id;name\n1;Alice\n").await.unwrap();
        encoder.shutdown().await.unwrap();
        std::fs::write(&path, encoder.into_inner()).unwrap();

        let (reader, meta) = open_source(&path, encoding_rs::UTF_8).await.unwrap();
        assert_eq!(meta.content_type, GZIP_CONTENT_TYPE);
        assert_eq!(read_all(reader).await, "id;name\n1;Alice\n");
    }

    #[tokio::test]
    async fn plain_file_with_gz_extension_stays_plain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.csv.gz");
        std::fs::write(&path, "id;name\n").unwrap();

        let (reader, meta) = open_source(&path, encoding_rs::UTF_8).await.unwrap();
        assert_eq!(meta.content_type, PLAIN_CONTENT_TYPE);
        assert_eq!(read_all(reader).await, "id;name\n");
    }

    #[tokio::test]
    async fn legacy_charset_is_transcoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.csv");
        std::fs::write(&path, b"name\nJos\xe9\n").unwrap();

        let (reader, _meta) = open_source(&path, encoding_rs::WINDOWS_1252).await.unwrap();
        assert_eq!(read_all(reader).await, "name\nJosé\n");
    }

    #[tokio::test]
    async fn skip_lines_counts_blank_lines() {
        let mut reader = BufReader::new(&b"Exported users\n\r\n\nid;name\n"[..]);
        assert_eq!(skip_lines(&mut reader, 3).await.unwrap(), 3);

        let mut rest = String::new();
        reader.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "id;name\n");

        let mut short = BufReader::new(&b"only\n"[..]);
        assert_eq!(skip_lines(&mut short, 5).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_and_directory_paths_are_unavailable() {
        let dir = tempfile::tempdir().unwrap();

        let missing = open_source(&dir.path().join("nope.csv"), encoding_rs::UTF_8).await;
        assert!(matches!(missing, Err(SeedError::SourceUnavailable { .. })));

        let directory = open_source(dir.path(), encoding_rs::UTF_8).await;
        assert!(matches!(directory, Err(SeedError::SourceUnavailable { .. })));
    }
}
