use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;
use zstmount_decode::{probe_uncompressed_size, read_range, BlockCache, Error, RangeReader};

fn write_zst(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let compressed = zstd::encode_all(content, 3).unwrap();
    fs::write(&path, compressed).unwrap();
    path
}

fn sample_content(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    // Low-entropy bytes so the frame spans several compressed blocks.
    (0..len).map(|_| b'a' + rng.gen_range(0..8u8)).collect()
}

#[test]
fn scenario_ten_bytes_with_four_byte_blocks() {
    let temp = TempDir::new().unwrap();
    let path = write_zst(temp.path(), "abc.zst", b"ABCDEFGHIJ");

    assert_eq!(probe_uncompressed_size(&path).unwrap(), 10);
    assert_eq!(read_range(&path, 4, 2, 5, 10).unwrap(), b"CDEFG");
}

#[test]
fn reads_ending_at_eof_copy_only_the_final_partial_block() {
    let temp = TempDir::new().unwrap();
    let path = write_zst(temp.path(), "abc.zst", b"ABCDEFGHIJ");
    let reader = RangeReader::new(&path, 4).unwrap();

    assert_eq!(reader.read_range(6, 4, 10).unwrap(), b"GHIJ");
    assert_eq!(reader.read_range(8, 2, 10).unwrap(), b"IJ");
    assert_eq!(reader.read_range(0, 10, 10).unwrap(), b"ABCDEFGHIJ");
    assert_eq!(reader.read_range(9, 1, 10).unwrap(), b"J");
}

#[test]
fn boundary_reads_are_empty() {
    let temp = TempDir::new().unwrap();
    let path = write_zst(temp.path(), "abc.zst", b"ABCDEFGHIJ");
    let reader = RangeReader::new(&path, 4).unwrap();

    assert!(reader.read_range(0, 0, 10).unwrap().is_empty());
    assert!(reader.read_range(10, 0, 10).unwrap().is_empty());
}

#[test]
fn empty_content_probes_to_zero() {
    let temp = TempDir::new().unwrap();
    let path = write_zst(temp.path(), "empty.zst", b"");

    assert_eq!(probe_uncompressed_size(&path).unwrap(), 0);
    assert!(read_range(&path, 4, 0, 0, 0).unwrap().is_empty());
}

#[test]
fn zero_byte_file_is_empty_source() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nothing.zst");
    fs::write(&path, b"").unwrap();

    let err = probe_uncompressed_size(&path).unwrap_err();
    assert!(matches!(err, Error::EmptySource));
}

#[test]
fn missing_file_is_source_open_error() {
    let temp = TempDir::new().unwrap();
    let err = probe_uncompressed_size(temp.path().join("missing.zst")).unwrap_err();
    assert!(matches!(err, Error::SourceOpen { .. }));
}

#[test]
fn truncated_source_fails_probe_and_reads() {
    let temp = TempDir::new().unwrap();
    let content = sample_content(512 * 1024, 7);
    let mut compressed = zstd::encode_all(&content[..], 3).unwrap();
    compressed.truncate(compressed.len() / 2);
    let path = temp.path().join("truncated.zst");
    fs::write(&path, &compressed).unwrap();

    let err = probe_uncompressed_size(&path).unwrap_err();
    assert!(matches!(err, Error::Decompression(_)), "got {:?}", err);

    // The size a caller believes in comes from the intact file.
    let reader = RangeReader::new(&path, 4096).unwrap();
    let size = content.len() as u64;
    let err = reader.read_range(size - 100, 100, size).unwrap_err();
    assert!(matches!(err, Error::Decompression(_)), "got {:?}", err);

    // Failed calls leave nothing behind; the reader keeps working on
    // ranges the intact prefix still covers.
    let head = reader.read_range(0, 1000, size).unwrap();
    assert_eq!(head, &content[..1000]);
}

#[test]
fn stream_shorter_than_claimed_size_is_short_source() {
    let temp = TempDir::new().unwrap();
    let path = write_zst(temp.path(), "abc.zst", b"ABCDEFGHIJ");
    let reader = RangeReader::new(&path, 4).unwrap();

    let err = reader.read_range(8, 6, 20).unwrap_err();
    assert!(matches!(
        err,
        Error::ShortSource {
            needed: 14,
            produced: 10
        }
    ));

    let err = reader.read_range(16, 2, 20).unwrap_err();
    assert!(matches!(err, Error::ShortSource { .. }));
}

#[test]
fn random_ranges_match_the_decompressed_content() {
    let temp = TempDir::new().unwrap();
    let content = sample_content(200_000, 42);
    let path = write_zst(temp.path(), "random.zst", &content);
    let size = probe_uncompressed_size(&path).unwrap();
    assert_eq!(size, content.len() as u64);

    let mut rng = StdRng::seed_from_u64(1234);
    for block_size in [1usize, 7, 4096, 131_072] {
        let reader = RangeReader::new(&path, block_size).unwrap();
        for _ in 0..8 {
            let offset = rng.gen_range(0..=content.len());
            let length = rng.gen_range(0..=(content.len() - offset).min(20_000));
            let bytes = reader.read_range(offset as u64, length, size).unwrap();
            assert_eq!(
                bytes,
                &content[offset..offset + length],
                "block_size={} offset={} length={}",
                block_size,
                offset,
                length
            );
        }
    }
}

#[test]
fn repeated_reads_are_identical() {
    let temp = TempDir::new().unwrap();
    let content = sample_content(50_000, 3);
    let path = write_zst(temp.path(), "repeat.zst", &content);
    let reader = RangeReader::new(&path, 1000).unwrap();

    let first = reader.read_range(12_345, 6_789, 50_000).unwrap();
    let second = reader.read_range(12_345, 6_789, 50_000).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, &content[12_345..12_345 + 6_789]);
}

#[test]
fn concurrent_overlapping_reads() {
    let temp = TempDir::new().unwrap();
    let content = Arc::new(sample_content(300_000, 99));
    let path = write_zst(temp.path(), "shared.zst", &content);
    let reader = Arc::new(RangeReader::new(&path, 8192).unwrap());
    let size = content.len() as u64;

    let handles: Vec<_> = (0..8u64)
        .map(|i| {
            let reader = Arc::clone(&reader);
            let content = Arc::clone(&content);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(i);
                for _ in 0..4 {
                    let offset = rng.gen_range(100_000..150_000usize);
                    let length = rng.gen_range(1..60_000usize);
                    let bytes = reader.read_range(offset as u64, length, size).unwrap();
                    assert_eq!(bytes, &content[offset..offset + length]);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("reader thread panicked");
    }
}

#[test]
fn cached_reads_match_and_skip_decoding() {
    let temp = TempDir::new().unwrap();
    let content = sample_content(40_000, 5);
    let path = write_zst(temp.path(), "cached.zst", &content);
    let cache = Arc::new(BlockCache::new(64));
    let reader = RangeReader::new(&path, 1024)
        .unwrap()
        .with_cache(Arc::clone(&cache));

    let cold = reader.read_range(5_000, 3_000, 40_000).unwrap();
    assert_eq!(cold, &content[5_000..8_000]);
    assert!(!cache.is_empty());

    // The window is fully cached now, so the source is never reopened.
    fs::remove_file(&path).unwrap();
    let warm = reader.read_range(5_000, 3_000, 40_000).unwrap();
    assert_eq!(warm, cold);
    assert!(cache.hits() > 0);
}

#[test]
fn cache_holds_the_final_partial_block() {
    let temp = TempDir::new().unwrap();
    let path = write_zst(temp.path(), "abc.zst", b"ABCDEFGHIJ");
    let cache = Arc::new(BlockCache::new(8));
    let reader = RangeReader::new(&path, 4).unwrap().with_cache(cache);

    assert_eq!(reader.read_range(7, 3, 10).unwrap(), b"HIJ");
    fs::remove_file(&path).unwrap();
    assert_eq!(reader.read_range(8, 2, 10).unwrap(), b"IJ");
}

#[test]
fn shared_cache_keeps_block_sizes_apart() {
    let temp = TempDir::new().unwrap();
    let path = write_zst(temp.path(), "abc.zst", b"ABCDEFGHIJ");
    let cache = Arc::new(BlockCache::new(16));
    let fours = RangeReader::new(&path, 4)
        .unwrap()
        .with_cache(Arc::clone(&cache));
    let twos = RangeReader::new(&path, 2)
        .unwrap()
        .with_cache(Arc::clone(&cache));

    assert_eq!(fours.read_range(0, 8, 10).unwrap(), b"ABCDEFGH");
    assert_eq!(twos.read_range(2, 2, 10).unwrap(), b"CD");
    assert_eq!(twos.read_range(4, 4, 10).unwrap(), b"EFGH");

    // Both readers are served from their own blocks once the file is gone.
    fs::remove_file(&path).unwrap();
    assert_eq!(fours.read_range(2, 4, 10).unwrap(), b"CDEF");
    assert_eq!(twos.read_range(2, 6, 10).unwrap(), b"CDEFGH");
}
