mod common;

use std::collections::HashMap;
use std::thread;

use common::init_tracing;
use memoryfs::{BLOCK_SIZE, MemoryContents, SeekableChannel};

const WRITERS: usize = 8;
const APPENDS_PER_WRITER: usize = 40;

/// Payload length per writer; picked so appends straddle block boundaries.
fn payload_len(writer: usize) -> usize {
    97 + writer * 311
}

/// Split the content into runs of equal bytes and check every run is made
/// of whole payloads of the writer its byte names.
fn assert_whole_payloads(content: &[u8]) {
    let mut counts: HashMap<u8, usize> = HashMap::new();
    let mut start = 0;
    while start < content.len() {
        let tag = content[start];
        let run = content[start..].iter().take_while(|&&b| b == tag).count();
        let len = payload_len(tag as usize - 1);
        assert_eq!(run % len, 0, "torn payload of writer {tag} at offset {start}");
        *counts.entry(tag).or_default() += run / len;
        start += run;
    }
    for writer in 0..WRITERS {
        assert_eq!(counts.get(&(writer as u8 + 1)), Some(&APPENDS_PER_WRITER));
    }
}

fn expected_len() -> u64 {
    (0..WRITERS)
        .map(|w| (payload_len(w) * APPENDS_PER_WRITER) as u64)
        .sum()
}

#[test]
fn test_concurrent_write_at_end() {
    init_tracing();
    let contents = MemoryContents::new();
    thread::scope(|s| {
        for writer in 0..WRITERS {
            let contents = &contents;
            s.spawn(move || {
                let payload = vec![writer as u8 + 1; payload_len(writer)];
                for _ in 0..APPENDS_PER_WRITER {
                    assert_eq!(contents.write_at_end(&payload).unwrap(), payload.len());
                }
            });
        }
    });

    assert_eq!(contents.size(), expected_len());
    assert_whole_payloads(&contents.to_vec());
}

#[test]
fn test_concurrent_append_channels() {
    init_tracing();
    let contents = MemoryContents::new();
    thread::scope(|s| {
        for writer in 0..WRITERS {
            let contents = &contents;
            s.spawn(move || {
                let mut channel = contents.new_append_channel(true);
                let payload = vec![writer as u8 + 1; payload_len(writer)];
                for i in 0..APPENDS_PER_WRITER {
                    // seeking must not influence where the bytes land
                    channel.set_position((i * 7) as u64).unwrap();
                    channel.write_from(&payload).unwrap();
                    assert!(channel.position().unwrap() >= payload.len() as u64);
                }
                channel.close();
            });
        }
    });

    assert_eq!(contents.size(), expected_len());
    assert_whole_payloads(&contents.to_vec());
}

#[test]
fn test_readers_never_see_torn_writes() {
    init_tracing();
    let len = 3 * BLOCK_SIZE + 5;
    let contents = MemoryContents::new();
    contents.write_at(&vec![0u8; len], 0).unwrap();

    thread::scope(|s| {
        let contents = &contents;
        s.spawn(move || {
            for round in 1..=50u8 {
                contents.write_at(&vec![round; len], 0).unwrap();
            }
        });
        for _ in 0..4 {
            s.spawn(move || {
                let mut buf = vec![0u8; len];
                for _ in 0..200 {
                    assert_eq!(contents.read_at(&mut buf, 0), Some(len));
                    let first = buf[0];
                    assert!(buf.iter().all(|&b| b == first), "observed a partial write");
                }
            });
        }
    });

    assert!(contents.to_vec().iter().all(|&b| b == 50));
}

#[test]
fn test_growing_writers_do_not_race_on_allocation() {
    init_tracing();
    let contents = MemoryContents::new();
    thread::scope(|s| {
        for writer in 0..WRITERS {
            let contents = &contents;
            s.spawn(move || {
                let offset = (writer * 4 * BLOCK_SIZE) as u64;
                let data = vec![writer as u8 + 1; 4 * BLOCK_SIZE];
                contents.write_at(&data, offset).unwrap();
            });
        }
    });

    assert_eq!(contents.size(), (WRITERS * 4 * BLOCK_SIZE) as u64);
    assert_eq!(contents.allocated_blocks(), WRITERS * 4);
    let content = contents.to_vec();
    for (writer, region) in content.chunks(4 * BLOCK_SIZE).enumerate() {
        assert!(region.iter().all(|&b| b == writer as u8 + 1));
    }
}
