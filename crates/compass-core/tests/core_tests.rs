use std::fs;
use std::io::Write;
use tempfile::TempDir;

use compass_core::corpus::{load_documents, CorpusProcessor};
use compass_core::{ChunkingConfig, Error};

fn write_jsonl(dir: &std::path::Path, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.join("docs.jsonl");
    let mut f = fs::File::create(&path).unwrap();
    for line in lines { writeln!(f, "{line}").unwrap(); }
    path
}

#[test]
fn process_file_single_small_document() {
    let tmp = TempDir::new().unwrap();
    let path = write_jsonl(tmp.path(), &[
        r#"{"text":"Short text","breadcrumb":"Modules > Welcome","source_file":"Welcome.md","file_type":".md"}"#,
    ]);

    let processor = CorpusProcessor::new(ChunkingConfig::default()).unwrap();
    let chunks = processor.process_file(&path).expect("process");

    assert_eq!(chunks.len(), 1, "one short document becomes one chunk");
    assert_eq!(chunks[0].text, "Short text");
    assert_eq!(chunks[0].breadcrumb, "Modules > Welcome");
    assert_eq!((chunks[0].start_char, chunks[0].end_char), (0, 10));
}

#[test]
fn chunk_ids_restart_per_document() {
    let tmp = TempDir::new().unwrap();
    let long = "word ".repeat(60);
    let first = format!(r#"{{"text":"{long}","breadcrumb":"Week_01 > Notes","source_file":"Week_01/Notes.txt","file_type":".txt"}}"#);
    let second = format!(r#"{{"text":"{long}","breadcrumb":"Week_02 > Notes","source_file":"Week_02/Notes.txt","file_type":".txt"}}"#);
    let path = write_jsonl(tmp.path(), &[&first, "", &second]);

    let processor = CorpusProcessor::new(ChunkingConfig::new(100, 20).unwrap()).unwrap();
    let chunks = processor.process_file(&path).expect("process");

    let week2: Vec<_> = chunks.iter().filter(|c| c.source_file.starts_with("Week_02")).collect();
    assert!(week2.len() > 1);
    assert_eq!(week2[0].chunk_id, 0, "numbering restarts for each document");
    assert!(week2.windows(2).all(|w| w[0].start_char <= w[1].start_char));
}

#[test]
fn missing_file_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = load_documents(&tmp.path().join("absent.jsonl")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "{err}");
}

#[test]
fn bad_line_is_reported_with_its_number() {
    let tmp = TempDir::new().unwrap();
    let path = write_jsonl(tmp.path(), &[
        r#"{"text":"ok","breadcrumb":"b","source_file":"s","file_type":".md"}"#,
        r#"{"text": 42}"#,
    ]);
    match load_documents(&path) {
        Err(Error::Malformed(msg)) => assert!(msg.contains("line 2"), "{msg}"),
        other => panic!("expected malformed error, got {other:?}"),
    }
}
