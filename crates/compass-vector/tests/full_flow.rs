use compass_core::traits::{DenseIndex, Embedder};
use compass_core::types::{Chunk, IndexedChunk};
use compass_embed::FakeEmbedder;
use compass_vector::LanceDenseIndex;
use tempfile::TempDir;

const DIM: usize = 64;
const TABLE: &str = "course_chunks";

fn corpus(embedder: &FakeEmbedder) -> Vec<IndexedChunk> {
    let rows = [
        ("Required textbook: Fundamentals of Networking", "Syllabus > Materials", "Week_01/Syllabus.pdf"),
        ("Grading: homework 40%, exams 60%", "Syllabus > Grading", "Week_01/Syllabus.pdf"),
        ("Lab 3 covers subnetting and routing tables", "Week_03 > Lab 3", "Week_03/Lab3.md"),
    ];
    rows.iter()
        .enumerate()
        .map(|(i, (text, breadcrumb, source))| {
            let chunk = Chunk {
                text: text.to_string(),
                breadcrumb: breadcrumb.to_string(),
                source_file: source.to_string(),
                chunk_id: i,
                start_char: i * 10,
                end_char: i * 10 + text.chars().count(),
            };
            let v = embedder.embed_one(text).expect("embed");
            IndexedChunk::new(chunk, v, vec![])
        })
        .collect()
}

#[test]
fn lancedb_full_flow() {
    let tmp = TempDir::new().expect("tmp");
    let dir = tmp.path().join("lancedb");
    let embedder = FakeEmbedder::new(DIM);
    let chunks = corpus(&embedder);

    let index = LanceDenseIndex::create(&dir, TABLE, &embedder.id()).expect("create");
    assert!(!index.is_ready());
    index.index(&chunks).expect("index");
    assert!(index.is_ready());
    assert_eq!(index.count().expect("count"), 3);

    let manifest = index.manifest().expect("manifest");
    assert_eq!(manifest.dim, DIM);
    assert_eq!(manifest.chunk_count, 3);
    assert_eq!(manifest.embedder_id, embedder.id());

    let q = embedder.embed_one("Required textbook: Fundamentals of Networking").expect("embed");
    let hits = index.search_vec(&q, 2).expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(*hits[0].chunk, *chunks[0].chunk);
    assert!(hits[0].distance < 1e-3, "identical text is at distance ~0, got {}", hits[0].distance);
    assert!(hits[0].distance <= hits[1].distance);

    let reopened = LanceDenseIndex::open(&dir, TABLE).expect("open");
    assert!(reopened.is_ready());
    assert_eq!(reopened.manifest(), Some(manifest));
    let mut loaded = reopened.load_all().expect("load");
    loaded.sort_by_key(|(c, _)| c.chunk_id);
    assert_eq!(loaded.len(), 3);
    for ((chunk, v), original) in loaded.iter().zip(&chunks) {
        assert_eq!(chunk, original.chunk.as_ref());
        assert_eq!(v.len(), DIM);
    }
}

#[test]
fn query_of_wrong_dimension_is_rejected() {
    let tmp = TempDir::new().expect("tmp");
    let embedder = FakeEmbedder::new(DIM);
    let index = LanceDenseIndex::create(tmp.path(), TABLE, &embedder.id()).expect("create");
    index.index(&corpus(&embedder)).expect("index");
    assert!(index.search_vec(&[1.0, 0.0], 1).is_err());
}

#[test]
fn missing_or_empty_store_is_not_ready() {
    let tmp = TempDir::new().expect("tmp");
    let absent = tmp.path().join("nope");
    assert!(LanceDenseIndex::open(&absent, TABLE).err().is_some_and(|e| e.is_not_ready()));

    let dir = tmp.path().join("empty");
    let index = LanceDenseIndex::create(&dir, TABLE, "fake").expect("create");
    index.index(&[]).expect("index nothing");
    assert!(index.is_ready());
    assert!(index.search_vec(&[1.0; DIM], 3).expect("search").is_empty());
    assert!(LanceDenseIndex::open(&dir, TABLE).err().is_some_and(|e| e.is_not_ready()));
}

#[test]
fn rebuild_replaces_previous_rows() {
    let tmp = TempDir::new().expect("tmp");
    let embedder = FakeEmbedder::new(DIM);
    let chunks = corpus(&embedder);
    let index = LanceDenseIndex::create(tmp.path(), TABLE, &embedder.id()).expect("create");
    index.index(&chunks).expect("first build");
    index.index(&chunks[..1]).expect("second build");
    assert_eq!(index.count().expect("count"), 1);
    assert_eq!(LanceDenseIndex::open(tmp.path(), TABLE).expect("open").load_all().expect("load").len(), 1);
}

#[test]
fn opened_store_serves_repeated_and_concurrent_searches() {
    let tmp = TempDir::new().expect("tmp");
    let embedder = FakeEmbedder::new(DIM);
    let chunks = corpus(&embedder);
    LanceDenseIndex::create(tmp.path(), TABLE, &embedder.id()).expect("create").index(&chunks).expect("index");

    let index = LanceDenseIndex::open(tmp.path(), TABLE).expect("open");
    let q = embedder.embed_one("subnetting and routing").expect("embed");
    let first = index.search_vec(&q, 3).expect("search");
    assert_eq!(first.len(), 3);

    std::thread::scope(|s| {
        let workers: Vec<_> = (0..4).map(|_| s.spawn(|| index.search_vec(&q, 3).expect("search"))).collect();
        for w in workers {
            let hits = w.join().expect("worker");
            let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
            let expected: Vec<&str> = first.iter().map(|h| h.chunk.text.as_str()).collect();
            assert_eq!(texts, expected);
        }
    });
    assert_eq!(index.count().expect("count"), 3);
}

#[tokio::test]
async fn store_can_be_dropped_inside_async_code() {
    let tmp = TempDir::new().expect("tmp");
    let index = LanceDenseIndex::create(tmp.path(), TABLE, "fake").expect("create");
    assert!(!index.is_ready());
    drop(index);
}

#[test]
fn unbuilt_store_refuses_searches() {
    let tmp = TempDir::new().expect("tmp");
    let index = LanceDenseIndex::create(tmp.path(), TABLE, "fake").expect("create");
    assert!(index.search_vec(&[1.0; DIM], 1).is_err());
    assert!(index.count().is_err());
}
