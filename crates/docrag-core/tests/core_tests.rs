use std::fs;
use std::io::Write;
use tempfile::TempDir;

use docrag_core::documents::load_documents;
use docrag_core::error::Error;

#[test]
fn load_documents_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let docs = load_documents(dir).expect("load");

    assert_eq!(docs.len(), 1, "one readable file becomes one document");
    assert_eq!(docs[0].source, "a.txt");
    assert_eq!(docs[0].text, "Short text");
}

#[test]
fn load_documents_sorted_by_file_name() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("b.md"), "charlie delta").unwrap();
    fs::write(dir.join("a.txt"), "alpha bravo").unwrap();
    fs::write(dir.join("C.TXT"), "echo").unwrap();

    let docs = load_documents(dir).expect("load");
    let names: Vec<&str> = docs.iter().map(|d| d.source.as_str()).collect();
    assert_eq!(names, vec!["C.TXT", "a.txt", "b.md"]);
}

#[test]
fn load_documents_skips_unsupported_empty_and_nested() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("keep.txt"), "kept").unwrap();
    fs::write(dir.join("blank.txt"), "  \n\t ").unwrap();
    fs::write(dir.join("slides.pdf"), b"%PDF-1.4").unwrap();
    fs::create_dir(dir.join("nested")).unwrap();
    fs::write(dir.join("nested").join("inner.txt"), "not read").unwrap();

    let docs = load_documents(dir).expect("load");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].source, "keep.txt");
}

#[test]
fn load_documents_decodes_invalid_utf8_lossily() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("latin1.txt"), b"caf\xe9 au lait").unwrap();

    let docs = load_documents(tmp.path()).expect("load");
    assert_eq!(docs.len(), 1);
    assert!(docs[0].text.starts_with("caf"));
    assert!(docs[0].text.ends_with("au lait"));
}

#[test]
fn load_documents_creates_missing_directory() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("docs");

    let docs = load_documents(&dir).expect("load");
    assert!(docs.is_empty());
    assert!(dir.is_dir());
}

#[test]
fn load_documents_rejects_file_path() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("docs");
    fs::write(&file, "not a dir").unwrap();

    let err = load_documents(&file).unwrap_err();
    assert!(matches!(err, Error::NotADirectory(_)));
}
