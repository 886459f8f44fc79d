use std::fs;
use std::path::{Path, PathBuf};

use xmpasm::*;

fn get_test_input_file_name(relative_to_manifest: &str) -> PathBuf {
    let mut location = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    location.push(relative_to_manifest);
    if location.exists() {
        location
    } else {
        panic!(
            "Cannot find input {relative_to_manifest}: {} does not exist",
            location.display()
        );
    }
}

fn read_object_file(path: &Path) -> Vec<ObjectModule> {
    let bytes = fs::read(path).expect("should be able to read the object file");
    read_object_stream(&bytes).expect("object file should be readable")
}

fn options_writing_to(dir: &Path) -> Options {
    Options {
        object: Destination::File(dir.join("out.o")),
        listing: Destination::File(dir.join("out.lst")),
        ..Options::default()
    }
}

#[test]
fn assemble_and_reread_object_file() {
    let input = get_test_input_file_name("testdata/sum.s");
    let dir = tempfile::tempdir().expect("should be able to create a temporary directory");
    let options = options_writing_to(dir.path());
    let assembly =
        assemble_files(&[input], &options).expect("assembler should read and write its files");
    assert!(!assembly.failed(true), "{:?}", assembly.reports);

    let modules = read_object_file(&dir.path().join("out.o"));
    assert_eq!(modules, assembly.objects);
    let [module] = modules.as_slice() else {
        panic!("expected one module, got {}", modules.len());
    };
    assert_eq!(module.name, "SUM");
    assert_eq!(module.externals, ["PRINT"]);
    assert_eq!(module.entries.len(), 1);
    assert_eq!(module.entries[0].name, "SUM");
    assert_eq!(module.entries[0].value, 0);

    let code = &module.blocks[0];
    assert_eq!(code.size, 5);
    let words = &code.image.as_ref().expect("code block has an image").words;
    assert_eq!(&words[2..], [1, 2, 3]);
    assert_eq!(code.externals.len(), 1);

    let literals = &module.blocks[1];
    assert_eq!(
        literals.image.as_ref().map(|image| image.words.clone()),
        Some(vec![0xFF])
    );

    let listing = fs::read_to_string(dir.path().join("out.lst"))
        .expect("should be able to read the listing");
    assert!(listing.contains("TABLE    CON      1,2,3"));
}

#[test]
fn external_text_is_found_on_search_path() {
    let input = get_test_input_file_name("testdata/twice.s");
    let dir = tempfile::tempdir().expect("should be able to create a temporary directory");
    let options = Options {
        external_text: Some(PathBuf::from("defs.s")),
        search_path: vec![get_test_input_file_name("testdata")],
        ..options_writing_to(dir.path())
    };
    let assembly =
        assemble_files(&[input], &options).expect("assembler should read and write its files");
    assert_eq!(assembly.tally.errors, 0, "{:?}", assembly.reports);

    let modules = read_object_file(&dir.path().join("out.o"));
    let module = modules
        .iter()
        .find(|m| m.name == "USE")
        .expect("module USE should be in the object file");
    assert_eq!(
        module.blocks[0].image.as_ref().map(|image| image.words.clone()),
        Some(vec![5, 5])
    );
}

#[test]
fn missing_external_text_is_a_failure() {
    let input = get_test_input_file_name("testdata/twice.s");
    let dir = tempfile::tempdir().expect("should be able to create a temporary directory");
    let options = Options {
        external_text: Some(PathBuf::from("nonexistent.s")),
        search_path: vec![dir.path().to_path_buf()],
        ..options_writing_to(dir.path())
    };
    assert!(matches!(
        assemble_files(&[input], &options),
        Err(AssemblerFailure::ExternalTextNotFound { .. })
    ));
}

#[test]
fn no_object_file_when_there_are_errors() {
    let dir = tempfile::tempdir().expect("should be able to create a temporary directory");
    let input = dir.path().join("bad.s");
    fs::write(&input, "         IDENT    BAD\n         A1       NOWHERE\n         END\n")
        .expect("should be able to write the source file");
    let options = options_writing_to(dir.path());
    let assembly =
        assemble_files(&[input], &options).expect("assembler should read and write its files");
    assert!(assembly.failed(false));
    assert!(!dir.path().join("out.o").exists());
    let listing = fs::read_to_string(dir.path().join("out.lst"))
        .expect("the listing is written even when there are errors");
    assert!(listing.contains("A1       NOWHERE"));
}

#[test]
fn unreadable_source_is_a_failure() {
    let dir = tempfile::tempdir().expect("should be able to create a temporary directory");
    let options = options_writing_to(dir.path());
    assert!(matches!(
        assemble_files(&[dir.path().join("absent.s")], &options),
        Err(AssemblerFailure::Io(_))
    ));
}
