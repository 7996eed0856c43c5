//! End-to-end tests of the requirement document format.

use cairn::requirement::{Payload, Requirement, RequirementDocument};
use cairn::version::Version;

const SAMPLE: &str = "\
# Build environment for the imaging service.
Version: 2.1.0

CFLAGS=-O2
PREFIX=/opt/imaging

rpm:zlib
libjpeg https://example.org/pkgs/libjpeg-9e.tar.gz
imaging git+https://example.org/imaging.git>=2.0,<3.0  CFLAGS=-O3 \\
    EXTRA=-fPIC
";

#[test]
fn sample_round_trips_byte_for_byte() {
    let doc = RequirementDocument::parse(SAMPLE).unwrap();
    assert_eq!(doc.serialize(false), SAMPLE);
}

#[test]
fn sample_structure() {
    let doc = RequirementDocument::parse(SAMPLE).unwrap();

    assert_eq!(doc.header("version").unwrap().value, "2.1.0");

    let reqs: Vec<&Requirement> = doc.requirements().collect();
    assert_eq!(reqs.len(), 3);

    assert_eq!(reqs[0].name(), "");
    assert_eq!(reqs[0].locator(), "rpm:zlib");
    assert_eq!(reqs[0].environ().get("CFLAGS"), Some(&"-O2".to_string()));

    assert_eq!(reqs[1].name(), "libjpeg");
    assert!(reqs[1].constraints().is_empty());

    // The continuation line folds into one logical requirement, and the
    // explicit CFLAGS wins over the inherited one.
    assert_eq!(reqs[2].name(), "imaging");
    assert_eq!(reqs[2].constraint_raw(), ">=2.0,<3.0");
    assert_eq!(reqs[2].environ().get("CFLAGS"), Some(&"-O3".to_string()));
    assert_eq!(reqs[2].environ().get("EXTRA"), Some(&"-fPIC".to_string()));
    assert_eq!(reqs[2].environ().get("PREFIX"), Some(&"/opt/imaging".to_string()));
}

#[test]
fn untouched_lines_survive_editing_a_sibling() {
    let mut doc = RequirementDocument::parse(SAMPLE).unwrap();

    // Find and rewrite only the libjpeg line.
    for index in 0..doc.len() {
        let is_libjpeg = matches!(
            doc.get(index).unwrap().payload(),
            Payload::Requirement(req) if req.name() == "libjpeg"
        );
        if is_libjpeg {
            if let Payload::Requirement(req) = doc.get_mut(index).unwrap().payload_mut() {
                req.set_name("jpeg");
            }
        }
    }

    let out = doc.serialize(false);
    assert!(out.contains("jpeg https://example.org/pkgs/libjpeg-9e.tar.gz"));
    // The comment, headers, and the continuation requirement are untouched.
    assert!(out.starts_with("# Build environment for the imaging service.\n"));
    assert!(out.contains(" \\\n    EXTRA=-fPIC"));
}

#[test]
fn inferred_names_fill_only_the_unnamed() {
    let mut doc = RequirementDocument::parse(SAMPLE).unwrap();
    doc.infer_missing_names(true).unwrap();

    let names: Vec<&str> = doc.requirements().map(|r| r.name()).collect();
    assert_eq!(names, ["zlib", "libjpeg", "imaging"]);
}

#[test]
fn name_collision_leaves_document_untouched() {
    let source = "zlib rpm:zlib\nhttps://example.org/zlib-1.3.tar.gz\n";
    let mut doc = RequirementDocument::parse(source).unwrap();

    assert!(doc.infer_missing_names(true).is_err());
    assert_eq!(doc.serialize(false), source);

    // Non-strict mode keeps going and simply leaves the duplicate unnamed.
    doc.infer_missing_names(false).unwrap();
    assert_eq!(doc.serialize(false), source);
}

#[test]
fn freeze_substitutes_pins() {
    let source = "mypkg https://example.org/mypkg.tar.gz>=1.0\n";
    let mut doc = RequirementDocument::parse(source).unwrap();

    for req in doc.requirements_mut() {
        req.pin(
            "https://example.org/mypkg-1.4.tar.gz",
            Version::parse("1.4").unwrap(),
        );
    }

    assert_eq!(
        doc.serialize(true),
        "mypkg https://example.org/mypkg-1.4.tar.gz==1.4\n"
    );
}

#[test]
fn file_round_trip_through_load_and_dump() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("requirements.txt");
    std::fs::write(&path, SAMPLE).unwrap();

    let doc = RequirementDocument::load(&path).unwrap();
    doc.dump(&path, false).unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), SAMPLE);
    assert!(!dir.path().join("requirements.txt.tmp").exists());
}
