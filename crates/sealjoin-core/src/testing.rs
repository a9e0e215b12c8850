//! In-memory PDF fixtures for unit tests

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

/// Create a simple PDF with N letter-size pages containing identifiable text
pub(crate) fn create_test_pdf(num_pages: u32, content_prefix: &str) -> Vec<u8> {
    create_sized_pdf(num_pages, content_prefix, 612, 792)
}

/// Same as [`create_test_pdf`] with a custom MediaBox size
pub(crate) fn create_sized_pdf(
    num_pages: u32,
    content_prefix: &str,
    width: i64,
    height: i64,
) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut page_ids = Vec::new();
    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!(
                        "{}-Page-{}",
                        content_prefix,
                        i + 1
                    ))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        page_ids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids,
            "Count" => num_pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// A PDF whose pages carry `/Rotate`
pub(crate) fn create_rotated_pdf(num_pages: u32, width: i64, height: i64, rotate: i64) -> Vec<u8> {
    let pdf = create_sized_pdf(num_pages, "Rotated", width, height);
    let mut doc = Document::load_mem(&pdf).unwrap();
    let page_ids: Vec<_> = doc.get_pages().into_values().collect();
    for page_id in page_ids {
        let page = doc.get_object_mut(page_id).unwrap().as_dict_mut().unwrap();
        page.set("Rotate", rotate);
    }
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// A PDF whose pages live in a nested page tree and inherit MediaBox and
/// Resources from an intermediate node
pub(crate) fn create_nested_pdf(pages_per_branch: &[u32]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let root_id = doc.new_object_id();
    let mut branch_refs = Vec::new();
    let mut total = 0i64;

    for count in pages_per_branch {
        let branch_id = doc.new_object_id();
        let mut kids = Vec::new();
        for _ in 0..*count {
            let content_id = doc.add_object(Stream::new(
                Dictionary::new(),
                b"0 0 m 100 100 l S".to_vec(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => branch_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        doc.objects.insert(
            branch_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Parent" => root_id,
                "Kids" => kids,
                "Count" => *count as i64,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => Dictionary::new(),
            }),
        );
        branch_refs.push(Object::Reference(branch_id));
        total += *count as i64;
    }

    doc.objects.insert(
        root_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => branch_refs,
            "Count" => total,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => root_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}
