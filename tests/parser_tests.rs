//! Object and content stream parsing tests
//!
//! Based on PDF.js parser tests

mod test_utils;

use pdf_x_extract::core::*;
use test_utils::*;

// ============================================================================
// Object Syntax
// ============================================================================

#[test]
fn test_scalar_objects() {
    let objects = parse_objects(b"true false null 42 -3.5 (text) <414243> /Name");
    assert_eq!(
        objects,
        vec![
            PDFObject::Boolean(true),
            PDFObject::Boolean(false),
            PDFObject::Null,
            PDFObject::Integer(42),
            PDFObject::Real(-3.5),
            PDFObject::String(b"text".to_vec()),
            PDFObject::String(b"ABC".to_vec()),
            PDFObject::Name("Name".to_string()),
        ]
    );
}

#[test]
fn test_name_escapes() {
    let objects = parse_objects(b"/A#20B /Lime#23Green");
    assert_eq!(
        objects,
        vec![
            PDFObject::Name("A B".to_string()),
            PDFObject::Name("Lime#Green".to_string()),
        ]
    );
}

#[test]
fn test_nested_dictionary_with_references() {
    let objects = parse_objects(
        b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
          /Resources << /Font << /F1 5 0 R >> >> >>",
    );
    assert_eq!(objects.len(), 1);
    let page = &objects[0];

    assert_eq!(
        page.get("Parent"),
        Some(&PDFObject::Reference {
            num: 2,
            generation: 0
        })
    );
    assert_eq!(
        page.get("MediaBox").and_then(PDFObject::as_number_array),
        Some(vec![0.0, 0.0, 612.0, 792.0])
    );
    let font = page
        .get("Resources")
        .and_then(|r| r.get("Font"))
        .and_then(|f| f.get("F1"));
    assert_eq!(font.and_then(PDFObject::as_reference), Some((5, 0)));
}

#[test]
fn test_integers_not_followed_by_r_stay_integers() {
    let objects = parse_objects(b"[1 2 3 0 R 4]");
    assert_eq!(
        objects,
        vec![PDFObject::Array(vec![
            PDFObject::Integer(1),
            PDFObject::Integer(2),
            PDFObject::Reference {
                num: 3,
                generation: 0
            },
            PDFObject::Integer(4),
        ])]
    );
}

#[test]
fn test_stream_object_keeps_raw_payload() {
    let objects = parse_objects(b"<< /Length 5 >>\nstream\nhello\nendstream");
    let PDFObject::Stream { dict, data } = &objects[0] else {
        panic!("expected a stream, got {:?}", objects[0]);
    };
    assert_eq!(dict.get("Length"), Some(&PDFObject::Integer(5)));
    assert_eq!(&data[..], b"hello");
}

#[test]
fn test_comments_are_skipped() {
    let objects = parse_objects(b"% leading comment\n[1 % inline\n 2]");
    assert_eq!(
        objects,
        vec![PDFObject::Array(vec![
            PDFObject::Integer(1),
            PDFObject::Integer(2)
        ])]
    );
}

// ============================================================================
// Content Streams
// ============================================================================

#[test]
fn test_text_object_operations() {
    let ops = read_operations(b"BT /F1 12 Tf 100 700 Td (Hello) Tj ET");
    let codes: Vec<OpCode> = ops.iter().map(|o| o.op).collect();
    assert_eq!(
        codes,
        [
            OpCode::BeginText,
            OpCode::SetFont,
            OpCode::MoveText,
            OpCode::ShowText,
            OpCode::EndText
        ]
    );
    assert_eq!(
        ops[1].args.as_slice(),
        &[PDFObject::Name("F1".into()), PDFObject::Integer(12)]
    );
    assert_eq!(ops[3].args.as_slice(), &[PDFObject::String(b"Hello".to_vec())]);
}

#[test]
fn test_spaced_text_array_is_one_operand() {
    let ops = read_operations(b"[(A) -250 (B)] TJ");
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].op, OpCode::ShowSpacedText);
    assert_eq!(
        ops[0].args.as_slice(),
        &[PDFObject::Array(vec![
            PDFObject::String(b"A".to_vec()),
            PDFObject::Integer(-250),
            PDFObject::String(b"B".to_vec()),
        ])]
    );
}

#[test]
fn test_vendor_operator_does_not_desynchronize_operands() {
    let ops = read_operations(b"/Tag 3 vnd 100 700 Td");
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].op, OpCode::MoveText);
    assert_eq!(
        ops[0].args.as_slice(),
        &[PDFObject::Integer(100), PDFObject::Integer(700)]
    );
}

#[test]
fn test_inline_image_with_binary_payload() {
    let mut content = b"q BI /W 2 /H 1 /BPC 8 /CS /G ID ".to_vec();
    content.extend_from_slice(&[0x00, 0xFF]);
    content.extend_from_slice(b" EI Q");

    let ops = read_operations(&content);
    let codes: Vec<OpCode> = ops.iter().map(|o| o.op).collect();
    assert_eq!(
        codes,
        [OpCode::Save, OpCode::EndInlineImage, OpCode::Restore]
    );
    let PDFObject::Stream { dict, data } = &ops[1].args[0] else {
        panic!("expected inline image stream");
    };
    assert_eq!(dict.get("W"), Some(&PDFObject::Integer(2)));
    assert_eq!(&data[..], &[0x00, 0xFF]);
}

#[test]
fn test_transform_operands_and_display() {
    let ops = read_operations(b"1 0 0 1 72 720.5 cm");
    assert_eq!(ops[0].op, OpCode::Transform);
    let values: Vec<f64> = ops[0].args.iter().filter_map(PDFObject::as_number).collect();
    assert_eq!(values, [1.0, 0.0, 0.0, 1.0, 72.0, 720.5]);
    assert!(ops[0].to_string().starts_with("cm ("));
}
