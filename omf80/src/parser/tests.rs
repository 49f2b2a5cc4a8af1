use super::*;

#[test]
fn empty() {
    assert!(Parser::new(&[]).is_empty());
    assert!(!Parser::new(&[42]).is_empty());
}

#[test]
fn len() {
    assert_eq!(Parser::new(&[]).len(), 0);
    assert_eq!(Parser::new(&[42]).len(), 1);
}

#[test]
fn ints() {
    let bytes = &[
        0x12, 0x34, // u16
        0x55, // u8
        0xaa, 0x01, // u16
    ];

    let mut p = Parser::new(bytes);
    assert_eq!(p.len(), 5);
    assert_eq!(p.u16().unwrap(), 0x3412);
    assert_eq!(p.len(), 3);
    assert_eq!(p.u8().unwrap(), 0x55);
    assert_eq!(p.u16().unwrap(), 0x01aa);
    assert!(p.is_empty());
    assert!(p.u8().is_err());
}

#[test]
fn bytes_and_skip() {
    let mut p = Parser::new(&[1, 2, 3, 4, 5]);
    assert_eq!(p.bytes(2).unwrap(), &[1, 2]);
    p.skip(1).unwrap();
    assert_eq!(p.peek_rest(), &[4, 5]);
    assert!(p.bytes(3).is_err());
    assert_eq!(p.take_rest(), &[4, 5]);
    assert!(p.is_empty());
}

#[test]
fn str8() {
    let mut p = Parser::new(b"\x05HELLO\x00rest");
    assert_eq!(p.str8().unwrap(), "HELLO");
    assert_eq!(p.u8().unwrap(), 0);
    assert_eq!(p.peek_rest(), b"rest");

    // empty string is valid
    let mut p = Parser::new(&[0]);
    assert_eq!(p.str8().unwrap(), "");
    assert!(p.is_empty());

    // length prefix runs past the end of the payload
    let mut p = Parser::new(b"\x09short");
    assert!(p.str8().is_err());

    // no length prefix at all
    assert!(Parser::new(&[]).str8().is_err());
}
