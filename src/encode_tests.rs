#![cfg(test)]
use super::decode::Decoder;
use super::encode::*;
use super::Error;
use hex_literal::hex;

fn check<F>(expected: &[u8], f: F)
where
    F: Fn(&mut Encoder) -> Result<usize, Error>,
{
    let mut buf = [0u8; 64];
    let mut enc = Encoder::new(&mut buf);
    assert_eq!(f(&mut enc).unwrap(), expected.len());
    assert_eq!(enc.encoded_len(), expected.len());
    assert_eq!(enc.bytes(), expected);
}

#[test]
fn rfc_uints() {
    check(&hex!("00"), |e| e.fmt_uint(0));
    check(&hex!("01"), |e| e.fmt_uint(1));
    check(&hex!("0a"), |e| e.fmt_uint(10));
    check(&hex!("17"), |e| e.fmt_uint(23));
    check(&hex!("1818"), |e| e.fmt_uint(24));
    check(&hex!("1819"), |e| e.fmt_uint(25));
    check(&hex!("1864"), |e| e.fmt_uint(100));
    check(&hex!("1903e8"), |e| e.fmt_uint(1000));
    check(&hex!("1a000f4240"), |e| e.fmt_uint(1000000));
    check(&hex!("1b000000e8d4a51000"), |e| e.fmt_uint(1000000000000));
    check(&hex!("1bffffffffffffffff"), |e| e.fmt_uint(u64::MAX));
}

#[test]
fn rfc_ints() {
    check(&hex!("00"), |e| e.fmt_int(0));
    check(&hex!("17"), |e| e.fmt_int(23));
    check(&hex!("20"), |e| e.fmt_int(-1));
    check(&hex!("29"), |e| e.fmt_int(-10));
    check(&hex!("3863"), |e| e.fmt_int(-100));
    check(&hex!("3903e7"), |e| e.fmt_int(-1000));
    check(&hex!("3b7fffffffffffffff"), |e| e.fmt_int(i64::MIN));
}

#[test]
fn rfc_floats() {
    check(&hex!("fa00000000"), |e| e.fmt_float(0.0));
    check(&hex!("fa47c35000"), |e| e.fmt_float(100000.0));
    check(&hex!("fa7f7fffff"), |e| e.fmt_float(3.4028234663852886e+38));
    check(&hex!("fa7f800000"), |e| e.fmt_float(f32::INFINITY));

    // doubles shrink to singles when nothing is lost
    check(&hex!("fa47c35000"), |e| e.fmt_double(100000.0));
    check(&hex!("fb3ff199999999999a"), |e| e.fmt_double(1.1));
    check(&hex!("fb7e37e43c8800759c"), |e| e.fmt_double(1.0e+300));
    check(&hex!("fbc010666666666666"), |e| e.fmt_double(-4.1));
    check(&hex!("fb7ff8000000000000"), |e| e.fmt_double(f64::NAN));
}

#[test]
fn simples() {
    check(&hex!("f4"), |e| e.fmt_bool(false));
    check(&hex!("f5"), |e| e.fmt_bool(true));
    check(&hex!("f6"), |e| e.fmt_null());
    check(&hex!("f7"), |e| e.fmt_undefined());
    check(&hex!("f0"), |e| e.fmt_simple(16));
    check(&hex!("f8ff"), |e| e.fmt_simple(255));
    check(&hex!("f820"), |e| e.fmt_simple(32));

    let mut buf = [0u8; 8];
    let mut enc = Encoder::new(&mut buf);
    for reserved in 24..=31 {
        assert_eq!(enc.fmt_simple(reserved), Err(Error::InvalidType));
    }
    assert_eq!(enc.encoded_len(), 0);
}

#[test]
fn strings() {
    check(&hex!("40"), |e| e.put_bstr(&[]));
    check(&hex!("4401020304"), |e| e.put_bstr(&hex!("01020304")));
    check(&hex!("60"), |e| e.put_tstr(""));
    check(&hex!("6449455446"), |e| e.put_tstr("IETF"));
    check(&hex!("62c3bc"), |e| e.put_tstr("\u{00fc}"));
}

#[test]
fn containers_and_tags() {
    check(&hex!("80"), |e| e.fmt_array(0));
    check(&hex!("83"), |e| e.fmt_array(3));
    check(&hex!("9819"), |e| e.fmt_array(25));
    check(&hex!("a0"), |e| e.fmt_map(0));
    check(&hex!("9f"), |e| e.fmt_array_indefinite());
    check(&hex!("bf"), |e| e.fmt_map_indefinite());
    check(&hex!("ff"), |e| e.fmt_end_indefinite());
    check(&hex!("c0"), |e| e.fmt_tag(0));
    check(&hex!("d9d9f7"), |e| e.fmt_tag(55799));
    check(&hex!("c48221196ab3"), |e| e.fmt_decimal_fraction(-2, 27315));
}

#[test]
fn composite_stream() {
    // [1, [2, 3], {"a": true}]
    let mut buf = [0u8; 32];
    let mut enc = Encoder::new(&mut buf);
    let mut len = 0;
    len += enc.fmt_array(3).unwrap();
    len += enc.fmt_uint(1).unwrap();
    len += enc.fmt_array(2).unwrap();
    len += enc.fmt_uint(2).unwrap();
    len += enc.fmt_uint(3).unwrap();
    len += enc.fmt_map(1).unwrap();
    len += enc.put_tstr("a").unwrap();
    len += enc.fmt_bool(true).unwrap();
    assert_eq!(len, enc.encoded_len());
    assert_eq!(enc.bytes(), hex!("8301820203a16161f5"));

    // and it decodes back
    let mut top = Decoder::new(&buf[..len]);
    let mut a = top.enter_array().unwrap();
    assert_eq!(a.get_u8().unwrap().0, 1);
    assert_eq!(a.skip().unwrap(), 3);
    let mut m = a.enter_map().unwrap();
    m.map_lookup("a").unwrap();
    assert_eq!(m.get_bool().unwrap().0, true);
    assert!(m.at_end());
    a.leave_container(&m).unwrap();
    assert!(a.at_end());
    top.leave_container(&a).unwrap();
    assert!(top.at_end());
}

#[test]
fn indefinite_roundtrip() {
    let mut buf = [0u8; 16];
    let mut enc = Encoder::new(&mut buf);
    enc.fmt_array_indefinite().unwrap();
    enc.fmt_uint(1).unwrap();
    enc.fmt_uint(2).unwrap();
    enc.fmt_uint(3).unwrap();
    enc.fmt_end_indefinite().unwrap();
    assert_eq!(enc.bytes(), hex!("9f010203ff"));
}

#[test]
fn zero_capacity_sizing() {
    // a dry run against an empty buffer still measures the stream
    let mut enc = Encoder::new(&mut []);
    assert_eq!(enc.fmt_array(2), Err(Error::EndOfInput));
    assert_eq!(enc.put_tstr("hello"), Err(Error::EndOfInput));
    assert_eq!(enc.fmt_uint(1000), Err(Error::EndOfInput));
    let need = enc.encoded_len();
    assert_eq!(need, 1 + 6 + 3);

    let mut buf = [0u8; 16];
    let mut enc = Encoder::new(&mut buf);
    enc.fmt_array(2).unwrap();
    enc.put_tstr("hello").unwrap();
    enc.fmt_uint(1000).unwrap();
    assert_eq!(enc.encoded_len(), need);
    assert_eq!(enc.bytes(), hex!("826568656c6c6f1903e8"));
}

#[test]
fn capacity_exhaustion_keeps_counting() {
    let mut buf = [0u8; 2];
    let mut enc = Encoder::new(&mut buf);
    enc.fmt_uint(1).unwrap();
    enc.fmt_uint(2).unwrap();
    assert_eq!(enc.fmt_uint(1000), Err(Error::EndOfInput));
    assert_eq!(enc.fmt_uint(3), Err(Error::EndOfInput));
    assert_eq!(enc.encoded_len(), 2 + 3 + 1);
    assert_eq!(enc.bytes(), hex!("0102"));
}
