#![no_main]

use libfuzzer_sys::fuzz_target;
use picocbor::decode::Decoder;

fuzz_target!(|data: &[u8]| {
    let mut dec = Decoder::new(data);
    _ = dec.skip();

    let reads: [fn(&mut Decoder) -> Result<(), picocbor::Error>; 8] = [
        |d| d.get_u64().map(|_| ()),
        |d| d.get_i64().map(|_| ()),
        |d| d.get_bstr().map(|_| ()),
        |d| d.get_tstr().map(|_| ()),
        |d| d.get_double().map(|_| ()),
        |d| d.get_simple().map(|_| ()),
        |d| d.get_tag().map(|_| ()),
        |d| d.get_decimal_fraction().map(|_| ()),
    ];
    for read in reads {
        let mut dec = Decoder::new(data);
        _ = read(&mut dec);

        let mut dec = Decoder::new_packed(data);
        _ = read(&mut dec);
    }

    // second half decoded against the first half as a shared-item table
    let (table, rest) = data.split_at(data.len() / 2);
    if let Ok(mut dec) = Decoder::with_shared_table(rest, table) {
        while !dec.at_end() {
            if dec.get_u64().is_ok() || dec.get_tstr().is_ok() || dec.get_bool().is_ok() {
                continue;
            }
            if dec.skip().is_err() {
                break;
            }
        }
    }
});
