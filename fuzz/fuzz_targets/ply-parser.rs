#![no_main]

use libfuzzer_sys::fuzz_target;
use ply_codec::Reader;

fuzz_target!(|data: &[u8]| {
    // We just pass the data to the parser, request every property and ignore
    // all parsed data. We are just interested in panics or other even worse
    // crashes. So we also ignore the returned `Result` as it's fine if the
    // parser says "this is not a valid PLY file".
    let mut reader = match Reader::new(data) {
        Ok(r) => r,
        Err(_) => return,
    };

    let names = reader.elements()
        .iter()
        .map(|e| {
            let props = e.properties().iter().map(|p| p.name.clone()).collect::<Vec<_>>();
            (e.name().to_string(), props)
        })
        .collect::<Vec<_>>();

    for (element, props) in &names {
        for prop in props {
            let _ = reader.request_properties_from_element(element, &[prop.as_str()]);
        }
    }

    let _ = reader.read();
});
