#![no_main]

use libfuzzer_sys::fuzz_target;
use voltage_sample::constants::SUNSPEC_MARKER;
use voltage_sample::{ModelDiscovery, RegisterImage, RegisterStore};

// Arbitrary register contents behind a valid marker: the walk must terminate
// with models in ascending, non-overlapping order.
fuzz_target!(|words: Vec<u16>| {
    let base = 40000u16;
    let mut device = RegisterImage::new().with_holding(base, &SUNSPEC_MARKER);
    device = device.with_holding(base + 2, &words);
    let store = RegisterStore::new();

    let models = ModelDiscovery::new(1)
        .with_base_addresses(vec![base])
        .discover(&mut device, &store);

    let mut next = u32::from(base) + 2;
    for model in &models {
        assert_eq!(u32::from(model.base_address), next);
        assert!(model.end_address() <= 0x10000);
        next = model.end_address();
    }
});
