#![no_main]
use libfuzzer_sys::fuzz_target;
use pathsense_core::{normalize, Layout, PathFeatures, QuestionType, RawSample};

fuzz_target!(|data: &[u8]| {
    if data.len() < 7 {
        return;
    }

    let question_type = if data[0] & 1 == 0 {
        QuestionType::BipartiteChoice
    } else {
        QuestionType::TripartiteChoice
    };
    let options: Vec<String> = (0..=(data[0] % 3)).map(|i| format!("option{i}")).collect();
    let layout = Layout::new(options, format!("option{}", (data[0] >> 2) % 3));

    let mut t = 0i64;
    let samples: Vec<RawSample> = data[1..]
        .chunks_exact(6)
        .map(|c| {
            t += i64::from(u16::from_le_bytes([c[4], c[5]]));
            RawSample::new(
                t,
                f64::from(i16::from_le_bytes([c[0], c[1]])),
                f64::from(i16::from_le_bytes([c[2], c[3]])),
            )
        })
        .collect();

    if let Ok(path) = normalize(&samples, &question_type, &layout, "option1") {
        let _ = PathFeatures::default().extract(&path);
    }
});
